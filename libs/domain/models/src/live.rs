// [libs/domain/models/src/live.rs]
/*!
 * =================================================================
 * APARATO: LIVE VIEW ENVELOPE (V6.0 - DUAL PATH)
 * CLASIFICACIÓN: DOMAIN CONTRACT (ESTRATO L2)
 * RESPONSABILIDAD: SOBRE DE SESIÓN WEBRTC/HLS Y TELEMETRÍA DE CLIENTE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. HLS ALWAYS: La pata HLS se puebla incluso cuando la negociación
 *    WebRTC colapsa; el reproductor siempre posee una vía de repliegue.
 * 2. POLICY HINTS: Tiempos de conexión, reintentos y backoff viajan en
 *    el sobre para que el cliente no hardcodee política.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Pata primaria WebRTC (ausente si la preparación del SFU colapsó).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebRtcLeg {
    pub sfu_url: String,
    pub room_id: String,
    pub connect_timeout_ms: u64,
}

/// Pata de repliegue HLS, siempre presente.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlsLeg {
    pub playlist_url: String,
    pub target_latency_ms: u64,
}

/// Política de repliegue publicada al reproductor.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackPolicy {
    pub webrtc_connect_timeout_ms: u64,
    pub webrtc_track_timeout_ms: u64,
    pub max_auto_retries: u32,
    pub retry_backoff_ms: Vec<u64>,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            webrtc_connect_timeout_ms: 5000,
            webrtc_track_timeout_ms: 3000,
            max_auto_retries: 2,
            retry_backoff_ms: vec![1000, 3000],
        }
    }
}

/// Punto de ingesta de telemetría del reproductor.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryPolicy {
    pub client_event_endpoint: String,
}

/// Sobre dual emitido por el despachador de visión en vivo.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSessionEnvelope {
    pub session_id: String,
    pub expires_at: i64,
    pub primary: String,
    pub fallback: String,
    pub webrtc: Option<WebRtcLeg>,
    pub hls: HlsLeg,
    pub fallback_policy: FallbackPolicy,
    pub telemetry_policy: TelemetryPolicy,
}

/// Telemetría cruda reportada por el reproductor del navegador.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTelemetryEvent {
    pub viewer_session_id: String,
    pub event_type: String,
    pub reason_code: Option<String>,
    pub ttff_ms: Option<i64>,
    pub mode: Option<String>,
    pub ts_unix_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_fallback_policy_defaults() {
        let policy = FallbackPolicy::default();
        assert_eq!(policy.webrtc_connect_timeout_ms, 5000);
        assert_eq!(policy.webrtc_track_timeout_ms, 3000);
        assert_eq!(policy.max_auto_retries, 2);
        assert_eq!(policy.retry_backoff_ms, vec![1000, 3000]);
    }

    #[test]
    fn certify_envelope_serialization_shape() {
        let envelope = LiveSessionEnvelope {
            session_id: "01J0000000000000000000TEST".into(),
            expires_at: 1_700_000_000,
            primary: "webrtc".into(),
            fallback: "hls".into(),
            webrtc: None,
            hls: HlsLeg { playlist_url: "/hls/live/t/c/s/index.m3u8?sig=x".into(), target_latency_ms: 4000 },
            fallback_policy: FallbackPolicy::default(),
            telemetry_policy: TelemetryPolicy { client_event_endpoint: "/api/v1/live/events".into() },
        };

        let rendered = serde_json::to_value(&envelope).unwrap();
        assert_eq!(rendered["primary"], "webrtc");
        assert_eq!(rendered["fallback"], "hls");
        assert!(rendered["webrtc"].is_null(), "Pata WebRTC ausente se publica como null");
        assert_eq!(rendered["hls"]["target_latency_ms"], 4000);
    }
}
