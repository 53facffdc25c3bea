// [libs/infra/media-client/src/sfu.rs]
/*!
 * =================================================================
 * APARATO: SFU INTERNAL CLIENT (V6.0 - SHARED SECRET)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: SUPERFICIE JSON/HTTP DEL SFU CON SECRETO INTERNO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. HEADER TRUST: Toda llamada porta 'X-Internal-Auth'; el SFU vive en
 *    la red interna del appliance y no conoce otro esquema.
 * 2. TEN SECOND DISCIPLINE: Ventana única de 10 s para toda la
 *    superficie; el SFU responde en milisegundos o está enfermo.
 * =================================================================
 */

use std::time::Duration;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::MediaClientError;

/// Header de confianza interna exigido por el SFU.
pub const INTERNAL_AUTH_HEADER: &str = "X-Internal-Auth";
/// Ventana nominal de la superficie SFU.
pub const SFU_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Transporte de ingesta anunciado por el SFU para el egress RTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SfuIngestTransport {
    pub ip: String,
    pub port: u16,
    pub ssrc: u32,
    pub pt: u32,
}

/// Cliente interno hacia el SFU.
#[derive(Clone)]
pub struct SfuClient {
    http_client: Client,
    base_url: String,
    internal_secret: String,
}

impl SfuClient {
    pub fn new(base_url: &str, internal_secret: &str) -> Self {
        let hardened_client = Client::builder()
            .timeout(SFU_CALL_TIMEOUT)
            .user_agent("Panoptes-SFU-Link/1.0")
            .build()
            .expect("FATAL: Failed to initialize SFU uplink client.");

        Self {
            http_client: hardened_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            internal_secret: internal_secret.to_string(),
        }
    }

    fn room_url(&self, room_id: &str, resource: &str) -> String {
        format!("{}/rooms/{}/{}", self.base_url, room_id, resource)
    }

    /// Capacidades RTP de la sala (consumidas por el reproductor WebRTC).
    #[instrument(skip(self))]
    pub async fn get_rtp_capabilities(&self, room_id: &str) -> Result<serde_json::Value, MediaClientError> {
        let response = self.http_client
            .get(self.room_url(room_id, "rtp-capabilities"))
            .header(INTERNAL_AUTH_HEADER, &self.internal_secret)
            .send()
            .await
            .map_err(|network_fault| MediaClientError::UpstreamSfu(network_fault.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaClientError::UpstreamSfu(format!("SFU_STATUS_{}", response.status().as_u16())));
        }
        response.json().await
            .map_err(|decode_fault| MediaClientError::UpstreamSfu(decode_fault.to_string()))
    }

    /// Asegura la existencia de la sala (idempotente en el SFU).
    #[instrument(skip(self))]
    pub async fn join_room(&self, room_id: &str) -> Result<(), MediaClientError> {
        let response = self.http_client
            .post(self.room_url(room_id, "join"))
            .header(INTERNAL_AUTH_HEADER, &self.internal_secret)
            .json(&serde_json::json!({ "role": "control-plane" }))
            .send()
            .await
            .map_err(|network_fault| MediaClientError::UpstreamSfu(network_fault.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaClientError::UpstreamSfu(format!("SFU_STATUS_{}", response.status().as_u16())));
        }
        debug!("🕸️ [SFU]: Room [{}] ready.", room_id);
        Ok(())
    }

    /**
     * Prepara el transporte de ingesta de la sala y retorna las
     * coordenadas (IP/puerto/SSRC/PT) para apuntar el egress RTP.
     */
    #[instrument(skip(self))]
    pub async fn prepare_ingest(&self, room_id: &str) -> Result<SfuIngestTransport, MediaClientError> {
        let response = self.http_client
            .post(self.room_url(room_id, "ingest"))
            .header(INTERNAL_AUTH_HEADER, &self.internal_secret)
            .json(&serde_json::json!({ "kind": "video" }))
            .send()
            .await
            .map_err(|network_fault| MediaClientError::UpstreamSfu(network_fault.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaClientError::UpstreamSfu(format!("SFU_STATUS_{}", response.status().as_u16())));
        }
        response.json().await
            .map_err(|decode_fault| MediaClientError::UpstreamSfu(decode_fault.to_string()))
    }

    /// URL pública del SFU publicada en el sobre de visión en vivo.
    pub fn public_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_room_url_construction() {
        let client = SfuClient::new("http://127.0.0.1:4443/", "secret");
        assert_eq!(
            client.room_url("cam-9", "rtp-capabilities"),
            "http://127.0.0.1:4443/rooms/cam-9/rtp-capabilities"
        );
        assert_eq!(client.public_url(), "http://127.0.0.1:4443");
    }

    #[tokio::test]
    async fn certify_dead_sfu_yields_upstream_fault() {
        let client = SfuClient::new("http://127.0.0.1:1", "secret");
        assert!(matches!(
            client.join_room("cam-1").await,
            Err(MediaClientError::UpstreamSfu(_))
        ));
    }

    #[test]
    fn certify_transport_deserialization() {
        let transport: SfuIngestTransport = serde_json::from_str(
            r#"{"ip":"10.0.0.20","port":40000,"ssrc":111222,"pt":96}"#
        ).unwrap();
        assert_eq!(transport.port, 40000);
        assert_eq!(transport.pt, 96);
    }
}
