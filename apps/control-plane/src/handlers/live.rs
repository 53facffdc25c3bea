// [apps/control-plane/src/handlers/live.rs]
/*!
 * =================================================================
 * APARATO: LIVE VIEW DISPATCHER (V15.0 - DUAL PATH ENVELOPE)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: IGNICIÓN DE SESIONES EN VIVO Y TELEMETRÍA DE CLIENTE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. WEBRTC BEST EFFORT: El colapso de la negociación SFU degrada la
 *    pata primaria a null; la pata HLS SIEMPRE se puebla.
 * 2. SECRET INJECTION: Las credenciales RTSP viajan al plano de medios
 *    recién desenvueltas del sobre KEK/DEK; jamás se persisten abiertas
 *    ni se devuelven al navegador.
 * 3. TELEMETRY AS EVIDENCE: Los eventos del reproductor atraviesan el
 *    pipeline de auditoría como cualquier otra acción.
 * =================================================================
 */

use axum::extract::{Extension, Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{Duration as ChronoDuration, Utc};
use tracing::{info, instrument, warn};
use ulid::Ulid;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;
use panoptes_domain_models::audit::actions;
use panoptes_domain_models::credentials::credential_binding_aad;
use panoptes_domain_models::rbac::permissions;
use panoptes_domain_models::{
    AuditEvent, AuditResult, Camera, ClientTelemetryEvent, FallbackPolicy, HlsLeg,
    LiveSessionEnvelope, TelemetryPolicy, WebRtcLeg,
};
use panoptes_infra_media::proto::media_v1::StartSfuRtpEgressRequest;

/// Vida del token HLS acuñado para el sobre.
const HLS_TOKEN_TTL_SECONDS: i64 = 600;
/// Latencia objetivo publicada para la pata HLS.
const HLS_TARGET_LATENCY_MS: u64 = 4000;
/// Ventana de conexión publicada para la pata WebRTC.
const WEBRTC_CONNECT_TIMEOUT_MS: u64 = 5000;

/**
 * Desenvuelve las credenciales de la cámara y las inyecta en la URL
 * RTSP que viaja al plano de medios. Sin registro de credenciales, la
 * URL directa se usa tal cual.
 */
async fn resolve_ingest_url(state: &AppState, camera: &Camera) -> Result<String, ApiError> {
    let direct_url = camera.rtsp_url.clone()
        .ok_or_else(|| ApiError::Validation("CAMERA_WITHOUT_RTSP_URL".into()))?;

    let Some(credential_record) = state.credential_repository
        .fetch_credential(&camera.tenant_id, &camera.id)
        .await?
    else {
        return Ok(direct_url);
    };

    let binding_aad = credential_binding_aad(&camera.tenant_id, &camera.id);
    let keyring = state.current_keyring();

    // 1. Apertura del DEK bajo el KEK que el registro declara.
    let data_encryption_key = keyring.unwrap_data_key(
        &credential_record.master_kid,
        &credential_record.dek_nonce,
        &credential_record.dek_ciphertext,
        &credential_record.dek_tag,
        &binding_aad,
    )?;

    // 2. Apertura de usuario y contraseña bajo el DEK.
    let username_bytes = panoptes_core_crypto::gcm::decrypt_gcm(
        &data_encryption_key,
        &credential_record.nonce_u,
        &credential_record.enc_username,
        &credential_record.tag_u,
        &binding_aad,
    )?;
    let password_bytes = panoptes_core_crypto::gcm::decrypt_gcm(
        &data_encryption_key,
        &credential_record.nonce_p,
        &credential_record.enc_password,
        &credential_record.tag_p,
        &binding_aad,
    )?;

    let username = String::from_utf8(username_bytes).map_err(|_| ApiError::Internal("DECRYPT_FAILED".into()))?;
    let password = String::from_utf8(password_bytes).map_err(|_| ApiError::Internal("DECRYPT_FAILED".into()))?;

    // 3. Inyección de userinfo en el esquema rtsp://.
    match direct_url.strip_prefix("rtsp://") {
        Some(authority_and_path) => Ok(format!("rtsp://{}:{}@{}", username, password, authority_and_path)),
        None => Ok(direct_url),
    }
}

/**
 * Negociación best-effort de la pata WebRTC: sala + transporte de
 * ingesta en el SFU + egress RTP en el plano de medios.
 */
async fn prepare_webrtc_leg(state: &AppState, camera: &Camera) -> Option<WebRtcLeg> {
    let room_identifier = camera.id.to_string();

    if let Err(room_fault) = state.sfu_client.join_room(&room_identifier).await {
        warn!("🕸️ [LIVE_DISPATCH]: SFU room unavailable: {}", room_fault);
        return None;
    }

    let ingest_transport = match state.sfu_client.prepare_ingest(&room_identifier).await {
        Ok(transport) => transport,
        Err(transport_fault) => {
            warn!("🕸️ [LIVE_DISPATCH]: SFU ingest transport collapsed: {}", transport_fault);
            return None;
        }
    };

    let egress_outcome = state.media_client.start_sfu_rtp_egress(StartSfuRtpEgressRequest {
        camera_id: camera.id.to_string(),
        room_id: room_identifier.clone(),
        ssrc: ingest_transport.ssrc,
        pt: ingest_transport.pt,
        dst_ip: ingest_transport.ip.clone(),
        dst_port: ingest_transport.port as u32,
    }).await;

    if let Err(egress_fault) = egress_outcome {
        warn!("🎞️ [LIVE_DISPATCH]: RTP egress ignition failed: {}", egress_fault);
        return None;
    }

    Some(WebRtcLeg {
        sfu_url: state.sfu_client.public_url().to_string(),
        room_id: room_identifier,
        connect_timeout_ms: WEBRTC_CONNECT_TIMEOUT_MS,
    })
}

/**
 * Endpoint: POST /api/v1/cameras/{id}/live/start
 */
#[instrument(skip_all, fields(camera = %camera_id))]
pub async fn handle_live_start(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(camera_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    // 1. RBAC (cámara ajena => 404 por resolución cercada)
    let camera = state
        .authorize_camera_permission(&context, permissions::STREAM_VIEW_LIVE, &camera_id)
        .await?;

    // Una cámara administrativamente apagada no emite sesiones.
    if !camera.is_enabled {
        return Err(ApiError::Conflict);
    }

    // 2. IGNICIÓN DE INGESTA (fallo aquí sí es terminal: sin segmentos no hay nada)
    let ingest_url = resolve_ingest_url(&state, &camera).await?;
    let ingest_confirmation = state.media_client
        .start_ingest(&camera.id.to_string(), &ingest_url, true)
        .await?;

    // 3. PATA WEBRTC (best effort: jamás bloquea la respuesta)
    let webrtc_leg = prepare_webrtc_leg(&state, &camera).await;

    // 4. PATA HLS (siempre poblada)
    let tenant_slug = state.tenant_repository
        .find_by_id(&context.tenant_id)
        .await?
        .map(|tenant| tenant.slug)
        .ok_or(ApiError::AuthFailed)?;

    let token_expiry = Utc::now() + ChronoDuration::seconds(HLS_TOKEN_TTL_SECONDS);
    let delivery_token = state.hls_token_forge.mint(
        &camera.id.to_string(),
        &ingest_confirmation.hls_session_id,
        token_expiry,
    );

    let playlist_url = format!(
        "/hls/live/{}/{}/{}/index.m3u8?{}",
        tenant_slug,
        camera.id,
        ingest_confirmation.hls_session_id,
        delivery_token.to_query_string(),
    );

    // 5. SOBRE DUAL
    let envelope = LiveSessionEnvelope {
        session_id: Ulid::new().to_string(),
        expires_at: token_expiry.timestamp(),
        primary: "webrtc".to_string(),
        fallback: "hls".to_string(),
        webrtc: webrtc_leg,
        hls: HlsLeg {
            playlist_url,
            target_latency_ms: HLS_TARGET_LATENCY_MS,
        },
        fallback_policy: FallbackPolicy::default(),
        telemetry_policy: TelemetryPolicy {
            client_event_endpoint: "/api/v1/live/events".to_string(),
        },
    };

    let dispatch_evidence = AuditEvent::now("live.start", AuditResult::Success)
        .with_tenant(context.tenant_id)
        .with_actor(context.user_id)
        .with_target("camera", camera.id.to_string())
        .with_reason(if envelope.webrtc.is_some() { "DUAL_PATH" } else { "HLS_ONLY" });
    let _ = state.audit_pipeline.record(dispatch_evidence);

    info!(
        "📺 [LIVE_DISPATCH]: Session [{}] issued for camera [{}] (webrtc={}).",
        envelope.session_id, camera.id, envelope.webrtc.is_some()
    );
    Ok((StatusCode::OK, Json(envelope)).into_response())
}

/**
 * Endpoint: POST /api/v1/live/events
 * Telemetría del reproductor, canalizada por el pipeline de auditoría.
 */
#[instrument(skip_all, fields(event = %telemetry.event_type))]
pub async fn handle_client_telemetry(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(telemetry): Json<ClientTelemetryEvent>,
) -> Result<Response, ApiError> {
    if telemetry.event_type.is_empty() || telemetry.viewer_session_id.is_empty() {
        return Err(ApiError::Validation("TELEMETRY_FIELDS_MISSING".into()));
    }

    let mut telemetry_evidence = AuditEvent::now(actions::LIVE_CLIENT_EVENT, AuditResult::Success)
        .with_tenant(context.tenant_id)
        .with_actor(context.user_id)
        .with_target("viewer_session", telemetry.viewer_session_id.clone());
    telemetry_evidence.reason_code = telemetry.reason_code.clone();

    state.audit_pipeline.record(telemetry_evidence)
        .map_err(|_| ApiError::AuditExhausted)?;

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "ingested" }))).into_response())
}
