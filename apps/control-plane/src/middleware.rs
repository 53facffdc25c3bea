// [apps/control-plane/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: PERIMETER GUARD CHAIN (V18.0 - GALVANIC IDENTITY)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: IDENTIDAD, RÁFAGAS, INTENCIÓN DE AUDITORÍA Y RASTRO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE INJECTION POINT: Este es el único estrato que inyecta
 *    'AuthContext' en el flujo de la petición; los handlers lo consumen
 *    por extensión, jamás lo fabrican.
 * 2. CHAIN ORDER IS LOAD-BEARING: request-id -> real-ip -> pánico ->
 *    timeout -> CORS -> limitador global -> intención de auditoría ->
 *    mux -> auth -> guardias de permiso -> handler. El limitador
 *    precede a la auditoría para que una ráfaga rechazada no se cuente
 *    doble como acción atendida.
 * 3. FAIL CLOSED: Bóveda de revocación inaccesible => rechazo.
 * =================================================================
 */

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::state::AppState;
use panoptes_domain_models::audit::actions;
use panoptes_domain_models::{AuditEvent, AuditResult, Camera};
use panoptes_infra_kv::RateScope;

/// Identidad soberana inyectada tras la validación del token de acceso.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub jti: String,
    #[serde(skip)]
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub request_id: Option<String>,
}

/// Origen de red del cliente, resuelto por el perímetro.
#[derive(Debug, Clone)]
pub struct ClientNetworkOrigin(pub String);

// --- ESTRATO 1: RESOLUCIÓN DE IP REAL ---

pub async fn real_ip_resolver(mut request: Request, next: Next) -> Response {
    let forwarded_origin = request.headers()
        .get("x-forwarded-for")
        .and_then(|header_value| header_value.to_str().ok())
        .and_then(|chain| chain.split(',').next())
        .map(|first_hop| first_hop.trim().to_string())
        .or_else(|| {
            request.headers()
                .get("x-real-ip")
                .and_then(|header_value| header_value.to_str().ok())
                .map(str::to_string)
        })
        .or_else(|| {
            request.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|connect_info| connect_info.0.ip().to_string())
        });

    if let Some(resolved_origin) = forwarded_origin {
        request.extensions_mut().insert(ClientNetworkOrigin(resolved_origin));
    }
    next.run(request).await
}

// --- ESTRATO 2: LIMITADOR GLOBAL POR IP ---

pub async fn global_ip_limiter(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let origin_principal = request.extensions()
        .get::<ClientNetworkOrigin>()
        .map(|origin| state.rate_limiter.hash_ip_principal(&origin.0))
        .unwrap_or_else(|| "unresolved".to_string());

    let admission = state.rate_limiter.check(RateScope::GlobalIp, &origin_principal, None);
    if !admission.allowed {
        return Err(ApiError::RateLimited {
            reason_code: RateScope::GlobalIp.reason_code(),
            retry_after: admission.retry_after,
        });
    }
    Ok(next.run(request).await)
}

// --- ESTRATO 3: INTENCIÓN DE AUDITORÍA (ACCIONES MUTANTES) ---

/**
 * Registra la intención de toda petición mutante ANTES del handler.
 * Si ni la cola ni el spool aceptan el evento, la acción falla 503:
 * el rastro forense manda sobre la disponibilidad.
 */
pub async fn audit_intent_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let is_mutating = !matches!(request.method().as_str(), "GET" | "HEAD" | "OPTIONS");

    if is_mutating {
        let request_path = request.uri().path().to_string();
        let origin_address = request.extensions()
            .get::<ClientNetworkOrigin>()
            .map(|origin| origin.0.clone());
        let request_identifier = request.headers()
            .get("x-request-id")
            .and_then(|header_value| header_value.to_str().ok())
            .map(str::to_string);

        let mut intent_event = AuditEvent::now("http.request", AuditResult::Success)
            .with_target("endpoint", request_path);
        intent_event.ip_address = origin_address;
        intent_event.request_id = request_identifier;

        state.audit_pipeline.record(intent_event)
            .map_err(|exhaustion| {
                warn!("🧾 [AUDIT_EXHAUSTED]: Mutating request refused: {}", exhaustion);
                ApiError::AuditExhausted
            })?;
    }

    Ok(next.run(request).await)
}

// --- ESTRATO 4: GUARDIA DE AUTENTICACIÓN ---

/**
 * Guardia de Autenticación: el portero soberano del Plano de Control.
 *
 * # Logic:
 * 1. Extrae el bearer del header Authorization.
 * 2. Valida firma, exp, nbf y tipo bajo la Autoridad de Tokens.
 * 3. Consulta la bóveda de revocación (fail-closed).
 * 4. Aplica la ráfaga por operador.
 * 5. Inyecta AuthContext para los estratos interiores.
 */
pub async fn auth_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization_header = request.headers()
        .get(header::AUTHORIZATION)
        .and_then(|header_value| header_value.to_str().ok());

    let raw_token = match authorization_header {
        Some(header_value) if header_value.starts_with("Bearer ") => &header_value[7..],
        _ => return Err(ApiError::AuthFailed),
    };

    let principal = state.token_authority.verify_access_token(raw_token)?;

    // Bóveda inaccesible => rechazo (fail-closed en el borde de identidad).
    let is_revoked = state.revocation_registry
        .is_revoked(&principal.tenant_id, &principal.jti)
        .map_err(|_| ApiError::AuthFailed)?;
    if is_revoked {
        warn!("🚫 [AUTH_REJECTION]: Revoked jti [{}] presented.", principal.jti);
        return Err(ApiError::TokenRevoked);
    }

    let per_user_admission = state.rate_limiter
        .check(RateScope::PerUser, &principal.user_id.to_string(), None);
    if !per_user_admission.allowed {
        return Err(ApiError::RateLimited {
            reason_code: RateScope::PerUser.reason_code(),
            retry_after: per_user_admission.retry_after,
        });
    }

    let origin_address = request.extensions()
        .get::<ClientNetworkOrigin>()
        .map(|origin| origin.0.clone());
    let request_identifier = request.headers()
        .get("x-request-id")
        .and_then(|header_value| header_value.to_str().ok())
        .map(str::to_string);

    debug!("👤 [AUTH]: Operator [{}] authenticated.", principal.user_id);
    request.extensions_mut().insert(AuthContext {
        user_id: principal.user_id,
        tenant_id: principal.tenant_id,
        jti: principal.jti,
        expires_at: principal.expires_at,
        ip_address: origin_address,
        request_id: request_identifier,
    });

    Ok(next.run(request).await)
}

// --- ESTRATO 5: CIERRE DE RASTRO (request_id EN CUERPOS DE ERROR) ---

/**
 * Inyecta el request_id propagado en los cuerpos de error JSON, para
 * que el operador pueda correlacionar con el rastro del Watchtower.
 */
pub async fn finalize_error_trace(request: Request, next: Next) -> Response {
    // El request-id ya viaja en la petición (capa exterior SetRequestId).
    let propagated_request_id = request.headers()
        .get("x-request-id")
        .and_then(|header_value| header_value.to_str().ok())
        .map(str::to_string);

    let response = next.run(request).await;

    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let is_json_body = response.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|content_type| content_type.to_str().ok())
        .map(|content_type| content_type.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json_body {
        return response;
    }

    let (mut response_parts, response_body) = response.into_parts();
    let Ok(body_bytes) = axum::body::to_bytes(response_body, 64 * 1024).await else {
        return Response::from_parts(response_parts, Body::empty());
    };

    let rebuilt_bytes = match serde_json::from_slice::<serde_json::Value>(&body_bytes) {
        Ok(mut parsed_body) => {
            if let Some(body_object) = parsed_body.as_object_mut() {
                if body_object.contains_key("request_id") {
                    body_object.insert(
                        "request_id".to_string(),
                        serde_json::json!(propagated_request_id),
                    );
                }
            }
            serde_json::to_vec(&parsed_body).unwrap_or_else(|_| body_bytes.to_vec())
        }
        Err(_) => body_bytes.to_vec(),
    };

    response_parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(response_parts, Body::from(rebuilt_bytes))
}

// --- ESTRATO 6: GUARDIAS DE PERMISO (ÚNICO EMISOR DE permission.check) ---

impl AppState {
    fn record_permission_verdict(
        &self,
        context: &AuthContext,
        permission: &str,
        target_type: &str,
        target_id: &str,
        allowed: bool,
    ) {
        let verdict_event = AuditEvent::now(
            actions::PERMISSION_CHECK,
            if allowed { AuditResult::Success } else { AuditResult::Failure },
        )
        .with_tenant(context.tenant_id)
        .with_actor(context.user_id)
        .with_target(target_type, format!("{}:{}", permission, target_id))
        .with_reason(if allowed { "ALLOW" } else { "DENY" });

        let verdict_event = match (&context.ip_address, &context.request_id) {
            (Some(ip), Some(rid)) => verdict_event.with_ip(ip.clone()).with_request_id(rid.clone()),
            (Some(ip), None) => verdict_event.with_ip(ip.clone()),
            (None, Some(rid)) => verdict_event.with_request_id(rid.clone()),
            (None, None) => verdict_event,
        };

        if let Err(evidence_fault) = self.audit_pipeline.record(verdict_event) {
            warn!("❌ [PERMISSION_EVIDENCE]: Verdict trace lost: {}", evidence_fault);
        }
    }

    /**
     * Guardia de alcance tenant: exige cobertura tenant-wide del permiso.
     */
    pub async fn authorize_tenant_permission(
        &self,
        context: &AuthContext,
        permission: &'static str,
    ) -> Result<(), ApiError> {
        let lens = self.permission_lens(&context.tenant_id, &context.user_id).await?;
        let allowed = lens.allows_tenant(permission);

        self.record_permission_verdict(context, permission, "tenant", &context.tenant_id.to_string(), allowed);

        if allowed { Ok(()) } else { Err(ApiError::Forbidden) }
    }

    /**
     * Guardia de alcance cámara: resuelve la cámara dentro del tenant
     * (una cámara ajena simplemente no existe: 404) y verifica cobertura
     * por tenant, site, cámara o grupo.
     */
    pub async fn authorize_camera_permission(
        &self,
        context: &AuthContext,
        permission: &'static str,
        camera_id: &Uuid,
    ) -> Result<Camera, ApiError> {
        let Some(camera) = self.camera_repository
            .find_camera_scoped(&context.tenant_id, camera_id)
            .await?
        else {
            // Enmascaramiento cross-tenant: jamás 403 para lo invisible.
            return Err(ApiError::NotFound);
        };

        let camera_groups = self.camera_repository.camera_group_ids(&camera.id).await?;
        let lens = self.permission_lens(&context.tenant_id, &context.user_id).await?;
        let allowed = lens.allows_camera(permission, &camera.id, &camera.site_id, &camera_groups);

        self.record_permission_verdict(context, permission, "camera", &camera.id.to_string(), allowed);

        if allowed { Ok(camera) } else { Err(ApiError::Forbidden) }
    }
}
