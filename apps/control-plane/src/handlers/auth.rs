// [apps/control-plane/src/handlers/auth.rs]
/*!
 * =================================================================
 * APARATO: AUTHENTICATION PROTOCOL HANDLER (V23.0 - FAMILY ROTATION)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: LOGIN, REFRESH, LOGOUT Y CIERRE DE REINICIO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DUAL TOKEN ISSUANCE: Acceso firmado en el cuerpo; refresco opaco
 *    en cookie HttpOnly/Secure/SameSite=Strict.
 * 2. REUSE DETECTION: Presentar una hoja ya usada incinera la familia
 *    completa Y purga todas las sesiones del operador.
 * 3. GENERIC REJECTION: Toda falla de credenciales responde el mismo
 *    401 sin matices; el detalle vive en el rastro forense.
 * =================================================================
 */

use axum::extract::{Extension, Json, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use tracing::{info, instrument, warn};
use ulid::Ulid;

use crate::errors::ApiError;
use crate::middleware::{AuthContext, ClientNetworkOrigin};
use crate::state::AppState;
use panoptes_core_crypto::password::{hash_password, verify_password};
use panoptes_core_crypto::tokens::{
    mint_refresh_material, refresh_material_digest, ACCESS_TOKEN_TTL_SECONDS, REFRESH_TOKEN_TTL_DAYS,
};
use panoptes_domain_models::user::{CompleteResetPayload, LoginPayload};
use panoptes_domain_models::{AuditEvent, AuditResult, Tenant};
use panoptes_infra_kv::{RateScope, SessionRecord};

/// Nombre de la cookie de refresco.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
/// Path de la cookie de refresco (solo el protocolo de autenticación).
const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";
/// Longitud mínima aceptada para contraseñas nuevas.
const MINIMUM_PASSWORD_LENGTH: usize = 8;

fn build_refresh_cookie(opaque_material: &str, max_age_seconds: i64) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!(
        "{}={}; Path={}; Max-Age={}; HttpOnly; Secure; SameSite=Strict",
        REFRESH_COOKIE_NAME, opaque_material, REFRESH_COOKIE_PATH, max_age_seconds
    )).map_err(|render_fault| ApiError::Internal(render_fault.to_string()))
}

fn record_auth_evidence(
    state: &AppState,
    tenant: Option<&Tenant>,
    email: &str,
    origin: Option<&ClientNetworkOrigin>,
    result: AuditResult,
    reason_code: &str,
) {
    let mut evidence = AuditEvent::now("auth.login", result)
        .with_target("user", email.to_lowercase())
        .with_reason(reason_code);
    if let Some(resolved_tenant) = tenant {
        evidence.tenant_id = Some(resolved_tenant.id);
    }
    if let Some(network_origin) = origin {
        evidence.ip_address = Some(network_origin.0.clone());
    }
    if let Err(evidence_fault) = state.audit_pipeline.record(evidence) {
        warn!("❌ [AUTH_EVIDENCE]: Login trace lost: {}", evidence_fault);
    }
}

/// Ráfaga por endpoint público, con la IP hasheada como principal.
fn enforce_endpoint_burst(
    state: &AppState,
    origin: Option<&ClientNetworkOrigin>,
    endpoint_name: &str,
) -> Result<(), ApiError> {
    let origin_principal = origin
        .map(|network_origin| state.rate_limiter.hash_ip_principal(&network_origin.0))
        .unwrap_or_else(|| "unresolved".to_string());

    let admission = state.rate_limiter
        .check(RateScope::PerEndpoint, &origin_principal, Some(endpoint_name));
    if !admission.allowed {
        return Err(ApiError::RateLimited {
            reason_code: RateScope::PerEndpoint.reason_code(),
            retry_after: admission.retry_after,
        });
    }
    Ok(())
}

/**
 * Resolución determinista del tenant: hint de slug explícito, o el
 * dominio del correo. Cero coincidencias => rechazo genérico; más de
 * una => ambigüedad (400).
 */
async fn resolve_login_tenant(
    state: &AppState,
    email: &str,
    tenant_hint: Option<&str>,
) -> Result<Tenant, ApiError> {
    if let Some(hinted_slug) = tenant_hint {
        return state.tenant_repository
            .find_by_slug(hinted_slug)
            .await?
            .ok_or(ApiError::AuthFailed);
    }

    let email_domain = email.rsplit_once('@')
        .map(|(_, domain)| domain)
        .ok_or_else(|| ApiError::Validation("EMAIL_MALFORMED".into()))?;

    let mut domain_matches = state.tenant_repository.find_by_email_domain(email_domain).await?;
    match domain_matches.len() {
        0 => Err(ApiError::AuthFailed),
        1 => Ok(domain_matches.remove(0)),
        _ => Err(ApiError::Validation("TENANT_RESOLUTION_AMBIGUOUS".into())),
    }
}

/**
 * Endpoint: POST /api/v1/auth/login
 */
#[instrument(skip_all, fields(email = %payload.email))]
pub async fn handle_login(
    State(state): State<AppState>,
    origin: Option<Extension<ClientNetworkOrigin>>,
    Json(payload): Json<LoginPayload>,
) -> Result<Response, ApiError> {
    let network_origin = origin.map(|Extension(resolved)| resolved);
    let normalized_email = payload.email.to_lowercase();

    // 1. RESOLUCIÓN DE TENANT (determinista)
    let tenant = resolve_login_tenant(&state, &normalized_email, payload.tenant_hint.as_deref()).await?;

    // 2. RÁFAGA DE LOGIN (fail-closed por identidad)
    let login_principal = format!("{}:{}", tenant.id, normalized_email);
    let admission = state.rate_limiter.check(RateScope::Login, &login_principal, None);
    if !admission.allowed {
        record_auth_evidence(&state, Some(&tenant), &normalized_email, network_origin.as_ref(),
            AuditResult::Failure, "RATE_LIMITED_LOGIN");
        return Err(ApiError::RateLimited {
            reason_code: RateScope::Login.reason_code(),
            retry_after: admission.retry_after,
        });
    }

    // 3. BANDERA DE LOCKOUT (sin incremento de contador)
    if state.lockout_sentinel.is_locked(&tenant.id, &normalized_email)? {
        record_auth_evidence(&state, Some(&tenant), &normalized_email, network_origin.as_ref(),
            AuditResult::Failure, "LOCKED_OUT");
        return Err(ApiError::LockedOut);
    }

    // 4. VERIFICACIÓN DE CREDENCIALES (rechazo uniforme)
    let operator = state.user_repository.find_active_by_email(&tenant.id, &normalized_email).await?;

    let authenticated_operator = match operator {
        Some(candidate) if candidate.is_login_capable()
            && verify_password(&payload.password, &candidate.password_hash) => candidate,
        _ => {
            let verdict = state.lockout_sentinel.register_failure(&tenant.id, &normalized_email)?;
            let reason_code = if verdict.locked { "LOCKED_OUT" } else { "AUTH_FAILED" };
            record_auth_evidence(&state, Some(&tenant), &normalized_email, network_origin.as_ref(),
                AuditResult::Failure, reason_code);
            return Err(ApiError::AuthFailed);
        }
    };

    state.lockout_sentinel.clear_failures(&tenant.id, &normalized_email)?;

    // 5. SESIÓN + DESALOJO DE EXCEDENTES (las familias desalojadas mueren)
    let session_identifier = Ulid::new().to_string();
    let evicted_sessions = state.session_store.create_session(&SessionRecord {
        session_id: session_identifier.clone(),
        user_id: authenticated_operator.id,
        tenant_id: tenant.id,
        created_at: Utc::now(),
    })?;
    for evicted_session in &evicted_sessions {
        let _ = state.refresh_repository.revoke_by_session(evicted_session).await;
    }

    // 6. EMISIÓN DUAL: ACCESO FIRMADO + REFRESCO OPACO
    let issued_access = state.token_authority
        .issue_access_token(&tenant.id, &authenticated_operator.id, Utc::now())?;

    let refresh_material = mint_refresh_material();
    let refresh_expiry = Utc::now() + ChronoDuration::days(REFRESH_TOKEN_TTL_DAYS);
    state.refresh_repository.create_family_root(
        &tenant.id,
        &authenticated_operator.id,
        &session_identifier,
        &refresh_material_digest(&refresh_material),
        refresh_expiry,
    ).await?;

    record_auth_evidence(&state, Some(&tenant), &normalized_email, network_origin.as_ref(),
        AuditResult::Success, "LOGIN_OK");
    info!("🔓 [LOGIN]: Operator [{}] opened session [{}].", authenticated_operator.id, session_identifier);

    let mut response = (StatusCode::OK, Json(json!({
        "access_token": issued_access.token,
        "expires_in": ACCESS_TOKEN_TTL_SECONDS,
    }))).into_response();

    response.headers_mut().append(
        header::SET_COOKIE,
        build_refresh_cookie(&refresh_material, REFRESH_TOKEN_TTL_DAYS * 24 * 3600)?,
    );
    Ok(response)
}

/**
 * Endpoint: POST /api/v1/auth/refresh
 *
 * # Invariante de reuso:
 * Presentar una hoja ya usada incinera la familia completa y purga
 * todas las sesiones del operador propietario.
 */
#[instrument(skip_all)]
pub async fn handle_refresh(
    State(state): State<AppState>,
    origin: Option<Extension<ClientNetworkOrigin>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    enforce_endpoint_burst(&state, origin.as_ref().map(|Extension(o)| o), "auth.refresh")?;

    let presented_material = jar.get(REFRESH_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .ok_or(ApiError::AuthFailed)?;

    let presented_row = state.refresh_repository
        .find_by_digest(&refresh_material_digest(&presented_material))
        .await?
        .ok_or(ApiError::AuthFailed)?;

    let now = Utc::now();

    // 1. DETECCIÓN DE REUSO: hoja ya sellada => incineración total.
    if presented_row.used_at.is_some() {
        warn!("🔥 [REFRESH_REUSE]: Burned leaf presented for family [{}].", presented_row.family_id);
        state.refresh_repository.revoke_family(&presented_row.family_id).await?;
        let purged_sessions = state.session_store.revoke_all_user_sessions(&presented_row.user_id)?;

        let mut reuse_evidence = AuditEvent::now("auth.refresh", AuditResult::Failure)
            .with_tenant(presented_row.tenant_id)
            .with_actor(presented_row.user_id)
            .with_reason("REFRESH_REUSED")
            .with_target("refresh_family", presented_row.family_id.to_string());
        reuse_evidence.target_id = Some(format!("{}(purged_sessions={})", presented_row.family_id, purged_sessions));
        let _ = state.audit_pipeline.record(reuse_evidence);

        return Err(ApiError::RefreshReused);
    }

    // 2. FAMILIA YA INCINERADA O HOJA VENCIDA
    if presented_row.revoked || !presented_row.is_active_leaf(now) {
        return Err(ApiError::AuthFailed);
    }

    // 3. ROTACIÓN ATÓMICA (un perdedor concurrente equivale a reuso)
    let successor_material = mint_refresh_material();
    let successor_expiry = now + ChronoDuration::days(REFRESH_TOKEN_TTL_DAYS);

    let rotation_outcome = state.refresh_repository.rotate_leaf(
        &presented_row,
        &refresh_material_digest(&successor_material),
        successor_expiry,
    ).await;

    if let Err(rotation_fault) = rotation_outcome {
        if matches!(rotation_fault, panoptes_infra_db::DbError::InvalidState) {
            state.refresh_repository.revoke_family(&presented_row.family_id).await?;
            state.session_store.revoke_all_user_sessions(&presented_row.user_id)?;
            return Err(ApiError::RefreshReused);
        }
        return Err(rotation_fault.into());
    }

    // 4. ACCESO FRESCO
    let issued_access = state.token_authority
        .issue_access_token(&presented_row.tenant_id, &presented_row.user_id, now)?;

    let mut response = (StatusCode::OK, Json(json!({
        "access_token": issued_access.token,
        "expires_in": ACCESS_TOKEN_TTL_SECONDS,
    }))).into_response();

    response.headers_mut().append(
        header::SET_COOKIE,
        build_refresh_cookie(&successor_material, REFRESH_TOKEN_TTL_DAYS * 24 * 3600)?,
    );
    Ok(response)
}

/**
 * Endpoint: POST /api/v1/auth/logout
 */
#[instrument(skip_all, fields(operator = %context.user_id))]
pub async fn handle_logout(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    // 1. REVOCACIÓN DEL ACCESO VIGENTE (TTL = vida restante)
    let remaining_lifetime = (context.expires_at - Utc::now())
        .to_std()
        .unwrap_or_default();
    state.revocation_registry.revoke(&context.tenant_id, &context.jti, remaining_lifetime)?;

    // 2. INCINERACIÓN DEL REFRESCO VIGENTE (si la cookie viaja)
    if let Some(refresh_cookie) = jar.get(REFRESH_COOKIE_NAME) {
        let presented_digest = refresh_material_digest(refresh_cookie.value());
        if let Some(refresh_row) = state.refresh_repository.find_by_digest(&presented_digest).await? {
            if refresh_row.user_id == context.user_id {
                state.refresh_repository.revoke_family(&refresh_row.family_id).await?;
                state.session_store.revoke_session(&context.user_id, &refresh_row.session_id)?;
            }
        }
    }

    let logout_evidence = AuditEvent::now("auth.logout", AuditResult::Success)
        .with_tenant(context.tenant_id)
        .with_actor(context.user_id)
        .with_target("token", context.jti.clone());
    let _ = state.audit_pipeline.record(logout_evidence);

    info!("🔒 [LOGOUT]: Operator [{}] sealed jti [{}].", context.user_id, context.jti);

    let mut response = (StatusCode::OK, Json(json!({ "status": "logged_out" }))).into_response();
    response.headers_mut().append(header::SET_COOKIE, build_refresh_cookie("", 0)?);
    Ok(response)
}

/**
 * Endpoint: POST /api/v1/auth/complete-reset
 *
 * Consume un token de reinicio de uso único (almacenado hasheado),
 * rota el material Argon2id y purga todas las sesiones del operador.
 */
#[instrument(skip_all)]
pub async fn handle_complete_reset(
    State(state): State<AppState>,
    origin: Option<Extension<ClientNetworkOrigin>>,
    Json(payload): Json<CompleteResetPayload>,
) -> Result<Response, ApiError> {
    enforce_endpoint_burst(&state, origin.as_ref().map(|Extension(o)| o), "auth.complete_reset")?;

    if payload.new_password.len() < MINIMUM_PASSWORD_LENGTH {
        return Err(ApiError::Validation("PASSWORD_TOO_SHORT".into()));
    }

    let (tenant_id, user_id) = state.reset_repository
        .consume_reset_token(&refresh_material_digest(&payload.token))
        .await?
        .ok_or(ApiError::AuthFailed)?;

    let fresh_password_hash = hash_password(&payload.new_password)?;
    state.user_repository.update_password_hash(&tenant_id, &user_id, &fresh_password_hash).await?;

    // Purga total: sesiones vivas y familias de refresco asociadas.
    for live_session in state.session_store.list_user_sessions(&user_id)? {
        let _ = state.refresh_repository.revoke_by_session(&live_session).await;
    }
    state.session_store.revoke_all_user_sessions(&user_id)?;

    let reset_evidence = AuditEvent::now("auth.password_reset_complete", AuditResult::Success)
        .with_tenant(tenant_id)
        .with_actor(user_id)
        .with_target("user", user_id.to_string());
    let _ = state.audit_pipeline.record(reset_evidence);

    Ok((StatusCode::OK, Json(json!({ "status": "password_rotated" }))).into_response())
}
