// [apps/control-plane/src/handlers/users.rs]
/*!
 * =================================================================
 * APARATO: USER GOVERNANCE HANDLER (V16.0 - ESCALATION SHIELD)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CRUD DE OPERADORES, ROLES Y PROTOCOLO DE REINICIO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SELF-PRESERVATION: Un principal jamás se deshabilita a sí mismo.
 * 2. ESCALATION SHIELD: Nadie liga roles a un alcance que no posea con
 *    rango igual o superior para cada permiso que el rol otorga.
 * 3. LICENSE GATE: Las escrituras restringidas consultan el centinela
 *    de licencia antes de tocar la persistencia.
 * =================================================================
 */

use axum::extract::{Extension, Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;
use panoptes_core_crypto::password::hash_password;
use panoptes_core_crypto::tokens::{mint_refresh_material, refresh_material_digest};
use panoptes_domain_models::pagination::{decode_page_token, encode_page_token, PageRequest};
use panoptes_domain_models::rbac::{permissions, Grant, ScopeType};
use panoptes_domain_models::user::CreateUserPayload;
use panoptes_domain_models::{AuditEvent, AuditResult};

/// Vida de un token de reinicio de contraseña.
const RESET_TOKEN_TTL_HOURS: i64 = 1;

fn record_user_evidence(
    state: &AppState,
    context: &AuthContext,
    action: &str,
    target_user: &str,
    result: AuditResult,
    reason_code: Option<&str>,
) {
    let mut evidence = AuditEvent::now(action, result)
        .with_tenant(context.tenant_id)
        .with_actor(context.user_id)
        .with_target("user", target_user);
    if let Some(reason) = reason_code {
        evidence.reason_code = Some(reason.to_string());
    }
    if let Err(evidence_fault) = state.audit_pipeline.record(evidence) {
        warn!("❌ [USER_EVIDENCE]: Governance trace lost: {}", evidence_fault);
    }
}

fn license_gate(state: &AppState, action: &'static str) -> Result<(), ApiError> {
    state.license_sentinel.authorize_write(action)
        .map_err(ApiError::LicenseRestricted)
}

/**
 * Endpoint: POST /api/v1/users
 */
#[instrument(skip_all, fields(email = %payload.email))]
pub async fn handle_create_user(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<CreateUserPayload>,
) -> Result<Response, ApiError> {
    state.authorize_tenant_permission(&context, permissions::USER_MANAGE).await?;
    license_gate(&state, "user.create")?;

    if !payload.email.contains('@') {
        return Err(ApiError::Validation("EMAIL_MALFORMED".into()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::Validation("PASSWORD_TOO_SHORT".into()));
    }

    let password_hash = hash_password(&payload.password)?;
    let forged_operator = state.user_repository
        .create_user(&context.tenant_id, &payload.email, &payload.display_name, &password_hash)
        .await?;

    record_user_evidence(&state, &context, "user.create", &forged_operator.id.to_string(),
        AuditResult::Success, None);

    Ok((StatusCode::CREATED, Json(forged_operator)).into_response())
}

/**
 * Endpoint: GET /api/v1/users/{id}
 * El propio operador siempre puede leerse; leer a terceros exige
 * 'user.manage'.
 */
#[instrument(skip_all)]
pub async fn handle_get_user(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    if user_id != context.user_id {
        state.authorize_tenant_permission(&context, permissions::USER_MANAGE).await?;
    }

    let operator = state.user_repository
        .find_by_id(&context.tenant_id, &user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(operator).into_response())
}

/**
 * Endpoint: GET /api/v1/users (paginación por cursor)
 */
#[instrument(skip_all)]
pub async fn handle_list_users(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Query(page): Query<PageRequest>,
) -> Result<Response, ApiError> {
    state.authorize_tenant_permission(&context, permissions::USER_MANAGE).await?;

    let cursor = match &page.page_token {
        Some(opaque_token) => Some(
            decode_page_token(opaque_token)
                .ok_or_else(|| ApiError::Validation("PAGE_TOKEN_MALFORMED".into()))?,
        ),
        None => None,
    };

    let page_size = page.effective_size();
    let operators = state.user_repository
        .list_users(&context.tenant_id, cursor.as_ref(), page_size)
        .await?;

    let next_page_token = if operators.len() == page_size as usize {
        operators.last().map(|last_row| encode_page_token(&last_row.created_at, &last_row.id))
    } else {
        None
    };

    Ok(Json(json!({ "users": operators, "next_page_token": next_page_token })).into_response())
}

/**
 * Endpoint: POST /api/v1/users/{id}/disable
 */
#[instrument(skip_all)]
pub async fn handle_disable_user(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.authorize_tenant_permission(&context, permissions::USER_MANAGE).await?;
    license_gate(&state, "user.disable")?;

    // Auto-preservación: el principal jamás se corta su propio acceso.
    if user_id == context.user_id {
        record_user_evidence(&state, &context, "user.disable", &user_id.to_string(),
            AuditResult::Failure, Some("VALIDATION"));
        return Err(ApiError::Validation("SELF_DISABLE_FORBIDDEN".into()));
    }

    state.user_repository.disable_user(&context.tenant_id, &user_id).await?;

    // Las sesiones vivas del deshabilitado mueren de inmediato.
    for live_session in state.session_store.list_user_sessions(&user_id)? {
        let _ = state.refresh_repository.revoke_by_session(&live_session).await;
    }
    state.session_store.revoke_all_user_sessions(&user_id)?;

    record_user_evidence(&state, &context, "user.disable", &user_id.to_string(),
        AuditResult::Success, None);
    info!("🚷 [GOVERNANCE]: Operator [{}] disabled by [{}].", user_id, context.user_id);

    Ok((StatusCode::OK, Json(json!({ "status": "disabled" }))).into_response())
}

/**
 * Endpoint: POST /api/v1/users/{id}/reset-password
 * Acuña un token de reinicio de uso único (el material viaja UNA vez
 * en la respuesta; en reposo solo vive su digest).
 */
#[instrument(skip_all)]
pub async fn handle_initiate_reset(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.authorize_tenant_permission(&context, permissions::USER_MANAGE).await?;

    let target_operator = state.user_repository
        .find_by_id(&context.tenant_id, &user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let reset_material = mint_refresh_material();
    state.reset_repository.create_reset_token(
        &context.tenant_id,
        &target_operator.id,
        &refresh_material_digest(&reset_material),
        Utc::now() + ChronoDuration::hours(RESET_TOKEN_TTL_HOURS),
    ).await?;

    record_user_evidence(&state, &context, "user.password_reset_initiate",
        &target_operator.id.to_string(), AuditResult::Success, None);

    Ok((StatusCode::CREATED, Json(json!({
        "reset_token": reset_material,
        "expires_in": RESET_TOKEN_TTL_HOURS * 3600,
    }))).into_response())
}

/// Payload de ligadura de roles.
#[derive(Debug, Deserialize)]
pub struct AssignRolesPayload {
    pub grants: Vec<GrantPayload>,
}

#[derive(Debug, Deserialize)]
pub struct GrantPayload {
    pub role_id: Uuid,
    pub scope_type: ScopeType,
    pub scope_id: Option<Uuid>,
}

/**
 * Endpoint: PUT /api/v1/users/{id}/roles
 *
 * # Escalation Shield:
 * Para cada permiso que otorga cada rol ligado, el principal debe
 * poseer ese permiso con rango de alcance igual o superior al rango
 * del grant solicitado.
 */
#[instrument(skip_all)]
pub async fn handle_assign_roles(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<AssignRolesPayload>,
) -> Result<Response, ApiError> {
    state.authorize_tenant_permission(&context, permissions::USER_MANAGE).await?;
    license_gate(&state, "user.role.assign")?;

    let target_operator = state.user_repository
        .find_by_id(&context.tenant_id, &user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let principal_lens = state.permission_lens(&context.tenant_id, &context.user_id).await?;

    let mut validated_grants = Vec::with_capacity(payload.grants.len());
    for requested_grant in &payload.grants {
        // 1. Coherencia alcance/scope_id
        if requested_grant.scope_type != ScopeType::Tenant && requested_grant.scope_id.is_none() {
            return Err(ApiError::Validation("SCOPE_ID_REQUIRED".into()));
        }

        // 2. El rol debe existir para este tenant
        if !state.rbac_repository.role_exists_for_tenant(&requested_grant.role_id, &context.tenant_id).await? {
            return Err(ApiError::Validation("ROLE_UNKNOWN".into()));
        }

        // 3. Escudo anti-escalación permiso a permiso
        let granted_permissions = state.rbac_repository
            .role_permission_names(&requested_grant.role_id)
            .await?;
        for granted_permission in &granted_permissions {
            if principal_lens.highest_rank_for(granted_permission) < requested_grant.scope_type.rank() {
                record_user_evidence(&state, &context, "user.role.assign", &user_id.to_string(),
                    AuditResult::Failure, Some("FORBIDDEN"));
                warn!(
                    "🛡️ [ESCALATION_SHIELD]: [{}] attempted to grant [{}] beyond own rank.",
                    context.user_id, granted_permission
                );
                return Err(ApiError::Forbidden);
            }
        }

        validated_grants.push(Grant {
            role_id: requested_grant.role_id,
            scope_type: requested_grant.scope_type,
            scope_id: requested_grant.scope_id,
        });
    }

    state.rbac_repository.replace_user_grants(&target_operator.id, &validated_grants).await?;
    state.invalidate_permission_lens(&context.tenant_id, &target_operator.id);

    record_user_evidence(&state, &context, "user.role.assign", &target_operator.id.to_string(),
        AuditResult::Success, None);

    Ok((StatusCode::OK, Json(json!({ "status": "roles_sealed", "grants": validated_grants.len() }))).into_response())
}
