// [apps/control-plane/src/handlers/audit.rs]
/*!
 * =================================================================
 * APARATO: AUDIT QUERY HANDLER (V8.0 - EVIDENCE SURFACE)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: LECTURA PAGINADA DEL RASTRO Y LISTADO DE EXPORTS
 * =================================================================
 */

use axum::extract::{Extension, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::instrument;

use crate::errors::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;
use panoptes_domain_models::pagination::{decode_page_token, encode_page_token, PageRequest};
use panoptes_domain_models::rbac::permissions;

/**
 * Endpoint: GET /api/v1/audit/events
 * Rastro del tenant del principal, más reciente primero.
 */
#[instrument(skip_all)]
pub async fn handle_list_events(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Query(page): Query<PageRequest>,
) -> Result<Response, ApiError> {
    state.authorize_tenant_permission(&context, permissions::AUDIT_READ).await?;

    let cursor = match &page.page_token {
        Some(opaque_token) => Some(
            decode_page_token(opaque_token)
                .ok_or_else(|| ApiError::Validation("PAGE_TOKEN_MALFORMED".into()))?,
        ),
        None => None,
    };

    let page_size = page.effective_size();
    let events = state.audit_repository
        .list_events(&context.tenant_id, cursor.as_ref(), page_size)
        .await?;

    let next_page_token = if events.len() == page_size as usize {
        events.last().map(|last_event| encode_page_token(&last_event.timestamp_utc, &last_event.id))
    } else {
        None
    };

    Ok(Json(json!({ "events": events, "next_page_token": next_page_token })).into_response())
}

/**
 * Endpoint: GET /api/v1/audit/exports
 * Inventario de archivos de spool/export pendientes en disco: evidencia
 * operativa de la disciplina de retención.
 */
#[instrument(skip_all)]
pub async fn handle_list_exports(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    state.authorize_tenant_permission(&context, permissions::AUDIT_READ).await?;

    let mut export_inventory = Vec::new();
    if let Ok(directory_entries) = std::fs::read_dir(&state.config.audit_spool_dir) {
        for entry in directory_entries.flatten() {
            let Ok(metadata) = entry.metadata() else { continue };
            if !metadata.is_file() {
                continue;
            }
            let modified_stamp = metadata.modified()
                .ok()
                .map(chrono::DateTime::<chrono::Utc>::from)
                .map(|modified_at| modified_at.to_rfc3339());
            export_inventory.push(json!({
                "file": entry.file_name().to_string_lossy(),
                "bytes": metadata.len(),
                "modified": modified_stamp,
            }));
        }
    }
    export_inventory.sort_by(|left, right| {
        left["file"].as_str().unwrap_or("").cmp(right["file"].as_str().unwrap_or(""))
    });

    Ok(Json(json!({ "exports": export_inventory })).into_response())
}
