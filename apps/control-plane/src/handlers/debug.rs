// [apps/control-plane/src/handlers/debug.rs]
/*!
 * =================================================================
 * APARATO: PRINCIPAL ECHO HANDLER (V3.0)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ESPEJO DEL AuthContext PARA VERIFICACIÓN E2E
 * =================================================================
 */

use axum::extract::Extension;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::middleware::AuthContext;

/**
 * Endpoint: GET /protected/debug/me
 * Devuelve la identidad inyectada por la guardia perimetral.
 */
pub async fn handle_debug_me(Extension(context): Extension<AuthContext>) -> Response {
    Json(json!({
        "user_id": context.user_id,
        "tenant_id": context.tenant_id,
        "jti": context.jti,
    })).into_response()
}
