// [apps/control-plane/src/routes.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ROUTING MATRIX (V19.0 - FRONTDOOR CHAIN)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA HTTP Y ORDEN DE LA CADENA PERIMETRAL
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LOAD-BEARING ORDER: request-id -> rastro de error -> real-ip ->
 *    recoverer -> timeout -> CORS -> limitador global -> intención de
 *    auditoría -> mux -> auth -> guardias -> handler.
 * 2. COOKIE-AWARE CORS: Con orígenes explícitos se habilitan las
 *    credenciales (cookies de refresco y de sesión HLS); con lista
 *    vacía se degrada a Any SIN credenciales (laboratorio).
 * =================================================================
 */

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{audit, auth, cameras, debug, hls, license, live, users};
use crate::middleware::{audit_intent_guard, auth_guard, finalize_error_trace, global_ip_limiter, real_ip_resolver};
use crate::state::AppState;

/// Techo de vida de una petición completa.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn build_cors_shield(allowed_origins: &[String]) -> CorsLayer {
    let base_shield = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::RANGE])
        .max_age(Duration::from_secs(3600));

    if allowed_origins.is_empty() {
        // Modo laboratorio: sin orígenes declarados no hay credenciales.
        return base_shield.allow_origin(Any);
    }

    let declared_origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    base_shield
        .allow_origin(declared_origins)
        .allow_credentials(true)
}

pub fn create_control_plane_router(application_shared_state: AppState) -> Router {
    // ESTRATO PÚBLICO DE AUTENTICACIÓN (sin bearer previo)
    let authentication_public_stratum = Router::new()
        .route("/login", post(auth::handle_login))
        .route("/refresh", post(auth::handle_refresh))
        .route("/complete-reset", post(auth::handle_complete_reset));

    // Logout exige un bearer vigente
    let authentication_protected_stratum = Router::new()
        .route("/logout", post(auth::handle_logout))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), auth_guard));

    // ESTRATO GOBERNADO: gestión, licencia, auditoría y visión en vivo
    let governed_stratum = Router::new()
        .route("/users", post(users::handle_create_user).get(users::handle_list_users))
        .route("/users/:id", get(users::handle_get_user))
        .route("/users/:id/disable", post(users::handle_disable_user))
        .route("/users/:id/reset-password", post(users::handle_initiate_reset))
        .route("/users/:id/roles", put(users::handle_assign_roles))
        .route("/license/status", get(license::handle_license_status))
        .route("/license/reload", post(license::handle_license_reload))
        .route("/audit/events", get(audit::handle_list_events))
        .route("/audit/exports", get(audit::handle_list_exports))
        .route("/cameras/:id/status", get(cameras::handle_camera_status))
        .route("/cameras/:id/live/start", post(live::handle_live_start))
        .route("/live/events", post(live::handle_client_telemetry))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), auth_guard));

    let api_v1_stratum = Router::new()
        .nest("/auth", authentication_public_stratum.merge(authentication_protected_stratum))
        .merge(governed_stratum);

    // GATEKEEPER HLS (bearer + token/cookie propios)
    let hls_gateway_stratum = Router::new()
        .route("/hls/live/:tenant/:camera/:session/:file", get(hls::handle_hls_delivery))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), auth_guard));

    // ESPEJO DE IDENTIDAD (verificación extremo a extremo)
    let debug_stratum = Router::new()
        .route("/protected/debug/me", get(debug::handle_debug_me))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), auth_guard));

    // CADENA PERIMETRAL (el orden es load-bearing)
    let perimeter_chain = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(middleware::from_fn(finalize_error_trace))
        .layer(middleware::from_fn(real_ip_resolver))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(build_cors_shield(&application_shared_state.config.allowed_origins))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), global_ip_limiter))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), audit_intent_guard));

    // COMPOSICIÓN GLOBAL (Root Topology)
    Router::new()
        .route("/health", get(|| async { "STATUS_OK" }))
        .nest("/api/v1", api_v1_stratum)
        .merge(hls_gateway_stratum)
        .merge(debug_stratum)
        .layer(perimeter_chain)
        .with_state(application_shared_state)
}
