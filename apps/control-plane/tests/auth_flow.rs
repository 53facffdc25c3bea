// [apps/control-plane/tests/auth_flow.rs]
/**
 * =================================================================
 * APARATO: AUTHENTICATION FLOW TEST (V3.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar login + acceso + logout, rotación de refresco
 *           con detección de reuso, lockout y enmascaramiento 404.
 * =================================================================
 */

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{bearer, body_json, dispatch, extract_cookie, ignite_harness, login, ADMIN_PASSWORD};

#[tokio::test]
async fn certify_login_access_logout_flow() {
    let harness = ignite_harness("login_flow").await;

    // 1. LOGIN: 200 con access en el cuerpo y refresco en cookie
    let (access_token, _refresh_cookie) = login(&harness.router, "admin@t1.example", ADMIN_PASSWORD).await;

    // 2. ACCESO: el espejo de identidad refleja tenant y operador
    let me_response = dispatch(&harness.router, bearer(
        Request::builder().method("GET").uri("/protected/debug/me"),
        &access_token,
    ).body(Body::empty()).unwrap()).await;
    assert_eq!(me_response.status(), StatusCode::OK);

    let me_body = body_json(me_response).await;
    assert_eq!(me_body["tenant_id"], harness.tenant.id.to_string());
    assert_eq!(me_body["user_id"], harness.admin.id.to_string());

    // 3. LOGOUT: sella el jti en la bóveda de revocación
    let logout_response = dispatch(&harness.router, bearer(
        Request::builder().method("POST").uri("/api/v1/auth/logout"),
        &access_token,
    ).body(Body::empty()).unwrap()).await;
    assert_eq!(logout_response.status(), StatusCode::OK);

    // 4. EL MISMO ACCESO MUERE: 401 inmediato
    let replay_response = dispatch(&harness.router, bearer(
        Request::builder().method("GET").uri("/protected/debug/me"),
        &access_token,
    ).body(Body::empty()).unwrap()).await;
    assert_eq!(replay_response.status(), StatusCode::UNAUTHORIZED);

    println!("✅ AUTH: Login/access/logout flow certified.");
}

#[tokio::test]
async fn certify_refresh_rotation_and_reuse_detection() {
    let harness = ignite_harness("refresh_reuse").await;

    // 1. LOGIN: la raíz de la familia es RT1
    let (_access, rt1_cookie) = login(&harness.router, "admin@t1.example", ADMIN_PASSWORD).await;
    assert_eq!(harness.state.session_store.list_user_sessions(&harness.admin.id).unwrap().len(), 1);

    // 2. ROTACIÓN NOMINAL: RT1 -> RT2
    let rotation_response = dispatch(&harness.router, Request::builder()
        .method("POST")
        .uri("/api/v1/auth/refresh")
        .header(header::COOKIE, format!("refresh_token={}", rt1_cookie))
        .body(Body::empty()).unwrap()).await;
    assert_eq!(rotation_response.status(), StatusCode::OK);

    let rt2_cookie = extract_cookie(&rotation_response, "refresh_token")
        .expect("La rotación debe acuñar RT2");
    assert_ne!(rt1_cookie, rt2_cookie);

    // 3. REUSO: presentar RT1 de nuevo incinera la familia y las sesiones
    let reuse_response = dispatch(&harness.router, Request::builder()
        .method("POST")
        .uri("/api/v1/auth/refresh")
        .header(header::COOKIE, format!("refresh_token={}", rt1_cookie))
        .body(Body::empty()).unwrap()).await;
    assert_eq!(reuse_response.status(), StatusCode::UNAUTHORIZED);

    let sessions_after_reuse = harness.state.session_store
        .list_user_sessions(&harness.admin.id).unwrap();
    assert!(sessions_after_reuse.is_empty(), "El reuso purga toda sesión del operador");

    // 4. RT2 TAMBIÉN MUERE: la familia completa quedó revocada
    let rt2_response = dispatch(&harness.router, Request::builder()
        .method("POST")
        .uri("/api/v1/auth/refresh")
        .header(header::COOKIE, format!("refresh_token={}", rt2_cookie))
        .body(Body::empty()).unwrap()).await;
    assert_eq!(rt2_response.status(), StatusCode::UNAUTHORIZED);

    println!("✅ AUTH: Refresh reuse incineration certified.");
}

#[tokio::test]
async fn certify_lockout_seals_after_threshold() {
    let harness = ignite_harness("lockout").await;

    // 1. CINCO FALLOS: el quinto sella la bandera
    for _ in 0..5 {
        let failed = dispatch(&harness.router, Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"email":"admin@t1.example","password":"wrong"}"#)).unwrap()).await;
        assert_eq!(failed.status(), StatusCode::UNAUTHORIZED);
    }

    // 2. CON LA BANDERA SELLADA: 423 incluso con la contraseña correcta
    let locked = dispatch(&harness.router, Request::builder()
        .method("POST")
        .uri("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(format!(r#"{{"email":"admin@t1.example","password":"{}"}}"#, ADMIN_PASSWORD))).unwrap()).await;
    assert_eq!(locked.status(), StatusCode::LOCKED);

    let locked_body = body_json(locked).await;
    assert_eq!(locked_body["code"], "LOCKED_OUT");
    println!("✅ AUTH: Lockout sealing certified.");
}

#[tokio::test]
async fn certify_cross_tenant_masking_as_not_found() {
    let harness = ignite_harness("masking").await;

    // 1. UN SEGUNDO TENANT CON SU PROPIO OPERADOR
    let foreign_tenant = harness.state.tenant_repository
        .create_tenant("t2", "Tenant Two", "t2.example").await.unwrap();
    let foreign_operator = harness.state.user_repository.create_user(
        &foreign_tenant.id,
        "ops@t2.example",
        "Foreign Ops",
        "$argon2id$irrelevant",
    ).await.unwrap();

    // 2. EL ADMIN DE T1 PIDE UN RECURSO REAL DE T2: 404, jamás 403
    let (access_token, _) = login(&harness.router, "admin@t1.example", ADMIN_PASSWORD).await;

    let masked_response = dispatch(&harness.router, bearer(
        Request::builder().method("GET").uri(format!("/api/v1/users/{}", foreign_operator.id)),
        &access_token,
    ).body(Body::empty()).unwrap()).await;

    assert_eq!(masked_response.status(), StatusCode::NOT_FOUND);
    let masked_body = body_json(masked_response).await;
    assert_eq!(masked_body["code"], "NOT_FOUND");

    println!("✅ AUTH: Cross-tenant masking certified.");
}

#[tokio::test]
async fn certify_error_body_carries_request_id() {
    let harness = ignite_harness("request_id").await;

    let rejected = dispatch(&harness.router, Request::builder()
        .method("GET")
        .uri("/protected/debug/me")
        .body(Body::empty()).unwrap()).await;
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

    let rejected_body = body_json(rejected).await;
    assert_eq!(rejected_body["code"], "AUTH_FAILED");
    assert!(rejected_body["request_id"].is_string(), "El request_id debe viajar en el cuerpo de error");
}
