// [apps/control-plane/tests/live_dispatch.rs]
/**
 * =================================================================
 * APARATO: LIVE DISPATCH & FRONTDOOR TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar la ingesta de telemetría, el triaje de upstream
 *           caído y la ráfaga de login en el frontdoor.
 * =================================================================
 */

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{bearer, body_json, dispatch, ignite_harness, login, ADMIN_PASSWORD};

#[tokio::test]
async fn certify_client_telemetry_ingestion() {
    let harness = ignite_harness("telemetry").await;
    let (access_token, _) = login(&harness.router, "admin@t1.example", ADMIN_PASSWORD).await;

    // 1. EVENTO NOMINAL DEL REPRODUCTOR: 202 y rastro en el pipeline
    let accepted = dispatch(&harness.router, bearer(
        Request::builder()
            .method("POST")
            .uri("/api/v1/live/events")
            .header(header::CONTENT_TYPE, "application/json"),
        &access_token,
    ).body(Body::from(
        r#"{"viewer_session_id":"01J0VIEWER","event_type":"webrtc_connect_timeout",
           "reason_code":"ICE_TIMEOUT","ttff_ms":5200,"mode":"webrtc","ts_unix_ms":1700000000000}"#
    )).unwrap()).await;
    assert_eq!(accepted.status(), StatusCode::ACCEPTED);

    // 2. TELEMETRÍA MUTILADA: 400 VALIDATION
    let rejected = dispatch(&harness.router, bearer(
        Request::builder()
            .method("POST")
            .uri("/api/v1/live/events")
            .header(header::CONTENT_TYPE, "application/json"),
        &access_token,
    ).body(Body::from(
        r#"{"viewer_session_id":"","event_type":"","ts_unix_ms":0}"#
    )).unwrap()).await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    println!("✅ LIVE: Telemetry ingestion certified.");
}

#[tokio::test]
async fn certify_dead_media_plane_yields_upstream_fault() {
    let harness = ignite_harness("dead_media").await;
    let (access_token, _) = login(&harness.router, "admin@t1.example", ADMIN_PASSWORD).await;

    // Cámara legítima, pero el plano de medios del harness apunta a un
    // puerto muerto: la ignición de ingesta debe colapsar con triaje
    // UPSTREAM_MEDIA, jamás con pánico.
    let site = harness.state.camera_repository
        .create_site(&harness.tenant.id, "Lobby").await.unwrap();
    let camera = harness.state.camera_repository
        .create_camera(&harness.tenant.id, &site.id, "Door", Some("rtsp://10.0.0.5/stream")).await.unwrap();

    let collapsed = dispatch(&harness.router, bearer(
        Request::builder()
            .method("POST")
            .uri(format!("/api/v1/cameras/{}/live/start", camera.id)),
        &access_token,
    ).body(Body::empty()).unwrap()).await;

    assert_eq!(collapsed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(collapsed).await["code"], "UPSTREAM_MEDIA");

    // Cámara inexistente: enmascarada como 404 antes de tocar upstream.
    let masked = dispatch(&harness.router, bearer(
        Request::builder()
            .method("POST")
            .uri(format!("/api/v1/cameras/{}/live/start", uuid::Uuid::new_v4())),
        &access_token,
    ).body(Body::empty()).unwrap()).await;
    assert_eq!(masked.status(), StatusCode::NOT_FOUND);

    println!("✅ LIVE: Dead upstream triage certified.");
}

#[tokio::test]
async fn certify_camera_status_reflects_nvr_propagation() {
    let harness = ignite_harness("camera_status").await;
    let (access_token, _) = login(&harness.router, "admin@t1.example", ADMIN_PASSWORD).await;

    // Topología: cámara enlazada a un canal cuyo NVR colapsa.
    let site = harness.state.camera_repository
        .create_site(&harness.tenant.id, "Yard").await.unwrap();
    let camera = harness.state.camera_repository
        .create_camera(&harness.tenant.id, &site.id, "Gate Cam", Some("rtsp://10.0.0.7/live")).await.unwrap();
    let recorder = harness.state.nvr_repository
        .create_nvr(&harness.tenant.id, &site.id, "NVR-A",
            panoptes_domain_models::NvrVendor::Hikvision, "10.0.0.5", 80).await.unwrap();

    harness.state.nvr_repository
        .upsert_channel(&recorder.id, "1", "Gate", Some("rtsp://10.0.0.5:554/ch1"), None).await.unwrap();
    let channel_id = harness.state.nvr_repository
        .channel_id_by_ref(&recorder.id, "1").await.unwrap().unwrap();
    harness.state.nvr_repository
        .link_channel_to_camera(&channel_id, &camera.id, "continuous").await.unwrap();

    // 1. SONDEO DIRECTO SANO + NVR UNKNOWN: manda el sondeo directo
    harness.state.camera_repository
        .update_direct_status(&camera.id, panoptes_domain_models::ChannelHealth::Online).await.unwrap();

    let healthy = dispatch(&harness.router, bearer(
        Request::builder().method("GET").uri(format!("/api/v1/cameras/{}/status", camera.id)),
        &access_token,
    ).body(Body::empty()).unwrap()).await;
    assert_eq!(healthy.status(), StatusCode::OK);
    let healthy_body = body_json(healthy).await;
    assert_eq!(healthy_body["status"], "online");
    assert!(healthy_body["reason"].is_null());

    // 2. NVR OFFLINE: la propagación fuerza offline con razón nvr_offline
    harness.state.nvr_repository
        .update_status(&recorder.id, panoptes_domain_models::NvrStatus::Offline).await.unwrap();

    let propagated = dispatch(&harness.router, bearer(
        Request::builder().method("GET").uri(format!("/api/v1/cameras/{}/status", camera.id)),
        &access_token,
    ).body(Body::empty()).unwrap()).await;
    assert_eq!(propagated.status(), StatusCode::OK);
    let propagated_body = body_json(propagated).await;
    assert_eq!(propagated_body["status"], "offline");
    assert_eq!(propagated_body["reason"], "nvr_offline");

    println!("✅ HEALTH: Effective status surface certified.");
}

#[tokio::test]
async fn certify_login_burst_hits_rate_limit() {
    let harness = ignite_harness("login_burst").await;

    // La política de login admite 10 intentos por ventana; el intento 11
    // debe rebotar 429 con Retry-After.
    let mut final_status = StatusCode::OK;
    let mut final_response = None;

    for _ in 0..11 {
        let response = dispatch(&harness.router, Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"email":"admin@t1.example","password":"wrong"}"#)).unwrap()).await;
        final_status = response.status();
        final_response = Some(response);
    }

    assert_eq!(final_status, StatusCode::TOO_MANY_REQUESTS);
    let throttled = final_response.unwrap();
    assert!(throttled.headers().contains_key("Retry-After"), "429 debe portar Retry-After");
    assert_eq!(body_json(throttled).await["code"], "RATE_LIMITED_LOGIN");

    println!("✅ FRONTDOOR: Login burst throttling certified.");
}
