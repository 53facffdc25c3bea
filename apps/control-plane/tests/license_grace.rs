// [apps/control-plane/tests/license_grace.rs]
/**
 * =================================================================
 * APARATO: LICENSE GRACE TEST (V3.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar verificación RS256, ventana de gracia de 30
 *           días, veto de escrituras restringidas y recarga en vivo.
 * =================================================================
 */

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{Duration as ChronoDuration, Utc};
use common::{bearer, body_json, dispatch, forge_signed_license, ignite_harness, login, ADMIN_PASSWORD};

#[tokio::test]
async fn certify_grace_window_and_scheduler_flip() {
    let harness = ignite_harness("grace_flip").await;

    // 1. LICENCIA VENCIDA AYER: el estado queda válido CON gracia
    let expired_yesterday = forge_signed_license(
        &rsa_private_key_of(&harness),
        Utc::now() - ChronoDuration::days(1),
    );
    std::fs::write(&harness.state.config.license_path, expired_yesterday).unwrap();

    let in_grace = harness.state.license_sentinel.reload();
    assert!(in_grace.valid && in_grace.grace);
    assert_eq!(in_grace.reason.as_deref(), Some("LICENSE_GRACE"));

    // 2. EL TICK DEL DÍA 31 VOLTEA A INVÁLIDA
    let beyond_grace = harness.state.license_sentinel
        .evaluate_at(Utc::now() + ChronoDuration::days(31));
    assert!(!beyond_grace.valid);
    assert_eq!(beyond_grace.reason.as_deref(), Some("LICENSE_EXPIRED"));

    println!("✅ LICENSE: Grace flip certified.");
}

#[tokio::test]
async fn certify_restricted_writes_rejected_under_grace() {
    let harness = ignite_harness("grace_gate").await;
    let (access_token, _) = login(&harness.router, "admin@t1.example", ADMIN_PASSWORD).await;

    // 1. BAJO GRACIA: user.create (restringida) rebota 403 LICENSE_GRACE
    std::fs::write(
        &harness.state.config.license_path,
        forge_signed_license(&rsa_private_key_of(&harness), Utc::now() - ChronoDuration::days(1)),
    ).unwrap();
    harness.state.license_sentinel.reload();

    let rejected = dispatch(&harness.router, bearer(
        Request::builder()
            .method("POST")
            .uri("/api/v1/users")
            .header(header::CONTENT_TYPE, "application/json"),
        &access_token,
    ).body(Body::from(
        r#"{"email":"new@t1.example","display_name":"New","password":"longenough"}"#
    )).unwrap()).await;

    assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(rejected).await["code"], "LICENSE_GRACE");

    // 2. LAS LECTURAS JAMÁS SE VETAN: el estado sigue consultable
    let status_response = dispatch(&harness.router, bearer(
        Request::builder().method("GET").uri("/api/v1/license/status"),
        &access_token,
    ).body(Body::empty()).unwrap()).await;
    assert_eq!(status_response.status(), StatusCode::OK);
    let status_body = body_json(status_response).await;
    assert_eq!(status_body["valid"], true);
    assert_eq!(status_body["grace"], true);

    // 3. RECARGA CON LICENCIA SANA: el veto se disuelve
    std::fs::write(
        &harness.state.config.license_path,
        forge_signed_license(&rsa_private_key_of(&harness), Utc::now() + ChronoDuration::days(365)),
    ).unwrap();

    let reload_response = dispatch(&harness.router, bearer(
        Request::builder().method("POST").uri("/api/v1/license/reload"),
        &access_token,
    ).body(Body::empty()).unwrap()).await;
    assert_eq!(reload_response.status(), StatusCode::OK);

    let accepted = dispatch(&harness.router, bearer(
        Request::builder()
            .method("POST")
            .uri("/api/v1/users")
            .header(header::CONTENT_TYPE, "application/json"),
        &access_token,
    ).body(Body::from(
        r#"{"email":"new@t1.example","display_name":"New","password":"longenough"}"#
    )).unwrap()).await;
    assert_eq!(accepted.status(), StatusCode::CREATED);

    println!("✅ LICENSE: Restricted-write gate certified.");
}

#[tokio::test]
async fn certify_tampered_signature_invalidates() {
    let harness = ignite_harness("tamper").await;

    // Payload adulterado tras la firma: la verificación RS256 rebota.
    let legitimate = forge_signed_license(&rsa_private_key_of(&harness), Utc::now() + ChronoDuration::days(30));
    let mut container: serde_json::Value = serde_json::from_str(&legitimate).unwrap();
    let tampered_payload = base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        br#"{"license_id":"forged","tenant_scope":"all","issued_at":"2020-01-01T00:00:00Z","valid_until":"2099-01-01T00:00:00Z","limits":{"max_cameras":9999,"max_nvrs":9999},"features":{}}"#,
    );
    container["payload_b64"] = serde_json::Value::String(tampered_payload);
    std::fs::write(&harness.state.config.license_path, container.to_string()).unwrap();

    let verdict = harness.state.license_sentinel.reload();
    assert!(!verdict.valid);
    assert_eq!(verdict.reason.as_deref(), Some("LICENSE_SIGNATURE_INVALID"));
    println!("✅ LICENSE: Tamper rejection certified.");
}

// --- UTILERÍA LOCAL ---

/// El centinela retiene la llave pública instalada en la ignición: toda
/// re-firma debe usar la llave privada ORIGINAL del harness.
fn rsa_private_key_of(harness: &common::TestHarness) -> rsa::RsaPrivateKey {
    harness.license_private_key.clone()
}
