// [apps/control-plane/tests/common/mod.rs]
/**
 * =================================================================
 * APARATO: END-TO-END TEST HARNESS (V3.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE SUPPORT
 * OBJETIVO: Ignición de un Plano de Control completo en memoria con
 *           licencia RS256 legítima y tenant administrado sembrado.
 * =================================================================
 */

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use chrono::{Duration as ChronoDuration, Utc};
use http_body_util::BodyExt;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use tempfile::TempDir;
use tokio::sync::watch;
use tower::util::ServiceExt;
use uuid::Uuid;

use panoptes_control_plane::config::ControlPlaneConfig;
use panoptes_control_plane::routes::create_control_plane_router;
use panoptes_control_plane::state::AppState;
use panoptes_core_crypto::keyring::MasterKeyDescriptor;
use panoptes_core_crypto::password::hash_password;
use panoptes_core_crypto::tokens::SigningKeyDescriptor;
use panoptes_domain_models::rbac::{Grant, ScopeType};
use panoptes_domain_models::{Tenant, User};
use panoptes_infra_db::schema::builtin_roles;

pub struct TestHarness {
    pub state: AppState,
    pub router: Router,
    pub tenant: Tenant,
    pub admin: User,
    /// Llave privada de la autoridad de licencias del harness: permite
    /// re-firmar licencias que la llave pública instalada verifica.
    pub license_private_key: RsaPrivateKey,
    pub _stop_sender: watch::Sender<bool>,
    pub _hls_root: TempDir,
    pub _spool_dir: TempDir,
    pub _license_dir: TempDir,
}

/// Contraseña sembrada del administrador del harness.
pub const ADMIN_PASSWORD: &str = "pw";

/// Forja y firma una licencia RS256 legítima con vigencia dada.
pub fn forge_signed_license(
    private_key: &RsaPrivateKey,
    valid_until: chrono::DateTime<Utc>,
) -> String {
    let payload = serde_json::json!({
        "license_id": "lic-e2e-001",
        "tenant_scope": "all",
        "issued_at": (valid_until - ChronoDuration::days(365)).to_rfc3339(),
        "valid_until": valid_until.to_rfc3339(),
        "limits": { "max_cameras": 64, "max_nvrs": 8 },
        "features": { "live_view": true },
    });

    let payload_bytes = serde_json::to_vec(&payload).unwrap();
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key.sign(&payload_bytes);

    serde_json::json!({
        "payload_b64": BASE64_STANDARD.encode(&payload_bytes),
        "sig_b64": BASE64_STANDARD.encode(signature.to_vec()),
        "alg": "RS256",
    }).to_string()
}

/**
 * Ignición del harness: DB en memoria, llaves de prueba, licencia
 * válida por un año y tenant 't1' con 'admin@t1.example' sembrado como
 * tenant-admin.
 */
pub async fn ignite_harness(tag: &str) -> TestHarness {
    let hls_root = tempfile::tempdir().expect("Fallo al crear raíz HLS");
    let spool_dir = tempfile::tempdir().expect("Fallo al crear spool");
    let license_dir = tempfile::tempdir().expect("Fallo al crear dir de licencia");

    // 1. AUTORIDAD DE LICENCIA OFFLINE (RSA-2048 de prueba)
    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048)
        .expect("Fallo al forjar llave RSA");
    let public_pem = private_key.to_public_key()
        .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
        .unwrap();

    let license_path = license_dir.path().join("license.json");
    let public_key_path = license_dir.path().join("license_pub.pem");
    std::fs::write(&public_key_path, public_pem).unwrap();
    std::fs::write(&license_path, forge_signed_license(&private_key, Utc::now() + ChronoDuration::days(365))).unwrap();

    // 2. CONFIGURACIÓN COMPLETA DE PRUEBA
    let config = ControlPlaneConfig {
        database_url: format!("file::mem_app_{}?mode=memory&cache=shared", tag),
        database_auth_token: None,
        bind_address: "127.0.0.1".into(),
        port: 0,
        allowed_origins: Vec::new(),
        master_keys: vec![MasterKeyDescriptor {
            kid: "k1".into(),
            material_b64: BASE64_STANDARD.encode([7u8; 32]),
        }],
        active_master_kid: "k1".into(),
        jwt_signing_keys: vec![SigningKeyDescriptor {
            kid: "jwt-v1".into(),
            secret_b64: BASE64_STANDARD.encode(b"e2e-jwt-secret"),
        }],
        jwt_active_kid: "jwt-v1".into(),
        hls_hmac_keys: HashMap::from([("v1".to_string(), b"test-secret".to_vec())]),
        hls_active_kid: "v1".into(),
        ip_hash_salt: "e2e-salt".into(),
        hls_root: hls_root.path().to_path_buf(),
        license_path,
        license_public_key_path: public_key_path,
        audit_spool_dir: spool_dir.path().to_path_buf(),
        audit_spool_quota_bytes: 1024 * 1024,
        media_plane_grpc_url: "http://127.0.0.1:1".into(),
        sfu_base_url: "http://127.0.0.1:1".into(),
        sfu_internal_secret: "e2e-internal".into(),
    };

    let (stop_sender, stop_receiver) = watch::channel(false);
    let state = AppState::ignite(Arc::new(config), stop_receiver)
        .await
        .expect("Fallo en la ignición del estado");

    // 3. SIEMBRA: tenant + administrador con rol tenant-admin
    let tenant = state.tenant_repository.create_tenant("t1", "Tenant One", "t1.example")
        .await.unwrap();
    let admin = state.user_repository.create_user(
        &tenant.id,
        "admin@t1.example",
        "Admin",
        &hash_password(ADMIN_PASSWORD).unwrap(),
    ).await.unwrap();

    state.rbac_repository.replace_user_grants(&admin.id, &[Grant {
        role_id: Uuid::parse_str(builtin_roles::TENANT_ADMIN).unwrap(),
        scope_type: ScopeType::Tenant,
        scope_id: None,
    }]).await.unwrap();

    let router = create_control_plane_router(state.clone());

    TestHarness {
        state,
        router,
        tenant,
        admin,
        license_private_key: private_key,
        _stop_sender: stop_sender,
        _hls_root: hls_root,
        _spool_dir: spool_dir,
        _license_dir: license_dir,
    }
}

// --- UTILERÍA DE PETICIONES ---

pub async fn dispatch(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.expect("El router jamás falla")
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null)
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

/// Extrae el valor de una cookie concreta de los headers Set-Cookie.
pub fn extract_cookie(response: &Response, cookie_name: &str) -> Option<String> {
    response.headers().get_all(header::SET_COOKIE).iter().find_map(|header_value| {
        let rendered = header_value.to_str().ok()?;
        let (name_value, _attributes) = rendered.split_once(';').unwrap_or((rendered, ""));
        let (name, value) = name_value.split_once('=')?;
        (name == cookie_name).then(|| value.to_string())
    })
}

/// Login nominal: retorna (access_token, cookie de refresco).
pub async fn login(router: &Router, email: &str, password: &str) -> (String, String) {
    let response = dispatch(router, Request::builder()
        .method("POST")
        .uri("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(format!(r#"{{"email":"{}","password":"{}"}}"#, email, password)))
        .unwrap(),
    ).await;

    assert_eq!(response.status(), StatusCode::OK, "El login sembrado debe prosperar");
    let refresh_cookie = extract_cookie(&response, "refresh_token")
        .expect("El login debe sembrar la cookie de refresco");

    let body = body_json(response).await;
    let access_token = body["access_token"].as_str().expect("access_token ausente").to_string();
    (access_token, refresh_cookie)
}

pub fn bearer(request_builder: axum::http::request::Builder, access_token: &str) -> axum::http::request::Builder {
    request_builder.header(header::AUTHORIZATION, format!("Bearer {}", access_token))
}
