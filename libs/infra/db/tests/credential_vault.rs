// [libs/infra/db/tests/credential_vault.rs]
/**
 * =================================================================
 * APARATO: CREDENTIAL VAULT TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar el sobre KEK/DEK completo contra persistencia:
 *           sellado, recuperación, AAD vinculante y re-envoltura.
 * =================================================================
 */

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use panoptes_core_crypto::gcm::{decrypt_gcm, encrypt_gcm};
use panoptes_core_crypto::keyring::{MasterKeyDescriptor, SovereignKeyring};
use panoptes_core_crypto::CryptoError;
use panoptes_domain_models::credentials::credential_binding_aad;
use panoptes_domain_models::CameraCredentialRecord;
use panoptes_infra_db::repositories::CredentialRepository;
use panoptes_infra_db::SovereignDbClient;
use rand::RngCore;
use uuid::Uuid;

fn descriptor(kid: &str, fill: u8) -> MasterKeyDescriptor {
    MasterKeyDescriptor { kid: kid.into(), material_b64: BASE64_STANDARD.encode([fill; 32]) }
}

/// Sella usuario y contraseña bajo un DEK fresco envuelto por el keyring.
fn seal_credentials(
    keyring: &SovereignKeyring,
    tenant_id: &Uuid,
    camera_id: &Uuid,
    username: &str,
    password: &str,
) -> CameraCredentialRecord {
    let binding_aad = credential_binding_aad(tenant_id, camera_id);

    let mut data_encryption_key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut data_encryption_key);

    let wrapped_dek = keyring.wrap_data_key(&data_encryption_key, &binding_aad).unwrap();
    let sealed_username = encrypt_gcm(&data_encryption_key, username.as_bytes(), &binding_aad).unwrap();
    let sealed_password = encrypt_gcm(&data_encryption_key, password.as_bytes(), &binding_aad).unwrap();

    CameraCredentialRecord {
        tenant_id: *tenant_id,
        camera_id: *camera_id,
        master_kid: wrapped_dek.kid,
        dek_ciphertext: wrapped_dek.ciphertext,
        dek_nonce: wrapped_dek.nonce.to_vec(),
        dek_tag: wrapped_dek.tag.to_vec(),
        enc_username: sealed_username.ciphertext,
        nonce_u: sealed_username.nonce.to_vec(),
        tag_u: sealed_username.tag.to_vec(),
        enc_password: sealed_password.ciphertext,
        nonce_p: sealed_password.nonce.to_vec(),
        tag_p: sealed_password.tag.to_vec(),
    }
}

#[tokio::test]
async fn certify_envelope_round_trip_through_persistence() {
    let client = SovereignDbClient::connect("file::mem_cred_rt?mode=memory&cache=shared", None)
        .await.unwrap();
    let repo = CredentialRepository::new(client.clone());

    let keyring = SovereignKeyring::load(&[descriptor("k1", 0xA1), descriptor("k2", 0xB2)], "k2").unwrap();
    let tenant = Uuid::new_v4();
    let camera = Uuid::new_v4();

    // 1. SELLADO Y CRISTALIZACIÓN
    let record = seal_credentials(&keyring, &tenant, &camera, "svc_cam", "rtsp-secret-9");
    assert_eq!(record.master_kid, "k2", "La envoltura declara el kid activo");
    repo.upsert_credential(&record).await.unwrap();

    // 2. RECUPERACIÓN Y APERTURA COMPLETA
    let fetched = repo.fetch_credential(&tenant, &camera).await.unwrap()
        .expect("El registro sellado debe existir");

    let binding_aad = credential_binding_aad(&tenant, &camera);
    let opened_dek = keyring.unwrap_data_key(
        &fetched.master_kid, &fetched.dek_nonce, &fetched.dek_ciphertext, &fetched.dek_tag, &binding_aad,
    ).unwrap();

    let opened_username = decrypt_gcm(&opened_dek, &fetched.nonce_u, &fetched.enc_username, &fetched.tag_u, &binding_aad).unwrap();
    let opened_password = decrypt_gcm(&opened_dek, &fetched.nonce_p, &fetched.enc_password, &fetched.tag_p, &binding_aad).unwrap();
    assert_eq!(opened_username, b"svc_cam");
    assert_eq!(opened_password, b"rtsp-secret-9");

    // 3. AAD VINCULANTE: el registro no abre contra otra cámara
    let foreign_aad = credential_binding_aad(&tenant, &Uuid::new_v4());
    assert!(matches!(
        keyring.unwrap_data_key(
            &fetched.master_kid, &fetched.dek_nonce, &fetched.dek_ciphertext, &fetched.dek_tag, &foreign_aad,
        ),
        Err(CryptoError::Decryption)
    ));

    println!("✅ CREDENTIALS: Envelope round trip certified.");
}

#[tokio::test]
async fn certify_rewrap_moves_record_to_active_kid() {
    let client = SovereignDbClient::connect("file::mem_cred_rewrap?mode=memory&cache=shared", None)
        .await.unwrap();
    let repo = CredentialRepository::new(client.clone());

    let tenant = Uuid::new_v4();
    let camera = Uuid::new_v4();

    // 1. Registro sellado bajo k1 activo
    let keyring_k1 = SovereignKeyring::load(&[descriptor("k1", 1), descriptor("k2", 2)], "k1").unwrap();
    repo.upsert_credential(&seal_credentials(&keyring_k1, &tenant, &camera, "u", "p")).await.unwrap();
    assert_eq!(repo.fetch_credential(&tenant, &camera).await.unwrap().unwrap().master_kid, "k1");

    // 2. Rotación aditiva: k2 activo; la reescritura por la vía API
    //    re-envuelve el registro hacia el kid nuevo
    let keyring_k2 = SovereignKeyring::load(&[descriptor("k1", 1), descriptor("k2", 2)], "k2").unwrap();
    repo.upsert_credential(&seal_credentials(&keyring_k2, &tenant, &camera, "u", "p")).await.unwrap();

    let rewrapped = repo.fetch_credential(&tenant, &camera).await.unwrap().unwrap();
    assert_eq!(rewrapped.master_kid, "k2", "La re-envoltura liga el registro al kid activo");

    println!("✅ CREDENTIALS: Additive rewrap certified.");
}
