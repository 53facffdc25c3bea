// [libs/infra/db/tests/refresh_family_integrity.rs]
/**
 * =================================================================
 * APARATO: REFRESH FAMILY INTEGRITY TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar rotación atómica, detección de reuso e
 *           incineración de familia completa.
 * =================================================================
 */

use chrono::{Duration, Utc};
use panoptes_core_crypto::tokens::{mint_refresh_material, refresh_material_digest};
use panoptes_infra_db::repositories::RefreshTokenRepository;
use panoptes_infra_db::{DbError, SovereignDbClient};
use uuid::Uuid;

async fn client(tag: &str) -> SovereignDbClient {
    SovereignDbClient::connect(&format!("file::mem_refresh_{}?mode=memory&cache=shared", tag), None)
        .await
        .expect("Fallo al inicializar DB en memoria")
}

#[tokio::test]
async fn certify_rotation_and_reuse_detection() {
    let client = client("rotation").await;
    let repo = RefreshTokenRepository::new(client.clone());

    let tenant = Uuid::new_v4();
    let user = Uuid::new_v4();
    let expires = Utc::now() + Duration::days(7);

    // 1. LOGIN: raíz de familia (RT1)
    let rt1_material = mint_refresh_material();
    let rt1_digest = refresh_material_digest(&rt1_material);
    let family = repo.create_family_root(&tenant, &user, "sess-1", &rt1_digest, expires)
        .await
        .expect("Fallo al acuñar la raíz");

    let rt1_row = repo.find_by_digest(&rt1_digest).await.unwrap().expect("RT1 debe existir");
    assert!(rt1_row.is_active_leaf(Utc::now()));
    assert_eq!(rt1_row.family_id, family);
    assert!(rt1_row.parent_id.is_none());

    // 2. ROTACIÓN: RT1 -> RT2
    let rt2_material = mint_refresh_material();
    let rt2_digest = refresh_material_digest(&rt2_material);
    repo.rotate_leaf(&rt1_row, &rt2_digest, expires).await.expect("La rotación debe prosperar");

    let sealed_rt1 = repo.find_by_digest(&rt1_digest).await.unwrap().unwrap();
    assert!(sealed_rt1.used_at.is_some(), "RT1 queda sellado como usado");
    assert!(!sealed_rt1.is_active_leaf(Utc::now()));

    let rt2_row = repo.find_by_digest(&rt2_digest).await.unwrap().unwrap();
    assert!(rt2_row.is_active_leaf(Utc::now()), "RT2 es la única hoja activa");
    assert_eq!(rt2_row.parent_id, Some(rt1_row.id));
    assert_eq!(rt2_row.family_id, family);

    // 3. REUSO: presentar RT1 otra vez no puede rotar (hoja ya sellada)
    let rt3_digest = refresh_material_digest(&mint_refresh_material());
    let reuse_outcome = repo.rotate_leaf(&sealed_rt1, &rt3_digest, expires).await;
    assert!(matches!(reuse_outcome, Err(DbError::InvalidState)));

    // 4. INCINERACIÓN: la familia completa cae, RT2 incluido
    let incinerated = repo.revoke_family(&family).await.unwrap();
    assert_eq!(incinerated, 2);

    let rt2_after = repo.find_by_digest(&rt2_digest).await.unwrap().unwrap();
    assert!(rt2_after.revoked);
    assert!(!rt2_after.is_active_leaf(Utc::now()), "RT2 muere con la familia");

    println!("✅ REFRESH: Rotation + reuse + family incineration certified.");
}

#[tokio::test]
async fn certify_digest_uniqueness_and_session_revocation() {
    let client = client("session").await;
    let repo = RefreshTokenRepository::new(client.clone());

    let tenant = Uuid::new_v4();
    let user = Uuid::new_v4();
    let expires = Utc::now() + Duration::days(7);

    let digest = refresh_material_digest(&mint_refresh_material());
    repo.create_family_root(&tenant, &user, "sess-a", &digest, expires).await.unwrap();

    // El mismo digest no puede cristalizar dos veces.
    let duplicate = repo.create_family_root(&tenant, &user, "sess-b", &digest, expires).await;
    assert!(matches!(duplicate, Err(DbError::Conflict)));

    // Logout por sesión: la hoja de 'sess-a' queda revocada.
    let revoked = repo.revoke_by_session("sess-a").await.unwrap();
    assert_eq!(revoked, 1);
    let row = repo.find_by_digest(&digest).await.unwrap().unwrap();
    assert!(row.revoked);
}

#[tokio::test]
async fn certify_expired_leaf_is_not_active() {
    let client = client("expiry").await;
    let repo = RefreshTokenRepository::new(client.clone());

    let digest = refresh_material_digest(&mint_refresh_material());
    repo.create_family_root(
        &Uuid::new_v4(),
        &Uuid::new_v4(),
        "sess-x",
        &digest,
        Utc::now() - Duration::seconds(5),
    ).await.unwrap();

    let stale_row = repo.find_by_digest(&digest).await.unwrap().unwrap();
    assert!(!stale_row.is_active_leaf(Utc::now()), "Una hoja vencida jamás es activa");
}
