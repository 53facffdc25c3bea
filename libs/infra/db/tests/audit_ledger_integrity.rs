// [libs/infra/db/tests/audit_ledger_integrity.rs]
/**
 * =================================================================
 * APARATO: AUDIT LEDGER INTEGRITY TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar inserción por lotes, replay idempotente y
 *           paginación descendente del rastro.
 * =================================================================
 */

use panoptes_domain_models::pagination::PageCursor;
use panoptes_domain_models::{AuditEvent, AuditResult};
use panoptes_infra_db::repositories::AuditRepository;
use panoptes_infra_db::SovereignDbClient;
use uuid::Uuid;

async fn client(tag: &str) -> SovereignDbClient {
    SovereignDbClient::connect(&format!("file::mem_audit_{}?mode=memory&cache=shared", tag), None)
        .await
        .expect("Fallo al inicializar DB en memoria")
}

fn event(tenant: &Uuid, action: &str) -> AuditEvent {
    AuditEvent::now(action, AuditResult::Success).with_tenant(*tenant)
}

#[tokio::test]
async fn certify_batch_insert_and_idempotent_replay() {
    let client = client("batch").await;
    let repo = AuditRepository::new(client.clone());
    let tenant = Uuid::new_v4();

    let batch: Vec<AuditEvent> = (0..10).map(|i| event(&tenant, &format!("action.{}", i))).collect();

    // 1. INSERCIÓN NOMINAL
    repo.insert_batch(&batch).await.expect("El lote debe cristalizar");
    assert_eq!(repo.count_events().await.unwrap(), 10);

    // 2. REPLAY: reinsertar el mismo lote (spool parcialmente drenado)
    repo.insert_batch(&batch).await.expect("El replay debe converger");
    assert_eq!(repo.count_events().await.unwrap(), 10, "El id-PK absorbe duplicados");

    println!("✅ AUDIT: Idempotent replay certified.");
}

#[tokio::test]
async fn certify_descending_pagination() {
    let client = client("paging").await;
    let repo = AuditRepository::new(client.clone());
    let tenant = Uuid::new_v4();

    let mut batch = Vec::new();
    for index in 0..7 {
        let mut e = event(&tenant, &format!("page.{}", index));
        // Marcas temporales estrictamente crecientes para un orden estable.
        e.timestamp_utc = chrono::Utc::now() + chrono::Duration::milliseconds(index);
        batch.push(e);
    }
    repo.insert_batch(&batch).await.unwrap();

    // 1. PRIMERA PÁGINA: los 3 más recientes
    let first_page = repo.list_events(&tenant, None, 3).await.unwrap();
    assert_eq!(first_page.len(), 3);
    assert_eq!(first_page[0].action, "page.6");
    assert_eq!(first_page[2].action, "page.4");

    // 2. SEGUNDA PÁGINA: cursor sobre la última fila servida
    let cursor = PageCursor {
        created_at: first_page[2].timestamp_utc,
        id: first_page[2].id,
    };
    let second_page = repo.list_events(&tenant, Some(&cursor), 3).await.unwrap();
    assert_eq!(second_page.len(), 3);
    assert_eq!(second_page[0].action, "page.3");

    // 3. AISLAMIENTO: otro tenant observa un rastro vacío
    let foreign = repo.list_events(&Uuid::new_v4(), None, 10).await.unwrap();
    assert!(foreign.is_empty());
}

#[tokio::test]
async fn certify_failure_events_round_trip() {
    let client = client("failure").await;
    let repo = AuditRepository::new(client.clone());
    let tenant = Uuid::new_v4();

    let denial = AuditEvent::now("permission.check", AuditResult::Failure)
        .with_tenant(tenant)
        .with_reason("FORBIDDEN")
        .with_target("camera", "cam-1")
        .with_request_id("req-9");

    repo.insert_batch(std::slice::from_ref(&denial)).await.unwrap();

    let fetched = repo.list_events(&tenant, None, 10).await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].result, AuditResult::Failure);
    assert_eq!(fetched[0].reason_code.as_deref(), Some("FORBIDDEN"));
    assert_eq!(fetched[0].target_type.as_deref(), Some("camera"));
    assert_eq!(fetched[0].request_id.as_deref(), Some("req-9"));
}
