// [apps/control-plane/tests/audit_spool.rs]
/**
 * =================================================================
 * APARATO: AUDIT SPOOL RESILIENCE TEST (V3.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar el invariante never-drop: DB caída -> N eventos
 *           en spool; DB recuperada -> replay hasta paridad exacta.
 * =================================================================
 */

use std::sync::Arc;
use std::time::Duration;

use panoptes_control_plane::services::audit_pipeline::{AuditPipeline, SpoolWriter};
use panoptes_domain_models::{AuditEvent, AuditResult};
use panoptes_infra_db::repositories::AuditRepository;
use panoptes_infra_db::schema::apply_control_plane_schema;
use panoptes_infra_db::SovereignDbClient;
use tokio::sync::watch;
use tokio::time::sleep;
use uuid::Uuid;

async fn client(tag: &str) -> SovereignDbClient {
    SovereignDbClient::connect(&format!("file::mem_spool_{}?mode=memory&cache=shared", tag), None)
        .await
        .expect("Fallo al inicializar DB en memoria")
}

fn mutating_event(tenant: &Uuid, index: usize) -> AuditEvent {
    AuditEvent::now(&format!("user.create.{}", index), AuditResult::Success)
        .with_tenant(*tenant)
        .with_target("user", format!("subject-{}", index))
}

#[tokio::test]
async fn certify_never_drop_with_ledger_down_and_replay() {
    let client = client("neverdrop").await;
    let repo = Arc::new(AuditRepository::new(client.clone()));
    let spool_dir = tempfile::tempdir().unwrap();
    let (_stop_sender, stop_receiver) = watch::channel(false);

    // Cadencias de laboratorio: consumidor 30 ms, replayer 150 ms.
    let pipeline = AuditPipeline::ignite_with_pulse(
        repo.clone(),
        spool_dir.path().to_path_buf(),
        1024 * 1024,
        stop_receiver,
        Duration::from_millis(30),
        Duration::from_millis(150),
    );

    // 1. COLAPSO DEL LEDGER: la tabla desaparece
    let connection = client.get_connection().unwrap();
    connection.execute("DROP TABLE audit_events", ()).await.unwrap();

    // 2. N ACCIONES MUTANTES: todas aceptadas por el productor
    let tenant = Uuid::new_v4();
    const EVENT_COUNT: usize = 8;
    for index in 0..EVENT_COUNT {
        pipeline.record(mutating_event(&tenant, index)).expect("record() jamás pierde bajo cola sana");
    }

    // 3. EL CONSUMIDOR VUELCA AL SPOOL: >= N líneas en disco
    sleep(Duration::from_millis(300)).await;

    let spool_writer = SpoolWriter::new(spool_dir.path().to_path_buf(), 1024 * 1024);
    let spooled_lines: usize = spool_writer.pending_files().iter()
        .map(|spool_file| std::fs::read_to_string(spool_file).unwrap_or_default().lines().count())
        .sum();
    assert!(spooled_lines >= EVENT_COUNT,
        "Con la DB caída debe haber >= {} líneas en spool, hay {}", EVENT_COUNT, spooled_lines);

    // 4. RECUPERACIÓN: el esquema renace y el replayer drena
    apply_control_plane_schema(&connection).await.unwrap();
    sleep(Duration::from_millis(600)).await;

    assert_eq!(repo.count_events().await.unwrap(), EVENT_COUNT as i64,
        "Tras el replay, el ledger debe alcanzar paridad exacta");
    assert!(spool_writer.pending_files().is_empty(), "Los archivos drenados se incineran");

    println!("✅ AUDIT: Never-drop + replay parity certified.");
}

#[tokio::test]
async fn certify_spool_quota_exhaustion_fails_closed() {
    let spool_dir = tempfile::tempdir().unwrap();

    // Cuota ridícula: tras la primera línea la segunda debe rebotar.
    let constrained_writer = SpoolWriter::new(spool_dir.path().to_path_buf(), 64);
    let tenant = Uuid::new_v4();

    constrained_writer.append_event(&mutating_event(&tenant, 0))
        .expect("La primera línea entra bajo cuota");
    let exhausted = constrained_writer.append_event(&mutating_event(&tenant, 1));
    assert!(exhausted.is_err(), "Cuota superada debe rebotar con AUDIT_EXHAUSTED");
}

#[tokio::test]
async fn certify_replay_is_idempotent_under_partial_drain() {
    let client = client("partial").await;
    let repo = Arc::new(AuditRepository::new(client.clone()));
    let spool_dir = tempfile::tempdir().unwrap();
    let tenant = Uuid::new_v4();

    // 1. Dos eventos quedan en spool Y uno de ellos ya vive en el ledger
    //    (simulación de drenado interrumpido a mitad).
    let first_event = mutating_event(&tenant, 0);
    let second_event = mutating_event(&tenant, 1);

    let spool_writer = SpoolWriter::new(spool_dir.path().to_path_buf(), 1024 * 1024);
    spool_writer.append_event(&first_event).unwrap();
    spool_writer.append_event(&second_event).unwrap();
    repo.insert_batch(std::slice::from_ref(&first_event)).await.unwrap();

    // 2. El replayer drena el archivo completo
    let (_stop_sender, stop_receiver) = watch::channel(false);
    let _pipeline = AuditPipeline::ignite_with_pulse(
        repo.clone(),
        spool_dir.path().to_path_buf(),
        1024 * 1024,
        stop_receiver,
        Duration::from_millis(30),
        Duration::from_millis(100),
    );
    sleep(Duration::from_millis(400)).await;

    // 3. PARIDAD: 2 eventos, sin duplicados
    assert_eq!(repo.count_events().await.unwrap(), 2);
    assert!(spool_writer.pending_files().is_empty());
    println!("✅ AUDIT: Idempotent partial-drain replay certified.");
}
