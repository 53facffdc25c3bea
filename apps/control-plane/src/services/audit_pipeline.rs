// [apps/control-plane/src/services/audit_pipeline.rs]
/*!
 * =================================================================
 * APARATO: AUDIT PIPELINE (V19.0 - NEVER DROP)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: COLA ACOTADA, SPOOL DIARIO Y REPLAY HACIA EL LEDGER
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NEVER DROP: Un evento de acción mutante jamás se pierde. Cola llena
 *    -> spool directo; spool lleno -> la petición de origen falla 503.
 * 2. DAILY JSONL: El spool es un archivo JSON-lines por día con cuota
 *    (1 GiB por omisión); el formato es idéntico al del ledger.
 * 3. IDEMPOTENT REPLAY: El drenado reinserta por lotes; el id-PK del
 *    ledger absorbe cualquier re-entrega parcial.
 *
 * # Mathematical Proof (Durability Chain):
 * Sea E un evento aceptado por record(). E reside en la cola o en el
 * spool. El consumidor mueve cola->ledger o cola->spool ante fallo de
 * DB; el replayer mueve spool->ledger cuando la DB revive. Todo camino
 * termina en el ledger: la cadena es cerrada.
 * =================================================================
 */

use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use panoptes_domain_models::AuditEvent;
use panoptes_infra_db::repositories::AuditRepository;

/// Profundidad de la cola en memoria.
pub const AUDIT_QUEUE_DEPTH: usize = 1_000;
/// Tamaño máximo de lote hacia el ledger.
const AUDIT_BATCH_MAX_SIZE: usize = 100;
/// Cadencia nominal del consumidor.
const CONSUMER_PULSE: Duration = Duration::from_millis(500);
/// Cadencia nominal del replayer.
const REPLAYER_PULSE: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum AuditPipelineError {
    /// Cola llena Y spool inoperante: la acción mutante debe fallar.
    #[error("[L4_AUDIT_FAULT]: AUDIT_EXHAUSTED -> {0}")]
    Exhausted(String),
}

/// Escritor del spool diario con cuota dura.
pub struct SpoolWriter {
    spool_directory: PathBuf,
    quota_bytes: u64,
}

impl SpoolWriter {
    pub fn new(spool_directory: PathBuf, quota_bytes: u64) -> Self {
        Self { spool_directory, quota_bytes }
    }

    fn daily_file_path(&self) -> PathBuf {
        self.spool_directory.join(format!("audit-{}.jsonl", Utc::now().format("%Y-%m-%d")))
    }

    fn occupied_bytes(&self) -> u64 {
        let Ok(entries) = fs::read_dir(&self.spool_directory) else { return 0 };
        entries
            .flatten()
            .filter_map(|entry| entry.metadata().ok())
            .map(|metadata| metadata.len())
            .sum()
    }

    /// Archivos de spool pendientes, del más viejo al más nuevo.
    pub fn pending_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.spool_directory) else { return Vec::new() };
        let mut spool_files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().map(|extension| extension == "jsonl").unwrap_or(false)
            })
            .collect();
        spool_files.sort();
        spool_files
    }

    /**
     * Apila un evento como línea JSONL en el archivo del día.
     *
     * # Errors:
     * - `Exhausted`: cuota superada o el disco rechazó la escritura.
     */
    pub fn append_event(&self, event: &AuditEvent) -> Result<(), AuditPipelineError> {
        fs::create_dir_all(&self.spool_directory)
            .map_err(|fs_fault| AuditPipelineError::Exhausted(fs_fault.to_string()))?;

        if self.occupied_bytes() >= self.quota_bytes {
            return Err(AuditPipelineError::Exhausted("SPOOL_QUOTA_EXCEEDED".into()));
        }

        let serialized_line = serde_json::to_string(event)
            .map_err(|encode_fault| AuditPipelineError::Exhausted(encode_fault.to_string()))?;

        let mut daily_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.daily_file_path())
            .map_err(|open_fault| AuditPipelineError::Exhausted(open_fault.to_string()))?;

        writeln!(daily_file, "{}", serialized_line)
            .map_err(|write_fault| AuditPipelineError::Exhausted(write_fault.to_string()))
    }

    fn read_events(file_path: &Path) -> Vec<AuditEvent> {
        let Ok(file_body) = fs::read_to_string(file_path) else { return Vec::new() };
        file_body
            .lines()
            .filter_map(|line| serde_json::from_str::<AuditEvent>(line).ok())
            .collect()
    }
}

/// Productor/coordinador del rastro forense.
pub struct AuditPipeline {
    event_sender: mpsc::Sender<AuditEvent>,
    spool_writer: Arc<SpoolWriter>,
}

impl AuditPipeline {
    /**
     * Ignición con cadencias nominales (consumidor 500 ms, replayer 30 s).
     */
    pub fn ignite(
        audit_repository: Arc<AuditRepository>,
        spool_directory: PathBuf,
        quota_bytes: u64,
        stop_signal: watch::Receiver<bool>,
    ) -> Arc<Self> {
        Self::ignite_with_pulse(audit_repository, spool_directory, quota_bytes, stop_signal, CONSUMER_PULSE, REPLAYER_PULSE)
    }

    /// Variante con cadencias explícitas (ventanas breves en pruebas).
    pub fn ignite_with_pulse(
        audit_repository: Arc<AuditRepository>,
        spool_directory: PathBuf,
        quota_bytes: u64,
        stop_signal: watch::Receiver<bool>,
        consumer_pulse: Duration,
        replayer_pulse: Duration,
    ) -> Arc<Self> {
        let (event_sender, event_receiver) = mpsc::channel::<AuditEvent>(AUDIT_QUEUE_DEPTH);
        let spool_writer = Arc::new(SpoolWriter::new(spool_directory, quota_bytes));

        let pipeline = Arc::new(Self {
            event_sender,
            spool_writer: spool_writer.clone(),
        });

        tokio::spawn(Self::consumer_loop(
            audit_repository.clone(),
            spool_writer.clone(),
            event_receiver,
            stop_signal.clone(),
            consumer_pulse,
        ));
        tokio::spawn(Self::replayer_loop(
            audit_repository,
            spool_writer,
            stop_signal,
            replayer_pulse,
        ));

        info!("🧾 [AUDIT_PIPELINE]: Queue ({} deep) + spool + replayer online.", AUDIT_QUEUE_DEPTH);
        pipeline
    }

    /**
     * Punto de entrada único del rastro: encola o apila en spool.
     *
     * # Errors:
     * - `Exhausted`: ni la cola ni el spool aceptaron el evento. El
     *   llamador debe fallar la acción mutante con 503.
     */
    pub fn record(&self, event: AuditEvent) -> Result<(), AuditPipelineError> {
        match self.event_sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(overflow_event)) => {
                warn!("🌊 [AUDIT_OVERFLOW]: Queue saturated; spilling event to spool.");
                self.spool_writer.append_event(&overflow_event)
            }
            Err(mpsc::error::TrySendError::Closed(orphan_event)) => {
                // Apagado en curso: el spool es la única vía durable restante.
                self.spool_writer.append_event(&orphan_event)
            }
        }
    }

    // --- ESTRATO DE CONSUMO (COLA -> LEDGER | SPOOL) ---

    async fn consumer_loop(
        audit_repository: Arc<AuditRepository>,
        spool_writer: Arc<SpoolWriter>,
        mut event_receiver: mpsc::Receiver<AuditEvent>,
        mut stop_signal: watch::Receiver<bool>,
        consumer_pulse: Duration,
    ) {
        let mut pulse_ticker = interval(consumer_pulse);

        loop {
            tokio::select! {
                _ = pulse_ticker.tick() => {},
                _ = stop_signal.changed() => {
                    if *stop_signal.borrow() {
                        info!("🛑 [AUDIT_CONSUMER]: Stop signal honored.");
                        return;
                    }
                }
            }

            // Drenado de ráfaga acotada.
            let mut pending_batch = Vec::with_capacity(AUDIT_BATCH_MAX_SIZE);
            while pending_batch.len() < AUDIT_BATCH_MAX_SIZE {
                match event_receiver.try_recv() {
                    Ok(event) => pending_batch.push(event),
                    Err(_) => break,
                }
            }

            if pending_batch.is_empty() {
                continue;
            }

            if let Err(ledger_fault) = audit_repository.insert_batch(&pending_batch).await {
                warn!("📼 [AUDIT_SPOOLING]: Ledger rejected batch ({}); spilling {} event(s).",
                    ledger_fault, pending_batch.len());

                for orphan_event in &pending_batch {
                    if let Err(spool_fault) = spool_writer.append_event(orphan_event) {
                        error!("💀 [AUDIT_LOSS_IMMINENT]: Spool also failed: {}", spool_fault);
                    }
                }
            }
        }
    }

    // --- ESTRATO DE REPLAY (SPOOL -> LEDGER) ---

    async fn replayer_loop(
        audit_repository: Arc<AuditRepository>,
        spool_writer: Arc<SpoolWriter>,
        mut stop_signal: watch::Receiver<bool>,
        replayer_pulse: Duration,
    ) {
        let mut pulse_ticker = interval(replayer_pulse);

        loop {
            tokio::select! {
                _ = pulse_ticker.tick() => {},
                _ = stop_signal.changed() => {
                    if *stop_signal.borrow() {
                        info!("🛑 [AUDIT_REPLAYER]: Stop signal honored.");
                        return;
                    }
                }
            }

            for spool_file in spool_writer.pending_files() {
                let spooled_events = SpoolWriter::read_events(&spool_file);
                if spooled_events.is_empty() {
                    let _ = fs::remove_file(&spool_file);
                    continue;
                }

                match audit_repository.insert_batch(&spooled_events).await {
                    Ok(()) => {
                        let _ = fs::remove_file(&spool_file);
                        info!("🔁 [AUDIT_REPLAY]: {} event(s) drained from [{}].",
                            spooled_events.len(), spool_file.display());
                    }
                    Err(_still_down) => {
                        // La DB sigue caída: el siguiente pulso reintenta.
                        debug!("⏳ [AUDIT_REPLAY]: Ledger still unavailable; spool retained.");
                        break;
                    }
                }
            }
        }
    }
}
