// [apps/control-plane/src/services/nvr_census.rs]
/*!
 * =================================================================
 * APARATO: NVR CENSUS DAEMON (V8.0 - DAILY DISCOVERY)
 * CLASIFICACIÓN: BACKGROUND SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: DESCUBRIMIENTO DIARIO ACOTADO DE CANALES NVR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DAILY CADENCE: Un ciclo cada 24 h con jitter inicial de 0-60 s
 *    para no sincronizar ráfagas entre appliances re-encendidos juntos.
 * 2. BOUNDED CYCLE: Techo de 200 NVRs por ciclo; los censados hace
 *    menos de 24 h se omiten por elegibilidad en la consulta.
 * 3. CYCLE EVIDENCE: Cada ciclo emite exactamente un evento
 *    'nvr.channel.daily_sync' con el resumen del censo.
 * =================================================================
 */

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::state::AppState;
use panoptes_domain_models::audit::actions;
use panoptes_domain_models::{AuditEvent, AuditResult};
use panoptes_infra_nvr::AdapterTarget;

/// Techo de NVRs procesados por ciclo.
pub const CENSUS_CYCLE_CAP: u32 = 200;
/// Cadencia del ciclo de censo.
const CENSUS_PULSE: Duration = Duration::from_secs(24 * 3600);

/// Resumen de un ciclo de censo.
#[derive(Debug, Default)]
pub struct CensusReport {
    pub nvrs_visited: u32,
    pub channels_discovered: u32,
    pub events_harvested: u32,
    pub failures: u32,
}

/**
 * Ejecuta un ciclo completo de censo: por cada NVR elegible descubre
 * canales vía su adaptador, converge el inventario y sella el ciclo.
 *
 * La evidencia 'nvr.channel.daily_sync' es incondicional: un inventario
 * inaccesible produce un ciclo vacío con failures=1, jamás un ciclo mudo.
 */
pub async fn run_census_cycle(state: &AppState) -> CensusReport {
    let mut report = CensusReport::default();

    let due_nvrs = match state.nvr_repository.list_due_for_census(CENSUS_CYCLE_CAP).await {
        Ok(nvrs) => nvrs,
        Err(inventory_fault) => {
            warn!("⚠️ [NVR_CENSUS]: Inventory unavailable: {}", inventory_fault);
            report.failures += 1;
            Vec::new()
        }
    };

    for nvr in due_nvrs {
        report.nvrs_visited += 1;
        let adapter = state.adapter_registry.resolve(nvr.vendor.as_label());

        let adapter_target = AdapterTarget {
            host: nvr.host.clone(),
            port: nvr.port,
            username: None,
            password: None,
            rtsp_template: Some(format!("rtsp://{}:554/live/{{channel}}", nvr.host)),
        };

        // Identidad del dispositivo: decide la liveness del ciclo.
        match adapter.get_device_info(&adapter_target).await {
            Ok(device_info) => {
                let _ = state.nvr_repository.update_status(&nvr.id, panoptes_domain_models::NvrStatus::Online).await;
                tracing::debug!("📇 [NVR_CENSUS]: [{}] identified as [{} {}].",
                    nvr.name, device_info.vendor_label, device_info.model);
            }
            Err(identity_fault) => {
                warn!("⚠️ [NVR_CENSUS]: Identity probe failed on [{}]: {}", nvr.name, identity_fault);
                let _ = state.nvr_repository.update_status(&nvr.id, panoptes_domain_models::NvrStatus::Offline).await;
                report.failures += 1;
                continue;
            }
        }

        match adapter.list_channels(&adapter_target).await {
            Ok(discovered_channels) => {
                for channel in &discovered_channels {
                    let convergence_outcome = state.nvr_repository.upsert_channel(
                        &nvr.id,
                        &channel.channel_ref,
                        &channel.name,
                        channel.rtsp_main.as_deref(),
                        channel.rtsp_sub.as_deref(),
                    ).await;

                    match convergence_outcome {
                        Ok(()) => report.channels_discovered += 1,
                        Err(convergence_fault) => {
                            warn!("⚠️ [NVR_CENSUS]: Channel convergence failed on [{}]: {}",
                                nvr.name, convergence_fault);
                            report.failures += 1;
                        }
                    }
                }

                // Cosecha acotada de eventos del dispositivo desde el
                // último censo sellado (techo 200 por llamada).
                let harvest_horizon = nvr.last_sync_at.unwrap_or(nvr.created_at);
                match adapter.fetch_events(&adapter_target, harvest_horizon, 200).await {
                    Ok(harvested_events) => report.events_harvested += harvested_events.len() as u32,
                    Err(harvest_fault) => {
                        warn!("⚠️ [NVR_CENSUS]: Event harvest failed on [{}]: {}", nvr.name, harvest_fault);
                    }
                }

                let _ = state.nvr_repository.seal_census_cycle(&nvr.id, Utc::now()).await;
            }
            Err(discovery_fault) => {
                warn!("⚠️ [NVR_CENSUS]: Discovery collapsed on [{}]: {}", nvr.name, discovery_fault);
                report.failures += 1;
            }
        }
    }

    // Evidencia única del ciclo.
    let cycle_event = AuditEvent::now(
        actions::NVR_DAILY_SYNC,
        if report.failures == 0 { AuditResult::Success } else { AuditResult::Failure },
    )
    .with_target("nvr_census", format!(
        "visited={};channels={};events={};failures={}",
        report.nvrs_visited, report.channels_discovered, report.events_harvested, report.failures
    ));

    if let Err(evidence_fault) = state.audit_pipeline.record(cycle_event) {
        warn!("❌ [NVR_CENSUS]: Cycle evidence lost: {}", evidence_fault);
    }

    info!(
        "📡 [NVR_CENSUS]: Cycle sealed. visited={} channels={} events={} failures={}.",
        report.nvrs_visited, report.channels_discovered, report.events_harvested, report.failures
    );
    report
}

/// Daemon de censo diario con jitter de arranque.
pub fn spawn_census_daemon(state: AppState, mut stop_signal: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let ignition_jitter = Duration::from_secs(rand::thread_rng().gen_range(0..=60));
        info!("📡 [NVR_CENSUS]: Daemon online; first cycle in {:?}.", ignition_jitter);

        tokio::select! {
            _ = sleep(ignition_jitter) => {},
            _ = stop_signal.changed() => { return; }
        }

        loop {
            run_census_cycle(&state).await;

            tokio::select! {
                _ = sleep(CENSUS_PULSE) => {},
                _ = stop_signal.changed() => {
                    if *stop_signal.borrow() {
                        info!("🛑 [NVR_CENSUS]: Stop signal honored.");
                        return;
                    }
                }
            }
        }
    });
}
