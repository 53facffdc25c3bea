// [apps/control-plane/src/services/health_monitor.rs]
/*!
 * =================================================================
 * APARATO: HEALTH MONITOR (V10.0 - CHANNEL-LEVEL PROBES)
 * CLASIFICACIÓN: BACKGROUND SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: SONDEO OPTIONS, BACKOFF Y SALUD EFECTIVA DE CANALES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. OPTIONS PROBE: Un RTSP OPTIONS crudo sobre TCP con ventana de 5 s;
 *    200 => online, 401/403 => credenciales, resto/corte => offline.
 * 2. THREE STRIKES: Tres 401/403 consecutivos sellan 'needs_credentials'
 *    en el canal o cámara; el veredicto se PERSISTE en el inventario,
 *    no solo en la RAM del daemon.
 * 3. DUAL SWEEP: Cada pulso sondea los grabadores, los canales de cada
 *    grabador vivo y las cámaras de sondeo directo.
 * 4. EXPONENTIAL LADDER: Backoff 1,2,4,8,16,30 s con jitter completo
 *    para los grabadores enfermos.
 * =================================================================
 */

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;
use panoptes_domain_models::camera::resolve_effective_channel_status;
use panoptes_domain_models::{Camera, ChannelHealth, EffectiveChannelStatus, NvrStatus};

/// Ventana del sondeo OPTIONS.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Escalera de backoff en segundos (techo 30).
const BACKOFF_LADDER_SECONDS: [u64; 6] = [1, 2, 4, 8, 16, 30];
/// Fallos de autenticación consecutivos que sellan 'needs_credentials'.
const AUTH_FAILURE_THRESHOLD: u32 = 3;
/// Cadencia base del ciclo de vigilancia.
const MONITOR_PULSE: Duration = Duration::from_secs(30);
/// Techo de objetivos sondeados por pulso.
const PROBE_TARGET_CAP: u32 = 64;

/// Veredicto de un sondeo individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    Online,
    AuthRequired,
    Offline,
}

/// Escalón de backoff para el intento número `attempt` (base 0), con jitter.
pub fn backoff_with_jitter(attempt: usize) -> Duration {
    let ladder_index = attempt.min(BACKOFF_LADDER_SECONDS.len() - 1);
    let base_seconds = BACKOFF_LADDER_SECONDS[ladder_index];
    let jitter_millis = rand::thread_rng().gen_range(0..=base_seconds * 250);
    Duration::from_secs(base_seconds) + Duration::from_millis(jitter_millis)
}

/// Interpreta la línea de estado de una respuesta RTSP.
pub fn interpret_rtsp_status_line(status_line: &str) -> ProbeVerdict {
    let mut line_fragments = status_line.split_whitespace();
    let Some(protocol_fragment) = line_fragments.next() else {
        return ProbeVerdict::Offline;
    };
    if !protocol_fragment.starts_with("RTSP/") {
        return ProbeVerdict::Offline;
    }

    match line_fragments.next().and_then(|code| code.parse::<u16>().ok()) {
        Some(200) => ProbeVerdict::Online,
        Some(401) | Some(403) => ProbeVerdict::AuthRequired,
        _ => ProbeVerdict::Offline,
    }
}

/// Autoridad (host, puerto) de una URL rtsp://; puerto 554 por omisión.
/// El userinfo ya viene incinerado por la sanitización de adaptadores,
/// pero se tolera por si el operador registró la URL a mano.
pub fn parse_rtsp_authority(rtsp_url: &str) -> Option<(String, u16)> {
    let authority_and_path = rtsp_url.strip_prefix("rtsp://")?;
    let authority = authority_and_path.split(['/', '?']).next()?;
    let host_and_port = authority.rsplit_once('@')
        .map(|(_, bare_authority)| bare_authority)
        .unwrap_or(authority);

    match host_and_port.rsplit_once(':') {
        Some((host, port_text)) => {
            if host.is_empty() {
                return None;
            }
            Some((host.to_string(), port_text.parse().ok()?))
        }
        None => {
            if host_and_port.is_empty() {
                return None;
            }
            Some((host_and_port.to_string(), 554))
        }
    }
}

/**
 * Traduce un veredicto de sondeo a salud persistible aplicando el
 * protocolo de tres strikes.
 *
 * # Logic:
 * 1. Online limpia la racha y reporta Online.
 * 2. 401/403 acumula; la tercera consecutiva sella NeedsCredentials.
 *    Bajo el umbral el enlace sigue vivo: Online.
 * 3. Un corte rompe la racha consecutiva y reporta Offline.
 */
pub fn resolve_probe_health(
    verdict: ProbeVerdict,
    auth_strike_registry: &mut HashMap<Uuid, u32>,
    target_identifier: Uuid,
) -> ChannelHealth {
    match verdict {
        ProbeVerdict::Online => {
            auth_strike_registry.remove(&target_identifier);
            ChannelHealth::Online
        }
        ProbeVerdict::AuthRequired => {
            let consecutive_strikes = auth_strike_registry.entry(target_identifier).or_insert(0);
            *consecutive_strikes += 1;
            if *consecutive_strikes >= AUTH_FAILURE_THRESHOLD {
                ChannelHealth::NeedsCredentials
            } else {
                ChannelHealth::Online
            }
        }
        ProbeVerdict::Offline => {
            auth_strike_registry.remove(&target_identifier);
            ChannelHealth::Offline
        }
    }
}

/**
 * Sondeo RTSP OPTIONS crudo sobre TCP.
 */
pub async fn probe_rtsp_options(host: &str, port: u16) -> ProbeVerdict {
    let probe_attempt = async {
        let mut stream = TcpStream::connect((host, port)).await.ok()?;

        let options_request = format!(
            "OPTIONS rtsp://{}:{}/ RTSP/1.0\r\nCSeq: 1\r\nUser-Agent: Panoptes-Health/1.0\r\n\r\n",
            host, port
        );
        stream.write_all(options_request.as_bytes()).await.ok()?;

        let mut response_buffer = [0u8; 512];
        let bytes_read = stream.read(&mut response_buffer).await.ok()?;
        let response_head = String::from_utf8_lossy(&response_buffer[..bytes_read]).to_string();
        response_head.lines().next().map(interpret_rtsp_status_line)
    };

    match timeout(PROBE_TIMEOUT, probe_attempt).await {
        Ok(Some(verdict)) => verdict,
        _ => ProbeVerdict::Offline,
    }
}

/// Salud efectiva de una cámara: enlace NVR (si existe) + su último
/// sondeo directo persistido.
pub async fn effective_camera_status(state: &AppState, camera: &Camera) -> EffectiveChannelStatus {
    let owning_nvr_status: Option<NvrStatus> = state
        .nvr_repository
        .linked_channel_health(&camera.id)
        .await
        .ok()
        .flatten()
        .map(|(nvr_status, _channel_status)| nvr_status);

    resolve_effective_channel_status(owning_nvr_status, camera.direct_status)
}

/// Sondea los canales de un grabador vivo y persiste sus veredictos.
async fn sweep_nvr_channels(
    state: &AppState,
    nvr_id: &Uuid,
    auth_strike_registry: &mut HashMap<Uuid, u32>,
) {
    let channels = match state.nvr_repository.list_channels_for_nvr(nvr_id).await {
        Ok(channels) => channels,
        Err(inventory_fault) => {
            warn!("⚠️ [HEALTH_MONITOR]: Channel inventory unavailable: {}", inventory_fault);
            return;
        }
    };

    for channel in channels {
        let Some(stream_url) = channel.rtsp_main.as_deref() else { continue };
        let Some((channel_host, channel_port)) = parse_rtsp_authority(stream_url) else { continue };

        let channel_verdict = probe_rtsp_options(&channel_host, channel_port).await;
        let fresh_health = resolve_probe_health(channel_verdict, auth_strike_registry, channel.id);

        if fresh_health != channel.direct_status {
            if let Err(status_fault) = state.nvr_repository.update_channel_status(&channel.id, fresh_health).await {
                warn!("⚠️ [HEALTH_MONITOR]: Channel status update failed for [{}]: {}",
                    channel.name, status_fault);
            } else {
                info!("🫀 [HEALTH_SHIFT]: Channel [{}] {} -> {}.",
                    channel.name, channel.direct_status.as_label(), fresh_health.as_label());
            }
        }
    }
}

/// Sondea las cámaras de acceso directo y persiste sus veredictos.
async fn sweep_direct_cameras(
    state: &AppState,
    auth_strike_registry: &mut HashMap<Uuid, u32>,
) {
    let probe_targets = match state.camera_repository.list_probe_targets(PROBE_TARGET_CAP).await {
        Ok(cameras) => cameras,
        Err(inventory_fault) => {
            warn!("⚠️ [HEALTH_MONITOR]: Camera inventory unavailable: {}", inventory_fault);
            return;
        }
    };

    for camera in probe_targets {
        let Some(stream_url) = camera.rtsp_url.as_deref() else { continue };
        let Some((camera_host, camera_port)) = parse_rtsp_authority(stream_url) else { continue };

        let camera_verdict = probe_rtsp_options(&camera_host, camera_port).await;
        let fresh_health = resolve_probe_health(camera_verdict, auth_strike_registry, camera.id);

        if fresh_health != camera.direct_status {
            if let Err(status_fault) = state.camera_repository.update_direct_status(&camera.id, fresh_health).await {
                warn!("⚠️ [HEALTH_MONITOR]: Camera status update failed for [{}]: {}",
                    camera.name, status_fault);
            } else {
                info!("🫀 [HEALTH_SHIFT]: Camera [{}] {} -> {}.",
                    camera.name, camera.direct_status.as_label(), fresh_health.as_label());
            }
        }
    }
}

/**
 * Daemon de vigilancia: en cada pulso sondea grabadores, los canales de
 * cada grabador vivo y las cámaras directas, aplicando la escalera de
 * backoff a los grabadores enfermos.
 */
pub fn spawn_health_monitor(state: AppState, mut stop_signal: watch::Receiver<bool>) {
    tokio::spawn(async move {
        info!("🫀 [HEALTH_MONITOR]: Surveillance loop online ({}s pulse).", MONITOR_PULSE.as_secs());

        // Rastro en RAM: rachas 401/403 por objetivo e intentos fallidos
        // por grabador.
        let mut auth_strike_registry: HashMap<Uuid, u32> = HashMap::new();
        let mut consecutive_probe_failures: HashMap<Uuid, usize> = HashMap::new();

        loop {
            tokio::select! {
                _ = sleep(MONITOR_PULSE) => {},
                _ = stop_signal.changed() => {
                    if *stop_signal.borrow() {
                        info!("🛑 [HEALTH_MONITOR]: Stop signal honored.");
                        return;
                    }
                }
            }

            // --- 1. GRABADORES Y SUS CANALES ---
            let due_nvrs = match state.nvr_repository.list_due_for_census(PROBE_TARGET_CAP).await {
                Ok(nvrs) => nvrs,
                Err(query_fault) => {
                    warn!("⚠️ [HEALTH_MONITOR]: NVR inventory unavailable: {}", query_fault);
                    continue;
                }
            };

            for nvr in due_nvrs {
                // Backoff individual antes de re-sondear un objetivo enfermo.
                let failed_attempts = consecutive_probe_failures.get(&nvr.id).copied().unwrap_or(0);
                if failed_attempts > 0 {
                    sleep(backoff_with_jitter(failed_attempts - 1)).await;
                }

                let device_verdict = probe_rtsp_options(&nvr.host, 554).await;
                let fresh_status = match device_verdict {
                    // Un dispositivo que responde (aunque exija credenciales)
                    // prueba que el enlace está vivo.
                    ProbeVerdict::Online | ProbeVerdict::AuthRequired => {
                        consecutive_probe_failures.remove(&nvr.id);
                        NvrStatus::Online
                    }
                    ProbeVerdict::Offline => {
                        *consecutive_probe_failures.entry(nvr.id).or_insert(0) += 1;
                        NvrStatus::Offline
                    }
                };

                if fresh_status != nvr.status {
                    if let Err(status_fault) = state.nvr_repository.update_status(&nvr.id, fresh_status).await {
                        warn!("⚠️ [HEALTH_MONITOR]: Status update failed for [{}]: {}", nvr.name, status_fault);
                    } else {
                        info!("🫀 [HEALTH_SHIFT]: NVR [{}] {} -> {}.",
                            nvr.name, nvr.status.as_label(), fresh_status.as_label());
                    }
                }

                // Los canales de un grabador muerto no se sondean: su
                // salud efectiva ya la fuerza la propagación nvr_offline.
                if fresh_status != NvrStatus::Offline {
                    sweep_nvr_channels(&state, &nvr.id, &mut auth_strike_registry).await;
                }
            }

            // --- 2. CÁMARAS DE SONDEO DIRECTO ---
            sweep_direct_cameras(&state, &mut auth_strike_registry).await;
        }
    });
}
