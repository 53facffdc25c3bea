// [apps/control-plane/src/kernel.rs]
/**
 * =================================================================
 * APARATO: CONTROL PLANE SOVEREIGN KERNEL (V14.0 - GUARD ACTIVE)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la placa base donde se conectan todos los servicios:
 * pipeline de auditoría, centinela de licencia, censo NVR, monitor de
 * salud y el transporte HTTP. Todos los daemons comparten una señal de
 * paro única que se dispara en el apagado del transporte.
 * =================================================================
 */

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::ControlPlaneConfig;
use crate::routes::create_control_plane_router;
use crate::services::health_monitor::spawn_health_monitor;
use crate::services::nvr_census::spawn_census_daemon;
use crate::state::AppState;

pub struct ControlPlaneKernel {
    pub application_shared_state: AppState,
    stop_sender: watch::Sender<bool>,
}

impl ControlPlaneKernel {
    /**
     * Realiza la ignición del estado maestro completo.
     * Establece la conexión a la base y las autoridades criptográficas
     * antes de levantar cualquier servicio.
     */
    pub async fn ignite(config: ControlPlaneConfig) -> Result<Self> {
        let (stop_sender, stop_receiver) = watch::channel(false);
        let application_shared_state = AppState::ignite(Arc::new(config), stop_receiver).await?;

        Ok(Self { application_shared_state, stop_sender })
    }

    /**
     * Lanza los daemons autónomos y el servidor HTTP principal.
     */
    pub async fn launch_control_plane_operations(self) -> Result<()> {
        let shared_application_state = self.application_shared_state.clone();
        let stop_signal = self.stop_sender.subscribe();

        // --- 1. CENTINELA DE LICENCIA (watcher + scheduler) ---
        shared_application_state.license_sentinel.clone().spawn_watcher(stop_signal.clone());
        shared_application_state.license_sentinel.clone().spawn_scheduler(stop_signal.clone());

        // --- 2. CENSO DIARIO DE NVRs ---
        spawn_census_daemon(shared_application_state.clone(), stop_signal.clone());

        // --- 3. MONITOR DE SALUD (sondas RTSP + propagación) ---
        spawn_health_monitor(shared_application_state.clone(), stop_signal);

        // --- 4. IGNICIÓN DEL TRANSPORTE HTTP (AXUM) ---
        let sovereign_router = create_control_plane_router(shared_application_state.clone());

        let bind_coordinates = format!(
            "{}:{}",
            shared_application_state.config.bind_address,
            shared_application_state.config.port
        );

        let tcp_listener = tokio::net::TcpListener::bind(&bind_coordinates)
            .await
            .with_context(|| format!("CRITICAL_FAULT: Failed to bind [{}]", bind_coordinates))?;

        info!("🚀 [KERNEL_ONLINE]: Control plane listening at {}.", bind_coordinates);

        let serve_outcome = axum::serve(
            tcp_listener,
            sovereign_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("🛑 [KERNEL]: Shutdown signal received.");
        })
        .await;

        // El transporte cayó: todos los daemons honran el paro.
        let _ = self.stop_sender.send(true);

        if let Err(server_error) = serve_outcome {
            error!("💀 [KERNEL_COLLAPSE]: Runtime failure: {}", server_error);
            return Err(server_error.into());
        }
        Ok(())
    }
}
