// [apps/control-plane/src/main.rs]
/*!
 * =================================================================
 * APARATO: CONTROL PLANE MAIN ENTRY POINT (V14.0 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El proceso garantiza que las autoridades criptográficas (keyring,
 * firma de tokens, llaves HLS) se validen ANTES de abrir el socket TCP,
 * previniendo ventanas donde una petición alcance un plano de control
 * con secretos a medias.
 * =================================================================
 */

use dotenvy::dotenv;
use panoptes_control_plane::prelude::*;
use panoptes_shared_watchtower::init_tracing;
use tracing::info;

/**
 * Punto de ignición supremo del binario del Plano de Control.
 */
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO SOBERANO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD (WATCHTOWER)
    init_tracing("panoptes_control_plane");

    // 3. RUNTIME SOBERANO
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        info!("🛰️  [CONTROL_PLANE]: Global ignition sequence starting...");

        // 4. CAPTURA ÚNICA DE CONFIGURACIÓN
        let config = ControlPlaneConfig::from_environment()?;

        // 5. CONSTRUCCIÓN Y LANZAMIENTO DEL KERNEL
        let kernel_instance = ControlPlaneKernel::ignite(config).await?;
        kernel_instance.launch_control_plane_operations().await?;

        Ok(())
    })
}
