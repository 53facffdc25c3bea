// [libs/infra/db/src/client.rs]
/*!
 * =================================================================
 * APARATO: DATABASE CONNECTION CLIENT (V11.2 - MEMORY ANCHORED)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GESTIÓN DE ENLACES libSQL Y BOOTSTRAP DE ESQUEMA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. AIR-GAP FIRST: El appliance opera contra un archivo local; el modo
 *    remoto (libsql://) queda para réplicas de laboratorio.
 * 2. MEMORY ANCHOR: En modo RAM el cliente retiene una conexión ancla
 *    para que el esquema sea visible entre hilos de prueba.
 *
 * # Mathematical Proof (In-Memory Consistency):
 * Con URLs de memoria compartida, el ancla se abre ANTES del bootstrap
 * del esquema, garantizando que las tablas residan en un segmento de
 * memoria común a todas las conexiones posteriores.
 * =================================================================
 */

use crate::errors::DbError;
use crate::schema::apply_control_plane_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{error, info, instrument};

#[derive(Clone)]
pub struct SovereignDbClient {
    internal_database_driver: Arc<Database>,
    /// Mantiene viva la base en memoria evitando que SQLite la purgue.
    _memory_persistence_anchor: Option<Arc<Connection>>,
}

impl SovereignDbClient {
    #[instrument(skip(database_access_token))]
    pub async fn connect(
        database_connection_url: &str,
        database_access_token: Option<String>,
    ) -> Result<Self, DbError> {
        if database_connection_url.is_empty() {
            return Err(DbError::ConfigurationError("DATABASE_URL_UNDEFINED".into()));
        }

        info!("🔌 [DATABASE]: Initiating control-plane link to [{}]", database_connection_url);

        let is_remote = database_connection_url.starts_with("libsql://")
            || database_connection_url.starts_with("https://");

        let is_memory = database_connection_url.contains(":memory:")
            || database_connection_url.contains("mode=memory");

        let database_driver = if is_remote {
            let token = database_access_token.ok_or_else(|| {
                DbError::ConfigurationError("REMOTE_ACCESS_DENIED: token missing".into())
            })?;
            Builder::new_remote(database_connection_url.to_string(), token).build().await
        } else {
            Builder::new_local(database_connection_url).build().await
        }.map_err(|ignition_fault| DbError::ConnectionError(format!("DRIVER_IGNITION_FAILURE: {}", ignition_fault)))?;

        let shared_driver = Arc::new(database_driver);
        let mut anchor = None;

        if is_memory {
            // El ancla se abre ANTES que cualquier otra operación.
            let anchor_connection = shared_driver.connect()
                .map_err(|anchor_fault| DbError::ConnectionError(format!("ANCHOR_FAULT: {}", anchor_fault)))?;

            apply_control_plane_schema(&anchor_connection).await
                .map_err(|schema_fault| DbError::ConnectionError(format!("SCHEMA_SYNC_FAULT: {}", schema_fault)))?;

            anchor = Some(Arc::new(anchor_connection));
            info!("⚓ [DATABASE]: Memory strata solidified and anchored.");
        } else {
            let bootstrap_connection = shared_driver.connect()
                .map_err(|link_fault| DbError::ConnectionError(format!("BOOTSTRAP_LINK_FAULT: {}", link_fault)))?;
            apply_control_plane_schema(&bootstrap_connection).await
                .map_err(|schema_fault| DbError::ConnectionError(format!("SCHEMA_SYNC_FAULT: {}", schema_fault)))?;
        }

        Ok(Self {
            internal_database_driver: shared_driver,
            _memory_persistence_anchor: anchor,
        })
    }

    pub fn get_connection(&self) -> Result<Connection, DbError> {
        self.internal_database_driver.connect().map_err(|allocation_fault| {
            error!("⚠️ [POOL_FAULT]: Connection allocation failed: {}", allocation_fault);
            DbError::ConnectionError(allocation_fault.to_string())
        })
    }
}
