// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (V9.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. REASON PARITY: Cada variante transporta un identificador estable
 *    que el borde HTTP traduce a su código de estado (§ catálogo API).
 * 2. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico con el motor libSQL local o remoto.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo de configuración del entorno (URL vacía o malformada).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// La entidad solicitada no existe dentro del alcance del tenant.
    #[error("[L3_DB_FAULT]: NOT_FOUND")]
    NotFound,

    /// Violación de unicidad (email vivo duplicado, digest repetido).
    #[error("[L3_DB_FAULT]: CONFLICT")]
    Conflict,

    /// La fila no se encuentra en un estado apto para la transición.
    #[error("[L3_DB_FAULT]: INVALID_STATE_TRANSITION")]
    InvalidState,

    /// Colapso al comprometer una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE -> {0}")]
    TransactionCollapse(String),
}

impl DbError {
    /// Discrimina violaciones de unicidad del motor para elevarlas a Conflict.
    pub fn from_execution_fault(fault: libsql::Error) -> Self {
        if fault.to_string().contains("UNIQUE constraint failed") {
            return Self::Conflict;
        }
        Self::QueryError(fault)
    }
}
