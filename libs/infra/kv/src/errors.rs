// [libs/infra/kv/src/errors.rs]
/*!
 * =================================================================
 * APARATO: VAULT ERROR CATALOG (V3.0)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DEL ALMACÉN EFÍMERO
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    /// El motor quedó inaccesible (candado envenenado o backend caído).
    #[error("[L3_KV_FAULT]: ENGINE_UNAVAILABLE -> {0}")]
    EngineUnavailable(String),

    /// Fallo de transformación entre la forma persistida y el dominio.
    #[error("[L3_KV_FAULT]: MAPPING_VIOLATION -> {0}")]
    MappingError(String),
}
