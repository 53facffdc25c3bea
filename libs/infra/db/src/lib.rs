// [libs/infra/db/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DATABASE INFRASTRUCTURE HUB (V15.0 - CONTROL PLANE)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN DEL CLIENTE, ESQUEMA Y REPOSITORIOS
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::SovereignDbClient;
pub use errors::DbError;
