// [libs/infra/media-client/src/lib.rs]
/*!
 * =================================================================
 * APARATO: MEDIA PLANE CLIENT HUB (V7.0 - DUAL UPLINK)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ENLACES HACIA EL PLANO DE MEDIOS Y EL SFU
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BACKGROUND DEADLINES: Las acciones que arrancan pipelines viven en
 *    tareas desacopladas de la petición HTTP de origen; la desconexión
 *    del navegador jamás cancela una ignición de ingesta.
 * 2. INTERNAL TRUST: El SFU exige 'X-Internal-Auth'; el secreto vive en
 *    el entorno y jamás en el rastro de logs.
 * =================================================================
 */

pub mod errors;
pub mod media;
pub mod proto;
pub mod sfu;

pub use errors::MediaClientError;
pub use media::MediaPlaneClient;
pub use sfu::{SfuClient, SfuIngestTransport};
