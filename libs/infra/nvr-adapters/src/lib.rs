// [libs/infra/nvr-adapters/src/lib.rs]
/*!
 * =================================================================
 * APARATO: NVR ADAPTER HUB (V9.0 - VENDOR DISPATCH)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CAPACIDADES UNIFORMES SOBRE FABRICANTES HETEROGÉNEOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TAGGED DISPATCH: El adaptador es una variante etiquetada sobre un
 *    conjunto fijo de capacidades; un fabricante nuevo es una variante
 *    nueva más su fábrica, jamás una jerarquía de herencia.
 * 2. SANITIZE EVERYTHING: Toda salida de adaptador cruza el filtro de
 *    sanitización: credenciales fuera de URLs, parámetros sensibles
 *    incinerados, payloads acotados.
 * =================================================================
 */

pub mod dahua;
pub mod errors;
pub mod hikvision;
pub mod onvif;
pub mod registry;
pub mod rtsp_template;
pub mod sanitize;

pub use errors::AdapterError;
pub use registry::{AdapterRegistry, AdapterTarget, DeviceEvent, DeviceInfo, DiscoveredChannel, VendorAdapter};
pub use sanitize::{sanitize_rtsp_url, MAX_CHANNELS_PER_CALL, MAX_EVENTS_PER_CALL, MAX_EVENT_PAYLOAD_BYTES};
