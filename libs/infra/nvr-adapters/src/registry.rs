// [libs/infra/nvr-adapters/src/registry.rs]
/*!
 * =================================================================
 * APARATO: VENDOR ADAPTER REGISTRY (V10.0 - RTSP FALLBACK)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: DESPACHO ETIQUETADO Y CONTRATO DE CAPACIDADES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FIXED CAPABILITY SET: GetDeviceInfo, ListChannels, GetRtspUrls,
 *    FetchEvents, Kind. Ni más, ni menos.
 * 2. UNKNOWN -> TEMPLATE: Un fabricante no registrado cae al adaptador
 *    genérico de plantilla RTSP en lugar de fallar.
 * 3. BOUNDED OUTPUTS: Los techos de sanitización se aplican aquí, en el
 *    único punto de salida del estrato.
 * =================================================================
 */

use std::time::Duration;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dahua::DahuaAdapter;
use crate::errors::AdapterError;
use crate::hikvision::HikvisionAdapter;
use crate::onvif::OnvifAdapter;
use crate::rtsp_template::RtspTemplateAdapter;
use crate::sanitize::{cap_event_payload, sanitize_rtsp_url, MAX_CHANNELS_PER_CALL, MAX_EVENTS_PER_CALL};
use panoptes_domain_models::NvrVendor;

/// Ventana nominal de toda llamada a un grabador.
pub const ADAPTER_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Coordenadas y credenciales de un grabador concreto.
#[derive(Debug, Clone)]
pub struct AdapterTarget {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Plantilla RTSP para el adaptador genérico:
    /// admite {host}, {port} y {channel}.
    pub rtsp_template: Option<String>,
}

/// Identidad reportada por el dispositivo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub vendor_label: String,
    pub model: String,
    pub firmware: String,
    pub serial: String,
}

/// Canal descubierto, ya sanitizado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredChannel {
    pub channel_ref: String,
    pub name: String,
    pub rtsp_main: Option<String>,
    pub rtsp_sub: Option<String>,
}

/// Evento de dispositivo, con payload acotado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub event_type: String,
    pub channel_ref: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub payload: String,
}

/// Variante etiquetada sobre el conjunto fijo de capacidades.
pub enum VendorAdapter {
    Hikvision(HikvisionAdapter),
    Dahua(DahuaAdapter),
    Onvif(OnvifAdapter),
    RtspTemplate(RtspTemplateAdapter),
}

impl VendorAdapter {
    pub fn kind(&self) -> NvrVendor {
        match self {
            Self::Hikvision(_) => NvrVendor::Hikvision,
            Self::Dahua(_) => NvrVendor::Dahua,
            Self::Onvif(_) => NvrVendor::Onvif,
            Self::RtspTemplate(_) => NvrVendor::RtspTemplate,
        }
    }

    pub async fn get_device_info(&self, target: &AdapterTarget) -> Result<DeviceInfo, AdapterError> {
        match self {
            Self::Hikvision(adapter) => adapter.get_device_info(target).await,
            Self::Dahua(adapter) => adapter.get_device_info(target).await,
            Self::Onvif(adapter) => adapter.get_device_info(target).await,
            Self::RtspTemplate(adapter) => adapter.get_device_info(target),
        }
    }

    /// Canales descubiertos, sanitizados y acotados a 512.
    pub async fn list_channels(&self, target: &AdapterTarget) -> Result<Vec<DiscoveredChannel>, AdapterError> {
        let mut raw_channels = match self {
            Self::Hikvision(adapter) => adapter.list_channels(target).await?,
            Self::Dahua(adapter) => adapter.list_channels(target).await?,
            Self::Onvif(adapter) => adapter.list_channels(target).await?,
            Self::RtspTemplate(adapter) => adapter.list_channels(target)?,
        };

        raw_channels.truncate(MAX_CHANNELS_PER_CALL);
        for channel in &mut raw_channels {
            channel.rtsp_main = channel.rtsp_main.as_deref().and_then(sanitize_rtsp_url);
            channel.rtsp_sub = channel.rtsp_sub.as_deref().and_then(sanitize_rtsp_url);
        }

        debug!("📡 [ADAPTER]: {} channel(s) surfaced via {}.", raw_channels.len(), self.kind().as_label());
        Ok(raw_channels)
    }

    /// URLs de stream (main, sub) de un canal, sanitizadas.
    pub async fn get_rtsp_urls(
        &self,
        target: &AdapterTarget,
        channel_ref: &str,
    ) -> Result<(Option<String>, Option<String>), AdapterError> {
        let (raw_main, raw_sub) = match self {
            Self::Hikvision(adapter) => adapter.get_rtsp_urls(target, channel_ref),
            Self::Dahua(adapter) => adapter.get_rtsp_urls(target, channel_ref),
            Self::Onvif(adapter) => adapter.get_rtsp_urls(target, channel_ref),
            Self::RtspTemplate(adapter) => adapter.get_rtsp_urls(target, channel_ref)?,
        };

        Ok((
            raw_main.as_deref().and_then(sanitize_rtsp_url),
            raw_sub.as_deref().and_then(sanitize_rtsp_url),
        ))
    }

    /// Eventos del dispositivo, acotados a 200 con payloads de 8 KiB.
    pub async fn fetch_events(
        &self,
        target: &AdapterTarget,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeviceEvent>, AdapterError> {
        let effective_limit = limit.min(MAX_EVENTS_PER_CALL);

        let mut raw_events = match self {
            Self::Hikvision(adapter) => adapter.fetch_events(target, since, effective_limit).await?,
            Self::Dahua(adapter) => adapter.fetch_events(target, since, effective_limit).await?,
            Self::Onvif(adapter) => adapter.fetch_events(target, since, effective_limit).await?,
            Self::RtspTemplate(_) => Vec::new(),
        };

        raw_events.truncate(effective_limit);
        for event in &mut raw_events {
            event.payload = cap_event_payload(&event.payload);
        }
        Ok(raw_events)
    }
}

/// Fábrica de adaptadores con cliente HTTP endurecido compartido.
#[derive(Clone)]
pub struct AdapterRegistry {
    http_client: Client,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        let hardened_client = Client::builder()
            .timeout(ADAPTER_CALL_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .user_agent("Panoptes-NVR-Census/1.0")
            .build()
            .expect("FATAL: Failed to initialize NVR uplink client.");

        Self { http_client: hardened_client }
    }

    /**
     * Resuelve el adaptador para una etiqueta de fabricante.
     * Lo desconocido cae a la plantilla RTSP genérica.
     */
    pub fn resolve(&self, vendor_label: &str) -> VendorAdapter {
        match NvrVendor::from_label(vendor_label) {
            NvrVendor::Hikvision => VendorAdapter::Hikvision(HikvisionAdapter::new(self.http_client.clone())),
            NvrVendor::Dahua => VendorAdapter::Dahua(DahuaAdapter::new(self.http_client.clone())),
            NvrVendor::Onvif => VendorAdapter::Onvif(OnvifAdapter::new(self.http_client.clone())),
            NvrVendor::RtspTemplate => VendorAdapter::RtspTemplate(RtspTemplateAdapter::new()),
        }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_unknown_vendor_falls_back_to_template() {
        let registry = AdapterRegistry::new();

        assert_eq!(registry.resolve("hikvision").kind(), NvrVendor::Hikvision);
        assert_eq!(registry.resolve("dahua").kind(), NvrVendor::Dahua);
        assert_eq!(registry.resolve("onvif").kind(), NvrVendor::Onvif);
        assert_eq!(registry.resolve("acme-9000").kind(), NvrVendor::RtspTemplate);
        println!("✅ REGISTRY: Vendor fallback certified.");
    }

    #[tokio::test]
    async fn certify_template_channels_are_sanitized_and_capped() {
        let registry = AdapterRegistry::new();
        let adapter = registry.resolve("unknown-brand");

        let target = AdapterTarget {
            host: "10.0.0.9".into(),
            port: 554,
            username: Some("admin".into()),
            password: Some("hunter2".into()),
            rtsp_template: Some("rtsp://admin:hunter2@{host}:{port}/live/{channel}?token=abc".into()),
        };

        let channels = adapter.list_channels(&target).await.unwrap();
        assert!(!channels.is_empty());
        assert!(channels.len() <= MAX_CHANNELS_PER_CALL);

        for channel in &channels {
            let main_url = channel.rtsp_main.as_deref().unwrap();
            assert!(!main_url.contains("hunter2"), "Secreto filtrado en {}", main_url);
            assert!(!main_url.contains("token=abc"));
        }
    }
}
