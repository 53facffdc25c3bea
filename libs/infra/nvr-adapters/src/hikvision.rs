// [libs/infra/nvr-adapters/src/hikvision.rs]
/*!
 * =================================================================
 * APARATO: HIKVISION ISAPI ADAPTER (V7.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CAPACIDADES SOBRE LA SUPERFICIE ISAPI/XML
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LOOSE XML EXTRACTION: El XML de ISAPI se lee por etiquetas planas;
 *    un firmware excéntrico degrada a campos vacíos, jamás a pánico.
 * 2. CHANNEL SCHEMA: El stream principal de un canal N es 'N01' y el
 *    secundario 'N02' bajo /Streaming/Channels.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::errors::AdapterError;
use crate::registry::{AdapterTarget, DeviceEvent, DeviceInfo, DiscoveredChannel};

/// Extracción plana del primer contenido de una etiqueta XML.
pub(crate) fn extract_xml_tag(xml_body: &str, tag_name: &str) -> Option<String> {
    let opening = format!("<{}>", tag_name);
    let closing = format!("</{}>", tag_name);

    let content_start = xml_body.find(&opening)? + opening.len();
    let content_end = xml_body[content_start..].find(&closing)? + content_start;
    Some(xml_body[content_start..content_end].trim().to_string())
}

pub struct HikvisionAdapter {
    http_client: Client,
}

impl HikvisionAdapter {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }

    fn base_url(&self, target: &AdapterTarget) -> String {
        format!("http://{}:{}", target.host, target.port)
    }

    async fn isapi_get(&self, target: &AdapterTarget, path: &str) -> Result<String, AdapterError> {
        let mut request = self.http_client.get(format!("{}{}", self.base_url(target), path));

        if let Some(username) = &target.username {
            request = request.basic_auth(username, target.password.as_deref());
        }

        let response = request.send().await.map_err(AdapterError::from_network_fault)?;

        match response.status().as_u16() {
            401 | 403 => Err(AdapterError::AuthRejected),
            status if status >= 400 => Err(AdapterError::Upstream(format!("ISAPI_STATUS_{}", status))),
            _ => response.text().await.map_err(AdapterError::from_network_fault),
        }
    }

    pub async fn get_device_info(&self, target: &AdapterTarget) -> Result<DeviceInfo, AdapterError> {
        let xml_body = self.isapi_get(target, "/ISAPI/System/deviceInfo").await?;

        Ok(DeviceInfo {
            vendor_label: "hikvision".into(),
            model: extract_xml_tag(&xml_body, "model").unwrap_or_default(),
            firmware: extract_xml_tag(&xml_body, "firmwareVersion").unwrap_or_default(),
            serial: extract_xml_tag(&xml_body, "serialNumber").unwrap_or_default(),
        })
    }

    pub async fn list_channels(&self, target: &AdapterTarget) -> Result<Vec<DiscoveredChannel>, AdapterError> {
        let xml_body = self.isapi_get(target, "/ISAPI/ContentMgmt/InputProxy/channels").await?;

        // Recorrido plano de bloques <InputProxyChannel>.
        let mut discovered_channels = Vec::new();
        for channel_block in xml_body.split("<InputProxyChannel>").skip(1) {
            let Some(channel_identifier) = extract_xml_tag(channel_block, "id") else {
                continue;
            };
            let channel_name = extract_xml_tag(channel_block, "name")
                .unwrap_or_else(|| format!("Channel {}", channel_identifier));

            let (rtsp_main, rtsp_sub) = self.stream_urls(target, &channel_identifier);
            discovered_channels.push(DiscoveredChannel {
                channel_ref: channel_identifier,
                name: channel_name,
                rtsp_main: Some(rtsp_main),
                rtsp_sub: Some(rtsp_sub),
            });
        }
        Ok(discovered_channels)
    }

    fn stream_urls(&self, target: &AdapterTarget, channel_ref: &str) -> (String, String) {
        (
            format!("rtsp://{}:554/Streaming/Channels/{}01", target.host, channel_ref),
            format!("rtsp://{}:554/Streaming/Channels/{}02", target.host, channel_ref),
        )
    }

    pub fn get_rtsp_urls(&self, target: &AdapterTarget, channel_ref: &str) -> (Option<String>, Option<String>) {
        let (main_url, sub_url) = self.stream_urls(target, channel_ref);
        (Some(main_url), Some(sub_url))
    }

    pub async fn fetch_events(
        &self,
        target: &AdapterTarget,
        _since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeviceEvent>, AdapterError> {
        let xml_body = self.isapi_get(target, "/ISAPI/Event/notification/alertStream?format=snapshot").await?;

        let mut surfaced_events = Vec::new();
        for event_block in xml_body.split("<EventNotificationAlert>").skip(1).take(limit) {
            surfaced_events.push(DeviceEvent {
                event_type: extract_xml_tag(event_block, "eventType").unwrap_or_else(|| "unknown".into()),
                channel_ref: extract_xml_tag(event_block, "channelID"),
                occurred_at: Utc::now(),
                payload: event_block.to_string(),
            });
        }
        Ok(surfaced_events)
    }
}
