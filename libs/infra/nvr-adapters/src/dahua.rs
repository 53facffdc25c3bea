// [libs/infra/nvr-adapters/src/dahua.rs]
/*!
 * =================================================================
 * APARATO: DAHUA CGI ADAPTER (V6.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CAPACIDADES SOBRE LA SUPERFICIE CGI KEY=VALUE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LINE PROTOCOL: Dahua responde 'clave=valor' por línea; el parseo
 *    es un recorrido plano tolerante a firmware excéntrico.
 * 2. SUBTYPE SCHEMA: El stream principal es subtype=0 y el secundario
 *    subtype=1 bajo /cam/realmonitor.
 * =================================================================
 */

use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::errors::AdapterError;
use crate::registry::{AdapterTarget, DeviceEvent, DeviceInfo, DiscoveredChannel};

/// Parseo plano de un cuerpo 'clave=valor' por línea.
pub(crate) fn parse_key_value_body(body: &str) -> BTreeMap<String, String> {
    body.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

pub struct DahuaAdapter {
    http_client: Client,
}

impl DahuaAdapter {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }

    async fn cgi_get(&self, target: &AdapterTarget, path_and_query: &str) -> Result<String, AdapterError> {
        let mut request = self.http_client
            .get(format!("http://{}:{}{}", target.host, target.port, path_and_query));

        if let Some(username) = &target.username {
            request = request.basic_auth(username, target.password.as_deref());
        }

        let response = request.send().await.map_err(AdapterError::from_network_fault)?;

        match response.status().as_u16() {
            401 | 403 => Err(AdapterError::AuthRejected),
            status if status >= 400 => Err(AdapterError::Upstream(format!("CGI_STATUS_{}", status))),
            _ => response.text().await.map_err(AdapterError::from_network_fault),
        }
    }

    pub async fn get_device_info(&self, target: &AdapterTarget) -> Result<DeviceInfo, AdapterError> {
        let type_body = self.cgi_get(target, "/cgi-bin/magicBox.cgi?action=getDeviceType").await?;
        let version_body = self.cgi_get(target, "/cgi-bin/magicBox.cgi?action=getSoftwareVersion").await?;
        let serial_body = self.cgi_get(target, "/cgi-bin/magicBox.cgi?action=getSerialNo").await?;

        let type_fields = parse_key_value_body(&type_body);
        let version_fields = parse_key_value_body(&version_body);
        let serial_fields = parse_key_value_body(&serial_body);

        Ok(DeviceInfo {
            vendor_label: "dahua".into(),
            model: type_fields.get("type").cloned().unwrap_or_default(),
            firmware: version_fields.get("version").cloned().unwrap_or_default(),
            serial: serial_fields.get("sn").cloned().unwrap_or_default(),
        })
    }

    pub async fn list_channels(&self, target: &AdapterTarget) -> Result<Vec<DiscoveredChannel>, AdapterError> {
        let titles_body = self.cgi_get(target, "/cgi-bin/configManager.cgi?action=getConfig&name=ChannelTitle").await?;
        let title_fields = parse_key_value_body(&titles_body);

        // Claves con forma 'table.ChannelTitle[N].Name'.
        let mut discovered_channels = Vec::new();
        for (config_key, channel_title) in &title_fields {
            let Some(index_start) = config_key.find('[') else { continue };
            let Some(index_end) = config_key.find(']') else { continue };
            if !config_key.ends_with(".Name") {
                continue;
            }

            let Ok(channel_index) = config_key[index_start + 1..index_end].parse::<u32>() else {
                continue;
            };
            // La numeración CGI es base 0; la referencia operativa es base 1.
            let channel_ref = (channel_index + 1).to_string();
            let (rtsp_main, rtsp_sub) = self.stream_urls(target, &channel_ref);

            discovered_channels.push(DiscoveredChannel {
                channel_ref,
                name: channel_title.clone(),
                rtsp_main: Some(rtsp_main),
                rtsp_sub: Some(rtsp_sub),
            });
        }
        Ok(discovered_channels)
    }

    fn stream_urls(&self, target: &AdapterTarget, channel_ref: &str) -> (String, String) {
        (
            format!("rtsp://{}:554/cam/realmonitor?channel={}&subtype=0", target.host, channel_ref),
            format!("rtsp://{}:554/cam/realmonitor?channel={}&subtype=1", target.host, channel_ref),
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
        let events_body = self.cgi_get(
            target,
            "/cgi-bin/eventManager.cgi?action=getEventIndexes&code=VideoMotion",
        ).await?;

        let surfaced_events = parse_key_value_body(&events_body)
            .into_iter()
            .take(limit)
            .map(|(event_key, channel_value)| DeviceEvent {
                event_type: "VideoMotion".into(),
                channel_ref: Some(channel_value),
                occurred_at: Utc::now(),
                payload: event_key,
            })
            .collect();

        Ok(surfaced_events)
    }
}
