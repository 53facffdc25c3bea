// [libs/infra/nvr-adapters/src/onvif.rs]
/*!
 * =================================================================
 * APARATO: ONVIF DEVICE ADAPTER (V5.0 - MINIMAL SOAP)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CAPACIDADES SOBRE EL PERFIL ONVIF BÁSICO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MINIMAL SOAP: Solo GetDeviceInformation y GetProfiles; el sobre
 *    SOAP se construye en línea y la respuesta se lee por etiquetas
 *    planas (los namespaces varían entre fabricantes).
 * =================================================================
 */

use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::errors::AdapterError;
use crate::hikvision::extract_xml_tag;
use crate::registry::{AdapterTarget, DeviceEvent, DeviceInfo, DiscoveredChannel};

const SOAP_GET_DEVICE_INFORMATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Body>
    <GetDeviceInformation xmlns="http://www.onvif.org/ver10/device/wsdl"/>
  </s:Body>
</s:Envelope>"#;

const SOAP_GET_PROFILES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Body>
    <GetProfiles xmlns="http://www.onvif.org/ver10/media/wsdl"/>
  </s:Body>
</s:Envelope>"#;

/// Extracción tolerante a namespace: acepta '<tag>' o '<prefix:tag>'.
fn extract_namespaced_tag(xml_body: &str, local_name: &str) -> Option<String> {
    if let Some(found) = extract_xml_tag(xml_body, local_name) {
        return Some(found);
    }

    // Variante con prefijo arbitrario: localiza el cierre '</prefix:tag>'
    // y toma el contenido entre el '>' previo y ese cierre.
    let closing_marker = format!(":{}>", local_name);
    let mut search_from = 0;
    while let Some(relative_position) = xml_body[search_from..].find(&closing_marker) {
        let marker_position = search_from + relative_position;
        if let Some(tag_open) = xml_body[..marker_position].rfind('<') {
            if xml_body[tag_open..].starts_with("</") {
                let content_start = xml_body[..tag_open].rfind('>')? + 1;
                return Some(xml_body[content_start..tag_open].trim().to_string());
            }
        }
        search_from = marker_position + closing_marker.len();
    }
    None
}

pub struct OnvifAdapter {
    http_client: Client,
}

impl OnvifAdapter {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }

    async fn soap_post(&self, target: &AdapterTarget, envelope: &str) -> Result<String, AdapterError> {
        let response = self.http_client
            .post(format!("http://{}:{}/onvif/device_service", target.host, target.port))
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .body(envelope.to_string())
            .send()
            .await
            .map_err(AdapterError::from_network_fault)?;

        match response.status().as_u16() {
            401 | 403 => Err(AdapterError::AuthRejected),
            status if status >= 400 => Err(AdapterError::Upstream(format!("ONVIF_STATUS_{}", status))),
            _ => response.text().await.map_err(AdapterError::from_network_fault),
        }
    }

    pub async fn get_device_info(&self, target: &AdapterTarget) -> Result<DeviceInfo, AdapterError> {
        let xml_body = self.soap_post(target, SOAP_GET_DEVICE_INFORMATION).await?;

        Ok(DeviceInfo {
            vendor_label: "onvif".into(),
            model: extract_namespaced_tag(&xml_body, "Model").unwrap_or_default(),
            firmware: extract_namespaced_tag(&xml_body, "FirmwareVersion").unwrap_or_default(),
            serial: extract_namespaced_tag(&xml_body, "SerialNumber").unwrap_or_default(),
        })
    }

    pub async fn list_channels(&self, target: &AdapterTarget) -> Result<Vec<DiscoveredChannel>, AdapterError> {
        let xml_body = self.soap_post(target, SOAP_GET_PROFILES).await?;

        // Cada perfil declara 'token="..."' en su atributo de apertura.
        let mut discovered_channels = Vec::new();
        for (profile_index, profile_block) in xml_body.split("token=\"").skip(1).enumerate() {
            let Some(token_end) = profile_block.find('"') else { continue };
            let profile_token = &profile_block[..token_end];

            discovered_channels.push(DiscoveredChannel {
                channel_ref: profile_token.to_string(),
                name: format!("Profile {}", profile_index + 1),
                rtsp_main: Some(self.stream_url(target, profile_token)),
                rtsp_sub: None,
            });
        }
        Ok(discovered_channels)
    }

    fn stream_url(&self, target: &AdapterTarget, profile_token: &str) -> String {
        format!("rtsp://{}:554/onvif/streaming?profile={}", target.host, profile_token)
    }

    pub fn get_rtsp_urls(&self, target: &AdapterTarget, channel_ref: &str) -> (Option<String>, Option<String>) {
        (Some(self.stream_url(target, channel_ref)), None)
    }

    pub async fn fetch_events(
        &self,
        _target: &AdapterTarget,
        _since: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<DeviceEvent>, AdapterError> {
        // El perfil básico no suscribe eventos pull-point.
        Ok(Vec::new())
    }
}
