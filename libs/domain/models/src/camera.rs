// [libs/domain/models/src/camera.rs]
/*!
 * =================================================================
 * APARATO: SURVEILLANCE TOPOLOGY MODELS (V13.0 - HEALTH AWARE)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: SITES, CÁMARAS, NVRs, CANALES Y SALUD EFECTIVA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MANY-TO-MANY LINKING: Cámara y canal NVR se asocian por tabla de
 *    enlace con modo de grabación; no hay ciclos de sustancia.
 * 2. STATUS PROPAGATION: La salud efectiva de un canal deriva del NVR
 *    propietario cuando este se declara offline.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

/// Instalación física dentro de un tenant.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Cámara registrada; pertenece a un site.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub site_id: Uuid,
    pub name: String,
    /// URL RTSP directa (sin credenciales embebidas; estas viven cifradas).
    pub rtsp_url: Option<String>,
    pub is_enabled: bool,
    /// Último veredicto del sondeo directo, persistido por el monitor.
    pub direct_status: ChannelHealth,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fabricantes con adaptador dedicado; lo desconocido cae a plantilla RTSP.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NvrVendor {
    Hikvision,
    Dahua,
    Onvif,
    RtspTemplate,
}

impl NvrVendor {
    pub fn from_label(label: &str) -> Self {
        match label {
            "hikvision" => Self::Hikvision,
            "dahua" => Self::Dahua,
            "onvif" => Self::Onvif,
            _ => Self::RtspTemplate,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Hikvision => "hikvision",
            Self::Dahua => "dahua",
            Self::Onvif => "onvif",
            Self::RtspTemplate => "rtsp_template",
        }
    }
}

/// Liveness del NVR reportada por el monitor de salud.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NvrStatus {
    Unknown,
    Online,
    Offline,
}

impl NvrStatus {
    pub fn from_label(label: &str) -> Self {
        match label {
            "online" => Self::Online,
            "offline" => Self::Offline,
            _ => Self::Unknown,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// Salud de canal/cámara tras sondeo directo y propagación.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelHealth {
    Unknown,
    Online,
    Offline,
    NeedsCredentials,
}

impl ChannelHealth {
    pub fn from_label(label: &str) -> Self {
        match label {
            "online" => Self::Online,
            "offline" => Self::Offline,
            "needs_credentials" => Self::NeedsCredentials,
            _ => Self::Unknown,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Online => "online",
            Self::Offline => "offline",
            Self::NeedsCredentials => "needs_credentials",
        }
    }
}

/// Grabador de red registrado en un site.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nvr {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub site_id: Uuid,
    pub name: String,
    pub vendor: NvrVendor,
    pub host: String,
    pub port: u16,
    pub status: NvrStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Canal físico descubierto en un NVR.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NvrChannel {
    pub id: Uuid,
    pub nvr_id: Uuid,
    /// Referencia vendor-specific del canal (ej. "101", "D1").
    pub channel_ref: String,
    pub name: String,
    pub rtsp_main: Option<String>,
    pub rtsp_sub: Option<String>,
    pub direct_status: ChannelHealth,
    pub created_at: DateTime<Utc>,
}

/// Modo de grabación acordado para un enlace canal-cámara.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    Continuous,
    Motion,
    Manual,
}

impl RecordingMode {
    pub fn from_label(label: &str) -> Self {
        match label {
            "continuous" => Self::Continuous,
            "motion" => Self::Motion,
            _ => Self::Manual,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Motion => "motion",
            Self::Manual => "manual",
        }
    }
}

/// Tabla de enlace cámara <-> canal.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NvrChannelLink {
    pub channel_id: Uuid,
    pub camera_id: Uuid,
    pub recording_mode: RecordingMode,
}

/// Salud efectiva renderizada hacia el operador.
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveChannelStatus {
    pub status: ChannelHealth,
    pub reason: Option<String>,
}

/**
 * Resuelve la salud efectiva de un canal.
 *
 * # Logic:
 * 1. Sin enlace a NVR: manda el sondeo directo de la cámara.
 * 2. NVR offline: fuerza OFFLINE con razón 'nvr_offline'.
 * 3. NVR unknown/online: manda el sondeo directo.
 */
pub fn resolve_effective_channel_status(
    owning_nvr_status: Option<NvrStatus>,
    direct_probe_status: ChannelHealth,
) -> EffectiveChannelStatus {
    match owning_nvr_status {
        Some(NvrStatus::Offline) => EffectiveChannelStatus {
            status: ChannelHealth::Offline,
            reason: Some("nvr_offline".to_string()),
        },
        _ => EffectiveChannelStatus {
            status: direct_probe_status,
            reason: None,
        },
    }
}
