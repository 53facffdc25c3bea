// [libs/infra/db/src/repositories/nvr.rs]
/*!
 * =================================================================
 * APARATO: NVR REPOSITORY (V11.0 - CENSUS READY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: GRABADORES, CANALES, ENLACES Y ELEGIBILIDAD DE CENSO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CENSUS ELIGIBILITY: El ciclo diario solo toca NVRs cuyo último
 *    censo supera las 24 horas, con techo de 200 unidades por ráfaga.
 * 2. UPSERT CHANNELS: El descubrimiento re-ejecutado converge sin
 *    duplicar canales (UNIQUE nvr_id + channel_ref).
 * =================================================================
 */

use chrono::{DateTime, Duration, Utc};
use libsql::{params, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::DbError;
use crate::repositories::{extract_datetime, extract_uuid, nullable_text};
use crate::SovereignDbClient;
use panoptes_domain_models::{ChannelHealth, Nvr, NvrChannel, NvrStatus, NvrVendor};

const NVR_PROJECTION: &str =
    "id, tenant_id, site_id, name, vendor, host, port, status, last_sync_at, created_at";

const CHANNEL_PROJECTION: &str =
    "id, nvr_id, channel_ref, name, rtsp_main, rtsp_sub, direct_status, created_at";

pub struct NvrRepository {
    database_client: SovereignDbClient,
}

impl NvrRepository {
    pub fn new(client: SovereignDbClient) -> Self {
        Self { database_client: client }
    }

    #[instrument(skip(self))]
    pub async fn create_nvr(
        &self,
        tenant_id: &Uuid,
        site_id: &Uuid,
        name: &str,
        vendor: NvrVendor,
        host: &str,
        port: u16,
    ) -> Result<Nvr, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let nvr_identifier = Uuid::new_v4();
        let created_at = Utc::now();

        database_connection.execute(
            "INSERT INTO nvrs (id, tenant_id, site_id, name, vendor, host, port, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'unknown', ?8)",
            params![
                nvr_identifier.to_string(),
                tenant_id.to_string(),
                site_id.to_string(),
                name,
                vendor.as_label(),
                host,
                port as i64,
                created_at.to_rfc3339()
            ],
        ).await.map_err(DbError::from_execution_fault)?;

        info!("🗄️ [NVR_REGISTRY]: Recorder [{}] ({}) registered.", name, vendor.as_label());

        Ok(Nvr {
            id: nvr_identifier,
            tenant_id: *tenant_id,
            site_id: *site_id,
            name: name.to_string(),
            vendor,
            host: host.to_string(),
            port,
            status: NvrStatus::Unknown,
            last_sync_at: None,
            created_at,
        })
    }

    pub async fn find_scoped(&self, tenant_id: &Uuid, nvr_id: &Uuid) -> Result<Option<Nvr>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            &format!("SELECT {NVR_PROJECTION} FROM nvrs WHERE tenant_id = ?1 AND id = ?2"),
            params![tenant_id.to_string(), nvr_id.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(self.map_row_to_nvr(data_row)?)),
            None => Ok(None),
        }
    }

    /**
     * NVRs elegibles para el censo diario: último censo > 24 h (o nunca),
     * acotados al techo por ciclo.
     */
    pub async fn list_due_for_census(&self, cycle_cap: u32) -> Result<Vec<Nvr>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let staleness_horizon = (Utc::now() - Duration::hours(24)).to_rfc3339();

        let mut query_results = database_connection.query(
            &format!(
                "SELECT {NVR_PROJECTION} FROM nvrs
                 WHERE last_sync_at IS NULL OR last_sync_at < ?1
                 ORDER BY last_sync_at ASC LIMIT ?2"
            ),
            params![staleness_horizon, cycle_cap as i64],
        ).await?;

        let mut due_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            due_collection.push(self.map_row_to_nvr(data_row)?);
        }
        Ok(due_collection)
    }

    pub async fn update_status(&self, nvr_id: &Uuid, status: NvrStatus) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection.execute(
            "UPDATE nvrs SET status = ?2 WHERE id = ?1",
            params![nvr_id.to_string(), status.as_label()],
        ).await?;
        Ok(())
    }

    pub async fn seal_census_cycle(&self, nvr_id: &Uuid, synced_at: DateTime<Utc>) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection.execute(
            "UPDATE nvrs SET last_sync_at = ?2 WHERE id = ?1",
            params![nvr_id.to_string(), synced_at.to_rfc3339()],
        ).await?;
        Ok(())
    }

    /**
     * Convergencia idempotente de un canal descubierto.
     */
    pub async fn upsert_channel(
        &self,
        nvr_id: &Uuid,
        channel_ref: &str,
        name: &str,
        rtsp_main: Option<&str>,
        rtsp_sub: Option<&str>,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection.execute(
            "INSERT INTO nvr_channels (id, nvr_id, channel_ref, name, rtsp_main, rtsp_sub, direct_status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'unknown', ?7)
             ON CONFLICT(nvr_id, channel_ref) DO UPDATE SET
                name = excluded.name,
                rtsp_main = excluded.rtsp_main,
                rtsp_sub = excluded.rtsp_sub",
            params![
                Uuid::new_v4().to_string(),
                nvr_id.to_string(),
                channel_ref,
                name,
                nullable_text(rtsp_main.map(str::to_string)),
                nullable_text(rtsp_sub.map(str::to_string)),
                Utc::now().to_rfc3339()
            ],
        ).await?;
        Ok(())
    }

    pub async fn link_channel_to_camera(
        &self,
        channel_id: &Uuid,
        camera_id: &Uuid,
        recording_mode: &str,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection.execute(
            "INSERT OR REPLACE INTO nvr_channel_links (channel_id, camera_id, recording_mode)
             VALUES (?1, ?2, ?3)",
            params![channel_id.to_string(), camera_id.to_string(), recording_mode],
        ).await?;
        Ok(())
    }

    /// Canales materializados de un grabador, para el ciclo de sondeo.
    pub async fn list_channels_for_nvr(&self, nvr_id: &Uuid) -> Result<Vec<NvrChannel>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            &format!("SELECT {CHANNEL_PROJECTION} FROM nvr_channels WHERE nvr_id = ?1 ORDER BY channel_ref"),
            params![nvr_id.to_string()],
        ).await?;

        let mut channels_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            channels_collection.push(self.map_row_to_channel(data_row)?);
        }
        Ok(channels_collection)
    }

    pub async fn update_channel_status(&self, channel_id: &Uuid, status: ChannelHealth) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection.execute(
            "UPDATE nvr_channels SET direct_status = ?2 WHERE id = ?1",
            params![channel_id.to_string(), status.as_label()],
        ).await?;
        Ok(())
    }

    /**
     * Para una cámara enlazada: (status del NVR propietario, status directo
     * del canal). None si la cámara no posee enlace.
     */
    pub async fn linked_channel_health(
        &self,
        camera_id: &Uuid,
    ) -> Result<Option<(NvrStatus, ChannelHealth)>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            "SELECT n.status, c.direct_status
             FROM nvr_channel_links l
             JOIN nvr_channels c ON c.id = l.channel_id
             JOIN nvrs n ON n.id = c.nvr_id
             WHERE l.camera_id = ?1 LIMIT 1",
            params![camera_id.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => {
                let nvr_status_label: String = data_row.get(0)?;
                let channel_status_label: String = data_row.get(1)?;
                Ok(Some((
                    NvrStatus::from_label(&nvr_status_label),
                    ChannelHealth::from_label(&channel_status_label),
                )))
            }
            None => Ok(None),
        }
    }

    pub async fn channel_id_by_ref(&self, nvr_id: &Uuid, channel_ref: &str) -> Result<Option<Uuid>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            "SELECT id FROM nvr_channels WHERE nvr_id = ?1 AND channel_ref = ?2",
            params![nvr_id.to_string(), channel_ref],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(extract_uuid(&data_row, 0)?)),
            None => Ok(None),
        }
    }

    pub async fn count_nvrs(&self, tenant_id: &Uuid) -> Result<i64, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            "SELECT count(*) FROM nvrs WHERE tenant_id = ?1",
            params![tenant_id.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(data_row.get(0)?),
            None => Ok(0),
        }
    }

    fn map_row_to_channel(&self, data_row: Row) -> Result<NvrChannel, DbError> {
        let status_label: String = data_row.get(6)?;
        Ok(NvrChannel {
            id: extract_uuid(&data_row, 0)?,
            nvr_id: extract_uuid(&data_row, 1)?,
            channel_ref: data_row.get(2)?,
            name: data_row.get(3)?,
            rtsp_main: data_row.get::<Option<String>>(4)?,
            rtsp_sub: data_row.get::<Option<String>>(5)?,
            direct_status: ChannelHealth::from_label(&status_label),
            created_at: extract_datetime(&data_row, 7).unwrap_or_else(Utc::now),
        })
    }

    fn map_row_to_nvr(&self, data_row: Row) -> Result<Nvr, DbError> {
        let vendor_label: String = data_row.get(4)?;
        let status_label: String = data_row.get(7)?;

        Ok(Nvr {
            id: extract_uuid(&data_row, 0)?,
            tenant_id: extract_uuid(&data_row, 1)?,
            site_id: extract_uuid(&data_row, 2)?,
            name: data_row.get(3)?,
            vendor: NvrVendor::from_label(&vendor_label),
            host: data_row.get(5)?,
            port: data_row.get::<i64>(6)? as u16,
            status: NvrStatus::from_label(&status_label),
            last_sync_at: extract_datetime(&data_row, 8),
            created_at: extract_datetime(&data_row, 9).unwrap_or_else(Utc::now),
        })
    }
}
