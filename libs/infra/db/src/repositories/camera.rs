// [libs/infra/db/src/repositories/camera.rs]
/*!
 * =================================================================
 * APARATO: CAMERA TOPOLOGY REPOSITORY (V12.0 - TENANT FENCED)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: SITES, CÁMARAS Y GRUPOS DENTRO DEL TENANT
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CROSS-TENANT MASKING: Toda búsqueda ancla tenant_id; una cámara de
 *    otro tenant retorna None y el borde lo renderiza como 404.
 * =================================================================
 */

use chrono::Utc;
use libsql::{params, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::DbError;
use crate::repositories::{extract_datetime, extract_uuid, nullable_text};
use crate::SovereignDbClient;
use panoptes_domain_models::{Camera, ChannelHealth, Site};

const CAMERA_PROJECTION: &str =
    "id, tenant_id, site_id, name, rtsp_url, is_enabled, direct_status, created_at, updated_at";

pub struct CameraRepository {
    database_client: SovereignDbClient,
}

impl CameraRepository {
    pub fn new(client: SovereignDbClient) -> Self {
        Self { database_client: client }
    }

    #[instrument(skip(self))]
    pub async fn create_site(&self, tenant_id: &Uuid, name: &str) -> Result<Site, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let site_identifier = Uuid::new_v4();
        let created_at = Utc::now();

        database_connection.execute(
            "INSERT INTO sites (id, tenant_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                site_identifier.to_string(),
                tenant_id.to_string(),
                name,
                created_at.to_rfc3339()
            ],
        ).await.map_err(DbError::from_execution_fault)?;

        Ok(Site { id: site_identifier, tenant_id: *tenant_id, name: name.to_string(), created_at })
    }

    #[instrument(skip(self))]
    pub async fn create_camera(
        &self,
        tenant_id: &Uuid,
        site_id: &Uuid,
        name: &str,
        rtsp_url: Option<&str>,
    ) -> Result<Camera, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let camera_identifier = Uuid::new_v4();
        let now = Utc::now();

        database_connection.execute(
            "INSERT INTO cameras (id, tenant_id, site_id, name, rtsp_url, is_enabled, direct_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, 'unknown', ?6, ?6)",
            params![
                camera_identifier.to_string(),
                tenant_id.to_string(),
                site_id.to_string(),
                name,
                nullable_text(rtsp_url.map(str::to_string)),
                now.to_rfc3339()
            ],
        ).await.map_err(DbError::from_execution_fault)?;

        info!("📷 [TOPOLOGY]: Camera [{}] registered in site [{}].", name, site_id);

        Ok(Camera {
            id: camera_identifier,
            tenant_id: *tenant_id,
            site_id: *site_id,
            name: name.to_string(),
            rtsp_url: rtsp_url.map(str::to_string),
            is_enabled: true,
            direct_status: ChannelHealth::Unknown,
            created_at: now,
            updated_at: now,
        })
    }

    /// Resolución cercada por tenant: la base del enmascaramiento 404.
    pub async fn find_camera_scoped(
        &self,
        tenant_id: &Uuid,
        camera_id: &Uuid,
    ) -> Result<Option<Camera>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            &format!("SELECT {CAMERA_PROJECTION} FROM cameras WHERE tenant_id = ?1 AND id = ?2"),
            params![tenant_id.to_string(), camera_id.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(self.map_row_to_camera(data_row)?)),
            None => Ok(None),
        }
    }

    /// Grupos a los que pertenece la cámara (cobertura de alcance group).
    pub async fn camera_group_ids(&self, camera_id: &Uuid) -> Result<Vec<Uuid>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            "SELECT group_id FROM camera_group_members WHERE camera_id = ?1",
            params![camera_id.to_string()],
        ).await?;

        let mut group_identifiers = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            group_identifiers.push(extract_uuid(&data_row, 0)?);
        }
        Ok(group_identifiers)
    }

    pub async fn create_group(&self, tenant_id: &Uuid, name: &str) -> Result<Uuid, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let group_identifier = Uuid::new_v4();
        database_connection.execute(
            "INSERT INTO camera_groups (id, tenant_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                group_identifier.to_string(),
                tenant_id.to_string(),
                name,
                Utc::now().to_rfc3339()
            ],
        ).await.map_err(DbError::from_execution_fault)?;
        Ok(group_identifier)
    }

    pub async fn add_camera_to_group(&self, group_id: &Uuid, camera_id: &Uuid) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection.execute(
            "INSERT OR IGNORE INTO camera_group_members (group_id, camera_id) VALUES (?1, ?2)",
            params![group_id.to_string(), camera_id.to_string()],
        ).await?;
        Ok(())
    }

    /// Objetivos de sondeo directo: cámaras habilitadas con URL RTSP.
    pub async fn list_probe_targets(&self, probe_cap: u32) -> Result<Vec<Camera>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            &format!(
                "SELECT {CAMERA_PROJECTION} FROM cameras
                 WHERE rtsp_url IS NOT NULL AND is_enabled = 1
                 ORDER BY created_at LIMIT ?1"
            ),
            params![probe_cap as i64],
        ).await?;

        let mut probe_targets = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            probe_targets.push(self.map_row_to_camera(data_row)?);
        }
        Ok(probe_targets)
    }

    /// Persiste el veredicto del sondeo directo del monitor de salud.
    pub async fn update_direct_status(
        &self,
        camera_id: &Uuid,
        direct_status: ChannelHealth,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection.execute(
            "UPDATE cameras SET direct_status = ?2 WHERE id = ?1",
            params![camera_id.to_string(), direct_status.as_label()],
        ).await?;
        Ok(())
    }

    /// Censo de cámaras del tenant (límites de licencia).
    pub async fn count_cameras(&self, tenant_id: &Uuid) -> Result<i64, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            "SELECT count(*) FROM cameras WHERE tenant_id = ?1",
            params![tenant_id.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(data_row.get(0)?),
            None => Ok(0),
        }
    }

    fn map_row_to_camera(&self, data_row: Row) -> Result<Camera, DbError> {
        let direct_status_label: String = data_row.get(6)?;
        Ok(Camera {
            id: extract_uuid(&data_row, 0)?,
            tenant_id: extract_uuid(&data_row, 1)?,
            site_id: extract_uuid(&data_row, 2)?,
            name: data_row.get(3)?,
            rtsp_url: data_row.get::<Option<String>>(4)?,
            is_enabled: data_row.get::<i64>(5)? != 0,
            direct_status: ChannelHealth::from_label(&direct_status_label),
            created_at: extract_datetime(&data_row, 7).unwrap_or_else(Utc::now),
            updated_at: extract_datetime(&data_row, 8).unwrap_or_else(Utc::now),
        })
    }
}
