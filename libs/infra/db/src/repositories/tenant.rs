// [libs/infra/db/src/repositories/tenant.rs]
/*!
 * =================================================================
 * APARATO: TENANT REPOSITORY (V6.0 - DOMAIN RESOLUTION)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: RAÍCES DE AISLAMIENTO Y RESOLUCIÓN DE LOGIN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DETERMINISTIC RESOLUTION: El dominio del email resuelve el tenant;
 *    el listado completo de coincidencias permite detectar ambigüedad
 *    aguas arriba (400 en lugar de adivinar).
 * =================================================================
 */

use libsql::{params, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::DbError;
use crate::repositories::{extract_datetime, extract_uuid};
use crate::SovereignDbClient;
use panoptes_domain_models::Tenant;

pub struct TenantRepository {
    database_client: SovereignDbClient,
}

impl TenantRepository {
    pub fn new(client: SovereignDbClient) -> Self {
        Self { database_client: client }
    }

    #[instrument(skip(self))]
    pub async fn create_tenant(
        &self,
        slug: &str,
        name: &str,
        email_domain: &str,
    ) -> Result<Tenant, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let tenant_identifier = Uuid::new_v4();
        let created_at = chrono::Utc::now();

        database_connection.execute(
            "INSERT INTO tenants (id, slug, name, email_domain, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                tenant_identifier.to_string(),
                slug,
                name,
                email_domain.to_lowercase(),
                created_at.to_rfc3339()
            ],
        ).await.map_err(DbError::from_execution_fault)?;

        info!("🏛️ [TENANT]: Root [{}] crystallized under domain [{}].", slug, email_domain);

        Ok(Tenant {
            id: tenant_identifier,
            slug: slug.to_string(),
            name: name.to_string(),
            email_domain: email_domain.to_lowercase(),
            created_at,
        })
    }

    pub async fn find_by_id(&self, tenant_id: &Uuid) -> Result<Option<Tenant>, DbError> {
        self.query_single(
            "SELECT id, slug, name, email_domain, created_at FROM tenants WHERE id = ?1",
            params![tenant_id.to_string()],
        ).await
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DbError> {
        self.query_single(
            "SELECT id, slug, name, email_domain, created_at FROM tenants WHERE slug = ?1",
            params![slug],
        ).await
    }

    /// Todas las raíces que reclaman un dominio de correo. Más de una
    /// coincidencia delata ambigüedad de resolución.
    pub async fn find_by_email_domain(&self, email_domain: &str) -> Result<Vec<Tenant>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            "SELECT id, slug, name, email_domain, created_at FROM tenants WHERE email_domain = ?1",
            params![email_domain.to_lowercase()],
        ).await?;

        let mut matching_tenants = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            matching_tenants.push(self.map_row_to_tenant(data_row)?);
        }
        Ok(matching_tenants)
    }

    async fn query_single(
        &self,
        sql_statement: &str,
        bound_parameters: impl libsql::params::IntoParams,
    ) -> Result<Option<Tenant>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(sql_statement, bound_parameters).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(self.map_row_to_tenant(data_row)?)),
            None => Ok(None),
        }
    }

    fn map_row_to_tenant(&self, data_row: Row) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id: extract_uuid(&data_row, 0)?,
            slug: data_row.get(1)?,
            name: data_row.get(2)?,
            email_domain: data_row.get(3)?,
            created_at: extract_datetime(&data_row, 4).unwrap_or_else(chrono::Utc::now),
        })
    }
}
