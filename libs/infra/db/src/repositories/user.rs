// [libs/infra/db/src/repositories/user.rs]
/*!
 * =================================================================
 * APARATO: USER REPOSITORY (V14.0 - SOFT DELETE GOVERNANCE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE OPERADORES DENTRO DEL TENANT
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LIVE UNIQUENESS: La unicidad de email es parcial (filas vivas);
 *    el motor la garantiza vía índice y aquí se eleva a Conflict.
 * 2. TENANT FENCING: Toda consulta ancla tenant_id; una fila de otro
 *    tenant simplemente no existe para este repositorio.
 * =================================================================
 */

use chrono::Utc;
use libsql::{params, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::DbError;
use crate::repositories::{extract_datetime, extract_uuid};
use crate::SovereignDbClient;
use panoptes_domain_models::pagination::PageCursor;
use panoptes_domain_models::User;

const USER_PROJECTION: &str =
    "id, tenant_id, email, display_name, password_hash, is_disabled, created_at, updated_at, deleted_at";

pub struct UserRepository {
    database_client: SovereignDbClient,
}

impl UserRepository {
    pub fn new(client: SovereignDbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Cristaliza un operador nuevo.
     *
     * # Errors:
     * - `DbError::Conflict`: email vivo duplicado dentro del tenant.
     */
    #[instrument(skip(self, password_hash), fields(email = %email))]
    pub async fn create_user(
        &self,
        tenant_id: &Uuid,
        email: &str,
        display_name: &str,
        password_hash: &str,
    ) -> Result<User, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let user_identifier = Uuid::new_v4();
        let now = Utc::now();

        database_connection.execute(
            "INSERT INTO users (id, tenant_id, email, display_name, password_hash, is_disabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
            params![
                user_identifier.to_string(),
                tenant_id.to_string(),
                email.to_lowercase(),
                display_name,
                password_hash,
                now.to_rfc3339()
            ],
        ).await.map_err(DbError::from_execution_fault)?;

        info!("👤 [USER_FORGE]: Operator [{}] crystallized.", email);

        Ok(User {
            id: user_identifier,
            tenant_id: *tenant_id,
            email: email.to_lowercase(),
            display_name: display_name.to_string(),
            password_hash: password_hash.to_string(),
            is_disabled: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    pub async fn find_by_id(&self, tenant_id: &Uuid, user_id: &Uuid) -> Result<Option<User>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            &format!("SELECT {USER_PROJECTION} FROM users WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL"),
            params![tenant_id.to_string(), user_id.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(self.map_row_to_user(data_row)?)),
            None => Ok(None),
        }
    }

    /// Búsqueda de login: únicamente filas vivas.
    pub async fn find_active_by_email(&self, tenant_id: &Uuid, email: &str) -> Result<Option<User>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            &format!("SELECT {USER_PROJECTION} FROM users WHERE tenant_id = ?1 AND email = ?2 AND deleted_at IS NULL"),
            params![tenant_id.to_string(), email.to_lowercase()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(self.map_row_to_user(data_row)?)),
            None => Ok(None),
        }
    }

    /// Listado paginado por cursor (created_at, id) estable.
    pub async fn list_users(
        &self,
        tenant_id: &Uuid,
        cursor: Option<&PageCursor>,
        page_size: u32,
    ) -> Result<Vec<User>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = match cursor {
            Some(page_cursor) => database_connection.query(
                &format!(
                    "SELECT {USER_PROJECTION} FROM users
                     WHERE tenant_id = ?1 AND deleted_at IS NULL
                       AND (created_at, id) > (?2, ?3)
                     ORDER BY created_at, id LIMIT ?4"
                ),
                params![
                    tenant_id.to_string(),
                    page_cursor.created_at.to_rfc3339(),
                    page_cursor.id.to_string(),
                    page_size as i64
                ],
            ).await?,
            None => database_connection.query(
                &format!(
                    "SELECT {USER_PROJECTION} FROM users
                     WHERE tenant_id = ?1 AND deleted_at IS NULL
                     ORDER BY created_at, id LIMIT ?2"
                ),
                params![tenant_id.to_string(), page_size as i64],
            ).await?,
        };

        let mut operators_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            operators_collection.push(self.map_row_to_user(data_row)?);
        }
        Ok(operators_collection)
    }

    /**
     * Deshabilita un operador (las sesiones vivas se revocan aguas arriba).
     */
    #[instrument(skip(self))]
    pub async fn disable_user(&self, tenant_id: &Uuid, user_id: &Uuid) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection.execute(
            "UPDATE users SET is_disabled = 1, updated_at = ?3
             WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL",
            params![tenant_id.to_string(), user_id.to_string(), Utc::now().to_rfc3339()],
        ).await?;

        if affected_rows == 0 {
            return Err(DbError::NotFound);
        }
        info!("🚷 [USER_GOVERNANCE]: Operator [{}] disabled.", user_id);
        Ok(())
    }

    /// Renovación del hash tras el protocolo de reinicio de contraseña.
    pub async fn update_password_hash(
        &self,
        tenant_id: &Uuid,
        user_id: &Uuid,
        new_password_hash: &str,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection.execute(
            "UPDATE users SET password_hash = ?3, updated_at = ?4
             WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL",
            params![
                tenant_id.to_string(),
                user_id.to_string(),
                new_password_hash,
                Utc::now().to_rfc3339()
            ],
        ).await?;

        if affected_rows == 0 {
            return Err(DbError::NotFound);
        }
        info!("♻️ [USER_GOVERNANCE]: Password material rotated for [{}].", user_id);
        Ok(())
    }

    fn map_row_to_user(&self, data_row: Row) -> Result<User, DbError> {
        Ok(User {
            id: extract_uuid(&data_row, 0)?,
            tenant_id: extract_uuid(&data_row, 1)?,
            email: data_row.get(2)?,
            display_name: data_row.get(3)?,
            password_hash: data_row.get(4)?,
            is_disabled: data_row.get::<i64>(5)? != 0,
            created_at: extract_datetime(&data_row, 6).unwrap_or_else(Utc::now),
            updated_at: extract_datetime(&data_row, 7).unwrap_or_else(Utc::now),
            deleted_at: extract_datetime(&data_row, 8),
        })
    }
}
