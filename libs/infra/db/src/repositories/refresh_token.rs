// [libs/infra/db/src/repositories/refresh_token.rs]
/*!
 * =================================================================
 * APARATO: REFRESH FAMILY REPOSITORY (V16.0 - REUSE DETECTION)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: FAMILIAS DE REFRESCO CON ROTACIÓN ATÓMICA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ONE ACTIVE LEAF: En todo instante una familia posee exactamente una
 *    hoja sin usar. La rotación sella la hoja vieja y acuña la nueva
 *    dentro de la misma transacción.
 * 2. DIGEST ONLY: El material opaco jamás toca el disco; la búsqueda es
 *    por digest SHA-256.
 *
 * # Mathematical Proof (Rotation Atomicity):
 * El UPDATE condicionado 'used_at IS NULL' actúa como compare-and-set:
 * dos rotaciones concurrentes sobre la misma hoja producen exactamente
 * un ganador; el perdedor observa 0 filas afectadas y aborta con
 * rollback, preservando el invariante de hoja única.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use libsql::{params, Row};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::DbError;
use crate::repositories::{extract_datetime, extract_uuid};
use crate::SovereignDbClient;

/// Fila materializada de un token de refresco.
#[derive(Debug, Clone)]
pub struct RefreshTokenRow {
    pub id: Uuid,
    pub family_id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub session_id: String,
    pub parent_id: Option<Uuid>,
    pub used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    /// Hoja activa: sin usar, sin revocar y sin expirar.
    pub fn is_active_leaf(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && !self.revoked && self.expires_at > now
    }
}

const REFRESH_PROJECTION: &str =
    "id, family_id, tenant_id, user_id, session_id, parent_id, used_at, revoked, expires_at";

pub struct RefreshTokenRepository {
    database_client: SovereignDbClient,
}

impl RefreshTokenRepository {
    pub fn new(client: SovereignDbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Acuña la raíz de una familia nueva en el login.
     */
    #[instrument(skip(self, token_digest))]
    pub async fn create_family_root(
        &self,
        tenant_id: &Uuid,
        user_id: &Uuid,
        session_id: &str,
        token_digest: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let token_identifier = Uuid::new_v4();
        let family_identifier = Uuid::new_v4();

        database_connection.execute(
            "INSERT INTO refresh_tokens
               (id, family_id, tenant_id, user_id, session_id, token_digest, parent_id, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8)",
            params![
                token_identifier.to_string(),
                family_identifier.to_string(),
                tenant_id.to_string(),
                user_id.to_string(),
                session_id,
                token_digest,
                expires_at.to_rfc3339(),
                Utc::now().to_rfc3339()
            ],
        ).await.map_err(DbError::from_execution_fault)?;

        Ok(family_identifier)
    }

    /// Localiza un token por el digest del material presentado.
    pub async fn find_by_digest(&self, token_digest: &str) -> Result<Option<RefreshTokenRow>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            &format!("SELECT {REFRESH_PROJECTION} FROM refresh_tokens WHERE token_digest = ?1"),
            params![token_digest],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(self.map_row(data_row)?)),
            None => Ok(None),
        }
    }

    /**
     * Rotación atómica: sella la hoja vieja y acuña la sucesora.
     *
     * # Errors:
     * - `DbError::InvalidState`: la hoja ya fue usada por una rotación
     *   concurrente (el llamador la trata como reuso).
     */
    #[instrument(skip(self, successor_digest))]
    pub async fn rotate_leaf(
        &self,
        presented: &RefreshTokenRow,
        successor_digest: &str,
        successor_expires_at: DateTime<Utc>,
    ) -> Result<Uuid, DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute("BEGIN IMMEDIATE", ()).await
            .map_err(|fault| DbError::TransactionCollapse(fault.to_string()))?;

        let rotation_outcome = async {
            let sealed_rows = database_connection.execute(
                "UPDATE refresh_tokens SET used_at = ?2 WHERE id = ?1 AND used_at IS NULL AND revoked = 0",
                params![presented.id.to_string(), Utc::now().to_rfc3339()],
            ).await?;

            if sealed_rows == 0 {
                return Ok::<Option<Uuid>, libsql::Error>(None);
            }

            let successor_identifier = Uuid::new_v4();
            database_connection.execute(
                "INSERT INTO refresh_tokens
                   (id, family_id, tenant_id, user_id, session_id, token_digest, parent_id, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    successor_identifier.to_string(),
                    presented.family_id.to_string(),
                    presented.tenant_id.to_string(),
                    presented.user_id.to_string(),
                    presented.session_id.clone(),
                    successor_digest,
                    presented.id.to_string(),
                    successor_expires_at.to_rfc3339(),
                    Utc::now().to_rfc3339()
                ],
            ).await?;

            Ok(Some(successor_identifier))
        }.await;

        match rotation_outcome {
            Ok(Some(successor_identifier)) => {
                database_connection.execute("COMMIT", ()).await
                    .map_err(|fault| DbError::TransactionCollapse(fault.to_string()))?;
                Ok(successor_identifier)
            }
            Ok(None) => {
                let _ = database_connection.execute("ROLLBACK", ()).await;
                warn!("⚠️ [REFRESH_RACE]: Leaf [{}] already sealed by a concurrent rotation.", presented.id);
                Err(DbError::InvalidState)
            }
            Err(execution_fault) => {
                let _ = database_connection.execute("ROLLBACK", ()).await;
                Err(DbError::from_execution_fault(execution_fault))
            }
        }
    }

    /**
     * Incinera una familia completa tras detectar reuso.
     */
    #[instrument(skip(self))]
    pub async fn revoke_family(&self, family_id: &Uuid) -> Result<u64, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let revoked_rows = database_connection.execute(
            "UPDATE refresh_tokens SET revoked = 1 WHERE family_id = ?1",
            params![family_id.to_string()],
        ).await?;

        info!("🔥 [FAMILY_REVOKED]: {} token(s) incinerated in family [{}].", revoked_rows, family_id);
        Ok(revoked_rows)
    }

    /// Revocación por sesión (logout explícito).
    pub async fn revoke_by_session(&self, session_id: &str) -> Result<u64, DbError> {
        let database_connection = self.database_client.get_connection()?;
        Ok(database_connection.execute(
            "UPDATE refresh_tokens SET revoked = 1 WHERE session_id = ?1",
            params![session_id],
        ).await?)
    }

    fn map_row(&self, data_row: Row) -> Result<RefreshTokenRow, DbError> {
        Ok(RefreshTokenRow {
            id: extract_uuid(&data_row, 0)?,
            family_id: extract_uuid(&data_row, 1)?,
            tenant_id: extract_uuid(&data_row, 2)?,
            user_id: extract_uuid(&data_row, 3)?,
            session_id: data_row.get(4)?,
            parent_id: crate::repositories::extract_optional_uuid(&data_row, 5),
            used_at: extract_datetime(&data_row, 6),
            revoked: data_row.get::<i64>(7)? != 0,
            expires_at: extract_datetime(&data_row, 8)
                .ok_or_else(|| DbError::MappingError("EXPIRY_VOID".into()))?,
        })
    }
}
