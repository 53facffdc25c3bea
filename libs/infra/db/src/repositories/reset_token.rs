// [libs/infra/db/src/repositories/reset_token.rs]
/*!
 * =================================================================
 * APARATO: PASSWORD RESET REPOSITORY (V5.0 - SINGLE USE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: TOKENS DE REINICIO DE USO ÚNICO (ALMACENADOS HASHEADOS)
 *
 * # Mathematical Proof (Single Consumption):
 * El UPDATE con 'used_at IS NULL' en el WHERE y RETURNING actúa como
 * semáforo de fila: dos consumos concurrentes del mismo token producen
 * exactamente un ganador.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use libsql::params;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::DbError;
use crate::repositories::extract_uuid;
use crate::SovereignDbClient;

pub struct ResetTokenRepository {
    database_client: SovereignDbClient,
}

impl ResetTokenRepository {
    pub fn new(client: SovereignDbClient) -> Self {
        Self { database_client: client }
    }

    /// Registra el digest de un token de reinicio recién acuñado.
    #[instrument(skip(self, token_digest))]
    pub async fn create_reset_token(
        &self,
        tenant_id: &Uuid,
        user_id: &Uuid,
        token_digest: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection.execute(
            "INSERT INTO password_reset_tokens (id, tenant_id, user_id, token_digest, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::new_v4().to_string(),
                tenant_id.to_string(),
                user_id.to_string(),
                token_digest,
                expires_at.to_rfc3339(),
                Utc::now().to_rfc3339()
            ],
        ).await.map_err(DbError::from_execution_fault)?;
        Ok(())
    }

    /**
     * Consume atómicamente un token vigente. Retorna (tenant, operador)
     * del propietario, o None si el token no existe, ya fue usado o
     * expiró.
     */
    #[instrument(skip(self, token_digest))]
    pub async fn consume_reset_token(
        &self,
        token_digest: &str,
    ) -> Result<Option<(Uuid, Uuid)>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut updated_rows = database_connection.query(
            "UPDATE password_reset_tokens SET used_at = ?2
             WHERE token_digest = ?1 AND used_at IS NULL AND expires_at > ?2
             RETURNING tenant_id, user_id",
            params![token_digest, Utc::now().to_rfc3339()],
        ).await?;

        match updated_rows.next().await? {
            Some(data_row) => {
                let tenant_id = extract_uuid(&data_row, 0)?;
                let user_id = extract_uuid(&data_row, 1)?;
                info!("🔑 [RESET_CONSUMED]: Single-use token burned for operator [{}].", user_id);
                Ok(Some((tenant_id, user_id)))
            }
            None => Ok(None),
        }
    }
}
