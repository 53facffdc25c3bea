// [libs/infra/db/src/repositories/credential.rs]
/*!
 * =================================================================
 * APARATO: CAMERA CREDENTIAL REPOSITORY (V7.0 - ENVELOPE AT REST)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DE LA FORMA ENVUELTA DEL SECRETO RTSP
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. HEX AT REST: Todo material binario (nonce, ct, tag) viaja al disco
 *    como hexadecimal; el DEK en claro jamás cruza este estrato.
 * 2. REWRAP PATH: El upsert es la vía de re-envoltura tras rotar KEK:
 *    reescribir el registro por la API lo liga al kid activo.
 * =================================================================
 */

use chrono::Utc;
use libsql::{params, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::DbError;
use crate::repositories::extract_uuid;
use crate::SovereignDbClient;
use panoptes_domain_models::CameraCredentialRecord;

pub struct CredentialRepository {
    database_client: SovereignDbClient,
}

fn decode_hex_column(data_row: &Row, index: i32) -> Result<Vec<u8>, DbError> {
    let hex_text: String = data_row.get(index)?;
    hex::decode(&hex_text)
        .map_err(|fault| DbError::MappingError(format!("HEX_VIOLATION[{}]: {}", index, fault)))
}

impl CredentialRepository {
    pub fn new(client: SovereignDbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Cristaliza (o re-envuelve) el registro de credenciales de una cámara.
     */
    #[instrument(skip(self, record), fields(camera = %record.camera_id))]
    pub async fn upsert_credential(&self, record: &CameraCredentialRecord) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        database_connection.execute(
            "INSERT INTO camera_credentials
               (tenant_id, camera_id, master_kid, dek_ciphertext, dek_nonce, dek_tag,
                enc_username, enc_password, nonce_u, nonce_p, tag_u, tag_p, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(tenant_id, camera_id) DO UPDATE SET
                master_kid = excluded.master_kid,
                dek_ciphertext = excluded.dek_ciphertext,
                dek_nonce = excluded.dek_nonce,
                dek_tag = excluded.dek_tag,
                enc_username = excluded.enc_username,
                enc_password = excluded.enc_password,
                nonce_u = excluded.nonce_u,
                nonce_p = excluded.nonce_p,
                tag_u = excluded.tag_u,
                tag_p = excluded.tag_p,
                updated_at = excluded.updated_at",
            params![
                record.tenant_id.to_string(),
                record.camera_id.to_string(),
                record.master_kid.clone(),
                hex::encode(&record.dek_ciphertext),
                hex::encode(&record.dek_nonce),
                hex::encode(&record.dek_tag),
                hex::encode(&record.enc_username),
                hex::encode(&record.enc_password),
                hex::encode(&record.nonce_u),
                hex::encode(&record.nonce_p),
                hex::encode(&record.tag_u),
                hex::encode(&record.tag_p),
                Utc::now().to_rfc3339()
            ],
        ).await?;

        info!("🔐 [CREDENTIAL_VAULT]: Secret sealed under kid [{}].", record.master_kid);
        Ok(())
    }

    pub async fn fetch_credential(
        &self,
        tenant_id: &Uuid,
        camera_id: &Uuid,
    ) -> Result<Option<CameraCredentialRecord>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query(
            "SELECT tenant_id, camera_id, master_kid, dek_ciphertext, dek_nonce, dek_tag,
                    enc_username, enc_password, nonce_u, nonce_p, tag_u, tag_p
             FROM camera_credentials WHERE tenant_id = ?1 AND camera_id = ?2",
            params![tenant_id.to_string(), camera_id.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(CameraCredentialRecord {
                tenant_id: extract_uuid(&data_row, 0)?,
                camera_id: extract_uuid(&data_row, 1)?,
                master_kid: data_row.get(2)?,
                dek_ciphertext: decode_hex_column(&data_row, 3)?,
                dek_nonce: decode_hex_column(&data_row, 4)?,
                dek_tag: decode_hex_column(&data_row, 5)?,
                enc_username: decode_hex_column(&data_row, 6)?,
                enc_password: decode_hex_column(&data_row, 7)?,
                nonce_u: decode_hex_column(&data_row, 8)?,
                nonce_p: decode_hex_column(&data_row, 9)?,
                tag_u: decode_hex_column(&data_row, 10)?,
                tag_p: decode_hex_column(&data_row, 11)?,
            })),
            None => Ok(None),
        }
    }
}
