// [libs/infra/db/src/repositories/audit.rs]
/*!
 * =================================================================
 * APARATO: AUDIT REPOSITORY (V13.0 - APPEND ONLY LEDGER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INSERCIÓN POR LOTES Y LECTURA PAGINADA DEL RASTRO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BATCH DISCIPLINE: El consumidor de la cola inserta ráfagas dentro
 *    de una transacción; un fallo regresa el lote completo al spool.
 * 2. IDEMPOTENT REPLAY: El id del evento es PRIMARY KEY; re-reproducir
 *    un archivo de spool parcialmente drenado converge sin duplicados.
 * 3. NO DELETION PATH: Este repositorio no expone borrado. La retención
 *    de 7 años se garantiza por omisión estructural.
 * =================================================================
 */

use chrono::Utc;
use libsql::{params, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::DbError;
use crate::repositories::{extract_datetime, extract_optional_uuid, extract_uuid, nullable_text};
use crate::SovereignDbClient;
use panoptes_domain_models::pagination::PageCursor;
use panoptes_domain_models::{AuditEvent, AuditResult};

const AUDIT_PROJECTION: &str =
    "id, timestamp_utc, tenant_id, actor_user_id, ip_address, action, target_type, target_id, result, reason_code, request_id";

pub struct AuditRepository {
    database_client: SovereignDbClient,
}

impl AuditRepository {
    pub fn new(client: SovereignDbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Inserta un lote de eventos en una sola transacción.
     *
     * # Errors:
     * El fallo de cualquier inserción revierte el lote completo; el
     * llamador lo redirige íntegro al spool en disco.
     */
    #[instrument(skip(self, events), fields(batch = events.len()))]
    pub async fn insert_batch(&self, events: &[AuditEvent]) -> Result<(), DbError> {
        if events.is_empty() {
            return Ok(());
        }

        let database_connection = self.database_client.get_connection()?;
        database_connection.execute("BEGIN IMMEDIATE", ()).await
            .map_err(|fault| DbError::TransactionCollapse(fault.to_string()))?;

        let batch_outcome = async {
            for event in events {
                database_connection.execute(
                    "INSERT OR IGNORE INTO audit_events
                       (id, timestamp_utc, tenant_id, actor_user_id, ip_address, action,
                        target_type, target_id, result, reason_code, request_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        event.id.to_string(),
                        event.timestamp_utc.to_rfc3339(),
                        nullable_text(event.tenant_id.map(|id| id.to_string())),
                        nullable_text(event.actor_user_id.map(|id| id.to_string())),
                        nullable_text(event.ip_address.clone()),
                        event.action.clone(),
                        nullable_text(event.target_type.clone()),
                        nullable_text(event.target_id.clone()),
                        event.result.as_label(),
                        nullable_text(event.reason_code.clone()),
                        nullable_text(event.request_id.clone())
                    ],
                ).await?;
            }
            Ok::<(), libsql::Error>(())
        }.await;

        match batch_outcome {
            Ok(()) => {
                database_connection.execute("COMMIT", ()).await
                    .map_err(|fault| DbError::TransactionCollapse(fault.to_string()))?;
                debug!("🧾 [AUDIT_LEDGER]: Batch of {} event(s) crystallized.", events.len());
                Ok(())
            }
            Err(execution_fault) => {
                let _ = database_connection.execute("ROLLBACK", ()).await;
                Err(DbError::QueryError(execution_fault))
            }
        }
    }

    /// Lectura paginada del rastro de un tenant, más reciente primero.
    pub async fn list_events(
        &self,
        tenant_id: &Uuid,
        cursor: Option<&PageCursor>,
        page_size: u32,
    ) -> Result<Vec<AuditEvent>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = match cursor {
            Some(page_cursor) => database_connection.query(
                &format!(
                    "SELECT {AUDIT_PROJECTION} FROM audit_events
                     WHERE tenant_id = ?1 AND (timestamp_utc, id) < (?2, ?3)
                     ORDER BY timestamp_utc DESC, id DESC LIMIT ?4"
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
                    "SELECT {AUDIT_PROJECTION} FROM audit_events
                     WHERE tenant_id = ?1
                     ORDER BY timestamp_utc DESC, id DESC LIMIT ?2"
                ),
                params![tenant_id.to_string(), page_size as i64],
            ).await?,
        };

        let mut events_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            events_collection.push(self.map_row_to_event(data_row)?);
        }
        Ok(events_collection)
    }

    /// Conteo total del rastro (paridad de replay en diagnósticos).
    pub async fn count_events(&self) -> Result<i64, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection.query("SELECT count(*) FROM audit_events", ()).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(data_row.get(0)?),
            None => Ok(0),
        }
    }

    fn map_row_to_event(&self, data_row: Row) -> Result<AuditEvent, DbError> {
        let result_label: String = data_row.get(8)?;
        let result = if result_label == "SUCCESS" { AuditResult::Success } else { AuditResult::Failure };

        Ok(AuditEvent {
            id: extract_uuid(&data_row, 0)?,
            timestamp_utc: extract_datetime(&data_row, 1).unwrap_or_else(Utc::now),
            tenant_id: extract_optional_uuid(&data_row, 2),
            actor_user_id: extract_optional_uuid(&data_row, 3),
            ip_address: data_row.get::<Option<String>>(4)?,
            action: data_row.get(5)?,
            target_type: data_row.get::<Option<String>>(6)?,
            target_id: data_row.get::<Option<String>>(7)?,
            result,
            reason_code: data_row.get::<Option<String>>(9)?,
            request_id: data_row.get::<Option<String>>(10)?,
        })
    }
}
