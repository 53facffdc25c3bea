// [libs/infra/kv/src/session.rs]
/*!
 * =================================================================
 * APARATO: SESSION STORE (V8.0 - MAX CONCURRENT)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CONJUNTO ORDENADO DE SESIONES POR OPERADOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NEWEST WINS: El conjunto 'user_sessions:{user}' se puntúa por
 *    instante de creación y se recorta a las 5 más recientes; las
 *    excedentes más viejas se desalojan y revocan.
 * 2. TTL ALIGNMENT: La vida del rastro de sesión iguala la vida rodante
 *    de la familia de refresco (7 días).
 * =================================================================
 */

use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::MemoryVaultEngine;
use crate::errors::VaultError;

/// Techo de sesiones concurrentes por operador.
pub const MAX_CONCURRENT_SESSIONS: usize = 5;
/// Vida del rastro de sesión: 7 días (alineada a la familia de refresco).
pub const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Rastro de una sesión viva.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Fachada de sesiones sobre el motor efímero.
#[derive(Clone)]
pub struct SessionStore {
    vault_engine: Arc<MemoryVaultEngine>,
}

fn user_set_key(user_id: &Uuid) -> String {
    format!("user_sessions:{}", user_id)
}

fn session_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

impl SessionStore {
    pub fn new(vault_engine: Arc<MemoryVaultEngine>) -> Self {
        Self { vault_engine }
    }

    /**
     * Registra una sesión y recorta el conjunto a las 5 más nuevas.
     * Retorna los identificadores desalojados para su revocación aguas
     * arriba.
     */
    pub fn create_session(&self, record: &SessionRecord) -> Result<Vec<String>, VaultError> {
        let serialized_record = serde_json::to_string(record)
            .map_err(|fault| VaultError::MappingError(fault.to_string()))?;

        self.vault_engine.set_with_ttl(&session_key(&record.session_id), &serialized_record, SESSION_TTL)?;
        self.vault_engine.ordered_insert(
            &user_set_key(&record.user_id),
            &record.session_id,
            record.created_at.timestamp_millis(),
            SESSION_TTL,
        )?;

        let evicted_sessions = self.vault_engine
            .ordered_trim_to_newest(&user_set_key(&record.user_id), MAX_CONCURRENT_SESSIONS)?;

        for evicted_session_id in &evicted_sessions {
            self.vault_engine.delete(&session_key(evicted_session_id))?;
            debug!("🪑 [SESSION_EVICTION]: Oldest session [{}] displaced.", evicted_session_id);
        }

        Ok(evicted_sessions)
    }

    pub fn fetch_session(&self, session_id: &str) -> Result<Option<SessionRecord>, VaultError> {
        match self.vault_engine.get(&session_key(session_id))? {
            Some(serialized) => serde_json::from_str(&serialized)
                .map(Some)
                .map_err(|fault| VaultError::MappingError(fault.to_string())),
            None => Ok(None),
        }
    }

    /// Revoca una sesión concreta y la retira del conjunto del operador.
    pub fn revoke_session(&self, user_id: &Uuid, session_id: &str) -> Result<(), VaultError> {
        self.vault_engine.delete(&session_key(session_id))?;
        self.vault_engine.ordered_remove(&user_set_key(user_id), session_id)?;
        Ok(())
    }

    /// Purga atómica de todas las sesiones del operador.
    pub fn revoke_all_user_sessions(&self, user_id: &Uuid) -> Result<usize, VaultError> {
        let session_identifiers = self.vault_engine.ordered_members(&user_set_key(user_id))?;

        for session_identifier in &session_identifiers {
            self.vault_engine.delete(&session_key(session_identifier))?;
        }
        self.vault_engine.ordered_delete(&user_set_key(user_id))?;

        if !session_identifiers.is_empty() {
            info!(
                "💀 [SESSION_PURGE]: {} session(s) incinerated for operator [{}].",
                session_identifiers.len(),
                user_id
            );
        }
        Ok(session_identifiers.len())
    }

    pub fn list_user_sessions(&self, user_id: &Uuid) -> Result<Vec<String>, VaultError> {
        self.vault_engine.ordered_members(&user_set_key(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(MemoryVaultEngine::new()))
    }

    fn record(user: &Uuid, session_id: &str, offset_ms: i64) -> SessionRecord {
        SessionRecord {
            session_id: session_id.to_string(),
            user_id: *user,
            tenant_id: Uuid::new_v4(),
            created_at: Utc::now() + chrono::Duration::milliseconds(offset_ms),
        }
    }

    /**
     * TEST DE TECHO CONCURRENTE:
     * La sexta sesión desaloja a la más vieja del conjunto.
     */
    #[test]
    fn certify_max_concurrent_eviction() {
        let store = store();
        let user = Uuid::new_v4();

        for index in 0..MAX_CONCURRENT_SESSIONS {
            let evicted = store.create_session(&record(&user, &format!("s{}", index), index as i64)).unwrap();
            assert!(evicted.is_empty());
        }

        let evicted = store.create_session(&record(&user, "s5", 99)).unwrap();
        assert_eq!(evicted, vec!["s0"], "La sesión más vieja debe caer");

        let survivors = store.list_user_sessions(&user).unwrap();
        assert_eq!(survivors.len(), MAX_CONCURRENT_SESSIONS);
        assert!(!survivors.contains(&"s0".to_string()));
        assert!(store.fetch_session("s0").unwrap().is_none(), "El rastro desalojado se borra");
        println!("✅ SESSION: Max-concurrent eviction certified.");
    }

    #[test]
    fn certify_revoke_all_clears_both_strata() {
        let store = store();
        let user = Uuid::new_v4();

        for index in 0..3 {
            store.create_session(&record(&user, &format!("s{}", index), index)).unwrap();
        }

        assert_eq!(store.revoke_all_user_sessions(&user).unwrap(), 3);
        assert!(store.list_user_sessions(&user).unwrap().is_empty());
        assert!(store.fetch_session("s1").unwrap().is_none());
    }

    #[test]
    fn certify_single_revocation() {
        let store = store();
        let user = Uuid::new_v4();
        store.create_session(&record(&user, "solo", 0)).unwrap();

        store.revoke_session(&user, "solo").unwrap();
        assert!(store.fetch_session("solo").unwrap().is_none());
        assert!(store.list_user_sessions(&user).unwrap().is_empty());
    }
}
