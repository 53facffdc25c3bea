// [libs/infra/kv/src/lockout.rs]
/*!
 * =================================================================
 * APARATO: LOCKOUT SENTINEL (V6.0 - CLEAN REENTRY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CONTADOR DE FALLOS Y BANDERA DE BLOQUEO POR IDENTIDAD
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TWO-KEY PROTOCOL: 'lockout_count:{tenant}:{email}' acumula fallos
 *    dentro de una ventana; 'lockout:{tenant}:{email}' sella el bloqueo.
 * 2. CLEAN REENTRY: Al sellar el bloqueo el contador se incinera; cuando
 *    la bandera vence, la identidad reingresa con rastro limpio.
 * 3. BEST-EFFORT THRESHOLD: El chequeo umbral + sellado es de dos pasos;
 *    una carrera que regale un intento extra es tolerable.
 * =================================================================
 */

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::engine::MemoryVaultEngine;
use crate::errors::VaultError;

/// Fallos consecutivos que sellan el bloqueo.
pub const DEFAULT_LOCKOUT_THRESHOLD: u64 = 5;
/// Ventana de acumulación de fallos.
pub const DEFAULT_FAILURE_WINDOW: Duration = Duration::from_secs(15 * 60);
/// Duración del bloqueo sellado.
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(15 * 60);

/// Veredicto tras registrar un fallo de autenticación.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutVerdict {
    pub failure_count: u64,
    pub locked: bool,
}

/// Centinela de bloqueo por (tenant, email).
#[derive(Clone)]
pub struct LockoutSentinel {
    vault_engine: Arc<MemoryVaultEngine>,
    threshold: u64,
    failure_window: Duration,
    lockout_duration: Duration,
}

fn counter_key(tenant_id: &Uuid, email: &str) -> String {
    format!("lockout_count:{}:{}", tenant_id, email.to_lowercase())
}

fn flag_key(tenant_id: &Uuid, email: &str) -> String {
    format!("lockout:{}:{}", tenant_id, email.to_lowercase())
}

impl LockoutSentinel {
    pub fn new(vault_engine: Arc<MemoryVaultEngine>) -> Self {
        Self {
            vault_engine,
            threshold: DEFAULT_LOCKOUT_THRESHOLD,
            failure_window: DEFAULT_FAILURE_WINDOW,
            lockout_duration: DEFAULT_LOCKOUT_DURATION,
        }
    }

    /// Variante con parámetros explícitos (ventanas breves en pruebas).
    pub fn with_policy(
        vault_engine: Arc<MemoryVaultEngine>,
        threshold: u64,
        failure_window: Duration,
        lockout_duration: Duration,
    ) -> Self {
        Self { vault_engine, threshold, failure_window, lockout_duration }
    }

    /// Consulta la bandera de bloqueo vigente.
    pub fn is_locked(&self, tenant_id: &Uuid, email: &str) -> Result<bool, VaultError> {
        self.vault_engine.exists(&flag_key(tenant_id, email))
    }

    /**
     * Registra un fallo de contraseña y sella el bloqueo al cruzar el
     * umbral.
     */
    pub fn register_failure(&self, tenant_id: &Uuid, email: &str) -> Result<LockoutVerdict, VaultError> {
        let (failure_count, _remaining_window) = self.vault_engine
            .increment_with_window(&counter_key(tenant_id, email), self.failure_window)?;

        if failure_count >= self.threshold {
            self.vault_engine.set_with_ttl(&flag_key(tenant_id, email), "locked", self.lockout_duration)?;
            self.vault_engine.delete_counter(&counter_key(tenant_id, email))?;

            warn!(
                "🔒 [LOCKOUT_SEALED]: Identity [{}] locked after {} failures.",
                email, failure_count
            );
            return Ok(LockoutVerdict { failure_count, locked: true });
        }

        Ok(LockoutVerdict { failure_count, locked: false })
    }

    /// Limpieza del contador tras un login exitoso.
    pub fn clear_failures(&self, tenant_id: &Uuid, email: &str) -> Result<(), VaultError> {
        self.vault_engine.delete_counter(&counter_key(tenant_id, email))
    }
}
