// [libs/infra/kv/src/revocation.rs]
/*!
 * =================================================================
 * APARATO: REVOCATION REGISTRY (V4.0 - STATELESS DENIAL)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: LISTA NEGRA EFÍMERA DE JTIs POR TENANT
 *
 * # Mathematical Proof (Bounded Memory):
 * El TTL de cada entrada iguala la vida restante del token revocado.
 * Como ningún token vive más de 15 minutos, el registro se auto-acota:
 * |registro| <= tokens emitidos en los últimos 15 minutos.
 * =================================================================
 */

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::engine::MemoryVaultEngine;
use crate::errors::VaultError;

/// Registro de tokens de acceso revocados antes de su expiración.
#[derive(Clone)]
pub struct RevocationRegistry {
    vault_engine: Arc<MemoryVaultEngine>,
}

fn blacklist_key(tenant_id: &Uuid, token_identifier: &str) -> String {
    format!("blacklist:{}:{}", tenant_id, token_identifier)
}

impl RevocationRegistry {
    pub fn new(vault_engine: Arc<MemoryVaultEngine>) -> Self {
        Self { vault_engine }
    }

    /**
     * Sella la revocación de un jti con TTL = vida restante del token.
     * Un TTL no positivo es un no-op: el token ya murió por sí mismo.
     */
    pub fn revoke(
        &self,
        tenant_id: &Uuid,
        token_identifier: &str,
        remaining_lifetime: Duration,
    ) -> Result<(), VaultError> {
        if remaining_lifetime.is_zero() {
            return Ok(());
        }
        self.vault_engine.set_with_ttl(
            &blacklist_key(tenant_id, token_identifier),
            "revoked",
            remaining_lifetime,
        )?;
        debug!("🚫 [REVOCATION]: jti [{}] blacklisted.", token_identifier);
        Ok(())
    }

    /// Consultado en cada verificación de token de acceso.
    pub fn is_revoked(&self, tenant_id: &Uuid, token_identifier: &str) -> Result<bool, VaultError> {
        self.vault_engine.exists(&blacklist_key(tenant_id, token_identifier))
    }
}
