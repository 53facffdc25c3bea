// [libs/infra/kv/src/rate_limit.rs]
/*!
 * =================================================================
 * APARATO: SLIDING WINDOW LIMITER (V10.0 - FAIL POLICY AWARE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CONTADORES DE RÁFAGA POR (SCOPE, PRINCIPAL, ENDPOINT)
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PRIVACY HASHING: Los principals de tipo IP se procesan como
 *    SHA-256(salt || ip); la dirección cruda jamás toca el almacén.
 * 2. ASYMMETRIC FAILURE: El scope de login es fail-closed (negar ante
 *    motor caído); el resto es fail-open configurable para no auto
 *    infligir una denegación de servicio total.
 * 3. WINDOW APPROXIMATION: Ventana fija con TTL; la variante de log
 *    deslizante queda como elección de implementación equivalente.
 * =================================================================
 */

use std::sync::Arc;
use std::time::Duration;
use sha2::{Digest, Sha256};
use tracing::{error, warn};

use crate::engine::MemoryVaultEngine;
use crate::errors::VaultError;

/// Ámbitos de limitación, del más grueso al más fino.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateScope {
    GlobalIp,
    PerUser,
    PerEndpoint,
    Login,
}

impl RateScope {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::GlobalIp => "ip",
            Self::PerUser => "user",
            Self::PerEndpoint => "endpoint",
            Self::Login => "login",
        }
    }

    /// Código de razón estable para el rastro de auditoría.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::GlobalIp => "RATE_LIMITED_IP",
            Self::PerUser => "RATE_LIMITED_USER",
            Self::PerEndpoint => "RATE_LIMITED_USER",
            Self::Login => "RATE_LIMITED_LOGIN",
        }
    }
}

/// Política (límite, ventana) de un ámbito.
#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    pub limit: u64,
    pub window: Duration,
}

/// Decisión emitida por el limitador.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub retry_after: Duration,
}

impl RateLimitDecision {
    fn open_admission(policy: RatePolicy) -> Self {
        Self { allowed: true, limit: policy.limit, remaining: policy.limit, retry_after: Duration::ZERO }
    }

    fn closed_denial(policy: RatePolicy) -> Self {
        Self { allowed: false, limit: policy.limit, remaining: 0, retry_after: policy.window }
    }
}

/// Limitador de ráfagas sobre el motor efímero.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    vault_engine: Arc<MemoryVaultEngine>,
    ip_hash_salt: String,
    fail_open_for_non_login: bool,
    global_ip_policy: RatePolicy,
    per_user_policy: RatePolicy,
    per_endpoint_policy: RatePolicy,
    login_policy: RatePolicy,
}

impl SlidingWindowLimiter {
    pub fn new(vault_engine: Arc<MemoryVaultEngine>, ip_hash_salt: String) -> Self {
        Self {
            vault_engine,
            ip_hash_salt,
            fail_open_for_non_login: true,
            global_ip_policy: RatePolicy { limit: 300, window: Duration::from_secs(60) },
            per_user_policy: RatePolicy { limit: 120, window: Duration::from_secs(60) },
            per_endpoint_policy: RatePolicy { limit: 60, window: Duration::from_secs(60) },
            login_policy: RatePolicy { limit: 10, window: Duration::from_secs(60) },
        }
    }

    /// Sobrescribe la política de un ámbito (ventanas breves en pruebas).
    pub fn with_policy(mut self, scope: RateScope, policy: RatePolicy) -> Self {
        match scope {
            RateScope::GlobalIp => self.global_ip_policy = policy,
            RateScope::PerUser => self.per_user_policy = policy,
            RateScope::PerEndpoint => self.per_endpoint_policy = policy,
            RateScope::Login => self.login_policy = policy,
        }
        self
    }

    pub fn with_fail_open(mut self, fail_open_for_non_login: bool) -> Self {
        self.fail_open_for_non_login = fail_open_for_non_login;
        self
    }

    fn policy_for(&self, scope: RateScope) -> RatePolicy {
        match scope {
            RateScope::GlobalIp => self.global_ip_policy,
            RateScope::PerUser => self.per_user_policy,
            RateScope::PerEndpoint => self.per_endpoint_policy,
            RateScope::Login => self.login_policy,
        }
    }

    /// SHA-256 con sal de proceso sobre la IP del cliente.
    pub fn hash_ip_principal(&self, raw_ip_address: &str) -> String {
        let mut digest_engine = Sha256::new();
        digest_engine.update(self.ip_hash_salt.as_bytes());
        digest_engine.update(raw_ip_address.as_bytes());
        hex::encode(digest_engine.finalize())
    }

    /**
     * Emite la decisión de admisión para (scope, principal[, endpoint]).
     *
     * # Failure Policy:
     * Con el motor caído, login niega (fail-closed) y los demás ámbitos
     * admiten si 'fail_open_for_non_login' está activo.
     */
    pub fn check(
        &self,
        scope: RateScope,
        principal: &str,
        endpoint: Option<&str>,
    ) -> RateLimitDecision {
        let policy = self.policy_for(scope);

        let rate_key = match endpoint {
            Some(endpoint_name) => format!("rl:{}:{}:{}", scope.as_label(), principal, endpoint_name),
            None => format!("rl:{}:{}", scope.as_label(), principal),
        };

        match self.vault_engine.increment_with_window(&rate_key, policy.window) {
            Ok((observed_count, remaining_window)) => {
                let allowed = observed_count <= policy.limit;
                if !allowed {
                    warn!(
                        "🛑 [RATE_LIMITED]: Scope [{}] principal [{}] exceeded {} req/window.",
                        scope.as_label(), principal, policy.limit
                    );
                }
                RateLimitDecision {
                    allowed,
                    limit: policy.limit,
                    remaining: policy.limit.saturating_sub(observed_count),
                    retry_after: remaining_window,
                }
            }
            Err(engine_fault) => self.decide_on_engine_collapse(scope, policy, engine_fault),
        }
    }

    fn decide_on_engine_collapse(
        &self,
        scope: RateScope,
        policy: RatePolicy,
        engine_fault: VaultError,
    ) -> RateLimitDecision {
        error!("❌ [LIMITER_FAULT]: Ephemeral engine collapsed: {}", engine_fault);

        if scope == RateScope::Login || !self.fail_open_for_non_login {
            RateLimitDecision::closed_denial(policy)
        } else {
            RateLimitDecision::open_admission(policy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn limiter(limit: u64, window_ms: u64) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(Arc::new(MemoryVaultEngine::new()), "process-salt".into())
            .with_policy(RateScope::Login, RatePolicy { limit, window: Duration::from_millis(window_ms) })
            .with_policy(RateScope::GlobalIp, RatePolicy { limit, window: Duration::from_millis(window_ms) })
    }

    /**
     * TEST R/R+1:
     * R peticiones dentro de W se admiten; la R+1 se rechaza con
     * retry_after <= W; tras W la admisión renace.
     */
    #[test]
    fn certify_limit_and_window_rebirth() {
        let limiter = limiter(3, 80);

        for _ in 0..3 {
            assert!(limiter.check(RateScope::GlobalIp, "principal", None).allowed);
        }

        let denial = limiter.check(RateScope::GlobalIp, "principal", None);
        assert!(!denial.allowed);
        assert_eq!(denial.remaining, 0);
        assert!(denial.retry_after <= Duration::from_millis(80));

        sleep(Duration::from_millis(100));
        assert!(limiter.check(RateScope::GlobalIp, "principal", None).allowed, "Tras W se admite de nuevo");
        println!("✅ LIMITER: R/R+1 window certified.");
    }

    #[test]
    fn certify_endpoint_key_isolation() {
        let limiter = limiter(1, 60_000);

        assert!(limiter.check(RateScope::GlobalIp, "p", Some("login")).allowed);
        assert!(!limiter.check(RateScope::GlobalIp, "p", Some("login")).allowed);
        // Otro endpoint posee su propio contador.
        assert!(limiter.check(RateScope::GlobalIp, "p", Some("refresh")).allowed);
    }

    #[test]
    fn certify_ip_hashing_privacy() {
        let limiter = limiter(10, 60_000);
        let hashed = limiter.hash_ip_principal("10.1.2.3");

        assert_eq!(hashed.len(), 64);
        assert!(!hashed.contains("10.1.2.3"));
        assert_eq!(hashed, limiter.hash_ip_principal("10.1.2.3"), "Determinista bajo la misma sal");

        let other_salt = SlidingWindowLimiter::new(Arc::new(MemoryVaultEngine::new()), "otra".into());
        assert_ne!(hashed, other_salt.hash_ip_principal("10.1.2.3"));
    }

    #[test]
    fn certify_remaining_accounting() {
        let limiter = limiter(5, 60_000);

        let first = limiter.check(RateScope::Login, "t:ops@t1", None);
        assert_eq!(first.remaining, 4);
        let second = limiter.check(RateScope::Login, "t:ops@t1", None);
        assert_eq!(second.remaining, 3);
    }
}
