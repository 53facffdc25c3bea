// [libs/infra/kv/src/lib.rs]
/*!
 * =================================================================
 * APARATO: KEY-VALUE INFRASTRUCTURE HUB (V9.0 - SINGLE NODE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ESTADO EFÍMERO CON TTL DEL PLANO DE CONTROL
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. REDIS-CLASS SHAPE: Las fachadas (sesiones, lockout, revocación,
 *    rate limit) hablan el vocabulario INCR/SETEX/ZADD aunque el motor
 *    embarcado viva en el propio proceso del appliance air-gapped.
 * 2. FAILURE HONESTY: El motor reporta indisponibilidad como error real
 *    para que las políticas fail-open/fail-closed conserven sentido.
 * =================================================================
 */

pub mod engine;
pub mod errors;
pub mod lockout;
pub mod rate_limit;
pub mod revocation;
pub mod session;

pub use engine::MemoryVaultEngine;
pub use errors::VaultError;
pub use lockout::{LockoutSentinel, LockoutVerdict};
pub use rate_limit::{RateLimitDecision, RatePolicy, RateScope, SlidingWindowLimiter};
pub use revocation::RevocationRegistry;
pub use session::{SessionRecord, SessionStore, MAX_CONCURRENT_SESSIONS, SESSION_TTL};
