// [libs/infra/kv/src/engine.rs]
/*!
 * =================================================================
 * APARATO: MEMORY VAULT ENGINE (V12.0 - TTL STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: PRIMITIVAS SETEX / INCR / ZADD SOBRE RAM SOBERANA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LAZY EXPIRY: Las entradas vencidas se purgan en la lectura que las
 *    encuentra, sin hilo barrendero dedicado.
 * 2. ATOMIC INCR-WITH-EXPIRE: El contador y su ventana nacen bajo el
 *    mismo candado, replicando la semántica INCR+PEXPIRE de un backend
 *    de red.
 *
 * # Mathematical Proof (Window Fidelity):
 * Sea t0 el primer INCR de una llave. La ventana [t0, t0+W) acumula
 * todos los INCR posteriores; en t >= t0+W la llave renace con count=1.
 * Esto es exactamente la aproximación fixed-window-with-TTL.
 * =================================================================
 */

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::errors::VaultError;

struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

struct CounterEntry {
    count: u64,
    window_deadline: Instant,
}

struct OrderedSetEntry {
    /// Pares (score, miembro) mantenidos en orden ascendente de score.
    members: Vec<(i64, String)>,
    expires_at: Option<Instant>,
}

/// Motor embarcado de estado efímero con TTL.
#[derive(Default)]
pub struct MemoryVaultEngine {
    string_strata: RwLock<HashMap<String, StringEntry>>,
    counter_strata: RwLock<HashMap<String, CounterEntry>>,
    ordered_strata: RwLock<HashMap<String, OrderedSetEntry>>,
}

fn lock_fault<T>(fault: std::sync::PoisonError<T>) -> VaultError {
    VaultError::EngineUnavailable(format!("LOCK_POISON_FAULT: {}", fault))
}

fn is_expired(expires_at: &Option<Instant>, now: Instant) -> bool {
    matches!(expires_at, Some(deadline) if *deadline <= now)
}

impl MemoryVaultEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // --- ESTRATO DE CADENAS (SETEX / GET / DEL) ---

    pub fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), VaultError> {
        let mut strata_guard = self.string_strata.write().map_err(lock_fault)?;
        strata_guard.insert(key.to_string(), StringEntry {
            value: value.to_string(),
            expires_at: Some(Instant::now() + ttl),
        });
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, VaultError> {
        let now = Instant::now();
        {
            let strata_guard = self.string_strata.read().map_err(lock_fault)?;
            match strata_guard.get(key) {
                Some(entry) if !is_expired(&entry.expires_at, now) => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Purga perezosa de la entrada vencida.
        let mut strata_guard = self.string_strata.write().map_err(lock_fault)?;
        strata_guard.remove(key);
        Ok(None)
    }

    pub fn exists(&self, key: &str) -> Result<bool, VaultError> {
        Ok(self.get(key)?.is_some())
    }

    pub fn delete(&self, key: &str) -> Result<bool, VaultError> {
        let mut strata_guard = self.string_strata.write().map_err(lock_fault)?;
        Ok(strata_guard.remove(key).is_some())
    }

    // --- ESTRATO DE CONTADORES (INCR + PEXPIRE ATÓMICO) ---

    /**
     * Incrementa la llave; en el primer incremento ancla la ventana W.
     * Retorna (conteo, tiempo restante de la ventana).
     */
    pub fn increment_with_window(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<(u64, Duration), VaultError> {
        let now = Instant::now();
        let mut strata_guard = self.counter_strata.write().map_err(lock_fault)?;

        let entry = strata_guard.entry(key.to_string()).or_insert(CounterEntry {
            count: 0,
            window_deadline: now + window,
        });

        // Ventana agotada: la llave renace limpia.
        if entry.window_deadline <= now {
            entry.count = 0;
            entry.window_deadline = now + window;
        }

        entry.count += 1;
        let remaining_window = entry.window_deadline.saturating_duration_since(now);
        Ok((entry.count, remaining_window))
    }

    pub fn delete_counter(&self, key: &str) -> Result<(), VaultError> {
        let mut strata_guard = self.counter_strata.write().map_err(lock_fault)?;
        strata_guard.remove(key);
        Ok(())
    }

    // --- ESTRATO DE CONJUNTOS ORDENADOS (ZADD / ZRANGE / ZREM) ---

    pub fn ordered_insert(
        &self,
        key: &str,
        member: &str,
        score: i64,
        ttl: Duration,
    ) -> Result<(), VaultError> {
        let mut strata_guard = self.ordered_strata.write().map_err(lock_fault)?;
        let entry = strata_guard.entry(key.to_string()).or_insert(OrderedSetEntry {
            members: Vec::new(),
            expires_at: None,
        });

        entry.expires_at = Some(Instant::now() + ttl);
        entry.members.retain(|(_, existing)| existing != member);

        let insertion_point = entry.members
            .partition_point(|(existing_score, _)| *existing_score <= score);
        entry.members.insert(insertion_point, (score, member.to_string()));
        Ok(())
    }

    /// Miembros en orden ascendente de score (el más viejo primero).
    pub fn ordered_members(&self, key: &str) -> Result<Vec<String>, VaultError> {
        let now = Instant::now();
        let strata_guard = self.ordered_strata.read().map_err(lock_fault)?;
        match strata_guard.get(key) {
            Some(entry) if !is_expired(&entry.expires_at, now) => {
                Ok(entry.members.iter().map(|(_, member)| member.clone()).collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    pub fn ordered_remove(&self, key: &str, member: &str) -> Result<bool, VaultError> {
        let mut strata_guard = self.ordered_strata.write().map_err(lock_fault)?;
        if let Some(entry) = strata_guard.get_mut(key) {
            let before = entry.members.len();
            entry.members.retain(|(_, existing)| existing != member);
            return Ok(entry.members.len() != before);
        }
        Ok(false)
    }

    /// Recorta al conjunto a los N miembros más nuevos; retorna los
    /// miembros desalojados (los más viejos).
    pub fn ordered_trim_to_newest(&self, key: &str, keep: usize) -> Result<Vec<String>, VaultError> {
        let mut strata_guard = self.ordered_strata.write().map_err(lock_fault)?;
        if let Some(entry) = strata_guard.get_mut(key) {
            if entry.members.len() > keep {
                let overflow = entry.members.len() - keep;
                let evicted: Vec<String> = entry.members
                    .drain(..overflow)
                    .map(|(_, member)| member)
                    .collect();
                return Ok(evicted);
            }
        }
        Ok(Vec::new())
    }

    pub fn ordered_delete(&self, key: &str) -> Result<(), VaultError> {
        let mut strata_guard = self.ordered_strata.write().map_err(lock_fault)?;
        strata_guard.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn certify_setex_expiry() {
        let engine = MemoryVaultEngine::new();
        engine.set_with_ttl("k", "v", Duration::from_millis(40)).unwrap();
        assert_eq!(engine.get("k").unwrap().as_deref(), Some("v"));

        sleep(Duration::from_millis(60));
        assert!(engine.get("k").unwrap().is_none(), "La entrada debe vencer");
        assert!(!engine.exists("k").unwrap());
    }

    #[test]
    fn certify_counter_window_rebirth() {
        let engine = MemoryVaultEngine::new();

        let (first, remaining) = engine.increment_with_window("c", Duration::from_millis(50)).unwrap();
        assert_eq!(first, 1);
        assert!(remaining <= Duration::from_millis(50));

        let (second, _) = engine.increment_with_window("c", Duration::from_millis(50)).unwrap();
        assert_eq!(second, 2);

        sleep(Duration::from_millis(70));
        let (reborn, _) = engine.increment_with_window("c", Duration::from_millis(50)).unwrap();
        assert_eq!(reborn, 1, "Tras la ventana el contador renace");
        println!("✅ ENGINE: Counter window rebirth certified.");
    }

    #[test]
    fn certify_ordered_set_trim_evicts_oldest() {
        let engine = MemoryVaultEngine::new();
        for (score, member) in [(10, "a"), (30, "c"), (20, "b"), (40, "d")] {
            engine.ordered_insert("z", member, score, Duration::from_secs(60)).unwrap();
        }

        assert_eq!(engine.ordered_members("z").unwrap(), vec!["a", "b", "c", "d"]);

        let evicted = engine.ordered_trim_to_newest("z", 2).unwrap();
        assert_eq!(evicted, vec!["a", "b"], "Los más viejos caen primero");
        assert_eq!(engine.ordered_members("z").unwrap(), vec!["c", "d"]);
    }

    #[test]
    fn certify_ordered_member_replacement() {
        let engine = MemoryVaultEngine::new();
        engine.ordered_insert("z", "m", 10, Duration::from_secs(60)).unwrap();
        engine.ordered_insert("z", "m", 99, Duration::from_secs(60)).unwrap();

        assert_eq!(engine.ordered_members("z").unwrap().len(), 1, "Reinsertar no duplica");
        assert!(engine.ordered_remove("z", "m").unwrap());
        assert!(!engine.ordered_remove("z", "m").unwrap());
    }
}
