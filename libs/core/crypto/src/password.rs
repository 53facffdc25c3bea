// [libs/core/crypto/src/password.rs]
/*!
 * =================================================================
 * APARATO: PASSWORD FORGE ENGINE (V7.0 - ARGON2ID)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: DERIVACIÓN Y VERIFICACIÓN DE CONTRASEÑAS DE OPERADOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FORWARD COMPATIBILITY: El hash codificado transporta sus propios
 *    parámetros. Endurecer m/t/p en el futuro no invalida hashes viejos.
 * 2. MEMORY-HARD DISCIPLINE: Argon2id con 64 MiB de presión de memoria
 *    neutraliza ataques de diccionario sobre GPU.
 *
 * # Mathematical Proof (Parameter Capture):
 * Sea H = argon2id(m,t,p,salt,pw). La forma codificada '$argon2id$v=19$...'
 * es autodescriptiva: verify(pw, H) reconstruye (m,t,p,salt) desde H,
 * garantizando la verificación correcta bajo cualquier rotación futura
 * de parámetros.
 * =================================================================
 */

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use crate::errors::CryptoError;

/// Presión de memoria nominal: 64 MiB (65536 KiB).
const ARGON2_MEMORY_COST_KIB: u32 = 65536;
/// Pasadas de cómputo.
const ARGON2_TIME_COST: u32 = 1;
/// Carriles de paralelismo.
const ARGON2_PARALLELISM_LANES: u32 = 4;
/// Longitud de la llave derivada en bytes.
const ARGON2_OUTPUT_LENGTH_BYTES: usize = 32;

/// Construye el motor Argon2id con los parámetros soberanos del appliance.
fn build_sovereign_engine() -> Result<Argon2<'static>, CryptoError> {
    let derivation_parameters = Params::new(
        ARGON2_MEMORY_COST_KIB,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM_LANES,
        Some(ARGON2_OUTPUT_LENGTH_BYTES),
    ).map_err(|parameter_fault| CryptoError::PasswordHash(parameter_fault.to_string()))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, derivation_parameters))
}

/**
 * Forja el hash codificado de una contraseña de operador.
 *
 * # Errors:
 * - `CryptoError::PasswordHash`: Si el motor de derivación colapsa.
 */
pub fn hash_password(plaintext_password: &str) -> Result<String, CryptoError> {
    let derivation_engine = build_sovereign_engine()?;
    let random_salt = SaltString::generate(&mut OsRng);

    let encoded_hash = derivation_engine
        .hash_password(plaintext_password.as_bytes(), &random_salt)
        .map_err(|derivation_fault| CryptoError::PasswordHash(derivation_fault.to_string()))?;

    Ok(encoded_hash.to_string())
}

/**
 * Verifica una contraseña contra su forma codificada autodescriptiva.
 *
 * Un hash malformado se reporta como fallo de verificación (false) y no
 * como error: el llamador nunca distingue entre "hash roto" y "contraseña
 * incorrecta".
 */
pub fn verify_password(plaintext_password: &str, encoded_hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(encoded_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(plaintext_password.as_bytes(), &parsed_hash)
        .is_ok()
}
