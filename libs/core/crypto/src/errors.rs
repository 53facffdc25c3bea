// [libs/core/crypto/src/errors.rs]
/*!
 * =================================================================
 * APARATO: CRYPTO ERROR CATALOG (V4.1 - SOBERANO)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS CRIPTOGRÁFICOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ORACLE DENIAL: 'Decryption' es deliberadamente opaco. Nunca se
 *    distingue entre tag inválido, nonce corrupto o AAD divergente.
 * 2. PROGRAMMING FAULTS: 'InvalidKeyLength' queda separado del canal
 *    opaco porque delata un defecto de integración, no un ataque.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    /// Fallo opaco de descifrado. Integridad comprometida o llave incorrecta.
    #[error("[L1_CRYPTO_FAULT]: DECRYPT_FAILED")]
    Decryption,

    /// El identificador de llave (kid) no existe en el conjunto cargado.
    #[error("[L1_CRYPTO_FAULT]: KEY_NOT_FOUND -> {0}")]
    KeyNotFound(String),

    /// Defecto de integración: el material de llave no mide 32 bytes.
    #[error("[L1_CRYPTO_FAULT]: INVALID_KEY_LENGTH -> expected 32 bytes, received {0}")]
    InvalidKeyLength(usize),

    /// El conjunto de KEKs es inconsistente (kid duplicado, activo ausente).
    #[error("[L1_KEYRING_FAULT]: KEYRING_INTEGRITY -> {0}")]
    KeyringIntegrity(String),

    /// Fallo del motor Argon2id al forjar o parsear un hash codificado.
    #[error("[L1_HASH_FAULT]: PASSWORD_HASH_FAILURE -> {0}")]
    PasswordHash(String),

    // --- ESTRATO DE TOKENS (ACCESO Y HLS) ---

    /// El token de acceso expiró ('exp' vencido).
    #[error("[L1_TOKEN_FAULT]: TOKEN_EXPIRED")]
    TokenExpired,

    /// Firma inválida, 'alg' divergente, 'nbf' futuro o claims corruptos.
    #[error("[L1_TOKEN_FAULT]: TOKEN_INVALID")]
    TokenInvalid,

    /// El token HLS expiró ('exp' vencido).
    #[error("[L1_HLS_FAULT]: HLS_TOKEN_EXPIRED")]
    HlsTokenExpired,

    /// Firma HMAC del token HLS inválida o scope/kid divergente.
    #[error("[L1_HLS_FAULT]: HLS_TOKEN_INVALID")]
    HlsTokenInvalid,
}
