// [libs/core/crypto/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CRYPTOGRAPHIC CORE HUB (V11.0 - VMS EDITION)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE PRIMITIVAS Y AUTORIDADES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE SOURCE OF TRUTH: Todo material secreto del Plano de Control
 *    (contraseñas, DEKs, tokens de acceso, tokens HLS) cruza este estrato.
 * 2. OPAQUE FAILURE: Los fallos de descifrado colapsan en un único error
 *    sin detalle, negando oráculos de integridad al atacante.
 * 3. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta.
 * =================================================================
 */

pub mod errors;
pub mod gcm;
pub mod hls_token;
pub mod keyring;
pub mod password;
pub mod signing;
pub mod tokens;

pub use errors::CryptoError;
pub use hls_token::{HlsDeliveryToken, HlsTokenForge, HLS_TOKEN_SCOPE};
pub use keyring::{MasterKeyDescriptor, SovereignKeyring, WrappedDataKey};
pub use tokens::{
    AccessTokenClaims, IssuedAccessToken, SigningKeyDescriptor, TokenAuthority, VerifiedPrincipal,
};
