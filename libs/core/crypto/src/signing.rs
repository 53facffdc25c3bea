// [libs/core/crypto/src/signing.rs]
/*!
 * =================================================================
 * APARATO: HMAC SIGNING ENGINE (V3.4 - CONSTANT TIME)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: FIRMAS HMAC-SHA256 Y COMPARACIÓN SIN FUGA TEMPORAL
 *
 * # Mathematical Proof (Timing Oracle Denial):
 * La comparación byte a byte con acumulador constante garantiza que el
 * tiempo de rechazo sea independiente del prefijo coincidente, anulando
 * la recuperación incremental de la firma por cronometraje.
 * =================================================================
 */

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256Engine = Hmac<Sha256>;

/// Longitud de la firma HMAC-SHA256 en bytes.
pub const HMAC_SIGNATURE_LENGTH_BYTES: usize = 32;

/// Calcula HMAC-SHA256 sobre los datos. HMAC acepta llaves de cualquier tamaño.
pub fn hmac_sha256(key_material: &[u8], data: &[u8]) -> [u8; HMAC_SIGNATURE_LENGTH_BYTES] {
    let mut signing_engine = HmacSha256Engine::new_from_slice(key_material)
        .expect("HMAC acepta cualquier longitud de llave");
    signing_engine.update(data);

    let mut signature_buffer = [0u8; HMAC_SIGNATURE_LENGTH_BYTES];
    signature_buffer.copy_from_slice(&signing_engine.finalize().into_bytes());
    signature_buffer
}

/// Renderizado canónico en hexadecimal minúsculo.
pub fn hmac_sha256_hex(key_material: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key_material, data))
}

/// Igualdad en tiempo constante entre dos buffers.
///
/// Longitudes divergentes retornan false de inmediato: la longitud de una
/// firma es pública y no constituye fuga.
pub fn constant_time_equals(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.ct_eq(right).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * TEST DE VECTOR RFC 4231 (Caso 2):
     * key = "Jefe", data = "what do ya want for nothing?".
     */
    #[test]
    fn certify_rfc4231_vector() {
        let signature_hex = hmac_sha256_hex(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            signature_hex,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
        println!("✅ HMAC: RFC 4231 vector certified.");
    }

    #[test]
    fn certify_lowercase_hex_rendering() {
        let rendered = hmac_sha256_hex(b"k", b"d");
        assert_eq!(rendered.len(), 64);
        assert!(rendered.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn certify_constant_time_comparison() {
        assert!(constant_time_equals(b"abc", b"abc"));
        assert!(!constant_time_equals(b"abc", b"abd"));
        assert!(!constant_time_equals(b"abc", b"abcd"), "Longitud divergente debe fallar");
        assert!(constant_time_equals(b"", b""));
    }
}
