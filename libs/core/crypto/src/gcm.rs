// [libs/core/crypto/src/gcm.rs]
/*!
 * =================================================================
 * APARATO: AES-256-GCM SEALING ENGINE (V9.3 - AAD BOUND)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: SELLADO Y APERTURA AUTENTICADA DE SECRETOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. AAD BINDING: Todo secreto queda ligado a su entidad propietaria
 *    (tenant || cámara) vía datos autenticados adicionales, anulando
 *    ataques de cortar-y-pegar entre registros.
 * 2. OPAQUE COLLAPSE: Cualquier fallo de apertura (tag, nonce, AAD,
 *    llave) converge en 'CryptoError::Decryption' sin diagnóstico.
 *
 * # Mathematical Proof (Tamper Evidence):
 * GCM produce un tag T = GHASH(AAD, CT) ⊕ E(K, J0). Mutar un solo bit
 * de CT, nonce, tag o AAD invalida T con probabilidad 1 - 2^-128.
 * =================================================================
 */

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use crate::errors::CryptoError;

/// Longitud obligatoria del material de llave AES-256.
pub const GCM_KEY_LENGTH_BYTES: usize = 32;
/// Longitud del nonce de 96 bits exigido por GCM.
pub const GCM_NONCE_LENGTH_BYTES: usize = 12;
/// Longitud del tag de autenticación.
pub const GCM_TAG_LENGTH_BYTES: usize = 16;

/// Resultado de un sellado: nonce aleatorio, texto cifrado y tag separado.
#[derive(Debug, Clone)]
pub struct SealedSecret {
    pub nonce: [u8; GCM_NONCE_LENGTH_BYTES],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; GCM_TAG_LENGTH_BYTES],
}

/// Inicializa el motor GCM validando la longitud de llave.
///
/// Una llave de tamaño incorrecto es un defecto de integración y se
/// reporta por el canal separado 'InvalidKeyLength', nunca por el opaco.
fn build_cipher_engine(key_material: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    if key_material.len() != GCM_KEY_LENGTH_BYTES {
        return Err(CryptoError::InvalidKeyLength(key_material.len()));
    }
    Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_material)))
}

/**
 * Sella un secreto bajo AES-256-GCM con nonce aleatorio y AAD vinculante.
 *
 * # Errors:
 * - `CryptoError::InvalidKeyLength`: Material de llave != 32 bytes.
 * - `CryptoError::Decryption`: Colapso interno del motor (improbable).
 */
pub fn encrypt_gcm(
    key_material: &[u8],
    plaintext: &[u8],
    additional_authenticated_data: &[u8],
) -> Result<SealedSecret, CryptoError> {
    let cipher_engine = build_cipher_engine(key_material)?;

    let mut nonce_buffer = [0u8; GCM_NONCE_LENGTH_BYTES];
    rand::thread_rng().fill_bytes(&mut nonce_buffer);

    let ciphertext_with_tag = cipher_engine
        .encrypt(
            Nonce::from_slice(&nonce_buffer),
            Payload { msg: plaintext, aad: additional_authenticated_data },
        )
        .map_err(|_| CryptoError::Decryption)?;

    // Separación nominal: el tag vive en los últimos 16 bytes del buffer.
    let tag_boundary = ciphertext_with_tag.len() - GCM_TAG_LENGTH_BYTES;
    let mut tag_buffer = [0u8; GCM_TAG_LENGTH_BYTES];
    tag_buffer.copy_from_slice(&ciphertext_with_tag[tag_boundary..]);

    Ok(SealedSecret {
        nonce: nonce_buffer,
        ciphertext: ciphertext_with_tag[..tag_boundary].to_vec(),
        tag: tag_buffer,
    })
}

/**
 * Abre un secreto sellado verificando tag y AAD.
 *
 * # Errors:
 * - `CryptoError::InvalidKeyLength`: Material de llave != 32 bytes.
 * - `CryptoError::Decryption`: Cualquier otra causa, sin diagnóstico.
 */
pub fn decrypt_gcm(
    key_material: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    additional_authenticated_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher_engine = build_cipher_engine(key_material)?;

    if nonce.len() != GCM_NONCE_LENGTH_BYTES || tag.len() != GCM_TAG_LENGTH_BYTES {
        return Err(CryptoError::Decryption);
    }

    let mut ciphertext_with_tag = Vec::with_capacity(ciphertext.len() + GCM_TAG_LENGTH_BYTES);
    ciphertext_with_tag.extend_from_slice(ciphertext);
    ciphertext_with_tag.extend_from_slice(tag);

    cipher_engine
        .decrypt(
            Nonce::from_slice(nonce),
            Payload { msg: ciphertext_with_tag.as_slice(), aad: additional_authenticated_data },
        )
        .map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TEST_KEY: [u8; 32] = [7u8; 32];

    #[test]
    fn certify_seal_and_open_round_trip() {
        let sealed = encrypt_gcm(&TEST_KEY, b"rtsp-password", b"tenant|camera").unwrap();

        assert_eq!(sealed.nonce.len(), 12);
        assert_eq!(sealed.tag.len(), 16);

        let opened = decrypt_gcm(&TEST_KEY, &sealed.nonce, &sealed.ciphertext, &sealed.tag, b"tenant|camera")
            .expect("La apertura nominal debe prosperar");
        assert_eq!(opened, b"rtsp-password");
        println!("✅ GCM: Seal/Open round trip certified.");
    }

    #[test]
    fn certify_opaque_failure_on_any_mutation() {
        let sealed = encrypt_gcm(&TEST_KEY, b"secret", b"aad").unwrap();

        // 1. MUTACIÓN DE CIPHERTEXT
        let mut corrupt_ciphertext = sealed.ciphertext.clone();
        if corrupt_ciphertext.is_empty() { panic!("ciphertext vacío"); }
        corrupt_ciphertext[0] ^= 0x01;
        assert!(matches!(
            decrypt_gcm(&TEST_KEY, &sealed.nonce, &corrupt_ciphertext, &sealed.tag, b"aad"),
            Err(CryptoError::Decryption)
        ));

        // 2. MUTACIÓN DE TAG
        let mut corrupt_tag = sealed.tag;
        corrupt_tag[15] ^= 0x80;
        assert!(matches!(
            decrypt_gcm(&TEST_KEY, &sealed.nonce, &sealed.ciphertext, &corrupt_tag, b"aad"),
            Err(CryptoError::Decryption)
        ));

        // 3. MUTACIÓN DE NONCE
        let mut corrupt_nonce = sealed.nonce;
        corrupt_nonce[3] ^= 0x40;
        assert!(matches!(
            decrypt_gcm(&TEST_KEY, &corrupt_nonce, &sealed.ciphertext, &sealed.tag, b"aad"),
            Err(CryptoError::Decryption)
        ));

        // 4. MUTACIÓN DE AAD (cortar-y-pegar entre registros)
        assert!(matches!(
            decrypt_gcm(&TEST_KEY, &sealed.nonce, &sealed.ciphertext, &sealed.tag, b"otro-aad"),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn certify_key_length_is_a_programming_fault() {
        assert!(matches!(
            encrypt_gcm(&[1u8; 16], b"x", b"aad"),
            Err(CryptoError::InvalidKeyLength(16))
        ));
        assert!(matches!(
            decrypt_gcm(&[1u8; 31], &[0u8; 12], b"x", &[0u8; 16], b"aad"),
            Err(CryptoError::InvalidKeyLength(31))
        ));
    }

    proptest! {
        /// Propiedad: para todo (plaintext, aad), Dec(k, Enc(k, p, a), a) = p.
        #[test]
        fn certify_round_trip_property(
            plaintext in proptest::collection::vec(any::<u8>(), 0..512),
            aad in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let sealed = encrypt_gcm(&TEST_KEY, &plaintext, &aad).unwrap();
            let opened = decrypt_gcm(&TEST_KEY, &sealed.nonce, &sealed.ciphertext, &sealed.tag, &aad).unwrap();
            prop_assert_eq!(opened, plaintext);
        }
    }
}
