// [libs/domain/models/src/credentials.rs]
/*!
 * =================================================================
 * APARATO: CAMERA CREDENTIAL CONTRACT (V5.0 - ENVELOPE ENCRYPTION)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: FORMA EN REPOSO DEL SECRETO RTSP POR CÁMARA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ENVELOPE SHAPE: Un DEK por registro, envuelto por el KEK activo;
 *    usuario y contraseña sellados por el DEK con nonces independientes.
 * 2. AAD ANCHOR: Toda operación GCM del registro liga tenant y cámara,
 *    anulando trasplantes de secretos entre entidades.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// AAD canónico de un registro de credenciales: `tenant_id || camera_id`.
pub fn credential_binding_aad(tenant_id: &Uuid, camera_id: &Uuid) -> Vec<u8> {
    let mut binding = Vec::with_capacity(72);
    binding.extend_from_slice(tenant_id.to_string().as_bytes());
    binding.extend_from_slice(camera_id.to_string().as_bytes());
    binding
}

/// Registro cifrado tal como se persiste. El DEK en claro jamás sale
/// de la memoria del proceso.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraCredentialRecord {
    pub tenant_id: Uuid,
    pub camera_id: Uuid,
    pub master_kid: String,
    pub dek_ciphertext: Vec<u8>,
    pub dek_nonce: Vec<u8>,
    pub dek_tag: Vec<u8>,
    pub enc_username: Vec<u8>,
    pub enc_password: Vec<u8>,
    pub nonce_u: Vec<u8>,
    pub nonce_p: Vec<u8>,
    pub tag_u: Vec<u8>,
    pub tag_p: Vec<u8>,
}

/// Credenciales abiertas, exclusivamente en memoria.
/// Deliberadamente sin Serialize: este tipo jamás cruza el borde HTTP.
pub struct CameraCredentialPlaintext {
    pub username: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_aad_binds_both_identities() {
        let tenant = Uuid::new_v4();
        let camera_a = Uuid::new_v4();
        let camera_b = Uuid::new_v4();

        assert_eq!(
            credential_binding_aad(&tenant, &camera_a),
            credential_binding_aad(&tenant, &camera_a)
        );
        assert_ne!(
            credential_binding_aad(&tenant, &camera_a),
            credential_binding_aad(&tenant, &camera_b)
        );
    }
}
