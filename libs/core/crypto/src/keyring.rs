// [libs/core/crypto/src/keyring.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN KEYRING (V8.0 - ROTACIÓN ADITIVA)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: CUSTODIA DE KEKs Y ENVOLTURA DE DEKs POR REGISTRO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ADDITIVE ROTATION: Instalar un KEK nuevo nunca invalida registros
 *    viejos. El kid viejo permanece en el conjunto hasta que el operador
 *    re-envuelve todos los registros que lo referencian.
 * 2. FATAL LOAD DISCIPLINE: Un conjunto inconsistente (kid duplicado,
 *    material de tamaño ilegal, activo ausente) aborta la ignición del
 *    proceso. Un keyring a medias es peor que ningún keyring.
 * 3. IN-MEMORY ONLY: El DEK en claro jamás se persiste. Solo su forma
 *    envuelta (kid, nonce, ct, tag) toca el disco.
 * =================================================================
 */

use std::collections::HashMap;
use serde::Deserialize;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use tracing::info;

use crate::errors::CryptoError;
use crate::gcm::{self, GCM_KEY_LENGTH_BYTES};

/// Descriptor de llave maestra tal como llega desde la configuración
/// (`MASTER_KEYS`: arreglo JSON de `{kid, material_b64}`).
#[derive(Debug, Clone, Deserialize)]
pub struct MasterKeyDescriptor {
    pub kid: String,
    pub material_b64: String,
}

/// Forma envuelta de un DEK, lista para la persistencia.
#[derive(Debug, Clone)]
pub struct WrappedDataKey {
    pub kid: String,
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; 16],
}

/// Conjunto inmutable de KEKs con un identificador activo.
/// Se construye una vez en la ignición y se intercambia atómicamente
/// en recargas (el llamador lo envuelve en RwLock/Arc).
pub struct SovereignKeyring {
    key_encryption_keys: HashMap<String, [u8; GCM_KEY_LENGTH_BYTES]>,
    active_kid: String,
}

impl SovereignKeyring {
    /**
     * Carga y valida el conjunto de KEKs desde los descriptores de entorno.
     *
     * # Errors:
     * - `KeyringIntegrity`: kid duplicado, base64 corrupto, material != 32
     *   bytes, conjunto vacío o kid activo ausente del conjunto.
     */
    pub fn load(
        descriptors: &[MasterKeyDescriptor],
        active_kid: &str,
    ) -> Result<Self, CryptoError> {
        if descriptors.is_empty() {
            return Err(CryptoError::KeyringIntegrity("EMPTY_KEY_SET".into()));
        }

        let mut key_encryption_keys = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let decoded_material = BASE64_STANDARD.decode(&descriptor.material_b64)
                .map_err(|decode_fault| CryptoError::KeyringIntegrity(
                    format!("MATERIAL_DECODE_FAULT[{}]: {}", descriptor.kid, decode_fault)
                ))?;

            if decoded_material.len() != GCM_KEY_LENGTH_BYTES {
                return Err(CryptoError::KeyringIntegrity(
                    format!("MATERIAL_LENGTH_FAULT[{}]: {} bytes", descriptor.kid, decoded_material.len())
                ));
            }

            let mut material_buffer = [0u8; GCM_KEY_LENGTH_BYTES];
            material_buffer.copy_from_slice(&decoded_material);

            if key_encryption_keys.insert(descriptor.kid.clone(), material_buffer).is_some() {
                return Err(CryptoError::KeyringIntegrity(
                    format!("DUPLICATE_KID[{}]", descriptor.kid)
                ));
            }
        }

        if !key_encryption_keys.contains_key(active_kid) {
            return Err(CryptoError::KeyringIntegrity(
                format!("ACTIVE_KID_MISSING[{}]", active_kid)
            ));
        }

        info!(
            "🔑 [KEYRING]: {} KEK(s) loaded. Active kid [{}].",
            key_encryption_keys.len(),
            active_kid
        );

        Ok(Self {
            key_encryption_keys,
            active_kid: active_kid.to_string(),
        })
    }

    /// Identificador del KEK activo para nuevas envolturas.
    pub fn active_kid(&self) -> &str {
        &self.active_kid
    }

    /// Consulta de pertenencia (diagnóstico de re-envoltura pendiente).
    pub fn contains_kid(&self, kid: &str) -> bool {
        self.key_encryption_keys.contains_key(kid)
    }

    /**
     * Envuelve un DEK bajo el KEK activo ligándolo a su entidad vía AAD.
     */
    pub fn wrap_data_key(
        &self,
        data_encryption_key: &[u8],
        additional_authenticated_data: &[u8],
    ) -> Result<WrappedDataKey, CryptoError> {
        let active_material = self.key_encryption_keys
            .get(&self.active_kid)
            .ok_or_else(|| CryptoError::KeyNotFound(self.active_kid.clone()))?;

        let sealed = gcm::encrypt_gcm(active_material, data_encryption_key, additional_authenticated_data)?;

        Ok(WrappedDataKey {
            kid: self.active_kid.clone(),
            nonce: sealed.nonce,
            ciphertext: sealed.ciphertext,
            tag: sealed.tag,
        })
    }

    /**
     * Desenvuelve un DEK con el KEK que el registro declara.
     *
     * # Errors:
     * - `KeyNotFound`: el kid del registro ya no está instalado.
     * - `Decryption`: fallo opaco de apertura (llave, tag, nonce o AAD).
     */
    pub fn unwrap_data_key(
        &self,
        kid: &str,
        nonce: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
        additional_authenticated_data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let key_material = self.key_encryption_keys
            .get(kid)
            .ok_or_else(|| CryptoError::KeyNotFound(kid.to_string()))?;

        gcm::decrypt_gcm(key_material, nonce, ciphertext, tag, additional_authenticated_data)
    }
}
