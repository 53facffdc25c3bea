// [apps/control-plane/src/config.rs]
/*!
 * =================================================================
 * APARATO: CONTROL PLANE CONFIGURATION (V10.0 - AIR-GAP CAPTURE)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: CAPTURA TIPADA Y ÚNICA DEL ENTORNO DE PROCESO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FAIL FAST: Una variable obligatoria ausente aborta la ignición con
 *    diagnóstico nominal; jamás se arranca con secretos a medias.
 * 2. LOCALHOST DEFAULT: El bind por omisión es 127.0.0.1; exponer el
 *    plano de control a la red exige decisión explícita del operador.
 * =================================================================
 */

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use panoptes_core_crypto::keyring::MasterKeyDescriptor;
use panoptes_core_crypto::tokens::SigningKeyDescriptor;

/// Cuota por omisión del spool de auditoría: 1 GiB.
pub const DEFAULT_AUDIT_SPOOL_QUOTA_BYTES: u64 = 1024 * 1024 * 1024;

/// Configuración completa del Plano de Control, capturada una sola vez.
#[derive(Clone)]
pub struct ControlPlaneConfig {
    pub database_url: String,
    pub database_auth_token: Option<String>,
    pub bind_address: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,

    // --- ESTRATO CRIPTOGRÁFICO ---
    pub master_keys: Vec<MasterKeyDescriptor>,
    pub active_master_kid: String,
    pub jwt_signing_keys: Vec<SigningKeyDescriptor>,
    pub jwt_active_kid: String,
    pub hls_hmac_keys: HashMap<String, Vec<u8>>,
    pub hls_active_kid: String,
    pub ip_hash_salt: String,

    // --- ESTRATO DE ENTREGA Y LICENCIA ---
    pub hls_root: PathBuf,
    pub license_path: PathBuf,
    pub license_public_key_path: PathBuf,

    // --- ESTRATO DE AUDITORÍA ---
    pub audit_spool_dir: PathBuf,
    pub audit_spool_quota_bytes: u64,

    // --- ESTRATO DE MEDIOS ---
    pub media_plane_grpc_url: String,
    pub sfu_base_url: String,
    pub sfu_internal_secret: String,
}

fn mandatory(variable_name: &str) -> Result<String> {
    env::var(variable_name).with_context(|| format!("CRITICAL_CONFIG_VOID: {} not defined", variable_name))
}

fn optional(variable_name: &str, default_value: &str) -> String {
    env::var(variable_name).unwrap_or_else(|_| default_value.to_string())
}

impl ControlPlaneConfig {
    /**
     * Hidrata la configuración desde el entorno del proceso.
     *
     * # Errors:
     * Diagnóstico nominal por cada variable obligatoria ausente o
     * malformada; la ignición se aborta.
     */
    pub fn from_environment() -> Result<Self> {
        // 1. RED Y PERSISTENCIA
        let database_url = mandatory("DATABASE_URL")?;
        let database_auth_token = env::var("DATABASE_AUTH_TOKEN").ok();
        let bind_address = optional("BIND_ADDR", "127.0.0.1");
        let port: u16 = optional("PORT", "8443").parse()
            .context("CRITICAL_CONFIG_FAULT: PORT is not a number")?;

        let allowed_origins: Vec<String> = optional("ALLOWED_ORIGINS", "")
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        // 2. KEYRING MAESTRO (KEKs para credenciales de cámara)
        let master_keys: Vec<MasterKeyDescriptor> = serde_json::from_str(&mandatory("MASTER_KEYS")?)
            .context("CRITICAL_CONFIG_FAULT: MASTER_KEYS is not a JSON array of {kid, material_b64}")?;
        let active_master_kid = mandatory("ACTIVE_MASTER_KID")?;

        // 3. AUTORIDAD DE TOKENS DE ACCESO
        let jwt_signing_keys: Vec<SigningKeyDescriptor> = serde_json::from_str(&mandatory("JWT_SIGNING_KEYS")?)
            .context("CRITICAL_CONFIG_FAULT: JWT_SIGNING_KEYS is not a JSON array of {kid, secret_b64}")?;
        let jwt_active_kid = optional("JWT_ACTIVE_KID", "jwt-v1");

        // 4. LLAVES HMAC DEL GATEKEEPER HLS (HLS_HMAC_KEY_V1..V5)
        let mut hls_hmac_keys = HashMap::new();
        for version_index in 1..=5u8 {
            if let Ok(key_material) = env::var(format!("HLS_HMAC_KEY_V{}", version_index)) {
                hls_hmac_keys.insert(format!("v{}", version_index), key_material.into_bytes());
            }
        }
        if hls_hmac_keys.is_empty() {
            bail!("CRITICAL_CONFIG_VOID: no HLS_HMAC_KEY_V{{1..5}} defined");
        }
        let hls_active_kid = optional("HLS_ACTIVE_KID", "v1");
        if !hls_hmac_keys.contains_key(&hls_active_kid) {
            bail!("CRITICAL_CONFIG_FAULT: HLS_ACTIVE_KID [{}] has no key material", hls_active_kid);
        }

        // 5. SAL DE PRIVACIDAD PARA PRINCIPALS IP
        let ip_hash_salt = optional("IP_HASH_SALT", "panoptes-process-salt");

        Ok(Self {
            database_url,
            database_auth_token,
            bind_address,
            port,
            allowed_origins,
            master_keys,
            active_master_kid,
            jwt_signing_keys,
            jwt_active_kid,
            hls_hmac_keys,
            hls_active_kid,
            ip_hash_salt,
            hls_root: PathBuf::from(mandatory("HLS_ROOT")?),
            license_path: PathBuf::from(mandatory("LICENSE_PATH")?),
            license_public_key_path: PathBuf::from(mandatory("LICENSE_PUBLIC_KEY_PATH")?),
            audit_spool_dir: PathBuf::from(mandatory("AUDIT_SPOOL_DIR")?),
            audit_spool_quota_bytes: optional("AUDIT_SPOOL_QUOTA_BYTES", "")
                .parse()
                .unwrap_or(DEFAULT_AUDIT_SPOOL_QUOTA_BYTES),
            media_plane_grpc_url: optional("MEDIA_PLANE_GRPC_URL", "http://127.0.0.1:50051"),
            sfu_base_url: optional("SFU_BASE_URL", "http://127.0.0.1:4443"),
            sfu_internal_secret: optional("SFU_INTERNAL_SECRET", "change-me-internal"),
        })
    }
}
