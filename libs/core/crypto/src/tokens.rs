// [libs/core/crypto/src/tokens.rs]
/*!
 * =================================================================
 * APARATO: TOKEN AUTHORITY (V10.0 - DUAL CITIZENSHIP)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: EMISIÓN Y VALIDACIÓN ESTRICTA DE TOKENS FIRMADOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. KID COEXISTENCE: El header transporta 'kid' para que llaves futuras
 *    convivan con la verificación de tokens emitidos bajo llaves previas.
 * 2. STRICT VALIDATION: 'alg' divergente, firma inválida, 'nbf' futuro o
 *    'exp' vencido producen rechazo sin matices.
 * 3. OPAQUE REFRESH: El token de refresco es material aleatorio de alta
 *    entropía. Solo su digest SHA-256 se persiste; presentarlo implica
 *    búsqueda por digest, nunca por material en claro.
 * =================================================================
 */

use std::collections::HashMap;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};

use crate::errors::CryptoError;

/// Vida nominal del token de acceso: 15 minutos.
pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 900;
/// Vida rodante de la familia de refresco: 7 días.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;
/// Entropía del material opaco de refresco.
const REFRESH_MATERIAL_LENGTH_BYTES: usize = 32;

/// Claims firmados del token de acceso.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub tenant_id: String,
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
}

/// Token de acceso recién acuñado junto a su metadata de expiración.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Identidad verificada extraída de un token de acceso válido.
#[derive(Debug, Clone)]
pub struct VerifiedPrincipal {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Descriptor de llave de firma simétrica (`JWT_SIGNING_KEYS`).
#[derive(Debug, Clone, Deserialize)]
pub struct SigningKeyDescriptor {
    pub kid: String,
    pub secret_b64: String,
}

/// Autoridad de firma HS256 con conjunto de llaves direccionado por kid.
pub struct TokenAuthority {
    signing_keys: HashMap<String, Vec<u8>>,
    active_kid: String,
}

impl TokenAuthority {
    /**
     * Construye la autoridad validando el conjunto de llaves de firma.
     *
     * # Errors:
     * - `KeyringIntegrity`: conjunto vacío, base64 corrupto, kid duplicado
     *   o kid activo ausente.
     */
    pub fn load(descriptors: &[SigningKeyDescriptor], active_kid: &str) -> Result<Self, CryptoError> {
        if descriptors.is_empty() {
            return Err(CryptoError::KeyringIntegrity("EMPTY_SIGNING_SET".into()));
        }

        let mut signing_keys = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let secret_material = BASE64_URL.decode(&descriptor.secret_b64)
                .or_else(|_| base64::engine::general_purpose::STANDARD.decode(&descriptor.secret_b64))
                .map_err(|decode_fault| CryptoError::KeyringIntegrity(
                    format!("SIGNING_DECODE_FAULT[{}]: {}", descriptor.kid, decode_fault)
                ))?;

            if signing_keys.insert(descriptor.kid.clone(), secret_material).is_some() {
                return Err(CryptoError::KeyringIntegrity(format!("DUPLICATE_KID[{}]", descriptor.kid)));
            }
        }

        if !signing_keys.contains_key(active_kid) {
            return Err(CryptoError::KeyringIntegrity(format!("ACTIVE_KID_MISSING[{}]", active_kid)));
        }

        Ok(Self { signing_keys, active_kid: active_kid.to_string() })
    }

    /**
     * Acuña un token de acceso HS256 con kid en el header.
     */
    pub fn issue_access_token(
        &self,
        tenant_id: &Uuid,
        user_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedAccessToken, CryptoError> {
        let secret_material = self.signing_keys
            .get(&self.active_kid)
            .ok_or_else(|| CryptoError::KeyNotFound(self.active_kid.clone()))?;

        let expires_at = now + Duration::seconds(ACCESS_TOKEN_TTL_SECONDS);
        let token_identifier = Uuid::new_v4().to_string();

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
            token_type: "access".to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: token_identifier.clone(),
        };

        let mut token_header = Header::new(Algorithm::HS256);
        token_header.kid = Some(self.active_kid.clone());

        let signed_token = encode(&token_header, &claims, &EncodingKey::from_secret(secret_material))
            .map_err(|_| CryptoError::TokenInvalid)?;

        Ok(IssuedAccessToken {
            token: signed_token,
            jti: token_identifier,
            expires_at,
        })
    }

    /**
     * Verifica un token de acceso con disciplina estricta.
     *
     * # Logic:
     * 1. Extrae el kid del header y localiza la llave; ausente -> inválido.
     * 2. Valida firma bajo HS256 exclusivamente ('alg' divergente -> rechazo).
     * 3. Valida 'exp' y 'nbf' sin tolerancia de reloj.
     * 4. Exige 'token_type' = "access".
     */
    pub fn verify_access_token(&self, raw_token: &str) -> Result<VerifiedPrincipal, CryptoError> {
        let token_header = decode_header(raw_token).map_err(|_| CryptoError::TokenInvalid)?;

        let declared_kid = token_header.kid.ok_or(CryptoError::TokenInvalid)?;
        let secret_material = self.signing_keys
            .get(&declared_kid)
            .ok_or(CryptoError::TokenInvalid)?;

        let mut validation_policy = Validation::new(Algorithm::HS256);
        validation_policy.validate_nbf = true;
        validation_policy.leeway = 0;
        validation_policy.set_required_spec_claims(&["exp", "nbf"]);

        let decoded = decode::<AccessTokenClaims>(
            raw_token,
            &DecodingKey::from_secret(secret_material),
            &validation_policy,
        ).map_err(|validation_fault| match validation_fault.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => CryptoError::TokenExpired,
            _ => CryptoError::TokenInvalid,
        })?;

        if decoded.claims.token_type != "access" {
            return Err(CryptoError::TokenInvalid);
        }

        let user_id = Uuid::parse_str(&decoded.claims.sub).map_err(|_| CryptoError::TokenInvalid)?;
        let tenant_id = Uuid::parse_str(&decoded.claims.tenant_id).map_err(|_| CryptoError::TokenInvalid)?;

        let expires_at = DateTime::<Utc>::from_timestamp(decoded.claims.exp, 0)
            .ok_or(CryptoError::TokenInvalid)?;

        Ok(VerifiedPrincipal {
            user_id,
            tenant_id,
            jti: decoded.claims.jti,
            expires_at,
        })
    }
}

/// Acuña material opaco de refresco (256 bits, URL-safe).
pub fn mint_refresh_material() -> String {
    let mut entropy_buffer = [0u8; REFRESH_MATERIAL_LENGTH_BYTES];
    rand::thread_rng().fill_bytes(&mut entropy_buffer);
    BASE64_URL.encode(entropy_buffer)
}

/// Digest SHA-256 del material de refresco, forma persistible única.
pub fn refresh_material_digest(opaque_material: &str) -> String {
    let mut digest_engine = Sha256::new();
    digest_engine.update(opaque_material.as_bytes());
    hex::encode(digest_engine.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};

    fn authority() -> TokenAuthority {
        let descriptors = [
            SigningKeyDescriptor { kid: "jwt-v1".into(), secret_b64: BASE64_STANDARD.encode(b"primary-signing-secret") },
            SigningKeyDescriptor { kid: "jwt-v2".into(), secret_b64: BASE64_STANDARD.encode(b"secondary-signing-secret") },
        ];
        TokenAuthority::load(&descriptors, "jwt-v1").unwrap()
    }

    #[test]
    fn certify_issue_and_verify_round_trip() {
        let authority = authority();
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();

        let issued = authority.issue_access_token(&tenant, &user, Utc::now()).unwrap();
        let principal = authority.verify_access_token(&issued.token).unwrap();

        assert_eq!(principal.user_id, user);
        assert_eq!(principal.tenant_id, tenant);
        assert_eq!(principal.jti, issued.jti);
        println!("✅ TOKENS: Issue/Verify round trip certified.");
    }

    #[test]
    fn certify_expired_token_rejection() {
        let authority = authority();
        let stale_instant = Utc::now() - Duration::seconds(ACCESS_TOKEN_TTL_SECONDS + 60);
        let issued = authority.issue_access_token(&Uuid::new_v4(), &Uuid::new_v4(), stale_instant).unwrap();

        assert!(matches!(
            authority.verify_access_token(&issued.token),
            Err(CryptoError::TokenExpired)
        ));
    }

    #[test]
    fn certify_foreign_signature_rejection() {
        let authority = authority();
        let foreign = TokenAuthority::load(
            &[SigningKeyDescriptor { kid: "jwt-v1".into(), secret_b64: BASE64_STANDARD.encode(b"attacker-secret") }],
            "jwt-v1",
        ).unwrap();

        let forged = foreign.issue_access_token(&Uuid::new_v4(), &Uuid::new_v4(), Utc::now()).unwrap();
        assert!(matches!(
            authority.verify_access_token(&forged.token),
            Err(CryptoError::TokenInvalid)
        ));
    }

    #[test]
    fn certify_future_nbf_rejection() {
        let authority = authority();
        let future_instant = Utc::now() + Duration::minutes(10);
        let issued = authority.issue_access_token(&Uuid::new_v4(), &Uuid::new_v4(), future_instant).unwrap();

        assert!(matches!(
            authority.verify_access_token(&issued.token),
            Err(CryptoError::TokenInvalid)
        ));
    }

    #[test]
    fn certify_refresh_material_digest_discipline() {
        let first_material = mint_refresh_material();
        let second_material = mint_refresh_material();

        assert_ne!(first_material, second_material, "La entropía debe divergir");
        assert_eq!(refresh_material_digest(&first_material).len(), 64);
        assert_eq!(
            refresh_material_digest(&first_material),
            refresh_material_digest(&first_material),
            "El digest debe ser determinista"
        );
    }
}
