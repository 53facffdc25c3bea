// [libs/core/crypto/src/hls_token.rs]
/*!
 * =================================================================
 * APARATO: HLS TOKEN FORGE (V5.2 - CANONICAL STRING)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: ACUÑACIÓN Y VERIFICACIÓN DE TOKENS EFÍMEROS HLS
 *
 * # Mathematical Proof (Canonical Binding):
 * La cadena canónica es exactamente "hls|{sub}|{sid}|{exp}". Intercambiar
 * cualquier componente (cámara, sesión o expiración) produce una cadena
 * distinta y, por la resistencia de HMAC-SHA256, una firma inverificable.
 * =================================================================
 */

use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CryptoError;
use crate::signing::{constant_time_equals, hmac_sha256_hex};

/// Scope fijo del token de entrega HLS.
pub const HLS_TOKEN_SCOPE: &str = "hls";

/// Token HLS tal como viaja en la query string del playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlsDeliveryToken {
    pub sub: String,
    pub sid: String,
    pub exp: i64,
    pub scope: String,
    pub kid: String,
    pub sig: String,
}

impl HlsDeliveryToken {
    /// Serializa el token como query string del playlist.
    pub fn to_query_string(&self) -> String {
        format!(
            "sub={}&sid={}&exp={}&scope={}&kid={}&sig={}",
            self.sub, self.sid, self.exp, self.scope, self.kid, self.sig
        )
    }

    /// Forma opaca transportada por la cookie de sesión HLS.
    pub fn to_opaque_cookie_value(&self) -> String {
        format!("{}|{}|{}|{}|{}", self.sub, self.sid, self.exp, self.kid, self.sig)
    }

    /// Reconstruye el token desde la forma opaca de cookie.
    pub fn from_opaque_cookie_value(opaque_value: &str) -> Option<Self> {
        let segments: Vec<&str> = opaque_value.split('|').collect();
        if segments.len() != 5 {
            return None;
        }
        Some(Self {
            sub: segments[0].to_string(),
            sid: segments[1].to_string(),
            exp: segments[2].parse().ok()?,
            scope: HLS_TOKEN_SCOPE.to_string(),
            kid: segments[3].to_string(),
            sig: segments[4].to_string(),
        })
    }
}

/// Cadena canónica de firma.
fn canonical_signing_string(camera_subject: &str, session_identifier: &str, expiry_unix: i64) -> String {
    format!("hls|{}|{}|{}", camera_subject, session_identifier, expiry_unix)
}

/// Forja de tokens HLS sobre un conjunto de llaves HMAC direccionado por kid
/// (`HLS_HMAC_KEY_V1..V5` en el entorno).
pub struct HlsTokenForge {
    signing_keys: HashMap<String, Vec<u8>>,
    active_kid: String,
}

impl HlsTokenForge {
    pub fn load(signing_keys: HashMap<String, Vec<u8>>, active_kid: &str) -> Result<Self, CryptoError> {
        if signing_keys.is_empty() {
            return Err(CryptoError::KeyringIntegrity("EMPTY_HLS_KEY_SET".into()));
        }
        if !signing_keys.contains_key(active_kid) {
            return Err(CryptoError::KeyringIntegrity(format!("ACTIVE_KID_MISSING[{}]", active_kid)));
        }
        Ok(Self { signing_keys, active_kid: active_kid.to_string() })
    }

    /**
     * Acuña un token efímero para (cámara, sesión) con expiración absoluta.
     */
    pub fn mint(
        &self,
        camera_subject: &str,
        session_identifier: &str,
        expires_at: DateTime<Utc>,
    ) -> HlsDeliveryToken {
        let expiry_unix = expires_at.timestamp();
        let active_material = self.signing_keys
            .get(&self.active_kid)
            .expect("INVARIANTE: el kid activo siempre pertenece al conjunto");

        let signature_hex = hmac_sha256_hex(
            active_material,
            canonical_signing_string(camera_subject, session_identifier, expiry_unix).as_bytes(),
        );

        HlsDeliveryToken {
            sub: camera_subject.to_string(),
            sid: session_identifier.to_string(),
            exp: expiry_unix,
            scope: HLS_TOKEN_SCOPE.to_string(),
            kid: self.active_kid.clone(),
            sig: signature_hex,
        }
    }

    /**
     * Verifica un token presentado contra la cadena canónica.
     *
     * # Errors:
     * - `HlsTokenInvalid`: scope divergente, kid desconocido o firma inválida.
     * - `HlsTokenExpired`: 'exp' vencido respecto a `now`.
     */
    pub fn verify(&self, presented: &HlsDeliveryToken, now: DateTime<Utc>) -> Result<(), CryptoError> {
        if presented.scope != HLS_TOKEN_SCOPE {
            return Err(CryptoError::HlsTokenInvalid);
        }

        let key_material = self.signing_keys
            .get(&presented.kid)
            .ok_or(CryptoError::HlsTokenInvalid)?;

        let expected_signature = hmac_sha256_hex(
            key_material,
            canonical_signing_string(&presented.sub, &presented.sid, presented.exp).as_bytes(),
        );

        if !constant_time_equals(expected_signature.as_bytes(), presented.sig.as_bytes()) {
            return Err(CryptoError::HlsTokenInvalid);
        }

        // La firma manda sobre el reloj: un token mal firmado jamás revela
        // si además estaba vencido.
        if presented.exp <= now.timestamp() {
            return Err(CryptoError::HlsTokenExpired);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn forge() -> HlsTokenForge {
        let mut keys = HashMap::new();
        keys.insert("v1".to_string(), b"test-secret".to_vec());
        keys.insert("v2".to_string(), b"second-secret".to_vec());
        HlsTokenForge::load(keys, "v1").unwrap()
    }

    #[test]
    fn certify_mint_and_verify() {
        let forge = forge();
        let now = Utc::now();
        let token = forge.mint("c1", "s1", now + Duration::hours(1));

        assert_eq!(token.kid, "v1");
        assert_eq!(token.scope, "hls");
        forge.verify(&token, now).expect("Token nominal debe verificar");
        println!("✅ HLS_TOKEN: Mint/Verify certified.");
    }

    /**
     * TEST DE CANONICIDAD:
     * Intercambiar cualquiera de sub/sid/exp invalida la firma.
     */
    #[test]
    fn certify_component_swap_breaks_signature() {
        let forge = forge();
        let now = Utc::now();
        let token = forge.mint("c1", "s1", now + Duration::hours(1));

        let mut swapped_subject = token.clone();
        swapped_subject.sub = "c2".into();
        assert!(matches!(forge.verify(&swapped_subject, now), Err(CryptoError::HlsTokenInvalid)));

        let mut swapped_session = token.clone();
        swapped_session.sid = "s2".into();
        assert!(matches!(forge.verify(&swapped_session, now), Err(CryptoError::HlsTokenInvalid)));

        let mut swapped_expiry = token.clone();
        swapped_expiry.exp += 1;
        assert!(matches!(forge.verify(&swapped_expiry, now), Err(CryptoError::HlsTokenInvalid)));
    }

    #[test]
    fn certify_expiry_and_unknown_kid() {
        let forge = forge();
        let now = Utc::now();

        let expired = forge.mint("c1", "s1", now - Duration::seconds(1));
        assert!(matches!(forge.verify(&expired, now), Err(CryptoError::HlsTokenExpired)));

        let mut unknown_kid = forge.mint("c1", "s1", now + Duration::hours(1));
        unknown_kid.kid = "v9".into();
        assert!(matches!(forge.verify(&unknown_kid, now), Err(CryptoError::HlsTokenInvalid)));
    }

    #[test]
    fn certify_cookie_opaque_round_trip() {
        let forge = forge();
        let token = forge.mint("c1", "s1", Utc::now() + Duration::hours(1));

        let rehydrated = HlsDeliveryToken::from_opaque_cookie_value(&token.to_opaque_cookie_value())
            .expect("La forma opaca debe rehidratar");
        assert_eq!(rehydrated.sub, token.sub);
        assert_eq!(rehydrated.sig, token.sig);
        assert!(HlsDeliveryToken::from_opaque_cookie_value("garbage").is_none());
    }
}
