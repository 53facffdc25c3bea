// [libs/domain/models/src/license.rs]
/*!
 * =================================================================
 * APARATO: LICENSE DOMAIN CONTRACT (V8.0 - GRACE SEMANTICS)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: PAYLOAD FIRMADO, ESTADO EFECTIVO Y VENTANA DE GRACIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. OFFLINE AUTHORITY: La licencia se firma RS256 fuera del appliance;
 *    aquí solo vive la llave pública y la evaluación pura.
 * 2. GRACE WINDOW: 30 días tras 'valid_until' el estado permanece válido
 *    con bandera de gracia; las escrituras restringidas se rechazan.
 * =================================================================
 */

use std::collections::BTreeMap;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Días de gracia tras la expiración nominal.
pub const LICENSE_GRACE_DAYS: i64 = 30;

/// Acciones de escritura vetadas mientras la licencia está en gracia
/// o inválida.
pub const GRACE_RESTRICTED_ACTIONS: [&str; 5] = [
    "user.create",
    "user.disable",
    "user.role.assign",
    "camera.credential.write",
    "nvr.discover",
];

/// Límites de inventario otorgados.
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseLimits {
    pub max_cameras: i64,
    pub max_nvrs: i64,
}

/// Payload decodificado de la licencia (la firma cubre su forma b64).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicensePayload {
    pub license_id: String,
    /// "all" o un tenant id concreto.
    pub tenant_scope: String,
    pub issued_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub limits: LicenseLimits,
    pub features: BTreeMap<String, bool>,
}

/// Contenedor firmado tal como reside en disco.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedLicenseFile {
    pub payload_b64: String,
    pub sig_b64: String,
    pub alg: String,
}

/// Estado efectivo publicado hacia guardias y operadores.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveLicenseState {
    pub valid: bool,
    pub grace: bool,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub limits: Option<LicenseLimits>,
    pub features: BTreeMap<String, bool>,
}

impl EffectiveLicenseState {
    /// Estado terminal para licencia ausente o inverificable.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            grace: false,
            reason: Some(reason.into()),
            expires_at: None,
            limits: None,
            features: BTreeMap::new(),
        }
    }

    /// Decide si una acción de escritura queda vetada bajo este estado.
    pub fn rejects_write(&self, action: &str) -> bool {
        if !GRACE_RESTRICTED_ACTIONS.contains(&action) {
            return false;
        }
        !self.valid || self.grace
    }
}

/**
 * Evaluación pura del estado efectivo contra un instante dado.
 *
 * # Logic:
 * 1. now <= valid_until            -> valid, sin gracia.
 * 2. valid_until < now <= +30 días -> valid con gracia (LICENSE_GRACE).
 * 3. now > valid_until + 30 días   -> inválida (LICENSE_EXPIRED).
 */
pub fn evaluate_license_state(payload: &LicensePayload, now: DateTime<Utc>) -> EffectiveLicenseState {
    let grace_deadline = payload.valid_until + Duration::days(LICENSE_GRACE_DAYS);

    if now <= payload.valid_until {
        EffectiveLicenseState {
            valid: true,
            grace: false,
            reason: None,
            expires_at: Some(payload.valid_until),
            limits: Some(payload.limits.clone()),
            features: payload.features.clone(),
        }
    } else if now <= grace_deadline {
        EffectiveLicenseState {
            valid: true,
            grace: true,
            reason: Some("LICENSE_GRACE".to_string()),
            expires_at: Some(payload.valid_until),
            limits: Some(payload.limits.clone()),
            features: payload.features.clone(),
        }
    } else {
        EffectiveLicenseState {
            valid: false,
            grace: false,
            reason: Some("LICENSE_EXPIRED".to_string()),
            expires_at: Some(payload.valid_until),
            limits: Some(payload.limits.clone()),
            features: payload.features.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(valid_until: DateTime<Utc>) -> LicensePayload {
        LicensePayload {
            license_id: "lic-001".into(),
            tenant_scope: "all".into(),
            issued_at: valid_until - Duration::days(365),
            valid_until,
            limits: LicenseLimits { max_cameras: 64, max_nvrs: 8 },
            features: BTreeMap::from([("live_view".to_string(), true)]),
        }
    }

    #[test]
    fn certify_nominal_validity() {
        let now = Utc::now();
        let state = evaluate_license_state(&payload(now + Duration::days(10)), now);
        assert!(state.valid);
        assert!(!state.grace);
        assert!(state.reason.is_none());
    }

    /**
     * TEST DE VENTANA DE GRACIA:
     * Ayer expiró -> válida con gracia; día 31 -> inválida.
     */
    #[test]
    fn certify_grace_window_boundaries() {
        let now = Utc::now();

        let yesterday_expired = payload(now - Duration::days(1));
        let in_grace = evaluate_license_state(&yesterday_expired, now);
        assert!(in_grace.valid && in_grace.grace);
        assert_eq!(in_grace.reason.as_deref(), Some("LICENSE_GRACE"));

        let long_expired = payload(now - Duration::days(LICENSE_GRACE_DAYS + 1));
        let terminal = evaluate_license_state(&long_expired, now);
        assert!(!terminal.valid && !terminal.grace);
        assert_eq!(terminal.reason.as_deref(), Some("LICENSE_EXPIRED"));

        println!("✅ LICENSE: Grace window certified.");
    }

    #[test]
    fn certify_restricted_write_gate() {
        let now = Utc::now();
        let in_grace = evaluate_license_state(&payload(now - Duration::days(1)), now);

        assert!(in_grace.rejects_write("user.create"));
        assert!(!in_grace.rejects_write("camera.view"), "Lecturas jamás se vetan");

        let nominal = evaluate_license_state(&payload(now + Duration::days(1)), now);
        assert!(!nominal.rejects_write("user.create"));

        let invalid = EffectiveLicenseState::invalid("LICENSE_INVALID");
        assert!(invalid.rejects_write("nvr.discover"));
    }
}
