// [apps/control-plane/src/services/license_sentinel.rs]
/*!
 * =================================================================
 * APARATO: LICENSE SENTINEL (V11.0 - RS256 OFFLINE AUTHORITY)
 * CLASIFICACIÓN: BACKGROUND SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: VERIFICACIÓN FIRMADA, WATCHER, SCHEDULER Y GRACIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. OFFLINE TRUST: La autoridad firma RS256 fuera del appliance; aquí
 *    vive solo la llave pública instalada con el producto.
 * 2. HOT RELOAD: Un watcher de filesystem re-parsea ante cambios del
 *    archivo; un scheduler re-evalúa cada 10 minutos contra el reloj.
 * 3. STATE TRANSITIONS AS EVIDENCE: Toda transición válida<->inválida o
 *    entrada/salida de gracia emite un evento de auditoría.
 * =================================================================
 */

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use chrono::{DateTime, Utc};
use notify::{RecursiveMode, Watcher};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::services::audit_pipeline::AuditPipeline;
use panoptes_domain_models::audit::actions;
use panoptes_domain_models::license::evaluate_license_state;
use panoptes_domain_models::{AuditEvent, AuditResult, EffectiveLicenseState, LicensePayload, SignedLicenseFile};

/// Cadencia nominal del scheduler de re-evaluación.
const SCHEDULER_PULSE: Duration = Duration::from_secs(600);

/// Centinela de licencia con estado efectivo publicado.
pub struct LicenseSentinel {
    license_path: PathBuf,
    public_key_pem: Option<String>,
    effective_state: RwLock<EffectiveLicenseState>,
    last_verified_payload: RwLock<Option<LicensePayload>>,
    audit_pipeline: Arc<AuditPipeline>,
}

impl LicenseSentinel {
    /**
     * Ignición: carga la llave pública, parsea y evalúa el archivo.
     * Archivo o llave ausentes degradan a estado inválido, jamás a pánico.
     */
    pub fn ignite(
        license_path: PathBuf,
        public_key_path: PathBuf,
        audit_pipeline: Arc<AuditPipeline>,
    ) -> Arc<Self> {
        let public_key_pem = fs::read_to_string(&public_key_path)
            .map_err(|read_fault| {
                error!("🚫 [LICENSE]: Public key unreadable at [{}]: {}", public_key_path.display(), read_fault);
            })
            .ok();

        let sentinel = Arc::new(Self {
            license_path,
            public_key_pem,
            effective_state: RwLock::new(EffectiveLicenseState::invalid("LICENSE_NOT_EVALUATED")),
            last_verified_payload: RwLock::new(None),
            audit_pipeline,
        });

        sentinel.reload();
        sentinel
    }

    /// Estado efectivo vigente (instantánea).
    pub fn current_state(&self) -> EffectiveLicenseState {
        self.effective_state.read()
            .map(|state_guard| state_guard.clone())
            .unwrap_or_else(|_| EffectiveLicenseState::invalid("LICENSE_LOCK_POISONED"))
    }

    /**
     * Guardia de escritura: veta acciones restringidas bajo gracia o
     * invalidez.
     */
    pub fn authorize_write(&self, action: &str) -> Result<(), &'static str> {
        let current = self.current_state();
        if !current.rejects_write(action) {
            return Ok(());
        }
        if current.valid && current.grace {
            Err("LICENSE_GRACE")
        } else if current.reason.as_deref() == Some("LICENSE_EXPIRED") {
            Err("LICENSE_EXPIRED")
        } else {
            Err("LICENSE_INVALID")
        }
    }

    /**
     * Re-parsea el archivo, verifica la firma y publica el estado nuevo.
     */
    pub fn reload(&self) -> EffectiveLicenseState {
        let fresh_state = match self.parse_and_verify() {
            Ok(verified_payload) => {
                let evaluated = evaluate_license_state(&verified_payload, Utc::now());
                if let Ok(mut payload_guard) = self.last_verified_payload.write() {
                    *payload_guard = Some(verified_payload);
                }
                evaluated
            }
            Err(rejection_reason) => {
                warn!("🚫 [LICENSE]: File rejected: {}", rejection_reason);
                EffectiveLicenseState::invalid(rejection_reason)
            }
        };

        self.publish_state(fresh_state.clone());
        fresh_state
    }

    /// Re-evaluación pura contra un instante (scheduler y pruebas).
    pub fn evaluate_at(&self, now: DateTime<Utc>) -> EffectiveLicenseState {
        let retained_payload = self.last_verified_payload.read()
            .ok()
            .and_then(|payload_guard| payload_guard.clone());

        let fresh_state = match retained_payload {
            Some(payload) => evaluate_license_state(&payload, now),
            None => self.current_state(),
        };

        self.publish_state(fresh_state.clone());
        fresh_state
    }

    fn publish_state(&self, fresh_state: EffectiveLicenseState) {
        let previous_state = self.current_state();
        let transitioned = previous_state.valid != fresh_state.valid
            || previous_state.grace != fresh_state.grace;

        if let Ok(mut state_guard) = self.effective_state.write() {
            *state_guard = fresh_state.clone();
        }

        if transitioned {
            info!(
                "📜 [LICENSE_TRANSITION]: valid {} -> {}, grace {} -> {}.",
                previous_state.valid, fresh_state.valid, previous_state.grace, fresh_state.grace
            );

            let transition_event = AuditEvent::now(actions::LICENSE_TRANSITION, if fresh_state.valid {
                AuditResult::Success
            } else {
                AuditResult::Failure
            })
            .with_target("license", fresh_state.reason.clone().unwrap_or_else(|| "VALID".into()));

            if let Err(audit_fault) = self.audit_pipeline.record(transition_event) {
                error!("❌ [LICENSE]: Transition evidence lost: {}", audit_fault);
            }
        }
    }

    // --- ESTRATO DE VERIFICACIÓN RS256 ---

    fn parse_and_verify(&self) -> Result<LicensePayload, &'static str> {
        let Some(public_key_pem) = &self.public_key_pem else {
            return Err("LICENSE_PUBLIC_KEY_MISSING");
        };

        let file_body = fs::read_to_string(&self.license_path)
            .map_err(|_| "LICENSE_FILE_MISSING")?;

        let signed_container: SignedLicenseFile = serde_json::from_str(&file_body)
            .map_err(|_| "LICENSE_FILE_MALFORMED")?;

        if signed_container.alg != "RS256" {
            return Err("LICENSE_ALG_UNSUPPORTED");
        }

        let payload_bytes = BASE64_STANDARD.decode(&signed_container.payload_b64)
            .map_err(|_| "LICENSE_PAYLOAD_UNDECODABLE")?;
        let signature_bytes = BASE64_STANDARD.decode(&signed_container.sig_b64)
            .map_err(|_| "LICENSE_SIGNATURE_UNDECODABLE")?;

        let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
            .map_err(|_| "LICENSE_PUBLIC_KEY_MALFORMED")?;
        let verifying_key = VerifyingKey::<Sha256>::new(public_key);

        let signature = Signature::try_from(signature_bytes.as_slice())
            .map_err(|_| "LICENSE_SIGNATURE_MALFORMED")?;

        verifying_key.verify(&payload_bytes, &signature)
            .map_err(|_| "LICENSE_SIGNATURE_INVALID")?;

        serde_json::from_slice(&payload_bytes).map_err(|_| "LICENSE_PAYLOAD_MALFORMED")
    }

    // --- ESTRATO DE DAEMONS ---

    /// Watcher de filesystem: re-parseo ante cualquier mutación del archivo.
    pub fn spawn_watcher(self: Arc<Self>, mut stop_signal: watch::Receiver<bool>) {
        let watched_path = self.license_path.clone();
        let sentinel = self;

        tokio::spawn(async move {
            let (change_sender, mut change_receiver) = tokio::sync::mpsc::unbounded_channel::<()>();

            let mut filesystem_watcher = match notify::recommended_watcher(
                move |watch_outcome: Result<notify::Event, notify::Error>| {
                    if watch_outcome.is_ok() {
                        let _ = change_sender.send(());
                    }
                },
            ) {
                Ok(watcher_instance) => watcher_instance,
                Err(watcher_fault) => {
                    error!("❌ [LICENSE_WATCHER]: Ignition failed: {}", watcher_fault);
                    return;
                }
            };

            let watch_target = watched_path.parent().map(PathBuf::from).unwrap_or(watched_path.clone());
            if let Err(watch_fault) = filesystem_watcher.watch(&watch_target, RecursiveMode::NonRecursive) {
                error!("❌ [LICENSE_WATCHER]: Cannot observe [{}]: {}", watch_target.display(), watch_fault);
                return;
            }

            info!("👁️ [LICENSE_WATCHER]: Observing [{}].", watch_target.display());

            loop {
                tokio::select! {
                    maybe_change = change_receiver.recv() => {
                        if maybe_change.is_none() { return; }
                        info!("📜 [LICENSE_WATCHER]: Mutation detected; re-parsing.");
                        sentinel.reload();
                    }
                    _ = stop_signal.changed() => {
                        if *stop_signal.borrow() {
                            info!("🛑 [LICENSE_WATCHER]: Stop signal honored.");
                            return;
                        }
                    }
                }
            }
        });
    }

    /// Scheduler: re-evaluación periódica contra el reloj (10 minutos).
    pub fn spawn_scheduler(self: Arc<Self>, mut stop_signal: watch::Receiver<bool>) {
        let sentinel = self;

        tokio::spawn(async move {
            let mut pulse_ticker = interval(SCHEDULER_PULSE);

            loop {
                tokio::select! {
                    _ = pulse_ticker.tick() => {
                        sentinel.evaluate_at(Utc::now());
                    }
                    _ = stop_signal.changed() => {
                        if *stop_signal.borrow() {
                            info!("🛑 [LICENSE_SCHEDULER]: Stop signal honored.");
                            return;
                        }
                    }
                }
            }
        });
    }
}
