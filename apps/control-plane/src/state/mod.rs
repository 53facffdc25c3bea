// [apps/control-plane/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: CONTROL PLANE STATE ORCHESTRATOR (V21.0 - COMPOSITION ROOT)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ORQUESTACIÓN DE REPOSITORIOS, BÓVEDAS Y AUTORIDADES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COMPOSITION ROOT: Toda dependencia se construye aquí una sola vez
 *    y viaja explícita; nada global, nada perezoso.
 * 2. READ-MOSTLY LENS CACHE: La lente de permisos por (tenant, operador)
 *    vive 10 s; la asignación de roles la invalida en caliente.
 * 3. ATOMIC KEYRING: El keyring maestro es de solo lectura tras la
 *    ignición; una recarga lo intercambia como unidad.
 * =================================================================
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ControlPlaneConfig;
use crate::errors::ApiError;
use crate::services::{AuditPipeline, LicenseSentinel};
use panoptes_core_crypto::{HlsTokenForge, SovereignKeyring, TokenAuthority};
use panoptes_domain_models::rbac::PermissionLens;
use panoptes_infra_db::repositories::{
    AuditRepository, CameraRepository, CredentialRepository, NvrRepository, RbacRepository,
    RefreshTokenRepository, ResetTokenRepository, TenantRepository, UserRepository,
};
use panoptes_infra_db::SovereignDbClient;
use panoptes_infra_kv::{
    LockoutSentinel, MemoryVaultEngine, RevocationRegistry, SessionStore, SlidingWindowLimiter,
};
use panoptes_infra_media::{MediaPlaneClient, SfuClient};
use panoptes_infra_nvr::AdapterRegistry;

/// Vida de una entrada de la caché de lentes de permisos.
const PERMISSION_LENS_TTL: Duration = Duration::from_secs(10);

type LensCache = Mutex<HashMap<(Uuid, Uuid), (Instant, Arc<PermissionLens>)>>;

/**
 * Contenedor de estado compartido (Thread-Safe) del Plano de Control.
 * Actúa como la placa base donde se conectan todos los estratos.
 */
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ControlPlaneConfig>,
    pub database_client: SovereignDbClient,

    // --- ESTRATO L3: REPOSITORIOS ---
    pub tenant_repository: Arc<TenantRepository>,
    pub user_repository: Arc<UserRepository>,
    pub rbac_repository: Arc<RbacRepository>,
    pub refresh_repository: Arc<RefreshTokenRepository>,
    pub reset_repository: Arc<ResetTokenRepository>,
    pub camera_repository: Arc<CameraRepository>,
    pub nvr_repository: Arc<NvrRepository>,
    pub credential_repository: Arc<CredentialRepository>,
    pub audit_repository: Arc<AuditRepository>,

    // --- ESTRATO L3: BÓVEDAS EFÍMERAS ---
    pub session_store: SessionStore,
    pub lockout_sentinel: LockoutSentinel,
    pub revocation_registry: RevocationRegistry,
    pub rate_limiter: SlidingWindowLimiter,

    // --- ESTRATO L1: AUTORIDADES CRIPTOGRÁFICAS ---
    pub token_authority: Arc<TokenAuthority>,
    pub master_keyring: Arc<RwLock<Arc<SovereignKeyring>>>,
    pub hls_token_forge: Arc<HlsTokenForge>,

    // --- ESTRATO L4: SERVICIOS DE FONDO ---
    pub audit_pipeline: Arc<AuditPipeline>,
    pub license_sentinel: Arc<LicenseSentinel>,

    // --- ESTRATO L3: CLIENTES DE COLABORADORES ---
    pub media_client: MediaPlaneClient,
    pub sfu_client: SfuClient,
    pub adapter_registry: AdapterRegistry,

    // --- CACHÉ READ-MOSTLY ---
    permission_lens_cache: Arc<LensCache>,
}

impl AppState {
    /**
     * Forja el Estado Maestro completo a partir de la configuración.
     * El orden es load-bearing: ledger antes que pipeline de auditoría,
     * pipeline antes que centinela de licencia.
     */
    pub async fn ignite(
        config: Arc<ControlPlaneConfig>,
        stop_signal: watch::Receiver<bool>,
    ) -> Result<Self> {
        debug!("🧬 [APP_STATE]: Executing control-plane ignition sequence V21.0...");

        // 1. PERSISTENCIA TÁCTICA
        let database_client = SovereignDbClient::connect(
            &config.database_url,
            config.database_auth_token.clone(),
        ).await.context("FATAL: Database link collapse")?;

        // 2. AUTORIDADES CRIPTOGRÁFICAS (fallo = ignición abortada)
        let master_keyring = SovereignKeyring::load(&config.master_keys, &config.active_master_kid)
            .context("FATAL: Master keyring inconsistent")?;
        let token_authority = TokenAuthority::load(&config.jwt_signing_keys, &config.jwt_active_kid)
            .context("FATAL: Token authority inconsistent")?;
        let hls_token_forge = HlsTokenForge::load(config.hls_hmac_keys.clone(), &config.hls_active_kid)
            .context("FATAL: HLS key set inconsistent")?;

        // 3. BÓVEDAS EFÍMERAS SOBRE EL MOTOR ÚNICO
        let vault_engine = Arc::new(MemoryVaultEngine::new());
        let session_store = SessionStore::new(vault_engine.clone());
        let lockout_sentinel = LockoutSentinel::new(vault_engine.clone());
        let revocation_registry = RevocationRegistry::new(vault_engine.clone());
        let rate_limiter = SlidingWindowLimiter::new(vault_engine, config.ip_hash_salt.clone());

        // 4. REPOSITORIOS SOBERANOS
        let audit_repository = Arc::new(AuditRepository::new(database_client.clone()));

        // 5. PIPELINE DE AUDITORÍA (cola + spool + replayer)
        let audit_pipeline = AuditPipeline::ignite(
            audit_repository.clone(),
            config.audit_spool_dir.clone(),
            config.audit_spool_quota_bytes,
            stop_signal,
        );

        // 6. CENTINELA DE LICENCIA
        let license_sentinel = LicenseSentinel::ignite(
            config.license_path.clone(),
            config.license_public_key_path.clone(),
            audit_pipeline.clone(),
        );

        // 7. CLIENTES DE COLABORADORES (perezosos; jamás exigen vida ajena)
        let media_client = MediaPlaneClient::connect_lazy(&config.media_plane_grpc_url)
            .context("FATAL: Media plane endpoint malformed")?;
        let sfu_client = SfuClient::new(&config.sfu_base_url, &config.sfu_internal_secret);

        info!("🛰️ [APP_STATE]: Composition root sealed. All strata connected.");

        Ok(Self {
            tenant_repository: Arc::new(TenantRepository::new(database_client.clone())),
            user_repository: Arc::new(UserRepository::new(database_client.clone())),
            rbac_repository: Arc::new(RbacRepository::new(database_client.clone())),
            refresh_repository: Arc::new(RefreshTokenRepository::new(database_client.clone())),
            reset_repository: Arc::new(ResetTokenRepository::new(database_client.clone())),
            camera_repository: Arc::new(CameraRepository::new(database_client.clone())),
            nvr_repository: Arc::new(NvrRepository::new(database_client.clone())),
            credential_repository: Arc::new(CredentialRepository::new(database_client.clone())),
            audit_repository,
            database_client,
            session_store,
            lockout_sentinel,
            revocation_registry,
            rate_limiter,
            token_authority: Arc::new(token_authority),
            master_keyring: Arc::new(RwLock::new(Arc::new(master_keyring))),
            hls_token_forge: Arc::new(hls_token_forge),
            audit_pipeline,
            license_sentinel,
            media_client,
            sfu_client,
            adapter_registry: AdapterRegistry::new(),
            permission_lens_cache: Arc::new(Mutex::new(HashMap::new())),
            config,
        })
    }

    /// Instantánea del keyring maestro vigente.
    pub fn current_keyring(&self) -> Arc<SovereignKeyring> {
        self.master_keyring.read()
            .map(|keyring_guard| keyring_guard.clone())
            .expect("FATAL: Master keyring lock poisoned")
    }

    /**
     * Lente de permisos del operador, con caché de 10 segundos.
     */
    pub async fn permission_lens(
        &self,
        tenant_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Arc<PermissionLens>, ApiError> {
        let cache_key = (*tenant_id, *user_id);

        if let Ok(cache_guard) = self.permission_lens_cache.lock() {
            if let Some((cached_at, cached_lens)) = cache_guard.get(&cache_key) {
                if cached_at.elapsed() < PERMISSION_LENS_TTL {
                    return Ok(cached_lens.clone());
                }
            }
        }

        let resolved_bindings = self.rbac_repository.resolved_bindings(tenant_id, user_id).await?;
        let fresh_lens = Arc::new(PermissionLens::from_resolved_bindings(resolved_bindings));

        if let Ok(mut cache_guard) = self.permission_lens_cache.lock() {
            cache_guard.insert(cache_key, (Instant::now(), fresh_lens.clone()));
        }
        Ok(fresh_lens)
    }

    /// Invalidación en caliente tras mutar ligaduras de roles.
    pub fn invalidate_permission_lens(&self, tenant_id: &Uuid, user_id: &Uuid) {
        if let Ok(mut cache_guard) = self.permission_lens_cache.lock() {
            cache_guard.remove(&(*tenant_id, *user_id));
        }
    }
}
