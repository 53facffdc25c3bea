// [libs/infra/db/src/schema.rs]
/**
 * =================================================================
 * APARATO: CONTROL PLANE DATABASE SCHEMA (V22.0 - RBAC STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. TENANT ROOTING: Toda tabla operativa cuelga de 'tenants'; los
 *    índices compuestos arrancan por tenant_id.
 * 2. SOFT DELETE: El índice único de email es parcial (deleted_at IS
 *    NULL), liberando direcciones para reutilización.
 * 3. APPEND ONLY: 'audit_events' carece de rutas de borrado; la
 *    retención de 7 años se garantiza por omisión estructural.
 * 4. IDEMPOTENCIA: Gestión de errores para migraciones en caliente.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 */
const CONTROL_PLANE_TABLES: &[(&str, &str)] = &[
    ("TABLE_TENANTS", r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email_domain TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_USERS", r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            email TEXT NOT NULL,
            display_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            is_disabled INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            deleted_at DATETIME
        );
    "#),
    ("TABLE_ROLES", r#"
        CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY,
            tenant_id TEXT,
            name TEXT NOT NULL,
            UNIQUE(tenant_id, name)
        );
    "#),
    ("TABLE_PERMISSIONS", r#"
        CREATE TABLE IF NOT EXISTS permissions (
            name TEXT PRIMARY KEY
        );
    "#),
    ("TABLE_ROLE_PERMISSIONS", r#"
        CREATE TABLE IF NOT EXISTS role_permissions (
            role_id TEXT NOT NULL,
            permission_name TEXT NOT NULL,
            PRIMARY KEY(role_id, permission_name)
        );
    "#),
    ("TABLE_USER_ROLES", r#"
        CREATE TABLE IF NOT EXISTS user_roles (
            user_id TEXT NOT NULL,
            role_id TEXT NOT NULL,
            scope_type TEXT NOT NULL,
            scope_id TEXT,
            UNIQUE(user_id, role_id, scope_type, scope_id)
        );
    "#),
    ("TABLE_REFRESH_TOKENS", r#"
        CREATE TABLE IF NOT EXISTS refresh_tokens (
            id TEXT PRIMARY KEY,
            family_id TEXT NOT NULL,
            tenant_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            token_digest TEXT NOT NULL UNIQUE,
            parent_id TEXT,
            used_at DATETIME,
            revoked INTEGER NOT NULL DEFAULT 0,
            expires_at DATETIME NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_PASSWORD_RESET_TOKENS", r#"
        CREATE TABLE IF NOT EXISTS password_reset_tokens (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            token_digest TEXT NOT NULL UNIQUE,
            used_at DATETIME,
            expires_at DATETIME NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_SITES", r#"
        CREATE TABLE IF NOT EXISTS sites (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_CAMERAS", r#"
        CREATE TABLE IF NOT EXISTS cameras (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            site_id TEXT NOT NULL,
            name TEXT NOT NULL,
            rtsp_url TEXT,
            is_enabled INTEGER NOT NULL DEFAULT 1,
            direct_status TEXT NOT NULL DEFAULT 'unknown',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_CAMERA_GROUPS", r#"
        CREATE TABLE IF NOT EXISTS camera_groups (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_CAMERA_GROUP_MEMBERS", r#"
        CREATE TABLE IF NOT EXISTS camera_group_members (
            group_id TEXT NOT NULL,
            camera_id TEXT NOT NULL,
            PRIMARY KEY(group_id, camera_id)
        );
    "#),
    ("TABLE_NVRS", r#"
        CREATE TABLE IF NOT EXISTS nvrs (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            site_id TEXT NOT NULL,
            name TEXT NOT NULL,
            vendor TEXT NOT NULL,
            host TEXT NOT NULL,
            port INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'unknown',
            last_sync_at DATETIME,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_NVR_CHANNELS", r#"
        CREATE TABLE IF NOT EXISTS nvr_channels (
            id TEXT PRIMARY KEY,
            nvr_id TEXT NOT NULL,
            channel_ref TEXT NOT NULL,
            name TEXT NOT NULL,
            rtsp_main TEXT,
            rtsp_sub TEXT,
            direct_status TEXT NOT NULL DEFAULT 'unknown',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(nvr_id, channel_ref)
        );
    "#),
    ("TABLE_NVR_CHANNEL_LINKS", r#"
        CREATE TABLE IF NOT EXISTS nvr_channel_links (
            channel_id TEXT NOT NULL,
            camera_id TEXT NOT NULL,
            recording_mode TEXT NOT NULL DEFAULT 'continuous',
            PRIMARY KEY(channel_id, camera_id)
        );
    "#),
    ("TABLE_CAMERA_CREDENTIALS", r#"
        CREATE TABLE IF NOT EXISTS camera_credentials (
            tenant_id TEXT NOT NULL,
            camera_id TEXT NOT NULL,
            master_kid TEXT NOT NULL,
            dek_ciphertext TEXT NOT NULL,
            dek_nonce TEXT NOT NULL,
            dek_tag TEXT NOT NULL,
            enc_username TEXT NOT NULL,
            enc_password TEXT NOT NULL,
            nonce_u TEXT NOT NULL,
            nonce_p TEXT NOT NULL,
            tag_u TEXT NOT NULL,
            tag_p TEXT NOT NULL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY(tenant_id, camera_id)
        );
    "#),
    ("TABLE_AUDIT_EVENTS", r#"
        CREATE TABLE IF NOT EXISTS audit_events (
            id TEXT PRIMARY KEY,
            timestamp_utc DATETIME NOT NULL,
            tenant_id TEXT,
            actor_user_id TEXT,
            ip_address TEXT,
            action TEXT NOT NULL,
            target_type TEXT,
            target_id TEXT,
            result TEXT NOT NULL,
            reason_code TEXT,
            request_id TEXT
        );
    "#),
];

/**
 * ESTRATO 2: ACELERACIÓN (Índices y Unicidad Parcial)
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_USERS_EMAIL_LIVE", "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_live ON users(tenant_id, email) WHERE deleted_at IS NULL;"),
    ("IDX_USERS_TENANT", "CREATE INDEX IF NOT EXISTS idx_users_tenant ON users(tenant_id, created_at);"),
    ("IDX_REFRESH_FAMILY", "CREATE INDEX IF NOT EXISTS idx_refresh_family ON refresh_tokens(family_id);"),
    ("IDX_REFRESH_SESSION", "CREATE INDEX IF NOT EXISTS idx_refresh_session ON refresh_tokens(session_id);"),
    ("IDX_CAMERAS_TENANT", "CREATE INDEX IF NOT EXISTS idx_cameras_tenant ON cameras(tenant_id, site_id);"),
    ("IDX_NVRS_SYNC", "CREATE INDEX IF NOT EXISTS idx_nvrs_sync ON nvrs(last_sync_at);"),
    ("IDX_AUDIT_TENANT_TIME", "CREATE INDEX IF NOT EXISTS idx_audit_tenant_time ON audit_events(tenant_id, timestamp_utc, id);"),
];

/**
 * ESTRATO 3: SEMILLA RBAC (Catálogo de Permisos y Roles Integrados)
 * Identificadores fijos para que las ligaduras sobrevivan reinstalaciones.
 */
const RBAC_SEED_STATEMENTS: &[(&str, &str)] = &[
    ("SEED_PERMISSIONS", r#"
        INSERT OR IGNORE INTO permissions (name) VALUES
            ('camera.view'),
            ('stream.view_live'),
            ('user.manage'),
            ('audit.read'),
            ('license.manage'),
            ('nvr.manage'),
            ('camera.credential.write');
    "#),
    ("SEED_BUILTIN_ROLES", r#"
        INSERT OR IGNORE INTO roles (id, tenant_id, name) VALUES
            ('00000000-0000-4000-8000-000000000001', NULL, 'tenant-admin'),
            ('00000000-0000-4000-8000-000000000002', NULL, 'operator'),
            ('00000000-0000-4000-8000-000000000003', NULL, 'viewer');
    "#),
    ("SEED_ROLE_PERMISSIONS", r#"
        INSERT OR IGNORE INTO role_permissions (role_id, permission_name) VALUES
            ('00000000-0000-4000-8000-000000000001', 'camera.view'),
            ('00000000-0000-4000-8000-000000000001', 'stream.view_live'),
            ('00000000-0000-4000-8000-000000000001', 'user.manage'),
            ('00000000-0000-4000-8000-000000000001', 'audit.read'),
            ('00000000-0000-4000-8000-000000000001', 'license.manage'),
            ('00000000-0000-4000-8000-000000000001', 'nvr.manage'),
            ('00000000-0000-4000-8000-000000000001', 'camera.credential.write'),
            ('00000000-0000-4000-8000-000000000002', 'camera.view'),
            ('00000000-0000-4000-8000-000000000002', 'stream.view_live'),
            ('00000000-0000-4000-8000-000000000003', 'camera.view');
    "#),
];

/// Identificadores de los roles integrados, para ligaduras programáticas.
pub mod builtin_roles {
    pub const TENANT_ADMIN: &str = "00000000-0000-4000-8000-000000000001";
    pub const OPERATOR: &str = "00000000-0000-4000-8000-000000000002";
    pub const VIEWER: &str = "00000000-0000-4000-8000-000000000003";
}

/**
 * Ejecuta la secuencia maestra de sincronización del esquema estructural.
 *
 * # Errors:
 * Retorna error si alguna tabla base falla en solidificarse.
 */
#[instrument(skip(database_connection))]
pub async fn apply_control_plane_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization V22.0...");

    solidify_base_strata(database_connection).await?;
    harden_access_layer(database_connection).await?;
    seed_rbac_catalog(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Control-plane ledger level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in CONTROL_PLANE_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn seed_rbac_catalog(db: &Connection) -> Result<()> {
    for (identifier, sql) in RBAC_SEED_STATEMENTS {
        debug!("  ↳ Seeding: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_SEED_FAULT: {}", identifier))?;
    }
    Ok(())
}
