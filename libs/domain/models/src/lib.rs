// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN CONTRACT HUB (V14.0 - CONTROL PLANE)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS COMPARTIDOS ENTRE ESTRATOS L1-L4
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE CONTRACT: Toda entidad cruza los estratos con una única
 *    definición serde, erradicando divergencias de esquema.
 * 2. TENANT ROOTING: Cada entidad operativa cuelga de un tenant; las
 *    resoluciones cross-tenant colapsan en not-found aguas arriba.
 * =================================================================
 */

pub mod audit;
pub mod camera;
pub mod credentials;
pub mod license;
pub mod live;
pub mod pagination;
pub mod rbac;
pub mod user;

pub use audit::{AuditEvent, AuditResult};
pub use camera::{
    Camera, ChannelHealth, EffectiveChannelStatus, Nvr, NvrChannel, NvrChannelLink, NvrStatus,
    NvrVendor, RecordingMode, Site,
};
pub use credentials::{credential_binding_aad, CameraCredentialRecord, CameraCredentialPlaintext};
pub use license::{EffectiveLicenseState, LicenseLimits, LicensePayload, SignedLicenseFile};
pub use live::{ClientTelemetryEvent, FallbackPolicy, HlsLeg, LiveSessionEnvelope, TelemetryPolicy, WebRtcLeg};
pub use rbac::{Grant, PermissionCoverage, PermissionLens, ScopeType};
pub use user::{Tenant, User};
