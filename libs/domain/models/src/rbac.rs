// [libs/domain/models/src/rbac.rs]
/*!
 * =================================================================
 * APARATO: RBAC COVERAGE MODEL (V11.0 - DEFAULT DENY)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: RESOLUCIÓN DE GRANTS A COBERTURA DE ALCANCE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DEFAULT DENY: La ausencia de cobertura es la respuesta. Un permiso
 *    sin registro equivale a denegación sin excepciones.
 * 2. SCOPE LATTICE: tenant > site > camera/group. La cobertura superior
 *    subsume a la inferior; jamás al revés.
 *
 * # Mathematical Proof (Coverage Union):
 * Sea G el conjunto de grants de un operador. La cobertura efectiva de un
 * permiso p es la unión de los alcances de todo g ∈ G cuyo rol otorga p.
 * La verificación contra un recurso r es pertenencia de r (o de un
 * ancestro de r) a dicha unión.
 * =================================================================
 */

use std::collections::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

/// Catálogo nominal de permisos del Plano de Control.
pub mod permissions {
    pub const CAMERA_VIEW: &str = "camera.view";
    pub const STREAM_VIEW_LIVE: &str = "stream.view_live";
    pub const USER_MANAGE: &str = "user.manage";
    pub const AUDIT_READ: &str = "audit.read";
    pub const LICENSE_MANAGE: &str = "license.manage";
    pub const NVR_MANAGE: &str = "nvr.manage";
    pub const CAMERA_CREDENTIAL_WRITE: &str = "camera.credential.write";
}

/// Nivel de alcance al que se liga un rol.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Tenant,
    Site,
    Camera,
    Group,
}

impl ScopeType {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "tenant" => Some(Self::Tenant),
            "site" => Some(Self::Site),
            "camera" => Some(Self::Camera),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::Site => "site",
            Self::Camera => "camera",
            Self::Group => "group",
        }
    }

    /// Rango dentro del retículo de alcances (mayor cubre a menor).
    pub fn rank(&self) -> u8 {
        match self {
            Self::Tenant => 3,
            Self::Site => 2,
            Self::Camera | Self::Group => 1,
        }
    }
}

/// Ligadura (rol, alcance) de un operador.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    pub role_id: Uuid,
    pub scope_type: ScopeType,
    /// None únicamente para alcance tenant (cubre el tenant completo).
    pub scope_id: Option<Uuid>,
}

/// Cobertura acumulada de un permiso concreto.
#[derive(Debug, Clone, Default)]
pub struct PermissionCoverage {
    pub tenant_wide: bool,
    pub site_ids: HashSet<Uuid>,
    pub camera_ids: HashSet<Uuid>,
    pub group_ids: HashSet<Uuid>,
}

impl PermissionCoverage {
    fn absorb_scope(&mut self, scope_type: ScopeType, scope_id: Option<Uuid>) {
        match (scope_type, scope_id) {
            (ScopeType::Tenant, _) => self.tenant_wide = true,
            (ScopeType::Site, Some(site)) => { self.site_ids.insert(site); },
            (ScopeType::Camera, Some(camera)) => { self.camera_ids.insert(camera); },
            (ScopeType::Group, Some(group)) => { self.group_ids.insert(group); },
            // Un grant no-tenant sin scope_id es un registro corrupto: se ignora.
            _ => {},
        }
    }

    pub fn covers_tenant(&self) -> bool {
        self.tenant_wide
    }

    pub fn covers_site(&self, site_id: &Uuid) -> bool {
        self.tenant_wide || self.site_ids.contains(site_id)
    }

    /// Cobertura de cámara: tenant-wide, su site, la cámara misma o
    /// cualquiera de sus grupos.
    pub fn covers_camera(&self, camera_id: &Uuid, site_id: &Uuid, group_ids: &[Uuid]) -> bool {
        self.tenant_wide
            || self.site_ids.contains(site_id)
            || self.camera_ids.contains(camera_id)
            || group_ids.iter().any(|group| self.group_ids.contains(group))
    }
}

/// Lente de permisos de un operador: permiso -> cobertura efectiva.
#[derive(Debug, Clone, Default)]
pub struct PermissionLens {
    coverage_by_permission: HashMap<String, PermissionCoverage>,
}

impl PermissionLens {
    /**
     * Construye la lente desde las ligaduras resueltas en persistencia:
     * tuplas (nombre_de_permiso, alcance, scope_id).
     */
    pub fn from_resolved_bindings(bindings: Vec<(String, ScopeType, Option<Uuid>)>) -> Self {
        let mut coverage_by_permission: HashMap<String, PermissionCoverage> = HashMap::new();

        for (permission_name, scope_type, scope_id) in bindings {
            coverage_by_permission
                .entry(permission_name)
                .or_default()
                .absorb_scope(scope_type, scope_id);
        }

        Self { coverage_by_permission }
    }

    pub fn coverage_for(&self, permission_name: &str) -> Option<&PermissionCoverage> {
        self.coverage_by_permission.get(permission_name)
    }

    /// Retiene el alcance máximo que el operador posee para un permiso.
    /// Empleado por la guardia anti-escalación en la asignación de roles.
    pub fn highest_rank_for(&self, permission_name: &str) -> u8 {
        match self.coverage_for(permission_name) {
            Some(coverage) if coverage.tenant_wide => ScopeType::Tenant.rank(),
            Some(coverage) if !coverage.site_ids.is_empty() => ScopeType::Site.rank(),
            Some(coverage) if !coverage.camera_ids.is_empty() || !coverage.group_ids.is_empty() => {
                ScopeType::Camera.rank()
            }
            _ => 0,
        }
    }

    pub fn allows_tenant(&self, permission_name: &str) -> bool {
        self.coverage_for(permission_name)
            .map(PermissionCoverage::covers_tenant)
            .unwrap_or(false)
    }

    pub fn allows_site(&self, permission_name: &str, site_id: &Uuid) -> bool {
        self.coverage_for(permission_name)
            .map(|coverage| coverage.covers_site(site_id))
            .unwrap_or(false)
    }

    pub fn allows_camera(
        &self,
        permission_name: &str,
        camera_id: &Uuid,
        site_id: &Uuid,
        group_ids: &[Uuid],
    ) -> bool {
        self.coverage_for(permission_name)
            .map(|coverage| coverage.covers_camera(camera_id, site_id, group_ids))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lens(bindings: Vec<(&str, ScopeType, Option<Uuid>)>) -> PermissionLens {
        PermissionLens::from_resolved_bindings(
            bindings.into_iter().map(|(p, s, i)| (p.to_string(), s, i)).collect()
        )
    }

    #[test]
    fn certify_default_deny() {
        let empty_lens = PermissionLens::default();
        assert!(!empty_lens.allows_tenant(permissions::CAMERA_VIEW));
        assert!(!empty_lens.allows_camera(permissions::CAMERA_VIEW, &Uuid::new_v4(), &Uuid::new_v4(), &[]));
        println!("✅ RBAC: Default deny certified.");
    }

    #[test]
    fn certify_tenant_wide_subsumes_everything() {
        let lens = lens(vec![(permissions::CAMERA_VIEW, ScopeType::Tenant, None)]);

        assert!(lens.allows_tenant(permissions::CAMERA_VIEW));
        assert!(lens.allows_site(permissions::CAMERA_VIEW, &Uuid::new_v4()));
        assert!(lens.allows_camera(permissions::CAMERA_VIEW, &Uuid::new_v4(), &Uuid::new_v4(), &[]));
    }

    #[test]
    fn certify_site_scope_covers_member_cameras_only() {
        let covered_site = Uuid::new_v4();
        let foreign_site = Uuid::new_v4();
        let lens = lens(vec![(permissions::CAMERA_VIEW, ScopeType::Site, Some(covered_site))]);

        assert!(!lens.allows_tenant(permissions::CAMERA_VIEW));
        assert!(lens.allows_site(permissions::CAMERA_VIEW, &covered_site));
        assert!(lens.allows_camera(permissions::CAMERA_VIEW, &Uuid::new_v4(), &covered_site, &[]));
        assert!(!lens.allows_camera(permissions::CAMERA_VIEW, &Uuid::new_v4(), &foreign_site, &[]));
    }

    #[test]
    fn certify_camera_and_group_membership() {
        let camera = Uuid::new_v4();
        let group = Uuid::new_v4();
        let site = Uuid::new_v4();

        let camera_lens = lens(vec![(permissions::CAMERA_VIEW, ScopeType::Camera, Some(camera))]);
        assert!(camera_lens.allows_camera(permissions::CAMERA_VIEW, &camera, &site, &[]));
        assert!(!camera_lens.allows_camera(permissions::CAMERA_VIEW, &Uuid::new_v4(), &site, &[]));

        let group_lens = lens(vec![(permissions::CAMERA_VIEW, ScopeType::Group, Some(group))]);
        assert!(group_lens.allows_camera(permissions::CAMERA_VIEW, &Uuid::new_v4(), &site, &[group]));
        assert!(!group_lens.allows_camera(permissions::CAMERA_VIEW, &Uuid::new_v4(), &site, &[Uuid::new_v4()]));
    }

    #[test]
    fn certify_permission_isolation() {
        // La cobertura de un permiso jamás contamina a otro.
        let lens = lens(vec![(permissions::CAMERA_VIEW, ScopeType::Tenant, None)]);
        assert!(!lens.allows_tenant(permissions::USER_MANAGE));
    }

    #[test]
    fn certify_rank_resolution() {
        let tenant_lens = lens(vec![(permissions::USER_MANAGE, ScopeType::Tenant, None)]);
        assert_eq!(tenant_lens.highest_rank_for(permissions::USER_MANAGE), 3);

        let site_lens = lens(vec![(permissions::USER_MANAGE, ScopeType::Site, Some(Uuid::new_v4()))]);
        assert_eq!(site_lens.highest_rank_for(permissions::USER_MANAGE), 2);

        assert_eq!(site_lens.highest_rank_for(permissions::AUDIT_READ), 0);
    }
}
