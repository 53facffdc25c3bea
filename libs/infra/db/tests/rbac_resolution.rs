// [libs/infra/db/tests/rbac_resolution.rs]
/**
 * =================================================================
 * APARATO: RBAC RESOLUTION TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar la resolución de ligaduras a lente de permisos
 *           con roles integrados y alcances mixtos.
 * =================================================================
 */

use panoptes_domain_models::rbac::{permissions, Grant, PermissionLens, ScopeType};
use panoptes_infra_db::repositories::{CameraRepository, RbacRepository, TenantRepository, UserRepository};
use panoptes_infra_db::schema::builtin_roles;
use panoptes_infra_db::SovereignDbClient;
use uuid::Uuid;

async fn client(tag: &str) -> SovereignDbClient {
    SovereignDbClient::connect(&format!("file::mem_rbac_{}?mode=memory&cache=shared", tag), None)
        .await
        .expect("Fallo al inicializar DB en memoria")
}

#[tokio::test]
async fn certify_binding_resolution_to_lens() {
    let client = client("lens").await;
    let tenants = TenantRepository::new(client.clone());
    let users = UserRepository::new(client.clone());
    let cameras = CameraRepository::new(client.clone());
    let rbac = RbacRepository::new(client.clone());

    let tenant = tenants.create_tenant("t1", "T1", "t1.example").await.unwrap();
    let operator = users.create_user(&tenant.id, "viewer@t1.example", "Viewer", "$h").await.unwrap();
    let site = cameras.create_site(&tenant.id, "Lobby").await.unwrap();
    let camera = cameras.create_camera(&tenant.id, &site.id, "Door", None).await.unwrap();

    // 1. LIGADURAS: viewer sobre el site + operator sobre una cámara suelta
    let viewer_role = Uuid::parse_str(builtin_roles::VIEWER).unwrap();
    let operator_role = Uuid::parse_str(builtin_roles::OPERATOR).unwrap();

    rbac.replace_user_grants(&operator.id, &[
        Grant { role_id: viewer_role, scope_type: ScopeType::Site, scope_id: Some(site.id) },
        Grant { role_id: operator_role, scope_type: ScopeType::Camera, scope_id: Some(camera.id) },
    ]).await.unwrap();

    // 2. RESOLUCIÓN: la lente refleja la unión de coberturas
    let bindings = rbac.resolved_bindings(&tenant.id, &operator.id).await.unwrap();
    let lens = PermissionLens::from_resolved_bindings(bindings);

    assert!(lens.allows_site(permissions::CAMERA_VIEW, &site.id), "viewer@site otorga camera.view");
    assert!(lens.allows_camera(permissions::STREAM_VIEW_LIVE, &camera.id, &site.id, &[]),
        "operator@camera otorga stream.view_live sobre esa cámara");
    assert!(!lens.allows_tenant(permissions::USER_MANAGE), "Nadie otorgó gestión de usuarios");

    println!("✅ RBAC: Binding resolution certified.");
}

#[tokio::test]
async fn certify_grant_replacement_and_role_validation() {
    let client = client("replace").await;
    let tenants = TenantRepository::new(client.clone());
    let users = UserRepository::new(client.clone());
    let rbac = RbacRepository::new(client.clone());

    let tenant = tenants.create_tenant("t1", "T1", "t1.example").await.unwrap();
    let operator = users.create_user(&tenant.id, "ops@t1.example", "Ops", "$h").await.unwrap();

    let admin_role = Uuid::parse_str(builtin_roles::TENANT_ADMIN).unwrap();

    rbac.replace_user_grants(&operator.id, &[
        Grant { role_id: admin_role, scope_type: ScopeType::Tenant, scope_id: None },
    ]).await.unwrap();
    assert_eq!(rbac.list_user_grants(&operator.id).await.unwrap().len(), 1);

    // El reemplazo es total: el conjunto viejo se incinera.
    rbac.replace_user_grants(&operator.id, &[]).await.unwrap();
    assert!(rbac.list_user_grants(&operator.id).await.unwrap().is_empty());

    // Validación de existencia de roles para el tenant.
    assert!(rbac.role_exists_for_tenant(&admin_role, &tenant.id).await.unwrap());
    assert!(!rbac.role_exists_for_tenant(&Uuid::new_v4(), &tenant.id).await.unwrap());

    // El catálogo del rol integrado expone sus permisos (guardia anti-escalación).
    let admin_permissions = rbac.role_permission_names(&admin_role).await.unwrap();
    assert!(admin_permissions.contains(&permissions::USER_MANAGE.to_string()));
    assert_eq!(admin_permissions.len(), 7);
}
