// [libs/infra/db/tests/nvr_inventory.rs]
/**
 * =================================================================
 * APARATO: NVR INVENTORY TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE
 * OBJETIVO: Certificar convergencia de canales, enlaces cámara-canal,
 *           elegibilidad de censo y propagación de salud.
 * =================================================================
 */

use chrono::Utc;
use panoptes_domain_models::camera::resolve_effective_channel_status;
use panoptes_domain_models::{ChannelHealth, NvrStatus, NvrVendor};
use panoptes_infra_db::repositories::{CameraRepository, NvrRepository, TenantRepository};
use panoptes_infra_db::SovereignDbClient;

async fn client(tag: &str) -> SovereignDbClient {
    SovereignDbClient::connect(&format!("file::mem_nvr_{}?mode=memory&cache=shared", tag), None)
        .await
        .expect("Fallo al inicializar DB en memoria")
}

#[tokio::test]
async fn certify_channel_convergence_and_census_eligibility() {
    let client = client("census").await;
    let tenants = TenantRepository::new(client.clone());
    let cameras = CameraRepository::new(client.clone());
    let nvrs = NvrRepository::new(client.clone());

    let tenant = tenants.create_tenant("t1", "T1", "t1.example").await.unwrap();
    let site = cameras.create_site(&tenant.id, "Warehouse").await.unwrap();
    let recorder = nvrs.create_nvr(&tenant.id, &site.id, "NVR-A", NvrVendor::Hikvision, "10.0.0.5", 80)
        .await.unwrap();

    // 1. ELEGIBILIDAD: sin censo previo, el grabador está pendiente
    let due_before = nvrs.list_due_for_census(200).await.unwrap();
    assert_eq!(due_before.len(), 1);

    // 2. CONVERGENCIA IDEMPOTENTE: el mismo canal re-descubierto no duplica
    nvrs.upsert_channel(&recorder.id, "1", "Dock Door", Some("rtsp://10.0.0.5:554/ch1"), None).await.unwrap();
    nvrs.upsert_channel(&recorder.id, "1", "Dock Door (renamed)", Some("rtsp://10.0.0.5:554/ch1"), None).await.unwrap();

    let materialized_channels = nvrs.list_channels_for_nvr(&recorder.id).await.unwrap();
    assert_eq!(materialized_channels.len(), 1, "La convergencia jamás duplica");
    assert_eq!(materialized_channels[0].name, "Dock Door (renamed)");
    assert_eq!(materialized_channels[0].direct_status, ChannelHealth::Unknown);

    let channel_id = nvrs.channel_id_by_ref(&recorder.id, "1").await.unwrap()
        .expect("El canal convergido debe existir");

    // 3. SELLADO: tras el ciclo, el grabador deja de ser elegible
    nvrs.seal_census_cycle(&recorder.id, Utc::now()).await.unwrap();
    assert!(nvrs.list_due_for_census(200).await.unwrap().is_empty());

    // 4. ENLACE CANAL-CÁMARA Y PROPAGACIÓN DE SALUD
    let camera = cameras.create_camera(&tenant.id, &site.id, "Dock Cam", None).await.unwrap();
    nvrs.link_channel_to_camera(&channel_id, &camera.id, "continuous").await.unwrap();
    nvrs.update_channel_status(&channel_id, ChannelHealth::Online).await.unwrap();
    nvrs.update_status(&recorder.id, NvrStatus::Offline).await.unwrap();

    let (owning_status, direct_status) = nvrs.linked_channel_health(&camera.id).await.unwrap()
        .expect("La cámara enlazada debe reportar su tupla de salud");
    assert_eq!(owning_status, NvrStatus::Offline);
    assert_eq!(direct_status, ChannelHealth::Online);

    let effective = resolve_effective_channel_status(Some(owning_status), direct_status);
    assert_eq!(effective.status, ChannelHealth::Offline);
    assert_eq!(effective.reason.as_deref(), Some("nvr_offline"));

    println!("✅ NVR: Inventory convergence and health propagation certified.");
}

#[tokio::test]
async fn certify_needs_credentials_persists_on_channel_and_camera() {
    let client = client("credentials").await;
    let tenants = TenantRepository::new(client.clone());
    let cameras = CameraRepository::new(client.clone());
    let nvrs = NvrRepository::new(client.clone());

    let tenant = tenants.create_tenant("t1", "T1", "t1.example").await.unwrap();
    let site = cameras.create_site(&tenant.id, "Yard").await.unwrap();
    let recorder = nvrs.create_nvr(&tenant.id, &site.id, "NVR-B", NvrVendor::Onvif, "10.0.0.6", 80)
        .await.unwrap();

    // 1. CANAL: el veredicto needs_credentials sobrevive en el inventario
    nvrs.upsert_channel(&recorder.id, "2", "Gate", Some("rtsp://10.0.0.6:554/ch2"), None).await.unwrap();
    let channel_id = nvrs.channel_id_by_ref(&recorder.id, "2").await.unwrap().unwrap();

    nvrs.update_channel_status(&channel_id, ChannelHealth::NeedsCredentials).await.unwrap();
    let sealed_channel = nvrs.list_channels_for_nvr(&recorder.id).await.unwrap()
        .into_iter().find(|channel| channel.id == channel_id).unwrap();
    assert_eq!(sealed_channel.direct_status, ChannelHealth::NeedsCredentials);

    // 2. CÁMARA DIRECTA: nace unknown, es blanco de sondeo y persiste
    //    el veredicto del monitor
    let camera = cameras.create_camera(&tenant.id, &site.id, "Gate Cam", Some("rtsp://10.0.0.7/live"))
        .await.unwrap();
    assert_eq!(camera.direct_status, ChannelHealth::Unknown);

    let probe_targets = cameras.list_probe_targets(64).await.unwrap();
    assert!(probe_targets.iter().any(|target| target.id == camera.id),
        "Una cámara habilitada con URL RTSP es blanco de sondeo");

    cameras.update_direct_status(&camera.id, ChannelHealth::NeedsCredentials).await.unwrap();
    let sealed_camera = cameras.find_camera_scoped(&tenant.id, &camera.id).await.unwrap().unwrap();
    assert_eq!(sealed_camera.direct_status, ChannelHealth::NeedsCredentials);

    // 3. SIN URL RTSP: jamás es blanco de sondeo
    let blind_camera = cameras.create_camera(&tenant.id, &site.id, "Blind Cam", None).await.unwrap();
    let refreshed_targets = cameras.list_probe_targets(64).await.unwrap();
    assert!(!refreshed_targets.iter().any(|target| target.id == blind_camera.id));

    println!("✅ NVR: needs_credentials persistence certified.");
}

#[tokio::test]
async fn certify_cross_tenant_nvr_masking() {
    let client = client("fence").await;
    let tenants = TenantRepository::new(client.clone());
    let cameras = CameraRepository::new(client.clone());
    let nvrs = NvrRepository::new(client.clone());

    let tenant_a = tenants.create_tenant("ta", "A", "a.example").await.unwrap();
    let tenant_b = tenants.create_tenant("tb", "B", "b.example").await.unwrap();
    let site = cameras.create_site(&tenant_a.id, "Lobby").await.unwrap();
    let recorder = nvrs.create_nvr(&tenant_a.id, &site.id, "NVR-A", NvrVendor::Dahua, "10.0.0.9", 80)
        .await.unwrap();

    assert!(nvrs.find_scoped(&tenant_a.id, &recorder.id).await.unwrap().is_some());
    assert!(nvrs.find_scoped(&tenant_b.id, &recorder.id).await.unwrap().is_none(),
        "Un grabador ajeno simplemente no existe");

    assert_eq!(nvrs.count_nvrs(&tenant_a.id).await.unwrap(), 1);
    assert_eq!(nvrs.count_nvrs(&tenant_b.id).await.unwrap(), 0);
}
