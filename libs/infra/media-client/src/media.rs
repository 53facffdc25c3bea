// [libs/infra/media-client/src/media.rs]
/*!
 * =================================================================
 * APARATO: MEDIA PLANE CLIENT (V8.0 - BACKGROUND IGNITION)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: LLAMADAS gRPC HACIA EL PLANO DE MEDIOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LAZY CHANNEL: El canal se declara en la ignición sin exigir que el
 *    plano de medios esté vivo; el primer RPC establece el enlace.
 * 2. DECOUPLED STARTS: StartIngest y StartSfuRtpEgress corren en tareas
 *    propias con su propia ventana; el abandono del navegador durante
 *    el handshake jamás aborta la ignición del pipeline.
 * 3. SHARED DEADLINE READS: GetIngestStatus/ListIngests/Health comparten
 *    la cancelación de la petición de origen.
 * =================================================================
 */

use std::time::Duration;
use tokio::time::timeout;
use tonic::transport::{Channel, Endpoint};
use tracing::{info, instrument};

use crate::errors::MediaClientError;
use crate::proto::media_v1::media_service_client::MediaServiceClient;
use crate::proto::media_v1::{
    GetIngestStatusRequest, GetIngestStatusResponse, HealthRequest, HealthResponse,
    ListIngestsRequest, ListIngestsResponse, StartIngestRequest, StartIngestResponse,
    StartSfuRtpEgressRequest, StartSfuRtpEgressResponse, StopSfuRtpEgressRequest,
};

/// Ventana nominal de toda llamada saliente.
pub const MEDIA_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Cliente de larga vida hacia el plano de medios.
#[derive(Clone)]
pub struct MediaPlaneClient {
    channel: Channel,
}

impl MediaPlaneClient {
    /**
     * Declara el enlace perezoso hacia el plano de medios.
     *
     * # Errors:
     * - `UpstreamMedia`: la URL del endpoint es imparseable.
     */
    pub fn connect_lazy(media_plane_url: &str) -> Result<Self, MediaClientError> {
        let endpoint = Endpoint::from_shared(media_plane_url.to_string())
            .map_err(|endpoint_fault| MediaClientError::UpstreamMedia(endpoint_fault.to_string()))?
            .timeout(MEDIA_CALL_TIMEOUT)
            .connect_timeout(Duration::from_secs(5));

        info!("🎞️ [MEDIA_UPLINK]: Lazy channel declared towards [{}].", media_plane_url);
        Ok(Self { channel: endpoint.connect_lazy() })
    }

    fn service_client(&self) -> MediaServiceClient<Channel> {
        MediaServiceClient::new(self.channel.clone())
    }

    /**
     * Arranca (o confirma) la ingesta RTSP de una cámara.
     *
     * La llamada viaja en una tarea desacoplada: si el futuro llamador se
     * descarta a mitad del handshake, la ignición continúa hasta su
     * propia ventana de 10 s.
     */
    #[instrument(skip(self, rtsp_url))]
    pub async fn start_ingest(
        &self,
        camera_id: &str,
        rtsp_url: &str,
        prefer_tcp: bool,
    ) -> Result<StartIngestResponse, MediaClientError> {
        let mut detached_client = self.service_client();
        let request = StartIngestRequest {
            camera_id: camera_id.to_string(),
            rtsp_url: rtsp_url.to_string(),
            prefer_tcp,
        };

        let background_ignition = tokio::spawn(async move {
            timeout(MEDIA_CALL_TIMEOUT, detached_client.start_ingest(request)).await
        });

        Self::unwrap_background(background_ignition.await)
    }

    /**
     * Arranca un egress RTP hacia el transporte anunciado por el SFU.
     * Misma disciplina de tarea desacoplada que StartIngest.
     */
    #[instrument(skip(self))]
    pub async fn start_sfu_rtp_egress(
        &self,
        request: StartSfuRtpEgressRequest,
    ) -> Result<StartSfuRtpEgressResponse, MediaClientError> {
        let mut detached_client = self.service_client();

        let background_ignition = tokio::spawn(async move {
            timeout(MEDIA_CALL_TIMEOUT, detached_client.start_sfu_rtp_egress(request)).await
        });

        Self::unwrap_background(background_ignition.await)
    }

    /// Detención del egress; también desacoplada (cierre limpio de sala).
    #[instrument(skip(self))]
    pub async fn stop_sfu_rtp_egress(
        &self,
        camera_id: &str,
        egress_id: &str,
    ) -> Result<bool, MediaClientError> {
        let mut detached_client = self.service_client();
        let request = StopSfuRtpEgressRequest {
            camera_id: camera_id.to_string(),
            egress_id: egress_id.to_string(),
        };

        let background_stop = tokio::spawn(async move {
            timeout(MEDIA_CALL_TIMEOUT, detached_client.stop_sfu_rtp_egress(request)).await
        });

        Self::unwrap_background(background_stop.await).map(|response| response.stopped)
    }

    // --- LECTURAS CORTAS (comparten la cancelación del llamador) ---

    pub async fn get_ingest_status(
        &self,
        camera_id: &str,
    ) -> Result<GetIngestStatusResponse, MediaClientError> {
        let mut client = self.service_client();
        let outcome = timeout(
            MEDIA_CALL_TIMEOUT,
            client.get_ingest_status(GetIngestStatusRequest { camera_id: camera_id.to_string() }),
        ).await;

        Self::unwrap_inline(outcome)
    }

    pub async fn list_ingests(&self) -> Result<ListIngestsResponse, MediaClientError> {
        let mut client = self.service_client();
        let outcome = timeout(MEDIA_CALL_TIMEOUT, client.list_ingests(ListIngestsRequest {})).await;
        Self::unwrap_inline(outcome)
    }

    pub async fn health(&self) -> Result<HealthResponse, MediaClientError> {
        let mut client = self.service_client();
        let outcome = timeout(MEDIA_CALL_TIMEOUT, client.health(HealthRequest {})).await;
        Self::unwrap_inline(outcome)
    }

    // --- TRIAJE UNIFORME DE RESULTADOS ---

    fn unwrap_background<R>(
        joined: Result<Result<Result<tonic::Response<R>, tonic::Status>, tokio::time::error::Elapsed>, tokio::task::JoinError>,
    ) -> Result<R, MediaClientError> {
        match joined {
            Ok(call_outcome) => Self::unwrap_inline(call_outcome),
            Err(join_fault) => Err(MediaClientError::BackgroundCollapse(join_fault.to_string())),
        }
    }

    fn unwrap_inline<R>(
        outcome: Result<Result<tonic::Response<R>, tonic::Status>, tokio::time::error::Elapsed>,
    ) -> Result<R, MediaClientError> {
        match outcome {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(grpc_status)) => Err(MediaClientError::UpstreamMedia(grpc_status.to_string())),
            Err(_elapsed) => Err(MediaClientError::DeadlineExceeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn certify_lazy_channel_declaration() {
        // La declaración jamás exige un plano de medios vivo.
        assert!(MediaPlaneClient::connect_lazy("http://127.0.0.1:50051").is_ok());
        assert!(MediaPlaneClient::connect_lazy("::malformed::").is_err());
    }

    #[tokio::test]
    async fn certify_dead_uplink_yields_upstream_fault() {
        // Puerto cerrado: el RPC debe colapsar en UpstreamMedia o Deadline,
        // jamás en pánico.
        let client = MediaPlaneClient::connect_lazy("http://127.0.0.1:1").unwrap();
        let outcome = client.health().await;
        assert!(matches!(
            outcome,
            Err(MediaClientError::UpstreamMedia(_)) | Err(MediaClientError::DeadlineExceeded)
        ));
    }
}
