// [libs/infra/media-client/src/proto.rs]
/*!
 * =================================================================
 * APARATO: MEDIA SERVICE WIRE CONTRACT (V4.0 - vms.media.v1)
 * CLASIFICACIÓN: INFRASTRUCTURE CONTRACT (ESTRATO L3)
 * RESPONSABILIDAD: MENSAJES PROST Y CLIENTE UNARIO DEL MediaService
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. VENDORED CODEGEN: El contrato se mantiene en el árbol (sin protoc
 *    en la cadena de build del appliance); los tags prost son la única
 *    fuente de verdad del wire format.
 * =================================================================
 */

/// Contrato `vms.media.v1`.
pub mod media_v1 {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StartIngestRequest {
        #[prost(string, tag = "1")]
        pub camera_id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub rtsp_url: ::prost::alloc::string::String,
        #[prost(bool, tag = "3")]
        pub prefer_tcp: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StartIngestResponse {
        #[prost(string, tag = "1")]
        pub hls_session_id: ::prost::alloc::string::String,
        #[prost(bool, tag = "2")]
        pub already_running: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetIngestStatusRequest {
        #[prost(string, tag = "1")]
        pub camera_id: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetIngestStatusResponse {
        #[prost(string, tag = "1")]
        pub camera_id: ::prost::alloc::string::String,
        #[prost(bool, tag = "2")]
        pub running: bool,
        #[prost(string, tag = "3")]
        pub hls_session_id: ::prost::alloc::string::String,
        #[prost(int64, tag = "4")]
        pub started_at_unix: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ListIngestsRequest {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct IngestDescriptor {
        #[prost(string, tag = "1")]
        pub camera_id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub hls_session_id: ::prost::alloc::string::String,
        #[prost(bool, tag = "3")]
        pub running: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ListIngestsResponse {
        #[prost(message, repeated, tag = "1")]
        pub ingests: ::prost::alloc::vec::Vec<IngestDescriptor>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StartSfuRtpEgressRequest {
        #[prost(string, tag = "1")]
        pub camera_id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub room_id: ::prost::alloc::string::String,
        #[prost(uint32, tag = "3")]
        pub ssrc: u32,
        #[prost(uint32, tag = "4")]
        pub pt: u32,
        #[prost(string, tag = "5")]
        pub dst_ip: ::prost::alloc::string::String,
        #[prost(uint32, tag = "6")]
        pub dst_port: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StartSfuRtpEgressResponse {
        #[prost(string, tag = "1")]
        pub egress_id: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StopSfuRtpEgressRequest {
        #[prost(string, tag = "1")]
        pub camera_id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub egress_id: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StopSfuRtpEgressResponse {
        #[prost(bool, tag = "1")]
        pub stopped: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct HealthRequest {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct HealthResponse {
        #[prost(bool, tag = "1")]
        pub healthy: bool,
        #[prost(string, tag = "2")]
        pub detail: ::prost::alloc::string::String,
    }

    /// Generated client implementations.
    pub mod media_service_client {
        #![allow(unused_variables, dead_code, missing_docs, clippy::wildcard_imports, clippy::let_unit_value)]
        use tonic::codegen::*;
        use tonic::codegen::http::Uri;

        #[derive(Debug, Clone)]
        pub struct MediaServiceClient<T> {
            inner: tonic::client::Grpc<T>,
        }

        impl MediaServiceClient<tonic::transport::Channel> {
            /// Attempt to create a new client by connecting to a given endpoint.
            pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
            where
                D: TryInto<tonic::transport::Endpoint>,
                D::Error: Into<StdError>,
            {
                let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
                Ok(Self::new(conn))
            }
        }

        impl<T> MediaServiceClient<T>
        where
            T: tonic::client::GrpcService<tonic::body::BoxBody>,
            T::Error: Into<StdError>,
            T::ResponseBody: Body<Data = Bytes> + Send + 'static,
            <T::ResponseBody as Body>::Error: Into<StdError> + Send,
        {
            pub fn new(inner: T) -> Self {
                let inner = tonic::client::Grpc::new(inner);
                Self { inner }
            }

            pub fn with_origin(inner: T, origin: Uri) -> Self {
                let inner = tonic::client::Grpc::with_origin(inner, origin);
                Self { inner }
            }

            pub async fn start_ingest(
                &mut self,
                request: impl tonic::IntoRequest<super::StartIngestRequest>,
            ) -> std::result::Result<tonic::Response<super::StartIngestResponse>, tonic::Status> {
                self.inner
                    .ready()
                    .await
                    .map_err(|e| tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    ))?;
                let codec = tonic::codec::ProstCodec::default();
                let path = http::uri::PathAndQuery::from_static("/vms.media.v1.MediaService/StartIngest");
                let mut req = request.into_request();
                req.extensions_mut()
                    .insert(GrpcMethod::new("vms.media.v1.MediaService", "StartIngest"));
                self.inner.unary(req, path, codec).await
            }

            pub async fn get_ingest_status(
                &mut self,
                request: impl tonic::IntoRequest<super::GetIngestStatusRequest>,
            ) -> std::result::Result<tonic::Response<super::GetIngestStatusResponse>, tonic::Status> {
                self.inner
                    .ready()
                    .await
                    .map_err(|e| tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    ))?;
                let codec = tonic::codec::ProstCodec::default();
                let path = http::uri::PathAndQuery::from_static("/vms.media.v1.MediaService/GetIngestStatus");
                let mut req = request.into_request();
                req.extensions_mut()
                    .insert(GrpcMethod::new("vms.media.v1.MediaService", "GetIngestStatus"));
                self.inner.unary(req, path, codec).await
            }

            pub async fn list_ingests(
                &mut self,
                request: impl tonic::IntoRequest<super::ListIngestsRequest>,
            ) -> std::result::Result<tonic::Response<super::ListIngestsResponse>, tonic::Status> {
                self.inner
                    .ready()
                    .await
                    .map_err(|e| tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    ))?;
                let codec = tonic::codec::ProstCodec::default();
                let path = http::uri::PathAndQuery::from_static("/vms.media.v1.MediaService/ListIngests");
                let mut req = request.into_request();
                req.extensions_mut()
                    .insert(GrpcMethod::new("vms.media.v1.MediaService", "ListIngests"));
                self.inner.unary(req, path, codec).await
            }

            pub async fn start_sfu_rtp_egress(
                &mut self,
                request: impl tonic::IntoRequest<super::StartSfuRtpEgressRequest>,
            ) -> std::result::Result<tonic::Response<super::StartSfuRtpEgressResponse>, tonic::Status> {
                self.inner
                    .ready()
                    .await
                    .map_err(|e| tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    ))?;
                let codec = tonic::codec::ProstCodec::default();
                let path = http::uri::PathAndQuery::from_static("/vms.media.v1.MediaService/StartSfuRtpEgress");
                let mut req = request.into_request();
                req.extensions_mut()
                    .insert(GrpcMethod::new("vms.media.v1.MediaService", "StartSfuRtpEgress"));
                self.inner.unary(req, path, codec).await
            }

            pub async fn stop_sfu_rtp_egress(
                &mut self,
                request: impl tonic::IntoRequest<super::StopSfuRtpEgressRequest>,
            ) -> std::result::Result<tonic::Response<super::StopSfuRtpEgressResponse>, tonic::Status> {
                self.inner
                    .ready()
                    .await
                    .map_err(|e| tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    ))?;
                let codec = tonic::codec::ProstCodec::default();
                let path = http::uri::PathAndQuery::from_static("/vms.media.v1.MediaService/StopSfuRtpEgress");
                let mut req = request.into_request();
                req.extensions_mut()
                    .insert(GrpcMethod::new("vms.media.v1.MediaService", "StopSfuRtpEgress"));
                self.inner.unary(req, path, codec).await
            }

            pub async fn health(
                &mut self,
                request: impl tonic::IntoRequest<super::HealthRequest>,
            ) -> std::result::Result<tonic::Response<super::HealthResponse>, tonic::Status> {
                self.inner
                    .ready()
                    .await
                    .map_err(|e| tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    ))?;
                let codec = tonic::codec::ProstCodec::default();
                let path = http::uri::PathAndQuery::from_static("/vms.media.v1.MediaService/Health");
                let mut req = request.into_request();
                req.extensions_mut()
                    .insert(GrpcMethod::new("vms.media.v1.MediaService", "Health"));
                self.inner.unary(req, path, codec).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::media_v1::*;
    use prost::Message;

    #[test]
    fn certify_wire_round_trip() {
        let request = StartSfuRtpEgressRequest {
            camera_id: "cam-1".into(),
            room_id: "room-cam-1".into(),
            ssrc: 111222,
            pt: 96,
            dst_ip: "10.0.0.20".into(),
            dst_port: 40000,
        };

        let encoded = request.encode_to_vec();
        let decoded = StartSfuRtpEgressRequest::decode(encoded.as_slice()).unwrap();
        assert_eq!(decoded, request);
        println!("✅ PROTO: Wire round trip certified.");
    }

    #[test]
    fn certify_default_scalars() {
        let status = GetIngestStatusResponse::default();
        assert!(!status.running);
        assert!(status.hls_session_id.is_empty());
        assert_eq!(status.started_at_unix, 0);
    }
}
