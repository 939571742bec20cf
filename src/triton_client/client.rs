//! gRPC client for the Triton inference server (KServe v2 protocol).

use std::time::Duration;

use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};

/// Messages of the `inference` package used by this crate.
pub mod triton {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ServerReadyRequest {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ServerReadyResponse {
        #[prost(bool, tag = "1")]
        pub ready: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ModelReadyRequest {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub version: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ModelReadyResponse {
        #[prost(bool, tag = "1")]
        pub ready: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct InferTensorContents {
        #[prost(bool, repeated, tag = "1")]
        pub bool_contents: ::prost::alloc::vec::Vec<bool>,
        #[prost(int32, repeated, tag = "2")]
        pub int_contents: ::prost::alloc::vec::Vec<i32>,
        #[prost(int64, repeated, tag = "3")]
        pub int64_contents: ::prost::alloc::vec::Vec<i64>,
        #[prost(uint32, repeated, tag = "4")]
        pub uint_contents: ::prost::alloc::vec::Vec<u32>,
        #[prost(uint64, repeated, tag = "5")]
        pub uint64_contents: ::prost::alloc::vec::Vec<u64>,
        #[prost(float, repeated, tag = "6")]
        pub fp32_contents: ::prost::alloc::vec::Vec<f32>,
        #[prost(double, repeated, tag = "7")]
        pub fp64_contents: ::prost::alloc::vec::Vec<f64>,
        #[prost(bytes = "vec", repeated, tag = "8")]
        pub bytes_contents: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ModelInferRequest {
        #[prost(string, tag = "1")]
        pub model_name: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub model_version: ::prost::alloc::string::String,
        #[prost(string, tag = "3")]
        pub id: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "5")]
        pub inputs: ::prost::alloc::vec::Vec<model_infer_request::InferInputTensor>,
        #[prost(message, repeated, tag = "6")]
        pub outputs: ::prost::alloc::vec::Vec<model_infer_request::InferRequestedOutputTensor>,
        #[prost(bytes = "vec", repeated, tag = "7")]
        pub raw_input_contents: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    }

    pub mod model_infer_request {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct InferInputTensor {
            #[prost(string, tag = "1")]
            pub name: ::prost::alloc::string::String,
            #[prost(string, tag = "2")]
            pub datatype: ::prost::alloc::string::String,
            #[prost(int64, repeated, tag = "3")]
            pub shape: ::prost::alloc::vec::Vec<i64>,
            #[prost(message, optional, tag = "5")]
            pub contents: ::core::option::Option<super::InferTensorContents>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct InferRequestedOutputTensor {
            #[prost(string, tag = "1")]
            pub name: ::prost::alloc::string::String,
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ModelInferResponse {
        #[prost(string, tag = "1")]
        pub model_name: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub model_version: ::prost::alloc::string::String,
        #[prost(string, tag = "3")]
        pub id: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "5")]
        pub outputs: ::prost::alloc::vec::Vec<model_infer_response::InferOutputTensor>,
        #[prost(bytes = "vec", repeated, tag = "6")]
        pub raw_output_contents: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    }

    pub mod model_infer_response {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct InferOutputTensor {
            #[prost(string, tag = "1")]
            pub name: ::prost::alloc::string::String,
            #[prost(string, tag = "2")]
            pub datatype: ::prost::alloc::string::String,
            #[prost(int64, repeated, tag = "3")]
            pub shape: ::prost::alloc::vec::Vec<i64>,
            #[prost(message, optional, tag = "5")]
            pub contents: ::core::option::Option<super::InferTensorContents>,
        }
    }
}

const SERVER_READY: &str = "/inference.GRPCInferenceService/ServerReady";
const MODEL_READY: &str = "/inference.GRPCInferenceService/ModelReady";
const MODEL_INFER: &str = "/inference.GRPCInferenceService/ModelInfer";

#[derive(Debug, Clone)]
pub struct TritonInferenceClient {
    inner: Grpc<Channel>,
}

impl TritonInferenceClient {
    /// connect opens a channel to the inference server.
    ///
    /// # Arguments
    /// * `url` - server address, e.g. `http://127.0.0.1:8001`
    /// * `timeout` - connection timeout
    ///
    /// # Returns
    /// * `Result<TritonInferenceClient, tonic::transport::Error>`
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, tonic::transport::Error> {
        let channel = Endpoint::from_shared(url.to_string())?
            .connect_timeout(timeout)
            .connect()
            .await?;
        Ok(TritonInferenceClient {
            inner: Grpc::new(channel),
        })
    }

    pub async fn server_ready(&mut self) -> Result<bool, Status> {
        let response: triton::ServerReadyResponse =
            self.unary(triton::ServerReadyRequest {}, SERVER_READY).await?;
        Ok(response.ready)
    }

    pub async fn model_ready(&mut self, name: &str, version: &str) -> Result<bool, Status> {
        let request = triton::ModelReadyRequest {
            name: name.to_string(),
            version: version.to_string(),
        };
        let response: triton::ModelReadyResponse = self.unary(request, MODEL_READY).await?;
        Ok(response.ready)
    }

    pub async fn model_infer(
        &mut self,
        request: triton::ModelInferRequest,
    ) -> Result<triton::ModelInferResponse, Status> {
        self.unary(request, MODEL_INFER).await
    }

    async fn unary<M1, M2>(&mut self, message: M1, path: &'static str) -> Result<M2, Status>
    where
        M1: prost::Message + Send + Sync + 'static,
        M2: prost::Message + Default + Send + Sync + 'static,
    {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unavailable(format!("service was not ready: {e}")))?;
        let codec: ProstCodec<M1, M2> = ProstCodec::default();
        let response = self
            .inner
            .unary(Request::new(message), PathAndQuery::from_static(path), codec)
            .await?;
        Ok(response.into_inner())
    }
}
