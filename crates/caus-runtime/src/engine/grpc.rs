//! gRPC engine client
//!
//! One lazily connected channel serves all three services. Every call is
//! bounded by a timeout; a timed out call is abandoned and reported as
//! [`RuntimeError::EngineUnavailable`].

use super::proto;
use super::proto::causal_discovery_client::CausalDiscoveryClient;
use super::proto::causal_estimation_client::CausalEstimationClient;
use super::proto::causal_simulation_client::CausalSimulationClient;
use super::{Discoverer, Estimator, Simulator, ENGINE_CALL_TIMEOUT};
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use caus_core::{
    CausalGraph, DiscoverRequest, Edge, EstimateRequest, EstimateResult, Intervention,
    LinearModel, Node, SimulateRequest, SimulationResult,
};
use std::future::Future;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tonic::Code;

/// gRPC client for the `causal.v1alpha1` services
#[derive(Debug, Clone)]
pub struct GrpcEngine {
    channel: Channel,
    address: String,
    timeout: Duration,
}

impl GrpcEngine {
    /// Create a client without dialing; the connection opens on first call
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect_lazy(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        let endpoint = Endpoint::from_shared(address.clone()).map_err(|e| {
            RuntimeError::EngineUnavailable {
                operation: "connect",
                message: format!("invalid engine address '{}': {}", address, e),
            }
        })?;

        Ok(Self {
            channel: endpoint.connect_lazy(),
            address,
            timeout: ENGINE_CALL_TIMEOUT,
        })
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<tonic::Response<T>, tonic::Status>>,
    {
        tracing::debug!("Calling {} on {}", operation, self.address);

        match tokio::time::timeout(self.timeout, call).await {
            Err(_) => Err(RuntimeError::EngineUnavailable {
                operation,
                message: format!("timed out after {:?}", self.timeout),
            }),
            Ok(Err(status)) => Err(status_error(operation, status)),
            Ok(Ok(response)) => Ok(response.into_inner()),
        }
    }
}

fn status_error(operation: &'static str, status: tonic::Status) -> RuntimeError {
    match status.code() {
        Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled | Code::Unknown => {
            RuntimeError::EngineUnavailable {
                operation,
                message: status.message().to_string(),
            }
        }
        code => RuntimeError::EngineRejected {
            operation,
            code: format!("{:?}", code),
            message: status.message().to_string(),
        },
    }
}

#[async_trait]
impl Discoverer for GrpcEngine {
    async fn discover(&self, request: DiscoverRequest) -> Result<CausalGraph> {
        let message = proto::DiscoverRequest {
            csv_data: request.table,
            max_lag: request.max_lag,
            pc_alpha: request.significance_level,
        };
        let mut client = CausalDiscoveryClient::new(self.channel.clone());
        let graph: proto::CausalGraph = self
            .call("Discover", async move { client.discover(message).await })
            .await?;
        Ok(graph.into())
    }
}

#[async_trait]
impl Estimator for GrpcEngine {
    async fn estimate(&self, request: EstimateRequest) -> Result<EstimateResult> {
        let message = proto::EstimateRequest {
            csv_data: request.table,
            graph: Some(request.graph.into()),
        };
        let mut client = CausalEstimationClient::new(self.channel.clone());
        let response: proto::EstimateResponse = self
            .call("Estimate", async move { client.estimate(message).await })
            .await?;
        Ok(response.into())
    }
}

#[async_trait]
impl Simulator for GrpcEngine {
    async fn simulate(&self, request: SimulateRequest) -> Result<SimulationResult> {
        let message = proto::SimulateRequest {
            csv_data: request.table,
            graph: Some(request.graph.into()),
            intervention: Some(request.intervention.into()),
            simulation_steps: request.horizon,
        };
        let mut client = CausalSimulationClient::new(self.channel.clone());
        let response: proto::SimulateResponse = self
            .call("Simulate", async move { client.simulate(message).await })
            .await?;
        Ok(SimulationResult::new(response.json_results))
    }
}

impl From<CausalGraph> for proto::CausalGraph {
    fn from(graph: CausalGraph) -> Self {
        Self {
            nodes: graph
                .nodes
                .into_iter()
                .map(|n| proto::Node {
                    id: n.id,
                    label: n.label,
                })
                .collect(),
            edges: graph
                .edges
                .into_iter()
                .map(|e| proto::Edge {
                    source: e.source,
                    target: e.target,
                    r#type: e.edge_type,
                    lag: e.lag,
                })
                .collect(),
        }
    }
}

impl From<proto::CausalGraph> for CausalGraph {
    fn from(graph: proto::CausalGraph) -> Self {
        Self {
            nodes: graph
                .nodes
                .into_iter()
                .map(|n| Node {
                    id: n.id,
                    label: n.label,
                })
                .collect(),
            edges: graph
                .edges
                .into_iter()
                .map(|e| Edge {
                    source: e.source,
                    target: e.target,
                    edge_type: e.r#type,
                    lag: e.lag,
                })
                .collect(),
        }
    }
}

impl From<Intervention> for proto::Intervention {
    fn from(intervention: Intervention) -> Self {
        Self {
            target_node: intervention.target,
            action: intervention.action.as_str().to_string(),
            value: intervention.value,
        }
    }
}

impl From<proto::EstimateResponse> for EstimateResult {
    fn from(response: proto::EstimateResponse) -> Self {
        Self {
            models: response
                .models
                .into_iter()
                .map(|(node, info)| {
                    (
                        node,
                        LinearModel {
                            intercept: info.intercept,
                            features: info.features,
                            coefficients: info.coefficients,
                        },
                    )
                })
                .collect(),
        }
    }
}
