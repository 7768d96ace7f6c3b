//! Recording mock engines for tests
//!
//! Each mock returns a canned response (or a canned failure) and keeps the
//! last request it received so callers can assert on what was sent.

use super::{Discoverer, Estimator, Simulator};
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use caus_core::{
    CausalGraph, DiscoverRequest, EstimateRequest, EstimateResult, SimulateRequest,
    SimulationResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock engine role answering `Req` with `Resp`
#[derive(Debug)]
pub struct RecordingEngine<Req, Resp> {
    response: std::result::Result<Resp, String>,
    last_request: Mutex<Option<Req>>,
    calls: AtomicUsize,
}

/// Mock discovery engine
pub type MockDiscoverer = RecordingEngine<DiscoverRequest, CausalGraph>;

/// Mock estimation engine
pub type MockEstimator = RecordingEngine<EstimateRequest, EstimateResult>;

/// Mock simulation engine
pub type MockSimulator = RecordingEngine<SimulateRequest, SimulationResult>;

impl<Req: Clone, Resp: Clone> RecordingEngine<Req, Resp> {
    /// Answer every call with `response`
    pub fn with_response(response: Resp) -> Self {
        Self {
            response: Ok(response),
            last_request: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every call as an unreachable engine
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            last_request: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Last request received
    pub fn last_request(&self) -> Option<Req> {
        match self.last_request.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, operation: &'static str, request: Req) -> Result<Resp> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.last_request.lock() {
            Ok(mut guard) => *guard = Some(request),
            Err(poisoned) => *poisoned.into_inner() = Some(request),
        }

        self.response
            .clone()
            .map_err(|message| RuntimeError::EngineUnavailable { operation, message })
    }
}

impl<Req: Clone, Resp: Clone + Default> Default for RecordingEngine<Req, Resp> {
    fn default() -> Self {
        Self::with_response(Resp::default())
    }
}

#[async_trait]
impl Discoverer for MockDiscoverer {
    async fn discover(&self, request: DiscoverRequest) -> Result<CausalGraph> {
        self.answer("Discover", request)
    }
}

#[async_trait]
impl Estimator for MockEstimator {
    async fn estimate(&self, request: EstimateRequest) -> Result<EstimateResult> {
        self.answer("Estimate", request)
    }
}

#[async_trait]
impl Simulator for MockSimulator {
    async fn simulate(&self, request: SimulateRequest) -> Result<SimulationResult> {
        self.answer("Simulate", request)
    }
}
