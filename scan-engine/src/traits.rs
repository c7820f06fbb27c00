//! Core traits for the scan engine

use crate::config::ExecuterOptions;
use crate::error::EngineResult;
use crate::operators::{Extractor, Matcher, Operators};
use crate::types::{
    DynamicValues, InternalEvent, InternalWrappedEvent, OutputEventCallback, ProtocolType, ResultEvent,
};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Capability set shared by every protocol executor
#[async_trait]
pub trait ProtocolRequest: Send + Sync {
    fn protocol_type(&self) -> ProtocolType;

    /// Compile operators, payload generator and transport once before execution
    fn compile(&mut self, options: &ExecuterOptions) -> EngineResult<()>;

    /// Total number of requests one execution issues
    fn requests(&self) -> usize;

    /// Resolve a logical part name into text; `None` when the event lacks it
    fn match_part(&self, part: &str, event: &InternalEvent) -> Option<String>;

    fn matches(&self, event: &InternalEvent, matcher: &Matcher) -> bool;

    fn extract(&self, event: &InternalEvent, extractor: &Extractor) -> Vec<String>;

    /// Run every request against `input`, reporting each evaluated event
    async fn execute_with_results(
        &self,
        input: &str,
        dynamic_values: &DynamicValues,
        callback: &mut OutputEventCallback<'_>,
    ) -> EngineResult<()>;

    fn make_result_event(&self, wrapped: &InternalWrappedEvent) -> Vec<ResultEvent>;

    /// Operators compiled by `compile`; `None` when the request declares none
    fn compiled_operators(&self) -> Option<&Operators>;
}

/// Byte stream handed out by a [`Dialer`]
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Connection for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// An established connection and the peer IP it reached
pub struct DialedConnection {
    pub stream: Box<dyn Connection>,
    pub ip: String,
}

impl std::fmt::Debug for DialedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialedConnection")
            .field("ip", &self.ip)
            .finish_non_exhaustive()
    }
}

/// Connection-establishing collaborator of the network executor
#[async_trait]
pub trait Dialer: Send + Sync + std::fmt::Debug {
    /// Connect to `host:port`, optionally completing a TLS handshake
    async fn dial(&self, address: &str, tls: bool) -> EngineResult<DialedConnection>;
}
