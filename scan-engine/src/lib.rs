//! Scan Engine - Request execution core for declarative scanning templates
//!
//! This crate turns compiled template requests into concrete network and HTTP
//! traffic: it expands payload variables by attack type, threads values
//! extracted from one response into the next request, evaluates matchers and
//! extractors, and assembles the result events reported to the caller.

pub mod attack_modes;
pub mod config;
pub mod dynamic;
pub mod error;
pub mod http;
pub mod logging;
pub mod network;
pub mod operators;
pub mod payload;
pub mod result;
pub mod template;
pub mod traits;
pub mod types;

#[cfg(test)]
mod tests;

pub use types::{
    literal_bindings, Bindings, DynamicValues, InternalEvent, InternalWrappedEvent, OperatorsResult,
    OutputEventCallback, PayloadSpec, ProtocolType, ResultEvent, StepOutcome, Value,
};

pub use error::{EngineError, EngineResult, ErrorCategory};

pub use config::{ExecuterOptions, HttpClientConfig, NetworkTimings, DEFAULT_USER_AGENT};

pub use traits::{Connection, DialedConnection, Dialer, ProtocolRequest};

pub use attack_modes::{
    AttackModeExecutor, AttackModeFactory, AttackType, ClusterBombMode, PayloadGenerator, PayloadIterator,
    PitchforkMode, SniperMode,
};

pub use payload::PayloadSet;

pub use dynamic::{for_each_combination, merge_dynamic, DynamicCombinations};

pub use operators::{Condition, Extractor, ExtractorType, Matcher, MatcherType, Operators, StatusSpec};

pub use template::{PlaceholderRenderer, RenderError, Renderer};

pub use result::make_result_events;

pub use network::{NetworkInput, NetworkRequest, TcpDialer};

pub use http::HttpRequest;

pub use logging::{init_logging, LoggingConfig};
