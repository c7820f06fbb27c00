//! Core data types for the scan engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A variable value: either a resolved literal or an ordered list of candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Single(String),
    Many(Vec<String>),
}

impl Value {
    /// Candidate list view; a literal is a one-element list.
    pub fn candidates(&self) -> Vec<String> {
        match self {
            Value::Single(value) => vec![value.clone()],
            Value::Many(values) => values.clone(),
        }
    }

    /// Whether more than one candidate is present
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Value::Many(values) if values.len() > 1)
    }

    /// Literal view used when rendering; lists render as their first candidate.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Value::Single(value) => Some(value),
            Value::Many(values) => values.first().map(String::as_str),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Single(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Single(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(values: Vec<String>) -> Self {
        Value::Many(values)
    }
}

/// Declarative payload map: variable name to literal or candidate list
pub type PayloadSpec = BTreeMap<String, Value>;

/// One fully resolved assignment of variable name to literal
pub type Bindings = BTreeMap<String, String>;

/// Values extracted from responses and threaded into later requests
pub type DynamicValues = BTreeMap<String, Value>;

/// Flatten dynamic values into literal bindings for rendering.
pub fn literal_bindings(values: &DynamicValues) -> Bindings {
    values
        .iter()
        .filter_map(|(key, value)| value.as_literal().map(|v| (key.clone(), v.to_string())))
        .collect()
}

/// Protocol a template request speaks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    Network,
    Http,
}

impl ProtocolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolType::Network => "network",
            ProtocolType::Http => "http",
        }
    }
}

impl std::fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized view of one protocol response, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalEvent {
    fields: BTreeMap<String, String>,
}

impl InternalEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a field; `None` means the field was never populated
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Copy every literal binding into the event without overwriting response fields
    pub fn merge_missing(&mut self, bindings: &Bindings) {
        for (key, value) in bindings {
            self.fields
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

impl From<BTreeMap<String, String>> for InternalEvent {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }
}

/// Outcome of evaluating compiled operators against one event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorsResult {
    /// Overall matcher verdict under the configured condition
    pub matched: bool,
    /// Whether any non-internal extractor produced output
    pub extracted: bool,
    /// Named matchers that fired
    pub matches: BTreeMap<String, bool>,
    /// Named non-internal extractor values
    pub extracts: BTreeMap<String, Vec<String>>,
    /// Every non-internal extracted value in discovery order
    pub output_extracts: Vec<String>,
    /// Internal extractor values for chaining
    pub dynamic_values: BTreeMap<String, Vec<String>>,
    /// Payload bindings used for this attempt
    pub payload_values: Bindings,
}

impl OperatorsResult {
    /// Dynamic values in the chaining representation
    pub fn dynamic_values(&self) -> DynamicValues {
        self.dynamic_values
            .iter()
            .map(|(key, values)| (key.clone(), Value::Many(values.clone())))
            .collect()
    }
}

/// User-facing record describing one match or extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEvent {
    pub id: Uuid,
    pub template_id: String,
    #[serde(rename = "type")]
    pub protocol: ProtocolType,
    pub host: String,
    pub matched: String,
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extractor_name: Option<String>,
    pub extracted_results: Vec<String>,
    pub metadata: Bindings,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Event handed to the caller: the normalized response plus its evaluation
#[derive(Debug, Clone, Default)]
pub struct InternalWrappedEvent {
    pub internal_event: InternalEvent,
    pub operators_result: Option<OperatorsResult>,
    pub results: Vec<ResultEvent>,
}

impl InternalWrappedEvent {
    pub fn new(internal_event: InternalEvent) -> Self {
        Self {
            internal_event,
            operators_result: None,
            results: Vec::new(),
        }
    }

    /// Whether the evaluation produced a match
    pub fn is_match(&self) -> bool {
        self.operators_result
            .as_ref()
            .map_or(false, |result| result.matched)
    }
}

/// Output callback invoked synchronously for every evaluated event
pub type OutputEventCallback<'a> = dyn FnMut(InternalWrappedEvent) + Send + 'a;

/// Continue-or-stop signal for one request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Stop,
}
