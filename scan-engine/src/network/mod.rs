//! Raw TCP/TLS protocol executor
//!
//! A network request writes a sequence of inputs to a connection, optionally
//! reading after each one, then drains whatever the peer sends back. The
//! concatenated response is exposed to the operators as `data`.

mod dialer;

pub use dialer::{insecure_client_config, TcpDialer};

use crate::attack_modes::PayloadGenerator;
use crate::config::{ExecuterOptions, NetworkTimings};
use crate::error::{EngineError, EngineResult};
use crate::operators::{Extractor, Matcher, MatcherType, Operators};
use crate::payload::{self, merge_bindings};
use crate::result::make_result_events;
use crate::template::{PlaceholderRenderer, Renderer};
use crate::traits::{Connection, Dialer, ProtocolRequest};
use crate::types::{
    literal_bindings, Bindings, DynamicValues, InternalEvent, InternalWrappedEvent, OutputEventCallback,
    PayloadSpec, ProtocolType, ResultEvent, Value,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Encoding of an input's `data`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Hex,
}

/// One write step, optionally followed by a read
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NetworkInput {
    pub data: String,
    #[serde(rename = "type")]
    pub kind: InputType,
    /// Bytes to read after writing; zero skips the read
    pub read: usize,
    /// Exposes the read bytes under this name
    pub name: Option<String>,
}

impl NetworkInput {
    pub fn text(data: &str) -> Self {
        Self {
            data: data.to_string(),
            ..Default::default()
        }
    }

    pub fn hex(data: &str) -> Self {
        Self {
            data: data.to_string(),
            kind: InputType::Hex,
            ..Default::default()
        }
    }

    pub fn read(mut self, read: usize) -> Self {
        self.read = read;
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    fn bytes(&self) -> EngineResult<Vec<u8>> {
        match self.kind {
            InputType::Text => Ok(self.data.as_bytes().to_vec()),
            InputType::Hex => Ok(hex::decode(self.data.trim())?),
        }
    }
}

/// Compiled address expression
#[derive(Debug, Clone, PartialEq, Eq)]
struct AddressEntry {
    address: String,
    tls: bool,
}

/// Network template request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NetworkRequest {
    pub id: Option<String>,
    /// Address expressions such as `{{Hostname}}` or `tls://{{Host}}:443`
    pub host: Vec<String>,
    pub attack: Option<String>,
    pub payloads: PayloadSpec,
    pub inputs: Vec<NetworkInput>,
    /// Drain buffer size; zero uses the configured default
    pub read_size: usize,
    /// Drain until EOF or the read window closes
    pub read_all: bool,
    #[serde(flatten)]
    pub operators: Operators,

    #[serde(skip)]
    addresses: Vec<AddressEntry>,
    #[serde(skip)]
    generator: Option<PayloadGenerator>,
    #[serde(skip)]
    compiled_operators: Option<Operators>,
    #[serde(skip)]
    options: ExecuterOptions,
    #[serde(skip)]
    extra_payloads: Bindings,
    #[serde(skip)]
    dialer: Option<Arc<dyn Dialer>>,
    #[serde(skip)]
    renderer: PlaceholderRenderer,
}

impl NetworkRequest {
    pub fn new(host: &[&str], inputs: Vec<NetworkInput>) -> Self {
        Self {
            host: host.iter().map(|h| h.to_string()).collect(),
            inputs,
            ..Default::default()
        }
    }

    pub fn with_operators(mut self, operators: Operators) -> Self {
        self.operators = operators;
        self
    }

    pub fn with_payloads(mut self, payloads: PayloadSpec, attack: Option<&str>) -> Self {
        self.payloads = payloads;
        self.attack = attack.map(str::to_string);
        self
    }

    /// Replace the connection collaborator
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    fn timings(&self) -> &NetworkTimings {
        &self.options.network
    }

    async fn execute_address(
        &self,
        variables: &Bindings,
        actual_address: &str,
        input: &str,
        tls: bool,
        dynamic_values: &DynamicValues,
        callback: &mut OutputEventCallback<'_>,
    ) -> EngineResult<()> {
        if !actual_address.contains(':') {
            return Err(EngineError::configuration(
                "network",
                "no port provided in network protocol request",
            ));
        }

        match &self.generator {
            Some(generator) => {
                for binding in generator.new_iterator() {
                    let payloads = merge_bindings(&self.extra_payloads, &binding);
                    self.execute_request_with_payloads(
                        variables,
                        actual_address,
                        input,
                        tls,
                        payloads,
                        dynamic_values,
                        callback,
                    )
                    .await?;
                }
            }
            None => {
                self.execute_request_with_payloads(
                    variables,
                    actual_address,
                    input,
                    tls,
                    self.extra_payloads.clone(),
                    dynamic_values,
                    callback,
                )
                .await?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_request_with_payloads(
        &self,
        variables: &Bindings,
        actual_address: &str,
        input: &str,
        tls: bool,
        mut payloads: Bindings,
        dynamic_values: &DynamicValues,
        callback: &mut OutputEventCallback<'_>,
    ) -> EngineResult<()> {
        let dialer: Arc<dyn Dialer> = match &self.dialer {
            Some(dialer) => Arc::clone(dialer),
            None => Arc::new(TcpDialer::new(self.timings().connect_timeout())),
        };
        let dialed = dialer.dial(actual_address, tls).await?;
        let mut stream = dialed.stream;

        let ambient = merge_bindings(variables, &literal_bindings(dynamic_values));
        let mut request_text = String::new();
        let mut response: Vec<u8> = Vec::new();
        let mut step_reads = Bindings::new();

        for step in &self.inputs {
            let data = step.bytes()?;
            let final_data = match String::from_utf8(data) {
                Ok(text) => self
                    .renderer
                    .render(&text, &merge_bindings(&ambient, &payloads))?
                    .into_bytes(),
                Err(binary) => binary.into_bytes(),
            };
            request_text.push_str(&String::from_utf8_lossy(&final_data));
            stream.write_all(&final_data).await?;

            if step.read == 0 {
                continue;
            }

            let mut buffer = vec![0u8; step.read];
            let n = self.read_once(&mut stream, &mut buffer).await?;
            response.extend_from_slice(&buffer[..n]);

            let Some(name) = &step.name else {
                continue;
            };
            let text = String::from_utf8_lossy(&buffer[..n]).into_owned();
            step_reads.insert(name.clone(), text.clone());

            // Later steps of this request may reference values extracted from this read.
            if let Some(operators) = &self.compiled_operators {
                let mut partial = InternalEvent::new();
                partial.insert(name.clone(), text);
                let values = operators.execute_internal_extractors(&partial, |event, extractor| {
                    self.extract(event, extractor)
                });
                for (key, value) in values {
                    if let Some(literal) = value.as_literal() {
                        payloads.insert(key, literal.to_string());
                    }
                }
            }
        }

        let buffer_size = if self.read_size != 0 {
            self.read_size
        } else {
            self.timings().read_size
        };
        if self.read_all {
            self.read_all(&mut stream, buffer_size, &mut response).await?;
        } else {
            tokio::time::sleep(self.timings().drain_delay()).await;
            let mut buffer = vec![0u8; buffer_size];
            let n = self.read_once(&mut stream, &mut buffer).await?;
            response.extend_from_slice(&buffer[..n]);
        }

        let mut event = InternalEvent::new();
        event.insert("data", String::from_utf8_lossy(&response).into_owned());
        event.insert("request", request_text);
        event.insert("host", input);
        event.insert("matched", actual_address);
        event.insert("ip", dialed.ip);
        event.insert("template-id", self.options.template_id.clone());
        event.insert("type", ProtocolType::Network.as_str());
        event.merge_missing(&step_reads);
        event.merge_missing(&payloads);
        event.merge_missing(&ambient);

        let Some(operators) = &self.compiled_operators else {
            return Ok(());
        };
        let result = operators.execute(
            &event,
            |event, matcher| self.matches(event, matcher),
            |event, extractor| self.extract(event, extractor),
        );
        if let Some(mut result) = result {
            result.payload_values = payloads;
            let mut wrapped = InternalWrappedEvent::new(event);
            wrapped.operators_result = Some(result);
            wrapped.results = self.make_result_event(&wrapped);
            callback(wrapped);
        }
        Ok(())
    }

    /// One bounded read; end of stream yields zero bytes
    async fn read_once(&self, stream: &mut Box<dyn Connection>, buffer: &mut [u8]) -> EngineResult<usize> {
        let deadline = self.timings().read_timeout();
        match tokio::time::timeout(deadline, stream.read(buffer)).await {
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(0),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(EngineError::timeout("network read", deadline.as_millis() as u64)),
        }
    }

    /// Read until EOF or until the one-shot window closes.
    ///
    /// The window starts once and is never extended by incoming data.
    async fn read_all(
        &self,
        stream: &mut Box<dyn Connection>,
        buffer_size: usize,
        response: &mut Vec<u8>,
    ) -> EngineResult<()> {
        let window = tokio::time::sleep(self.timings().read_all_window());
        tokio::pin!(window);
        let mut buffer = vec![0u8; buffer_size];

        loop {
            let n = tokio::select! {
                biased;
                _ = &mut window => break,
                read = self.read_once(stream, &mut buffer) => read?,
            };
            if n == 0 {
                break;
            }
            response.extend_from_slice(&buffer[..n]);
        }
        Ok(())
    }
}

#[async_trait]
impl ProtocolRequest for NetworkRequest {
    fn protocol_type(&self) -> ProtocolType {
        ProtocolType::Network
    }

    fn compile(&mut self, options: &ExecuterOptions) -> EngineResult<()> {
        self.options = options.clone();
        self.renderer = PlaceholderRenderer::lenient();

        self.addresses = self
            .host
            .iter()
            .map(|address| match address.strip_prefix("tls://") {
                Some(rest) => AddressEntry {
                    address: rest.to_string(),
                    tls: true,
                },
                None => AddressEntry {
                    address: address.clone(),
                    tls: false,
                },
            })
            .collect();

        // Overrides for variables the request never declared are sent as-is.
        self.extra_payloads = payload::undeclared_overrides(&self.payloads, &options.vars_payload);

        self.generator = if self.payloads.is_empty() {
            None
        } else {
            let spec = payload::apply_overrides(&self.payloads, &options.vars_payload);
            let attack_type = payload::resolve_attack_type(
                options.attack_type.as_deref(),
                !options.vars_payload.is_empty(),
                self.attack.as_deref(),
            )?;
            Some(PayloadGenerator::compile(&spec, attack_type)?)
        };

        let mut operators = self.operators.clone();
        operators.compile()?;
        self.compiled_operators = if operators.is_empty() { None } else { Some(operators) };

        debug!(
            "Compiled network request with {} addresses, {} inputs, {} requests",
            self.addresses.len(),
            self.inputs.len(),
            self.requests()
        );
        Ok(())
    }

    fn requests(&self) -> usize {
        let per_address = self
            .generator
            .as_ref()
            .map_or(1, |generator| generator.new_iterator().total());
        per_address * self.addresses.len()
    }

    fn match_part(&self, part: &str, event: &InternalEvent) -> Option<String> {
        let part = match part {
            "body" | "all" | "" => "data",
            other => other,
        };
        event.get(part).map(str::to_string)
    }

    fn matches(&self, event: &InternalEvent, matcher: &Matcher) -> bool {
        // Status codes have no meaning on a raw stream.
        if matcher.kind == MatcherType::Status {
            return false;
        }
        self.match_part(&matcher.part, event)
            .map_or(false, |item| matcher.match_item(&item))
    }

    fn extract(&self, event: &InternalEvent, extractor: &Extractor) -> Vec<String> {
        self.match_part(&extractor.part, event)
            .map(|item| extractor.extract_item(&item, event))
            .unwrap_or_default()
    }

    async fn execute_with_results(
        &self,
        input: &str,
        dynamic_values: &DynamicValues,
        callback: &mut OutputEventCallback<'_>,
    ) -> EngineResult<()> {
        let address = get_address(input)?;
        let mut dynamic_values = dynamic_values.clone();
        dynamic_values.insert("Hostname".to_string(), Value::Single(address.clone()));
        let variables = network_variables(&address);

        let mut first_error = None;
        for entry in &self.addresses {
            let actual_address = self
                .renderer
                .render(&entry.address, &variables)
                .unwrap_or_else(|_| entry.address.clone());

            if let Err(err) = self
                .execute_address(&variables, &actual_address, input, entry.tls, &dynamic_values, callback)
                .await
            {
                warn!("Network request to {} failed: {}", actual_address, err);
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn make_result_event(&self, wrapped: &InternalWrappedEvent) -> Vec<ResultEvent> {
        make_result_events(wrapped, ProtocolType::Network)
    }

    fn compiled_operators(&self) -> Option<&Operators> {
        self.compiled_operators.as_ref()
    }
}

/// `host:port` to connect to; URL-form targets keep only their authority
pub fn get_address(target: &str) -> EngineResult<String> {
    let address = if target.contains("://") {
        let parsed = url::Url::parse(target)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| EngineError::configuration("network", "target URL has no host"))?;
        match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    } else {
        target.to_string()
    };

    if !address.contains(':') {
        return Err(EngineError::configuration(
            "network",
            &format!("no port provided in target '{}'", target),
        ));
    }
    Ok(address)
}

/// `Hostname`, `Host` and `Port` variables for one address
pub fn network_variables(address: &str) -> Bindings {
    let mut variables = Bindings::new();
    variables.insert("Hostname".to_string(), address.to_string());
    match address.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => {
            variables.insert("Host".to_string(), host.to_string());
            variables.insert("Port".to_string(), port.to_string());
        }
        Some(_) => {}
        None => {
            variables.insert("Host".to_string(), address.to_string());
        }
    }
    variables
}
