//! HTTP protocol executor
//!
//! Each `path` or `raw` entry is rendered once per payload binding and once
//! per combination of the dynamic values gathered so far in the sequence.
//! Values extracted by internal extractors are merged into that pool and
//! feed every later attempt.

mod client;
mod raw;
mod response;

pub use client::{build_client, ClientPolicy};
pub use raw::RawRequest;
pub use response::{canonical_header_name, response_to_event, RequestContext};

use crate::attack_modes::PayloadGenerator;
use crate::config::ExecuterOptions;
use crate::dynamic::{merge_dynamic, DynamicCombinations};
use crate::error::{EngineError, EngineResult};
use crate::operators::{Extractor, Matcher, MatcherType, Operators};
use crate::payload::{self, merge_bindings};
use crate::result::make_result_events;
use crate::template::{PlaceholderRenderer, Renderer};
use crate::traits::ProtocolRequest;
use crate::types::{
    Bindings, DynamicValues, InternalEvent, InternalWrappedEvent, OutputEventCallback, PayloadSpec,
    ProtocolType, ResultEvent, StepOutcome,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use url::Url;

/// HTTP template request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HttpRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    /// URL templates such as `{{BaseURL}}/admin`
    pub path: Vec<String>,
    /// Complete request texts; take precedence over `path`
    pub raw: Vec<String>,
    pub attack: Option<String>,
    pub method: String,
    pub body: String,
    pub payloads: PayloadSpec,
    pub headers: BTreeMap<String, String>,
    pub max_redirects: usize,
    /// Response body bytes kept; zero keeps everything
    pub max_size: usize,
    pub cookie_reuse: bool,
    pub redirects: bool,
    pub stop_at_first_match: bool,
    #[serde(flatten)]
    pub operators: Operators,

    #[serde(skip)]
    generator: Option<PayloadGenerator>,
    #[serde(skip)]
    client: Option<reqwest::Client>,
    #[serde(skip)]
    compiled_operators: Option<Operators>,
    #[serde(skip)]
    options: ExecuterOptions,
    #[serde(skip)]
    extra_payloads: Bindings,
    #[serde(skip)]
    renderer: PlaceholderRenderer,
}

/// Request ready to send
#[derive(Debug, Clone)]
struct GeneratedRequest {
    method: reqwest::Method,
    url: String,
    host: String,
    headers: Vec<(String, String)>,
    body: String,
}

/// Target URL and the variables derived from it
#[derive(Debug, Clone)]
pub struct Target {
    pub base: Url,
    pub variables: Bindings,
}

impl HttpRequest {
    pub fn get(paths: &[&str]) -> Self {
        Self {
            path: paths.iter().map(|p| p.to_string()).collect(),
            method: "GET".to_string(),
            ..Default::default()
        }
    }

    pub fn raw(requests: &[&str]) -> Self {
        Self {
            raw: requests.iter().map(|r| r.to_string()).collect(),
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

    /// Templates in execution order and whether they are raw requests
    fn entries(&self) -> impl Iterator<Item = (&str, bool)> {
        let raw = !self.raw.is_empty();
        let source = if raw { &self.raw } else { &self.path };
        source.iter().map(move |entry| (entry.as_str(), raw))
    }

    fn make_request(&self, target: &Target, data: &str, is_raw: bool, vars: &Bindings) -> EngineResult<GeneratedRequest> {
        let rendered = self.renderer.render(data, vars)?;

        let (method, url, mut headers, body) = if is_raw {
            let raw = RawRequest::parse(&rendered)?;
            let url = raw.url(&target.base)?;
            let headers: Vec<(String, String)> = raw
                .headers
                .iter()
                .filter(|(name, _)| {
                    !name.eq_ignore_ascii_case("host") && !name.eq_ignore_ascii_case("content-length")
                })
                .cloned()
                .collect();
            (raw.method, url, headers, raw.body)
        } else {
            let method = if self.method.is_empty() { "GET" } else { self.method.as_str() };
            let mut headers = Vec::with_capacity(self.headers.len());
            for (name, value) in &self.headers {
                headers.push((name.clone(), self.renderer.render(value, vars)?));
            }
            let body = self.renderer.render(&self.body, vars)?;
            (method.to_string(), rendered, headers, body)
        };

        if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("user-agent")) {
            headers.push(("User-Agent".to_string(), self.options.user_agent.clone()));
        }

        let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes()).map_err(|_| {
            EngineError::configuration("http", &format!("invalid method '{}'", method))
        })?;
        let host = Url::parse(&url)?
            .host_str()
            .map(str::to_string)
            .unwrap_or_default();

        Ok(GeneratedRequest {
            method,
            url,
            host,
            headers,
            body,
        })
    }

    /// One attempt: render, send, evaluate, report
    #[allow(clippy::too_many_arguments)]
    async fn execute_attempt(
        &self,
        client: &reqwest::Client,
        target: &Target,
        data: &str,
        is_raw: bool,
        payloads: &Bindings,
        combination: &Bindings,
        chained: &mut DynamicValues,
        callback: &mut OutputEventCallback<'_>,
    ) -> EngineResult<StepOutcome> {
        let vars = merge_bindings(&merge_bindings(&target.variables, combination), payloads);
        let generated = match self.make_request(target, data, is_raw, &vars) {
            Ok(generated) => generated,
            Err(EngineError::UnresolvedVariables { names }) => {
                debug!("Skipping remaining requests, unresolved variables: {:?}", names);
                return Ok(StepOutcome::Stop);
            }
            Err(err) => return Err(err),
        };

        let mut builder = client.request(generated.method.clone(), &generated.url);
        for (name, value) in &generated.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !generated.body.is_empty() {
            builder = builder.body(generated.body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("{} request failed: {}", generated.url, e);
                return Err(e.into());
            }
        };

        let ctx = RequestContext {
            host: &generated.host,
            url: &generated.url,
            template_id: &self.options.template_id,
            max_size: self.max_size,
        };
        let mut event = response_to_event(response, &ctx).await?;
        event.merge_missing(&vars);

        let Some(operators) = &self.compiled_operators else {
            return Ok(StepOutcome::Continue);
        };
        let Some(mut result) = operators.execute(
            &event,
            |event, matcher| self.matches(event, matcher),
            |event, extractor| self.extract(event, extractor),
        ) else {
            return Ok(StepOutcome::Continue);
        };

        let matched = result.matched;
        if !result.dynamic_values.is_empty() {
            *chained = merge_dynamic(chained, &result.dynamic_values());
        }
        result.payload_values = payloads.clone();

        let mut wrapped = InternalWrappedEvent::new(event);
        wrapped.operators_result = Some(result);
        wrapped.results = self.make_result_event(&wrapped);
        callback(wrapped);

        if self.stop_at_first_match && matched {
            debug!("Match found, stopping at first match");
            return Ok(StepOutcome::Stop);
        }
        Ok(StepOutcome::Continue)
    }
}

#[async_trait]
impl ProtocolRequest for HttpRequest {
    fn protocol_type(&self) -> ProtocolType {
        ProtocolType::Http
    }

    fn compile(&mut self, options: &ExecuterOptions) -> EngineResult<()> {
        self.options = options.clone();
        self.renderer = PlaceholderRenderer::strict();

        let policy = ClientPolicy::resolve(&options.http, self.redirects, self.max_redirects, self.cookie_reuse);
        self.client = Some(build_client(&options.http, policy)?);

        if !self.body.is_empty() && !self.body.contains("\r\n") {
            self.body = self.body.replace('\n', "\r\n");
        }
        for raw in &mut self.raw {
            if !raw.contains("\r\n") {
                *raw = raw.replace('\n', "\r\n");
            }
        }

        let mut operators = self.operators.clone();
        operators.compile()?;
        self.compiled_operators = if operators.is_empty() { None } else { Some(operators) };

        self.extra_payloads = payload::undeclared_overrides(&self.payloads, &options.vars_payload);
        self.generator = if self.payloads.is_empty() {
            None
        } else {
            let attack_type = payload::resolve_attack_type(
                options.attack_type.as_deref(),
                !options.vars_payload.is_empty(),
                self.attack.as_deref(),
            )?;
            let spec = payload::apply_overrides(&self.payloads, &options.vars_payload);
            Some(PayloadGenerator::compile(&spec, attack_type)?)
        };

        debug!(
            "Compiled http request {:?} with {} requests",
            self.id.as_deref().unwrap_or_default(),
            self.requests()
        );
        Ok(())
    }

    fn requests(&self) -> usize {
        let entries = if self.raw.is_empty() { self.path.len() } else { self.raw.len() };
        let bindings = self
            .generator
            .as_ref()
            .map_or(1, |generator| generator.new_iterator().total());
        bindings * entries
    }

    fn match_part(&self, part: &str, event: &InternalEvent) -> Option<String> {
        match part {
            "" | "body" => event.get("body").map(str::to_string),
            "header" => event.get("all_headers").map(str::to_string),
            "all" => Some(format!(
                "{}{}",
                event.get("body").unwrap_or_default(),
                event.get("all_headers").unwrap_or_default()
            )),
            other => event.get(other).map(str::to_string),
        }
    }

    fn matches(&self, event: &InternalEvent, matcher: &Matcher) -> bool {
        if matcher.kind == MatcherType::Status {
            return event
                .get("status_code")
                .and_then(|code| code.parse::<u16>().ok())
                .map_or(false, |code| matcher.result(matcher.match_status(code)));
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
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| EngineError::configuration("http", "request executed before compile"))?;
        let target = url_variables(input)?;

        let mut chained = dynamic_values.clone();
        let mut first_error: Option<EngineError> = None;

        for (data, is_raw) in self.entries() {
            let bindings: Vec<Bindings> = match &self.generator {
                Some(generator) => generator.new_iterator().collect(),
                None => vec![Bindings::new()],
            };

            for binding in bindings {
                let payloads = merge_bindings(&self.extra_payloads, &binding);
                if !payloads.is_empty() {
                    debug!("payloads: {:?}", payloads);
                }

                for combination in DynamicCombinations::new(&chained) {
                    let outcome = self
                        .execute_attempt(client, &target, data, is_raw, &payloads, &combination, &mut chained, callback)
                        .await;
                    match outcome {
                        Ok(StepOutcome::Continue) => {}
                        Ok(StepOutcome::Stop) => return first_error.map_or(Ok(()), Err),
                        Err(err) => {
                            warn!("HTTP request to {} failed: {}", input, err);
                            first_error.get_or_insert(err);
                        }
                    }
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn make_result_event(&self, wrapped: &InternalWrappedEvent) -> Vec<ResultEvent> {
        make_result_events(wrapped, ProtocolType::Http)
    }

    fn compiled_operators(&self) -> Option<&Operators> {
        self.compiled_operators.as_ref()
    }
}

/// Parse the target and derive `BaseURL`, `RootURL`, `Hostname`, `Host`,
/// `Port`, `Path` and `Scheme`
pub fn url_variables(input: &str) -> EngineResult<Target> {
    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("http://{}", input)
    };
    let base = Url::parse(&with_scheme)?;
    let host = base
        .host_str()
        .ok_or_else(|| EngineError::configuration("http", "target has no host"))?
        .to_string();
    let hostname = match base.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.clone(),
    };
    let port = base
        .port_or_known_default()
        .map(|port| port.to_string())
        .unwrap_or_default();

    let mut variables = Bindings::new();
    variables.insert("BaseURL".to_string(), with_scheme.trim_end_matches('/').to_string());
    variables.insert("RootURL".to_string(), format!("{}://{}", base.scheme(), hostname));
    variables.insert("Hostname".to_string(), hostname);
    variables.insert("Host".to_string(), host);
    variables.insert("Port".to_string(), port);
    variables.insert("Path".to_string(), base.path().trim_end_matches('/').to_string());
    variables.insert("Scheme".to_string(), base.scheme().to_string());

    Ok(Target { base, variables })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn compiled(mut request: HttpRequest, options: &ExecuterOptions) -> HttpRequest {
        request.compile(options).unwrap();
        request
    }

    #[test]
    fn test_url_variables() {
        let target = url_variables("https://example.com:8443/app/").unwrap();
        assert_eq!(target.variables["BaseURL"], "https://example.com:8443/app");
        assert_eq!(target.variables["RootURL"], "https://example.com:8443");
        assert_eq!(target.variables["Hostname"], "example.com:8443");
        assert_eq!(target.variables["Host"], "example.com");
        assert_eq!(target.variables["Port"], "8443");
        assert_eq!(target.variables["Path"], "/app");
        assert_eq!(target.variables["Scheme"], "https");

        let target = url_variables("example.com").unwrap();
        assert_eq!(target.variables["Port"], "80");
        assert_eq!(target.variables["BaseURL"], "http://example.com");
    }

    #[test]
    fn test_requests_count() {
        let mut payloads = PayloadSpec::new();
        payloads.insert("a".to_string(), Value::Many(vec!["1".into(), "2".into(), "3".into()]));
        payloads.insert("b".to_string(), Value::Many(vec!["x".into(), "y".into()]));

        let request = compiled(
            HttpRequest::get(&["{{BaseURL}}/{{a}}", "{{BaseURL}}/{{b}}"]).with_payloads(payloads, Some("clusterbomb")),
            &ExecuterOptions::default(),
        );
        assert_eq!(request.requests(), 12);

        let request = compiled(HttpRequest::get(&["{{BaseURL}}/"]), &ExecuterOptions::default());
        assert_eq!(request.requests(), 1);
    }

    #[test]
    fn test_vars_payload_forces_clusterbomb() {
        let mut payloads = PayloadSpec::new();
        payloads.insert("a".to_string(), Value::Many(vec!["1".into(), "2".into()]));
        payloads.insert("b".to_string(), Value::Many(vec!["x".into(), "y".into()]));
        let mut options = ExecuterOptions::default();
        options.vars_payload.insert("unrelated".to_string(), Value::from("v"));

        let request = compiled(
            HttpRequest::get(&["{{BaseURL}}"]).with_payloads(payloads, Some("pitchfork")),
            &options,
        );
        assert_eq!(request.requests(), 4);
        assert_eq!(request.extra_payloads["unrelated"], "v");
    }

    #[test]
    fn test_line_endings_normalized() {
        let mut request = HttpRequest::raw(&["GET / HTTP/1.1\nHost: x\n\n"]);
        request.body = "a=1\nb=2".to_string();
        let request = compiled(request, &ExecuterOptions::default());
        assert_eq!(request.raw[0], "GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(request.body, "a=1\r\nb=2");

        let mut request = HttpRequest::get(&["{{BaseURL}}"]);
        request.body = "already\r\nmixed\n".to_string();
        let request = compiled(request, &ExecuterOptions::default());
        assert_eq!(request.body, "already\r\nmixed\n");
    }

    #[test]
    fn test_make_request_defaults_user_agent() {
        let request = compiled(HttpRequest::get(&["{{BaseURL}}/login"]), &ExecuterOptions::default());
        let target = url_variables("http://127.0.0.1:8080").unwrap();
        let generated = request
            .make_request(&target, &request.path[0], false, &target.variables)
            .unwrap();
        assert_eq!(generated.url, "http://127.0.0.1:8080/login");
        assert_eq!(generated.host, "127.0.0.1");
        assert!(generated
            .headers
            .iter()
            .any(|(name, value)| name == "User-Agent" && value == crate::config::DEFAULT_USER_AGENT));
    }

    #[test]
    fn test_make_request_unresolved() {
        let request = compiled(HttpRequest::get(&["{{BaseURL}}/{{token}}"]), &ExecuterOptions::default());
        let target = url_variables("http://127.0.0.1").unwrap();
        let err = request
            .make_request(&target, &request.path[0], false, &target.variables)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedVariables { ref names } if names == &vec!["token".to_string()]));
    }

    #[test]
    fn test_make_raw_request_keeps_template_headers() {
        let request = compiled(
            HttpRequest::raw(&["POST /api HTTP/1.1\nHost: {{Hostname}}\nUser-Agent: custom\n\n{\"a\":1}"]),
            &ExecuterOptions::default(),
        );
        let target = url_variables("http://127.0.0.1:9000").unwrap();
        let generated = request
            .make_request(&target, &request.raw[0], true, &target.variables)
            .unwrap();
        assert_eq!(generated.method, reqwest::Method::POST);
        assert_eq!(generated.url, "http://127.0.0.1:9000/api");
        assert_eq!(generated.headers, vec![("User-Agent".to_string(), "custom".to_string())]);
        assert_eq!(generated.body, "{\"a\":1}");
    }

    #[test]
    fn test_match_part_aliases() {
        let request = HttpRequest::default();
        let mut event = InternalEvent::new();
        event.insert("body", "B");
        event.insert("all_headers", "Server: x\r\n");
        assert_eq!(request.match_part("", &event).as_deref(), Some("B"));
        assert_eq!(request.match_part("header", &event).as_deref(), Some("Server: x\r\n"));
        assert_eq!(request.match_part("all", &event).as_deref(), Some("BServer: x\r\n"));
        assert_eq!(request.match_part("cookie", &event), None);
    }

    #[test]
    fn test_status_matcher_uses_status_code() {
        let mut matcher = Matcher::status(&[200]);
        matcher.compile().unwrap();
        let request = HttpRequest::default();
        let mut event = InternalEvent::new();
        event.insert("status_code", "200");
        assert!(request.matches(&event, &matcher));
        assert!(!request.matches(&InternalEvent::new(), &matcher));
    }

    #[tokio::test]
    async fn test_execute_before_compile_fails() {
        let request = HttpRequest::get(&["{{BaseURL}}"]);
        let result = request
            .execute_with_results("http://127.0.0.1:1", &DynamicValues::new(), &mut |_| {})
            .await;
        assert!(matches!(result, Err(EngineError::ConfigurationError { .. })));
    }
}
