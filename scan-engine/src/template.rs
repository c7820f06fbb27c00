//! `{{name}}` placeholder rendering
//!
//! Templated request data marks variables as `{{name}}`. Rendering replaces
//! every placeholder whose name is bound and either keeps or rejects the rest,
//! depending on the renderer's policy.

use crate::types::Bindings;
use regex::Regex;
use thiserror::Error;

/// Rendering failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("unresolved variables: {names:?}")]
    Unresolved { names: Vec<String> },
}

/// Templating collaborator used by the protocol executors
pub trait Renderer: Send + Sync {
    /// Render `input` using `vars`; pure and total over any mapping
    fn render(&self, input: &str, vars: &Bindings) -> Result<String, RenderError>;
}

/// Default renderer for `{{name}}` placeholders
#[derive(Debug, Clone)]
pub struct PlaceholderRenderer {
    pattern: Regex,
    strict: bool,
}

impl PlaceholderRenderer {
    /// Renderer that rejects output with leftover placeholders
    pub fn strict() -> Self {
        Self::with_policy(true)
    }

    /// Renderer that leaves unknown placeholders in place
    pub fn lenient() -> Self {
        Self::with_policy(false)
    }

    fn with_policy(strict: bool) -> Self {
        Self {
            // Static pattern, compilation cannot fail.
            pattern: Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}")
                .expect("placeholder pattern is valid"),
            strict,
        }
    }

    /// Names of placeholders still present in `input`, deduplicated in order
    pub fn unresolved(&self, input: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in self.pattern.captures_iter(input) {
            let name = caps[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

impl Default for PlaceholderRenderer {
    fn default() -> Self {
        Self::strict()
    }
}

impl Renderer for PlaceholderRenderer {
    fn render(&self, input: &str, vars: &Bindings) -> Result<String, RenderError> {
        if !input.contains("{{") {
            return Ok(input.to_string());
        }

        let mut missing = Vec::new();
        let rendered = self.pattern.replace_all(input, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match vars.get(name) {
                Some(value) => value.clone(),
                None => {
                    if !missing.iter().any(|m: &String| m == name) {
                        missing.push(name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        });

        if self.strict && !missing.is_empty() {
            return Err(RenderError::Unresolved { names: missing });
        }
        Ok(rendered.into_owned())
    }
}
