//! Extractors pulling values out of an event

use crate::error::{EngineError, EngineResult};
use crate::types::InternalEvent;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind of extraction an extractor performs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorType {
    #[default]
    Regex,
    Kval,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Extractor {
    #[serde(rename = "type")]
    pub kind: ExtractorType,
    pub name: Option<String>,
    pub part: String,
    pub regex: Vec<String>,
    /// Capture group to keep; 0 is the whole match
    pub group: usize,
    /// Event field names for key-value lookup
    pub kval: Vec<String>,
    /// Internal extractors feed later requests instead of the output
    pub internal: bool,
    pub case_insensitive: bool,

    #[serde(skip)]
    compiled_regex: Vec<Regex>,
}

impl Extractor {
    pub fn regex(name: &str, patterns: &[&str], group: usize) -> Self {
        Self {
            kind: ExtractorType::Regex,
            name: Some(name.to_string()),
            regex: patterns.iter().map(|p| p.to_string()).collect(),
            group,
            ..Default::default()
        }
    }

    pub fn kval(name: &str, keys: &[&str]) -> Self {
        Self {
            kind: ExtractorType::Kval,
            name: Some(name.to_string()),
            kval: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn part(mut self, part: &str) -> Self {
        self.part = part.to_string();
        self
    }

    pub fn compile(&mut self) -> EngineResult<()> {
        self.compiled_regex = self
            .regex
            .iter()
            .map(|pattern| {
                let pattern = if self.case_insensitive && !pattern.starts_with("(?i)") {
                    format!("(?i){}", pattern)
                } else {
                    pattern.clone()
                };
                Regex::new(&pattern).map_err(|e| EngineError::OperatorCompile {
                    reason: format!("invalid extractor regex '{}': {}", pattern, e),
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        if self.kind == ExtractorType::Kval && self.kval.is_empty() {
            return Err(EngineError::OperatorCompile {
                reason: "kval extractor without keys".to_string(),
            });
        }
        Ok(())
    }

    /// Values of the configured capture group, unique, in match order
    pub fn extract_regex(&self, corpus: &str) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for re in &self.compiled_regex {
            for caps in re.captures_iter(corpus) {
                if let Some(found) = caps.get(self.group) {
                    let found = found.as_str().to_string();
                    if !values.contains(&found) {
                        values.push(found);
                    }
                }
            }
        }
        values
    }

    /// Values of the named event fields; names are matched lower-case with `-` as `_`
    pub fn extract_kval(&self, event: &InternalEvent) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for key in &self.kval {
            let key = key.to_lowercase().replace('-', "_");
            if let Some(value) = event.get(&key) {
                let value = value.to_string();
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
        values
    }

    /// Dispatch on kind given the resolved part text
    pub fn extract_item(&self, item: &str, event: &InternalEvent) -> Vec<String> {
        match self.kind {
            ExtractorType::Regex => self.extract_regex(item),
            ExtractorType::Kval => self.extract_kval(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_group_extraction_deduplicates() {
        let mut extractor = Extractor::regex("token", &[r"token=([a-z0-9]+)"], 1);
        extractor.compile().unwrap();
        let values = extractor.extract_regex("token=abc token=def token=abc");
        assert_eq!(values, vec!["abc".to_string(), "def".to_string()]);
    }

    #[test]
    fn test_group_out_of_range_yields_nothing() {
        let mut extractor = Extractor::regex("x", &[r"token=\w+"], 3);
        extractor.compile().unwrap();
        assert!(extractor.extract_regex("token=abc").is_empty());
    }

    #[test]
    fn test_kval_normalizes_names() {
        let mut extractor = Extractor::kval("server", &["X-Powered-By", "missing"]);
        extractor.compile().unwrap();
        let mut event = InternalEvent::new();
        event.insert("x_powered_by", "PHP/8.1");
        assert_eq!(extractor.extract_kval(&event), vec!["PHP/8.1".to_string()]);
    }

    #[test]
    fn test_kval_without_keys_fails_compile() {
        let mut extractor = Extractor::kval("empty", &[]);
        assert!(extractor.compile().is_err());
    }
}
