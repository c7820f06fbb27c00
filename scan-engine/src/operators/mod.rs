//! Compiled matchers and extractors
//!
//! The protocol executors supply the part resolution: `execute` receives a
//! match function and an extract function that know how to turn a part name
//! into text for their own event layout. A part the event never populated
//! simply does not match and extracts nothing.

mod extractors;
mod matchers;

pub use extractors::{Extractor, ExtractorType};
pub use matchers::{Matcher, MatcherType, StatusSpec};

use crate::error::EngineResult;
use crate::types::{DynamicValues, InternalEvent, OperatorsResult, Value};
use serde::{Deserialize, Serialize};

/// Logical combination of several checks
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    And,
    #[default]
    Or,
}

/// Matchers and extractors attached to one template request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Operators {
    pub matchers: Vec<Matcher>,
    pub matchers_condition: Condition,
    pub extractors: Vec<Extractor>,
}

impl Operators {
    pub fn new(matchers: Vec<Matcher>, extractors: Vec<Extractor>) -> Self {
        Self {
            matchers,
            matchers_condition: Condition::Or,
            extractors,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.matchers_condition = condition;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty() && self.extractors.is_empty()
    }

    /// Compile every matcher and extractor in place
    pub fn compile(&mut self) -> EngineResult<()> {
        for matcher in &mut self.matchers {
            matcher.compile()?;
        }
        for extractor in &mut self.extractors {
            extractor.compile()?;
        }
        Ok(())
    }

    /// Evaluate against one event.
    ///
    /// Returns `None` when nothing matched and nothing was extracted.
    pub fn execute<M, E>(&self, event: &InternalEvent, match_fn: M, extract_fn: E) -> Option<OperatorsResult>
    where
        M: Fn(&InternalEvent, &Matcher) -> bool,
        E: Fn(&InternalEvent, &Extractor) -> Vec<String>,
    {
        let mut result = OperatorsResult::default();

        for extractor in &self.extractors {
            let values = extract_fn(event, extractor);
            if values.is_empty() {
                continue;
            }

            if extractor.internal {
                if let Some(name) = &extractor.name {
                    result.dynamic_values.insert(name.clone(), values);
                }
                continue;
            }

            for value in &values {
                if !result.output_extracts.contains(value) {
                    result.output_extracts.push(value.clone());
                }
            }
            if let Some(name) = &extractor.name {
                result.extracts.insert(name.clone(), values);
            }
        }
        result.extracted = !result.output_extracts.is_empty();

        let mut verdicts = Vec::with_capacity(self.matchers.len());
        for matcher in &self.matchers {
            let matched = match_fn(event, matcher);
            if matched {
                if let Some(name) = &matcher.name {
                    result.matches.insert(name.clone(), true);
                }
            }
            verdicts.push(matched);
        }

        result.matched = !verdicts.is_empty()
            && match self.matchers_condition {
                Condition::And => verdicts.iter().all(|m| *m),
                Condition::Or => verdicts.iter().any(|m| *m),
            };
        if !result.matched {
            result.matches.clear();
        }

        if result.matched || result.extracted || !result.dynamic_values.is_empty() {
            Some(result)
        } else {
            None
        }
    }

    /// Run only the internal extractors, used between steps of one request
    pub fn execute_internal_extractors<E>(&self, event: &InternalEvent, extract_fn: E) -> DynamicValues
    where
        E: Fn(&InternalEvent, &Extractor) -> Vec<String>,
    {
        let mut values = DynamicValues::new();
        for extractor in self.extractors.iter().filter(|e| e.internal) {
            let Some(name) = &extractor.name else {
                continue;
            };
            let extracted = extract_fn(event, extractor);
            if !extracted.is_empty() {
                values.insert(name.clone(), Value::Many(extracted));
            }
        }
        values
    }
}
