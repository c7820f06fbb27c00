//! Matchers evaluated against a string view of an event part

use super::Condition;
use crate::error::{EngineError, EngineResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind of check a matcher performs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatcherType {
    Status,
    Size,
    #[default]
    Word,
    Regex,
    Binary,
}

/// Status code entry: an exact code or an inclusive `low-high` range
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StatusSpec {
    Code(u16),
    Range(String),
}

/// A compiled-at-load matcher
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Matcher {
    #[serde(rename = "type")]
    pub kind: MatcherType,
    pub name: Option<String>,
    /// Event part the matcher reads; empty selects the protocol's primary field
    pub part: String,
    /// How the entries of this matcher combine
    pub condition: Condition,
    pub negative: bool,
    pub case_insensitive: bool,
    pub status: Vec<StatusSpec>,
    pub size: Vec<usize>,
    pub words: Vec<String>,
    pub regex: Vec<String>,
    /// Hex-encoded byte prefixes
    pub binary: Vec<String>,

    #[serde(skip)]
    status_ranges: Vec<(u16, u16)>,
    #[serde(skip)]
    compiled_regex: Vec<Regex>,
    #[serde(skip)]
    compiled_binary: Vec<Vec<u8>>,
}

impl Matcher {
    pub fn new(kind: MatcherType) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn part(mut self, part: &str) -> Self {
        self.part = part.to_string();
        self
    }

    pub fn words(words: &[&str]) -> Self {
        let mut matcher = Self::new(MatcherType::Word);
        matcher.words = words.iter().map(|w| w.to_string()).collect();
        matcher
    }

    pub fn regex(patterns: &[&str]) -> Self {
        let mut matcher = Self::new(MatcherType::Regex);
        matcher.regex = patterns.iter().map(|p| p.to_string()).collect();
        matcher
    }

    pub fn status(codes: &[u16]) -> Self {
        let mut matcher = Self::new(MatcherType::Status);
        matcher.status = codes.iter().map(|c| StatusSpec::Code(*c)).collect();
        matcher
    }

    /// Compile regexes, hex prefixes and status ranges
    pub fn compile(&mut self) -> EngineResult<()> {
        self.status_ranges = self
            .status
            .iter()
            .map(parse_status)
            .collect::<EngineResult<Vec<_>>>()?;

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
                    reason: format!("invalid matcher regex '{}': {}", pattern, e),
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        self.compiled_binary = self
            .binary
            .iter()
            .map(|prefix| {
                hex::decode(prefix).map_err(|e| EngineError::OperatorCompile {
                    reason: format!("invalid binary matcher '{}': {}", prefix, e),
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        if self.kind == MatcherType::Regex && self.compiled_regex.is_empty() {
            return Err(EngineError::OperatorCompile {
                reason: "regex matcher without patterns".to_string(),
            });
        }
        Ok(())
    }

    /// Apply the negative flag
    pub fn result(&self, matched: bool) -> bool {
        if self.negative {
            !matched
        } else {
            matched
        }
    }

    pub fn match_status(&self, code: u16) -> bool {
        self.status_ranges
            .iter()
            .any(|(low, high)| (*low..=*high).contains(&code))
    }

    pub fn match_size(&self, length: usize) -> bool {
        self.size.iter().any(|size| *size == length)
    }

    pub fn match_words(&self, corpus: &str) -> bool {
        if self.words.is_empty() {
            return false;
        }
        let lowered;
        let haystack = if self.case_insensitive {
            lowered = corpus.to_lowercase();
            lowered.as_str()
        } else {
            corpus
        };
        self.combine(self.words.iter().map(|word| {
            if self.case_insensitive {
                haystack.contains(&word.to_lowercase())
            } else {
                haystack.contains(word.as_str())
            }
        }))
    }

    pub fn match_regex(&self, corpus: &str) -> bool {
        if self.compiled_regex.is_empty() {
            return false;
        }
        self.combine(self.compiled_regex.iter().map(|re| re.is_match(corpus)))
    }

    pub fn match_binary(&self, corpus: &str) -> bool {
        if self.compiled_binary.is_empty() {
            return false;
        }
        let bytes = corpus.as_bytes();
        self.combine(self.compiled_binary.iter().map(|prefix| bytes.starts_with(prefix)))
    }

    /// Evaluate every kind that only needs the part's text.
    /// Status matchers need the numeric code and are left to the protocol.
    pub fn match_item(&self, item: &str) -> bool {
        let matched = match self.kind {
            MatcherType::Size => self.match_size(item.len()),
            MatcherType::Word => self.match_words(item),
            MatcherType::Regex => self.match_regex(item),
            MatcherType::Binary => self.match_binary(item),
            MatcherType::Status => item
                .trim()
                .parse::<u16>()
                .map_or(false, |code| self.match_status(code)),
        };
        self.result(matched)
    }

    fn combine(&self, mut results: impl Iterator<Item = bool>) -> bool {
        match self.condition {
            Condition::And => results.all(|m| m),
            Condition::Or => results.any(|m| m),
        }
    }
}

fn parse_status(spec: &StatusSpec) -> EngineResult<(u16, u16)> {
    match spec {
        StatusSpec::Code(code) => Ok((*code, *code)),
        StatusSpec::Range(text) => {
            let invalid = || EngineError::OperatorCompile {
                reason: format!("invalid status entry '{}'", text),
            };
            match text.split_once('-') {
                Some((low, high)) => {
                    let low = low.trim().parse::<u16>().map_err(|_| invalid())?;
                    let high = high.trim().parse::<u16>().map_err(|_| invalid())?;
                    if low > high {
                        return Err(invalid());
                    }
                    Ok((low, high))
                }
                None => {
                    let code = text.trim().parse::<u16>().map_err(|_| invalid())?;
                    Ok((code, code))
                }
            }
        }
    }
}
