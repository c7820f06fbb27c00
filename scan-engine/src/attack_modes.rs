//! Attack type implementations for payload generation
//!
//! Each attack type decides how the candidate lists of several payload
//! variables combine into a sequence of bindings. Bindings are produced
//! lazily by index, so a generator can hand out any number of fresh,
//! independent iterators over the same compiled payload sets.

use crate::error::{EngineError, EngineResult};
use crate::payload::{self, PayloadSet};
use crate::types::{Bindings, PayloadSpec};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Attack type enumeration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttackType {
    /// One variable varies at a time, the rest stay at their first candidate
    #[default]
    Sniper,
    /// All lists walked in lock-step, stopping at the shortest
    #[serde(rename = "pitchfork")]
    PitchFork,
    /// Full cartesian product, last variable advancing fastest
    #[serde(rename = "clusterbomb")]
    ClusterBomb,
}

impl FromStr for AttackType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sniper" => Ok(AttackType::Sniper),
            "pitchfork" => Ok(AttackType::PitchFork),
            "clusterbomb" => Ok(AttackType::ClusterBomb),
            other => Err(EngineError::UnknownAttackType {
                attack_type: other.to_string(),
            }),
        }
    }
}

/// Attack mode executor trait
pub trait AttackModeExecutor: Send + Sync {
    /// Total number of bindings the mode yields for these sets
    fn count(&self, sets: &[PayloadSet]) -> EngineResult<usize>;

    /// The binding at `index`, for `index < count`
    fn binding_at(&self, sets: &[PayloadSet], index: usize) -> Bindings;

    /// Get a description of this attack mode
    fn description(&self) -> String;
}

/// Sniper mode: each variable's list in turn, others held at their first value
pub struct SniperMode;

impl AttackModeExecutor for SniperMode {
    fn count(&self, sets: &[PayloadSet]) -> EngineResult<usize> {
        sets.iter()
            .try_fold(0usize, |acc, set| acc.checked_add(set.len()))
            .ok_or_else(|| EngineError::invalid_payload("sniper payload count overflows"))
    }

    fn binding_at(&self, sets: &[PayloadSet], index: usize) -> Bindings {
        let mut bindings: Bindings = sets
            .iter()
            .map(|set| (set.name.clone(), set.values[0].clone()))
            .collect();

        let mut offset = index;
        for set in sets {
            if offset < set.len() {
                bindings.insert(set.name.clone(), set.values[offset].clone());
                break;
            }
            offset -= set.len();
        }
        bindings
    }

    fn description(&self) -> String {
        "Sniper: one variable varies per request, others fixed at their first value".to_string()
    }
}

/// Pitchfork mode: parallel iteration through all lists
pub struct PitchforkMode;

impl AttackModeExecutor for PitchforkMode {
    fn count(&self, sets: &[PayloadSet]) -> EngineResult<usize> {
        Ok(sets.iter().map(PayloadSet::len).min().unwrap_or(0))
    }

    fn binding_at(&self, sets: &[PayloadSet], index: usize) -> Bindings {
        sets.iter()
            .map(|set| (set.name.clone(), set.values[index].clone()))
            .collect()
    }

    fn description(&self) -> String {
        "Pitchfork: lock-step iteration, stops at the shortest list".to_string()
    }
}

/// Cluster Bomb mode: all combinations
pub struct ClusterBombMode;

impl AttackModeExecutor for ClusterBombMode {
    fn count(&self, sets: &[PayloadSet]) -> EngineResult<usize> {
        if sets.is_empty() {
            return Ok(0);
        }
        sets.iter()
            .try_fold(1usize, |acc, set| acc.checked_mul(set.len()))
            .ok_or_else(|| EngineError::invalid_payload("cluster bomb would generate too many requests"))
    }

    fn binding_at(&self, sets: &[PayloadSet], index: usize) -> Bindings {
        // Mixed-radix decode; the last set is the least significant digit.
        let mut bindings = Bindings::new();
        let mut rest = index;
        for set in sets.iter().rev() {
            bindings.insert(set.name.clone(), set.values[rest % set.len()].clone());
            rest /= set.len();
        }
        bindings
    }

    fn description(&self) -> String {
        "Cluster Bomb: every combination of every variable".to_string()
    }
}

/// Factory for creating attack mode executors
pub struct AttackModeFactory;

impl AttackModeFactory {
    /// Create an attack mode executor
    pub fn create(mode: AttackType) -> Box<dyn AttackModeExecutor> {
        match mode {
            AttackType::Sniper => Box::new(SniperMode),
            AttackType::PitchFork => Box::new(PitchforkMode),
            AttackType::ClusterBomb => Box::new(ClusterBombMode),
        }
    }
}

/// Compiled payload generator owned by a template request
#[derive(Debug, Clone)]
pub struct PayloadGenerator {
    sets: Arc<Vec<PayloadSet>>,
    attack_type: AttackType,
    total: usize,
}

impl PayloadGenerator {
    /// Compile a payload spec for the given attack type
    pub fn compile(spec: &PayloadSpec, attack_type: AttackType) -> EngineResult<Self> {
        let sets = payload::normalize(spec)?;
        let total = AttackModeFactory::create(attack_type).count(&sets)?;
        Ok(Self {
            sets: Arc::new(sets),
            attack_type,
            total,
        })
    }

    /// Compile with the attack type given as a string tag
    pub fn compile_str(spec: &PayloadSpec, attack_type: &str) -> EngineResult<Self> {
        Self::compile(spec, AttackType::from_str(attack_type)?)
    }

    pub fn attack_type(&self) -> AttackType {
        self.attack_type
    }

    /// A fresh cursor positioned at the first binding
    pub fn new_iterator(&self) -> PayloadIterator {
        PayloadIterator {
            sets: Arc::clone(&self.sets),
            mode: AttackModeFactory::create(self.attack_type),
            position: 0,
            total: self.total,
        }
    }
}

/// Single-pass cursor over the bindings of one generator
pub struct PayloadIterator {
    sets: Arc<Vec<PayloadSet>>,
    mode: Box<dyn AttackModeExecutor>,
    position: usize,
    total: usize,
}

impl PayloadIterator {
    /// Total number of bindings this iterator yields from the start
    pub fn total(&self) -> usize {
        self.total
    }

    /// Bindings not yet produced
    pub fn remaining(&self) -> usize {
        self.total - self.position
    }
}

impl Iterator for PayloadIterator {
    type Item = Bindings;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total {
            return None;
        }
        let binding = self.mode.binding_at(&self.sets, self.position);
        self.position += 1;
        Some(binding)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl ExactSizeIterator for PayloadIterator {}

impl std::fmt::Debug for PayloadIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadIterator")
            .field("position", &self.position)
            .field("total", &self.total)
            .finish()
    }
}
