//! Payload specification handling
//!
//! Normalizes a declarative payload map into ordered candidate sets and
//! resolves which attack type drives them.

use crate::attack_modes::AttackType;
use crate::error::{EngineError, EngineResult};
use crate::types::{Bindings, PayloadSpec, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

/// One payload variable with its ordered candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSet {
    pub name: String,
    pub values: Vec<String>,
}

impl PayloadSet {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Turn a payload spec into candidate sets, ordered by variable name.
pub fn normalize(spec: &PayloadSpec) -> EngineResult<Vec<PayloadSet>> {
    if spec.is_empty() {
        return Err(EngineError::invalid_payload(
            "payload generation requested with an empty payload specification",
        ));
    }

    spec.iter()
        .map(|(name, value)| {
            let values = value.candidates();
            if values.is_empty() {
                return Err(EngineError::invalid_payload(format!(
                    "payload variable '{}' has no candidate values",
                    name
                )));
            }
            Ok(PayloadSet {
                name: name.clone(),
                values,
            })
        })
        .collect()
}

/// Replace declared payload variables with externally supplied candidates.
/// Variables the template never declared are ignored.
pub fn apply_overrides(spec: &PayloadSpec, overrides: &BTreeMap<String, Value>) -> PayloadSpec {
    let mut merged = spec.clone();
    for (name, value) in overrides {
        if let Some(slot) = merged.get_mut(name) {
            *slot = value.clone();
        }
    }
    merged
}

/// Literal bindings for override variables the template never declared
pub fn undeclared_overrides(spec: &PayloadSpec, overrides: &BTreeMap<String, Value>) -> Bindings {
    overrides
        .iter()
        .filter(|(name, _)| !spec.contains_key(name.as_str()))
        .filter_map(|(name, value)| value.as_literal().map(|v| (name.clone(), v.to_string())))
        .collect()
}

/// Effective attack type: explicit option > variable override present >
/// template declaration > sniper.
pub fn resolve_attack_type(
    option_override: Option<&str>,
    has_vars_payload: bool,
    declared: Option<&str>,
) -> EngineResult<AttackType> {
    match (option_override.filter(|s| !s.is_empty()), declared.filter(|s| !s.is_empty())) {
        (Some(explicit), _) => AttackType::from_str(explicit),
        (None, _) if has_vars_payload => Ok(AttackType::ClusterBomb),
        (None, Some(declared)) => AttackType::from_str(declared),
        (None, None) => Ok(AttackType::default()),
    }
}

/// Merge `extra` over `base`; values in `extra` win.
pub fn merge_bindings(base: &Bindings, extra: &Bindings) -> Bindings {
    let mut merged = base.clone();
    for (key, value) in extra {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
