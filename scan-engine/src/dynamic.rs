//! Dynamic value resolution for chained requests
//!
//! Extractors may yield several candidates for one name. Before the next
//! request in a sequence is rendered, every ambiguous entry is expanded so
//! that each concrete request sees exactly one literal per name.

use crate::types::{Bindings, DynamicValues, StepOutcome, Value};

/// Lazy cartesian expansion of dynamic values into literal bindings.
///
/// Scalar entries pass through unchanged in every combination; list entries
/// advance like an odometer, the last name (in key order) fastest.
#[derive(Debug, Clone)]
pub struct DynamicCombinations {
    scalars: Bindings,
    lists: Vec<(String, Vec<String>)>,
    cursor: Vec<usize>,
    exhausted: bool,
}

impl DynamicCombinations {
    pub fn new(values: &DynamicValues) -> Self {
        let mut scalars = Bindings::new();
        let mut lists = Vec::new();

        for (name, value) in values {
            match value {
                Value::Single(literal) => {
                    scalars.insert(name.clone(), literal.clone());
                }
                Value::Many(candidates) if candidates.len() == 1 => {
                    scalars.insert(name.clone(), candidates[0].clone());
                }
                Value::Many(candidates) if candidates.is_empty() => {}
                Value::Many(candidates) => lists.push((name.clone(), candidates.clone())),
            }
        }

        let cursor = vec![0; lists.len()];
        Self {
            scalars,
            lists,
            cursor,
            exhausted: false,
        }
    }

    /// Number of combinations the expansion yields in total
    pub fn total(&self) -> usize {
        self.lists
            .iter()
            .fold(1usize, |acc, (_, candidates)| acc.saturating_mul(candidates.len()))
    }

    fn advance(&mut self) {
        for slot in (0..self.cursor.len()).rev() {
            self.cursor[slot] += 1;
            if self.cursor[slot] < self.lists[slot].1.len() {
                return;
            }
            self.cursor[slot] = 0;
        }
        self.exhausted = true;
    }
}

impl Iterator for DynamicCombinations {
    type Item = Bindings;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let mut combination = self.scalars.clone();
        for ((name, candidates), &index) in self.lists.iter().zip(&self.cursor) {
            combination.insert(name.clone(), candidates[index].clone());
        }
        self.advance();
        Some(combination)
    }
}

/// Invoke `continuation` once per combination, in order, until it asks to stop.
///
/// Returns the number of combinations that were handed to the continuation.
pub fn for_each_combination<F>(values: &DynamicValues, mut continuation: F) -> usize
where
    F: FnMut(Bindings) -> StepOutcome,
{
    let mut invoked = 0;
    for combination in DynamicCombinations::new(values) {
        invoked += 1;
        if continuation(combination) == StepOutcome::Stop {
            break;
        }
    }
    invoked
}

/// Merge freshly extracted values over accumulated ones; a redefined name takes
/// the newer value, every other name is kept.
pub fn merge_dynamic(accumulated: &DynamicValues, fresh: &DynamicValues) -> DynamicValues {
    let mut merged = accumulated.clone();
    for (name, value) in fresh {
        merged.insert(name.clone(), value.clone());
    }
    merged
}
