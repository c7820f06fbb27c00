//! Property-based tests for payload generation and dynamic value resolution

#[cfg(test)]
mod tests {
    use crate::attack_modes::{AttackType, PayloadGenerator};
    use crate::dynamic::{for_each_combination, DynamicCombinations};
    use crate::types::{Bindings, DynamicValues, PayloadSpec, StepOutcome, Value};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    prop_compose! {
        /// Up to four variables, each with 1..5 distinct candidates
        fn arb_payload_spec()
            (lengths in prop::collection::vec(1usize..5, 1..4))
        -> PayloadSpec {
            lengths
                .iter()
                .enumerate()
                .map(|(var, len)| {
                    let values = (0..*len).map(|i| format!("v{}_{}", var, i)).collect();
                    (format!("var{}", var), Value::Many(values))
                })
                .collect()
        }
    }

    prop_compose! {
        fn arb_dynamic_values()
            (entries in prop::collection::vec((0usize..4, any::<bool>()), 0..4))
        -> DynamicValues {
            entries
                .iter()
                .enumerate()
                .map(|(i, (len, scalar))| {
                    let value = if *scalar {
                        Value::Single(format!("s{}", i))
                    } else {
                        Value::Many((0..*len).map(|j| format!("d{}_{}", i, j)).collect())
                    };
                    (format!("dyn{}", i), value)
                })
                .collect()
        }
    }

    fn lengths(spec: &PayloadSpec) -> Vec<usize> {
        spec.values().map(|value| value.candidates().len()).collect()
    }

    proptest! {
        #[test]
        fn property_sniper_total_is_sum(spec in arb_payload_spec()) {
            let generator = PayloadGenerator::compile(&spec, AttackType::Sniper).unwrap();
            let expected: usize = lengths(&spec).iter().sum();
            prop_assert_eq!(generator.new_iterator().total(), expected);
            prop_assert_eq!(generator.new_iterator().count(), expected);

            // Exactly one variable differs from its first candidate at a time.
            for bindings in generator.new_iterator() {
                let moved = spec
                    .iter()
                    .filter(|(name, value)| bindings[*name] != value.candidates()[0])
                    .count();
                prop_assert!(moved <= 1);
            }
        }

        #[test]
        fn property_pitchfork_lock_step(spec in arb_payload_spec()) {
            let generator = PayloadGenerator::compile(&spec, AttackType::PitchFork).unwrap();
            let min = lengths(&spec).into_iter().min().unwrap_or(0);
            let produced: Vec<Bindings> = generator.new_iterator().collect();
            prop_assert_eq!(produced.len(), min);

            for (k, bindings) in produced.iter().enumerate() {
                for (name, value) in &spec {
                    let candidates = value.candidates();
                    prop_assert_eq!(&bindings[name], &candidates[k]);
                }
            }
        }

        #[test]
        fn property_clusterbomb_is_full_product(spec in arb_payload_spec()) {
            let generator = PayloadGenerator::compile(&spec, AttackType::ClusterBomb).unwrap();
            let product: usize = lengths(&spec).iter().product();
            let produced: Vec<Bindings> = generator.new_iterator().collect();
            prop_assert_eq!(produced.len(), product);

            let unique: BTreeSet<Vec<String>> = produced
                .iter()
                .map(|bindings| bindings.values().cloned().collect())
                .collect();
            prop_assert_eq!(unique.len(), product);

            // Fresh iterators replay the same order.
            let again: Vec<Bindings> = generator.new_iterator().collect();
            prop_assert_eq!(produced, again);
        }

        #[test]
        fn property_resolver_count_is_product_of_lists(values in arb_dynamic_values()) {
            let expected: usize = values
                .values()
                .map(|value| match value {
                    Value::Many(items) if !items.is_empty() => items.len(),
                    _ => 1,
                })
                .product();

            let combinations: Vec<Bindings> = DynamicCombinations::new(&values).collect();
            prop_assert_eq!(combinations.len(), expected);
            for combination in &combinations {
                for (name, value) in &values {
                    if let Value::Single(literal) = value {
                        prop_assert_eq!(&combination[name], literal);
                    }
                }
            }
        }

        #[test]
        fn property_resolver_stops_when_asked(values in arb_dynamic_values(), stop_at in 1usize..4) {
            let total = DynamicCombinations::new(&values).total();
            let mut seen = 0;
            let invoked = for_each_combination(&values, |_| {
                seen += 1;
                if seen == stop_at { StepOutcome::Stop } else { StepOutcome::Continue }
            });
            prop_assert_eq!(invoked, total.min(stop_at));
        }
    }
}
