//! Result event assembly
//!
//! Turns one evaluated event into the records reported to the user. Named
//! matchers take priority, then named extractors, then a single default
//! record.

use crate::types::{InternalWrappedEvent, OperatorsResult, ProtocolType, ResultEvent};
use uuid::Uuid;

/// Build the result events for one wrapped event
pub fn make_result_events(wrapped: &InternalWrappedEvent, protocol: ProtocolType) -> Vec<ResultEvent> {
    let Some(result) = &wrapped.operators_result else {
        return Vec::new();
    };
    // Chaining step that only fed values forward
    if !result.dynamic_values.is_empty() && !result.matched {
        return Vec::new();
    }

    if !result.matches.is_empty() {
        result
            .matches
            .keys()
            .map(|name| {
                let mut event = base_event(wrapped, result, protocol);
                event.matcher_name = Some(name.clone());
                event
            })
            .collect()
    } else if !result.extracts.is_empty() {
        result
            .extracts
            .iter()
            .map(|(name, values)| {
                let mut event = base_event(wrapped, result, protocol);
                event.extractor_name = Some(name.clone());
                event.extracted_results = values.clone();
                event
            })
            .collect()
    } else {
        vec![base_event(wrapped, result, protocol)]
    }
}

fn base_event(wrapped: &InternalWrappedEvent, result: &OperatorsResult, protocol: ProtocolType) -> ResultEvent {
    let field = |name: &str| wrapped.internal_event.get(name).unwrap_or_default().to_string();

    ResultEvent {
        id: Uuid::new_v4(),
        template_id: field("template-id"),
        protocol,
        host: field("host"),
        matched: field("matched"),
        ip: field("ip"),
        matcher_name: None,
        extractor_name: None,
        extracted_results: result.output_extracts.clone(),
        metadata: result.payload_values.clone(),
        timestamp: chrono::Utc::now(),
    }
}
