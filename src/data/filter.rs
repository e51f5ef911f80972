use std::collections::BTreeSet;

use serde_json::Value as JsonValue;

use super::model::{Event, EventKinds, TimelineEntry};
use crate::error::{SchemaError, ValidationError};

// ---------------------------------------------------------------------------
// Minimum-steps threshold
// ---------------------------------------------------------------------------

/// Minimum number of observed steps a timeline entry needs to be kept.
///
/// Holds the value as typed; anything below 1 keeps every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MinSteps(i64);

impl MinSteps {
    pub fn new(n: i64) -> Self {
        Self(n)
    }

    /// Parse the threshold typed by the user. Non-integers are rejected.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        input
            .trim()
            .parse::<i64>()
            .map(Self::new)
            .map_err(|_| ValidationError::NotAnInteger {
                input: input.to_string(),
            })
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Number of steps an entry must reach; never negative.
    pub fn threshold(self) -> usize {
        usize::try_from(self.0).unwrap_or(0)
    }
}

/// Names of the timeline entries that survived filtering.
pub type RetainedNames = BTreeSet<String>;

// ---------------------------------------------------------------------------
// Decoding raw resources
// ---------------------------------------------------------------------------

/// Decode the timeline resource: a JSON array of `{name, data}` entries.
pub fn decode_timeline(resource: &str, raw: JsonValue) -> Result<Vec<TimelineEntry>, SchemaError> {
    if !raw.is_array() {
        return Err(SchemaError::WrongType {
            resource: resource.to_string(),
            field: "<root>".into(),
            expected: "an array of timeline entries",
        });
    }
    serde_json::from_value(raw).map_err(|source| SchemaError::Invalid {
        resource: resource.to_string(),
        source,
    })
}

/// Decode the events resource: a JSON object mapping kind → array of events.
pub fn decode_events(resource: &str, raw: JsonValue) -> Result<EventKinds, SchemaError> {
    let JsonValue::Object(kinds) = raw else {
        return Err(SchemaError::WrongType {
            resource: resource.to_string(),
            field: "<root>".into(),
            expected: "an object of event kinds",
        });
    };

    let mut events = EventKinds::new();
    for (kind, list) in kinds {
        let JsonValue::Array(items) = list else {
            return Err(SchemaError::WrongType {
                resource: resource.to_string(),
                field: kind,
                expected: "an array of events",
            });
        };
        let decoded = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| Event::from_json(&kind, i, item))
            .collect::<Result<Vec<_>, _>>()?;
        events.insert(kind, decoded);
    }
    Ok(events)
}

// ---------------------------------------------------------------------------
// Timeline filter
// ---------------------------------------------------------------------------

/// Keep entries observed in at least `min_steps` steps, in their original order.
pub fn filter_timeline(
    timeline: Vec<TimelineEntry>,
    min_steps: MinSteps,
) -> (Vec<TimelineEntry>, RetainedNames) {
    let filtered: Vec<TimelineEntry> = timeline
        .into_iter()
        .filter(|entry| entry.data.len() >= min_steps.threshold())
        .collect();
    let names = filtered.iter().map(|entry| entry.name.clone()).collect();
    (filtered, names)
}

// ---------------------------------------------------------------------------
// Event cross-filter
// ---------------------------------------------------------------------------

/// Whether every entity an event references survived the timeline filter.
pub fn event_is_retained(event: &Event, retained: &RetainedNames) -> bool {
    event
        .referenced_names()
        .iter()
        .all(|name| retained.contains(*name))
}

/// Drop events that reference a filtered-out entity. Every kind is kept,
/// even when it ends up empty; order within a kind is preserved.
pub fn filter_events(events: EventKinds, retained: &RetainedNames) -> EventKinds {
    events
        .into_iter()
        .map(|(kind, list)| {
            let kept = list
                .into_iter()
                .filter(|ev| event_is_retained(ev, retained))
                .collect();
            (kind, kept)
        })
        .collect()
}
