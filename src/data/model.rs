use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::SchemaError;

// ---------------------------------------------------------------------------
// Timeline – one row per tracked dynamic community
// ---------------------------------------------------------------------------

/// One observation of a dynamic community: which step community it matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelinePoint {
    pub step: u32,
    pub community: u32,
}

impl TimelinePoint {
    /// Read a `{step, community}` value; anything else is not plottable.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |key: &str| u32::try_from(obj.get(key)?.as_u64()?).ok();
        Some(Self {
            step: field("step")?,
            community: field("community")?,
        })
    }
}

/// A tracked entity and its per-step series. `name` is unique within a timeline.
///
/// `data` is kept exactly as received; only its length matters for filtering.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimelineEntry {
    pub name: String,
    pub data: Vec<JsonValue>,
}

impl TimelineEntry {
    /// The per-step values that locate a step community, in order.
    pub fn points(&self) -> impl Iterator<Item = TimelinePoint> + '_ {
        self.data.iter().filter_map(TimelinePoint::from_json)
    }
}

// ---------------------------------------------------------------------------
// Events – annotated occurrences referencing timeline entries by name
// ---------------------------------------------------------------------------

/// An event attached to a single timeline entry (birth, death, ...).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PointEvent {
    pub name: String,
    #[serde(default)]
    pub step: Option<u32>,
    #[serde(default)]
    pub community: Option<u32>,
    /// Anything else carried by the event, kept verbatim.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, JsonValue>,
}

/// One side of an [`EdgeEvent`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Endpoint {
    pub name: String,
    #[serde(default)]
    pub step: Option<u32>,
}

/// An event linking two timeline entries (split, merge, expansion, ...).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EdgeEvent {
    pub source: Endpoint,
    pub target: Endpoint,
    #[serde(default)]
    pub step: Option<u32>,
    #[serde(default)]
    pub community: Option<u32>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Point(PointEvent),
    Edge(EdgeEvent),
}

/// Event collections keyed by event kind ("births", "splits", ...).
pub type EventKinds = BTreeMap<String, Vec<Event>>;

impl Event {
    /// Decode one raw event. Anything carrying `name` is a point event;
    /// otherwise both `source.name` and `target.name` are required.
    pub fn from_json(kind: &str, index: usize, raw: JsonValue) -> Result<Self, SchemaError> {
        let malformed = |reason: String| SchemaError::MalformedEvent {
            kind: kind.to_string(),
            index,
            reason,
        };

        let Some(obj) = raw.as_object() else {
            return Err(malformed("not a JSON object".into()));
        };

        if obj.contains_key("name") {
            serde_json::from_value(raw)
                .map(Event::Point)
                .map_err(|e| malformed(e.to_string()))
        } else if obj.contains_key("source") || obj.contains_key("target") {
            serde_json::from_value(raw)
                .map(Event::Edge)
                .map_err(|e| malformed(e.to_string()))
        } else {
            Err(malformed(
                "carries neither 'name' nor 'source'/'target'".into(),
            ))
        }
    }

    /// Step the event is anchored at. Edge events fall back to their source step.
    pub fn step(&self) -> Option<u32> {
        match self {
            Event::Point(p) => p.step,
            Event::Edge(e) => e.step.or(e.source.step),
        }
    }

    pub fn community(&self) -> Option<u32> {
        match self {
            Event::Point(p) => p.community,
            Event::Edge(e) => e.community,
        }
    }

    /// Names of every timeline entry this event refers to.
    pub fn referenced_names(&self) -> Vec<&str> {
        match self {
            Event::Point(p) => vec![p.name.as_str()],
            Event::Edge(e) => vec![e.source.name.as_str(), e.target.name.as_str()],
        }
    }
}

// ---------------------------------------------------------------------------
// Steps – per-step community snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Community {
    /// Descriptive attributes (topic label, colour key, ...).
    #[serde(default)]
    pub data: BTreeMap<String, JsonValue>,
    #[serde(default)]
    pub users: Vec<JsonValue>,
}

impl Community {
    /// The `topic` attribute rendered as plain text.
    pub fn topic(&self) -> Option<String> {
        self.data.get("topic").map(attribute_text)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Step {
    /// Unix seconds.
    pub time: i64,
    pub communities: BTreeMap<u32, Community>,
}

/// All steps of a dataset keyed by their 1-based step id. Never filtered.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct StepIndex {
    pub steps: BTreeMap<u32, Step>,
}

impl StepIndex {
    /// `steps[step].communities[community]`, without panicking on a miss.
    pub fn community(&self, step: u32, community: u32) -> Option<&Community> {
        self.steps.get(&step)?.communities.get(&community)
    }

    pub fn time_of(&self, step: u32) -> Option<i64> {
        self.steps.get(&step).map(|s| s.time)
    }

    /// Time of the first and last step, if any.
    pub fn time_span(&self) -> Option<(i64, i64)> {
        let first = self.steps.values().next()?;
        let last = self.steps.values().next_back()?;
        Some((first.time, last.time))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

// ---------------------------------------------------------------------------
// FilteredModel – the assembled result of one load
// ---------------------------------------------------------------------------

/// Everything the chart needs, built once per load and replaced wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredModel {
    pub dataset: String,
    pub timeline: Vec<TimelineEntry>,
    pub events: EventKinds,
    pub steps: StepIndex,
    /// Community attribute that drives default colour grouping.
    pub default_color_key: String,
}

impl FilteredModel {
    pub fn event_count(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    /// Colour-grouping value of a step community.
    pub fn color_value(&self, step: u32, community: u32) -> Option<String> {
        self.steps
            .community(step, community)?
            .data
            .get(&self.default_color_key)
            .map(attribute_text)
    }
}

/// Render a community attribute without JSON quoting for strings.
pub fn attribute_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_with_name_is_a_point_event() {
        let ev = Event::from_json("births", 0, json!({"name": "D1", "step": 3})).unwrap();
        match ev {
            Event::Point(p) => {
                assert_eq!(p.name, "D1");
                assert_eq!(p.step, Some(3));
                assert_eq!(p.community, None);
            }
            other => panic!("expected point event, got {other:?}"),
        }
    }

    #[test]
    fn edge_event_keeps_extra_attributes() {
        let raw = json!({
            "source": {"name": "D1", "step": 2},
            "target": {"name": "D1", "step": 3},
            "growth": 0.5,
        });
        let ev = Event::from_json("expansions", 4, raw).unwrap();
        let Event::Edge(edge) = &ev else {
            panic!("expected edge event");
        };
        assert_eq!(edge.attributes.get("growth"), Some(&json!(0.5)));
        assert_eq!(ev.step(), Some(2));
        assert_eq!(ev.referenced_names(), vec!["D1", "D1"]);
    }

    #[test]
    fn event_without_either_shape_is_rejected() {
        let err = Event::from_json("marks", 7, json!({"step": 1})).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::MalformedEvent { ref kind, index: 7, .. } if kind == "marks"
        ));
    }

    #[test]
    fn edge_event_missing_target_name_is_rejected() {
        let raw = json!({"source": {"name": "A"}, "target": {"step": 1}});
        assert!(Event::from_json("cross", 0, raw).is_err());
    }

    #[test]
    fn timeline_values_are_kept_verbatim() {
        let entry: TimelineEntry = serde_json::from_value(json!({
            "name": "A",
            "data": [1, {"step": 2, "community": 5}, "x", {"step": 3}],
        }))
        .unwrap();
        assert_eq!(entry.data.len(), 4);
        assert_eq!(entry.data[0], json!(1));
        let points: Vec<TimelinePoint> = entry.points().collect();
        assert_eq!(points, vec![TimelinePoint { step: 2, community: 5 }]);
    }

    #[test]
    fn step_index_lookup_misses_are_none() {
        let idx: StepIndex = serde_json::from_value(json!({
            "1": {"time": 100, "communities": {"1": {"data": {"topic": "rust"}, "users": [1, 2]}}},
            "2": {"time": 200, "communities": {}},
        }))
        .unwrap();

        assert_eq!(idx.community(1, 1).and_then(Community::topic).as_deref(), Some("rust"));
        assert!(idx.community(1, 2).is_none());
        assert!(idx.community(9, 1).is_none());
        assert_eq!(idx.time_span(), Some((100, 200)));
    }
}
