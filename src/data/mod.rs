/// Data layer: core types, fetching, and filtering.
///
/// Architecture:
/// ```text
///  D.timeline.json   D.events.json   D.steps.json
///        │                 │               │
///        ▼                 ▼               ▼
///   ┌─────────────────────────────────────────┐
///   │  fetch    Fetcher: directory or HTTP    │
///   └─────────────────────────────────────────┘
///        │                 │               │
///        ▼                 │               │
///   ┌──────────┐           │               │
///   │  filter   │ timeline │               │
///   │           │ ≥ min    │               │
///   │           │ steps ───┼──▶ names      │
///   └──────────┘           ▼               ▼
///        │          ┌────────────┐   ┌──────────┐
///        │          │  filter    │   │  steps   │  StepIndex (never filtered)
///        │          │  events    │   └──────────┘
///        │          └────────────┘         │
///        ▼                 ▼               ▼
///   ┌─────────────────────────────────────────┐
///   │  model    FilteredModel                 │
///   └─────────────────────────────────────────┘
/// ```

pub mod fetch;
pub mod filter;
pub mod model;
pub mod steps;
