use crate::color::ColorMap;
use crate::config::Config;
use crate::data::model::FilteredModel;
use crate::pipeline::{LoadEvent, LoadRequest, Stage};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Dataset ids offered in the selector.
    pub datasets: Vec<String>,

    /// Currently selected dataset id.
    pub selected: Option<String>,

    /// Raw contents of the minimum-steps input box.
    pub min_steps_input: String,

    /// Model of the last successful load (None until one completes).
    pub model: Option<FilteredModel>,

    /// Colours for the model's default colour key.
    pub color_map: Option<ColorMap>,

    /// Human-readable status line.
    pub status: String,

    /// Whether the status line reports an error.
    pub status_is_error: bool,

    /// Stage of the current load.
    pub stage: Stage,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            datasets: config.datasets.clone(),
            selected: config.selected.clone(),
            min_steps_input: config.min_steps.clone(),
            model: None,
            color_map: None,
            status: "initialising".to_string(),
            status_is_error: false,
            stage: Stage::Idle,
        }
    }

    /// Validate the control inputs into a load request. On failure the
    /// problem is shown in the status line and nothing is returned.
    pub fn load_request(&mut self) -> Option<LoadRequest> {
        let dataset = self.selected.clone().unwrap_or_default();
        match LoadRequest::parse(&dataset, &self.min_steps_input, &self.datasets) {
            Ok(request) => Some(request),
            Err(e) => {
                log::warn!("Rejected load request: {e}");
                self.set_error(e.to_string());
                None
            }
        }
    }

    /// Fold one pipeline update into the state.
    pub fn apply(&mut self, event: LoadEvent) {
        match event {
            LoadEvent::Stage { stage, status } => {
                self.stage = stage;
                self.status = status;
                self.status_is_error = false;
            }
            LoadEvent::Ready(model) => self.set_model(*model),
            LoadEvent::Failed(e) => {
                self.stage = Stage::Failed;
                self.set_error(e.to_string());
            }
        }
    }

    /// Replace the displayed model wholesale.
    pub fn set_model(&mut self, model: FilteredModel) {
        self.color_map = Some(ColorMap::for_model(&model));
        self.model = Some(model);
        self.stage = Stage::Ready;
        self.status = Stage::Ready.activity().to_string();
        self.status_is_error = false;
    }

    pub fn set_error(&mut self, message: String) {
        self.status = message;
        self.status_is_error = true;
    }

    pub fn is_loading(&self) -> bool {
        self.stage.is_loading()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataSource;
    use crate::data::model::StepIndex;
    use crate::error::{FetchError, LoadError};

    fn state() -> AppState {
        AppState::new(&Config {
            source: DataSource::Dir("data".into()),
            datasets: vec!["a".into()],
            selected: Some("a".into()),
            min_steps: "1".into(),
            autoload: false,
        })
    }

    fn model() -> FilteredModel {
        FilteredModel {
            dataset: "a".into(),
            timeline: Vec::new(),
            events: Default::default(),
            steps: StepIndex::default(),
            default_color_key: "k".into(),
        }
    }

    #[test]
    fn invalid_min_steps_is_reported_not_loaded() {
        let mut state = state();
        state.min_steps_input = "lots".into();
        assert!(state.load_request().is_none());
        assert!(state.status_is_error);
        assert!(state.status.contains("lots"));
    }

    #[test]
    fn failure_keeps_previous_model_untouched() {
        let mut state = state();
        state.apply(LoadEvent::Ready(Box::new(model())));
        assert_eq!(state.status, "ready");

        state.apply(LoadEvent::Stage {
            stage: Stage::LoadingEvents,
            status: "loading events data".into(),
        });
        assert!(state.is_loading());

        let io = std::io::Error::from(std::io::ErrorKind::NotFound);
        state.apply(LoadEvent::Failed(LoadError::new(
            Stage::LoadingEvents,
            FetchError::Io { path: "a.events.json".into(), source: io },
        )));
        assert_eq!(state.stage, Stage::Failed);
        assert!(state.status.starts_with("failed while loading events data"));
        assert!(state.model.is_some());
    }
}
