use std::sync::Arc;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::data::fetch::{discover_datasets, DirFetcher};
use crate::pipeline::Session;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – legend and dataset summary
// ---------------------------------------------------------------------------

/// Render the left legend panel.
pub fn side_panel(ui: &mut Ui, state: &AppState) {
    ui.heading("Legend");
    ui.separator();

    let Some(model) = &state.model else {
        ui.label("No dataset loaded.");
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.label(format!("Dataset: {}", model.dataset));
            ui.label(format!(
                "{} communities, {} steps",
                model.timeline.len(),
                model.steps.len()
            ));
            ui.separator();

            egui::CollapsingHeader::new(RichText::new("Events").strong())
                .default_open(true)
                .show(ui, |ui: &mut Ui| {
                    for (kind, events) in &model.events {
                        ui.label(format!("{kind}  ({})", events.len()));
                    }
                });

            if let Some(cm) = &state.color_map {
                egui::CollapsingHeader::new(RichText::new(format!("Color by {}", cm.key)).strong())
                    .default_open(true)
                    .show(ui, |ui: &mut Ui| {
                        for (label, color) in cm.legend_entries() {
                            ui.label(RichText::new(label).color(color));
                        }
                    });
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar – load controls and status
// ---------------------------------------------------------------------------

/// Render the top toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState, session: &mut Session) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open data folder…").clicked() {
                open_folder_dialog(state, session);
                ui.close_menu();
            }
        });

        ui.separator();

        let current = state.selected.clone().unwrap_or_default();
        egui::ComboBox::from_id_salt("dataset")
            .selected_text(&current)
            .show_ui(ui, |ui: &mut Ui| {
                for id in &state.datasets {
                    if ui.selectable_label(current == *id, id).clicked() {
                        state.selected = Some(id.clone());
                    }
                }
            });

        ui.label("Min steps");
        ui.add(egui::TextEdit::singleline(&mut state.min_steps_input).desired_width(40.0));

        if ui.button("Load").clicked() {
            if let Some(request) = state.load_request() {
                session.load(request);
            }
        }

        ui.separator();

        let color = if state.status_is_error {
            Color32::RED
        } else {
            ui.visuals().text_color()
        };
        ui.label(RichText::new(&state.status).color(color));
        if state.is_loading() {
            ui.spinner();
        }
    });
}

// ---------------------------------------------------------------------------
// Folder dialog
// ---------------------------------------------------------------------------

pub fn open_folder_dialog(state: &mut AppState, session: &mut Session) {
    let Some(dir) = rfd::FileDialog::new()
        .set_title("Open dataset folder")
        .pick_folder()
    else {
        return;
    };

    match discover_datasets(&dir) {
        Ok(datasets) => {
            log::info!("Found {} datasets in {}", datasets.len(), dir.display());
            session.set_fetcher(Arc::new(DirFetcher::new(&dir)));
            state.selected = datasets.first().cloned();
            state.datasets = datasets;
            state.stage = session.stage();
            state.status = format!("{} datasets in {}", state.datasets.len(), session.source());
            state.status_is_error = false;
        }
        Err(e) => {
            log::error!("Failed to list {}: {e}", dir.display());
            state.set_error(format!("Error: {e}"));
        }
    }
}
