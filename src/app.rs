use eframe::egui;

use crate::config::Config;
use crate::pipeline::Session;
use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct CommunityDropsApp {
    pub state: AppState,
    pub session: Session,
}

impl CommunityDropsApp {
    pub fn new(ctx: &egui::Context, config: &Config, mut session: Session) -> Self {
        let repaint = ctx.clone();
        session.set_notifier(move || repaint.request_repaint());

        let mut state = AppState::new(config);
        if config.autoload {
            if let Some(request) = state.load_request() {
                session.load(request);
            }
        } else {
            state.status = "ready".to_string();
        }

        Self { state, session }
    }
}

impl eframe::App for CommunityDropsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        for event in self.session.poll() {
            self.state.apply(event);
        }

        // ---- Top panel: load controls ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state, &mut self.session);
        });

        // ---- Left side panel: legend ----
        egui::SidePanel::left("legend_panel")
            .default_width(220.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &self.state);
            });

        // ---- Central panel: event drops ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::event_drop_chart(ui, &self.state);
        });
    }
}
