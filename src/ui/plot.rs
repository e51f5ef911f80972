use std::collections::BTreeMap;

use chrono::DateTime;
use eframe::egui::{Color32, Ui};
use egui_plot::{GridMark, Legend, Line, MarkerShape, Plot, PlotPoint, PlotPoints, Points};

use crate::color::ColorMap;
use crate::data::model::{Event, FilteredModel, StepIndex};
use crate::state::AppState;

/// Padding around the first and last step, in seconds.
const START_PADDING: i64 = 3_600;
const END_PADDING: i64 = 7_200;

/// Hover radius around a drop, in screen pixels.
const HOVER_RADIUS: f32 = 8.0;

const EVENT_SHAPES: [MarkerShape; 6] = [
    MarkerShape::Diamond,
    MarkerShape::Square,
    MarkerShape::Up,
    MarkerShape::Down,
    MarkerShape::Cross,
    MarkerShape::Asterisk,
];

// ---------------------------------------------------------------------------
// Tooltip content
// ---------------------------------------------------------------------------

/// What the hover tooltip shows for one drop.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTooltip {
    pub topic: String,
    pub time: String,
    pub users: usize,
}

impl DropTooltip {
    /// Look up `steps[step].communities[community]`; `None` on any miss.
    pub fn lookup(steps: &StepIndex, step: u32, community: u32) -> Option<Self> {
        let time = steps.time_of(step)?;
        let community = steps.community(step, community)?;
        Some(Self {
            topic: community.topic().unwrap_or_default(),
            time: format_time(time, "%c"),
            users: community.users.len(),
        })
    }
}

fn format_time(secs: i64, fmt: &str) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|t| t.format(fmt).to_string())
        .unwrap_or_else(|| secs.to_string())
}

// ---------------------------------------------------------------------------
// Event-drop chart (central panel)
// ---------------------------------------------------------------------------

/// A drawable drop: plot position plus the community it refers to.
struct DropMark {
    pos: [f64; 2],
    step: u32,
    community: u32,
}

fn row_y(row: usize) -> f64 {
    -(row as f64)
}

/// Render the event-drop chart in the central panel.
pub fn event_drop_chart(ui: &mut Ui, state: &AppState) {
    let Some(model) = &state.model else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Pick a dataset and press Load");
        });
        return;
    };

    let rows: BTreeMap<&str, usize> = model
        .timeline
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.name.as_str(), i))
        .collect();
    let names: Vec<String> = model.timeline.iter().map(|e| e.name.clone()).collect();

    let mut plot = Plot::new("event_drops")
        .legend(Legend::default())
        .x_axis_label("Time (UTC)")
        .x_axis_formatter(|mark: GridMark, _range: &_| format_time(mark.value as i64, "%Y-%m-%d %H:%M"))
        .y_axis_formatter(move |mark: GridMark, _range: &_| {
            let row = -mark.value;
            if row < 0.0 || row.fract() != 0.0 {
                return String::new();
            }
            names.get(row as usize).cloned().unwrap_or_default()
        })
        .y_axis_min_width(100.0)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true);

    if let Some((first, last)) = model.steps.time_span() {
        plot = plot
            .include_x((first - START_PADDING) as f64)
            .include_x((last + END_PADDING) as f64);
    }
    plot = plot.include_y(0.5).include_y(row_y(model.timeline.len()) + 0.5);

    let color_map = state.color_map.as_ref();

    let response = plot.show(ui, |plot_ui| {
        let mut drops = timeline_drops(model);

        for (color, points) in group_by_color(model, color_map, &drops).into_values() {
            plot_ui.points(Points::new(PlotPoints::from(points)).color(color).radius(4.0));
        }

        drops.extend(draw_events(plot_ui, model, &rows));

        let pointer = plot_ui.pointer_coordinate()?;
        let pointer = plot_ui.screen_from_plot(pointer);
        drops
            .iter()
            .map(|d| {
                let at = plot_ui.screen_from_plot(PlotPoint::new(d.pos[0], d.pos[1]));
                (at.distance(pointer), d)
            })
            .filter(|(dist, _)| *dist <= HOVER_RADIUS)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .and_then(|(_, d)| DropTooltip::lookup(&model.steps, d.step, d.community))
    });

    if let Some(tooltip) = response.inner {
        response.response.on_hover_ui_at_pointer(|ui: &mut Ui| {
            ui.strong(&tooltip.topic);
            ui.label(format!("Time (UTC): {}", tooltip.time));
            ui.label(format!("{} user(s)", tooltip.users));
        });
    }
}

fn timeline_drops(model: &FilteredModel) -> Vec<DropMark> {
    model
        .timeline
        .iter()
        .enumerate()
        .flat_map(|(row, entry)| {
            entry.points().filter_map(move |point| {
                let time = model.steps.time_of(point.step)?;
                Some(DropMark {
                    pos: [time as f64, row_y(row)],
                    step: point.step,
                    community: point.community,
                })
            })
        })
        .collect()
}

fn group_by_color(
    model: &FilteredModel,
    color_map: Option<&ColorMap>,
    drops: &[DropMark],
) -> BTreeMap<[u8; 4], (Color32, Vec<[f64; 2]>)> {
    let mut groups: BTreeMap<[u8; 4], (Color32, Vec<[f64; 2]>)> = BTreeMap::new();
    for drop in drops {
        let value = model.color_value(drop.step, drop.community);
        let color = color_map
            .map(|cm| cm.color_for(value.as_deref()))
            .unwrap_or(Color32::LIGHT_BLUE);
        groups
            .entry(color.to_array())
            .or_insert_with(|| (color, Vec::new()))
            .1
            .push(drop.pos);
    }
    groups
}

/// Draw annotated events on top of the drops. Returns hoverable point events.
fn draw_events(
    plot_ui: &mut egui_plot::PlotUi,
    model: &FilteredModel,
    rows: &BTreeMap<&str, usize>,
) -> Vec<DropMark> {
    let mut hoverable = Vec::new();
    let palette = crate::color::generate_palette(model.events.len());

    for (i, (kind, events)) in model.events.iter().enumerate() {
        let shape = EVENT_SHAPES[i % EVENT_SHAPES.len()];
        let color = palette.get(i).copied().unwrap_or(Color32::WHITE);
        let mut markers = Vec::new();

        for event in events {
            match event {
                Event::Point(p) => {
                    let (Some(&row), Some(step)) = (rows.get(p.name.as_str()), event.step()) else {
                        continue;
                    };
                    let Some(time) = model.steps.time_of(step) else {
                        continue;
                    };
                    let pos = [time as f64, row_y(row)];
                    markers.push(pos);
                    if let Some(community) = event.community() {
                        hoverable.push(DropMark { pos, step, community });
                    }
                }
                Event::Edge(e) => {
                    let endpoint = |name: &str, step: Option<u32>| {
                        let row = *rows.get(name)?;
                        let time = model.steps.time_of(step.or(e.step)?)?;
                        Some([time as f64, row_y(row)])
                    };
                    if let (Some(from), Some(to)) = (
                        endpoint(&e.source.name, e.source.step),
                        endpoint(&e.target.name, e.target.step),
                    ) {
                        plot_ui.line(
                            Line::new(PlotPoints::from(vec![from, to]))
                                .name(kind)
                                .color(color)
                                .width(1.5),
                        );
                    }
                }
            }
        }

        if !markers.is_empty() {
            plot_ui.points(
                Points::new(PlotPoints::from(markers))
                    .name(kind)
                    .shape(shape)
                    .color(color)
                    .radius(6.0)
                    .filled(false),
            );
        }
    }
    hoverable
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_come_only_from_step_community_values() {
        let model = FilteredModel {
            dataset: "d".into(),
            timeline: serde_json::from_value(json!([
                {"name": "A", "data": [1, {"step": 1, "community": 2}, {"step": 9, "community": 1}]},
                {"name": "B", "data": [2, 3]},
            ]))
            .unwrap(),
            events: Default::default(),
            steps: serde_json::from_value(json!({"1": {"time": 60, "communities": {}}})).unwrap(),
            default_color_key: "k".into(),
        };

        let drops = timeline_drops(&model);
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0].pos, [60.0, 0.0]);
        assert_eq!((drops[0].step, drops[0].community), (1, 2));
    }

    #[test]
    fn tooltip_reads_topic_time_and_user_count() {
        let steps: StepIndex = serde_json::from_value(json!({
            "1": {"time": 0, "communities": {"2": {"data": {"topic": "#rust"}, "users": ["a", "b", "c"]}}},
        }))
        .unwrap();

        let tip = DropTooltip::lookup(&steps, 1, 2).unwrap();
        assert_eq!(tip.topic, "#rust");
        assert_eq!(tip.users, 3);
        assert!(tip.time.contains("1970"));

        assert!(DropTooltip::lookup(&steps, 1, 3).is_none());
        assert!(DropTooltip::lookup(&steps, 2, 2).is_none());
    }
}
