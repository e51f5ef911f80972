use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::{attribute_text, FilteredModel};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: community attribute value → Color32
// ---------------------------------------------------------------------------

/// Maps the values of the default colour key to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub key: String,
    mapping: BTreeMap<String, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Collect every value the colour key takes across all step communities.
    pub fn for_model(model: &FilteredModel) -> Self {
        let key = &model.default_color_key;
        let values: BTreeSet<String> = model
            .steps
            .steps
            .values()
            .flat_map(|step| step.communities.values())
            .filter_map(|community| community.data.get(key))
            .map(attribute_text)
            .collect();
        Self::new(key, &values)
    }

    pub fn new(key: &str, values: &BTreeSet<String>) -> Self {
        let palette = generate_palette(values.len());
        let mapping = values.iter().cloned().zip(palette).collect();

        ColorMap {
            key: key.to_string(),
            mapping,
            default_color: Color32::GRAY,
        }
    }

    pub fn color_for(&self, value: Option<&str>) -> Color32 {
        value
            .and_then(|v| self.mapping.get(v))
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Return the legend entries (value label → colour) for the UI.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.mapping
            .iter()
            .map(|(v, c)| (v.clone(), *c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_values_get_distinct_colours() {
        let values: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let map = ColorMap::new("party", &values);
        assert_eq!(map.legend_entries().len(), 3);
        assert_ne!(map.color_for(Some("a")), map.color_for(Some("b")));
        assert_eq!(map.color_for(Some("zzz")), Color32::GRAY);
        assert_eq!(map.color_for(None), Color32::GRAY);
        let labels: Vec<String> = map.legend_entries().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
    }
}
