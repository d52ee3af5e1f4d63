use serde::Serialize;

use crate::{
    color::{Color, ColorAssigner},
    visit::DATE_FORMAT,
    Visit,
};

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Properties,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Properties {
    pub date: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_color: Option<Color>,
}

/// Cuts a coordinate down to 4 decimal places, toward zero.
pub fn truncate(x: f64) -> f64 {
    (x * 10000.0).trunc() / 10000.0
}

impl Feature {
    /// Without `colors` only the date and name are written.
    pub fn new(visit: &Visit, colors: Option<&mut ColorAssigner>) -> Self {
        let (marker_symbol, marker_color) = match colors {
            Some(colors) => (
                Some(visit.purpose.clone()).filter(|x| !x.is_empty()),
                Some(colors.color_for(visit.when)),
            ),
            None => (None, None),
        };

        Feature {
            geometry: Geometry::Point {
                coordinates: [truncate(visit.lng()), truncate(visit.lat())],
            },
            properties: Properties {
                date: visit.when.format(DATE_FORMAT).to_string(),
                name: visit.address.clone(),
                marker_symbol,
                marker_color,
            },
        }
    }
}

impl FeatureCollection {
    pub fn new<'a>(
        visits: impl IntoIterator<Item = &'a Visit>,
        mut colors: Option<&mut ColorAssigner>,
    ) -> Self {
        FeatureCollection {
            features: visits
                .into_iter()
                .map(|x| Feature::new(x, colors.as_deref_mut()))
                .collect(),
        }
    }
}
