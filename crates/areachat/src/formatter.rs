//! Shapes area rows into the compact JSON the model reads on its second pass
use serde::{Deserialize, Serialize};

use crate::models::area::AreaSummary;

pub const DEFAULT_DESCRIPTION_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Descriptions longer than this many characters are cut and end in `…`
    pub description_chars: usize,
    pub include_coordinates: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            description_chars: DEFAULT_DESCRIPTION_CHARS,
            include_coordinates: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedArea {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub country: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub area_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    /// Price per night, `0` meaning free
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedResults {
    pub function: String,
    pub count: usize,
    pub areas: Vec<FormattedArea>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl FormattedResults {
    /// Serialized form placed in the tool response message
    pub fn to_tool_output(&self) -> String {
        // Serializing plain strings and numbers cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn format_results(
    function: &str,
    areas: &[AreaSummary],
    options: FormatOptions,
) -> FormattedResults {
    let formatted: Vec<FormattedArea> = areas
        .iter()
        .map(|area| format_area(area, options))
        .collect();

    let note = formatted
        .is_empty()
        .then(|| "No areas matched this lookup.".to_string());

    FormattedResults {
        function: function.to_string(),
        count: formatted.len(),
        areas: formatted,
        note,
    }
}

fn format_area(area: &AreaSummary, options: FormatOptions) -> FormattedArea {
    let (latitude, longitude) = if options.include_coordinates {
        (area.latitude, area.longitude)
    } else {
        (None, None)
    };

    FormattedArea {
        id: area.id.clone(),
        name: area.name.clone(),
        location: area.location(),
        country: area.country.clone(),
        area_type: area.area_type.clone(),
        services: area.services.iter().map(|s| s.to_string()).collect(),
        price: area.price_per_night,
        latitude,
        longitude,
        description: area
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| truncate(d, options.description_chars)),
    }
}

/// Cut `text` to at most `max_chars` characters, never splitting a character
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_index, _)) => {
            let mut cut = text[..byte_index].trim_end().to_string();
            cut.push('…');
            cut
        }
    }
}

/// Read a tool output back, as the model-facing side sees it
pub fn parse_tool_output(output: &str) -> Result<FormattedResults, serde_json::Error> {
    serde_json::from_str(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::area::Service;

    fn sample(id: &str, country: &str, description: Option<&str>) -> AreaSummary {
        AreaSummary {
            id: id.to_string(),
            name: format!("Área {id}"),
            city: Some("Peniche".to_string()),
            province: Some("Leiria".to_string()),
            country: country.to_string(),
            area_type: Some("privada".to_string()),
            services: vec![Service::Water, Service::GreyWaterDisposal],
            price_per_night: Some(8.5),
            latitude: Some(39.35),
            longitude: Some(-9.38),
            description: description.map(String::from),
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("corto", 10), "corto");
        assert_eq!(truncate("exacto", 6), "exacto");
        assert_eq!(truncate("áéíóú áéíóú", 6), "áéíóú…");
        assert_eq!(truncate("ñandú", 0), "…");
    }

    #[test]
    fn test_format_results_shape() {
        let long = "x".repeat(500);
        let results = format_results(
            "searchAreas",
            &[sample("a1", "Portugal", Some(&long))],
            FormatOptions::default(),
        );

        assert_eq!(results.count, 1);
        assert!(results.note.is_none());
        let area = &results.areas[0];
        assert_eq!(area.location.as_deref(), Some("Peniche, Leiria"));
        assert_eq!(area.services, vec!["water", "grey_water_disposal"]);
        assert_eq!(area.latitude, None);
        assert_eq!(
            area.description.as_ref().unwrap().chars().count(),
            DEFAULT_DESCRIPTION_CHARS + 1
        );
    }

    #[test]
    fn test_coordinates_only_when_requested() {
        let options = FormatOptions {
            include_coordinates: true,
            ..FormatOptions::default()
        };
        let results = format_results("getAreaDetails", &[sample("a1", "Portugal", None)], options);
        assert_eq!(results.areas[0].latitude, Some(39.35));
        assert_eq!(results.areas[0].description, None);
    }

    #[test]
    fn test_empty_results_carry_note() {
        let results = format_results("getAreasByCountry", &[], FormatOptions::default());
        assert_eq!(results.count, 0);
        assert!(results.areas.is_empty());
        assert!(results.note.is_some());
    }

    #[test]
    fn test_tool_output_preserves_ids_and_countries() {
        let areas = vec![
            sample("0b6c1f5e-2f43-4a9b-9f0e-1f2d3c4b5a69", "Portugal", Some("Junto al mar")),
            sample("42", "España", None),
            sample("fr-7", "Francia", Some("")),
        ];
        let output = format_results("searchAreas", &areas, FormatOptions::default()).to_tool_output();
        let parsed = parse_tool_output(&output).unwrap();

        assert_eq!(parsed.count, areas.len());
        for (original, reparsed) in areas.iter().zip(parsed.areas.iter()) {
            assert_eq!(reparsed.id, original.id);
            assert_eq!(reparsed.country, original.country);
        }
    }
}
