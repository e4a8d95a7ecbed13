use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Amenities an area may offer, stored as boolean keys of the `servicios` column
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum Service {
    #[strum(to_string = "water", serialize = "agua")]
    Water,
    #[strum(to_string = "electricity", serialize = "electricidad", serialize = "luz")]
    Electricity,
    #[strum(to_string = "grey_water_disposal", serialize = "vaciado_grises")]
    GreyWaterDisposal,
    #[strum(to_string = "black_water_disposal", serialize = "vaciado_negras")]
    BlackWaterDisposal,
    #[strum(to_string = "wifi")]
    Wifi,
    #[strum(to_string = "showers", serialize = "duchas")]
    Showers,
    #[strum(to_string = "toilets", serialize = "banos", serialize = "baños")]
    Toilets,
    #[strum(to_string = "laundry", serialize = "lavanderia", serialize = "lavandería")]
    Laundry,
}

impl Service {
    /// Key used for this service inside the `servicios` JSONB column
    pub fn column_key(&self) -> &'static str {
        match self {
            Service::Water => "agua",
            Service::Electricity => "electricidad",
            Service::GreyWaterDisposal => "vaciado_grises",
            Service::BlackWaterDisposal => "vaciado_negras",
            Service::Wifi => "wifi",
            Service::Showers => "duchas",
            Service::Toilets => "banos",
            Service::Laundry => "lavanderia",
        }
    }
}

/// A latitude/longitude box. Boxes crossing the antimeridian are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    pub fn validate(&self) -> Result<(), String> {
        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        let lng_ok = |v: f64| (-180.0..=180.0).contains(&v);
        if !lat_ok(self.north) || !lat_ok(self.south) {
            return Err("latitude must be between -90 and 90".to_string());
        }
        if !lng_ok(self.east) || !lng_ok(self.west) {
            return Err("longitude must be between -180 and 180".to_string());
        }
        if self.south > self.north {
            return Err("south must not be greater than north".to_string());
        }
        if self.west > self.east {
            return Err("west must not be greater than east".to_string());
        }
        Ok(())
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.south..=self.north).contains(&latitude) && (self.west..=self.east).contains(&longitude)
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.north + self.south) / 2.0, (self.east + self.west) / 2.0)
    }
}

/// Read projection of a row in the `areas` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaSummary {
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: String,
    pub area_type: Option<String>,
    pub services: Vec<Service>,
    pub price_per_night: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
}

impl AreaSummary {
    pub fn has_service(&self, service: Service) -> bool {
        self.services.contains(&service)
    }

    /// "City, Province" with whichever parts are present
    pub fn location(&self) -> Option<String> {
        let parts: Vec<&str> = [self.city.as_deref(), self.province.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}
