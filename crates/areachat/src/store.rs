//! Read-only access to the `areas` table
//!
//! Every lookup goes through an [`AreaQuery`], which always carries a limit so no
//! backend ever performs an unbounded scan.
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;
use std::str::FromStr;
use strum::IntoEnumIterator;
use thiserror::Error;

use crate::models::area::{AreaSummary, Bounds, Service};

pub use memory::MemoryAreaStore;
pub use postgres::{PostgresAreaStore, PostgresAreaStoreConfig};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to connect to the area database: {0}")]
    Connection(String),

    #[error("area query failed: {0}")]
    Query(String),

    #[error("unexpected area row: {0}")]
    InvalidRow(String),
}

/// How matching rows are ordered before the limit applies
#[derive(Debug, Clone, PartialEq)]
pub enum AreaOrder {
    /// Exact name matches first, then names starting with the term, then alphabetical
    Relevance(String),
    /// Closest to a point first
    Distance { latitude: f64, longitude: f64 },
    Name,
}

/// Filters for a bounded lookup. Text filters match case-insensitively.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaQuery {
    pub id: Option<String>,
    /// Substring of the area name
    pub name: Option<String>,
    /// Substring of name, city, province or description
    pub text: Option<String>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub services: Vec<Service>,
    pub max_price: Option<f64>,
    pub bounds: Option<Bounds>,
    pub limit: usize,
}

impl AreaQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            id: None,
            name: None,
            text: None,
            country: None,
            province: None,
            city: None,
            services: Vec::new(),
            max_price: None,
            bounds: None,
            limit,
        }
    }

    pub fn order(&self) -> AreaOrder {
        if let Some(term) = self.text.as_ref().or(self.name.as_ref()) {
            AreaOrder::Relevance(term.clone())
        } else if let Some(bounds) = &self.bounds {
            let (latitude, longitude) = bounds.center();
            AreaOrder::Distance {
                latitude,
                longitude,
            }
        } else {
            AreaOrder::Name
        }
    }
}

#[async_trait]
pub trait AreaStore: Send + Sync {
    /// Active areas matching `query`, ordered by [`AreaQuery::order`], at most `query.limit` rows
    async fn find(&self, query: &AreaQuery) -> Result<Vec<AreaSummary>, StoreError>;
}

/// Decode the `servicios` column, either an object of boolean flags or a list of names
pub fn services_from_json(value: &Value) -> Vec<Service> {
    match value {
        Value::Object(map) => Service::iter()
            .filter(|service| {
                map.get(service.column_key())
                    .map(|flag| flag.as_bool().unwrap_or(false))
                    .unwrap_or(false)
            })
            .collect(),
        Value::Array(items) => {
            let mut services = Vec::new();
            for service in items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|name| Service::from_str(name).ok())
            {
                if !services.contains(&service) {
                    services.push(service);
                }
            }
            services
        }
        _ => Vec::new(),
    }
}

/// Squared equirectangular distance, good enough for ordering nearby points
pub(crate) fn distance_key(latitude: f64, longitude: f64, from_lat: f64, from_lng: f64) -> f64 {
    let dx = (longitude - from_lng) * from_lat.to_radians().cos();
    let dy = latitude - from_lat;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_services_from_object() {
        let services = services_from_json(&json!({
            "agua": true,
            "electricidad": false,
            "wifi": true,
            "piscina": true
        }));
        assert_eq!(services, vec![Service::Water, Service::Wifi]);
    }

    #[test]
    fn test_services_from_array() {
        let services = services_from_json(&json!(["agua", "duchas", "desconocido"]));
        assert_eq!(services, vec![Service::Water, Service::Showers]);
        assert!(services_from_json(&Value::Null).is_empty());
    }

    #[test]
    fn test_query_order() {
        let mut query = AreaQuery::new(5);
        assert_eq!(query.order(), AreaOrder::Name);

        query.bounds = Some(Bounds {
            north: 42.0,
            south: 40.0,
            east: -7.0,
            west: -9.0,
        });
        assert_eq!(
            query.order(),
            AreaOrder::Distance {
                latitude: 41.0,
                longitude: -8.0
            }
        );

        query.text = Some("playa".into());
        assert_eq!(query.order(), AreaOrder::Relevance("playa".into()));
    }

    #[test]
    fn test_distance_key_orders_by_proximity() {
        let near = distance_key(41.1, -8.6, 41.15, -8.61);
        let far = distance_key(38.7, -9.1, 41.15, -8.61);
        assert!(near < far);
    }
}
