use async_trait::async_trait;
use std::cmp::Ordering;

use super::{distance_key, AreaOrder, AreaQuery, AreaStore, StoreError};
use crate::models::area::AreaSummary;

/// Areas held in memory, filtered with the same rules as [`super::PostgresAreaStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryAreaStore {
    areas: Vec<AreaSummary>,
}

impl MemoryAreaStore {
    pub fn new(areas: Vec<AreaSummary>) -> Self {
        Self { areas }
    }

    fn matches(area: &AreaSummary, query: &AreaQuery) -> bool {
        let same = |field: Option<&str>, wanted: &Option<String>| match wanted {
            Some(wanted) => field.is_some_and(|f| f.to_lowercase() == wanted.to_lowercase()),
            None => true,
        };
        let contains = |field: Option<&str>, needle: &str| {
            field.is_some_and(|f| f.to_lowercase().contains(&needle.to_lowercase()))
        };

        if let Some(id) = &query.id {
            if &area.id != id {
                return false;
            }
        }
        if let Some(name) = &query.name {
            if !contains(Some(&area.name), name) {
                return false;
            }
        }
        if let Some(text) = &query.text {
            let hit = contains(Some(&area.name), text)
                || contains(area.city.as_deref(), text)
                || contains(area.province.as_deref(), text)
                || contains(area.description.as_deref(), text);
            if !hit {
                return false;
            }
        }
        if !same(Some(&area.country), &query.country)
            || !same(area.province.as_deref(), &query.province)
            || !same(area.city.as_deref(), &query.city)
        {
            return false;
        }
        if !query.services.iter().all(|s| area.has_service(*s)) {
            return false;
        }
        if let Some(max_price) = query.max_price {
            // No listed price means free
            if area.price_per_night.unwrap_or(0.0) > max_price {
                return false;
            }
        }
        if let Some(bounds) = &query.bounds {
            match (area.latitude, area.longitude) {
                (Some(lat), Some(lng)) if bounds.contains(lat, lng) => {}
                _ => return false,
            }
        }
        true
    }

    fn compare(a: &AreaSummary, b: &AreaSummary, order: &AreaOrder) -> Ordering {
        let by_name = a.name.to_lowercase().cmp(&b.name.to_lowercase());
        match order {
            AreaOrder::Name => by_name,
            AreaOrder::Relevance(term) => {
                let term = term.to_lowercase();
                let rank = |area: &AreaSummary| {
                    let name = area.name.to_lowercase();
                    if name == term {
                        0
                    } else if name.starts_with(&term) {
                        1
                    } else {
                        2
                    }
                };
                rank(a).cmp(&rank(b)).then(by_name)
            }
            AreaOrder::Distance {
                latitude,
                longitude,
            } => {
                let key = |area: &AreaSummary| match (area.latitude, area.longitude) {
                    (Some(lat), Some(lng)) => distance_key(lat, lng, *latitude, *longitude),
                    _ => f64::INFINITY,
                };
                key(a).total_cmp(&key(b)).then(by_name)
            }
        }
    }
}

#[async_trait]
impl AreaStore for MemoryAreaStore {
    async fn find(&self, query: &AreaQuery) -> Result<Vec<AreaSummary>, StoreError> {
        let order = query.order();
        let mut found: Vec<AreaSummary> = self
            .areas
            .iter()
            .filter(|area| Self::matches(area, query))
            .cloned()
            .collect();
        found.sort_by(|a, b| Self::compare(a, b, &order));
        found.truncate(query.limit);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::area::{Bounds, Service};

    fn area(id: &str, name: &str, city: &str, country: &str, lat: f64, lng: f64) -> AreaSummary {
        AreaSummary {
            id: id.to_string(),
            name: name.to_string(),
            city: Some(city.to_string()),
            province: None,
            country: country.to_string(),
            area_type: Some("publica".to_string()),
            services: vec![Service::Water],
            price_per_night: None,
            latitude: Some(lat),
            longitude: Some(lng),
            description: None,
        }
    }

    fn store() -> MemoryAreaStore {
        let mut nazare = area("3", "Nazaré Parque", "Nazaré", "Portugal", 39.6, -9.07);
        nazare.price_per_night = Some(12.0);
        nazare.services.push(Service::Electricity);
        MemoryAreaStore::new(vec![
            area("1", "Área de Óbidos", "Óbidos", "Portugal", 39.36, -9.15),
            area("2", "Porto Camper", "Porto", "Portugal", 41.15, -8.61),
            nazare,
            area("4", "Área Playa de Oyambre", "Comillas", "España", 43.39, -4.33),
        ])
    }

    #[test]
    fn test_country_filter_is_case_insensitive() {
        let mut query = AreaQuery::new(10);
        query.country = Some("portugal".into());
        let found = tokio_test::block_on(store().find(&query)).unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|a| a.country == "Portugal"));
    }

    #[tokio::test]
    async fn test_limit_caps_results() {
        let mut query = AreaQuery::new(2);
        query.country = Some("Portugal".into());
        let found = store().find(&query).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Nazaré Parque");
    }

    #[tokio::test]
    async fn test_text_relevance_ordering() {
        let mut query = AreaQuery::new(10);
        query.text = Some("porto".into());
        let found = store().find(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "2");

        let mut query = AreaQuery::new(10);
        query.text = Some("área".into());
        let found = store().find(&query).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[tokio::test]
    async fn test_services_and_price() {
        let mut query = AreaQuery::new(10);
        query.services = vec![Service::Electricity];
        let found = store().find(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "3");

        let mut query = AreaQuery::new(10);
        query.max_price = Some(10.0);
        query.country = Some("Portugal".into());
        let found = store().find(&query).await.unwrap();
        assert!(found.iter().all(|a| a.id != "3"));
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_bounds_orders_by_distance() {
        let mut query = AreaQuery::new(10);
        query.bounds = Some(Bounds {
            north: 41.5,
            south: 39.0,
            east: -8.0,
            west: -9.5,
        });
        let found = store().find(&query).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|a| a.id.as_str()).collect();
        // centre is (40.25, -8.75)
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[tokio::test]
    async fn test_no_match_is_empty() {
        let mut query = AreaQuery::new(10);
        query.country = Some("Noruega".into());
        assert!(store().find(&query).await.unwrap().is_empty());
    }
}
