use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

use super::{services_from_json, AreaOrder, AreaQuery, AreaStore, StoreError};
use crate::models::area::AreaSummary;

const SELECT_COLUMNS: &str = "SELECT id::text AS id, nombre, ciudad, provincia, pais, tipo_area, servicios, \
     precio_noche::float8 AS precio_noche, latitud::float8 AS latitud, \
     longitud::float8 AS longitud, descripcion \
     FROM areas WHERE estado = 'activo'";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresAreaStoreConfig {
    /// libpq style connection string or `postgres://` URL
    pub url: String,
    pub connect_timeout: Duration,
}

impl PostgresAreaStoreConfig {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Opens a short-lived connection per lookup; nothing is pooled or cached between requests.
#[derive(Debug, Clone)]
pub struct PostgresAreaStore {
    config: PostgresAreaStoreConfig,
}

impl PostgresAreaStore {
    pub fn new(config: PostgresAreaStoreConfig) -> Result<Self, StoreError> {
        if config.url.trim().is_empty() {
            return Err(StoreError::Connection(
                "database url cannot be empty".to_string(),
            ));
        }
        Ok(Self { config })
    }

    async fn connect_client(&self) -> Result<tokio_postgres::Client, StoreError> {
        let connect = tokio_postgres::connect(&self.config.url, NoTls);
        let (client, connection) = tokio::time::timeout(self.config.connect_timeout, connect)
            .await
            .map_err(|_| StoreError::Connection("timed out".to_string()))?
            .map_err(|error| StoreError::Connection(error.to_string()))?;

        tokio::spawn(async move {
            if let Err(error) = connection.await {
                tracing::warn!("area database connection error: {error}");
            }
        });

        Ok(client)
    }
}

#[async_trait]
impl AreaStore for PostgresAreaStore {
    async fn find(&self, query: &AreaQuery) -> Result<Vec<AreaSummary>, StoreError> {
        let client = self.connect_client().await?;
        let sql = SqlQuery::build(query);
        let rows = client
            .query(sql.text.as_str(), &sql.params())
            .await
            .map_err(|error| StoreError::Query(error.to_string()))?;

        rows.iter().map(row_to_area).collect()
    }
}

/// Parameterized statement for an [`AreaQuery`]; user input only ever travels as `$n` parameters
pub struct SqlQuery {
    pub text: String,
    values: Vec<Box<dyn ToSql + Sync + Send>>,
}

impl SqlQuery {
    pub fn build(query: &AreaQuery) -> Self {
        let mut sql = SqlQuery {
            text: SELECT_COLUMNS.to_string(),
            values: Vec::new(),
        };

        if let Some(id) = &query.id {
            let p = sql.bind(id.clone());
            sql.text.push_str(&format!(" AND id::text = {p}"));
        }
        if let Some(name) = &query.name {
            let p = sql.bind(format!("%{}%", escape_like(name)));
            sql.text.push_str(&format!(" AND nombre ILIKE {p}"));
        }
        if let Some(text) = &query.text {
            let p = sql.bind(format!("%{}%", escape_like(text)));
            sql.text.push_str(&format!(
                " AND (nombre ILIKE {p} OR ciudad ILIKE {p} OR provincia ILIKE {p} OR descripcion ILIKE {p})"
            ));
        }
        for (column, value) in [
            ("pais", &query.country),
            ("provincia", &query.province),
            ("ciudad", &query.city),
        ] {
            if let Some(value) = value {
                let p = sql.bind(escape_like(value));
                sql.text.push_str(&format!(" AND {column} ILIKE {p}"));
            }
        }
        for service in &query.services {
            let p = sql.bind(service.column_key().to_string());
            sql.text
                .push_str(&format!(" AND COALESCE((servicios ->> {p})::boolean, false)"));
        }
        if let Some(max_price) = query.max_price {
            let p = sql.bind(max_price);
            sql.text
                .push_str(&format!(" AND COALESCE(precio_noche::float8, 0) <= {p}"));
        }
        if let Some(bounds) = &query.bounds {
            let south = sql.bind(bounds.south);
            let north = sql.bind(bounds.north);
            let west = sql.bind(bounds.west);
            let east = sql.bind(bounds.east);
            sql.text.push_str(&format!(
                " AND latitud::float8 BETWEEN {south} AND {north} AND longitud::float8 BETWEEN {west} AND {east}"
            ));
        }

        match query.order() {
            AreaOrder::Relevance(term) => {
                let exact = sql.bind(term.clone());
                let prefix = sql.bind(format!("{}%", escape_like(&term)));
                sql.text.push_str(&format!(
                    " ORDER BY CASE WHEN lower(nombre) = lower({exact}) THEN 0 WHEN nombre ILIKE {prefix} THEN 1 ELSE 2 END, nombre"
                ));
            }
            AreaOrder::Distance {
                latitude,
                longitude,
            } => {
                let lat = sql.bind(latitude);
                let lng = sql.bind(longitude);
                sql.text.push_str(&format!(
                    " ORDER BY power(latitud::float8 - {lat}, 2) + power((longitud::float8 - {lng}) * cos(radians({lat})), 2) NULLS LAST, nombre"
                ));
            }
            AreaOrder::Name => sql.text.push_str(" ORDER BY nombre"),
        }

        let limit = sql.bind(query.limit as i64);
        sql.text.push_str(&format!(" LIMIT {limit}"));
        sql
    }

    fn bind<T: ToSql + Sync + Send + 'static>(&mut self, value: T) -> String {
        self.values.push(Box::new(value));
        format!("${}", self.values.len())
    }

    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values
            .iter()
            .map(|value| value.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }
}

/// Escape LIKE metacharacters so user text only matches literally
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn row_to_area(row: &Row) -> Result<AreaSummary, StoreError> {
    let invalid = |error: tokio_postgres::Error| StoreError::InvalidRow(error.to_string());
    let services: Option<Value> = row.try_get("servicios").map_err(invalid)?;

    Ok(AreaSummary {
        id: row.try_get("id").map_err(invalid)?,
        name: row.try_get("nombre").map_err(invalid)?,
        city: row.try_get("ciudad").map_err(invalid)?,
        province: row.try_get("provincia").map_err(invalid)?,
        country: row
            .try_get::<_, Option<String>>("pais")
            .map_err(invalid)?
            .unwrap_or_default(),
        area_type: row.try_get("tipo_area").map_err(invalid)?,
        services: services.as_ref().map(services_from_json).unwrap_or_default(),
        price_per_night: row.try_get("precio_noche").map_err(invalid)?,
        latitude: row.try_get("latitud").map_err(invalid)?,
        longitude: row.try_get("longitud").map_err(invalid)?,
        description: row.try_get("descripcion").map_err(invalid)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::area::{Bounds, Service};

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("Portugal"), "Portugal");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_country_query_is_parameterized_and_limited() {
        let mut query = AreaQuery::new(10);
        query.country = Some("Portugal'; DROP TABLE areas; --".into());
        let sql = SqlQuery::build(&query);

        assert!(sql.text.contains("estado = 'activo'"));
        assert!(sql.text.contains("AND pais ILIKE $1"));
        assert!(sql.text.ends_with("ORDER BY nombre LIMIT $2"));
        assert!(!sql.text.contains("DROP TABLE"));
        assert_eq!(sql.params().len(), 2);
    }

    #[test]
    fn test_search_query_binds_every_filter() {
        let mut query = AreaQuery::new(5);
        query.text = Some("playa".into());
        query.city = Some("Comillas".into());
        query.services = vec![Service::Water, Service::Electricity];
        query.max_price = Some(15.0);
        query.bounds = Some(Bounds {
            north: 44.0,
            south: 43.0,
            east: -4.0,
            west: -5.0,
        });
        let sql = SqlQuery::build(&query);

        // text, city, 2 services, price, 4 bounds, exact + prefix ordering, limit
        assert_eq!(sql.params().len(), 12);
        assert!(sql
            .text
            .contains("(nombre ILIKE $1 OR ciudad ILIKE $1 OR provincia ILIKE $1 OR descripcion ILIKE $1)"));
        assert!(sql.text.contains("AND ciudad ILIKE $2"));
        assert!(sql.text.contains("(servicios ->> $3)::boolean"));
        assert!(sql.text.contains("(servicios ->> $4)::boolean"));
        assert!(sql.text.contains("<= $5"));
        assert!(sql.text.contains("BETWEEN $6 AND $7"));
        assert!(sql.text.contains("ORDER BY CASE WHEN lower(nombre) = lower($10)"));
        assert!(sql.text.ends_with("LIMIT $12"));
    }

    #[test]
    fn test_bounds_query_orders_by_distance() {
        let mut query = AreaQuery::new(3);
        query.bounds = Some(Bounds {
            north: 42.0,
            south: 40.0,
            east: -7.0,
            west: -9.0,
        });
        let sql = SqlQuery::build(&query);
        assert!(sql.text.contains("ORDER BY power(latitud::float8 - $5, 2)"));
        assert!(sql.text.contains("NULLS LAST, nombre LIMIT $7"));
    }

    #[test]
    fn test_details_query_by_id() {
        let mut query = AreaQuery::new(1);
        query.id = Some("8f14e45f-ceea-467f-a0e6-7b3b5c6b7d10".into());
        let sql = SqlQuery::build(&query);
        assert!(sql.text.contains("AND id::text = $1"));
        assert!(sql.text.ends_with("LIMIT $2"));
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let result = PostgresAreaStore::new(PostgresAreaStoreConfig::new("  "));
        assert!(matches!(result, Err(StoreError::Connection(_))));
    }
}
