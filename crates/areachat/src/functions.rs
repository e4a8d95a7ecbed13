//! The three lookups the model may call and the dispatcher that runs them
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::errors::{ChatError, ChatResult};
use crate::formatter::{format_results, FormatOptions, FormattedResults};
use crate::models::area::{AreaSummary, Bounds, Service};
use crate::models::tool::{Tool, ToolCall};
use crate::store::{AreaQuery, AreaStore};

/// Areas returned when the model does not ask for a specific amount
pub const DEFAULT_LIMIT: usize = 10;
/// Hard cap on areas returned by any single lookup
pub const MAX_RESULTS: usize = 20;
/// Name lookups in `getAreaDetails` return a few candidates so the model can disambiguate
const DETAILS_BY_NAME_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, AsRefStr)]
pub enum FunctionName {
    #[strum(serialize = "searchAreas")]
    SearchAreas,
    #[strum(serialize = "getAreaDetails")]
    GetAreaDetails,
    #[strum(serialize = "getAreasByCountry")]
    GetAreasByCountry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchLimits {
    pub default_limit: usize,
    pub max_results: usize,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_results: MAX_RESULTS,
        }
    }
}

impl DispatchLimits {
    fn clamp(&self, requested: Option<u64>) -> usize {
        let max = self.max_results.max(1);
        match requested {
            Some(n) => (n as usize).clamp(1, max),
            None => self.default_limit.clamp(1, max),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchAreasArgs {
    pub query: Option<String>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub services: Vec<Service>,
    pub max_price: Option<f64>,
    pub bounds: Option<Bounds>,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetAreaDetailsArgs {
    pub area_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetAreasByCountryArgs {
    pub country: String,
    pub limit: usize,
}

/// A validated function call, ready to run exactly once
#[derive(Debug, Clone, PartialEq)]
pub enum AreaFunction {
    SearchAreas(SearchAreasArgs),
    GetAreaDetails(GetAreaDetailsArgs),
    GetAreasByCountry(GetAreasByCountryArgs),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearchArgs {
    #[serde(default, alias = "text")]
    query: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    province: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    services: Option<OneOrMany>,
    #[serde(default)]
    max_price: Option<f64>,
    #[serde(default)]
    bounds: Option<Bounds>,
    #[serde(default)]
    limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetailsArgs {
    #[serde(default, alias = "id")]
    area_id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCountryArgs {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Blank strings count as absent
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Models sometimes send `5.0` for an integer field
fn whole_limit(name: FunctionName, limit: Option<f64>) -> ChatResult<Option<u64>> {
    match limit {
        None => Ok(None),
        Some(n) if n.is_finite() && n.fract() == 0.0 && n >= 0.0 => Ok(Some(n as u64)),
        Some(n) => Err(ChatError::invalid_arguments(
            name.as_ref(),
            format!("`limit` must be a whole number, got {n}"),
        )),
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(name: FunctionName, arguments: &Value) -> ChatResult<T> {
    let arguments = match arguments {
        Value::Null => json!({}),
        Value::Object(_) => arguments.clone(),
        _ => {
            return Err(ChatError::invalid_arguments(
                name.as_ref(),
                "arguments must be a JSON object",
            ))
        }
    };
    serde_json::from_value(arguments)
        .map_err(|e| ChatError::invalid_arguments(name.as_ref(), e.to_string()))
}

impl AreaFunction {
    /// Validate a model tool call against the supported functions and their arguments
    pub fn from_call(call: &ToolCall, limits: &DispatchLimits) -> ChatResult<Self> {
        let name = FunctionName::from_str(&call.name)
            .map_err(|_| ChatError::UnknownFunction(call.name.clone()))?;

        match name {
            FunctionName::SearchAreas => {
                let raw: RawSearchArgs = parse_args(name, &call.arguments)?;
                let services = match raw.services {
                    None => Vec::new(),
                    Some(OneOrMany::One(s)) => vec![s],
                    Some(OneOrMany::Many(list)) => list,
                }
                .iter()
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    Service::from_str(s.trim()).map_err(|_| {
                        ChatError::invalid_arguments(name.as_ref(), format!("unknown service `{s}`"))
                    })
                })
                .collect::<ChatResult<Vec<_>>>()?;

                if let Some(price) = raw.max_price {
                    if !price.is_finite() || price < 0.0 {
                        return Err(ChatError::invalid_arguments(
                            name.as_ref(),
                            "`maxPrice` must be a non-negative number",
                        ));
                    }
                }
                if let Some(bounds) = &raw.bounds {
                    bounds
                        .validate()
                        .map_err(|reason| ChatError::invalid_arguments(name.as_ref(), reason))?;
                }

                let args = SearchAreasArgs {
                    query: present(raw.query),
                    country: present(raw.country),
                    province: present(raw.province),
                    city: present(raw.city),
                    services,
                    max_price: raw.max_price,
                    bounds: raw.bounds,
                    limit: limits.clamp(whole_limit(name, raw.limit)?),
                };

                let has_criterion = args.query.is_some()
                    || args.country.is_some()
                    || args.province.is_some()
                    || args.city.is_some()
                    || !args.services.is_empty()
                    || args.max_price.is_some()
                    || args.bounds.is_some();
                if !has_criterion {
                    return Err(ChatError::invalid_arguments(
                        name.as_ref(),
                        "at least one search criterion is required",
                    ));
                }
                Ok(AreaFunction::SearchAreas(args))
            }
            FunctionName::GetAreaDetails => {
                let raw: RawDetailsArgs = parse_args(name, &call.arguments)?;
                // Models sometimes send numeric ids
                let area_id = match raw.area_id {
                    Some(Value::String(s)) => present(Some(s)),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    Some(Value::Null) | None => None,
                    Some(_) => {
                        return Err(ChatError::invalid_arguments(
                            name.as_ref(),
                            "`areaId` must be a string",
                        ))
                    }
                };
                let args = GetAreaDetailsArgs {
                    area_id,
                    name: present(raw.name),
                };
                if args.area_id.is_none() && args.name.is_none() {
                    return Err(ChatError::invalid_arguments(
                        name.as_ref(),
                        "`areaId` or `name` is required",
                    ));
                }
                Ok(AreaFunction::GetAreaDetails(args))
            }
            FunctionName::GetAreasByCountry => {
                let raw: RawCountryArgs = parse_args(name, &call.arguments)?;
                let country = present(raw.country).ok_or_else(|| {
                    ChatError::invalid_arguments(name.as_ref(), "`country` is required")
                })?;
                Ok(AreaFunction::GetAreasByCountry(GetAreasByCountryArgs {
                    country,
                    limit: limits.clamp(whole_limit(name, raw.limit)?),
                }))
            }
        }
    }

    pub fn name(&self) -> FunctionName {
        match self {
            AreaFunction::SearchAreas(_) => FunctionName::SearchAreas,
            AreaFunction::GetAreaDetails(_) => FunctionName::GetAreaDetails,
            AreaFunction::GetAreasByCountry(_) => FunctionName::GetAreasByCountry,
        }
    }

    pub fn to_query(&self, limits: &DispatchLimits) -> AreaQuery {
        match self {
            AreaFunction::SearchAreas(args) => {
                let mut query = AreaQuery::new(args.limit);
                query.text = args.query.clone();
                query.country = args.country.clone();
                query.province = args.province.clone();
                query.city = args.city.clone();
                query.services = args.services.clone();
                query.max_price = args.max_price;
                query.bounds = args.bounds;
                query
            }
            AreaFunction::GetAreaDetails(args) => {
                let limit = if args.area_id.is_some() {
                    1
                } else {
                    DETAILS_BY_NAME_LIMIT.min(limits.max_results.max(1))
                };
                let mut query = AreaQuery::new(limit);
                // The name is only a fallback; a known id wins even if the name is phrased loosely
                match &args.area_id {
                    Some(id) => query.id = Some(id.clone()),
                    None => query.name = args.name.clone(),
                }
                query
            }
            AreaFunction::GetAreasByCountry(args) => {
                let mut query = AreaQuery::new(args.limit);
                query.country = Some(args.country.clone());
                query
            }
        }
    }
}

/// Declarations sent to the model on the first pass
pub fn declarations() -> Vec<Tool> {
    let services: Vec<String> = {
        use strum::IntoEnumIterator;
        Service::iter().map(|s| s.to_string()).collect()
    };

    vec![
        Tool::new(
            FunctionName::SearchAreas.as_ref(),
            "Search motorhome rest areas by free text, location, services, price or a map box. \
             Country names are stored in Spanish, e.g. 'España', 'Francia', 'Portugal'.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Text matched against name, city, province and description"},
                    "country": {"type": "string", "description": "Country name in Spanish"},
                    "province": {"type": "string"},
                    "city": {"type": "string"},
                    "services": {
                        "type": "array",
                        "items": {"type": "string", "enum": services},
                        "description": "Services the area must offer"
                    },
                    "maxPrice": {"type": "number", "description": "Maximum price per night in euros, 0 for free areas"},
                    "bounds": {
                        "type": "object",
                        "properties": {
                            "north": {"type": "number"},
                            "south": {"type": "number"},
                            "east": {"type": "number"},
                            "west": {"type": "number"}
                        },
                        "required": ["north", "south", "east", "west"]
                    },
                    "limit": {"type": "integer", "minimum": 1, "maximum": MAX_RESULTS}
                }
            }),
        ),
        Tool::new(
            FunctionName::GetAreaDetails.as_ref(),
            "Get the full details of one area by its id, or by name when the id is unknown.",
            json!({
                "type": "object",
                "properties": {
                    "areaId": {"type": "string", "description": "Id returned by a previous lookup"},
                    "name": {"type": "string", "description": "Area name or part of it"}
                }
            }),
        ),
        Tool::new(
            FunctionName::GetAreasByCountry.as_ref(),
            "List rest areas in a country.",
            json!({
                "type": "object",
                "properties": {
                    "country": {"type": "string", "description": "Country name in Spanish, e.g. 'Portugal'"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": MAX_RESULTS}
                },
                "required": ["country"]
            }),
        ),
    ]
}

/// Maps validated function calls onto area store lookups
pub struct Dispatcher {
    store: Arc<dyn AreaStore>,
    limits: DispatchLimits,
    description_chars: usize,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn AreaStore>, limits: DispatchLimits, description_chars: usize) -> Self {
        Self {
            store,
            limits,
            description_chars,
        }
    }

    pub fn parse(&self, call: &ToolCall) -> ChatResult<AreaFunction> {
        AreaFunction::from_call(call, &self.limits)
    }

    pub async fn dispatch(&self, function: &AreaFunction) -> ChatResult<Vec<AreaSummary>> {
        let query = function.to_query(&self.limits);
        let mut areas = self.store.find(&query).await?;
        areas.truncate(query.limit.min(self.limits.max_results.max(1)));
        tracing::info!(function = %function.name(), rows = areas.len(), "area lookup finished");
        Ok(areas)
    }

    /// Validate, run and format one call
    pub async fn run(&self, call: &ToolCall) -> ChatResult<FormattedResults> {
        let function = self.parse(call)?;
        let areas = self.dispatch(&function).await?;
        let options = FormatOptions {
            description_chars: self.description_chars,
            include_coordinates: matches!(function, AreaFunction::GetAreaDetails(_)),
        };
        Ok(format_results(function.name().as_ref(), &areas, options))
    }
}
