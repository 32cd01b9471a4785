use serde::Deserialize;

use crate::error::FetchError;

// ---------------------------------------------------------------------------
// Thing properties: GET /Things/{thing_name}/Properties/
//
// ThingWorx returns an InfoTable; the current property values live in the
// first element of `rows`:
//
//   { "dataShape": { ... },
//     "rows": [ { "temperature": 22.5, "humidity": 40.0,
//                 "lastUpdated": 1545447665981, ... } ] }
//
// Only the three fields below are read; anything else is ignored.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PropertiesResponse {
    pub rows: Vec<PropertyRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRow {
    pub temperature: f64,
    pub humidity: f64,
    /// Unix timestamp in milliseconds.
    pub last_updated: i64,
}

/// Typed view of a thing's current properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ThingProperties {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    /// Unix timestamp in seconds.
    pub last_updated: i64,
}

impl TryFrom<PropertiesResponse> for ThingProperties {
    type Error = FetchError;

    fn try_from(resp: PropertiesResponse) -> Result<Self, FetchError> {
        let row = resp.rows.into_iter().next().ok_or(FetchError::NoRows)?;
        Ok(Self {
            temperature: row.temperature,
            humidity: row.humidity,
            last_updated: row.last_updated / 1000,
        })
    }
}

/// Decode a raw response body into `ThingProperties`.
pub fn parse_properties(bytes: &[u8]) -> Result<ThingProperties, FetchError> {
    serde_json::from_slice::<PropertiesResponse>(bytes)?.try_into()
}
