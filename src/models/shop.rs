// src/models/shop.rs

//! Shop records, administrative codes and the canonical dataset.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, RecordError};

/// Column names in canonical order. Also the consolidated CSV header and the
/// upstream JSON field names.
pub const COLUMNS: [&str; 14] = [
    "fpsCode",
    "fpsName",
    "address",
    "fpsowner",
    "villageName",
    "villageCode",
    "tehsilName",
    "tehsilCode",
    "districtCode",
    "districtName",
    "stateCode",
    "stateName",
    "latitude",
    "longitude",
];

/// Index of the natural key in [`COLUMNS`].
pub const KEY_COLUMN: usize = 0;

/// Every state code published by the portal.
pub const STATE_CODES: [&str; 38] = [
    "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12", "13", "14", "15",
    "16", "17", "18", "19", "20", "21", "22", "23", "24", "25", "26", "27", "28", "29", "30",
    "31", "32", "33", "34", "35", "36", "37", "38",
];

/// Two-digit state identifier from [`STATE_CODES`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StateCode(String);

impl StateCode {
    /// All state codes in ascending order.
    pub fn all() -> impl Iterator<Item = StateCode> {
        STATE_CODES.iter().map(|code| StateCode((*code).to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StateCode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Accept "7" as shorthand for "07".
        let padded = if trimmed.len() == 1 {
            format!("0{trimmed}")
        } else {
            trimmed.to_string()
        };

        if STATE_CODES.contains(&padded.as_str()) {
            Ok(Self(padded))
        } else {
            Err(AppError::validation(format!(
                "unknown state code '{s}' (expected 01..38)"
            )))
        }
    }
}

impl TryFrom<String> for StateCode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StateCode> for String {
    fn from(code: StateCode) -> Self {
        code.0
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tehsil discovered under a state. Only lives long enough to build the
/// shop request for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TehsilDescriptor {
    pub state_code: StateCode,
    pub district_code: String,
    pub tehsil_code: String,
    pub tehsil_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTehsil {
    #[serde(rename = "districtCode", deserialize_with = "lenient::string")]
    district_code: String,
    #[serde(rename = "tehsilcode", deserialize_with = "lenient::string")]
    tehsil_code: String,
    #[serde(rename = "tehsilname", deserialize_with = "lenient::string")]
    tehsil_name: String,
}

impl TehsilDescriptor {
    /// Build a descriptor from one element of the tehsil listing.
    pub fn from_value(state_code: &StateCode, value: Value) -> Result<Self, RecordError> {
        let raw: RawTehsil = serde_json::from_value(value)?;
        if raw.district_code.trim().is_empty() {
            return Err(RecordError::MissingField("districtCode"));
        }
        if raw.tehsil_code.trim().is_empty() {
            return Err(RecordError::MissingField("tehsilcode"));
        }

        Ok(Self {
            state_code: state_code.clone(),
            district_code: raw.district_code,
            tehsil_code: raw.tehsil_code,
            tehsil_name: raw.tehsil_name,
        })
    }
}

/// Tehsils of one state, plus how many listing entries were unusable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TehsilListing {
    pub tehsils: Vec<TehsilDescriptor>,
    pub rejected: usize,
}

impl TehsilListing {
    /// Parse the tehsil listing of a state. Entries without a district or
    /// tehsil code are counted and skipped.
    pub fn from_values(state_code: &StateCode, items: Vec<Value>) -> Self {
        let mut listing = Self::default();
        for item in items {
            match TehsilDescriptor::from_value(state_code, item) {
                Ok(tehsil) => listing.tehsils.push(tehsil),
                Err(e) => {
                    listing.rejected += 1;
                    log::warn!("State {}: skipping tehsil entry: {}", state_code, e);
                }
            }
        }
        listing
    }
}

/// One fair price shop.
///
/// Serializes with upstream field names so per-state artifacts keep the
/// portal's shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopRecord {
    #[serde(rename = "fpsCode", deserialize_with = "lenient::string")]
    pub fps_code: String,
    #[serde(rename = "fpsName", deserialize_with = "lenient::string")]
    pub fps_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub address: String,
    #[serde(rename = "fpsowner", deserialize_with = "lenient::string")]
    pub owner_name: String,
    #[serde(rename = "villageName", deserialize_with = "lenient::string")]
    pub village_name: String,
    #[serde(rename = "villageCode", deserialize_with = "lenient::string")]
    pub village_code: String,
    #[serde(rename = "tehsilName", deserialize_with = "lenient::string")]
    pub tehsil_name: String,
    #[serde(rename = "tehsilCode", deserialize_with = "lenient::string")]
    pub tehsil_code: String,
    #[serde(rename = "districtCode", deserialize_with = "lenient::string")]
    pub district_code: String,
    #[serde(rename = "districtName", deserialize_with = "lenient::string")]
    pub district_name: String,
    #[serde(rename = "stateCode", deserialize_with = "lenient::string")]
    pub state_code: String,
    #[serde(rename = "stateName", deserialize_with = "lenient::string")]
    pub state_name: String,
    #[serde(deserialize_with = "lenient::coordinate")]
    pub latitude: Option<f64>,
    #[serde(deserialize_with = "lenient::coordinate")]
    pub longitude: Option<f64>,
}

impl ShopRecord {
    /// Parse one element of a shop listing, rejecting objects without a key.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        let record: Self = serde_json::from_value(value)?;
        record.validate()?;
        Ok(record)
    }

    /// Build a record from cells laid out in [`COLUMNS`] order.
    pub fn from_row(cells: [&str; 14]) -> Result<Self, RecordError> {
        let record = Self {
            fps_code: cells[0].to_string(),
            fps_name: cells[1].to_string(),
            address: cells[2].to_string(),
            owner_name: cells[3].to_string(),
            village_name: cells[4].to_string(),
            village_code: cells[5].to_string(),
            tehsil_name: cells[6].to_string(),
            tehsil_code: cells[7].to_string(),
            district_code: cells[8].to_string(),
            district_name: cells[9].to_string(),
            state_code: cells[10].to_string(),
            state_name: cells[11].to_string(),
            latitude: parse_coordinate(cells[12])?,
            longitude: parse_coordinate(cells[13])?,
        };
        record.validate()?;
        Ok(record)
    }

    fn validate(&self) -> Result<(), RecordError> {
        if self.fps_code.trim().is_empty() {
            return Err(RecordError::MissingField("fpsCode"));
        }
        Ok(())
    }

    /// Cell values in [`COLUMNS`] order. Missing coordinates render empty.
    pub fn to_row(&self) -> [String; 14] {
        [
            self.fps_code.clone(),
            self.fps_name.clone(),
            self.address.clone(),
            self.owner_name.clone(),
            self.village_name.clone(),
            self.village_code.clone(),
            self.tehsil_name.clone(),
            self.tehsil_code.clone(),
            self.district_code.clone(),
            self.district_name.clone(),
            self.state_code.clone(),
            self.state_name.clone(),
            format_coordinate(self.latitude),
            format_coordinate(self.longitude),
        ]
    }

    /// Hierarchy ordering key: state, district, tehsil, village, shop.
    pub fn sort_key(&self) -> [&str; 5] {
        [
            &self.state_code,
            &self.district_code,
            &self.tehsil_code,
            &self.village_code,
            &self.fps_code,
        ]
    }

    /// Total order over every column, hierarchy key first.
    ///
    /// Two records compare equal only if every column is identical.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.fps_name.cmp(&other.fps_name))
            .then_with(|| self.address.cmp(&other.address))
            .then_with(|| self.owner_name.cmp(&other.owner_name))
            .then_with(|| self.village_name.cmp(&other.village_name))
            .then_with(|| self.tehsil_name.cmp(&other.tehsil_name))
            .then_with(|| self.district_name.cmp(&other.district_name))
            .then_with(|| self.state_name.cmp(&other.state_name))
            .then_with(|| cmp_coordinate(self.latitude, other.latitude))
            .then_with(|| cmp_coordinate(self.longitude, other.longitude))
    }
}

/// Shops parsed from one listing or artifact, plus how many entries were
/// unusable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShopBatch {
    pub records: Vec<ShopRecord>,
    pub rejected: usize,
}

impl ShopBatch {
    /// Run every element through [`ShopRecord::from_value`], counting the
    /// rejects. `context` prefixes the log lines.
    pub fn from_values(items: Vec<Value>, context: &str) -> Self {
        let mut batch = Self::default();
        for item in items {
            match ShopRecord::from_value(item) {
                Ok(record) => batch.records.push(record),
                Err(e @ RecordError::MissingField(_)) => {
                    batch.rejected += 1;
                    log::debug!("{}: dropping shop entry: {}", context, e);
                }
                Err(e) => {
                    batch.rejected += 1;
                    log::warn!("{}: dropping shop entry: {}", context, e);
                }
            }
        }
        batch
    }
}

fn cmp_coordinate(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.is_some().cmp(&b.is_some()),
    }
}

fn format_coordinate(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_coordinate(cell: &str) -> Result<Option<f64>, RecordError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Ok(None),
        Err(_) => Err(RecordError::InvalidCoordinate(cell.to_string())),
    }
}

/// An ordered collection of shop records.
///
/// Datasets produced by the aggregator are sorted by
/// [`ShopRecord::sort_key`] and free of exact duplicate rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    shops: Vec<ShopRecord>,
}

impl Dataset {
    /// Wrap records as-is, without sorting or deduplication.
    pub fn from_records(shops: Vec<ShopRecord>) -> Self {
        Self { shops }
    }

    pub fn shops(&self) -> &[ShopRecord] {
        &self.shops
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ShopRecord> {
        self.shops.iter()
    }

    pub fn len(&self) -> usize {
        self.shops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shops.is_empty()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a ShopRecord;
    type IntoIter = std::slice::Iter<'a, ShopRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.shops.iter()
    }
}

/// Deserializers that accept the loose typing of the portal's JSON.
mod lenient {
    use serde::de::{self, Deserialize, Deserializer};
    use serde_json::Value;

    /// Strings, numbers and booleans become text; null becomes empty.
    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(de::Error::custom(format!("expected a scalar, found {other}"))),
        }
    }

    /// Numbers or numeric strings; null, blank and non-finite become `None`.
    pub fn coordinate<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        let value = match Value::deserialize(deserializer)? {
            Value::Null => None,
            Value::Number(n) => n.as_f64(),
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.trim().parse::<f64>().map_err(de::Error::custom)?),
            other => {
                return Err(de::Error::custom(format!(
                    "expected a coordinate, found {other}"
                )));
            }
        };
        Ok(value.filter(|v| v.is_finite()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_codes_cover_01_to_38() {
        let codes: Vec<_> = StateCode::all().collect();
        assert_eq!(codes.len(), 38);
        assert_eq!(codes.first().unwrap().as_str(), "01");
        assert_eq!(codes.last().unwrap().as_str(), "38");
    }

    #[test]
    fn test_state_code_parse() {
        assert_eq!("7".parse::<StateCode>().unwrap().as_str(), "07");
        assert_eq!("38".parse::<StateCode>().unwrap().as_str(), "38");
        assert!("00".parse::<StateCode>().is_err());
        assert!("39".parse::<StateCode>().is_err());
        assert!("ab".parse::<StateCode>().is_err());
    }

    #[test]
    fn test_shop_from_mixed_json_types() {
        let value = json!({
            "fpsCode": 123456,
            "fpsName": "Ration Shop",
            "address": null,
            "fpsowner": "R. Kumar",
            "villageCode": "0042",
            "stateCode": "09",
            "latitude": "26.85",
            "longitude": 80.95
        });

        let shop = ShopRecord::from_value(value).unwrap();
        assert_eq!(shop.fps_code, "123456");
        assert_eq!(shop.address, "");
        assert_eq!(shop.owner_name, "R. Kumar");
        assert_eq!(shop.village_code, "0042");
        assert_eq!(shop.district_name, "");
        assert_eq!(shop.latitude, Some(26.85));
        assert_eq!(shop.longitude, Some(80.95));
    }

    #[test]
    fn test_shop_blank_coordinates_are_absent() {
        let shop =
            ShopRecord::from_value(json!({"fpsCode": "A1", "latitude": "", "longitude": null}))
                .unwrap();
        assert_eq!(shop.latitude, None);
        assert_eq!(shop.longitude, None);
    }

    #[test]
    fn test_shop_without_key_is_rejected() {
        assert!(matches!(
            ShopRecord::from_value(json!({"fpsName": "No key"})),
            Err(RecordError::MissingField("fpsCode"))
        ));
        assert!(matches!(
            ShopRecord::from_value(json!({"fpsCode": "  "})),
            Err(RecordError::MissingField("fpsCode"))
        ));
    }

    #[test]
    fn test_shop_with_nested_field_is_malformed() {
        assert!(matches!(
            ShopRecord::from_value(json!({"fpsCode": "A1", "address": {"line": 1}})),
            Err(RecordError::Malformed(_))
        ));
    }

    #[test]
    fn test_row_layout_matches_columns() {
        let shop = ShopRecord {
            fps_code: "A1".into(),
            owner_name: "Owner".into(),
            state_code: "09".into(),
            latitude: Some(26.5),
            ..ShopRecord::default()
        };

        let row = shop.to_row();
        assert_eq!(row[KEY_COLUMN], "A1");
        assert_eq!(row[COLUMNS.iter().position(|c| *c == "fpsowner").unwrap()], "Owner");
        assert_eq!(row[10], "09");
        assert_eq!(row[12], "26.5");
        assert_eq!(row[13], "");

        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        let parsed = ShopRecord::from_row(cells.try_into().unwrap()).unwrap();
        assert_eq!(parsed, shop);
    }

    #[test]
    fn test_from_row_rejects_bad_coordinate() {
        let mut cells = [""; 14];
        cells[0] = "A1";
        cells[12] = "north";
        assert!(matches!(
            ShopRecord::from_row(cells),
            Err(RecordError::InvalidCoordinate(_))
        ));
    }

    #[test]
    fn test_canonical_cmp_orders_by_hierarchy_first() {
        let a = ShopRecord {
            fps_code: "Z9".into(),
            state_code: "01".into(),
            ..ShopRecord::default()
        };
        let b = ShopRecord {
            fps_code: "A1".into(),
            state_code: "02".into(),
            ..ShopRecord::default()
        };
        assert_eq!(a.canonical_cmp(&b), Ordering::Less);

        let c = ShopRecord {
            address: "X".into(),
            ..a.clone()
        };
        assert_eq!(a.canonical_cmp(&c), Ordering::Less);
        assert_eq!(a.canonical_cmp(&a.clone()), Ordering::Equal);
    }

    #[test]
    fn test_tehsil_descriptor_requires_codes() {
        let state: StateCode = "09".parse().unwrap();
        let tehsil = TehsilDescriptor::from_value(
            &state,
            json!({"districtCode": 155, "tehsilcode": "00781", "tehsilname": "Sadar"}),
        )
        .unwrap();
        assert_eq!(tehsil.district_code, "155");
        assert_eq!(tehsil.tehsil_code, "00781");
        assert_eq!(tehsil.state_code, state);

        assert!(matches!(
            TehsilDescriptor::from_value(&state, json!({"districtCode": "155"})),
            Err(RecordError::MissingField("tehsilcode"))
        ));
    }

    #[test]
    fn test_tehsil_listing_counts_rejected_entries() {
        let state: StateCode = "09".parse().unwrap();
        let listing = TehsilListing::from_values(
            &state,
            vec![
                json!({"districtCode": "155", "tehsilcode": "00781", "tehsilname": "Sadar"}),
                json!({"districtCode": "155", "tehsilname": "No code"}),
                json!({"tehsilcode": "00782"}),
            ],
        );
        assert_eq!(listing.tehsils.len(), 1);
        assert_eq!(listing.tehsils[0].tehsil_code, "00781");
        assert_eq!(listing.rejected, 2);
    }

    #[test]
    fn test_shop_batch_rejects_keyless_and_malformed() {
        let batch = ShopBatch::from_values(
            vec![
                json!({"fpsName": "no key"}),
                json!({"fpsCode": "A1"}),
                json!({"fpsCode": "A2", "latitude": {"nested": true}}),
                json!("not an object"),
            ],
            "test",
        );
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].fps_code, "A1");
        assert_eq!(batch.rejected, 3);
    }
}
