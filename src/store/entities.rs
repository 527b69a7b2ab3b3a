use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt::Display,
    str::FromStr,
};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::warn;

use crate::utils::time::{format_log_date, parse_log_date};

const MAX_ID_LEN: usize = 40;
const RESERVED_IDS: [&str; 1] = ["date"];
const BOOL_COLUMN_SUFFIX: &str = "_bool";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("id can't be empty")]
    Empty,
    #[error("id can't be longer than {} characters", MAX_ID_LEN)]
    TooLong,
    #[error("id should start with a lowercase letter")]
    InvalidStart,
    #[error("id should be snake_case, found `{0}`")]
    InvalidCharacter(char),
    #[error("`{0}` is reserved for export columns")]
    Reserved(String),
}

/// Short snake_case slug identifying a resolution. Ids become csv column names during export, so
/// the names used by derived columns are not allowed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ResolutionId(String);

impl ResolutionId {
    pub fn parse(value: &str) -> Result<Self, IdError> {
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(IdError::Empty);
        };
        if value.chars().count() > MAX_ID_LEN {
            return Err(IdError::TooLong);
        }
        if !first.is_ascii_lowercase() {
            return Err(IdError::InvalidStart);
        }
        if let Some(c) = chars.find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
        {
            return Err(IdError::InvalidCharacter(c));
        }
        if RESERVED_IDS.contains(&value) || value.ends_with(BOOL_COLUMN_SUFFIX) {
            return Err(IdError::Reserved(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Id of a resolution that may already exist. Only emptiness is checked, ids written by older
    /// versions never followed [ResolutionId::parse] and still have to be found.
    pub fn lookup(value: &str) -> Result<Self, IdError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResolutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResolutionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for ResolutionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        if value.is_empty() {
            return Err(serde::de::Error::custom("resolution id can't be empty"));
        }
        Ok(Self(value))
    }
}

/// Calendar day stored as `M/D/YYYY`, which is also how it's keyed inside resolution data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogDate(pub NaiveDate);

impl Display for LogDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_log_date(self.0))
    }
}

impl From<NaiveDate> for LogDate {
    fn from(value: NaiveDate) -> Self {
        Self(value)
    }
}

impl Serialize for LogDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_log_date(self.0))
    }
}

impl<'de> Deserialize<'de> for LogDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        parse_log_date(&value)
            .map(LogDate)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date `{value}`, expected M/D/YYYY")))
    }
}

/// Single character naming a kind of activity, always kept uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DetailCode(char);

impl DetailCode {
    pub fn new(value: char) -> Option<Self> {
        if value.is_whitespace() || value == ',' || value.is_control() {
            return None;
        }
        let mut upper = value.to_uppercase();
        match (upper.next(), upper.next()) {
            (Some(c), None) => Some(Self(c)),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        self.0
    }
}

impl Display for DetailCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DetailCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DetailCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => DetailCode::new(c)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid detail code `{value}`"))),
            _ => Err(serde::de::Error::custom(format!(
                "detail code should be a single character, found `{value}`"
            ))),
        }
    }
}

/// Value logged for a day. `Done(false)` is also what categorical resolutions store when the
/// answer was `N`, so a categorical resolution may hold both variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogValue {
    Done(bool),
    Codes(String),
}

impl LogValue {
    pub fn from_codes(codes: &[DetailCode]) -> Self {
        let joined = codes
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");
        LogValue::Codes(joined)
    }

    /// Splits a stored code string. Unparseable fragments are skipped.
    pub fn codes(&self) -> Vec<DetailCode> {
        match self {
            LogValue::Done(_) => vec![],
            LogValue::Codes(s) => s
                .split(',')
                .filter_map(|part| {
                    let mut chars = part.trim().chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => DetailCode::new(c),
                        _ => None,
                    }
                })
                .collect(),
        }
    }

    /// How the value appears in an export. Missing entries are handled by the caller and are
    /// exported as `0` too.
    pub fn export_cell(&self) -> String {
        match self {
            LogValue::Done(false) => "0".into(),
            LogValue::Done(true) => "1".into(),
            LogValue::Codes(s) => s.clone(),
        }
    }
}

/// A tracked habit. The id is not part of the struct, it's the key inside [ResolutionStore].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(rename = "res_descript")]
    pub description: String,
    #[serde(rename = "res_creation_date")]
    pub creation_date: LogDate,
    pub is_active: bool,
    #[serde(rename = "res_expiration_date", default)]
    pub expiration_date: Option<LogDate>,
    pub is_binary: bool,
    #[serde(rename = "res_detail_codes", default)]
    pub detail_codes: BTreeMap<DetailCode, String>,
    #[serde(default, deserialize_with = "deserialize_data")]
    pub data: BTreeMap<LogDate, LogValue>,
}

/// Older versions padded dates, so `01/02/2023` and `1/2/2023` can both be keys of one day.
/// Equal values collapse into one entry, different ones fail the load.
fn deserialize_data<'de, D>(deserializer: D) -> Result<BTreeMap<LogDate, LogValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, LogValue>::deserialize(deserializer)?;
    let mut data = BTreeMap::new();
    for (key, value) in raw {
        let date = parse_log_date(&key).map(LogDate).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid date `{key}`, expected M/D/YYYY"))
        })?;
        match data.entry(date) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(entry) if *entry.get() == value => {
                warn!("`{key}` repeats the entry of {date}, keeping one");
            }
            Entry::Occupied(entry) => {
                return Err(serde::de::Error::custom(format!(
                    "`{key}` is logged as {value:?} but {date} already holds {:?}",
                    entry.get()
                )));
            }
        }
    }
    Ok(data)
}

impl Resolution {
    pub fn new(
        description: String,
        creation_date: NaiveDate,
        expiration_date: Option<NaiveDate>,
        is_binary: bool,
    ) -> Self {
        Self {
            description,
            creation_date: creation_date.into(),
            is_active: true,
            expiration_date: expiration_date.map(LogDate),
            is_binary,
            detail_codes: BTreeMap::new(),
            data: BTreeMap::new(),
        }
    }

    /// A resolution stays valid through its expiration day.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        matches!(self.expiration_date, Some(LogDate(expiration)) if expiration < today)
    }

    pub fn value_on(&self, date: NaiveDate) -> Option<&LogValue> {
        self.data.get(&LogDate(date))
    }

    /// Whether any day in `start..=end` has an entry.
    pub fn has_data_between(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= end
            && self
                .data
                .range(LogDate(start)..=LogDate(end))
                .next()
                .is_some()
    }

    /// Codes referenced by logged values that have no description.
    pub fn undefined_codes(&self) -> Vec<DetailCode> {
        let mut missing = self
            .data
            .values()
            .flat_map(LogValue::codes)
            .filter(|c| !self.detail_codes.contains_key(c))
            .collect::<Vec<_>>();
        missing.sort();
        missing.dedup();
        missing
    }
}

/// Every resolution keyed by id. The whole map is loaded and saved at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolutionStore {
    resolutions: BTreeMap<ResolutionId, Resolution>,
}

impl ResolutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }

    pub fn contains(&self, id: &ResolutionId) -> bool {
        self.resolutions.contains_key(id)
    }

    pub fn get(&self, id: &ResolutionId) -> Option<&Resolution> {
        self.resolutions.get(id)
    }

    pub fn get_mut(&mut self, id: &ResolutionId) -> Option<&mut Resolution> {
        self.resolutions.get_mut(id)
    }

    pub fn insert(&mut self, id: ResolutionId, resolution: Resolution) -> Option<Resolution> {
        self.resolutions.insert(id, resolution)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResolutionId, &Resolution)> {
        self.resolutions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ResolutionId, &mut Resolution)> {
        self.resolutions.iter_mut()
    }

    /// Copies out every active resolution.
    pub fn active(&self) -> ResolutionStore {
        ResolutionStore {
            resolutions: self
                .resolutions
                .iter()
                .filter(|(_, r)| r.is_active)
                .map(|(id, r)| (id.clone(), r.clone()))
                .collect(),
        }
    }

    /// Overwrites entries of `self` with the ones in `other`, keeping everything else.
    pub fn merge(&mut self, other: ResolutionStore) {
        self.resolutions.extend(other.resolutions);
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{DetailCode, IdError, LogValue, Resolution, ResolutionId, ResolutionStore};

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, d).unwrap()
    }

    #[test]
    fn test_id_validation() {
        assert!(ResolutionId::parse("exercise").is_ok());
        assert!(ResolutionId::parse("read_20_pages").is_ok());
        assert_eq!(ResolutionId::parse(""), Err(IdError::Empty));
        assert_eq!(ResolutionId::parse("Exercise"), Err(IdError::InvalidStart));
        assert_eq!(ResolutionId::parse("_x"), Err(IdError::InvalidStart));
        assert_eq!(
            ResolutionId::parse("no spaces"),
            Err(IdError::InvalidCharacter(' '))
        );
        assert_eq!(
            ResolutionId::parse("date"),
            Err(IdError::Reserved("date".into()))
        );
        assert_eq!(
            ResolutionId::parse("floss_bool"),
            Err(IdError::Reserved("floss_bool".into()))
        );
        assert_eq!(ResolutionId::parse(&"a".repeat(41)), Err(IdError::TooLong));
    }

    #[test]
    fn test_lookup_keeps_stored_ids() {
        assert_eq!(ResolutionId::lookup(" NYR-Floss ").unwrap().as_str(), "NYR-Floss");
        assert_eq!(ResolutionId::lookup("  "), Err(IdError::Empty));

        let stored: ResolutionId = serde_json::from_str(r#""NYR-Floss""#).unwrap();
        assert_eq!(ResolutionId::lookup("NYR-Floss").unwrap(), stored);
    }

    #[test]
    fn test_padded_date_keys_collide() {
        let store_with = |data: &str| {
            format!(
                r#"{{"floss": {{"res_descript": "floss", "res_creation_date": "1/1/2023",
                "is_active": true, "is_binary": true, "data": {data}}}}}"#
            )
        };

        let same = store_with(r#"{"01/02/2023": true, "1/2/2023": true, "1/3/2023": false}"#);
        let store = serde_json::from_str::<ResolutionStore>(&same).unwrap();
        let floss = store.get(&ResolutionId::parse("floss").unwrap()).unwrap();
        assert_eq!(floss.data.len(), 2);
        assert_eq!(floss.value_on(day(1, 2)), Some(&LogValue::Done(true)));

        let different = store_with(r#"{"01/02/2023": true, "1/2/2023": false}"#);
        let error = serde_json::from_str::<ResolutionStore>(&different).unwrap_err();
        assert!(error.to_string().contains("already holds"));
    }

    #[test]
    fn test_detail_code_is_uppercased() {
        assert_eq!(DetailCode::new('r').unwrap().as_char(), 'R');
        assert_eq!(DetailCode::new(','), None);
        assert_eq!(DetailCode::new(' '), None);
    }

    #[test]
    fn test_store_json_shape() {
        let json = r#"{
            "writing": {
                "res_descript": "write something",
                "res_creation_date": "1/1/2023",
                "is_active": true,
                "res_expiration_date": null,
                "is_binary": false,
                "res_detail_codes": {"R": "research", "F": "fiction"},
                "data": {"1/1/2023": "R,F", "1/2/2023": false}
            }
        }"#;
        let store: ResolutionStore = serde_json::from_str(json).unwrap();
        let writing = store.get(&ResolutionId::parse("writing").unwrap()).unwrap();
        assert!(!writing.is_binary);
        assert_eq!(writing.value_on(day(1, 1)), Some(&LogValue::Codes("R,F".into())));
        assert_eq!(writing.value_on(day(1, 2)), Some(&LogValue::Done(false)));
        assert_eq!(writing.detail_codes.len(), 2);

        let value = serde_json::to_value(&store).unwrap();
        assert_eq!(value["writing"]["data"]["1/1/2023"], "R,F");
        assert_eq!(value["writing"]["res_creation_date"], "1/1/2023");
    }

    #[test]
    fn test_invalid_date_key_is_rejected() {
        let json = r#"{"floss": {"res_descript": "floss", "res_creation_date": "1/1/2023",
            "is_active": true, "is_binary": true, "data": {"2023-01-01": true}}}"#;
        assert!(serde_json::from_str::<ResolutionStore>(json).is_err());
    }

    #[test]
    fn test_expiration_is_inclusive() {
        let resolution = Resolution::new("floss".into(), day(1, 1), Some(day(3, 1)), true);
        assert!(!resolution.is_expired(day(3, 1)));
        assert!(resolution.is_expired(day(3, 2)));

        let never = Resolution::new("floss".into(), day(1, 1), None, true);
        assert!(!never.is_expired(day(12, 31)));
    }

    #[test]
    fn test_has_data_between() {
        let mut resolution = Resolution::new("floss".into(), day(1, 1), None, true);
        resolution.data.insert(day(2, 10).into(), LogValue::Done(false));

        assert!(resolution.has_data_between(day(2, 1), day(2, 28)));
        assert!(resolution.has_data_between(day(2, 10), day(2, 10)));
        assert!(!resolution.has_data_between(day(3, 1), day(3, 31)));
        assert!(!resolution.has_data_between(day(2, 28), day(2, 1)));
    }

    #[test]
    fn test_codes_round_trip_through_value() {
        let codes = [DetailCode::new('r').unwrap(), DetailCode::new('s').unwrap()];
        let value = LogValue::from_codes(&codes);
        assert_eq!(value, LogValue::Codes("R,S".into()));
        assert_eq!(value.codes(), codes.to_vec());
        assert_eq!(value.export_cell(), "R,S");
        assert_eq!(LogValue::Done(true).export_cell(), "1");
    }
}
