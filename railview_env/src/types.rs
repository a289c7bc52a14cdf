//! Wire types exchanged with the timetable data source.

use crate::error::EnvError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Token the data source understands as "no filter" for direction, weekday and line.
pub const ALL_FILTER: &str = "전체";

/// Ordered station names per line, as served by `GET lines`.
pub type LineOrders = BTreeMap<String, Vec<String>>;

/// A geographic coordinate in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lon)
    }
}

/// A station row from `GET stations`.
///
/// The original timetable server emits Korean column names; both spellings
/// are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    #[serde(alias = "역명")]
    pub name: String,

    #[serde(alias = "위도")]
    pub latitude: f64,

    #[serde(alias = "경도")]
    pub longitude: f64,

    #[serde(rename = "lineNumber", alias = "호선", deserialize_with = "string_or_number")]
    pub line_number: String,
}

impl StationRecord {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64, line_number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            line_number: line_number.into(),
        }
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }
}

/// Operating status reported by the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Moving,
    Stopped,
    /// Standing at the last station of its run.
    Terminal,
}

/// Where a vehicle is, as the data source describes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Between two stations; `progress` is expected in `[0, 1]`.
    Segment {
        from: String,
        to: String,
        progress: f64,
    },
    /// Precomputed coordinate.
    Direct(LatLon),
}

/// One vehicle in one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSnapshot {
    /// Train number.
    pub id: String,
    pub line: String,
    pub placement: Placement,
    pub status: Option<VehicleStatus>,
    /// Delay reported for the current frame, in seconds.
    pub delay_seconds: Option<f64>,
    pub destination: String,
}

impl VehicleSnapshot {
    /// A vehicle between two stations.
    pub fn on_segment(
        id: impl Into<String>,
        line: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        progress: f64,
    ) -> Self {
        let to = to.into();
        Self {
            id: id.into(),
            line: line.into(),
            destination: to.clone(),
            placement: Placement::Segment {
                from: from.into(),
                to,
                progress,
            },
            status: None,
            delay_seconds: None,
        }
    }

    /// A vehicle with a precomputed coordinate.
    pub fn at(id: impl Into<String>, line: impl Into<String>, position: LatLon) -> Self {
        Self {
            id: id.into(),
            line: line.into(),
            placement: Placement::Direct(position),
            status: None,
            delay_seconds: None,
            destination: String::new(),
        }
    }

    pub fn with_status(mut self, status: VehicleStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay_seconds = Some(seconds);
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }
}

/// The raw JSON shape of a snapshot record.
///
/// Every field is optional here so that one bad record can be rejected on
/// its own instead of failing the whole batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireVehicle {
    #[serde(default, alias = "id", deserialize_with = "opt_string_or_number")]
    pub train_no: Option<String>,

    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub line: Option<String>,

    #[serde(default, alias = "fromStation")]
    pub from: Option<String>,

    #[serde(default, alias = "toStation")]
    pub to: Option<String>,

    #[serde(default)]
    pub progress: Option<f64>,

    #[serde(default, alias = "latitude")]
    pub lat: Option<f64>,

    #[serde(default, alias = "longitude")]
    pub lon: Option<f64>,

    #[serde(default)]
    pub status: Option<VehicleStatus>,

    #[serde(default, alias = "delaySeconds")]
    pub delay: Option<f64>,

    #[serde(default, alias = "destinationLabel")]
    pub destination: Option<String>,
}

impl TryFrom<WireVehicle> for VehicleSnapshot {
    type Error = EnvError;

    fn try_from(wire: WireVehicle) -> Result<Self, Self::Error> {
        let id = wire
            .train_no
            .ok_or_else(|| EnvError::malformed("missing train_no"))?;
        let line = wire
            .line
            .ok_or_else(|| EnvError::malformed(format!("{id}: missing line")))?;

        if let Some(delay) = wire.delay {
            if !delay.is_finite() || delay < 0.0 {
                return Err(EnvError::malformed(format!("{id}: invalid delay {delay}")));
            }
        }

        // Direct coordinates win when both shapes are present.
        let placement = match (wire.lat, wire.lon) {
            (Some(lat), Some(lon)) => {
                let pos = LatLon::new(lat, lon);
                if !pos.is_finite() {
                    return Err(EnvError::malformed(format!("{id}: non-finite coordinate")));
                }
                Placement::Direct(pos)
            }
            _ => {
                let from = wire.from.clone().ok_or_else(|| EnvError::malformed(format!("{id}: missing from")))?;
                let to = wire.to.clone().ok_or_else(|| EnvError::malformed(format!("{id}: missing to")))?;
                let progress = wire
                    .progress
                    .ok_or_else(|| EnvError::malformed(format!("{id}: missing progress")))?;
                if !progress.is_finite() {
                    return Err(EnvError::malformed(format!("{id}: non-finite progress")));
                }
                Placement::Segment { from, to, progress }
            }
        };

        let destination = wire.destination.or(wire.to).unwrap_or_default();

        Ok(Self {
            id,
            line,
            placement,
            status: wire.status,
            delay_seconds: wire.delay,
            destination,
        })
    }
}

/// A decoded snapshot response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotBatch {
    pub records: Vec<VehicleSnapshot>,
    /// Records rejected while decoding.
    pub malformed: usize,
}

impl SnapshotBatch {
    pub fn new(records: Vec<VehicleSnapshot>) -> Self {
        Self { records, malformed: 0 }
    }
}

/// Decodes a `simulation_data` body record by record.
///
/// The body must be a JSON array; anything else is a `Decode` error.
/// Individual records that fail to parse are counted and skipped.
pub fn decode_snapshot_batch(body: &str) -> Result<SnapshotBatch, EnvError> {
    let values: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let mut batch = SnapshotBatch::default();

    for value in values {
        let parsed = serde_json::from_value::<WireVehicle>(value)
            .map_err(EnvError::from)
            .and_then(VehicleSnapshot::try_from);
        match parsed {
            Ok(record) => batch.records.push(record),
            Err(_) => batch.malformed += 1,
        }
    }

    Ok(batch)
}

/// Weather/crowding level forwarded with every query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherLevel {
    #[default]
    None,
    #[serde(alias = "약함")]
    Light,
    #[serde(alias = "보통")]
    Moderate,
    #[serde(alias = "강함")]
    Severe,
}

impl WeatherLevel {
    /// Extra dwell time at a congested station, in seconds.
    pub fn delay_seconds(&self) -> u32 {
        match self {
            WeatherLevel::None => 0,
            WeatherLevel::Light => 5,
            WeatherLevel::Moderate => 10,
            WeatherLevel::Severe => 20,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherLevel::None => "none",
            WeatherLevel::Light => "light",
            WeatherLevel::Moderate => "moderate",
            WeatherLevel::Severe => "severe",
        }
    }
}

impl std::str::FromStr for WeatherLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(WeatherLevel::None),
            "light" | "약함" => Ok(WeatherLevel::Light),
            "moderate" | "보통" => Ok(WeatherLevel::Moderate),
            "severe" | "강함" => Ok(WeatherLevel::Severe),
            _ => Err(format!("Unknown weather level: {s}")),
        }
    }
}

/// Parameters of one `GET simulation_data` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotQuery {
    /// Simulated time as `HH:MM:SS`.
    pub time: String,
    pub direction: String,
    pub weekday: String,
    pub line: String,
    /// Station names flagged by the congestion overlay.
    pub congested: Vec<String>,
    pub weather: WeatherLevel,
}

impl SnapshotQuery {
    /// A query with every filter set to the wildcard.
    pub fn at(time: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            direction: ALL_FILTER.to_string(),
            weekday: "3".to_string(),
            line: ALL_FILTER.to_string(),
            congested: Vec::new(),
            weather: WeatherLevel::None,
        }
    }

    /// URL query pairs in the order the server documents them.
    ///
    /// `congested` travels as a JSON array literal.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let congested = serde_json::to_string(&self.congested).unwrap_or_else(|_| "[]".to_string());
        vec![
            ("time", self.time.clone()),
            ("direction", self.direction.clone()),
            ("weekday", self.weekday.clone()),
            ("line", self.line.clone()),
            ("congested", congested),
            ("weather", self.weather.as_str().to_string()),
        ]
    }
}

/// Body of `POST update_congestion`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestionUpdate {
    pub stations: Vec<String>,
    pub delta: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Int(i64),
    Float(f64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Int(i) => i.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_record_accepts_korean_columns() {
        let json = r#"{"역명": "시청", "위도": 37.5657, "경도": 126.9769, "호선": 1}"#;
        let station: StationRecord = serde_json::from_str(json).unwrap();

        assert_eq!(station.name, "시청");
        assert_eq!(station.line_number, "1");
        assert_eq!(station.position(), LatLon::new(37.5657, 126.9769));
    }

    #[test]
    fn test_decode_prefers_direct_coordinates() {
        let body = r#"[{"train_no": 2101, "line": "2", "from": "A", "to": "B",
                        "progress": 0.5, "lat": 37.51, "lon": 127.01, "status": "moving", "delay": 0}]"#;
        let batch = decode_snapshot_batch(body).unwrap();

        assert_eq!(batch.malformed, 0);
        let record = &batch.records[0];
        assert_eq!(record.id, "2101");
        assert_eq!(record.placement, Placement::Direct(LatLon::new(37.51, 127.01)));
        assert_eq!(record.status, Some(VehicleStatus::Moving));
        assert_eq!(record.destination, "B");
    }

    #[test]
    fn test_decode_drops_malformed_records_only() {
        let body = r#"[
            {"train_no": "K101", "line": "2", "from": "A", "to": "B", "progress": 0.25},
            {"train_no": "K102", "line": "2", "from": "A", "to": "B", "progress": "half"},
            {"train_no": "K103", "line": "2", "from": "A", "to": "B"},
            {"line": "2", "lat": 37.5, "lon": 127.0},
            {"train_no": "K104", "line": "2", "lat": 37.5, "lon": 127.0, "delay": -3}
        ]"#;
        let batch = decode_snapshot_batch(body).unwrap();

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].id, "K101");
        assert_eq!(batch.malformed, 4);
    }

    #[test]
    fn test_decode_rejects_non_array_body() {
        let err = decode_snapshot_batch(r#"{"error": "bad time"}"#).unwrap_err();
        assert!(matches!(err, EnvError::Decode(_)));
    }

    #[test]
    fn test_query_pairs_encode_congestion() {
        let mut query = SnapshotQuery::at("09:00:01");
        query.congested = vec!["X".to_string(), "Y".to_string()];
        query.weather = WeatherLevel::Severe;

        let pairs = query.to_query_pairs();
        assert_eq!(pairs[0], ("time", "09:00:01".to_string()));
        assert_eq!(pairs[4], ("congested", r#"["X","Y"]"#.to_string()));
        assert_eq!(pairs[5], ("weather", "severe".to_string()));
    }

    #[test]
    fn test_weather_level_parsing() {
        assert_eq!("강함".parse::<WeatherLevel>().unwrap(), WeatherLevel::Severe);
        assert_eq!("Light".parse::<WeatherLevel>().unwrap(), WeatherLevel::Light);
        assert!("storm".parse::<WeatherLevel>().is_err());
        assert!(WeatherLevel::Severe > WeatherLevel::Moderate);
    }
}
