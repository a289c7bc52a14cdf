//! Ground truth oracle for simulation.
//!
//! The oracle plays the timetable server: it holds the station list, the
//! line orders and a set of timetable rows, and answers snapshot queries
//! the way the production server does:
//! - A row is active from its arrival until the next station's arrival
//! - Stopped while dwelling, moving between departure and next arrival
//! - Congestion at the origin station extends the dwell and is reported as delay

use railview_core::clock::DEFAULT_START_SECONDS;
use railview_core::SimTime;
use railview_env::{LineOrders, SnapshotQuery, StationRecord, VehicleSnapshot, VehicleStatus, ALL_FILTER};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One stop of one train.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableRow {
    pub train_no: String,
    pub line: String,
    pub station: String,
    /// Seconds since midnight
    pub arrive: u32,
    pub depart: u32,
    /// `None` at the end of the line
    pub next_station: Option<String>,
    pub next_arrive: Option<u32>,
    pub weekday: String,
    pub direction: String,
}

impl TimetableRow {
    fn matches(&self, query: &SnapshotQuery) -> bool {
        let accepts = |filter: &str, value: &str| filter == ALL_FILTER || filter == value;
        accepts(&query.weekday, &self.weekday)
            && accepts(&query.direction, &self.direction)
            && accepts(&query.line, &self.line)
    }
}

/// Deterministic timetable server.
#[derive(Debug, Clone, Default)]
pub struct TimetableOracle {
    stations: Vec<StationRecord>,
    lines: LineOrders,
    rows: Vec<TimetableRow>,
}

impl TimetableOracle {
    pub fn new(stations: Vec<StationRecord>, lines: LineOrders, rows: Vec<TimetableRow>) -> Self {
        Self { stations, lines, rows }
    }

    /// A two-line network around central Seoul.
    ///
    /// Both lines run trains numbered from 1001, so every train number
    /// exists twice. Dwell and running times are drawn from `seed`.
    pub fn demo(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut stations = Vec::new();
        let mut lines = LineOrders::new();
        let mut rows = Vec::new();

        let layouts: [(&str, f64, f64, f64, f64); 2] = [
            // line, start lat, start lon, lat step, lon step
            ("2", 37.500, 126.950, 0.000, 0.012),
            ("3", 37.450, 127.010, 0.012, 0.000),
        ];

        for (line, lat0, lon0, dlat, dlon) in layouts {
            let names: Vec<String> = (1..=6).map(|i| format!("L{line}-S{i:02}")).collect();
            for (i, name) in names.iter().enumerate() {
                let k = i as f64;
                stations.push(StationRecord::new(name.clone(), lat0 + dlat * k, lon0 + dlon * k, line));
            }
            lines.insert(line.to_string(), names.clone());

            for train in 0..4u32 {
                let train_no = format!("{}", 1001 + train);
                let (direction, order): (&str, Vec<&String>) = if train % 2 == 0 {
                    ("1", names.iter().collect())
                } else {
                    ("2", names.iter().rev().collect())
                };

                // First departures straddle the default start so trains are
                // already running when a session begins
                let mut clock = DEFAULT_START_SECONDS - 240 + train * 150 + rng.gen_range(0..30);

                for (i, station) in order.iter().enumerate() {
                    let arrive = clock;
                    let depart = arrive + rng.gen_range(20..=40);
                    let next = order.get(i + 1);
                    let next_arrive = next.map(|_| depart + rng.gen_range(80..=140));

                    rows.push(TimetableRow {
                        train_no: train_no.clone(),
                        line: line.to_string(),
                        station: (*station).clone(),
                        arrive,
                        depart,
                        next_station: next.map(|s| (*s).clone()),
                        next_arrive,
                        weekday: "3".to_string(),
                        direction: direction.to_string(),
                    });

                    clock = next_arrive.unwrap_or(depart);
                }
            }
        }

        Self::new(stations, lines, rows)
    }

    pub fn stations(&self) -> &[StationRecord] {
        &self.stations
    }

    pub fn lines(&self) -> &LineOrders {
        &self.lines
    }

    pub fn rows(&self) -> &[TimetableRow] {
        &self.rows
    }

    /// Answers one `simulation_data` query.
    ///
    /// An unparsable time yields an empty snapshot, like the server.
    pub fn snapshot(&self, query: &SnapshotQuery) -> Vec<VehicleSnapshot> {
        let Ok(time) = query.time.parse::<SimTime>() else {
            return Vec::new();
        };
        let t = time.seconds();
        let congested: HashSet<&str> = query.congested.iter().map(String::as_str).collect();
        let buffer = query.weather.delay_seconds();

        let mut records = Vec::new();
        for row in self.rows.iter().filter(|row| row.matches(query)) {
            if t < row.arrive {
                continue;
            }

            let delay = if buffer > 0 && congested.contains(row.station.as_str()) { buffer } else { 0 };
            let depart = row.depart + delay;

            let (status, progress) = match row.next_arrive {
                Some(next_arrive) if t <= next_arrive.max(depart) => {
                    if t < depart {
                        (VehicleStatus::Stopped, 0.0)
                    } else {
                        let total = next_arrive.saturating_sub(depart);
                        let progress = if total == 0 { 1.0 } else { f64::from(t - depart) / f64::from(total) };
                        (VehicleStatus::Moving, progress.clamp(0.0, 1.0))
                    }
                }
                None if t <= depart => (VehicleStatus::Terminal, 0.0),
                _ => continue,
            };

            let to = row.next_station.as_deref().unwrap_or(&row.station);
            records.push(
                VehicleSnapshot::on_segment(row.train_no.clone(), row.line.clone(), row.station.clone(), to, progress)
                    .with_status(status)
                    .with_delay(f64::from(delay)),
            );
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railview_env::{Placement, WeatherLevel};

    fn single_hop() -> TimetableOracle {
        let stations = vec![
            StationRecord::new("A", 37.50, 127.00, "2"),
            StationRecord::new("B", 37.52, 127.02, "2"),
        ];
        let rows = vec![
            TimetableRow {
                train_no: "K101".into(),
                line: "2".into(),
                station: "A".into(),
                arrive: 32_400,
                depart: 32_430,
                next_station: Some("B".into()),
                next_arrive: Some(32_530),
                weekday: "3".into(),
                direction: "1".into(),
            },
            TimetableRow {
                train_no: "K101".into(),
                line: "2".into(),
                station: "B".into(),
                arrive: 32_530,
                depart: 32_560,
                next_station: None,
                next_arrive: None,
                weekday: "3".into(),
                direction: "1".into(),
            },
        ];
        TimetableOracle::new(stations, LineOrders::new(), rows)
    }

    fn at(time: &str) -> SnapshotQuery {
        SnapshotQuery::at(time)
    }

    #[test]
    fn test_dwell_then_move() {
        let oracle = single_hop();

        let dwelling = oracle.snapshot(&at("09:00:10"));
        assert_eq!(dwelling.len(), 1);
        assert_eq!(dwelling[0].status, Some(VehicleStatus::Stopped));

        let moving = oracle.snapshot(&at("09:01:20"));
        assert_eq!(moving[0].status, Some(VehicleStatus::Moving));
        match &moving[0].placement {
            Placement::Segment { from, to, progress } => {
                assert_eq!((from.as_str(), to.as_str()), ("A", "B"));
                assert!((progress - 0.5).abs() < 1e-9);
            }
            other => panic!("unexpected placement {other:?}"),
        }
    }

    #[test]
    fn test_terminal_row_and_inactive_times() {
        let oracle = single_hop();

        // Arrival instant at B: both the finishing hop and the terminal row match
        let arriving = oracle.snapshot(&at("09:02:10"));
        assert_eq!(arriving.len(), 2);
        assert!(arriving.iter().any(|r| r.status == Some(VehicleStatus::Terminal)));

        assert!(oracle.snapshot(&at("08:59:59")).is_empty());
        assert!(oracle.snapshot(&at("09:03:00")).is_empty());
        assert!(oracle.snapshot(&at("not a time")).is_empty());
    }

    #[test]
    fn test_congestion_extends_dwell_and_reports_delay() {
        let oracle = single_hop();
        let mut query = at("09:00:40");
        query.congested = vec!["A".into()];
        query.weather = WeatherLevel::Severe;

        let records = oracle.snapshot(&query);
        assert_eq!(records[0].status, Some(VehicleStatus::Stopped));
        assert_eq!(records[0].delay_seconds, Some(20.0));

        query.time = "09:00:50".into();
        let records = oracle.snapshot(&query);
        assert_eq!(records[0].status, Some(VehicleStatus::Moving));
        assert_eq!(records[0].delay_seconds, Some(20.0));
    }

    #[test]
    fn test_filters() {
        let oracle = single_hop();
        let mut query = at("09:00:10");
        query.line = "3".into();
        assert!(oracle.snapshot(&query).is_empty());

        query.line = "2".into();
        query.weekday = "1".into();
        assert!(oracle.snapshot(&query).is_empty());
    }

    #[test]
    fn test_demo_is_deterministic_and_numbers_collide() {
        let a = TimetableOracle::demo(9);
        let b = TimetableOracle::demo(9);
        assert_eq!(a.rows(), b.rows());
        assert_eq!(a.stations().len(), 12);
        assert_eq!(a.lines().len(), 2);

        let records = a.snapshot(&at("09:00:00"));
        let on_two = records.iter().any(|r| r.line == "2" && r.id == "1001")
            && records.iter().any(|r| r.line == "3" && r.id == "1001");
        assert!(on_two);
    }
}
