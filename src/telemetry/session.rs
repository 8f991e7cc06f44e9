//! Session file naming for the pull-loop listeners.

use chrono::{DateTime, TimeZone, Utc};

use crate::record::FlatRecord;

/// Column holding the arrival time in microseconds since the Unix epoch
pub const ARRIVAL_TIME_COLUMN: &str = "arrival_time_us";

/// Destination key for a listener session started at `started`
///
/// Sessions are grouped by day: `YYYY-MM-DD/HH-MM-SS.csv`.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use telemetry_ingest::telemetry::session::session_key;
///
/// let started = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
/// assert_eq!(session_key(&started), "2024-03-09/07-05-01.csv");
/// ```
pub fn session_key<Tz: TimeZone>(started: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    started.format("%Y-%m-%d/%H-%M-%S.csv").to_string()
}

/// Start a record whose first column is the arrival timestamp
pub fn timestamped_record(arrival: DateTime<Utc>) -> FlatRecord {
    let mut record = FlatRecord::new();
    record.insert(ARRIVAL_TIME_COLUMN, arrival.timestamp_micros());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LeafValue;

    #[test]
    fn test_session_key_zero_pads() {
        let started = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(session_key(&started), "2025-01-02/03-04-05.csv");
    }

    #[test]
    fn test_timestamped_record_uses_micros() {
        let arrival = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        let record = timestamped_record(arrival);

        assert_eq!(record.keys().collect::<Vec<_>>(), vec![ARRIVAL_TIME_COLUMN]);
        assert_eq!(
            record.get(ARRIVAL_TIME_COLUMN),
            Some(&LeafValue::from(1_700_000_000_123_456i64))
        );
    }
}
