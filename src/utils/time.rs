use chrono::NaiveDate;

/// This is the standard way of converting a date to a string in gridtrack.
/// Matches the date keys the tracking extensions write into their logs.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
