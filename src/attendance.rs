use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Local};

/// Period-keyed presence map. Keys are only ever added or overwritten; a
/// "reset" writes `false` under the current period instead of removing it, so
/// the history of prior periods is kept indefinitely.
pub type AttendanceMap = BTreeMap<String, bool>;

/// The independently-tracked attendance dimensions of one roster.
///
/// `Visited` is month-keyed (home visitation). `Gathering` and `Activity`
/// are date-keyed; `Activity` only exists for stages whose directory entry
/// carries the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Visited,
    Gathering,
    Activity,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Visited => "visited",
            Dimension::Gathering => "gathering",
            Dimension::Activity => "activity",
        }
    }

    pub fn parse(s: &str) -> Option<Dimension> {
        match s {
            "visited" => Some(Dimension::Visited),
            "gathering" => Some(Dimension::Gathering),
            "activity" => Some(Dimension::Activity),
            _ => None,
        }
    }

    pub fn month_keyed(&self) -> bool {
        matches!(self, Dimension::Visited)
    }

    /// True when `period` has the key shape this dimension expects
    /// (`YYYY-MM` for month-keyed, `YYYY-MM-DD` otherwise).
    pub fn valid_period(&self, period: &str) -> bool {
        if self.month_keyed() {
            is_month_key(period)
        } else {
            is_date_key(period)
        }
    }

    /// Today's period in this dimension's key shape.
    pub fn current_period(&self) -> String {
        let now = Local::now();
        if self.month_keyed() {
            format!("{:04}-{:02}", now.year(), now.month())
        } else {
            format!("{:04}-{:02}-{:02}", now.year(), now.month(), now.day())
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_month_key(s: &str) -> bool {
    let Some((y, m)) = s.split_once('-') else {
        return false;
    };
    parse_year(y).is_some() && parse_month(m).is_some()
}

fn is_date_key(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 3 {
        return false;
    }
    let (Some(y), Some(m)) = (parse_year(parts[0]), parse_month(parts[1])) else {
        return false;
    };
    let Some(d) = parse_two_digits(parts[2]) else {
        return false;
    };
    d >= 1 && d <= days_in_month(y, m)
}

fn parse_year(s: &str) -> Option<i32> {
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_month(s: &str) -> Option<u32> {
    let m = parse_two_digits(s)?;
    (1..=12).contains(&m).then_some(m)
}

fn parse_two_digits(s: &str) -> Option<u32> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => 30,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_keys_validate_shape() {
        assert!(Dimension::Visited.valid_period("2025-01"));
        assert!(Dimension::Visited.valid_period("2025-12"));
        assert!(!Dimension::Visited.valid_period("2025-13"));
        assert!(!Dimension::Visited.valid_period("2025-1"));
        assert!(!Dimension::Visited.valid_period("2025-01-01"));
        assert!(!Dimension::Visited.valid_period(""));
    }

    #[test]
    fn date_keys_validate_shape_and_calendar() {
        assert!(Dimension::Gathering.valid_period("2025-03-31"));
        assert!(Dimension::Activity.valid_period("2024-02-29"));
        assert!(!Dimension::Gathering.valid_period("2025-02-29"));
        assert!(!Dimension::Gathering.valid_period("2025-04-31"));
        assert!(!Dimension::Gathering.valid_period("2025-03"));
        assert!(!Dimension::Gathering.valid_period("2025-3-01"));
    }

    #[test]
    fn dimension_names_roundtrip() {
        for d in [Dimension::Visited, Dimension::Gathering, Dimension::Activity] {
            assert_eq!(Dimension::parse(d.as_str()), Some(d));
        }
        assert_eq!(Dimension::parse("days"), None);
    }

    #[test]
    fn current_period_has_expected_shape() {
        assert!(Dimension::Visited.valid_period(&Dimension::Visited.current_period()));
        assert!(Dimension::Gathering.valid_period(&Dimension::Gathering.current_period()));
    }
}
