//! # Renewal Reminder Windows
//!
//! The three reminder windows fired ahead of license expiry. The band
//! mapping is exclusive-inclusive: `(7, 30]` days maps to the 30-day
//! window, `(1, 7]` to the 7-day window, and exactly 1 day to the 1-day
//! window. Each window fires at most once per license — the fired set is
//! recorded on the license itself.

use serde::{Deserialize, Serialize};

/// A renewal reminder window, keyed by days before expiry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReminderWindow {
    /// Fired when expiry is within (7, 30] days.
    ThirtyDay,
    /// Fired when expiry is within (1, 7] days.
    SevenDay,
    /// Fired when expiry is exactly 1 day away.
    OneDay,
}

impl ReminderWindow {
    /// The nominal day count of this window.
    pub fn days(&self) -> i64 {
        match self {
            Self::ThirtyDay => 30,
            Self::SevenDay => 7,
            Self::OneDay => 1,
        }
    }

    /// The canonical string name of this window.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThirtyDay => "30_day",
            Self::SevenDay => "7_day",
            Self::OneDay => "1_day",
        }
    }

    /// Map a days-until-expiry count to the window it falls in, if any.
    ///
    /// Returns `None` for counts outside all bands — already expired
    /// (`<= 0`) or more than 30 days out.
    pub fn for_days_until_expiry(days: i64) -> Option<Self> {
        match days {
            1 => Some(Self::OneDay),
            2..=7 => Some(Self::SevenDay),
            8..=30 => Some(Self::ThirtyDay),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReminderWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_mapping_is_exclusive_inclusive() {
        assert_eq!(ReminderWindow::for_days_until_expiry(30), Some(ReminderWindow::ThirtyDay));
        assert_eq!(ReminderWindow::for_days_until_expiry(8), Some(ReminderWindow::ThirtyDay));
        assert_eq!(ReminderWindow::for_days_until_expiry(7), Some(ReminderWindow::SevenDay));
        assert_eq!(ReminderWindow::for_days_until_expiry(5), Some(ReminderWindow::SevenDay));
        assert_eq!(ReminderWindow::for_days_until_expiry(2), Some(ReminderWindow::SevenDay));
        assert_eq!(ReminderWindow::for_days_until_expiry(1), Some(ReminderWindow::OneDay));
    }

    #[test]
    fn out_of_band_counts_map_to_none() {
        assert_eq!(ReminderWindow::for_days_until_expiry(0), None);
        assert_eq!(ReminderWindow::for_days_until_expiry(-3), None);
        assert_eq!(ReminderWindow::for_days_until_expiry(31), None);
        assert_eq!(ReminderWindow::for_days_until_expiry(365), None);
    }

    #[test]
    fn window_names_round_trip_in_serde() {
        let json = serde_json::to_string(&ReminderWindow::SevenDay).unwrap();
        assert_eq!(json, "\"seven_day\"");
        let back: ReminderWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ReminderWindow::SevenDay);
    }
}
