use chrono::{ NaiveDate, NaiveTime };
use serde::{ Serialize, Deserialize };

use crate::error::ChatError;

/// Birth details used as consultation context. Stored as the single local
/// profile record and sent along when a new chat is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BirthProfile {
    pub date: String,
    pub time: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl BirthProfile {
    pub fn new(
        date: impl Into<String>,
        time: impl Into<String>,
        latitude: f64,
        longitude: f64
    ) -> Self {
        Self {
            date: date.into(),
            time: time.into(),
            latitude,
            longitude,
        }
    }

    /// Basic shape checks for the intake form: a calendar date, a clock time
    /// and coordinates in range.
    pub fn validate(&self) -> Result<(), ChatError> {
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").map_err(|_|
            ChatError::validation(format!("Invalid birth date '{}', expected YYYY-MM-DD", self.date))
        )?;
        let time = self.time.trim();
        NaiveTime::parse_from_str(time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
            .map_err(|_|
                ChatError::validation(format!("Invalid birth time '{}', expected HH:MM", self.time))
            )?;
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ChatError::validation(format!("Latitude {} is outside [-90, 90]", self.latitude)));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(
                ChatError::validation(format!("Longitude {} is outside [-180, 180]", self.longitude))
            );
        }
        Ok(())
    }
}
