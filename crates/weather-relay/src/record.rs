//! Canonical weather observation shape shared by the queue and the API.

use serde::{Deserialize, Serialize};

/// Geographic position as the producer reports it (decimal strings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: String,
    pub lon: String,
}

/// One weather observation.
///
/// The same shape is read from the queue and posted to `/api/weather`, so
/// field names here are the wire names on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub location: Location,
    /// ISO-8601 observation time
    pub timestamp: String,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: i64,
    pub wind_speed: f64,
    /// Weather condition code assigned by the producer
    pub condition_code: i64,
    /// Rain probability, percent
    pub rain_probability: i64,
    pub city: String,
}
