//! Message body decoding.

use crate::record::WeatherRecord;

/// A message body that can never become a valid record.
#[derive(Debug, thiserror::Error)]
#[error("invalid weather payload: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Decode a raw message body into a [`WeatherRecord`].
///
/// Purely structural: values are not range-checked. Unknown fields are ignored,
/// missing fields and type mismatches are errors.
pub fn decode(body: &[u8]) -> Result<WeatherRecord, DecodeError> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOTHAM: &str = r#"{
        "location": {"lat": "-10", "lon": "-20"},
        "timestamp": "2025-01-01T12:00:00Z",
        "temperature": 20.0,
        "humidity": 80,
        "wind_speed": 5.5,
        "condition_code": 200,
        "rain_probability": 30,
        "city": "Gotham"
    }"#;

    #[test]
    fn decodes_well_formed_body() {
        let record = decode(GOTHAM.as_bytes()).unwrap();
        assert_eq!(record.city, "Gotham");
        assert_eq!(record.location.lat, "-10");
        assert_eq!(record.location.lon, "-20");
        assert_eq!(record.timestamp, "2025-01-01T12:00:00Z");
        assert_eq!(record.temperature, 20.0);
        assert_eq!(record.humidity, 80);
        assert_eq!(record.wind_speed, 5.5);
        assert_eq!(record.condition_code, 200);
        assert_eq!(record.rain_probability, 30);
    }

    #[test]
    fn ignores_unknown_fields() {
        let body = GOTHAM.replace("\"city\"", "\"source\": \"open-meteo\", \"city\"");
        assert!(decode(body.as_bytes()).is_ok());
    }

    #[test]
    fn does_not_range_check_values() {
        let body = GOTHAM.replace("\"humidity\": 80", "\"humidity\": 250");
        assert_eq!(decode(body.as_bytes()).unwrap().humidity, 250);
    }

    #[test]
    fn rejects_missing_field() {
        let body = GOTHAM.replace("\"city\": \"Gotham\"", "\"city_name\": \"Gotham\"");
        assert!(decode(body.as_bytes()).is_err());
    }

    #[test]
    fn rejects_type_mismatch() {
        // lat must be a string
        let body = GOTHAM.replace("\"lat\": \"-10\"", "\"lat\": -10");
        assert!(decode(body.as_bytes()).is_err());

        let body = GOTHAM.replace("\"humidity\": 80", "\"humidity\": \"80\"");
        assert!(decode(body.as_bytes()).is_err());
    }

    #[test]
    fn rejects_non_json_and_empty_bodies() {
        assert!(decode(b"").is_err());
        assert!(decode(b"not json").is_err());
        assert!(decode(b"[1, 2, 3]").is_err());
        assert!(decode(&[0xff, 0xfe, 0x00]).is_err());
    }
}
