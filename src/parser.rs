//! Input line parsing
//!
//! Each line is `device_type<TAB>device_id<TAB>lat<TAB>lon<TAB>app[,app...]`.
//! Geo coordinates must be valid; the apps list is parsed leniently.

use crate::error::ParseError;
use crate::types::Record;
use tracing::info;

const FIELD_COUNT: usize = 5;

/// Parse one raw line into a [`Record`]
///
/// The line may still carry surrounding whitespace; it is trimmed after UTF-8
/// decoding.
///
/// # Errors
///
/// Returns a [`ParseError`] when the line is not UTF-8, does not have exactly
/// five fields, has an empty device type or id, or has a latitude/longitude that
/// is not a finite number. Non-numeric app ids are not an error: they are dropped.
pub fn parse_line(line: &[u8]) -> Result<Record, ParseError> {
    let text = std::str::from_utf8(line)?.trim();
    let fields: Vec<&str> = text.split('\t').collect();

    let &[device_type, device_id, lat, lon, raw_apps] = fields.as_slice() else {
        let found = fields.len();
        return Err(if found < FIELD_COUNT {
            ParseError::MissingFields { found }
        } else {
            ParseError::TooManyFields { found }
        });
    };

    if device_type.is_empty() || device_id.is_empty() {
        return Err(ParseError::EmptyIdentifier);
    }

    let apps = parse_apps(raw_apps, text);

    let lat = parse_coordinate("lat", lat, text)?;
    let lon = parse_coordinate("lon", lon, text)?;

    Ok(Record {
        device_type: device_type.to_string(),
        device_id: device_id.to_string(),
        lat,
        lon,
        apps,
    })
}

/// Parse the comma-separated app ids.
///
/// If every entry is an integer they are all kept. Otherwise only the entries
/// made purely of ASCII digits survive.
fn parse_apps(raw: &str, line: &str) -> Vec<i64> {
    let strict: Result<Vec<i64>, _> = raw.split(',').map(|app| app.trim().parse()).collect();
    match strict {
        Ok(apps) => apps,
        Err(_) => {
            info!(line, "Not all user apps are digits");
            raw.split(',')
                .filter(|app| !app.is_empty() && app.bytes().all(|b| b.is_ascii_digit()))
                .filter_map(|app| app.parse().ok())
                .collect()
        }
    }
}

fn parse_coordinate(field: &'static str, raw: &str, line: &str) -> Result<f64, ParseError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => {
            info!(line, field, "Invalid geo coords");
            Err(ParseError::InvalidGeo {
                field,
                value: raw.to_string(),
            })
        }
    }
}
