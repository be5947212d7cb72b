//! Stored payload encoding
//!
//! Payloads use the `UserApps` protobuf message:
//!
//! ```text
//! message UserApps {
//!     repeated uint32 apps = 1;
//!     optional double lat = 2;
//!     optional double lon = 3;
//! }
//! ```
//!
//! Apps are carried as `int64` here. Both types are plain varints on the wire,
//! so values in the `uint32` range produce identical bytes and existing readers
//! keep working.

use crate::types::Record;
use prost::Message;
use std::fmt::Write;

/// Protobuf payload stored under a record's key
#[derive(Clone, PartialEq, Message)]
pub struct UserApps {
    /// Installed application ids
    #[prost(int64, repeated, packed = "false", tag = "1")]
    pub apps: Vec<i64>,
    /// Latitude
    #[prost(double, optional, tag = "2")]
    pub lat: Option<f64>,
    /// Longitude
    #[prost(double, optional, tag = "3")]
    pub lon: Option<f64>,
}

impl From<&Record> for UserApps {
    fn from(record: &Record) -> Self {
        Self {
            apps: record.apps.clone(),
            lat: Some(record.lat),
            lon: Some(record.lon),
        }
    }
}

impl UserApps {
    /// Single-line text form used by dry-run diagnostics
    ///
    /// e.g. `apps: 1 apps: 2 lat: 55.55 lon: 42.42`
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for app in &self.apps {
            let _ = write!(out, "apps: {app} ");
        }
        if let Some(lat) = self.lat {
            let _ = write!(out, "lat: {lat} ");
        }
        if let Some(lon) = self.lon {
            let _ = write!(out, "lon: {lon} ");
        }
        out.truncate(out.trim_end().len());
        out
    }
}

/// Encode a record's payload. Device type and id are not part of it.
pub fn encode(record: &Record) -> Vec<u8> {
    UserApps::from(record).encode_to_vec()
}

/// Decode a stored payload
pub fn decode(bytes: &[u8]) -> Result<UserApps, prost::DecodeError> {
    UserApps::decode(bytes)
}
