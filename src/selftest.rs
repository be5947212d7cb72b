//! Built-in sanity check of the parse and serialize path (`--test`)

use crate::codec::{self, UserApps};
use crate::error::{Error, Result};
use crate::parser::parse_line;
use tracing::info;

/// Sample lines in the production input format
pub const SAMPLE: &[&str] = &[
    "idfa\t1rfw452y52g2gq4g\t55.55\t42.42\t1423,43,567,3,7,23",
    "gaid\t7rfw452y52g2gq4g\t55.55\t42.42\t7423,424",
];

/// Parse, encode and decode every sample line, checking the payload survives
///
/// Returns the number of lines checked.
pub fn run() -> Result<usize> {
    for line in SAMPLE {
        let record = parse_line(line.as_bytes())
            .map_err(|e| Error::SelfTest(format!("sample line rejected: {e}")))?;
        let expected = UserApps::from(&record);
        let bytes = codec::encode(&record);
        let decoded = codec::decode(&bytes)
            .map_err(|e| Error::SelfTest(format!("payload does not decode: {e}")))?;
        if decoded != expected {
            return Err(Error::SelfTest(format!(
                "round trip mismatch for {}: {} != {}",
                record.store_key(),
                decoded.describe(),
                expected.describe()
            )));
        }
        info!(key = %record.store_key(), payload = %decoded.describe(), "Self-test line ok");
    }
    Ok(SAMPLE.len())
}
