use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{Error, Result};

const NODE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Seconds since the unix epoch.
pub fn create_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since_the_epoch| since_the_epoch.as_secs())
        .unwrap_or(0)
}

/// Render seconds since the epoch the way the node expects, e.g. `2018-02-13T10:12:32`.
pub fn format_timestamp(seconds: u32) -> String {
    match DateTime::<Utc>::from_timestamp(seconds as i64, 0) {
        Some(datetime) => datetime.format(NODE_TIME_FORMAT).to_string(),
        None => String::new(),
    }
}

/// Parse a node timestamp back into seconds since the epoch.
pub fn parse_timestamp(text: &str) -> Result<u32> {
    let naive = NaiveDateTime::parse_from_str(text, NODE_TIME_FORMAT)
        .map_err(|e| Error::Decode(format!("invalid node time {:?}: {}", text, e)))?;
    u32::try_from(naive.and_utc().timestamp())
        .map_err(|_| Error::Decode(format!("node time {:?} is out of range", text)))
}
