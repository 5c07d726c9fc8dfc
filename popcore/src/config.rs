use crate::*;
use ed25519_dalek::PublicKey;
use std::env::var;

/// 2020-01-01T00:00:00Z, no protocol timestamp may predate it
pub const DEFAULT_TIMESTAMP_FLOOR: i64 = 1_577_833_200;

pub const DEFAULT_MAX_CLOCK_SKEW: i64 = 600;

/// Validation settings of a node
#[derive(Clone, Debug)]
pub struct Config {
    /// Timestamps earlier than this are stale
    pub timestamp_floor: i64,

    /// Timestamps more than this many seconds ahead of the local clock are rejected
    pub max_clock_skew: i64,

    /// Backend key expected to sign election results.
    ///
    /// When unset, election-result messages skip envelope verification entirely.
    pub result_authority_key: Option<PublicKey>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timestamp_floor: DEFAULT_TIMESTAMP_FLOOR,
            max_clock_skew: DEFAULT_MAX_CLOCK_SKEW,
            result_authority_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Config::default();

        if let Ok(val) = var("POPCORE_TIMESTAMP_FLOOR") {
            config.timestamp_floor = val
                .parse()
                .map_err(|_| Error::InvalidConfig("POPCORE_TIMESTAMP_FLOOR", val))?;
        }

        if let Ok(val) = var("POPCORE_MAX_CLOCK_SKEW") {
            config.max_clock_skew = val
                .parse()
                .map_err(|_| Error::InvalidConfig("POPCORE_MAX_CLOCK_SKEW", val))?;
        }

        if let Ok(val) = var("POPCORE_RESULT_AUTHORITY_KEY") {
            let key = public_key_from_b64(&val)
                .map_err(|e| Error::InvalidConfig("POPCORE_RESULT_AUTHORITY_KEY", e))?;
            config.result_authority_key = Some(key);
        }

        Ok(config)
    }

    /// Reject timestamps that are before the floor or too far in the future
    pub fn check_timestamp(&self, field: &'static str, timestamp: i64) -> Result<(), ValidationError> {
        if timestamp < self.timestamp_floor {
            return Err(ValidationError::StaleTimestamp(
                field,
                timestamp,
                self.timestamp_floor,
            ));
        }
        if timestamp > now() + self.max_clock_skew {
            return Err(ValidationError::FutureTimestamp(field, timestamp));
        }
        Ok(())
    }
}
