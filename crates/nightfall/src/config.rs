//! Server configuration from the environment.
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `NIGHTFALL_BIND` | listen address | `0.0.0.0:8080` |
//! | `NIGHTFALL_DAY_SECS` | Day length | 90 |
//! | `NIGHTFALL_NIGHT_SECS` | Night length | 45 |
//! | `NIGHTFALL_BETWEEN_SECS` | pause between Day and Night | 10 |
//! | `NIGHTFALL_END_DAY` | stalemate once this day is reached | 10 |
//! | `NIGHTFALL_MIN_PLAYERS` | players needed to start | 4 |
//! | `NIGHTFALL_MAX_MESSAGE_BYTES` | largest frame a client may send | 16384 |
//!
//! The binary loads a `.env` file first, so the same names work there.

use std::env::{self, VarError};
use std::str::FromStr;
use std::time::Duration;

use nightfall_engine::GameConfig;
use nightfall_room::RoomConfig;
use nightfall_transport::TransportConfig;

pub const BIND_VAR: &str = "NIGHTFALL_BIND";
pub const DAY_SECS_VAR: &str = "NIGHTFALL_DAY_SECS";
pub const NIGHT_SECS_VAR: &str = "NIGHTFALL_NIGHT_SECS";
pub const BETWEEN_SECS_VAR: &str = "NIGHTFALL_BETWEEN_SECS";
pub const END_DAY_VAR: &str = "NIGHTFALL_END_DAY";
pub const MIN_PLAYERS_VAR: &str = "NIGHTFALL_MIN_PLAYERS";
pub const MAX_MESSAGE_VAR: &str = "NIGHTFALL_MAX_MESSAGE_BYTES";

/// Errors in the server configuration. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but does not parse.
    #[error("{key} must be a {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A variable is set but is not valid Unicode.
    #[error("{0} is not valid unicode")]
    NotUnicode(&'static str),
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub game: GameConfig,
    pub room: RoomConfig,
    pub transport: TransportConfig,
    /// How long a new connection may take to send `join-room`.
    pub join_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_owned(),
            game: GameConfig::default(),
            room: RoomConfig::default(),
            transport: TransportConfig::default(),
            join_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Reads the `NIGHTFALL_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(key)),
        })
    }

    /// Builds a config from an arbitrary variable source. Unset variables
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<Option<String>, ConfigError>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup(BIND_VAR)? {
            let addr = addr.trim();
            if addr.is_empty() {
                return Err(ConfigError::Invalid {
                    key: BIND_VAR,
                    value: addr.to_owned(),
                    expected: "host:port address",
                });
            }
            config.bind_addr = addr.to_owned();
        }
        if let Some(secs) = positive::<u64>(&lookup, DAY_SECS_VAR, "positive number of seconds")? {
            config.game.day_duration = Duration::from_secs(secs);
        }
        if let Some(secs) = positive::<u64>(&lookup, NIGHT_SECS_VAR, "positive number of seconds")? {
            config.game.night_duration = Duration::from_secs(secs);
        }
        if let Some(secs) =
            positive::<u64>(&lookup, BETWEEN_SECS_VAR, "positive number of seconds")?
        {
            config.game.between_duration = Duration::from_secs(secs);
        }
        if let Some(day) = positive::<u32>(&lookup, END_DAY_VAR, "positive day number")? {
            config.game.end_day = day;
        }
        if let Some(min) = positive::<usize>(&lookup, MIN_PLAYERS_VAR, "positive player count")? {
            config.game.min_players = min;
            config.game.max_players = config.game.max_players.max(min);
        }
        if let Some(bytes) = positive::<usize>(&lookup, MAX_MESSAGE_VAR, "positive byte count")? {
            config.transport.max_message_size = bytes;
        }

        Ok(config)
    }
}

/// Parse an optional variable that must be a number above zero.
fn positive<T>(
    lookup: &impl Fn(&'static str) -> Result<Option<String>, ConfigError>,
    key: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(key)? else {
        return Ok(None);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(Some(value)),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw,
            expected,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&'static str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<&'static str, String> = pairs
            .iter()
            .map(|(k, v)| (*k, (*v).to_owned()))
            .collect();
        ServerConfig::from_lookup(|key| Ok(vars.get(key).cloned()))
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.game, GameConfig::default());
        assert_eq!(config.transport, TransportConfig::default());
        assert_eq!(config.join_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_every_variable_overrides_its_field() {
        let config = from_pairs(&[
            (BIND_VAR, "127.0.0.1:9000"),
            (DAY_SECS_VAR, "60"),
            (NIGHT_SECS_VAR, "30"),
            (BETWEEN_SECS_VAR, " 5 "),
            (END_DAY_VAR, "7"),
            (MIN_PLAYERS_VAR, "6"),
            (MAX_MESSAGE_VAR, "4096"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.game.day_duration, Duration::from_secs(60));
        assert_eq!(config.game.night_duration, Duration::from_secs(30));
        assert_eq!(config.game.between_duration, Duration::from_secs(5));
        assert_eq!(config.game.end_day, 7);
        assert_eq!(config.game.min_players, 6);
        assert_eq!(config.transport.max_message_size, 4096);
    }

    #[test]
    fn test_min_players_above_max_raises_max() {
        let config = from_pairs(&[(MIN_PLAYERS_VAR, "20")]).unwrap();
        assert_eq!(config.game.min_players, 20);
        assert_eq!(config.game.max_players, 20);
    }

    #[test]
    fn test_unparsable_number_is_an_error() {
        let err = from_pairs(&[(DAY_SECS_VAR, "soon")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: DAY_SECS_VAR, .. }
        ));
    }

    #[test]
    fn test_zero_is_rejected() {
        assert!(from_pairs(&[(NIGHT_SECS_VAR, "0")]).is_err());
        assert!(from_pairs(&[(MIN_PLAYERS_VAR, "0")]).is_err());
        assert!(from_pairs(&[(END_DAY_VAR, "-1")]).is_err());
    }

    #[test]
    fn test_blank_bind_address_is_rejected() {
        let err = from_pairs(&[(BIND_VAR, "  ")]).unwrap_err();
        assert!(err.to_string().contains(BIND_VAR));
    }

    #[test]
    fn test_lookup_errors_propagate() {
        let err = ServerConfig::from_lookup(|key| Err(ConfigError::NotUnicode(key))).unwrap_err();
        assert!(matches!(err, ConfigError::NotUnicode(BIND_VAR)));
    }
}
