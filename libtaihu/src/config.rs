use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use derivative::Derivative;
use serde::{Deserialize, Serialize};

/// House rules and timing of a table. Every field has a default, so an empty
/// JSON object is a valid config.
#[derive(Debug, Clone, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct RuleConfig {
    #[derivative(Default(value = "16"))]
    pub hand_size: u8,
    /// The hand is drawn once the wall holds this many tiles or fewer.
    #[derivative(Default(value = "16"))]
    pub dead_wall: u32,
    #[derivative(Default(value = "true"))]
    pub honors: bool,
    #[derivative(Default(value = "true"))]
    pub flowers: bool,
    /// Every seat passes three same-suit tiles before the short suit is
    /// chosen.
    #[derivative(Default(value = "true"))]
    pub change_tiles: bool,
    #[derivative(Default(value = "true"))]
    pub short_suit: bool,
    /// Winners stay at the table until three seats have won.
    pub play_until_last: bool,
    #[derivative(Default(value = "1"))]
    pub min_tai: i32,
    #[derivative(Default(value = "16"))]
    pub short_suit_penalty: i32,
    #[derivative(Default(value = "2"))]
    pub kong_payment: i32,
    #[derivative(Default(value = "1"))]
    pub upgrade_kong_payment: i32,
    #[derivative(Default(value = "true"))]
    pub banker_bonus: bool,

    #[derivative(Default(value = "10_000"))]
    pub discard_timeout_ms: u64,
    #[derivative(Default(value = "10_000"))]
    pub command_timeout_ms: u64,
    #[derivative(Default(value = "5_000"))]
    pub rob_kong_timeout_ms: u64,
    #[derivative(Default(value = "30_000"))]
    pub change_tiles_timeout_ms: u64,
    #[derivative(Default(value = "10_000"))]
    pub short_suit_timeout_ms: u64,
}

impl RuleConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=16).contains(&self.hand_size) && self.hand_size % 3 == 1,
            "hand_size must be 3n+1 and at most 16, got {}",
            self.hand_size,
        );
        ensure!(self.min_tai >= 0, "min_tai must not be negative");
        ensure!(
            self.kong_payment >= 0 && self.upgrade_kong_payment >= 0 && self.short_suit_penalty >= 0,
            "payments must not be negative",
        );
        Ok(())
    }

    #[inline]
    #[must_use]
    pub const fn discard_timeout(&self) -> Duration {
        Duration::from_millis(self.discard_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub const fn rob_kong_timeout(&self) -> Duration {
        Duration::from_millis(self.rob_kong_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub const fn change_tiles_timeout(&self) -> Duration {
        Duration::from_millis(self.change_tiles_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub const fn short_suit_timeout(&self) -> Duration {
        Duration::from_millis(self.short_suit_timeout_ms)
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    pub fn partial_json_keeps_defaults() {
        let config: RuleConfig =
            serde_json::from_str(r#"{"play_until_last": true, "rob_kong_timeout_ms": 50}"#).unwrap();
        assert!(config.play_until_last);
        assert_eq!(config.rob_kong_timeout(), Duration::from_millis(50));
        assert_eq!(config.hand_size, 16);
        assert_eq!(config.dead_wall, 16);
        assert_eq!(config.short_suit_penalty, 16);
        assert!(config.short_suit);
        assert!(config.change_tiles);
        config.validate().unwrap();
    }

    #[test]
    pub fn rejects_bad_hand_size() {
        let config = RuleConfig {
            hand_size: 15,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = RuleConfig {
            hand_size: 13,
            ..Default::default()
        };
        config.validate().unwrap();
    }
}
