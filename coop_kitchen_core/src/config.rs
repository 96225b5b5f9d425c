// Tunable environment parameters.
//
// Every timing constant and reward magnitude the simulation uses is read from
// `EnvConfig`; nothing in `environment.rs` hard-codes a number. Defaults are
// the constants used for training. Configs deserialize from JSON with every
// field optional, so a file only needs to name what it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors produced while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Whether shaping rewards are paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RewardMode {
    /// All shaping terms active.
    #[default]
    Shaped,
    /// Only serve, failure, penalty and terminal terms.
    Sparse,
}

/// Reward magnitudes. Penalties are stored as negative numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Applied on every step.
    pub step_penalty: f32,
    /// Adding an ingredient the pot cannot use.
    pub invalid_pot_add: f32,
    /// Successful ingredient addition (shaping).
    pub ingredient_added: f32,
    /// Pot finished cooking (shaping).
    pub soup_cooked: f32,
    /// Pot burnt its soup.
    pub soup_burnt: f32,
    /// Filling a bowl with a done soup some active order wants (shaping).
    pub soup_collected: f32,
    /// Filling a bowl with a done soup no active order wants.
    pub unwanted_soup_collected: f32,
    /// Filling a bowl with a burnt soup.
    pub burnt_soup_collected: f32,
    /// Fixed part of a successful serve.
    pub serve_base: f32,
    /// Scaled by the fraction of the order window still left.
    pub serve_time_bonus: f32,
    /// Serving a done soup nobody ordered.
    pub wrong_serve: f32,
    /// Serving an undercooked or burnt soup.
    pub bad_soup_serve: f32,
    /// Order deadline passed.
    pub order_failed: f32,
    /// Throwing an item away.
    pub garbage: f32,
    /// Leaving a done soup on a handoff counter (shaping).
    pub handoff: f32,
    /// Every order served and none failed at episode end.
    pub perfect_bonus: f32,
    /// Shaping for ingredient additions, cooked soups and pickups stops after
    /// this many soups were collected in the episode.
    pub soup_reward_cap: u32,
    /// Handoff shaping is paid at most this many times per episode.
    pub handoff_reward_cap: u32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            step_penalty: -0.01,
            invalid_pot_add: -0.01,
            ingredient_added: 1.0,
            soup_cooked: 1.0,
            soup_burnt: -3.0,
            soup_collected: 2.0,
            unwanted_soup_collected: 0.0,
            burnt_soup_collected: -3.0,
            serve_base: 15.0,
            serve_time_bonus: 5.0,
            wrong_serve: -2.0,
            bad_soup_serve: -2.0,
            order_failed: -2.0,
            garbage: 0.0,
            handoff: 2.0,
            perfect_bonus: 10.0,
            soup_reward_cap: 3,
            handoff_reward_cap: 3,
        }
    }
}

/// Parameters of the seeded order generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderGenConfig {
    pub orders_per_episode: usize,
    /// Inclusive range of steps between consecutive order starts.
    pub order_gap_min: u32,
    pub order_gap_max: u32,
}

impl Default for OrderGenConfig {
    fn default() -> Self {
        Self {
            orders_per_episode: 3,
            order_gap_min: 150,
            order_gap_max: 300,
        }
    }
}

/// Environment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Episode length cap.
    pub max_steps: u32,
    /// Steps an order stays open after activation.
    pub order_time: u32,
    /// Pot timer value at which a soup is done.
    pub cook_time: u32,
    /// Pot timer value at which a done soup burns.
    pub burn_time: u32,
    /// Steps the serving station keeps showing the last serve.
    pub serve_display_ticks: u32,
    /// Carried for external renderers; unused by the simulation.
    pub tile_size: u32,
    pub header_size: u32,
    pub render: bool,
    pub reward_mode: RewardMode,
    pub rewards: RewardConfig,
    pub orders: OrderGenConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            order_time: 600,
            cook_time: 200,
            burn_time: 350,
            serve_display_ticks: 30,
            tile_size: 60,
            header_size: 0,
            render: false,
            reward_mode: RewardMode::Shaped,
            rewards: RewardConfig::default(),
            orders: OrderGenConfig::default(),
        }
    }
}

impl EnvConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EnvConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid("max_steps must be positive".into()));
        }
        if self.order_time == 0 {
            return Err(ConfigError::Invalid("order_time must be positive".into()));
        }
        if self.cook_time >= self.burn_time {
            return Err(ConfigError::Invalid(format!(
                "cook_time ({}) must be below burn_time ({})",
                self.cook_time, self.burn_time
            )));
        }
        if self.orders.orders_per_episode == 0 {
            return Err(ConfigError::Invalid(
                "orders_per_episode must be positive".into(),
            ));
        }
        if self.orders.order_gap_min > self.orders.order_gap_max {
            return Err(ConfigError::Invalid(format!(
                "order_gap_min ({}) exceeds order_gap_max ({})",
                self.orders.order_gap_min, self.orders.order_gap_max
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn shaped(&self) -> bool {
        self.reward_mode == RewardMode::Shaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EnvConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cook_time, 200);
        assert_eq!(config.burn_time, 350);
        assert!((config.rewards.step_penalty + 0.01).abs() < 1e-6);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            EnvConfig::from_json_str(r#"{"max_steps": 50, "rewards": {"handoff": 0.5}}"#).unwrap();
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.order_time, 600);
        assert!((config.rewards.handoff - 0.5).abs() < 1e-6);
        assert!((config.rewards.serve_base - 15.0).abs() < 1e-6);
        assert_eq!(config.reward_mode, RewardMode::Shaped);
    }

    #[test]
    fn sparse_mode_parses() {
        let config = EnvConfig::from_json_str(r#"{"reward_mode": "sparse"}"#).unwrap();
        assert!(!config.shaped());
    }

    #[test]
    fn rejects_inverted_timers() {
        let err = EnvConfig::from_json_str(r#"{"cook_time": 400}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = EnvConfig::from_json_str(r#"{"max_steps": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            EnvConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
