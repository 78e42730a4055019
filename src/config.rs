//! Runtime Configuration
//!
//! Simulation and relay settings with defaults matching the reference maze.
//! Both load from JSON; missing fields fall back to their defaults.

use std::net::SocketAddr;
use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::game::collision::CollisionScan;
use crate::game::grid::{check_grid_size, GridError};
use crate::game::player::{PLAYER_COLLISION_HEIGHT, PLAYER_COLLISION_WIDTH};
use crate::network::protocol::SyncPolicy;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid config JSON.
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// What is wrong
        reason: &'static str,
    },
}

/// Simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Screen width in pixels.
    pub screen_width: i32,
    /// Screen height in pixels.
    pub screen_height: i32,
    /// Grid width in tiles.
    pub grid_width: i32,
    /// Grid height in tiles.
    pub grid_height: i32,
    /// Tile width in pixels.
    pub tile_width: i32,
    /// Tile height in pixels.
    pub tile_height: i32,
    /// Player collision box width.
    pub player_width: i32,
    /// Player collision box height.
    pub player_height: i32,
    /// Maze layout seed.
    pub maze_seed: u64,
    /// Each tile is a wall with a 1-in-N chance (0 = no walls).
    pub wall_one_in: u32,
    /// Sprite id players are drawn with.
    pub player_sprite: u16,
    /// Candidate selection for tile collisions.
    pub collision_scan: CollisionScan,
    /// Fields carried by outgoing updates.
    pub sync_policy: SyncPolicy,
    /// Disconnect a peer whose message fails to decode.
    pub disconnect_on_decode_error: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            screen_width: 1067,
            screen_height: 600,
            grid_width: 40,
            grid_height: 40,
            tile_width: 48,
            tile_height: 48,
            player_width: PLAYER_COLLISION_WIDTH,
            player_height: PLAYER_COLLISION_HEIGHT,
            maze_seed: 50,
            wall_one_in: 10,
            player_sprite: 2,
            collision_scan: CollisionScan::BruteForce,
            sync_policy: SyncPolicy::FullState,
            disconnect_on_decode_error: false,
        }
    }
}

impl SimConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screen_width <= 0 || self.screen_height <= 0 {
            return Err(ConfigError::Invalid {
                field: "screen",
                reason: "must be positive",
            });
        }
        if self.player_width <= 0 || self.player_height <= 0 {
            return Err(ConfigError::Invalid {
                field: "player",
                reason: "must be positive",
            });
        }
        match check_grid_size(self.grid_width, self.grid_height, self.tile_width, self.tile_height) {
            Ok(()) => Ok(()),
            Err(GridError::TooLarge { .. }) => Err(ConfigError::Invalid {
                field: "grid",
                reason: "stage size overflows i32",
            }),
            Err(_) => Err(ConfigError::Invalid {
                field: "grid",
                reason: "must be positive",
            }),
        }
    }
}

/// Relay server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Per-connection outgoing frame queue.
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 64,
            channel_capacity: 256,
        }
    }
}

impl RelayConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        if config.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "channel_capacity",
                reason: "must be at least 1",
            });
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_config_default() {
        let config = SimConfig::default();
        assert_eq!((config.screen_width, config.screen_height), (1067, 600));
        assert_eq!((config.grid_width, config.grid_height), (40, 40));
        assert_eq!((config.player_width, config.player_height), (32, 44));
        assert_eq!(config.maze_seed, 50);
        assert_eq!(config.wall_one_in, 10);
        assert_eq!(config.sync_policy, SyncPolicy::FullState);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = SimConfig::from_json(
            r#"{ "maze_seed": 7, "collision_scan": "neighborhood", "sync_policy": "changed_only" }"#,
        )
        .unwrap();
        assert_eq!(config.maze_seed, 7);
        assert_eq!(config.collision_scan, CollisionScan::Neighborhood);
        assert_eq!(config.sync_policy, SyncPolicy::ChangedOnly);
        assert_eq!(config.tile_width, 48);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(SimConfig::from_json("{ not json"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            SimConfig::from_json(r#"{ "grid_width": 0 }"#),
            Err(ConfigError::Invalid { field: "grid", .. })
        ));
        assert!(matches!(SimConfig::load("/nonexistent/maze.json"), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_oversized_stage_rejected() {
        let result = SimConfig::from_json(
            r#"{ "grid_width": 50000, "grid_height": 1, "tile_width": 50000, "wall_one_in": 0 }"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "grid", reason: "stage size overflows i32" })
        ));
    }

    #[test]
    fn test_relay_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_connections, 64);
        assert!(config.channel_capacity > 0);
    }
}
