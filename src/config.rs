//! Engine configuration.
//!
//! Defaults reproduce the game's fixed constants. With the `serde-spec`
//! feature the configuration can also be read from YAML or JSON.

use thiserror::Error;

use crate::sprites::raster::ClipRect;

/// Largest overview reduction. Scaled water tiles must stay at least a pixel apart.
pub const MAX_MAP_SCALE: i32 = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[cfg(feature = "serde-spec")]
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[cfg(feature = "serde-spec")]
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Area of the display the scrolled world is shown in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-spec", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn clip(&self) -> ClipRect {
        ClipRect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-spec", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-spec", serde(default))]
pub struct EngineConfig {
    pub screen_width: usize,
    pub screen_height: usize,
    pub back_width: usize,
    pub back_height: usize,
    pub viewport: Viewport,
    pub sprite_capacity: usize,
    pub bank_capacity: usize,
    /// Screen position of the world origin in the map overview.
    pub overview_origin: (i32, i32),
    pub map_scale: i32,
    /// Subtracted from a heightmap value to get the surface row.
    pub surface_bias: i32,
    /// First row of the water band.
    pub water_line: i32,
    pub water_colour: u8,
    pub noise_seed: u64,
    pub heightmap_base: f32,
    pub heightmap_amplitude: f32,
    pub octaves: u32,
    /// Pixels per frame for keyboard and joypad scrolling.
    pub scroll_step: i32,
    pub edge_scroll_area: f32,
    pub edge_scroll_speed: f32,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            screen_width: 640,
            screen_height: 480,
            back_width: 1920,
            back_height: 960,
            viewport: Viewport {
                x: 0,
                y: 42,
                width: 640,
                height: 360,
            },
            sprite_capacity: 256,
            bank_capacity: 2000,
            overview_origin: (20, 76),
            map_scale: 3,
            surface_bias: 350,
            water_line: 900,
            water_colour: 0xD3,
            noise_seed: 123_456,
            heightmap_base: 1550.0,
            heightmap_amplitude: 1000.0,
            octaves: 8,
            scroll_step: 4,
            edge_scroll_area: 50.0,
            edge_scroll_speed: 12.0,
        }
    }

    /// Largest scroll position that keeps the viewport inside the back screen.
    pub fn max_scroll(&self) -> (i32, i32) {
        (
            self.back_width as i32 - self.viewport.width,
            self.back_height as i32 - self.viewport.height,
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        let vp = &self.viewport;
        if vp.width <= 0 || vp.height <= 0 {
            return invalid("viewport must not be empty");
        }
        if vp.x < 0
            || vp.y < 0
            || (vp.x + vp.width) as usize > self.screen_width
            || (vp.y + vp.height) as usize > self.screen_height
        {
            return invalid("viewport must lie inside the screen");
        }
        if (vp.width as usize) > self.back_width || (vp.height as usize) > self.back_height {
            return invalid("back screen is smaller than the viewport");
        }
        if self.sprite_capacity == 0 || self.bank_capacity == 0 {
            return invalid("sprite and bank capacities must be non-zero");
        }
        if !(1..=MAX_MAP_SCALE).contains(&self.map_scale) {
            return invalid("map scale must be between 1 and 16");
        }
        if self.water_line < 0 || self.water_line as usize > self.back_height {
            return invalid("water line must lie inside the back screen");
        }
        if self.octaves == 0 {
            return invalid("at least one noise octave is required");
        }
        if self.edge_scroll_area <= 0.0 {
            return invalid("edge scroll area must be positive");
        }
        Ok(())
    }

    #[cfg(feature = "serde-spec")]
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serde-spec")]
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_the_game() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_scroll(), (1280, 600));
        assert_eq!(config.viewport.clip(), ClipRect::new(0, 42, 640, 360));
        assert_eq!(config.overview_origin, (20, 76));
        assert_eq!(config.water_colour, 0xD3);
    }

    #[test]
    fn viewport_outside_screen_is_rejected() {
        let mut config = EngineConfig::new();
        config.viewport.y = 200;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn small_back_screen_is_rejected() {
        let config = EngineConfig {
            back_width: 320,
            ..EngineConfig::new()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacities_are_rejected() {
        let config = EngineConfig {
            sprite_capacity: 0,
            ..EngineConfig::new()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn map_scale_is_bounded() {
        for (scale, ok) in [(0, false), (1, true), (MAX_MAP_SCALE, true), (300, false)] {
            let config = EngineConfig {
                map_scale: scale,
                ..EngineConfig::new()
            };
            assert_eq!(config.validate().is_ok(), ok, "map_scale {scale}");
        }
    }

    #[cfg(feature = "serde-spec")]
    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str("sprite_capacity: 64\nwater_line: 800\n").unwrap();
        assert_eq!(config.sprite_capacity, 64);
        assert_eq!(config.water_line, 800);
        assert_eq!(config.back_width, 1920);
    }

    #[cfg(feature = "serde-spec")]
    #[test]
    fn json_is_validated() {
        let err = EngineConfig::from_json_str(r#"{"map_scale": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(EngineConfig::from_json_str("{not json").is_err());
    }
}
