use lanfire_core::net::protocol::TICK_RATE_HZ;
use serde::{Deserialize, Serialize};

/// Data-driven tuning for the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// State broadcast rate.
    pub tick_rate_hz: u32,
    /// Delay between death and respawn (ms).
    pub respawn_delay_ms: u64,
    /// Camera height above the feet; shots and throws start here.
    pub eye_height: f32,
    /// Body hitbox sphere center, measured up from the feet.
    pub body_center_y: f32,
    pub body_radius: f32,
    /// Head hitbox sphere center, measured up from the feet.
    pub head_center_y: f32,
    pub head_radius: f32,
    /// Absolute pitch limit (radians) accepted from clients.
    pub max_pitch: f32,
    /// Highest foot position accepted from clients.
    pub max_player_height: f32,
    pub flash: FlashConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: TICK_RATE_HZ,
            respawn_delay_ms: 3000,
            eye_height: 1.6,
            body_center_y: 0.95,
            body_radius: 0.45,
            head_center_y: 1.65,
            head_radius: 0.25,
            max_pitch: 1.3,
            max_player_height: 5.0,
            flash: FlashConfig::default(),
        }
    }
}

/// Flash grenade tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashConfig {
    /// Time from throw to detonation (ms).
    pub fuse_ms: u64,
    /// Minimum time between throws by one player (ms).
    pub cooldown_ms: u64,
    /// Blast radius sent with the detonation.
    pub radius: f32,
    /// Throw speed at zero charge (units/s).
    pub throw_speed_min: f32,
    /// Throw speed at full charge (units/s).
    pub throw_speed_max: f32,
    /// Extra upward velocity added to every throw (units/s).
    pub up_boost: f32,
    /// Downward acceleration (units/s^2).
    pub gravity: f32,
    /// Throw pitch is clamped into [min_throw_pitch, max_throw_pitch].
    pub min_throw_pitch: f32,
    pub max_throw_pitch: f32,
    /// Ceiling for the predicted detonation point.
    pub max_height: f32,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            fuse_ms: 1200,
            cooldown_ms: 4500,
            radius: 150.0,
            throw_speed_min: 7.0,
            throw_speed_max: 60.0,
            up_boost: 3.2,
            gravity: 26.0,
            min_throw_pitch: -0.2,
            max_throw_pitch: 0.35,
            max_height: 6.0,
        }
    }
}

impl SimConfig {
    /// Interval between state broadcasts (ms). Zero rates fall back to the
    /// protocol default.
    pub fn tick_interval_ms(&self) -> u64 {
        let rate = if self.tick_rate_hz == 0 {
            TICK_RATE_HZ
        } else {
            self.tick_rate_hz
        };
        (1000 / u64::from(rate)).max(1)
    }

    /// Check the config, returning a description of the first problem.
    /// Ranges later passed to `clamp` must be ordered.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate_hz > 1000 {
            return Err("tick_rate_hz must be <= 1000".to_string());
        }
        non_negative("eye_height", self.eye_height)?;
        non_negative("body_radius", self.body_radius)?;
        non_negative("head_radius", self.head_radius)?;
        non_negative("max_pitch", self.max_pitch)?;
        non_negative("max_player_height", self.max_player_height)?;
        if !self.body_center_y.is_finite() || !self.head_center_y.is_finite() {
            return Err("hitbox centers must be finite".to_string());
        }

        let flash = &self.flash;
        non_negative("flash.radius", flash.radius)?;
        non_negative("flash.throw_speed_min", flash.throw_speed_min)?;
        non_negative("flash.max_height", flash.max_height)?;
        if !flash.throw_speed_max.is_finite() || flash.throw_speed_max < flash.throw_speed_min {
            return Err("flash.throw_speed_max must be >= flash.throw_speed_min".to_string());
        }
        if !flash.up_boost.is_finite() || !flash.gravity.is_finite() {
            return Err("flash.up_boost and flash.gravity must be finite".to_string());
        }
        if !flash.min_throw_pitch.is_finite()
            || !flash.max_throw_pitch.is_finite()
            || flash.min_throw_pitch > flash.max_throw_pitch
        {
            return Err("flash.min_throw_pitch must be <= flash.max_throw_pitch".to_string());
        }
        Ok(())
    }

    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("LANFIRE_SIM_CONFIG")
            && let Some(config) = Self::load_from_file(&path)
        {
            return config;
        }
        Self::load_from_file("config/sim.toml").unwrap_or_default()
    }

    /// Parse and validate a TOML file, returning `None` if it is missing,
    /// unparsable or out of range.
    pub fn load_from_file(path: &str) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        match toml::from_str::<Self>(&contents) {
            Ok(config) => match config.validate() {
                Ok(()) => {
                    tracing::info!("Loaded simulation config from {path}");
                    Some(config)
                },
                Err(e) => {
                    tracing::warn!("Rejected simulation config {path}: {e}, using defaults");
                    None
                },
            },
            Err(e) => {
                tracing::warn!("Failed to parse {path}: {e}, using defaults");
                None
            },
        }
    }
}

fn non_negative(name: &str, value: f32) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be a finite value >= 0"))
    }
}
