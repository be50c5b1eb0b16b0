use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::force::ForceCurve;
use super::platform;
use super::spring::{Bounds, Movement};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("meter.mass must be positive, got {0}")]
    Mass(f32),
    #[error("meter.spring must be positive, got {0}")]
    Spring(f32),
    #[error("meter.damping must not be negative, got {0}")]
    Damping(f32),
    #[error("meter.initial_displacement must be a finite number, got {0}")]
    InitialDisplacement(f32),
    #[error("meter.min ({min}) is above meter.max ({max})")]
    Bounds { min: f32, max: f32 },
    #[error("simulation.tick_ms must be at least 1")]
    TickPeriod,
    #[error("audio.channels must be at least 1")]
    Channels,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub meter: MeterConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub force: ForceConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Needle movement constants and travel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterConfig {
    #[serde(default = "default_mass")]
    pub mass: f32,
    #[serde(default = "default_spring")]
    pub spring: f32,
    #[serde(default = "default_damping")]
    pub damping: f32,
    /// Where the needles rest when the program starts.
    #[serde(default = "default_initial_displacement")]
    pub initial_displacement: f32,
    #[serde(default = "default_min")]
    pub min: f32,
    #[serde(default = "default_max")]
    pub max: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Full-scale swing on startup before audio is connected. 0 disables it.
    #[serde(default = "default_startup_sweep_ms")]
    pub startup_sweep_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForceConfig {
    #[serde(default)]
    pub curve: ForceCurve,
}

/// Capture request. The device may not honour all of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Substring of the input device name. Unset means the default device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_buffer_frames")]
    pub buffer_frames: u32,
}

/// Meter face colours as 0xRRGGBB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_face_top")]
    pub face_top: u32,
    #[serde(default = "default_face_bottom")]
    pub face_bottom: u32,
    #[serde(default = "default_scale")]
    pub scale: u32,
    #[serde(default = "default_peak")]
    pub peak: u32,
    #[serde(default = "default_needle")]
    pub needle: u32,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            mass: default_mass(),
            spring: default_spring(),
            damping: default_damping(),
            initial_displacement: default_initial_displacement(),
            min: default_min(),
            max: default_max(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            startup_sweep_ms: default_startup_sweep_ms(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            buffer_frames: default_buffer_frames(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            face_top: default_face_top(),
            face_bottom: default_face_bottom(),
            scale: default_scale(),
            peak: default_peak(),
            needle: default_needle(),
        }
    }
}

fn default_mass() -> f32 {
    Movement::CLASSIC.mass
}

fn default_spring() -> f32 {
    Movement::CLASSIC.spring
}

fn default_damping() -> f32 {
    Movement::CLASSIC.damping
}

fn default_initial_displacement() -> f32 {
    1.0
}

fn default_min() -> f32 {
    0.0
}

fn default_max() -> f32 {
    1.0
}

fn default_tick_ms() -> u64 {
    12
}

fn default_startup_sweep_ms() -> u64 {
    1000
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_channels() -> u16 {
    2
}

fn default_buffer_frames() -> u32 {
    1024
}

fn default_face_top() -> u32 {
    0x806633
}

fn default_face_bottom() -> u32 {
    0xFFCC66
}

fn default_scale() -> u32 {
    0x000000
}

fn default_peak() -> u32 {
    0xAA0000
}

fn default_needle() -> u32 {
    0x000000
}

impl MeterConfig {
    pub fn movement(&self) -> Movement {
        Movement {
            mass: self.mass,
            spring: self.spring,
            damping: self.damping,
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.min, self.max)
    }
}

impl SimulationConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn startup_sweep(&self) -> Option<Duration> {
        (self.startup_sweep_ms > 0).then(|| Duration::from_millis(self.startup_sweep_ms))
    }
}

impl Config {
    /// Load from the default location, writing a default file on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.meter;
        // negated comparisons so NaN is rejected too
        if !(m.mass > 0.0) {
            return Err(ConfigError::Mass(m.mass));
        }
        if !(m.spring > 0.0) {
            return Err(ConfigError::Spring(m.spring));
        }
        if !(m.damping >= 0.0) {
            return Err(ConfigError::Damping(m.damping));
        }
        if !m.initial_displacement.is_finite() {
            return Err(ConfigError::InitialDisplacement(m.initial_displacement));
        }
        if !(m.min <= m.max) {
            return Err(ConfigError::Bounds {
                min: m.min,
                max: m.max,
            });
        }
        if self.simulation.tick_ms == 0 {
            return Err(ConfigError::TickPeriod);
        }
        if self.audio.channels == 0 {
            return Err(ConfigError::Channels);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.meter.movement(), Movement::CLASSIC);
        assert_eq!(config.meter.bounds(), Bounds::UNIT);
        assert_eq!(config.meter.initial_displacement, 1.0);
        assert_eq!(config.simulation.tick_ms, 12);
        assert_eq!(
            config.simulation.startup_sweep(),
            Some(Duration::from_millis(1000))
        );
        assert_eq!(config.force.curve, ForceCurve::VisualLinear);
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.audio.buffer_frames, 1024);
        assert!(config.audio.device.is_none());
        assert_eq!(config.display.face_bottom, 0xFFCC66);
        assert!(config.validate().is_ok());
        assert!(Config::config_path().ends_with("needle/config.toml"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [meter]
            damping = 0.2

            [force]
            curve = "logarithmic"

            [audio]
            device = "USB"
            "#,
        )
        .unwrap();
        assert_eq!(config.meter.damping, 0.2);
        assert_eq!(config.meter.mass, 0.005);
        assert_eq!(config.force.curve, ForceCurve::Logarithmic);
        assert_eq!(config.audio.device.as_deref(), Some("USB"));
        assert_eq!(config.simulation, SimulationConfig::default());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.meter.mass = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::Mass(0.0)));

        let mut config = Config::default();
        config.meter.damping = -0.1;
        assert_eq!(config.validate(), Err(ConfigError::Damping(-0.1)));

        let mut config = Config::default();
        config.meter.spring = f32::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Spring(_))));

        let mut config = Config::default();
        config.meter.initial_displacement = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InitialDisplacement(x)) if x.is_nan()
        ));

        let mut config = Config::default();
        config.meter.initial_displacement = f32::INFINITY;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InitialDisplacement(f32::INFINITY))
        );

        // finite but outside the stops is fine, the first step clamps it
        let mut config = Config::default();
        config.meter.initial_displacement = 1.5;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.meter.min = 0.8;
        config.meter.max = 0.2;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Bounds { min: 0.8, max: 0.2 })
        );

        let mut config = Config::default();
        config.simulation.tick_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::TickPeriod));

        let mut config = Config::default();
        config.simulation.startup_sweep_ms = 0;
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.startup_sweep(), None);
    }

    #[test]
    fn test_first_run_writes_defaults_then_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("needle").join("config.toml");

        let first = Config::load_from(&path).unwrap();
        assert_eq!(first, Config::default());
        assert!(path.exists());

        let second = Config::load_from(&path).unwrap();
        assert_eq!(second, first);
        assert!(second.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_nan_displacement() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[meter]\ninitial_displacement = nan\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InitialDisplacement(_))
        ));
    }
}
