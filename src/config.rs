use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{error, info};

use crate::marker::RobotDimensions;
use crate::sync::SyncThresholds;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "AMR_VIZ";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub robot: RobotConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            base_url: "http://127.0.0.1:3000".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub poll_interval_ms: u64,
    pub telemetry_timeout_ms: u64,
    pub position_threshold_m: f64,
    pub angle_threshold_deg: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            poll_interval_ms: 500,
            telemetry_timeout_ms: 3_000,
            position_threshold_m: 0.001,
            angle_threshold_deg: 0.1,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn telemetry_timeout(&self) -> Duration {
        Duration::from_millis(self.telemetry_timeout_ms)
    }

    pub fn thresholds(&self) -> SyncThresholds {
        SyncThresholds {
            position_m: self.position_threshold_m,
            angle_deg: self.angle_threshold_deg,
        }
    }
}

/// Physical footprint used to scale the marker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub length_m: f64,
    pub width_m: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        RobotConfig {
            length_m: 0.9,
            width_m: 0.6,
        }
    }
}

impl RobotConfig {
    pub fn dimensions(&self) -> RobotDimensions {
        RobotDimensions {
            length_m: self.length_m,
            width_m: self.width_m,
        }
    }
}

/// Load `config/default.toml` (optional) with `AMR_VIZ__*` overrides on top.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let builder = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true));

    match build(builder) {
        Ok(config) => {
            info!(?config, "Successfully loaded configuration");
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

fn build(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = builder.build()?.try_deserialize()?;
    if config.robot.length_m <= 0.0 || config.robot.width_m <= 0.0 {
        return Err(ConfigError::Message(
            "robot.length_m and robot.width_m must be positive".to_string(),
        ));
    }
    if config.sync.position_threshold_m < 0.0 || config.sync.angle_threshold_deg < 0.0 {
        return Err(ConfigError::Message("sync thresholds must not be negative".to_string()));
    }
    Ok(config)
}
