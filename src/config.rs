use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub simulation: SimulationConfig,
    pub geofence: GeofenceConfig,
    pub hub: HubConfig,
    pub queries: QueryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP/WebSocket listener
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Run the movement simulator at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Scheduler period in milliseconds (also the step length used in the movement formula)
    pub tick_ms: u64,
    /// Distance under which a member counts as arrived
    pub arrival_threshold_km: f64,
    /// Range for synthesized speeds of members without an asserted speed
    pub synthetic_speed_min_kmh: f64,
    pub synthetic_speed_max_kmh: f64,
    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn tick_seconds(&self) -> f64 {
        self.tick_ms as f64 / 1000.0
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_ms: 1000,
            arrival_threshold_km: 0.05,
            synthetic_speed_min_kmh: 3.0,
            synthetic_speed_max_kmh: 23.0,
            seed: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeofenceConfig {
    /// Radius applied to groups that never had one set
    pub default_radius_km: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Per-connection queue depth; messages beyond it are dropped for that connection
    pub subscriber_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    pub nearby_default_km: f64,
    pub nearest_max_km: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files; stdout only when unset
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("simulation.enabled", true)?
            .set_default("simulation.tick_ms", 1000)?
            .set_default("simulation.arrival_threshold_km", 0.05)?
            .set_default("simulation.synthetic_speed_min_kmh", 3.0)?
            .set_default("simulation.synthetic_speed_max_kmh", 23.0)?
            .set_default("geofence.default_radius_km", 1.0)?
            .set_default("hub.subscriber_buffer", 256)?
            .set_default("queries.nearby_default_km", 2.0)?
            .set_default("queries.nearest_max_km", 5.0)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("CONVOY_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // CONVOY_SIMULATION__TICK_MS, CONVOY_SERVER__PORT, ...
            .add_source(
                Environment::with_prefix("CONVOY")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Built-in configuration used by tests and when no config directory exists
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            simulation: SimulationConfig::default(),
            geofence: GeofenceConfig {
                default_radius_km: 1.0,
            },
            hub: HubConfig {
                subscriber_buffer: 256,
            },
            queries: QueryConfig {
                nearby_default_km: 2.0,
                nearest_max_km: 5.0,
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.simulation.tick_ms == 0 {
            errors.push("simulation.tick_ms must be positive".to_string());
        }

        if !(self.simulation.arrival_threshold_km > 0.0) {
            errors.push("simulation.arrival_threshold_km must be positive".to_string());
        }

        let sim = &self.simulation;
        if !sim.synthetic_speed_min_kmh.is_finite()
            || !sim.synthetic_speed_max_kmh.is_finite()
            || sim.synthetic_speed_min_kmh < 0.0
            || sim.synthetic_speed_min_kmh > sim.synthetic_speed_max_kmh
        {
            errors.push(format!(
                "synthetic speed range is invalid: [{}, {}]",
                sim.synthetic_speed_min_kmh, sim.synthetic_speed_max_kmh
            ));
        }

        if !(self.geofence.default_radius_km > 0.0) {
            errors.push("geofence.default_radius_km must be positive".to_string());
        }

        if self.hub.subscriber_buffer == 0 {
            errors.push("hub.subscriber_buffer must be positive".to_string());
        }

        if !(self.queries.nearby_default_km > 0.0) || !(self.queries.nearest_max_km > 0.0) {
            errors.push("query distances must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
