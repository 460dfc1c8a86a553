use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Complete application configuration, loaded from environment variables or
/// default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub planner: PlannerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            planner: PlannerConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        let host_value =
            env_string("STOWAGE_API_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                eprintln!(
                    "⚠️ Could not parse STOWAGE_API_HOST ('{}'): {}. Using {}.",
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    Self::DEFAULT_HOST
                        .parse::<IpAddr>()
                        .expect("Default host must be valid"),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string("STOWAGE_API_PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    eprintln!(
                        "⚠️ STOWAGE_API_PORT must not be 0. Using {}.",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    eprintln!(
                        "⚠️ Could not parse STOWAGE_API_PORT ('{}'): {}. Using {}.",
                        raw, err, Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Tunables for the placement/retrieval/rearrangement planners. The 0.85
/// fill threshold and 0.3 small-item ratio are empirical per the design
/// notes and are intentionally exposed here rather than hardcoded.
#[derive(Clone, Copy, Debug)]
pub struct PlannerConfig {
    pub epsilon: f64,
    pub small_item_ratio: f64,
    pub fill_threshold: f64,
    pub rearrangement_cost_threshold: f64,
    pub grid_cell_fraction: f64,
}

impl PlannerConfig {
    pub const DEFAULT_EPSILON: f64 = 1e-6;
    pub const DEFAULT_SMALL_ITEM_RATIO: f64 = 0.3;
    pub const DEFAULT_FILL_THRESHOLD: f64 = 0.85;
    pub const DEFAULT_REARRANGEMENT_COST_THRESHOLD: f64 = 1000.0;
    pub const DEFAULT_GRID_CELL_FRACTION: f64 = 0.125;

    const EPSILON_VAR: &'static str = "STOWAGE_PACKING_EPSILON";
    const SMALL_ITEM_RATIO_VAR: &'static str = "STOWAGE_PACKING_SMALL_ITEM_RATIO";
    const FILL_THRESHOLD_VAR: &'static str = "STOWAGE_PACKING_FILL_THRESHOLD";
    const REARRANGEMENT_COST_THRESHOLD_VAR: &'static str =
        "STOWAGE_PACKING_REARRANGEMENT_COST_THRESHOLD";
    const GRID_CELL_FRACTION_VAR: &'static str = "STOWAGE_PACKING_GRID_CELL_FRACTION";

    fn from_env() -> Self {
        let epsilon = load_f64_with_warning(
            Self::EPSILON_VAR,
            Self::DEFAULT_EPSILON,
            |value| value > 0.0,
            "must be greater than 0",
            "Warning: Adjusted epsilon may cause spurious overlap reports on shared faces",
        );

        let small_item_ratio = load_f64_with_warning(
            Self::SMALL_ITEM_RATIO_VAR,
            Self::DEFAULT_SMALL_ITEM_RATIO,
            |value| (0.0..=1.0).contains(&value),
            "must be between 0 and 1",
            "Warning: Adjusted small-item ratio changes which containers are tried first",
        );

        let fill_threshold = load_f64_with_warning(
            Self::FILL_THRESHOLD_VAR,
            Self::DEFAULT_FILL_THRESHOLD,
            |value| (0.0..=1.0).contains(&value),
            "must be between 0 and 1",
            "Warning: Adjusted fill threshold changes how aggressively containers are packed",
        );

        let rearrangement_cost_threshold = load_f64_with_warning(
            Self::REARRANGEMENT_COST_THRESHOLD_VAR,
            Self::DEFAULT_REARRANGEMENT_COST_THRESHOLD,
            |value| value > 0.0,
            "must be greater than 0",
            "Warning: Adjusted rearrangement cost threshold changes how disruptive rearrangement may be",
        );

        let grid_cell_fraction = load_f64_with_warning(
            Self::GRID_CELL_FRACTION_VAR,
            Self::DEFAULT_GRID_CELL_FRACTION,
            |value| value > 0.0 && value <= 1.0,
            "must be in (0, 1]",
            "Warning: Adjusted occupancy grid cell size may affect query performance",
        );

        Self {
            epsilon,
            small_item_ratio,
            fill_threshold,
            rearrangement_cost_threshold,
            grid_cell_fraction,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            eprintln!("⚠️ Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                if !validator(value) {
                    eprintln!(
                        "⚠️ {} contains invalid value '{}': {}. Using {}.",
                        var_name, raw, invalid_hint, default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        println!("⚠️ {} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                eprintln!(
                    "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_tunables() {
        assert_eq!(PlannerConfig::DEFAULT_SMALL_ITEM_RATIO, 0.3);
        assert_eq!(PlannerConfig::DEFAULT_FILL_THRESHOLD, 0.85);
        assert_eq!(PlannerConfig::DEFAULT_EPSILON, 1e-6);
    }

    #[test]
    fn load_f64_with_warning_falls_back_on_invalid_value() {
        let value = load_f64_with_warning("STOWAGE_TEST_NONEXISTENT_VAR", 0.5, |v| v > 0.0, "hint", "warn");
        assert_eq!(value, 0.5);
    }
}
