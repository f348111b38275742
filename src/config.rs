use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use tracing::{info, warn};

use crate::engine::PackingEngine;
use crate::optimizer::PackingConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub optimizer: OptimizerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            optimizer: OptimizerConfig::from_env(),
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
    const HOST_VAR: &'static str = "STACK_IT_NOW_API_HOST";
    const PORT_VAR: &'static str = "STACK_IT_NOW_API_PORT";

    fn from_env() -> Self {
        Self::from_values(
            env_string(Self::HOST_VAR).as_deref(),
            env_string(Self::PORT_VAR).as_deref(),
        )
    }

    fn from_values(host: Option<&str>, port: Option<&str>) -> Self {
        let host_value = host.unwrap_or(Self::DEFAULT_HOST);
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value.to_string()),
            Err(err) => {
                warn!(
                    var = Self::HOST_VAR,
                    value = host_value,
                    error = %err,
                    "could not parse host, using {}",
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = parse_or_default(
            Self::PORT_VAR,
            port,
            Self::DEFAULT_PORT,
            |value| *value != 0,
            "must not be 0",
        );

        Self {
            bind_ip,
            display_host,
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
}

/// Configuration for the placement heuristic and the result cache.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    packing: PackingConfig,
    cache_capacity: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            packing: PackingConfig::default(),
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl OptimizerConfig {
    pub const DEFAULT_CACHE_CAPACITY: usize = PackingEngine::DEFAULT_CACHE_CAPACITY;

    const SCAN_DIVISOR_VAR: &'static str = "STACK_IT_NOW_SCAN_DIVISOR";
    const ALLOW_TIPPING_VAR: &'static str = "STACK_IT_NOW_ALLOW_TIPPING";
    const REFINE_POSITIONS_VAR: &'static str = "STACK_IT_NOW_REFINE_POSITIONS";
    const CACHE_CAPACITY_VAR: &'static str = "STACK_IT_NOW_CACHE_CAPACITY";

    fn from_env() -> Self {
        let scan_divisor = parse_or_default(
            Self::SCAN_DIVISOR_VAR,
            env_string(Self::SCAN_DIVISOR_VAR).as_deref(),
            PackingConfig::DEFAULT_SCAN_DIVISOR,
            |value| *value > 0,
            "must be greater than 0",
        );
        if scan_divisor != PackingConfig::DEFAULT_SCAN_DIVISOR {
            info!(
                scan_divisor,
                "custom scan divisor; placement quality and speed change with it"
            );
        }

        let allow_tipping = env_string(Self::ALLOW_TIPPING_VAR)
            .and_then(|raw| parse_bool(&raw, Self::ALLOW_TIPPING_VAR))
            .unwrap_or(PackingConfig::DEFAULT_ALLOW_TIPPING);

        let refine_positions = env_string(Self::REFINE_POSITIONS_VAR)
            .and_then(|raw| parse_bool(&raw, Self::REFINE_POSITIONS_VAR))
            .unwrap_or(PackingConfig::DEFAULT_REFINE_POSITIONS);

        let cache_capacity = parse_or_default(
            Self::CACHE_CAPACITY_VAR,
            env_string(Self::CACHE_CAPACITY_VAR).as_deref(),
            Self::DEFAULT_CACHE_CAPACITY,
            |_| true,
            "",
        );

        let packing = PackingConfig::builder()
            .scan_divisor(scan_divisor)
            .allow_tipping(allow_tipping)
            .refine_positions(refine_positions)
            .build();

        Self {
            packing,
            cache_capacity,
        }
    }

    /// Returns the configured PackingConfig.
    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }

    /// Entries kept per result cache; 0 disables caching.
    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
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
            warn!(var = name, error = %err, "environment variable unreadable, using default");
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                var = var_name,
                value = other,
                "could not interpret as boolean, using default"
            );
            None
        }
    }
}

/// Parses `raw`, falling back to `default` (with a warning) when it is
/// missing, unparsable or rejected by `validator`.
fn parse_or_default<T>(
    var_name: &str,
    raw: Option<&str>,
    default: T,
    validator: impl Fn(&T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if validator(&value) => value,
        Ok(_) => {
            warn!(
                var = var_name,
                value = raw,
                "invalid value ({}), using {}",
                invalid_hint,
                default
            );
            default
        }
        Err(err) => {
            warn!(
                var = var_name,
                value = raw,
                error = %err,
                "could not parse value, using {}",
                default
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));

        // Case insensitive
        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("ON", "TEST_VAR"), Some(true));

        assert_eq!(parse_bool(" true ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("no", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("n", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("OFF", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("  0  ", "TEST_VAR"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn numeric_values_fall_back_to_default() {
        let positive = |v: &u32| *v > 0;
        assert_eq!(parse_or_default("X", None, 20u32, positive, "> 0"), 20);
        assert_eq!(parse_or_default("X", Some("40"), 20u32, positive, "> 0"), 40);
        assert_eq!(parse_or_default("X", Some(" 7 "), 20u32, positive, "> 0"), 7);
        assert_eq!(parse_or_default("X", Some("0"), 20u32, positive, "> 0"), 20);
        assert_eq!(parse_or_default("X", Some("-3"), 20u32, positive, "> 0"), 20);
        assert_eq!(parse_or_default("X", Some("abc"), 20u32, positive, "> 0"), 20);
        assert_eq!(parse_or_default("X", Some("0"), 128usize, |_| true, ""), 0);
    }

    #[test]
    fn api_config_defaults_and_overrides() {
        let defaults = ApiConfig::from_values(None, None);
        assert_eq!(defaults.port(), 8080);
        assert_eq!(defaults.display_host(), "0.0.0.0");
        assert!(defaults.binds_to_all_interfaces());

        let local = ApiConfig::from_values(Some("127.0.0.1"), Some("9000"));
        assert_eq!(local.socket_addr(), "127.0.0.1:9000".parse().unwrap());
        assert!(!local.binds_to_all_interfaces());

        let broken = ApiConfig::from_values(Some("not-an-ip"), Some("0"));
        assert_eq!(broken.display_host(), "0.0.0.0");
        assert_eq!(broken.port(), 8080);
    }

    #[test]
    fn optimizer_defaults() {
        let config = OptimizerConfig::default();
        assert_eq!(config.packing_config(), PackingConfig::default());
        assert_eq!(config.cache_capacity(), 128);
    }
}
