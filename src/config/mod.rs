//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::MatchSettings;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines (LOG_FORMAT=json)
    pub log_json: bool,

    /// Supabase project URL
    pub supabase_url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub supabase_service_role_key: String,
    /// Supabase JWT secret for token verification
    pub supabase_jwt_secret: String,

    /// Shared secret the matchmaker sends in `x-service-key`
    pub match_service_key: String,
    /// Allowed client origin for CORS
    pub client_origin: String,

    /// Simulation tuning applied to every new match
    pub match_settings: MatchSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let defaults = MatchSettings::default();
        let match_settings = MatchSettings {
            tick_rate: parse_or(&lookup, "TICK_RATE", defaults.tick_rate)?,
            wave_interval_ms: parse_or(&lookup, "WAVE_INTERVAL_SECS", defaults.wave_interval_ms / 1000.0)? * 1000.0,
            first_wave_delay_ms: parse_or(&lookup, "FIRST_WAVE_DELAY_SECS", defaults.first_wave_delay_ms / 1000.0)?
                * 1000.0,
            starting_gold: parse_or(&lookup, "STARTING_GOLD", defaults.starting_gold)?,
            starting_energy: parse_or(&lookup, "STARTING_ENERGY", defaults.starting_energy)?,
            base_hp: parse_or(&lookup, "BASE_HP", defaults.base_hp)?,
            ..defaults
        };
        if match_settings.tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),

            supabase_url: required("SUPABASE_URL")?,
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET")?,

            match_service_key: required("MATCH_SERVICE_KEY")?,
            client_origin: required("CLIENT_ORIGIN")?,

            match_settings,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SUPABASE_URL", "https://example.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
            ("SUPABASE_JWT_SECRET", "secret"),
            ("MATCH_SERVICE_KEY", "matchmaker"),
            ("CLIENT_ORIGIN", "http://localhost:5173"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply_when_tuning_is_unset() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert_eq!(config.match_settings.tick_rate, 60);
        assert_eq!(config.match_settings.wave_interval_ms, 30_000.0);
        assert_eq!(config.match_settings.base_hp, 1000.0);
    }

    #[test]
    fn tuning_overrides_are_parsed() {
        let mut env = base_env();
        env.insert("PORT", "9000");
        env.insert("TICK_RATE", "30");
        env.insert("WAVE_INTERVAL_SECS", "12.5");
        env.insert("FIRST_WAVE_DELAY_SECS", "5");
        env.insert("STARTING_GOLD", "500");
        env.insert("BASE_HP", "750");
        env.insert("LOG_FORMAT", "JSON");

        let config = load(&env).unwrap();
        assert_eq!(config.server_addr.port(), 9000);
        assert_eq!(config.match_settings.tick_rate, 30);
        assert_eq!(config.match_settings.wave_interval_ms, 12_500.0);
        assert_eq!(config.match_settings.first_wave_delay_ms, 5_000.0);
        assert_eq!(config.match_settings.starting_gold, 500.0);
        assert_eq!(config.match_settings.base_hp, 750.0);
        assert!(config.log_json);
    }

    #[test]
    fn missing_and_invalid_values_are_reported() {
        let mut env = base_env();
        env.remove("MATCH_SERVICE_KEY");
        assert!(matches!(load(&env), Err(ConfigError::Missing("MATCH_SERVICE_KEY"))));

        let mut env = base_env();
        env.insert("TICK_RATE", "fast");
        assert!(matches!(load(&env), Err(ConfigError::Invalid("TICK_RATE"))));

        let mut env = base_env();
        env.insert("TICK_RATE", "0");
        assert!(matches!(load(&env), Err(ConfigError::Invalid("TICK_RATE"))));

        let mut env = base_env();
        env.insert("SERVER_ADDR", "nowhere");
        assert!(matches!(load(&env), Err(ConfigError::InvalidAddress)));
    }
}
