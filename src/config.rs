use std::collections::HashMap;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: IpAddr,
    pub database_path: String,
    pub db_max_connections: u32,
    /// Leading segment of generated invoice numbers.
    pub invoice_prefix: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let bind_addr = env_map
            .get("BIND_ADDR")
            .map(|s| s.as_str())
            .unwrap_or("127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "BIND_ADDR".to_string(),
                    "must be an IP address".to_string(),
                )
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let db_max_connections = env_map
            .get("DB_MAX_CONNECTIONS")
            .map(|s| s.as_str())
            .unwrap_or("5")
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "DB_MAX_CONNECTIONS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let invoice_prefix = parse_invoice_prefix(&env_map)?;

        Ok(Config {
            port,
            bind_addr,
            database_path,
            db_max_connections,
            invoice_prefix,
        })
    }
}

fn parse_invoice_prefix(env_map: &HashMap<String, String>) -> Result<String, ConfigError> {
    let prefix = env_map
        .get("INVOICE_PREFIX")
        .map(|s| s.trim())
        .unwrap_or("INV");
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::InvalidValue(
            "INVOICE_PREFIX".to_string(),
            format!("must be non-empty ASCII alphanumeric, got {:?}", prefix),
        ));
    }
    Ok(prefix.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.invoice_prefix, "INV");
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_connections_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("DB_MAX_CONNECTIONS".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DB_MAX_CONNECTIONS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invoice_prefix() {
        let mut env_map = setup_required_env();
        env_map.insert("INVOICE_PREFIX".to_string(), "CLW".to_string());
        assert_eq!(Config::from_env_map(env_map).unwrap().invoice_prefix, "CLW");

        let mut env_map = setup_required_env();
        env_map.insert("INVOICE_PREFIX".to_string(), "IN-V".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "INVOICE_PREFIX"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_bind_addr() {
        let mut env_map = setup_required_env();
        env_map.insert("BIND_ADDR".to_string(), "localhost".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "BIND_ADDR"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
