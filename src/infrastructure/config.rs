use anyhow::Context;
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub store: StoreSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplaySettings {
    /// Offset used for time labels and for interpreting requested dates
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

impl DisplaySettings {
    pub fn offset(&self) -> anyhow::Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .with_context(|| format!("utc_offset_hours out of range: {}", self.utc_offset_hours))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Mysql,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    /// JSON file of isus and conditions loaded into the memory backend
    pub fixture: Option<PathBuf>,
    #[serde(default)]
    pub mysql: MysqlSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MysqlSettings {
    #[serde(default = "default_mysql_host")]
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    #[serde(default = "default_mysql_user")]
    pub user: String,
    #[serde(default = "default_mysql_password")]
    pub password: String,
    #[serde(default = "default_mysql_database")]
    pub database: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for MysqlSettings {
    fn default() -> Self {
        Self {
            host: default_mysql_host(),
            port: default_mysql_port(),
            user: default_mysql_user(),
            password: default_mysql_password(),
            database: default_mysql_database(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_utc_offset_hours() -> i32 {
    9
}

fn default_mysql_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_mysql_user() -> String {
    "isucon".to_string()
}

fn default_mysql_password() -> String {
    "isucon".to_string()
}

fn default_mysql_database() -> String {
    "isucondition".to_string()
}

fn default_max_connections() -> u32 {
    10
}

/// Load `config/isucondition.*` (optional), overridden by `ISUCONDITION_*`
/// environment variables, e.g. `ISUCONDITION_STORE__MYSQL__HOST`.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/isucondition").required(false))
        .add_source(
            config::Environment::with_prefix("ISUCONDITION")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("Failed to load configuration")?;

    settings
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(raw: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("");

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.mysql.database, "isucondition");
        assert_eq!(config.display.offset().unwrap().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_overrides() {
        let config = from_toml(
            r#"
            [server]
            port = 8080

            [display]
            utc_offset_hours = 0

            [store]
            backend = "mysql"

            [store.mysql]
            host = "db"
            max_connections = 4
            "#,
        );

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.store.backend, StoreBackend::Mysql);
        assert_eq!(config.store.mysql.host, "db");
        assert_eq!(config.store.mysql.user, "isucon");
        assert_eq!(config.store.mysql.max_connections, 4);
        assert_eq!(config.display.offset().unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn test_offset_out_of_range() {
        let display = DisplaySettings { utc_offset_hours: 30 };
        assert!(display.offset().is_err());
    }
}
