//! Connexion à l'entrepôt PostgreSQL
//!
//! Les variables `PG*` priment sur les `*_RDS` des anciens déploiements.
//! Le pool est dimensionné sur le nombre d'unités traitées en parallèle.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime, Timeouts};
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::debug;

/// Nom sous lequel les sessions apparaissent dans `pg_stat_activity`
const APPLICATION_NAME: &str = "ndvi-pg";

/// Mode TLS vers l'entrepôt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    #[default]
    Disable,
    /// TLS tenté, sans certificat client
    Prefer,
    Require,
}

impl SslMode {
    fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        }
    }
}

impl std::str::FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "disable" | "off" | "false" | "no" => Ok(SslMode::Disable),
            "prefer" | "allow" => Ok(SslMode::Prefer),
            "require" | "on" | "true" | "yes" => Ok(SslMode::Require),
            _ => Err(format!("Invalid SSL mode: {}. Use: disable, prefer, require", s)),
        }
    }
}

/// Paramètres de connexion à l'entrepôt
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    /// Connexions du pool ; au moins une de plus que les unités parallèles
    pub pool_size: usize,
    pub ssl_mode: SslMode,
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            dbname: "postgres".into(),
            user: "postgres".into(),
            password: None,
            pool_size: 4,
            ssl_mode: SslMode::Disable,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Première variable définie parmi `names`
fn env_any(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_any(&["PGHOST", "HOST_RDS"]).unwrap_or(defaults.host),
            port: env_any(&["PGPORT", "PORT_RDS"])
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            dbname: env_any(&["PGDATABASE", "DATABASE_RDS"]).unwrap_or(defaults.dbname),
            user: env_any(&["PGUSER", "USER_RDS"]).unwrap_or(defaults.user),
            password: env_any(&["PGPASSWORD", "PASSWORD_RDS"]),
            pool_size: env_any(&["NDVI_POOL_SIZE"])
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
            ssl_mode: env_any(&["PGSSLMODE", "SSL_RDS"])
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            connect_timeout: env_any(&["PGCONNECT_TIMEOUT"])
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        }
    }

    /// Agrandit le pool pour `jobs` unités simultanées plus la lecture des clients
    pub fn sized_for_jobs(mut self, jobs: usize) -> Self {
        self.pool_size = self.pool_size.max(jobs.max(1) + 1);
        self
    }
}

/// Cible lisible dans les logs ; le mot de passe n'apparaît jamais
impl fmt::Display for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{} (ssl={}, pool={})",
            self.user,
            self.host,
            self.port,
            self.dbname,
            self.ssl_mode.as_str(),
            self.pool_size
        )
    }
}

fn make_tls_connector() -> MakeRustlsConnect {
    let root_store = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    MakeRustlsConnect::new(config)
}

fn pool_settings(config: &DatabaseConfig) -> Config {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.dbname.clone());
    cfg.user = Some(config.user.clone());
    cfg.password = config.password.clone();
    cfg.application_name = Some(APPLICATION_NAME.to_string());
    cfg.connect_timeout = Some(config.connect_timeout);

    // Un COPY d'unité peut être long : l'attente d'une connexion libre aussi
    cfg.pool = Some(PoolConfig {
        max_size: config.pool_size,
        timeouts: Timeouts {
            wait: Some(Duration::from_secs(120)),
            create: Some(config.connect_timeout),
            recycle: Some(Duration::from_secs(30)),
        },
        ..Default::default()
    });
    cfg
}

/// Pool de connexions vers l'entrepôt
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let cfg = pool_settings(config);
    debug!(warehouse = %config, "Creating warehouse pool");

    match config.ssl_mode {
        SslMode::Disable => cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("Failed to create warehouse pool"),
        SslMode::Prefer | SslMode::Require => cfg
            .create_pool(Some(Runtime::Tokio1), make_tls_connector())
            .context("Failed to create warehouse pool with TLS"),
    }
}

/// Vérifie que l'entrepôt répond et journalise la base atteinte
pub async fn test_connection(pool: &Pool) -> Result<()> {
    let client = pool
        .get()
        .await
        .context("Failed to get connection from pool")?;
    let row = client
        .query_one("SELECT current_database()", &[])
        .await
        .context("Connection test failed")?;
    let database: String = row.get(0);
    debug!(database = %database, "Warehouse reachable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_mode_parse() {
        assert_eq!("REQUIRE".parse::<SslMode>(), Ok(SslMode::Require));
        assert_eq!(" off ".parse::<SslMode>(), Ok(SslMode::Disable));
        assert_eq!("allow".parse::<SslMode>(), Ok(SslMode::Prefer));
        assert!("verify-full".parse::<SslMode>().is_err());
    }

    #[test]
    fn test_display_hides_password() {
        let config = DatabaseConfig {
            host: "rds.internal".into(),
            dbname: "powerbi".into(),
            password: Some("s3cret".into()),
            ..DatabaseConfig::default()
        };
        let shown = config.to_string();
        assert_eq!(shown, "postgres@rds.internal:5432/powerbi (ssl=disable, pool=4)");
        assert!(!shown.contains("s3cret"));
    }

    #[test]
    fn test_pool_sized_for_jobs() {
        assert_eq!(DatabaseConfig::default().sized_for_jobs(8).pool_size, 9);
        assert_eq!(DatabaseConfig::default().sized_for_jobs(1).pool_size, 4);
        assert_eq!(DatabaseConfig::default().sized_for_jobs(0).pool_size, 4);
    }

    #[test]
    fn test_pool_settings() {
        let cfg = pool_settings(&DatabaseConfig::default().sized_for_jobs(6));
        assert_eq!(cfg.application_name.as_deref(), Some("ndvi-pg"));
        assert_eq!(cfg.pool.as_ref().map(|p| p.max_size), Some(7));
        assert_eq!(cfg.connect_timeout, Some(Duration::from_secs(10)));
    }
}
