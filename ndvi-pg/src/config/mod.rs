//! Configuration du pipeline

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::load::RetryPolicy;

/// `schema.table` ou `table`, identifiants SQL simples
static QUALIFIED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("qualified name regex is valid")
});

/// Configuration principale
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Racine des dossiers clients (`<id>_<nom>/`)
    pub clients_folder: PathBuf,

    /// Sous-dossier des shapefiles d'intersection
    #[serde(default = "default_intersect_folder")]
    pub intersect_folder: String,

    #[serde(default)]
    pub tables: Tables,

    /// Clients jamais traités
    #[serde(default)]
    pub excluded_clients: Vec<i64>,

    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Tables cibles
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Tables {
    pub warehouse: String,
    pub clients: String,
    pub raw: String,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            warehouse: "powerbi.intersect_ndvi".into(),
            clients: "public.clientes".into(),
            raw: "public.base_intersect_ndvi".into(),
        }
    }
}

fn default_intersect_folder() -> String {
    "3_intersect_ndvi".to_string()
}

impl PipelineConfig {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Configuration embarquée par défaut
    pub fn embedded() -> Result<Self> {
        Self::parse(include_str!("presets/default.json")).context("Invalid embedded config")
    }

    fn parse(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Vérifie les noms de tables, interpolés tels quels dans le SQL
    pub fn validate(&self) -> Result<()> {
        for name in [&self.tables.warehouse, &self.tables.clients, &self.tables.raw] {
            if !QUALIFIED_NAME.is_match(name) {
                anyhow::bail!("Invalid table name: {:?}", name);
            }
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn is_excluded(&self, client_id: i64) -> bool {
        self.excluded_clients.contains(&client_id)
    }
}
