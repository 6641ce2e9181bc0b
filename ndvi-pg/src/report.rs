//! Rapport d'exécution
//!
//! Une ligne par unité (client, safra, janela), plus les compteurs globaux.
//! Les échecs de conversion numérique ou de date sont cumulés et affichés
//! par colonne.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::coerce::CoercionReport;
use crate::load::UnitScope;
use crate::raw::RawUploadOutcome;

/// Statut global de l'exécution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Success,
    /// Une unité a échoué, l'exécution a été interrompue
    Failed,
}

/// Statut d'une unité
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitStatus {
    /// Lignes remplacées dans l'entrepôt
    Loaded,
    /// Pas de shapefile, ou rien à charger
    Skipped,
    Failed,
}

/// Résultat d'une unité
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub scope: UnitScope,
    pub client_name: String,
    pub status: UnitStatus,
    pub shapefile: Option<String>,
    /// Empreinte blake3 du .shp
    pub fingerprint: Option<String>,
    pub features_read: usize,
    /// Features écartées par la réparation géométrique
    pub features_dropped: usize,
    pub fields: usize,
    pub deleted: u64,
    pub inserted: u64,
    pub area_ndvi: f64,
    pub coercion: CoercionReport,
    pub message: Option<String>,
}

impl UnitReport {
    pub fn new(scope: UnitScope, client_name: &str) -> Self {
        Self {
            scope,
            client_name: client_name.to_string(),
            status: UnitStatus::Skipped,
            shapefile: None,
            fingerprint: None,
            features_read: 0,
            features_dropped: 0,
            fields: 0,
            deleted: 0,
            inserted: 0,
            area_ndvi: 0.0,
            coercion: CoercionReport::default(),
            message: None,
        }
    }

    pub fn skipped(mut self, message: impl Into<String>) -> Self {
        self.status = UnitStatus::Skipped;
        self.message = Some(message.into());
        self
    }

    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.status = UnitStatus::Failed;
        self.message = Some(message.into());
        self
    }
}

/// Rapport complet d'une exécution
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub safras: Vec<i32>,
    pub janelas: Vec<String>,
    pub duration_secs: f64,
    pub status: RunStatus,
    pub units: Vec<UnitReport>,
    /// Erreur ayant interrompu l'exécution
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(safras: &[i32], janelas: &[String]) -> Self {
        Self {
            safras: safras.to_vec(),
            janelas: janelas.to_vec(),
            duration_secs: 0.0,
            status: RunStatus::Success,
            units: Vec::new(),
            error: None,
        }
    }

    pub fn record(&mut self, unit: UnitReport) {
        self.units.push(unit);
    }

    /// Enregistre l'erreur fatale ; la première gagne
    pub fn record_failure(&mut self, message: &str) {
        if self.error.is_none() {
            self.error = Some(message.to_string());
        }
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Trie les unités et détermine le statut final
    pub fn finalize(&mut self) {
        self.units.sort_by(|a, b| a.scope.cmp(&b.scope));
        let failed = self.error.is_some() || self.count(UnitStatus::Failed) > 0;
        self.status = if failed {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };
    }

    pub fn count(&self, status: UnitStatus) -> usize {
        self.units.iter().filter(|u| u.status == status).count()
    }

    pub fn total_inserted(&self) -> u64 {
        self.units.iter().map(|u| u.inserted).sum()
    }

    pub fn total_deleted(&self) -> u64 {
        self.units.iter().map(|u| u.deleted).sum()
    }

    pub fn total_area(&self) -> f64 {
        self.units.iter().map(|u| u.area_ndvi).sum()
    }

    /// Échecs de conversion de toutes les unités
    pub fn coercion(&self) -> CoercionReport {
        let mut total = CoercionReport::default();
        for unit in &self.units {
            total.merge(&unit.coercion);
        }
        total
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!(
            "NDVI INTERSECT REPORT - safra {:?} / janela {:?}",
            self.safras, self.janelas
        );
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Units: {} loaded, {} skipped, {} failed",
            self.count(UnitStatus::Loaded),
            self.count(UnitStatus::Skipped),
            self.count(UnitStatus::Failed)
        );
        println!(
            "Rows: {} deleted, {} inserted, area_ndvi {:.4}",
            self.total_deleted(),
            self.total_inserted(),
            self.total_area()
        );

        if !self.units.is_empty() {
            println!("\n--- UNITS ---");
            for unit in &self.units {
                println!(
                    "  [{}] {} ({}): {:?}, {} features, {} rows, area {:.4}{}",
                    unit.scope,
                    unit.client_name,
                    unit.shapefile.as_deref().unwrap_or("-"),
                    unit.status,
                    unit.features_read,
                    unit.inserted,
                    unit.area_ndvi,
                    unit.message
                        .as_deref()
                        .map(|m| format!(" - {}", m))
                        .unwrap_or_default()
                );
            }
        }

        let coercion = self.coercion();
        if !coercion.is_clean() {
            println!("\n--- CONVERSION FAILURES ({}) ---", coercion.total_failures());
            for line in coercion.lines() {
                println!("  {}", line);
            }
        }

        if let Some(ref error) = self.error {
            println!("\n--- ERROR ---");
            println!("  {}", error);
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{:?}: {} units loaded, {} skipped, {} rows inserted",
            self.status,
            self.count(UnitStatus::Loaded),
            self.count(UnitStatus::Skipped),
            self.total_inserted()
        )
    }
}

/// Rapport d'un envoi brut
#[derive(Debug, Clone, Serialize)]
pub struct RawUploadReport {
    pub scope: UnitScope,
    pub shapefile: String,
    pub rows: usize,
    pub outcome: RawUploadOutcome,
    pub coercion: CoercionReport,
}

impl RawUploadReport {
    pub fn display(&self) {
        match self.outcome {
            RawUploadOutcome::Stored(outcome) => {
                println!("File {} uploaded", self.shapefile);
                println!("Rows inserted: {}", outcome.inserted);
                if outcome.deleted > 0 {
                    println!("Rows replaced: {}", outcome.deleted);
                }
            }
            RawUploadOutcome::Skipped { existing } => {
                println!(
                    "Skipped {}: {} rows already stored for {} (use --replace)",
                    self.shapefile, existing, self.scope
                );
            }
        }
        println!("Successful conversions: {}", self.coercion.converted);
        println!("Failed conversions: {}", self.coercion.total_failures());
        for line in self.coercion.lines() {
            println!("  {}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(client: i64, status: UnitStatus, inserted: u64, area: f64) -> UnitReport {
        let mut unit = UnitReport::new(UnitScope::new(client, 2025, "J1"), "C");
        unit.status = status;
        unit.inserted = inserted;
        unit.area_ndvi = area;
        unit
    }

    #[test]
    fn test_finalize_success() {
        let mut report = RunReport::new(&[2025], &["J1".into()]);
        report.record(unit(2, UnitStatus::Loaded, 10, 4.5));
        report.record(unit(1, UnitStatus::Skipped, 0, 0.0));
        report.finalize();

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.units[0].scope.client_id, 1);
        assert_eq!(report.total_inserted(), 10);
        assert_eq!(report.count(UnitStatus::Loaded), 1);
    }

    #[test]
    fn test_finalize_failed() {
        let mut report = RunReport::new(&[2025], &["J1".into()]);
        report.record(unit(2, UnitStatus::Loaded, 10, 4.5));
        report.record_failure("Invalid ESTAGIO_D values: [XPTO]");
        report.record_failure("second error");
        report.finalize();

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("Invalid ESTAGIO_D values: [XPTO]"));
    }

    #[test]
    fn test_coercion_totals() {
        let mut report = RunReport::new(&[2025], &["J1".into()]);
        let mut a = unit(1, UnitStatus::Loaded, 1, 1.0);
        a.coercion.record_failure("DATA_IMG");
        let mut b = unit(2, UnitStatus::Loaded, 1, 1.0);
        b.coercion.record_failure("DATA_IMG");
        report.record(a);
        report.record(b);

        assert_eq!(report.coercion().failures.get("DATA_IMG"), Some(&2));
    }

    #[test]
    fn test_summary_and_save() {
        let mut report = RunReport::new(&[2025], &["J1".into()]);
        report.record(unit(1, UnitStatus::Loaded, 7, 2.0));
        report.finalize();
        assert!(report.summary().contains("7 rows inserted"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.save_to_file(&path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["status"], "Success");
        assert_eq!(json["units"][0]["inserted"], 7);
    }
}
