//! Exécution des unités (client × safra × janela)
//!
//! Pour chaque unité : localisation du shapefile, lecture, réparation,
//! classification, agrégation en deux phases, puis remplacement des lignes
//! de l'unité dans l'entrepôt. Les étapes CPU tournent dans
//! `spawn_blocking`. La première unité en échec interrompt l'exécution.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use anyhow::{Context, Result};
use futures::stream::{self, TryStreamExt};
use ndvi_geo::{read_shapefile, repair_with_stats, RepairStats};
use tracing::{debug, error, info};

use crate::aggregate::{summarize_fields, summarize_warehouse, total_area, WarehouseRow};
use crate::classify::{classify, Classified};
use crate::coerce::CoercionReport;
use crate::config::PipelineConfig;
use crate::error::WarehouseError;
use crate::load::postgres::warehouse_ddl;
use crate::load::{load_unit, with_retry, ClientRecord, RawStore, UnitScope, Warehouse};
use crate::locate;
use crate::raw;
use crate::report::{RawUploadReport, RunReport, UnitReport, UnitStatus};

/// Paramètres d'une exécution
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub safras: Vec<i32>,
    pub janelas: Vec<String>,
    /// Clients demandés ; vide = tous les clients de la table
    pub clients: Vec<i64>,
    pub exclude: Vec<i64>,
    /// Unités traitées en parallèle
    pub jobs: usize,
    /// Crée la table d'entrepôt si besoin
    pub create_table: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            safras: Vec::new(),
            janelas: Vec::new(),
            clients: Vec::new(),
            exclude: Vec::new(),
            jobs: 1,
            create_table: false,
        }
    }
}

/// Calcule le checksum blake3 d'un fichier
pub fn file_fingerprint(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Lit, répare et classifie un shapefile d'intersection
pub fn classify_shapefile(path: &Path, safra: i32) -> Result<(Classified, RepairStats)> {
    let collection =
        read_shapefile(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (repaired, stats) = repair_with_stats(&collection);
    let classified = classify(&repaired, safra)
        .with_context(|| format!("Failed to classify {}", path.display()))?;
    Ok((classified, stats))
}

/// Résultat des étapes CPU d'une unité
#[derive(Debug)]
struct PreparedUnit {
    fingerprint: String,
    features_read: usize,
    features_dropped: usize,
    fields: usize,
    rows: Vec<WarehouseRow>,
    coercion: CoercionReport,
}

fn prepare_unit(path: &Path, scope: &UnitScope) -> Result<PreparedUnit> {
    let fingerprint = file_fingerprint(path)?;
    let (classified, stats) = classify_shapefile(path, scope.safra)?;

    let fields = summarize_fields(&classified.rows, scope.safra, &scope.janela);
    let rows = summarize_warehouse(&fields, scope.client_id);
    debug!(
        unit = %scope,
        features = stats.input,
        classified = classified.len(),
        fields = fields.len(),
        rows = rows.len(),
        "Unit aggregated"
    );

    Ok(PreparedUnit {
        fingerprint,
        features_read: stats.input,
        features_dropped: stats.dropped_empty + stats.dropped_type,
        fields: fields.len(),
        rows,
        coercion: classified.coercion,
    })
}

/// Shapefile d'une unité ; `Ok(None)` si le dossier ou le fichier manque
pub fn find_unit_shapefile(config: &PipelineConfig, scope: &UnitScope) -> Result<Option<PathBuf>> {
    let folder = locate::client_folder(&config.clients_folder, scope.client_id).with_context(|| {
        format!("Cannot list clients folder {}", config.clients_folder.display())
    })?;
    let Some(folder) = folder else {
        return Ok(None);
    };
    let intersect = folder.join(&config.intersect_folder);
    locate::intersect_shapefile(&intersect, &scope.janela, scope.safra)
        .with_context(|| format!("Cannot list {}", intersect.display()))
}

async fn process_unit(
    warehouse: &dyn Warehouse,
    config: &PipelineConfig,
    client: &ClientRecord,
    scope: UnitScope,
) -> Result<UnitReport> {
    let mut unit = UnitReport::new(scope.clone(), &client.name);

    let Some(path) = find_unit_shapefile(config, &scope)? else {
        info!(unit = %scope, "No intersect shapefile, skipping");
        return Ok(unit.skipped("no intersect shapefile"));
    };
    unit.shapefile = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    info!(unit = %scope, path = %path.display(), "Processing unit");

    let prepared = tokio::task::spawn_blocking({
        let scope = scope.clone();
        move || prepare_unit(&path, &scope)
    })
    .await
    .context("Unit task panicked")??;

    unit.fingerprint = Some(prepared.fingerprint);
    unit.features_read = prepared.features_read;
    unit.features_dropped = prepared.features_dropped;
    unit.fields = prepared.fields;
    unit.coercion = prepared.coercion;

    if prepared.rows.is_empty() {
        return Ok(unit.skipped("no classified rows"));
    }

    let outcome = load_unit(warehouse, &scope, client, &prepared.rows, &config.retry)
        .await
        .with_context(|| format!("Failed to load {}", scope))?;

    unit.status = UnitStatus::Loaded;
    unit.deleted = outcome.deleted;
    unit.inserted = outcome.inserted;
    unit.area_ndvi = total_area(prepared.rows.iter().map(|r| &r.area_ndvi));
    Ok(unit)
}

/// Clients à traiter, dans l'ordre des ids
pub fn select_clients(
    known: &[ClientRecord],
    options: &RunOptions,
    config: &PipelineConfig,
) -> Result<Vec<ClientRecord>, WarehouseError> {
    let excluded = |id: i64| options.exclude.contains(&id) || config.is_excluded(id);

    if options.clients.is_empty() {
        return Ok(known.iter().filter(|c| !excluded(c.id)).cloned().collect());
    }

    let mut selected = Vec::new();
    for id in &options.clients {
        let client = known
            .iter()
            .find(|c| c.id == *id)
            .ok_or(WarehouseError::UnknownClient(*id))?;
        if !excluded(client.id) && !selected.contains(client) {
            selected.push(client.clone());
        }
    }
    selected.sort_by_key(|c| c.id);
    Ok(selected)
}

async fn run_units(
    warehouse: &dyn Warehouse,
    config: &PipelineConfig,
    options: &RunOptions,
    report: &Mutex<RunReport>,
) -> Result<()> {
    if options.create_table {
        for statement in warehouse_ddl(&config.tables.warehouse) {
            warehouse
                .execute(&statement)
                .await
                .context("Failed to create warehouse table")?;
        }
    }

    let known = with_retry(&config.retry, "fetch clients", || warehouse.clients())
        .await
        .context("Failed to fetch clients")?;
    let clients = select_clients(&known, options, config)?;

    let mut units = Vec::new();
    for client in &clients {
        for safra in &options.safras {
            for janela in &options.janelas {
                units.push((client, UnitScope::new(client.id, *safra, janela.clone())));
            }
        }
    }
    info!(
        clients = clients.len(),
        units = units.len(),
        jobs = options.jobs,
        "Starting run"
    );

    stream::iter(units.into_iter().map(Ok))
        .try_for_each_concurrent(options.jobs.max(1), |(client, scope)| async move {
            match process_unit(warehouse, config, client, scope.clone()).await {
                Ok(unit) => {
                    report.lock().unwrap_or_else(PoisonError::into_inner).record(unit);
                    Ok(())
                }
                Err(e) => {
                    error!(unit = %scope, error = %format!("{:#}", e), "Unit failed");
                    let unit = UnitReport::new(scope, &client.name).failed(format!("{:#}", e));
                    report.lock().unwrap_or_else(PoisonError::into_inner).record(unit);
                    Err(e)
                }
            }
        })
        .await
}

/// Traite toutes les unités demandées
///
/// Les erreurs ne sont pas propagées : elles sont consignées dans le
/// rapport, dont le statut passe à `Failed`.
pub async fn run(
    warehouse: &dyn Warehouse,
    config: &PipelineConfig,
    options: &RunOptions,
) -> RunReport {
    let start = Instant::now();
    let report = Mutex::new(RunReport::new(&options.safras, &options.janelas));

    if let Err(e) = run_units(warehouse, config, options, &report).await {
        report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_failure(&format!("{:#}", e));
    }

    let mut report = report.into_inner().unwrap_or_else(PoisonError::into_inner);
    report.set_duration(start.elapsed());
    report.finalize();
    info!(summary = %report.summary(), "Run finished");
    report
}

/// Envoi brut d'une unité
pub async fn upload_raw(
    store: &dyn RawStore,
    config: &PipelineConfig,
    scope: &UnitScope,
    replace: bool,
) -> Result<RawUploadReport> {
    let path = find_unit_shapefile(config, scope)?.with_context(|| {
        format!(
            "No intersect shapefile for {}_{} (client {})",
            scope.janela, scope.safra, scope.client_id
        )
    })?;

    let table = tokio::task::spawn_blocking({
        let path = path.clone();
        let scope = scope.clone();
        move || -> Result<raw::RawTable> {
            let collection = read_shapefile(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(raw::prepare(&collection, &scope)?)
        }
    })
    .await
    .context("Raw upload task panicked")??;

    let outcome = raw::upload(store, scope, &table, replace, &config.retry)
        .await
        .with_context(|| format!("Failed to upload raw rows for {}", scope))?;

    Ok(RawUploadReport {
        scope: scope.clone(),
        shapefile: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        rows: table.len(),
        outcome,
        coercion: table.coercion,
    })
}
