//! Définition et implémentation des commandes CLI
//!
//! - défaut / `run` : shapefiles d'intersection → entrepôt
//! - `upload-raw` : lignes brutes d'une unité
//! - `upload` : envoi brut puis traitement d'une unité
//! - `to-geojson` : classification d'un shapefile → GeoJSON (sans DB)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use ndvi_geo::{reproject, Target};
use ndvi_pg::config::PipelineConfig;
use ndvi_pg::export::export_to_geojson;
use ndvi_pg::load::{create_pool, test_connection, DatabaseConfig, PgWarehouse, UnitScope};
use ndvi_pg::pipeline::{self, RunOptions};
use ndvi_pg::report::RunStatus;

#[derive(Subcommand)]
pub enum Commands {
    /// Classify, aggregate and load intersect shapefiles into the warehouse
    Run(RunArgs),

    /// Upload the raw rows of one unit (first database)
    UploadRaw(UnitArgs),

    /// Upload the raw rows of one unit, then process and load it
    Upload(UnitArgs),

    /// Classify an intersect shapefile and write GeoJSON (no database required)
    ToGeojson {
        /// Path to the INTERSECT_NDVI shapefile (.shp)
        #[arg(short, long)]
        path: PathBuf,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Season used for the harvest window rules
        #[arg(short, long)]
        safra: i32,

        /// Output EPSG code (défaut : CRS du shapefile)
        #[arg(long)]
        srid: Option<u32>,
    },
}

/// Connexion PostgreSQL ; les valeurs absentes viennent de l'environnement
#[derive(Args, Debug, Clone, Default)]
pub struct DatabaseArgs {
    /// PostgreSQL host (défaut : env PGHOST / HOST_RDS / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / DATABASE_RDS / postgres)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / USER_RDS / postgres)
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD / PASSWORD_RDS)
    #[arg(long)]
    pub password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / PORT_RDS / 5432)
    #[arg(long)]
    pub port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

/// Fichier de configuration et dossier des clients
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Path to a JSON pipeline config (défaut : preset embarqué)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Root folder holding the `<id>_<name>` client folders
    #[arg(long)]
    pub clients_folder: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Season(s) to process (ex: 2025)
    #[arg(short, long, required = true, value_delimiter = ',')]
    pub safra: Vec<i32>,

    /// Harvest window(s) to process (ex: J1,J2)
    #[arg(short, long, required = true, value_delimiter = ',')]
    pub janela: Vec<String>,

    /// Client id(s) to process (défaut : tous les clients de la table)
    #[arg(short, long, value_delimiter = ',')]
    pub client: Vec<i64>,

    /// Client id(s) to skip
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<i64>,

    /// Maximum number of units processed concurrently
    #[arg(long, alias = "threads")]
    pub jobs: Option<usize>,

    /// Create the warehouse table and index if missing
    #[arg(long)]
    pub create_table: bool,

    /// Write the JSON run report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(flatten)]
    pub db: DatabaseArgs,
}

#[derive(Args, Debug, Clone)]
pub struct UnitArgs {
    /// Client id
    #[arg(short, long)]
    pub client: i64,

    /// Season (ex: 2025)
    #[arg(short, long)]
    pub safra: i32,

    /// Harvest window (ex: J1)
    #[arg(short, long)]
    pub janela: String,

    /// Replace the raw rows already stored for this unit
    #[arg(long)]
    pub replace: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(flatten)]
    pub db: DatabaseArgs,
}

fn apply_database_overrides(config: &mut DatabaseConfig, args: DatabaseArgs) {
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(database) = args.database {
        config.dbname = database;
    }
    if let Some(user) = args.user {
        config.user = user;
    }
    if let Some(password) = args.password {
        config.password = Some(password);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ssl) = args.ssl {
        if let Ok(mode) = ssl.parse() {
            config.ssl_mode = mode;
        }
    }
}

fn load_pipeline_config(args: PipelineArgs) -> Result<PipelineConfig> {
    let mut config = match args.config {
        Some(ref path) => PipelineConfig::load(path)?,
        None => PipelineConfig::embedded()?,
    };
    if let Some(folder) = args.clients_folder {
        config.clients_folder = folder;
    }
    Ok(config)
}

async fn connect(db: DatabaseArgs, config: &PipelineConfig, jobs: usize) -> Result<PgWarehouse> {
    let mut db_config = DatabaseConfig::from_env();
    apply_database_overrides(&mut db_config, db);
    let db_config = db_config.sized_for_jobs(jobs);
    println!("Database: {}", db_config);

    let pool = create_pool(&db_config)?;
    test_connection(&pool).await?;
    println!("Connected to PostgreSQL");

    Ok(PgWarehouse::new(pool, config.tables.clone()))
}

/// Traitement des unités demandées
pub async fn cmd_run(args: RunArgs) -> Result<()> {
    let config = load_pipeline_config(args.pipeline)?;
    let options = RunOptions {
        safras: args.safra,
        janelas: args.janela,
        clients: args.client,
        exclude: args.exclude,
        jobs: args.jobs.unwrap_or(1).max(1),
        create_table: args.create_table,
    };

    println!("=== Run safra {:?} / janela {:?} ===", options.safras, options.janelas);
    println!("Clients folder: {}", config.clients_folder.display());
    println!("Warehouse table: {}", config.tables.warehouse);
    println!("Jobs: {}", options.jobs);

    let warehouse = connect(args.db, &config, options.jobs).await?;
    let report = pipeline::run(&warehouse, &config, &options).await;

    report.display();
    if let Some(ref path) = args.report {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if report.status == RunStatus::Failed {
        anyhow::bail!(
            "Run failed: {}",
            report.error.as_deref().unwrap_or("see report")
        );
    }
    Ok(())
}

/// Envoi brut d'une unité
pub async fn cmd_upload_raw(args: UnitArgs) -> Result<()> {
    let config = load_pipeline_config(args.pipeline)?;
    let scope = UnitScope::new(args.client, args.safra, args.janela);
    let warehouse = connect(args.db, &config, 1).await?;

    let report = pipeline::upload_raw(&warehouse, &config, &scope, args.replace).await?;
    report.display();
    Ok(())
}

/// Envoi brut puis traitement d'une unité
pub async fn cmd_upload(args: UnitArgs) -> Result<()> {
    let config = load_pipeline_config(args.pipeline)?;
    let scope = UnitScope::new(args.client, args.safra, args.janela.clone());
    let warehouse = connect(args.db, &config, 1).await?;

    let raw = pipeline::upload_raw(&warehouse, &config, &scope, args.replace).await?;
    raw.display();

    let options = RunOptions {
        safras: vec![args.safra],
        janelas: vec![args.janela],
        clients: vec![args.client],
        ..RunOptions::default()
    };
    let report = pipeline::run(&warehouse, &config, &options).await;
    report.display();

    if report.status == RunStatus::Failed {
        anyhow::bail!(
            "Upload failed: {}",
            report.error.as_deref().unwrap_or("see report")
        );
    }
    println!("Upload completed for {}", scope);
    Ok(())
}

/// Classification d'un shapefile vers GeoJSON
pub async fn cmd_export(path: &Path, output: &Path, safra: i32, srid: Option<u32>) -> Result<()> {
    let (classified, stats) = tokio::task::spawn_blocking({
        let path = path.to_path_buf();
        move || pipeline::classify_shapefile(&path, safra)
    })
    .await
    .context("Classification task panicked")??;

    let mut collection = classified.to_collection();
    if let Some(epsg) = srid {
        collection = reproject(&collection, Target::Epsg(epsg));
    }
    export_to_geojson(&collection, output)?;
    info!(features = collection.len(), epsg = collection.epsg, "GeoJSON written");

    println!("\n=== Summary ===");
    println!("Features read: {}", stats.input);
    println!(
        "Features dropped: {} empty, {} non-polygonal",
        stats.dropped_empty, stats.dropped_type
    );
    println!("Geometries repaired: {}", stats.repaired);
    println!("Features classified: {}", classified.len());
    println!("Total area_ndvi: {:.4}", classified.total_area());
    println!("Failed conversions: {}", classified.coercion.total_failures());
    for line in classified.coercion.lines() {
        println!("  {}", line);
    }
    println!("Output: {}", output.display());
    Ok(())
}
