//! Point d'entrée CLI pour ndvi-pg

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::{Commands, RunArgs};

/// Charger les shapefiles d'intersection NDVI dans l'entrepôt PostgreSQL
#[derive(Parser)]
#[command(name = "ndvi-pg")]
#[command(author, version)]
#[command(about = "Classify and load sugarcane NDVI intersect shapefiles into PostgreSQL (défaut) or GeoJSON")]
#[command(long_about = "Classe les polygones NDVI, agrège par talhão puis par unité et remplace les lignes de chaque unité client × safra × janela dans l'entrepôt.\n\nPar défaut, exécute 'run'. Utilisez 'to-geojson' pour un export sans base.")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Sous-commande (défaut: run)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments de `run` (commande par défaut)
    #[command(flatten)]
    run: Option<RunArgs>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Run(args)) => cli::cmd_run(args).await?,
        Some(Commands::UploadRaw(args)) => {
            info!(client = args.client, safra = args.safra, janela = %args.janela, "Raw upload");
            cli::cmd_upload_raw(args).await?;
        }
        Some(Commands::Upload(args)) => {
            info!(client = args.client, safra = args.safra, janela = %args.janela, "Upload");
            cli::cmd_upload(args).await?;
        }
        Some(Commands::ToGeojson {
            path,
            output,
            safra,
            srid,
        }) => {
            info!(path = %path.display(), output = %output.display(), srid = ?srid, "Export vers GeoJSON");
            cli::cmd_export(&path, &output, safra, srid).await?;
        }
        None => {
            let Some(args) = cli.run else {
                anyhow::bail!("Missing arguments: --safra and --janela are required (see --help)");
            };
            cli::cmd_run(args).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
