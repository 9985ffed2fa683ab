//! Point d'entrée CLI pour zonage

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use zonage::cli::Commands;

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Agrégats de recrutement hospitalier par commune
#[derive(Parser)]
#[command(name = "zonage")]
#[command(author, version)]
#[command(about = "Agrégats de recrutement hospitalier par commune (choroplèthes)")]
#[command(
    long_about = "Construit les données choroplèthes d'un établissement et de ses concurrents: \
jointure codes postaux ↔ communes INSEE, classement des concurrents, validation de couverture."
)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Carte {
            finess,
            recrutement,
            concurrents,
            communes,
            etablissements,
            geojson,
            allocation,
            config,
            version,
            output,
            contours,
            rapport,
        } => {
            zonage::cli::cmd_carte(
                &finess,
                &recrutement,
                &concurrents,
                &communes,
                etablissements,
                geojson,
                allocation,
                config,
                version,
                output,
                contours,
                rapport,
            )?;
        }
        Commands::Inspecter { geojson, config } => {
            zonage::cli::cmd_inspecter(geojson, config)?;
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
