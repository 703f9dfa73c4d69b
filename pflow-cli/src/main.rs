//!
//! This binary provides a CLI for evaluating fragment-removal contacts.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Parser, Subcommand};

use pflow_algorithms::{candidate_pairs, evaluate_contacts};
use pflow_core::{ContactSettings, GeometryOracle};
use pflow_io::{ContactFileWriter, EventFileReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    PflowIo(#[from] pflow_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] pflow_core::Error),
}

/// Particle-flow fragment-removal metrics.
#[derive(Parser)]
#[command(name = "pflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate contacts between every ordered pair of clusters in an event
    Contacts {
        /// Input event file (JSON)
        input: PathBuf,

        /// Contact settings file (JSON); reference values when omitted
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Output file path (.json or .csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about an event file
    Info {
        /// Input event file (JSON)
        input: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<ContactSettings> {
    match path {
        Some(path) => Ok(ContactSettings::from_json_file(path)?),
        None => Ok(ContactSettings::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Contacts {
            input,
            settings,
            output,
            verbose,
        } => {
            init_logging(verbose);

            let settings = load_settings(settings.as_deref())?;
            let event = EventFileReader::open(&input)?.read_event()?;

            if verbose {
                eprintln!("Event: {}", input.display());
                eprintln!("Clusters: {}", event.clusters.len());
                eprintln!("Settings: {:?}", settings);
            }

            let start = Instant::now();
            let pairs = candidate_pairs(event.clusters.len());
            let records = evaluate_contacts(&event.clusters, &pairs, &settings, &event.geometry);
            let elapsed = start.elapsed();

            let mut n_failed = 0usize;
            for record in &records {
                if let Err(err) = &record.result {
                    n_failed += 1;
                    log::warn!(
                        "contact daughter={} parent={} failed: {}",
                        record.pair.daughter,
                        record.pair.parent,
                        err
                    );
                }
            }

            match output {
                Some(output) => {
                    let mut writer = ContactFileWriter::create(&output)?;
                    let is_csv = output
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
                    if is_csv {
                        writer.write_contacts_csv(&records)?;
                    } else {
                        writer.write_contacts_json(&records)?;
                    }
                    if verbose {
                        eprintln!("Wrote output to: {}", output.display());
                    }
                }
                None => {
                    println!(
                        "{:>8} {:>8} {:>10} {:>8} {:>8} {:>12} {:>12}",
                        "daughter", "parent", "contacts", "cone1", "close1", "closest_hit", "helix"
                    );
                    for record in &records {
                        let Ok(contact) = &record.result else {
                            continue;
                        };
                        println!(
                            "{:>8} {:>8} {:>10} {:>8.3} {:>8.3} {:>12.2} {:>12.2}",
                            record.pair.daughter,
                            record.pair.parent,
                            contact.n_contact_layers(),
                            contact.cone_fraction_1(),
                            contact.close_hit_fraction_1(),
                            contact.distance_to_closest_hit(),
                            contact.closest_distance_to_helix()
                        );
                    }
                }
            }

            println!(
                "Evaluated {} pairs in {:.2}s ({} failed)",
                records.len(),
                elapsed.as_secs_f64(),
                n_failed
            );
        }

        Commands::Info { input } => {
            init_logging(false);

            let reader = EventFileReader::open(&input)?;
            let event = reader.read_event()?;

            println!("File: {}", input.display());
            println!("Hits: {}", event.store.len());
            println!("Tracks: {}", event.tracks.len());
            println!("Clusters: {}", event.clusters.len());

            let input_list = event.store.input_list();
            if let (Some(inner), Some(outer)) = (input_list.inner_layer(), input_list.outer_layer())
            {
                println!("Layer range: {} - {}", inner, outer);
            }

            let n_outside = input_list
                .iter_hits()
                .filter(|hit| event.geometry.is_outside_footprint(&hit.position()))
                .count();
            if n_outside > 0 {
                println!("Hits outside footprint: {}", n_outside);
            }

            for (index, cluster) in event.clusters.iter().enumerate() {
                let layers = match (cluster.inner_pseudo_layer(), cluster.outer_pseudo_layer()) {
                    (Some(inner), Some(outer)) => format!("{} - {}", inner, outer),
                    _ => "-".to_string(),
                };
                println!(
                    "  cluster {}: {} hits, layers {}, {:.3} GeV, mip fraction {:.2}, {} tracks",
                    index,
                    cluster.n_hits(),
                    layers,
                    cluster.hadronic_energy(),
                    cluster.mip_fraction(),
                    cluster.n_associated_tracks()
                );
            }
        }
    }

    Ok(())
}
