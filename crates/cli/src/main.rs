use clap::{Parser, Subcommand};
use fhir::Bundle;
use nps_core::transform::{anonymous_excerpt, not_by_name_variant, patient::truncate_birth_date};
use nps_core::{Notification, ProcessingConfig, RoutingDecision, RoutingResolver, UuidGenerator};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "nps")]
#[command(about = "Notification processing tools for operators")]
struct Cli {
    /// Processing configuration (YAML)
    #[arg(long, global = true, default_value = "nps.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the not-by-name variant of a notification
    NotByName {
        /// Notification bundle (FHIR JSON)
        bundle: PathBuf,
        /// Sender id, used for test-user detection
        #[arg(long)]
        sender: Option<String>,
    },
    /// Create the anonymous excerpt of a notification
    Excerpt {
        /// Notification bundle (FHIR JSON)
        bundle: PathBuf,
        /// Sender id, used for test-user detection
        #[arg(long)]
        sender: Option<String>,
        /// Transmission category to tag the excerpt with
        #[arg(long)]
        category: Option<String>,
    },
    /// Apply a routing decision to a notification and print the tagged bundle
    Resolve {
        /// Notification bundle (FHIR JSON)
        bundle: PathBuf,
        /// Routing decision (JSON, as returned by the routing service)
        decision: PathBuf,
        /// Sender id, used for test-user detection and substitution
        #[arg(long)]
        sender: Option<String>,
    },
    /// Truncate a birth date to month granularity
    BirthDate {
        /// Date in YYYY, YYYY-MM or YYYY-MM-DD form
        date: String,
    },
    /// Validate a processing configuration file
    CheckConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = run(cli)?;
    println!("{output}");
    Ok(())
}

fn run(cli: Cli) -> Result<String, Box<dyn Error>> {
    match cli.command {
        Some(Commands::NotByName { bundle, sender }) => {
            let config = ProcessingConfig::load(&cli.config)?;
            let notification = read_notification(&bundle, sender.as_deref(), &config)?;
            let variant = not_by_name_variant(&notification, &UuidGenerator)?;
            pretty(&variant)
        }
        Some(Commands::Excerpt {
            bundle,
            sender,
            category,
        }) => {
            let config = ProcessingConfig::load(&cli.config)?;
            let mut notification = read_notification(&bundle, sender.as_deref(), &config)?;
            notification.set_transmission_category(category);
            let excerpt = anonymous_excerpt(&notification, &UuidGenerator)?;
            pretty(&excerpt)
        }
        Some(Commands::Resolve {
            bundle,
            decision,
            sender,
        }) => {
            let config = Arc::new(ProcessingConfig::load(&cli.config)?);
            let mut notification = read_notification(&bundle, sender.as_deref(), &config)?;
            let decision = RoutingDecision::parse(&std::fs::read_to_string(&decision)?)?;
            let routing = RoutingResolver::new(config)
                .resolve(&mut notification, decision)?
                .clone();
            eprintln!(
                "Responsible: {} ({} receiver(s))",
                routing.responsible(),
                routing.routes().len()
            );
            pretty(notification.bundle())
        }
        Some(Commands::BirthDate { date }) => truncate_birth_date(&date)
            .ok_or_else(|| format!("Not a FHIR date: {date}").into()),
        Some(Commands::CheckConfig) => {
            let config = ProcessingConfig::load(&cli.config)?;
            Ok(format!(
                "Configuration OK: provider {:?}, threshold {}, reload every {}s",
                config.code_mapping().provider,
                config.outcome_threshold(),
                config.cache_reload_interval().as_secs()
            ))
        }
        None => Ok("Use 'nps --help' for commands".into()),
    }
}

fn read_notification(
    path: &Path,
    sender: Option<&str>,
    config: &ProcessingConfig,
) -> Result<Notification, Box<dyn Error>> {
    let bundle = Bundle::parse(&std::fs::read_to_string(path)?)?;
    Ok(Notification::from_bundle(bundle, sender, config.test_users())?)
}

fn pretty(bundle: &Bundle) -> Result<String, Box<dyn Error>> {
    Ok(serde_json::to_string_pretty(bundle)?)
}
