use anyhow::{Context, Result};
use authsentry::config::AppConfig;
use authsentry::detect::DetectionParams;
use authsentry::ingest::LogKind;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "authsentry",
    about = "Brute-force and anomaly detection over authentication logs",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server over the incident store)
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,

        /// SQLite database path
        #[arg(long, default_value = "data/authsentry.db")]
        db: String,
    },

    /// Run detection over a log file and print ranked incidents
    Detect {
        /// Log file (.csv or .json)
        #[arg(long)]
        input: PathBuf,

        /// Log category: ssh or firewall
        #[arg(long, default_value = "ssh")]
        log_type: LogKind,

        /// Trailing window width in minutes
        #[arg(long)]
        window_minutes: Option<u32>,

        /// Rolling fail count that trips the brute-force rule
        #[arg(long)]
        fail_threshold: Option<u32>,

        /// Expected anomaly fraction in (0, 1)
        #[arg(long)]
        contamination: Option<f64>,

        /// Result size cap
        #[arg(long)]
        top_k: Option<usize>,

        /// Outlier model seed
        #[arg(long)]
        seed: Option<u64>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Persist incidents to the database
        #[arg(long)]
        store: bool,

        /// SQLite database path (with --store)
        #[arg(long, default_value = "data/authsentry.db")]
        db: String,
    },

    /// Forecast the failure trend from a log file
    Forecast {
        /// Log file (.csv or .json)
        #[arg(long)]
        input: PathBuf,

        /// Minutes to extrapolate
        #[arg(long)]
        horizon_minutes: Option<u32>,

        /// Trailing window width in minutes
        #[arg(long)]
        window_minutes: Option<u32>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Manage the blocklist
    Blocklist {
        #[command(subcommand)]
        action: BlocklistAction,
    },

    /// Translate a natural-language query into a structured event filter
    Query {
        /// The query text
        text: String,

        /// Optional log file to apply the filter to
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum BlocklistAction {
    /// List blocked sources
    List {
        #[arg(long, default_value = "data/authsentry.db")]
        db: String,
    },

    /// Block a source
    Add {
        /// Source address
        ip: String,

        #[arg(long, default_value = "data/authsentry.db")]
        db: String,
    },

    /// Unblock a source
    Remove {
        /// Source address
        ip: String,

        #[arg(long, default_value = "data/authsentry.db")]
        db: String,
    },
}

fn load_auth_events(path: &Path) -> Result<Vec<authsentry::ingest::AuthEvent>> {
    let events = if path.extension().is_some_and(|e| e == "json") {
        authsentry::ingest::json::load_auth_events(path)?
    } else {
        authsentry::ingest::csv::load_auth_events(path)?
    };
    Ok(events)
}

fn load_firewall_events(path: &Path) -> Result<Vec<authsentry::ingest::FirewallEvent>> {
    let events = if path.extension().is_some_and(|e| e == "json") {
        authsentry::ingest::json::load_firewall_events(path)?
    } else {
        authsentry::ingest::csv::load_firewall_events(path)?
    };
    Ok(events)
}

/// Config file values overridden by any explicit CLI flags.
fn effective_params(
    cfg: &AppConfig,
    window_minutes: Option<u32>,
    fail_threshold: Option<u32>,
    contamination: Option<f64>,
    top_k: Option<usize>,
    horizon_minutes: Option<u32>,
    seed: Option<u64>,
) -> DetectionParams {
    let mut params = cfg.detection.clone();
    if let Some(v) = window_minutes {
        params.window_minutes = v;
    }
    if let Some(v) = fail_threshold {
        params.fail_threshold = v;
    }
    if let Some(v) = contamination {
        params.contamination = v;
    }
    if let Some(v) = top_k {
        params.top_k = v;
    }
    if let Some(v) = horizon_minutes {
        params.horizon_minutes = v;
    }
    if let Some(v) = seed {
        params.seed = v;
    }
    params.clamped()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::load_or_default();

    match cli.command {
        Commands::Serve { bind, db } => {
            tracing::info!(%bind, "Starting authsentry daemon");
            authsentry::serve(&bind, &db).await?;
        }
        Commands::Detect {
            input,
            log_type,
            window_minutes,
            fail_threshold,
            contamination,
            top_k,
            seed,
            json,
            store,
            db,
        } => {
            let params = effective_params(
                &cfg,
                window_minutes,
                fail_threshold,
                contamination,
                top_k,
                None,
                seed,
            );

            match log_type {
                LogKind::Ssh => {
                    let events = load_auth_events(&input)
                        .with_context(|| format!("loading {}", input.display()))?;
                    let run = authsentry::detect::run_detection(&events, &params);

                    if json {
                        println!("{}", serde_json::to_string_pretty(&run.incidents)?);
                    } else if run.incidents.is_empty() {
                        println!("No incidents found.");
                    } else {
                        println!(
                            "{:<18} | {:<22} | {:>6} | {:>9} | {:>8} | Severity",
                            "Source", "Last seen", "Risk", "Rule hits", "Minutes"
                        );
                        println!(
                            "{:-<18}-|-{:-<22}-|-{:-<6}-|-{:-<9}-|-{:-<8}-|-{:-<8}",
                            "", "", "", "", "", ""
                        );
                        for inc in &run.incidents {
                            println!(
                                "{:<18} | {:<22} | {:>6.2} | {:>9} | {:>8} | {}",
                                inc.src_ip,
                                inc.last_seen.format("%Y-%m-%d %H:%M UTC"),
                                inc.risk,
                                inc.rule_hits,
                                inc.total_minutes,
                                inc.severity
                            );
                        }
                    }

                    if store {
                        let pool = authsentry::storage::open_pool(&db)?;
                        authsentry::storage::save_auth_incidents(&pool, &run.incidents)?;
                        tracing::info!(count = run.incidents.len(), "incidents persisted");
                    }
                }
                LogKind::Firewall => {
                    let events = load_firewall_events(&input)
                        .with_context(|| format!("loading {}", input.display()))?;
                    let incidents = authsentry::detect::run_firewall_detection(&events, &params);

                    if json {
                        println!("{}", serde_json::to_string_pretty(&incidents)?);
                    } else if incidents.is_empty() {
                        println!("No incidents found.");
                    } else {
                        println!(
                            "{:<18} | {:<22} | {:>7} | Severity",
                            "Source", "Last seen", "Denies"
                        );
                        println!("{:-<18}-|-{:-<22}-|-{:-<7}-|-{:-<8}", "", "", "", "");
                        for inc in &incidents {
                            println!(
                                "{:<18} | {:<22} | {:>7} | {}",
                                inc.src_ip,
                                inc.last_seen.format("%Y-%m-%d %H:%M UTC"),
                                inc.denies,
                                inc.severity
                            );
                        }
                    }

                    if store {
                        let pool = authsentry::storage::open_pool(&db)?;
                        authsentry::storage::save_firewall_incidents(&pool, &incidents)?;
                        tracing::info!(count = incidents.len(), "incidents persisted");
                    }
                }
            }
        }
        Commands::Forecast {
            input,
            horizon_minutes,
            window_minutes,
            json,
        } => {
            let params =
                effective_params(&cfg, window_minutes, None, None, None, horizon_minutes, None);

            let events =
                load_auth_events(&input).with_context(|| format!("loading {}", input.display()))?;
            let run = authsentry::detect::run_detection(&events, &params);
            let series = authsentry::forecast::build_series(&run.findings);
            let forecast = authsentry::forecast::linear_forecast(&series, params.horizon_minutes);

            if json {
                println!("{}", serde_json::to_string_pretty(&forecast)?);
            } else if forecast.is_empty() {
                println!("Not enough data to forecast (need at least 3 observed minutes).");
            } else {
                println!("{:<22} | Forecast fails/min", "Minute");
                println!("{:-<22}-|-{:-<18}", "", "");
                for point in &forecast {
                    println!(
                        "{:<22} | {:.2}",
                        point.minute.format("%Y-%m-%d %H:%M UTC"),
                        point.forecast
                    );
                }
            }
        }
        Commands::Blocklist { action } => match action {
            BlocklistAction::List { db } => {
                let pool = authsentry::storage::open_pool(&db)?;
                let ips = authsentry::storage::list_blocklist(&pool)?;
                if ips.is_empty() {
                    println!("Blocklist is empty.");
                } else {
                    for ip in ips {
                        println!("{ip}");
                    }
                }
            }
            BlocklistAction::Add { ip, db } => {
                let pool = authsentry::storage::open_pool(&db)?;
                authsentry::storage::block_ip(&pool, &ip)?;
                println!("Blocked {ip}.");
            }
            BlocklistAction::Remove { ip, db } => {
                let pool = authsentry::storage::open_pool(&db)?;
                authsentry::storage::unblock_ip(&pool, &ip)?;
                println!("Unblocked {ip}.");
            }
        },
        Commands::Query { text, input } => {
            let translator = authsentry::query::select_translator(
                cfg.intent.endpoint.clone(),
                cfg.intent.token.clone(),
            );
            let filter = translator.translate(&text).await;
            println!("{}", serde_json::to_string_pretty(&filter)?);

            if let Some(path) = input {
                let events = load_auth_events(&path)
                    .with_context(|| format!("loading {}", path.display()))?;
                let matched = authsentry::query::apply_filter(&events, &filter);
                println!("{} of {} events match.", matched.len(), events.len());
            }
        }
    }

    Ok(())
}
