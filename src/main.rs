use std::{path::PathBuf, sync::Arc};

use chrono::{Duration, Utc};
use clap::Parser;
use nexusgate::{
    config::GatewayConfig,
    db::{DateRange, DbPool, ListParams},
    models::{
        CompletionOutcome, CreateApiKey, CreateModel, CreateProvider, DiagnosticInput,
        EmbeddingOutcome, ModelType,
    },
    observability::{self, metrics},
    providers::ProviderKind,
    services::Services,
};
use serde::Deserialize;

/// Config file looked up in the working directory when `--config` is not given
const DEFAULT_CONFIG_FILE: &str = "nexusgate.toml";

/// CLI arguments for the NexusGate ledger
#[derive(Parser, Debug)]
#[command(version, about = "NexusGate completion ledger", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (defaults to ./nexusgate.toml if it exists)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Print the in-process metrics in Prometheus text format after the command
    #[arg(long, global = true)]
    print_metrics: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run database migrations and exit
    Migrate,
    /// Validate the configuration file and exit
    CheckConfig,
    /// Check database connectivity and refresh the inventory gauges
    Health,
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Manage API keys
    #[command(subcommand)]
    Key(KeyCommand),
    /// Manage upstream providers
    #[command(subcommand)]
    Provider(ProviderCommand),
    /// Record a completion outcome read as JSON from a file or stdin
    ///
    /// Input: {"credential": "...", "outcome": {...}, "diagnostic": {...}}
    Record {
        /// Input file (defaults to stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Record an embedding outcome read as JSON from a file or stdin
    ///
    /// Input: {"credential": "...", "outcome": {...}}
    RecordEmbedding {
        /// Input file (defaults to stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum KeyCommand {
    /// Issue a new API key. The raw key is printed once.
    Create {
        #[arg(long)]
        comment: Option<String>,
        /// Provision idempotently under this external id
        #[arg(long)]
        external_id: Option<String>,
    },
    /// Revoke the key a credential belongs to
    Revoke { credential: String },
    /// Show usage recorded for a credential
    Usage {
        credential: String,
        /// Only count the last N days
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        days: Option<i64>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ProviderCommand {
    /// Register an upstream provider
    Add {
        #[arg(long)]
        name: String,
        /// One of: openai, openai-responses, anthropic, azure, ollama
        #[arg(long)]
        kind: ProviderKind,
        /// Defaults to the kind's well-known endpoint when it has one
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        /// Defaults to the kind's recommended version when it requires one
        #[arg(long)]
        api_version: Option<String>,
    },
    /// List registered providers
    List {
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Register a model served by a provider
    AddModel {
        #[arg(long)]
        provider_id: i64,
        #[arg(long)]
        name: String,
        /// One of: chat, embedding
        #[arg(long = "type")]
        model_type: ModelType,
    },
    /// List the models a provider serves
    Models {
        #[arg(long)]
        provider_id: i64,
    },
}

/// Body accepted by `record`.
#[derive(Debug, Deserialize)]
struct RecordRequest {
    #[serde(default)]
    credential: String,
    outcome: CompletionOutcome,
    #[serde(default)]
    diagnostic: Option<DiagnosticInput>,
}

/// Body accepted by `record-embedding`.
#[derive(Debug, Deserialize)]
struct RecordEmbeddingRequest {
    #[serde(default)]
    credential: String,
    outcome: EmbeddingOutcome,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config_path = args.config.as_deref();

    let result = match args.command {
        Command::Migrate => run_migrate(config_path).await,
        Command::CheckConfig => run_check_config(config_path),
        Command::Health => run_health(config_path).await,
        Command::Schema { output } => run_schema_export(output),
        Command::Key(cmd) => run_key(config_path, cmd).await,
        Command::Provider(cmd) => run_provider(config_path, cmd).await,
        Command::Record { input } => run_record(config_path, input).await,
        Command::RecordEmbedding { input } => run_record_embedding(config_path, input).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if args.print_metrics {
        match metrics::render() {
            Some(rendered) => print!("{}", rendered),
            None => eprintln!(
                "No in-process metrics to print (disabled, served by a listener, or not compiled in)"
            ),
        }
    }
}

/// Load the explicit config file, ./nexusgate.toml, or the defaults, in that order.
fn load_config(explicit_path: Option<&str>) -> Result<GatewayConfig, String> {
    let path = match explicit_path {
        Some(path) => {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(format!("Config file not found: {}", path.display()));
            }
            path
        }
        None => {
            let cwd_config = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !cwd_config.exists() {
                return Ok(GatewayConfig::default());
            }
            cwd_config
        }
    };

    GatewayConfig::from_file(&path)
        .map_err(|e| format!("Failed to load config from {}: {}", path.display(), e))
}

/// Load config, start logging and metrics, and connect to the database.
async fn bootstrap(
    explicit_path: Option<&str>,
) -> Result<(GatewayConfig, observability::TracingGuard, Arc<DbPool>), String> {
    let config = load_config(explicit_path)?;

    let guard = observability::init_tracing(&config.observability).map_err(|e| e.to_string())?;
    metrics::init_metrics(&config.observability.metrics).map_err(|e| e.to_string())?;

    if config.database.is_none() {
        return Err("Database is not configured".to_string());
    }

    let db = DbPool::from_config(&config.database)
        .await
        .map_err(|e| format!("Failed to connect to database: {}", e))?;

    if config.database.run_migrations() {
        db.run_migrations()
            .await
            .map_err(|e| format!("Database migrations failed: {}", e))?;
    }

    Ok((config, guard, Arc::new(db)))
}

async fn run_migrate(explicit_path: Option<&str>) -> Result<(), String> {
    let config = load_config(explicit_path)?;
    let _tracing_guard =
        observability::init_tracing(&config.observability).map_err(|e| e.to_string())?;

    if config.database.is_none() {
        return Err("Database is not configured. Nothing to migrate.".to_string());
    }

    let db = DbPool::from_config(&config.database)
        .await
        .map_err(|e| format!("Failed to connect to database: {}", e))?;
    db.run_migrations()
        .await
        .map_err(|e| format!("Database migrations failed: {}", e))?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

fn run_check_config(explicit_path: Option<&str>) -> Result<(), String> {
    let config = load_config(explicit_path)?;
    println!(
        "Configuration OK (database: {}, log format: {:?}, key prefix: {:?})",
        if config.database.is_none() {
            "none"
        } else {
            "configured"
        },
        config.observability.logging.format,
        config.keys.prefix
    );
    Ok(())
}

async fn run_health(explicit_path: Option<&str>) -> Result<(), String> {
    let (config, _guard, db) = bootstrap(explicit_path).await?;

    db.health_check()
        .await
        .map_err(|e| format!("Database health check failed: {}", e))?;

    let services = Services::new(db, &config.keys);
    services
        .report_inventory()
        .await
        .map_err(|e| e.to_string())?;

    println!("ok");
    Ok(())
}

fn run_schema_export(output: Option<String>) -> Result<(), String> {
    #[cfg(feature = "json-schema")]
    {
        let schema = GatewayConfig::json_schema_string()
            .map_err(|e| format!("Failed to serialize schema: {}", e))?;
        write_output(output, &schema)
    }
    #[cfg(not(feature = "json-schema"))]
    {
        let _ = output;
        Err("JSON schema export requires the 'json-schema' feature".to_string())
    }
}

#[cfg(feature = "json-schema")]
fn write_output(output: Option<String>, contents: &str) -> Result<(), String> {
    match output {
        Some(path) => std::fs::write(&path, contents)
            .map_err(|e| format!("Failed to write {}: {}", path, e)),
        None => {
            println!("{}", contents);
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

async fn run_key(explicit_path: Option<&str>, cmd: KeyCommand) -> Result<(), String> {
    let (config, _guard, db) = bootstrap(explicit_path).await?;
    let services = Services::new(db, &config.keys);

    match cmd {
        KeyCommand::Create {
            comment,
            external_id: Some(external_id),
        } => {
            let ensured = services
                .api_keys
                .ensure_by_external_id(&external_id, comment)
                .await
                .map_err(|e| e.to_string())?;
            match ensured {
                nexusgate::services::EnsuredApiKey::Created(created) => print_json(&created)?,
                nexusgate::services::EnsuredApiKey::Existing(existing) => {
                    eprintln!(
                        "Key for external id '{}' already exists; its secret is only shown when created",
                        external_id
                    );
                    print_json(&existing)?
                }
            }
        }
        KeyCommand::Create {
            comment,
            external_id: None,
        } => {
            let created = services
                .api_keys
                .create(CreateApiKey {
                    comment,
                    external_id: None,
                })
                .await
                .map_err(|e| e.to_string())?;
            print_json(&created)?;
        }
        KeyCommand::Revoke { credential } => {
            let key = services
                .api_keys
                .revoke_by_credential(&credential)
                .await
                .map_err(|e| e.to_string())?;
            print_json(&key)?;
        }
        KeyCommand::Usage { credential, days } => {
            let range = usage_range(days)?;
            let completions = services
                .usage
                .get_summary_by_credential(&credential, range)
                .await
                .map_err(|e| e.to_string())?;
            let embeddings = services
                .usage
                .get_embedding_usage_by_credential(&credential, range)
                .await
                .map_err(|e| e.to_string())?;
            print_json(&serde_json::json!({
                "completions": completions,
                "embeddings": embeddings,
            }))?;
        }
    }

    services
        .report_inventory()
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

async fn run_provider(explicit_path: Option<&str>, cmd: ProviderCommand) -> Result<(), String> {
    let (config, _guard, db) = bootstrap(explicit_path).await?;
    let services = Services::new(db, &config.keys);

    match cmd {
        ProviderCommand::Add {
            name,
            kind,
            base_url,
            api_key,
            api_version,
        } => {
            let descriptor = kind.describe();
            let base_url = base_url
                .or_else(|| descriptor.default_base_url.map(str::to_string))
                .ok_or_else(|| format!("--base-url is required for provider kind '{}'", kind))?;
            let api_version = api_version.or_else(|| {
                descriptor
                    .requires_api_version
                    .then(|| descriptor.default_version_hint.to_string())
            });

            let provider = services
                .providers
                .create(CreateProvider {
                    name,
                    kind,
                    base_url,
                    api_key,
                    api_version,
                })
                .await
                .map_err(|e| e.to_string())?;
            print_json(&provider)?;
        }
        ProviderCommand::List { limit } => {
            let providers = services
                .providers
                .list(ListParams {
                    limit,
                    ..Default::default()
                })
                .await
                .map_err(|e| e.to_string())?;
            print_json(&providers)?;
        }
        ProviderCommand::AddModel {
            provider_id,
            name,
            model_type,
        } => {
            let model = services
                .providers
                .add_model(CreateModel {
                    provider_id,
                    name,
                    model_type,
                })
                .await
                .map_err(|e| e.to_string())?;
            print_json(&model)?;
        }
        ProviderCommand::Models { provider_id } => {
            let models = services
                .providers
                .list_models(provider_id)
                .await
                .map_err(|e| e.to_string())?;
            print_json(&models)?;
        }
    }

    services
        .report_inventory()
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Read a request body from a file, or stdin when no file is given.
fn read_input(input: Option<&PathBuf>) -> Result<String, String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e)),
        None => std::io::read_to_string(std::io::stdin())
            .map_err(|e| format!("Failed to read stdin: {}", e)),
    }
}

async fn run_record(explicit_path: Option<&str>, input: Option<PathBuf>) -> Result<(), String> {
    let raw = read_input(input.as_ref())?;
    let request: RecordRequest =
        serde_json::from_str(&raw).map_err(|e| format!("Invalid record request: {}", e))?;

    let (config, _guard, db) = bootstrap(explicit_path).await?;
    let services = Services::new(db, &config.keys);

    let recorded = services
        .recorder
        .record(request.outcome, &request.credential, request.diagnostic)
        .await
        .map_err(|e| e.to_string())?;

    match recorded {
        Some(completion) => print_json(&completion),
        None => Err("Completion could not be recorded".to_string()),
    }
}

async fn run_record_embedding(
    explicit_path: Option<&str>,
    input: Option<PathBuf>,
) -> Result<(), String> {
    let raw = read_input(input.as_ref())?;
    let request: RecordEmbeddingRequest = serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid record-embedding request: {}", e))?;

    let (config, _guard, db) = bootstrap(explicit_path).await?;
    let services = Services::new(db, &config.keys);

    let recorded = services
        .embeddings
        .record(request.outcome, &request.credential)
        .await
        .map_err(|e| e.to_string())?;

    match recorded {
        Some(embedding) => print_json(&embedding),
        None => Err("Embedding could not be recorded".to_string()),
    }
}

/// Range covering the last `days` days, or all time.
fn usage_range(days: Option<i64>) -> Result<DateRange, String> {
    let mut range = DateRange::all_time();
    if let Some(days) = days {
        range.start = Duration::try_days(days)
            .filter(|_| days > 0)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| format!("--days {} is out of range", days))?;
    }
    Ok(range)
}
