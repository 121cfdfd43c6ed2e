use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use orkeys::api::{cancel_pair, ApiClient, ApiError, ApiKey, KeyRepository, ListFilter};
use orkeys::app::{App, PlannedChange};
use orkeys::config::{Config, API_KEY_ENV, ENDPOINT_ENV};
use orkeys::manifest::{Declaration, StateFile};
use orkeys::resource::{KeyQuery, KeyPlan, Reconciler};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Declarative management of OpenRouter API keys
#[derive(Parser, Debug)]
#[command(name = "orkeys", version, about, long_about = None)]
struct Args {
    /// Provisioning API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// API endpoint
    #[arg(long, env = ENDPOINT_ENV, global = true)]
    endpoint: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show what apply would change
    Plan {
        #[arg(short, long, default_value = "keys.yaml")]
        file: PathBuf,
        #[arg(short, long, default_value = "orkeys.state.json")]
        state: PathBuf,
    },
    /// Create, update, and delete keys to match the declaration
    Apply {
        #[arg(short, long, default_value = "keys.yaml")]
        file: PathBuf,
        #[arg(short, long, default_value = "orkeys.state.json")]
        state: PathBuf,
        /// Print newly created secrets
        #[arg(long)]
        show_secrets: bool,
        /// Treat keys already deleted remotely as deleted
        #[arg(long)]
        ignore_missing: bool,
    },
    /// List keys
    List {
        #[arg(long)]
        include_disabled: bool,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value_t = 0)]
        limit: u32,
    },
    /// Show one key
    Get { id: String },
    /// Show the key used to authenticate
    Current,
    /// Adopt an existing key into state
    Import {
        address: String,
        id: String,
        #[arg(short, long, default_value = "orkeys.state.json")]
        state: PathBuf,
    },
    /// Delete a key by hash
    Delete { id: String },
    /// Show or change saved defaults
    Config {
        #[arg(long = "set-endpoint")]
        set_endpoint: Option<String>,
        #[arg(long = "set-timeout")]
        set_timeout: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("warning: cannot open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("orkeys started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("orkeys").join("orkeys.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".orkeys").join("orkeys.log");
    }
    PathBuf::from("orkeys.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let _guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        eprintln!("Error: {:#}", err);
        if let Some(hint) = err.downcast_ref::<ApiError>().and_then(|e| e.hint()) {
            eprintln!("Hint: {}", hint);
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load();

    let connect = || -> Result<KeyRepository> {
        let client_config = config.client_config(args.api_key.as_deref(), args.endpoint.as_deref(), args.timeout)?;
        tracing::debug!("client config: {:?}", client_config);

        // Ctrl-C aborts the in-flight request; apply still writes state
        let (cancel, signal) = cancel_pair();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        let client = ApiClient::new(client_config)?.with_cancel(signal);
        Ok(KeyRepository::new(Arc::new(client)))
    };

    match args.command {
        Command::Plan { file, state } => {
            let declaration = Declaration::load(&file)?;
            let mut state = StateFile::load(&state)?;
            let app = App::new(Reconciler::from_repository(connect()?));

            for address in app.refresh(&mut state).await? {
                println!("{}: deleted outside orkeys, will be recreated", address);
            }
            print_plan(&App::plan(&declaration, &state));
        }
        Command::Apply {
            file,
            state: state_path,
            show_secrets,
            ignore_missing,
        } => {
            let declaration = Declaration::load(&file)?;
            let mut state = StateFile::load(&state_path)?;
            let reconciler = Reconciler::from_repository(connect()?).tolerate_missing_on_delete(ignore_missing);
            let app = App::new(reconciler);

            let result = async {
                app.refresh(&mut state).await?;
                let changes = App::plan(&declaration, &state);
                print_plan(&changes);
                let report = app.apply(&declaration, &mut state, &changes).await?;
                Ok::<_, anyhow::Error>(report)
            }
            .await;

            state.save(&state_path)?;
            let report = result?;

            for (address, key) in &report.created {
                match (&key.key, show_secrets) {
                    (Some(secret), true) => println!("{}: created {} key={}", address, key.id, secret),
                    _ => println!("{}: created {} (secret stored in {:?})", address, key.id, state_path),
                }
            }
            for address in &report.updated {
                println!("{}: updated", address);
            }
            for address in &report.deleted {
                println!("{}: deleted", address);
            }
            if report.is_empty() {
                println!("Nothing to do.");
            }
        }
        Command::List {
            include_disabled,
            offset,
            limit,
        } => {
            let filter = ListFilter::new()
                .include_disabled(include_disabled)
                .offset(offset)
                .limit(limit);
            let page = KeyQuery::from_repository(connect()?).page(&filter).await?;
            print_keys(&page);
        }
        Command::Get { id } => {
            let key = KeyQuery::from_repository(connect()?).describe(&id).await?;
            println!("{}", serde_json::to_string_pretty(&key)?);
        }
        Command::Current => {
            let key = KeyQuery::from_repository(connect()?).current().await?;
            println!("{}", serde_json::to_string_pretty(&key)?);
        }
        Command::Import { address, id, state: state_path } => {
            let mut state = StateFile::load(&state_path)?;
            let app = App::new(Reconciler::from_repository(connect()?));
            let observed = app.import(&mut state, &address, &id).await?;
            state.save(&state_path)?;
            println!("{}: imported {} ({})", address, observed.id, observed.name);
        }
        Command::Delete { id } => {
            connect()?.delete(&id).await?;
            println!("Deleted {}", id);
        }
        Command::Config {
            set_endpoint,
            set_timeout,
        } => configure(config.clone(), set_endpoint, set_timeout)?,
    }

    Ok(())
}

fn configure(mut config: Config, endpoint: Option<String>, timeout: Option<u64>) -> Result<()> {
    if endpoint.is_some() || timeout.is_some() {
        if let Some(endpoint) = endpoint {
            config.endpoint = Some(endpoint).filter(|e| !e.is_empty());
        }
        if let Some(timeout) = timeout {
            config.timeout_secs = Some(timeout).filter(|t| *t > 0);
        }
        config.save().context("Failed to save config")?;
    }

    println!("endpoint: {}", config.effective_endpoint(None));
    println!("timeout:  {}s", config.effective_timeout(None).as_secs());
    Ok(())
}

fn print_plan(changes: &[PlannedChange]) {
    for change in changes {
        if let Some(note) = &change.note {
            println!("  ! {}: {}", change.address, note);
        }
    }

    let pending: Vec<_> = changes.iter().filter(|c| !c.plan.is_noop()).collect();
    if pending.is_empty() {
        println!("No changes. Keys match the declaration.");
        return;
    }

    for change in pending {
        let marker = match &change.plan {
            KeyPlan::Create => "+",
            KeyPlan::Update(_) => "~",
            KeyPlan::Delete => "-",
            KeyPlan::NoOp => " ",
        };
        println!("{:>3} {}: {}", marker, change.address, change.plan);
    }
}

fn print_keys(keys: &[ApiKey]) {
    println!(
        "{:<16} {:<24} {:>10} {:>10} {:<8} {:<20}",
        "ID", "NAME", "LIMIT", "USAGE", "DISABLED", "CREATED"
    );
    for key in keys {
        let id: String = key.id.chars().take(16).collect();
        let limit = key.limit.map(|l| format!("{:.2}", l)).unwrap_or_else(|| "-".to_string());
        let created = key
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<24} {:>10} {:>10.4} {:<8} {:<20}",
            id, key.name, limit, key.usage, key.disabled, created
        );
    }
}
