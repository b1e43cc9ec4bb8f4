use crate::{
    commands::{Commands, ConfigCommand, JobsCommand, QueryArg},
    env::EnvManager,
    error::CliError,
    output::Printer,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use engine_config::{
    EngineSettings, SchemaIntrospector, generate_auto_mapping,
    mapping::validator::validate_against_columns,
    settings::DEFAULT_SETTINGS_FILE,
    validate_mappings,
};
use engine_core::state::{StateStore, sled_store::SledStateStore};
use engine_runtime::{
    ConnectorFactory, MigrationError, Orchestrator, RunOptions, RunningJob,
    SettingsConnectorFactory,
};
use model::execution::{
    configuration::MappingConfiguration,
    job::{JobStatus, MigrationJob},
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "ferry",
    version,
    about = "Moves relational query results into a search index"
)]
struct Cli {
    #[arg(long, global = true, help = "Settings file (default: ./ferry.toml)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Load variables from this .env file")]
    env_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Print results as JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

struct App {
    settings: Arc<EngineSettings>,
    factory: Arc<SettingsConnectorFactory>,
    printer: Printer,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref(), cli.env_file.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            return std::process::ExitCode::from(ExitCode::GeneralError.as_u8());
        }
    };

    // RUST_LOG wins over the settings file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Arc::new(settings);
    let app = App {
        factory: Arc::new(SettingsConnectorFactory::new(settings.clone())),
        settings,
        printer: Printer { json: cli.json },
    };

    let code = match app.dispatch(cli.command).await {
        Ok(()) => ExitCode::Success,
        Err(CliError::ShutdownRequested) => {
            warn!("Stopped on request");
            ExitCode::ShutdownRequested
        }
        Err(err) => {
            error!("{err}");
            ExitCode::GeneralError
        }
    };
    std::process::ExitCode::from(code.as_u8())
}

/// Reads the settings file with `${VAR}` references resolved, then applies
/// `FERRY_*` overrides from the environment and the optional `.env` file.
fn load_settings(path: Option<&Path>, env_file: Option<&Path>) -> Result<EngineSettings, CliError> {
    let mut env = EnvManager::new();
    if let Some(env_file) = env_file {
        env.load_from_file(env_file)?;
    }

    let file = match path {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_SETTINGS_FILE)).filter(|p| p.exists()),
    };

    let mut settings = match file {
        Some(file) => {
            let text = std::fs::read_to_string(&file)?;
            EngineSettings::from_toml(&env.interpolate(&text)?)?
        }
        None => EngineSettings::default(),
    };
    settings.apply_overrides(|key| env.get(key))?;
    settings.validate()?;
    Ok(settings)
}

fn read_query(arg: QueryArg) -> Result<String, CliError> {
    match (arg.query, arg.query_file) {
        (Some(query), _) => Ok(query),
        (None, Some(path)) => Ok(std::fs::read_to_string(path)?.trim().to_string()),
        (None, None) => Err(CliError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "either --query or --query-file is required",
        ))),
    }
}

fn read_configuration(path: &Path) -> Result<MappingConfiguration, CliError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

impl App {
    async fn dispatch(&self, command: Commands) -> Result<(), CliError> {
        let printer = self.printer;
        match command {
            Commands::TestConn { connection } => {
                conn::pinger_for(&self.settings, self.factory.as_ref(), &connection)
                    .await?
                    .ping()
                    .await?;
                printer.emit(
                    &serde_json::json!({ "connection": connection, "reachable": true }),
                    |_| println!("Connection `{connection}` is reachable"),
                )?;
            }
            Commands::Tables { connection } => {
                let tables = self.introspector(&connection).await?.list_tables().await?;
                printer.emit(tables.as_slice(), output::tables)?;
            }
            Commands::Columns { connection, table } => {
                let columns = self
                    .introspector(&connection)
                    .await?
                    .list_columns(&table)
                    .await?;
                printer.emit(columns.as_slice(), output::columns)?;
            }
            Commands::Analyze { connection, query } => {
                let query = read_query(query)?;
                let analysis = self
                    .introspector(&connection)
                    .await?
                    .analyze_query(&query)
                    .await?;
                printer.emit(&analysis, output::analysis)?;
            }
            Commands::Suggest {
                connection,
                query,
                index,
            } => {
                let query = read_query(query)?;
                let introspector = self.introspector(&connection).await?;
                let mapping = generate_auto_mapping(&introspector, &query, &index).await?;
                printer.emit(&mapping, output::auto_mapping)?;
            }
            Commands::Validate { file, analyze } => {
                let config = read_configuration(&file)?;
                let report = if analyze {
                    let analysis = self
                        .introspector(&config.source_connection)
                        .await?
                        .analyze_query(&config.source_query)
                        .await?;
                    validate_against_columns(&config.field_mappings, &analysis.columns)
                } else {
                    validate_mappings(&config.field_mappings)
                };
                printer.emit(&report, output::report)?;
                if !report.valid {
                    return Err(MigrationError::InvalidConfiguration(format!(
                        "{} mapping error(s) in {}",
                        report.errors.len(),
                        file.display()
                    ))
                    .into());
                }
            }
            Commands::Config { command } => self.config(command).await?,
            Commands::Preview { id, limit } => {
                let (orch, _) = self.orchestrator()?;
                let config = orch.get_configuration(&id).await?;
                let docs = orch.preview_migration(&config, limit).await?;
                printer.emit(docs.as_slice(), output::documents)?;
            }
            Commands::Migrate {
                id,
                incremental,
                full,
            } => {
                let mode = match (incremental, full) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                let (orch, store) = self.orchestrator()?;
                let running = orch.submit(&id, mode).await?;
                let result = self.run_to_end(&orch, running).await;
                store.flush().await?;
                self.finish(result?)?;
            }
            Commands::Jobs { command } => self.jobs(command).await?,
        }
        Ok(())
    }

    async fn config(&self, command: ConfigCommand) -> Result<(), CliError> {
        let (orch, store) = self.orchestrator()?;
        match command {
            ConfigCommand::Import { file } => {
                let config = read_configuration(&file)?;
                let report = validate_mappings(&config.field_mappings);
                if !report.valid {
                    self.printer.emit(&report, output::report)?;
                    return Err(MigrationError::InvalidConfiguration(format!(
                        "{} mapping error(s) in {}",
                        report.errors.len(),
                        file.display()
                    ))
                    .into());
                }
                orch.save_configuration(&config).await?;
                store.flush().await?;
                self.printer.emit(
                    &serde_json::json!({ "id": config.id, "warnings": report.warnings }),
                    |_| {
                        println!("Imported configuration {}", config.id);
                        output::report(&report);
                    },
                )?;
            }
            ConfigCommand::Export { id, output } => {
                let config = orch.get_configuration(&id).await?;
                let json = serde_json::to_string_pretty(&config)?;
                match output {
                    Some(path) => {
                        tokio::fs::write(&path, json).await?;
                        info!(config_id = %id, path = %path.display(), "Exported configuration");
                    }
                    None => println!("{json}"),
                }
            }
            ConfigCommand::List => {
                let configs = orch.list_configurations().await?;
                self.printer.emit(configs.as_slice(), output::configs)?;
            }
        }
        Ok(())
    }

    async fn jobs(&self, command: JobsCommand) -> Result<(), CliError> {
        let (orch, store) = self.orchestrator()?;
        match command {
            JobsCommand::List => {
                let jobs = orch.list_jobs().await?;
                self.printer.emit(jobs.as_slice(), output::jobs)?;
            }
            JobsCommand::Show { id } => {
                let progress = orch.job_progress(&id).await?;
                self.printer.emit(&progress, output::progress)?;
            }
            JobsCommand::Batches { id } => {
                let batches = orch.get_job_batches(&id).await?;
                self.printer.emit(batches.as_slice(), output::batches)?;
            }
            JobsCommand::Retry { id, no_start } => {
                let job = orch.retry_migration(&id).await?;
                if no_start {
                    store.flush().await?;
                    self.printer.emit(&job, |j| println!("Job {} is {}", j.id, j.status))?;
                } else {
                    let running = orch.start_migration(&id).await?;
                    let result = self.run_to_end(&orch, running).await;
                    store.flush().await?;
                    self.finish(result?)?;
                }
            }
            JobsCommand::Stop { id } => {
                let job = orch.stop_migration(&id).await?;
                store.flush().await?;
                self.printer.emit(&job, |j| println!("Job {} is {}", j.id, j.status))?;
            }
            JobsCommand::ClearCompleted => {
                let removed = orch.clear_completed_jobs().await?;
                store.flush().await?;
                self.printer.emit(&serde_json::json!({ "removed": removed }), |_| {
                    println!("Removed {removed} completed job(s)")
                })?;
            }
        }
        Ok(())
    }

    async fn introspector(&self, connection: &str) -> Result<SchemaIntrospector, CliError> {
        let source = self.factory.source(connection).await?;
        Ok(SchemaIntrospector::new(source))
    }

    fn orchestrator(&self) -> Result<(Orchestrator, Arc<SledStateStore>), CliError> {
        let sled = Arc::new(SledStateStore::open(&self.settings.state_dir)?);
        let store: Arc<dyn StateStore> = sled.clone();
        let orch = Orchestrator::new(
            store,
            self.factory.clone(),
            RunOptions::from_settings(&self.settings),
        );
        Ok((orch, sled))
    }

    /// Waits for a running job. The first SIGINT or SIGTERM asks the job to
    /// stop after its current batch.
    async fn run_to_end(
        &self,
        orch: &Orchestrator,
        running: RunningJob,
    ) -> Result<(MigrationJob, bool), CliError> {
        let job_id = running.job_id();
        info!(%job_id, "Migration started, press Ctrl+C to stop");

        let shutdown = ShutdownCoordinator::new(CancellationToken::new());
        shutdown.register_handlers();
        let token = shutdown.cancel_token();

        let mut wait = Box::pin(running.wait());
        let finished = tokio::select! {
            result = &mut wait => Some(result),
            _ = token.cancelled() => None,
        };

        let job = match finished {
            Some(result) => result?,
            None => {
                if let Err(err) = orch.stop_migration(&job_id).await {
                    warn!(%job_id, "Could not request a stop: {err}");
                }
                wait.await?
            }
        };
        Ok((job, shutdown.is_shutdown_requested()))
    }

    fn finish(&self, (job, interrupted): (MigrationJob, bool)) -> Result<(), CliError> {
        self.printer.emit(&job, |j| {
            println!(
                "Job {} {}: {} processed, {} failed",
                j.id, j.status, j.processed_records, j.failed_records
            );
            if let Some(msg) = &j.error_message {
                println!("Last error: {msg}");
            }
        })?;

        match job.status {
            JobStatus::Completed => Ok(()),
            JobStatus::Stopped if interrupted => Err(CliError::ShutdownRequested),
            status => Err(CliError::JobUnsuccessful {
                job_id: job.id.to_string(),
                status: status.to_string(),
            }),
        }
    }
}
