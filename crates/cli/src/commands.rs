use clap::Subcommand;
use model::core::identifiers::{ConfigId, JobId};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Check that a named connection is reachable
    TestConn {
        /// Connection name from the settings file
        connection: String,
    },
    /// List the tables visible to a source connection
    Tables { connection: String },
    /// Describe the columns of a source table
    Columns {
        connection: String,

        /// Table name, optionally schema qualified
        table: String,
    },
    /// Analyze the result shape, provenance and joins of a query
    Analyze {
        connection: String,

        #[command(flatten)]
        query: QueryArg,
    },
    /// Suggest field mappings for a query
    Suggest {
        connection: String,

        #[command(flatten)]
        query: QueryArg,

        #[arg(long, help = "Destination index name")]
        index: String,
    },
    /// Validate the field mappings of a configuration file
    Validate {
        #[arg(help = "Mapping configuration JSON file")]
        file: PathBuf,

        #[arg(
            long,
            help = "Also check source fields against the columns the query produces"
        )]
        analyze: bool,
    },
    /// Manage stored mapping configurations
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Run a configuration for a few rows without writing anything
    Preview {
        id: ConfigId,

        #[arg(long, default_value_t = 10)]
        limit: u64,
    },
    /// Create and run a migration job, waiting for it to finish
    Migrate {
        id: ConfigId,

        #[arg(long, conflicts_with = "full", help = "Only load rows past the stored watermark")]
        incremental: bool,

        #[arg(long, help = "Load every row even if the configuration is incremental")]
        full: bool,
    },
    /// Inspect and manage migration jobs
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },
}

#[derive(clap::Args)]
#[group(required = true, multiple = false)]
pub struct QueryArg {
    #[arg(long, help = "SQL query text")]
    pub query: Option<String>,

    #[arg(long, help = "File containing the SQL query")]
    pub query_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Store a configuration from a JSON file
    Import { file: PathBuf },
    /// Print a stored configuration as JSON
    Export {
        id: ConfigId,

        #[arg(long, help = "Write to this file instead of stdout")]
        output: Option<PathBuf>,
    },
    List,
}

#[derive(Subcommand)]
pub enum JobsCommand {
    List,
    /// Show the progress of a job
    Show { id: JobId },
    /// List the batches of a job
    Batches { id: JobId },
    /// Reset a failed or stopped job and run it again
    Retry {
        id: JobId,

        #[arg(long, help = "Only reset the job, do not run it")]
        no_start: bool,
    },
    /// Mark a job left running by a dead process as stopped
    Stop { id: JobId },
    /// Delete completed jobs and their batches
    ClearCompleted,
}
