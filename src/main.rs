use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use systemlink::commands::{self, executions, notebooks, results};
use systemlink::notebook::{ExecutionClient, ExecutionSortField, NotebookClient};
use systemlink::result::{ResultClient, ResultField};

/// systemlink - command-line access to SystemLink test results, notebooks and
/// notebook executions
///
/// The server is read from SYSTEMLINK_SERVER_URI and the API key from
/// SYSTEMLINK_API_KEY unless given on the command line. Output is JSON.
///
/// Examples:
///   systemlink results query --filter 'programName == "Smoke"' --all
///   systemlink executions get 6f1c...
#[derive(Parser, Debug)]
#[command(author, version = env!("SYSTEMLINK_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server base URI (also via SYSTEMLINK_SERVER_URI)
    #[arg(
        long = "server",
        short = 's',
        value_name = "URI",
        env = "SYSTEMLINK_SERVER_URI",
        global = true
    )]
    pub server: Option<String>,

    /// API key (also via SYSTEMLINK_API_KEY)
    #[arg(
        long = "api-key",
        value_name = "KEY",
        env = "SYSTEMLINK_API_KEY",
        hide_env_values = true,
        global = true
    )]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long = "timeout", value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Work with test results
    #[command(subcommand)]
    Results(ResultsCommand),

    /// Work with notebooks
    #[command(subcommand)]
    Notebooks(NotebooksCommand),

    /// Work with notebook executions
    #[command(subcommand)]
    Executions(ExecutionsCommand),
}

#[derive(clap::Subcommand, Debug)]
enum ResultsCommand {
    /// List results
    List(PageArgs),

    /// Show one result
    Get {
        /// Result ID
        id: String,
    },

    /// Query results with a Dynamic LINQ filter
    Query(QueryArgs),

    /// List the distinct values of a result field
    Values(ValuesArgs),

    /// Delete one or more results
    Delete {
        /// Result IDs
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },
}

#[derive(clap::Args, Debug)]
struct PageArgs {
    /// Page size
    #[arg(long, value_name = "N")]
    take: Option<u32>,

    /// Fetch every page
    #[arg(long)]
    all: bool,

    /// Include the total number of matches
    #[arg(long)]
    count: bool,
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Filter expression, e.g. 'operator == @0'
    #[arg(long)]
    filter: Option<String>,

    /// Substitution for @0, @1, ... in the filter (repeatable)
    #[arg(long = "substitution", value_name = "VALUE")]
    substitutions: Vec<String>,

    /// Field to order by, e.g. STARTED_AT
    #[arg(long = "order-by", value_name = "FIELD")]
    order_by: Option<ResultField>,

    /// Sort in descending order
    #[arg(long)]
    descending: bool,

    #[command(flatten)]
    page: PageArgs,
}

#[derive(clap::Args, Debug)]
struct ValuesArgs {
    /// Field to return, e.g. SERIAL_NUMBER
    #[arg(value_name = "FIELD")]
    field: ResultField,

    #[arg(long)]
    filter: Option<String>,

    /// Only values starting with this prefix
    #[arg(long = "starts-with", value_name = "PREFIX")]
    starts_with: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum NotebooksCommand {
    /// Show the metadata of one notebook
    Get {
        /// Notebook ID
        id: String,
    },

    /// Query notebooks with a Dynamic LINQ filter
    Query {
        #[arg(long)]
        filter: Option<String>,

        /// Page size
        #[arg(long, value_name = "N")]
        take: Option<u32>,

        /// Fetch every page
        #[arg(long)]
        all: bool,
    },

    /// Delete a notebook
    Delete {
        /// Notebook ID
        id: String,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ExecutionsCommand {
    /// Show one execution
    Get {
        /// Execution ID
        id: String,
    },

    /// Query executions
    Query {
        #[arg(long)]
        filter: Option<String>,

        /// Field to order by, e.g. COMPLETED_AT
        #[arg(long = "order-by", value_name = "FIELD", default_value = "QUEUED_AT")]
        order_by: ExecutionSortField,

        /// Sort in descending order
        #[arg(long)]
        descending: bool,

        /// Field to include (repeatable); all fields when omitted
        #[arg(long = "field", value_name = "FIELD")]
        fields: Vec<String>,
    },
}

impl From<PageArgs> for results::PageOptions {
    fn from(args: PageArgs) -> Self {
        Self {
            take: args.take,
            all: args.all,
            count: args.count,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = systemlink::runtime::RealRuntime;

    let config = commands::connection(
        &runtime,
        cli.server,
        cli.api_key,
        cli.timeout.map(Duration::from_secs),
    )?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Results(command) => {
            let client = ResultClient::new(&config)?;
            match command {
                ResultsCommand::List(args) => {
                    results::list(&client, &results::PageOptions::from(args), &mut out).await?
                }
                ResultsCommand::Get { id } => results::get(&client, &id, &mut out).await?,
                ResultsCommand::Query(args) => {
                    let options = results::QueryOptions {
                        filter: args.filter,
                        substitutions: args.substitutions,
                        order_by: args.order_by,
                        descending: args.descending,
                        page: args.page.into(),
                    };
                    results::query(&client, &options, &mut out).await?
                }
                ResultsCommand::Values(args) => {
                    results::values(&client, args.field, args.filter, args.starts_with, &mut out)
                        .await?
                }
                ResultsCommand::Delete { ids } => results::delete(&client, ids, &mut out).await?,
            }
        }
        Commands::Notebooks(command) => {
            let client = NotebookClient::new(&config)?;
            match command {
                NotebooksCommand::Get { id } => notebooks::get(&client, &id, &mut out).await?,
                NotebooksCommand::Query { filter, take, all } => {
                    notebooks::query(&client, filter, take, all, &mut out).await?
                }
                NotebooksCommand::Delete { id } => notebooks::delete(&client, &id, &mut out).await?,
            }
        }
        Commands::Executions(command) => {
            let client = ExecutionClient::new(&config)?;
            match command {
                ExecutionsCommand::Get { id } => executions::get(&client, &id, &mut out).await?,
                ExecutionsCommand::Query {
                    filter,
                    order_by,
                    descending,
                    fields,
                } => {
                    executions::query(&client, filter, order_by, descending, fields, &mut out)
                        .await?
                }
            }
        }
    }
    out.flush()?;
    Ok(())
}
