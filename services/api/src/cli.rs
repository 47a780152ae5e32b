use crate::demo::{
    run_catalog_check, run_catalog_list, run_demo, CatalogCheckArgs, CatalogListArgs, DemoArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use linkfolio::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Linkfolio Badge Engine",
    about = "Run and inspect the Linkfolio badge engine from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect or validate a badge catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
    /// Walk a sample profile through a series of activity events
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Print the catalog in evaluation order
    List(CatalogListArgs),
    /// Validate a catalog file without starting the server
    Check(CatalogCheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Catalog {
            command: CatalogCommand::List(args),
        } => run_catalog_list(args),
        Command::Catalog {
            command: CatalogCommand::Check(args),
        } => run_catalog_check(args),
        Command::Demo(args) => run_demo(args),
    }
}
