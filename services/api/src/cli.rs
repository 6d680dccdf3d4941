use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use risk_assessment::assessments::CatalogImporter;
use risk_assessment::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Risk Assessment Service",
    about = "Issue tokenized risk questionnaires and score the submitted answers",
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
    /// Inspect questionnaire catalog files
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
    /// Run a complete assessment in-process and print the scored result
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Parse a catalog CSV and report what an import would create
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seed the questionnaire catalog from this CSV file at startup
    #[arg(long)]
    pub(crate) catalog_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Catalog CSV with type,group,question and option rule columns
    #[arg(long)]
    csv: PathBuf,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Catalog {
            command: CatalogCommand::Validate(args),
        } => validate_catalog(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn validate_catalog(args: ValidateArgs) -> Result<(), AppError> {
    let rows = CatalogImporter::from_path(&args.csv)?;
    let summary = CatalogImporter::summarize(&rows);

    println!("Catalog file: {}", args.csv.display());
    println!(
        "  {} type(s), {} group(s), {} question(s)",
        summary.types, summary.groups, summary.questions
    );
    Ok(())
}
