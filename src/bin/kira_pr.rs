use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_protein_report::app::{App, ReportOptions, ReportResult, ResolveResult};
use kira_protein_report::config::{ConfigLoader, ResolvedConfig};
use kira_protein_report::domain::NcbiAccession;
use kira_protein_report::error::KiraError;
use kira_protein_report::output::{JsonOutput, OutputMode, StderrProgress};
use kira_protein_report::usage::UsageStatus;

#[derive(Parser)]
#[command(name = "kira-pr")]
#[command(about = "Protein report builder: NCBI accession in, annotated UniProt dossier out")]
#[command(version, author)]
struct Cli {
    /// Config file (defaults to ./kira-pr.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, short, global = true)]
    verbose: bool,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve an NCBI protein accession to a UniProt accession")]
    Resolve(ResolveArgs),
    #[command(about = "Build the protein report")]
    Report(ReportArgs),
    #[command(about = "Show summary API usage against its limits")]
    Usage,
}

#[derive(Args)]
struct ResolveArgs {
    /// Accession (7XZZ_K, NP_000537.3) or NCBI protein URL
    accession: String,

    #[arg(long)]
    species: Option<String>,
}

#[derive(Args)]
struct ReportArgs {
    /// Accession (7XZZ_K, NP_000537.3) or NCBI protein URL
    accession: String,

    #[arg(long)]
    species: Option<String>,

    #[arg(long)]
    output_dir: Option<String>,

    #[arg(long)]
    file_name: Option<String>,

    /// Keep the HTML report only
    #[arg(long)]
    no_pdf: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::RecordNotFound(_)
        | KiraError::Unresolved(_)
        | KiraError::InvalidAccession(_)
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_)
        | KiraError::EmptySpecies => 2,
        err if err.is_remote() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve(args) => run_resolve(args, &config, output_mode),
        Commands::Report(args) => run_report(args, &config, output_mode),
        Commands::Usage => {
            let app = App::from_config(&config)?;
            let status = app.usage()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_usage(&status).into_diagnostic()?,
                OutputMode::Human => print_usage(&status),
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "kira_protein_report=debug"
    } else {
        "kira_protein_report=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_resolve(
    args: ResolveArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let accession: NcbiAccession = args.accession.parse()?;
    let species = args.species.unwrap_or_else(|| config.species.clone());
    let app = App::from_config(config)?;

    let result = match output_mode {
        OutputMode::Json => {
            let result = app.resolve(&accession, &species, &JsonOutput)?;
            JsonOutput::print_resolve(&result).into_diagnostic()?;
            result
        }
        OutputMode::Human => {
            let result = app.resolve(&accession, &species, &StderrProgress)?;
            print_resolve(&result);
            result
        }
    };
    if result.identifier.is_none() {
        return Err(KiraError::Unresolved(result.accession).into());
    }
    Ok(())
}

fn run_report(
    args: ReportArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let accession: NcbiAccession = args.accession.parse()?;
    let species = args.species.unwrap_or_else(|| config.species.clone());
    let options = ReportOptions {
        output_dir: args
            .output_dir
            .map(Utf8PathBuf::from)
            .unwrap_or_else(|| config.output_dir.clone()),
        file_name: args
            .file_name
            .unwrap_or_else(|| config.output_file_name.clone()),
        pdf: config.pdf && !args.no_pdf,
    };
    let app = App::from_config(config)?;

    match output_mode {
        OutputMode::Json => {
            let result = app.report(&accession, &species, &options, &JsonOutput)?;
            JsonOutput::print_report(&result).into_diagnostic()?;
        }
        OutputMode::Human => {
            let result = app.report(&accession, &species, &options, &StderrProgress)?;
            print_report(&result);
        }
    }
    Ok(())
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

fn print_resolve(result: &ResolveResult) {
    match &result.identifier {
        Some(identifier) => {
            let strategy = result.strategy.map(|kind| kind.as_str()).unwrap_or("-");
            println!(
                "{GREEN}{} -> {identifier}{RESET} (strategy {strategy}, attempts {})",
                result.accession, result.attempts
            );
        }
        None => println!(
            "{YELLOW}{}: no UniProt identifier after {} attempts{RESET}",
            result.accession, result.attempts
        ),
    }
}

fn print_report(result: &ReportResult) {
    println!("{CYAN}KIRA-PR report{RESET}");
    match &result.identifier {
        Some(identifier) => println!("{GREEN}{} -> {identifier}{RESET}", result.accession),
        None => println!("{YELLOW}{}: unresolved{RESET}", result.accession),
    }
    println!("  html: {}", result.html_path);
    if let Some(path) = &result.pdf_path {
        println!("  pdf:  {path}");
    }
    if let Some(path) = &result.protein_image {
        println!("  image: {path}");
    }
    for chart in &result.charts {
        println!("  chart: {chart}");
    }
    if result.all_good {
        println!("{GREEN}all sections complete{RESET}");
    } else {
        println!("{YELLOW}report incomplete ({} warnings){RESET}", result.warnings.len());
        for warning in &result.warnings {
            println!("{YELLOW}  - {warning}{RESET}");
        }
    }
}

fn print_usage(status: &UsageStatus) {
    println!("{CYAN}Summary API usage{RESET} ({})", status.ledger_path);
    println!(
        "  requests last minute: {}/{}",
        status.requests_last_minute, status.limits.requests_per_minute
    );
    println!(
        "  tokens last minute:   {}/{}",
        status.tokens_last_minute, status.limits.tokens_per_minute
    );
    println!(
        "  requests today:       {}/{}",
        status.requests_today, status.limits.requests_per_day
    );
}
