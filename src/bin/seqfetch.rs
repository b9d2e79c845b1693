use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use seqfetch::command::CommandFetcher;
use seqfetch::config::ConfigLoader;
use seqfetch::domain::{SeqKind, SequenceName, SequenceRequest, Strand};
use seqfetch::error::FetchError;
use seqfetch::fetcher::UnavailableFetcher;
use seqfetch::http::HttpFetcher;
use seqfetch::orchestrator::Orchestrator;
use seqfetch::output::{JsonOutput, MethodsResult, StderrProgress, TextOutput};
use seqfetch::socket::SocketFetcher;
use seqfetch::store::SequenceStore;

#[derive(Parser)]
#[command(name = "seqfetch")]
#[command(about = "Bulk sequence fetch from pfetch-style servers with configurable fallbacks")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch sequences by name")]
    Fetch(FetchArgs),
    #[command(about = "List configured fetch methods")]
    Methods(MethodsArgs),
}

#[derive(Args)]
struct FetchArgs {
    #[arg(required = true)]
    names: Vec<String>,

    #[arg(long)]
    config: Option<String>,

    /// Source database whose method list is used (default list otherwise).
    #[arg(long)]
    source: Option<String>,

    #[arg(long)]
    peptide: bool,

    #[arg(long, value_enum, default_value_t = Strand::Forward)]
    strand: Strand,

    /// Write FASTA to this file instead of stdout.
    #[arg(long)]
    output: Option<Utf8PathBuf>,

    /// Print a JSON fetch report instead of sequences.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct MethodsArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<FetchError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &FetchError) -> u8 {
    match error {
        FetchError::InvalidSequenceName(_)
        | FetchError::MissingConfig
        | FetchError::ConfigRead(_)
        | FetchError::ConfigParse(_)
        | FetchError::UnknownMethod { .. }
        | FetchError::InvalidMethod { .. } => 2,
        FetchError::Connect(_)
        | FetchError::Send(_)
        | FetchError::Receive(_)
        | FetchError::Protocol(_)
        | FetchError::Http(_)
        | FetchError::HttpStatus { .. }
        | FetchError::Command(_)
        | FetchError::MissingTool(_)
        | FetchError::BackendUnavailable(_)
        | FetchError::AllMethodsFailed(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Fetch(args) => run_fetch(args),
        Commands::Methods(args) => run_methods(args),
    }
}

fn run_fetch(args: FetchArgs) -> miette::Result<()> {
    let ctx = ConfigLoader::resolve(args.config.as_deref())?;
    let kind = if args.peptide {
        SeqKind::Peptide
    } else {
        SeqKind::Nucleotide
    };
    let requests = args
        .names
        .iter()
        .map(|name| -> Result<SequenceRequest, FetchError> {
            let name = name.parse::<SequenceName>()?;
            let request = SequenceRequest::new(name, kind).with_strand(args.strand);
            Ok(match &args.source {
                Some(source) => request.with_source(source.clone()),
                None => request,
            })
        })
        .collect::<Result<Vec<_>, FetchError>>()?;

    let orchestrator = Orchestrator::new(
        SocketFetcher,
        HttpFetcher::new()?,
        CommandFetcher,
        UnavailableFetcher::new("database"),
    );
    let mut store = SequenceStore::new();
    let report = if args.json {
        orchestrator.bulk_fetch(&ctx, &requests, &mut store, &JsonOutput)?
    } else {
        // No interrupt hook: a CLI fetch runs until every attempt is done.
        let progress = StderrProgress::new();
        orchestrator.bulk_fetch(&ctx, &requests, &mut store, &progress)?
    };

    if let Some(path) = &args.output {
        store.write_fasta(path)?;
    }
    if args.json {
        JsonOutput::print_report(&report).into_diagnostic()?;
    } else if args.output.is_none() {
        TextOutput::print_fasta(&store).into_diagnostic()?;
    }
    if !report.missing.is_empty() && !args.json {
        eprintln!(
            "{} of {} sequences not found: {}",
            report.missing.len(),
            report.requested,
            report.missing.join(", ")
        );
    }
    Ok(())
}

fn run_methods(args: MethodsArgs) -> miette::Result<()> {
    let ctx = ConfigLoader::resolve(args.config.as_deref())?;
    let result = MethodsResult::from_context(&ctx);
    if args.json {
        JsonOutput::print_methods(&result).into_diagnostic()?;
    } else {
        TextOutput::print_methods(&result).into_diagnostic()?;
    }
    Ok(())
}
