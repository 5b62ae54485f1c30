use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use sylph_krona::app::App;
use sylph_krona::config::{ConfigLoader, ConfigOverrides};
use sylph_krona::domain::AbundanceColumn;
use sylph_krona::error::KronaError;
use sylph_krona::gtdb::GtdbHttpClient;
use sylph_krona::output::{JsonOutput, LogSink};
use sylph_krona::profile::InputSource;

#[derive(Parser)]
#[command(name = "sylph2krona")]
#[command(
    about = "Join a sylph profile to the GTDB taxonomy and emit krona-ready text files per sample"
)]
#[command(version, author)]
struct Cli {
    #[arg(short, long, help = "sylph profile tsv (use '-' for stdin)")]
    input: InputSource,

    #[arg(long, help = "GTDB bacterial taxonomy tsv (can be gzipped) [default: bac120_taxonomy.tsv]")]
    bac: Option<String>,

    #[arg(long, help = "GTDB archaeal taxonomy tsv (can be gzipped) [default: ar53_taxonomy.tsv]")]
    ar: Option<String>,

    #[arg(
        long,
        value_enum,
        help = "abundance column: tax (Taxonomic) or seq (Sequence) [default: tax]"
    )]
    abundance: Option<AbundanceColumn>,

    #[arg(short, long, help = "output directory for *_krona.txt [default: krona_out]")]
    outdir: Option<String>,

    #[arg(long, help = "JSON config file [default: ./sylph2krona.json if present]")]
    config: Option<String>,

    #[arg(long, help = "never download GTDB files; missing tables contribute no rows")]
    offline: bool,

    #[arg(long, help = "print a JSON run summary instead of the ktImportText command")]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<KronaError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KronaError) -> u8 {
    match error {
        KronaError::MissingColumns(_)
        | KronaError::EmptyProfile
        | KronaError::InvalidAbundance { .. }
        | KronaError::MissingValue { .. }
        | KronaError::ConfigRead(_)
        | KronaError::ConfigParse(_) => 2,
        KronaError::ReleaseHttp(_)
        | KronaError::ReleaseStatus { .. }
        | KronaError::DownloadFailed(_)
        | KronaError::ChecksumMismatch { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        abundance: cli.abundance,
        outdir: cli.outdir,
        bac: cli.bac,
        ar: cli.ar,
        offline: cli.offline,
    };
    let config = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;

    let client = GtdbHttpClient::new()?;
    let app = App::new(client);

    if cli.json {
        let result = app.run(&cli.input, &config, &JsonOutput)?;
        JsonOutput::print_run(&result).into_diagnostic()?;
    } else {
        let result = app.run(&cli.input, &config, &LogSink)?;
        println!("# run this to build a multi-dataset krona chart");
        println!("{}", result.command);
    }
    Ok(())
}
