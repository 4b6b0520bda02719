mod args;

use std::error::Error as _;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use nswag_lib::{
    BinaryLocator, GeneratorBinary, GeneratorOutput, Input, Nswag, NswagError, RunOptions, Runtime,
};
use thiserror::Error;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::parse_key_value;

/// Run the NSwag code generator against a temporarily patched config.
///
/// Examples:
///   nswag-run detect
///   nswag-run run api/main.nswag --input-path api/openapi.json \
///       --output openApiToTypeScriptClient=src/api/client.ts
///   nswag-run openapi2tsclient api/openapi.json src/api/client.ts
#[derive(Parser)]
#[command(name = "nswag-run")]
#[command(version)]
#[command(about = "Run the NSwag code generator against a temporarily patched config")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    log_verbosity: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Runtime variant to use, e.g. "NetCore 3.1" (detected when omitted)
    #[arg(long, global = true, env = "NSWAG_RUNTIME", value_name = "RUNTIME")]
    runtime: Option<Runtime>,

    /// Directory holding the NSwag binaries (the package's bin/binaries)
    #[arg(long, global = true, env = "NSWAG_BINARIES_DIR", value_name = "DIR")]
    binaries_dir: Option<PathBuf>,

    /// Generator executable to run instead of a runtime's NSwag binary
    #[arg(long, global = true, value_name = "PATH")]
    binary: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the runtime variant detected for this host
    Detect,

    /// Patch CONFIG with input and outputs, run `nswag run`, then restore CONFIG
    Run(RunArgs),

    /// Generate a TypeScript client straight from an OpenAPI document
    #[command(name = "openapi2tsclient")]
    OpenApi2TsClient {
        /// OpenAPI/Swagger document (path or URL)
        input: String,
        /// File to write the client to
        output: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// The .nswag config document
    config: PathBuf,

    /// JSON file with input, outputs and variables; flags take precedence
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Local OpenAPI/Swagger document
    #[arg(long, value_name = "PATH", conflicts_with = "input_url")]
    input_path: Option<String>,

    /// Remote OpenAPI/Swagger document
    #[arg(long, value_name = "URL")]
    input_url: Option<String>,

    /// Inline JSON document, or a path to one
    #[arg(long, value_name = "JSON")]
    input_json: Option<String>,

    /// Output path for a code generator in the config (repeatable)
    #[arg(short = 'o', long = "output", value_name = "GENERATOR=PATH", value_parser = parse_key_value)]
    outputs: Vec<(String, String)>,

    /// NSwag variable passed as /variables: (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    variables: Vec<(String, String)>,
}

impl RunArgs {
    fn into_options(self) -> Result<(PathBuf, RunOptions), NswagError> {
        let mut options = match &self.options {
            Some(file) => RunOptions::from_file(file)?,
            None => RunOptions::default(),
        };

        if self.input_path.is_some() || self.input_url.is_some() {
            options.input = Input {
                path: self.input_path,
                url: self.input_url,
                json: options.input.json.take(),
            };
        }
        if let Some(json) = self.input_json {
            options.input.json = Some(json);
        }

        options.outputs.extend(self.outputs);
        options.variables.extend(self.variables);

        Ok((self.config, options))
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Nswag(#[from] NswagError),

    #[error("failed to write generator output: {0}")]
    Stdout(#[source] io::Error),
}

/// Initialize tracing subscriber based on verbosity and output format
fn init_tracing(verbose: u8, json: bool) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,nswag_lib=info,nswag_run=info".to_string(),
            2 => "info,nswag_lib=debug,nswag_run=debug".to_string(),
            _ => "debug,nswag_lib=trace,nswag_run=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_file(verbose >= 3)
                    .with_line_number(verbose >= 3)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}

/// Builds the facade from the global flags.
///
/// `--binary` wins over `--runtime`; without either the runtime is detected.
fn build_nswag(global: &GlobalArgs) -> Result<Nswag, NswagError> {
    if let Some(binary) = &global.binary {
        return Ok(Nswag::from_binary(GeneratorBinary::direct(binary)));
    }

    let runtime = match global.runtime {
        Some(runtime) => runtime,
        None => Runtime::detect()?,
    };

    let mut locator = BinaryLocator::new();
    if let Some(dir) = &global.binaries_dir {
        locator = locator.with_dir(dir);
    }

    Nswag::with_locator(runtime, &locator)
}

/// Prints the generator's stdout and maps its status to our exit code.
fn finish(output: GeneratorOutput) -> Result<ExitCode, CliError> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(output.stdout.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(CliError::Stdout)?;

    if output.success() {
        return Ok(ExitCode::SUCCESS);
    }

    Ok(output
        .code()
        .and_then(|code| u8::try_from(code).ok())
        .filter(|code| *code != 0)
        .map_or(ExitCode::FAILURE, ExitCode::from))
}

async fn execute(cli: Cli) -> Result<ExitCode, CliError> {
    match cli.command {
        Commands::Detect => {
            let runtime = Runtime::detect()?;
            println!("{runtime}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run(args) => {
            let nswag = build_nswag(&cli.global)?;
            let (config, options) = args.into_options()?;
            tracing::info!(config = %config.display(), outputs = options.outputs.len(), "Running generator");

            finish(nswag.run(&config, &options).await?)
        }
        Commands::OpenApi2TsClient { input, output } => {
            let nswag = build_nswag(&cli.global)?;
            finish(nswag.openapi2tsclient(&input, &output).await?)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.global.log_verbosity, cli.global.json);

    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nswag-run").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn run_flags_become_options() {
        let cli = parse(&[
            "run",
            "main.nswag",
            "--input-url",
            "https://example.com/api.json",
            "-o",
            "openApiToTypeScriptClient=client.ts",
            "--var",
            "Namespace=Pets",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };

        let (config, options) = args.into_options().unwrap();
        assert_eq!(config, PathBuf::from("main.nswag"));
        assert_eq!(options.input, Input::url("https://example.com/api.json"));
        assert_eq!(options.outputs["openApiToTypeScriptClient"], "client.ts");
        assert_eq!(options.variables["Namespace"], "Pets");
    }

    #[test]
    fn input_path_conflicts_with_url() {
        let result = Cli::try_parse_from([
            "nswag-run",
            "run",
            "main.nswag",
            "--input-path",
            "a.json",
            "--input-url",
            "https://example.com/a.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn runtime_flag_parses_labels() {
        let cli = parse(&["--runtime", "NetCore 2.2", "detect"]);
        assert_eq!(cli.global.runtime, Some(Runtime::NetCore22));
    }

    #[test]
    fn flags_override_options_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("options.json");
        std::fs::write(
            &file,
            r#"{"input":{"path":"old.json","json":"{}"},"outputs":{"openApiToTypeScriptClient":"old.ts"}}"#,
        )
        .unwrap();

        let cli = parse(&[
            "run",
            "main.nswag",
            "--options",
            file.to_str().unwrap(),
            "--input-url",
            "https://example.com/new.json",
            "--output",
            "openApiToTypeScriptClient=new.ts",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };

        let (_, options) = args.into_options().unwrap();
        assert_eq!(options.input.path, None);
        assert_eq!(options.input.url.as_deref(), Some("https://example.com/new.json"));
        assert_eq!(options.input.json.as_deref(), Some("{}"));
        assert_eq!(options.outputs["openApiToTypeScriptClient"], "new.ts");
    }
}
