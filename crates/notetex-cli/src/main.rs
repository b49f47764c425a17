//! notetex: CLI tool to convert annotated Markdown notes to LaTeX via Pandoc

mod config;
mod pandoc;
mod render;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use notetex_ast::Pandoc;
use notetex_core::{
    CalloutRewriter, ExportError, ExportOutcome, default_output_path, export_drawing, export_png,
    load_render_result, needs_refresh, preamble, rewrite_callouts,
};

use config::{CONFIG_FILE_NAME, Config, ConverterKind};
use pandoc::PandocConverter;
use render::RenderError;

/// Process exit statuses, one per failure class
mod status {
    pub const FAILURE: u8 = 1;
    pub const MISSING_DEPENDENCY: u8 = 2;
    pub const UNREADABLE_INPUT: u8 = 3;
    pub const MALFORMED_INPUT: u8 = 4;
    pub const NO_PAYLOAD: u8 = 5;
}

#[derive(Parser, Debug)]
#[command(name = "notetex")]
#[command(about = "Convert annotated Markdown notes to LaTeX via Pandoc")]
#[command(version)]
#[command(after_help = "Examples:
  pandoc -t json note.md | notetex filter | pandoc -f json -o note.tex
  notetex export canvas.tldr                # Write canvas.png next to the drawing
  notetex export drawings/*.tldr -o build/  # Export several drawings into build/
  notetex preamble > callouts.tex           # tcolorbox definitions for the environments
  notetex init                              # Create _notetex.toml")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to _notetex.toml in the current directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - only show errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rewrite callouts in a Pandoc JSON document (stdin to stdout)
    Filter(FilterArgs),
    /// Export the PNG preview of one or more drawings
    Export(ExportArgs),
    /// Print a LaTeX preamble defining the callout environments
    Preamble,
    /// Create a sample configuration file
    Init(InitArgs),
    /// Print the JSON schema of the configuration file
    Schema,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Read the document from a file instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write the document to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Converter for blocks inside callouts that have no dedicated rule
    #[arg(long, value_enum)]
    converter: Option<ConverterKind>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Drawing files
    #[arg(required = true)]
    drawings: Vec<PathBuf>,

    /// Output PNG file, or output directory when exporting several drawings
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Re-export even if the PNG is newer than the drawing
    #[arg(short, long)]
    force: bool,

    /// Fail instead of using the embedded preview when the render command fails
    #[arg(long)]
    no_fallback: bool,

    /// Number of parallel jobs (defaults to number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Directory to create the configuration file in
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Overwrite an existing configuration file
    #[arg(short, long)]
    force: bool,
}

/// Failures reading the document handed to `filter`
#[derive(Debug, thiserror::Error)]
enum InputError {
    #[error("Failed to read {name}: {source}")]
    Unreadable { name: String, source: io::Error },

    #[error("Input is not a Pandoc JSON document: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Settings shared by every drawing of one `export` run
struct ExportOptions {
    render_command: Option<Vec<String>>,
    fallback: bool,
    force: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_status(&err))
        }
    }
}

/// --verbose enables INFO level, --quiet only shows errors, otherwise use
/// RUST_LOG or default to WARN. Logs go to stderr since stdout may carry a
/// document.
fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("info")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Filter(args) => {
            let config = load_config(cli.config.as_deref())?;
            filter_document(&args, &config)
        }
        Commands::Export(args) => {
            let config = load_config(cli.config.as_deref())?;
            export_drawings(&args, &config, cli.quiet)
        }
        Commands::Preamble => {
            let config = load_config(cli.config.as_deref())?;
            print!("{}", preamble(&config.callouts.to_callout_config()));
            Ok(())
        }
        Commands::Init(args) => init_config(&args, cli.quiet),
        Commands::Schema => {
            println!("{}", Config::json_schema_string()?);
            Ok(())
        }
    }
}

/// Load the configuration from `path`, or from the current directory if present
fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Config::load(path);
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(Config::load_from_dir(&cwd)?.unwrap_or_default())
}

/// Map an error to the exit status of its failure class
fn exit_status(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ExportError>() {
            return match e {
                ExportError::Read { .. } => status::UNREADABLE_INPUT,
                ExportError::Json { .. } | ExportError::Decode(_) => status::MALFORMED_INPUT,
                ExportError::NoPayload(_) => status::NO_PAYLOAD,
                ExportError::Write { .. } => status::FAILURE,
            };
        }
        if let Some(e) = cause.downcast_ref::<RenderError>() {
            return match e {
                e if e.is_missing_dependency() => status::MISSING_DEPENDENCY,
                RenderError::Json(_) => status::MALFORMED_INPUT,
                _ => status::FAILURE,
            };
        }
        if let Some(e) = cause.downcast_ref::<InputError>() {
            return match e {
                InputError::Unreadable { .. } => status::UNREADABLE_INPUT,
                InputError::Malformed(_) => status::MALFORMED_INPUT,
            };
        }
    }
    status::FAILURE
}

/// Rewrite the callouts of a Pandoc JSON document
fn filter_document(args: &FilterArgs, config: &Config) -> Result<()> {
    let content = match &args.input {
        Some(path) => fs::read_to_string(path).map_err(|source| InputError::Unreadable {
            name: path.display().to_string(),
            source,
        })?,
        None => {
            let mut content = String::new();
            io::stdin()
                .read_to_string(&mut content)
                .map_err(|source| InputError::Unreadable {
                    name: "stdin".to_string(),
                    source,
                })?;
            content
        }
    };

    let mut doc: Pandoc = serde_json::from_str(&content).map_err(InputError::Malformed)?;
    let callouts = config.callouts.to_callout_config();
    let converter = args
        .converter
        .or(config.render.converter)
        .unwrap_or_default();

    let count = match converter {
        ConverterKind::Builtin => rewrite_callouts(&mut doc, &CalloutRewriter::new(callouts)),
        ConverterKind::Pandoc => {
            let program = config
                .render
                .pandoc
                .clone()
                .unwrap_or_else(|| PathBuf::from("pandoc"));
            let converter =
                PandocConverter::new(program).with_api_version(doc.api_version.clone());
            info!(pandoc = %converter.program().display(), "converting other blocks with pandoc");
            rewrite_callouts(
                &mut doc,
                &CalloutRewriter::with_converter(callouts, converter),
            )
        }
    };
    info!(count, ?converter, "rewrote callouts");

    let json = serde_json::to_string(&doc).context("Failed to serialize document")?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write: {}", path.display()))?
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(json.as_bytes())
                .and_then(|()| stdout.flush())
                .context("Failed to write to stdout")?;
        }
    }

    Ok(())
}

/// Export drawings in parallel
fn export_drawings(args: &ExportArgs, config: &Config, quiet: bool) -> Result<()> {
    let options = ExportOptions {
        render_command: config.export.render_command.clone(),
        fallback: !args.no_fallback && config.export.fallback.unwrap_or(true),
        force: args.force || config.export.force.unwrap_or(false),
    };

    // Configure thread pool if jobs specified
    if let Some(n) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok(); // Ignore error if already initialized
    }

    let several = args.drawings.len() > 1;
    let total = args.drawings.len();

    // Atomic counters for thread-safe progress tracking
    let written = AtomicUsize::new(0);
    let fresh = AtomicUsize::new(0);

    let errors: Vec<_> = args
        .drawings
        .par_iter()
        .filter_map(|drawing| {
            let output = output_path(drawing, args.output.as_deref(), several);
            match export_one(drawing, &output, &options) {
                Ok(ExportOutcome::Written { output, bytes }) => {
                    written.fetch_add(1, Ordering::Relaxed);
                    info!(drawing = %drawing.display(), bytes, "exported");
                    if !quiet {
                        println!("{}", output.display());
                    }
                    None
                }
                Ok(ExportOutcome::UpToDate { output }) => {
                    fresh.fetch_add(1, Ordering::Relaxed);
                    info!(output = %output.display(), "up to date");
                    None
                }
                Err(e) => Some((drawing, e)),
            }
        })
        .collect();

    // Report errors
    for (drawing, e) in &errors {
        eprintln!("Error exporting {}: {:#}", drawing.display(), e);
    }

    if several && !quiet {
        eprintln!(
            "Exported {} drawings, {} up to date, {} failed",
            written.load(Ordering::Relaxed),
            fresh.load(Ordering::Relaxed),
            errors.len()
        );
    }

    let failed = errors.len();
    match errors.into_iter().next() {
        // The first failure decides the exit status
        Some((_, first)) if several => Err(first.context(format!(
            "{} of {} drawings failed to export",
            failed, total
        ))),
        Some((_, first)) => Err(first),
        None => Ok(()),
    }
}

/// Export one drawing, rendering it with the configured command when there
/// is one
fn export_one(drawing: &Path, output: &Path, options: &ExportOptions) -> Result<ExportOutcome> {
    let Some(command) = &options.render_command else {
        return Ok(export_drawing(drawing, output, options.force)?);
    };

    let unreadable = |source| ExportError::Read {
        path: drawing.to_path_buf(),
        source,
    };
    fs::metadata(drawing).map_err(unreadable)?;
    if !needs_refresh(drawing, output, options.force).map_err(unreadable)? {
        return Ok(ExportOutcome::UpToDate {
            output: output.to_path_buf(),
        });
    }

    let result = match render::render(command, drawing) {
        Ok(result) => result,
        Err(e) if options.fallback => {
            warn!(
                drawing = %drawing.display(),
                "{}, falling back to embedded preview", e
            );
            load_render_result(drawing)?
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to render {}", drawing.display()));
        }
    };

    let bytes = export_png(&result, drawing, output)?;
    Ok(ExportOutcome::Written {
        output: output.to_path_buf(),
        bytes,
    })
}

/// PNG path for `drawing`: next to it by default, inside `output` when
/// exporting several drawings or when `output` is a directory
fn output_path(drawing: &Path, output: Option<&Path>, several: bool) -> PathBuf {
    match output {
        None => default_output_path(drawing),
        Some(dir) if several || dir.is_dir() => {
            let name = drawing.file_name().unwrap_or(drawing.as_os_str());
            dir.join(Path::new(name).with_extension("png"))
        }
        Some(file) => file.to_path_buf(),
    }
}

/// Write a sample configuration file
fn init_config(args: &InitArgs, quiet: bool) -> Result<()> {
    let path = args.dir.join(CONFIG_FILE_NAME);
    if path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let content = Config::sample().to_toml_with_schema()?;
    fs::create_dir_all(&args.dir)
        .with_context(|| format!("Failed to create directory: {}", args.dir.display()))?;
    fs::write(&path, content).with_context(|| format!("Failed to write: {}", path.display()))?;

    if !quiet {
        println!("{}", path.display());
    }
    Ok(())
}
