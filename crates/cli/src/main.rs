// Boopkit CLI - headless text transformation
//
// The reference consumer of the core: loads the script library, runs one
// script against stdin or a file, and prints the transformed text.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use boopkit_assets::EmbeddedAssets;
use boopkit_engine::{ExecutionInput, Executor, MutationKind};
use boopkit_logging::FileSink;
use boopkit_scripts::{Library, Loader, Script};

const EXIT_SUCCESS: u8 = 0;
const EXIT_SCRIPT_ERROR: u8 = 1;
const EXIT_ARGS_ERROR: u8 = 2;
const EXIT_IO_ERROR: u8 = 3;

#[derive(Parser)]
#[command(name = "boopkit")]
#[command(about = "Boop-compatible text transformations, headless")]
#[command(version)]
struct Cli {
    /// Directory of user scripts merged into the library
    #[arg(long, global = true)]
    scripts_dir: Option<PathBuf>,

    /// Append engine and script log entries to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all scripts in canonical order
    List,

    /// Fuzzy-search scripts by name
    Search {
        /// Search query
        query: String,
    },

    /// Run a script against text from stdin or a file
    Run {
        /// Built-in script name, or path to a .js file
        script: String,

        /// Read input text from a file instead of stdin
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Execution timeout in seconds
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },

    /// Detect the content format of text from stdin or a file
    Detect {
        /// Read input text from a file instead of stdin
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(path) = &cli.log_file {
        match FileSink::open(path) {
            Ok(sink) => {
                boopkit_logging::set_sink(Box::new(sink));
            }
            Err(err) => {
                eprintln!("error: cannot open log file {}: {err}", path.display());
                return ExitCode::from(EXIT_IO_ERROR);
            }
        }
    }

    let result = match cli.command {
        Commands::List => cmd_list(cli.scripts_dir.as_deref()),
        Commands::Search { query } => cmd_search(cli.scripts_dir.as_deref(), &query),
        Commands::Run {
            script,
            input,
            timeout,
        } => cmd_run(cli.scripts_dir.as_deref(), &script, input, timeout),
        Commands::Detect { input } => cmd_detect(input),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message }) => {
            eprintln!("error: {message}");
            ExitCode::from(code)
        }
    }
}

struct CliError {
    code: u8,
    message: String,
}

impl CliError {
    fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ARGS_ERROR, message: msg.into() }
    }

    fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO_ERROR, message: msg.into() }
    }

    fn script(msg: impl Into<String>) -> Self {
        Self { code: EXIT_SCRIPT_ERROR, message: msg.into() }
    }
}

fn load_library(scripts_dir: Option<&std::path::Path>) -> Library {
    Library::new(Loader::new(&EmbeddedAssets).load(scripts_dir))
}

// ============================================================================
// list / search
// ============================================================================

fn cmd_list(scripts_dir: Option<&std::path::Path>) -> Result<(), CliError> {
    print_scripts(&load_library(scripts_dir).all())
}

fn cmd_search(scripts_dir: Option<&std::path::Path>, query: &str) -> Result<(), CliError> {
    print_scripts(&load_library(scripts_dir).search(query))
}

fn print_scripts(scripts: &[Script]) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for script in scripts {
        writeln!(handle, "{}\t{}", script.name, script.description)
            .map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// run
// ============================================================================

fn cmd_run(
    scripts_dir: Option<&std::path::Path>,
    script: &str,
    input: Option<PathBuf>,
    timeout: u64,
) -> Result<(), CliError> {
    let (name, source) = resolve_script(scripts_dir, script)?;
    let text = read_input(input)?;

    let exec_input = ExecutionInput {
        script_source: source,
        script_name: name,
        selection_text: text.clone(),
        selection_start: 0,
        selection_end: text.chars().count(),
        full_text: text.clone(),
        timeout: Duration::from_secs(timeout),
    };

    let result = Executor::new().execute(&exec_input);

    if !result.success {
        return Err(CliError::script(result.error_message));
    }
    if !result.info_message.is_empty() {
        eprintln!("{}", result.info_message);
    }

    // The whole input is the selection, so each mutation reduces to one
    // replacement of the output text.
    let output = match result.mutation {
        MutationKind::None => text,
        MutationKind::ReplaceDoc => result.new_full_text,
        MutationKind::ReplaceSelect => result.new_text,
        MutationKind::InsertAtCursor => result.insert_text,
    };

    io::stdout()
        .write_all(output.as_bytes())
        .map_err(|e| CliError::io(e.to_string()))?;
    Ok(())
}

/// A `.js` path runs that file; anything else is looked up in the library
/// by exact name first, then by fuzzy search.
fn resolve_script(
    scripts_dir: Option<&std::path::Path>,
    script: &str,
) -> Result<(String, String), CliError> {
    if script.ends_with(".js") {
        let path = PathBuf::from(script);
        let source = std::fs::read_to_string(&path)
            .map_err(|e| CliError::io(format!("{}: {e}", path.display())))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| script.to_string());
        return Ok((name, source));
    }

    let library = load_library(scripts_dir);
    if let Some(found) = library.all().into_iter().find(|s| s.name == script) {
        return Ok((found.name, found.content));
    }
    if let Some(found) = library.search(script).into_iter().next() {
        return Ok((found.name, found.content));
    }
    Err(CliError::args(format!("no script matches '{script}'")))
}

// ============================================================================
// detect
// ============================================================================

fn cmd_detect(input: Option<PathBuf>) -> Result<(), CliError> {
    let text = read_input(input)?;
    if let Some(language) = boopkit_detect::detect(&text) {
        println!("{}\t{}", language.id, language.name);
    }
    Ok(())
}

fn read_input(input: Option<PathBuf>) -> Result<String, CliError> {
    match input {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|e| CliError::io(format!("{}: {e}", path.display()))),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| CliError::io(e.to_string()))?;
            Ok(buffer)
        }
    }
}
