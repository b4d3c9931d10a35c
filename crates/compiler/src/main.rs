//! c23c CLI.
//!
//! Command-line driver for the compiler front- and middle-end: compile
//! a file, or print one stage's human-readable dump.

use c23c::{CompilerConfig, Phase, TranslationUnit};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

/// Compiled when no input file is given, mirroring the original
/// driver's built-in test snippet.
const DEFAULT_SNIPPET: &str = "int main() { const int x = 10; register short int y = 11; x + y; }";

#[derive(Parser)]
#[command(name = "c23c")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "C23 front- and middle-end: tokens, AST, types, SSA", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a C source file through all phases
    Build {
        /// Input source file (a built-in snippet is compiled when
        /// omitted)
        input: Option<PathBuf>,

        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop at the first phase that reports an error
        #[arg(long)]
        abort_on_error: bool,

        /// Disable ANSI color in diagnostics
        #[arg(long)]
        no_color: bool,
    },

    /// Print one stage's dump for a source file
    Dump {
        /// Input source file
        input: Option<PathBuf>,

        /// Which stage to dump
        #[arg(long, value_enum, default_value_t = Stage::Ast)]
        stage: Stage,

        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Stage {
    Tokens,
    Ast,
    Types,
    Ir,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            config,
            abort_on_error,
            no_color,
        } => {
            let mut config = load_config(config.as_deref());
            if abort_on_error {
                config.abort_on_error = true;
            }
            if no_color {
                config.color = false;
            }
            run_build(input.as_deref(), &config);
        }
        Commands::Dump {
            input,
            stage,
            config,
        } => {
            let config = load_config(config.as_deref());
            run_dump(input.as_deref(), stage, &config);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "c23c", &mut io::stdout());
        }
    }
}

fn load_config(path: Option<&Path>) -> CompilerConfig {
    match path {
        Some(path) => match CompilerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        },
        None => CompilerConfig::default(),
    }
}

fn compile(input: Option<&Path>, config: &CompilerConfig, until: Phase) -> TranslationUnit {
    match input {
        Some(path) => {
            let source = match std::fs::read_to_string(path) {
                Ok(source) => source,
                Err(e) => {
                    eprintln!("error: unable to open file {} ({})", path.display(), e);
                    process::exit(1);
                }
            };
            let (tu, _) =
                c23c::compile_until(path.display().to_string(), source, config, until);
            tu
        }
        None => {
            let (tu, _) = c23c::compile_until("<builtin>", DEFAULT_SNIPPET, config, until);
            tu
        }
    }
}

/// Render every accumulated diagnostic to stderr; exit status 1 if any
/// of them was an error.
fn finish(tu: &TranslationUnit, config: &CompilerConfig) {
    eprint!("{}", c23c::diag::render_all(&tu.diagnostics, &tu.source, config.color));
    if tu.has_errors() {
        process::exit(1);
    }
}

fn run_build(input: Option<&Path>, config: &CompilerConfig) {
    let tu = compile(input, config, Phase::Emit);
    finish(&tu, config);
}

fn run_dump(input: Option<&Path>, stage: Stage, config: &CompilerConfig) {
    let until = match stage {
        Stage::Tokens => Phase::Lex,
        Stage::Ast => Phase::Parse,
        Stage::Types => Phase::Resolve,
        Stage::Ir => Phase::Emit,
    };
    let tu = compile(input, config, until);
    let dump = match stage {
        Stage::Tokens => c23c::dump_tokens(&tu),
        Stage::Ast => c23c::dump_ast(&tu),
        Stage::Types => c23c::dump_scopes(&tu),
        Stage::Ir => c23c::dump_ir(&tu),
    };
    print!("{}", dump);
    finish(&tu, config);
}
