//! Mini-C fuzzer CLI
//!
//! Generates random Mini-C programs and prints them to stdout.
//!
//! # Usage
//!
//! ```text
//! minic-fuzz [OPTIONS]
//!
//! Options:
//!   --seed <SEED>        RNG seed for reproducible output (default: entropy)
//!   -n, --count <N>      Number of programs to generate [default: 1]
//!   --start <SYMBOL>     Start symbol (default: the grammar's start)
//!   --max-depth <N>      Derivation depth budget [default: 64]
//!   --max-bytes <N>      Output size budget in bytes [default: 16384]
//!   --emit <WHAT>        Output format [default: source] [possible values: source, tokens]
//!   -v, --verbose        Increase verbosity (can be repeated)
//!   -q, --quiet          Suppress non-error output
//! ```

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use minic_fuzz::{minic, GeneratedSource, GenerationLimits, Generator, Grammar};

/// Grammar-driven random Mini-C source generator.
///
/// Derives a random program from the Mini-C grammar and prints it, with the
/// guarantee that re-lexing the output reproduces exactly the token sequence
/// chosen during derivation.
#[derive(Parser)]
#[command(name = "minic-fuzz")]
#[command(version)]
#[command(about = "Generate random Mini-C programs for compiler stress testing", long_about = None)]
struct Cli {
    /// RNG seed for reproducible output; defaults to entropy
    #[arg(long)]
    seed: Option<u64>,

    /// Number of programs to generate
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u32,

    /// Start symbol (defaults to the grammar's configured start)
    #[arg(long, value_name = "SYMBOL")]
    start: Option<String>,

    /// Derivation depth budget
    #[arg(long, default_value_t = GenerationLimits::default().max_depth)]
    max_depth: usize,

    /// Output size budget in bytes (in-flight expansions may overshoot it)
    #[arg(long, default_value_t = GenerationLimits::default().max_output_bytes)]
    max_bytes: usize,

    /// What to print for each generated program
    #[arg(long, value_enum, default_value_t = Emit::Source)]
    emit: Emit,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Output format for a generated program.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// The generated source text
    Source,
    /// The emitted token record as JSON
    Tokens,
}

/// Serializable view of one emitted token, for `--emit tokens`.
#[derive(Serialize)]
struct TokenRecord<'a> {
    token: &'a str,
    text: &'a str,
    trivia: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let grammar = match minic::grammar() {
        Ok(grammar) => grammar,
        Err(err) => {
            eprintln!("error: malformed grammar: {err}");
            return ExitCode::FAILURE;
        }
    };
    let lexer = match minic::lexer(&grammar) {
        Ok(lexer) => lexer,
        Err(err) => {
            eprintln!("error: malformed lexer configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let seed = cli.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, "seeded rng");

    let limits = GenerationLimits {
        max_depth: cli.max_depth,
        max_output_bytes: cli.max_bytes,
    };
    let mut generator = match Generator::new(&grammar, &lexer, StdRng::seed_from_u64(seed)) {
        Ok(generator) => generator.with_limits(limits),
        Err(err) => {
            eprintln!("error: malformed grammar: {err}");
            return ExitCode::FAILURE;
        }
    };

    for i in 0..cli.count {
        let generated = match &cli.start {
            Some(symbol) => generator.generate_from(symbol),
            None => generator.generate(),
        };
        let generated = match generated {
            Ok(generated) => generated,
            Err(err) => {
                eprintln!("error: generation failed: {err}");
                return ExitCode::FAILURE;
            }
        };

        if i > 0 {
            println!();
        }
        match cli.emit {
            Emit::Source => print!("{}", generated.text),
            Emit::Tokens => {
                if let Err(err) = print_tokens(&grammar, &generated) {
                    eprintln!("error: {err}");
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}

fn print_tokens(grammar: &Grammar, generated: &GeneratedSource) -> Result<(), serde_json::Error> {
    let records: Vec<TokenRecord<'_>> = generated
        .tokens
        .iter()
        .map(|t| TokenRecord {
            token: grammar.name(t.symbol),
            text: &t.text,
            trivia: t.is_trivia,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
