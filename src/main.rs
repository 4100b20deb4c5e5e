//! Pascal Compiler CLI
//!
//! Usage: pascalc <input.pas> [-o output] [-f format] [--verbose]

use std::fs;
use std::path::PathBuf;

use clap::Parser as ClapParser;

use pascal::compile;
use pascal::lexer::tokenize;

#[derive(ClapParser)]
#[command(name = "pascalc")]
#[command(version = "0.1.0")]
#[command(about = "Pascal to stack VM compiler", long_about = None)]
struct Cli {
    /// Input Pascal source file
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "vm")]
    format: OutputFormat,

    /// Print a compilation summary to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    /// VM instruction listing
    Vm,
    /// Token dump (for debugging)
    Tokens,
    /// Symbol table dump
    Symbols,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.input)?;

    let output = match cli.format {
        OutputFormat::Tokens => {
            let (tokens, diagnostics) = tokenize(&source);
            for diagnostic in &diagnostics {
                eprintln!("{}", diagnostic);
            }
            let mut out = String::new();
            for token in &tokens {
                out.push_str(&token.to_string());
                out.push('\n');
            }
            out
        }
        OutputFormat::Vm | OutputFormat::Symbols => {
            let compilation = compile(&source)?;
            for warning in &compilation.warnings {
                eprintln!("{}", warning);
            }
            if cli.verbose {
                eprintln!(
                    "Compiled program '{}': {} instructions, {} symbols, {} warnings",
                    compilation.name,
                    compilation.code.len(),
                    compilation.symbols.len(),
                    compilation.warnings.len()
                );
            }

            if cli.format == OutputFormat::Symbols {
                let mut out = String::new();
                for symbol in compilation.symbols.iter() {
                    out.push_str(&format!(
                        "{:>4} {:<16} {}\n",
                        symbol.address, symbol.name, symbol.ty
                    ));
                }
                out
            } else {
                let mut out = compilation.listing();
                out.push('\n');
                out
            }
        }
    };

    if let Some(path) = cli.output {
        fs::write(&path, &output)?;
        eprintln!("Wrote {}", path.display());
    } else {
        print!("{}", output);
    }

    Ok(())
}
