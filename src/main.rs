// File: src/main.rs
//
// Command-line front end: `run` compiles and executes one program against
// a fixed set of inputs, `check` compiles only and reports diagnostics,
// `repl` launches the interactive line-at-a-time shell (src/repl.rs).

use clap::{Parser, Subcommand};
use colored::Colorize;
use rpnvm::config::Config;
use rpnvm::context::{SimpleContext, StderrLogger};
use rpnvm::engine::Engine;
use rpnvm::value::Value;
use std::fs;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rpnvm", version, about = "A Forth-style RPN compiler and stack virtual machine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile and execute a program, reading source from a file or '-' for stdin.
    Run {
        source: String,
        /// Numeric/text input values made available as $1, $2, ...
        #[arg(short, long = "input", value_name = "VALUE")]
        inputs: Vec<String>,
        /// Treat arithmetic/conversion faults as yielding a null result instead of cancelling.
        #[arg(long)]
        fail_returns_null: bool,
    },
    /// Compile a program and report diagnostics without executing it.
    Check { source: String },
    /// Start an interactive read-eval-print loop.
    Repl,
}

fn read_source(source: &str) -> Result<String, String> {
    if source == "-" {
        use std::io::Read;
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map_err(|e| e.to_string())?;
        Ok(buf)
    } else {
        fs::read_to_string(source).map_err(|e| format!("cannot read '{}': {}", source, e))
    }
}

/// Parses one CLI `--input` value into a `Value`, preferring `Long`, then
/// `Double`, falling back to `Text` -- the same ladder the compiler's own
/// numeric literal tokenizing follows.
fn parse_input_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        Value::Long(n)
    } else if let Ok(d) = raw.parse::<f64>() {
        Value::Double(d)
    } else {
        Value::Text(raw.to_string())
    }
}

fn run(source: String, inputs: Vec<String>, fail_returns_null: bool) -> ExitCode {
    let text = match read_source(&source) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let config = Config::new().with_fail_returns_null(fail_returns_null);
    let engine = match Engine::new(config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let program = match engine.compile(&text, &[], &[]) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // `Engine::execute` pushes `config.fail_returns_null` onto the context
    // itself, so there is no need to set it here too.
    let mut ctx = SimpleContext::new().with_logger(Box::new(StderrLogger));
    for raw in &inputs {
        ctx.push_input(Some(parse_input_value(raw)));
    }

    match engine.execute(&program, &mut ctx) {
        Some(value) => {
            println!("{}", value);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("{}", "task cancelled".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn check(source: String) -> ExitCode {
    let text = match read_source(&source) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let engine = match Engine::new(Config::default()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match engine.compile(&text, &[], &[]) {
        Ok(program) => {
            println!("{} {} reference(s) compiled", "ok:".green().bold(), program.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { source, inputs, fail_returns_null } => run(source, inputs, fail_returns_null),
        Command::Check { source } => check(source),
        Command::Repl => {
            rpnvm::repl::run();
            ExitCode::SUCCESS
        }
    }
}
