// File: src/repl.rs
//
// Interactive line-at-a-time shell over one `Engine`/`SimpleContext` pair:
// each line is compiled and run as its own program, but memory cells and
// accumulated inputs persist across lines, so `#1= #1` on one line followed
// by `#1 5 +` on the next behaves the way a REPL user expects.

use crate::config::Config;
use crate::context::{SimpleContext, StderrLogger};
use crate::engine::Engine;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub fn run() {
    let engine = match Engine::new(Config::default()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };
    let mut ctx = SimpleContext::new().with_logger(Box::new(StderrLogger));

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return;
        }
    };

    println!("rpnvm {} -- type a program, or 'quit' to exit", env!("CARGO_PKG_VERSION"));
    loop {
        match rl.readline("rpn> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "quit" || line == "exit" {
                    break;
                }
                let _ = rl.add_history_entry(line);
                match engine.compile(line, &[], &[]) {
                    Ok(program) => match engine.execute(&program, &mut ctx) {
                        Some(value) => println!("{}", value),
                        None => eprintln!("{}", "task cancelled".red().bold()),
                    },
                    Err(e) => eprintln!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                break;
            }
        }
    }
}
