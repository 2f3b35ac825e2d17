//! The `vm` CLI: parses `vm [--binary] <entry_file> [args...]`, wires
//! logging, and drives `Engine::interpret` to completion.

use clap::Parser;
use meow_vm::Engine;

#[derive(Debug, Parser)]
#[command(name = "vm", version, about = "Runs a bytecode module", long_about = None)]
struct Args {
    /// Path to the entry module (bytecode text format unless --binary is given).
    entry_file: String,
    /// Treat `entry_file` as a binary-serialised prototype (not implemented
    /// by the text loader; always surfaces as a load error).
    #[arg(long)]
    binary: bool,
    /// Raise the log level; repeatable (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Extra arguments passed through to user code via `engine.arguments()`.
    #[arg(trailing_var_arg = true)]
    user_args: Vec<String>,
}

fn main() {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let mut engine = Engine::new(args.user_args);
    match engine.interpret(&args.entry_file, args.binary) {
        Ok(result) => {
            log::debug!("module returned {result:?}");
        }
        Err(err) => {
            eprintln!("vm: {err}");
            std::process::exit(1);
        }
    }
}
