//! CLI front-end: compiles one Cypher statement to SQL and prints the
//! result. Performs no execution against a database (spec §1, §6) — a thin
//! wrapper around [`cyprsql::compile`], grounded on the teacher's
//! clap-derive + `env_logger` `main.rs`.

use std::io::Read;

use clap::Parser;
use serde::Serialize;

/// Compile an openCypher query into SQL for a SQLite-style property-graph
/// schema.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The Cypher query to compile. Reads from stdin if omitted.
    query: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the result as JSON (`{"sql": ..., "params": [...]}`) instead
    /// of the default human-readable form.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct CompileOutput {
    sql: String,
    params: Vec<String>,
}

fn verbosity_filter(level: u8) -> &'static str {
    match level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn read_query(cli_query: Option<String>) -> std::io::Result<String> {
    match cli_query {
        Some(q) => Ok(q),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(verbosity_filter(cli.verbose))).init();

    let json = cli.json;
    let query = match read_query(cli.query) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("failed to read query: {e}");
            std::process::exit(1);
        }
    };

    match cyprsql::compile(&query) {
        Ok((sql, params)) => {
            if json {
                let out = CompileOutput { sql, params };
                match serde_json::to_string_pretty(&out) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        eprintln!("failed to serialize output: {e}");
                        std::process::exit(1);
                    }
                }
            } else {
                println!("{sql}");
                if !params.is_empty() {
                    println!("-- params: {}", params.join(", "));
                }
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
