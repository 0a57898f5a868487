//! shape-query: run a structural query recipe over a JSON element model.
//!
//! The input document holds both parts:
//!
//! ```text
//! { "recipe": { "statements": [...] }, "model": { "elements": [...] } }
//! ```
//!
//! Every element of the model is walked depth-first and printed with its
//! verdict, sorted by id.

mod run;

use clap::{Parser, crate_version};
use run::{Document, Format, RunError};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Options for the application.
#[derive(Parser)]
#[command(version = crate_version!(), about = "Run a structural query recipe over an element model")]
struct Opts {
    /// JSON document holding the recipe and the model.
    #[arg(short, long, env = "SHAPE_QUERY_INPUT")]
    input: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Text, env = "SHAPE_QUERY_FORMAT")]
    format: Format,

    /// Also report the elements defining this variable. Repeatable.
    #[arg(short, long = "named", value_name = "VARIABLE")]
    named: Vec<String>,

    /// Print debug information
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    let default_filter = if opts.debug {
        "shape_query=debug,shape_graph=debug,shape_query_cli=debug"
    } else {
        "shape_query=info,shape_graph=info,shape_query_cli=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let document = match Document::load(&opts.input) {
        Ok(document) => document,
        Err(RunError::Syntax(err)) => {
            eprintln!("{}", err.render());
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    let named: Vec<&str> = opts.named.iter().map(String::as_str).collect();
    let verdicts = document.evaluate(&named)?;
    print!("{}", run::render(&verdicts, opts.format)?);
    Ok(())
}
