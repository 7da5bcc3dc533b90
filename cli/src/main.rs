use clap::Parser;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use protog_compiler::{emit_header, emit_source, load_message, verify_graph, Graph};

use crate::log::*;

mod log;

/// Generate a streaming JSON parser for one protobuf message.
///
/// Reads a `.proto` schema, resolves the named message, and writes a
/// `<message>_parser.pb.h` / `<message>_parser.pb.cpp` pair into the
/// current directory. The emitted source includes the given generated
/// protobuf header and feeds field values straight into the message via a
/// yajl event stream.
#[derive(Parser, Debug)]
#[command(name = "protog", version)]
struct Cli {
    /// Input .proto schema file
    schema: PathBuf,

    /// Generated protobuf header the emitted source will #include
    proto_header: String,

    /// Fully qualified message name, e.g. some.ns.MyMessage
    message: String,

    /// Print the parser state graph and other debug output
    #[arg(short, long)]
    verbose: bool,

    /// Only print errors and warnings
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::Debug
    } else if cli.quiet {
        Level::Warn
    } else {
        Level::Info
    };
    SimpleLogger::new().with_level(level).init().unwrap();

    if let Err(err) = try_main(&cli) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

fn try_main(cli: &Cli) -> anyhow::Result<()> {
    let (pool, target) = load_message(&cli.schema, &cli.message)
        .with_context(|| format!("loading {}", cli.schema.display()))?;
    info!("found message '{}'", pool.message(target).full_name);

    let graph = Graph::build(&pool, target).context("building the parser state graph")?;
    verify_graph(&graph).context("verifying the parser state graph")?;
    debug!("parser state graph:\n{}", graph.debug_dump());

    let name = pool.message(target).name.to_lowercase();
    let header_path = format!("{}_parser.pb.h", name);
    let source_path = format!("{}_parser.pb.cpp", name);

    let header = emit_header(&pool, &graph, &cli.proto_header);
    let source = emit_source(&pool, &graph);

    fs::write(&header_path, header).with_context(|| format!("writing {}", header_path))?;
    fs::write(&source_path, source).with_context(|| format!("writing {}", source_path))?;
    info!("wrote {} and {}", header_path, source_path);

    Ok(())
}
