use clap::Parser;
use log::{debug, warn, LevelFilter};
use std::path::PathBuf;

use fillnode::codegen;
use fillnode::document;
use fillnode::graph::{Direction, NodeGraph};
use fillnode::id::NodeId;
use fillnode::node::{Assignment, FillMode};
use fillnode::registry::Registry;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    Code,
    Ports,
    State,
    Document,
    Fingerprint,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    Prepend,
    Append,
}

impl From<ModeArg> for FillMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Prepend => FillMode::Prepend,
            ModeArg::Append => FillMode::Append,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "fillnode",
    version,
    about = "Loads a JSON dataflow graph and emits the code of its Fill List nodes"
)]
struct Cli {
    /// Input graph document (.json)
    document: PathBuf,

    /// Extra type registry file (repeatable)
    #[arg(short = 'R', long = "registry")]
    registry: Vec<PathBuf>,

    /// Fill node to report (default: every fill node)
    #[arg(long)]
    node: Option<String>,

    /// Change the type of the reported nodes, e.g. `Vector` or `Vector List`
    #[arg(long)]
    set_type: Option<String>,

    /// Change the fill mode of the reported nodes
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Code)]
    emit: EmitStage,

    /// Log type inference and link changes
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    debug!("document = {}", cli.document.display());
    debug!("emit     = {:?}", cli.emit);

    // ── Load type registry ──
    let mut registry = Registry::with_builtins();
    for path in &cli.registry {
        match registry.load_json(path) {
            Ok(n) => debug!("loaded {} types from {}", n, path.display()),
            Err(e) => {
                eprintln!("fillnode: error: {}", e);
                std::process::exit(2);
            }
        }
    }
    debug!("{} base types registered", registry.len());

    // ── Read and load document ──
    let source = match std::fs::read_to_string(&cli.document) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("fillnode: error: {}: {}", cli.document.display(), e);
            std::process::exit(1);
        }
    };
    let doc = match document::parse(&source) {
        Ok(doc) => doc,
        Err(diag) => {
            eprintln!("fillnode: {}", diag);
            std::process::exit(1);
        }
    };
    let loaded = document::load(&doc, &registry);
    for diag in &loaded.diagnostics {
        eprintln!("fillnode: {}", diag);
    }
    if loaded.has_errors() {
        std::process::exit(1);
    }
    let mut graph = loaded.graph;

    // ── Select nodes ──
    let targets: Vec<NodeId> = match &cli.node {
        Some(name) => match graph.node_by_name(name) {
            Some(id) if graph.fill_node(id).is_some() => vec![id],
            Some(_) => {
                eprintln!("fillnode: error: node '{}' is not a Fill List node", name);
                std::process::exit(1);
            }
            None => {
                eprintln!("fillnode: error: no node named '{}'", name);
                std::process::exit(1);
            }
        },
        None => graph
            .nodes()
            .filter(|n| graph.fill_node(n.id).is_some())
            .map(|n| n.id)
            .collect(),
    };

    // ── Apply edits ──
    for &id in &targets {
        if let Some(kind) = &cli.set_type {
            if graph.change_type(id, kind, &registry) == Assignment::Rejected {
                warn!("{}: '{}' is not a registered type; keeping current type", id, kind);
            }
        }
        if let Some(mode) = cli.mode {
            graph.set_mode(id, mode.into());
        }
    }

    // ── Emit ──
    match cli.emit {
        EmitStage::Document => {
            println!("{}", document::to_json(&document::save(&graph)));
        }
        stage => {
            for id in targets {
                if let Err(diag) = report(&graph, id, stage, &registry) {
                    eprintln!("fillnode: {}", diag);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn report(
    graph: &NodeGraph,
    id: NodeId,
    stage: EmitStage,
    registry: &Registry,
) -> Result<(), fillnode::diag::Diagnostic> {
    let (name, fill) = match (graph.node(id), graph.fill_node(id)) {
        (Some(node), Some(fill)) => (node.name.as_str(), fill),
        _ => return Ok(()),
    };
    println!("# node '{}' ({}, {})", name, fill.resolved_type(), fill.mode());

    match stage {
        EmitStage::Code => {
            let emitted = codegen::emit(graph, id, registry)?;
            if emitted.copy.may_alias() {
                println!("# padding shares one element value");
            }
            print!("{}", emitted.render());
        }
        EmitStage::Fingerprint => {
            println!("{}", codegen::emit(graph, id, registry)?.fingerprint());
        }
        EmitStage::State => {
            let state = serde_json::to_string(&fill.state()).unwrap_or_default();
            println!("{}", state);
        }
        EmitStage::Ports => {
            for port in graph.ports_of(id) {
                let direction = match port.direction {
                    Direction::Input => "in",
                    Direction::Output => "out",
                };
                let links = graph.links_of(port.id).len();
                println!(
                    "{:<8} {:<4} {:<14} links={}{}",
                    port.name,
                    direction,
                    port.kind.id(),
                    links,
                    if port.consuming { " consuming" } else { "" }
                );
            }
        }
        EmitStage::Document => {}
    }
    Ok(())
}
