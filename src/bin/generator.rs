use clap::Parser;
use fbarc::generator::{ExitReason, Generator, GeneratorSummary};
use fbarc::graph::{Graph, parse_edges};
use fbarc::ipc::{ChannelNames, DEFAULT_PREFIX};
use fbarc::search::{PermutationSearch, SearchConfig};
use fbarc::{Result, logging, signal};

// --- Command Line Arguments ---

#[derive(Parser)]
#[command(name = "generator")]
#[command(about = "Publish random feedback arc sets of a graph to a running supervisor")]
#[command(version)]
struct Args {
    /// Edges of the graph as start-end (at most 40); use `--` before
    /// edges with a negative start vertex
    #[arg(value_name = "EDGE")]
    edges: Vec<String>,
    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
    /// Name prefix of the shared memory object and semaphores
    #[arg(long, default_value = DEFAULT_PREFIX)]
    channel: String,
    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

fn program_name() -> String {
    std::env::args()
        .next()
        .as_deref()
        .and_then(|arg0| std::path::Path::new(arg0).file_name())
        .and_then(|name| name.to_str())
        .unwrap_or("generator")
        .to_string()
}

fn run(args: &Args) -> Result<GeneratorSummary> {
    // Validate everything before touching any IPC object
    let graph = Graph::new(parse_edges(args.edges.as_slice())?)?;
    tracing::debug!(
        edges = graph.edges().len(),
        vertices = graph.vertices().len(),
        "parsed graph"
    );

    let cancel = signal::install_termination_handlers()?;
    let search = PermutationSearch::new(graph, &SearchConfig::default().with_seed_option(args.seed));
    let generator = Generator::attach(ChannelNames::from_prefix(&args.channel), search, cancel)?;
    generator.run()
}

fn main() {
    let prog = program_name();
    let args = Args::parse();
    logging::init_tracing(args.verbose);

    match run(&args) {
        Ok(summary) => {
            let reason = match summary.reason {
                ExitReason::Stopped => "stopped by supervisor",
                ExitReason::Cancelled => "interrupted",
            };
            tracing::info!(published = summary.published, drawn = summary.drawn, "{}", reason);
        }
        Err(e) => {
            eprintln!("{}: {}", prog, e);
            std::process::exit(1);
        }
    }
}
