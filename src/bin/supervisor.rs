use clap::Parser;
use fbarc::ipc::{ChannelNames, DEFAULT_CAPACITY, DEFAULT_PREFIX};
use fbarc::supervisor::{Report, Supervisor, SupervisorConfig};
use fbarc::{Result, logging, signal};
use std::time::Duration;

// --- Command Line Arguments ---

#[derive(Parser)]
#[command(name = "supervisor")]
#[command(about = "Collect feedback arc sets from generators and report the smallest")]
#[command(version)]
struct Args {
    /// Maximum number of solutions to examine (default: unbounded)
    #[arg(short = 'n', value_name = "LIMIT")]
    limit: Option<u64>,
    /// Seconds to wait before consuming solutions
    #[arg(short = 'w', value_name = "DELAY", default_value_t = 0)]
    delay: u64,
    /// Name prefix of the shared memory object and semaphores
    #[arg(long, default_value = DEFAULT_PREFIX)]
    channel: String,
    /// Number of ring buffer slots
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,
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
        .unwrap_or("supervisor")
        .to_string()
}

fn run(args: &Args) -> Result<Report> {
    let cancel = signal::install_termination_handlers()?;

    let config = SupervisorConfig::default()
        .with_limit_option(args.limit)
        .with_delay(Duration::from_secs(args.delay))
        .with_capacity(args.capacity)
        .with_names(ChannelNames::from_prefix(&args.channel));

    let supervisor = Supervisor::new(config, cancel)?;
    tracing::info!(
        channel = %args.channel,
        limit = ?args.limit,
        delay = args.delay,
        "channel ready, waiting for generators"
    );
    supervisor.run()
}

fn main() {
    let prog = program_name();
    let args = Args::parse();
    logging::init_tracing(args.verbose);

    match run(&args) {
        Ok(report) => println!("{}", report),
        Err(e) => {
            eprintln!("{}: {}", prog, e);
            std::process::exit(1);
        }
    }
}
