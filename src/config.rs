//! CLI argument parsing for both binaries (SPEC_FULL.md §1.3).
//!
//! spec.md keeps argument parsing out of the core's scope; the teacher
//! always wires its binaries through `clap::Parser` regardless
//! (`analysis/query.rs`), so both binaries get a small derive-based surface
//! here instead of hand-rolled `std::env::args()` parsing.

use clap::Parser;
use clap::Subcommand;

/// Fixed default path a bare `wandersim-server` / `wandersim-client` invocation
/// connects to when no override is given.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/wandersim.sock";

/// `wandersim-server [socket_path] [-v]`. Takes no argument of semantic
/// interest to the simulation itself, matching spec.md's framing of the
/// server as "listens on a fixed path" — the path is overridable for tests.
#[derive(Parser, Debug)]
#[command(author, version, about = "wandersim control-plane server", long_about = None)]
pub struct ServerArgs {
    /// Unix domain socket path to listen on.
    #[arg(default_value = DEFAULT_SOCKET_PATH)]
    pub socket_path: String,

    /// Worker thread count for the simulation pool; defaults to the number
    /// of logical CPUs.
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Bounded job queue capacity per simulation.
    #[arg(short = 'q', long, default_value_t = 1024)]
    pub queue_capacity: usize,

    /// Enable debug-level terminal logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerArgs {
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }
}

/// `wandersim-client <socket_path> [command]`. The interactive menu itself is
/// out of scope (spec.md); this offers a small non-interactive subcommand
/// surface sufficient to drive the protocol end-to-end.
#[derive(Parser, Debug)]
#[command(author, version, about = "wandersim control-plane client", long_about = None)]
pub struct ClientArgs {
    /// Unix domain socket path to connect to.
    #[arg(required = true)]
    pub socket_path: String,

    /// Enable debug-level terminal logging.
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Query and print the current server status, then exit.
    Status,

    /// Create a new simulation in the (idle) lobby.
    Create {
        #[arg(long, value_enum, default_value_t = WorldKindArg::Wrap)]
        kind: WorldKindArg,
        #[arg(long, required = true)]
        width: u32,
        #[arg(long, required = true)]
        height: u32,
        #[arg(long, default_value_t = 0.25)]
        up: f64,
        #[arg(long, default_value_t = 0.25)]
        down: f64,
        #[arg(long, default_value_t = 0.25)]
        left: f64,
        #[arg(long, default_value_t = 0.25)]
        right: f64,
        #[arg(long, required = true)]
        k: u64,
        #[arg(long, required = true)]
        reps: u64,
        #[arg(long, default_value_t = 0)]
        obstacle_percent: u32,
        #[arg(long, default_value_t = 0)]
        obstacle_seed: u32,
        #[arg(long)]
        multi_user: bool,
    },

    /// Start the configured simulation running.
    Start,

    /// Stop the currently running simulation (owner only).
    Stop,

    /// Request one snapshot of the current aggregate state, printed as a
    /// brief summary once fully assembled.
    Snapshot,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldKindArg {
    Wrap,
    Obstacles,
}

impl WorldKindArg {
    pub fn wire(self) -> u8 {
        match self {
            WorldKindArg::Wrap => 1,
            WorldKindArg::Obstacles => 2,
        }
    }
}
