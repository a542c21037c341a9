use mimalloc::MiMalloc;
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use clap::Parser;
use quasar::library::server::{self, Server};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

fn bootstrap_logs() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(false)
        .compact()
        .with_ansi(true)
        .init();
}

#[derive(Parser, Debug)]
#[command(name = "quasar", about = "Edge-triggered HTTP/1.1 static file server")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Document root served to clients
    #[arg(long, default_value = "./resources")]
    root: PathBuf,

    /// Worker thread count (defaults to the CPU count)
    #[arg(long)]
    workers: Option<usize>,

    /// Ceiling on concurrent connections
    #[arg(long, default_value_t = 1024)]
    max_connections: usize,

    /// Task queue depth before submissions are rejected
    #[arg(long, default_value_t = 10_000)]
    queue_depth: usize,
}

fn main() -> anyhow::Result<()> {
    bootstrap_logs();
    let args = Args::parse();

    let mut server = Server::new(&args.listen);
    server
        .set_doc_root(args.root)
        .set_max_connections(args.max_connections)
        .set_max_queue(args.queue_depth);
    if let Some(workers) = args.workers {
        server.set_workers(workers);
    }
    let server = server.build();

    server::run(server)?;
    Ok(())
}
