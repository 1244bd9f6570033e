//! CEQP demonstration server binary.
//!
//! Runs the dispatcher against an in-process [`ceqp_server::demo::DemoTarget`]
//! instead of a real debugged process, so the protocol can be exercised
//! end-to-end without a host embedding.
//!
//! ```bash
//! ceqp-server --port 9178 --demo-size 65536
//! ```

use ceqp_core::target::Arch;
use ceqp_server::{demo::DemoTarget, server::Server};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// CEQP demonstration server
#[derive(Parser, Debug)]
#[command(name = "ceqp-server")]
#[command(about = "Cheat Engine Query Protocol demonstration server")]
#[command(version)]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value_t = 9178)]
    port: u16,

    /// Size in bytes of the in-process demo target's backing buffer
    #[arg(long, default_value_t = 1 << 20)]
    demo_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable test-mode diagnostics (DTYPE/LEN echoed on pointer-chain reads)
    #[arg(long)]
    test_env: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("CEQP demonstration server starting");

    let target = DemoTarget::new(args.demo_size, Arch::X64);
    let server = Server::new(target);

    let test_env = args.test_env || ceqp_core::env::test_env_from_os();
    if test_env {
        tracing::info!("test-mode diagnostics enabled");
        server.set_test_env(true);
    }

    if !server.start(args.port).await {
        return Err(format!("failed to bind port {}", args.port).into());
    }
    tracing::info!("listening on port {}", args.port);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.stop().await;

    Ok(())
}
