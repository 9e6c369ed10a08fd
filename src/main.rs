//! Envlane server binary.
//!
//! Binds the listening socket and serves until externally terminated. The
//! only fatal error is a failed bind.

use std::process;

use clap::Parser;

use envlane::{Server, ServerConfig};

/// Remote simulation environment service.
#[derive(Parser)]
#[command(name = "envlane-server", version, about)]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 65432)]
    port: u16,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        ..ServerConfig::default()
    };

    if let Err(e) = ctrlc::set_handler(|| {
        log::info!("received interrupt, shutting down");
        process::exit(0);
    }) {
        log::warn!("could not install signal handler: {}", e);
    }

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            log::error!("failed to bind listener: {}", e);
            process::exit(1);
        }
    };

    match server.local_addr() {
        Ok(addr) => log::info!("listening on {}", addr),
        Err(e) => log::warn!("listening (address unavailable: {})", e),
    }

    if let Err(e) = server.run() {
        log::error!("listener failed: {}", e);
        process::exit(1);
    }
}
