//! The server binary: parses its CLI, initializes logging, and runs the
//! service until a fatal I/O error.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use bt_share::discovery::DEFAULT_DISCOVERY_PORT;
use bt_share::server::{self, ServerConfig, DEFAULT_SERVICE_PORT};
use bt_share::session::DEFAULT_FAN_OUT_LIMIT;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "bt-share", about = "A btRPC file-sharing server")]
struct Cli {
    /// Path to the share-table configuration file.
    #[arg(long, default_value = "bt-share.conf")]
    config: PathBuf,

    /// Address to bind the file-service TCP listener on.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// File-service TCP port.
    #[arg(long, default_value_t = DEFAULT_SERVICE_PORT)]
    port: u16,

    /// Discovery UDP port.
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    discovery_port: u16,

    /// Maximum number of concurrently mounted sessions.
    #[arg(long, default_value_t = DEFAULT_FAN_OUT_LIMIT)]
    fan_out_limit: usize,

    /// `tracing_subscriber::EnvFilter` directive, e.g. `debug` or `bt_share=trace`.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(cli.log_level.clone()))
        .init();

    let config = ServerConfig {
        config_path: cli.config,
        service_addr: SocketAddr::new(cli.bind, cli.port),
        discovery_addr: SocketAddr::new(cli.bind, cli.discovery_port),
        fan_out_limit: cli.fan_out_limit,
    };

    server::run(config).await
}
