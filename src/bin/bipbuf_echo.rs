//! bipbuf echo server
//!
//! Accepts TCP connections and echoes length-prefixed frames back to their
//! sender. Every connection stages its traffic in a pair of bip buffers.
//!
//! Usage:
//!   cargo run --release --bin bipbuf_echo [OPTIONS]

use bipbuf::network::{Server, ServerConfig};
use tracing_subscriber::EnvFilter;

/// Command line options
struct CliConfig {
    server: ServerConfig,
    verbose: bool,
}

fn parse_args() -> CliConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = CliConfig {
        server: ServerConfig::default(),
        verbose: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.server.bind_addr = args[i + 1].clone();
                    i += 1;
                }
            }
            "--capacity" | "-c" => {
                if i + 1 < args.len() {
                    config.server.buffer_capacity = args[i + 1]
                        .parse()
                        .unwrap_or(config.server.buffer_capacity);
                    i += 1;
                }
            }
            "--max-connections" => {
                if i + 1 < args.len() {
                    config.server.max_connections = args[i + 1]
                        .parse()
                        .unwrap_or(config.server.max_connections);
                    i += 1;
                }
            }
            "--zero-fill" | "-z" => {
                config.server.zero_fill = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!("bipbuf echo server - frames staged through bip buffers\n");
                println!("Usage: bipbuf_echo [OPTIONS]\n");
                println!("Options:");
                println!("  -b, --bind <ADDR>          Bind address (default: 127.0.0.1:9999)");
                println!("  -c, --capacity <BYTES>     Per-connection buffer size (default: 262144)");
                println!("      --max-connections <N>  Connection limit (default: 1024)");
                println!("  -z, --zero-fill            Wipe consumed bytes");
                println!("  -v, --verbose              Debug logging (overridden by RUST_LOG)");
                println!("  -h, --help                 Show this help");
                std::process::exit(0);
            }
            other => {
                eprintln!("Ignoring unknown argument: {}", other);
            }
        }
        i += 1;
    }

    config
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let config = parse_args();
    init_tracing(config.verbose);

    let result = Server::bind(config.server).and_then(|mut server| server.run());

    if let Err(e) = result {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
