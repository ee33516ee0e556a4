//! Telemetry subscriber demo
//!
//! Run with: cargo run --example telemetry_viewer [HOST[:PORT]]
//!
//! Examples:
//!   cargo run --example telemetry_viewer                  # connects to localhost:9999
//!   cargo run --example telemetry_viewer 127.0.0.1:9100   # connects to 127.0.0.1:9100
//!
//! Start it before or after `telemetry_server`; it keeps retrying until the
//! server is reachable and reconnects if the server restarts.

use telemetry_stream::{ClientConfig, ClientEvent, StreamClient};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 9999;

/// Parse `HOST`, `HOST:PORT` or `[V6]:PORT`
fn parse_addr(arg: &str) -> Result<(String, u16), String> {
    if let Ok(addr) = arg.parse::<std::net::SocketAddr>() {
        return Ok((addr.ip().to_string(), addr.port()));
    }

    match arg.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            let port = port
                .parse::<u16>()
                .map_err(|_| format!("Invalid port in '{}'", arg))?;
            Ok((host.to_string(), port))
        }
        _ => Ok((arg.to_string(), DEFAULT_PORT)),
    }
}

fn print_usage() {
    eprintln!("Usage: telemetry_viewer [HOST[:PORT]]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  HOST[:PORT]  Server to connect to (default: localhost:9999)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let (host, port) = match args.get(1) {
        Some(arg) => match parse_addr(arg) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => (DEFAULT_HOST.to_string(), DEFAULT_PORT),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("telemetry_stream=info".parse()?)
                .add_directive("telemetry_viewer=info".parse()?),
        )
        .init();

    let (mut client, mut events) = StreamClient::new(ClientConfig::new(host, port));
    client.start();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ClientEvent::FrameReceived(frame)) => {
                    let field = |key: &str| frame.get(key).cloned().unwrap_or_default();
                    println!(
                        "lap={} speed={} gear={} brake={}",
                        field("lap"),
                        field("speed"),
                        field("gear"),
                        field("brake"),
                    );
                }
                Some(ClientEvent::StatusChanged(status)) => println!("[{}]", status),
                Some(ClientEvent::Error(err)) => eprintln!("{}: {}", err.kind(), err),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    client.stop().await;

    let stats = client.stats();
    println!(
        "Received {} frames ({} bytes) over {} connection attempts",
        stats.frames_received, stats.bytes_received, stats.connection_attempts
    );
    Ok(())
}
