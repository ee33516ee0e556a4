//! Telemetry producer demo
//!
//! Run with: cargo run --example telemetry_server [HOST[:PORT]]
//!
//! Examples:
//!   cargo run --example telemetry_server                  # binds to localhost:9999
//!   cargo run --example telemetry_server 0.0.0.0          # binds to 0.0.0.0:9999
//!   cargo run --example telemetry_server 127.0.0.1:9100   # binds to 127.0.0.1:9100
//!
//! Publishes a synthetic lap frame ten times per second. Connect any number
//! of viewers with `cargo run --example telemetry_viewer`.

use std::time::Duration;

use serde::Serialize;
use telemetry_stream::{BroadcastServer, ServerConfig};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 9999;

/// One sample of car telemetry
#[derive(Debug, Serialize)]
struct CarTelemetry {
    lap: u32,
    tick: u64,
    driver: &'static str,
    speed: f64,
    throttle: f64,
    brake: bool,
    gear: u8,
    position: Position,
}

#[derive(Debug, Serialize)]
struct Position {
    x: f64,
    y: f64,
}

impl CarTelemetry {
    /// Deterministic lap around a circular track, 600 ticks per lap
    fn sample(tick: u64) -> Self {
        const TICKS_PER_LAP: u64 = 600;

        let angle = (tick % TICKS_PER_LAP) as f64 / TICKS_PER_LAP as f64 * std::f64::consts::TAU;
        let braking = angle.sin() < -0.8;

        Self {
            lap: (tick / TICKS_PER_LAP) as u32 + 1,
            tick,
            driver: "VER",
            speed: 240.0 + 70.0 * angle.cos().abs(),
            throttle: if braking { 0.0 } else { 0.6 + 0.4 * angle.cos().abs() },
            brake: braking,
            gear: if braking { 4 } else { 8 },
            position: Position {
                x: 1000.0 * angle.cos(),
                y: 1000.0 * angle.sin(),
            },
        }
    }
}

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
    eprintln!("Usage: telemetry_server [HOST[:PORT]]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  HOST[:PORT]  Address to bind to (default: localhost:9999)");
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
                .add_directive("telemetry_server=info".parse()?),
        )
        .init();

    let server = BroadcastServer::start(ServerConfig::new(host, port)).await?;
    println!("Streaming telemetry on {}", server.local_addr());
    println!("Press Ctrl+C to stop");

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let mut tick = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = server.publish(&CarTelemetry::sample(tick)).await?;
                if report.dropped > 0 {
                    tracing::info!(dropped = report.dropped, "Viewer disconnected");
                }
                tick += 1;

                if tick % 50 == 0 {
                    let stats = server.stats().await;
                    tracing::info!(
                        viewers = stats.active_connections,
                        frames = stats.frames_published,
                        bytes = stats.bytes_sent,
                        "Stream stats"
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    server.stop().await;
    Ok(())
}
