//! P2MP Receiver - receive one file from a p2mp sender
//!
//! Binds to the local interface address, writes accepted segments to the
//! output file in sequence order, and acks every in-sequence arrival. An
//! artificial loss probability exercises the sender's retransmission path.

use clap::Parser;
use p2mp_cli::config::{Config, ReceiverConfig};
use p2mp_cli::exit::{EX_FILE_OPEN, EX_UNAVAILABLE};
use p2mp_cli::stats::format_bytes;
use p2mp_fanout::run_receiver;
use p2mp_io::{discover_ipv4, P2mpSocket};
use p2mp_protocol::RandomLoss;
use std::fs::File;
use std::io::BufWriter;
use std::net::{IpAddr, SocketAddr};

#[derive(Parser, Debug)]
#[command(name = "p2mp-receiver")]
#[command(about = "Point-to-multipoint reliable file receiver", long_about = None)]
struct Args {
    /// Output file path
    #[arg(required_unless_present = "config")]
    output: Option<String>,

    /// Listen port
    #[arg(short, long, default_value_t = 7735)]
    port: u16,

    /// Artificial loss probability in [0, 1]
    #[arg(short, long, default_value_t = 0.0)]
    loss_probability: f64,

    /// Explicit bind address; discovered from the interface table if unset
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Load all settings from a TOML config file instead
    #[arg(short, long)]
    config: Option<String>,
}

fn receiver_config(args: &Args) -> anyhow::Result<ReceiverConfig> {
    if let Some(path) = &args.config {
        let config = Config::from_file(path)?;
        return config
            .receiver
            .ok_or_else(|| anyhow::anyhow!("config file has no [receiver] section"));
    }

    Ok(ReceiverConfig {
        output: args.output.clone().expect("clap enforces output"),
        port: args.port,
        loss_probability: args.loss_probability,
        bind: args.bind,
    })
}

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    let config = match receiver_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let ip = match config.bind {
        Some(ip) => ip,
        None => match discover_ipv4() {
            Ok(ip) => IpAddr::V4(ip),
            Err(e) => {
                tracing::error!("interface discovery failed: {}", e);
                std::process::exit(EX_UNAVAILABLE);
            }
        },
    };

    let addr = SocketAddr::new(ip, config.port);
    let socket = match P2mpSocket::bind(addr) {
        Ok(socket) => socket,
        Err(e) => {
            tracing::error!("cannot bind {}: {}", addr, e);
            std::process::exit(EX_UNAVAILABLE);
        }
    };
    println!("Receiver listening on {}", addr);

    let file = match File::create(&config.output) {
        Ok(file) => file,
        Err(e) => {
            tracing::error!("cannot create {}: {}", config.output, e);
            std::process::exit(EX_FILE_OPEN);
        }
    };

    let loss = RandomLoss::new(config.loss_probability);
    tracing::info!(
        output = %config.output,
        loss_probability = loss.probability(),
        "waiting for sender"
    );

    match run_receiver(&socket, BufWriter::new(file), loss) {
        Ok(stats) => {
            println!(
                "Received {} in {} segments ({} re-acked, {} checksum failures, {} simulated losses)",
                format_bytes(stats.payload_bytes),
                stats.segments_accepted,
                stats.reacked,
                stats.checksum_failures,
                stats.simulated_losses
            );
        }
        Err(e) => {
            tracing::error!("receive failed: {}", e);
            std::process::exit(1);
        }
    }
}
