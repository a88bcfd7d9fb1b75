//! P2MP Sender - transfer one file to many receivers
//!
//! Opens the input file, segments it, and delivers every segment to each
//! destination with an independent stop-and-wait retransmission loop.

use clap::Parser;
use p2mp_cli::config::{Config, SenderConfig};
use p2mp_cli::exit::{EX_FILE_OPEN, EX_SHORT_READ, EX_UNAVAILABLE};
use p2mp_cli::stats::{display_compact_stats, display_destination_stats, display_transfer_stats};
use p2mp_fanout::{FanoutError, FanoutSender};
use p2mp_io::SocketError;
use p2mp_protocol::{Segmenter, SegmenterError};
use std::fs::File;
use std::io::BufReader;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "p2mp-sender")]
#[command(about = "Point-to-multipoint reliable file sender", long_about = None)]
struct Args {
    /// Destination hosts (names or addresses, without port)
    #[arg(required_unless_present = "config")]
    hosts: Vec<String>,

    /// Input file to transfer
    #[arg(short, long, required_unless_present = "config")]
    file: Option<String>,

    /// Destination port, shared by all hosts
    #[arg(short, long, default_value_t = 7735)]
    port: u16,

    /// Maximum segment size in bytes
    #[arg(short, long, default_value_t = p2mp_protocol::DEFAULT_MSS)]
    mss: usize,

    /// Ack wait per attempt in milliseconds
    #[arg(short, long, default_value_t = p2mp_protocol::DEFAULT_ACK_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Statistics interval in seconds (0 disables continuous stats)
    #[arg(long, default_value_t = 0)]
    stats: u64,

    /// Load all settings from a TOML config file instead
    #[arg(short, long)]
    config: Option<String>,
}

fn sender_config(args: &Args) -> anyhow::Result<SenderConfig> {
    if let Some(path) = &args.config {
        let config = Config::from_file(path)?;
        return config
            .sender
            .ok_or_else(|| anyhow::anyhow!("config file has no [sender] section"));
    }

    Ok(SenderConfig {
        file: args.file.clone().expect("clap enforces --file"),
        hosts: args.hosts.clone(),
        port: args.port,
        mss: args.mss,
        timeout_ms: args.timeout_ms,
        stats_interval_secs: args.stats,
    })
}

fn resolve_destinations(config: &SenderConfig) -> anyhow::Result<Vec<SocketAddr>> {
    let mut addrs = Vec::with_capacity(config.hosts.len());
    for host in &config.hosts {
        let addr = (host.as_str(), config.port)
            .to_socket_addrs()?
            .find(|a| a.is_ipv4())
            .ok_or_else(|| anyhow::anyhow!("no IPv4 address for host {}", host))?;
        addrs.push(addr);
    }
    Ok(addrs)
}

fn exit_code(err: &FanoutError) -> i32 {
    match err {
        FanoutError::Segmenter(SegmenterError::ShortRead { .. }) => EX_SHORT_READ,
        FanoutError::Segmenter(_) => EX_FILE_OPEN,
        FanoutError::Socket(SocketError::Io(_)) => EX_UNAVAILABLE,
        _ => 1,
    }
}

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    let config = match sender_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let addrs = match resolve_destinations(&config) {
        Ok(addrs) => addrs,
        Err(e) => {
            tracing::error!("destination resolution failed: {}", e);
            std::process::exit(EX_UNAVAILABLE);
        }
    };

    let file = match File::open(&config.file) {
        Ok(file) => file,
        Err(e) => {
            tracing::error!("cannot open {}: {}", config.file, e);
            std::process::exit(EX_FILE_OPEN);
        }
    };
    let len = match file.metadata() {
        Ok(meta) => meta.len(),
        Err(e) => {
            tracing::error!("cannot stat {}: {}", config.file, e);
            std::process::exit(EX_FILE_OPEN);
        }
    };

    let mut segmenter = match Segmenter::new(BufReader::new(file), len, config.mss) {
        Ok(segmenter) => segmenter,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut sender = match FanoutSender::connect(&addrs, config.ack_timeout()) {
        Ok(sender) => sender,
        Err(e) => {
            tracing::error!("socket setup failed: {}", e);
            std::process::exit(EX_UNAVAILABLE);
        }
    };

    tracing::info!(
        file = %config.file,
        bytes = len,
        destinations = addrs.len(),
        mss = config.mss,
        "starting transfer"
    );

    let start = Instant::now();
    let done = Arc::new(AtomicBool::new(false));
    let stats_thread = if config.stats_interval_secs > 0 {
        let handle = sender.stats_handle();
        let done = done.clone();
        let interval = config.stats_interval();
        Some(thread::spawn(move || {
            let started = Instant::now();
            while !done.load(Ordering::Relaxed) {
                thread::sleep(interval);
                display_compact_stats(&handle.read().clone(), started.elapsed());
            }
        }))
    } else {
        None
    };

    let result = sender.send_all(&mut segmenter);

    done.store(true, Ordering::Relaxed);
    if let Some(handle) = stats_thread {
        let _ = handle.join();
    }

    match result {
        Ok(stats) => {
            display_transfer_stats(&stats, start.elapsed());
            for dest in sender.destinations() {
                display_destination_stats(dest.addr(), dest.stats());
            }
        }
        Err(e) => {
            tracing::error!("transfer failed: {}", e);
            std::process::exit(exit_code(&e));
        }
    }
}
