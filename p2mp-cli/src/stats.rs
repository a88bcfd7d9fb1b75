//! Statistics display and formatting

use p2mp_fanout::{DestinationStats, TransferStats};
use std::net::SocketAddr;
use std::time::Duration;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Display end-of-transfer statistics
pub fn display_transfer_stats(stats: &TransferStats, elapsed: Duration) {
    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ TRANSFER STATISTICS                                         │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!(
        "│ Segments:  {} sent ({} on the wire)                     ",
        stats.segments_sent, stats.datagrams_sent
    );
    println!(
        "│ Payload:   {}                                           ",
        format_bytes(stats.payload_bytes)
    );
    println!(
        "│ Retries:   {} retransmits / {} timeouts                 ",
        stats.retransmits, stats.timeouts
    );
    println!(
        "│ Acks:      {} matched / {} stale / {} abandoned         ",
        stats.acks_matched, stats.acks_stale, stats.abandoned
    );
    println!(
        "│ Elapsed:   {}                                           ",
        format_duration(elapsed)
    );
    println!("└─────────────────────────────────────────────────────────────┘");
}

/// Display one per-destination statistics row
pub fn display_destination_stats(addr: SocketAddr, stats: &DestinationStats) {
    println!(
        "  {:21} acked: {:6}  retransmits: {:5}  timeouts: {:5}  stale: {:4}  abandoned: {:4}",
        addr.to_string(),
        stats.segments_acked,
        stats.retransmits,
        stats.timeouts,
        stats.stale_acks,
        stats.abandoned
    );
}

/// Display compact stats on one line (for continuous updates)
pub fn display_compact_stats(stats: &TransferStats, elapsed: Duration) {
    print!(
        "\r[{:8}] Segments: {} | Sent: {} | Retransmits: {} | Timeouts: {}         ",
        format_duration(elapsed),
        stats.segments_sent,
        format_bytes(stats.payload_bytes),
        stats.retransmits,
        stats.timeouts
    );

    use std::io::Write;
    let _ = std::io::stdout().flush();
}
