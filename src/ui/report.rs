use chrono::{Local, TimeZone};
use colored::*;

use crate::core::metrics::{CpuMetrics, MemoryMetrics, NetworkMetrics, SystemMetrics};

/// Percentage colored by load: green, yellow from 70%, red from 90%.
pub fn format_usage(percent: f32) -> ColoredString {
    let text = format!("{:>5.1}%", percent);
    if percent >= 90.0 {
        text.red().bold()
    } else if percent >= 70.0 {
        text.yellow()
    } else {
        text.green()
    }
}

fn format_timestamp(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp.to_string(),
    }
}

fn render_cpu(cpu: &CpuMetrics, out: &mut String) {
    out.push_str(&format!("{}\n", "CPU".bold().bright_cyan()));
    out.push_str(&format!(
        "  Usage:      {}   (avg {:.1}%, peak {:.1}%)\n",
        format_usage(cpu.total_usage_percent),
        cpu.average_usage_percent,
        cpu.highest_usage_percent
    ));
    out.push_str(&format!("  Clock:      {:.2} GHz\n", cpu.clock_frequency_ghz));
    out.push_str(&format!(
        "  Threads:    {} used / {} total\n",
        cpu.used_threads, cpu.total_threads
    ));
}

fn render_memory(memory: &MemoryMetrics, out: &mut String) {
    out.push_str(&format!("{}\n", "MEMORY".bold().bright_cyan()));
    out.push_str(&format!(
        "  Usage:      {}   (avg {:.1}%)\n",
        format_usage(memory.total_usage_percent),
        memory.average_usage_percent
    ));
    out.push_str(&format!(
        "  Used:       {:.2} MB, {:.2} MB free\n",
        memory.used_ram_mb, memory.remaining_ram_mb
    ));
    out.push_str(&format!("  Top:        {}\n", memory.top_process));
}

fn render_network(network: &NetworkMetrics, out: &mut String) {
    out.push_str(&format!("{}\n", "NETWORK".bold().bright_cyan()));
    out.push_str(&format!(
        "  Upload:     {:.3} MB/s (peak {:.3})\n",
        network.upload_mb_per_sec, network.highest_upload_mb_per_sec
    ));
    out.push_str(&format!(
        "  Download:   {:.3} MB/s (peak {:.3})\n",
        network.download_mb_per_sec, network.highest_download_mb_per_sec
    ));
    out.push_str(&format!(
        "  In use:     {:.3} MB/s of {:.0} Mbps\n",
        network.total_used_bandwidth, network.total_bandwidth_mbps
    ));
    out.push_str(&format!(
        "  Top:        {}\n",
        network.top_bandwidth_process.dimmed()
    ));
}

/// Multi-line text report of one snapshot.
pub fn render_report(metrics: &SystemMetrics) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n",
        format!("resmon [{}]", metrics.backend).bold(),
        format_timestamp(metrics.timestamp).dimmed()
    ));
    out.push_str(&format!("{}\n", "=".repeat(60)));

    render_cpu(&metrics.cpu, &mut out);
    render_memory(&metrics.memory, &mut out);
    render_network(&metrics.network, &mut out);
    out
}

pub fn print_report(metrics: &SystemMetrics) {
    println!("{}", render_report(metrics));
}
