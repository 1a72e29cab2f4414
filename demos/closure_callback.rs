//! Example of a run driven by a closure callback, stopped with Ctrl+C
//!
//! Needs CAP_NET_RAW and a reflector (or a loopback plug) on the interface:
//!
//! ```text
//! sudo cargo run --example closure_callback -- eth0
//! ```

#[cfg(target_os = "linux")]
use framebench::{Benchmark, Config, ProgressEvent, RawSocket};
#[cfg(target_os = "linux")]
use std::sync::{Arc, Mutex};
#[cfg(target_os = "linux")]
use std::time::Duration;

#[cfg(target_os = "linux")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let interface = std::env::args().nth(1).unwrap_or_else(|| "eth0".to_string());

    println!("framebench with Closure Callback Example");
    println!("========================================\n");

    // Keep every tick's receive rate for the analysis at the end
    let rates = Arc::new(Mutex::new(Vec::new()));
    let rates_clone = Arc::clone(&rates);

    let config = Config::new(interface.as_str())
        .with_time_limit(Duration::from_secs(30))
        .with_window(64);
    let socket = RawSocket::open(&interface)?;

    let benchmark = Benchmark::new(config, socket)?.with_callback(move |event: ProgressEvent| {
        match &event {
            ProgressEvent::RunStarted => {
                println!("Sending frames on {}...", interface);
            }
            ProgressEvent::Tick(report) if report.warm_up => {
                println!("  warm-up: {} frames sent", report.tx_packets);
            }
            ProgressEvent::Tick(report) => {
                println!(
                    "  {:>5.1}s | RX {:>8.2} Mbps | TX {:>8.2} Mbps | missed {}",
                    report.elapsed_secs,
                    report.rx_bits as f64 / 1_000_000.0,
                    report.tx_bits as f64 / 1_000_000.0,
                    report.missed
                );
                if let Ok(mut rates) = rates_clone.lock() {
                    rates.push(report.rx_bits);
                }
            }
            ProgressEvent::RunFinished(summary) => {
                println!(
                    "\nFinished ({:?}): {} of {} frames came back",
                    summary.outcome, summary.rx_packets, summary.tx_packets
                );
            }
            ProgressEvent::Error(msg) => {
                eprintln!("Error: {}", msg);
            }
        }
    });

    let cancel_token = benchmark.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nReceived CTRL+C, stopping...");
            cancel_token.cancel();
        }
    });

    benchmark.run().await?;

    if let Ok(rates) = rates.lock() {
        if !rates.is_empty() {
            let average = rates.iter().sum::<u64>() as f64 / rates.len() as f64;
            let peak = rates.iter().copied().max().unwrap_or(0);
            println!("   Ticks recorded: {}", rates.len());
            println!("   Average RX: {:.2} Mbps", average / 1_000_000.0);
            println!("   Peak RX: {:.2} Mbps", peak as f64 / 1_000_000.0);
        }
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("This example needs Linux raw sockets");
}
