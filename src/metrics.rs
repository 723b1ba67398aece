// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use tracing::{error, info};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static FRAMES_IN: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("frames_in_total", "inbound frames by type"), &["type"]).unwrap()
});

pub static COMMANDS_OUT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("commands_out_total", "outbound commands (labels: type, strategy)"),
        &["type", "strategy"],
    )
    .unwrap()
});

pub static TRADES_BY_SYMBOL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("trades_total_by_symbol", "trade prints per symbol"), &["symbol"]).unwrap()
});

/// Label value for TRADES_BY_SYMBOL; untracked symbols share one series.
pub fn symbol_label(symbol: &str, tracked: bool) -> &str {
    if tracked {
        symbol
    } else {
        "other"
    }
}

pub static REJECTS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("rejects_total", "exchange rejects").unwrap());

pub static EXCHANGE_ERRORS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("exchange_errors_total", "exchange error messages").unwrap());

pub static SKIPPED_FRAMES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("skipped_frames_total", "frames with an unknown type").unwrap());

// 1 for the active strategy
pub static CONFIG_STRATEGY: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("config_strategy_active", "active strategy (label: strategy)"), &["strategy"])
        .unwrap()
});

pub fn init() {
    for m in [
        REGISTRY.register(Box::new(FRAMES_IN.clone())),
        REGISTRY.register(Box::new(COMMANDS_OUT.clone())),
        REGISTRY.register(Box::new(TRADES_BY_SYMBOL.clone())),
        REGISTRY.register(Box::new(REJECTS.clone())),
        REGISTRY.register(Box::new(EXCHANGE_ERRORS.clone())),
        REGISTRY.register(Box::new(SKIPPED_FRAMES.clone())),
        REGISTRY.register(Box::new(CONFIG_STRATEGY.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Tiny HTTP/1.1 responder: any request gets the metrics body
fn handle_client(mut stream: TcpStream) {
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

/// Serve metrics from a dedicated OS thread so the event loop never waits on scrapes.
pub fn serve_metrics(port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)?;
    info!(%addr, "metrics listening");
    thread::spawn(move || {
        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => error!(?e, "metrics accept error"),
            }
        }
    });
    Ok(())
}
