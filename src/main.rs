// ===============================
// src/main.rs
// ===============================
/*
 # run in a loop against a test exchange; supervision/restart is external
 while true; do ./etc_trader --test prod-like; sleep 1; done

 # trend following instead of market making, edge-triggered
 TREND_TRIGGER=edge ./etc_trader --test slower --strategy trend-follow
*/
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use etc_trader::{
    config::{self, BotConfig},
    engine::{self, RunSummary},
    error::SessionError,
    market::MarketState,
    metrics, recorder,
    session::ExchangeSession,
    strategy,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ---- Config ----
    let cfg = match config::load() {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(cfg).await {
        Ok(summary) => {
            info!(?summary, "session finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(%e, "session aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: BotConfig) -> Result<RunSummary, SessionError> {
    // ---- Metrics ----
    metrics::init();
    if let Some(port) = cfg.metrics_port {
        if let Err(e) = metrics::serve_metrics(port) {
            warn!(?e, port, "metrics endpoint disabled");
        }
    }
    metrics::CONFIG_STRATEGY.with_label_values(&[cfg.strategy.as_str()]).set(1);

    info!(
        team = %cfg.team,
        host = %cfg.endpoint.host,
        port = cfg.endpoint.port,
        strategy = cfg.strategy.as_str(),
        symbols = ?cfg.symbols,
        timeout = ?cfg.io_timeout,
        "startup config"
    );

    // ---- Recorder (optional) ----
    let (rec_tx, rec_task) = match cfg.record_file.clone() {
        Some(path) => {
            let (tx, rx) = mpsc::channel(8192);
            (Some(tx), Some(tokio::spawn(recorder::run(rx, path))))
        }
        None => (None, None),
    };

    // ---- Session + state ----
    let mut session = ExchangeSession::connect(&cfg.endpoint, &cfg.hello_team(), cfg.io_timeout).await?;
    let mut market = MarketState::new(&cfg.symbols);
    let mut strat = strategy::build(&cfg, &market);

    let result = engine::run(&mut session, &mut market, strat.as_mut(), rec_tx.as_ref()).await;

    // flush the trade log before exiting
    drop(rec_tx);
    if let Some(task) = rec_task {
        let _ = task.await;
    }
    info!(orders_logged = market.trade_log().len(), "trade log");
    result
}
