// ===============================
// src/engine.rs
// ===============================
//
// Event loop: session -> market state -> strategy -> session.
// Strictly read, handle, send-all, read again. Commands from one trade are
// written in strategy order before the next frame is read.
//
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::codec::Message;
use crate::domain::TradeRecord;
use crate::error::SessionError;
use crate::market::MarketState;
use crate::metrics::{self, COMMANDS_OUT, EXCHANGE_ERRORS, FRAMES_IN, REJECTS, SKIPPED_FRAMES, TRADES_BY_SYMBOL};
use crate::session::ExchangeSession;
use crate::strategy::Strategy;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub trades: u64,
    pub commands: u64,
    pub rejects: u64,
    pub fills: u64,
    pub skipped: u64,
}

/// Runs until the exchange sends `close` (Ok) or the session fails (Err).
pub async fn run<S>(
    session: &mut ExchangeSession<S>,
    market: &mut MarketState,
    strategy: &mut dyn Strategy,
    rec_tx: Option<&mpsc::Sender<TradeRecord>>,
) -> Result<RunSummary, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut summary = RunSummary::default();
    let strategy_name = strategy.name();

    loop {
        let msg = match session.next_event().await {
            Ok(m) => m,
            Err(e) if e.is_skippable() => {
                summary.skipped += 1;
                SKIPPED_FRAMES.inc();
                debug!(error = %e, "skipping frame");
                continue;
            }
            Err(e) => return Err(e),
        };
        summary.frames += 1;
        FRAMES_IN.with_label_values(&[msg.kind()]).inc();

        match msg {
            Message::Close { symbols } => {
                info!(?symbols, "the round has ended");
                return Ok(summary);
            }
            Message::Hello { symbols, .. } => {
                info!(positions = ?symbols, "hello from exchange");
                market.set_positions(&symbols);
            }
            Message::Error { error } => {
                EXCHANGE_ERRORS.inc();
                warn!(%error, "exchange error");
            }
            Message::Reject { order_id, error } => {
                summary.rejects += 1;
                REJECTS.inc();
                warn!(order_id, %error, "REJECT");
            }
            Message::Fill { order_id, symbol, dir, price, size } => {
                summary.fills += 1;
                market.on_fill(order_id, &symbol, dir, size);
                info!(order_id, %symbol, %dir, price, size, position = market.position(&symbol), "FILLED");
            }
            Message::Trade { symbol, price, size } => {
                summary.trades += 1;
                let tracked = market.slots().is_tracked(&symbol);
                TRADES_BY_SYMBOL.with_label_values(&[metrics::symbol_label(&symbol, tracked)]).inc();
                market.record_trade(&symbol, price);
                debug!(%symbol, price, size, tracked, tape = market.tape().len(), "trade");

                let commands = strategy.on_trade(&symbol, price, market);
                for cmd in &commands {
                    session.send_command(cmd).await?;
                    summary.commands += 1;
                    COMMANDS_OUT.with_label_values(&[cmd.kind(), strategy_name]).inc();
                    if let Some(rec) = market.apply(cmd) {
                        debug!(?rec, logged = market.trade_log().len(), "order placed");
                        if let Some(tx) = rec_tx {
                            let _ = tx.try_send(rec);
                        }
                    }
                }
            }
            other @ (Message::Add { .. } | Message::Cancel { .. }) => {
                warn!(kind = other.kind(), "outbound-only message received from exchange, ignored");
            }
        }
    }
}
