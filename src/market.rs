// ===============================
// src/market.rs
// ===============================
//
// Pure bookkeeping, no I/O:
// - PriceSeries per tracked symbol + one unified tape of every trade
// - SlotTable: (symbol, side) <-> fixed order id, live flags for logging
// - TradeLog: every add we sent, in order
//
// The client is optimistic: liveness is what we *think* is resting. Rejects
// never touch it (a cancel of an empty slot is rejected after the new add).
//
use ahash::AHashMap as HashMap;
use chrono::Utc;
use std::cmp::Ordering;
use tracing::debug;

use crate::domain::{Command, Dir, OrderId, Price, QuoteState, SymbolPosition, TradeRecord};

#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    prices: Vec<Price>,
}

impl PriceSeries {
    pub fn push(&mut self, px: Price) {
        self.prices.push(px);
    }
    pub fn len(&self) -> usize {
        self.prices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
    pub fn last(&self) -> Option<Price> {
        self.prices.last().copied()
    }

    fn window_sum(&self, w: usize) -> Option<i128> {
        if w == 0 || self.prices.len() < w {
            return None;
        }
        Some(self.prices[self.prices.len() - w..].iter().map(|&p| p as i128).sum())
    }

    /// Mean of the last `w` prices; `None` until `w` samples exist.
    pub fn rolling_mean(&self, w: usize) -> Option<f64> {
        self.window_sum(w).map(|s| s as f64 / w as f64)
    }

    /// Exact ordering of mean(last `short`) against mean(last `long`).
    /// Compared by cross-multiplying the integer sums so equal means compare `Equal`.
    pub fn compare_means(&self, short: usize, long: usize) -> Option<Ordering> {
        let s = self.window_sum(short)?;
        let l = self.window_sum(long)?;
        Some((s * long as i128).cmp(&(l * short as i128)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub order_id: OrderId,
    pub live: bool,
}

/// Two slots (BUY, SELL) per tracked symbol; ids are assigned once, in order, starting at 1.
#[derive(Debug, Clone)]
pub struct SlotTable {
    by_key: HashMap<(String, Dir), Slot>,
    by_id: HashMap<OrderId, (String, Dir)>,
    symbols: Vec<String>,
}

impl SlotTable {
    pub fn new(symbols: &[String]) -> Self {
        let mut by_key = HashMap::new();
        let mut by_id = HashMap::new();
        let mut next: OrderId = 0;
        for sym in symbols {
            for dir in [Dir::Buy, Dir::Sell] {
                next += 1;
                by_key.insert((sym.clone(), dir), Slot { order_id: next, live: false });
                by_id.insert(next, (sym.clone(), dir));
            }
        }
        Self { by_key, by_id, symbols: symbols.to_vec() }
    }

    pub fn order_id(&self, symbol: &str, dir: Dir) -> Option<OrderId> {
        self.by_key.get(&(symbol.to_string(), dir)).map(|s| s.order_id)
    }

    pub fn slot_of(&self, order_id: OrderId) -> Option<(&str, Dir)> {
        self.by_id.get(&order_id).map(|(s, d)| (s.as_str(), *d))
    }

    pub fn is_tracked(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// First id not bound to any slot.
    pub fn next_free_id(&self) -> OrderId {
        self.by_id.keys().max().copied().unwrap_or(0) + 1
    }

    pub fn is_live(&self, symbol: &str, dir: Dir) -> bool {
        self.by_key.get(&(symbol.to_string(), dir)).map(|s| s.live).unwrap_or(false)
    }

    fn set_live(&mut self, order_id: OrderId, live: bool) {
        let Some(key) = self.by_id.get(&order_id) else { return };
        if let Some(slot) = self.by_key.get_mut(key) {
            slot.live = live;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TradeLog {
    records: Vec<TradeRecord>,
}

impl TradeLog {
    pub fn push(&mut self, rec: TradeRecord) {
        self.records.push(rec);
    }
    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MarketState {
    series: HashMap<String, PriceSeries>,
    tape: PriceSeries,
    slots: SlotTable,
    quotes: HashMap<String, QuoteState>,
    positions: HashMap<String, i64>,
    trade_log: TradeLog,
}

impl MarketState {
    pub fn new(symbols: &[String]) -> Self {
        Self {
            series: HashMap::new(),
            tape: PriceSeries::default(),
            slots: SlotTable::new(symbols),
            quotes: HashMap::new(),
            positions: HashMap::new(),
            trade_log: TradeLog::default(),
        }
    }

    /// Append to the tape and, for tracked symbols, to the symbol's series.
    /// Returns the updated series; `None` for untracked symbols.
    pub fn record_trade(&mut self, symbol: &str, price: Price) -> Option<&PriceSeries> {
        self.tape.push(price);
        if !self.slots.is_tracked(symbol) {
            return None;
        }
        let series = self.series.entry(symbol.to_string()).or_default();
        series.push(price);
        Some(series)
    }

    pub fn series(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }

    /// Every trade price seen this session, regardless of symbol.
    pub fn tape(&self) -> &PriceSeries {
        &self.tape
    }

    pub fn current_occupant(&self, symbol: &str, dir: Dir) -> Option<OrderId> {
        self.slots.order_id(symbol, dir)
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    pub fn quote_state(&self, symbol: &str) -> QuoteState {
        self.quotes.get(symbol).copied().unwrap_or_default()
    }

    pub fn trade_log(&self) -> &TradeLog {
        &self.trade_log
    }

    pub fn position(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }

    pub fn set_positions(&mut self, positions: &[SymbolPosition]) {
        for p in positions {
            self.positions.insert(p.symbol.clone(), p.position);
        }
    }

    /// Record the optimistic effect of a command that was just sent.
    /// Returns the trade-log record for adds.
    pub fn apply(&mut self, cmd: &Command) -> Option<TradeRecord> {
        match cmd {
            Command::Cancel { order_id } => {
                self.slots.set_live(*order_id, false);
                self.refresh_quote(*order_id);
                None
            }
            Command::Add { order_id, symbol, dir, price, size } => {
                self.slots.set_live(*order_id, true);
                self.refresh_quote(*order_id);
                let rec = TradeRecord {
                    ts_ns: Utc::now().timestamp_nanos_opt().unwrap_or(0),
                    symbol: symbol.clone(),
                    side: *dir,
                    price: *price,
                    size: *size,
                    order_id: *order_id,
                };
                self.trade_log.push(rec.clone());
                Some(rec)
            }
        }
    }

    /// A fill against one of our orders; only the position changes.
    pub fn on_fill(&mut self, order_id: OrderId, symbol: &str, dir: Dir, size: i64) {
        let signed = match dir { Dir::Buy => size, Dir::Sell => -size };
        *self.positions.entry(symbol.to_string()).or_insert(0) += signed;
        debug!(order_id, %symbol, position = self.position(symbol), "position updated");
    }

    fn refresh_quote(&mut self, order_id: OrderId) {
        let Some((sym, _)) = self.slots.slot_of(order_id) else { return };
        let sym = sym.to_string();
        let state = if self.slots.is_live(&sym, Dir::Buy) && self.slots.is_live(&sym, Dir::Sell) {
            QuoteState::Quoted
        } else {
            QuoteState::NoQuote
        };
        self.quotes.insert(sym, state);
    }
}
