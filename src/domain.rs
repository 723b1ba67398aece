// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize};
use std::fmt;

pub type OrderId = u64;
pub type Price = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Dir { Buy, Sell }

impl Dir {
    pub fn as_str(&self) -> &'static str {
        match self { Dir::Buy => "BUY", Dir::Sell => "SELL" }
    }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "BUY" => Some(Dir::Buy), "SELL" => Some(Dir::Sell), _ => None }
    }
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Order-management instruction produced by a strategy, sent as-is by the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { order_id: OrderId, symbol: String, dir: Dir, price: Price, size: i64 },
    Cancel { order_id: OrderId },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self { Command::Add { .. } => "add", Command::Cancel { .. } => "cancel" }
    }
    pub fn order_id(&self) -> OrderId {
        match self { Command::Add { order_id, .. } | Command::Cancel { order_id } => *order_id }
    }
}

/// One entry of the observability trade log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub ts_ns: i64,
    pub symbol: String,
    pub side: Dir,
    pub price: Price,
    pub size: i64,
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolPosition { pub symbol: String, pub position: i64 }

/// Per-symbol market-making state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteState {
    #[default]
    NoQuote,
    Quoted,
}
