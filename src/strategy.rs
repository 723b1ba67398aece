// ===============================
// src/strategy.rs
// ===============================
//
// Two interchangeable strategies behind `Strategy::on_trade`:
// 1) TrendFollow -> MA crossover on the unified trade tape
// 2) MarketMake  -> cancel + re-quote both slots of a symbol on every print
//
// Strategies read MarketState and return commands in send order. They never
// mutate MarketState; the event loop applies what was actually sent.
//
use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::config::{BotConfig, MarketMakeConfig, OrderPolicy, StrategyKind, TrendConfig, TriggerMode};
use crate::domain::{Command, Dir, OrderId, Price};
use crate::market::MarketState;

pub trait Strategy {
    fn name(&self) -> &'static str;
    fn on_trade(&mut self, symbol: &str, price: Price, market: &MarketState) -> Vec<Command>;
}

pub fn build(cfg: &BotConfig, market: &MarketState) -> Box<dyn Strategy> {
    match cfg.strategy {
        StrategyKind::MarketMake => Box::new(MarketMake::new(cfg.market_make.clone())),
        StrategyKind::TrendFollow => {
            Box::new(TrendFollow::new(cfg.trend.clone(), market.slots().next_free_id()))
        }
    }
}

// -----------------------------------------------------------------------------
// 1) TREND FOLLOW (moving-average crossover)
//    short MA > long MA -> SELL at price + delta
//    short MA < long MA -> BUY  at price - delta
//    equal              -> nothing
//    Needs `long_window` prints on the tape before anything is emitted.
//    Ids come from one counter that starts above the slot table.
//    Stack policy never cancels, so resting orders grow without bound.
// -----------------------------------------------------------------------------
pub struct TrendFollow {
    cfg: TrendConfig,
    next_id: OrderId,
    prev_sign: Ordering,
    last_order: Option<OrderId>,
}

impl TrendFollow {
    pub fn new(cfg: TrendConfig, first_id: OrderId) -> Self {
        Self { cfg, next_id: first_id, prev_sign: Ordering::Equal, last_order: None }
    }

    fn take_id(&mut self) -> OrderId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Strategy for TrendFollow {
    fn name(&self) -> &'static str {
        "trend_follow"
    }

    fn on_trade(&mut self, _symbol: &str, price: Price, market: &MarketState) -> Vec<Command> {
        let tape = market.tape();
        let Some(sign) = tape.compare_means(self.cfg.short_window, self.cfg.long_window) else {
            return Vec::new();
        };

        let prev = std::mem::replace(&mut self.prev_sign, sign);
        if self.cfg.trigger == TriggerMode::Edge && sign == prev {
            return Vec::new();
        }

        let (dir, px) = match sign {
            Ordering::Greater => (Dir::Sell, price.checked_add(self.cfg.delta)),
            Ordering::Less => (Dir::Buy, price.checked_sub(self.cfg.delta)),
            Ordering::Equal => return Vec::new(),
        };
        let Some(px) = px else {
            warn!(price, delta = self.cfg.delta, %dir, "quote price out of range, no order");
            return Vec::new();
        };
        debug!(
            short_ma = tape.rolling_mean(self.cfg.short_window),
            long_ma = tape.rolling_mean(self.cfg.long_window),
            %dir, px, "crossover signal"
        );

        let mut out = Vec::with_capacity(2);
        if self.cfg.policy == OrderPolicy::Replace {
            if let Some(prev_id) = self.last_order {
                out.push(Command::Cancel { order_id: prev_id });
            }
        }
        let order_id = self.take_id();
        self.last_order = Some(order_id);
        out.push(Command::Add { order_id, symbol: self.cfg.symbol.clone(), dir, price: px, size: self.cfg.size });
        out
    }
}

// -----------------------------------------------------------------------------
// 2) MARKET MAKE (best-price quote refresh)
//    For a tracked symbol, every trade print produces, in order:
//      cancel(BUY slot), cancel(SELL slot), add BUY, add SELL
//    Cancels are unconditional; an empty slot earns a harmless reject.
//    Untracked symbols are ignored.
// -----------------------------------------------------------------------------
pub struct MarketMake {
    cfg: MarketMakeConfig,
}

impl MarketMake {
    pub fn new(cfg: MarketMakeConfig) -> Self {
        Self { cfg }
    }
}

impl Strategy for MarketMake {
    fn name(&self) -> &'static str {
        "market_make"
    }

    fn on_trade(&mut self, symbol: &str, price: Price, market: &MarketState) -> Vec<Command> {
        let (Some(buy_id), Some(sell_id)) =
            (market.current_occupant(symbol, Dir::Buy), market.current_occupant(symbol, Dir::Sell))
        else {
            return Vec::new();
        };
        let (Some(bid), Some(ask)) =
            (price.checked_add(self.cfg.buy_offset), price.checked_add(self.cfg.sell_offset))
        else {
            warn!(%symbol, price, "quote price out of range, not re-quoting");
            return Vec::new();
        };
        debug!(%symbol, price, state = ?market.quote_state(symbol), "re-quoting");

        vec![
            Command::Cancel { order_id: buy_id },
            Command::Cancel { order_id: sell_id },
            Command::Add {
                order_id: buy_id,
                symbol: symbol.to_string(),
                dir: Dir::Buy,
                price: bid,
                size: self.cfg.size,
            },
            Command::Add {
                order_id: sell_id,
                symbol: symbol.to_string(),
                dir: Dir::Sell,
                price: ask,
                size: self.cfg.size,
            },
        ]
    }
}
