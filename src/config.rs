// ===============================
// src/config.rs
// ===============================
//
// Everything tunable is resolved once at startup into an immutable `BotConfig`.
// Exchange selection comes from the command line, strategy tuning from the
// environment (a `.env` file is honoured).
//
use clap::{ArgGroup, Parser, ValueEnum};
use dotenvy::dotenv;
use std::{env, str::FromStr, time::Duration};

use crate::domain::Price;
use crate::error::ConfigError;

pub const BASE_PORT: u16 = 25000;
pub const DEFAULT_TEAM: &str = "yeouidostreet";
pub const DEFAULT_SYMBOLS: [&str; 7] = ["BOND", "GS", "MS", "VALBZ", "VALE", "WFC", "XLF"];

/// Test exchange flavours; each one listens on its own port offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TestProfile {
    ProdLike,
    Slower,
    Empty,
}

impl TestProfile {
    pub fn port_offset(&self) -> u16 {
        match self {
            TestProfile::ProdLike => 0,
            TestProfile::Slower => 1,
            TestProfile::Empty => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    MarketMake,
    TrendFollow,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::MarketMake => "market_make",
            StrategyKind::TrendFollow => "trend_follow",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Trade on an ETC exchange!")]
#[command(group(ArgGroup::new("exchange").required(true).args(["production", "test"])))]
pub struct Cli {
    /// Connect to the production exchange.
    #[arg(long)]
    pub production: bool,

    /// Connect to a test exchange.
    #[arg(long, value_enum)]
    pub test: Option<TestProfile>,

    #[arg(long, value_enum, default_value = "market-make")]
    pub strategy: StrategyKind,

    /// Disable the socket connect/read timeout.
    #[arg(long)]
    pub no_timeout: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn resolve(test: Option<TestProfile>, team: &str) -> Self {
        match test {
            None => Endpoint { host: "production".into(), port: BASE_PORT },
            Some(p) => Endpoint { host: format!("test-exch-{team}"), port: BASE_PORT + p.port_offset() },
        }
    }
}

/// When TrendFollow re-evaluates the crossover.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerMode {
    /// Every eligible trade is a fresh signal.
    Continuous,
    /// Only a change in the sign of short - long emits.
    Edge,
}

/// What TrendFollow does with its previous order when a new signal fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderPolicy {
    /// Leave earlier orders resting (stack-on-signal).
    Stack,
    /// Cancel the previous order first (replace-on-signal).
    Replace,
}

impl FromStr for TriggerMode {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" => Ok(TriggerMode::Continuous),
            "edge" => Ok(TriggerMode::Edge),
            _ => Err(()),
        }
    }
}

impl FromStr for OrderPolicy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stack" | "stack-on-signal" => Ok(OrderPolicy::Stack),
            "replace" | "replace-on-signal" => Ok(OrderPolicy::Replace),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrendConfig {
    pub symbol: String,
    pub short_window: usize,
    pub long_window: usize,
    pub delta: Price,
    pub size: i64,
    pub trigger: TriggerMode,
    pub policy: OrderPolicy,
}

#[derive(Clone, Debug)]
pub struct MarketMakeConfig {
    pub buy_offset: Price,
    pub sell_offset: Price,
    pub size: i64,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub team: String,
    pub endpoint: Endpoint,
    pub io_timeout: Option<Duration>,
    pub strategy: StrategyKind,
    pub symbols: Vec<String>,
    pub trend: TrendConfig,
    pub market_make: MarketMakeConfig,
    pub record_file: Option<String>,
    pub metrics_port: Option<u16>,
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

impl BotConfig {
    /// Build from parsed CLI flags and an env lookup.
    pub fn from_sources(cli: &Cli, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let team = lookup("TEAM_NAME").unwrap_or_else(|| DEFAULT_TEAM.to_string());

        // SYMBOLS=BOND,GS,MS
        let symbols: Vec<String> = match lookup("SYMBOLS") {
            Some(s) => s
                .split(',')
                .map(|x| x.trim())
                .filter(|x| !x.is_empty())
                .map(|x| x.to_ascii_uppercase())
                .collect(),
            None => DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        };
        if symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        for (i, s) in symbols.iter().enumerate() {
            if symbols[..i].contains(s) {
                return Err(ConfigError::DuplicateSymbol(s.clone()));
            }
        }

        let delta: Price = parsed(&lookup, "DELTA", 1)?;
        let size: i64 = parsed(&lookup, "ORDER_SIZE", 1)?;
        if size <= 0 {
            return Err(ConfigError::Invalid { key: "ORDER_SIZE", value: size.to_string() });
        }

        let short_window: usize = parsed(&lookup, "SHORT_WINDOW", 5)?;
        let long_window: usize = parsed(&lookup, "LONG_WINDOW", 10)?;
        if short_window == 0 || short_window >= long_window {
            return Err(ConfigError::Windows { short: short_window, long: long_window });
        }

        let trend = TrendConfig {
            symbol: lookup("TREND_SYMBOL")
                .map(|s| s.trim().to_ascii_uppercase())
                .unwrap_or_else(|| "BOND".to_string()),
            short_window,
            long_window,
            delta,
            size,
            trigger: parsed(&lookup, "TREND_TRIGGER", TriggerMode::Continuous)?,
            policy: parsed(&lookup, "TREND_POLICY", OrderPolicy::Stack)?,
        };

        let market_make = MarketMakeConfig {
            buy_offset: parsed(&lookup, "BUY_OFFSET", delta)?,
            sell_offset: parsed(&lookup, "SELL_OFFSET", delta)?,
            size,
        };

        let timeout_ms: u64 = parsed(&lookup, "READ_TIMEOUT_MS", 5000)?;
        let io_timeout = (!cli.no_timeout && timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));

        let metrics_port: Option<u16> = match lookup("METRICS_PORT") {
            None => None,
            Some(raw) => Some(raw.trim().parse().map_err(|_| ConfigError::Invalid { key: "METRICS_PORT", value: raw })?),
        };

        Ok(BotConfig {
            endpoint: Endpoint::resolve(cli.test, &team),
            team,
            io_timeout,
            strategy: cli.strategy,
            symbols,
            trend,
            market_make,
            record_file: lookup("RECORD_FILE").filter(|s| !s.trim().is_empty()),
            metrics_port,
        })
    }

    /// Team id as the exchange expects it in hello.
    pub fn hello_team(&self) -> String {
        self.team.to_ascii_uppercase()
    }
}

pub fn load() -> Result<BotConfig, ConfigError> {
    // Make sure .env is read (TEAM_NAME, SYMBOLS, ...)
    let _ = dotenv();
    let cli = Cli::parse();
    BotConfig::from_sources(&cli, |k| env::var(k).ok())
}
