//! Integration: fake exchange <-> ExchangeSession <-> engine::run
//!
//! The exchange side is the far end of a `tokio::io::duplex` (or a loopback
//! TCP listener). Frames are written up front, the loop runs to completion,
//! then every line the client wrote is read back.

use std::time::Duration;

use etc_trader::{
    codec::{decode, Message},
    config::{Endpoint, MarketMakeConfig, OrderPolicy, TrendConfig, TriggerMode},
    domain::{Dir, QuoteState},
    engine::{self, RunSummary},
    error::{CodecError, SessionError},
    market::MarketState,
    metrics,
    session::ExchangeSession,
    strategy::{MarketMake, Strategy, TrendFollow},
};
use tokio::{
    io::{duplex, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream},
    net::TcpListener,
    sync::mpsc,
};

const BUF: usize = 64 * 1024;

async fn feed(exch: &mut DuplexStream, frames: &[&str]) {
    for f in frames {
        exch.write_all(f.as_bytes()).await.unwrap();
        exch.write_all(b"\n").await.unwrap();
    }
}

async fn sent_by_client(mut exch: DuplexStream) -> Vec<Message> {
    let mut out = String::new();
    exch.read_to_string(&mut out).await.unwrap();
    out.lines().map(|l| decode(l).unwrap()).collect()
}

fn universe() -> Vec<String> {
    ["BOND", "GS", "MS"].iter().map(|s| s.to_string()).collect()
}

fn market_maker() -> MarketMake {
    MarketMake::new(MarketMakeConfig { buy_offset: 1, sell_offset: 1, size: 1 })
}

async fn run_script(
    frames: &[&str],
    market: &mut MarketState,
    strategy: &mut dyn Strategy,
) -> (Result<RunSummary, SessionError>, Vec<Message>) {
    let (client, mut exch) = duplex(BUF);
    feed(&mut exch, frames).await;
    let mut session = ExchangeSession::attach(client, "TEAM", Some(Duration::from_millis(300))).await.unwrap();
    let result = engine::run(&mut session, market, strategy, None).await;
    drop(session);
    (result, sent_by_client(exch).await)
}

#[tokio::test]
async fn market_make_round_trip() {
    let mut market = MarketState::new(&universe());
    let mut strat = market_maker();
    let (result, sent) = run_script(
        &[
            r#"{"type":"hello","symbols":[{"symbol":"BOND","position":2}]}"#,
            r#"{"type":"trade","symbol":"BOND","price":100,"size":3}"#,
            r#"{"type":"reject","order_id":1,"error":"UNKNOWN_ORDER"}"#,
            r#"{"type":"reject","order_id":2,"error":"UNKNOWN_ORDER"}"#,
            r#"{"type":"close","symbols":["BOND"]}"#,
        ],
        &mut market,
        &mut strat,
    )
    .await;

    let summary = result.unwrap();
    assert_eq!(summary.trades, 1);
    assert_eq!(summary.commands, 4);
    assert_eq!(summary.rejects, 2);
    assert_eq!(market.position("BOND"), 2);

    assert_eq!(
        sent,
        vec![
            Message::hello("TEAM"),
            Message::Cancel { order_id: 1 },
            Message::Cancel { order_id: 2 },
            Message::Add { order_id: 1, symbol: "BOND".into(), dir: Dir::Buy, price: 101, size: 1 },
            Message::Add { order_id: 2, symbol: "BOND".into(), dir: Dir::Sell, price: 101, size: 1 },
        ]
    );
    // rejected cancels of empty slots leave the fresh quote in place
    assert_eq!(market.quote_state("BOND"), QuoteState::Quoted);
}

#[tokio::test]
async fn untracked_symbols_and_unknown_types_are_ignored() {
    let mut market = MarketState::new(&universe());
    let mut strat = market_maker();
    let (result, sent) = run_script(
        &[
            r#"{"type":"book","symbol":"BOND","buy":[[99,1]],"sell":[]}"#,
            r#"{"type":"trade","symbol":"XLF","price":4000,"size":1}"#,
            r#"{"type":"open","symbols":["BOND"]}"#,
            r#"{"type":"trade","symbol":"GS","price":50,"size":1}"#,
            r#"{"type":"close"}"#,
        ],
        &mut market,
        &mut strat,
    )
    .await;

    let summary = result.unwrap();
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.trades, 2);
    assert_eq!(summary.commands, 4);
    assert_eq!(sent.len(), 5);
    assert!(sent[1..].iter().all(|m| match m {
        Message::Add { symbol, .. } => symbol == "GS",
        Message::Cancel { order_id } => *order_id == 3 || *order_id == 4,
        _ => false,
    }));
    assert_eq!(market.quote_state("XLF"), QuoteState::NoQuote);
    assert!(market.series("XLF").is_none());
    assert_eq!(market.series("GS").map(|s| s.len()), Some(1));
    assert_eq!(market.tape().len(), 2);
}

#[tokio::test]
async fn exchange_chosen_symbols_do_not_become_metric_labels() {
    metrics::init();
    let mut market = MarketState::new(&universe());
    let mut strat = market_maker();
    let frames: Vec<String> = (0..50)
        .map(|i| format!(r#"{{"type":"trade","symbol":"FAKE{i}","price":1,"size":1}}"#))
        .chain(std::iter::once(r#"{"type":"trade","symbol":"MS","price":40,"size":1}"#.to_string()))
        .chain(std::iter::once(r#"{"type":"close"}"#.to_string()))
        .collect();
    let frames: Vec<&str> = frames.iter().map(String::as_str).collect();

    let (result, _) = run_script(&frames, &mut market, &mut strat).await;
    assert_eq!(result.unwrap().trades, 51);
    assert_eq!(market.tape().len(), 51);
    assert!(market.series("FAKE0").is_none());

    let text = String::from_utf8(metrics::encode_metrics()).unwrap();
    assert!(!text.contains("symbol=\"FAKE"));
    assert!(text.contains("symbol=\"other\""));
    assert!(text.contains("symbol=\"MS\""));
}

#[tokio::test]
async fn second_close_is_never_read() {
    let mut market = MarketState::new(&universe());
    let mut strat = market_maker();
    let (result, sent) = run_script(
        &[r#"{"type":"close"}"#, r#"{"type":"close"}"#],
        &mut market,
        &mut strat,
    )
    .await;
    assert_eq!(result.unwrap().frames, 1);
    assert_eq!(sent, vec![Message::hello("TEAM")]);
}

#[tokio::test]
async fn errors_and_fills_are_logged_only() {
    let mut market = MarketState::new(&universe());
    let mut strat = market_maker();
    let (result, sent) = run_script(
        &[
            r#"{"type":"error","error":"TRADING_CLOSED"}"#,
            r#"{"type":"fill","order_id":1,"symbol":"BOND","dir":"BUY","price":999,"size":1}"#,
            r#"{"type":"close"}"#,
        ],
        &mut market,
        &mut strat,
    )
    .await;
    let summary = result.unwrap();
    assert_eq!(summary.fills, 1);
    assert_eq!(summary.commands, 0);
    assert_eq!(market.position("BOND"), 1);
    assert_eq!(sent.len(), 1);
}

#[tokio::test]
async fn malformed_frame_ends_the_loop() {
    let mut market = MarketState::new(&universe());
    let mut strat = market_maker();
    let (result, _) = run_script(
        &[r#"{"type":"trade","symbol":"BOND""#, r#"{"type":"close"}"#],
        &mut market,
        &mut strat,
    )
    .await;
    assert!(matches!(result, Err(SessionError::Codec(CodecError::MalformedFrame(_)))));
}

#[tokio::test]
async fn bad_direction_ends_the_loop() {
    let mut market = MarketState::new(&universe());
    let mut strat = market_maker();
    let (result, _) = run_script(
        &[r#"{"type":"fill","order_id":1,"symbol":"BOND","dir":"SHORT","price":1,"size":1}"#],
        &mut market,
        &mut strat,
    )
    .await;
    assert!(matches!(result, Err(SessionError::Codec(CodecError::InvalidEnum { .. }))));
}

#[tokio::test]
async fn silent_exchange_times_out() {
    let mut market = MarketState::new(&universe());
    let mut strat = market_maker();
    let (result, _) = run_script(
        &[r#"{"type":"trade","symbol":"BOND","price":100,"size":1}"#],
        &mut market,
        &mut strat,
    )
    .await;
    // no close in the script and the exchange end stays open
    assert!(matches!(result, Err(SessionError::ReadTimeout(_))));
}

#[tokio::test]
async fn trend_follow_stacks_orders_on_tape() {
    let mut market = MarketState::new(&universe());
    let cfg = TrendConfig {
        symbol: "BOND".into(),
        short_window: 2,
        long_window: 3,
        delta: 1,
        size: 1,
        trigger: TriggerMode::Continuous,
        policy: OrderPolicy::Stack,
    };
    let mut strat = TrendFollow::new(cfg, market.slots().next_free_id());
    let frames: Vec<String> = [10, 10, 10, 12, 14]
        .iter()
        .map(|p| format!(r#"{{"type":"trade","symbol":"BOND","price":{p},"size":1}}"#))
        .chain(std::iter::once(r#"{"type":"close"}"#.to_string()))
        .collect();
    let frames: Vec<&str> = frames.iter().map(String::as_str).collect();

    let (result, sent) = run_script(&frames, &mut market, &mut strat).await;
    assert_eq!(result.unwrap().commands, 2);
    assert_eq!(
        &sent[1..],
        &[
            Message::Add { order_id: 7, symbol: "BOND".into(), dir: Dir::Sell, price: 13, size: 1 },
            Message::Add { order_id: 8, symbol: "BOND".into(), dir: Dir::Sell, price: 15, size: 1 },
        ]
    );
    assert_eq!(market.trade_log().len(), 2);
}

#[tokio::test]
async fn placed_orders_reach_the_recorder_channel() {
    let mut market = MarketState::new(&universe());
    let mut strat = market_maker();
    let (client, mut exch) = duplex(BUF);
    feed(
        &mut exch,
        &[r#"{"type":"trade","symbol":"MS","price":40,"size":1}"#, r#"{"type":"close"}"#],
    )
    .await;
    let (tx, mut rx) = mpsc::channel(16);
    let mut session = ExchangeSession::attach(client, "TEAM", None).await.unwrap();
    engine::run(&mut session, &mut market, &mut strat, Some(&tx)).await.unwrap();

    let first = rx.try_recv().unwrap();
    let second = rx.try_recv().unwrap();
    assert_eq!((first.side, first.price, first.order_id), (Dir::Buy, 41, 5));
    assert_eq!((second.side, second.price, second.order_id), (Dir::Sell, 41, 6));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn connects_over_tcp_and_says_hello() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let endpoint = Endpoint { host: "127.0.0.1".into(), port };

    let exchange = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let (r, mut w) = sock.into_split();
        let mut line = String::new();
        BufReader::new(r).read_line(&mut line).await.unwrap();
        w.write_all(b"{\"type\":\"close\"}\n").await.unwrap();
        line
    });

    let mut session = ExchangeSession::connect(&endpoint, "TEAM", Some(Duration::from_secs(2))).await.unwrap();
    assert_eq!(session.next_event().await.unwrap(), Message::Close { symbols: vec![] });
    assert_eq!(exchange.await.unwrap(), "{\"type\":\"hello\",\"team\":\"TEAM\"}\n");
}

#[tokio::test]
async fn refused_connection_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let endpoint = Endpoint { host: "127.0.0.1".into(), port };
    let result = ExchangeSession::connect(&endpoint, "TEAM", Some(Duration::from_secs(2))).await;
    assert!(matches!(result, Err(SessionError::ConnectionFailed(_))));
}
