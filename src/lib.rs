// ===============================
// src/lib.rs
// ===============================
//! Line-delimited JSON trading client for an ETC-style matching engine:
//! wire codec, exchange session, market bookkeeping, strategies and the
//! event loop that ties them together.

pub mod codec;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod market;
pub mod metrics;
pub mod recorder;
pub mod session;
pub mod strategy;
