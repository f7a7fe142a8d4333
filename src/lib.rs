//! poly-lock: dual-profit lock paper trader for Polymarket 15-minute
//! crypto up/down markets
//!
//! This library provides the core components for:
//! - Upstream conviction scoring and regime classification
//! - Leader/flip tracking and order book imbalance
//! - Guardrail admission checks before entry
//! - Dual-outcome lock detection and recovery sizing
//! - Per-asset risk caps
//! - The per-asset trading state machine and its orchestrator
//! - Paper execution, snapshot persistence and observability

pub mod cli;
pub mod config;
pub mod data;
pub mod execution;
pub mod feed;
pub mod guardrail;
pub mod market;
pub mod orderbook;
pub mod risk;
pub mod signal;
pub mod strategy;
pub mod telemetry;
