//! Integration tests for poly-lock

mod config_test;
mod e2e_test;
mod market_test;
