//! Common test utilities.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ... test code ...
//! }
//! ```
//!
//! Set `RUST_LOG` to see the library's tracing output when the crate is
//! built with the `tracing` feature, e.g.
//! `RUST_LOG=slablist=trace cargo test --features tracing`.

#![allow(dead_code)]

use std::sync::Once;

use slablist::{ListItem, Node};
use tracing_subscriber::EnvFilter;

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber with env-filtered console logging.
///
/// Safe to call multiple times - only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A list element carrying a test value.
#[derive(Debug, Default)]
pub struct TestItem {
    pub value: usize,
    node: Node,
}

impl ListItem for TestItem {
    fn node(&self) -> &Node {
        &self.node
    }
}

/// A slot array where each slot's value is its own index.
pub fn slab(n: usize) -> Vec<TestItem> {
    (0..n)
        .map(|value| TestItem {
            value,
            node: Node::new(),
        })
        .collect()
}
