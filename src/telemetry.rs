//! Tracing initialization.
//!
//! Log level comes from `RUST_LOG` (`EnvFilter` syntax) and defaults to
//! `info`. Derivation code never puts key material into events, so the
//! subscriber needs no redaction layer.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
