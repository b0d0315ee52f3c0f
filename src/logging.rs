//! Tracing initialization for mio-sim.

/// Install a tracing subscriber reading `RUST_LOG`, defaulting to
/// info-level logging scoped to this crate.
pub fn init() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mio_sim=info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .ok();
}
