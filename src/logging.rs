use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Wire up tracing. RUST_LOG wins when set; otherwise `-v` repetition picks
/// the level.
pub fn init(verbose: u8) -> Result<()> {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
