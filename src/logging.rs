use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Filter used when `RUST_LOG` is unset.
///
/// 0 = warnings, plus scenario outcomes from this crate; 1 (-v) = scenario
/// steps; 2+ (-vv) = every page query.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn,saucedemo_harness=info",
        1 => "info,saucedemo_harness=debug",
        _ => "debug,saucedemo_harness=trace",
    }
}

/// Install the global subscriber for the runner binary
pub fn init_logging(verbosity: u8) {
    let filter = default_filter(verbosity);

    // RUST_LOG wins over the flag
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(stderr)
        .with_target(true)
        .with_level(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_level_keeps_crate_info() {
        let filter = default_filter(0);
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("saucedemo_harness=info"));
        assert_eq!(default_filter(1), "info,saucedemo_harness=debug");
        assert_eq!(default_filter(5), default_filter(2));
    }
}
