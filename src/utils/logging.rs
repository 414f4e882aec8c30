/// Initialize tracing/logging for the broker process.
///
/// Unknown level names fall back to `info`.
pub fn init(default_level: &str) {
    let lvl = parse_level(default_level);

    // try_init so tests can call this repeatedly
    let _ = tracing_subscriber::fmt()
        .with_max_level(lvl)
        .with_target(false)
        .try_init();
}

pub(crate) fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    }
}
