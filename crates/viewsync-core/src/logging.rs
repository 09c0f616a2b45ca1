use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` wins over `level`; `"off"` leaves
/// logging uninstalled. Safe to call more than once.
pub fn init(level: &str) {
    if level.eq_ignore_ascii_case("off") {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
