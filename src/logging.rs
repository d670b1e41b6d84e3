//! Log output for binaries and tests.
//!
//! The library itself only talks to the `log` facade. Targets used across the crate:
//! `someip::rx`, `someip::sd`, `someip::pool`, `someip::service`, `someip::transport`,
//! `someip::diag` and `someip::runtime`.

/// Installs `env_logger`, honouring `RUST_LOG` and falling back to `info`.
/// Returns false if a logger was already installed.
pub fn init() -> bool {
    init_with_filter("info")
}

/// Like [`init`] with a custom fallback filter, e.g. `"someip::sd=debug,info"`.
pub fn init_with_filter(default_filter: &str) -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
