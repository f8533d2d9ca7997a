//! Log setup.
//!
//! The crate logs through the `log` facade. Hosts that do not install their
//! own logger can call [`init_logging`] once at startup; native builds get an
//! `env_logger` writing to stderr, wasm builds log to the browser console.

use std::sync::atomic::{AtomicBool, Ordering};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the logger. Safe to call more than once; later calls do nothing.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    use std::io::Write;

    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    let result = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(DEFAULT_FILTER),
    )
    .format(|buf, record| {
        writeln!(
            buf,
            "[{}] [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    })
    .try_init();

    // Another logger was installed by the host; keep theirs.
    if result.is_ok() {
        log::info!("[LOGGING] Logger initialized");
    }
}

#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
}

/// Whether [`init_logging`] has run.
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging();
        assert!(is_initialized());
    }
}
