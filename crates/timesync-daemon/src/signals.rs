//! Signal handling for graceful daemon shutdown.
//!
//! SIGTERM and SIGINT request shutdown; SIGHUP requests a config reload.
//! Signal handlers must be async-signal-safe, so they only flip static
//! atomics; a small poll thread forwards those flips into the
//! broadcaster's [`ShutdownToken`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timebase_core::ShutdownToken;
use tracing::{debug, info};

/// How often the forwarding thread samples the handler flags.
const SIGNAL_POLL: Duration = Duration::from_millis(10);

/// Handle for installed signal handlers.
#[derive(Clone)]
pub struct SignalHandler {
    token: ShutdownToken,
    reload_requested: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Install Unix signal handlers and wire them to `token`.
    ///
    /// On non-Unix platforms only manual shutdown via the token works.
    pub fn install(token: ShutdownToken) -> std::io::Result<Self> {
        let handler = Self {
            token,
            reload_requested: Arc::new(AtomicBool::new(false)),
        };

        #[cfg(unix)]
        handler.register_unix_handlers()?;

        Ok(handler)
    }

    #[cfg(unix)]
    fn register_unix_handlers(&self) -> std::io::Result<()> {
        use std::os::raw::c_int;

        static SHUTDOWN_FLAG: AtomicBool = AtomicBool::new(false);
        static RELOAD_FLAG: AtomicBool = AtomicBool::new(false);

        extern "C" fn shutdown_handler(_: c_int) {
            SHUTDOWN_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn reload_handler(_: c_int) {
            RELOAD_FLAG.store(true, Ordering::Relaxed);
        }

        // SAFETY: the handlers above only touch static atomics, which is
        // async-signal-safe, and registration happens before any signal
        // of interest can arrive.
        unsafe {
            libc::signal(libc::SIGTERM, shutdown_handler as libc::sighandler_t);
            libc::signal(libc::SIGINT, shutdown_handler as libc::sighandler_t);
            libc::signal(libc::SIGHUP, reload_handler as libc::sighandler_t);
        }

        let token = self.token.clone();
        let reload = Arc::clone(&self.reload_requested);
        std::thread::Builder::new()
            .name("timesync-signals".into())
            .spawn(move || {
                loop {
                    if SHUTDOWN_FLAG.swap(false, Ordering::Relaxed) {
                        info!("Shutdown signal received");
                        token.request();
                    }
                    if RELOAD_FLAG.swap(false, Ordering::Relaxed) {
                        info!("Reload signal received");
                        reload.store(true, Ordering::Relaxed);
                    }
                    if token.is_requested() {
                        break;
                    }
                    std::thread::sleep(SIGNAL_POLL);
                }
            })?;

        debug!("Unix signal handlers registered");
        Ok(())
    }

    /// Check and clear the reload-request flag.
    pub fn take_reload_request(&self) -> bool {
        self.reload_requested.swap(false, Ordering::Relaxed)
    }

    /// The shutdown token this handler feeds.
    pub fn token(&self) -> &ShutdownToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_shutdown_through_token() {
        let token = ShutdownToken::new();
        let handler = SignalHandler::install(token.clone()).unwrap();

        assert!(!handler.token().is_requested());
        token.request();
        assert!(handler.token().is_requested());
    }

    #[test]
    fn test_reload_flag_cleared_on_take() {
        let handler = SignalHandler::install(ShutdownToken::new()).unwrap();
        assert!(!handler.take_reload_request());

        handler.reload_requested.store(true, Ordering::Relaxed);
        assert!(handler.take_reload_request());
        assert!(!handler.take_reload_request());
    }
}
