//! `sd_notify` state transitions for `boatd` under a `Type=notify` unit.
//!
//! Built only with the `sd-notify` feature on Linux; everywhere else the
//! notifier compiles down to no-ops so the runtime calls it unconditionally.

use std::io;

#[cfg(all(feature = "sd-notify", target_os = "linux"))]
use sd_notify::NotifyState;

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ServiceNotifier {
    #[cfg(all(feature = "sd-notify", target_os = "linux"))]
    available: bool,
}

impl ServiceNotifier {
    /// Records whether `NOTIFY_SOCKET` was present at start-up.
    #[must_use]
    pub(crate) fn new() -> Self {
        #[cfg(all(feature = "sd-notify", target_os = "linux"))]
        {
            let available = std::env::var_os("NOTIFY_SOCKET").is_some();
            Self { available }
        }

        #[cfg(not(all(feature = "sd-notify", target_os = "linux")))]
        {
            Self {}
        }
    }

    /// Reports readiness with a status line such as `listening on 0.0.0.0:19184`.
    pub(crate) fn ready(&self, status: &str) -> io::Result<()> {
        #[cfg(all(feature = "sd-notify", target_os = "linux"))]
        {
            if !self.available {
                return Ok(());
            }
            sd_notify::notify(false, &[NotifyState::Ready, NotifyState::Status(status)])
        }

        #[cfg(not(all(feature = "sd-notify", target_os = "linux")))]
        {
            let _ = status;
            Ok(())
        }
    }

    /// Reports that a configuration reload is in progress.
    pub(crate) fn reloading(&self) -> io::Result<()> {
        #[cfg(all(feature = "sd-notify", target_os = "linux"))]
        {
            if !self.available {
                return Ok(());
            }
            sd_notify::notify(false, &[NotifyState::Reloading])
        }

        #[cfg(not(all(feature = "sd-notify", target_os = "linux")))]
        {
            Ok(())
        }
    }

    /// Indicates that the daemon is shutting down.
    pub(crate) fn stopping(&self) -> io::Result<()> {
        #[cfg(all(feature = "sd-notify", target_os = "linux"))]
        {
            if !self.available {
                return Ok(());
            }
            sd_notify::notify(false, &[NotifyState::Stopping])
        }

        #[cfg(not(all(feature = "sd-notify", target_os = "linux")))]
        {
            Ok(())
        }
    }
}
