//! Systemd integration: readiness notification and socket activation.

use std::os::unix::io::FromRawFd;
use std::os::unix::net::UnixListener as StdUnixListener;

use tokio::net::UnixListener;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Systemd notification for notify-on-ready services.
///
/// Every call is a no-op when not started by systemd with `Type=notify`.
#[derive(Clone, Debug)]
pub struct SystemdNotifier {
    /// Is systemd socket available (NOTIFY_SOCKET env var set)?
    enabled: bool,
}

impl SystemdNotifier {
    pub fn new() -> Self {
        let enabled = std::env::var_os("NOTIFY_SOCKET").is_some();
        if enabled {
            debug!("systemd notification socket detected");
        }
        Self { enabled }
    }

    /// Send READY; the sockets are bound and startup presence is queued.
    pub fn notify_ready(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        sd_notify::notify(false, &[sd_notify::NotifyState::Ready])?;
        info!("sent READY to systemd");
        Ok(())
    }

    pub fn notify_status(&self, message: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        sd_notify::notify(false, &[sd_notify::NotifyState::Status(message)])?;
        Ok(())
    }

    pub fn notify_stopping(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        sd_notify::notify(true, &[sd_notify::NotifyState::Stopping])?;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for SystemdNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// STATUS text after the startup presence scan.
pub fn presence_status(present: usize, ports: usize) -> String {
    format!("{present} of {ports} transceivers present")
}

/// The first listening socket passed by the supervisor, if any.
///
/// Must be called from within the runtime. Extra descriptors are ignored.
pub fn activated_listener() -> Result<Option<UnixListener>> {
    let mut fds = sd_notify::listen_fds()?;
    let Some(fd) = fds.next() else {
        return Ok(None);
    };
    if fds.next().is_some() {
        warn!("more than one socket passed, using the first");
    }

    // SAFETY: LISTEN_FDS hands this process ownership of descriptors
    // starting at SD_LISTEN_FDS_START, and each is taken once.
    let listener = unsafe { StdUnixListener::from_raw_fd(fd) };
    listener.set_nonblocking(true)?;
    Ok(Some(UnixListener::from_std(listener)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_notifier_is_noop() {
        let notifier = SystemdNotifier { enabled: false };
        assert!(!notifier.is_enabled());
        assert!(notifier.notify_ready().is_ok());
        assert!(notifier.notify_status("probing ports").is_ok());
        assert!(notifier.notify_stopping().is_ok());
    }

    #[test]
    fn test_presence_status_text() {
        assert_eq!(presence_status(0, 0), "0 of 0 transceivers present");
        assert_eq!(presence_status(3, 48), "3 of 48 transceivers present");
    }
}
