//! Recovery supervisor: the process-wide failure boundary
//!
//! Both role loops run under a single error boundary. Any error that reaches
//! it triggers the same sequence: log the error, announce the pending
//! restart, wait the fixed delay, restart the whole device. Restart-on-error
//! is the system's sole recovery mechanism; there is no in-process retry,
//! backoff, or circuit breaking beneath it.
//!
//! The one exception is an operator interrupt (Ctrl-C): it always propagates
//! untouched, never converted into a restart, so a human can regain
//! interactive control of the device.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fixed delay between a fatal error and the restart
pub const RESTART_DELAY: Duration = Duration::from_secs(2);

/// Performs the device restart
pub trait Reboot {
    /// Restart the device. For the real implementation this does not return;
    /// test doubles return so the supervisor re-enters the role loop, which
    /// is exactly what a rebooted device would do.
    fn restart(&mut self) -> Result<()>;
}

/// Restart by re-executing the current binary image
///
/// The daemon analog of a hardware reset: all in-process state is lost and
/// the role starts over from its boot path.
pub struct ProcessReboot;

impl Reboot for ProcessReboot {
    #[cfg(unix)]
    fn restart(&mut self) -> Result<()> {
        use std::os::unix::process::CommandExt;
        let exe = std::env::current_exe()?;
        let err = std::process::Command::new(exe)
            .args(std::env::args_os().skip(1))
            .exec();
        // exec only returns on failure
        Err(err.into())
    }

    #[cfg(not(unix))]
    fn restart(&mut self) -> Result<()> {
        // No exec on this platform; exit non-zero and let the service
        // manager bring the process back up.
        std::process::exit(1);
    }
}

/// Wraps a role loop in the restart-on-error boundary
pub struct RecoverySupervisor<R: Reboot> {
    reboot: R,
    delay: Duration,
    interrupted: Arc<AtomicBool>,
}

impl<R: Reboot> RecoverySupervisor<R> {
    pub fn new(reboot: R, interrupted: Arc<AtomicBool>) -> Self {
        Self {
            reboot,
            delay: RESTART_DELAY,
            interrupted,
        }
    }

    #[cfg(test)]
    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run the role loop until it finishes cleanly or the operator interrupts
    ///
    /// The closure is the whole boot-to-loop path of one role; after a
    /// restart it runs again from scratch.
    pub fn run<F>(&mut self, mut role: F) -> Result<()>
    where
        F: FnMut() -> Result<()>,
    {
        loop {
            match role() {
                Ok(()) => return Ok(()),
                Err(Error::Interrupted) => return Err(Error::Interrupted),
                Err(_) if self.interrupted.load(Ordering::Relaxed) => {
                    return Err(Error::Interrupted);
                }
                Err(e) => {
                    log::error!("error during execution: {e}");
                    log::warn!(
                        "restarting device in {} seconds (Ctrl-C to escape)",
                        self.delay.as_secs()
                    );
                    if !self.wait_out_delay() {
                        return Err(Error::Interrupted);
                    }
                    self.reboot.restart()?;
                }
            }
        }
    }

    /// Sleep the restart delay; false if the operator interrupted it
    fn wait_out_delay(&self) -> bool {
        const SLICE: Duration = Duration::from_millis(100);
        let mut remaining = self.delay;
        while !remaining.is_zero() {
            if self.interrupted.load(Ordering::Relaxed) {
                return false;
            }
            let step = remaining.min(SLICE);
            std::thread::sleep(step);
            remaining -= step;
        }
        !self.interrupted.load(Ordering::Relaxed)
    }
}
