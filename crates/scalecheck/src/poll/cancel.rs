use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::TERM_SIGNALS;
use signal_hook::flag;

use crate::common::error::HarnessError;

/// Shared flag that asks long-running waits to stop.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token when SIGINT/SIGTERM/SIGQUIT arrives.
    /// A second signal terminates the process.
    pub fn install_signal_handlers(&self) -> crate::Result<()> {
        for signal in TERM_SIGNALS {
            flag::register_conditional_shutdown(*signal, 1, Arc::clone(&self.flag))?;
            flag::register(*signal, Arc::clone(&self.flag))?;
        }
        Ok(())
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            Err(HarnessError::Cancelled)
        } else {
            Ok(())
        }
    }
}
