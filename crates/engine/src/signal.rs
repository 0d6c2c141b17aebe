// SPDX-License-Identifier: MIT
// Copyright (c) 2026 taskyard contributors

//! POSIX signal delivery, used by both the idle watchdog and the
//! Supervisor's `kill`/`terminate` paths.
//!
//! Goes through `nix`'s safe `kill(2)` wrapper rather than a raw `libc`
//! call: the workspace forbids `unsafe_code` outright (see the root
//! `Cargo.toml`), so an `unsafe { libc::kill(...) }` call here would not
//! even compile.

use nix::sys::signal::{self, Signal as NixSignal};
use nix::unistd::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

impl Signal {
    fn as_nix(self) -> NixSignal {
        match self {
            Signal::Term => NixSignal::SIGTERM,
            Signal::Kill => NixSignal::SIGKILL,
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Signal::Term
    }
}

/// Send `signal` to `pid`. A process that has already exited is treated as
/// success: killing a non-running task must be idempotent rather than
/// raising.
pub fn send_signal(pid: i64, signal: Signal) -> std::io::Result<()> {
    if pid <= 0 {
        return Ok(());
    }
    match signal::kill(Pid::from_raw(pid as i32), signal.as_nix()) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(std::io::Error::from_raw_os_error(e as i32)),
    }
}
