use std::os::fd::RawFd;

/// Terminal attributes captured before echo suppression.
#[derive(Clone, Copy)]
pub struct TerminalSettings {
    fd: RawFd,
    attrs: libc::termios,
}

/// Hides echoed control characters (`^C`) on a terminal for as long as the
/// guard lives. Dropping it restores the captured attributes.
pub struct EchoGuard {
    saved: TerminalSettings,
}

impl EchoGuard {
    /// Suppresses control-character echo on stdin.
    ///
    /// Returns `None` when stdin is not a terminal or its attributes can't be
    /// read or changed; the caller simply carries on without the guard.
    pub fn acquire() -> Option<Self> {
        Self::acquire_fd(libc::STDIN_FILENO)
    }

    pub fn acquire_fd(fd: RawFd) -> Option<Self> {
        if unsafe { libc::isatty(fd) } != 1 {
            return None;
        }

        let mut attrs: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut attrs) } != 0 {
            return None;
        }

        let mut quiet = attrs;
        quiet.c_lflag &= !libc::ECHOCTL;
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &quiet) } != 0 {
            return None;
        }

        Some(Self {
            saved: TerminalSettings { fd, attrs },
        })
    }
}

impl Drop for EchoGuard {
    fn drop(&mut self) {
        let TerminalSettings { fd, attrs } = self.saved;
        unsafe {
            libc::tcsetattr(fd, libc::TCSANOW, &attrs);
        }
    }
}
