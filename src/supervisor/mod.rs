mod command;
mod error;

pub use command::{ServerCommand, needs_privilege};
pub use error::SupervisorError;

use log::{debug, error, info};
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ExitStatus};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::port::is_port_bound;
use crate::terminal::EchoGuard;

/// How long a stopping server gets between SIGTERM and SIGKILL.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Routes Ctrl+C to a channel instead of killing this process.
///
/// Can be installed once per process.
pub fn interrupt_channel() -> Result<Receiver<()>, ctrlc::Error> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;
    Ok(rx)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    Running,
    Exited(i32),
    Signaled(i32),
}

impl From<ExitStatus> for ChildStatus {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Exited(code),
            (None, Some(signal)) => Self::Signaled(signal),
            (None, None) => Self::Exited(0),
        }
    }
}

/// The running server child; it leads its own process group.
pub struct ServerHandle {
    child: Child,
    status: ChildStatus,
}

impl ServerHandle {
    pub fn spawn(command: &ServerCommand) -> io::Result<Self> {
        let child = command.to_command().spawn()?;
        Ok(Self {
            child,
            status: ChildStatus::Running,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Process group id; equal to the pid because the child is the group leader.
    pub fn pgid(&self) -> libc::pid_t {
        self.child.id() as libc::pid_t
    }

    /// Non-blocking status check; reaps the child once it has exited.
    pub fn poll(&mut self) -> io::Result<ChildStatus> {
        if self.status == ChildStatus::Running
            && let Some(status) = self.child.try_wait()?
        {
            self.status = status.into();
        }
        Ok(self.status)
    }

    pub fn wait(&mut self) -> io::Result<ChildStatus> {
        if self.status == ChildStatus::Running {
            self.status = self.child.wait()?.into();
        }
        Ok(self.status)
    }

    pub fn terminate(&self) {
        self.signal_group(libc::SIGTERM);
    }

    pub fn kill(&self) {
        self.signal_group(libc::SIGKILL);
    }

    fn signal_group(&self, signal: libc::c_int) {
        if self.status != ChildStatus::Running {
            return;
        }
        unsafe {
            libc::kill(-self.pgid(), signal);
        }
    }
}

/// How a supervised run ended without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// The server exited on its own with status 0.
    Completed,
    /// The user interrupted and the server was shut down.
    Interrupted,
}

/// Runs one server child for the lifetime of this process.
pub struct Supervisor {
    port: u16,
    grace: Duration,
    echo_guard: bool,
}

impl Supervisor {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            grace: GRACE_PERIOD,
            echo_guard: true,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Whether to hide `^C` on the controlling terminal while supervising.
    pub fn with_echo_guard(mut self, enabled: bool) -> Self {
        self.echo_guard = enabled;
        self
    }

    /// Supervises `command` to completion and returns the process exit code.
    pub fn run(&self, command: &ServerCommand, interrupts: &Receiver<()>) -> i32 {
        match self.supervise(command, interrupts) {
            Ok(Stop::Completed) => {
                debug!("Web server on port {} stopped (return code 0).", self.port);
                0
            }
            Ok(Stop::Interrupted) => {
                debug!("Web server on port {} stopped.", self.port);
                0
            }
            Err(e) => {
                error!("{}", e);
                e.exit_code()
            }
        }
    }

    pub fn supervise(
        &self,
        command: &ServerCommand,
        interrupts: &Receiver<()>,
    ) -> Result<Stop, SupervisorError> {
        if is_port_bound(self.port) {
            return Err(SupervisorError::PortConflict(self.port));
        }

        let root = std::env::current_dir().unwrap_or_default();
        debug!(
            "Launching web server from {} on port {}",
            root.display(),
            self.port
        );
        info!("Starting web server on port {}...", self.port);
        command.authenticate()?;

        let _echo = self.echo_guard.then(EchoGuard::acquire).flatten();
        let mut server = ServerHandle::spawn(command).map_err(SupervisorError::Launch)?;
        debug!("Running `{}` as pid {}", command, server.pid());

        match self.wait(&mut server, interrupts)? {
            ChildStatus::Running => {
                self.stop(&mut server, interrupts)?;
                Ok(Stop::Interrupted)
            }
            ChildStatus::Exited(0) => Ok(Stop::Completed),
            ChildStatus::Exited(code) => Err(SupervisorError::ChildExit(code)),
            ChildStatus::Signaled(signal) => Err(SupervisorError::ChildSignaled(signal)),
        }
    }

    /// Blocks until the child exits or an interrupt arrives; `Running` means
    /// the wait was interrupted.
    fn wait(
        &self,
        server: &mut ServerHandle,
        interrupts: &Receiver<()>,
    ) -> Result<ChildStatus, SupervisorError> {
        loop {
            let status = server.poll().map_err(SupervisorError::Wait)?;
            if status != ChildStatus::Running {
                return Ok(status);
            }

            match interrupts.recv_timeout(POLL_INTERVAL) {
                Ok(()) => {
                    debug!("Interrupt received; stopping web server on port {}", self.port);
                    return Ok(ChildStatus::Running);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return server.wait().map_err(SupervisorError::Wait);
                }
            }
        }
    }

    /// SIGTERM, then SIGKILL once the grace period runs out or a second
    /// interrupt arrives. The child is always reaped.
    fn stop(
        &self,
        server: &mut ServerHandle,
        interrupts: &Receiver<()>,
    ) -> Result<(), SupervisorError> {
        server.terminate();
        let deadline = Instant::now() + self.grace;

        loop {
            if server.poll().map_err(SupervisorError::Wait)? != ChildStatus::Running {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(
                    "Web server on port {} ignored SIGTERM for {:?}; killing it",
                    self.port, self.grace
                );
                break;
            }

            let tick = POLL_INTERVAL.min(deadline - now);
            match interrupts.recv_timeout(tick) {
                Ok(()) => {
                    debug!("Second interrupt; killing web server on port {}", self.port);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => thread::sleep(tick),
            }
        }

        server.kill();
        server.wait().map_err(SupervisorError::Wait)?;
        Ok(())
    }
}
