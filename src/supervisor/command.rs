use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use super::SupervisorError;

const ELEVATE: &str = "sudo";

/// Command line of the server child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    program: OsString,
    args: Vec<OsString>,
    elevated: bool,
}

impl ServerCommand {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        Self {
            program: program.as_ref().to_os_string(),
            args: args.into_iter().map(|a| a.as_ref().to_os_string()).collect(),
            elevated: false,
        }
    }

    /// This binary in `--serve` mode, wrapped in `sudo` when binding `port`
    /// needs privileges this process does not have.
    pub fn for_port(port: u16) -> io::Result<Self> {
        let exe = std::env::current_exe()?;
        let command = Self::new(exe, ["--serve".to_string(), port.to_string()]);

        Ok(if needs_privilege(port) {
            command.elevated()
        } else {
            command
        })
    }

    /// Prefixes the command with `sudo`.
    pub fn elevated(mut self) -> Self {
        let inner = std::mem::replace(&mut self.program, OsString::from(ELEVATE));
        self.args.insert(0, inner);
        self.elevated = true;
        self
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    /// Refreshes sudo credentials in the foreground so the password prompt is
    /// not issued from the child's background process group.
    pub fn authenticate(&self) -> Result<(), SupervisorError> {
        if !self.elevated {
            return Ok(());
        }

        let status = Command::new(ELEVATE)
            .arg("-v")
            .status()
            .map_err(SupervisorError::Launch)?;
        if status.success() {
            Ok(())
        } else {
            Err(SupervisorError::Elevation(status))
        }
    }

    /// Builds the process as the leader of a new process group, so terminal
    /// interrupts reach only the supervisor.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .process_group(0);
        command
    }
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Ports below 1024 need root to bind.
pub fn needs_privilege(port: u16) -> bool {
    port < 1024 && unsafe { libc::geteuid() } != 0
}
