use std::io;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("There is already a web server running on port {0}.")]
    PortConflict(u16),

    #[error("Error starting the web server: {0}")]
    Launch(#[source] io::Error),

    #[error("Error starting the web server: sudo authentication failed ({0})")]
    Elevation(ExitStatus),

    #[error("Lost track of the web server: {0}")]
    Wait(#[source] io::Error),

    #[error("Web server exited with code {0}")]
    ChildExit(i32),

    #[error("Web server was terminated by signal {0}")]
    ChildSignaled(i32),
}

impl SupervisorError {
    /// Process exit code this failure maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ChildExit(code) => *code,
            Self::ChildSignaled(signal) => 128 + signal,
            Self::PortConflict(_) | Self::Launch(_) | Self::Elevation(_) | Self::Wait(_) => 1,
        }
    }
}
