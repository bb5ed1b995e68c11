use std::fmt;

/// Tasks supervised by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    EventLogger,
    Controller,
    Console,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Component::EventLogger => "event_logger",
            Component::Controller => "controller",
            Component::Console => "console",
        })
    }
}

/// Component lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Why the process is shutting down
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
}

impl ShutdownReason {
    /// Process exit code implied by the reason alone
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Error(_) => 1,
            ShutdownReason::Signal(_) | ShutdownReason::UserRequest => 0,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(signal) => write!(f, "received {}", signal),
            ShutdownReason::Error(reason) => write!(f, "error: {}", reason),
            ShutdownReason::UserRequest => f.write_str("operator quit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_reason_exit_codes() {
        assert_eq!(ShutdownReason::UserRequest.exit_code(), 0);
        assert_eq!(ShutdownReason::Signal("SIGINT".to_string()).exit_code(), 0);
        assert_eq!(
            ShutdownReason::Error("controller exited".to_string()).exit_code(),
            1
        );
        assert_eq!(
            ShutdownReason::Signal("SIGTERM".to_string()).to_string(),
            "received SIGTERM"
        );
    }
}
