use super::state::CaptureMode;
use crate::error::{ControllerError, Result};
use crate::identity::IdentitySummary;
use tokio::sync::{mpsc, oneshot};

type Reply<T> = oneshot::Sender<Result<T>>;

/// Requests handled by the controller task between forward passes
#[derive(Debug)]
pub enum ControllerCommand {
    StartRealtime {
        reply: Reply<()>,
    },
    SingleShot {
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    Train {
        name: String,
        sample_count: usize,
        reply: Reply<()>,
    },
    CommitEnrollment {
        reply: Reply<String>,
    },
    DeleteIdentity {
        name: String,
        reply: Reply<()>,
    },
    RenameIdentity {
        old_name: String,
        new_name: String,
        reply: Reply<()>,
    },
    ListIdentities {
        reply: Reply<Vec<IdentitySummary>>,
    },
    Mode {
        reply: oneshot::Sender<CaptureMode>,
    },
}

impl ControllerCommand {
    /// Short name used in logs and transition errors
    pub fn name(&self) -> &'static str {
        match self {
            ControllerCommand::StartRealtime { .. } => "start realtime detection",
            ControllerCommand::SingleShot { .. } => "start single detection",
            ControllerCommand::Stop { .. } => "stop",
            ControllerCommand::Train { .. } => "train",
            ControllerCommand::CommitEnrollment { .. } => "commit enrollment",
            ControllerCommand::DeleteIdentity { .. } => "delete identity",
            ControllerCommand::RenameIdentity { .. } => "rename identity",
            ControllerCommand::ListIdentities { .. } => "list identities",
            ControllerCommand::Mode { .. } => "query mode",
        }
    }
}

/// Cloneable front end for sending commands to a running controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    sender: mpsc::Sender<ControllerCommand>,
}

impl ControllerHandle {
    /// Create a handle and the receiver the controller task consumes
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ControllerCommand>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> ControllerCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| ControllerError::Unavailable)?;
        response.await.map_err(|_| ControllerError::Unavailable.into())
    }

    pub async fn start_realtime(&self) -> Result<()> {
        self.request(|reply| ControllerCommand::StartRealtime { reply })
            .await?
    }

    pub async fn single_shot(&self) -> Result<()> {
        self.request(|reply| ControllerCommand::SingleShot { reply })
            .await?
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| ControllerCommand::Stop { reply }).await?
    }

    /// Begin enrolling `name` from `sample_count` diverse samples
    pub async fn train(&self, name: &str, sample_count: usize) -> Result<()> {
        let name = name.to_string();
        self.request(|reply| ControllerCommand::Train {
            name,
            sample_count,
            reply,
        })
        .await?
    }

    /// Retry storing a completed enrollment whose commit failed
    pub async fn commit_enrollment(&self) -> Result<String> {
        self.request(|reply| ControllerCommand::CommitEnrollment { reply })
            .await?
    }

    pub async fn delete_identity(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.request(|reply| ControllerCommand::DeleteIdentity { name, reply })
            .await?
    }

    pub async fn rename_identity(&self, old_name: &str, new_name: &str) -> Result<()> {
        let old_name = old_name.to_string();
        let new_name = new_name.to_string();
        self.request(|reply| ControllerCommand::RenameIdentity {
            old_name,
            new_name,
            reply,
        })
        .await?
    }

    pub async fn list_identities(&self) -> Result<Vec<IdentitySummary>> {
        self.request(|reply| ControllerCommand::ListIdentities { reply })
            .await?
    }

    pub async fn mode(&self) -> Result<CaptureMode> {
        self.request(|reply| ControllerCommand::Mode { reply }).await
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the controller has stopped receiving commands
    pub async fn closed(&self) {
        self.sender.closed().await
    }
}
