//! Line-based operator console.
//!
//! Each input line is one command; replies are written back one line per
//! result so the console works over a terminal or a pipe.

use super::types::ShutdownReason;
use crate::controller::ControllerHandle;
use crate::error::Result;
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const HELP: &str = "\
Commands:
  realtime              start continuous detection
  single                detect until one face is seen
  stop                  stop detection or abandon enrollment
  train <name> [count]  enroll a new identity
  commit                retry saving a completed enrollment
  delete <name>         delete an identity
  rename <old> <new>    rename an identity
  rename <old> -> <new> rename when names contain spaces
  list                  list stored identities
  mode                  show the capture mode
  quit                  shut down";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsoleError {
    #[error("Unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// One parsed operator command
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Realtime,
    Single,
    Stop,
    Train { name: String, count: Option<usize> },
    Commit,
    Delete { name: String },
    Rename { old_name: String, new_name: String },
    List,
    Mode,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = ConsoleError;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = words.collect();

        let command = match (verb.as_str(), args.as_slice()) {
            ("realtime" | "start", []) => ConsoleCommand::Realtime,
            ("single", []) => ConsoleCommand::Single,
            ("stop", []) => ConsoleCommand::Stop,
            ("commit", []) => ConsoleCommand::Commit,
            ("list" | "ls", []) => ConsoleCommand::List,
            ("mode", []) => ConsoleCommand::Mode,
            ("help" | "?", []) => ConsoleCommand::Help,
            ("quit" | "exit", []) => ConsoleCommand::Quit,
            ("train", [name @ .., last]) => {
                // A trailing number is the sample count; names may contain spaces
                match last.parse::<usize>() {
                    Ok(count) if !name.is_empty() => ConsoleCommand::Train {
                        name: name.join(" "),
                        count: Some(count),
                    },
                    _ => ConsoleCommand::Train {
                        name: args.join(" "),
                        count: None,
                    },
                }
            }
            ("train", []) => return Err(ConsoleError::Usage("train <name> [count]")),
            ("delete" | "rm", [_, ..]) => ConsoleCommand::Delete {
                name: args.join(" "),
            },
            ("delete" | "rm", []) => return Err(ConsoleError::Usage("delete <name>")),
            ("rename", _) => parse_rename(&args)?,
            (
                "realtime" | "start" | "single" | "stop" | "commit" | "list" | "ls" | "mode"
                | "help" | "?" | "quit" | "exit",
                _,
            ) => return Err(ConsoleError::Usage("commands without arguments take none")),
            (other, _) => return Err(ConsoleError::Unknown(other.to_string())),
        };

        Ok(command)
    }
}

/// `rename <old> <new>` for single words, `rename <old> -> <new>` otherwise
fn parse_rename(args: &[&str]) -> std::result::Result<ConsoleCommand, ConsoleError> {
    const USAGE: &str = "rename <old> <new> | rename <old> -> <new>";

    let (old_name, new_name) = match args.iter().position(|word| *word == "->") {
        Some(arrow) => (args[..arrow].join(" "), args[arrow + 1..].join(" ")),
        None => match args {
            [old_name, new_name] => (old_name.to_string(), new_name.to_string()),
            _ => return Err(ConsoleError::Usage(USAGE)),
        },
    };

    if old_name.is_empty() || new_name.is_empty() {
        return Err(ConsoleError::Usage(USAGE));
    }
    Ok(ConsoleCommand::Rename { old_name, new_name })
}

/// Reads operator commands and forwards them to the controller
pub struct OperatorConsole {
    handle: ControllerHandle,
    default_samples: usize,
}

impl OperatorConsole {
    pub fn new(handle: ControllerHandle, default_samples: usize) -> Self {
        Self {
            handle,
            default_samples,
        }
    }

    /// Run one command and describe the outcome
    pub async fn execute(&self, command: ConsoleCommand) -> Result<String> {
        debug!("Console command: {:?}", command);

        let reply = match command {
            ConsoleCommand::Realtime => {
                self.handle.start_realtime().await?;
                "Realtime detection started".to_string()
            }
            ConsoleCommand::Single => {
                self.handle.single_shot().await?;
                "Looking for a face".to_string()
            }
            ConsoleCommand::Stop => {
                self.handle.stop().await?;
                format!("Stopped, now {}", self.handle.mode().await?)
            }
            ConsoleCommand::Train { name, count } => {
                let count = count.unwrap_or(self.default_samples);
                self.handle.train(&name, count).await?;
                format!("Enrolling '{}' from {} samples", name.trim(), count)
            }
            ConsoleCommand::Commit => {
                let name = self.handle.commit_enrollment().await?;
                format!("Enrolled '{}'", name)
            }
            ConsoleCommand::Delete { name } => {
                self.handle.delete_identity(&name).await?;
                format!("Deleted '{}'", name)
            }
            ConsoleCommand::Rename { old_name, new_name } => {
                self.handle.rename_identity(&old_name, &new_name).await?;
                format!("Renamed '{}' to '{}'", old_name, new_name)
            }
            ConsoleCommand::List => {
                let identities = self.handle.list_identities().await?;
                if identities.is_empty() {
                    "No identities stored".to_string()
                } else {
                    identities
                        .iter()
                        .map(|i| {
                            format!(
                                "{} ({} descriptors, enrolled {})",
                                i.name,
                                i.descriptor_count,
                                i.enrolled_at.format("%Y-%m-%d %H:%M")
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            ConsoleCommand::Mode => format!("Mode: {}", self.handle.mode().await?),
            ConsoleCommand::Help | ConsoleCommand::Quit => HELP.to_string(),
        };

        Ok(reply)
    }

    /// Process lines from `reader` until `quit`, end of input or
    /// cancellation.
    ///
    /// Returns the shutdown reason when the operator asked to quit.
    pub async fn run<R, W>(
        &self,
        reader: R,
        mut writer: W,
        cancel: CancellationToken,
    ) -> Option<ShutdownReason>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => return None,
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("Console input closed");
                    return None;
                }
                Err(e) => {
                    warn!("Failed to read console input: {}", e);
                    return None;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let reply = match line.parse::<ConsoleCommand>() {
                Ok(ConsoleCommand::Quit) => {
                    info!("Quit requested from console");
                    return Some(ShutdownReason::UserRequest);
                }
                Ok(command) => match self.execute(command).await {
                    Ok(reply) => reply,
                    Err(e) => format!("error: {}", e),
                },
                Err(e) => format!("error: {}", e),
            };

            if let Err(e) = writer.write_all(format!("{}\n", reply).as_bytes()).await {
                warn!("Failed to write console reply: {}", e);
                return None;
            }
            let _ = writer.flush().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{CaptureControllerBuilder, CaptureMode};
    use crate::identity::IdentityStore;
    use crate::oracle::{MockEmbeddingOracle, MockFrameSource};
    use crate::persistence::MemoryKeyValueStore;
    use std::sync::Arc;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!("realtime".parse(), Ok(ConsoleCommand::Realtime));
        assert_eq!("  SINGLE ".parse(), Ok(ConsoleCommand::Single));
        assert_eq!("stop".parse(), Ok(ConsoleCommand::Stop));
        assert_eq!("list".parse(), Ok(ConsoleCommand::List));
        assert_eq!("quit".parse(), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn test_parse_train() {
        assert_eq!(
            "train bob".parse(),
            Ok(ConsoleCommand::Train {
                name: "bob".to_string(),
                count: None
            })
        );
        assert_eq!(
            "train Jane Doe 5".parse(),
            Ok(ConsoleCommand::Train {
                name: "Jane Doe".to_string(),
                count: Some(5)
            })
        );
        // A lone number is a name
        assert_eq!(
            "train 42".parse(),
            Ok(ConsoleCommand::Train {
                name: "42".to_string(),
                count: None
            })
        );
        assert_eq!(
            "train".parse::<ConsoleCommand>(),
            Err(ConsoleError::Usage("train <name> [count]"))
        );
    }

    #[test]
    fn test_parse_maintenance() {
        assert_eq!(
            "rename alice alicia".parse(),
            Ok(ConsoleCommand::Rename {
                old_name: "alice".to_string(),
                new_name: "alicia".to_string()
            })
        );
        assert!("rename alice".parse::<ConsoleCommand>().is_err());
        assert_eq!(
            "rename Unknown #1 -> Carol Smith".parse(),
            Ok(ConsoleCommand::Rename {
                old_name: "Unknown #1".to_string(),
                new_name: "Carol Smith".to_string()
            })
        );
        assert_eq!(
            "rename Unknown #1 -> carol".parse(),
            Ok(ConsoleCommand::Rename {
                old_name: "Unknown #1".to_string(),
                new_name: "carol".to_string()
            })
        );
        assert!("rename Unknown #1 carol".parse::<ConsoleCommand>().is_err());
        assert!("rename Unknown #1 ->".parse::<ConsoleCommand>().is_err());
        assert_eq!(
            "delete Unknown #3".parse(),
            Ok(ConsoleCommand::Delete {
                name: "Unknown #3".to_string()
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "dance".parse::<ConsoleCommand>(),
            Err(ConsoleError::Unknown("dance".to_string()))
        );
        assert!("stop now".parse::<ConsoleCommand>().is_err());
    }

    #[tokio::test]
    async fn test_console_session() {
        let mut controller = CaptureControllerBuilder::new()
            .store(IdentityStore::new(Arc::new(MemoryKeyValueStore::new())))
            .oracle(Arc::new(MockEmbeddingOracle::new()))
            .frame_source(Arc::new(MockFrameSource::default()))
            .build()
            .unwrap();
        controller.warm_up().await.unwrap();

        let (handle, commands) = ControllerHandle::channel(8);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { controller.run(commands, token).await });

        let console = OperatorConsole::new(handle.clone(), 3);
        let input: &[u8] = b"list\n\ntrain\nmode\nrename a b\nquit\nrealtime\n";
        let mut output = Vec::new();

        let reason = console.run(input, &mut output, cancel.clone()).await;
        assert_eq!(reason, Some(ShutdownReason::UserRequest));

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "No identities stored");
        assert_eq!(lines[1], "error: Usage: train <name> [count]");
        assert_eq!(lines[2], "Mode: idle");
        assert!(lines[3].starts_with("error: Identity store error"));
        assert_eq!(lines.len(), 4);

        // Nothing after quit was executed
        assert_eq!(handle.mode().await.unwrap(), CaptureMode::Idle);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_console_uses_default_sample_count() {
        let oracle = MockEmbeddingOracle::new().gated();
        let mut controller = CaptureControllerBuilder::new()
            .store(IdentityStore::new(Arc::new(MemoryKeyValueStore::new())))
            .oracle(Arc::new(oracle.clone()))
            .frame_source(Arc::new(MockFrameSource::default()))
            .build()
            .unwrap();
        oracle.release(1);
        controller.warm_up().await.unwrap();

        let (handle, commands) = ControllerHandle::channel(8);
        let console = OperatorConsole::new(handle, 4);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            controller.run(commands, token).await.unwrap();
            controller
        });

        let reply = console
            .execute(ConsoleCommand::Train {
                name: "bob".to_string(),
                count: None,
            })
            .await
            .unwrap();
        assert_eq!(reply, "Enrolling 'bob' from 4 samples");

        cancel.cancel();
        let controller = task.await.unwrap();
        assert_eq!(controller.mode(), CaptureMode::Enroll);
        assert_eq!(controller.enrollment().target(), 4);
    }
}
