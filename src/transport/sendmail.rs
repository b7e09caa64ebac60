//! Local delivery agent transport.
//!
//! Pipes the formatted message into the sendmail binary with `-t` so the
//! agent reads recipients from the message headers. A missing binary is
//! reported as [`TransportError::AgentMissing`] so the pipeline can surface
//! it as its own user-facing error kind.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{format_message, Transport, TransportError};
use crate::envelope::Envelope;

pub struct SendmailTransport {
    path: PathBuf,
}

impl SendmailTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the agent binary
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Default for SendmailTransport {
    fn default() -> Self {
        Self::new("/usr/sbin/sendmail")
    }
}

#[async_trait]
impl Transport for SendmailTransport {
    fn name(&self) -> &'static str {
        "sendmail"
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let message = format_message(envelope);

        let mut child = Command::new(&self.path)
            .arg("-t")
            .arg("-i")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TransportError::AgentMissing(self.path.display().to_string())
                } else {
                    TransportError::Io(e)
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Rejected(format!(
                "agent exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        tracing::debug!(
            message_id = %envelope.message_id,
            to = %envelope.recipient_address,
            "message handed to local agent"
        );

        Ok(())
    }
}
