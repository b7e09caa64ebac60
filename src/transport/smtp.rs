//! Authenticated SMTP relay transport.
//!
//! A minimal client covering the commands a relay handoff needs: greeting,
//! EHLO, optional AUTH LOGIN, MAIL FROM, RCPT TO, DATA with dot-stuffing,
//! QUIT. Every server exchange is bounded by a timeout. Permanent (5xx)
//! rejections and other protocol failures are reported as distinct error
//! kinds so callers keep the original detail.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::{format_message, Transport, TransportError};
use crate::config::SmtpConfig;
use crate::envelope::Envelope;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SmtpRelayTransport {
    config: SmtpConfig,
}

impl SmtpRelayTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transport for SmtpRelayTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let stream = TcpStream::connect(&address).await.map_err(|e| {
            TransportError::Connection(format!("failed to connect to {address}: {e}"))
        })?;

        let mut conn = SmtpConnection::new(stream);

        let greeting = conn.read_reply().await?;
        if !greeting.is_positive() {
            return Err(reply_error("server rejected connection", &greeting));
        }

        let ehlo = conn.command("EHLO courier.local").await?;
        if !ehlo.is_positive() {
            return Err(reply_error("server rejected EHLO", &ehlo));
        }

        if let (Some(username), Some(password)) =
            (self.config.username.as_deref(), self.config.password.as_deref())
        {
            conn.authenticate(username, password).await?;
        }

        let mail = conn
            .command(&format!("MAIL FROM:<{}>", envelope.sender_address))
            .await?;
        if !mail.is_positive() {
            return Err(reply_error("server rejected MAIL FROM", &mail));
        }

        let rcpt = conn
            .command(&format!("RCPT TO:<{}>", envelope.recipient_address))
            .await?;
        if !rcpt.is_positive() {
            return Err(reply_error(
                &format!("server rejected recipient {}", envelope.recipient_address),
                &rcpt,
            ));
        }

        let data = conn.command("DATA").await?;
        if data.code != 354 {
            return Err(reply_error("server rejected DATA", &data));
        }

        conn.write_body(&format_message(envelope)).await?;
        let accepted = conn.read_reply().await?;
        if !accepted.is_positive() {
            return Err(reply_error("server rejected message data", &accepted));
        }

        // Delivery already succeeded; a failed QUIT is only worth a warning
        if let Err(e) = conn.command("QUIT").await {
            tracing::warn!(relay = %address, error = %e, "QUIT failed after successful delivery");
        }

        tracing::debug!(
            message_id = %envelope.message_id,
            relay = %address,
            to = %envelope.recipient_address,
            "message accepted by relay"
        );

        Ok(())
    }
}

/// One SMTP server reply, possibly multiline
#[derive(Debug)]
struct Reply {
    code: u16,
    message: String,
}

impl Reply {
    fn is_positive(&self) -> bool {
        (200..400).contains(&self.code)
    }
}

fn reply_error(context: &str, reply: &Reply) -> TransportError {
    let detail = format!("{context}: {} {}", reply.code, reply.message.trim());
    if (500..600).contains(&reply.code) {
        TransportError::Rejected(detail)
    } else {
        TransportError::Protocol(detail)
    }
}

struct SmtpConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl SmtpConnection {
    fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    /// Read a full reply, following `250-` continuation lines
    async fn read_reply(&mut self) -> Result<Reply, TransportError> {
        let mut code = 0u16;
        let mut message = String::new();

        loop {
            let mut line = String::new();
            let read = tokio::time::timeout(COMMAND_TIMEOUT, self.reader.read_line(&mut line))
                .await
                .map_err(|_| {
                    TransportError::Connection(format!(
                        "server reply timed out after {COMMAND_TIMEOUT:?}"
                    ))
                })??;

            if read == 0 {
                return Err(TransportError::Connection(
                    "connection closed by server".to_string(),
                ));
            }

            if line.len() < 4 {
                return Err(TransportError::Protocol(format!(
                    "malformed reply line: {line:?}"
                )));
            }

            code = line[..3].parse::<u16>().map_err(|_| {
                TransportError::Protocol(format!("malformed reply code: {line:?}"))
            })?;

            if !message.is_empty() {
                message.push('\n');
            }
            message.push_str(line[4..].trim_end());

            if line.as_bytes()[3] != b'-' {
                break;
            }
        }

        Ok(Reply { code, message })
    }

    /// Send one command line and read the reply
    async fn command(&mut self, line: &str) -> Result<Reply, TransportError> {
        tokio::time::timeout(COMMAND_TIMEOUT, async {
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.write_all(b"\r\n").await?;
            self.writer.flush().await
        })
        .await
        .map_err(|_| {
            TransportError::Connection(format!("command write timed out after {COMMAND_TIMEOUT:?}"))
        })??;

        self.read_reply().await
    }

    /// AUTH LOGIN exchange
    async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), TransportError> {
        let b64 = base64::engine::general_purpose::STANDARD;

        let challenge = self.command("AUTH LOGIN").await?;
        if challenge.code != 334 {
            return Err(reply_error("server rejected AUTH LOGIN", &challenge));
        }

        let challenge = self.command(&b64.encode(username)).await?;
        if challenge.code != 334 {
            return Err(reply_error("server rejected username", &challenge));
        }

        let accepted = self.command(&b64.encode(password)).await?;
        if accepted.code != 235 {
            return Err(reply_error("authentication refused", &accepted));
        }

        Ok(())
    }

    /// Send the message body with dot-stuffing and the terminating dot
    async fn write_body(&mut self, message: &str) -> Result<(), TransportError> {
        tokio::time::timeout(COMMAND_TIMEOUT, async {
            for line in message.lines() {
                if line.starts_with('.') {
                    self.writer.write_all(b".").await?;
                }
                self.writer.write_all(line.as_bytes()).await?;
                self.writer.write_all(b"\r\n").await?;
            }
            self.writer.write_all(b".\r\n").await?;
            self.writer.flush().await
        })
        .await
        .map_err(|_| {
            TransportError::Connection(format!("body write timed out after {COMMAND_TIMEOUT:?}"))
        })??;

        Ok(())
    }
}
