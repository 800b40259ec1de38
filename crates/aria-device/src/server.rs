//! TCP server for the automation protocol. One task per connection; each
//! connection reads a line, dispatches it, and writes exactly one response line.

use std::net::SocketAddr;
use std::sync::Arc;

use aria_core::{AriaError, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::CommandDispatcher;
use crate::protocol::{self, RpcResponse};

/// Request lines longer than this are skipped and answered with an error.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

pub struct AutomationServer {
    listener: TcpListener,
    dispatcher: Arc<CommandDispatcher>,
    max_line_bytes: usize,
}

impl AutomationServer {
    /// Bind the listening socket. Port 0 picks a free port.
    pub async fn bind(addr: &str, dispatcher: Arc<CommandDispatcher>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            AriaError::Transport(format!("failed to bind automation server on {addr}: {e}"))
        })?;
        Ok(Self {
            listener,
            dispatcher,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        })
    }

    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max.max(1);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `cancel` fires.
    pub async fn serve(self, cancel: CancellationToken) -> Result<()> {
        let addr = self.local_addr()?;
        info!(%addr, "automation server listening");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(%addr, "automation server stopping");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "automation client connected");
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let cancel = cancel.clone();
                        let max_line = self.max_line_bytes;
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, dispatcher, max_line, cancel).await {
                                warn!(%peer, error = %e, "automation connection closed with error");
                            } else {
                                debug!(%peer, "automation client disconnected");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "automation accept error");
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }
        }
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    dispatcher: Arc<CommandDispatcher>,
    max_line: usize,
    cancel: CancellationToken,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = read_frame(&mut reader, &mut buf, max_line) => frame?,
        };

        let response = match frame {
            Frame::Eof => break,
            Frame::TooLong => {
                debug!(max_line, "request line too long");
                RpcResponse::err("parse error: line too long")
            }
            Frame::InvalidUtf8 => {
                debug!("request line is not UTF-8");
                RpcResponse::err("parse error: invalid UTF-8")
            }
            Frame::Line(line) if line.trim().is_empty() => continue,
            Frame::Line(line) => match protocol::decode_request(&line) {
                Ok(request) => dispatcher.dispatch(&request).await,
                Err(message) => {
                    debug!(error = %message, "undecodable request line");
                    RpcResponse::err(message)
                }
            },
        };

        let encoded = protocol::encode_line(&response)?;
        write_half.write_all(encoded.as_bytes()).await?;
        write_half.flush().await?;
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
enum Frame {
    Line(String),
    TooLong,
    InvalidUtf8,
    Eof,
}

/// Read up to the next `\n`. Bytes past `max_line` are dropped rather than
/// buffered, and the rest of that line is consumed so the next read starts
/// clean. A final line without a newline still counts.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, max_line: usize) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut overflow = false;

    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                (0, true)
            } else {
                let (used, done) = match available.iter().position(|b| *b == b'\n') {
                    Some(i) => (i + 1, true),
                    None => (available.len(), false),
                };
                let content = if done { &available[..used - 1] } else { &available[..used] };
                if !overflow {
                    if buf.len() + content.len() > max_line {
                        overflow = true;
                        buf.clear();
                    } else {
                        buf.extend_from_slice(content);
                    }
                }
                (used, done)
            }
        };

        if used == 0 {
            if buf.is_empty() && !overflow {
                return Ok(Frame::Eof);
            }
            break;
        }
        reader.consume(used);
        if done {
            break;
        }
    }

    if overflow {
        return Ok(Frame::TooLong);
    }
    match String::from_utf8(std::mem::take(buf)) {
        Ok(line) => Ok(Frame::Line(line)),
        Err(_) => Ok(Frame::InvalidUtf8),
    }
}
