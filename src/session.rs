// ===============================
// src/session.rs
// ===============================
//
// Exchange session over one byte stream (TCP in production, duplex in tests):
// - hello is written right after the stream is attached
// - next_event : read one full line (optional timeout), decode it;
//                bad UTF-8 and a line cut off by EOF are malformed frames
// - send       : encode + write_all + flush, one frame per call
//
use std::time::Duration;
use tokio::{
    io::{split, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf},
    net::TcpStream,
    time::timeout,
};
use tracing::{debug, info};

use crate::codec::{self, Message};
use crate::config::Endpoint;
use crate::domain::Command;
use crate::error::{CodecError, SessionError};

pub struct ExchangeSession<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    read_timeout: Option<Duration>,
    line: Vec<u8>,
}

impl ExchangeSession<TcpStream> {
    /// Connect to `endpoint`, then send hello for `team`.
    pub async fn connect(
        endpoint: &Endpoint,
        team: &str,
        io_timeout: Option<Duration>,
    ) -> Result<Self, SessionError> {
        let addr = (endpoint.host.as_str(), endpoint.port);
        info!(host = %endpoint.host, port = endpoint.port, "connecting to exchange");

        let stream = match io_timeout {
            Some(t) => timeout(t, TcpStream::connect(addr))
                .await
                .map_err(|_| SessionError::ConnectionFailed(format!("connect timed out after {t:?}")))?,
            None => TcpStream::connect(addr).await,
        }
        .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;

        let _ = stream.set_nodelay(true);
        Self::attach(stream, team, io_timeout).await
    }
}

impl<S> ExchangeSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub async fn attach(stream: S, team: &str, read_timeout: Option<Duration>) -> Result<Self, SessionError> {
        let (r, w) = split(stream);
        let mut session = Self {
            reader: BufReader::new(r),
            writer: w,
            read_timeout,
            line: Vec::with_capacity(512),
        };
        session.send(&Message::hello(team)).await?;
        Ok(session)
    }

    /// Blocks until one complete line is available and decodes it.
    pub async fn next_event(&mut self) -> Result<Message, SessionError> {
        self.line.clear();
        let read = self.reader.read_until(b'\n', &mut self.line);
        let n = match self.read_timeout {
            Some(t) => timeout(t, read).await.map_err(|_| SessionError::ReadTimeout(t))?,
            None => read.await,
        }
        .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;

        if n == 0 {
            return Err(SessionError::ConnectionFailed("connection closed by exchange".into()));
        }
        if self.line.last() != Some(&b'\n') {
            return Err(CodecError::MalformedFrame(format!("stream ended mid-frame after {n} bytes")).into());
        }
        let text = std::str::from_utf8(&self.line)
            .map_err(|e| CodecError::MalformedFrame(format!("frame is not valid UTF-8: {e}")))?;
        Ok(codec::decode(text)?)
    }

    pub async fn send(&mut self, msg: &Message) -> Result<(), SessionError> {
        let frame = codec::encode(msg)?;
        self.writer.write_all(&frame).await.map_err(SessionError::Write)?;
        self.writer.flush().await.map_err(SessionError::Write)?;
        debug!(kind = msg.kind(), "frame sent");
        Ok(())
    }

    pub async fn send_command(&mut self, cmd: &Command) -> Result<(), SessionError> {
        self.send(&Message::from(cmd.clone())).await
    }
}
