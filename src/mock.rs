//! Scripted in-memory connection
//!
//! Replies are queued up front; everything the client writes is kept in a
//! shared [`Transcript`] that stays readable after the stream has been moved
//! into a session.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead as Read, AsyncWrite as Write, ReadBuf};

use crate::delivery::Dialer;
use crate::error::Error;

pub type MockCursor = Cursor<Vec<u8>>;

/// Everything written to a [`MockStream`]
#[derive(Clone, Debug, Default)]
pub struct Transcript(Arc<Mutex<Vec<u8>>>);

impl Transcript {
    pub fn to_vec(&self) -> Vec<u8> {
        match self.0.lock() {
            Ok(written) => written.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.to_vec()).into_owned()
    }
}

#[derive(Clone, Debug)]
pub struct MockStream {
    reader: MockCursor,
    writer: Transcript,
}

impl MockStream {
    pub fn with_vec(vec: Vec<u8>) -> MockStream {
        MockStream {
            reader: MockCursor::new(vec),
            writer: Transcript::default(),
        }
    }

    /// Handle on what gets written, shared with this stream
    pub fn transcript(&self) -> Transcript {
        self.writer.clone()
    }
}

impl Read for MockStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}

impl Write for MockStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
        let mut written = self
            .writer
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "transcript poisoned"))?;
        written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Hands out queued [`MockStream`]s, one per dial; refuses once they run out.
#[derive(Debug)]
pub struct ScriptedDialer {
    streams: Mutex<VecDeque<MockStream>>,
    targets: Mutex<Vec<(String, u16)>>,
}

impl ScriptedDialer {
    pub fn new(streams: Vec<MockStream>) -> ScriptedDialer {
        ScriptedDialer {
            streams: Mutex::new(streams.into()),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Every `(host, port)` dialed so far
    pub fn targets(&self) -> Vec<(String, u16)> {
        match self.targets.lock() {
            Ok(targets) => targets.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn dials(&self) -> usize {
        self.targets().len()
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    type Stream = MockStream;

    async fn dial(&self, host: &str, port: u16) -> Result<MockStream, Error> {
        self.targets
            .lock()
            .map_err(|_| Error::Client("dialer poisoned"))?
            .push((host.to_string(), port));
        self.streams
            .lock()
            .map_err(|_| Error::Client("dialer poisoned"))?
            .pop_front()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused").into()
            })
    }
}
