use std::io;

use tokio::io::{AsyncWrite as Write, AsyncWriteExt};

/// How much of a `CRLF .` sequence has been seen at the end of the data written so far
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
enum LineState {
    /// In the middle of a line
    Text,
    /// After a CR
    Cr,
    /// At the start of a line
    #[default]
    LineStart,
}

/// The codec used for transparency (RFC 5321, section 4.5.2)
#[derive(Default, Clone, Copy, Debug)]
pub struct ClientCodec {
    state: LineState,
}

impl ClientCodec {
    /// Creates a new client codec
    pub fn new() -> Self {
        ClientCodec::default()
    }

    /// Writes `frame`, doubling every dot found at the start of a line
    pub async fn encode<W: Write + Unpin>(&mut self, frame: &[u8], buf: &mut W) -> io::Result<()> {
        let mut start = 0;
        for (idx, byte) in frame.iter().enumerate() {
            self.state = match (self.state, *byte) {
                (LineState::LineStart, b'.') => {
                    buf.write_all(&frame[start..idx]).await?;
                    buf.write_all(b".").await?;
                    start = idx;
                    LineState::Text
                }
                (LineState::Cr, b'\n') => LineState::LineStart,
                (_, b'\r') => LineState::Cr,
                _ => LineState::Text,
            };
        }
        buf.write_all(&frame[start..]).await
    }

    /// Terminates the data, completing the current line first if needed
    pub async fn finish<W: Write + Unpin>(&mut self, buf: &mut W) -> io::Result<()> {
        match self.state {
            LineState::Text => buf.write_all(b"\r\n.\r\n").await?,
            LineState::Cr => buf.write_all(b"\n.\r\n").await?,
            LineState::LineStart => buf.write_all(b".\r\n").await?,
        }
        self.state = LineState::Text;
        Ok(())
    }
}
