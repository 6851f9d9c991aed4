//! Incremental decoding of line-delimited model streams
//!
//! Ollama streams NDJSON and Gemini streams SSE `data:` lines. Network chunks
//! do not respect line boundaries, so bytes are buffered until a full line is
//! available and only then handed to the backend-specific parser.

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;

use crate::error::{Error, Result};

/// Stream of text fragments produced by a generator
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Outcome of parsing one complete line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A text fragment to forward
    Token(String),
    /// Nothing to forward (keep-alive, metadata, empty delta)
    Skip,
    /// The backend signalled the end of generation
    Done,
}

/// Accumulates raw bytes and yields complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes, returning every line completed by them (without `\r\n`)
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\n', '\r']);
            if !text.trim().is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    /// Flush a trailing line that had no terminating newline
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

struct DecodeState<S, F> {
    bytes: Pin<Box<S>>,
    buffer: LineBuffer,
    pending: VecDeque<String>,
    parse: F,
    eof: bool,
    finished: bool,
}

/// Turn a byte stream into a token stream using a per-line parser
///
/// The stream ends on EOF, on [`LineEvent::Done`], or after the first error.
pub fn decode_lines<S, E, F>(bytes: S, parse: F) -> TokenStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(&str) -> Result<LineEvent> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        buffer: LineBuffer::new(),
        pending: VecDeque::new(),
        parse,
        eof: false,
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }

            if let Some(line) = st.pending.pop_front() {
                match (st.parse)(&line) {
                    Ok(LineEvent::Token(text)) => return Some((Ok(text), st)),
                    Ok(LineEvent::Skip) => continue,
                    Ok(LineEvent::Done) => return None,
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                }
            }

            if st.eof {
                return None;
            }

            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let lines = st.buffer.push(&chunk);
                    st.pending.extend(lines);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(Error::llm(format!("Stream error: {}", e))), st));
                }
                None => {
                    st.eof = true;
                    if let Some(line) = st.buffer.finish() {
                        st.pending.push_back(line);
                    }
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
        let owned: Vec<_> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        futures::stream::iter(owned)
    }

    fn plain(line: &str) -> Result<LineEvent> {
        match line {
            "END" => Ok(LineEvent::Done),
            "PING" => Ok(LineEvent::Skip),
            "BAD" => Err(Error::llm("bad line")),
            other => Ok(LineEvent::Token(other.to_string())),
        }
    }

    #[test]
    fn test_line_buffer_splits_across_pushes() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"hel").is_empty());
        assert_eq!(buffer.push(b"lo\r\nwor"), vec!["hello".to_string()]);
        assert_eq!(buffer.push(b"ld\n\n"), vec!["world".to_string()]);
        assert!(buffer.finish().is_none());

        buffer.push(b"tail");
        assert_eq!(buffer.finish(), Some("tail".to_string()));
    }

    #[tokio::test]
    async fn test_decode_reassembles_split_lines() {
        let stream = decode_lines(chunks(&["al", "pha\nbe", "ta\nPING\ngam", "ma"]), plain);
        let tokens: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(tokens, vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn test_decode_stops_at_done() {
        let stream = decode_lines(chunks(&["a\nEND\nb\n"]), plain);
        let tokens: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(tokens, vec!["a"]);
    }

    #[tokio::test]
    async fn test_decode_stops_after_error() {
        let stream = decode_lines(chunks(&["a\nBAD\nb\n"]), plain);
        let items: Vec<Result<String>> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
