// src/exec/stream.rs

//! Push-to-pull adaptation of the process stdout.
//!
//! A reader task pushes chunks into a bounded channel; the consumer pulls
//! them one at a time. When the channel is full the reader simply waits, so
//! the process is backpressured through its pipe instead of losing output.
//!
//! - [`ChunkStream`] yields raw byte chunks.
//! - [`LineSplitter`] turns chunks into lines independently of how the bytes
//!   were fragmented.
//! - [`LineStream`] combines the two.

use std::fmt;
use std::io;

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::exec::process::{KillSwitch, OutputPipe};

const READ_BUF_SIZE: usize = 8 * 1024;

/// Default capacity of the chunk channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// One line of process output, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Zero-based position in the run's output.
    pub index: u64,
    pub text: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Pull-based sequence of stdout chunks.
pub struct ChunkStream {
    rx: Option<mpsc::Receiver<io::Result<Vec<u8>>>>,
    reader: Option<JoinHandle<()>>,
    kill: Option<KillSwitch>,
    finished: bool,
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl ChunkStream {
    /// Start pumping `pipe` into a channel of `capacity` chunks.
    ///
    /// `kill` is fired on [`cancel`](Self::cancel); pass `None` when there is
    /// no process behind the pipe.
    pub fn spawn(pipe: OutputPipe, capacity: usize, kill: Option<KillSwitch>) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let reader = tokio::spawn(pump(pipe, tx));

        Self {
            rx: Some(rx),
            reader: Some(reader),
            kill,
            finished: false,
        }
    }

    /// Next chunk, `Some(Err)` once on a read failure, then `None` forever.
    pub async fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
        if self.finished {
            return None;
        }

        let next = match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        };

        match next {
            Some(Ok(chunk)) => Some(Ok(chunk)),
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(e))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stop pulling and terminate the producer.
    ///
    /// Already delivered chunks stay delivered; the stream yields nothing
    /// afterwards.
    pub fn cancel(&mut self) {
        self.finished = true;

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut rx) = self.rx.take() {
            rx.close();
        }
        if let Some(kill) = self.kill.as_mut() {
            if !kill.fire() {
                debug!("process already gone when cancelling stream");
            }
        }
    }

    /// Hand the kill switch to the caller, e.g. to kill after a stream error.
    pub fn take_kill_switch(&mut self) -> Option<KillSwitch> {
        self.kill.take()
    }
}

async fn pump(mut pipe: OutputPipe, tx: mpsc::Sender<io::Result<Vec<u8>>>) {
    let mut buf = vec![0u8; READ_BUF_SIZE];

    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => {
                trace!("stdout reached end of data");
                break;
            }
            Ok(n) => {
                if tx.send(Ok(buf[..n].to_vec())).await.is_err() {
                    debug!("chunk consumer went away; stopping stdout reader");
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
}

/// Incremental byte-to-line splitter.
///
/// Lines end at LF; a CR right before the LF is dropped. Any trailing
/// partial line stays buffered until more bytes arrive or [`finish`] flushes
/// it. Decoding happens per complete line, so a multi-byte character split
/// across chunks is reassembled before it is decoded.
///
/// [`finish`]: LineSplitter::finish
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
    /// Bytes of `buf` already known to contain no LF.
    scanned: usize,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and append every completed line to `out`.
    pub fn push(&mut self, chunk: &[u8], out: &mut Vec<String>) {
        self.buf.extend_from_slice(chunk);

        let mut start = 0;
        let mut from = self.scanned;
        while let Some(pos) = self.buf[from..].iter().position(|&b| b == b'\n') {
            let end = from + pos;
            out.push(decode_line(&self.buf[start..end]));
            start = end + 1;
            from = start;
        }

        if start > 0 {
            self.buf.drain(..start);
        }
        self.scanned = self.buf.len();
    }

    /// Flush the final partial line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buf);
        let line = decode_line(&rest);
        if line.is_empty() { None } else { Some(line) }
    }

    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Split an entire byte sequence at once. Same result as feeding it through
/// a [`LineSplitter`] in any fragmentation.
pub fn split_lines(bytes: &[u8]) -> Vec<String> {
    let mut splitter = LineSplitter::new();
    let mut out = Vec::new();
    splitter.push(bytes, &mut out);
    out.extend(splitter.finish());
    out
}

/// Pull-based, ordered sequence of [`LogLine`]s.
#[derive(Debug)]
pub struct LineStream {
    chunks: ChunkStream,
    splitter: LineSplitter,
    ready: std::collections::VecDeque<String>,
    next_index: u64,
    done: bool,
}

impl LineStream {
    pub fn new(chunks: ChunkStream) -> Self {
        Self {
            chunks,
            splitter: LineSplitter::new(),
            ready: std::collections::VecDeque::new(),
            next_index: 0,
            done: false,
        }
    }

    /// Next line, `Some(Err)` once on a read failure, `None` at end-of-data.
    ///
    /// The final unterminated line is delivered before `None`.
    pub async fn next_line(&mut self) -> Option<io::Result<LogLine>> {
        loop {
            if let Some(text) = self.ready.pop_front() {
                let index = self.next_index;
                self.next_index += 1;
                return Some(Ok(LogLine { index, text }));
            }

            if self.done {
                return None;
            }

            match self.chunks.next_chunk().await {
                Some(Ok(chunk)) => {
                    let mut lines = Vec::new();
                    self.splitter.push(&chunk, &mut lines);
                    self.ready.extend(lines);
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    if let Some(last) = self.splitter.finish() {
                        self.ready.push_back(last);
                    }
                }
            }
        }
    }

    /// Cancel the underlying chunk stream; no further lines are produced.
    pub fn cancel(&mut self) {
        self.done = true;
        self.ready.clear();
        self.chunks.cancel();
    }

    pub fn take_kill_switch(&mut self) -> Option<KillSwitch> {
        self.chunks.take_kill_switch()
    }

    /// Number of lines handed out so far.
    pub fn delivered(&self) -> u64 {
        self.next_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(chunks: &[&[u8]]) -> Vec<String> {
        let mut splitter = LineSplitter::new();
        let mut out = Vec::new();
        for c in chunks {
            splitter.push(c, &mut out);
        }
        out.extend(splitter.finish());
        out
    }

    #[test]
    fn splits_on_lf_and_crlf() {
        assert_eq!(feed(&[b"a\r\nb\nc".as_slice()]), vec!["a", "b", "c"]);
    }

    #[test]
    fn keeps_partial_line_until_more_bytes_arrive() {
        let mut splitter = LineSplitter::new();
        let mut out = Vec::new();

        splitter.push(b"New Fi", &mut out);
        assert!(out.is_empty());
        assert_eq!(splitter.pending_len(), 6);

        splitter.push(b"le\r", &mut out);
        assert!(out.is_empty());

        splitter.push(b"\n50%", &mut out);
        assert_eq!(out, vec!["New File"]);
        assert_eq!(splitter.finish().as_deref(), Some("50%"));
    }

    #[test]
    fn multibyte_character_split_across_chunks_survives() {
        let text = "Größe\n";
        let bytes = text.as_bytes();
        // Split in the middle of the two-byte 'ö'.
        let (a, b) = bytes.split_at(3);
        assert_eq!(feed(&[a, b]), vec!["Größe"]);
    }

    #[test]
    fn long_line_fed_byte_by_byte_only_scans_new_bytes() {
        let mut splitter = LineSplitter::new();
        let mut out = Vec::new();

        for _ in 0..10_000 {
            splitter.push(b"x", &mut out);
        }
        assert!(out.is_empty());
        assert_eq!(splitter.scanned, 10_000);

        splitter.push(b"\r\nrest", &mut out);
        assert_eq!(out, vec!["x".repeat(10_000)]);
        assert_eq!(splitter.pending_len(), 4);
        assert_eq!(splitter.scanned, 4);
        assert_eq!(splitter.finish().as_deref(), Some("rest"));
        assert_eq!(splitter.scanned, 0);
    }

    #[test]
    fn empty_lines_are_kept_but_empty_tail_is_not_flushed() {
        assert_eq!(feed(&[b"\n\nx\n".as_slice()]), vec!["", "", "x"]);
        assert_eq!(feed(&[b"".as_slice()]), Vec::<String>::new());
    }

    #[tokio::test]
    async fn line_stream_delivers_in_order_and_ends_once() {
        let (mut writer, reader) = tokio::io::duplex(16);
        let chunks = ChunkStream::spawn(Box::new(reader), 2, None);
        let mut lines = LineStream::new(chunks);

        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            writer.write_all(b"one\ntwo\nthr").await.unwrap();
            writer.write_all(b"ee").await.unwrap();
        });

        let mut got = Vec::new();
        while let Some(line) = lines.next_line().await {
            let line = line.unwrap();
            assert_eq!(line.index, got.len() as u64);
            got.push(line.text);
        }

        assert_eq!(got, vec!["one", "two", "three"]);
        assert!(lines.next_line().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_chunk_stream_yields_nothing() {
        let (_writer, reader) = tokio::io::duplex(16);
        let mut chunks = ChunkStream::spawn(Box::new(reader), 1, None);
        chunks.cancel();
        assert!(chunks.next_chunk().await.is_none());
        assert!(chunks.is_finished());
    }
}
