//! Student input.
//!
//! The tutor only needs text and how long the student took to produce it.
//! [`LineTranscriber`] reads typed lines; a speech backend would implement
//! [`Transcriber`] the same way.

use anyhow::Result;
use async_trait::async_trait;
use std::io::{BufRead, BufReader};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utterance {
    Speech { text: String, elapsed: Duration },
    /// Input arrived but contained nothing.
    NoSpeech,
    /// The input source is exhausted or the student asked to stop.
    Closed,
}

#[async_trait]
pub trait Transcriber: Send {
    /// Waits for the student's next utterance.
    async fn listen(&mut self) -> Result<Utterance>;
}

const STOP_WORDS: &[&str] = &["quit", "exit", "/quit", "/exit"];

/// Lines queued ahead of the tutor before the reader thread blocks.
const LINE_BUFFER: usize = 16;

/// Reads lines forwarded from a reader thread.
///
/// Blocking reads live on their own OS thread, so dropping a pending
/// [`Transcriber::listen`] (on Ctrl+C, for instance) never leaves the runtime
/// waiting on the terminal.
pub struct LineTranscriber {
    lines: mpsc::Receiver<String>,
}

impl LineTranscriber {
    pub fn new(lines: mpsc::Receiver<String>) -> Self {
        Self { lines }
    }

    /// Spawns a detached thread that forwards every line of `reader`.
    pub fn spawn_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        std::thread::spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            debug!("Transcriber dropped; reader thread exiting");
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read input line");
                        return;
                    }
                }
            }
        });
        Self::new(rx)
    }

    pub fn stdin() -> Self {
        Self::spawn_reader(BufReader::new(std::io::stdin()))
    }
}

#[async_trait]
impl Transcriber for LineTranscriber {
    async fn listen(&mut self) -> Result<Utterance> {
        let started = Instant::now();
        let Some(line) = self.lines.recv().await else {
            return Ok(Utterance::Closed);
        };
        let text = line.trim();
        if text.is_empty() {
            return Ok(Utterance::NoSpeech);
        }
        if STOP_WORDS.iter().any(|w| text.eq_ignore_ascii_case(w)) {
            return Ok(Utterance::Closed);
        }
        Ok(Utterance::Speech {
            text: text.to_string(),
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[tokio::test]
    async fn test_line_transcriber() {
        let input = Cursor::new(b"It returns zero\n   \nQUIT\nnever read\n".to_vec());
        let mut transcriber = LineTranscriber::spawn_reader(input);

        match transcriber.listen().await.unwrap() {
            Utterance::Speech { text, .. } => assert_eq!(text, "It returns zero"),
            other => panic!("expected speech, got {other:?}"),
        }
        assert_eq!(transcriber.listen().await.unwrap(), Utterance::NoSpeech);
        assert_eq!(transcriber.listen().await.unwrap(), Utterance::Closed);
    }

    #[tokio::test]
    async fn test_end_of_input_closes() {
        let mut transcriber = LineTranscriber::spawn_reader(Cursor::new(Vec::new()));
        assert_eq!(transcriber.listen().await.unwrap(), Utterance::Closed);
    }

    /// Blocks until its sender goes away, like a terminal nobody types into.
    struct Stalled(std::sync::mpsc::Receiver<()>);

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn test_runtime_shuts_down_while_reader_is_blocked() {
        let (_keep_open, stalled) = std::sync::mpsc::channel::<()>();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let waited = runtime.block_on(async {
            let mut transcriber = LineTranscriber::spawn_reader(BufReader::new(Stalled(stalled)));
            tokio::time::timeout(Duration::from_millis(20), transcriber.listen()).await
        });
        assert!(waited.is_err());
        // Dropping the runtime waits on its own blocking pool, never on this reader.
        drop(runtime);
    }

    #[tokio::test]
    async fn test_reader_thread_stops_when_transcriber_is_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(LineTranscriber::new(rx));
        assert!(tx.is_closed());
    }
}
