//! JSON-lines source
//!
//! One observation object per line, e.g. piped in by a line simulator:
//! `simulator | amos-engine` with `stream.stdin = true`.

use super::ObservationSource;
use crate::models::Observation;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tracing::warn;

pub struct JsonLinesSource<R> {
    name: String,
    reader: R,
    line_buffer: Vec<u8>,
    line_no: u64,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
            line_buffer: Vec::with_capacity(1024),
            line_no: 0,
        }
    }
}

impl JsonLinesSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new("stdin", BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> ObservationSource for JsonLinesSource<R> {
    async fn next_observation(&mut self) -> Result<Option<Observation>> {
        loop {
            self.line_buffer.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.line_buffer)
                .await
                .with_context(|| format!("Failed to read from {}", self.name))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = match std::str::from_utf8(&self.line_buffer) {
                Ok(line) => line.trim(),
                Err(e) => {
                    warn!(source = %self.name, line = self.line_no, error = %e, "Skipping line that is not valid UTF-8");
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Observation>(line) {
                Ok(mut observation) => {
                    if observation.observed_at.is_none() {
                        observation.observed_at = Some(chrono::Utc::now());
                    }
                    return Ok(Some(observation));
                }
                Err(e) => {
                    warn!(source = %self.name, line = self.line_no, error = %e, "Skipping malformed JSON line");
                }
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
