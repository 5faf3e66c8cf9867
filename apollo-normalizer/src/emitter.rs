//! Ordered delivery of chunks to their consumer.

use tokio::sync::mpsc::Sender;

use crate::chunk::Chunk;
use crate::error::NormalizeError;

/// A consumer of chunks, fed in emission order.
///
/// Returning an error stops the run: no further chunk is produced.
pub trait ChunkSink {
    fn accept(&mut self, chunk: Chunk) -> Result<(), NormalizeError>;
}

impl ChunkSink for Vec<Chunk> {
    fn accept(&mut self, chunk: Chunk) -> Result<(), NormalizeError> {
        self.push(chunk);
        Ok(())
    }
}

impl<S: ChunkSink + ?Sized> ChunkSink for &mut S {
    fn accept(&mut self, chunk: Chunk) -> Result<(), NormalizeError> {
        (**self).accept(chunk)
    }
}

/// Sends chunks through a bounded channel, blocking while it is full.
///
/// Must be driven from outside of the async runtime, for example from
/// `tokio::task::spawn_blocking`.
pub(crate) struct ChannelSink {
    sender: Sender<Result<Chunk, NormalizeError>>,
}

impl ChannelSink {
    pub(crate) fn new(sender: Sender<Result<Chunk, NormalizeError>>) -> Self {
        Self { sender }
    }

    /// Deliver the failure of the run as the last item of the channel.
    pub(crate) fn fail(self, error: NormalizeError) {
        // the receiver may already be gone, then nobody is left to tell
        let _ = self.sender.blocking_send(Err(error));
    }
}

impl ChunkSink for ChannelSink {
    fn accept(&mut self, chunk: Chunk) -> Result<(), NormalizeError> {
        self.sender
            .blocking_send(Ok(chunk))
            .map_err(|_| NormalizeError::Sink {
                reason: "the chunk stream was dropped".to_string(),
            })
    }
}

/// Writes every chunk as one line of JSON.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: std::io::Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: std::io::Write> ChunkSink for JsonLinesSink<W> {
    fn accept(&mut self, chunk: Chunk) -> Result<(), NormalizeError> {
        let complete = chunk.is_complete();
        serde_json::to_writer(&mut self.writer, &chunk)
            .map_err(|e| NormalizeError::Sink {
                reason: e.to_string(),
            })
            .and_then(|()| {
                self.writer.write_all(b"\n").map_err(|e| NormalizeError::Sink {
                    reason: e.to_string(),
                })
            })?;
        if complete {
            self.writer.flush().map_err(|e| NormalizeError::Sink {
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Owns the output of a run: forwards queued chunks to the sink in call order
/// and closes the run with exactly one [`Chunk::Complete`].
pub(crate) struct Emitter<S> {
    sink: S,
    records: usize,
    extends: usize,
}

impl<S: ChunkSink> Emitter<S> {
    pub(crate) fn new(sink: S) -> Self {
        Self {
            sink,
            records: 0,
            extends: 0,
        }
    }

    pub(crate) fn queue(&mut self, chunk: Chunk) -> Result<(), NormalizeError> {
        match &chunk {
            Chunk::Record { .. } => self.records += 1,
            Chunk::Extend { .. } => self.extends += 1,
            Chunk::Complete => {
                debug_assert!(false, "the terminal chunk is only queued by `complete`");
                return Ok(());
            }
        }
        self.sink.accept(chunk)
    }

    pub(crate) fn records(&self) -> usize {
        self.records
    }

    pub(crate) fn extends(&self) -> usize {
        self.extends
    }

    /// Terminate the run.
    pub(crate) fn complete(mut self) -> Result<S, NormalizeError> {
        self.sink.accept(Chunk::Complete)?;
        Ok(self.sink)
    }
}
