//! Lazy delivery of chunks to an async consumer.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::chunk::Chunk;
use crate::emitter::ChannelSink;
use crate::error::NormalizeError;
use crate::json_ext::Value;
use crate::normalizer::Normalizer;

/// Chunks of one run, in emission order.
///
/// A successful run ends with [`Chunk::Complete`]. A failed run ends with its
/// error instead, and the chunks received before it must be discarded.
pub type ChunkStream = ReceiverStream<Result<Chunk, NormalizeError>>;

impl Normalizer {
    /// Normalize a response on the blocking thread pool.
    ///
    /// Chunks are produced while the stream is consumed: the walk pauses once
    /// `stream_buffer` chunks are waiting, and stops when the stream is dropped.
    /// Must be called from within a Tokio runtime.
    pub fn stream(&self, response: Value) -> ChunkStream {
        self.spawn_stream(response).0
    }

    /// Like [`Normalizer::stream`], also returning the outcome of the producer.
    pub(crate) fn spawn_stream(
        &self,
        response: Value,
    ) -> (ChunkStream, JoinHandle<Result<(), NormalizeError>>) {
        let normalizer = self.clone();
        spawn_producer(self.configuration.stream_buffer, move |sink| {
            normalizer.normalize_into(&response, sink).map(|_| ())
        })
    }
}

/// Run `produce` on the blocking thread pool, feeding a bounded channel.
///
/// A producer that panics still ends the stream with an error item.
pub(crate) fn spawn_producer<F>(
    buffer: usize,
    produce: F,
) -> (ChunkStream, JoinHandle<Result<(), NormalizeError>>)
where
    F: FnOnce(&mut ChannelSink) -> Result<(), NormalizeError> + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(buffer);
    // keeps the channel open until the producer outcome is known
    let failures = sender.clone();
    let span = tracing::debug_span!("normalize_stream");

    let producer = tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        let mut sink = ChannelSink::new(sender);
        match produce(&mut sink) {
            Ok(()) => Ok(()),
            Err(error @ NormalizeError::Sink { .. }) => {
                tracing::debug!(%error, "chunk stream abandoned");
                Err(error)
            }
            Err(error) => {
                sink.fail(error.clone());
                Err(error)
            }
        }
    });

    let outcome = tokio::spawn(async move {
        match producer.await {
            Ok(result) => result,
            Err(join_error) => {
                let error = NormalizeError::Interrupted {
                    reason: join_error.to_string(),
                };
                tracing::error!(%error, "chunk producer did not finish");
                // the receiver may already be gone
                let _ = failures.send(Err(error.clone())).await;
                Err(error)
            }
        }
    });

    (ReceiverStream::new(receiver), outcome)
}

/// Collect a stream into the chunks of a successful run.
///
/// Fails with the error of the run, or with [`NormalizeError::Interrupted`]
/// when the stream ends without [`Chunk::Complete`].
pub async fn collect(mut stream: ChunkStream) -> Result<Vec<Chunk>, NormalizeError> {
    use tokio_stream::StreamExt;

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk?);
    }
    match chunks.last() {
        Some(chunk) if chunk.is_complete() => Ok(chunks),
        _ => Err(NormalizeError::Interrupted {
            reason: "the chunk stream ended before the run completed".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json_bytes::json;

    use super::*;
    use crate::configuration::Configuration;
    use crate::emitter::ChunkSink;
    use crate::shape::SelectionShape;

    fn normalizer(stream_buffer: usize) -> Normalizer {
        let shape: SelectionShape = serde_json::from_value(serde_json::json!({
            "selections": [{
                "kind": "LinkedField",
                "name": "friends",
                "plural": true,
                "selections": [{ "kind": "Scalar", "name": "name" }]
            }]
        }))
        .unwrap();
        Normalizer::builder()
            .shape(shape)
            .configuration(Configuration::builder().stream_buffer(stream_buffer).build())
            .build()
            .unwrap()
    }

    fn friend(i: usize) -> Value {
        json!({ "__typename": "User", "id": i.to_string(), "name": format!("friend {i}") })
    }

    fn friends(count: usize) -> Value {
        let friends: Vec<Value> = (0..count).map(friend).collect();
        json!({ "friends": friends })
    }

    #[tokio::test]
    async fn stream_matches_the_collected_run() {
        let normalizer = normalizer(2);
        let response = friends(10);

        let streamed = collect(normalizer.stream(response.clone())).await.unwrap();
        assert_eq!(streamed, normalizer.normalize(&response).unwrap());
        assert_eq!(streamed.len(), 12);
        assert!(streamed[11].is_complete());
    }

    #[tokio::test]
    async fn failure_is_the_last_item() {
        let normalizer = normalizer(1);
        let mut friends: Vec<Value> = (0..3).map(friend).collect();
        friends.push(json!("not an object"));
        let response = json!({ "friends": friends });

        let (stream, outcome) = normalizer.spawn_stream(response);
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 4);
        assert!(items[..3].iter().all(Result::is_ok));
        assert!(matches!(
            items[3],
            Err(NormalizeError::ExpectedObject { .. })
        ));
        assert!(matches!(
            outcome.await.unwrap(),
            Err(NormalizeError::ExpectedObject { .. })
        ));
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_the_producer() {
        let normalizer = normalizer(1);
        let (mut stream, outcome) = normalizer.spawn_stream(friends(1000));

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.handle().map(|handle| handle.index()), Some(0));
        drop(stream);

        assert!(matches!(
            outcome.await.unwrap(),
            Err(NormalizeError::Sink { .. })
        ));
    }

    #[tokio::test]
    async fn panicking_producer_ends_the_stream_with_an_error() {
        let first = normalizer(1).normalize(&friends(1)).unwrap().remove(0);
        let (stream, outcome) = spawn_producer(1, move |sink| {
            sink.accept(first)?;
            panic!("walker invariant violated");
        });

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(
            &items[1],
            Err(NormalizeError::Interrupted { reason }) if reason.contains("panicked")
        ));
        assert!(matches!(
            outcome.await.unwrap(),
            Err(NormalizeError::Interrupted { .. })
        ));
    }

    #[tokio::test]
    async fn collect_rejects_a_panicking_producer() {
        let (stream, _) = spawn_producer(1, |_| panic!("walker invariant violated"));
        assert!(matches!(
            collect(stream).await,
            Err(NormalizeError::Interrupted { .. })
        ));
    }

    #[tokio::test]
    async fn collect_rejects_a_stream_without_its_terminal_chunk() {
        let mut chunks = normalizer(1).normalize(&friends(2)).unwrap();
        assert!(chunks.pop().unwrap().is_complete());

        let (sender, receiver) = mpsc::channel(chunks.len());
        for chunk in chunks {
            sender.send(Ok(chunk)).await.unwrap();
        }
        drop(sender);

        let error = collect(ReceiverStream::new(receiver)).await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "normalization stopped before completing: the chunk stream ended before the run completed"
        );
    }

    #[tokio::test]
    async fn collect_rejects_an_empty_stream() {
        let (sender, receiver) = mpsc::channel(1);
        drop(sender);
        assert!(matches!(
            collect(ReceiverStream::new(receiver)).await,
            Err(NormalizeError::Interrupted { .. })
        ));
    }

    #[cfg(feature = "failfast")]
    #[tokio::test]
    async fn failfast_panic_is_reported_as_an_error() {
        // the second friend has no name, which trips failfast
        let response = json!({
            "friends": [friend(0), { "__typename": "User", "id": "1" }]
        });
        assert!(matches!(
            collect(normalizer(1).stream(response)).await,
            Err(NormalizeError::Interrupted { .. })
        ));
    }
}
