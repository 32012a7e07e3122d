//! Stream relay: token stream in, ordered protocol events out.

use crate::llm::TokenStream;
use crate::session::events::{EventSink, OutboundEvent, SessionError};

/// Adapts a push token stream into the session's outbound sequence while
/// accumulating the full response text.
///
/// Contract: exactly one `start` before any token; zero or more `chunk`
/// events, each a non-empty fragment in arrival order; exactly one `end`
/// afterward. The concatenation of chunk contents equals the returned
/// accumulation exactly. If the transport fails mid-stream the channel
/// closes early and `end` is still emitted over the partial accumulation.
pub struct StreamRelay;

impl StreamRelay {
    /// Drain `tokens` into `sink`, returning the accumulated text.
    ///
    /// # Errors
    /// Returns an error only when the sink itself fails; upstream
    /// transport failures end the stream silently.
    pub async fn run<S: EventSink>(
        mut tokens: TokenStream,
        sink: &mut S,
    ) -> Result<String, SessionError> {
        sink.emit(OutboundEvent::Start).await?;

        let mut accumulated = String::new();
        while let Some(fragment) = tokens.recv().await {
            if fragment.is_empty() {
                continue;
            }
            sink.emit(OutboundEvent::Chunk {
                content: fragment.clone(),
            })
            .await?;
            accumulated.push_str(&fragment);
        }

        sink.emit(OutboundEvent::End).await?;
        Ok(accumulated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::events::CollectingSink;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_events_ordered_and_accumulated() {
        let (tx, rx) = mpsc::channel(8);
        for fragment in ["Hel", "lo", " world"] {
            tx.send(fragment.to_string()).await.unwrap();
        }
        drop(tx);

        let mut sink = CollectingSink::default();
        let accumulated = StreamRelay::run(rx, &mut sink).await.unwrap();

        assert_eq!(accumulated, "Hello world");
        assert_eq!(
            sink.events,
            vec![
                OutboundEvent::Start,
                OutboundEvent::Chunk {
                    content: "Hel".to_string()
                },
                OutboundEvent::Chunk {
                    content: "lo".to_string()
                },
                OutboundEvent::Chunk {
                    content: " world".to_string()
                },
                OutboundEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_fragments_are_skipped() {
        let (tx, rx) = mpsc::channel(8);
        for fragment in ["", "a", "", "b"] {
            tx.send(fragment.to_string()).await.unwrap();
        }
        drop(tx);

        let mut sink = CollectingSink::default();
        let accumulated = StreamRelay::run(rx, &mut sink).await.unwrap();

        assert_eq!(accumulated, "ab");
        let chunks = sink
            .events
            .iter()
            .filter(|e| matches!(e, OutboundEvent::Chunk { .. }))
            .count();
        assert_eq!(chunks, 2);
    }

    #[tokio::test]
    async fn test_empty_stream_still_brackets_with_start_end() {
        let (tx, rx) = mpsc::channel::<String>(1);
        drop(tx);

        let mut sink = CollectingSink::default();
        let accumulated = StreamRelay::run(rx, &mut sink).await.unwrap();

        assert!(accumulated.is_empty());
        assert_eq!(sink.events, vec![OutboundEvent::Start, OutboundEvent::End]);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_ends_with_partial() {
        // A transport failure shows up as the producer dropping the channel
        // after some fragments.
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            tx.send("partial ".to_string()).await.unwrap();
            tx.send("answer".to_string()).await.unwrap();
            // dropped here: stream terminates early
        });

        let mut sink = CollectingSink::default();
        let accumulated = StreamRelay::run(rx, &mut sink).await.unwrap();

        assert_eq!(accumulated, "partial answer");
        assert_eq!(sink.events.last(), Some(&OutboundEvent::End));
    }
}
