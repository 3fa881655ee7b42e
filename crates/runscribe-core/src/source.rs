use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tokio::sync::{mpsc, oneshot};

use crate::errors::SourceError;
use crate::event::RunEvent;
use crate::payload::Payload;

/// Boxed stream of run events produced by the upstream runtime.
pub type RunEventStream =
    Pin<Box<dyn futures::Stream<Item = Result<RunEvent, SourceError>> + Send + 'static>>;

/// Complete result reported by the runtime after the event stream is exhausted.
#[derive(Clone, Debug, Default)]
pub struct FinalResult {
    /// Complete answer text, when the runtime reports one.
    pub final_output: Option<String>,
    /// Full result payload, traced as `raw` of the final answer record.
    pub payload: Option<Payload>,
}

/// Lazy, ordered, single-consumption source of run events.
///
/// Exhaustion of the stream signals completion. A final-result accessor can be
/// attached; it is consulted once, after exhaustion.
pub struct EventSource {
    stream: RunEventStream,
    final_rx: Option<oneshot::Receiver<FinalResult>>,
}

impl EventSource {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<RunEvent, SourceError>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
            final_rx: None,
        }
    }

    /// Source over an already-known sequence of events.
    pub fn from_events(events: impl IntoIterator<Item = RunEvent>) -> Self {
        let events: Vec<Result<RunEvent, SourceError>> = events.into_iter().map(Ok).collect();
        Self::from_stream(stream::iter(events))
    }

    /// Channel-fed source; the runtime pushes through the returned sender and
    /// completion is signalled by dropping it.
    pub fn channel(capacity: usize) -> (EventSender, EventSource) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        (EventSender { tx }, Self::from_stream(stream))
    }

    /// Attaches the final-result accessor.
    pub fn with_final_result(mut self, final_rx: oneshot::Receiver<FinalResult>) -> Self {
        self.final_rx = Some(final_rx);
        self
    }

    /// Next event, or `None` once the source is exhausted.
    pub async fn next_event(&mut self) -> Option<Result<RunEvent, SourceError>> {
        self.stream.next().await
    }

    /// Final result, if an accessor was attached and the runtime reported one.
    pub async fn final_result(&mut self) -> Option<FinalResult> {
        match self.final_rx.take() {
            Some(rx) => rx.await.ok(),
            None => None,
        }
    }
}

/// Sending half of [`EventSource::channel`].
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Result<RunEvent, SourceError>>,
}

impl EventSender {
    /// Sends one event; returns `false` once the consumer is gone.
    pub async fn send(&self, event: RunEvent) -> bool {
        self.tx.send(Ok(event)).await.is_ok()
    }

    /// Reports a source failure to the consumer.
    pub async fn fail(&self, error: SourceError) -> bool {
        self.tx.send(Err(error)).await.is_ok()
    }
}
