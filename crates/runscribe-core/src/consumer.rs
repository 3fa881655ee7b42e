use tokio::sync::{mpsc, watch};

/// What a transcript consumer is shown after each processed event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Answer accumulated so far.
    pub answer: String,
    /// Log ring snapshot, oldest line first.
    pub log: String,
}

/// Receiver of live transcript updates (a UI layer, a terminal printer).
///
/// The same transcript may be pushed repeatedly; consumers render the latest
/// value and must not assume they see every intermediate state.
pub trait TranscriptConsumer: Send + Sync {
    fn push(&self, transcript: &Transcript);
}

/// Discards every update.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopConsumer;

impl TranscriptConsumer for NoopConsumer {
    fn push(&self, _transcript: &Transcript) {}
}

/// Latest-value channel: receivers always observe the newest transcript.
impl TranscriptConsumer for watch::Sender<Transcript> {
    fn push(&self, transcript: &Transcript) {
        self.send_replace(transcript.clone());
    }
}

/// Every update, in order; a closed receiver is ignored.
impl TranscriptConsumer for mpsc::UnboundedSender<Transcript> {
    fn push(&self, transcript: &Transcript) {
        let _ = self.send(transcript.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_consumer_keeps_latest_value_without_receivers() {
        let (tx, rx) = watch::channel(Transcript::default());
        drop(rx);
        tx.push(&Transcript {
            answer: "a".into(),
            log: String::new(),
        });
        tx.push(&Transcript {
            answer: "ab".into(),
            log: "[tool_called]".into(),
        });
        assert_eq!(tx.borrow().answer, "ab");
    }

    #[test]
    fn unbounded_consumer_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.push(&Transcript::default());
    }
}
