//! Ordered, bounded delivery of turn events.
//!
//! The producer side is an [`EventEmitter`] owned by the turn task; the
//! caller holds the `mpsc::Receiver`. The emitter stamps each event with a
//! gap-free sequence number and enforces the terminal rule: exactly one
//! `final_answer` or `failure`, and nothing after it. A full buffer blocks
//! the producer. A closed receiver cancels the turn as a disconnect.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cancel::{CancelReason, TurnCancellation};
use crate::stream_event::{StreamEvent, TurnEvent};

pub struct EventStreamer;

impl EventStreamer {
    /// Open a turn's event channel with room for `capacity` undelivered events.
    pub fn channel(
        turn_id: impl Into<String>,
        capacity: usize,
        cancel: TurnCancellation,
    ) -> (EventEmitter, mpsc::Receiver<TurnEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let emitter = EventEmitter {
            tx,
            turn_id: turn_id.into(),
            seq: AtomicU64::new(0),
            terminated: AtomicBool::new(false),
            cancel,
        };
        (emitter, rx)
    }
}

pub struct EventEmitter {
    tx: mpsc::Sender<TurnEvent>,
    turn_id: String,
    seq: AtomicU64,
    terminated: AtomicBool,
    cancel: TurnCancellation,
}

impl EventEmitter {
    pub fn turn_id(&self) -> &str {
        &self.turn_id
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Send a non-terminal event. Returns `false` if it was not delivered.
    ///
    /// Terminal events must go through [`finish`](Self::finish); passing
    /// one here is treated as `finish`.
    pub async fn emit(&self, event: StreamEvent) -> bool {
        if event.is_terminal() {
            return self.finish(event).await;
        }
        if self.is_terminated() {
            debug!(
                turn = %self.turn_id,
                event = event.event_type(),
                "Dropping event after terminal"
            );
            return false;
        }
        self.send(event).await
    }

    /// Send the terminal event. Only the first call has any effect.
    pub async fn finish(&self, event: StreamEvent) -> bool {
        debug_assert!(event.is_terminal());
        if self.terminated.swap(true, Ordering::SeqCst) {
            debug!(turn = %self.turn_id, event = event.event_type(), "Turn already terminated");
            return false;
        }
        self.send(event).await
    }

    async fn send(&self, event: StreamEvent) -> bool {
        let stamped = TurnEvent {
            turn_id: self.turn_id.clone(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            timestamp: Utc::now(),
            event,
        };
        if self.tx.send(stamped).await.is_err() {
            debug!(turn = %self.turn_id, "Event receiver closed");
            self.cancel.cancel(CancelReason::ClientDisconnected);
            return false;
        }
        true
    }

    /// Cancel the turn as soon as the receiver is dropped, even while the
    /// producer is idle. Abort the returned task when the turn ends.
    pub fn watch_disconnect(&self) -> JoinHandle<()> {
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tx.closed() => cancel.cancel(CancelReason::ClientDisconnected),
                _ = cancel.cancelled() => {}
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_event::FailureReason;

    fn answer(text: &str) -> StreamEvent {
        StreamEvent::FinalAnswer { content: text.into(), degraded: false }
    }

    #[tokio::test]
    async fn events_are_sequenced() {
        let (emitter, mut rx) = EventStreamer::channel("t1", 8, TurnCancellation::new());
        emitter.emit(StreamEvent::status("start")).await;
        emitter.emit(StreamEvent::Reasoning { content: "hmm".into() }).await;
        emitter.finish(answer("done")).await;
        drop(emitter);

        let mut seqs = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.turn_id, "t1");
            seqs.push(event.seq);
        }
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn nothing_after_terminal() {
        let (emitter, mut rx) = EventStreamer::channel("t1", 8, TurnCancellation::new());
        assert!(emitter.finish(answer("first")).await);
        assert!(!emitter.finish(answer("second")).await);
        assert!(!emitter.emit(StreamEvent::status("late")).await);
        let late_failure = StreamEvent::Failure {
            reason: FailureReason::Cancelled,
            message: "x".into(),
        };
        assert!(!emitter.emit(late_failure).await);
        drop(emitter);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, answer("first"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn closed_receiver_cancels_turn() {
        let cancel = TurnCancellation::new();
        let (emitter, rx) = EventStreamer::channel("t1", 8, cancel.clone());
        drop(rx);

        assert!(!emitter.emit(StreamEvent::status("anyone?")).await);
        assert_eq!(cancel.reason(), Some(CancelReason::ClientDisconnected));
    }

    #[tokio::test]
    async fn watcher_notices_disconnect_while_idle() {
        let cancel = TurnCancellation::new();
        let (emitter, rx) = EventStreamer::channel("t1", 8, cancel.clone());
        let watcher = emitter.watch_disconnect();
        drop(rx);

        cancel.cancelled().await;
        assert_eq!(cancel.reason(), Some(CancelReason::ClientDisconnected));
        watcher.await.unwrap();
    }

    #[tokio::test]
    async fn full_buffer_blocks_producer() {
        let (emitter, mut rx) = EventStreamer::channel("t1", 1, TurnCancellation::new());
        emitter.emit(StreamEvent::status("one")).await;

        let producer = tokio::spawn(async move {
            emitter.emit(StreamEvent::status("two")).await;
            emitter.finish(answer("done")).await
        });
        tokio::task::yield_now().await;
        assert!(!producer.is_finished());

        let mut types = Vec::new();
        while let Some(event) = rx.recv().await {
            types.push(event.event.event_type());
        }
        assert_eq!(types, vec!["status", "status", "final_answer"]);
        assert!(producer.await.unwrap());
    }
}
