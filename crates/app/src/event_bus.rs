//! In-process event bus backed by a bounded tokio [`mpsc`] channel.
//!
//! Every producer holds a clone of the [`EventSender`]; the router owns the
//! single [`EventReceiver`]. Events from one producer arrive in the order
//! they were published. Across producers only arrival order holds.
//!
//! Events raised by the consumer itself while it handles an event (virtual
//! entities reacting to a routed write) go through a [`FeedbackSender`]
//! instead. That lane never waits: the consumer cannot make room in a full
//! buffer while it is blocked publishing into it. Feedback is delivered
//! before the next buffered event.

use tokio::sync::mpsc;

use nest_domain::error::NestError;
use nest_domain::event::DeviceEvent;

use crate::ports::EventPublisher;

/// Create a bus that buffers at most `capacity` events.
///
/// When the buffer is full, [`EventSender::publish`] waits until the
/// receiver catches up.
///
/// # Panics
///
/// Panics if `capacity` is zero.
#[must_use]
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    let (feedback_sender, feedback) = mpsc::unbounded_channel();
    (
        EventSender { sender },
        EventReceiver {
            receiver,
            feedback,
            feedback_sender,
        },
    )
}

/// Producer side of the bus. Cheap to clone; one clone per producer.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<DeviceEvent>,
}

impl EventSender {
    /// Whether the receiver has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl EventPublisher for EventSender {
    async fn publish(&self, event: DeviceEvent) -> Result<(), NestError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| NestError::SinkClosed)
    }
}

/// Publisher for events raised by the bus consumer itself.
///
/// Publishing never waits. Only the task that owns the [`EventReceiver`]
/// may publish here, from inside the handling of an event; the lane does
/// not keep the bus open and is not watched while the consumer waits.
#[derive(Debug, Clone)]
pub struct FeedbackSender {
    sender: mpsc::UnboundedSender<DeviceEvent>,
}

impl EventPublisher for FeedbackSender {
    async fn publish(&self, event: DeviceEvent) -> Result<(), NestError> {
        self.sender.send(event).map_err(|_| NestError::SinkClosed)
    }
}

/// Consumer side of the bus.
#[derive(Debug)]
pub struct EventReceiver {
    receiver: mpsc::Receiver<DeviceEvent>,
    feedback: mpsc::UnboundedReceiver<DeviceEvent>,
    feedback_sender: mpsc::UnboundedSender<DeviceEvent>,
}

impl EventReceiver {
    /// A publisher for events raised while handling an event from this
    /// receiver.
    #[must_use]
    pub fn feedback(&self) -> FeedbackSender {
        FeedbackSender {
            sender: self.feedback_sender.clone(),
        }
    }

    /// Wait for the next event, pending feedback first.
    ///
    /// Returns `None` once every [`EventSender`] has been dropped (or the
    /// bus was [closed](Self::close)) and both lanes are drained.
    pub async fn recv(&mut self) -> Option<DeviceEvent> {
        if let Ok(event) = self.feedback.try_recv() {
            return Some(event);
        }
        match self.receiver.recv().await {
            Some(event) => Some(event),
            None => self.feedback.try_recv().ok(),
        }
    }

    /// Refuse new events from [`EventSender`]s while keeping the buffered
    /// ones.
    ///
    /// Later [`recv`](Self::recv) calls drain the buffer, then return `None`
    /// even if senders are still alive. Feedback is still accepted so that
    /// writes routed while draining complete.
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Take the next event without waiting, pending feedback first.
    pub fn try_recv(&mut self) -> Option<DeviceEvent> {
        self.feedback
            .try_recv()
            .or_else(|_| self.receiver.try_recv())
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nest_domain::event::{DevicePayload, Message};

    fn changed(source: &str, message: Message) -> DeviceEvent {
        DevicePayload::new(source, message).into()
    }

    #[tokio::test]
    async fn should_deliver_event_to_receiver() {
        let (tx, mut rx) = channel(4);
        tx.publish(changed("di-1-01", Message::TurnOn)).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, changed("di-1-01", Message::TurnOn));
    }

    #[tokio::test]
    async fn should_preserve_order_of_a_single_producer() {
        let (tx, mut rx) = channel(8);
        let sequence = [Message::TurnOn, Message::TurnOff, Message::TurnOn];
        for message in sequence {
            tx.publish(changed("do-1-01", message)).await.unwrap();
        }

        for expected in sequence {
            assert_eq!(rx.recv().await.unwrap(), changed("do-1-01", expected));
        }
    }

    #[tokio::test]
    async fn should_fan_in_events_from_cloned_senders() {
        let (tx, mut rx) = channel(8);
        let other = tx.clone();
        tx.publish(changed("di-1-01", Message::TurnOn)).await.unwrap();
        other.publish(changed("di-1-02", Message::TurnOff)).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.source_id().as_str(), "di-1-01");
        assert_eq!(second.source_id().as_str(), "di-1-02");
    }

    #[tokio::test]
    async fn should_fail_publish_when_receiver_dropped() {
        let (tx, rx) = channel(4);
        drop(rx);
        assert!(tx.is_closed());
        let result = tx.publish(changed("di-1-01", Message::TurnOn)).await;
        assert!(matches!(result, Err(NestError::SinkClosed)));
    }

    #[tokio::test]
    async fn should_end_stream_when_all_senders_dropped() {
        let (tx, mut rx) = channel(4);
        tx.publish(changed("ro-1-01", Message::TurnOn)).await.unwrap();
        drop(tx);

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn should_drain_buffer_then_end_after_close() {
        let (tx, mut rx) = channel(4);
        tx.publish(changed("di-1-01", Message::TurnOn)).await.unwrap();

        rx.close();

        let result = tx.publish(changed("di-1-01", Message::TurnOff)).await;
        assert!(matches!(result, Err(NestError::SinkClosed)));
        assert_eq!(rx.recv().await, Some(changed("di-1-01", Message::TurnOn)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn should_accept_feedback_when_buffer_is_full() {
        let (tx, mut rx) = channel(1);
        let feedback = rx.feedback();
        tx.publish(changed("di-1-01", Message::TurnOn)).await.unwrap();

        let published = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            feedback.publish(changed("light.kitchen", Message::TurnOn)),
        )
        .await;

        assert!(matches!(published, Ok(Ok(()))));
        assert_eq!(rx.recv().await, Some(changed("light.kitchen", Message::TurnOn)));
        assert_eq!(rx.recv().await, Some(changed("di-1-01", Message::TurnOn)));
    }

    #[tokio::test]
    async fn should_end_stream_while_feedback_senders_are_alive() {
        let (tx, mut rx) = channel(4);
        let feedback = rx.feedback();
        feedback
            .publish(changed("button.hall", Message::TurnOn))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(rx.recv().await, Some(changed("button.hall", Message::TurnOn)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn should_wait_for_room_when_buffer_is_full() {
        let (tx, mut rx) = channel(1);
        tx.publish(changed("di-1-01", Message::TurnOn)).await.unwrap();

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            tx.publish(changed("di-1-01", Message::TurnOff)),
        )
        .await;
        assert!(blocked.is_err(), "publish should wait while the buffer is full");

        rx.recv().await.unwrap();
        tx.publish(changed("di-1-01", Message::TurnOff)).await.unwrap();
        assert_eq!(rx.try_recv(), Some(changed("di-1-01", Message::TurnOff)));
    }
}
