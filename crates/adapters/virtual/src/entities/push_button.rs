//! Push button: turns a momentary input into a latched toggle.

use std::sync::{Mutex, PoisonError};

use nest_app::ports::EventPublisher;
use nest_domain::error::NestError;
use nest_domain::event::{DevicePayload, Message};
use nest_domain::id::EntityId;

#[derive(Debug, Default, Clone, Copy)]
struct ButtonState {
    pressed: bool,
    latched: bool,
}

/// A button wired to a digital input.
///
/// The input going from off to on is a press; each press flips the latched
/// state and publishes it under the button's own id. Releases and repeated
/// presses without a release publish nothing.
#[derive(Debug)]
pub struct PushButton<P> {
    id: EntityId,
    publisher: P,
    state: Mutex<ButtonState>,
}

impl<P: EventPublisher> PushButton<P> {
    /// A released button whose latch starts off.
    pub fn new(id: impl Into<EntityId>, publisher: P) -> Self {
        Self {
            id: id.into(),
            publisher,
            state: Mutex::new(ButtonState::default()),
        }
    }

    #[must_use]
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Current latched state.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.lock_state().latched
    }

    /// Feed the button's input.
    ///
    /// Returns the published message when the input was a press.
    ///
    /// # Errors
    ///
    /// Returns [`NestError::SinkClosed`] if the latch flipped but the event
    /// could not be published.
    pub async fn input(&self, on: bool) -> Result<Option<Message>, NestError> {
        let toggled = {
            let mut state = self.lock_state();
            let press = on && !state.pressed;
            state.pressed = on;
            if press {
                state.latched = !state.latched;
                Some(state.latched)
            } else {
                None
            }
        };

        let Some(latched) = toggled else {
            return Ok(None);
        };

        let message = Message::from(latched);
        tracing::debug!(id = %self.id, %message, "button pressed");
        self.publisher
            .publish(DevicePayload::new(self.id.clone(), message).into())
            .await?;
        Ok(Some(message))
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ButtonState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nest_app::event_bus;
    use nest_domain::event::DeviceEvent;

    #[tokio::test]
    async fn should_toggle_on_first_press() {
        let (tx, mut rx) = event_bus::channel(4);
        let button = PushButton::new("button.hall", tx);

        let published = button.input(true).await.unwrap();

        assert_eq!(published, Some(Message::TurnOn));
        assert!(button.is_on());
        assert_eq!(
            rx.try_recv(),
            Some(DeviceEvent::from(DevicePayload::new("button.hall", Message::TurnOn)))
        );
    }

    #[tokio::test]
    async fn should_ignore_release() {
        let (tx, mut rx) = event_bus::channel(4);
        let button = PushButton::new("button.hall", tx);
        button.input(true).await.unwrap();
        rx.try_recv();

        let published = button.input(false).await.unwrap();

        assert_eq!(published, None);
        assert!(button.is_on());
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn should_ignore_repeated_press_without_release() {
        let (tx, _rx) = event_bus::channel(4);
        let button = PushButton::new("button.hall", tx);
        button.input(true).await.unwrap();

        assert_eq!(button.input(true).await.unwrap(), None);
        assert!(button.is_on());
    }

    #[tokio::test]
    async fn should_toggle_off_on_second_press() {
        let (tx, mut rx) = event_bus::channel(8);
        let button = PushButton::new("button.hall", tx);

        for on in [true, false, true] {
            button.input(on).await.unwrap();
        }

        assert!(!button.is_on());
        let messages: Vec<_> = std::iter::from_fn(|| rx.try_recv())
            .map(|event| match event {
                DeviceEvent::Changed(payload) => payload.message,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(messages, vec![Message::TurnOn, Message::TurnOff]);
    }

    #[tokio::test]
    async fn should_fail_when_sink_is_closed() {
        let (tx, rx) = event_bus::channel(4);
        drop(rx);
        let button = PushButton::new("button.hall", tx);

        let result = button.input(true).await;

        assert!(matches!(result, Err(NestError::SinkClosed)));
    }
}
