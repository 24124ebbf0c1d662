//! Virtual light: an in-memory on/off output.

use std::sync::{Mutex, PoisonError};

use nest_app::ports::EventPublisher;
use nest_domain::error::NestError;
use nest_domain::event::{DevicePayload, Message};
use nest_domain::id::EntityId;

/// A simulated light that can be turned on and off.
///
/// Publishes its new state whenever it actually changes.
#[derive(Debug)]
pub struct VirtualLight<P> {
    id: EntityId,
    publisher: P,
    state: Mutex<bool>,
}

impl<P: EventPublisher> VirtualLight<P> {
    /// A light that starts off.
    pub fn new(id: impl Into<EntityId>, publisher: P) -> Self {
        Self {
            id: id.into(),
            publisher,
            state: Mutex::new(false),
        }
    }

    #[must_use]
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch the light. Returns whether the state changed.
    ///
    /// # Errors
    ///
    /// Returns [`NestError::SinkClosed`] if the change could not be
    /// published.
    pub async fn set(&self, on: bool) -> Result<bool, NestError> {
        let changed = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, on) != on
        };
        if changed {
            tracing::debug!(id = %self.id, on, "light switched");
            self.publisher
                .publish(DevicePayload::new(self.id.clone(), Message::from(on)).into())
                .await?;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nest_app::event_bus;
    use nest_domain::event::DeviceEvent;

    #[tokio::test]
    async fn should_default_to_off() {
        let (tx, _rx) = event_bus::channel(1);
        let light = VirtualLight::new("light.kitchen", tx);
        assert!(!light.is_on());
    }

    #[tokio::test]
    async fn should_publish_when_turned_on() {
        let (tx, mut rx) = event_bus::channel(4);
        let light = VirtualLight::new("light.kitchen", tx);

        assert!(light.set(true).await.unwrap());

        assert!(light.is_on());
        assert_eq!(
            rx.try_recv(),
            Some(DeviceEvent::from(DevicePayload::new("light.kitchen", Message::TurnOn)))
        );
    }

    #[tokio::test]
    async fn should_stay_silent_when_state_is_unchanged() {
        let (tx, mut rx) = event_bus::channel(4);
        let light = VirtualLight::new("light.kitchen", tx);

        assert!(!light.set(false).await.unwrap());

        assert_eq!(rx.try_recv(), None);
    }
}
