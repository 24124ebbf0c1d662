//! Virtual entity implementations: push button and light.

mod light;
mod push_button;

pub use light::VirtualLight;
pub use push_button::PushButton;

use nest_app::ports::EventPublisher;
use nest_domain::error::NestError;
use nest_domain::id::EntityId;

/// Wrapper enum for the concrete virtual entity types.
#[derive(Debug)]
pub enum VirtualEntity<P> {
    PushButton(PushButton<P>),
    Light(VirtualLight<P>),
}

impl<P: EventPublisher> VirtualEntity<P> {
    #[must_use]
    pub fn id(&self) -> &EntityId {
        match self {
            Self::PushButton(button) => button.id(),
            Self::Light(light) => light.id(),
        }
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        match self {
            Self::PushButton(button) => button.is_on(),
            Self::Light(light) => light.is_on(),
        }
    }

    /// Deliver an on/off value to the entity.
    ///
    /// # Errors
    ///
    /// Returns [`NestError::SinkClosed`] if the resulting event could not be
    /// published.
    pub async fn apply(&self, on: bool) -> Result<(), NestError> {
        match self {
            Self::PushButton(button) => button.input(on).await.map(drop),
            Self::Light(light) => light.set(on).await.map(drop),
        }
    }
}
