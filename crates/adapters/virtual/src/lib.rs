//! # nest-adapter-virtual
//!
//! In-memory entities that take part in automation like physical devices
//! do: they accept on/off writes from the router and publish their own
//! state changes on the event bus.
//!
//! ## Provided entities
//!
//! | Entity | Behaviour |
//! |--------|-----------|
//! | [`PushButton`] | A press (input off → on) flips a latch and publishes it |
//! | [`VirtualLight`] | Holds on/off and publishes every actual change |
//!
//! Entities are driven by the router while it handles an event, so they
//! publish through the bus's feedback lane
//! ([`EventReceiver::feedback`](nest_app::event_bus::EventReceiver::feedback)),
//! which never waits on the router.
//!
//! ## Dependency rule
//!
//! Depends on `nest-app` (port traits) and `nest-domain` only.

mod entities;

use std::collections::BTreeMap;

use nest_app::ports::{EntityDirectory, EventPublisher};
use nest_domain::error::{NestError, NotFoundError};
use nest_domain::id::EntityId;

pub use entities::{PushButton, VirtualEntity, VirtualLight};

/// Directory of virtual entities sharing one publisher.
#[derive(Debug)]
pub struct VirtualEntities<P> {
    publisher: P,
    entities: BTreeMap<EntityId, VirtualEntity<P>>,
}

impl<P: EventPublisher + Clone> VirtualEntities<P> {
    /// An empty directory publishing through `publisher`.
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            entities: BTreeMap::new(),
        }
    }

    /// Register a push button, replacing any entity with the same id.
    #[must_use]
    pub fn with_push_button(mut self, id: impl Into<EntityId>) -> Self {
        let button = PushButton::new(id, self.publisher.clone());
        self.entities
            .insert(button.id().clone(), VirtualEntity::PushButton(button));
        self
    }

    /// Register a light, replacing any entity with the same id.
    #[must_use]
    pub fn with_light(mut self, id: impl Into<EntityId>) -> Self {
        let light = VirtualLight::new(id, self.publisher.clone());
        self.entities
            .insert(light.id().clone(), VirtualEntity::Light(light));
        self
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&VirtualEntity<P>> {
        self.entities.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entities.keys()
    }
}

impl<P> EntityDirectory for VirtualEntities<P>
where
    P: EventPublisher + Clone + Send + Sync,
{
    fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    async fn apply(&self, id: &EntityId, on: bool) -> Result<(), NestError> {
        let entity = self.get(id.as_str()).ok_or_else(|| NotFoundError {
            entity: "Entity",
            id: id.to_string(),
        })?;
        entity.apply(on).await
    }
}
