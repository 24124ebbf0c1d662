//! Event sink port: where devices and entities publish their events.

use std::future::Future;

use nest_domain::error::NestError;
use nest_domain::event::DeviceEvent;

/// Publishes events to the automation engine.
///
/// `publish` may wait for the consumer to make room; producers are expected
/// to finish publishing before observing again.
pub trait EventPublisher {
    /// Publish one event.
    ///
    /// Fails with [`NestError::SinkClosed`] once nobody consumes events anymore.
    fn publish(&self, event: DeviceEvent) -> impl Future<Output = Result<(), NestError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: DeviceEvent) -> impl Future<Output = Result<(), NestError>> + Send {
        (**self).publish(event)
    }
}
