//! Event router: the automation engine.
//!
//! The router drains the event bus and, for each `TurnOn`/`TurnOff` event
//! whose source is mapped by the [`RuleSource`], writes the same value to
//! the target resolved through the [`EntityDirectory`].
//!
//! `Unknown` events never trigger a lookup. A target missing from the
//! directory drops the event with [`NestError::NotFound`]. Nothing is
//! retried, batched or reordered.

use nest_domain::error::NestError;
use nest_domain::event::{DeviceEvent, DevicePayload};
use nest_domain::id::EntityId;

use crate::event_bus::EventReceiver;
use crate::ports::{EntityDirectory, RuleSource};

/// What the router did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The event carried no usable value (`Unknown`, or a fault).
    Ignored,
    /// No rule for the event's source.
    Unmapped,
    /// `value` was written to `target`.
    Written { target: EntityId, value: bool },
}

/// Counters reported when [`EventRouter::run`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub received: usize,
    pub written: usize,
    pub failed: usize,
    pub faults: usize,
}

/// Reactive automation engine over a rule source and a target directory.
pub struct EventRouter<R, D> {
    rules: R,
    directory: D,
}

impl<R, D> EventRouter<R, D>
where
    R: RuleSource + Sync,
    D: EntityDirectory + Sync,
{
    /// Create a new router.
    pub fn new(rules: R, directory: D) -> Self {
        Self { rules, directory }
    }

    /// Route a single state payload.
    ///
    /// # Errors
    ///
    /// Returns [`NestError::NotFound`] when the mapped target is unknown to
    /// the directory, or the error reported by the target's write.
    #[tracing::instrument(skip(self), fields(source = %payload.source_id, message = %payload.message))]
    pub async fn route(&self, payload: &DevicePayload) -> Result<RouteOutcome, NestError> {
        let Some(value) = payload.message.as_bool() else {
            return Ok(RouteOutcome::Ignored);
        };

        let Some(target) = self.rules.resolve(&payload.source_id).await? else {
            return Ok(RouteOutcome::Unmapped);
        };

        self.directory.apply(&target, value).await?;
        tracing::debug!(%target, value, "routed write");

        Ok(RouteOutcome::Written { target, value })
    }

    /// Handle any bus event. Faults are logged and never routed.
    ///
    /// # Errors
    ///
    /// Same as [`route`](Self::route).
    pub async fn handle(&self, event: &DeviceEvent) -> Result<RouteOutcome, NestError> {
        match event {
            DeviceEvent::Changed(payload) => self.route(payload).await,
            DeviceEvent::Faulted(fault) => {
                tracing::warn!(
                    source = %fault.source_id,
                    reason = %fault.reason,
                    at = %fault.at,
                    "device stopped reporting"
                );
                Ok(RouteOutcome::Ignored)
            }
        }
    }

    /// Drain `events` until every producer has gone away.
    ///
    /// A failing event is logged and dropped; the loop keeps going.
    pub async fn run(&self, events: EventReceiver) -> RouterStats {
        self.run_until(events, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but once `shutdown` resolves the bus is
    /// closed to new events and the router returns after draining what is
    /// already buffered.
    ///
    /// Needed when some producers outlive the point where the router should
    /// stop.
    pub async fn run_until(
        &self,
        mut events: EventReceiver,
        shutdown: impl Future<Output = ()>,
    ) -> RouterStats {
        tracing::info!("event router started");
        let mut stats = RouterStats::default();
        let mut shutdown = std::pin::pin!(shutdown);
        let mut closing = false;

        loop {
            let next = if closing {
                events.recv().await
            } else {
                tokio::select! {
                    () = &mut shutdown => {
                        tracing::info!("event router closing");
                        events.close();
                        closing = true;
                        continue;
                    }
                    next = events.recv() => next,
                }
            };
            let Some(event) = next else {
                break;
            };

            stats.received += 1;
            if matches!(event, DeviceEvent::Faulted(_)) {
                stats.faults += 1;
            }
            match self.handle(&event).await {
                Ok(RouteOutcome::Written { .. }) => stats.written += 1,
                Ok(RouteOutcome::Ignored | RouteOutcome::Unmapped) => {}
                Err(err) => {
                    stats.failed += 1;
                    tracing::warn!(source = %event.source_id(), error = %err, "event dropped");
                }
            }
        }

        tracing::info!(
            received = stats.received,
            written = stats.written,
            failed = stats.failed,
            faults = stats.faults,
            "event router stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus;
    use crate::ports::EventPublisher;
    use nest_domain::device::DeviceFormat;
    use nest_domain::error::NotFoundError;
    use nest_domain::event::{DeviceFault, Message};
    use nest_domain::rules::RuleTable;
    use std::collections::HashMap;
    use std::sync::Mutex;

    // ── Spy directory ──────────────────────────────────────────────

    struct SpyDirectory {
        formats: HashMap<&'static str, DeviceFormat>,
        writes: Mutex<Vec<(EntityId, bool)>>,
    }

    impl SpyDirectory {
        fn with(devices: &[(&'static str, DeviceFormat)]) -> Self {
            Self {
                formats: devices.iter().copied().collect(),
                writes: Mutex::new(Vec::new()),
            }
        }

        fn writes(&self) -> Vec<(EntityId, bool)> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl EntityDirectory for SpyDirectory {
        fn contains(&self, id: &EntityId) -> bool {
            self.formats.contains_key(id.as_str())
        }

        async fn apply(&self, id: &EntityId, on: bool) -> Result<(), NestError> {
            let format = *self.formats.get(id.as_str()).ok_or_else(|| NotFoundError {
                entity: "Device",
                id: id.to_string(),
            })?;
            if !format.is_writable() {
                return Err(NestError::NotWritable {
                    slug: id.to_string(),
                    format,
                });
            }
            self.writes.lock().unwrap().push((id.clone(), on));
            Ok(())
        }
    }

    /// Directory whose only entity echoes every write back on the bus.
    struct EchoDirectory<P> {
        id: EntityId,
        publisher: P,
    }

    impl<P: EventPublisher + Sync> EntityDirectory for EchoDirectory<P> {
        fn contains(&self, id: &EntityId) -> bool {
            *id == self.id
        }

        async fn apply(&self, id: &EntityId, on: bool) -> Result<(), NestError> {
            self.publisher
                .publish(DevicePayload::new(id.clone(), Message::from(on)).into())
                .await
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn make_router(
        rules: RuleTable,
        devices: &[(&'static str, DeviceFormat)],
    ) -> EventRouter<RuleTable, SpyDirectory> {
        EventRouter::new(rules, SpyDirectory::with(devices))
    }

    fn turn_on(source: &str) -> DevicePayload {
        DevicePayload::new(source, Message::TurnOn)
    }

    // ── Tests ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn should_write_true_to_target_when_source_turns_on() {
        let router = make_router(
            RuleTable::new().with_rule("do-1-01", "ro-2-13"),
            &[("ro-2-13", DeviceFormat::RelayOutput)],
        );

        let outcome = router.route(&turn_on("do-1-01")).await.unwrap();

        assert_eq!(
            outcome,
            RouteOutcome::Written {
                target: EntityId::from("ro-2-13"),
                value: true
            }
        );
        assert_eq!(router.directory.writes(), vec![(EntityId::from("ro-2-13"), true)]);
    }

    #[tokio::test]
    async fn should_write_false_to_target_when_source_turns_off() {
        let router = make_router(
            RuleTable::new().with_rule("di-1-01", "do-1-01"),
            &[("do-1-01", DeviceFormat::DigitalOutput)],
        );

        router
            .route(&DevicePayload::new("di-1-01", Message::TurnOff))
            .await
            .unwrap();

        assert_eq!(router.directory.writes(), vec![(EntityId::from("do-1-01"), false)]);
    }

    #[tokio::test]
    async fn should_not_write_when_source_is_unmapped() {
        let router = make_router(
            RuleTable::new().with_rule("do-1-01", "ro-2-13"),
            &[("ro-2-13", DeviceFormat::RelayOutput)],
        );

        let outcome = router.route(&turn_on("di-3-02")).await.unwrap();

        assert_eq!(outcome, RouteOutcome::Unmapped);
        assert!(router.directory.writes().is_empty());
    }

    #[tokio::test]
    async fn should_ignore_unknown_message_even_when_mapped() {
        let router = make_router(
            RuleTable::new().with_rule("do-1-01", "ro-2-13"),
            &[("ro-2-13", DeviceFormat::RelayOutput)],
        );

        let outcome = router
            .route(&DevicePayload::new("do-1-01", Message::Unknown))
            .await
            .unwrap();

        assert_eq!(outcome, RouteOutcome::Ignored);
        assert!(router.directory.writes().is_empty());
    }

    #[tokio::test]
    async fn should_report_target_not_found_when_target_is_missing() {
        let router = make_router(RuleTable::new().with_rule("do-1-01", "ro-9-99"), &[]);

        let result = router.route(&turn_on("do-1-01")).await;

        assert!(matches!(result, Err(NestError::NotFound(ref e)) if e.id == "ro-9-99"));
    }

    #[tokio::test]
    async fn should_surface_not_writable_from_target() {
        let router = make_router(
            RuleTable::new().with_rule("do-1-01", "di-1-01"),
            &[("di-1-01", DeviceFormat::DigitalInput)],
        );

        let result = router.route(&turn_on("do-1-01")).await;

        assert!(matches!(result, Err(NestError::NotWritable { .. })));
    }

    #[tokio::test]
    async fn should_ignore_fault_events() {
        let router = make_router(
            RuleTable::new().with_rule("di-1-01", "do-1-01"),
            &[("do-1-01", DeviceFormat::DigitalOutput)],
        );
        let fault = DeviceEvent::Faulted(DeviceFault::now("di-1-01", "read failed"));

        let outcome = router.handle(&fault).await.unwrap();

        assert_eq!(outcome, RouteOutcome::Ignored);
        assert!(router.directory.writes().is_empty());
    }

    #[tokio::test]
    async fn should_drain_bus_and_keep_going_after_failures() {
        let router = make_router(
            RuleTable::new()
                .with_rule("di-1-01", "do-1-01")
                .with_rule("di-1-02", "ro-9-99"),
            &[("do-1-01", DeviceFormat::DigitalOutput)],
        );
        let (tx, rx) = event_bus::channel(8);

        tx.publish(turn_on("di-1-02").into()).await.unwrap();
        tx.publish(turn_on("di-1-01").into()).await.unwrap();
        tx.publish(DevicePayload::new("di-1-01", Message::TurnOff).into())
            .await
            .unwrap();
        tx.publish(DeviceEvent::Faulted(DeviceFault::now("di-1-03", "gone")))
            .await
            .unwrap();
        drop(tx);

        let stats = router.run(rx).await;

        assert_eq!(
            stats,
            RouterStats {
                received: 4,
                written: 2,
                failed: 1,
                faults: 1,
            }
        );
        assert_eq!(
            router.directory.writes(),
            vec![
                (EntityId::from("do-1-01"), true),
                (EntityId::from("do-1-01"), false)
            ]
        );
    }

    #[tokio::test]
    async fn should_drain_buffer_and_stop_on_shutdown_while_producers_are_alive() {
        let router = make_router(
            RuleTable::new().with_rule("di-1-01", "do-1-01"),
            &[("do-1-01", DeviceFormat::DigitalOutput)],
        );
        let (tx, rx) = event_bus::channel(8);
        tx.publish(turn_on("di-1-01").into()).await.unwrap();

        let stats = router.run_until(rx, async {}).await;

        assert_eq!(stats.received, 1);
        assert_eq!(stats.written, 1);
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn should_not_block_on_feedback_when_bus_is_full() {
        let (tx, rx) = event_bus::channel(1);
        let router = EventRouter::new(
            RuleTable::new().with_rule("di-1-01", "light.kitchen"),
            EchoDirectory {
                id: EntityId::from("light.kitchen"),
                publisher: rx.feedback(),
            },
        );
        tx.publish(turn_on("di-1-01").into()).await.unwrap();
        let waiting = tokio::spawn({
            let tx = tx.clone();
            async move { tx.publish(turn_on("di-1-02").into()).await }
        });

        let stats = tokio::time::timeout(
            std::time::Duration::from_secs(3),
            router.run_until(rx, tokio::time::sleep(std::time::Duration::from_millis(200))),
        )
        .await
        .expect("router did not stop after shutdown");

        assert!(waiting.await.unwrap().is_ok());
        assert_eq!(
            stats,
            RouterStats {
                received: 3,
                written: 1,
                failed: 0,
                faults: 0,
            }
        );
    }
}
