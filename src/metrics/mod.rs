//! Metrics events for flurry.
//!
//! Events are recorded through the `metrics` facade. No exporter is
//! installed here; whichever recorder the host process installs receives
//! them, and without one they are no-ops.

pub mod events;

/// Emit an internal event.
///
/// This macro calls the `InternalEvent::emit()` method on the given event,
/// which records the corresponding metric.
///
/// # Example
///
/// ```ignore
/// use flurry::metrics::events::BucketsGrouped;
///
/// emit!(BucketsGrouped { count: 12 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
