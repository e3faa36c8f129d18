// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing hooks for the allocator.
//!
//! [`TraceSink`] has one method per allocation event, each defaulting to a
//! no-op. [`Tracer`] wraps an optional `&mut dyn TraceSink`; with the `trace`
//! feature **off** every `Tracer` method compiles to nothing, and with it
//! **on** each call is one `Option` branch.
//!
//! These events are structured and meant for tooling (see `scanout_debug`).
//! Human-readable operational messages go through the `log` facade instead.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies.

use crate::allocator::{DemotionReason, FrameOutcome};
use crate::catalog::UnitType;
use crate::display::DisplayId;
use crate::layer::LayerId;
use crate::pool::UnitId;

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when an allocation attempt starts.
#[derive(Clone, Copy, Debug)]
pub struct AllocationBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Display being allocated.
    pub display: DisplayId,
    /// Number of layers in the request.
    pub layer_count: u32,
    /// Attempt number, starting at 0; re-runs after failed validation count up.
    pub attempt: u32,
}

/// Emitted when a layer is bound to a unit.
#[derive(Clone, Copy, Debug)]
pub struct LayerAssignedEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// The layer.
    pub layer: LayerId,
    /// The unit.
    pub unit: UnitId,
    /// Type of the unit.
    pub unit_type: UnitType,
}

/// Emitted when a layer falls back to client composition.
#[derive(Clone, Copy, Debug)]
pub struct LayerDemotedEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// The layer.
    pub layer: LayerId,
    /// Why.
    pub reason: DemotionReason,
}

/// Emitted when a fetch unit is reserved for a blit unit's output.
#[derive(Clone, Copy, Debug)]
pub struct TargetReservedEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Blit unit.
    pub blit: UnitId,
    /// Reserved fetch unit.
    pub target: UnitId,
}

/// Emitted after checking one physical blit engine's load.
#[derive(Clone, Copy, Debug)]
pub struct BandwidthCheckEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// First logical unit of the physical engine checked.
    pub unit: UnitId,
    /// Cycles all of the engine's consumers need, any display.
    pub required_cycles: f64,
    /// Cycles available per frame.
    pub budget_cycles: f64,
    /// Consumers demoted to fit.
    pub demoted: u32,
}

/// Emitted when window validation fails and the frame is re-run.
#[derive(Clone, Copy, Debug)]
pub struct ValidationRetryEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Attempt that failed.
    pub attempt: u32,
    /// Windows disabled in that attempt.
    pub invalid_windows: u32,
}

/// Emitted when an allocation finishes.
#[derive(Clone, Copy, Debug)]
pub struct AllocationEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Display.
    pub display: DisplayId,
    /// Layers on hardware units.
    pub assigned: u32,
    /// Layers demoted to client composition.
    pub demoted: u32,
    /// Layers that requested client composition.
    pub client: u32,
    /// Outcome.
    pub outcome: FrameOutcome,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the allocator.
///
/// All methods have default no-op implementations.
pub trait TraceSink {
    /// Called when an allocation attempt starts.
    fn on_allocation_begin(&mut self, e: &AllocationBeginEvent) {
        _ = e;
    }

    /// Called when a layer is bound to a unit.
    fn on_layer_assigned(&mut self, e: &LayerAssignedEvent) {
        _ = e;
    }

    /// Called when a layer is demoted.
    fn on_layer_demoted(&mut self, e: &LayerDemotedEvent) {
        _ = e;
    }

    /// Called when a composition target is reserved.
    fn on_target_reserved(&mut self, e: &TargetReservedEvent) {
        _ = e;
    }

    /// Called after a blit unit's load is checked.
    fn on_bandwidth_check(&mut self, e: &BandwidthCheckEvent) {
        _ = e;
    }

    /// Called when the frame is re-run after failed validation.
    fn on_validation_retry(&mut self, e: &ValidationRetryEvent) {
        _ = e;
    }

    /// Called when an allocation finishes.
    fn on_allocation_end(&mut self, e: &AllocationEndEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($(#[$doc:meta] $name:ident => $method:ident($ty:ty);)*) => {
        $(
            #[$doc]
            #[inline]
            pub fn $name(&mut self, e: &$ty) {
                #[cfg(feature = "trace")]
                if let Some(s) = &mut self.sink {
                    s.$method(e);
                }
                #[cfg(not(feature = "trace"))]
                {
                    _ = e;
                }
            }
        )*
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    dispatch! {
        /// Emits an [`AllocationBeginEvent`].
        allocation_begin => on_allocation_begin(AllocationBeginEvent);
        /// Emits a [`LayerAssignedEvent`].
        layer_assigned => on_layer_assigned(LayerAssignedEvent);
        /// Emits a [`LayerDemotedEvent`].
        layer_demoted => on_layer_demoted(LayerDemotedEvent);
        /// Emits a [`TargetReservedEvent`].
        target_reserved => on_target_reserved(TargetReservedEvent);
        /// Emits a [`BandwidthCheckEvent`].
        bandwidth_check => on_bandwidth_check(BandwidthCheckEvent);
        /// Emits a [`ValidationRetryEvent`].
        validation_retry => on_validation_retry(ValidationRetryEvent);
        /// Emits an [`AllocationEndEvent`].
        allocation_end => on_allocation_end(AllocationEndEvent);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn demoted() -> LayerDemotedEvent {
        LayerDemotedEvent {
            frame_index: 3,
            layer: LayerId(9),
            reason: DemotionReason::NoUnitAvailable,
        }
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let mut sink = NoopSink;
        sink.on_layer_demoted(&demoted());
        sink.on_allocation_end(&AllocationEndEvent {
            frame_index: 3,
            display: DisplayId::PRIMARY,
            assigned: 0,
            demoted: 1,
            client: 0,
            outcome: FrameOutcome::Complete,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.layer_demoted(&demoted());
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct Demotions(Vec<LayerId>);
        impl TraceSink for Demotions {
            fn on_layer_demoted(&mut self, e: &LayerDemotedEvent) {
                self.0.push(e.layer);
            }
        }

        let mut sink = Demotions(Vec::new());
        let mut tracer = Tracer::new(&mut sink);
        tracer.layer_demoted(&demoted());
        drop(tracer);
        assert_eq!(sink.0, [LayerId(9)]);
    }
}
