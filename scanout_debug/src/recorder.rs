// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory event recording.
//!
//! [`RecorderSink`] implements [`TraceSink`] by pushing a copy of every event
//! onto a `Vec<RecordedEvent>`. Events are small `Copy` structs, so a
//! recording is cheap enough to keep for a few thousand frames and replay
//! through [`PrettyPrintSink`](crate::pretty::PrettyPrintSink) or
//! [`export`](crate::json::export) afterwards.

use scanout_core::trace::{
    AllocationBeginEvent, AllocationEndEvent, BandwidthCheckEvent, LayerAssignedEvent,
    LayerDemotedEvent, TargetReservedEvent, TraceSink, ValidationRetryEvent,
};

/// One recorded allocator event.
#[derive(Clone, Copy, Debug)]
pub enum RecordedEvent {
    /// An [`AllocationBeginEvent`].
    AllocationBegin(AllocationBeginEvent),
    /// A [`LayerAssignedEvent`].
    LayerAssigned(LayerAssignedEvent),
    /// A [`LayerDemotedEvent`].
    LayerDemoted(LayerDemotedEvent),
    /// A [`TargetReservedEvent`].
    TargetReserved(TargetReservedEvent),
    /// A [`BandwidthCheckEvent`].
    BandwidthCheck(BandwidthCheckEvent),
    /// A [`ValidationRetryEvent`].
    ValidationRetry(ValidationRetryEvent),
    /// An [`AllocationEndEvent`].
    AllocationEnd(AllocationEndEvent),
}

impl RecordedEvent {
    /// Frame the event belongs to.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        match self {
            Self::AllocationBegin(e) => e.frame_index,
            Self::LayerAssigned(e) => e.frame_index,
            Self::LayerDemoted(e) => e.frame_index,
            Self::TargetReserved(e) => e.frame_index,
            Self::BandwidthCheck(e) => e.frame_index,
            Self::ValidationRetry(e) => e.frame_index,
            Self::AllocationEnd(e) => e.frame_index,
        }
    }

    /// Short event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AllocationBegin(_) => "allocation_begin",
            Self::LayerAssigned(_) => "layer_assigned",
            Self::LayerDemoted(_) => "layer_demoted",
            Self::TargetReserved(_) => "target_reserved",
            Self::BandwidthCheck(_) => "bandwidth_check",
            Self::ValidationRetry(_) => "validation_retry",
            Self::AllocationEnd(_) => "allocation_end",
        }
    }

    /// Sends the event to `sink`.
    pub fn replay(&self, sink: &mut dyn TraceSink) {
        match self {
            Self::AllocationBegin(e) => sink.on_allocation_begin(e),
            Self::LayerAssigned(e) => sink.on_layer_assigned(e),
            Self::LayerDemoted(e) => sink.on_layer_demoted(e),
            Self::TargetReserved(e) => sink.on_target_reserved(e),
            Self::BandwidthCheck(e) => sink.on_bandwidth_check(e),
            Self::ValidationRetry(e) => sink.on_validation_retry(e),
            Self::AllocationEnd(e) => sink.on_allocation_end(e),
        }
    }
}

/// A [`TraceSink`] that keeps every event.
#[derive(Debug, Default)]
pub struct RecorderSink {
    events: Vec<RecordedEvent>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Consumes the recorder and returns its events.
    #[must_use]
    pub fn into_events(self) -> Vec<RecordedEvent> {
        self.events
    }

    /// Events of one frame.
    pub fn frame(&self, frame_index: u64) -> impl Iterator<Item = &RecordedEvent> + '_ {
        self.events
            .iter()
            .filter(move |e| e.frame_index() == frame_index)
    }

    /// Forgets everything recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Sends every recorded event to `sink`, in order.
    pub fn replay(&self, sink: &mut dyn TraceSink) {
        for e in &self.events {
            e.replay(sink);
        }
    }
}

impl TraceSink for RecorderSink {
    fn on_allocation_begin(&mut self, e: &AllocationBeginEvent) {
        self.events.push(RecordedEvent::AllocationBegin(*e));
    }

    fn on_layer_assigned(&mut self, e: &LayerAssignedEvent) {
        self.events.push(RecordedEvent::LayerAssigned(*e));
    }

    fn on_layer_demoted(&mut self, e: &LayerDemotedEvent) {
        self.events.push(RecordedEvent::LayerDemoted(*e));
    }

    fn on_target_reserved(&mut self, e: &TargetReservedEvent) {
        self.events.push(RecordedEvent::TargetReserved(*e));
    }

    fn on_bandwidth_check(&mut self, e: &BandwidthCheckEvent) {
        self.events.push(RecordedEvent::BandwidthCheck(*e));
    }

    fn on_validation_retry(&mut self, e: &ValidationRetryEvent) {
        self.events.push(RecordedEvent::ValidationRetry(*e));
    }

    fn on_allocation_end(&mut self, e: &AllocationEndEvent) {
        self.events.push(RecordedEvent::AllocationEnd(*e));
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Rect;
    use scanout_core::allocator::{Allocator, FrameOutcome, FrameRequest};
    use scanout_core::display::DisplayProfile;
    use scanout_core::format::PixelFormat;
    use scanout_core::layer::{Layer, LayerId, SourceImage};
    use scanout_core::trace::Tracer;

    use super::*;

    fn layers(n: u64) -> Vec<Layer> {
        (1..=n)
            .map(|id| {
                Layer::new(
                    LayerId(id),
                    SourceImage::new(PixelFormat::Rgba8888, 1080, 2400),
                    Rect::new(0.0, 0.0, 1080.0, 2400.0),
                )
            })
            .collect()
    }

    #[test]
    fn records_a_full_allocation() {
        let mut alloc = Allocator::gs101().unwrap();
        let layers = layers(5);
        let mut rec = RecorderSink::new();
        {
            let mut tracer = Tracer::new(&mut rec);
            alloc.allocate_traced(
                &FrameRequest::new(4, DisplayProfile::primary(1080, 2400), &layers),
                &mut tracer,
            );
        }

        let names: Vec<_> = rec.events().iter().map(RecordedEvent::name).collect();
        assert_eq!(names.first(), Some(&"allocation_begin"));
        assert_eq!(names.last(), Some(&"allocation_end"));
        // The fifth layer has no unit, and the fourth gives its unit to the
        // client target.
        assert_eq!(names.iter().filter(|n| **n == "layer_assigned").count(), 3);
        assert_eq!(names.iter().filter(|n| **n == "layer_demoted").count(), 2);
        assert_eq!(rec.frame(4).count(), rec.events().len());
        assert_eq!(rec.frame(5).count(), 0);

        let Some(RecordedEvent::AllocationEnd(end)) = rec.events().last() else {
            panic!("last event is not allocation_end");
        };
        assert_eq!(end.assigned, 3);
        assert_eq!(end.demoted, 2);
        assert_eq!(end.outcome, FrameOutcome::Complete);
    }

    #[test]
    fn replay_reproduces_the_recording() {
        let mut alloc = Allocator::gs101().unwrap();
        let layers = layers(2);
        let mut rec = RecorderSink::new();
        {
            let mut tracer = Tracer::new(&mut rec);
            alloc.allocate_traced(
                &FrameRequest::new(0, DisplayProfile::primary(1080, 2400), &layers),
                &mut tracer,
            );
        }
        let mut copy = RecorderSink::new();
        rec.replay(&mut copy);
        let a: Vec<_> = rec.events().iter().map(RecordedEvent::name).collect();
        let b: Vec<_> = copy.events().iter().map(RecordedEvent::name).collect();
        assert_eq!(a, b);

        copy.clear();
        assert!(copy.events().is_empty());
    }
}
