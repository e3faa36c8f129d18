// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`] destination (default: stderr). Write errors are ignored.

use std::io::Write;

use scanout_core::trace::{
    AllocationBeginEvent, AllocationEndEvent, BandwidthCheckEvent, LayerAssignedEvent,
    LayerDemotedEvent, TargetReservedEvent, TraceSink, ValidationRetryEvent,
};

/// Writes human-readable trace lines to a [`Write`] destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_allocation_begin(&mut self, e: &AllocationBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[begin] frame={} display={} layers={} attempt={}",
            e.frame_index, e.display.0, e.layer_count, e.attempt,
        );
    }

    fn on_layer_assigned(&mut self, e: &LayerAssignedEvent) {
        let _ = writeln!(
            self.writer,
            "[assign] frame={} layer={} unit={} ({:?})",
            e.frame_index, e.layer.0, e.unit.0, e.unit_type,
        );
    }

    fn on_layer_demoted(&mut self, e: &LayerDemotedEvent) {
        let _ = writeln!(
            self.writer,
            "[demote] frame={} layer={} reason=\"{}\"",
            e.frame_index, e.layer.0, e.reason,
        );
    }

    fn on_target_reserved(&mut self, e: &TargetReservedEvent) {
        let _ = writeln!(
            self.writer,
            "[target] frame={} blit={} target={}",
            e.frame_index, e.blit.0, e.target.0,
        );
    }

    fn on_bandwidth_check(&mut self, e: &BandwidthCheckEvent) {
        let load = if e.budget_cycles > 0.0 {
            e.required_cycles / e.budget_cycles * 100.0
        } else {
            f64::INFINITY
        };
        let _ = writeln!(
            self.writer,
            "[bandwidth] frame={} unit={} load={load:.1}% demoted={}",
            e.frame_index, e.unit.0, e.demoted,
        );
    }

    fn on_validation_retry(&mut self, e: &ValidationRetryEvent) {
        let _ = writeln!(
            self.writer,
            "[retry] frame={} attempt={} invalid_windows={}",
            e.frame_index, e.attempt, e.invalid_windows,
        );
    }

    fn on_allocation_end(&mut self, e: &AllocationEndEvent) {
        let _ = writeln!(
            self.writer,
            "[end] frame={} display={} assigned={} demoted={} client={} outcome={:?}",
            e.frame_index, e.display.0, e.assigned, e.demoted, e.client, e.outcome,
        );
    }
}

#[cfg(test)]
mod tests {
    use scanout_core::allocator::DemotionReason;
    use scanout_core::layer::LayerId;
    use scanout_core::pool::UnitId;

    use super::*;

    #[test]
    fn one_line_per_event() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_layer_demoted(&LayerDemotedEvent {
            frame_index: 2,
            layer: LayerId(7),
            reason: DemotionReason::SharedConflict,
        });
        sink.on_bandwidth_check(&BandwidthCheckEvent {
            frame_index: 2,
            unit: UnitId(8),
            required_cycles: 150.0,
            budget_cycles: 100.0,
            demoted: 1,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2, "got: {output}");
        assert_eq!(
            lines[0],
            "[demote] frame=2 layer=7 reason=\"shared group conflict\""
        );
        assert!(lines[1].contains("load=150.0%"), "got: {output}");
    }
}
