// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON export of recorded events.
//!
//! [`export`] writes a JSON array with one object per event. Every object
//! has `"event"` and `"frame"` keys; the rest mirror the event's fields, with
//! ids as plain numbers and enums as their debug names. Demotion reasons
//! also carry their human-readable text under `"detail"`.

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::RecordedEvent;

/// Converts one event to a JSON object.
#[must_use]
pub fn to_value(event: &RecordedEvent) -> Value {
    let mut value = match event {
        RecordedEvent::AllocationBegin(e) => json!({
            "display": e.display.0,
            "layer_count": e.layer_count,
            "attempt": e.attempt,
        }),
        RecordedEvent::LayerAssigned(e) => json!({
            "layer": e.layer.0,
            "unit": e.unit.0,
            "unit_type": format!("{:?}", e.unit_type),
        }),
        RecordedEvent::LayerDemoted(e) => json!({
            "layer": e.layer.0,
            "reason": format!("{:?}", e.reason),
            "detail": e.reason.to_string(),
        }),
        RecordedEvent::TargetReserved(e) => json!({
            "blit": e.blit.0,
            "target": e.target.0,
        }),
        RecordedEvent::BandwidthCheck(e) => json!({
            "unit": e.unit.0,
            "required_cycles": e.required_cycles,
            "budget_cycles": e.budget_cycles,
            "demoted": e.demoted,
        }),
        RecordedEvent::ValidationRetry(e) => json!({
            "attempt": e.attempt,
            "invalid_windows": e.invalid_windows,
        }),
        RecordedEvent::AllocationEnd(e) => json!({
            "display": e.display.0,
            "assigned": e.assigned,
            "demoted": e.demoted,
            "client": e.client,
            "outcome": format!("{:?}", e.outcome),
        }),
    };
    if let Value::Object(map) = &mut value {
        map.insert("event".into(), event.name().into());
        map.insert("frame".into(), event.frame_index().into());
    }
    value
}

/// Writes `events` as a pretty-printed JSON array.
pub fn export(events: &[RecordedEvent], writer: &mut dyn Write) -> io::Result<()> {
    let values: Vec<Value> = events.iter().map(to_value).collect();
    serde_json::to_writer_pretty(writer, &values)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use scanout_core::allocator::{DemotionReason, FrameOutcome};
    use scanout_core::display::DisplayId;
    use scanout_core::layer::LayerId;
    use scanout_core::trace::{AllocationEndEvent, LayerDemotedEvent, TraceSink};

    use super::*;
    use crate::recorder::RecorderSink;

    #[test]
    fn export_produces_one_object_per_event() {
        let mut rec = RecorderSink::new();
        rec.on_layer_demoted(&LayerDemotedEvent {
            frame_index: 9,
            layer: LayerId(3),
            reason: DemotionReason::Bandwidth,
        });
        rec.on_allocation_end(&AllocationEndEvent {
            frame_index: 9,
            display: DisplayId::PRIMARY,
            assigned: 2,
            demoted: 1,
            client: 0,
            outcome: FrameOutcome::Complete,
        });

        let mut out = Vec::new();
        export(rec.events(), &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.len(), 2);

        assert_eq!(parsed[0]["event"], "layer_demoted");
        assert_eq!(parsed[0]["frame"], 9);
        assert_eq!(parsed[0]["layer"], 3);
        assert_eq!(parsed[0]["reason"], "Bandwidth");
        assert_eq!(parsed[0]["detail"], "blit bandwidth exceeded");

        assert_eq!(parsed[1]["event"], "allocation_end");
        assert_eq!(parsed[1]["assigned"], 2);
        assert_eq!(parsed[1]["outcome"], "Complete");
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert!(parsed.is_empty());
    }
}
