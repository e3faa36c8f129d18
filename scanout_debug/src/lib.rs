// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, and JSON export for scanout allocation
//! diagnostics.
//!
//! This crate provides [`TraceSink`](scanout_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: one human-readable line per event.
//! - [`recorder::RecorderSink`]: keeps every event in memory as a
//!   [`recorder::RecordedEvent`].
//! - [`json::export`]: writes recorded events as a JSON array.

pub mod json;
pub mod pretty;
pub mod recorder;
