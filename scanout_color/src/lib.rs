// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-display color scene tracking and color blob encoding.
//!
//! `scanout_color` sits between the plane allocator in `scanout_core` and
//! the kernel commit path. After a frame is assigned it records one color
//! slot per hardware-composed layer, detects whether anything color-relevant
//! changed, hands the scene to an external color-science collaborator, and
//! turns the collaborator's LUTs and matrices into property blobs.
//!
//! # Architecture
//!
//! ```text
//!   FrameRequest ──► Allocator::allocate() ──► FrameAssignment
//!                                                   │
//!                 ┌─────────────────────────────────┘
//!                 ▼
//!   ColorSceneBuilder::populate() ──► DisplayScene ──► DisplayColor::update()
//!                                                            │
//!                 ┌──────────────────────────────────────────┘
//!                 ▼
//!   ColorEncoder::encode() ──► ColorBlobs ──► (commit)
//!                                                 │
//!   flip done ──► ColorEncoder::release_retired() ◄┘
//! ```
//!
//! **[`dirty`]**: Channels tracked by the scene builder.
//!
//! **[`scene`]**: [`DisplayScene`](scene::DisplayScene) and the per-slot
//! [`LayerColorData`](scene::LayerColorData), including the HDR state
//! machine.
//!
//! **[`builder`]**: [`ColorSceneBuilder`](builder::ColorSceneBuilder), which
//! keeps the previous frame's scene and marks a channel only when a value
//! actually changes.
//!
//! **[`collaborator`]**: The [`DisplayColor`](collaborator::DisplayColor)
//! trait implemented by the color-science library, and the stage data it
//! returns.
//!
//! **[`encode`]**: [`ColorEncoder`](encode::ColorEncoder) and the
//! [`BlobSink`](encode::BlobSink) it writes through.
//!
//! **[`frame`]**: [`FrameComposer`](frame::FrameComposer), the per-frame
//! orchestration of all of the above.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Forwards to `scanout_core/trace`.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod builder;
pub mod collaborator;
pub mod dirty;
pub mod encode;
pub mod frame;
pub mod scene;
