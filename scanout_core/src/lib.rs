// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hardware plane allocation for display scanout.
//!
//! `scanout_core` decides, frame by frame, which display-pipeline unit
//! fetches each layer and which layers fall back to client composition. It
//! is `no_std` compatible (with `alloc`). Units live in struct-of-arrays
//! storage addressed by index handles.
//!
//! # Architecture
//!
//! ```text
//!   Catalog (static tables)        Topology (static units)
//!       │                               │
//!       ▼                               ▼
//!   Classifier::check()             UnitPool (per-frame state)
//!       │                               │
//!       └──────────────┬────────────────┘
//!                      ▼
//!   FrameRequest ──► Allocator::allocate() ──► FrameAssignment
//!                      │                            │
//!                      ▼                            ▼
//!                 window::validate()          color / commit encoding
//!                 (bounded retry)
//! ```
//!
//! **[`format`]**: Pixel formats and the classes the tables are keyed by.
//!
//! **[`layer`]**: Per-frame layer requests and integer [`Image`](layer::Image)
//! geometry.
//!
//! **[`catalog`]**: Restriction tables: formats, size/alignment rows,
//! feature sets and pixels-per-cycle figures per unit type.
//!
//! **[`classify`]**: Decides whether a unit type can show a layer.
//!
//! **[`display`]**: Display identities, modes and allocation profiles.
//!
//! **[`topology`]** and **[`pool`]**: The units present and their
//! per-frame assignment state, including shared groups.
//!
//! **[`allocator`]**: Greedy first-fit assignment with shared-group rules,
//! blit bandwidth demotion and validation retries.
//!
//! **[`window`]**: Window configs and pre-commit validation.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) and allocation events,
//! with the zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod allocator;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod display;
pub mod format;
pub mod layer;
pub mod pool;
pub mod topology;
pub mod trace;
pub mod window;
