// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The scene builder keys its [`understory_dirty`] tracker by color slot
//! index. Display-wide state (color mode, render intent, global matrix, and
//! the slot count itself) is marked on [`DISPLAY_KEY`]. No channel
//! propagates: every mark is local to its key.
//!
//! Callers do not inspect these channels directly.
//! [`ColorSceneBuilder::needs_reprogram`](crate::builder::ColorSceneBuilder::needs_reprogram)
//! drains all of them at once.

use understory_dirty::Channel;

/// Layer dataspace changed.
pub const DATASPACE: Channel = Channel::new(0);

/// Static HDR metadata appeared, disappeared, or changed.
pub const HDR_STATIC: Channel = Channel::new(1);

/// Dynamic HDR metadata appeared, disappeared, or changed.
pub const HDR_DYNAMIC: Channel = Channel::new(2);

/// Per-layer color transform changed.
pub const MATRIX: Channel = Channel::new(3);

/// The layer or unit behind a slot changed, or slots were added or removed.
pub const MAPPING: Channel = Channel::new(4);

/// Display-wide color mode, render intent or matrix changed.
pub const DISPLAY: Channel = Channel::new(5);

/// Every channel, in drain order.
pub const ALL: [Channel; 6] = [DATASPACE, HDR_STATIC, HDR_DYNAMIC, MATRIX, MAPPING, DISPLAY];

/// Key used for display-wide marks.
pub const DISPLAY_KEY: u32 = u32::MAX;
