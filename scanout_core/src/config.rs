// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Allocator tuning.

/// Tunable limits for [`Allocator`](crate::allocator::Allocator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Width at which a compressed image starts to contend for its shared
    /// group's memory port.
    pub compressed_width_threshold: u32,
    /// Widest source a rotation unit can rotate by 90°.
    pub rotated_src_width_ceiling: u32,
    /// Frame re-runs allowed after failed window validation before the whole
    /// frame falls back to client composition.
    pub max_validation_retries: u32,
    /// Blit engine clock in kHz.
    pub blit_clock_khz: u32,
    /// Display refresh rate in Hz.
    pub refresh_hz: u32,
}

impl AllocatorConfig {
    /// Limits for gs101.
    #[must_use]
    pub const fn gs101() -> Self {
        Self {
            compressed_width_threshold: 2048,
            rotated_src_width_ceiling: 2560,
            max_validation_retries: 3,
            blit_clock_khz: 667_000,
            refresh_hz: 60,
        }
    }

    /// Returns the same config at a different refresh rate.
    #[must_use]
    pub const fn with_refresh_hz(self, refresh_hz: u32) -> Self {
        Self { refresh_hz, ..self }
    }

    /// Blit engine cycles available per frame.
    #[must_use]
    pub fn blit_budget(&self) -> f64 {
        let hz = if self.refresh_hz == 0 { 1 } else { self.refresh_hz };
        f64::from(self.blit_clock_khz) * 1000.0 / f64::from(hz)
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::gs101()
    }
}
