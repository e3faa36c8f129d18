// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Displays, display modes, and the per-display allocation profile.

use bitflags::bitflags;

use crate::catalog::{UnitType, UnitTypeMask};

/// Identity of a display.
///
/// The value doubles as the bit position within one mode's byte of a
/// [`PreAssign`] mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisplayId(pub u8);

impl DisplayId {
    /// The built-in panel.
    pub const PRIMARY: Self = Self(0);
    /// A wired external display.
    pub const EXTERNAL: Self = Self(1);
    /// A virtual (writeback) display.
    pub const VIRTUAL: Self = Self(2);
}

/// Which display is the main one. Decides how fetch units are split.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisplayMode {
    /// The built-in panel is the main display.
    #[default]
    PrimaryMain,
    /// An external display is the main display.
    ExternalMain,
}

impl DisplayMode {
    const fn shift(self) -> u32 {
        match self {
            Self::PrimaryMain => 0,
            Self::ExternalMain => 8,
        }
    }
}

bitflags! {
    /// Displays a unit may serve, one byte per [`DisplayMode`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PreAssign: u32 {
        /// Primary display in primary-main mode.
        const PRIMARY_MAIN_PRIMARY = 1 << 0;
        /// External display in primary-main mode.
        const PRIMARY_MAIN_EXTERNAL = 1 << 1;
        /// Virtual display in primary-main mode.
        const PRIMARY_MAIN_VIRTUAL = 1 << 2;
        /// Primary display in external-main mode.
        const EXTERNAL_MAIN_PRIMARY = 1 << 8;
        /// External display in external-main mode.
        const EXTERNAL_MAIN_EXTERNAL = 1 << 9;
        /// Virtual display in external-main mode.
        const EXTERNAL_MAIN_VIRTUAL = 1 << 10;
    }
}

impl PreAssign {
    /// The bit for `display` in `mode`; empty for displays without one.
    #[must_use]
    pub const fn bit(display: DisplayId, mode: DisplayMode) -> Self {
        if display.0 >= 8 {
            return Self::empty();
        }
        Self::from_bits_truncate(1 << (mode.shift() + display.0 as u32))
    }

    /// Returns `true` if a unit with this mask may serve `display` in `mode`.
    #[must_use]
    pub const fn allows(self, display: DisplayId, mode: DisplayMode) -> bool {
        self.intersects(Self::bit(display, mode))
    }
}

/// How one display allocates units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayProfile {
    /// Display identity.
    pub id: DisplayId,
    /// Active width in pixels.
    pub width: u32,
    /// Active height in pixels.
    pub height: u32,
    /// Unit types this display may use.
    pub allowed: UnitTypeMask,
    /// Unit types in the order they are tried.
    pub preference: &'static [UnitType],
    /// Whether the first blit consumer reserves a fetch unit to show the
    /// composed output. Writeback displays consume the blit output directly.
    pub reserves_blit_target: bool,
    /// Whether a fetch unit is held for the client composition target
    /// whenever any layer is client-composed.
    pub reserves_client_target: bool,
    /// Whether window configs are validated before commit.
    pub validates_windows: bool,
    /// Whether this display owns the color pipeline.
    pub programs_color: bool,
}

const FETCH_FIRST: &[UnitType] = &[
    UnitType::Gf,
    UnitType::Vg,
    UnitType::Vgf,
    UnitType::Vgs,
    UnitType::Vgrfs,
    UnitType::G2d,
];

const BLIT_ONLY: &[UnitType] = &[UnitType::G2d];

impl DisplayProfile {
    /// The built-in panel.
    #[must_use]
    pub const fn primary(width: u32, height: u32) -> Self {
        Self {
            id: DisplayId::PRIMARY,
            width,
            height,
            allowed: UnitTypeMask::all(),
            preference: FETCH_FIRST,
            reserves_blit_target: true,
            reserves_client_target: true,
            validates_windows: true,
            programs_color: true,
        }
    }

    /// A wired external display.
    #[must_use]
    pub const fn external(width: u32, height: u32) -> Self {
        Self {
            id: DisplayId::EXTERNAL,
            programs_color: false,
            ..Self::primary(width, height)
        }
    }

    /// A writeback display, composed by the blit engine only.
    #[must_use]
    pub const fn virtual_display(width: u32, height: u32) -> Self {
        Self {
            id: DisplayId::VIRTUAL,
            width,
            height,
            allowed: UnitTypeMask::G2D,
            preference: BLIT_ONLY,
            reserves_blit_target: false,
            reserves_client_target: false,
            validates_windows: false,
            programs_color: false,
        }
    }

    /// Returns the same profile limited to `allowed` unit types.
    #[must_use]
    pub const fn with_allowed(self, allowed: UnitTypeMask) -> Self {
        Self { allowed, ..self }
    }

    /// Unit types to try, in order, after applying the mask.
    pub fn candidate_types(&self) -> impl Iterator<Item = UnitType> + '_ {
        self.preference
            .iter()
            .copied()
            .filter(|t| self.allowed.contains(t.mask()))
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn pre_assign_bits_follow_mode() {
        let mask = PreAssign::PRIMARY_MAIN_PRIMARY | PreAssign::EXTERNAL_MAIN_EXTERNAL;
        assert!(mask.allows(DisplayId::PRIMARY, DisplayMode::PrimaryMain));
        assert!(!mask.allows(DisplayId::PRIMARY, DisplayMode::ExternalMain));
        assert!(mask.allows(DisplayId::EXTERNAL, DisplayMode::ExternalMain));
        assert!(!mask.allows(DisplayId(9), DisplayMode::PrimaryMain));
    }

    #[test]
    fn mask_filters_preference() {
        let profile = DisplayProfile::primary(1080, 2400).with_allowed(UnitTypeMask::FETCH);
        let types: Vec<_> = profile.candidate_types().collect();
        assert!(!types.contains(&UnitType::G2d));
        assert_eq!(types.first(), Some(&UnitType::Gf));
    }

    #[test]
    fn virtual_display_uses_blit_only() {
        let profile = DisplayProfile::virtual_display(1920, 1080);
        let types: Vec<_> = profile.candidate_types().collect();
        assert_eq!(types, [UnitType::G2d]);
        assert!(!profile.reserves_blit_target);
        assert!(!profile.reserves_client_target);
    }
}
