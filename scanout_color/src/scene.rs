// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The color scene handed to the color-science collaborator.

use alloc::vec::Vec;

use scanout_core::layer::{ColorMatrix, Dataspace, HdrDynamicMetadata, HdrStaticMetadata, LayerId};
use scanout_core::pool::UnitId;

/// Display color mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorMode {
    /// Panel-native gamut, no conversion.
    #[default]
    Native,
    /// sRGB.
    Srgb,
    /// Display P3.
    DisplayP3,
    /// BT.2100 PQ.
    Bt2100Pq,
    /// BT.2100 HLG.
    Bt2100Hlg,
}

/// How out-of-gamut colors are mapped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderIntent {
    /// Preserve colorimetry; clip out-of-gamut colors.
    #[default]
    Colorimetric,
    /// Enhance saturation while preserving colorimetry where possible.
    Enhance,
    /// Tone-map HDR content, colorimetric otherwise.
    ToneMapColorimetric,
    /// Tone-map HDR content, enhanced otherwise.
    ToneMapEnhance,
}

/// Display-wide color settings.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DisplayColorSettings {
    /// Color mode.
    pub mode: ColorMode,
    /// Render intent.
    pub intent: RenderIntent,
    /// Global color matrix.
    pub matrix: ColorMatrix,
}

/// Which HDR metadata a slot carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HdrState {
    /// No HDR processing.
    #[default]
    Disabled,
    /// Static metadata only.
    StaticOnly,
    /// Dynamic metadata only.
    DynamicOnly,
    /// Both kinds.
    Both,
}

impl HdrState {
    /// The state for the metadata kinds present.
    #[must_use]
    pub const fn from_flags(has_static: bool, has_dynamic: bool) -> Self {
        match (has_static, has_dynamic) {
            (false, false) => Self::Disabled,
            (true, false) => Self::StaticOnly,
            (false, true) => Self::DynamicOnly,
            (true, true) => Self::Both,
        }
    }

    /// Returns `true` if static metadata is in use.
    #[must_use]
    pub const fn has_static(self) -> bool {
        matches!(self, Self::StaticOnly | Self::Both)
    }

    /// Returns `true` if dynamic metadata is in use.
    #[must_use]
    pub const fn has_dynamic(self) -> bool {
        matches!(self, Self::DynamicOnly | Self::Both)
    }

    /// States passed through on the way to `next`.
    ///
    /// Dropping a metadata kind always goes through [`Disabled`](Self::Disabled)
    /// first, so no state from the lost kind survives. Gaining a kind, or
    /// staying put, is a direct step.
    pub fn path(self, next: Self) -> impl Iterator<Item = Self> {
        let loses = (self.has_static() && !next.has_static())
            || (self.has_dynamic() && !next.has_dynamic());
        let disable = (loses && next != Self::Disabled).then_some(Self::Disabled);
        disable.into_iter().chain((self != next).then_some(next))
    }
}

/// Color state of one hardware-composed layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerColorData {
    /// Layer in this slot.
    pub layer: LayerId,
    /// Unit that composes it.
    pub unit: UnitId,
    /// Source dataspace.
    pub dataspace: Dataspace,
    /// Static HDR metadata.
    pub static_metadata: Option<HdrStaticMetadata>,
    /// Dynamic HDR metadata.
    pub dynamic_metadata: Option<HdrDynamicMetadata>,
    /// Per-layer color transform.
    pub matrix: ColorMatrix,
    /// HDR processing state.
    pub hdr: HdrState,
}

impl LayerColorData {
    /// A fresh slot with no HDR processing.
    #[must_use]
    pub fn new(layer: LayerId, unit: UnitId) -> Self {
        Self {
            layer,
            unit,
            dataspace: Dataspace::UNKNOWN,
            static_metadata: None,
            dynamic_metadata: None,
            matrix: ColorMatrix::IDENTITY,
            hdr: HdrState::Disabled,
        }
    }
}

/// Frame-scoped color state of one display.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayScene {
    /// Display-wide settings.
    pub display: DisplayColorSettings,
    /// One slot per hardware-composed layer, in z-order.
    pub layers: Vec<LayerColorData>,
}

impl DisplayScene {
    /// Slot holding `layer`.
    #[must_use]
    pub fn slot_of(&self, layer: LayerId) -> Option<usize> {
        self.layers.iter().position(|d| d.layer == layer)
    }
}
