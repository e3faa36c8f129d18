// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The color-science collaborator boundary.
//!
//! A [`DisplayColor`] implementation owns the actual color math. It is fed a
//! [`DisplayScene`] every frame and exposes per-plane ([`DppColor`]) and
//! per-display ([`DqeColor`]) register data. Every stage carries an
//! `enable` flag; a disabled stage is cleared in hardware rather than
//! programmed.
//!
//! LUT data is held in `Vec`s so a collaborator can hand over whatever it
//! computed; the encoder checks lengths against the hardware sizes below.

use alloc::vec::Vec;
use core::fmt;

use crate::scene::DisplayScene;

/// EOTF LUT points per plane.
pub const EOTF_LUT_LEN: usize = 129;
/// OETF LUT points per plane.
pub const OETF_LUT_LEN: usize = 33;
/// Tone-mapping LUT points per plane.
pub const DTM_LUT_LEN: usize = 33;
/// Degamma LUT entries per display.
pub const DEGAMMA_LUT_LEN: usize = 65;
/// Regamma LUT entries per channel per display.
pub const REGAMMA_LUT_LEN: usize = 65;
/// CGC (3D LUT) entries per channel per display.
pub const CGC_LUT_LEN: usize = 2457;
/// Matrix dimension.
pub const MATRIX_DIM: usize = 3;

/// One pipeline stage: its data and whether to program it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stage<T> {
    /// Program the stage; when `false` the stage is cleared.
    pub enable: bool,
    /// Register data.
    pub data: T,
}

impl<T> Stage<T> {
    /// An enabled stage.
    pub const fn enabled(data: T) -> Self {
        Self { enable: true, data }
    }
}

/// Piecewise transfer function: `posx[i]` maps to `posy[i]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferFunction<X, Y> {
    /// Input positions.
    pub posx: Vec<X>,
    /// Output positions.
    pub posy: Vec<Y>,
}

/// 3×3 matrix plus per-channel offsets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatrixData<T> {
    /// Row-major coefficients.
    pub coeffs: [T; MATRIX_DIM * MATRIX_DIM],
    /// Offsets.
    pub offsets: [T; MATRIX_DIM],
}

/// Dynamic tone-mapping data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DtmData {
    /// Tone curve.
    pub curve: TransferFunction<u16, u32>,
    /// Red luminance coefficient.
    pub coeff_r: u16,
    /// Green luminance coefficient.
    pub coeff_g: u16,
    /// Blue luminance coefficient.
    pub coeff_b: u16,
    /// Input range lower bound.
    pub rng_x_min: u16,
    /// Input range upper bound.
    pub rng_x_max: u16,
    /// Output range lower bound.
    pub rng_y_min: u16,
    /// Output range upper bound.
    pub rng_y_max: u16,
}

/// Per-channel LUT.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelLut<T> {
    /// Red.
    pub r: Vec<T>,
    /// Green.
    pub g: Vec<T>,
    /// Blue.
    pub b: Vec<T>,
}

/// Per-plane stages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DppColor {
    /// Linearizing transfer function.
    pub eotf: Stage<TransferFunction<u16, u32>>,
    /// Gamut mapping.
    pub gm: Stage<MatrixData<u32>>,
    /// Dynamic tone mapping; only some units have it.
    pub dtm: Stage<DtmData>,
    /// Re-encoding transfer function.
    pub oetf: Stage<TransferFunction<u32, u16>>,
}

/// Per-display stages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DqeColor {
    /// Color gamut conversion (3D LUT).
    pub cgc: Stage<ChannelLut<u32>>,
    /// Degamma LUT.
    pub degamma: Stage<Vec<u16>>,
    /// Regamma LUT.
    pub regamma: Stage<ChannelLut<u16>>,
    /// Gamma-space matrix.
    pub gamma_matrix: Stage<MatrixData<u16>>,
    /// Linear-space matrix.
    pub linear_matrix: Stage<MatrixData<u16>>,
}

/// Failure reported by a color collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorError {
    /// A slot index past the end of the scene.
    UnknownSlot(usize),
    /// The collaborator could not process the scene.
    Update(&'static str),
}

impl fmt::Display for ColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSlot(i) => write!(f, "no color slot {i}"),
            Self::Update(why) => write!(f, "color update failed: {why}"),
        }
    }
}

impl core::error::Error for ColorError {}

/// Color-science library interface.
pub trait DisplayColor {
    /// Pushes the current scene and recomputes stage data.
    fn update(&mut self, scene: &DisplayScene) -> Result<(), ColorError>;

    /// Plane stages for slot `record`, in scene order.
    fn dpp(&self, record: usize) -> Option<&DppColor>;

    /// Display stages.
    fn dqe(&self) -> &DqeColor;
}

/// A collaborator that leaves every stage disabled.
#[derive(Clone, Debug, Default)]
pub struct NullDisplayColor {
    dpp: Vec<DppColor>,
    dqe: DqeColor,
}

impl DisplayColor for NullDisplayColor {
    fn update(&mut self, scene: &DisplayScene) -> Result<(), ColorError> {
        self.dpp.resize(scene.layers.len(), DppColor::default());
        Ok(())
    }

    fn dpp(&self, record: usize) -> Option<&DppColor> {
        self.dpp.get(record)
    }

    fn dqe(&self) -> &DqeColor {
        &self.dqe
    }
}

#[cfg(test)]
mod tests {
    use scanout_core::layer::LayerId;
    use scanout_core::pool::UnitId;

    use super::*;
    use crate::scene::LayerColorData;

    #[test]
    fn null_collaborator_tracks_slot_count() {
        let mut color = NullDisplayColor::default();
        let mut scene = DisplayScene::default();
        scene
            .layers
            .push(LayerColorData::new(LayerId(1), UnitId(0)));
        scene
            .layers
            .push(LayerColorData::new(LayerId(2), UnitId(1)));
        color.update(&scene).unwrap();
        assert!(color.dpp(1).is_some_and(|d| !d.eotf.enable));
        assert!(color.dpp(2).is_none());

        scene.layers.pop();
        color.update(&scene).unwrap();
        assert!(color.dpp(1).is_none());
        assert!(!color.dqe().cgc.enable);
    }
}
