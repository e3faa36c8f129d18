// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame-to-frame color scene builder.
//!
//! A [`ColorSceneBuilder`] keeps the previous frame's [`DisplayScene`] and
//! rebuilds it in place. Slots are reused in order: the first layer recorded
//! in a frame gets slot 0, the next slot 1, and so on. Setters compare
//! against the stored value and mark a dirty channel only on change, so a
//! frame identical to the last one leaves every channel clean.
//!
//! Population is two-pass. All layers are recorded before any color data is
//! set, so slot indices are fixed for the rest of the frame.

use alloc::vec::Vec;

use scanout_core::allocator::{FrameAssignment, Target};
use scanout_core::layer::{
    ColorMatrix, Dataspace, HdrDynamicMetadata, HdrStaticMetadata, Layer, LayerId,
};
use scanout_core::pool::UnitId;
use understory_dirty::{CycleHandling, DirtyTracker};

use crate::collaborator::ColorError;
use crate::dirty;
use crate::scene::{DisplayColorSettings, DisplayScene, HdrState, LayerColorData};

/// Keeps one display's color scene and what changed in it.
#[derive(Debug)]
pub struct ColorSceneBuilder {
    scene: DisplayScene,
    /// Slots recorded since `begin_frame`.
    cursor: usize,
    dirty: DirtyTracker<u32>,
}

impl Default for ColorSceneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorSceneBuilder {
    /// Creates an empty builder. The first frame always reports a change.
    #[must_use]
    pub fn new() -> Self {
        let mut dirty = DirtyTracker::with_cycle_handling(CycleHandling::Error);
        dirty.mark(dirty::DISPLAY_KEY, dirty::DISPLAY);
        Self {
            scene: DisplayScene::default(),
            cursor: 0,
            dirty,
        }
    }

    /// The current scene.
    #[must_use]
    pub fn scene(&self) -> &DisplayScene {
        &self.scene
    }

    /// Number of slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.scene.layers.len()
    }

    /// Starts recording a frame.
    pub fn begin_frame(&mut self) {
        self.cursor = 0;
    }

    /// Records `layer` on `unit` in the next slot and returns its index.
    ///
    /// An existing slot is reused; its color data is kept so unchanged
    /// values do not mark anything.
    pub fn record_layer(&mut self, layer: LayerId, unit: UnitId) -> usize {
        let idx = self.cursor;
        self.cursor += 1;
        match self.scene.layers.get_mut(idx) {
            Some(slot) => {
                if slot.layer != layer || slot.unit != unit {
                    slot.layer = layer;
                    slot.unit = unit;
                    self.dirty.mark(key(idx), dirty::MAPPING);
                }
            }
            None => {
                self.scene.layers.push(LayerColorData::new(layer, unit));
                self.dirty.mark(key(idx), dirty::MAPPING);
            }
        }
        idx
    }

    /// Finishes recording. Slots past the last one recorded are dropped.
    pub fn end_frame(&mut self) {
        let len = self.scene.layers.len();
        if self.cursor < len {
            for idx in self.cursor..len {
                self.dirty.remove_key(key(idx));
            }
            self.scene.layers.truncate(self.cursor);
            self.dirty.mark(dirty::DISPLAY_KEY, dirty::MAPPING);
        }
    }

    fn slot(&mut self, idx: usize) -> Result<&mut LayerColorData, ColorError> {
        self.scene
            .layers
            .get_mut(idx)
            .ok_or(ColorError::UnknownSlot(idx))
    }

    /// Sets the dataspace of slot `idx`.
    pub fn set_dataspace(&mut self, idx: usize, dataspace: Dataspace) -> Result<(), ColorError> {
        let slot = self.slot(idx)?;
        if slot.dataspace != dataspace {
            slot.dataspace = dataspace;
            self.dirty.mark(key(idx), dirty::DATASPACE);
        }
        Ok(())
    }

    /// Sets or clears the static HDR metadata of slot `idx`.
    pub fn set_hdr_static(
        &mut self,
        idx: usize,
        metadata: Option<HdrStaticMetadata>,
    ) -> Result<(), ColorError> {
        let slot = self.slot(idx)?;
        if slot.static_metadata != metadata {
            slot.static_metadata = metadata;
            settle_hdr(slot);
            self.dirty.mark(key(idx), dirty::HDR_STATIC);
        }
        Ok(())
    }

    /// Sets or clears the dynamic HDR metadata of slot `idx`.
    pub fn set_hdr_dynamic(
        &mut self,
        idx: usize,
        metadata: Option<&HdrDynamicMetadata>,
    ) -> Result<(), ColorError> {
        let slot = self.slot(idx)?;
        if slot.dynamic_metadata.as_ref() != metadata {
            slot.dynamic_metadata = metadata.cloned();
            settle_hdr(slot);
            self.dirty.mark(key(idx), dirty::HDR_DYNAMIC);
        }
        Ok(())
    }

    /// Sets the color transform of slot `idx`; `None` means identity.
    pub fn set_color_transform(
        &mut self,
        idx: usize,
        matrix: Option<ColorMatrix>,
    ) -> Result<(), ColorError> {
        let matrix = matrix.unwrap_or(ColorMatrix::IDENTITY);
        let slot = self.slot(idx)?;
        if slot.matrix != matrix {
            slot.matrix = matrix;
            self.dirty.mark(key(idx), dirty::MATRIX);
        }
        Ok(())
    }

    /// Sets the display-wide color settings.
    pub fn set_display_color(&mut self, settings: DisplayColorSettings) {
        if self.scene.display != settings {
            self.scene.display = settings;
            self.dirty.mark(dirty::DISPLAY_KEY, dirty::DISPLAY);
        }
    }

    /// Forces the next [`needs_reprogram`](Self::needs_reprogram) to report a
    /// change, e.g. after the display was powered back on.
    pub fn invalidate(&mut self) {
        self.dirty.mark(dirty::DISPLAY_KEY, dirty::DISPLAY);
    }

    /// Returns `true` if anything changed since the previous call. Drains
    /// every channel.
    pub fn needs_reprogram(&mut self) -> bool {
        let mut changed = false;
        for channel in dirty::ALL {
            let keys: Vec<u32> = self.dirty.drain(channel).deterministic().run().collect();
            changed |= !keys.is_empty();
        }
        changed
    }

    /// Rebuilds the scene from a frame's layers and its assignment.
    ///
    /// Layers on hardware units get a slot, in z-order; client-composed
    /// layers get none.
    pub fn populate(
        &mut self,
        layers: &[Layer],
        assignment: &FrameAssignment,
    ) -> Result<(), ColorError> {
        self.begin_frame();
        let mut recorded: Vec<(usize, &Layer)> = Vec::with_capacity(layers.len());
        for layer in layers {
            if let Some(Target::Unit(unit)) = assignment.target(layer.id) {
                recorded.push((self.record_layer(layer.id, unit), layer));
            }
        }
        self.end_frame();

        for (idx, layer) in recorded {
            self.set_dataspace(idx, layer.source.dataspace)?;
            self.set_hdr_static(idx, layer.hdr.static_metadata)?;
            self.set_hdr_dynamic(idx, layer.hdr.dynamic_metadata.as_ref())?;
            self.set_color_transform(idx, layer.color_transform)?;
        }
        Ok(())
    }
}

fn key(idx: usize) -> u32 {
    u32::try_from(idx).unwrap_or(dirty::DISPLAY_KEY - 1)
}

/// Moves a slot's HDR state to match its metadata.
fn settle_hdr(slot: &mut LayerColorData) {
    let next = HdrState::from_flags(
        slot.static_metadata.is_some(),
        slot.dynamic_metadata.is_some(),
    );
    for step in slot.hdr.path(next) {
        log::debug!("{:?}: hdr {:?} -> {step:?}", slot.layer, slot.hdr);
        slot.hdr = step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> HdrStaticMetadata {
        HdrStaticMetadata {
            max_luminance: 1000.0,
            ..HdrStaticMetadata::default()
        }
    }

    fn frame(b: &mut ColorSceneBuilder, layers: &[(u64, u32)]) -> Vec<usize> {
        b.begin_frame();
        let slots = layers
            .iter()
            .map(|&(l, u)| b.record_layer(LayerId(l), UnitId(u)))
            .collect();
        b.end_frame();
        slots
    }

    #[test]
    fn first_frame_is_dirty_and_identical_repeat_is_not() {
        let mut b = ColorSceneBuilder::new();
        frame(&mut b, &[(1, 0), (2, 1)]);
        assert!(b.needs_reprogram());
        frame(&mut b, &[(1, 0), (2, 1)]);
        assert!(!b.needs_reprogram());
    }

    #[test]
    fn slots_are_reused_in_order_and_shrink() {
        let mut b = ColorSceneBuilder::new();
        assert_eq!(frame(&mut b, &[(1, 0), (2, 1), (3, 2)]), [0, 1, 2]);
        assert_eq!(b.slot_count(), 3);
        b.needs_reprogram();

        assert_eq!(frame(&mut b, &[(1, 0)]), [0]);
        assert_eq!(b.slot_count(), 1);
        assert!(b.needs_reprogram());
    }

    #[test]
    fn unit_change_marks_mapping() {
        let mut b = ColorSceneBuilder::new();
        frame(&mut b, &[(1, 0)]);
        b.needs_reprogram();
        frame(&mut b, &[(1, 4)]);
        assert!(b.needs_reprogram());
    }

    #[test]
    fn setters_mark_only_on_change() {
        let mut b = ColorSceneBuilder::new();
        frame(&mut b, &[(1, 0)]);
        b.set_dataspace(0, Dataspace::SRGB).unwrap();
        b.needs_reprogram();

        b.set_dataspace(0, Dataspace::SRGB).unwrap();
        b.set_color_transform(0, None).unwrap();
        b.set_display_color(DisplayColorSettings::default());
        assert!(!b.needs_reprogram());

        b.set_dataspace(0, Dataspace::DISPLAY_P3).unwrap();
        assert!(b.needs_reprogram());
    }

    #[test]
    fn unknown_slot_is_an_error() {
        let mut b = ColorSceneBuilder::new();
        assert_eq!(
            b.set_dataspace(3, Dataspace::SRGB),
            Err(ColorError::UnknownSlot(3))
        );
    }

    #[test]
    fn dropping_static_metadata_disables_hdr() {
        let mut b = ColorSceneBuilder::new();
        frame(&mut b, &[(1, 0)]);
        b.set_hdr_static(0, Some(metadata())).unwrap();
        assert_eq!(b.scene().layers[0].hdr, HdrState::StaticOnly);
        b.needs_reprogram();

        frame(&mut b, &[(1, 0)]);
        b.set_hdr_static(0, None).unwrap();
        assert!(b.needs_reprogram());
        assert_eq!(b.scene().layers[0].hdr, HdrState::Disabled);
    }

    #[test]
    fn invalidate_forces_reprogram() {
        let mut b = ColorSceneBuilder::new();
        b.needs_reprogram();
        assert!(!b.needs_reprogram());
        b.invalidate();
        assert!(b.needs_reprogram());
    }
}
