// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Color property blob encoding.
//!
//! The kernel takes color programming as opaque property blobs, one per
//! stage. [`ColorEncoder`] lays each enabled stage out in the kernel's C
//! layout and creates a blob through a [`BlobSink`]. A disabled stage is
//! written as [`BlobId::NULL`], which clears it.
//!
//! Blobs stay alive until the frame that replaced them has been flipped:
//! [`ColorEncoder::encode`] parks the new set as pending, and
//! [`ColorEncoder::release_retired`] destroys the previous set once the flip
//! completes.

use alloc::vec::Vec;
use core::fmt;

use bytemuck::{Pod, Zeroable};
use scanout_core::catalog::{Catalog, Features, UnitKind};
use scanout_core::layer::LayerId;
use scanout_core::pool::{UnitId, UnitPool};

use crate::collaborator::{
    CGC_LUT_LEN, ChannelLut, ColorError, DEGAMMA_LUT_LEN, DTM_LUT_LEN, DisplayColor, DtmData,
    EOTF_LUT_LEN, MatrixData, OETF_LUT_LEN, REGAMMA_LUT_LEN, Stage, TransferFunction,
};
use crate::scene::DisplayScene;

/// Kernel property blob handle. Zero means "no blob".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlobId(pub u32);

impl BlobId {
    /// The null blob; clears a stage.
    pub const NULL: Self = Self(0);

    /// Returns `true` for [`BlobId::NULL`].
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Blob creation failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlobError {
    /// The kernel rejected the blob; carries the errno.
    CreateFailed(i32),
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateFailed(errno) => write!(f, "blob creation failed (errno {errno})"),
        }
    }
}

impl core::error::Error for BlobError {}

/// Creates and destroys property blobs.
pub trait BlobSink {
    /// Creates a blob holding `bytes`.
    fn create(&mut self, bytes: &[u8]) -> Result<BlobId, BlobError>;

    /// Destroys a blob. Never called with [`BlobId::NULL`].
    fn destroy(&mut self, id: BlobId);
}

/// One programmable color stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorStage {
    /// Plane EOTF.
    Eotf,
    /// Plane gamut mapping.
    Gm,
    /// Plane dynamic tone mapping.
    Dtm,
    /// Plane OETF.
    Oetf,
    /// Display 3D LUT.
    Cgc,
    /// Display degamma.
    Degamma,
    /// Display regamma.
    Regamma,
    /// Display gamma-space matrix.
    GammaMatrix,
    /// Display linear-space matrix.
    LinearMatrix,
}

/// Encoding failure. Blobs created before the failure are destroyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EncodeError {
    /// Stage data has the wrong number of entries.
    Length {
        /// Stage.
        stage: ColorStage,
        /// Entries the hardware takes.
        expected: usize,
        /// Entries supplied.
        actual: usize,
    },
    /// The sink refused a blob.
    Blob {
        /// Stage.
        stage: ColorStage,
        /// Cause.
        error: BlobError,
    },
    /// The collaborator has no plane data for a slot.
    MissingDpp(usize),
    /// The collaborator rejected the scene.
    Collaborator(ColorError),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length {
                stage,
                expected,
                actual,
            } => write!(f, "{stage:?}: expected {expected} entries, got {actual}"),
            Self::Blob { stage, error } => write!(f, "{stage:?}: {error}"),
            Self::MissingDpp(slot) => write!(f, "no plane color data for slot {slot}"),
            Self::Collaborator(e) => write!(f, "{e}"),
        }
    }
}

impl core::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Blob { error, .. } => Some(error),
            Self::Collaborator(e) => Some(e),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Kernel layouts
// ---------------------------------------------------------------------------

/// One entry of a kernel color LUT.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrmColorLut {
    /// Red.
    pub red: u16,
    /// Green.
    pub green: u16,
    /// Blue.
    pub blue: u16,
    /// Unused.
    pub reserved: u16,
}

/// Plane gamut-mapping blob.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GmBlob {
    /// Coefficients.
    pub coeffs: [u32; 9],
    /// Offsets.
    pub offsets: [u32; 3],
}

/// Display matrix blob.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DqeMatrixBlob {
    /// Coefficients.
    pub coeffs: [u16; 9],
    /// Offsets.
    pub offsets: [u16; 3],
}

/// Appends fields with C struct alignment.
#[derive(Debug, Default)]
struct BlobWriter {
    bytes: Vec<u8>,
    align: usize,
}

impl BlobWriter {
    fn field<T: Pod>(&mut self, data: &[T]) -> &mut Self {
        self.pad_to(align_of::<T>());
        self.align = self.align.max(align_of::<T>());
        self.bytes.extend_from_slice(bytemuck::cast_slice(data));
        self
    }

    fn pad_to(&mut self, align: usize) {
        let len = self.bytes.len().next_multiple_of(align);
        self.bytes.resize(len, 0);
    }

    fn finish(&mut self) -> Vec<u8> {
        self.pad_to(self.align.max(1));
        core::mem::take(&mut self.bytes)
    }
}

fn check_len(stage: ColorStage, expected: usize, actual: usize) -> Result<(), EncodeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EncodeError::Length {
            stage,
            expected,
            actual,
        })
    }
}

fn curve_bytes<X: Pod, Y: Pod>(
    stage: ColorStage,
    len: usize,
    tf: &TransferFunction<X, Y>,
    w: &mut BlobWriter,
) -> Result<(), EncodeError> {
    check_len(stage, len, tf.posx.len())?;
    check_len(stage, len, tf.posy.len())?;
    w.field(&tf.posx).field(&tf.posy);
    Ok(())
}

fn eotf_bytes(tf: &TransferFunction<u16, u32>) -> Result<Vec<u8>, EncodeError> {
    let mut w = BlobWriter::default();
    curve_bytes(ColorStage::Eotf, EOTF_LUT_LEN, tf, &mut w)?;
    Ok(w.finish())
}

fn oetf_bytes(tf: &TransferFunction<u32, u16>) -> Result<Vec<u8>, EncodeError> {
    let mut w = BlobWriter::default();
    curve_bytes(ColorStage::Oetf, OETF_LUT_LEN, tf, &mut w)?;
    Ok(w.finish())
}

fn dtm_bytes(dtm: &DtmData) -> Result<Vec<u8>, EncodeError> {
    let mut w = BlobWriter::default();
    curve_bytes(ColorStage::Dtm, DTM_LUT_LEN, &dtm.curve, &mut w)?;
    w.field(&[
        dtm.coeff_r,
        dtm.coeff_g,
        dtm.coeff_b,
        dtm.rng_x_min,
        dtm.rng_x_max,
        dtm.rng_y_min,
        dtm.rng_y_max,
    ]);
    Ok(w.finish())
}

fn gm_bytes(m: &MatrixData<u32>) -> Vec<u8> {
    bytemuck::bytes_of(&GmBlob {
        coeffs: m.coeffs,
        offsets: m.offsets,
    })
    .to_vec()
}

fn dqe_matrix_bytes(m: &MatrixData<u16>) -> Vec<u8> {
    bytemuck::bytes_of(&DqeMatrixBlob {
        coeffs: m.coeffs,
        offsets: m.offsets,
    })
    .to_vec()
}

fn cgc_bytes(lut: &ChannelLut<u32>) -> Result<Vec<u8>, EncodeError> {
    for channel in [&lut.r, &lut.g, &lut.b] {
        check_len(ColorStage::Cgc, CGC_LUT_LEN, channel.len())?;
    }
    let mut w = BlobWriter::default();
    w.field(&lut.r).field(&lut.g).field(&lut.b);
    Ok(w.finish())
}

fn degamma_bytes(lut: &[u16]) -> Result<Vec<u8>, EncodeError> {
    check_len(ColorStage::Degamma, DEGAMMA_LUT_LEN, lut.len())?;
    let entries: Vec<DrmColorLut> = lut
        .iter()
        .map(|&red| DrmColorLut {
            red,
            ..DrmColorLut::default()
        })
        .collect();
    Ok(bytemuck::cast_slice::<DrmColorLut, u8>(&entries).to_vec())
}

fn regamma_bytes(lut: &ChannelLut<u16>) -> Result<Vec<u8>, EncodeError> {
    for channel in [&lut.r, &lut.g, &lut.b] {
        check_len(ColorStage::Regamma, REGAMMA_LUT_LEN, channel.len())?;
    }
    let entries: Vec<DrmColorLut> = lut
        .r
        .iter()
        .zip(&lut.g)
        .zip(&lut.b)
        .map(|((&red, &green), &blue)| DrmColorLut {
            red,
            green,
            blue,
            reserved: 0,
        })
        .collect();
    Ok(bytemuck::cast_slice::<DrmColorLut, u8>(&entries).to_vec())
}

// ---------------------------------------------------------------------------
// Blob sets
// ---------------------------------------------------------------------------

/// Blobs for one hardware-composed plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlaneColorBlobs {
    /// Layer on the plane.
    pub layer: LayerId,
    /// Fetch unit backing the plane.
    pub unit: UnitId,
    /// EOTF.
    pub eotf: BlobId,
    /// Gamut mapping.
    pub gm: BlobId,
    /// Dynamic tone mapping.
    pub dtm: BlobId,
    /// OETF.
    pub oetf: BlobId,
}

/// Blobs for the display pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CrtcColorBlobs {
    /// 3D LUT.
    pub cgc: BlobId,
    /// Degamma.
    pub degamma: BlobId,
    /// Regamma.
    pub regamma: BlobId,
    /// Gamma-space matrix.
    pub gamma_matrix: BlobId,
    /// Linear-space matrix.
    pub linear_matrix: BlobId,
}

/// Every color blob of one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorBlobs {
    /// Per-plane blobs, in scene order. Blit-unit slots have none.
    pub planes: Vec<PlaneColorBlobs>,
    /// Display blobs.
    pub crtc: CrtcColorBlobs,
}

impl ColorBlobs {
    /// Non-null blob ids in the set.
    pub fn ids(&self) -> impl Iterator<Item = BlobId> + '_ {
        let c = &self.crtc;
        self.planes
            .iter()
            .flat_map(|p| [p.eotf, p.gm, p.dtm, p.oetf])
            .chain([
                c.cgc,
                c.degamma,
                c.regamma,
                c.gamma_matrix,
                c.linear_matrix,
            ])
            .filter(|id| !id.is_null())
    }

    /// Plane blobs of `layer`.
    #[must_use]
    pub fn plane(&self, layer: LayerId) -> Option<&PlaneColorBlobs> {
        self.planes.iter().find(|p| p.layer == layer)
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Tracks one blob set from creation until it can be released.
struct Session<'s> {
    sink: &'s mut dyn BlobSink,
    created: Vec<BlobId>,
}

impl Session<'_> {
    fn stage<T>(
        &mut self,
        stage: ColorStage,
        data: &Stage<T>,
        bytes: impl FnOnce(&T) -> Result<Vec<u8>, EncodeError>,
    ) -> Result<BlobId, EncodeError> {
        if !data.enable {
            return Ok(BlobId::NULL);
        }
        let bytes = bytes(&data.data)?;
        let id = self
            .sink
            .create(&bytes)
            .map_err(|error| EncodeError::Blob { stage, error })?;
        self.created.push(id);
        Ok(id)
    }

    fn rollback(self) {
        for id in self.created {
            if !id.is_null() {
                self.sink.destroy(id);
            }
        }
    }
}

/// Turns collaborator output into blobs and owns them until retired.
#[derive(Debug, Default)]
pub struct ColorEncoder {
    /// Encoded but not yet flipped.
    pending: Option<ColorBlobs>,
    /// Replaced before they were flipped.
    superseded: Vec<ColorBlobs>,
    /// On screen.
    live: Option<ColorBlobs>,
}

impl ColorEncoder {
    /// Creates an encoder with no blobs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blobs of the last successful encode that has not been flipped.
    #[must_use]
    pub fn pending(&self) -> Option<&ColorBlobs> {
        self.pending.as_ref()
    }

    /// Blobs currently on screen.
    #[must_use]
    pub fn live(&self) -> Option<&ColorBlobs> {
        self.live.as_ref()
    }

    /// Encodes every enabled stage of the collaborator's current output.
    ///
    /// Slots on blit units get no plane blobs. Tone mapping is only written
    /// for units that have it. On error nothing created by this call
    /// survives and the previous pending set is kept.
    pub fn encode(
        &mut self,
        scene: &DisplayScene,
        color: &dyn DisplayColor,
        pool: &UnitPool,
        catalog: &Catalog,
        sink: &mut dyn BlobSink,
    ) -> Result<ColorBlobs, EncodeError> {
        let mut session = Session {
            sink,
            created: Vec::new(),
        };
        match Self::encode_in(&mut session, scene, color, pool, catalog) {
            Ok(blobs) => {
                if let Some(old) = self.pending.replace(blobs.clone()) {
                    self.superseded.push(old);
                }
                Ok(blobs)
            }
            Err(e) => {
                session.rollback();
                Err(e)
            }
        }
    }

    fn encode_in(
        session: &mut Session<'_>,
        scene: &DisplayScene,
        color: &dyn DisplayColor,
        pool: &UnitPool,
        catalog: &Catalog,
    ) -> Result<ColorBlobs, EncodeError> {
        let mut planes = Vec::with_capacity(scene.layers.len());
        for (slot, data) in scene.layers.iter().enumerate() {
            let Some(unit) = pool.unit(data.unit) else {
                continue;
            };
            let unit_type = unit.desc.unit_type;
            if unit_type.kind() == UnitKind::Blit {
                continue;
            }
            let dpp = color.dpp(slot).ok_or(EncodeError::MissingDpp(slot))?;
            let dtm = if catalog.features(unit_type).contains(Features::HDR10_PLUS) {
                session.stage(ColorStage::Dtm, &dpp.dtm, dtm_bytes)?
            } else {
                BlobId::NULL
            };
            planes.push(PlaneColorBlobs {
                layer: data.layer,
                unit: data.unit,
                eotf: session.stage(ColorStage::Eotf, &dpp.eotf, eotf_bytes)?,
                gm: session.stage(ColorStage::Gm, &dpp.gm, |m| Ok(gm_bytes(m)))?,
                dtm,
                oetf: session.stage(ColorStage::Oetf, &dpp.oetf, oetf_bytes)?,
            });
        }

        let dqe = color.dqe();
        let crtc = CrtcColorBlobs {
            cgc: session.stage(ColorStage::Cgc, &dqe.cgc, cgc_bytes)?,
            degamma: session.stage(ColorStage::Degamma, &dqe.degamma, |l| degamma_bytes(l))?,
            regamma: session.stage(ColorStage::Regamma, &dqe.regamma, regamma_bytes)?,
            gamma_matrix: session.stage(ColorStage::GammaMatrix, &dqe.gamma_matrix, |m| {
                Ok(dqe_matrix_bytes(m))
            })?,
            linear_matrix: session.stage(ColorStage::LinearMatrix, &dqe.linear_matrix, |m| {
                Ok(dqe_matrix_bytes(m))
            })?,
        };
        Ok(ColorBlobs { planes, crtc })
    }

    /// Called once the frame carrying the pending set is on screen.
    ///
    /// Destroys the previously live set and any set that was replaced
    /// before reaching the screen, then makes the pending set live. With
    /// nothing pending the live set stays.
    pub fn release_retired(&mut self, sink: &mut dyn BlobSink) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let retired = self.superseded.drain(..).chain(self.live.take());
        for set in retired {
            for id in set.ids() {
                sink.destroy(id);
            }
        }
        self.live = Some(pending);
    }

    /// Destroys every blob the encoder holds.
    pub fn clear(&mut self, sink: &mut dyn BlobSink) {
        let all = self
            .superseded
            .drain(..)
            .chain(self.pending.take())
            .chain(self.live.take());
        for set in all {
            for id in set.ids() {
                sink.destroy(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use scanout_core::topology::Topology;

    use super::*;
    use crate::collaborator::{DppColor, DqeColor, NullDisplayColor};
    use crate::scene::LayerColorData;

    #[derive(Default)]
    struct Sink {
        next: u32,
        live: Vec<(BlobId, usize)>,
        fail_after: Option<usize>,
    }

    impl BlobSink for Sink {
        fn create(&mut self, bytes: &[u8]) -> Result<BlobId, BlobError> {
            if self.fail_after.is_some_and(|n| self.live.len() >= n) {
                return Err(BlobError::CreateFailed(-12));
            }
            self.next += 1;
            let id = BlobId(self.next);
            self.live.push((id, bytes.len()));
            Ok(id)
        }

        fn destroy(&mut self, id: BlobId) {
            self.live.retain(|&(b, _)| b != id);
        }
    }

    struct Fixed {
        dpp: Vec<DppColor>,
        dqe: DqeColor,
    }

    impl DisplayColor for Fixed {
        fn update(&mut self, _: &DisplayScene) -> Result<(), ColorError> {
            Ok(())
        }

        fn dpp(&self, record: usize) -> Option<&DppColor> {
            self.dpp.get(record)
        }

        fn dqe(&self) -> &DqeColor {
            &self.dqe
        }
    }

    fn full_dpp() -> DppColor {
        DppColor {
            eotf: Stage::enabled(TransferFunction {
                posx: vec![0; EOTF_LUT_LEN],
                posy: vec![0; EOTF_LUT_LEN],
            }),
            gm: Stage::enabled(MatrixData::default()),
            dtm: Stage::enabled(DtmData {
                curve: TransferFunction {
                    posx: vec![0; DTM_LUT_LEN],
                    posy: vec![0; DTM_LUT_LEN],
                },
                ..DtmData::default()
            }),
            oetf: Stage::enabled(TransferFunction {
                posx: vec![0; OETF_LUT_LEN],
                posy: vec![0; OETF_LUT_LEN],
            }),
        }
    }

    fn unit_named(pool: &UnitPool, name: &str) -> UnitId {
        pool.units()
            .find(|u| u.desc.name == name)
            .map(|u| u.id)
            .unwrap()
    }

    fn scene(units: &[UnitId]) -> DisplayScene {
        DisplayScene {
            layers: units
                .iter()
                .enumerate()
                .map(|(i, &u)| LayerColorData::new(LayerId(i as u64 + 1), u))
                .collect(),
            ..DisplayScene::default()
        }
    }

    #[test]
    fn layouts_match_the_kernel_structs() {
        let dpp = full_dpp();
        assert_eq!(eotf_bytes(&dpp.eotf.data).unwrap().len(), 776);
        assert_eq!(oetf_bytes(&dpp.oetf.data).unwrap().len(), 200);
        assert_eq!(dtm_bytes(&dpp.dtm.data).unwrap().len(), 216);
        assert_eq!(gm_bytes(&MatrixData::default()).len(), 48);
        assert_eq!(dqe_matrix_bytes(&MatrixData::default()).len(), 24);
        assert_eq!(degamma_bytes(&[0; DEGAMMA_LUT_LEN]).unwrap().len(), 65 * 8);
    }

    #[test]
    fn degamma_fills_red_only() {
        let mut lut = vec![0_u16; DEGAMMA_LUT_LEN];
        lut[1] = 0x1234;
        let bytes = degamma_bytes(&lut).unwrap();
        let entry = &bytes[8..16];
        assert_eq!(u16::from_ne_bytes([entry[0], entry[1]]), 0x1234);
        assert!(entry[2..].iter().all(|&b| b == 0), "green/blue not zero");
    }

    #[test]
    fn wrong_length_is_reported() {
        let tf = TransferFunction {
            posx: vec![0_u16; EOTF_LUT_LEN],
            posy: vec![0_u32; 12],
        };
        assert_eq!(
            eotf_bytes(&tf),
            Err(EncodeError::Length {
                stage: ColorStage::Eotf,
                expected: EOTF_LUT_LEN,
                actual: 12,
            })
        );
    }

    #[test]
    fn disabled_stages_are_null() {
        let pool = UnitPool::new(&Topology::gs101()).unwrap();
        let gf = unit_named(&pool, "DPP_GF0");
        let mut color = NullDisplayColor::default();
        let scene = scene(&[gf]);
        color.update(&scene).unwrap();
        let mut sink = Sink::default();
        let blobs = ColorEncoder::new()
            .encode(&scene, &color, &pool, &Catalog::gs101(), &mut sink)
            .unwrap();
        assert_eq!(blobs.planes.len(), 1);
        assert_eq!(blobs.ids().count(), 0);
        assert!(sink.live.is_empty());
    }

    #[test]
    fn blit_slots_get_no_plane_blobs_and_dtm_needs_hdr10_plus() {
        let pool = UnitPool::new(&Topology::gs101()).unwrap();
        let catalog = Catalog::gs101();
        let gf = unit_named(&pool, "DPP_GF0");
        let blit = pool
            .units()
            .find(|u| u.desc.unit_type.kind() == UnitKind::Blit)
            .map(|u| u.id)
            .unwrap();
        let color = Fixed {
            dpp: vec![full_dpp(), full_dpp()],
            dqe: DqeColor::default(),
        };
        let mut sink = Sink::default();
        let blobs = ColorEncoder::new()
            .encode(&scene(&[blit, gf]), &color, &pool, &catalog, &mut sink)
            .unwrap();
        assert_eq!(blobs.planes.len(), 1);
        let plane = blobs.planes[0];
        assert_eq!(plane.unit, gf);
        assert!(!plane.eotf.is_null());
        let has_dtm = catalog
            .features(pool.unit(gf).unwrap().desc.unit_type)
            .contains(Features::HDR10_PLUS);
        assert_eq!(plane.dtm.is_null(), !has_dtm);
    }

    #[test]
    fn failure_destroys_what_it_created() {
        let pool = UnitPool::new(&Topology::gs101()).unwrap();
        let gf = unit_named(&pool, "DPP_GF0");
        let color = Fixed {
            dpp: vec![full_dpp()],
            dqe: DqeColor::default(),
        };
        let mut sink = Sink {
            fail_after: Some(1),
            ..Sink::default()
        };
        let mut encoder = ColorEncoder::new();
        let err = encoder
            .encode(&scene(&[gf]), &color, &pool, &Catalog::gs101(), &mut sink)
            .unwrap_err();
        assert!(matches!(err, EncodeError::Blob { .. }));
        assert!(sink.live.is_empty());
        assert!(encoder.pending().is_none());
    }

    #[test]
    fn previous_set_is_destroyed_after_flip() {
        let pool = UnitPool::new(&Topology::gs101()).unwrap();
        let gf = unit_named(&pool, "DPP_GF0");
        let color = Fixed {
            dpp: vec![full_dpp()],
            dqe: DqeColor::default(),
        };
        let catalog = Catalog::gs101();
        let scene = scene(&[gf]);
        let mut sink = Sink::default();
        let mut encoder = ColorEncoder::new();

        let first = encoder
            .encode(&scene, &color, &pool, &catalog, &mut sink)
            .unwrap();
        encoder.release_retired(&mut sink);
        let second = encoder
            .encode(&scene, &color, &pool, &catalog, &mut sink)
            .unwrap();
        let count = first.ids().count();
        assert_eq!(sink.live.len(), 2 * count);

        encoder.release_retired(&mut sink);
        assert_eq!(sink.live.len(), count);
        assert!(second.ids().all(|id| sink.live.iter().any(|&(b, _)| b == id)));

        encoder.clear(&mut sink);
        assert!(sink.live.is_empty());
    }
}
