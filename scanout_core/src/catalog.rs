// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static restriction catalog.
//!
//! Every difference in behavior between hardware unit types is a lookup in
//! this module rather than a code path: which pixel formats a unit reads,
//! the size/alignment/scale row for each port and restriction class, the
//! feature bits, and the pixels-per-clock table used by the bandwidth model.
//!
//! A [`Catalog`] is a plain value built from `'static` tables.
//! [`Catalog::gs101()`] returns the shipping tables; tests and bring-up code
//! can assemble their own with [`Catalog::new`].
//!
//! Size rows keep the two kinds of scale bound apart ([`ScaleBound`]): a fixed
//! multiplier, or "crop ratio" where the bound is `max_crop / min_crop` of the
//! same row.

use core::fmt;

use bitflags::bitflags;

use crate::format::RestrictionClass::{Rgb, Yuv};
use crate::format::{PixelFormat, PpcFormat, RestrictionClass};

/// Hardware unit type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitType {
    /// Graphics fetch channel with compression support, no scaler.
    Gf,
    /// Video/graphics fetch channel, no scaler.
    Vg,
    /// Video/graphics fetch channel with a scaler.
    Vgs,
    /// Video/graphics fetch channel with compression support.
    Vgf,
    /// Video/graphics fetch channel with rotation, compression and scaler.
    Vgrfs,
    /// Memory-to-memory blit engine that merges several sources.
    G2d,
}

impl UnitType {
    /// Every unit type, in catalog order.
    pub const ALL: [Self; 6] = [
        Self::Gf,
        Self::Vg,
        Self::Vgs,
        Self::Vgf,
        Self::Vgrfs,
        Self::G2d,
    ];

    /// Returns whether this unit feeds the display directly or blits.
    #[must_use]
    pub const fn kind(self) -> UnitKind {
        match self {
            Self::G2d => UnitKind::Blit,
            _ => UnitKind::Fetch,
        }
    }

    /// Returns `true` if the hardware block has a scaler, whatever the
    /// catalog says.
    #[must_use]
    pub const fn has_scaler(self) -> bool {
        matches!(self, Self::Vgs | Self::Vgrfs | Self::G2d)
    }

    /// Returns `true` if the hardware block can read compressed buffers.
    #[must_use]
    pub const fn has_decompressor(self) -> bool {
        matches!(self, Self::Gf | Self::Vgf | Self::Vgrfs | Self::G2d)
    }

    /// Returns the single-bit mask for this type.
    #[must_use]
    pub const fn mask(self) -> UnitTypeMask {
        match self {
            Self::Gf => UnitTypeMask::GF,
            Self::Vg => UnitTypeMask::VG,
            Self::Vgs => UnitTypeMask::VGS,
            Self::Vgf => UnitTypeMask::VGF,
            Self::Vgrfs => UnitTypeMask::VGRFS,
            Self::G2d => UnitTypeMask::G2D,
        }
    }
}

/// Whether a unit scans out directly or composes into a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Reads a buffer and feeds one display window. Single consumer.
    Fetch,
    /// Merges several sources into a composition target that is then shown
    /// through a fetch unit.
    Blit,
}

bitflags! {
    /// Set of unit types, used to restrict which types a display may use.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct UnitTypeMask: u8 {
        /// [`UnitType::Gf`].
        const GF = 1 << 0;
        /// [`UnitType::Vg`].
        const VG = 1 << 1;
        /// [`UnitType::Vgs`].
        const VGS = 1 << 2;
        /// [`UnitType::Vgf`].
        const VGF = 1 << 3;
        /// [`UnitType::Vgrfs`].
        const VGRFS = 1 << 4;
        /// [`UnitType::G2d`].
        const G2D = 1 << 5;
        /// Every fetch unit type.
        const FETCH = Self::GF.bits()
            | Self::VG.bits()
            | Self::VGS.bits()
            | Self::VGF.bits()
            | Self::VGRFS.bits();
    }
}

/// Which side of a unit a size row constrains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Port {
    /// Input image.
    Src,
    /// Output image.
    Dst,
}

bitflags! {
    /// Capabilities of a unit type.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Features: u32 {
        /// Reads compressed buffers.
        const COMPRESSION = 1 << 0;
        /// Block (dim region) mode.
        const BLOCK_MODE = 1 << 1;
        /// Partial window update.
        const WINDOW_UPDATE = 1 << 2;
        /// Scales.
        const SCALE = 1 << 3;
        /// Flips horizontally.
        const FLIP_H = 1 << 4;
        /// Flips vertically.
        const FLIP_V = 1 << 5;
        /// Rotates by 90°.
        const ROT_90 = 1 << 6;
        /// Dim layers.
        const DIM = 1 << 7;
        /// Wide color gamut.
        const WCG = 1 << 8;
        /// HDR10 static tone mapping.
        const HDR10 = 1 << 9;
        /// HDR10+ dynamic tone mapping.
        const HDR10_PLUS = 1 << 10;
        /// Per-layer color transform.
        const LAYER_TRANSFORM = 1 << 11;
        /// Capacity-limited; subject to the bandwidth model.
        const USE_CAPA = 1 << 12;
    }
}

/// Upper bound on a scale ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScaleBound {
    /// A fixed multiplier.
    Fixed(u32),
    /// `max_crop / min_crop` of the same row, per axis.
    CropRatio,
}

/// Size, alignment and scale limits for one (unit type, port, class).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RestrictionRow {
    /// Largest allowed `src / dst` ratio.
    pub max_down_scale: ScaleBound,
    /// Largest allowed `dst / src` ratio.
    pub max_up_scale: ScaleBound,
    /// Buffer width upper bound.
    pub max_full_width: u32,
    /// Buffer height upper bound.
    pub max_full_height: u32,
    /// Buffer width lower bound.
    pub min_full_width: u32,
    /// Buffer height lower bound.
    pub min_full_height: u32,
    /// Buffer width granularity.
    pub full_width_align: u32,
    /// Buffer height granularity.
    pub full_height_align: u32,
    /// Crop width upper bound.
    pub max_crop_width: u32,
    /// Crop height upper bound.
    pub max_crop_height: u32,
    /// Crop width lower bound.
    pub min_crop_width: u32,
    /// Crop height lower bound.
    pub min_crop_height: u32,
    /// Crop x granularity.
    pub crop_x_align: u32,
    /// Crop y granularity.
    pub crop_y_align: u32,
    /// Crop width granularity.
    pub crop_width_align: u32,
    /// Crop height granularity.
    pub crop_height_align: u32,
}

impl RestrictionRow {
    /// Builds a row from the sixteen columns of a hardware restriction table,
    /// in table order. The two scale columns are taken as given.
    #[must_use]
    pub const fn from_columns(
        max_down_scale: ScaleBound,
        max_up_scale: ScaleBound,
        c: [u32; 14],
    ) -> Self {
        Self {
            max_down_scale,
            max_up_scale,
            max_full_width: c[0],
            max_full_height: c[1],
            min_full_width: c[2],
            min_full_height: c[3],
            full_width_align: c[4],
            full_height_align: c[5],
            max_crop_width: c[6],
            max_crop_height: c[7],
            min_crop_width: c[8],
            min_crop_height: c[9],
            crop_x_align: c[10],
            crop_y_align: c[11],
            crop_width_align: c[12],
            crop_height_align: c[13],
        }
    }
}

/// One size-table entry. `port: None` applies to both ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SizeEntry {
    /// Unit type.
    pub unit: UnitType,
    /// Port, or `None` for both.
    pub port: Option<Port>,
    /// Restriction class.
    pub class: RestrictionClass,
    /// Limits.
    pub row: RestrictionRow,
}

/// Feature bits for one unit type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FeatureEntry {
    /// Unit type.
    pub unit: UnitType,
    /// Features.
    pub features: Features,
}

/// Scale bucket of the pixels-per-clock table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PpcScale {
    /// Same area.
    None,
    /// Down-scale by at most 4× in area.
    Down4,
    /// Down-scale by at most 9× in area.
    Down9,
    /// Down-scale by at most 16× in area.
    Down16,
    /// Down-scale by more than 16× in area.
    DownMore,
    /// Up-scale by at most 4× in area.
    Up4,
    /// Up-scale by more than 4× in area.
    UpMore,
}

impl PpcScale {
    /// Picks the bucket for a source and destination area.
    #[must_use]
    pub const fn from_areas(src: u64, dst: u64) -> Self {
        if src == dst {
            Self::None
        } else if src > dst {
            if src <= dst * 4 {
                Self::Down4
            } else if src <= dst * 9 {
                Self::Down9
            } else if src <= dst * 16 {
                Self::Down16
            } else {
                Self::DownMore
            }
        } else if dst <= src * 4 {
            Self::Up4
        } else {
            Self::UpMore
        }
    }

    const fn column(self) -> usize {
        match self {
            Self::None => 0,
            Self::Down4 => 1,
            Self::Down9 => 2,
            Self::Down16 => 3,
            Self::DownMore => 4,
            Self::Up4 => 5,
            Self::UpMore => 6,
        }
    }
}

/// One pixels-per-clock row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PpcEntry {
    /// Unit type.
    pub unit: UnitType,
    /// Format grouping.
    pub format: PpcFormat,
    /// Whether the source is rotated by 90°.
    pub rotated: bool,
    /// Pixels per clock, indexed by [`PpcScale`].
    pub ppc: [f32; 7],
}

/// Formats readable by one unit type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FormatEntry {
    /// Unit type.
    pub unit: UnitType,
    /// Supported formats.
    pub formats: &'static [PixelFormat],
}

/// Failure to find a restriction row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClassifyError {
    /// The unit type does not read this format, or has no size row for the
    /// port and class.
    NotSupported {
        /// Unit type queried.
        unit: UnitType,
        /// Port queried.
        port: Port,
        /// Format queried.
        format: PixelFormat,
    },
}

impl fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSupported { unit, port, format } => {
                write!(f, "{unit:?} has no {port:?} restriction for {format:?}")
            }
        }
    }
}

impl core::error::Error for ClassifyError {}

/// The restriction tables of one SoC.
#[derive(Clone, Copy, Debug)]
pub struct Catalog {
    formats: &'static [FormatEntry],
    sizes: &'static [SizeEntry],
    features: &'static [FeatureEntry],
    ppc: &'static [PpcEntry],
}

impl Catalog {
    /// Assembles a catalog from its tables.
    #[must_use]
    pub const fn new(
        formats: &'static [FormatEntry],
        sizes: &'static [SizeEntry],
        features: &'static [FeatureEntry],
        ppc: &'static [PpcEntry],
    ) -> Self {
        Self {
            formats,
            sizes,
            features,
            ppc,
        }
    }

    /// The gs101 tables.
    #[must_use]
    pub const fn gs101() -> Self {
        Self::new(GS101_FORMATS, GS101_SIZES, GS101_FEATURES, GS101_PPC)
    }

    /// Returns `true` if `unit` reads `format`.
    #[must_use]
    pub fn supports_format(&self, unit: UnitType, format: PixelFormat) -> bool {
        self.formats
            .iter()
            .any(|e| e.unit == unit && e.formats.contains(&format))
    }

    /// Looks up the size row for `unit`, `port` and the class of `format`.
    pub fn classify(
        &self,
        unit: UnitType,
        port: Port,
        format: PixelFormat,
    ) -> Result<RestrictionRow, ClassifyError> {
        let not_supported = ClassifyError::NotSupported { unit, port, format };
        if !self.supports_format(unit, format) {
            return Err(not_supported);
        }
        let class = format.restriction_class();
        self.sizes
            .iter()
            .find(|e| e.unit == unit && e.class == class && e.port.is_none_or(|p| p == port))
            .map(|e| e.row)
            .ok_or(not_supported)
    }

    /// Feature bits of `unit`; empty when the table has no entry.
    #[must_use]
    pub fn features(&self, unit: UnitType) -> Features {
        self.features
            .iter()
            .find(|e| e.unit == unit)
            .map_or(Features::empty(), |e| e.features)
    }

    /// Pixels per clock for a capacity-limited unit.
    #[must_use]
    pub fn ppc(
        &self,
        unit: UnitType,
        format: PpcFormat,
        rotated: bool,
        scale: PpcScale,
    ) -> Option<f32> {
        self.ppc
            .iter()
            .find(|e| e.unit == unit && e.format == format && e.rotated == rotated)
            .map(|e| e.ppc[scale.column()])
    }
}

// -- gs101 tables --

const DPP_RGB: &[PixelFormat] = &[
    PixelFormat::Rgb565,
    PixelFormat::Rgba8888,
    PixelFormat::Rgbx8888,
    PixelFormat::Bgra8888,
    PixelFormat::Rgba1010102,
];

const DPP_RGB_YUV: &[PixelFormat] = &[
    PixelFormat::Rgb565,
    PixelFormat::Rgba8888,
    PixelFormat::Rgbx8888,
    PixelFormat::Bgra8888,
    PixelFormat::Rgba1010102,
    PixelFormat::Nv12,
    PixelFormat::Nv12Multi,
    PixelFormat::Nv21,
    PixelFormat::Nv12TenBit,
    PixelFormat::P010,
];

const G2D_FORMATS: &[PixelFormat] = &[
    PixelFormat::Rgb565,
    PixelFormat::Rgb888,
    PixelFormat::Rgba8888,
    PixelFormat::Rgbx8888,
    PixelFormat::Bgra8888,
    PixelFormat::Rgba1010102,
    PixelFormat::Nv12,
    PixelFormat::Nv12Multi,
    PixelFormat::Nv12Tiled,
    PixelFormat::Nv21,
    PixelFormat::Nv12TenBit,
    PixelFormat::P010,
];

static GS101_FORMATS: &[FormatEntry] = &[
    FormatEntry {
        unit: UnitType::Gf,
        formats: DPP_RGB,
    },
    FormatEntry {
        unit: UnitType::Vg,
        formats: DPP_RGB_YUV,
    },
    FormatEntry {
        unit: UnitType::Vgs,
        formats: DPP_RGB_YUV,
    },
    FormatEntry {
        unit: UnitType::Vgf,
        formats: DPP_RGB_YUV,
    },
    FormatEntry {
        unit: UnitType::Vgrfs,
        formats: DPP_RGB_YUV,
    },
    FormatEntry {
        unit: UnitType::G2d,
        formats: G2D_FORMATS,
    },
];

const fn fixed(down: u32, up: u32, c: [u32; 14]) -> RestrictionRow {
    RestrictionRow::from_columns(ScaleBound::Fixed(down), ScaleBound::Fixed(up), c)
}

const DPP_RGB_COLS: [u32; 14] = [65535, 8191, 16, 16, 1, 1, 4096, 4096, 16, 16, 1, 1, 1, 1];
const DPP_YUV_SRC_COLS: [u32; 14] = [65534, 8190, 32, 32, 2, 2, 4096, 4096, 32, 32, 2, 2, 2, 2];

const fn size(
    unit: UnitType,
    port: Option<Port>,
    class: RestrictionClass,
    row: RestrictionRow,
) -> SizeEntry {
    SizeEntry {
        unit,
        port,
        class,
        row,
    }
}

static GS101_SIZES: &[SizeEntry] = &[
    // RGB
    size(UnitType::Gf, Some(Port::Src), Rgb, fixed(1, 1, DPP_RGB_COLS)),
    size(UnitType::Vg, Some(Port::Src), Rgb, fixed(1, 1, DPP_RGB_COLS)),
    size(UnitType::Vgs, Some(Port::Src), Rgb, fixed(2, 8, DPP_RGB_COLS)),
    size(UnitType::Vgf, Some(Port::Src), Rgb, fixed(1, 1, DPP_RGB_COLS)),
    size(UnitType::Vgrfs, Some(Port::Src), Rgb, fixed(2, 8, DPP_RGB_COLS)),
    size(UnitType::Gf, Some(Port::Dst), Rgb, fixed(1, 1, DPP_RGB_COLS)),
    size(UnitType::Vg, Some(Port::Dst), Rgb, fixed(1, 1, DPP_RGB_COLS)),
    size(UnitType::Vgs, Some(Port::Dst), Rgb, fixed(2, 8, DPP_RGB_COLS)),
    size(UnitType::Vgf, Some(Port::Dst), Rgb, fixed(1, 1, DPP_RGB_COLS)),
    size(UnitType::Vgrfs, Some(Port::Dst), Rgb, fixed(2, 8, DPP_RGB_COLS)),
    size(
        UnitType::G2d,
        None,
        Rgb,
        RestrictionRow::from_columns(
            ScaleBound::CropRatio,
            ScaleBound::CropRatio,
            [8192, 8192, 1, 1, 1, 1, 8192, 8192, 1, 1, 1, 1, 1, 1],
        ),
    ),
    // YUV. The scalers take 2× down and 4× up on chroma-subsampled input.
    size(UnitType::Gf, Some(Port::Src), Yuv, fixed(1, 1, DPP_YUV_SRC_COLS)),
    size(UnitType::Vg, Some(Port::Src), Yuv, fixed(1, 1, DPP_YUV_SRC_COLS)),
    size(UnitType::Vgs, Some(Port::Src), Yuv, fixed(2, 4, DPP_YUV_SRC_COLS)),
    size(UnitType::Vgf, Some(Port::Src), Yuv, fixed(1, 1, DPP_YUV_SRC_COLS)),
    size(UnitType::Vgrfs, Some(Port::Src), Yuv, fixed(2, 4, DPP_YUV_SRC_COLS)),
    size(
        UnitType::G2d,
        Some(Port::Src),
        Yuv,
        RestrictionRow::from_columns(
            ScaleBound::Fixed(4),
            ScaleBound::CropRatio,
            [8192, 8192, 2, 2, 2, 2, 8192, 8192, 1, 1, 1, 1, 1, 1],
        ),
    ),
    size(UnitType::Gf, Some(Port::Dst), Yuv, fixed(1, 1, DPP_RGB_COLS)),
    size(UnitType::Vg, Some(Port::Dst), Yuv, fixed(1, 1, DPP_RGB_COLS)),
    size(UnitType::Vgs, Some(Port::Dst), Yuv, fixed(2, 4, DPP_RGB_COLS)),
    size(UnitType::Vgf, Some(Port::Dst), Yuv, fixed(1, 1, DPP_RGB_COLS)),
    size(UnitType::Vgrfs, Some(Port::Dst), Yuv, fixed(2, 4, DPP_RGB_COLS)),
    size(
        UnitType::G2d,
        Some(Port::Dst),
        Yuv,
        RestrictionRow::from_columns(
            ScaleBound::CropRatio,
            ScaleBound::CropRatio,
            [8192, 8192, 2, 2, 2, 2, 8192, 8192, 2, 2, 2, 2, 2, 2],
        ),
    ),
];

const DPP_COMMON: Features = Features::COMPRESSION
    .union(Features::BLOCK_MODE)
    .union(Features::WINDOW_UPDATE)
    .union(Features::FLIP_H)
    .union(Features::FLIP_V)
    .union(Features::DIM)
    .union(Features::WCG)
    .union(Features::HDR10)
    .union(Features::LAYER_TRANSFORM);

static GS101_FEATURES: &[FeatureEntry] = &[
    FeatureEntry {
        unit: UnitType::Gf,
        features: DPP_COMMON,
    },
    FeatureEntry {
        unit: UnitType::Vgrfs,
        features: DPP_COMMON
            .union(Features::SCALE)
            .union(Features::ROT_90)
            .union(Features::HDR10_PLUS),
    },
    FeatureEntry {
        unit: UnitType::G2d,
        features: Features::COMPRESSION
            .union(Features::SCALE)
            .union(Features::FLIP_H)
            .union(Features::FLIP_V)
            .union(Features::ROT_90)
            .union(Features::WCG)
            .union(Features::HDR10)
            .union(Features::HDR10_PLUS)
            .union(Features::USE_CAPA)
            .union(Features::LAYER_TRANSFORM),
    },
];

const G2D_YUV_PPC: [f32; 7] = [3.5, 3.6, 4.3, 4.3, 3.5, 3.7, 3.7];
const G2D_YUV_ROT_PPC: [f32; 7] = [2.8, 3.2, 3.9, 4.3, 3.6, 2.6, 2.6];

const fn g2d_ppc(format: PpcFormat, rotated: bool, ppc: [f32; 7]) -> PpcEntry {
    PpcEntry {
        unit: UnitType::G2d,
        format,
        rotated,
        ppc,
    }
}

// All YUV layouts share the two-plane rows; up-scales share one column pair.
static GS101_PPC: &[PpcEntry] = &[
    g2d_ppc(PpcFormat::Yuv420, false, G2D_YUV_PPC),
    g2d_ppc(PpcFormat::Yuv420, true, G2D_YUV_ROT_PPC),
    g2d_ppc(PpcFormat::Yuv422, false, G2D_YUV_PPC),
    g2d_ppc(PpcFormat::Yuv422, true, G2D_YUV_ROT_PPC),
    g2d_ppc(PpcFormat::P010, false, G2D_YUV_PPC),
    g2d_ppc(PpcFormat::P010, true, G2D_YUV_ROT_PPC),
    g2d_ppc(PpcFormat::Rgb32, false, [3.2, 2.1, 2.6, 3.3, 3.6, 3.8, 3.8]),
    g2d_ppc(PpcFormat::Rgb32, true, [3.6, 2.1, 2.7, 3.3, 3.8, 3.5, 3.5]),
    g2d_ppc(PpcFormat::AfbcRgb, false, [3.4, 0.3, 0.5, 0.8, 0.7, 1.6, 1.6]),
    g2d_ppc(PpcFormat::AfbcRgb, true, [3.6, 0.3, 0.8, 0.9, 0.9, 1.4, 1.4]),
    g2d_ppc(PpcFormat::AfbcYuv, false, [2.0, 0.8, 0.3, 0.3, 0.4, 2.9, 2.9]),
    g2d_ppc(PpcFormat::AfbcYuv, true, [2.0, 0.8, 0.3, 0.3, 0.4, 2.6, 2.6]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gf_does_not_read_yuv() {
        let catalog = Catalog::gs101();
        assert!(!catalog.supports_format(UnitType::Gf, PixelFormat::Nv12));
        assert_eq!(
            catalog.classify(UnitType::Gf, Port::Src, PixelFormat::Nv12),
            Err(ClassifyError::NotSupported {
                unit: UnitType::Gf,
                port: Port::Src,
                format: PixelFormat::Nv12,
            })
        );
    }

    #[test]
    fn blit_rgb_row_serves_both_ports() {
        let catalog = Catalog::gs101();
        let src = catalog
            .classify(UnitType::G2d, Port::Src, PixelFormat::Rgba8888)
            .unwrap();
        let dst = catalog
            .classify(UnitType::G2d, Port::Dst, PixelFormat::Rgba8888)
            .unwrap();
        assert_eq!(src, dst);
        assert_eq!(src.max_up_scale, ScaleBound::CropRatio);
    }

    #[test]
    fn yuv_rows_are_keyed_by_port() {
        let catalog = Catalog::gs101();
        let src = catalog
            .classify(UnitType::Vgrfs, Port::Src, PixelFormat::P010)
            .unwrap();
        let dst = catalog
            .classify(UnitType::Vgrfs, Port::Dst, PixelFormat::P010)
            .unwrap();
        assert_eq!(src.crop_x_align, 2);
        assert_eq!(dst.crop_x_align, 1);
        assert_eq!(src.max_up_scale, ScaleBound::Fixed(4));
    }

    #[test]
    fn only_rotation_units_rotate() {
        let catalog = Catalog::gs101();
        assert!(catalog.features(UnitType::Vgrfs).contains(Features::ROT_90));
        assert!(!catalog.features(UnitType::Gf).contains(Features::ROT_90));
        assert!(!catalog.features(UnitType::Gf).contains(Features::SCALE));
        assert_eq!(catalog.features(UnitType::Vg), Features::empty());
    }

    #[test]
    fn ppc_lookup_picks_scale_column() {
        let catalog = Catalog::gs101();
        let none = catalog.ppc(UnitType::G2d, PpcFormat::Rgb32, false, PpcScale::None);
        let down = catalog.ppc(UnitType::G2d, PpcFormat::AfbcRgb, true, PpcScale::Down4);
        assert_eq!(none, Some(3.2));
        assert_eq!(down, Some(0.3));
        assert_eq!(
            catalog.ppc(UnitType::Gf, PpcFormat::Rgb32, false, PpcScale::None),
            None
        );
    }

    #[test]
    fn scale_buckets() {
        assert_eq!(PpcScale::from_areas(100, 100), PpcScale::None);
        assert_eq!(PpcScale::from_areas(400, 100), PpcScale::Down4);
        assert_eq!(PpcScale::from_areas(401, 100), PpcScale::Down9);
        assert_eq!(PpcScale::from_areas(1700, 100), PpcScale::DownMore);
        assert_eq!(PpcScale::from_areas(100, 400), PpcScale::Up4);
        assert_eq!(PpcScale::from_areas(100, 401), PpcScale::UpMore);
    }
}
