// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel formats and the classes used as restriction-table keys.
//!
//! A [`PixelFormat`] is what the compositor hands us. Two coarser groupings
//! are derived from it:
//!
//! - [`FormatClass`]: RGB, 8-bit YUV 4:2:0, 10-bit YUV 4:2:0, or packed/
//!   semi-planar YUV 4:2:2. Drives alignment rules and rotation vetoes.
//! - [`RestrictionClass`]: the size-table key. Every YUV variant shares the
//!   YUV size rows.
//!
//! [`PpcFormat`] is a third grouping used only by the bandwidth model.

/// A buffer pixel format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 16-bit RGB 5:6:5.
    Rgb565,
    /// 24-bit packed RGB.
    Rgb888,
    /// 32-bit RGBA, 8 bits per channel.
    Rgba8888,
    /// 32-bit RGB with an ignored alpha byte.
    Rgbx8888,
    /// 32-bit BGRA, 8 bits per channel.
    Bgra8888,
    /// 32-bit RGBA with 10-bit color and 2-bit alpha.
    Rgba1010102,
    /// Semi-planar YCbCr 4:2:0 in a single buffer (NV12).
    Nv12,
    /// Semi-planar YCbCr 4:2:0 with separate plane buffers.
    Nv12Multi,
    /// Semi-planar YCrCb 4:2:0 (NV21).
    Nv21,
    /// Semi-planar YCbCr 4:2:0 in the vendor tiled layout.
    Nv12Tiled,
    /// 10-bit semi-planar YCbCr 4:2:0 stored as 8 bits plus a 2-bit plane.
    Nv12TenBit,
    /// 10-bit semi-planar YCbCr 4:2:0, 16 bits per sample (P010).
    P010,
    /// Planar YCrCb 4:2:0 (YV12).
    Yv12,
    /// Semi-planar YCbCr 4:2:2 (NV16).
    Nv16,
    /// Interleaved YCbCr 4:2:2 (YUYV).
    Yuyv,
}

/// Coarse grouping of pixel formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatClass {
    /// Any RGB family format.
    Rgb,
    /// 8-bit YUV 4:2:0, planar or semi-planar.
    Yuv420,
    /// 10-bit YUV 4:2:0.
    Yuv420TenBit,
    /// YUV 4:2:2, semi-planar or interleaved.
    Yuv422,
}

/// Size-table key derived from the format class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RestrictionClass {
    /// RGB size rows.
    Rgb,
    /// YUV size rows (all chroma layouts and bit depths).
    Yuv,
}

/// Format grouping used by the pixels-per-clock table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PpcFormat {
    /// Uncompressed YUV 4:2:0.
    Yuv420,
    /// Uncompressed YUV 4:2:2.
    Yuv422,
    /// Uncompressed 10-bit YUV.
    P010,
    /// Uncompressed RGB.
    Rgb32,
    /// Compressed RGB.
    AfbcRgb,
    /// Compressed YUV.
    AfbcYuv,
}

impl PixelFormat {
    /// Returns the coarse class of this format.
    #[must_use]
    pub const fn class(self) -> FormatClass {
        match self {
            Self::Rgb565
            | Self::Rgb888
            | Self::Rgba8888
            | Self::Rgbx8888
            | Self::Bgra8888
            | Self::Rgba1010102 => FormatClass::Rgb,
            Self::Nv12 | Self::Nv12Multi | Self::Nv21 | Self::Nv12Tiled | Self::Yv12 => {
                FormatClass::Yuv420
            }
            Self::Nv12TenBit | Self::P010 => FormatClass::Yuv420TenBit,
            Self::Nv16 | Self::Yuyv => FormatClass::Yuv422,
        }
    }

    /// Returns the restriction-table key of this format.
    #[must_use]
    pub const fn restriction_class(self) -> RestrictionClass {
        match self.class() {
            FormatClass::Rgb => RestrictionClass::Rgb,
            _ => RestrictionClass::Yuv,
        }
    }

    /// Returns `true` for any YUV format.
    #[must_use]
    pub const fn is_yuv(self) -> bool {
        !matches!(self.class(), FormatClass::Rgb)
    }

    /// Returns `true` for 8-bit and 10-bit YUV 4:2:0 formats.
    #[must_use]
    pub const fn is_yuv420(self) -> bool {
        matches!(
            self.class(),
            FormatClass::Yuv420 | FormatClass::Yuv420TenBit
        )
    }

    /// Returns `true` for 10-bit YUV 4:2:0 formats.
    #[must_use]
    pub const fn is_10bit_yuv420(self) -> bool {
        matches!(self.class(), FormatClass::Yuv420TenBit)
    }

    /// Returns the bandwidth-model grouping for this format.
    #[must_use]
    pub const fn ppc_format(self, compressed: bool) -> PpcFormat {
        match (self.class(), compressed) {
            (FormatClass::Rgb, true) => PpcFormat::AfbcRgb,
            (_, true) => PpcFormat::AfbcYuv,
            (FormatClass::Rgb, false) => PpcFormat::Rgb32,
            (FormatClass::Yuv420, false) => PpcFormat::Yuv420,
            (FormatClass::Yuv420TenBit, false) => PpcFormat::P010,
            (FormatClass::Yuv422, false) => PpcFormat::Yuv422,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_bit_formats_share_yuv_restriction_rows() {
        assert_eq!(PixelFormat::P010.class(), FormatClass::Yuv420TenBit);
        assert_eq!(
            PixelFormat::P010.restriction_class(),
            RestrictionClass::Yuv
        );
        assert!(PixelFormat::Nv12TenBit.is_10bit_yuv420());
        assert!(PixelFormat::Nv12TenBit.is_yuv420());
    }

    #[test]
    fn yuv422_is_yuv_but_not_420() {
        assert!(PixelFormat::Yuyv.is_yuv());
        assert!(!PixelFormat::Yuyv.is_yuv420());
    }

    #[test]
    fn compression_selects_afbc_ppc_rows() {
        assert_eq!(PixelFormat::Rgba8888.ppc_format(true), PpcFormat::AfbcRgb);
        assert_eq!(PixelFormat::Nv12.ppc_format(true), PpcFormat::AfbcYuv);
        assert_eq!(PixelFormat::Nv12.ppc_format(false), PpcFormat::Yuv420);
        assert_eq!(PixelFormat::Rgb565.ppc_format(false), PpcFormat::Rgb32);
    }
}
