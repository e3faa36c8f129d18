// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Capability classifier: can this unit type take this layer at all?
//!
//! The checks here only depend on the unit type and the layer's images.
//! Anything that depends on what other units are doing this frame (shared
//! groups, consumer limits, bandwidth) belongs to the allocator.

use core::fmt;

use crate::catalog::{
    Catalog, ClassifyError, Features, Port, PpcScale, RestrictionRow, ScaleBound, UnitKind,
    UnitType,
};
use crate::layer::{HdrMetadata, Image, Transform};

/// Why a unit type cannot take a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// No restriction row for the format.
    Format(ClassifyError),
    /// The image on `port` is out of size bounds or misaligned.
    Size(Port),
    /// Scaling is needed but unsupported, or the ratio exceeds the bound.
    Scale,
    /// The source is compressed and the unit cannot decompress it.
    Compression,
    /// The unit cannot apply the transform.
    Transform,
    /// 10-bit YUV 4:2:0 with a transform on a rotation unit.
    TenBitTransform,
    /// A rotated source is wider than the rotator's line buffer.
    RotatedWidth {
        /// Source crop width.
        width: u32,
        /// Ceiling.
        limit: u32,
    },
    /// HDR static metadata on a unit without HDR10 support.
    Hdr,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(e) => write!(f, "{e}"),
            Self::Size(port) => write!(f, "{port:?} image out of bounds or misaligned"),
            Self::Scale => write!(f, "scale unsupported"),
            Self::Compression => write!(f, "compressed source unsupported"),
            Self::Transform => write!(f, "transform unsupported"),
            Self::TenBitTransform => write!(f, "10-bit YUV cannot be transformed"),
            Self::RotatedWidth { width, limit } => {
                write!(f, "rotated source width {width} exceeds {limit}")
            }
            Self::Hdr => write!(f, "HDR10 unsupported"),
        }
    }
}

impl core::error::Error for Rejection {}

const fn aligned(v: u32, align: u32) -> bool {
    align <= 1 || v % align == 0
}

const fn within(v: u32, min: u32, max: u32) -> bool {
    v >= min && v <= max
}

impl RestrictionRow {
    /// Returns `true` if the buffer and crop of `image` are within this
    /// row's bounds and aligned to its granularity.
    #[must_use]
    pub const fn fits(&self, image: &Image) -> bool {
        within(image.full_width, self.min_full_width, self.max_full_width)
            && within(image.full_height, self.min_full_height, self.max_full_height)
            && aligned(image.full_width, self.full_width_align)
            && aligned(image.full_height, self.full_height_align)
            && within(image.w, self.min_crop_width, self.max_crop_width)
            && within(image.h, self.min_crop_height, self.max_crop_height)
            && aligned(image.x, self.crop_x_align)
            && aligned(image.y, self.crop_y_align)
            && aligned(image.w, self.crop_width_align)
            && aligned(image.h, self.crop_height_align)
    }

    /// Per-axis `(x, y)` bound for a scale column.
    const fn bound(&self, bound: ScaleBound) -> (u64, u64) {
        match bound {
            ScaleBound::Fixed(n) => (n as u64, n as u64),
            ScaleBound::CropRatio => (
                (self.max_crop_width / max1(self.min_crop_width)) as u64,
                (self.max_crop_height / max1(self.min_crop_height)) as u64,
            ),
        }
    }

    /// Returns `true` if scaling `src` onto `dst` stays within this row's
    /// down- and up-scale bounds. A 90° source rotation swaps the axes
    /// compared against `dst`.
    #[must_use]
    pub const fn scale_fits(&self, src: &Image, dst: &Image) -> bool {
        let (sw, sh) = src.presented_size();
        let (sw, sh) = (sw as u64, sh as u64);
        let (dw, dh) = (dst.w as u64, dst.h as u64);
        let (down_x, down_y) = self.bound(self.max_down_scale);
        let (up_x, up_y) = self.bound(self.max_up_scale);
        sw <= dw * down_x && sh <= dh * down_y && dw <= sw * up_x && dh <= sh * up_y
    }
}

const fn max1(v: u32) -> u32 {
    if v == 0 { 1 } else { v }
}

/// Checks layers against unit types using a [`Catalog`].
#[derive(Clone, Copy, Debug)]
pub struct Classifier<'a> {
    catalog: &'a Catalog,
    rotated_src_width_ceiling: u32,
}

impl<'a> Classifier<'a> {
    /// Creates a classifier. Rotation units refuse rotated sources wider than
    /// `rotated_src_width_ceiling`.
    #[must_use]
    pub const fn new(catalog: &'a Catalog, rotated_src_width_ceiling: u32) -> Self {
        Self {
            catalog,
            rotated_src_width_ceiling,
        }
    }

    /// The catalog in use.
    #[must_use]
    pub const fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Checks whether `unit` can show `src` as `dst`.
    pub fn check(
        &self,
        unit: UnitType,
        src: &Image,
        dst: &Image,
        hdr: &HdrMetadata,
    ) -> Result<(), Rejection> {
        let src_row = self
            .catalog
            .classify(unit, Port::Src, src.format)
            .map_err(Rejection::Format)?;
        let dst_row = self
            .catalog
            .classify(unit, Port::Dst, dst.format)
            .map_err(Rejection::Format)?;
        let features = self.catalog.features(unit);

        if src.compressed && !features.contains(Features::COMPRESSION) {
            return Err(Rejection::Compression);
        }
        self.check_transform(unit, features, src)?;

        if !src_row.fits(src) {
            return Err(Rejection::Size(Port::Src));
        }
        if !dst_row.fits(dst) {
            return Err(Rejection::Size(Port::Dst));
        }

        let scaled = src.presented_size() != (dst.w, dst.h);
        if scaled && (!features.contains(Features::SCALE) || !src_row.scale_fits(src, dst)) {
            return Err(Rejection::Scale);
        }

        if hdr.static_metadata.is_some() && !features.contains(Features::HDR10) {
            return Err(Rejection::Hdr);
        }
        Ok(())
    }

    fn check_transform(
        &self,
        unit: UnitType,
        features: Features,
        src: &Image,
    ) -> Result<(), Rejection> {
        let t = src.transform;
        if t.is_empty() {
            return Ok(());
        }
        let needs = [
            (Transform::FLIP_H, Features::FLIP_H),
            (Transform::FLIP_V, Features::FLIP_V),
            (Transform::ROT_90, Features::ROT_90),
        ];
        if needs
            .iter()
            .any(|&(bit, feature)| t.contains(bit) && !features.contains(feature))
        {
            return Err(Rejection::Transform);
        }

        let rotator = unit.kind() == UnitKind::Fetch && features.contains(Features::ROT_90);
        if unit.kind() == UnitKind::Fetch && !rotator && src.compressed {
            // Plain fetch units read compressed buffers in scan order only.
            return Err(Rejection::Transform);
        }
        if rotator {
            if src.format.is_10bit_yuv420() {
                return Err(Rejection::TenBitTransform);
            }
            if t.swaps_axes() && src.w > self.rotated_src_width_ceiling {
                return Err(Rejection::RotatedWidth {
                    width: src.w,
                    limit: self.rotated_src_width_ceiling,
                });
            }
        }
        Ok(())
    }

    /// Clock cycles a capacity-limited unit spends on one source: the larger
    /// of the source and destination areas divided by pixels per clock.
    ///
    /// Returns `None` if `unit` is not capacity-limited or the table has no
    /// entry for the format.
    #[must_use]
    pub fn cycles(&self, unit: UnitType, src: &Image, dst: &Image) -> Option<f64> {
        if !self.catalog.features(unit).contains(Features::USE_CAPA) {
            return None;
        }
        let (src_px, dst_px) = (src.area(), dst.area());
        let ppc = self.catalog.ppc(
            unit,
            src.format.ppc_format(src.compressed),
            src.transform.swaps_axes(),
            PpcScale::from_areas(src_px, dst_px),
        )?;
        if ppc <= 0.0 {
            return None;
        }
        Some(src_px.max(dst_px) as f64 / f64::from(ppc))
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Rect;

    use super::*;
    use crate::format::PixelFormat;

    fn image(format: PixelFormat, w: u32, h: u32) -> Image {
        Image::from_rect(
            format,
            Rect::new(0.0, 0.0, f64::from(w), f64::from(h)),
            w,
            h,
            Transform::empty(),
            false,
        )
        .unwrap()
    }

    fn dst(w: u32, h: u32) -> Image {
        image(PixelFormat::Rgba8888, w, h)
    }

    const CATALOG: Catalog = Catalog::gs101();

    fn classifier() -> Classifier<'static> {
        Classifier::new(&CATALOG, 2560)
    }

    #[test]
    fn unscaled_rgb_fits_gf() {
        let src = image(PixelFormat::Rgba8888, 1080, 2400);
        assert_eq!(
            classifier().check(UnitType::Gf, &src, &dst(1080, 2400), &HdrMetadata::default()),
            Ok(())
        );
    }

    #[test]
    fn gf_cannot_scale() {
        let src = image(PixelFormat::Rgba8888, 540, 1200);
        assert_eq!(
            classifier().check(UnitType::Gf, &src, &dst(1080, 2400), &HdrMetadata::default()),
            Err(Rejection::Scale)
        );
        assert_eq!(
            classifier().check(UnitType::Vgrfs, &src, &dst(1080, 2400), &HdrMetadata::default()),
            Ok(())
        );
    }

    #[test]
    fn yuv_upscale_bound_is_tighter_than_rgb() {
        let yuv = image(PixelFormat::Nv12, 480, 270);
        let rgb = image(PixelFormat::Rgba8888, 480, 270);
        let big = dst(3840, 2160);
        let c = classifier();
        assert_eq!(
            c.check(UnitType::Vgrfs, &yuv, &big, &HdrMetadata::default()),
            Err(Rejection::Scale)
        );
        assert_eq!(
            c.check(UnitType::Vgrfs, &rgb, &big, &HdrMetadata::default()),
            Ok(())
        );
        // Crop-ratio bound on the blit engine.
        assert_eq!(
            c.check(UnitType::G2d, &yuv, &big, &HdrMetadata::default()),
            Ok(())
        );
    }

    #[test]
    fn odd_yuv_crop_is_misaligned() {
        let mut src = image(PixelFormat::Nv12, 1920, 1080);
        src.x = 1;
        assert_eq!(
            classifier().check(UnitType::Vgrfs, &src, &dst(1920, 1080), &HdrMetadata::default()),
            Err(Rejection::Size(Port::Src))
        );
    }

    #[test]
    fn rotation_requires_rotator() {
        let mut src = image(PixelFormat::Rgba8888, 1920, 1080);
        src.transform = Transform::ROT_90;
        let d = dst(1080, 1920);
        let c = classifier();
        assert_eq!(
            c.check(UnitType::Gf, &src, &d, &HdrMetadata::default()),
            Err(Rejection::Transform)
        );
        assert_eq!(
            c.check(UnitType::Vgrfs, &src, &d, &HdrMetadata::default()),
            Ok(())
        );
    }

    #[test]
    fn rotated_width_ceiling() {
        let mut src = image(PixelFormat::Rgba8888, 3000, 1000);
        src.transform = Transform::ROT_90;
        assert_eq!(
            classifier().check(UnitType::Vgrfs, &src, &dst(1000, 3000), &HdrMetadata::default()),
            Err(Rejection::RotatedWidth {
                width: 3000,
                limit: 2560,
            })
        );
    }

    #[test]
    fn ten_bit_yuv_cannot_flip_on_rotator() {
        let mut src = image(PixelFormat::P010, 1920, 1080);
        src.transform = Transform::FLIP_H;
        assert_eq!(
            classifier().check(UnitType::Vgrfs, &src, &dst(1920, 1080), &HdrMetadata::default()),
            Err(Rejection::TenBitTransform)
        );
    }

    #[test]
    fn compressed_flip_needs_rotator() {
        let mut src = image(PixelFormat::Rgba8888, 1080, 2400);
        src.compressed = true;
        src.transform = Transform::FLIP_V;
        let c = classifier();
        let d = dst(1080, 2400);
        assert_eq!(
            c.check(UnitType::Gf, &src, &d, &HdrMetadata::default()),
            Err(Rejection::Transform)
        );
        assert_eq!(
            c.check(UnitType::Vgrfs, &src, &d, &HdrMetadata::default()),
            Ok(())
        );
    }

    #[test]
    fn unsupported_format_is_a_format_rejection() {
        let src = image(PixelFormat::Yuyv, 64, 64);
        assert_eq!(
            classifier().check(UnitType::Gf, &src, &dst(64, 64), &HdrMetadata::default()),
            Err(Rejection::Format(ClassifyError::NotSupported {
                unit: UnitType::Gf,
                port: Port::Src,
                format: PixelFormat::Yuyv,
            }))
        );
    }

    #[test]
    fn blit_cycles_use_larger_area() {
        let c = classifier();
        let src = image(PixelFormat::Rgba8888, 1000, 1000);
        let same = c.cycles(UnitType::G2d, &src, &dst(1000, 1000)).unwrap();
        assert!((same - 1_000_000.0 / 3.2).abs() < 1.0);
        let up = c.cycles(UnitType::G2d, &src, &dst(2000, 2000)).unwrap();
        assert!((up - 4_000_000.0 / 3.8).abs() < 1.0);
        assert_eq!(c.cycles(UnitType::Gf, &src, &dst(1000, 1000)), None);
    }
}
