// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame layer snapshots and the integer images derived from them.
//!
//! A [`Layer`] is what the compositor hands over for one frame: a source
//! buffer description with a fractional crop, a destination frame, the
//! requested composition type, and optional color state. The allocator never
//! mutates layers.
//!
//! Restriction checks work on [`Image`]s: pixel-aligned integer rectangles
//! built from a layer's source crop or destination frame. Building an image
//! is where degenerate geometry (zero size, crop outside the buffer, frame
//! outside the display) is rejected, so nothing downstream has to handle it.

use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;
use kurbo::Rect;

use crate::format::PixelFormat;

bitflags! {
    /// Buffer transform applied on the way to the display.
    ///
    /// Values match the compositor protocol: rotations are compositions of
    /// the two flips and a 90° rotation.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Transform: u32 {
        /// Horizontal flip.
        const FLIP_H = 1;
        /// Vertical flip.
        const FLIP_V = 2;
        /// 90° clockwise rotation.
        const ROT_90 = 4;
        /// 180° rotation.
        const ROT_180 = Self::FLIP_H.bits() | Self::FLIP_V.bits();
        /// 270° clockwise rotation.
        const ROT_270 = Self::ROT_180.bits() | Self::ROT_90.bits();
    }
}

impl Transform {
    /// Returns `true` if the transform swaps the axes.
    #[inline]
    #[must_use]
    pub const fn swaps_axes(self) -> bool {
        self.contains(Self::ROT_90)
    }
}

/// Stable identity of a layer across frames, assigned by the compositor.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u64);

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerId({})", self.0)
    }
}

/// Composition requested by the compositor for a layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompositionType {
    /// Offload to a hardware unit if one fits.
    #[default]
    Device,
    /// Composed by the GPU/software path; never considered for hardware.
    Client,
}

/// Color space, transfer function and range of a buffer.
///
/// Opaque to the allocator; carried through to the color scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dataspace(pub u32);

impl Dataspace {
    /// Unspecified.
    pub const UNKNOWN: Self = Self(0);
    /// sRGB.
    pub const SRGB: Self = Self(0x0881_0000);
    /// Display P3.
    pub const DISPLAY_P3: Self = Self(0x088a_0000);
    /// BT.2020 primaries with the PQ transfer function.
    pub const BT2020_PQ: Self = Self(0x09c6_0000);
    /// BT.2020 primaries with the HLG transfer function.
    pub const BT2020_HLG: Self = Self(0x0a06_0000);
}

/// HDR10 static metadata (mastering display and content light levels).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HdrStaticMetadata {
    /// Mastering display red primary (x, y).
    pub red: [f32; 2],
    /// Mastering display green primary (x, y).
    pub green: [f32; 2],
    /// Mastering display blue primary (x, y).
    pub blue: [f32; 2],
    /// Mastering display white point (x, y).
    pub white_point: [f32; 2],
    /// Mastering display maximum luminance in nits.
    pub max_luminance: f32,
    /// Mastering display minimum luminance in nits.
    pub min_luminance: f32,
    /// Maximum content light level in nits.
    pub max_content_light_level: f32,
    /// Maximum frame-average light level in nits.
    pub max_frame_average_light_level: f32,
}

/// HDR10+ dynamic metadata as an opaque serialized blob.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct HdrDynamicMetadata(pub Vec<u8>);

/// Optional HDR metadata attached to a layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HdrMetadata {
    /// Static (HDR10) metadata, if present.
    pub static_metadata: Option<HdrStaticMetadata>,
    /// Dynamic (HDR10+) metadata, if present.
    pub dynamic_metadata: Option<HdrDynamicMetadata>,
}

impl HdrMetadata {
    /// Returns `true` if neither kind of metadata is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.static_metadata.is_none() && self.dynamic_metadata.is_none()
    }
}

/// A 4x4 row-major color transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorMatrix(pub [f32; 16]);

impl ColorMatrix {
    /// The identity transform.
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);
}

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Description of a layer's source buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceImage {
    /// Pixel format.
    pub format: PixelFormat,
    /// Buffer width in pixels.
    pub width: u32,
    /// Buffer height in pixels.
    pub height: u32,
    /// Crop rectangle in buffer coordinates (may be fractional).
    pub crop: Rect,
    /// Transform applied when presenting.
    pub transform: Transform,
    /// Whether the buffer uses framebuffer compression.
    pub compressed: bool,
    /// Dataspace of the buffer contents.
    pub dataspace: Dataspace,
}

impl SourceImage {
    /// Creates an uncompressed, untransformed source covering the whole buffer.
    #[must_use]
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            crop: Rect::new(0.0, 0.0, f64::from(width), f64::from(height)),
            transform: Transform::empty(),
            compressed: false,
            dataspace: Dataspace::SRGB,
        }
    }
}

/// An immutable per-frame allocation request.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    /// Identity stable across frames.
    pub id: LayerId,
    /// Source buffer description.
    pub source: SourceImage,
    /// Destination rectangle in display coordinates.
    pub display_frame: Rect,
    /// Requested composition.
    pub composition: CompositionType,
    /// HDR metadata.
    pub hdr: HdrMetadata,
    /// Per-layer color transform, if any.
    pub color_transform: Option<ColorMatrix>,
}

impl Layer {
    /// Creates a device-composited layer with no HDR metadata or color
    /// transform.
    #[must_use]
    pub fn new(id: LayerId, source: SourceImage, display_frame: Rect) -> Self {
        Self {
            id,
            source,
            display_frame,
            composition: CompositionType::Device,
            hdr: HdrMetadata::default(),
            color_transform: None,
        }
    }

    /// Builds the source-side [`Image`].
    pub fn src_image(&self) -> Result<Image, GeometryError> {
        Image::from_rect(
            self.source.format,
            self.source.crop,
            self.source.width,
            self.source.height,
            self.source.transform,
            self.source.compressed,
        )
        .map_err(|e| e.at(Side::Source))
    }

    /// Builds the source and destination [`Image`]s against a display of the
    /// given size.
    ///
    /// A display frame hanging off the display is clipped to it, and the
    /// crop loses the same fraction on the matching buffer edges so the
    /// scale is unchanged. A frame entirely off the display is
    /// [`GeometryError::OutOfBounds`].
    pub fn images(
        &self,
        display_width: u32,
        display_height: u32,
    ) -> Result<(Image, Image), GeometryError> {
        let display = Rect::new(0.0, 0.0, f64::from(display_width), f64::from(display_height));
        let frame = self.display_frame;
        if !(frame.width() > 0.0 && frame.height() > 0.0) {
            return Err(GeometryError::Empty(Side::Destination));
        }
        let visible = frame.intersect(display);
        if !(visible.width() > 0.0 && visible.height() > 0.0) {
            return Err(GeometryError::OutOfBounds(Side::Destination));
        }

        let mut source = self.source;
        if visible != frame {
            source.crop = clip_crop(source.crop, source.transform, frame, visible);
        }
        let src = Image::from_rect(
            source.format,
            source.crop,
            source.width,
            source.height,
            source.transform,
            source.compressed,
        )
        .map_err(|e| e.at(Side::Source))?;
        let dst = Image::from_rect(
            source.format,
            visible,
            display_width,
            display_height,
            Transform::empty(),
            false,
        )
        .map_err(|e| e.at(Side::Destination))?;
        Ok((src, dst))
    }
}

/// Shrinks `crop` by the share of `frame` that `visible` cuts away.
///
/// Insets are measured on the display, then carried back through the
/// transform: the 90° turn first, then the flips.
fn clip_crop(crop: Rect, transform: Transform, frame: Rect, visible: Rect) -> Rect {
    let (fw, fh) = (frame.width(), frame.height());
    let (mut left, mut top, mut right, mut bottom) = (
        (visible.x0 - frame.x0) / fw,
        (visible.y0 - frame.y0) / fh,
        (frame.x1 - visible.x1) / fw,
        (frame.y1 - visible.y1) / fh,
    );
    if transform.contains(Transform::ROT_90) {
        (left, top, right, bottom) = (top, right, bottom, left);
    }
    if transform.contains(Transform::FLIP_V) {
        core::mem::swap(&mut top, &mut bottom);
    }
    if transform.contains(Transform::FLIP_H) {
        core::mem::swap(&mut left, &mut right);
    }
    let (cw, ch) = (crop.width(), crop.height());
    Rect::new(
        crop.x0 + left * cw,
        crop.y0 + top * ch,
        crop.x1 - right * cw,
        crop.y1 - bottom * ch,
    )
}

/// Which side of a layer a [`GeometryError`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// The source crop.
    Source,
    /// The destination frame.
    Destination,
}

/// Degenerate layer geometry, detected when building an [`Image`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryError {
    /// Width or height rounds to zero.
    Empty(Side),
    /// The rectangle extends outside its buffer or display.
    OutOfBounds(Side),
}

impl GeometryError {
    fn at(self, side: Side) -> Self {
        match self {
            Self::Empty(_) => Self::Empty(side),
            Self::OutOfBounds(_) => Self::OutOfBounds(side),
        }
    }
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty(side) => write!(f, "{side:?} rectangle is empty"),
            Self::OutOfBounds(side) => write!(f, "{side:?} rectangle exceeds its bounds"),
        }
    }
}

impl core::error::Error for GeometryError {}

/// Integer pixel rectangle within a buffer, plus the attributes restriction
/// checks need.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Image {
    /// Pixel format.
    pub format: PixelFormat,
    /// Width of the containing buffer.
    pub full_width: u32,
    /// Height of the containing buffer.
    pub full_height: u32,
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub w: u32,
    /// Height.
    pub h: u32,
    /// Transform.
    pub transform: Transform,
    /// Whether the buffer is compressed.
    pub compressed: bool,
}

impl Image {
    /// Rounds `rect` to whole pixels and validates it against a
    /// `full_width` x `full_height` container.
    pub fn from_rect(
        format: PixelFormat,
        rect: Rect,
        full_width: u32,
        full_height: u32,
        transform: Transform,
        compressed: bool,
    ) -> Result<Self, GeometryError> {
        let r = rect.round();
        // Written as negations so NaN edges are rejected too.
        if !(r.x0 >= 0.0 && r.y0 >= 0.0)
            || !(r.x1 <= f64::from(full_width) && r.y1 <= f64::from(full_height))
        {
            return Err(GeometryError::OutOfBounds(Side::Source));
        }
        if !(r.width() >= 1.0 && r.height() >= 1.0) {
            return Err(GeometryError::Empty(Side::Source));
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "edges are rounded and bounded by u32 container sizes"
        )]
        let (x, y, w, h) = (
            r.x0 as u32,
            r.y0 as u32,
            r.width() as u32,
            r.height() as u32,
        );
        Ok(Self {
            format,
            full_width,
            full_height,
            x,
            y,
            w,
            h,
            transform,
            compressed,
        })
    }

    /// Returns `(w, h)` as seen after the transform is applied.
    #[must_use]
    pub const fn presented_size(&self) -> (u32, u32) {
        if self.transform.swaps_axes() {
            (self.h, self.w)
        } else {
            (self.w, self.h)
        }
    }

    /// Number of pixels covered.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(crop: Rect, frame: Rect) -> Layer {
        let mut source = SourceImage::new(PixelFormat::Rgba8888, 1920, 1080);
        source.crop = crop;
        Layer::new(LayerId(1), source, frame)
    }

    #[test]
    fn fractional_crop_rounds_to_pixels() {
        let l = layer(
            Rect::new(0.4, 10.6, 1280.2, 730.5),
            Rect::new(0.0, 0.0, 1280.0, 720.0),
        );
        let img = l.src_image().unwrap();
        assert_eq!((img.x, img.y, img.w, img.h), (0, 11, 1280, 720));
    }

    #[test]
    fn zero_width_crop_is_rejected() {
        let l = layer(
            Rect::new(100.0, 0.0, 100.0, 200.0),
            Rect::new(0.0, 0.0, 10.0, 10.0),
        );
        assert_eq!(l.src_image(), Err(GeometryError::Empty(Side::Source)));
    }

    #[test]
    fn crop_outside_buffer_is_rejected() {
        let l = layer(
            Rect::new(0.0, 0.0, 2000.0, 1080.0),
            Rect::new(0.0, 0.0, 10.0, 10.0),
        );
        assert_eq!(
            l.src_image(),
            Err(GeometryError::OutOfBounds(Side::Source))
        );
    }

    #[test]
    fn frame_hanging_off_the_display_is_clipped() {
        let l = layer(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(-10.0, 0.0, 90.0, 100.0),
        );
        let (src, dst) = l.images(1080, 2400).unwrap();
        assert_eq!((dst.x, dst.y, dst.w, dst.h), (0, 0, 90, 100));
        assert_eq!((src.x, src.y, src.w, src.h), (10, 0, 90, 100));
    }

    #[test]
    fn clipping_a_rotated_layer_trims_the_buffer_side_that_maps_there() {
        // After a 90° turn the buffer's left edge is shown at the top.
        let mut l = layer(
            Rect::new(0.0, 0.0, 200.0, 100.0),
            Rect::new(0.0, -50.0, 100.0, 150.0),
        );
        l.source.transform = Transform::ROT_90;
        let (src, dst) = l.images(1080, 2400).unwrap();
        assert_eq!((dst.y, dst.w, dst.h), (0, 100, 150));
        assert_eq!((src.x, src.w, src.h), (50, 150, 100));
        assert_eq!(src.presented_size(), (dst.w, dst.h));
    }

    #[test]
    fn frame_entirely_off_the_display_is_rejected() {
        let l = layer(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(2000.0, 0.0, 2100.0, 100.0),
        );
        assert_eq!(
            l.images(1080, 2400),
            Err(GeometryError::OutOfBounds(Side::Destination))
        );
    }

    #[test]
    fn rotation_swaps_presented_size() {
        let mut l = layer(
            Rect::new(0.0, 0.0, 1920.0, 1080.0),
            Rect::new(0.0, 0.0, 1080.0, 1920.0),
        );
        l.source.transform = Transform::ROT_270;
        let img = l.src_image().unwrap();
        assert_eq!(img.presented_size(), (1080, 1920));
    }

    #[test]
    fn rot_180_does_not_swap_axes() {
        assert!(!Transform::ROT_180.swaps_axes());
        assert!(Transform::ROT_270.swaps_axes());
    }
}
