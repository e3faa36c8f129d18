// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-unit window configs and their pre-commit validation.
//!
//! Once a frame is assigned, every fetch unit the display uses gets one
//! window: a layer it reads directly, the composed output of a blit unit, or
//! the client composition target. [`validate`] checks the windows against what each unit's
//! hardware can actually do, independent of the catalog the allocator was
//! given, and disables the windows that fail.

use alloc::vec::Vec;
use core::fmt;

use crate::catalog::{UnitKind, UnitType};
use crate::display::DisplayId;
use crate::format::PixelFormat;
use crate::layer::{Image, Layer, LayerId, Transform};
use crate::pool::{AssignState, UnitId, UnitPool};

/// What a window shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WindowSource {
    /// A layer read directly by the unit.
    Layer(LayerId),
    /// The composition target of a blit unit.
    BlitOutput(UnitId),
    /// The buffer client composition renders into.
    ClientTarget,
}

/// Whether a window will be programmed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WindowState {
    /// Programmed with a buffer.
    #[default]
    Buffer,
    /// Turned off after failing validation.
    Disabled,
}

/// One hardware window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowConfig {
    /// Fetch unit that scans the window out.
    pub unit: UnitId,
    /// Type of that unit.
    pub unit_type: UnitType,
    /// Content.
    pub source: WindowSource,
    /// Programming state.
    pub state: WindowState,
    /// Source image.
    pub src: Image,
    /// Destination image.
    pub dst: Image,
    /// Stacking position; lower is further back.
    pub zpos: u32,
}

/// The fetch unit holding the client composition target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClientTarget {
    /// Reserved fetch unit.
    pub unit: UnitId,
    /// Position of the backmost client-composed layer.
    pub zpos: u32,
    /// Full-display RGB image the target is scanned out as.
    pub image: Image,
}

impl ClientTarget {
    /// A full-display target for `unit` at `zpos`.
    #[must_use]
    pub const fn new(unit: UnitId, zpos: u32, width: u32, height: u32) -> Self {
        Self {
            unit,
            zpos,
            image: Image {
                format: PixelFormat::Rgba8888,
                full_width: width,
                full_height: height,
                x: 0,
                y: 0,
                w: width,
                h: height,
                transform: Transform::empty(),
                compressed: false,
            },
        }
    }
}

/// Why a window failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WindowFault {
    /// Source and destination sizes differ on a unit without a scaler.
    Scale,
    /// A compressed source on a unit without a decompressor.
    Compression,
}

impl fmt::Display for WindowFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scale => f.write_str("scaling on a unit without a scaler"),
            Self::Compression => f.write_str("compressed source on a unit without a decompressor"),
        }
    }
}

/// A window disabled by [`validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InvalidWindow {
    /// The window, as it was before being disabled.
    pub window: WindowConfig,
    /// Fault.
    pub fault: WindowFault,
}

/// Builds one window per fetch unit `display` uses, sorted by `zpos`.
///
/// `layers` is the frame's layer list in z-order; a blit output window takes
/// the position of its backmost source. Blit sources are contiguous in
/// z-order, so no other window falls inside that span.
pub fn build(
    pool: &UnitPool,
    display: DisplayId,
    layers: &[Layer],
    client: Option<&ClientTarget>,
) -> Vec<WindowConfig> {
    let zpos = |id: LayerId| {
        layers
            .iter()
            .position(|l| l.id == id)
            .map_or(u32::MAX, |p| u32::try_from(p).unwrap_or(u32::MAX))
    };
    let mut windows = Vec::new();
    if let Some(target) = client {
        if let Some(unit) = pool.unit(target.unit) {
            windows.push(WindowConfig {
                unit: unit.id,
                unit_type: unit.desc.unit_type,
                source: WindowSource::ClientTarget,
                state: WindowState::Buffer,
                src: target.image,
                dst: target.image,
                zpos: target.zpos,
            });
        }
    }
    for unit in pool.units().filter(|u| u.owner == Some(display)) {
        match (unit.desc.unit_type.kind(), unit.state) {
            (UnitKind::Fetch, AssignState::Assigned) => {
                for c in unit.consumers {
                    windows.push(WindowConfig {
                        unit: unit.id,
                        unit_type: unit.desc.unit_type,
                        source: WindowSource::Layer(c.layer),
                        state: WindowState::Buffer,
                        src: c.src,
                        dst: c.dst,
                        zpos: zpos(c.layer),
                    });
                }
            }
            (UnitKind::Fetch, AssignState::Reserved) => {
                let Some(blit) = unit.link.and_then(|b| pool.unit(b)) else {
                    continue;
                };
                let Some(out) = blit_output(blit.consumers.iter().map(|c| &c.dst)) else {
                    continue;
                };
                windows.push(WindowConfig {
                    unit: unit.id,
                    unit_type: unit.desc.unit_type,
                    source: WindowSource::BlitOutput(blit.id),
                    state: WindowState::Buffer,
                    src: out,
                    dst: out,
                    zpos: blit
                        .consumers
                        .iter()
                        .map(|c| zpos(c.layer))
                        .min()
                        .unwrap_or(u32::MAX),
                });
            }
            _ => {}
        }
    }
    windows.sort_by_key(|w| w.zpos);
    windows
}

/// Bounding box of the destinations a blit unit composes, as an
/// uncompressed RGB image.
fn blit_output<'a>(dsts: impl Iterator<Item = &'a Image>) -> Option<Image> {
    let mut acc: Option<(u32, u32, u32, u32, u32, u32)> = None;
    for d in dsts {
        let (x0, y0, x1, y1) = (d.x, d.y, d.x + d.w, d.y + d.h);
        acc = Some(match acc {
            None => (x0, y0, x1, y1, d.full_width, d.full_height),
            Some((ax0, ay0, ax1, ay1, fw, fh)) => {
                (ax0.min(x0), ay0.min(y0), ax1.max(x1), ay1.max(y1), fw, fh)
            }
        });
    }
    let (x0, y0, x1, y1, full_width, full_height) = acc?;
    Some(Image {
        format: PixelFormat::Rgba8888,
        full_width,
        full_height,
        x: x0,
        y: y0,
        w: x1 - x0,
        h: y1 - y0,
        transform: Transform::empty(),
        compressed: false,
    })
}

/// Checks every enabled window and disables the ones the unit cannot
/// scan out. Returns the disabled windows.
pub fn validate(windows: &mut [WindowConfig]) -> Vec<InvalidWindow> {
    let mut invalid = Vec::new();
    for w in windows.iter_mut().filter(|w| w.state == WindowState::Buffer) {
        let fault = if !w.unit_type.has_scaler() && w.src.presented_size() != (w.dst.w, w.dst.h) {
            Some(WindowFault::Scale)
        } else if w.src.compressed && !w.unit_type.has_decompressor() {
            Some(WindowFault::Compression)
        } else {
            None
        };
        if let Some(fault) = fault {
            invalid.push(InvalidWindow { window: *w, fault });
            w.state = WindowState::Disabled;
        }
    }
    invalid
}

#[cfg(test)]
mod tests {
    use kurbo::Rect;

    use super::*;

    fn image(w: u32, h: u32) -> Image {
        Image::from_rect(
            PixelFormat::Rgba8888,
            Rect::new(0.0, 0.0, f64::from(w), f64::from(h)),
            w,
            h,
            Transform::empty(),
            false,
        )
        .unwrap()
    }

    fn window(unit_type: UnitType, src: Image, dst: Image) -> WindowConfig {
        WindowConfig {
            unit: UnitId(0),
            unit_type,
            source: WindowSource::Layer(LayerId(1)),
            state: WindowState::Buffer,
            src,
            dst,
            zpos: 0,
        }
    }

    #[test]
    fn scaling_on_plain_fetch_unit_is_disabled() {
        let mut windows = [
            window(UnitType::Gf, image(540, 1200), image(1080, 2400)),
            window(UnitType::Vgrfs, image(540, 1200), image(1080, 2400)),
        ];
        let invalid = validate(&mut windows);
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].fault, WindowFault::Scale);
        assert_eq!(windows[0].state, WindowState::Disabled);
        assert_eq!(windows[1].state, WindowState::Buffer);
    }

    #[test]
    fn rotated_source_compares_swapped_axes() {
        let mut src = image(2400, 1080);
        src.transform = Transform::ROT_90;
        let mut windows = [window(UnitType::Vg, src, image(1080, 2400))];
        assert!(validate(&mut windows).is_empty());
    }

    #[test]
    fn compressed_source_needs_decompressor() {
        let mut src = image(64, 64);
        src.compressed = true;
        let mut windows = [window(UnitType::Vgs, src, image(64, 64))];
        let invalid = validate(&mut windows);
        assert_eq!(invalid[0].fault, WindowFault::Compression);
    }

    #[test]
    fn client_target_window_sits_at_its_position() {
        let pool = UnitPool::new(&crate::topology::Topology::gs101()).unwrap();
        let gf2 = pool.units().find(|u| u.desc.name == "DPP_GF2").unwrap().id;
        let target = ClientTarget::new(gf2, 3, 1080, 2400);
        let mut windows = build(&pool, DisplayId::PRIMARY, &[], Some(&target));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].source, WindowSource::ClientTarget);
        assert_eq!(windows[0].zpos, 3);
        assert_eq!((windows[0].dst.w, windows[0].dst.h), (1080, 2400));
        assert!(validate(&mut windows).is_empty());
    }

    #[test]
    fn blit_output_covers_all_destinations() {
        let mut a = image(100, 100);
        a.full_width = 1000;
        a.full_height = 1000;
        let mut b = a;
        b.x = 500;
        b.y = 200;
        let out = blit_output([a, b].iter()).unwrap();
        assert_eq!((out.x, out.y, out.w, out.h), (0, 0, 600, 300));
        assert!(!out.compressed);
    }
}
