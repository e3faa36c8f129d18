// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame orchestration.
//!
//! [`FrameComposer`] runs one display's frame end to end: allocate units,
//! rebuild the color scene, and, if anything color-relevant changed (or the
//! policy says to reprogram anyway), push the scene through the collaborator
//! and encode blobs. A color failure never fails the frame; the assignment
//! is still returned and the color state is invalidated so the next frame
//! tries again.

use alloc::vec::Vec;

use scanout_core::allocator::{Allocator, FrameAssignment, FrameRequest};
use scanout_core::display::DisplayId;
use scanout_core::trace::Tracer;

use crate::builder::ColorSceneBuilder;
use crate::collaborator::DisplayColor;
use crate::encode::{BlobSink, ColorBlobs, ColorEncoder, EncodeError};
use crate::scene::{DisplayColorSettings, DisplayScene};

/// When color blobs are rebuilt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReprogramPolicy {
    /// Every frame.
    #[default]
    Always,
    /// Only when the scene changed.
    OnChange,
}

/// What happened to a frame's color programming.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColorOutcome {
    /// New blobs to commit with the frame.
    Programmed(ColorBlobs),
    /// Nothing changed; the live blobs stay.
    Unchanged,
    /// The display does not program color.
    Skipped,
    /// Color programming failed; the frame commits without new blobs.
    Failed(EncodeError),
}

/// Everything a frame produced.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameOutput {
    /// Unit assignment.
    pub assignment: FrameAssignment,
    /// Color programming result.
    pub color: ColorOutcome,
}

#[derive(Debug)]
struct DisplayState<C> {
    id: DisplayId,
    builder: ColorSceneBuilder,
    encoder: ColorEncoder,
    color: Option<C>,
}

/// Drives allocation and color programming for every display.
#[derive(Debug)]
pub struct FrameComposer<C> {
    allocator: Allocator,
    displays: Vec<DisplayState<C>>,
    policy: ReprogramPolicy,
}

impl<C: DisplayColor> FrameComposer<C> {
    /// Creates a composer with no color collaborators attached.
    #[must_use]
    pub fn new(allocator: Allocator) -> Self {
        Self {
            allocator,
            displays: Vec::new(),
            policy: ReprogramPolicy::default(),
        }
    }

    /// Returns the composer with a different reprogram policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ReprogramPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attaches the color collaborator of `display`.
    ///
    /// Color is only programmed for displays that have a collaborator and
    /// whose profile programs color.
    pub fn attach_color(&mut self, display: DisplayId, color: C) {
        let state = self.state(display);
        state.color = Some(color);
        state.builder.invalidate();
    }

    /// The allocator.
    #[must_use]
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// The collaborator attached to `display`.
    #[must_use]
    pub fn color(&self, display: DisplayId) -> Option<&C> {
        self.find(display).and_then(|s| s.color.as_ref())
    }

    /// Color scene of `display` as of its last frame.
    #[must_use]
    pub fn scene(&self, display: DisplayId) -> Option<&DisplayScene> {
        self.find(display).map(|s| s.builder.scene())
    }

    /// Blobs of `display` waiting for their flip.
    #[must_use]
    pub fn pending_blobs(&self, display: DisplayId) -> Option<&ColorBlobs> {
        self.find(display).and_then(|s| s.encoder.pending())
    }

    /// Sets the display-wide color settings of `display`.
    pub fn set_display_color(&mut self, display: DisplayId, settings: DisplayColorSettings) {
        self.state(display).builder.set_display_color(settings);
    }

    /// Forces the next frame of `display` to reprogram color.
    pub fn invalidate(&mut self, display: DisplayId) {
        self.state(display).builder.invalidate();
    }

    /// Starts a new frame on every display.
    pub fn begin_frame(&mut self) {
        self.allocator.begin_frame();
    }

    /// Composes one display's frame.
    pub fn compose(&mut self, req: &FrameRequest<'_>, sink: &mut dyn BlobSink) -> FrameOutput {
        self.compose_traced(req, sink, &mut Tracer::none())
    }

    /// Like [`compose`](Self::compose), reporting allocator events to
    /// `tracer`.
    pub fn compose_traced(
        &mut self,
        req: &FrameRequest<'_>,
        sink: &mut dyn BlobSink,
        tracer: &mut Tracer<'_>,
    ) -> FrameOutput {
        let assignment = self.allocator.allocate_traced(req, tracer);
        let color = if req.profile.programs_color {
            self.program_color(req, &assignment, sink)
        } else {
            ColorOutcome::Skipped
        };
        FrameOutput { assignment, color }
    }

    fn program_color(
        &mut self,
        req: &FrameRequest<'_>,
        assignment: &FrameAssignment,
        sink: &mut dyn BlobSink,
    ) -> ColorOutcome {
        let display = req.profile.id;
        let policy = self.policy;
        let index = self.index(display);
        let state = &mut self.displays[index];
        let Some(color) = state.color.as_mut() else {
            return ColorOutcome::Skipped;
        };

        if let Err(e) = state.builder.populate(req.layers, assignment) {
            state.builder.invalidate();
            return ColorOutcome::Failed(EncodeError::Collaborator(e));
        }
        let changed = state.builder.needs_reprogram();
        if !changed && policy == ReprogramPolicy::OnChange {
            log::trace!("frame {}: color unchanged on {display:?}", req.frame_index);
            return ColorOutcome::Unchanged;
        }

        let scene = state.builder.scene();
        let encoded = color
            .update(scene)
            .map_err(EncodeError::Collaborator)
            .and_then(|()| {
                state.encoder.encode(
                    scene,
                    &*color,
                    self.allocator.pool(),
                    self.allocator.catalog(),
                    sink,
                )
            });
        match encoded {
            Ok(blobs) => {
                log::debug!(
                    "frame {}: {} color blobs for {} planes on {display:?}",
                    req.frame_index,
                    blobs.ids().count(),
                    blobs.planes.len(),
                );
                ColorOutcome::Programmed(blobs)
            }
            Err(e) => {
                log::warn!("frame {}: color programming failed: {e}", req.frame_index);
                state.builder.invalidate();
                ColorOutcome::Failed(e)
            }
        }
    }

    /// Called when `display`'s last composed frame is on screen. Destroys
    /// the blobs it replaced.
    pub fn flip_complete(&mut self, display: DisplayId, sink: &mut dyn BlobSink) {
        if let Some(state) = self.displays.iter_mut().find(|s| s.id == display) {
            state.encoder.release_retired(sink);
        }
    }

    /// Destroys every blob held for `display`, e.g. when it is turned off.
    pub fn release_display(&mut self, display: DisplayId, sink: &mut dyn BlobSink) {
        if let Some(state) = self.displays.iter_mut().find(|s| s.id == display) {
            state.encoder.clear(sink);
            state.builder.invalidate();
        }
    }

    fn find(&self, display: DisplayId) -> Option<&DisplayState<C>> {
        self.displays.iter().find(|s| s.id == display)
    }

    fn index(&mut self, display: DisplayId) -> usize {
        if let Some(i) = self.displays.iter().position(|s| s.id == display) {
            return i;
        }
        self.displays.push(DisplayState {
            id: display,
            builder: ColorSceneBuilder::new(),
            encoder: ColorEncoder::new(),
            color: None,
        });
        self.displays.len() - 1
    }

    fn state(&mut self, display: DisplayId) -> &mut DisplayState<C> {
        let i = self.index(display);
        &mut self.displays[i]
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use scanout_core::display::DisplayProfile;
    use scanout_core::format::PixelFormat;
    use scanout_core::layer::{Layer, LayerId, SourceImage};

    use super::*;
    use crate::collaborator::NullDisplayColor;
    use crate::encode::{BlobError, BlobId};

    #[derive(Default)]
    struct Counter(u32);

    impl BlobSink for Counter {
        fn create(&mut self, _: &[u8]) -> Result<BlobId, BlobError> {
            self.0 += 1;
            Ok(BlobId(self.0))
        }

        fn destroy(&mut self, _: BlobId) {}
    }

    fn layers() -> Vec<Layer> {
        vec![Layer::new(
            LayerId(1),
            SourceImage::new(PixelFormat::Rgba8888, 1080, 2400),
            kurbo::Rect::new(0.0, 0.0, 1080.0, 2400.0),
        )]
    }

    #[test]
    fn displays_without_color_are_skipped() {
        let mut composer =
            FrameComposer::<NullDisplayColor>::new(Allocator::gs101().unwrap());
        let layers = layers();
        composer.begin_frame();
        let out = composer.compose(
            &FrameRequest::new(0, DisplayProfile::primary(1080, 2400), &layers),
            &mut Counter::default(),
        );
        assert_eq!(out.color, ColorOutcome::Skipped);

        let out = composer.compose(
            &FrameRequest::new(0, DisplayProfile::external(1920, 1080), &layers),
            &mut Counter::default(),
        );
        assert_eq!(out.color, ColorOutcome::Skipped);
    }

    #[test]
    fn on_change_policy_skips_identical_frames() {
        let mut composer = FrameComposer::new(Allocator::gs101().unwrap())
            .with_policy(ReprogramPolicy::OnChange);
        composer.attach_color(DisplayId::PRIMARY, NullDisplayColor::default());
        let layers = layers();
        let profile = DisplayProfile::primary(1080, 2400);
        let mut sink = Counter::default();

        composer.begin_frame();
        let first = composer.compose(&FrameRequest::new(0, profile, &layers), &mut sink);
        assert!(matches!(first.color, ColorOutcome::Programmed(_)));

        composer.begin_frame();
        let second = composer.compose(&FrameRequest::new(1, profile, &layers), &mut sink);
        assert_eq!(second.color, ColorOutcome::Unchanged);
    }

    #[test]
    fn always_policy_reprograms_every_frame() {
        let mut composer = FrameComposer::new(Allocator::gs101().unwrap());
        composer.attach_color(DisplayId::PRIMARY, NullDisplayColor::default());
        let layers = layers();
        let profile = DisplayProfile::primary(1080, 2400);
        let mut sink = Counter::default();
        for i in 0..3 {
            composer.begin_frame();
            let out = composer.compose(&FrameRequest::new(i, profile, &layers), &mut sink);
            assert!(matches!(out.color, ColorOutcome::Programmed(_)));
        }
    }
}
