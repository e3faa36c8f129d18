// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame resource allocation.
//!
//! [`Allocator::allocate`] maps every layer of one display to a hardware unit
//! or to client composition. A frame goes through these steps:
//!
//! 1. Layers that ask for client composition are passed through.
//! 2. The rest are visited in z-order. Candidate unit types come from the
//!    display profile's preference list, filtered by its type mask.
//! 3. Units of each type are tried in ascending index. A unit is skipped if
//!    it is reserved, owned by another display, not pre-assigned to this
//!    display in the current mode, or full. Otherwise the classifier, the
//!    shared-group rules ([`shared_compatible`]) and, for the first consumer
//!    of a blit unit, the reservation of a fetch unit to show its output all
//!    have to pass. A blit unit only merges layers that are adjacent in
//!    z-order, since its output is shown as one window. The first unit that
//!    passes wins.
//! 4. A layer with no unit is demoted with the most specific reason seen.
//! 5. The load of each capacity-limited physical engine, summed over all of
//!    its logical units, is checked against the per-frame cycle budget. This
//!    display's consumers are demoted last-bound first until it fits, and
//!    layers that had no unit get another try on the freed capacity.
//! 6. Client-composed layers are widened to one contiguous z-range, and a
//!    fetch unit is held for the client target at the range's position. When
//!    none is free, the frontmost hardware layer joins the range.
//! 7. Window configs are built and validated. A failing (layer, unit) pair is
//!    banned and the frame re-run; after too many re-runs every layer goes to
//!    client composition.
//!
//! Bound consumers are never preempted by later layers within a pass, and no
//! failure panics.

use alloc::vec::Vec;
use core::fmt;

use crate::catalog::{Catalog, Features, UnitKind, UnitType};
use crate::classify::Classifier;
use crate::config::AllocatorConfig;
use crate::display::{DisplayId, DisplayMode, DisplayProfile};
use crate::layer::{CompositionType, GeometryError, Image, Layer, LayerId};
use crate::pool::{AssignState, Consumer, TopologyError, UnitId, UnitPool};
use crate::topology::Topology;
use crate::trace::{
    AllocationBeginEvent, AllocationEndEvent, BandwidthCheckEvent, LayerAssignedEvent,
    LayerDemotedEvent, TargetReservedEvent, Tracer, ValidationRetryEvent,
};
use crate::window::{self, ClientTarget, WindowConfig, WindowSource};

/// Where a layer is composed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// A hardware unit.
    Unit(UnitId),
    /// Client (GPU/software) composition.
    Client,
}

/// Why a device layer ended up in client composition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DemotionReason {
    /// No allowed unit type can take the layer.
    CapabilityMismatch,
    /// The layer's geometry is degenerate.
    InvalidGeometry(GeometryError),
    /// Capable units exist but all are busy, reserved, or not available to
    /// this display.
    NoUnitAvailable,
    /// The only capable free units conflict with a shared-group partner.
    SharedConflict,
    /// Demoted to bring a capacity-limited engine within budget.
    Bandwidth,
    /// Sits between client-composed layers, or gave up its unit so the
    /// client target could be shown.
    ClientRange,
    /// Every capable unit failed window validation for this layer.
    InvalidConfiguration,
    /// Window validation kept failing; the whole frame fell back.
    RetriesExhausted,
}

impl DemotionReason {
    /// Rank used to keep the most specific reason while searching.
    const fn specificity(self) -> u8 {
        match self {
            Self::CapabilityMismatch => 0,
            Self::InvalidConfiguration => 1,
            Self::NoUnitAvailable => 2,
            Self::SharedConflict => 3,
            Self::InvalidGeometry(_)
            | Self::Bandwidth
            | Self::ClientRange
            | Self::RetriesExhausted => 4,
        }
    }

    fn prefer(&mut self, other: Self) {
        if other.specificity() > self.specificity() {
            *self = other;
        }
    }
}

impl fmt::Display for DemotionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapabilityMismatch => f.write_str("no capable unit type"),
            Self::InvalidGeometry(e) => write!(f, "invalid geometry: {e}"),
            Self::NoUnitAvailable => f.write_str("no unit available"),
            Self::SharedConflict => f.write_str("shared group conflict"),
            Self::Bandwidth => f.write_str("blit bandwidth exceeded"),
            Self::ClientRange => f.write_str("inside the client composition range"),
            Self::InvalidConfiguration => f.write_str("window configuration invalid"),
            Self::RetriesExhausted => f.write_str("validation retries exhausted"),
        }
    }
}

/// A device layer moved to client composition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Demotion {
    /// The layer.
    pub layer: LayerId,
    /// Why.
    pub reason: DemotionReason,
}

/// How a frame finished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FrameOutcome {
    /// Assignment produced and validated.
    #[default]
    Complete,
    /// Validation kept failing; everything is client-composed.
    Fallback,
}

/// A fetch unit reserved to show a blit unit's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlitTarget {
    /// Blit unit.
    pub blit: UnitId,
    /// Reserved fetch unit.
    pub target: UnitId,
}

/// Input for one display's frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameRequest<'a> {
    /// Frame counter.
    pub frame_index: u64,
    /// Current display mode.
    pub mode: DisplayMode,
    /// Allocation profile; carries the display id and size.
    pub profile: DisplayProfile,
    /// Layers in z-order, back to front.
    pub layers: &'a [Layer],
}

impl<'a> FrameRequest<'a> {
    /// Creates a request in the default display mode.
    #[must_use]
    pub fn new(frame_index: u64, profile: DisplayProfile, layers: &'a [Layer]) -> Self {
        Self {
            frame_index,
            mode: DisplayMode::default(),
            profile,
            layers,
        }
    }
}

/// Result of allocating one display's frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameAssignment {
    /// Frame counter.
    pub frame_index: u64,
    /// Display.
    pub display: DisplayId,
    /// One entry per request layer, in request order.
    pub targets: Vec<(LayerId, Target)>,
    /// Device layers that went to client composition.
    pub demotions: Vec<Demotion>,
    /// Windows to program, by z-position.
    pub windows: Vec<WindowConfig>,
    /// Fetch units showing blit output.
    pub blit_targets: Vec<BlitTarget>,
    /// Fetch unit showing the client composition target, if any layer is
    /// client-composed.
    pub client_target: Option<ClientTarget>,
    /// Outcome.
    pub outcome: FrameOutcome,
    /// Re-runs caused by failed validation.
    pub retries: u32,
}

impl FrameAssignment {
    /// Target of `layer`, if it was in the request.
    #[must_use]
    pub fn target(&self, layer: LayerId) -> Option<Target> {
        self.targets
            .iter()
            .find(|(l, _)| *l == layer)
            .map(|&(_, t)| t)
    }

    /// Demotion reason of `layer`, if it was demoted.
    #[must_use]
    pub fn demotion(&self, layer: LayerId) -> Option<DemotionReason> {
        self.demotions
            .iter()
            .find(|d| d.layer == layer)
            .map(|d| d.reason)
    }

    /// Layers on hardware units, in request order.
    pub fn assigned(&self) -> impl Iterator<Item = (LayerId, UnitId)> + '_ {
        self.targets.iter().filter_map(|&(l, t)| match t {
            Target::Unit(u) => Some((l, u)),
            Target::Client => None,
        })
    }
}

/// Whether `incoming` may be fetched while a shared-group partner is
/// fetching `placed`.
///
/// A compressed `incoming` needs the partner's transform to be a subset of
/// its own, and the partner to be uncompressed or both to be narrower than
/// `threshold`. A 90°-rotated `incoming` is refused next to a compressed
/// partner whose transform differs or whose width exceeds `threshold`.
#[must_use]
pub fn shared_compatible(placed: &Image, incoming: &Image, threshold: u32) -> bool {
    if incoming.compressed {
        if !incoming.transform.contains(placed.transform) {
            return false;
        }
        if placed.compressed && !(placed.w <= threshold && incoming.w < threshold) {
            return false;
        }
    }
    if incoming.transform.swaps_axes()
        && placed.compressed
        && (placed.transform != incoming.transform || placed.w > threshold)
    {
        return false;
    }
    true
}

/// Per-attempt bookkeeping.
#[derive(Debug)]
struct Pass {
    bound: Vec<Option<UnitId>>,
    failure: Vec<Option<DemotionReason>>,
    bandwidth_bans: Vec<(LayerId, UnitId)>,
    client_target: Option<ClientTarget>,
}

/// One consumer's share of a physical engine's load.
struct Load {
    order: u64,
    unit: UnitId,
    layer: LayerId,
    cycles: f64,
    own: bool,
}

/// Assigns layers to hardware units, one display frame at a time.
#[derive(Debug)]
pub struct Allocator {
    pool: UnitPool,
    catalog: Catalog,
    config: AllocatorConfig,
}

impl Allocator {
    /// Creates an allocator over the units of `topology`.
    pub fn new(
        topology: &Topology,
        catalog: Catalog,
        config: AllocatorConfig,
    ) -> Result<Self, TopologyError> {
        Ok(Self {
            pool: UnitPool::new(topology)?,
            catalog,
            config,
        })
    }

    /// An allocator with the gs101 topology, catalog and limits.
    pub fn gs101() -> Result<Self, TopologyError> {
        Self::new(&Topology::gs101(), Catalog::gs101(), AllocatorConfig::gs101())
    }

    /// The unit pool and its current assignment.
    #[must_use]
    pub fn pool(&self) -> &UnitPool {
        &self.pool
    }

    /// The restriction catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The limits in use.
    #[must_use]
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Frame boundary: returns every unit to idle.
    pub fn begin_frame(&mut self) {
        self.pool.reset();
    }

    /// Allocates one display's frame.
    pub fn allocate(&mut self, req: &FrameRequest<'_>) -> FrameAssignment {
        self.allocate_traced(req, &mut Tracer::none())
    }

    /// Allocates one display's frame, reporting to `tracer`.
    ///
    /// Units this display held from a previous call are released first;
    /// units owned by other displays are left alone.
    pub fn allocate_traced(
        &mut self,
        req: &FrameRequest<'_>,
        tracer: &mut Tracer<'_>,
    ) -> FrameAssignment {
        let display = req.profile.id;
        let images: Vec<Result<(Image, Image), GeometryError>> = req
            .layers
            .iter()
            .map(|l| l.images(req.profile.width, req.profile.height))
            .collect();
        let mut bans: Vec<(LayerId, UnitId)> = Vec::new();
        let mut attempt = 0;

        loop {
            tracer.allocation_begin(&AllocationBeginEvent {
                frame_index: req.frame_index,
                display,
                layer_count: count(req.layers.len()),
                attempt,
            });
            self.pool.release_display(display);
            let pass = self.run_pass(req, &images, &bans, tracer);

            let mut windows = window::build(
                &self.pool,
                display,
                req.layers,
                pass.client_target.as_ref(),
            );
            let invalid = if req.profile.validates_windows {
                window::validate(&mut windows)
            } else {
                Vec::new()
            };
            if invalid.is_empty() {
                return self.finish(req, &pass, windows, attempt, tracer);
            }

            tracer.validation_retry(&ValidationRetryEvent {
                frame_index: req.frame_index,
                attempt,
                invalid_windows: count(invalid.len()),
            });
            for inv in &invalid {
                log::warn!(
                    "frame {}: window on unit {:?} disabled: {}",
                    req.frame_index,
                    inv.window.unit,
                    inv.fault
                );
                match inv.window.source {
                    WindowSource::Layer(layer) => bans.push((layer, inv.window.unit)),
                    WindowSource::BlitOutput(blit) => {
                        if let Some(unit) = self.pool.unit(blit) {
                            bans.extend(unit.consumers.iter().map(|c| (c.layer, blit)));
                        }
                    }
                    WindowSource::ClientTarget => {}
                }
            }

            attempt += 1;
            if attempt > self.config.max_validation_retries {
                log::error!(
                    "frame {}: window validation failed {attempt} times on display {:?}, \
                     falling back to client composition",
                    req.frame_index,
                    display
                );
                self.pool.release_display(display);
                return self.fallback(req, attempt, tracer);
            }
        }
    }

    fn run_pass(
        &mut self,
        req: &FrameRequest<'_>,
        images: &[Result<(Image, Image), GeometryError>],
        bans: &[(LayerId, UnitId)],
        tracer: &mut Tracer<'_>,
    ) -> Pass {
        let n = req.layers.len();
        let mut pass = Pass {
            bound: alloc::vec![None; n],
            failure: alloc::vec![None; n],
            bandwidth_bans: Vec::new(),
            client_target: None,
        };

        for (i, layer) in req.layers.iter().enumerate() {
            if layer.composition == CompositionType::Client {
                continue;
            }
            match &images[i] {
                Err(e) => pass.failure[i] = Some(DemotionReason::InvalidGeometry(*e)),
                Ok((src, dst)) => self.place(req, i, src, dst, bans, &mut pass, tracer),
            }
        }

        while self.enforce_bandwidth(req, &mut pass, tracer) > 0 {
            for i in 0..n {
                let retry = matches!(
                    pass.failure[i],
                    Some(DemotionReason::NoUnitAvailable | DemotionReason::SharedConflict)
                );
                if let (true, Ok((src, dst))) = (retry, &images[i]) {
                    self.place(req, i, src, dst, bans, &mut pass, tracer);
                }
            }
        }
        self.settle_client_range(req, &mut pass);
        pass
    }

    /// Tries every candidate unit for layer `i`, first fit.
    fn place(
        &mut self,
        req: &FrameRequest<'_>,
        i: usize,
        src: &Image,
        dst: &Image,
        bans: &[(LayerId, UnitId)],
        pass: &mut Pass,
        tracer: &mut Tracer<'_>,
    ) {
        let layer = &req.layers[i];
        let display = req.profile.id;
        let classifier = Classifier::new(&self.catalog, self.config.rotated_src_width_ceiling);
        let mut reason = DemotionReason::CapabilityMismatch;

        for unit_type in req.profile.candidate_types() {
            if let Err(rejection) = classifier.check(unit_type, src, dst, &layer.hdr) {
                log::debug!("{:?}: {unit_type:?} rejected: {rejection}", layer.id);
                continue;
            }
            let ids: Vec<UnitId> = self.pool.of_type(unit_type).collect();
            for id in ids {
                let Some(unit) = self.pool.unit(id) else {
                    continue;
                };
                if unit.state == AssignState::Reserved
                    || unit.owner.is_some_and(|o| o != display)
                    || !unit.serves(display, req.mode)
                    || unit.is_full()
                    || pass.bandwidth_bans.contains(&(layer.id, id))
                {
                    reason.prefer(DemotionReason::NoUnitAvailable);
                    continue;
                }
                if unit
                    .desc
                    .source_class
                    .is_some_and(|c| c != src.format.restriction_class())
                {
                    continue;
                }
                if bans.contains(&(layer.id, id)) {
                    reason.prefer(DemotionReason::InvalidConfiguration);
                    continue;
                }
                if !self.shared_ok(id, src) {
                    log::debug!("{:?}: {} shared group conflict", layer.id, unit.desc.name);
                    reason.prefer(DemotionReason::SharedConflict);
                    continue;
                }
                let blit = unit.desc.unit_type.kind() == UnitKind::Blit;
                if blit && !self.keeps_contiguous(req, pass, id, i) {
                    log::debug!("{:?}: {} merges other layers", layer.id, unit.desc.name);
                    reason.prefer(DemotionReason::NoUnitAvailable);
                    continue;
                }

                let needs_target =
                    blit && unit.consumers.is_empty() && req.profile.reserves_blit_target;
                let target = if needs_target {
                    let Some(t) = self.pick_target(req) else {
                        reason.prefer(DemotionReason::NoUnitAvailable);
                        continue;
                    };
                    Some(t)
                } else {
                    None
                };

                let consumer = Consumer {
                    layer: layer.id,
                    src: *src,
                    dst: *dst,
                    order: 0,
                };
                if let Err(e) = self.pool.bind(id, display, consumer) {
                    log::warn!("{:?}: bind failed: {e}", layer.id);
                    reason.prefer(DemotionReason::NoUnitAvailable);
                    continue;
                }
                if let Some(t) = target {
                    if let Err(e) = self.pool.reserve(t, display, id) {
                        log::warn!("{:?}: target reservation failed: {e}", layer.id);
                        self.pool.unbind(id, layer.id);
                        reason.prefer(DemotionReason::NoUnitAvailable);
                        continue;
                    }
                    tracer.target_reserved(&TargetReservedEvent {
                        frame_index: req.frame_index,
                        blit: id,
                        target: t,
                    });
                }
                log::debug!("{:?} -> unit {:?} ({unit_type:?})", layer.id, id);
                pass.bound[i] = Some(id);
                pass.failure[i] = None;
                return;
            }
        }
        pass.failure[i] = Some(reason);
    }

    /// Checks the shared-group rules for fetching `src` on `id`.
    fn shared_ok(&self, id: UnitId, src: &Image) -> bool {
        let threshold = self.config.compressed_width_threshold;
        self.pool.partners(id).all(|p| match self.pool.unit(p) {
            // Idle, or holding an uncompressed, unrotated composition target.
            Some(partner) if partner.state == AssignState::Assigned => partner
                .consumers
                .iter()
                .all(|c| shared_compatible(&c.src, src, threshold)),
            _ => true,
        })
    }

    /// Whether adding layer `i` to blit unit `id` leaves every layer between
    /// the unit's sources on the unit too.
    fn keeps_contiguous(
        &self,
        req: &FrameRequest<'_>,
        pass: &Pass,
        id: UnitId,
        i: usize,
    ) -> bool {
        let Some(unit) = self.pool.unit(id) else {
            return false;
        };
        let (lo, hi) = unit
            .consumers
            .iter()
            .filter_map(|c| layer_index(req, c.layer))
            .fold((i, i), |(lo, hi), j| (lo.min(j), hi.max(j)));
        (lo..=hi).all(|j| j == i || pass.bound[j] == Some(id))
    }

    /// The least capable idle fetch unit this display may use.
    fn pick_target(&self, req: &FrameRequest<'_>) -> Option<UnitId> {
        self.pool
            .units()
            .filter(|u| {
                u.desc.unit_type.kind() == UnitKind::Fetch
                    && u.state == AssignState::Idle
                    && u.serves(req.profile.id, req.mode)
                    && req.profile.allowed.contains(u.desc.unit_type.mask())
            })
            .min_by_key(|u| self.catalog.features(u.desc.unit_type).bits().count_ones())
            .map(|u| u.id)
    }

    /// Demotes this display's consumers of over-budget capacity-limited
    /// engines. Returns the number demoted.
    ///
    /// Logical units backed by one physical engine share its budget, and
    /// other displays' consumers count against it without being demoted.
    fn enforce_bandwidth(
        &mut self,
        req: &FrameRequest<'_>,
        pass: &mut Pass,
        tracer: &mut Tracer<'_>,
    ) -> u32 {
        let display = req.profile.id;
        let classifier = Classifier::new(&self.catalog, self.config.rotated_src_width_ceiling);
        let budget = self.config.blit_budget();
        let mut engines: Vec<(UnitType, u32)> = Vec::new();
        for u in self.pool.units().filter(|u| {
            u.state == AssignState::Assigned
                && self
                    .catalog
                    .features(u.desc.unit_type)
                    .contains(Features::USE_CAPA)
        }) {
            let engine = (u.desc.unit_type, u.desc.physical_index);
            if !engines.contains(&engine) {
                engines.push(engine);
            }
        }

        let mut total = 0;
        for (unit_type, physical_index) in engines {
            let mut first = None;
            let mut loads: Vec<Load> = Vec::new();
            for u in self.pool.units().filter(|u| {
                u.state == AssignState::Assigned
                    && u.desc.unit_type == unit_type
                    && u.desc.physical_index == physical_index
            }) {
                first.get_or_insert(u.id);
                loads.extend(u.consumers.iter().map(|c| Load {
                    order: c.order,
                    unit: u.id,
                    layer: c.layer,
                    cycles: classifier.cycles(unit_type, &c.src, &c.dst).unwrap_or(0.0),
                    own: u.owner == Some(display),
                }));
            }
            let (Some(engine), true) = (first, loads.iter().any(|l| l.own)) else {
                continue;
            };
            loads.sort_by_key(|l| l.order);
            let required: f64 = loads.iter().map(|l| l.cycles).sum();

            let mut remaining = required;
            let mut demoted = 0;
            for load in loads.iter().rev().filter(|l| l.own) {
                if remaining <= budget {
                    break;
                }
                self.pool.unbind(load.unit, load.layer);
                remaining -= load.cycles;
                pass.bandwidth_bans.push((load.layer, load.unit));
                if let Some(i) = layer_index(req, load.layer) {
                    pass.bound[i] = None;
                    pass.failure[i] = Some(DemotionReason::Bandwidth);
                }
                demoted += 1;
            }
            tracer.bandwidth_check(&BandwidthCheckEvent {
                frame_index: req.frame_index,
                unit: engine,
                required_cycles: required,
                budget_cycles: budget,
                demoted,
            });
            if demoted > 0 {
                log::warn!(
                    "frame {}: {unit_type:?}{physical_index} needs {required:.0} of {budget:.0} \
                     cycles, demoted {demoted} layer(s)",
                    req.frame_index,
                );
            }
            total += demoted;
        }
        total
    }

    /// Widens the client-composed layers to one z-range and holds a fetch
    /// unit for the target they are composed into.
    fn settle_client_range(&mut self, req: &FrameRequest<'_>, pass: &mut Pass) {
        if !req.profile.reserves_client_target {
            return;
        }
        let n = req.layers.len();
        let Some(mut lo) = (0..n).find(|&i| pass.bound[i].is_none()) else {
            return;
        };
        let mut hi = (0..n).rev().find(|&i| pass.bound[i].is_none()).unwrap_or(lo);

        loop {
            for i in lo..=hi {
                if let Some(unit) = pass.bound[i].take() {
                    self.pool.unbind(unit, req.layers[i].id);
                    pass.failure[i] = Some(DemotionReason::ClientRange);
                }
            }
            if let Some(unit) = self.pick_target(req) {
                match self.pool.reserve_client(unit, req.profile.id) {
                    Ok(()) => {
                        log::debug!("client target on unit {unit:?} at z {lo}");
                        pass.client_target = Some(ClientTarget::new(
                            unit,
                            count(lo),
                            req.profile.width,
                            req.profile.height,
                        ));
                    }
                    Err(e) => log::warn!("client target reservation failed: {e}"),
                }
                return;
            }
            let Some(last) = (0..n).rev().find(|&i| pass.bound[i].is_some()) else {
                log::warn!(
                    "frame {}: no fetch unit left for the client target",
                    req.frame_index
                );
                return;
            };
            lo = lo.min(last);
            hi = hi.max(last);
        }
    }

    fn finish(
        &self,
        req: &FrameRequest<'_>,
        pass: &Pass,
        windows: Vec<WindowConfig>,
        retries: u32,
        tracer: &mut Tracer<'_>,
    ) -> FrameAssignment {
        let display = req.profile.id;
        let mut targets = Vec::with_capacity(req.layers.len());
        let mut demotions = Vec::new();
        let mut client = 0;

        for (i, layer) in req.layers.iter().enumerate() {
            let target = match (pass.bound[i], pass.failure[i]) {
                (Some(unit), _) => {
                    if let Some(u) = self.pool.unit(unit) {
                        tracer.layer_assigned(&LayerAssignedEvent {
                            frame_index: req.frame_index,
                            layer: layer.id,
                            unit,
                            unit_type: u.desc.unit_type,
                        });
                    }
                    Target::Unit(unit)
                }
                (None, Some(reason)) => {
                    match reason {
                        DemotionReason::SharedConflict
                        | DemotionReason::Bandwidth
                        | DemotionReason::ClientRange => {
                            log::warn!("{:?} demoted: {reason}", layer.id);
                        }
                        _ => log::debug!("{:?} demoted: {reason}", layer.id),
                    }
                    tracer.layer_demoted(&LayerDemotedEvent {
                        frame_index: req.frame_index,
                        layer: layer.id,
                        reason,
                    });
                    demotions.push(Demotion {
                        layer: layer.id,
                        reason,
                    });
                    Target::Client
                }
                (None, None) => {
                    client += 1;
                    Target::Client
                }
            };
            targets.push((layer.id, target));
        }

        let blit_targets: Vec<BlitTarget> = self
            .pool
            .units()
            .filter(|u| u.owner == Some(display) && u.state == AssignState::Reserved)
            .filter_map(|u| {
                Some(BlitTarget {
                    blit: u.link?,
                    target: u.id,
                })
            })
            .collect();

        let assigned = count(targets.len()) - count(demotions.len()) - client;
        tracer.allocation_end(&AllocationEndEvent {
            frame_index: req.frame_index,
            display,
            assigned,
            demoted: count(demotions.len()),
            client,
            outcome: FrameOutcome::Complete,
        });

        FrameAssignment {
            frame_index: req.frame_index,
            display,
            targets,
            demotions,
            windows,
            blit_targets,
            client_target: pass.client_target,
            outcome: FrameOutcome::Complete,
            retries,
        }
    }

    fn fallback(
        &mut self,
        req: &FrameRequest<'_>,
        retries: u32,
        tracer: &mut Tracer<'_>,
    ) -> FrameAssignment {
        let display = req.profile.id;
        let client_target = if req.profile.reserves_client_target && !req.layers.is_empty() {
            self.pick_target(req).and_then(|unit| {
                self.pool.reserve_client(unit, display).ok()?;
                Some(ClientTarget::new(unit, 0, req.profile.width, req.profile.height))
            })
        } else {
            None
        };
        let windows = window::build(&self.pool, display, req.layers, client_target.as_ref());

        let mut demotions = Vec::new();
        for layer in req
            .layers
            .iter()
            .filter(|l| l.composition == CompositionType::Device)
        {
            let reason = DemotionReason::RetriesExhausted;
            tracer.layer_demoted(&LayerDemotedEvent {
                frame_index: req.frame_index,
                layer: layer.id,
                reason,
            });
            demotions.push(Demotion {
                layer: layer.id,
                reason,
            });
        }
        let demoted = count(demotions.len());
        tracer.allocation_end(&AllocationEndEvent {
            frame_index: req.frame_index,
            display: req.profile.id,
            assigned: 0,
            demoted,
            client: count(req.layers.len()) - demoted,
            outcome: FrameOutcome::Fallback,
        });
        FrameAssignment {
            frame_index: req.frame_index,
            display: req.profile.id,
            targets: req.layers.iter().map(|l| (l.id, Target::Client)).collect(),
            demotions,
            windows,
            blit_targets: Vec::new(),
            client_target,
            outcome: FrameOutcome::Fallback,
            retries,
        }
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn layer_index(req: &FrameRequest<'_>, layer: LayerId) -> Option<usize> {
    req.layers.iter().position(|l| l.id == layer)
}

#[cfg(test)]
mod tests {
    use kurbo::Rect;

    use super::*;
    use crate::format::PixelFormat;
    use crate::layer::{SourceImage, Transform};

    fn image(w: u32, compressed: bool, transform: Transform) -> Image {
        Image::from_rect(
            PixelFormat::Rgba8888,
            Rect::new(0.0, 0.0, f64::from(w), 100.0),
            w,
            100,
            transform,
            compressed,
        )
        .unwrap()
    }

    #[test]
    fn uncompressed_partner_allows_wide_compressed_layer() {
        let placed = image(3000, false, Transform::empty());
        let incoming = image(3000, true, Transform::empty());
        assert!(shared_compatible(&placed, &incoming, 2048));
    }

    #[test]
    fn two_compressed_layers_must_both_be_narrow() {
        let narrow = image(1024, true, Transform::empty());
        let wide = image(2400, true, Transform::empty());
        assert!(shared_compatible(&narrow, &narrow, 2048));
        assert!(!shared_compatible(&wide, &narrow, 2048));
        assert!(!shared_compatible(&narrow, &wide, 2048));
    }

    #[test]
    fn partner_transform_must_be_subset() {
        let flipped = image(512, false, Transform::FLIP_H);
        let plain = image(512, true, Transform::empty());
        let rotated = image(512, true, Transform::ROT_270);
        assert!(!shared_compatible(&flipped, &plain, 2048));
        assert!(shared_compatible(&flipped, &rotated, 2048));
    }

    #[test]
    fn rotation_is_vetoed_next_to_differently_transformed_compressed_partner() {
        let compressed = image(1024, true, Transform::empty());
        let rotated = image(1024, false, Transform::ROT_90);
        assert!(!shared_compatible(&compressed, &rotated, 2048));
        let same = image(1024, true, Transform::ROT_90);
        assert!(shared_compatible(&same, &rotated, 2048));
    }

    #[test]
    fn most_specific_reason_wins() {
        let mut r = DemotionReason::CapabilityMismatch;
        r.prefer(DemotionReason::SharedConflict);
        r.prefer(DemotionReason::NoUnitAvailable);
        assert_eq!(r, DemotionReason::SharedConflict);
    }

    #[test]
    fn client_layers_pass_through() {
        let mut alloc = Allocator::gs101().unwrap();
        let mut layer = Layer::new(
            LayerId(1),
            SourceImage::new(PixelFormat::Rgba8888, 1080, 2400),
            Rect::new(0.0, 0.0, 1080.0, 2400.0),
        );
        layer.composition = CompositionType::Client;
        let layers = [layer];
        let req = FrameRequest::new(0, DisplayProfile::primary(1080, 2400), &layers);
        let out = alloc.allocate(&req);
        assert_eq!(out.target(LayerId(1)), Some(Target::Client));
        assert!(out.demotions.is_empty());
        assert_eq!(out.windows.len(), 1);
        assert_eq!(out.windows[0].source, WindowSource::ClientTarget);
        assert_eq!(out.client_target.map(|t| t.zpos), Some(0));
    }

    #[test]
    fn degenerate_layer_is_demoted_not_panicking() {
        let mut alloc = Allocator::gs101().unwrap();
        let mut source = SourceImage::new(PixelFormat::Rgba8888, 1080, 2400);
        source.crop = Rect::new(10.0, 10.0, 10.0, 500.0);
        let layers = [Layer::new(
            LayerId(1),
            source,
            Rect::new(0.0, 0.0, 100.0, 100.0),
        )];
        let req = FrameRequest::new(0, DisplayProfile::primary(1080, 2400), &layers);
        let out = alloc.allocate(&req);
        assert!(matches!(
            out.demotion(LayerId(1)),
            Some(DemotionReason::InvalidGeometry(_))
        ));
    }

    #[test]
    fn full_screen_layer_lands_on_first_primary_gf() {
        let mut alloc = Allocator::gs101().unwrap();
        let layers = [Layer::new(
            LayerId(1),
            SourceImage::new(PixelFormat::Rgba8888, 1080, 2400),
            Rect::new(0.0, 0.0, 1080.0, 2400.0),
        )];
        let req = FrameRequest::new(0, DisplayProfile::primary(1080, 2400), &layers);
        let out = alloc.allocate(&req);
        let Some(Target::Unit(unit)) = out.target(LayerId(1)) else {
            panic!("layer should be on a unit");
        };
        assert_eq!(alloc.pool().unit(unit).unwrap().desc.name, "DPP_GF1");
        assert_eq!(out.windows.len(), 1);
        assert_eq!(out.outcome, FrameOutcome::Complete);
    }
}
