// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays unit pool with per-frame assignment state.
//!
//! The pool is built once from a [`Topology`] and lives as long as the
//! device. Every unit occupies one slot in a set of parallel arrays and is
//! addressed by a [`UnitId`]. Shared groups are plain index tables: each
//! unit records its [`SharedGroupId`], and each group records its members.
//!
//! Assignment state is mutated by the allocator only. [`UnitPool::reset`]
//! returns every unit to [`AssignState::Idle`] at the frame boundary;
//! [`UnitPool::release_display`] does the same for the units one display
//! owns, leaving other displays' assignments in place.

use alloc::vec::Vec;
use core::fmt;

use crate::catalog::{UnitKind, UnitType};
use crate::display::{DisplayId, DisplayMode};
use crate::layer::{Image, LayerId};
use crate::topology::{Topology, UnitDesc};

/// Handle to a unit in a [`UnitPool`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(pub u32);

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId({})", self.0)
    }
}

/// Dense id of a shared group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SharedGroupId(pub u32);

/// Per-frame state of a unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AssignState {
    /// Free.
    #[default]
    Idle,
    /// Holding a composition target: a blit unit's output or the client
    /// target.
    Reserved,
    /// Serving at least one layer.
    Assigned,
}

/// A layer bound to a unit, with the images it was checked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Consumer {
    /// The layer.
    pub layer: LayerId,
    /// Source image.
    pub src: Image,
    /// Destination image.
    pub dst: Image,
    /// Bind sequence number, stamped by [`UnitPool::bind`]. Lower binds
    /// happened earlier in the frame.
    pub order: u64,
}

/// Read-only view of one unit.
#[derive(Clone, Copy, Debug)]
pub struct HardwareUnit<'a> {
    /// Handle.
    pub id: UnitId,
    /// Static description.
    pub desc: &'a UnitDesc,
    /// Assignment state.
    pub state: AssignState,
    /// Display that owns the unit this frame.
    pub owner: Option<DisplayId>,
    /// Bound layers, in bind order.
    pub consumers: &'a [Consumer],
    /// Shared group.
    pub group: Option<SharedGroupId>,
    /// For a blit unit, its reserved composition target. For a reserved
    /// fetch unit, the blit unit it serves; `None` on the client target.
    pub link: Option<UnitId>,
}

impl HardwareUnit<'_> {
    /// Returns `true` if no more consumers can be bound.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.consumers.len() >= self.desc.max_consumers as usize
    }

    /// Returns `true` if the unit may serve `display` in `mode`.
    #[must_use]
    pub const fn serves(&self, display: DisplayId, mode: DisplayMode) -> bool {
        self.desc.pre_assign.allows(display, mode)
    }

    /// Sequence number of the earliest bind still on the unit.
    #[must_use]
    pub fn claimed_at(&self) -> Option<u64> {
        self.consumers.iter().map(|c| c.order).min()
    }
}

/// Pool construction or state-transition failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TopologyError {
    /// Handle out of range.
    UnknownUnit(UnitId),
    /// The unit is reserved as a composition target.
    Reserved(UnitId),
    /// The unit is busy; it cannot be reserved.
    NotIdle(UnitId),
    /// The unit is owned by another display this frame.
    OwnedElsewhere(UnitId),
    /// The unit already has `max_consumers` consumers.
    Full(UnitId),
    /// A fetch unit with a consumer limit other than one, or a blit unit
    /// with none.
    ConsumerLimit(&'static str),
    /// A shared group with a single member.
    LonelyGroup(u32),
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownUnit(id) => write!(f, "unknown unit {}", id.0),
            Self::Reserved(id) => write!(f, "unit {} is reserved", id.0),
            Self::NotIdle(id) => write!(f, "unit {} is not idle", id.0),
            Self::OwnedElsewhere(id) => write!(f, "unit {} is owned by another display", id.0),
            Self::Full(id) => write!(f, "unit {} has no free consumer slot", id.0),
            Self::ConsumerLimit(name) => write!(f, "{name} has an invalid consumer limit"),
            Self::LonelyGroup(g) => write!(f, "shared group {g} has one member"),
        }
    }
}

impl core::error::Error for TopologyError {}

/// All hardware units and their per-frame assignment state.
#[derive(Debug)]
pub struct UnitPool {
    // -- Static --
    descs: Vec<UnitDesc>,
    group_of: Vec<Option<SharedGroupId>>,
    members: Vec<Vec<UnitId>>,
    /// Ids sorted by (type, physical index, logical index).
    order: Vec<UnitId>,

    // -- Per-frame --
    state: Vec<AssignState>,
    owner: Vec<Option<DisplayId>>,
    consumers: Vec<Vec<Consumer>>,
    link: Vec<Option<UnitId>>,
    next_order: u64,
}

impl UnitPool {
    /// Enumerates the units of `topology`, all idle.
    pub fn new(topology: &Topology) -> Result<Self, TopologyError> {
        let descs: Vec<UnitDesc> = topology.units().to_vec();
        let n = descs.len();

        let mut raw_groups: Vec<u32> = Vec::new();
        let mut members: Vec<Vec<UnitId>> = Vec::new();
        let mut group_of = Vec::with_capacity(n);
        for (i, d) in descs.iter().enumerate() {
            let limit_ok = match d.unit_type.kind() {
                UnitKind::Fetch => d.max_consumers == 1,
                UnitKind::Blit => d.max_consumers >= 1,
            };
            if !limit_ok {
                return Err(TopologyError::ConsumerLimit(d.name));
            }
            let group = d.shared_group.map(|raw| {
                let g = match raw_groups.iter().position(|&r| r == raw) {
                    Some(g) => g,
                    None => {
                        raw_groups.push(raw);
                        members.push(Vec::new());
                        raw_groups.len() - 1
                    }
                };
                members[g].push(unit_id(i));
                SharedGroupId(index_u32(g))
            });
            group_of.push(group);
        }
        if let Some(g) = members.iter().position(|m| m.len() < 2) {
            return Err(TopologyError::LonelyGroup(raw_groups[g]));
        }

        let mut order: Vec<UnitId> = (0..n).map(unit_id).collect();
        order.sort_by_key(|id| {
            let d = &descs[id.0 as usize];
            (type_rank(d.unit_type), d.physical_index, d.logical_index)
        });

        Ok(Self {
            descs,
            group_of,
            members,
            order,
            state: alloc::vec![AssignState::Idle; n],
            owner: alloc::vec![None; n],
            consumers: (0..n).map(|_| Vec::new()).collect(),
            link: alloc::vec![None; n],
            next_order: 0,
        })
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descs.len()
    }

    /// Returns `true` if the pool has no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    /// Returns a view of one unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<HardwareUnit<'_>> {
        let i = id.0 as usize;
        Some(HardwareUnit {
            id,
            desc: self.descs.get(i)?,
            state: self.state[i],
            owner: self.owner[i],
            consumers: &self.consumers[i],
            group: self.group_of[i],
            link: self.link[i],
        })
    }

    /// Views of every unit, in table order.
    pub fn units(&self) -> impl Iterator<Item = HardwareUnit<'_>> + '_ {
        (0..self.len()).filter_map(|i| self.unit(unit_id(i)))
    }

    /// Units of one type in ascending physical, then logical, index.
    pub fn of_type(&self, unit_type: UnitType) -> impl Iterator<Item = UnitId> + '_ {
        self.order
            .iter()
            .copied()
            .filter(move |id| self.descs[id.0 as usize].unit_type == unit_type)
    }

    /// Members of `group`.
    #[must_use]
    pub fn group_members(&self, group: SharedGroupId) -> &[UnitId] {
        self.members
            .get(group.0 as usize)
            .map_or(&[][..], Vec::as_slice)
    }

    /// The other members of `id`'s shared group.
    pub fn partners(&self, id: UnitId) -> impl Iterator<Item = UnitId> + '_ {
        let members = self
            .group_of
            .get(id.0 as usize)
            .copied()
            .flatten()
            .map_or(&[][..], |g| self.group_members(g));
        members.iter().copied().filter(move |&m| m != id)
    }

    /// Binds a consumer to a unit on behalf of `display`, stamping its bind
    /// order.
    pub fn bind(
        &mut self,
        id: UnitId,
        display: DisplayId,
        mut consumer: Consumer,
    ) -> Result<(), TopologyError> {
        let unit = self.unit(id).ok_or(TopologyError::UnknownUnit(id))?;
        match (unit.state, unit.owner) {
            (AssignState::Reserved, _) => return Err(TopologyError::Reserved(id)),
            (_, Some(owner)) if owner != display => {
                return Err(TopologyError::OwnedElsewhere(id));
            }
            _ => {}
        }
        if unit.is_full() {
            return Err(TopologyError::Full(id));
        }
        let i = id.0 as usize;
        consumer.order = self.next_order;
        self.next_order += 1;
        self.consumers[i].push(consumer);
        self.state[i] = AssignState::Assigned;
        self.owner[i] = Some(display);
        Ok(())
    }

    /// Removes `layer` from a unit. The unit goes idle when its last consumer
    /// leaves; a blit unit also gives back its composition target.
    pub fn unbind(&mut self, id: UnitId, layer: LayerId) -> Option<Consumer> {
        let i = id.0 as usize;
        let list = self.consumers.get_mut(i)?;
        let pos = list.iter().position(|c| c.layer == layer)?;
        let consumer = list.remove(pos);
        if list.is_empty() {
            self.release(id);
        }
        Some(consumer)
    }

    /// Reserves an idle fetch unit as the composition target of `blit`.
    pub fn reserve(
        &mut self,
        id: UnitId,
        display: DisplayId,
        blit: UnitId,
    ) -> Result<(), TopologyError> {
        let unit = self.unit(id).ok_or(TopologyError::UnknownUnit(id))?;
        if unit.state != AssignState::Idle {
            return Err(TopologyError::NotIdle(id));
        }
        if self.unit(blit).is_none() {
            return Err(TopologyError::UnknownUnit(blit));
        }
        let i = id.0 as usize;
        self.state[i] = AssignState::Reserved;
        self.owner[i] = Some(display);
        self.link[i] = Some(blit);
        self.link[blit.0 as usize] = Some(id);
        Ok(())
    }

    /// Reserves an idle fetch unit for the client composition target.
    pub fn reserve_client(
        &mut self,
        id: UnitId,
        display: DisplayId,
    ) -> Result<(), TopologyError> {
        let unit = self.unit(id).ok_or(TopologyError::UnknownUnit(id))?;
        if unit.state != AssignState::Idle {
            return Err(TopologyError::NotIdle(id));
        }
        let i = id.0 as usize;
        self.state[i] = AssignState::Reserved;
        self.owner[i] = Some(display);
        self.link[i] = None;
        Ok(())
    }

    /// Returns a unit to idle, dropping its consumers. A blit unit's reserved
    /// target is released with it.
    pub fn release(&mut self, id: UnitId) {
        let i = id.0 as usize;
        if i >= self.len() {
            return;
        }
        let link = self.link[i].take();
        let was_reserved = self.state[i] == AssignState::Reserved;
        self.state[i] = AssignState::Idle;
        self.owner[i] = None;
        self.consumers[i].clear();
        if let Some(other) = link {
            let j = other.0 as usize;
            if was_reserved {
                // A reserved target only unlinks its blit unit.
                self.link[j] = None;
            } else if self.state[j] == AssignState::Reserved {
                self.link[j] = None;
                self.state[j] = AssignState::Idle;
                self.owner[j] = None;
            }
        }
    }

    /// Releases every unit owned by `display`.
    pub fn release_display(&mut self, display: DisplayId) {
        for i in 0..self.len() {
            if self.owner[i] == Some(display) {
                self.release(unit_id(i));
            }
        }
    }

    /// Returns every unit to idle.
    pub fn reset(&mut self) {
        self.state.fill(AssignState::Idle);
        self.owner.fill(None);
        self.link.fill(None);
        for c in &mut self.consumers {
            c.clear();
        }
        self.next_order = 0;
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "unit tables are far smaller than u32::MAX"
)]
fn index_u32(i: usize) -> u32 {
    i as u32
}

fn unit_id(i: usize) -> UnitId {
    UnitId(index_u32(i))
}

const fn type_rank(t: UnitType) -> u8 {
    match t {
        UnitType::Gf => 0,
        UnitType::Vg => 1,
        UnitType::Vgs => 2,
        UnitType::Vgf => 3,
        UnitType::Vgrfs => 4,
        UnitType::G2d => 5,
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use kurbo::Rect;

    use super::*;
    use crate::display::PreAssign;
    use crate::format::PixelFormat;
    use crate::layer::Transform;

    fn consumer(layer: u64) -> Consumer {
        let img = Image::from_rect(
            PixelFormat::Rgba8888,
            Rect::new(0.0, 0.0, 64.0, 64.0),
            64,
            64,
            Transform::empty(),
            false,
        )
        .unwrap();
        Consumer {
            layer: LayerId(layer),
            src: img,
            dst: img,
            order: 0,
        }
    }

    fn pool() -> UnitPool {
        UnitPool::new(&Topology::gs101()).unwrap()
    }

    fn find(pool: &UnitPool, name: &str) -> UnitId {
        pool.units().find(|u| u.desc.name == name).unwrap().id
    }

    #[test]
    fn partners_are_the_other_group_members() {
        let pool = pool();
        let gf1 = find(&pool, "DPP_GF1");
        let vgrfs1 = find(&pool, "DPP_VGRFS1");
        assert_eq!(pool.partners(gf1).collect::<Vec<_>>(), [vgrfs1]);
        let blit = find(&pool, "G2D0-RGB_PRI");
        assert_eq!(pool.partners(blit).count(), 0);
    }

    #[test]
    fn of_type_is_ordered_by_index() {
        let pool = pool();
        let names: Vec<_> = pool
            .of_type(UnitType::Gf)
            .map(|id| pool.unit(id).unwrap().desc.name)
            .collect();
        assert_eq!(names, ["DPP_GF0", "DPP_GF1", "DPP_GF2"]);
    }

    #[test]
    fn fetch_unit_takes_one_consumer() {
        let mut pool = pool();
        let gf1 = find(&pool, "DPP_GF1");
        pool.bind(gf1, DisplayId::PRIMARY, consumer(1)).unwrap();
        assert_eq!(
            pool.bind(gf1, DisplayId::PRIMARY, consumer(2)),
            Err(TopologyError::Full(gf1))
        );
        assert_eq!(pool.unit(gf1).unwrap().state, AssignState::Assigned);
    }

    #[test]
    fn blit_unit_merges_up_to_limit() {
        let mut pool = pool();
        let blit = find(&pool, "G2D0-RGB_PRI");
        for l in 0..3 {
            pool.bind(blit, DisplayId::PRIMARY, consumer(l)).unwrap();
        }
        assert_eq!(
            pool.bind(blit, DisplayId::PRIMARY, consumer(3)),
            Err(TopologyError::Full(blit))
        );
    }

    #[test]
    fn other_display_cannot_bind_owned_unit() {
        let mut pool = pool();
        let blit = find(&pool, "G2D0-COMBO_VIR");
        pool.bind(blit, DisplayId::VIRTUAL, consumer(1)).unwrap();
        assert_eq!(
            pool.bind(blit, DisplayId::PRIMARY, consumer(2)),
            Err(TopologyError::OwnedElsewhere(blit))
        );
    }

    #[test]
    fn unbinding_last_consumer_frees_target() {
        let mut pool = pool();
        let blit = find(&pool, "G2D0-RGB_PRI");
        let gf2 = find(&pool, "DPP_GF2");
        pool.bind(blit, DisplayId::PRIMARY, consumer(1)).unwrap();
        pool.reserve(gf2, DisplayId::PRIMARY, blit).unwrap();
        assert_eq!(pool.unit(gf2).unwrap().state, AssignState::Reserved);
        assert_eq!(
            pool.bind(gf2, DisplayId::PRIMARY, consumer(2)),
            Err(TopologyError::Reserved(gf2))
        );

        assert!(pool.unbind(blit, LayerId(1)).is_some());
        assert_eq!(pool.unit(blit).unwrap().state, AssignState::Idle);
        assert_eq!(pool.unit(gf2).unwrap().state, AssignState::Idle);
        assert_eq!(pool.unit(gf2).unwrap().link, None);
    }

    #[test]
    fn binds_are_stamped_in_order() {
        let mut pool = pool();
        let blit = find(&pool, "G2D0-RGB_PRI");
        let gf1 = find(&pool, "DPP_GF1");
        pool.bind(gf1, DisplayId::PRIMARY, consumer(1)).unwrap();
        pool.bind(blit, DisplayId::PRIMARY, consumer(2)).unwrap();
        pool.bind(blit, DisplayId::PRIMARY, consumer(3)).unwrap();
        let orders: Vec<_> = pool
            .unit(blit)
            .unwrap()
            .consumers
            .iter()
            .map(|c| c.order)
            .collect();
        assert_eq!(orders, [1, 2]);
        assert_eq!(pool.unit(gf1).unwrap().claimed_at(), Some(0));
        assert_eq!(pool.unit(blit).unwrap().claimed_at(), Some(1));
    }

    #[test]
    fn client_target_is_an_unlinked_reservation() {
        let mut pool = pool();
        let gf2 = find(&pool, "DPP_GF2");
        pool.reserve_client(gf2, DisplayId::PRIMARY).unwrap();
        let unit = pool.unit(gf2).unwrap();
        assert_eq!(unit.state, AssignState::Reserved);
        assert_eq!(unit.link, None);
        assert_eq!(
            pool.reserve_client(gf2, DisplayId::PRIMARY),
            Err(TopologyError::NotIdle(gf2))
        );
        pool.release_display(DisplayId::PRIMARY);
        assert_eq!(pool.unit(gf2).unwrap().state, AssignState::Idle);
    }

    #[test]
    fn release_display_keeps_other_displays() {
        let mut pool = pool();
        let gf0 = find(&pool, "DPP_GF0");
        let gf1 = find(&pool, "DPP_GF1");
        pool.bind(gf0, DisplayId::EXTERNAL, consumer(1)).unwrap();
        pool.bind(gf1, DisplayId::PRIMARY, consumer(2)).unwrap();
        pool.release_display(DisplayId::PRIMARY);
        assert_eq!(pool.unit(gf1).unwrap().state, AssignState::Idle);
        assert_eq!(pool.unit(gf0).unwrap().state, AssignState::Assigned);
        pool.reset();
        assert!(pool.units().all(|u| u.state == AssignState::Idle));
    }

    #[test]
    fn lonely_group_is_rejected() {
        static UNITS: &[UnitDesc] = &[UnitDesc::fetch(
            UnitType::Gf,
            "GF",
            0,
            PreAssign::PRIMARY_MAIN_PRIMARY,
            Some(7),
        )];
        assert_eq!(
            UnitPool::new(&Topology::new(UNITS)).unwrap_err(),
            TopologyError::LonelyGroup(7)
        );
    }
}
