// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static description of the hardware units on a SoC.
//!
//! A [`Topology`] lists every unit once, with its type, indices, the displays
//! it may serve per mode, its consumer limit, and the shared group it
//! belongs to (if any). Members of a shared group sit behind one memory
//! port; the allocator keeps their concurrent use compatible.

use crate::catalog::UnitType;
use crate::display::PreAssign;
use crate::format::RestrictionClass;

/// One hardware unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitDesc {
    /// Unit type.
    pub unit_type: UnitType,
    /// Diagnostic name.
    pub name: &'static str,
    /// Index among physical units of the same type.
    pub physical_index: u32,
    /// Index among logical units backed by the same physical unit.
    pub logical_index: u32,
    /// Displays this unit may serve.
    pub pre_assign: PreAssign,
    /// Maximum simultaneous consumers (1 for fetch units).
    pub max_consumers: u32,
    /// Restricts sources to one class, for logical blit units.
    pub source_class: Option<RestrictionClass>,
    /// Shared group id, if the unit shares a memory port.
    pub shared_group: Option<u32>,
}

impl UnitDesc {
    /// A single-consumer fetch unit.
    #[must_use]
    pub const fn fetch(
        unit_type: UnitType,
        name: &'static str,
        physical_index: u32,
        pre_assign: PreAssign,
        shared_group: Option<u32>,
    ) -> Self {
        Self {
            unit_type,
            name,
            physical_index,
            logical_index: 0,
            pre_assign,
            max_consumers: 1,
            source_class: None,
            shared_group,
        }
    }

    /// A logical unit of a blit engine.
    #[must_use]
    pub const fn blit(
        name: &'static str,
        logical_index: u32,
        pre_assign: PreAssign,
        max_consumers: u32,
        source_class: Option<RestrictionClass>,
    ) -> Self {
        Self {
            unit_type: UnitType::G2d,
            name,
            physical_index: 0,
            logical_index,
            pre_assign,
            max_consumers,
            source_class,
            shared_group: None,
        }
    }
}

/// The unit table of a SoC.
#[derive(Clone, Copy, Debug)]
pub struct Topology {
    units: &'static [UnitDesc],
}

impl Topology {
    /// Wraps a unit table.
    #[must_use]
    pub const fn new(units: &'static [UnitDesc]) -> Self {
        Self { units }
    }

    /// The gs101 unit table.
    #[must_use]
    pub const fn gs101() -> Self {
        Self::new(GS101_UNITS)
    }

    /// Units in table order.
    #[must_use]
    pub const fn units(&self) -> &'static [UnitDesc] {
        self.units
    }
}

/// Sources merged by one blit pass.
pub const BLIT_MAX_SOURCES: u32 = 3;

const P: PreAssign = PreAssign::PRIMARY_MAIN_PRIMARY;
const E: PreAssign = PreAssign::PRIMARY_MAIN_EXTERNAL;
const V: PreAssign = PreAssign::PRIMARY_MAIN_VIRTUAL;
const XP: PreAssign = PreAssign::EXTERNAL_MAIN_PRIMARY;
const XE: PreAssign = PreAssign::EXTERNAL_MAIN_EXTERNAL;
const XV: PreAssign = PreAssign::EXTERNAL_MAIN_VIRTUAL;

static GS101_UNITS: &[UnitDesc] = &[
    UnitDesc::fetch(UnitType::Gf, "DPP_GF0", 0, E.union(XE), Some(0)),
    UnitDesc::fetch(UnitType::Gf, "DPP_GF1", 1, P.union(XP), Some(1)),
    UnitDesc::fetch(UnitType::Gf, "DPP_GF2", 2, P.union(XE), Some(2)),
    UnitDesc::fetch(UnitType::Vgrfs, "DPP_VGRFS0", 0, E.union(XE), Some(0)),
    UnitDesc::fetch(UnitType::Vgrfs, "DPP_VGRFS1", 1, P.union(XE), Some(1)),
    UnitDesc::fetch(UnitType::Vgrfs, "DPP_VGRFS2", 2, P.union(XE), Some(2)),
    UnitDesc::blit("G2D0-YUV_PRI", 0, P.union(XP), 1, Some(RestrictionClass::Yuv)),
    UnitDesc::blit("G2D0-YUV_PRI", 1, P.union(XP), 1, Some(RestrictionClass::Yuv)),
    UnitDesc::blit("G2D0-YUV_EXT", 2, E.union(XE), 1, Some(RestrictionClass::Yuv)),
    UnitDesc::blit(
        "G2D0-RGB_PRI",
        3,
        P.union(XP),
        BLIT_MAX_SOURCES,
        Some(RestrictionClass::Rgb),
    ),
    UnitDesc::blit(
        "G2D0-RGB_EXT",
        4,
        E.union(XE),
        BLIT_MAX_SOURCES,
        Some(RestrictionClass::Rgb),
    ),
    UnitDesc::blit("G2D0-COMBO_VIR", 5, V.union(XV), BLIT_MAX_SOURCES, None),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayId, DisplayMode};

    #[test]
    fn every_fetch_unit_has_a_group_partner() {
        let units = Topology::gs101().units();
        for u in units.iter().filter(|u| u.unit_type != UnitType::G2d) {
            let group = u.shared_group.unwrap();
            let members = units
                .iter()
                .filter(|o| o.shared_group == Some(group))
                .count();
            assert_eq!(members, 2, "{} should share with one partner", u.name);
        }
    }

    #[test]
    fn primary_main_split() {
        let primary: alloc::vec::Vec<_> = Topology::gs101()
            .units()
            .iter()
            .filter(|u| u.unit_type != UnitType::G2d)
            .filter(|u| u.pre_assign.allows(DisplayId::PRIMARY, DisplayMode::PrimaryMain))
            .map(|u| u.name)
            .collect();
        assert_eq!(primary, ["DPP_GF1", "DPP_GF2", "DPP_VGRFS1", "DPP_VGRFS2"]);
    }
}
