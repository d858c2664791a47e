//! Caller-supplied configuration shapes. JSON loading is out of scope (an
//! external collaborator's job), but these are the concrete structures a
//! loader has something to deserialize into, behind the optional `serde`
//! feature, the same way the rest of this crate keeps its ambient
//! concerns real rather than hand-rolled.

use std::collections::{BTreeMap, BTreeSet};

#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CropBounds {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// Crop bounds keyed by `def_type`, plus the Airship/Boat override for
/// `def_type == 4` and the set of `def_type`s that opt out of predefined
/// cropping entirely.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, Default)]
pub struct CropConfig {
    pub predefined: BTreeMap<u32, CropBounds>,
    pub airship_boat_override: CropBounds,
    pub no_crop_types: BTreeSet<u32>,
}

/// Group-name tables, keyed first by `def_type` then by `group_index`.
/// `cast_ids`/`attack2_ids` hold the DEF (object) ids whose creature groups
/// 17/18 get dynamically relabeled.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, Default)]
pub struct GroupNameTable {
    pub by_def_type: BTreeMap<u32, BTreeMap<u32, String>>,
    pub cast_ids: BTreeSet<u32>,
    pub attack2_ids: BTreeSet<u32>,
}

#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, Default)]
pub struct HotaConfig {
    pub enabled: bool,
    pub p2p3_shadow_ids: BTreeSet<u32>,
    pub bg255_to_5_ids: BTreeSet<u32>,
    /// Object ids that keep index 5's opaque palette colour instead of
    /// treating it as the selection-highlight index. Grouped with the
    /// other per-id palette overrides even though it is not itself a HotA
    /// fix, since no other config shape in this module is a better fit.
    pub keep_selection_palette_ids: BTreeSet<u32>,
}

#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, Default)]
pub struct DurationConfig {
    pub default_ms_by_type: BTreeMap<u32, u32>,
    pub group_overrides: BTreeMap<(u32, u32), u32>,
}

impl DurationConfig {
    /// Per-type default, overridden per `(def_type, group_index)` when
    /// present; depends on nothing else (frame index and frame count are
    /// accepted for API symmetry with the duration function's documented
    /// signature but this config layer has no finer granularity).
    #[must_use]
    pub fn lookup_ms(&self, def_type: u32, group_index: u32) -> u32 {
        self.group_overrides
            .get(&(def_type, group_index))
            .copied()
            .or_else(|| self.default_ms_by_type.get(&def_type).copied())
            .unwrap_or(100)
    }
}
