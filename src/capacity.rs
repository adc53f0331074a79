use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::DEFAULT_GROUP_CAPACITY;
use crate::models::{GroupId, Paralelo};

/// `current + incoming <= capacity`, without overflow.
pub fn can_assign(current: u32, incoming: u32, capacity: u32) -> bool {
    current
        .checked_add(incoming)
        .is_some_and(|total| total <= capacity)
}

/// Advisory capacity check for the assign dialog. The backend stays the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityGuard {
    capacity: u32,
}

impl Default for CapacityGuard {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_CAPACITY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupChoice {
    pub group_id: GroupId,
    pub label: String,
    pub current: u32,
    pub capacity: u32,
    pub enabled: bool,
}

impl GroupChoice {
    /// e.g. `3-A (48/50)`.
    pub fn display(&self) -> String {
        format!("{} ({}/{})", self.label, self.current, self.capacity)
    }
}

impl CapacityGuard {
    pub fn new(capacity: u32) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn can_assign(&self, current: u32, incoming: u32) -> bool {
        can_assign(current, incoming, self.capacity)
    }

    pub fn remaining(&self, current: u32) -> u32 {
        self.capacity.saturating_sub(current)
    }

    /// Occupancy rounded to a whole percent. Over-full groups report above 100.
    pub fn occupancy_percent(&self, current: u32) -> u32 {
        if self.capacity == 0 {
            return if current == 0 { 0 } else { 100 };
        }
        ((current as f64 / self.capacity as f64) * 100.0).round() as u32
    }

    /// One selectable entry per group, disabled when `incoming` would not fit.
    pub fn choices(
        &self,
        paralelos: &[Paralelo],
        counts: &BTreeMap<GroupId, usize>,
        incoming: u32,
    ) -> Vec<GroupChoice> {
        paralelos
            .iter()
            .map(|p| {
                let current = counts.get(&p.id).copied().unwrap_or(0) as u32;
                GroupChoice {
                    group_id: p.id,
                    label: p.label(),
                    current,
                    capacity: self.capacity,
                    enabled: self.can_assign(current, incoming),
                }
            })
            .collect()
    }
}
