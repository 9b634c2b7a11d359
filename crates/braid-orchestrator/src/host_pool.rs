//! Round-robin host selection.
//!
//! The pool maps host-group names to ordered endpoint lists. Group
//! membership is fixed at startup; the only mutable state is one atomic
//! cursor per group, so `pick` never takes a lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use braid_common::config::HostEntry;

struct Group {
    entries: Vec<HostEntry>,
    cursor: AtomicUsize,
}

/// Shared, read-only map of host groups with per-group round-robin
/// cursors.
pub struct HostPool {
    groups: HashMap<String, Group>,
}

impl HostPool {
    /// Builds the pool from parsed host groups. Group lists are validated
    /// non-empty by the configuration layer.
    pub fn new(hosts: BTreeMap<String, Vec<HostEntry>>) -> Self {
        let groups = hosts
            .into_iter()
            .map(|(name, entries)| {
                (
                    name,
                    Group {
                        entries,
                        cursor: AtomicUsize::new(0),
                    },
                )
            })
            .collect();
        Self { groups }
    }

    pub fn contains(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    pub fn group_len(&self, group: &str) -> usize {
        self.groups.get(group).map_or(0, |g| g.entries.len())
    }

    /// Returns the next endpoint of `group` in round-robin order, or
    /// `None` for a group the pool does not know. Thread-safe.
    pub fn pick(&self, group: &str) -> Option<HostEntry> {
        let group = self.groups.get(group)?;
        let index = group.cursor.fetch_add(1, Ordering::Relaxed) % group.entries.len();
        Some(group.entries[index].clone())
    }
}
