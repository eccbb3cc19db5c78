//! Named resource groups.
//!
//! Sprite files are loaded in groups (icons, worms, one group per terrain
//! theme, ...). Each group owns a contiguous run of bank ids, so a sprite is
//! addressed as "group start + index".

use log::debug;
use thiserror::Error;

use crate::sprites::{BankId, MAX_SPRITE_BANKS};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("group {0:?} already exists")]
    DuplicateGroup(String),
    #[error("group {name:?} needs {count} banks but only {free} are left")]
    OutOfBanks { name: String, count: u32, free: u32 },
    #[error("group {0:?} must hold at least one bank")]
    EmptyGroup(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceGroup {
    pub name: String,
    pub start: BankId,
    pub count: u32,
}

impl ResourceGroup {
    pub fn bank(&self, index: u32) -> Option<BankId> {
        (index < self.count).then(|| self.start + index)
    }
}

/// Allocates bank ids to groups in registration order.
pub struct ResourceGroups {
    groups: Vec<ResourceGroup>,
    next: BankId,
    limit: BankId,
}

impl ResourceGroups {
    pub fn new() -> Self {
        Self::with_limit(MAX_SPRITE_BANKS as BankId)
    }

    pub fn with_limit(limit: BankId) -> Self {
        Self {
            groups: Vec::new(),
            next: 0,
            limit,
        }
    }

    /// Reserve `count` banks for `name`. Returns the group index.
    pub fn add_group(&mut self, name: &str, count: u32) -> Result<usize, GroupError> {
        if count == 0 {
            return Err(GroupError::EmptyGroup(name.to_string()));
        }
        if self.find(name).is_some() {
            return Err(GroupError::DuplicateGroup(name.to_string()));
        }
        let free = self.limit - self.next;
        if count > free {
            return Err(GroupError::OutOfBanks {
                name: name.to_string(),
                count,
                free,
            });
        }

        let group = ResourceGroup {
            name: name.to_string(),
            start: self.next,
            count,
        };
        debug!(
            "group {:?}: banks {}..{}",
            name,
            group.start,
            group.start + count
        );
        self.next += count;
        self.groups.push(group);
        Ok(self.groups.len() - 1)
    }

    pub fn get(&self, group: usize) -> Option<&ResourceGroup> {
        self.groups.get(group)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    /// First bank id of a group.
    pub fn group_start(&self, group: usize) -> Option<BankId> {
        self.get(group).map(|g| g.start)
    }

    pub fn group_name(&self, group: usize) -> Option<&str> {
        self.get(group).map(|g| g.name.as_str())
    }

    pub fn bank(&self, group: usize, index: u32) -> Option<BankId> {
        self.get(group)?.bank(index)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Banks allocated across every group.
    pub fn total(&self) -> u32 {
        self.next
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceGroup> {
        self.groups.iter()
    }
}

impl Default for ResourceGroups {
    fn default() -> Self {
        Self::new()
    }
}
