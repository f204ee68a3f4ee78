//! Size-class free-list table
//!
//! One ordered set of free block offsets per power-of-two size class.
//! Ordering by offset keeps allocation lowest-address-first and makes dumps
//! reproducible.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

#[cfg(feature = "log")]
use log::error;

use crate::is_aligned;

/// Free lists indexed by size class: class `i` holds free blocks of `2^i` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeListTable {
    classes: Vec<BTreeSet<usize>>,
}

impl FreeListTable {
    /// Create an empty table for a pool of `pool_size` bytes (`log2(pool_size) + 1` classes).
    pub fn new(pool_size: usize) -> Self {
        debug_assert!(pool_size.is_power_of_two());
        let num_classes = pool_size.trailing_zeros() as usize + 1;
        let mut classes = Vec::with_capacity(num_classes);
        classes.resize_with(num_classes, BTreeSet::new);
        Self { classes }
    }

    /// Create a table whose only free block is the whole pool.
    pub fn with_whole_pool(pool_size: usize) -> Self {
        let mut table = Self::new(pool_size);
        let top = table.top_class();
        table.classes[top].insert(0);
        table
    }

    /// Number of size classes tracked.
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Size class of the whole pool.
    pub fn top_class(&self) -> usize {
        self.classes.len() - 1
    }

    /// Record `offset` as a free block of class `class`.
    ///
    /// Returns `false` if the class is out of range, the offset is not aligned
    /// to the block size, or the entry already exists.
    pub fn insert(&mut self, class: usize, offset: usize) -> bool {
        if class >= self.classes.len() {
            error!(
                "free lists: class {} exceeds top class {}",
                class,
                self.top_class()
            );
            return false;
        }
        if !is_aligned(offset, 1 << class) {
            error!(
                "free lists: offset {:#x} is not aligned for class {}",
                offset, class
            );
            return false;
        }
        self.classes[class].insert(offset)
    }

    /// Remove `offset` from class `class`. Returns whether it was present.
    pub fn remove(&mut self, class: usize, offset: usize) -> bool {
        match self.classes.get_mut(class) {
            Some(list) => list.remove(&offset),
            None => false,
        }
    }

    /// Take the lowest-addressed free block of class `class`.
    pub fn pop_lowest(&mut self, class: usize) -> Option<usize> {
        self.classes.get_mut(class)?.pop_first()
    }

    /// Whether `offset` is free at class `class`.
    pub fn contains(&self, class: usize, offset: usize) -> bool {
        self.classes
            .get(class)
            .is_some_and(|list| list.contains(&offset))
    }

    /// First class at or above `class` that has a free block.
    pub fn first_non_empty_from(&self, class: usize) -> Option<usize> {
        (class..self.classes.len()).find(|&c| !self.classes[c].is_empty())
    }

    /// Number of free blocks in class `class`.
    pub fn len(&self, class: usize) -> usize {
        self.classes.get(class).map_or(0, BTreeSet::len)
    }

    /// Whether no class holds any free block.
    pub fn is_empty(&self) -> bool {
        self.classes.iter().all(BTreeSet::is_empty)
    }

    /// Ascending offsets of the free blocks in class `class`.
    pub fn offsets(&self, class: usize) -> impl Iterator<Item = usize> + '_ {
        self.classes.get(class).into_iter().flatten().copied()
    }

    /// All free blocks as `(class, offset)`, smallest class first, ascending offsets.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.classes
            .iter()
            .enumerate()
            .flat_map(|(class, list)| list.iter().map(move |&offset| (class, offset)))
    }

    /// Total bytes covered by free blocks.
    pub fn free_bytes(&self) -> usize {
        self.classes
            .iter()
            .enumerate()
            .map(|(class, list)| list.len() << class)
            .sum()
    }

    /// Size of the largest free block, if any.
    pub fn largest_free_block(&self) -> Option<usize> {
        self.classes
            .iter()
            .rposition(|list| !list.is_empty())
            .map(|class| 1 << class)
    }

    /// Free the block `(class, offset)`, merging it with its buddy while the buddy is free.
    ///
    /// Returns the `(class, offset)` of the block that was finally recorded.
    pub(crate) fn coalesce_and_insert(
        &mut self,
        mut class: usize,
        mut offset: usize,
    ) -> (usize, usize) {
        while class < self.top_class() {
            let buddy = offset ^ (1 << class);
            if !self.remove(class, buddy) {
                break;
            }
            offset &= buddy;
            class += 1;
        }
        if !self.insert(class, offset) {
            error!(
                "free lists: failed to record free block: offset={:#x}, class={}",
                offset, class
            );
        }
        (class, offset)
    }

    /// Copy of this table with room for one more (doubled) size class.
    pub(crate) fn grown(&self) -> Self {
        let mut classes = self.classes.clone();
        classes.push(BTreeSet::new());
        Self { classes }
    }
}
