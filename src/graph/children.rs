//! Child-list controller: the only path that mutates a container's children.
//!
//! Mutations are two-phase. [`SceneGraph::validate`] checks a
//! [`ChildBatch`] against every structural invariant without touching the
//! graph; [`SceneGraph::commit`] applies the resulting [`ValidatedBatch`].
//! A rejected batch therefore leaves the child list and its membership
//! index exactly as they were.

use std::collections::HashSet;
use std::ops::Range;

use super::node::{DirtyBits, NodeId};
use super::tree::SceneGraph;
use crate::error::{Result, SceneError};
use crate::layout::LayoutFlag;

// ---------------------------------------------------------------------------
// ChildList
// ---------------------------------------------------------------------------

/// Per-container child storage.
#[derive(Debug, Default)]
pub(crate) struct ChildList {
    /// Paint order, back to front.
    pub(crate) children: Vec<NodeId>,
    /// Membership index mirroring `children`.
    pub(crate) members: HashSet<NodeId>,
    /// Children removed since the last sync, in removal order.
    pub(crate) removed: Vec<NodeId>,
    /// Too many removals to enumerate: the renderer rebuilds the whole list.
    pub(crate) removed_overflow: bool,
    /// First index that changed since the last sync.
    pub(crate) start_index: usize,
}

// ---------------------------------------------------------------------------
// ChildBatch
// ---------------------------------------------------------------------------

/// A proposed change to one container's children.
///
/// Expressed relative to the current sequence: a set of removed index
/// ranges, then a run of nodes inserted at one position of the remaining
/// sequence. `None` entries stand for null children and are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildBatch {
    removed: Vec<Range<usize>>,
    inserted: Vec<Option<NodeId>>,
    insert_at: usize,
}

impl ChildBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the children at `range` (indices of the current sequence).
    pub fn remove(mut self, range: Range<usize>) -> Self {
        self.removed.push(range);
        self
    }

    /// Insert `nodes` at `index` of the sequence left after removals.
    pub fn insert(self, index: usize, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.insert_nullable(index, nodes.into_iter().map(Some))
    }

    /// Like [`insert`](Self::insert), but entries may be null.
    pub fn insert_nullable(mut self, index: usize, nodes: impl IntoIterator<Item = Option<NodeId>>) -> Self {
        self.insert_at = index;
        self.inserted.extend(nodes);
        self
    }

    /// The sequence this batch would produce from `current`, ignoring validity.
    pub fn proposed(&self, current: &[NodeId]) -> Vec<Option<NodeId>> {
        let mut kept: Vec<Option<NodeId>> = current
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.removed.iter().any(|r| r.contains(i)))
            .map(|(_, &n)| Some(n))
            .collect();
        let at = self.insert_at.min(kept.len());
        kept.splice(at..at, self.inserted.iter().copied());
        kept
    }
}

/// A batch that passed validation, ready to [`commit`](SceneGraph::commit).
#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    parent: NodeId,
    epoch: u64,
    removed: Vec<Range<usize>>,
    removed_nodes: Vec<NodeId>,
    inserted: Vec<NodeId>,
    insert_at: usize,
    membership_changed: bool,
}

impl ValidatedBatch {
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn removed(&self) -> &[NodeId] {
        &self.removed_nodes
    }

    pub fn inserted(&self) -> &[NodeId] {
        &self.inserted
    }

    /// True when the batch only reorders existing children.
    pub fn is_permutation(&self) -> bool {
        !self.membership_changed
    }
}

// ---------------------------------------------------------------------------
// Two-phase API
// ---------------------------------------------------------------------------

impl SceneGraph {
    /// Check `batch` against the structural invariants of `parent`.
    ///
    /// In order: null entries, nodes serving as clips, cycles, scene
    /// roots, then duplicates across the resulting sequence. Nothing in
    /// the graph changes, whatever the outcome.
    pub fn validate(&self, parent: NodeId, batch: ChildBatch) -> Result<ValidatedBatch> {
        self.check_mutation(parent)?;
        self.node(parent)?;
        let list = self.child_lists.get(parent).ok_or(SceneError::NotAContainer(parent))?;
        let old_len = list.children.len();

        let ChildBatch { mut removed, inserted, insert_at } = batch;
        removed.retain(|r| !r.is_empty());
        removed.sort_by_key(|r| r.start);
        let mut prev_end = 0;
        let mut removed_len = 0;
        for r in &removed {
            if r.start < prev_end || r.end > old_len {
                return Err(SceneError::InvalidBatch(format!(
                    "removed range {r:?} overlaps another range or exceeds {old_len} children"
                )));
            }
            prev_end = r.end;
            removed_len += r.len();
        }
        let kept_len = old_len - removed_len;
        if insert_at > kept_len {
            return Err(SceneError::InvalidBatch(format!(
                "insertion index {insert_at} out of bounds for {kept_len} remaining children"
            )));
        }

        let removed_nodes: Vec<NodeId> = removed
            .iter()
            .flat_map(|r| list.children[r.clone()].iter().copied())
            .collect();

        let membership_changed = !(inserted.len() == removed_len
            && inserted.iter().all(|n| n.is_some_and(|n| list.members.contains(&n))));

        if membership_changed {
            // Reverse order so the last offending entry is reported, as a
            // caller appending one by one would see it.
            for entry in inserted.iter().rev() {
                let node = entry
                    .filter(|&n| self.nodes.contains_key(n))
                    .ok_or(SceneError::NullChild { parent })?;
                if self.nodes[node].clip_parent.is_some() {
                    return Err(SceneError::ClipTarget { parent, node });
                }
                if self.is_ancestor(node, parent) {
                    return Err(SceneError::Cycle { parent, node });
                }
                if self.is_scene_root(node) {
                    return Err(SceneError::SceneRootAsChild { parent, node });
                }
            }
        }

        let removed_set: HashSet<NodeId> = removed_nodes.iter().copied().collect();
        let mut seen = HashSet::with_capacity(inserted.len());
        let mut resolved = Vec::with_capacity(inserted.len());
        for node in inserted.into_iter().flatten() {
            let kept = list.members.contains(&node) && !removed_set.contains(&node);
            if kept || !seen.insert(node) {
                return Err(SceneError::DuplicateChild { parent, node });
            }
            resolved.push(node);
        }

        Ok(ValidatedBatch {
            parent,
            epoch: self.epoch,
            removed,
            removed_nodes,
            inserted: resolved,
            insert_at,
            membership_changed,
        })
    }

    /// Apply a validated batch.
    ///
    /// Fails with [`SceneError::InvalidBatch`] if the graph changed
    /// structurally since the batch was validated.
    pub fn commit(&mut self, batch: ValidatedBatch) -> Result<()> {
        if batch.epoch != self.epoch || !self.child_lists.contains_key(batch.parent) {
            return Err(SceneError::InvalidBatch(
                "stale batch: the graph changed after validation".into(),
            ));
        }
        self.check_mutation(batch.parent)?;
        self.apply_validated(batch);
        Ok(())
    }

    /// Validate and commit in one step.
    pub fn apply(&mut self, parent: NodeId, batch: ChildBatch) -> Result<()> {
        let validated = self.validate(parent, batch)?;
        self.apply_validated(validated);
        Ok(())
    }

    fn apply_validated(&mut self, batch: ValidatedBatch) {
        let ValidatedBatch {
            parent,
            removed,
            removed_nodes,
            inserted,
            insert_at,
            membership_changed,
            ..
        } = batch;
        let parent_scene = self.scene_of(parent);

        if membership_changed {
            for &node in &inserted {
                if let Some(old_parent) = self.parent(node).filter(|&p| p != parent) {
                    if self.config.warn_on_auto_move {
                        log::warn!("{node:?} moved from {old_parent:?} to {parent:?} implicitly");
                    } else {
                        log::debug!("{node:?} moved from {old_parent:?} to {parent:?} implicitly");
                    }
                    self.detach_from(old_parent, node);
                }
            }
        }

        let mut relayout = false;
        let mut geom_changed = false;

        // -- removals -------------------------------------------------------
        if membership_changed {
            let overflow = {
                let threshold = self.config.removed_children_threshold;
                let tree_invisible = !self.is_tree_visible(parent);
                let Some(list) = self.child_lists.get_mut(parent) else { return };
                if list.removed.len() + removed_nodes.len() > threshold || tree_invisible {
                    list.removed_overflow = true;
                    list.removed.clear();
                }
                list.removed_overflow
            };
            for &old in &removed_nodes {
                let Some(data) = self.nodes.get(old) else { continue };
                let (visible, managed, old_scene) = (data.visible, data.managed, data.scene);
                relayout |= managed;
                if visible {
                    geom_changed = true;
                    self.child_excluded(parent, old);
                }
                if let Some(data) = self.nodes.get_mut(old) {
                    if data.parent == Some(parent) {
                        data.parent = None;
                    }
                }
                self.set_scenes(old, None);
                if let Some(scene) = old_scene {
                    self.departures.push((scene, old));
                }
                if let Some(list) = self.child_lists.get_mut(parent) {
                    list.members.remove(&old);
                    if parent_scene.is_some() && !overflow {
                        list.removed.push(old);
                    }
                }
            }
        } else {
            relayout = removed_nodes.iter().any(|&n| self.nodes.get(n).is_some_and(|d| d.managed));
        }

        if let Some(list) = self.child_lists.get_mut(parent) {
            for r in removed.iter().rev() {
                list.children.drain(r.clone());
            }
            list.children.splice(insert_at..insert_at, inserted.iter().copied());
        }

        // -- additions ------------------------------------------------------
        if membership_changed {
            for &node in &inserted {
                let child_needs_layout = self.layout.get(node).is_some_and(|s| s.flag != LayoutFlag::Clean);
                let Some(data) = self.nodes.get_mut(node) else { continue };
                data.parent = Some(parent);
                let (visible, managed) = (data.visible, data.managed);
                relayout |= managed || child_needs_layout;
                if let Some(list) = self.child_lists.get_mut(parent) {
                    list.members.insert(node);
                }
                self.set_scenes(node, parent_scene);
                if visible {
                    geom_changed = true;
                    self.child_included(parent, node);
                }
            }
        }

        self.promote_dirty_children(parent);

        if relayout {
            self.request_layout(parent);
        }
        if geom_changed {
            self.geom_changed(parent);
        }
        let first = removed.first().map_or(insert_at, |r| r.start.min(insert_at));
        if let Some(list) = self.child_lists.get_mut(parent) {
            list.start_index = list.start_index.min(first);
        }
        self.mark_dirty(parent, DirtyBits::CHILDREN | DirtyBits::FORCE_SYNC);
        self.epoch += 1;
    }

    /// Remove `node` from `old_parent` while it is being stolen by another
    /// container. The caller already validated the destination.
    fn detach_from(&mut self, old_parent: NodeId, node: NodeId) {
        let Some(index) = self.index_of(old_parent, node) else { return };
        self.apply_validated(ValidatedBatch {
            parent: old_parent,
            epoch: self.epoch,
            removed: vec![index..index + 1],
            removed_nodes: vec![node],
            inserted: Vec::new(),
            insert_at: index,
            membership_changed: true,
        });
    }

    /// Build a reordering batch without membership checks: the nodes are
    /// known members, so only the order changes.
    fn permutation(&self, parent: NodeId, order: Vec<NodeId>) -> ValidatedBatch {
        let len = order.len();
        ValidatedBatch {
            parent,
            epoch: self.epoch,
            removed: vec![0..len],
            removed_nodes: self.children(parent).to_vec(),
            inserted: order,
            insert_at: 0,
            membership_changed: false,
        }
    }

    // -----------------------------------------------------------------------
    // Convenience mutations
    // -----------------------------------------------------------------------

    /// Position of `node` in `parent`'s children.
    pub fn index_of(&self, parent: NodeId, node: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == node)
    }

    /// Replace `range` with `nodes`.
    pub fn splice(&mut self, parent: NodeId, range: Range<usize>, nodes: impl IntoIterator<Item = NodeId>) -> Result<()> {
        let start = range.start;
        self.apply(parent, ChildBatch::new().remove(range).insert(start, nodes))
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.add_children(parent, [child])
    }

    pub fn add_children(&mut self, parent: NodeId, nodes: impl IntoIterator<Item = NodeId>) -> Result<()> {
        let len = self.child_count(parent);
        self.apply(parent, ChildBatch::new().insert(len, nodes))
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.apply(parent, ChildBatch::new().insert(index, [child]))
    }

    /// Replace every child.
    pub fn set_children(&mut self, parent: NodeId, nodes: impl IntoIterator<Item = NodeId>) -> Result<()> {
        let len = self.child_count(parent);
        self.splice(parent, 0..len, nodes)
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let index = self.index_of(parent, child).ok_or_else(|| {
            SceneError::InvalidBatch(format!("{child:?} is not a child of {parent:?}"))
        })?;
        self.remove_children_at(parent, index..index + 1)
    }

    pub fn remove_children_at(&mut self, parent: NodeId, range: Range<usize>) -> Result<()> {
        let start = range.start;
        self.apply(parent, ChildBatch::new().remove(range).insert(start, []))
    }

    pub fn clear_children(&mut self, parent: NodeId) -> Result<()> {
        let len = self.child_count(parent);
        self.remove_children_at(parent, 0..len)
    }

    /// Reorder every child. `order` must be a permutation of the current children.
    pub fn permute(&mut self, parent: NodeId, order: Vec<NodeId>) -> Result<()> {
        self.check_mutation(parent)?;
        let list = self.child_lists.get(parent).ok_or(SceneError::NotAContainer(parent))?;
        if order.len() != list.children.len() {
            return Err(SceneError::InvalidBatch(format!(
                "permutation has {} entries for {} children",
                order.len(),
                list.children.len()
            )));
        }
        let mut seen = HashSet::with_capacity(order.len());
        for &node in &order {
            if !list.members.contains(&node) || !seen.insert(node) {
                return Err(SceneError::DuplicateChild { parent, node });
            }
        }
        let batch = self.permutation(parent, order);
        self.apply_validated(batch);
        Ok(())
    }

    /// Move `node` to the end of its parent's children (painted on top).
    pub fn to_front(&mut self, node: NodeId) -> Result<()> {
        self.move_within_parent(node, true)
    }

    /// Move `node` to the start of its parent's children (painted first).
    pub fn to_back(&mut self, node: NodeId) -> Result<()> {
        self.move_within_parent(node, false)
    }

    fn move_within_parent(&mut self, node: NodeId, front: bool) -> Result<()> {
        let Some(parent) = self.node(node)?.parent else { return Ok(()) };
        self.check_mutation(parent)?;
        let Some(index) = self.index_of(parent, node) else { return Ok(()) };
        let len = self.child_count(parent);
        let target = if front { len - 1 } else { 0 };
        if index == target {
            return Ok(());
        }
        let mut order = self.children(parent).to_vec();
        order.remove(index);
        order.insert(target, node);
        let batch = self.permutation(parent, order);
        self.apply_validated(batch);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sync bookkeeping queries
    // -----------------------------------------------------------------------

    /// Children removed since the last sync, or `None` when the container
    /// overflowed and will resend its whole list.
    pub fn pending_removals(&self, parent: NodeId) -> Option<&[NodeId]> {
        let list = self.child_lists.get(parent)?;
        (!list.removed_overflow).then_some(list.removed.as_slice())
    }

    /// First child index the renderer has not seen yet.
    pub fn first_dirty_index(&self, parent: NodeId) -> Option<usize> {
        self.child_lists.get(parent).map(|list| list.start_index)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
