//! The vnode cache (`spec.md` §4.6): a process-wide, parent-linked
//! directory of cached `(vnid, name, parent)` tuples used to reconstruct
//! local paths from 64-bit vnode identifiers.
//!
//! Modeled per `spec.md` §9's guidance on cyclic pointer graphs: an arena
//! keyed by vnid rather than a linked list of raw pointers. `parent` is
//! `None` for share roots and otherwise a vnid key into the same map, so
//! there are no raw cycles to reason about — only key lookups that a
//! borrow checker already treats as plain data.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::lock::PriorityLock;

/// A single cached directory entry.
#[derive(Clone)]
struct Node {
    parent: Option<u64>,
    name: String,
    refcount: u32,
    invalid: bool,
}

/// Guards the arena with the reader/writer lock primitive of [`crate::lock`].
pub struct VnodeCache {
    nodes: PriorityLock<HashMap<u64, Node>>,
    next_vnid: AtomicU64,
}

impl Default for VnodeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl VnodeCache {
    pub fn new() -> Self {
        // 1 is reserved for share roots (`spec.md` §4.6).
        VnodeCache { nodes: PriorityLock::new(HashMap::new()), next_vnid: AtomicU64::new(2) }
    }

    /// Allocates a fresh vnid, process-wide and monotonically increasing so
    /// two sessions never collide over the same handle (`spec.md` §4.6).
    pub fn allocate_vnid(&self) -> u64 {
        self.next_vnid.fetch_add(1, Ordering::Relaxed)
    }

    /// Inserts a new cached entry for `file_vnid` under `parent_vnid`
    /// (`0` meaning "no parent", i.e. a share root) with leaf `name`.
    ///
    /// `.` and `..` are never cached. A record that already exists with
    /// the same vnid and a matching `(parent, name)` is a duplicate and is
    /// silently ignored, preserving the existing entry's refcount.
    pub async fn add_handle(&self, parent_vnid: u64, file_vnid: u64, name: &str) {
        if name == "." || name == ".." {
            return;
        }

        let parent = if parent_vnid == 0 { None } else { Some(parent_vnid) };
        let mut nodes = self.nodes.write().await;
        if let Some(existing) = nodes.get(&file_vnid) {
            if existing.parent == parent && existing.name == name {
                return;
            }
        }
        nodes.insert(file_vnid, Node { parent, name: name.to_string(), refcount: 1, invalid: false });
    }

    /// Looks up a cached entry by vnid. A hash lookup returns the same
    /// single match `spec.md`'s linear scan describes, since at most one
    /// active record exists per vnid.
    pub async fn lookup_by_vnid(&self, vnid: u64) -> Option<(Option<u64>, String)> {
        let nodes = self.nodes.read().await;
        nodes.get(&vnid).map(|n| (n.parent, n.name.clone()))
    }

    /// Finds the vnid of the child named `name` under `parent_vnid`, if cached.
    pub async fn lookup_child(&self, parent_vnid: u64, name: &str) -> Option<u64> {
        let parent = if parent_vnid == 0 { None } else { Some(parent_vnid) };
        let nodes = self.nodes.read().await;
        nodes.iter().find(|(_, n)| n.parent == parent && n.name == name).map(|(vnid, _)| *vnid)
    }

    /// Removes a single cached entry.
    pub async fn remove_handle(&self, vnid: u64) {
        self.nodes.write().await.remove(&vnid);
    }

    /// Purges `vnid` and every cached descendant, in two passes: mark every
    /// node whose ancestor chain includes `vnid` as invalid, then unlink
    /// every invalid node. The two-pass design avoids unlinking a parent
    /// before its children, which would otherwise leave children with a
    /// dangling parent pointer (`spec.md` §4.6).
    pub async fn purge_subtree(&self, vnid: u64) {
        let mut nodes = self.nodes.write().await;
        if !nodes.contains_key(&vnid) {
            return;
        }

        let mut to_invalidate = vec![vnid];
        let mut frontier = vec![vnid];
        while let Some(current) = frontier.pop() {
            let children: Vec<u64> = nodes
                .iter()
                .filter(|(_, n)| n.parent == Some(current))
                .map(|(child_vnid, _)| *child_vnid)
                .collect();
            for child in children {
                to_invalidate.push(child);
                frontier.push(child);
            }
        }

        for v in &to_invalidate {
            if let Some(node) = nodes.get_mut(v) {
                node.invalid = true;
            }
        }
        for v in to_invalidate {
            if nodes.get(&v).map(|n| n.invalid).unwrap_or(false) {
                nodes.remove(&v);
            }
        }
    }

    /// Walks up via `parent`, collecting names from root to leaf, and joins
    /// them with `/` against `share_root` to produce the absolute local
    /// path driving the underlying filesystem.
    pub async fn render_path(&self, share_root: &std::path::Path, vnid: u64) -> Option<PathBuf> {
        let nodes = self.nodes.read().await;
        let mut stack = Vec::new();
        let mut current = vnid;
        loop {
            let node = nodes.get(&current)?;
            match node.parent {
                Some(parent) => {
                    stack.push(node.name.clone());
                    current = parent;
                }
                None => break,
            }
        }
        stack.reverse();

        let mut path = share_root.to_path_buf();
        for name in stack {
            path.push(name);
        }
        Some(path)
    }

    /// Every cached vnode's ancestor chain terminates at a node with a
    /// `None` parent (`spec.md` §8 invariant). Used by tests and by the
    /// cache's own debug assertions; never reachable from remote input.
    #[cfg(test)]
    async fn ancestor_chain_terminates(&self, vnid: u64) -> bool {
        let nodes = self.nodes.read().await;
        let mut current = vnid;
        let mut hops = 0;
        loop {
            let Some(node) = nodes.get(&current) else { return false };
            match node.parent {
                Some(parent) => {
                    current = parent;
                    hops += 1;
                    if hops > nodes.len() {
                        return false;
                    }
                }
                None => return true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn root_has_no_parent() {
        let cache = VnodeCache::new();
        cache.add_handle(0, 1, "share-root").await;
        assert_eq!(cache.lookup_by_vnid(1).await.unwrap().0, None);
    }

    #[tokio::test]
    async fn duplicate_insert_ignored() {
        let cache = VnodeCache::new();
        cache.add_handle(0, 1, "root").await;
        cache.add_handle(0, 2, "child").await;
        cache.add_handle(1, 2, "child").await; // not a duplicate: different parent
        cache.add_handle(1, 2, "child").await; // duplicate: ignored
        assert_eq!(cache.lookup_by_vnid(2).await.unwrap().0, Some(1));
    }

    #[tokio::test]
    async fn dot_and_dotdot_never_cached() {
        let cache = VnodeCache::new();
        cache.add_handle(0, 1, "root").await;
        cache.add_handle(1, 1, ".").await;
        cache.add_handle(1, 1, "..").await;
        assert!(cache.lookup_child(1, ".").await.is_none());
    }

    #[tokio::test]
    async fn purge_subtree_removes_descendants_not_siblings() {
        let cache = VnodeCache::new();
        cache.add_handle(0, 1, "root").await;
        cache.add_handle(1, 2, "dir").await;
        cache.add_handle(2, 3, "file-a").await;
        cache.add_handle(2, 4, "file-b").await;
        cache.add_handle(1, 5, "sibling").await;

        cache.purge_subtree(2).await;

        assert!(cache.lookup_by_vnid(2).await.is_none());
        assert!(cache.lookup_by_vnid(3).await.is_none());
        assert!(cache.lookup_by_vnid(4).await.is_none());
        assert!(cache.lookup_by_vnid(5).await.is_some());
        assert!(cache.lookup_by_vnid(1).await.is_some());
    }

    #[tokio::test]
    async fn purge_subtree_is_idempotent() {
        let cache = VnodeCache::new();
        cache.add_handle(0, 1, "root").await;
        cache.add_handle(1, 2, "dir").await;

        cache.purge_subtree(2).await;
        cache.purge_subtree(2).await; // second call: no-op, no panic

        assert!(cache.lookup_by_vnid(2).await.is_none());
        assert!(cache.lookup_by_vnid(1).await.is_some());
    }

    #[tokio::test]
    async fn render_path_joins_from_root() {
        let cache = VnodeCache::new();
        cache.add_handle(0, 1, "unused-root-name").await;
        cache.add_handle(1, 2, "dir").await;
        cache.add_handle(2, 3, "file.txt").await;

        let path = cache.render_path(std::path::Path::new("/srv/pub"), 3).await.unwrap();
        assert_eq!(path, std::path::PathBuf::from("/srv/pub/dir/file.txt"));
    }

    #[tokio::test]
    async fn ancestor_chain_always_terminates() {
        let cache = VnodeCache::new();
        cache.add_handle(0, 1, "root").await;
        cache.add_handle(1, 2, "dir").await;
        cache.add_handle(2, 3, "file").await;
        assert!(cache.ancestor_chain_terminates(3).await);
    }
}
