//! Tagged PDF structure trees across a copy.
//!
//! PDF Spec: ISO 32000-1:2008, Section 14.7 - Logical Structure,
//! Section 7.9.7 - Number Trees
//!
//! Two halves:
//!
//! - [`StructureTracker`] is the side table of one source document: which
//!   indirect object referenced which (child → parent), and which elements
//!   are disabled because they belong to pages outside the current batch.
//!   The object model itself carries no parent pointers.
//! - [`StructTreeBuilder`] accumulates the destination `/StructTreeRoot`:
//!   root kids, role and class maps, and a renumbered `/ParentTree`.

use crate::error::Result;
use crate::names;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::reader::SourceDocument;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Deepest `/Kids` nesting followed in a number tree.
const MAX_NUMBER_TREE_DEPTH: u32 = 32;

/// Child → parent links and disabled elements of one source document.
#[derive(Debug, Default, Clone)]
pub struct StructureTracker {
    parents: HashMap<ObjectRef, ObjectRef>,
    disabled: HashSet<ObjectRef>,
}

impl StructureTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all links and disabled elements (start of a page batch).
    pub fn clear(&mut self) {
        self.parents.clear();
        self.disabled.clear();
    }

    /// Record that `parent` references `child`. The first parent seen wins.
    pub fn record_parent(&mut self, child: ObjectRef, parent: ObjectRef) {
        if child != parent {
            self.parents.entry(child).or_insert(parent);
        }
    }

    /// Recorded parent of `child`.
    pub fn parent_of(&self, child: ObjectRef) -> Option<ObjectRef> {
        self.parents.get(&child).copied()
    }

    /// Whether `reference` is disabled.
    pub fn is_disabled(&self, reference: ObjectRef) -> bool {
        self.disabled.contains(&reference)
    }

    /// Disable `reference`, then walk up the recorded parents disabling
    /// every ancestor whose recorded children are all disabled.
    ///
    /// Returns the ancestors disabled by the walk.
    pub fn disable(&mut self, reference: ObjectRef) -> Vec<ObjectRef> {
        self.disable_settled(reference, &[])
    }

    /// Like [`disable`](Self::disable), but the walk stops below the first
    /// ancestor listed in `active`. An element whose copy is still running
    /// may keep direct kids (marked content) and is judged when it finishes.
    pub fn disable_settled(&mut self, reference: ObjectRef, active: &[ObjectRef]) -> Vec<ObjectRef> {
        let mut newly = Vec::new();
        self.disabled.insert(reference);

        let mut current = reference;
        let mut visited = HashSet::new();
        while let Some(parent) = self.parent_of(current) {
            if !visited.insert(parent) || self.disabled.contains(&parent) || active.contains(&parent) {
                break;
            }
            let all_disabled = self
                .parents
                .iter()
                .filter(|(_, p)| **p == parent)
                .all(|(child, _)| self.disabled.contains(child));
            if !all_disabled {
                break;
            }
            self.disabled.insert(parent);
            newly.push(parent);
            current = parent;
        }

        if !newly.is_empty() {
            log::debug!("Disabling {} also disabled ancestors {:?}", reference, newly);
        }
        newly
    }

    /// Number of disabled elements.
    pub fn disabled_count(&self) -> usize {
        self.disabled.len()
    }
}

/// Destination `/StructTreeRoot` under construction.
#[derive(Debug, Clone)]
pub struct StructTreeBuilder {
    root: ObjectRef,
    kids: Vec<Object>,
    role_map: Dictionary,
    class_map: Dictionary,
    parent_tree: BTreeMap<i64, Object>,
    next_key: i64,
}

impl StructTreeBuilder {
    /// Start a tree whose root will be written under `root`.
    pub fn new(root: ObjectRef) -> Self {
        Self {
            root,
            kids: Vec::new(),
            role_map: Dictionary::new(),
            class_map: Dictionary::new(),
            parent_tree: BTreeMap::new(),
            next_key: 0,
        }
    }

    /// Reference of the destination root.
    pub fn root(&self) -> ObjectRef {
        self.root
    }

    /// Add a root kid unless it is already there.
    pub fn add_kid(&mut self, kid: Object) {
        if !self.kids.contains(&kid) {
            self.kids.push(kid);
        }
    }

    /// Root kids added so far.
    pub fn kids(&self) -> &[Object] {
        &self.kids
    }

    /// Whether a role map entry exists.
    pub fn has_role(&self, role: &str) -> bool {
        self.role_map.contains_key(role)
    }

    /// Add a role map entry unless one exists.
    pub fn add_role(&mut self, role: &str, value: Object) {
        if !self.role_map.contains_key(role) {
            self.role_map.insert(role, value);
        }
    }

    /// Whether a class map entry exists.
    pub fn has_class(&self, class: &str) -> bool {
        self.class_map.contains_key(class)
    }

    /// Add a class map entry unless one exists.
    pub fn add_class(&mut self, class: &str, value: Object) {
        if !self.class_map.contains_key(class) {
            self.class_map.insert(class, value);
        }
    }

    /// Store a copied parent tree value under a fresh key and return the key.
    pub fn add_parent_tree_entry(&mut self, value: Object) -> i64 {
        let key = self.next_key;
        self.next_key += 1;
        self.parent_tree.insert(key, value);
        key
    }

    /// Number of parent tree entries.
    pub fn parent_tree_len(&self) -> usize {
        self.parent_tree.len()
    }

    /// The `/StructTreeRoot` dictionary.
    pub fn build(&self) -> Dictionary {
        let mut root = Dictionary::with_type(names::STRUCT_TREE_ROOT);
        root.insert(names::K, self.kids.clone());

        let mut nums = Vec::with_capacity(self.parent_tree.len() * 2);
        for (key, value) in &self.parent_tree {
            nums.push(Object::Integer(*key));
            nums.push(value.clone());
        }
        let mut parent_tree = Dictionary::new();
        parent_tree.insert(names::NUMS, nums);
        root.insert(names::PARENT_TREE, parent_tree);
        root.insert(names::PARENT_TREE_NEXT_KEY, self.next_key);

        if !self.role_map.is_empty() {
            root.insert(names::ROLE_MAP, self.role_map.clone());
        }
        if !self.class_map.is_empty() {
            root.insert(names::CLASS_MAP, self.class_map.clone());
        }
        root
    }
}

/// Look up `key` in a number tree.
///
/// Malformed nodes are skipped with a warning rather than failing the lookup.
pub fn number_tree_get<S: SourceDocument + ?Sized>(
    source: &mut S,
    node: &Dictionary,
    key: i64,
) -> Result<Option<Object>> {
    number_tree_get_at(source, node, key, 0)
}

fn number_tree_get_at<S: SourceDocument + ?Sized>(
    source: &mut S,
    node: &Dictionary,
    key: i64,
    depth: u32,
) -> Result<Option<Object>> {
    if depth > MAX_NUMBER_TREE_DEPTH {
        log::warn!("Number tree deeper than {}, giving up on key {}", MAX_NUMBER_TREE_DEPTH, key);
        return Ok(None);
    }

    if let Some(nums) = node.get("Nums") {
        if let Object::Array(nums) = source.resolve_value(nums)? {
            for pair in nums.chunks(2) {
                if let [k, v] = pair {
                    if k.as_integer() == Some(key) {
                        return Ok(Some(v.clone()));
                    }
                }
            }
        }
    }

    let kids = match node.get("Kids") {
        Some(kids) => source.resolve_value(kids)?,
        None => return Ok(None),
    };
    if let Object::Array(kids) = kids {
        for kid in kids {
            let kid = match source.resolve_value(&kid)? {
                Object::Dictionary(dict) => dict,
                other => {
                    log::warn!("Number tree kid is a {}, skipping", other.type_name());
                    continue;
                },
            };
            if let Some(limits) = kid.get_array("Limits") {
                let low = limits.first().and_then(Object::as_integer);
                let high = limits.get(1).and_then(Object::as_integer);
                if let (Some(low), Some(high)) = (low, high) {
                    if key < low || key > high {
                        continue;
                    }
                }
            }
            if let Some(found) = number_tree_get_at(source, &kid, key, depth + 1)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

/// Whether a dictionary is a structure element (has `/S`, or `/Type /StructElem`).
pub fn is_struct_elem(dict: &Dictionary) -> bool {
    dict.has_type("StructElem") || (dict.type_name().is_none() && dict.get_name("S").is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MemoryDocument;

    fn r(id: u32) -> ObjectRef {
        ObjectRef::new(id, 0)
    }

    #[test]
    fn test_disable_walks_up_when_all_children_disabled() {
        let mut tracker = StructureTracker::new();
        // 1 ─┬─ 2 ── 4
        //    └─ 3
        tracker.record_parent(r(2), r(1));
        tracker.record_parent(r(3), r(1));
        tracker.record_parent(r(4), r(2));

        assert_eq!(tracker.disable(r(4)), vec![r(2)]);
        assert!(tracker.is_disabled(r(2)));
        assert!(!tracker.is_disabled(r(1)));

        assert_eq!(tracker.disable(r(3)), vec![r(1)]);
        assert!(tracker.is_disabled(r(1)));
    }

    #[test]
    fn test_disable_stops_at_live_sibling() {
        let mut tracker = StructureTracker::new();
        tracker.record_parent(r(2), r(1));
        tracker.record_parent(r(3), r(1));
        assert!(tracker.disable(r(2)).is_empty());
        assert!(!tracker.is_disabled(r(1)));
    }

    #[test]
    fn test_disable_stops_below_active_ancestor() {
        let mut tracker = StructureTracker::new();
        // 1 ── 2 ── 3, with 2 still being copied
        tracker.record_parent(r(2), r(1));
        tracker.record_parent(r(3), r(2));
        assert!(tracker.disable_settled(r(3), &[r(1), r(2)]).is_empty());
        assert!(tracker.is_disabled(r(3)));
        assert!(!tracker.is_disabled(r(2)));
        assert!(!tracker.is_disabled(r(1)));
    }

    #[test]
    fn test_first_parent_wins_and_cycles_terminate() {
        let mut tracker = StructureTracker::new();
        tracker.record_parent(r(2), r(1));
        tracker.record_parent(r(2), r(9));
        tracker.record_parent(r(1), r(2));
        assert_eq!(tracker.parent_of(r(2)), Some(r(1)));
        tracker.disable(r(2));
        assert!(tracker.is_disabled(r(1)));
    }

    #[test]
    fn test_clear() {
        let mut tracker = StructureTracker::new();
        tracker.record_parent(r(2), r(1));
        tracker.disable(r(2));
        tracker.clear();
        assert_eq!(tracker.disabled_count(), 0);
        assert_eq!(tracker.parent_of(r(2)), None);
    }

    #[test]
    fn test_builder_parent_tree() {
        let mut builder = StructTreeBuilder::new(r(50));
        assert_eq!(builder.add_parent_tree_entry(Object::Reference(r(7))), 0);
        assert_eq!(builder.add_parent_tree_entry(Object::Array(vec![])), 1);
        builder.add_kid(Object::Reference(r(7)));
        builder.add_kid(Object::Reference(r(7)));
        builder.add_role("Heading", Object::name("H1"));

        let root = builder.build();
        assert!(root.has_type("StructTreeRoot"));
        assert_eq!(root.get_array("K").unwrap().len(), 1);
        assert_eq!(root.get_integer("ParentTreeNextKey"), Some(2));
        let nums = root.get_dict("ParentTree").unwrap().get_array("Nums").unwrap();
        assert_eq!(nums.len(), 4);
        assert_eq!(root.get_dict("RoleMap").unwrap().get_name("Heading"), Some("H1"));
        assert!(!root.contains_key("ClassMap"));
    }

    #[test]
    fn test_number_tree_lookup_through_kids() {
        let mut doc = MemoryDocument::new();
        let mut leaf = Dictionary::new();
        leaf.insert(names::NUMS, vec![Object::Integer(10), Object::name("ten")]);
        leaf.insert("Limits", vec![Object::Integer(10), Object::Integer(19)]);
        let leaf_ref = doc.add(leaf);

        let mut root = Dictionary::new();
        root.insert(names::NUMS, vec![Object::Integer(0), Object::name("zero")]);
        root.insert(names::KIDS, vec![Object::Reference(leaf_ref)]);

        assert_eq!(number_tree_get(&mut doc, &root, 0).unwrap(), Some(Object::name("zero")));
        assert_eq!(number_tree_get(&mut doc, &root, 10).unwrap(), Some(Object::name("ten")));
        assert_eq!(number_tree_get(&mut doc, &root, 25).unwrap(), None);
    }

    #[test]
    fn test_is_struct_elem() {
        let mut elem = Dictionary::new();
        elem.insert(names::S, Object::name("P"));
        assert!(is_struct_elem(&elem));
        let mut mcr = Dictionary::with_type(names::MCR);
        mcr.insert("MCID", 0);
        assert!(!is_struct_elem(&mcr));
    }
}
