//! Per-scope type state.
//!
//! One [`TypeEnv`] exists per lexical scope (function body, block, or the
//! synthetic scope of a comprehension). It maps names to masks and keeps the
//! container shape facts in independent side tables, where absence always
//! means "shape unknown" rather than "empty container".

use std::collections::{HashMap, HashSet};

use crate::ast::SourceSpan;
use crate::types::{TypeKind, TypeSet};

#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    kinds: HashMap<String, TypeKind>,
    sets: HashMap<String, TypeSet>,
    non_null: HashSet<String>,
    provenance: HashMap<String, SourceSpan>,
    list_elems: HashMap<String, TypeSet>,
    tuple_elems: HashMap<String, Vec<TypeSet>>,
    dict_keys: HashMap<String, TypeSet>,
    dict_vals: HashMap<String, TypeSet>,
    attrs: HashMap<String, HashMap<String, TypeSet>>,
    instances: HashMap<String, String>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to an exact kind. Markers widen to every concrete kind
    /// since they carry no member list here.
    pub fn define(&mut self, name: &str, kind: TypeKind, provenance: SourceSpan) {
        if kind.is_marker() {
            self.define_set(name, TypeSet::all(), provenance);
            return;
        }
        self.define_set(name, TypeSet::of(kind), provenance);
    }

    pub fn define_set(&mut self, name: &str, set: TypeSet, provenance: SourceSpan) {
        self.clear_shapes(name);
        self.store(name, set);
        self.provenance.insert(name.to_string(), provenance);
    }

    /// Widen the binding of `name` by `set`. Collapsing to one bit makes the
    /// name exact again; staying multi-bit leaves it dynamic.
    pub fn union_set(&mut self, name: &str, set: TypeSet, provenance: SourceSpan) {
        let previous = self.get_set(name);
        let widened = previous | set;
        if widened != previous {
            self.clear_shapes(name);
        }
        self.store(name, widened);
        self.provenance.insert(name.to_string(), provenance);
    }

    pub fn restrict_to(&mut self, name: &str, set: TypeSet) {
        if let Some(current) = self.sets.get(name).copied() {
            self.store(name, current & set);
        }
    }

    pub fn restrict_to_kind(&mut self, name: &str, kind: TypeKind) {
        self.restrict_to(name, TypeSet::of(kind));
    }

    pub fn exclude_kind(&mut self, name: &str, kind: TypeKind) {
        if let Some(current) = self.sets.get(name).copied() {
            self.store(name, current - TypeSet::of(kind));
        }
        if kind == TypeKind::NoneType {
            self.non_null.insert(name.to_string());
        }
    }

    /// Drop every fact recorded for `name`.
    pub fn remove(&mut self, name: &str) {
        self.kinds.remove(name);
        self.sets.remove(name);
        self.non_null.remove(name);
        self.provenance.remove(name);
        self.instances.remove(name);
        self.attrs.remove(name);
        self.clear_shapes(name);
    }

    /// Copy every fact `src` holds for `name` into this env, so an outer
    /// binding can be narrowed locally.
    pub fn adopt(&mut self, name: &str, src: &TypeEnv) {
        let key = name.to_string();
        if let Some(set) = src.sets.get(name) {
            self.store(name, *set);
        }
        if src.non_null.contains(name) {
            self.non_null.insert(key.clone());
        }
        if let Some(span) = src.provenance.get(name) {
            self.provenance.insert(key.clone(), *span);
        }
        self.clear_shapes(name);
        if let Some(elems) = src.list_elems.get(name) {
            self.list_elems.insert(key.clone(), *elems);
        }
        if let Some(elems) = src.tuple_elems.get(name) {
            self.tuple_elems.insert(key.clone(), elems.clone());
        }
        if let Some(keys) = src.dict_keys.get(name) {
            self.dict_keys.insert(key.clone(), *keys);
        }
        if let Some(values) = src.dict_vals.get(name) {
            self.dict_vals.insert(key.clone(), *values);
        }
        if let Some(attrs) = src.attrs.get(name) {
            self.attrs.insert(key.clone(), attrs.clone());
        }
        if let Some(tag) = src.instances.get(name) {
            self.instances.insert(key, tag.clone());
        }
    }

    fn store(&mut self, name: &str, set: TypeSet) {
        match set.kind() {
            Some(kind) => {
                self.kinds.insert(name.to_string(), kind);
            }
            None => {
                self.kinds.remove(name);
            }
        }
        if !set.is_empty() && !set.contains(TypeSet::NONE_TYPE) {
            self.non_null.insert(name.to_string());
        } else if set.contains(TypeSet::NONE_TYPE) {
            self.non_null.remove(name);
        }
        self.sets.insert(name.to_string(), set);
    }

    fn clear_shapes(&mut self, name: &str) {
        self.list_elems.remove(name);
        self.tuple_elems.remove(name);
        self.dict_keys.remove(name);
        self.dict_vals.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<TypeKind> {
        self.kinds.get(name).copied()
    }

    /// Recorded mask, empty when the name is unknown.
    pub fn get_set(&self, name: &str) -> TypeSet {
        self.sets.get(name).copied().unwrap_or_default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    pub fn is_non_null(&self, name: &str) -> bool {
        self.non_null.contains(name)
    }

    pub fn provenance(&self, name: &str) -> Option<SourceSpan> {
        self.provenance.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// Branch merge: for every name with a non-zero mask in either input,
    /// this env receives `a & b`. A zero result marks the name contradictory;
    /// the next reader is responsible for diagnosing it.
    pub fn intersect_from(&mut self, a: &TypeEnv, b: &TypeEnv) {
        let names: HashSet<&String> = a
            .sets
            .iter()
            .chain(b.sets.iter())
            .filter(|(_, set)| !set.is_empty())
            .map(|(name, _)| name)
            .collect();

        for name in names {
            let merged = a.get_set(name) & b.get_set(name);
            self.store(name, merged);
            if let Some(span) = a.provenance(name).or_else(|| b.provenance(name)) {
                self.provenance.insert(name.clone(), span);
            }
            if a.is_non_null(name) && b.is_non_null(name) {
                self.non_null.insert(name.clone());
            } else if merged.contains(TypeSet::NONE_TYPE) || merged.is_empty() {
                self.non_null.remove(name);
            }

            self.clear_shapes(name);
            if let (Some(left), Some(right)) = (a.list_elems.get(name), b.list_elems.get(name)) {
                self.list_elems.insert(name.clone(), *left & *right);
            }
            if let (Some(left), Some(right)) = (a.tuple_elems.get(name), b.tuple_elems.get(name))
            {
                let merged_elems = left
                    .iter()
                    .zip(right.iter())
                    .map(|(l, r)| *l & *r)
                    .collect();
                self.tuple_elems.insert(name.clone(), merged_elems);
            }
            if let (Some(left), Some(right)) = (a.dict_keys.get(name), b.dict_keys.get(name)) {
                self.dict_keys.insert(name.clone(), *left & *right);
            }
            if let (Some(left), Some(right)) = (a.dict_vals.get(name), b.dict_vals.get(name)) {
                self.dict_vals.insert(name.clone(), *left & *right);
            }
        }

        let attr_owners: HashSet<&String> = a.attrs.keys().chain(b.attrs.keys()).collect();
        for owner in attr_owners {
            let merged: HashMap<String, TypeSet> = match (a.attrs.get(owner), b.attrs.get(owner))
            {
                (Some(left), Some(right)) => left
                    .iter()
                    .filter_map(|(attr, set)| {
                        right.get(attr).map(|other| (attr.clone(), *set & *other))
                    })
                    .collect(),
                _ => HashMap::new(),
            };
            if merged.is_empty() {
                self.attrs.remove(owner);
            } else {
                self.attrs.insert(owner.clone(), merged);
            }
        }

        let tagged: HashSet<&String> = a.instances.keys().chain(b.instances.keys()).collect();
        for name in tagged {
            match (a.instance_of(name), b.instance_of(name)) {
                (Some(left), Some(right)) if left == right => {
                    self.instances.insert(name.clone(), left.to_string());
                }
                _ => {
                    self.instances.remove(name);
                }
            }
        }
    }

    /// Overwrite this env with every fact recorded in `src`.
    pub fn apply_merged(&mut self, src: &TypeEnv) {
        for (name, set) in &src.sets {
            self.store(name, *set);
            if !src.instances.contains_key(name) {
                self.instances.remove(name);
            }
        }
        for name in src.instances.keys() {
            if !src.sets.contains_key(name) {
                self.sets.remove(name);
                self.kinds.remove(name);
            }
        }
        for name in &src.non_null {
            self.non_null.insert(name.clone());
        }
        self.provenance
            .extend(src.provenance.iter().map(|(k, v)| (k.clone(), *v)));
        self.list_elems
            .extend(src.list_elems.iter().map(|(k, v)| (k.clone(), *v)));
        self.tuple_elems
            .extend(src.tuple_elems.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.dict_keys
            .extend(src.dict_keys.iter().map(|(k, v)| (k.clone(), *v)));
        self.dict_vals
            .extend(src.dict_vals.iter().map(|(k, v)| (k.clone(), *v)));
        for (owner, attrs) in &src.attrs {
            let entry = self.attrs.entry(owner.clone()).or_default();
            entry.extend(attrs.iter().map(|(k, v)| (k.clone(), *v)));
        }
        self.instances
            .extend(src.instances.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn set_list_elems(&mut self, name: &str, elems: TypeSet) {
        self.list_elems.insert(name.to_string(), elems);
    }

    pub fn get_list_elems(&self, name: &str) -> TypeSet {
        self.list_elems.get(name).copied().unwrap_or_default()
    }

    pub fn set_tuple_elems(&mut self, name: &str, elems: Vec<TypeSet>) {
        self.tuple_elems.insert(name.to_string(), elems);
    }

    pub fn tuple_elems(&self, name: &str) -> Option<&[TypeSet]> {
        self.tuple_elems.get(name).map(Vec::as_slice)
    }

    pub fn get_tuple_elem_at(&self, name: &str, index: usize) -> TypeSet {
        self.tuple_elems
            .get(name)
            .and_then(|elems| elems.get(index))
            .copied()
            .unwrap_or_default()
    }

    pub fn union_of_tuple_elems(&self, name: &str) -> TypeSet {
        self.tuple_elems
            .get(name)
            .map(|elems| elems.iter().fold(TypeSet::empty(), |acc, set| acc | *set))
            .unwrap_or_default()
    }

    pub fn set_dict_shape(&mut self, name: &str, keys: TypeSet, values: TypeSet) {
        self.dict_keys.insert(name.to_string(), keys);
        self.dict_vals.insert(name.to_string(), values);
    }

    pub fn get_dict_keys(&self, name: &str) -> TypeSet {
        self.dict_keys.get(name).copied().unwrap_or_default()
    }

    pub fn get_dict_vals(&self, name: &str) -> TypeSet {
        self.dict_vals.get(name).copied().unwrap_or_default()
    }

    pub fn set_attr(&mut self, owner: &str, attr: &str, set: TypeSet) {
        self.attrs
            .entry(owner.to_string())
            .or_default()
            .insert(attr.to_string(), set);
    }

    pub fn get_attr(&self, owner: &str, attr: &str) -> TypeSet {
        self.attrs
            .get(owner)
            .and_then(|attrs| attrs.get(attr))
            .copied()
            .unwrap_or_default()
    }

    pub fn define_instance_of(&mut self, name: &str, class_name: &str) {
        self.instances
            .insert(name.to_string(), class_name.to_string());
    }

    pub fn instance_of(&self, name: &str) -> Option<&str> {
        self.instances.get(name).map(String::as_str)
    }
}
