// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Abstract-domain primitives for dataflow analyses.
//!
//! [`FlatDomain`] is the three-point lattice over a value type, and
//! [`EnvironmentDomain`] a partial map into it where an absent key means top.
//! Both finite, so joining doubles as widening.

use im::OrdMap;

/// Whether a join changed the receiver. Lets the fixpoint engine decide
/// which blocks to revisit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum JoinResult {
    Unchanged,
    Changed,
}

impl JoinResult {
    pub fn combine(self, other: JoinResult) -> JoinResult {
        match (self, other) {
            (JoinResult::Unchanged, JoinResult::Unchanged) => JoinResult::Unchanged,
            _ => JoinResult::Changed,
        }
    }
}

/// An abstract domain with a least upper bound operation.
pub trait AbstractDomain {
    fn join(&mut self, other: &Self) -> JoinResult;
}

/// The flat lattice over `T`: bottom below every value, top above, distinct
/// values incomparable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlatDomain<T> {
    Bottom,
    Value(T),
    Top,
}

impl<T> FlatDomain<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            FlatDomain::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_top(&self) -> bool {
        matches!(self, FlatDomain::Top)
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, FlatDomain::Bottom)
    }
}

impl<T: Clone + Eq> FlatDomain<T> {
    pub fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (FlatDomain::Bottom, _) => true,
            (_, FlatDomain::Top) => true,
            (FlatDomain::Value(a), FlatDomain::Value(b)) => a == b,
            _ => false,
        }
    }
}

impl<T: Clone + Eq> AbstractDomain for FlatDomain<T> {
    fn join(&mut self, other: &Self) -> JoinResult {
        match (&*self, other) {
            (_, FlatDomain::Bottom) => JoinResult::Unchanged,
            (FlatDomain::Top, _) => JoinResult::Unchanged,
            (FlatDomain::Bottom, _) => {
                *self = other.clone();
                JoinResult::Changed
            },
            (FlatDomain::Value(a), FlatDomain::Value(b)) if a == b => JoinResult::Unchanged,
            _ => {
                *self = FlatDomain::Top;
                JoinResult::Changed
            },
        }
    }
}

/// A partial map from keys to flat values where an absent key is top, with
/// an explicit bottom for unreachable states.
///
/// The join is pointwise: bindings on which both sides agree survive,
/// everything else goes to top. Backed by a persistent map, so cloning a
/// state at a control-flow split is cheap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvironmentDomain<K: Ord, V> {
    /// `None` is bottom. The map binds exactly the keys that are not top.
    bindings: Option<OrdMap<K, V>>,
}

impl<K: Ord + Clone, V: Clone + Eq> EnvironmentDomain<K, V> {
    pub fn top() -> Self {
        Self {
            bindings: Some(OrdMap::new()),
        }
    }

    pub fn bottom() -> Self {
        Self { bindings: None }
    }

    pub fn is_top(&self) -> bool {
        matches!(&self.bindings, Some(map) if map.is_empty())
    }

    pub fn is_bottom(&self) -> bool {
        self.bindings.is_none()
    }

    pub fn get(&self, key: &K) -> FlatDomain<V> {
        match &self.bindings {
            None => FlatDomain::Bottom,
            Some(map) => map
                .get(key)
                .cloned()
                .map_or(FlatDomain::Top, FlatDomain::Value),
        }
    }

    /// Binding a key to bottom collapses the whole environment to bottom.
    /// Bottom absorbs every other binding.
    pub fn set(&mut self, key: K, value: FlatDomain<V>) {
        match value {
            FlatDomain::Bottom => self.bindings = None,
            FlatDomain::Top => {
                if let Some(map) = &mut self.bindings {
                    map.remove(&key);
                }
            },
            FlatDomain::Value(v) => {
                if let Some(map) = &mut self.bindings {
                    map.insert(key, v);
                }
            },
        }
    }

    /// Resets every key to top. Bottom stays bottom.
    pub fn clear(&mut self) {
        if let Some(map) = &mut self.bindings {
            map.clear();
        }
    }

    /// The non-top bindings; empty when bottom.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.bindings.iter().flat_map(|map| map.iter())
    }

    pub fn leq(&self, other: &Self) -> bool {
        match (&self.bindings, &other.bindings) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => {
                a.ptr_eq(b) || b.iter().all(|(key, value)| a.get(key) == Some(value))
            },
        }
    }
}

impl<K: Ord + Clone, V: Clone + Eq> AbstractDomain for EnvironmentDomain<K, V> {
    fn join(&mut self, other: &Self) -> JoinResult {
        match (&mut self.bindings, &other.bindings) {
            (_, None) => JoinResult::Unchanged,
            (None, Some(_)) => {
                *self = other.clone();
                JoinResult::Changed
            },
            (Some(a), Some(b)) => {
                if a.ptr_eq(b) {
                    return JoinResult::Unchanged;
                }
                let agreed: OrdMap<K, V> = a
                    .iter()
                    .filter(|(key, value)| b.get(*key) == Some(*value))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                if agreed.len() == a.len() {
                    JoinResult::Unchanged
                } else {
                    *a = agreed;
                    JoinResult::Changed
                }
            },
        }
    }
}
