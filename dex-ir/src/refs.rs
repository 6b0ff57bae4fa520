// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Indexes into the reference pools of the enclosing program (strings,
//! types, fields, methods, fill-array payloads), and the interface through
//! which analyses resolve field references against the class hierarchy.

use std::collections::BTreeMap;

macro_rules! pool_index {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            pub fn new(idx: u32) -> Self {
                Self(idx)
            }

            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

pool_index!(
    /// Index into the string pool.
    StringId
);
pool_index!(
    /// Index into the type pool.
    TypeId
);
pool_index!(
    /// Index into the field reference pool.
    FieldId
);
pool_index!(
    /// Index into the method reference pool.
    MethodId
);
pool_index!(
    /// Index into the pool of `fill-array-data` payloads.
    DataId
);

/// Which part of the class hierarchy a field reference is resolved against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldSearch {
    Static,
    Instance,
}

/// Attributes of a resolved field definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldAttrs {
    pub is_volatile: bool,
}

/// Resolves field references against the loaded program.
pub trait FieldResolver {
    /// `None` when the referenced field does not resolve, e.g. because the
    /// declaring class is outside the input program. Callers must treat an
    /// unresolved field conservatively.
    fn resolve_field(&self, field: FieldId, search: FieldSearch) -> Option<FieldAttrs>;
}

/// A flat field table, sufficient where no hierarchy walk is needed.
#[derive(Debug, Default)]
pub struct FieldTable {
    fields: BTreeMap<FieldId, FieldAttrs>,
}

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: FieldId, attrs: FieldAttrs) {
        self.fields.insert(field, attrs);
    }
}

impl FieldResolver for FieldTable {
    fn resolve_field(&self, field: FieldId, _search: FieldSearch) -> Option<FieldAttrs> {
        self.fields.get(&field).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_table() {
        let mut table = FieldTable::new();
        table.insert(FieldId::new(0), FieldAttrs { is_volatile: false });
        table.insert(FieldId::new(1), FieldAttrs { is_volatile: true });

        let attrs = table
            .resolve_field(FieldId::new(1), FieldSearch::Instance)
            .expect("resolved");
        assert!(attrs.is_volatile);
        assert!(table
            .resolve_field(FieldId::new(9), FieldSearch::Static)
            .is_none());
    }
}
