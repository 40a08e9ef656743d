use super::naming::{c_lower, c_upper};
use crate::error::{GenError, GenResult};
use indexmap::IndexMap;
use serde::Serialize;
use ynl_types::{Definition, DefinitionKind};

#[derive(Debug, Clone, Serialize)]
pub struct EnumEntry {
    pub name: String,
    /* Bit index for flags sets, plain value otherwise */
    pub value: u64,
    pub doc: Option<String>,
    /* Value has to be spelled out when rendering the C enum */
    pub value_change: bool,
    pub c_name: String,
}

impl EnumEntry {
    pub fn user_value(&self, as_flags: bool) -> u64 {
        if as_flags {
            1u64.checked_shl(self.value as u32).unwrap_or(0)
        } else {
            self.value
        }
    }
}

/// An `enum` or `flags` definition.
#[derive(Debug, Clone, Serialize)]
pub struct EnumSet {
    pub name: String,
    pub is_flags: bool,
    pub render_name: String,
    /* `enum foo` used as a C type, None when rendered anonymously */
    pub enum_name: Option<String>,
    /* enum-name key present but empty */
    pub anonymous: bool,
    pub value_pfx: String,
    pub doc: Option<String>,
    pub header: Option<String>,
    pub render_max: bool,
    pub entries: IndexMap<String, EnumEntry>,
}

impl EnumSet {
    pub fn new(family_name: &str, def: &Definition) -> Self {
        let render_name = c_lower(&format!("{}-{}", family_name, def.name));
        let (enum_name, anonymous) = match &def.enum_name {
            Some(Some(name)) if !name.is_empty() => (Some(format!("enum {}", c_lower(name))), false),
            Some(_) => (None, true),
            None => (Some(format!("enum {}", render_name)), false),
        };
        let value_pfx = def
            .name_prefix
            .clone()
            .unwrap_or_else(|| format!("{}-{}-", family_name, def.name));
        let is_flags = def.kind == DefinitionKind::Flags;

        let value_start = def.value_start.unwrap_or(0);
        let mut entries = IndexMap::new();
        let mut prev: Option<u64> = None;
        for spec in &def.entries {
            let value = spec
                .value()
                .unwrap_or_else(|| prev.map_or(value_start, |p| p.wrapping_add(1)));
            let value_change = is_flags
                || match prev {
                    Some(p) => p.checked_add(1) != Some(value),
                    None => value != 0,
                };
            entries.insert(
                spec.name().to_string(),
                EnumEntry {
                    name: spec.name().to_string(),
                    value,
                    doc: spec.doc().map(str::to_string),
                    value_change,
                    c_name: c_upper(&format!("{}{}", value_pfx, spec.name())),
                },
            );
            prev = Some(value);
        }

        Self {
            name: def.name.clone(),
            is_flags,
            render_name,
            enum_name,
            anonymous,
            value_pfx,
            doc: def.doc.clone(),
            header: def.header.clone(),
            render_max: def.render_max,
            entries,
        }
    }

    /// Lowest and highest value, only defined when the values are
    /// contiguous.
    pub fn value_range(&self) -> GenResult<(u64, u64)> {
        let low = self.entries.values().map(|e| e.value).min();
        let high = self.entries.values().map(|e| e.value).max();
        match (low, high) {
            (Some(low), Some(high)) if high - low == self.entries.len() as u64 - 1 => Ok((low, high)),
            _ => Err(GenError::NonContiguousEnum(self.name.clone())),
        }
    }

    /// OR of all user values. Flags sets always count as flags.
    pub fn get_mask(&self, as_flags: bool) -> u64 {
        let as_flags = as_flags || self.is_flags;
        self.entries
            .values()
            .fold(0, |mask, entry| mask | entry.user_value(as_flags))
    }

    pub fn has_doc(&self) -> bool {
        self.doc.is_some() || self.entries.values().any(|e| e.doc.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enum_def(yaml: &str) -> EnumSet {
        let def: Definition = serde_yml::from_str(yaml).unwrap();
        EnumSet::new("fam", &def)
    }

    #[test]
    fn test_values_count_from_start() {
        let set = enum_def("name: mode\ntype: enum\nvalue-start: 3\nentries: [ a, b, c ]\n");
        let values: Vec<u64> = set.entries.values().map(|e| e.value).collect();
        assert_eq!(values, vec![3, 4, 5]);
        assert!(set.entries["a"].value_change);
        assert!(!set.entries["b"].value_change);
        assert_eq!(set.entries["a"].c_name, "FAM_MODE_A");
        assert_eq!(set.enum_name.as_deref(), Some("enum fam_mode"));
    }

    #[test]
    fn test_range_from_zero_and_from_one() {
        let set = enum_def("name: e\ntype: enum\nentries: [ a, b, c ]\n");
        assert_eq!(set.value_range().unwrap(), (0, 2));

        let set = enum_def("name: e\ntype: enum\nvalue-start: 1\nentries: [ a, b, c ]\n");
        assert_eq!(set.value_range().unwrap(), (1, 3));
    }

    #[test]
    fn test_noncontiguous_range_fails() {
        let set = enum_def(
            "name: e\ntype: enum\nentries:\n  - a\n  - name: b\n    value: 5\n",
        );
        assert!(matches!(set.value_range(), Err(GenError::NonContiguousEnum(_))));
    }

    #[test]
    fn test_range_spanning_full_width() {
        let set = enum_def(
            "name: e\ntype: enum\nentries:\n  - a\n  - name: b\n    value: 18446744073709551615\n",
        );
        assert!(matches!(set.value_range(), Err(GenError::NonContiguousEnum(_))));
        assert!(set.entries["b"].value_change);

        let set = enum_def("name: e\ntype: enum\nentries:\n  - name: top\n    value: 18446744073709551615\n");
        assert_eq!(set.value_range().unwrap(), (u64::MAX, u64::MAX));
    }

    #[test]
    fn test_flags_mask() {
        let set = enum_def("name: caps\ntype: flags\nentries: [ a, b, c ]\n");
        assert!(set.is_flags);
        assert_eq!(set.get_mask(false), 0x7);
        assert!(set.entries.values().all(|e| e.value_change));
    }

    #[test]
    fn test_enum_as_flags_mask() {
        let set = enum_def("name: e\ntype: enum\nentries: [ a, b ]\n");
        assert_eq!(set.get_mask(false), 1);
        assert_eq!(set.get_mask(true), 0x3);
    }

    #[test]
    fn test_anonymous_enum() {
        let set = enum_def("name: e\ntype: enum\nenum-name:\nname-prefix: pfx-\nentries: [ a ]\n");
        assert!(set.anonymous);
        assert_eq!(set.enum_name, None);
        assert_eq!(set.entries["a"].c_name, "PFX_A");
    }
}
