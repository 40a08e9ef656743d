use super::attr::Attr;
use super::family::Const;
use super::naming::{c_ident, c_lower, c_upper};
use crate::error::{GenError, GenResult};
use indexmap::IndexMap;
use serde::Serialize;
use ynl_types::AttrSetSpec;

/// Ordered attribute space. A subset shares the numbering and prefixes
/// of its parent set.
#[derive(Debug, Clone, Serialize)]
pub struct AttrSet {
    pub name: String,
    pub doc: Option<String>,
    pub name_prefix: String,
    pub max_name: String,
    pub subset_of: Option<String>,
    pub c_name: String,
    #[serde(skip)]
    pub enum_name: Option<Option<String>>,
    pub attrs: IndexMap<String, Attr>,
}

impl AttrSet {
    pub fn new(
        family_name: &str,
        consts: &IndexMap<String, Const>,
        known_sets: &IndexMap<String, AttrSet>,
        spec: &AttrSetSpec,
    ) -> GenResult<Self> {
        let mut attrs = IndexMap::new();

        let (name_prefix, max_name) = match &spec.subset_of {
            None => {
                let pfx = match &spec.name_prefix {
                    Some(pfx) => pfx.clone(),
                    None if spec.name == family_name => format!("{}-a-", family_name),
                    None => format!("{}-a-{}-", family_name, spec.name),
                };
                let name_prefix = c_upper(&pfx);
                let max_name = c_upper(
                    spec.attr_max_name
                        .as_deref()
                        .unwrap_or(&format!("{}max", name_prefix)),
                );

                let mut val = 1;
                for elem in &spec.attributes {
                    if let Some(value) = elem.value {
                        val = value;
                    }
                    let attr = Attr::new(family_name, consts, &spec.name, &name_prefix, elem, val)?;
                    attrs.insert(attr.name.clone(), attr);
                    val += 1;
                }
                (name_prefix, max_name)
            }
            Some(parent_name) => {
                let parent = known_sets
                    .get(parent_name)
                    .ok_or_else(|| GenError::UnknownAttrSet(parent_name.clone()))?;
                for elem in &spec.attributes {
                    let attr = parent.attrs.get(&elem.name).ok_or_else(|| GenError::UnknownAttr {
                        set: parent_name.clone(),
                        attr: elem.name.clone(),
                    })?;
                    attrs.insert(attr.name.clone(), attr.clone());
                }
                (parent.name_prefix.clone(), parent.max_name.clone())
            }
        };

        let mut c_name = c_ident(&spec.name);
        if c_name == c_lower(family_name) {
            c_name.clear();
        }

        Ok(Self {
            name: spec.name.clone(),
            doc: spec.doc.clone(),
            name_prefix,
            max_name,
            subset_of: spec.subset_of.clone(),
            c_name,
            enum_name: spec.enum_name.clone(),
            attrs,
        })
    }

    pub fn get(&self, name: &str) -> GenResult<&Attr> {
        self.attrs.get(name).ok_or_else(|| GenError::UnknownAttr {
            set: self.name.clone(),
            attr: name.to_string(),
        })
    }

    pub fn by_value(&self, value: u32) -> Option<&Attr> {
        self.attrs.values().find(|attr| attr.value == value)
    }
}
