use super::attr::Attr;
use super::family::Family;
use super::naming::c_lower;
use crate::error::{GenError, GenResult};
use serde::Serialize;

/// A group of attributes rendered as one C struct: the request or reply
/// of an operation, or a reusable nested object. Refers to its attribute
/// set by name only; the family owns the attributes.
#[derive(Debug, Clone, Serialize)]
pub struct Struct {
    pub space_name: String,
    pub render_name: String,
    pub struct_name: String,
    pub ptr_name: String,
    pub nested: bool,
    pub request: bool,
    pub reply: bool,
    pub attr_list: Vec<String>,
    /* Member with the highest ordinal */
    pub attr_max: Option<String>,
    /* Fields pushed down from the parent, in type-value order */
    pub inherited: Vec<String>,
    #[serde(skip)]
    inherit_seed: Option<Vec<String>>,
}

impl Struct {
    /// `type_list` of `None` builds a nested struct holding every
    /// attribute of the set.
    pub fn new(family: &Family, space_name: &str, type_list: Option<&[String]>) -> GenResult<Self> {
        let attr_set = family.attr_set(space_name)?;
        let nested = type_list.is_none();

        let render_name = if family.name == c_lower(space_name) {
            family.name.clone()
        } else {
            format!("{}_{}", family.name, c_lower(space_name))
        };
        let mut struct_name = format!("struct {}", render_name);
        if nested && family.consts.contains_key(space_name) {
            struct_name.push('_');
        }
        let ptr_name = format!("{} *", struct_name);

        let attr_list: Vec<String> = match type_list {
            Some(list) => {
                for name in list {
                    attr_set.get(name)?;
                }
                list.to_vec()
            }
            None => attr_set.attrs.keys().cloned().collect(),
        };

        /* Last attribute wins on ties */
        let mut attr_max: Option<&Attr> = None;
        for name in &attr_list {
            let attr = attr_set.get(name)?;
            if attr_max.is_none_or(|max| attr.value >= max.value) {
                attr_max = Some(attr);
            }
        }

        Ok(Self {
            space_name: space_name.to_string(),
            render_name,
            struct_name,
            ptr_name,
            nested,
            request: false,
            reply: false,
            attr_max: attr_max.map(|a| a.name.clone()),
            attr_list,
            inherited: Vec::new(),
            inherit_seed: None,
        })
    }

    /// Members in declaration order.
    pub fn members<'f>(&self, family: &'f Family) -> Vec<&'f Attr> {
        let Some(attr_set) = family.attr_sets.get(&self.space_name) else {
            return Vec::new();
        };
        self.attr_list
            .iter()
            .filter_map(|name| attr_set.attrs.get(name))
            .collect()
    }

    pub fn member<'f>(&self, family: &'f Family, name: &str) -> Option<&'f Attr> {
        family.attr_sets.get(&self.space_name)?.attrs.get(name)
    }

    pub fn attr_max_val<'f>(&self, family: &'f Family) -> Option<&'f Attr> {
        self.attr_max.as_deref().and_then(|name| self.member(family, name))
    }

    /// Record the inherited fields seen through one referencing
    /// attribute, in the order the parent passes them. Every reference
    /// must pass the same fields in the same order as the first one.
    pub fn set_inherited(&mut self, new: Vec<String>) -> GenResult<()> {
        match &self.inherit_seed {
            None => {
                self.inherited = new.iter().map(|name| c_lower(name)).collect();
                self.inherit_seed = Some(new);
            }
            Some(seed) if *seed != new => {
                return Err(GenError::InheritanceConflict {
                    set: self.space_name.clone(),
                    existing: seed.clone(),
                    new,
                });
            }
            Some(_) => {}
        }
        Ok(())
    }
}
