use serde::Deserializer;
use serde_derive::{Deserialize, Serialize};

/* Distinguish an absent key (None) from a key explicitly set to null
   (Some(None)). `enum-name: ~` means "render anonymously". */
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    Ok(Some(value))
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KernelPolicy {
    #[default]
    Split,
    PerOp,
    Global,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EnumModel {
    #[default]
    Unified,
    Directional,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum DefinitionKind {
    Const,
    Enum,
    Flags,
}

/// One entry of an `enum` or `flags` definition. Entries may be written
/// as a bare name or as a mapping.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(untagged)]
#[serde(expecting = "expected an entry name or a mapping with a name")]
pub enum EnumEntrySpec {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        value: Option<u64>,
        #[serde(default)]
        doc: Option<String>,
    },
}

impl EnumEntrySpec {
    pub fn name(&self) -> &str {
        match self {
            EnumEntrySpec::Name(name) => name,
            EnumEntrySpec::Full { name, .. } => name,
        }
    }

    pub fn value(&self) -> Option<u64> {
        match self {
            EnumEntrySpec::Name(_) => None,
            EnumEntrySpec::Full { value, .. } => *value,
        }
    }

    pub fn doc(&self) -> Option<&str> {
        match self {
            EnumEntrySpec::Name(_) => None,
            EnumEntrySpec::Full { doc, .. } => doc.as_deref(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Definition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DefinitionKind,
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub entries: Vec<EnumEntrySpec>,
    #[serde(default)]
    pub value_start: Option<u64>,
    #[serde(default)]
    pub name_prefix: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub enum_name: Option<Option<String>>,
    #[serde(default)]
    pub render_max: bool,
    #[serde(default)]
    pub c_define_name: Option<String>,
}

/// Validation constraints attached to an attribute.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Checks {
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max_len: Option<u64>,
    #[serde(default)]
    pub min_len: Option<u64>,
    #[serde(default)]
    pub flags_mask: Option<String>,
    #[serde(default)]
    pub unterminated_ok: Option<bool>,
}

impl Checks {
    /* Number of constraint keys present in the spec */
    pub fn count(&self) -> usize {
        [
            self.min.is_some(),
            self.max_len.is_some(),
            self.min_len.is_some(),
            self.flags_mask.is_some(),
            self.unterminated_ok.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct AttrSpec {
    pub name: String,
    /* Wire kind as written; mapped onto the closed kind set by the
       generator so unknown kinds are reported with their attribute. */
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<u32>,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub checks: Option<Checks>,
    #[serde(default)]
    pub nested_attributes: Option<String>,
    #[serde(default)]
    pub multi_attr: Option<bool>,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub type_value: Option<Vec<String>>,
    #[serde(default)]
    pub byte_order: Option<String>,
    #[serde(rename = "enum", default)]
    pub enum_ref: Option<String>,
    #[serde(default)]
    pub enum_as_flags: Option<bool>,
    #[serde(default)]
    pub name_prefix: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct AttrSetSpec {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub name_prefix: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub enum_name: Option<Option<String>>,
    #[serde(default)]
    pub attr_max_name: Option<String>,
    #[serde(default)]
    pub subset_of: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttrSpec>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct OpDirectionSpec {
    #[serde(default)]
    pub value: Option<u32>,
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct OpModeSpec {
    #[serde(default)]
    pub request: Option<OpDirectionSpec>,
    #[serde(default)]
    pub reply: Option<OpDirectionSpec>,
    #[serde(default)]
    pub pre: Option<String>,
    #[serde(default)]
    pub post: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct EventSpec {
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct OperationSpec {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub attribute_set: Option<String>,
    #[serde(default)]
    pub value: Option<u32>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub dont_validate: Vec<String>,
    #[serde(default)]
    pub notify: Option<String>,
    #[serde(default)]
    pub event: Option<EventSpec>,
    #[serde(default)]
    pub mcgrp: Option<String>,
    #[serde(rename = "do", default)]
    pub do_: Option<OpModeSpec>,
    #[serde(default)]
    pub dump: Option<OpModeSpec>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct OperationsSpec {
    #[serde(default)]
    pub name_prefix: Option<String>,
    #[serde(default)]
    pub async_prefix: Option<String>,
    #[serde(default)]
    pub enum_model: EnumModel,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub enum_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub async_enum: Option<Option<String>>,
    #[serde(default)]
    pub list: Vec<OperationSpec>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct McastGroupSpec {
    pub name: String,
    #[serde(default)]
    pub c_define_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct McastGroupsSpec {
    #[serde(default)]
    pub list: Vec<McastGroupSpec>,
}

/// Top level of a family spec file.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct FamilySpec {
    pub name: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub uapi_header: Option<String>,
    #[serde(default)]
    pub c_family_name: Option<String>,
    #[serde(default)]
    pub c_version_name: Option<String>,
    #[serde(default)]
    pub kernel_policy: KernelPolicy,
    #[serde(default)]
    pub max_by_define: bool,
    #[serde(default)]
    pub cmd_max_name: Option<String>,
    #[serde(default)]
    pub cmd_cnt_name: Option<String>,
    #[serde(default)]
    pub attr_cnt_name: Option<String>,
    #[serde(default)]
    pub definitions: Vec<Definition>,
    #[serde(default)]
    pub attribute_sets: Vec<AttrSetSpec>,
    #[serde(default)]
    pub operations: OperationsSpec,
    #[serde(default)]
    pub mcast_groups: McastGroupsSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_family() {
        let yaml = r#"
name: demo
protocol: genetlink
attribute-sets:
  - name: dev
    attributes:
      - name: id
        type: u32
      - name: name
        type: string
        checks:
          max-len: 16
operations:
  list:
    - name: get
      attribute-set: dev
      do:
        request:
          attributes: [ id ]
        reply:
          attributes: [ id, name ]
"#;
        let family: FamilySpec = serde_yml::from_str(yaml).unwrap();
        assert_eq!(family.name, "demo");
        assert_eq!(family.kernel_policy, KernelPolicy::Split);
        let set = &family.attribute_sets[0];
        assert_eq!(set.attributes[0].kind.as_deref(), Some("u32"));
        assert_eq!(set.attributes[1].checks.as_ref().unwrap().max_len, Some(16));
        let op = &family.operations.list[0];
        let do_ = op.do_.as_ref().unwrap();
        assert_eq!(do_.reply.as_ref().unwrap().attributes, vec!["id", "name"]);
        assert!(op.dump.is_none());
    }

    #[test]
    fn test_enum_entries_and_null_enum_name() {
        let yaml = r#"
name: state
type: enum
enum-name:
entries:
  - down
  - name: up
    value: 5
    doc: link is up
"#;
        let def: Definition = serde_yml::from_str(yaml).unwrap();
        assert_eq!(def.enum_name, Some(None));
        assert_eq!(def.entries[0].name(), "down");
        assert_eq!(def.entries[0].value(), None);
        assert_eq!(def.entries[1].value(), Some(5));
        assert_eq!(def.entries[1].doc(), Some("link is up"));
    }

    #[test]
    fn test_absent_enum_name_is_none() {
        let yaml = "name: s\ntype: flags\nentries: [ a, b ]\n";
        let def: Definition = serde_yml::from_str(yaml).unwrap();
        assert_eq!(def.kind, DefinitionKind::Flags);
        assert_eq!(def.enum_name, None);
    }

    #[test]
    fn test_checks_count() {
        let checks = Checks { min_len: Some(4), unterminated_ok: Some(true), ..Default::default() };
        assert_eq!(checks.count(), 2);
    }
}
