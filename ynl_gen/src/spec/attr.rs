use super::family::Const;
use super::naming::{c_ident, c_lower, c_upper};
use crate::error::{GenError, GenResult};
use indexmap::IndexMap;
use serde::Serialize;
use ynl_types::{AttrSpec, Checks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalarType {
    U8,
    U16,
    U32,
    U64,
    S32,
    S64,
}

impl ScalarType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "u8" => Some(ScalarType::U8),
            "u16" => Some(ScalarType::U16),
            "u32" => Some(ScalarType::U32),
            "u64" => Some(ScalarType::U64),
            "s32" => Some(ScalarType::S32),
            "s64" => Some(ScalarType::S64),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::U8 => "u8",
            ScalarType::U16 => "u16",
            ScalarType::U32 => "u32",
            ScalarType::U64 => "u64",
            ScalarType::S32 => "s32",
            ScalarType::S64 => "s64",
        }
    }

    /* libmnl has no helpers for signed types */
    pub fn mnl_name(&self) -> &'static str {
        match self {
            ScalarType::S32 => "u32",
            ScalarType::S64 => "u64",
            other => other.name(),
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            ScalarType::U8 => 8,
            ScalarType::U16 => 16,
            ScalarType::U32 | ScalarType::S32 => 32,
            ScalarType::U64 | ScalarType::S64 => 64,
        }
    }

    pub fn width(&self) -> usize {
        (self.bits() / 8) as usize
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, ScalarType::S32 | ScalarType::S64)
    }
}

/// Closed set of wire kinds. Chosen once when the attribute is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttrKind {
    Scalar(ScalarType),
    Flag,
    Pad,
    Unused,
    String,
    Binary,
    Nest,
    ArrayNest,
    NestTypeValue,
}

impl AttrKind {
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(scalar) = ScalarType::parse(name) {
            return Some(AttrKind::Scalar(scalar));
        }
        match name {
            "flag" => Some(AttrKind::Flag),
            "pad" => Some(AttrKind::Pad),
            "unused" => Some(AttrKind::Unused),
            "string" => Some(AttrKind::String),
            "binary" => Some(AttrKind::Binary),
            "nest" => Some(AttrKind::Nest),
            "array-nest" => Some(AttrKind::ArrayNest),
            "nest-type-value" => Some(AttrKind::NestTypeValue),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttrKind::Scalar(scalar) => scalar.name(),
            AttrKind::Flag => "flag",
            AttrKind::Pad => "pad",
            AttrKind::Unused => "unused",
            AttrKind::String => "string",
            AttrKind::Binary => "binary",
            AttrKind::Nest => "nest",
            AttrKind::ArrayNest => "array-nest",
            AttrKind::NestTypeValue => "nest-type-value",
        }
    }
}

/// How a struct member records that it was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Presence {
    None,
    Bit,
    Len,
    Count,
}

/// Validation rule applied by the handling peer, in selection order:
/// mask, then minimum, then enum range, then the plain type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WirePolicy {
    Plain(AttrKind),
    Mask { ty: ScalarType, mask: u64 },
    Min { ty: ScalarType, min: i64 },
    Max { ty: ScalarType, max: u64 },
    Range { ty: ScalarType, low: u64, high: u64 },
    String { terminated: bool, max_len: Option<u64> },
    MinLen(u64),
    Nested(String),
    NestedArray(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NestedRef {
    pub set: String,
    pub render_name: String,
    pub struct_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attr {
    pub name: String,
    pub set_name: String,
    pub value: u32,
    pub kind: AttrKind,
    pub multi_attr: bool,
    pub sub_type: Option<String>,
    pub checks: Checks,
    pub nested: Option<NestedRef>,
    pub type_value: Vec<String>,
    pub enum_ref: Option<String>,
    pub enum_as_flags: bool,
    pub byte_order: Option<String>,
    pub doc: Option<String>,
    pub c_name: String,
    pub enum_name: String,

    /* Filled in by resolve() once all definitions are known */
    pub is_bitfield: bool,
    pub type_name: String,
}

impl Attr {
    pub fn new(
        family_name: &str,
        consts: &IndexMap<String, Const>,
        set_name: &str,
        set_prefix: &str,
        spec: &AttrSpec,
        value: u32,
    ) -> GenResult<Self> {
        let raw_kind = spec.kind.as_deref().unwrap_or_default();
        let kind = AttrKind::parse(raw_kind).ok_or_else(|| GenError::UnknownAttrType {
            set: set_name.to_string(),
            attr: spec.name.clone(),
            kind: raw_kind.to_string(),
        })?;

        let nested = spec.nested_attributes.as_ref().map(|set| {
            let render_name = if set == family_name {
                family_name.to_string()
            } else {
                format!("{}_{}", family_name, c_lower(set))
            };
            let mut struct_type = format!("struct {}", render_name);
            if consts.contains_key(set) {
                struct_type.push('_');
            }
            NestedRef {
                set: set.clone(),
                render_name,
                struct_type,
            }
        });

        let prefix = spec.name_prefix.as_deref().unwrap_or(set_prefix);

        Ok(Self {
            name: spec.name.clone(),
            set_name: set_name.to_string(),
            value,
            kind,
            multi_attr: spec.multi_attr.unwrap_or(false),
            sub_type: spec.sub_type.clone(),
            checks: spec.checks.clone().unwrap_or_default(),
            nested,
            type_value: spec.type_value.clone().unwrap_or_default(),
            enum_ref: spec.enum_ref.clone(),
            enum_as_flags: spec.enum_as_flags.unwrap_or(false),
            byte_order: spec.byte_order.clone(),
            doc: spec.doc.clone(),
            c_name: c_ident(&spec.name),
            enum_name: c_upper(&format!("{}{}", prefix, spec.name)),
            is_bitfield: false,
            type_name: String::new(),
        })
    }

    /// Second phase: validate references to definitions and derive the
    /// C type of scalars.
    pub fn resolve(&mut self, consts: &IndexMap<String, Const>) -> GenResult<()> {
        let enum_set = match &self.enum_ref {
            Some(name) => Some(lookup_enum(consts, name)?),
            None => None,
        };
        if let Some(mask_set) = &self.checks.flags_mask {
            lookup_enum(consts, mask_set)?;
        }

        self.is_bitfield = self.enum_as_flags || enum_set.is_some_and(|e| e.is_flags);

        if let AttrKind::Scalar(scalar) = self.kind {
            self.type_name = match (enum_set, self.is_bitfield) {
                (Some(set), false) => match &set.enum_name {
                    Some(enum_name) => enum_name.clone(),
                    None => format!("__{}", scalar.name()),
                },
                _ => format!("__{}", scalar.name()),
            };
        }
        Ok(())
    }

    pub fn presence(&self) -> Presence {
        if self.multi_attr {
            return Presence::Count;
        }
        match self.kind {
            AttrKind::Pad | AttrKind::Unused => Presence::None,
            AttrKind::String | AttrKind::Binary => Presence::Len,
            AttrKind::ArrayNest => Presence::Count,
            _ => Presence::Bit,
        }
    }

    pub fn is_multi_val(&self) -> bool {
        self.multi_attr || self.kind == AttrKind::ArrayNest
    }

    pub fn nested_set(&self) -> Option<&str> {
        self.nested.as_ref().map(|n| n.set.as_str())
    }

    pub fn unsupported(&self, what: &'static str) -> GenError {
        GenError::Unsupported {
            what,
            kind: self.kind.name().to_string(),
            set: self.set_name.clone(),
            attr: self.name.clone(),
        }
    }

    /// Policy the handling peer validates this attribute with. `None` for
    /// kinds that never get a policy entry.
    pub fn wire_policy(&self, consts: &IndexMap<String, Const>) -> GenResult<Option<WirePolicy>> {
        let policy = match &self.kind {
            AttrKind::Pad | AttrKind::Unused => return Ok(None),
            AttrKind::Scalar(ty) => self.scalar_policy(*ty, consts)?,
            AttrKind::Flag => WirePolicy::Plain(AttrKind::Flag),
            AttrKind::String => WirePolicy::String {
                terminated: !self.checks.unterminated_ok.unwrap_or(false),
                max_len: self.checks.max_len,
            },
            AttrKind::Binary => match (self.checks.count(), self.checks.min_len) {
                (0, _) => WirePolicy::Plain(AttrKind::Binary),
                (1, Some(min_len)) => WirePolicy::MinLen(min_len),
                _ => return Err(self.unsupported("binary checks other than min-len")),
            },
            AttrKind::Nest => WirePolicy::Nested(self.nested_render_name()?.to_string()),
            AttrKind::ArrayNest => WirePolicy::NestedArray(self.nested_render_name()?.to_string()),
            AttrKind::NestTypeValue => return Err(self.unsupported("kernel policy")),
        };
        Ok(Some(policy))
    }

    fn scalar_policy(&self, ty: ScalarType, consts: &IndexMap<String, Const>) -> GenResult<WirePolicy> {
        if self.is_bitfield {
            let name = self.enum_ref.as_deref().unwrap_or_default();
            let mask = lookup_enum(consts, name)?.get_mask(true);
            return Ok(WirePolicy::Mask { ty, mask });
        }
        if let Some(mask_set) = &self.checks.flags_mask {
            let flag_cnt = lookup_enum(consts, mask_set)?.entries.len() as u32;
            let mask = 1u64.checked_shl(flag_cnt).map_or(u64::MAX, |bit| bit - 1);
            return Ok(WirePolicy::Mask { ty, mask });
        }
        if let Some(min) = self.checks.min {
            return Ok(WirePolicy::Min { ty, min });
        }
        if let Some(name) = &self.enum_ref {
            let (low, high) = lookup_enum(consts, name)?.value_range()?;
            if low == 0 {
                return Ok(WirePolicy::Max { ty, max: high });
            }
            return Ok(WirePolicy::Range { ty, low, high });
        }
        Ok(WirePolicy::Plain(AttrKind::Scalar(ty)))
    }

    pub fn nested_set_name(&self) -> GenResult<&str> {
        self.nested_set()
            .ok_or_else(|| self.unsupported("nesting without nested-attributes"))
    }

    pub fn nested_render_name(&self) -> GenResult<&str> {
        self.nested
            .as_ref()
            .map(|n| n.render_name.as_str())
            .ok_or_else(|| self.unsupported("nesting without nested-attributes"))
    }

    pub fn nested_struct_type(&self) -> GenResult<&str> {
        self.nested
            .as_ref()
            .map(|n| n.struct_type.as_str())
            .ok_or_else(|| self.unsupported("nesting without nested-attributes"))
    }
}

fn lookup_enum<'a>(
    consts: &'a IndexMap<String, Const>,
    name: &str,
) -> GenResult<&'a super::enum_set::EnumSet> {
    match consts.get(name) {
        Some(Const::Enum(set)) => Ok(set),
        Some(_) => Err(GenError::NotAnEnum(name.to_string())),
        None => Err(GenError::UnknownDefinition(name.to_string())),
    }
}
