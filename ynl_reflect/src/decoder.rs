/* Attribute stream decoder
 *
 * Decoding runs in two passes like the generated parsers. The first pass
 * splits the stream and counts repeated members, the second fills the
 * message with every repeated member sized up front.
 *
 * The originating peer skips attribute types it does not know. The
 * handling peer rejects them and applies the family's policy to every
 * value it accepts.
 */

use crate::errors::{ReflectError, ReflectResult};
use crate::policy::{check_binary, check_scalar, check_string, policy_for};
use crate::value::{Message, Value};
use crate::wire::{split_attrs, RawAttr};
use byteorder::{BigEndian, ByteOrder, NativeEndian};
use indexmap::IndexMap;
use ynl_gen::spec::{Attr, AttrKind, AttrSet, Family, OpModeKind, ScalarType};

/// Which end of the exchange is decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    Originating,
    Handling,
}

pub struct Decoder<'a> {
    family: &'a Family,
    peer: Peer,
}

fn bad_length(attr: &Attr, expected: usize, found: usize) -> ReflectError {
    ReflectError::BadLength {
        set: attr.set_name.clone(),
        attr: attr.name.clone(),
        expected,
        found,
    }
}

fn read_scalar(attr: &Attr, ty: ScalarType, payload: &[u8]) -> ReflectResult<Value> {
    if payload.len() != ty.width() {
        return Err(bad_length(attr, ty.width(), payload.len()));
    }
    let big = attr.byte_order.as_deref() == Some("big-endian");
    let value = match ty {
        ScalarType::U8 => Value::U8(payload[0]),
        ScalarType::U16 if big => Value::U16(BigEndian::read_u16(payload)),
        ScalarType::U16 => Value::U16(NativeEndian::read_u16(payload)),
        ScalarType::U32 if big => Value::U32(BigEndian::read_u32(payload)),
        ScalarType::U32 => Value::U32(NativeEndian::read_u32(payload)),
        ScalarType::U64 if big => Value::U64(BigEndian::read_u64(payload)),
        ScalarType::U64 => Value::U64(NativeEndian::read_u64(payload)),
        ScalarType::S32 if big => Value::S32(BigEndian::read_i32(payload)),
        ScalarType::S32 => Value::S32(NativeEndian::read_i32(payload)),
        ScalarType::S64 if big => Value::S64(BigEndian::read_i64(payload)),
        ScalarType::S64 => Value::S64(NativeEndian::read_i64(payload)),
    };
    Ok(value)
}

impl<'a> Decoder<'a> {
    pub fn new(family: &'a Family, peer: Peer) -> Self {
        Self { family, peer }
    }

    /// Decode a stream of attributes from set `set`.
    pub fn decode(&self, set: &str, data: &[u8]) -> ReflectResult<Message> {
        let attr_set = self.family.attr_set(set)?;
        self.parse_attrs(attr_set, data, None)
    }

    /// Decode the request of `op`. Only members listed for the request are
    /// accepted.
    pub fn decode_request(&self, op: &str, kind: OpModeKind, data: &[u8]) -> ReflectResult<Message> {
        self.decode_op(op, kind, "request", data)
    }

    /// Decode the reply of `op`. Only members listed for the reply are
    /// kept.
    pub fn decode_reply(&self, op: &str, kind: OpModeKind, data: &[u8]) -> ReflectResult<Message> {
        self.decode_op(op, kind, "reply", data)
    }

    fn decode_op(&self, op: &str, kind: OpModeKind, what: &'static str, data: &[u8]) -> ReflectResult<Message> {
        let operation = self.family.op(op)?;
        let attrs = if what == "request" {
            operation.request_attrs(kind)
        } else {
            operation.reply_attrs(kind)
        };
        let allowed = attrs.ok_or_else(|| ReflectError::NoMessage {
            op: op.to_string(),
            mode: kind.name(),
            what,
        })?;
        let set = operation
            .attr_set
            .as_deref()
            .ok_or_else(|| ynl_gen::GenError::OpWithoutAttrSet(op.to_string()))?;
        let attr_set = self.family.attr_set(set)?;
        self.parse_attrs(attr_set, data, Some((op, what, allowed)))
    }

    /* Resolve a raw attribute to its definition, None to skip it */
    fn lookup<'s>(
        &self,
        attr_set: &'s AttrSet,
        raw: &RawAttr<'_>,
        allowed: Option<(&str, &'static str, &[String])>,
    ) -> ReflectResult<Option<&'s Attr>> {
        let Some(attr) = attr_set.by_value(u32::from(raw.ty)) else {
            if self.peer == Peer::Handling {
                return Err(ReflectError::UnknownAttrType {
                    set: attr_set.name.clone(),
                    ty: raw.ty,
                });
            }
            return Ok(None);
        };
        if let Some((op, what, list)) = allowed {
            if !list.iter().any(|name| *name == attr.name) {
                if self.peer == Peer::Handling {
                    return Err(ReflectError::NotAllowed {
                        op: op.to_string(),
                        what,
                        attr: attr.name.clone(),
                    });
                }
                return Ok(None);
            }
        }
        if matches!(attr.kind, AttrKind::Pad | AttrKind::Unused) {
            return Ok(None);
        }
        Ok(Some(attr))
    }

    fn parse_attrs(
        &self,
        attr_set: &AttrSet,
        data: &[u8],
        allowed: Option<(&str, &'static str, &[String])>,
    ) -> ReflectResult<Message> {
        let raw_attrs = split_attrs(data)?;

        /* first pass: pick known attributes, count repeated ones */
        let mut found = Vec::with_capacity(raw_attrs.len());
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for raw in &raw_attrs {
            let Some(attr) = self.lookup(attr_set, raw, allowed)? else {
                continue;
            };
            if attr.is_multi_val() {
                let n = counts.entry(attr.name.as_str()).or_default();
                if attr.kind == AttrKind::ArrayNest && *n > 0 {
                    return Err(ReflectError::AlreadyPresent {
                        set: attr_set.name.clone(),
                        attr: attr.name.clone(),
                    });
                }
                *n += 1;
            }
            found.push((attr, raw));
        }

        let mut msg = Message::new();
        for (name, n) in &counts {
            if attr_set.attrs[*name].multi_attr {
                msg.set(name, Value::Multi(Vec::with_capacity(*n)));
            }
        }

        /* second pass: fill */
        for (attr, raw) in found {
            let value = self.parse_one(attr, raw.payload)?;
            if attr.multi_attr {
                if let Some(Value::Multi(items)) = msg.get_mut(&attr.name) {
                    items.push(value);
                }
            } else {
                msg.set(&attr.name, value);
            }
        }
        Ok(msg)
    }

    fn parse_one(&self, attr: &Attr, payload: &[u8]) -> ReflectResult<Value> {
        /* nests are checked member by member */
        let policy = match (self.peer, &attr.kind) {
            (Peer::Handling, AttrKind::Scalar(_) | AttrKind::String | AttrKind::Binary) => {
                policy_for(self.family, attr)?
            }
            _ => None,
        };

        match &attr.kind {
            AttrKind::Scalar(ty) => {
                let value = read_scalar(attr, *ty, payload)?;
                if let Some(policy) = &policy {
                    check_scalar(policy, attr, &value)?;
                }
                Ok(value)
            }
            AttrKind::Flag => {
                if !payload.is_empty() {
                    return Err(bad_length(attr, 0, payload.len()));
                }
                Ok(Value::Flag)
            }
            AttrKind::String => {
                let content = match &policy {
                    Some(policy) => check_string(policy, attr, payload)?,
                    None => payload.split(|b| *b == 0).next().unwrap_or_default(),
                };
                let s = std::str::from_utf8(content).map_err(|_| ReflectError::InvalidString {
                    set: attr.set_name.clone(),
                    attr: attr.name.clone(),
                })?;
                Ok(Value::String(s.to_string()))
            }
            AttrKind::Binary => {
                if let Some(policy) = &policy {
                    check_binary(policy, attr, payload)?;
                }
                Ok(Value::Binary(payload.to_vec()))
            }
            AttrKind::Nest => {
                let nested = self.family.attr_set(attr.nested_set_name()?)?;
                Ok(Value::Nest(self.parse_attrs(nested, payload, None)?))
            }
            AttrKind::ArrayNest => self.parse_array(attr, payload),
            AttrKind::Pad | AttrKind::Unused | AttrKind::NestTypeValue => Err(ReflectError::Unsupported {
                kind: attr.kind.name(),
                set: attr.set_name.clone(),
                attr: attr.name.clone(),
            }),
        }
    }

    /* Entry types are indexes and are not checked */
    fn parse_array(&self, attr: &Attr, payload: &[u8]) -> ReflectResult<Value> {
        let entries = split_attrs(payload)?;
        let mut items = Vec::with_capacity(entries.len());

        if let Some(ty) = attr.sub_type.as_deref().and_then(ScalarType::parse) {
            for entry in &entries {
                items.push(read_scalar(attr, ty, entry.payload)?);
            }
            return Ok(Value::Array(items));
        }

        let nested = self.family.attr_set(attr.nested_set_name()?)?;
        for entry in &entries {
            items.push(Value::Nest(self.parse_attrs(nested, entry.payload, None)?));
        }
        Ok(Value::Array(items))
    }
}
