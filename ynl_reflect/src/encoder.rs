/* Originating-side encoder: messages to attribute streams */

use crate::errors::{ReflectError, ReflectResult};
use crate::value::{Message, Value};
use crate::wire::{nest_end, nest_start, put_attr, NLA_TYPE_MASK};
use byteorder::{BigEndian, ByteOrder, NativeEndian};
use ynl_gen::spec::{Attr, AttrKind, AttrSet, Family, OpModeKind, ScalarType};

pub struct Encoder<'a> {
    family: &'a Family,
}

fn mismatch(attr: &Attr, expected: &'static str, value: &Value) -> ReflectError {
    ReflectError::TypeMismatch {
        set: attr.set_name.clone(),
        attr: attr.name.clone(),
        expected,
        found: value.kind_name(),
    }
}

fn too_long(attr: &Attr, len: usize) -> ReflectError {
    ReflectError::TooLong {
        set: attr.set_name.clone(),
        attr: attr.name.clone(),
        len,
    }
}

/* Types share the header field with the nested and byte-order flags */
fn header_type(attr: &Attr, ty: u64) -> ReflectResult<u16> {
    u16::try_from(ty)
        .ok()
        .filter(|t| t & !NLA_TYPE_MASK == 0)
        .ok_or_else(|| ReflectError::TypeOutOfRange {
            set: attr.set_name.clone(),
            attr: attr.name.clone(),
            ty,
        })
}

fn scalar_bytes(attr: &Attr, ty: ScalarType, value: &Value) -> ReflectResult<Vec<u8>> {
    let big = attr.byte_order.as_deref() == Some("big-endian");
    let mut out = vec![0u8; ty.width()];
    match (ty, value) {
        (ScalarType::U8, Value::U8(v)) => out[0] = *v,
        (ScalarType::U16, Value::U16(v)) if big => BigEndian::write_u16(&mut out, *v),
        (ScalarType::U16, Value::U16(v)) => NativeEndian::write_u16(&mut out, *v),
        (ScalarType::U32, Value::U32(v)) if big => BigEndian::write_u32(&mut out, *v),
        (ScalarType::U32, Value::U32(v)) => NativeEndian::write_u32(&mut out, *v),
        (ScalarType::U64, Value::U64(v)) if big => BigEndian::write_u64(&mut out, *v),
        (ScalarType::U64, Value::U64(v)) => NativeEndian::write_u64(&mut out, *v),
        (ScalarType::S32, Value::S32(v)) if big => BigEndian::write_i32(&mut out, *v),
        (ScalarType::S32, Value::S32(v)) => NativeEndian::write_i32(&mut out, *v),
        (ScalarType::S64, Value::S64(v)) if big => BigEndian::write_i64(&mut out, *v),
        (ScalarType::S64, Value::S64(v)) => NativeEndian::write_i64(&mut out, *v),
        _ => return Err(mismatch(attr, ty.name(), value)),
    }
    Ok(out)
}

impl<'a> Encoder<'a> {
    pub fn new(family: &'a Family) -> Self {
        Self { family }
    }

    /// Encode every present member of `msg` against attribute set `set`.
    pub fn encode(&self, set: &str, msg: &Message) -> ReflectResult<Vec<u8>> {
        let attr_set = self.family.attr_set(set)?;
        let mut buf = Vec::new();
        self.put_attrs(attr_set, msg, &mut buf)?;
        Ok(buf)
    }

    /// Encode the request of `op` in the given mode. Members outside the
    /// request's attribute list are rejected.
    pub fn encode_request(&self, op: &str, kind: OpModeKind, msg: &Message) -> ReflectResult<Vec<u8>> {
        let operation = self.family.op(op)?;
        let allowed = operation.request_attrs(kind).ok_or_else(|| ReflectError::NoMessage {
            op: op.to_string(),
            mode: kind.name(),
            what: "request",
        })?;
        if let Some(name) = msg.names().find(|name| !allowed.iter().any(|a| a == name)) {
            return Err(ReflectError::NotAllowed {
                op: op.to_string(),
                what: "request",
                attr: name.to_string(),
            });
        }
        let set = operation
            .attr_set
            .as_deref()
            .ok_or_else(|| ynl_gen::GenError::OpWithoutAttrSet(op.to_string()))?;
        self.encode(set, msg)
    }

    /* Members go out in declaration order, like the generated put helpers */
    fn put_attrs(&self, attr_set: &AttrSet, msg: &Message, buf: &mut Vec<u8>) -> ReflectResult<()> {
        if let Some(name) = msg.names().find(|name| !attr_set.attrs.contains_key(*name)) {
            return Err(ReflectError::UnknownAttr {
                set: attr_set.name.clone(),
                attr: name.to_string(),
            });
        }

        for attr in attr_set.attrs.values() {
            let Some(value) = msg.get(&attr.name) else {
                continue;
            };
            let ty = header_type(attr, u64::from(attr.value))?;
            if attr.multi_attr {
                let Value::Multi(items) = value else {
                    return Err(mismatch(attr, "multi-attr", value));
                };
                for item in items {
                    self.put_one(attr, ty, item, buf)?;
                }
            } else {
                self.put_one(attr, ty, value, buf)?;
            }
        }
        Ok(())
    }

    fn put_one(&self, attr: &Attr, ty: u16, value: &Value, buf: &mut Vec<u8>) -> ReflectResult<()> {
        match (&attr.kind, value) {
            (AttrKind::Scalar(scalar), _) => {
                let bytes = scalar_bytes(attr, *scalar, value)?;
                put_attr(buf, ty, &bytes).ok_or_else(|| too_long(attr, bytes.len()))
            }
            (AttrKind::Flag, Value::Flag) => put_attr(buf, ty, &[]).ok_or_else(|| too_long(attr, 0)),
            (AttrKind::String, Value::String(s)) => {
                let mut bytes = Vec::with_capacity(s.len() + 1);
                bytes.extend_from_slice(s.as_bytes());
                bytes.push(0);
                put_attr(buf, ty, &bytes).ok_or_else(|| too_long(attr, bytes.len()))
            }
            (AttrKind::Binary, Value::Binary(bytes)) => {
                put_attr(buf, ty, bytes).ok_or_else(|| too_long(attr, bytes.len()))
            }
            (AttrKind::Nest, Value::Nest(inner)) => {
                let nested = self.family.attr_set(attr.nested_set_name()?)?;
                let start = nest_start(buf, ty);
                self.put_attrs(nested, inner, buf)?;
                nest_end(buf, start).ok_or_else(|| too_long(attr, buf.len() - start))
            }
            (AttrKind::ArrayNest, Value::Array(items)) => {
                let start = nest_start(buf, ty);
                for (idx, item) in items.iter().enumerate() {
                    self.put_array_entry(attr, header_type(attr, idx as u64)?, item, buf)?;
                }
                nest_end(buf, start).ok_or_else(|| too_long(attr, buf.len() - start))
            }
            (AttrKind::Pad | AttrKind::Unused | AttrKind::NestTypeValue, _) => Err(ReflectError::Unsupported {
                kind: attr.kind.name(),
                set: attr.set_name.clone(),
                attr: attr.name.clone(),
            }),
            (kind, _) => Err(mismatch(attr, kind.name(), value)),
        }
    }

    /* Entries carry their index as type */
    fn put_array_entry(&self, attr: &Attr, idx: u16, item: &Value, buf: &mut Vec<u8>) -> ReflectResult<()> {
        if let Some(scalar) = attr.sub_type.as_deref().and_then(ScalarType::parse) {
            let bytes = scalar_bytes(attr, scalar, item)?;
            return put_attr(buf, idx, &bytes).ok_or_else(|| too_long(attr, bytes.len()));
        }
        let Value::Nest(inner) = item else {
            return Err(mismatch(attr, "nest", item));
        };
        let nested = self.family.attr_set(attr.nested_set_name()?)?;
        let start = nest_start(buf, idx);
        self.put_attrs(nested, inner, buf)?;
        nest_end(buf, start).ok_or_else(|| too_long(attr, buf.len() - start))
    }
}
