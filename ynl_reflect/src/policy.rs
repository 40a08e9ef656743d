/* Handling-side policy checks, applied to decoded values the way the
 * handling peer's policy table would apply them. */

use crate::errors::{ReflectError, ReflectResult};
use crate::value::Value;
use ynl_gen::spec::{Attr, Family, ScalarType, WirePolicy};

fn violation(attr: &Attr, reason: String) -> ReflectError {
    ReflectError::Policy {
        set: attr.set_name.clone(),
        attr: attr.name.clone(),
        reason,
    }
}

pub fn policy_for(family: &Family, attr: &Attr) -> ReflectResult<Option<WirePolicy>> {
    Ok(attr.wire_policy(&family.consts)?)
}

/* Scalars compare signed only when the wire type is signed */
fn check_min(attr: &Attr, ty: ScalarType, value: &Value, min: i64) -> ReflectResult<()> {
    let below = if ty.is_signed() {
        value.as_i64().is_some_and(|v| v < min)
    } else {
        min > 0 && value.as_u64().is_some_and(|v| v < min as u64)
    };
    if below {
        return Err(violation(attr, format!("value below minimum {}", min)));
    }
    Ok(())
}

fn unsigned(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_i64().map(|v| v as u64))
        .unwrap_or_default()
}

pub fn check_scalar(policy: &WirePolicy, attr: &Attr, value: &Value) -> ReflectResult<()> {
    match *policy {
        WirePolicy::Mask { mask, .. } => {
            let v = unsigned(value);
            if v & !mask != 0 {
                return Err(violation(attr, format!("bits 0x{:x} outside mask 0x{:x}", v & !mask, mask)));
            }
        }
        WirePolicy::Min { ty, min } => check_min(attr, ty, value, min)?,
        WirePolicy::Max { max, .. } => {
            if unsigned(value) > max {
                return Err(violation(attr, format!("value above maximum {}", max)));
            }
        }
        WirePolicy::Range { low, high, .. } => {
            let v = unsigned(value);
            if v < low || v > high {
                return Err(violation(attr, format!("value outside range {}..{}", low, high)));
            }
        }
        _ => {}
    }
    Ok(())
}

/* Returns the string content with the terminator removed */
pub fn check_string<'a>(policy: &WirePolicy, attr: &Attr, payload: &'a [u8]) -> ReflectResult<&'a [u8]> {
    let WirePolicy::String { terminated, max_len } = *policy else {
        return Ok(payload);
    };
    let content = if terminated {
        match payload.iter().position(|b| *b == 0) {
            Some(end) => &payload[..end],
            None => return Err(violation(attr, "missing NUL terminator".to_string())),
        }
    } else {
        payload.strip_suffix(&[0]).unwrap_or(payload)
    };
    if let Some(max_len) = max_len {
        if content.len() as u64 > max_len {
            return Err(violation(attr, format!("string longer than {} bytes", max_len)));
        }
    }
    Ok(content)
}

pub fn check_binary(policy: &WirePolicy, attr: &Attr, payload: &[u8]) -> ReflectResult<()> {
    if let WirePolicy::MinLen(min_len) = *policy {
        if (payload.len() as u64) < min_len {
            return Err(violation(attr, format!("payload shorter than {} bytes", min_len)));
        }
    }
    Ok(())
}
