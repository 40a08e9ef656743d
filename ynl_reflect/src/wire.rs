/* Netlink attribute framing
 *
 * Every attribute starts with a 4 byte header, a u16 length covering
 * header and payload followed by a u16 type, both in host byte order.
 * The next attribute starts at the length rounded up to 4 bytes.
 */

use crate::errors::{ReflectError, ReflectResult};
use byteorder::{ByteOrder, NativeEndian};

pub const NLA_HDRLEN: usize = 4;
pub const NLA_ALIGNTO: usize = 4;

pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

pub fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// One attribute as found in a stream.
#[derive(Debug, Clone, Copy)]
pub struct RawAttr<'a> {
    pub ty: u16,
    pub nested: bool,
    pub payload: &'a [u8],
}

/* Split a stream into attributes. The last attribute may omit its
   trailing padding. */
pub fn split_attrs(data: &[u8]) -> ReflectResult<Vec<RawAttr<'_>>> {
    let mut attrs = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let rest = &data[offset..];
        if rest.len() < NLA_HDRLEN {
            return Err(ReflectError::Truncated {
                offset,
                needed: NLA_HDRLEN,
                available: rest.len(),
            });
        }
        let len = NativeEndian::read_u16(&rest[0..2]) as usize;
        let raw_ty = NativeEndian::read_u16(&rest[2..4]);
        if len < NLA_HDRLEN || len > rest.len() {
            return Err(ReflectError::Truncated {
                offset,
                needed: len.max(NLA_HDRLEN),
                available: rest.len(),
            });
        }
        attrs.push(RawAttr {
            ty: raw_ty & NLA_TYPE_MASK,
            nested: raw_ty & NLA_F_NESTED != 0,
            payload: &rest[NLA_HDRLEN..len],
        });
        offset += nla_align(len);
    }
    Ok(attrs)
}

fn pad(buf: &mut Vec<u8>) {
    buf.resize(nla_align(buf.len()), 0);
}

/// Append one attribute with its padding. Returns `None` when the payload
/// does not fit the length field.
pub fn put_attr(buf: &mut Vec<u8>, ty: u16, payload: &[u8]) -> Option<()> {
    let len = u16::try_from(NLA_HDRLEN + payload.len()).ok()?;
    let mut hdr = [0u8; NLA_HDRLEN];
    NativeEndian::write_u16(&mut hdr[0..2], len);
    NativeEndian::write_u16(&mut hdr[2..4], ty);
    buf.extend_from_slice(&hdr);
    buf.extend_from_slice(payload);
    pad(buf);
    Some(())
}

/* Open a nest, the header length is patched by nest_end() */
pub fn nest_start(buf: &mut Vec<u8>, ty: u16) -> usize {
    let start = buf.len();
    let mut hdr = [0u8; NLA_HDRLEN];
    NativeEndian::write_u16(&mut hdr[2..4], ty | NLA_F_NESTED);
    buf.extend_from_slice(&hdr);
    start
}

pub fn nest_end(buf: &mut Vec<u8>, start: usize) -> Option<()> {
    let len = u16::try_from(buf.len() - start).ok()?;
    NativeEndian::write_u16(&mut buf[start..start + 2], len);
    pad(buf);
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_pads_to_four_bytes() {
        let mut buf = Vec::new();
        put_attr(&mut buf, 2, b"abcde").unwrap();
        assert_eq!(buf.len(), 12);
        assert_eq!(NativeEndian::read_u16(&buf[0..2]), 9);
        assert_eq!(&buf[9..], &[0, 0, 0]);
    }

    #[test]
    fn test_split_accepts_missing_final_padding() {
        let mut buf = Vec::new();
        put_attr(&mut buf, 1, &[1, 2, 3, 4]).unwrap();
        put_attr(&mut buf, 3, &[9]).unwrap();
        buf.truncate(buf.len() - 3);

        let attrs = split_attrs(&buf).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[1].ty, 3);
        assert_eq!(attrs[1].payload, &[9]);
    }

    #[test]
    fn test_split_rejects_overlong_length() {
        let mut buf = Vec::new();
        put_attr(&mut buf, 1, &[0; 8]).unwrap();
        NativeEndian::write_u16(&mut buf[0..2], 40);
        assert!(matches!(
            split_attrs(&buf),
            Err(ReflectError::Truncated { offset: 0, needed: 40, available: 12 })
        ));
    }

    #[test]
    fn test_nest_flags_are_masked() {
        let mut buf = Vec::new();
        let start = nest_start(&mut buf, 5);
        put_attr(&mut buf, 1, &[0; 4]).unwrap();
        nest_end(&mut buf, start).unwrap();

        let attrs = split_attrs(&buf).unwrap();
        assert_eq!(attrs[0].ty, 5);
        assert!(attrs[0].nested);
        assert_eq!(attrs[0].payload.len(), 8);
    }
}
