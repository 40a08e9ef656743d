/* Codec tests for ynl_reflect
 *
 * Messages are encoded and decoded against an inline family spec. Raw
 * streams are built with the framing helpers so malformed input can be
 * fed to the decoder.
 */

use ynl_gen::spec::{Family, OpModeKind, SpecFile};
use ynl_reflect::wire::{nest_end, nest_start, put_attr};
use ynl_reflect::{Decoder, Encoder, Message, Peer, ReflectError, Value};

const LINK_SPEC: &str = r#"# SPDX-License-Identifier: ((GPL-2.0 WITH Linux-syscall-note) OR BSD-3-Clause)
name: link
definitions:
  - name: mode
    type: enum
    entries: [ disabled, enabled, auto ]
  - name: caps
    type: flags
    entries: [ rx, tx ]
attribute-sets:
  - name: link
    attributes:
      - name: ifindex
        type: u32
        checks:
          min: 1
      - name: name
        type: string
        checks:
          max-len: 8
      - name: mode
        type: u8
        enum: mode
      - name: caps
        type: u32
        enum: caps
      - name: addr
        type: binary
        checks:
          min-len: 6
      - name: up
        type: flag
      - name: queue
        type: nest
        nested-attributes: queue
        multi-attr: true
      - name: rings
        type: array-nest
        nested-attributes: ring
      - name: ids
        type: array-nest
        sub-type: u16
      - name: offset
        type: s64
        checks:
          min: -5
      - name: stats
        type: nest
        nested-attributes: stats
      - name: port
        type: u16
        byte-order: big-endian
  - name: queue
    attributes:
      - name: id
        type: u32
      - name: depth
        type: u16
  - name: ring
    attributes:
      - name: size
        type: u32
  - name: stats
    attributes:
      - name: packets
        type: u64
      - name: drops
        type: u64
operations:
  list:
    - name: link-get
      attribute-set: link
      do:
        request:
          attributes: [ ifindex ]
        reply:
          attributes: [ ifindex, name, mode, caps, addr, up, queue, rings, ids, offset, stats, port ]
    - name: link-brief
      attribute-set: link
      do:
        request:
          attributes: [ ifindex ]
        reply:
          attributes: [ ifindex, name ]
    - name: link-set
      attribute-set: link
      do:
        request:
          attributes: [ ifindex, name, mode, caps, addr, offset ]
"#;

const IFINDEX: u16 = 1;
const NAME: u16 = 2;
const MODE: u16 = 3;
const CAPS: u16 = 4;
const ADDR: u16 = 5;
const UP: u16 = 6;
const QUEUE: u16 = 7;
const RINGS: u16 = 8;
const OFFSET: u16 = 10;

fn link() -> Family {
    let spec = SpecFile::parse(LINK_SPEC).expect("spec parses");
    spec.check_license().expect("license accepted");
    Family::new(&spec, &[]).expect("family resolves")
}

fn queue(id: u32, depth: u16) -> Value {
    Value::Nest(
        Message::new()
            .with("id", Value::U32(id))
            .with("depth", Value::U16(depth)),
    )
}

fn ring(size: u32) -> Value {
    Value::Nest(Message::new().with("size", Value::U32(size)))
}

fn full_link() -> Message {
    Message::new()
        .with("ifindex", Value::U32(4))
        .with("name", Value::String("eth0".to_string()))
        .with("mode", Value::U8(2))
        .with("caps", Value::U32(3))
        .with("addr", Value::Binary(vec![2, 0, 0, 0, 0, 1]))
        .with("up", Value::Flag)
        .with("queue", Value::Multi(vec![queue(0, 64), queue(1, 128)]))
        .with("rings", Value::Array(vec![ring(256), ring(512), ring(1024)]))
        .with("ids", Value::Array(vec![Value::U16(10), Value::U16(11)]))
        .with("offset", Value::S64(-3))
        .with(
            "stats",
            Value::Nest(
                Message::new()
                    .with("packets", Value::U64(1 << 40))
                    .with("drops", Value::U64(7)),
            ),
        )
        .with("port", Value::U16(8080))
}

fn u32_attr(buf: &mut Vec<u8>, ty: u16, v: u32) {
    put_attr(buf, ty, &v.to_ne_bytes()).unwrap();
}

#[test]
fn test_round_trip_every_kind() {
    let family = link();
    let msg = full_link();

    let data = Encoder::new(&family).encode("link", &msg).unwrap();
    let originating = Decoder::new(&family, Peer::Originating).decode("link", &data).unwrap();
    assert_eq!(originating, msg);

    let handling = Decoder::new(&family, Peer::Handling).decode("link", &data).unwrap();
    assert_eq!(handling, msg);
}

#[test]
fn test_wire_layout() {
    let family = link();
    let msg = Message::new()
        .with("name", Value::String("eth0".to_string()))
        .with("ifindex", Value::U32(7));
    let data = Encoder::new(&family).encode("link", &msg).unwrap();

    /* declaration order, strings NUL terminated and padded */
    let mut expected = Vec::new();
    expected.extend_from_slice(&8u16.to_ne_bytes());
    expected.extend_from_slice(&IFINDEX.to_ne_bytes());
    expected.extend_from_slice(&7u32.to_ne_bytes());
    expected.extend_from_slice(&9u16.to_ne_bytes());
    expected.extend_from_slice(&NAME.to_ne_bytes());
    expected.extend_from_slice(b"eth0\0\0\0\0");
    assert_eq!(data, expected);
}

#[test]
fn test_big_endian_member() {
    let family = link();
    let msg = Message::new().with("port", Value::U16(8080));
    let data = Encoder::new(&family).encode("link", &msg).unwrap();
    assert_eq!(&data[4..6], &[0x1f, 0x90]);
}

#[test]
fn test_unassigned_members_are_absent() {
    let family = link();
    let msg = Message::new().with("ifindex", Value::U32(3));
    let data = Encoder::new(&family).encode("link", &msg).unwrap();
    assert_eq!(data.len(), 8);

    let decoded = Decoder::new(&family, Peer::Originating).decode("link", &data).unwrap();
    assert!(decoded.is_present("ifindex"));
    assert!(!decoded.is_present("name"));
    assert!(!decoded.is_present("up"));
    assert_eq!(decoded.count("queue"), 0);
    assert_eq!(decoded.count("rings"), 0);
}

#[test]
fn test_repeated_members_keep_stream_order() {
    let family = link();
    let mut data = Vec::new();
    for (i, id) in [5u32, 6, 7].iter().enumerate() {
        let start = nest_start(&mut data, QUEUE);
        u32_attr(&mut data, 1, *id);
        nest_end(&mut data, start).unwrap();
        if i == 0 {
            u32_attr(&mut data, IFINDEX, 2);
        }
    }

    let msg = Decoder::new(&family, Peer::Originating).decode("link", &data).unwrap();
    assert_eq!(msg.count("queue"), 3);
    let ids: Vec<u64> = msg
        .get("queue")
        .and_then(Value::elements)
        .unwrap()
        .iter()
        .map(|q| q.as_nest().unwrap().get("id").unwrap().as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![5, 6, 7]);
    assert_eq!(msg.get("ifindex"), Some(&Value::U32(2)));
}

#[test]
fn test_array_nest_entries_ignore_type() {
    let family = link();
    let mut data = Vec::new();
    let outer = nest_start(&mut data, RINGS);
    for (ty, size) in [(9u16, 16u32), (3, 32)] {
        let entry = nest_start(&mut data, ty);
        u32_attr(&mut data, 1, size);
        nest_end(&mut data, entry).unwrap();
    }
    nest_end(&mut data, outer).unwrap();

    let msg = Decoder::new(&family, Peer::Originating).decode("link", &data).unwrap();
    assert_eq!(msg.get("rings"), Some(&Value::Array(vec![ring(16), ring(32)])));
}

#[test]
fn test_array_nest_twice_rejected() {
    let family = link();
    let msg = Message::new().with("rings", Value::Array(vec![ring(1)]));
    let once = Encoder::new(&family).encode("link", &msg).unwrap();
    let twice = [once.clone(), once].concat();

    let err = Decoder::new(&family, Peer::Originating).decode("link", &twice).unwrap_err();
    assert!(matches!(err, ReflectError::AlreadyPresent { ref attr, .. } if attr == "rings"));
}

#[test]
fn test_bad_array_entry_fails_whole_decode() {
    let family = link();
    let mut data = Vec::new();
    let outer = nest_start(&mut data, RINGS);
    for size in [1u32, 2] {
        let entry = nest_start(&mut data, 0);
        u32_attr(&mut data, 1, size);
        nest_end(&mut data, entry).unwrap();
    }
    let entry = nest_start(&mut data, 0);
    put_attr(&mut data, 1, &[1, 2]).unwrap();
    nest_end(&mut data, entry).unwrap();
    nest_end(&mut data, outer).unwrap();

    let err = Decoder::new(&family, Peer::Originating).decode("link", &data).unwrap_err();
    assert!(matches!(
        err,
        ReflectError::BadLength { ref attr, expected: 4, found: 2, .. } if attr == "size"
    ));
}

#[test]
fn test_unknown_types_by_peer() {
    let family = link();
    let mut data = Vec::new();
    u32_attr(&mut data, IFINDEX, 1);
    u32_attr(&mut data, 99, 0);

    let msg = Decoder::new(&family, Peer::Originating).decode("link", &data).unwrap();
    assert_eq!(msg.len(), 1);

    let err = Decoder::new(&family, Peer::Handling).decode("link", &data).unwrap_err();
    assert!(matches!(err, ReflectError::UnknownAttrType { ty: 99, .. }));
}

#[test]
fn test_handling_policies() {
    let family = link();
    let handling = Decoder::new(&family, Peer::Handling);
    let originating = Decoder::new(&family, Peer::Originating);

    let policy_err = |data: &[u8], name: &str| match handling.decode("link", data) {
        Err(ReflectError::Policy { attr, .. }) => assert_eq!(attr, name),
        other => panic!("expected policy error for {}, got {:?}", name, other),
    };

    let mut data = Vec::new();
    u32_attr(&mut data, IFINDEX, 0);
    policy_err(&data, "ifindex");
    assert!(originating.decode("link", &data).is_ok());

    let data = {
        let mut buf = Vec::new();
        put_attr(&mut buf, MODE, &[3]).unwrap();
        buf
    };
    policy_err(&data, "mode");

    let mut data = Vec::new();
    u32_attr(&mut data, CAPS, 0x4);
    policy_err(&data, "caps");

    let mut data = Vec::new();
    put_attr(&mut data, NAME, b"too-long-name\0").unwrap();
    policy_err(&data, "name");

    let mut data = Vec::new();
    put_attr(&mut data, NAME, b"eth0").unwrap();
    policy_err(&data, "name");

    let mut data = Vec::new();
    put_attr(&mut data, ADDR, &[1, 2, 3, 4]).unwrap();
    policy_err(&data, "addr");

    let mut data = Vec::new();
    put_attr(&mut data, OFFSET, &(-6i64).to_ne_bytes()).unwrap();
    policy_err(&data, "offset");

    /* within every limit */
    let mut data = Vec::new();
    put_attr(&mut data, OFFSET, &(-5i64).to_ne_bytes()).unwrap();
    put_attr(&mut data, MODE, &[2]).unwrap();
    u32_attr(&mut data, CAPS, 0x3);
    put_attr(&mut data, NAME, b"eth0eth0\0").unwrap();
    let msg = handling.decode("link", &data).unwrap();
    assert_eq!(msg.get("name").and_then(Value::as_str), Some("eth0eth0"));
    assert_eq!(msg.get("offset").and_then(Value::as_i64), Some(-5));
}

#[test]
fn test_nested_members_checked_by_handling_peer() {
    let family = link();
    let mut data = Vec::new();
    let start = nest_start(&mut data, QUEUE);
    put_attr(&mut data, 2, &[1, 2, 3, 4]).unwrap();
    nest_end(&mut data, start).unwrap();

    let err = Decoder::new(&family, Peer::Handling).decode("link", &data).unwrap_err();
    assert!(matches!(
        err,
        ReflectError::BadLength { ref set, ref attr, expected: 2, found: 4 } if set == "queue" && attr == "depth"
    ));
}

#[test]
fn test_length_and_framing_errors() {
    let family = link();
    let decoder = Decoder::new(&family, Peer::Originating);

    let mut data = Vec::new();
    put_attr(&mut data, IFINDEX, &[1, 0]).unwrap();
    assert!(matches!(
        decoder.decode("link", &data).unwrap_err(),
        ReflectError::BadLength { expected: 4, found: 2, .. }
    ));

    let mut data = Vec::new();
    put_attr(&mut data, UP, &[1]).unwrap();
    assert!(matches!(
        decoder.decode("link", &data).unwrap_err(),
        ReflectError::BadLength { expected: 0, found: 1, .. }
    ));

    let mut data = Vec::new();
    u32_attr(&mut data, IFINDEX, 1);
    data.extend_from_slice(&[8, 0]);
    assert!(matches!(
        decoder.decode("link", &data).unwrap_err(),
        ReflectError::Truncated { offset: 8, needed: 4, available: 2 }
    ));
}

#[test]
fn test_encoder_type_checks() {
    let family = link();
    let encoder = Encoder::new(&family);

    let msg = Message::new().with("ifindex", Value::U16(1));
    assert!(matches!(
        encoder.encode("link", &msg).unwrap_err(),
        ReflectError::TypeMismatch { expected: "u32", found: "u16", .. }
    ));

    let msg = Message::new().with("queue", queue(1, 1));
    assert!(matches!(
        encoder.encode("link", &msg).unwrap_err(),
        ReflectError::TypeMismatch { expected: "multi-attr", found: "nest", .. }
    ));

    let msg = Message::new().with("ids", Value::Array(vec![Value::U32(1)]));
    assert!(matches!(
        encoder.encode("link", &msg).unwrap_err(),
        ReflectError::TypeMismatch { expected: "u16", found: "u32", .. }
    ));

    let msg = Message::new().with("mtu", Value::U32(1500));
    assert!(matches!(
        encoder.encode("link", &msg).unwrap_err(),
        ReflectError::UnknownAttr { ref attr, .. } if attr == "mtu"
    ));

    let msg = Message::new().with("name", Value::String("x".repeat(70000)));
    assert!(matches!(encoder.encode("link", &msg).unwrap_err(), ReflectError::TooLong { .. }));
}

#[test]
fn test_types_beyond_header_field_rejected() {
    let spec = SpecFile::parse(
        r#"# SPDX-License-Identifier: ((GPL-2.0 WITH Linux-syscall-note) OR BSD-3-Clause)
name: wide
attribute-sets:
  - name: wide
    attributes:
      - name: low
        type: u32
        value: 16383
      - name: flagged
        type: u32
        value: 16384
      - name: huge
        type: u32
        value: 70000
"#,
    )
    .unwrap();
    let family = Family::new(&spec, &[]).unwrap();
    let encoder = Encoder::new(&family);

    let buf = encoder.encode("wide", &Message::new().with("low", Value::U32(1))).unwrap();
    assert_eq!(u16::from_ne_bytes([buf[2], buf[3]]), 16383);

    for (name, ty) in [("flagged", 16384), ("huge", 70000)] {
        let msg = Message::new().with(name, Value::U32(1));
        assert!(matches!(
            encoder.encode("wide", &msg).unwrap_err(),
            ReflectError::TypeOutOfRange { ty: found, .. } if found == ty
        ));
    }

    let family = link();
    let encoder = Encoder::new(&family);
    let ids = (0..=16384u32).map(|i| Value::U16(i as u16)).collect();
    let msg = Message::new().with("ids", Value::Array(ids));
    assert!(matches!(
        encoder.encode("link", &msg).unwrap_err(),
        ReflectError::TypeOutOfRange { ty: 16384, .. }
    ));
}

#[test]
fn test_operation_messages() {
    let family = link();
    let encoder = Encoder::new(&family);

    let req = Message::new().with("ifindex", Value::U32(2));
    let data = encoder.encode_request("link-get", OpModeKind::Do, &req).unwrap();
    let decoded = Decoder::new(&family, Peer::Handling)
        .decode_request("link-get", OpModeKind::Do, &data)
        .unwrap();
    assert_eq!(decoded, req);

    let extra = req.clone().with("name", Value::String("eth0".to_string()));
    assert!(matches!(
        encoder.encode_request("link-get", OpModeKind::Do, &extra).unwrap_err(),
        ReflectError::NotAllowed { ref attr, what: "request", .. } if attr == "name"
    ));

    let data = encoder.encode("link", &extra).unwrap();
    assert!(matches!(
        Decoder::new(&family, Peer::Handling)
            .decode_request("link-get", OpModeKind::Do, &data)
            .unwrap_err(),
        ReflectError::NotAllowed { .. }
    ));

    /* members outside the reply are dropped by the originating peer */
    let full = encoder.encode("link", &full_link()).unwrap();
    let brief = Decoder::new(&family, Peer::Originating)
        .decode_reply("link-brief", OpModeKind::Do, &full)
        .unwrap();
    assert_eq!(brief.names().collect::<Vec<_>>(), vec!["ifindex", "name"]);

    assert!(matches!(
        encoder.encode_request("link-get", OpModeKind::Dump, &req).unwrap_err(),
        ReflectError::NoMessage { mode: "dump", .. }
    ));
    assert!(matches!(
        Decoder::new(&family, Peer::Originating)
            .decode_reply("link-set", OpModeKind::Do, &data)
            .unwrap_err(),
        ReflectError::NoMessage { what: "reply", .. }
    ));
    assert!(matches!(
        encoder.encode_request("link-del", OpModeKind::Do, &req).unwrap_err(),
        ReflectError::Model(_)
    ));
}

#[test]
fn test_get_request_and_reply() {
    let yaml = r#"# SPDX-License-Identifier: ((GPL-2.0 WITH Linux-syscall-note) OR BSD-3-Clause)
name: tiny
attribute-sets:
  - name: tiny
    attributes:
      - name: id
        type: u32
      - name: name
        type: string
operations:
  list:
    - name: get
      attribute-set: tiny
      do:
        request:
          attributes: [ id ]
        reply:
          attributes: [ id, name ]
"#;
    let spec = SpecFile::parse(yaml).unwrap();
    let family = Family::new(&spec, &[]).unwrap();

    let req = Message::new().with("id", Value::U32(7));
    let data = Encoder::new(&family).encode_request("get", OpModeKind::Do, &req).unwrap();
    let mut expected = Vec::new();
    u32_attr(&mut expected, 1, 7);
    assert_eq!(data, expected);

    let mut stream = Vec::new();
    u32_attr(&mut stream, 1, 7);
    put_attr(&mut stream, 2, b"eth0\0").unwrap();
    let rsp = Decoder::new(&family, Peer::Originating)
        .decode_reply("get", OpModeKind::Do, &stream)
        .unwrap();
    assert_eq!(
        rsp,
        Message::new()
            .with("id", Value::U32(7))
            .with("name", Value::String("eth0".to_string()))
    );
}
