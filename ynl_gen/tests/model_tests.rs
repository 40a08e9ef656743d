/* Family Model Tests
 *
 * These tests resolve inline family specs and check numbering, root and
 * nested set discovery, struct ordering, inheritance and the errors
 * raised for specs the generator can not handle.
 */

use ynl_gen::spec::{AttrKind, Family, OpModeKind, ScalarType, SpecFile};
use ynl_gen::{GenError, GenResult};

const LICENSE_LINE: &str = "# SPDX-License-Identifier: ((GPL-2.0 WITH Linux-syscall-note) OR BSD-3-Clause)\n";

/* Helper to resolve a family from a spec body without the license line */
fn resolve(body: &str) -> GenResult<Family> {
    let spec = SpecFile::parse(&format!("{}{}", LICENSE_LINE, body))?;
    spec.check_license()?;
    Family::new(&spec, &[])
}

const NESTED_BODY: &str = r#"name: nets
attribute-sets:
  - name: root
    attributes:
      - name: id
        type: u32
      - name: outer
        type: nest
        nested-attributes: outer
      - name: rings
        type: array-nest
        nested-attributes: ring
  - name: outer
    attributes:
      - name: inner
        type: nest
        nested-attributes: inner
      - name: leaf
        type: nest
        nested-attributes: leaf
  - name: inner
    attributes:
      - name: leaf
        type: nest
        nested-attributes: leaf
  - name: leaf
    attributes:
      - name: value
        type: u16
  - name: ring
    attributes:
      - name: size
        type: u32
operations:
  list:
    - name: get
      attribute-set: root
      do:
        request:
          attributes: [ id, outer ]
        reply:
          attributes: [ id, rings ]
"#;

#[test]
fn test_nested_structs_follow_dependencies() {
    let family = resolve(NESTED_BODY).unwrap();
    let order: Vec<&str> = family.pure_nested_structs.keys().map(String::as_str).collect();

    let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();
    assert_eq!(order.len(), 4);
    assert!(pos("leaf") < pos("inner"));
    assert!(pos("inner") < pos("outer"));
    assert!(!family.pure_nested_structs.contains_key("root"));
}

#[test]
fn test_nested_usage_propagates() {
    let family = resolve(NESTED_BODY).unwrap();
    let st = |name: &str| &family.pure_nested_structs[name];

    /* outer is only sent, rings only received */
    assert!(st("outer").request && !st("outer").reply);
    assert!(st("inner").request && !st("inner").reply);
    assert!(st("leaf").request && !st("leaf").reply);
    assert!(!st("ring").request && st("ring").reply);
}

#[test]
fn test_array_nest_inherits_index() {
    let family = resolve(NESTED_BODY).unwrap();
    assert_eq!(family.pure_nested_structs["ring"].inherited, vec!["idx".to_string()]);
    assert!(family.pure_nested_structs["leaf"].inherited.is_empty());
}

#[test]
fn test_root_sets_collect_usage() {
    let family = resolve(NESTED_BODY).unwrap();
    let root = &family.root_sets["root"];
    assert_eq!(root.request.iter().cloned().collect::<Vec<_>>(), vec!["id", "outer"]);
    assert_eq!(root.reply.iter().cloned().collect::<Vec<_>>(), vec!["id", "rings"]);
}

#[test]
fn test_attr_and_op_numbering() {
    let body = r#"name: num
attribute-sets:
  - name: num
    attributes:
      - name: a
        type: u32
      - name: b
        type: s64
        value: 10
      - name: c
        type: flag
operations:
  list:
    - name: first
      attribute-set: num
      do:
        request:
          attributes: [ a ]
    - name: second
      attribute-set: num
      value: 7
      do:
        request:
          attributes: [ b ]
    - name: third
      attribute-set: num
      do:
        request:
          attributes: [ c ]
"#;
    let family = resolve(body).unwrap();
    let set = family.attr_set("num").unwrap();
    let values: Vec<u32> = set.attrs.values().map(|a| a.value).collect();
    assert_eq!(values, vec![1, 10, 11]);
    assert_eq!(set.name_prefix, "NUM_A_");
    assert_eq!(set.attrs["b"].enum_name, "NUM_A_B");
    assert_eq!(set.attrs["b"].kind, AttrKind::Scalar(ScalarType::S64));

    let values: Vec<Option<u32>> = family.msgs.values().map(|op| op.value).collect();
    assert_eq!(values, vec![Some(1), Some(7), Some(8)]);
    assert_eq!(family.msgs["second"].enum_name, "NUM_CMD_SECOND");
}

#[test]
fn test_directional_numbering() {
    let body = r#"name: dir
attribute-sets:
  - name: dir
    attributes:
      - name: id
        type: u32
operations:
  enum-model: directional
  list:
    - name: get
      attribute-set: dir
      do:
        request:
          value: 2
          attributes: [ id ]
        reply:
          value: 5
          attributes: [ id ]
    - name: set
      attribute-set: dir
      do:
        request:
          attributes: [ id ]
    - name: changed
      notify: get
"#;
    let family = resolve(body).unwrap();
    let get = &family.msgs["get"];
    assert_eq!((get.req_value, get.rsp_value, get.value), (Some(2), Some(5), None));
    let set = &family.msgs["set"];
    assert_eq!((set.req_value, set.rsp_value), (Some(3), Some(6)));
    let changed = &family.msgs["changed"];
    assert_eq!((changed.req_value, changed.rsp_value), (None, Some(6)));
}

#[test]
fn test_notify_inherits_attr_set() {
    let body = r#"name: ntf
attribute-sets:
  - name: ntf
    attributes:
      - name: id
        type: u32
operations:
  list:
    - name: get
      attribute-set: ntf
      do:
        request:
          attributes: [ id ]
        reply:
          attributes: [ id ]
    - name: changed
      notify: get
"#;
    let family = resolve(body).unwrap();
    assert_eq!(family.msgs["changed"].attr_set.as_deref(), Some("ntf"));
    assert!(family.msgs["get"].has_ntf);
    assert_eq!(family.ops().count(), 1);
    assert_eq!(family.ntfs().map(|op| op.name.as_str()).collect::<Vec<_>>(), vec!["changed"]);
}

#[test]
fn test_event_gets_mocked_reply() {
    let body = r#"name: ev
attribute-sets:
  - name: ev
    attributes:
      - name: id
        type: u32
operations:
  list:
    - name: happened
      attribute-set: ev
      event:
        attributes: [ id ]
"#;
    let family = resolve(body).unwrap();
    let op = &family.msgs["happened"];
    assert!(op.is_async);
    assert_eq!(op.reply_attrs(OpModeKind::Event), Some(&["id".to_string()][..]));
    assert!(family.root_sets["ev"].reply.contains("id"));
}

#[test]
fn test_hooks_collected_once() {
    let body = r#"name: hk
attribute-sets:
  - name: hk
    attributes:
      - name: id
        type: u32
operations:
  list:
    - name: get
      attribute-set: hk
      do:
        pre: hk-lock
        post: hk-unlock
        request:
          attributes: [ id ]
    - name: set
      attribute-set: hk
      do:
        pre: hk-lock
        request:
          attributes: [ id ]
      dump:
        pre: hk-dump-start
        reply:
          attributes: [ id ]
"#;
    let family = resolve(body).unwrap();
    assert_eq!(family.hooks.pre.do_, vec!["hk-lock"]);
    assert_eq!(family.hooks.post.do_, vec!["hk-unlock"]);
    assert_eq!(family.hooks.pre.dump, vec!["hk-dump-start"]);
    assert!(family.hooks.post.dump.is_empty());
}

#[test]
fn test_subset_shares_numbering() {
    let body = r#"name: sub
attribute-sets:
  - name: dev
    attributes:
      - name: id
        type: u32
      - name: name
        type: string
  - name: dev-name
    subset-of: dev
    attributes:
      - name: name
"#;
    let family = resolve(body).unwrap();
    let subset = family.attr_set("dev-name").unwrap();
    assert_eq!(subset.attrs["name"].value, 2);
    assert_eq!(subset.attrs["name"].enum_name, "SUB_A_DEV_NAME");
    assert_eq!(subset.max_name, "SUB_A_DEV_MAX");
}

#[test]
fn test_nested_cycle_is_reported() {
    let body = r#"name: cyc
attribute-sets:
  - name: top
    attributes:
      - name: a
        type: nest
        nested-attributes: a
  - name: a
    attributes:
      - name: b
        type: nest
        nested-attributes: b
  - name: b
    attributes:
      - name: a
        type: nest
        nested-attributes: a
operations:
  list:
    - name: get
      attribute-set: top
      do:
        request:
          attributes: [ a ]
"#;
    let err = resolve(body).unwrap_err();
    assert!(matches!(err, GenError::NestedCycle(ref sets) if *sets == vec!["a", "b"]));
}

#[test]
fn test_root_and_nested_rejected() {
    let body = r#"name: rn
attribute-sets:
  - name: top
    attributes:
      - name: link
        type: nest
        nested-attributes: link
  - name: link
    attributes:
      - name: id
        type: u32
operations:
  list:
    - name: get
      attribute-set: top
      do:
        request:
          attributes: [ link ]
    - name: link-get
      attribute-set: link
      do:
        request:
          attributes: [ id ]
"#;
    let err = resolve(body).unwrap_err();
    assert!(matches!(err, GenError::RootAndNested(ref set) if set == "link"));
}

#[test]
fn test_inheritance_conflict_rejected() {
    let body = r#"name: inh
attribute-sets:
  - name: top
    attributes:
      - name: by-type
        type: nest-type-value
        nested-attributes: entry
        type-value: [ id ]
      - name: plain
        type: nest
        nested-attributes: entry
  - name: entry
    attributes:
      - name: val
        type: u32
operations:
  list:
    - name: get
      attribute-set: top
      do:
        reply:
          attributes: [ by-type, plain ]
"#;
    let err = resolve(body).unwrap_err();
    assert!(matches!(err, GenError::InheritanceConflict { ref set, .. } if set == "entry"));
}

#[test]
fn test_reference_errors() {
    let unknown_type = r#"name: bad
attribute-sets:
  - name: bad
    attributes:
      - name: huge
        type: u128
"#;
    assert!(matches!(
        resolve(unknown_type).unwrap_err(),
        GenError::UnknownAttrType { ref kind, .. } if kind == "u128"
    ));

    let unknown_enum = r#"name: bad
attribute-sets:
  - name: bad
    attributes:
      - name: mode
        type: u8
        enum: nothing
"#;
    assert!(matches!(resolve(unknown_enum).unwrap_err(), GenError::UnknownDefinition(_)));

    let const_as_enum = r#"name: bad
definitions:
  - name: width
    type: const
    value: 8
attribute-sets:
  - name: bad
    attributes:
      - name: mode
        type: u8
        enum: width
"#;
    assert!(matches!(resolve(const_as_enum).unwrap_err(), GenError::NotAnEnum(_)));

    let unknown_attr = r#"name: bad
attribute-sets:
  - name: bad
    attributes:
      - name: id
        type: u32
operations:
  list:
    - name: get
      attribute-set: bad
      do:
        request:
          attributes: [ missing ]
"#;
    assert!(matches!(
        resolve(unknown_attr).unwrap_err(),
        GenError::UnknownAttr { ref attr, .. } if attr == "missing"
    ));

    let no_set = r#"name: bad
operations:
  list:
    - name: get
      do:
        request:
          attributes: [ id ]
"#;
    assert!(matches!(resolve(no_set).unwrap_err(), GenError::OpWithoutAttrSet(_)));

    let bad_notify = r#"name: bad
operations:
  list:
    - name: changed
      notify: nowhere
"#;
    assert!(matches!(resolve(bad_notify).unwrap_err(), GenError::UnknownOperation(_)));
}

#[test]
fn test_protocol_and_license_checked() {
    assert!(matches!(
        resolve("name: raw\nprotocol: netlink-raw\n").unwrap_err(),
        GenError::UnsupportedProtocol(_)
    ));

    let spec = SpecFile::parse("# SPDX-License-Identifier: GPL-2.0\nname: lic\n").unwrap();
    assert!(matches!(spec.check_license().unwrap_err(), GenError::License { .. }));

    assert!(matches!(SpecFile::parse("name: lic\n").unwrap_err(), GenError::MissingLicense));
}
