/* Per-attribute emission: struct members, free, policies, put, parse
 * and setters. Every entry point dispatches on the attribute kind. */

use super::render_info::{Direction, RenderInfo, Space};
use super::writer::CodeWriter;
use crate::error::GenResult;
use crate::spec::naming::c_lower;
use crate::spec::{Attr, AttrKind, Const, Presence, ScalarType, WirePolicy};
use indexmap::IndexMap;

fn space_pfx(space: Space) -> &'static str {
    match space {
        Space::User => "__",
        Space::Kernel => "",
    }
}

fn byte_order_comment(attr: &Attr) -> String {
    match &attr.byte_order {
        Some(order) => format!(" /* {} */", order),
        None => String::new(),
    }
}

/// Member of the `_present` struct, if the presence kind matches.
pub fn presence_member(attr: &Attr, space: Space, filter: Presence) -> Option<String> {
    if attr.presence() != filter {
        return None;
    }
    let pfx = space_pfx(space);
    match filter {
        Presence::Bit => Some(format!("{}u32 {}:1;", pfx, attr.c_name)),
        Presence::Len => Some(format!("{}u32 {}_len;", pfx, attr.c_name)),
        Presence::None | Presence::Count => None,
    }
}

/* Element type for attributes stored behind a pointer */
fn complex_member_type(attr: &Attr, space: Space) -> GenResult<Option<String>> {
    if attr.multi_attr {
        return match &attr.kind {
            AttrKind::Nest => Ok(Some(attr.nested_struct_type()?.to_string())),
            AttrKind::Scalar(ty) => Ok(Some(format!("{}{}", space_pfx(space), ty.name()))),
            _ => Err(attr.unsupported("multi-attr sub-type")),
        };
    }
    match &attr.kind {
        AttrKind::Nest | AttrKind::NestTypeValue => Ok(Some(attr.nested_struct_type()?.to_string())),
        AttrKind::ArrayNest => match attr.sub_type.as_deref() {
            None | Some("nest") => Ok(Some(attr.nested_struct_type()?.to_string())),
            Some(sub) => match ScalarType::parse(sub) {
                Some(ty) => Ok(Some(format!("{}{}", space_pfx(space), ty.name()))),
                None => Err(attr.unsupported("array-nest sub-type")),
            },
        },
        _ => Ok(None),
    }
}

/// Function arguments a setter or request constructor takes for this
/// attribute.
pub fn arg_member(attr: &Attr, space: Space) -> GenResult<Vec<String>> {
    if !attr.multi_attr {
        match &attr.kind {
            AttrKind::Pad | AttrKind::Unused | AttrKind::Flag => return Ok(Vec::new()),
            AttrKind::Scalar(_) => {
                return Ok(vec![format!(
                    "{} {}{}",
                    attr.type_name,
                    attr.c_name,
                    byte_order_comment(attr)
                )]);
            }
            AttrKind::String => return Ok(vec![format!("const char *{}", attr.c_name)]),
            AttrKind::Binary => {
                return Ok(vec![format!("const void *{}", attr.c_name), "size_t len".to_string()]);
            }
            _ => {}
        }
    }

    let member = complex_member_type(attr, space)?.ok_or_else(|| attr.unsupported("struct member"))?;
    let mut args = vec![format!("{} *{}", member, attr.c_name)];
    if attr.presence() == Presence::Count {
        args.push(format!("unsigned int n_{}", attr.c_name));
    }
    Ok(args)
}

pub fn emit_struct_member(attr: &Attr, ri: &RenderInfo, cw: &mut CodeWriter) -> GenResult<()> {
    if !attr.multi_attr {
        match &attr.kind {
            AttrKind::String => {
                cw.p(&format!("char *{};", attr.c_name));
                return Ok(());
            }
            AttrKind::Binary => {
                cw.p(&format!("void *{};", attr.c_name));
                return Ok(());
            }
            _ => {}
        }
    }

    if attr.is_multi_val() {
        cw.p(&format!("unsigned int n_{};", attr.c_name));
    }
    if let Some(member) = complex_member_type(attr, ri.space)? {
        let ptr = if attr.is_multi_val() { "*" } else { "" };
        cw.p(&format!("{} {}{};", member, ptr, attr.c_name));
        return Ok(());
    }
    for arg in arg_member(attr, ri.space)? {
        cw.p(&format!("{};", arg));
    }
    Ok(())
}

fn nested_elems(attr: &Attr) -> bool {
    if attr.multi_attr {
        return attr.kind == AttrKind::Nest;
    }
    attr.kind == AttrKind::ArrayNest && matches!(attr.sub_type.as_deref(), None | Some("nest"))
}

/// Whether freeing this member needs a loop counter.
pub fn free_needs_iter(attr: &Attr) -> bool {
    nested_elems(attr)
}

pub fn emit_free(attr: &Attr, cw: &mut CodeWriter, var: &str, ref_: &str) -> GenResult<()> {
    let c_name = &attr.c_name;
    if nested_elems(attr) {
        cw.p(&format!("for (i = 0; i < {}->{}n_{}; i++)", var, ref_, c_name));
        cw.p(&format!(
            "{}_free(&{}->{}{}[i]);",
            attr.nested_render_name()?,
            var,
            ref_,
            c_name
        ));
        cw.p(&format!("free({}->{}{});", var, ref_, c_name));
        return Ok(());
    }
    if attr.is_multi_val() {
        cw.p(&format!("free({}->{}{});", var, ref_, c_name));
        return Ok(());
    }
    match &attr.kind {
        AttrKind::Nest | AttrKind::NestTypeValue => {
            cw.p(&format!("{}_free(&{}->{}{});", attr.nested_render_name()?, var, ref_, c_name));
        }
        AttrKind::String | AttrKind::Binary => {
            cw.p(&format!("free({}->{}{});", var, ref_, c_name));
        }
        _ => {}
    }
    Ok(())
}

fn nla_type(kind: &AttrKind) -> String {
    format!("NLA_{}", kind.name().to_uppercase())
}

/// Kernel `nla_policy` initializer.
pub fn policy_initializer(policy: &WirePolicy) -> String {
    match policy {
        WirePolicy::Plain(kind) => format!("{{ .type = {}, }}", nla_type(kind)),
        WirePolicy::Mask { ty, mask } => {
            format!("NLA_POLICY_MASK({}, 0x{:x})", nla_type(&AttrKind::Scalar(*ty)), mask)
        }
        WirePolicy::Min { ty, min } => format!("NLA_POLICY_MIN({}, {})", nla_type(&AttrKind::Scalar(*ty)), min),
        WirePolicy::Max { ty, max } => format!("NLA_POLICY_MAX({}, {})", nla_type(&AttrKind::Scalar(*ty)), max),
        WirePolicy::Range { ty, low, high } => {
            format!("NLA_POLICY_RANGE({}, {}, {})", nla_type(&AttrKind::Scalar(*ty)), low, high)
        }
        WirePolicy::String { terminated, max_len } => {
            let ty = if *terminated { "NLA_NUL_STRING" } else { "NLA_STRING" };
            match max_len {
                Some(len) => format!("{{ .type = {}, .len = {}, }}", ty, len),
                None => format!("{{ .type = {}, }}", ty),
            }
        }
        WirePolicy::MinLen(len) => format!("{{ .len = {}, }}", len),
        WirePolicy::Nested(name) => format!("NLA_POLICY_NESTED({}_nl_policy)", name),
        WirePolicy::NestedArray(name) => format!("NLA_POLICY_NESTED_ARRAY({}_nl_policy)", name),
    }
}

pub fn emit_policy(attr: &Attr, consts: &IndexMap<String, Const>, cw: &mut CodeWriter) -> GenResult<()> {
    if let Some(policy) = attr.wire_policy(consts)? {
        cw.p(&format!("\t[{}] = {},", attr.enum_name, policy_initializer(&policy)));
    }
    Ok(())
}

fn typol(attr: &Attr) -> GenResult<String> {
    Ok(match &attr.kind {
        AttrKind::Scalar(ty) => format!(".type = YNL_PT_U{}, ", ty.bits()),
        AttrKind::Flag => ".type = YNL_PT_FLAG, ".to_string(),
        AttrKind::String => ".type = YNL_PT_NUL_STR, ".to_string(),
        AttrKind::Binary => ".type = YNL_PT_BINARY, ".to_string(),
        AttrKind::Nest | AttrKind::ArrayNest | AttrKind::NestTypeValue => {
            format!(".type = YNL_PT_NEST, .nest = &{}_nest, ", attr.nested_render_name()?)
        }
        AttrKind::Pad => ".type = YNL_PT_IGNORE, ".to_string(),
        AttrKind::Unused => ".type = YNL_PT_REJECT, ".to_string(),
    })
}

/// Entry of the user-space parse policy table.
pub fn emit_typol(attr: &Attr, cw: &mut CodeWriter) -> GenResult<()> {
    cw.p(&format!(
        "[{}] = {{ .name = \"{}\", {}}},",
        attr.enum_name,
        attr.name,
        typol(attr)?
    ));
    Ok(())
}

fn put_line(attr: &Attr, cw: &mut CodeWriter, var: &str, line: &str) {
    match attr.presence() {
        Presence::Bit => cw.p(&format!("if ({}->_present.{})", var, attr.c_name)),
        Presence::Len => cw.p(&format!("if ({}->_present.{}_len)", var, attr.c_name)),
        Presence::None | Presence::Count => {}
    }
    cw.p(&format!("{};", line));
}

pub fn emit_put(attr: &Attr, cw: &mut CodeWriter, var: &str) -> GenResult<()> {
    let c_name = &attr.c_name;
    let enum_name = &attr.enum_name;

    if attr.multi_attr {
        let line = match &attr.kind {
            AttrKind::Scalar(ty) => {
                format!("mnl_attr_put_{}(nlh, {}, {}->{}[i]);", ty.mnl_name(), enum_name, var, c_name)
            }
            AttrKind::Nest => {
                format!("{}_put(nlh, {}, &{}->{}[i]);", attr.nested_render_name()?, enum_name, var, c_name)
            }
            _ => return Err(attr.unsupported("put")),
        };
        cw.p(&format!("for (unsigned int i = 0; i < {}->n_{}; i++)", var, c_name));
        cw.p(&line);
        return Ok(());
    }

    match &attr.kind {
        AttrKind::Pad => {}
        AttrKind::Unused | AttrKind::ArrayNest | AttrKind::NestTypeValue => return Err(attr.unsupported("put")),
        AttrKind::Scalar(ty) => {
            let line = format!("mnl_attr_put_{}(nlh, {}, {}->{})", ty.mnl_name(), enum_name, var, c_name);
            put_line(attr, cw, var, &line);
        }
        AttrKind::Flag => put_line(attr, cw, var, &format!("mnl_attr_put(nlh, {}, 0, NULL)", enum_name)),
        AttrKind::String => {
            let line = format!("mnl_attr_put_strz(nlh, {}, {}->{})", enum_name, var, c_name);
            put_line(attr, cw, var, &line);
        }
        AttrKind::Binary => {
            let line = format!(
                "mnl_attr_put(nlh, {}, {}->_present.{}_len, {}->{})",
                enum_name, var, c_name, var, c_name
            );
            put_line(attr, cw, var, &line);
        }
        AttrKind::Nest => {
            let line = format!("{}_put(nlh, {}, &{}->{})", attr.nested_render_name()?, enum_name, var, c_name);
            put_line(attr, cw, var, &line);
        }
    }
    Ok(())
}

/* Parse body pieces: (lines, init_lines, local_vars) */
type GetParts = (Vec<String>, Vec<String>, Vec<String>);

fn get_parts(attr: &Attr, var: &str) -> GenResult<GetParts> {
    let c_name = &attr.c_name;

    if attr.multi_attr {
        return Ok((vec![format!("n_{}++;", c_name)], Vec::new(), Vec::new()));
    }

    Ok(match &attr.kind {
        AttrKind::Unused => (vec!["return MNL_CB_ERROR;".to_string()], Vec::new(), Vec::new()),
        AttrKind::Pad | AttrKind::Flag => (Vec::new(), Vec::new(), Vec::new()),
        AttrKind::Scalar(ty) => (
            vec![format!("{}->{} = mnl_attr_get_{}(attr);", var, c_name, ty.mnl_name())],
            Vec::new(),
            Vec::new(),
        ),
        AttrKind::String => (
            vec![
                format!("{}->_present.{}_len = len;", var, c_name),
                format!("{}->{} = malloc(len + 1);", var, c_name),
                format!("memcpy({}->{}, mnl_attr_get_str(attr), len);", var, c_name),
                format!("{}->{}[len] = 0;", var, c_name),
            ],
            vec!["len = strnlen(mnl_attr_get_str(attr), mnl_attr_get_payload_len(attr));".to_string()],
            vec!["unsigned int len;".to_string()],
        ),
        AttrKind::Binary => (
            vec![
                format!("{}->_present.{}_len = len;", var, c_name),
                format!("{}->{} = malloc(len);", var, c_name),
                format!("memcpy({}->{}, mnl_attr_get_payload(attr), len);", var, c_name),
            ],
            vec!["len = mnl_attr_get_payload_len(attr);".to_string()],
            vec!["unsigned int len;".to_string()],
        ),
        AttrKind::Nest => {
            let nested = attr.nested_render_name()?;
            (
                vec![
                    format!("if ({}_parse(&parg, attr))", nested),
                    "return MNL_CB_ERROR;".to_string(),
                ],
                vec![
                    format!("parg.rsp_policy = &{}_nest;", nested),
                    format!("parg.data = &{}->{};", var, c_name),
                ],
                Vec::new(),
            )
        }
        AttrKind::ArrayNest => (
            vec![
                format!("attr_{} = attr;", c_name),
                "mnl_attr_for_each_nested(attr2, attr)".to_string(),
                format!("\tn_{}++;", c_name),
            ],
            Vec::new(),
            vec!["const struct nlattr *attr2;".to_string()],
        ),
        AttrKind::NestTypeValue => {
            let nested = attr.nested_render_name()?;
            let mut lines = Vec::new();
            let mut prev = "attr".to_string();
            let mut tv_names = Vec::new();
            for level in &attr.type_value {
                let level = c_lower(level);
                lines.push(format!("attr_{} = mnl_attr_get_payload({});", level, prev));
                lines.push(format!("{} = mnl_attr_get_type(attr_{});", level, level));
                prev = format!("attr_{}", level);
                tv_names.push(level);
            }
            lines.push(format!("if ({}_parse(&parg, {}, {}))", nested, prev, tv_names.join(", ")));
            lines.push("return MNL_CB_ERROR;".to_string());

            let mut local_vars = Vec::new();
            if !tv_names.is_empty() {
                let attrs: Vec<String> = tv_names.iter().map(|n| format!("*attr_{}", n)).collect();
                local_vars.push(format!("const struct nlattr {};", attrs.join(", ")));
                local_vars.push(format!("__u32 {};", tv_names.join(", ")));
            }
            (
                lines,
                vec![
                    format!("parg.rsp_policy = &{}_nest;", nested),
                    format!("parg.data = &{}->{};", var, c_name),
                ],
                local_vars,
            )
        }
    })
}

/// One branch of the attribute dispatch in a parse function. Returns
/// whether anything was printed, so the caller knows if the next branch
/// starts with `else`.
pub fn emit_attr_get(attr: &Attr, cw: &mut CodeWriter, var: &str, first: bool) -> GenResult<bool> {
    if attr.kind == AttrKind::Pad && !attr.multi_attr {
        return Ok(false);
    }
    let (lines, init_lines, local_vars) = get_parts(attr, var)?;

    let kw = if first { "if" } else { "else if" };
    cw.block_start(&format!("{} (type == {})", kw, attr.enum_name));
    if !local_vars.is_empty() {
        for local in &local_vars {
            cw.p(local);
        }
        cw.nl();
    }

    if !attr.is_multi_val() {
        cw.p("if (ynl_attr_validate(yarg, attr))");
        cw.p("return MNL_CB_ERROR;");
        if attr.presence() == Presence::Bit {
            cw.p(&format!("{}->_present.{} = 1;", var, attr.c_name));
        }
    }

    if !init_lines.is_empty() {
        cw.nl();
        for line in &init_lines {
            cw.p(line);
        }
    }

    for line in &lines {
        cw.p(line);
    }
    cw.block_end("");
    Ok(true)
}

fn setter_lines(attr: &Attr, member: &str, presence: &str) -> GenResult<Vec<String>> {
    let c_name = &attr.c_name;

    if attr.multi_attr {
        let count = match presence.strip_suffix(&format!("_present.{}", c_name)) {
            Some(base) => format!("{}n_{}", base, c_name),
            None => format!("n_{}", c_name),
        };
        return Ok(vec![
            format!("free({});", member),
            format!("{} = {};", member, c_name),
            format!("{} = n_{};", count, c_name),
        ]);
    }

    Ok(match &attr.kind {
        AttrKind::Scalar(_) => vec![format!("{} = {};", member, c_name)],
        AttrKind::Flag | AttrKind::Pad => Vec::new(),
        AttrKind::String => vec![
            format!("free({});", member),
            format!("{}_len = strlen({});", presence, c_name),
            format!("{} = malloc({}_len + 1);", member, presence),
            format!("memcpy({}, {}, {}_len);", member, c_name, presence),
            format!("{}[{}_len] = 0;", member, presence),
        ],
        AttrKind::Binary => vec![
            format!("free({});", member),
            format!("{}_len = len;", presence),
            format!("{} = malloc({}_len);", member, presence),
            format!("memcpy({}, {}, {}_len);", member, c_name, presence),
        ],
        AttrKind::Unused | AttrKind::ArrayNest | AttrKind::NestTypeValue | AttrKind::Nest => {
            return Err(attr.unsupported("setter"));
        }
    })
}

/// Setter helper for a request member. Nests recurse into the members
/// of the nested struct with `ref_` tracking the path.
pub fn emit_setter(
    attr: &Attr,
    ri: &RenderInfo,
    cw: &mut CodeWriter,
    direction: Direction,
    deref: bool,
    ref_: &[String],
) -> GenResult<()> {
    if attr.kind == AttrKind::Pad && !attr.multi_attr {
        return Ok(());
    }

    let mut path = ref_.to_vec();
    path.push(attr.c_name.clone());

    if attr.kind == AttrKind::Nest && !attr.multi_attr {
        let nested_set = attr.nested_set().unwrap_or_default();
        let Some(nested) = ri.family.pure_nested_structs.get(nested_set) else {
            return Err(attr.unsupported("setter"));
        };
        for member in nested.members(ri.family) {
            emit_setter(member, ri, cw, direction, deref, &path)?;
        }
        return Ok(());
    }

    let var = "req";
    let member = format!("{}->{}", var, path.join("."));

    let mut code = Vec::new();
    let mut presence = String::new();
    for i in 0..path.len() {
        let mut prefix = path[..i].join(".");
        if !prefix.is_empty() {
            prefix.push('.');
        }
        presence = format!("{}->{}_present.{}", var, prefix, path[i]);
        /* Enclosing nests are always marked present */
        if i + 1 < path.len() || attr.presence() == Presence::Bit {
            code.push(format!("{} = 1;", presence));
        }
    }
    code.extend(setter_lines(attr, &member, &presence)?);

    let mut func_name = format!("{}_set_{}", ri.op_prefix(direction, deref), path.join("_"));
    let frees = code.iter().any(|line| line.contains("free("));
    let allocs = code.iter().any(|line| line.contains("alloc("));
    if frees && !allocs {
        func_name = format!("__{}", func_name);
    }

    let mut args = vec![format!("{} *{}", ri.type_name(direction, deref), var)];
    args.extend(arg_member(attr, ri.space)?);
    cw.write_func("static inline void", &func_name, &code, &args, &[]);
    Ok(())
}
