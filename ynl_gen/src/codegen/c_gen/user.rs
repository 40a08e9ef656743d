/* User-space library rendering: types, setters, policies, parsers and
 * request/dump wrappers on top of libmnl. */

use super::attr::{
    emit_attr_get, emit_free, emit_put, emit_setter, emit_struct_member, emit_typol, free_needs_iter,
    presence_member,
};
use super::render_info::{Direction, RenderInfo, Space};
use super::writer::CodeWriter;
use crate::error::{GenError, GenResult};
use crate::spec::{Attr, AttrKind, EnumSet, Family, OpModeKind, Operation, Presence, ScalarType, Struct};

const FAMILY_ID: &str = "ys->family_id";

fn rsp_cmd(op: &Operation) -> String {
    match (op.value, op.rsp_value) {
        (Some(_), _) | (None, None) => op.enum_name.clone(),
        (None, Some(value)) => value.to_string(),
    }
}

fn print_prototype(
    ri: &RenderInfo,
    cw: &mut CodeWriter,
    direction: Direction,
    terminate: bool,
    doc: Option<&str>,
) -> GenResult<()> {
    let op = ri.operation()?;
    let mut fname = op.render_name.clone();
    if ri.op_mode_is(OpModeKind::Dump) {
        fname.push_str("_dump");
    }

    let mut args = vec!["struct ynl_sock *ys".to_string()];
    if ri.has_request() {
        args.push(format!("{} *{}", ri.type_name(direction, false), direction.free_arg_name()));
    }

    let ret = if ri.has_reply() {
        format!("{} *", ri.type_name(direction.rdir(), false))
    } else {
        "int".to_string()
    };

    cw.write_func_prot(&ret, &fname, &args, doc, if terminate { ";" } else { "" });
    Ok(())
}

fn put_typol(family: &Family, cw: &mut CodeWriter, st: &Struct) -> GenResult<()> {
    let type_max = &family.attr_set(&st.space_name)?.max_name;
    cw.block_start(&format!(
        "struct ynl_policy_attr {}_policy[{} + 1] =",
        st.render_name, type_max
    ));
    for attr in st.members(family) {
        emit_typol(attr, cw)?;
    }
    cw.block_end(";");
    cw.nl();

    cw.block_start(&format!("struct ynl_policy_nest {}_nest =", st.render_name));
    cw.p(&format!(".max_attr = {},", type_max));
    cw.p(&format!(".table = {}_policy,", st.render_name));
    cw.block_end(";");
    cw.nl();
    Ok(())
}

fn enum_str_args(arg_name: &str, enum_set: Option<&EnumSet>) -> Vec<String> {
    match enum_set.and_then(|e| e.enum_name.as_deref()) {
        Some(enum_name) => vec![format!("{} {}", enum_name, arg_name)],
        None => vec![format!("int {}", arg_name)],
    }
}

fn put_enum_to_str_helper(
    cw: &mut CodeWriter,
    render_name: &str,
    map_name: &str,
    arg_name: &str,
    enum_set: Option<&EnumSet>,
) {
    cw.write_func_prot(
        "const char *",
        &format!("{}_str", render_name),
        &enum_str_args(arg_name, enum_set),
        None,
        "",
    );
    cw.block_start("");
    /* flags are stored by bit index */
    if enum_set.is_some_and(|e| e.is_flags) {
        cw.p(&format!("{} = ffs({}) - 1;", arg_name, arg_name));
    }
    cw.p(&format!(
        "if ({} < 0 || {} >= (int)MNL_ARRAY_SIZE({}))",
        arg_name, arg_name, map_name
    ));
    cw.p("return NULL;");
    cw.p(&format!("return {}[{}];", map_name, arg_name));
    cw.block_end("");
    cw.nl();
}

fn put_op_name_fwd(family: &Family, cw: &mut CodeWriter) {
    cw.write_func_prot(
        "const char *",
        &format!("{}_op_str", family.name),
        &["int op".to_string()],
        None,
        ";",
    );
}

fn put_op_name(family: &Family, cw: &mut CodeWriter) {
    let map_name = format!("{}_op_strmap", family.name);
    cw.block_start(&format!("static const char * const {}[] =", map_name));
    for (op_name, op) in &family.msgs {
        let Some(rsp_value) = op.rsp_value else {
            continue;
        };
        if op.req_value == op.rsp_value {
            cw.p(&format!("[{}] = \"{}\",", op.enum_name, op_name));
        } else {
            cw.p(&format!("[{}] = \"{}\",", rsp_value, op_name));
        }
    }
    cw.block_end(";");
    cw.nl();

    put_enum_to_str_helper(cw, &format!("{}_op", family.name), &map_name, "op", None);
}

fn put_enum_to_str_fwd(cw: &mut CodeWriter, enum_set: &EnumSet) {
    cw.write_func_prot(
        "const char *",
        &format!("{}_str", enum_set.render_name),
        &enum_str_args("value", Some(enum_set)),
        None,
        ";",
    );
}

fn put_enum_to_str(cw: &mut CodeWriter, enum_set: &EnumSet) {
    let map_name = format!("{}_strmap", enum_set.render_name);
    cw.block_start(&format!("static const char * const {}[] =", map_name));
    for entry in enum_set.entries.values() {
        cw.p(&format!("[{}] = \"{}\",", entry.value, entry.name));
    }
    cw.block_end(";");
    cw.nl();

    put_enum_to_str_helper(cw, &enum_set.render_name, &map_name, "value", Some(enum_set));
}

fn put_req_nested(ri: &RenderInfo, cw: &mut CodeWriter, st: &Struct) -> GenResult<()> {
    let func_args = vec![
        "struct nlmsghdr *nlh".to_string(),
        "unsigned int attr_type".to_string(),
        format!("{}obj", st.ptr_name),
    ];

    cw.write_func_prot("int", &format!("{}_put", st.render_name), &func_args, None, "");
    cw.block_start("");
    cw.write_func_lvar(&["struct nlattr *nest;".to_string()]);

    cw.p("nest = mnl_attr_nest_start(nlh, attr_type);");
    for attr in st.members(ri.family) {
        emit_put(attr, cw, "obj")?;
    }
    cw.p("mnl_attr_nest_end(nlh, nest);");

    cw.nl();
    cw.p("return 0;");
    cw.block_end("");
    cw.nl();
    Ok(())
}

fn sorted_by_name<'a>(mut attrs: Vec<&'a Attr>) -> Vec<&'a Attr> {
    attrs.sort_by(|a, b| a.name.cmp(&b.name));
    attrs
}

/* Second pass over a repeated attribute, filling the counted array */
fn multi_fill(attr: &Attr, cw: &mut CodeWriter, iter_line: &str) -> GenResult<()> {
    let c_name = &attr.c_name;
    cw.block_start(&format!("if (n_{})", c_name));
    cw.p(&format!("dst->{} = calloc(n_{}, sizeof(*dst->{}));", c_name, c_name, c_name));
    cw.p(&format!("dst->n_{} = n_{};", c_name, c_name));
    cw.p("i = 0;");
    if attr.nested.is_some() {
        cw.p(&format!("parg.rsp_policy = &{}_nest;", attr.nested_render_name()?));
    }
    cw.block_start(iter_line);
    cw.block_start(&format!("if (mnl_attr_get_type(attr) == {})", attr.enum_name));
    match &attr.kind {
        AttrKind::Nest => {
            cw.p(&format!("parg.data = &dst->{}[i];", c_name));
            cw.p(&format!("if ({}_parse(&parg, attr))", attr.nested_render_name()?));
            cw.p("return MNL_CB_ERROR;");
        }
        AttrKind::Scalar(ty) => {
            cw.p(&format!("dst->{}[i] = mnl_attr_get_{}(attr);", c_name, ty.mnl_name()));
        }
        _ => return Err(attr.unsupported("multi-attr parsing")),
    }
    cw.p("i++;");
    cw.block_end("");
    cw.block_end("");
    cw.block_end("");
    Ok(())
}

/* Second pass over an array nest; entries get their index as `idx` */
fn array_nest_fill(attr: &Attr, cw: &mut CodeWriter) -> GenResult<()> {
    let c_name = &attr.c_name;
    cw.block_start(&format!("if (n_{})", c_name));
    cw.p(&format!("dst->{} = calloc(n_{}, sizeof(*dst->{}));", c_name, c_name, c_name));
    cw.p(&format!("dst->n_{} = n_{};", c_name, c_name));
    cw.p("i = 0;");
    let scalar = attr.sub_type.as_deref().and_then(ScalarType::parse);
    if scalar.is_none() {
        cw.p(&format!("parg.rsp_policy = &{}_nest;", attr.nested_render_name()?));
    }
    cw.block_start(&format!("mnl_attr_for_each_nested(attr, attr_{})", c_name));
    match scalar {
        Some(ty) => cw.p(&format!("dst->{}[i] = mnl_attr_get_{}(attr);", c_name, ty.mnl_name())),
        None => {
            let nested = attr.nested_render_name()?;
            cw.p(&format!("parg.data = &dst->{}[i];", c_name));
            cw.p(&format!("if ({}_parse(&parg, attr, mnl_attr_get_type(attr)))", nested));
            cw.p("return MNL_CB_ERROR;");
        }
    }
    cw.p("i++;");
    cw.block_end("");
    cw.block_end("");
    Ok(())
}

fn multi_parse(
    ri: &RenderInfo,
    cw: &mut CodeWriter,
    st: &Struct,
    mut init_lines: Vec<String>,
    mut local_vars: Vec<String>,
) -> GenResult<()> {
    let family = ri.family;
    let iter_line = if st.nested {
        "mnl_attr_for_each_nested(attr, nested)"
    } else {
        "mnl_attr_for_each(attr, nlh, sizeof(struct genlmsghdr))"
    };

    let members = st.members(family);
    let mut array_nests = Vec::new();
    let mut multi_attrs = Vec::new();
    let mut needs_parg = false;
    for attr in &members {
        if attr.multi_attr {
            multi_attrs.push(*attr);
        } else if attr.kind == AttrKind::ArrayNest {
            local_vars.push(format!("const struct nlattr *attr_{};", attr.c_name));
            array_nests.push(*attr);
        }
        needs_parg |= attr.nested.is_some();
    }
    if !array_nests.is_empty() || !multi_attrs.is_empty() {
        local_vars.push("int i;".to_string());
    }
    if needs_parg {
        local_vars.push("struct ynl_parse_arg parg;".to_string());
        init_lines.push("parg.ys = yarg->ys;".to_string());
    }

    let array_nests = sorted_by_name(array_nests);
    let multi_attrs = sorted_by_name(multi_attrs);
    let all_multi = sorted_by_name(array_nests.iter().chain(multi_attrs.iter()).copied().collect());
    for attr in &all_multi {
        local_vars.push(format!("unsigned int n_{} = 0;", attr.c_name));
    }

    cw.block_start("");
    cw.write_func_lvar(&local_vars);

    for line in &init_lines {
        cw.p(line);
    }
    cw.nl();

    for arg in &st.inherited {
        cw.p(&format!("dst->{} = {};", arg, arg));
    }

    for attr in &all_multi {
        cw.p(&format!("if (dst->{})", attr.c_name));
        cw.p(&format!(
            "return ynl_error_parse(yarg, \"attribute already present ({}.{})\");",
            st.space_name, attr.name
        ));
    }

    cw.nl();
    cw.block_start(iter_line);
    cw.p("unsigned int type = mnl_attr_get_type(attr);");
    cw.nl();

    let mut first = true;
    for attr in &members {
        /* pad entries print nothing, keep looking for the first branch */
        let good = emit_attr_get(attr, cw, "dst", first)?;
        first &= !good;
    }

    cw.block_end("");
    cw.nl();

    for attr in &array_nests {
        array_nest_fill(attr, cw)?;
    }
    cw.nl();

    for attr in &multi_attrs {
        multi_fill(attr, cw, iter_line)?;
    }
    cw.nl();

    if st.nested {
        cw.p("return 0;");
    } else {
        cw.p("return MNL_CB_OK;");
    }
    cw.block_end("");
    cw.nl();
    Ok(())
}

fn parse_rsp_nested(ri: &RenderInfo, cw: &mut CodeWriter, st: &Struct) -> GenResult<()> {
    let mut func_args = vec![
        "struct ynl_parse_arg *yarg".to_string(),
        "const struct nlattr *nested".to_string(),
    ];
    for arg in &st.inherited {
        func_args.push(format!("__u32 {}", arg));
    }

    let local_vars = vec![
        "const struct nlattr *attr;".to_string(),
        format!("{}dst = yarg->data;", st.ptr_name),
    ];

    cw.write_func_prot("int", &format!("{}_parse", st.render_name), &func_args, None, "");
    multi_parse(ri, cw, st, Vec::new(), local_vars)
}

fn parse_rsp_msg(ri: &RenderInfo, cw: &mut CodeWriter, deref: bool) -> GenResult<()> {
    let Some(reply) = &ri.reply else {
        return Ok(());
    };

    let func_args = vec!["const struct nlmsghdr *nlh".to_string(), "void *data".to_string()];
    let local_vars = vec![
        format!("{} *dst;", ri.type_name(Direction::Reply, deref)),
        "struct ynl_parse_arg *yarg = data;".to_string(),
        "const struct nlattr *attr;".to_string(),
    ];
    let init_lines = vec!["dst = yarg->data;".to_string()];

    cw.write_func_prot(
        "int",
        &format!("{}_parse", ri.op_prefix(Direction::Reply, deref)),
        &func_args,
        None,
        "",
    );

    if reply.attr_list.is_empty() {
        cw.block_start("");
        cw.p("return MNL_CB_OK;");
        cw.block_end("");
        cw.nl();
        return Ok(());
    }
    multi_parse(ri, cw, reply, init_lines, local_vars)
}

fn call_free(ri: &RenderInfo, direction: Direction, var: &str) -> String {
    format!("{}_free({});", ri.op_prefix(direction, false), var)
}

fn print_req(ri: &RenderInfo, cw: &mut CodeWriter) -> GenResult<()> {
    let op = ri.operation()?;
    let direction = Direction::Request;
    let mut local_vars = vec!["struct nlmsghdr *nlh;".to_string(), "int err;".to_string()];

    let (ret_ok, ret_err) = if ri.has_reply() {
        local_vars.push(format!("{} *rsp;", ri.type_name(direction.rdir(), false)));
        local_vars.push("struct ynl_req_state yrs = { .yarg = { .ys = ys, }, };".to_string());
        ("rsp", "NULL")
    } else {
        ("0", "-1")
    };

    print_prototype(ri, cw, direction, false, None)?;
    cw.block_start("");
    cw.write_func_lvar(&local_vars);

    cw.p(&format!(
        "nlh = ynl_gemsg_start_req(ys, {}, {}, 1);",
        FAMILY_ID, op.enum_name
    ));

    if let Some(request) = &ri.request {
        cw.p(&format!("ys->req_policy = &{}_nest;", request.render_name));
    }
    if let Some(reply) = &ri.reply {
        cw.p(&format!("yrs.yarg.rsp_policy = &{}_nest;", reply.render_name));
    }
    cw.nl();
    if let Some(request) = &ri.request {
        for attr in request.members(ri.family) {
            emit_put(attr, cw, "req")?;
        }
    }
    cw.nl();

    let mut parse_arg = "NULL";
    if ri.has_reply() {
        cw.p("rsp = calloc(1, sizeof(*rsp));");
        cw.p("yrs.yarg.data = rsp;");
        cw.p(&format!("yrs.cb = {}_parse;", ri.op_prefix(Direction::Reply, false)));
        cw.p(&format!("yrs.rsp_cmd = {};", rsp_cmd(op)));
        cw.nl();
        parse_arg = "&yrs";
    }
    cw.p(&format!("err = ynl_exec(ys, nlh, {});", parse_arg));
    cw.p("if (err < 0)");
    if ri.has_reply() {
        cw.p("goto err_free;");
    } else {
        cw.p("return -1;");
    }
    cw.nl();

    cw.p(&format!("return {};", ret_ok));
    cw.nl();

    if ri.has_reply() {
        cw.p("err_free:");
        cw.p(&call_free(ri, direction.rdir(), "rsp"));
        cw.p(&format!("return {};", ret_err));
    }

    cw.block_end("");
    Ok(())
}

fn print_dump(ri: &RenderInfo, cw: &mut CodeWriter) -> GenResult<()> {
    let op = ri.operation()?;
    let direction = Direction::Request;
    let reply = ri
        .reply
        .as_ref()
        .ok_or_else(|| GenError::DumpWithoutReply(op.name.clone()))?;

    print_prototype(ri, cw, direction, false, None)?;
    cw.block_start("");
    for var in ["struct ynl_dump_state yds = {};", "struct nlmsghdr *nlh;", "int err;"] {
        cw.p(var);
    }
    cw.nl();

    cw.p("yds.ys = ys;");
    cw.p(&format!("yds.alloc_sz = sizeof({});", ri.type_name(direction.rdir(), false)));
    cw.p(&format!("yds.cb = {}_parse;", ri.op_prefix(Direction::Reply, true)));
    cw.p(&format!("yds.rsp_cmd = {};", rsp_cmd(op)));
    cw.p(&format!("yds.rsp_policy = &{}_nest;", reply.render_name));
    cw.nl();
    cw.p(&format!(
        "nlh = ynl_gemsg_start_dump(ys, {}, {}, 1);",
        FAMILY_ID, op.enum_name
    ));

    if let Some(request) = &ri.request {
        cw.p(&format!("ys->req_policy = &{}_nest;", request.render_name));
        cw.nl();
        for attr in request.members(ri.family) {
            emit_put(attr, cw, "req")?;
        }
    }
    cw.nl();

    cw.p("err = ynl_exec_dump(ys, nlh, &yds);");
    cw.p("if (err < 0)");
    cw.p("goto free_list;");
    cw.nl();

    cw.p("return yds.first;");
    cw.nl();
    cw.p("free_list:");
    cw.p(&call_free(ri, direction.rdir(), "yds.first"));
    cw.p("return NULL;");
    cw.block_end("");
    Ok(())
}

fn print_alloc_wrapper(ri: &RenderInfo, cw: &mut CodeWriter, direction: Direction) {
    let name = ri.op_prefix(direction, false);
    cw.write_func_prot(
        &format!("static inline struct {} *", name),
        &format!("{}_alloc", name),
        &["void".to_string()],
        None,
        "",
    );
    cw.block_start("");
    cw.p(&format!("return calloc(1, sizeof(struct {}));", name));
    cw.block_end("");
}

fn print_free_prototype(ri: &RenderInfo, cw: &mut CodeWriter, direction: Direction, suffix: &str) {
    let name = ri.op_prefix(direction, false);
    let mut struct_name = name.clone();
    if ri.type_name_conflict {
        struct_name.push('_');
    }
    cw.write_func_prot(
        "void",
        &format!("{}_free", name),
        &[format!("struct {} *{}", struct_name, direction.free_arg_name())],
        None,
        suffix,
    );
}

fn print_type(ri: &RenderInfo, cw: &mut CodeWriter, direction: Direction, st: &Struct) -> GenResult<()> {
    let family = ri.family;
    let name = match direction {
        Direction::Base => st.struct_name.clone(),
        _ => ri.type_name(direction, true),
    };
    cw.block_start(&name);

    let members = st.members(family);
    let mut meta_started = false;
    for attr in &members {
        for filter in [Presence::Len, Presence::Bit] {
            if let Some(line) = presence_member(attr, ri.space, filter) {
                if !meta_started {
                    cw.block_start("struct");
                    meta_started = true;
                }
                cw.p(&line);
            }
        }
    }
    if meta_started {
        cw.block_end("_present;");
        cw.nl();
    }

    for arg in &st.inherited {
        cw.p(&format!("__u32 {};", arg));
    }

    for attr in &members {
        emit_struct_member(attr, ri, cw)?;
    }

    cw.block_end(";");
    cw.nl();
    Ok(())
}

fn print_type_helpers(ri: &RenderInfo, cw: &mut CodeWriter, direction: Direction, deref: bool) -> GenResult<()> {
    print_free_prototype(ri, cw, direction, ";");
    cw.nl();

    if ri.space == Space::User && direction == Direction::Request {
        if let Some(request) = &ri.request {
            for attr in request.members(ri.family) {
                emit_setter(attr, ri, cw, direction, deref, &[])?;
            }
        }
    }
    cw.nl();
    Ok(())
}

fn print_req_type(ri: &RenderInfo, cw: &mut CodeWriter) -> GenResult<()> {
    let Some(request) = &ri.request else {
        return Ok(());
    };
    print_type(ri, cw, Direction::Request, request)?;
    print_alloc_wrapper(ri, cw, Direction::Request);
    print_type_helpers(ri, cw, Direction::Request, false)
}

fn print_rsp_type(ri: &RenderInfo, cw: &mut CodeWriter) -> GenResult<()> {
    let Some(reply) = &ri.reply else {
        return Ok(());
    };
    if ri.op_mode_is(OpModeKind::Notify) {
        return Ok(());
    }
    print_type(ri, cw, Direction::Reply, reply)
}

fn print_wrapped_type(ri: &RenderInfo, cw: &mut CodeWriter) {
    let reply_type = ri.type_name(Direction::Reply, false);
    cw.block_start(&reply_type);
    match ri.op_mode {
        Some(OpModeKind::Dump) => cw.p(&format!("{} *next;", reply_type)),
        Some(OpModeKind::Notify) | Some(OpModeKind::Event) => {
            cw.p("__u16 family;");
            cw.p("__u8 cmd;");
            cw.p("struct ynl_ntf_base_type *next;");
            cw.p(&format!("void (*free)({} *ntf);", reply_type));
        }
        _ => {}
    }
    cw.p(&format!(
        "{} obj __attribute__ ((aligned (8)));",
        ri.type_name(Direction::Reply, true)
    ));
    cw.block_end(";");
    cw.nl();
    print_free_prototype(ri, cw, Direction::Reply, ";");
    cw.nl();
}

fn free_type_members_iter(family: &Family, cw: &mut CodeWriter, st: &Struct) {
    if st.members(family).into_iter().any(free_needs_iter) {
        cw.p("unsigned int i;");
        cw.nl();
    }
}

fn free_type_members(family: &Family, cw: &mut CodeWriter, var: &str, st: &Struct, ref_: &str) -> GenResult<()> {
    for attr in st.members(family) {
        emit_free(attr, cw, var, ref_)?;
    }
    Ok(())
}

fn free_type(ri: &RenderInfo, cw: &mut CodeWriter, direction: Direction, st: &Struct) -> GenResult<()> {
    let var = direction.free_arg_name();

    print_free_prototype(ri, cw, direction, "");
    cw.block_start("");
    free_type_members_iter(ri.family, cw, st);
    free_type_members(ri.family, cw, var, st, "")?;
    if direction != Direction::Base {
        cw.p(&format!("free({});", var));
    }
    cw.block_end("");
    cw.nl();
    Ok(())
}

fn print_dump_type_free(ri: &RenderInfo, cw: &mut CodeWriter) -> GenResult<()> {
    let Some(reply) = &ri.reply else {
        return Ok(());
    };
    let sub_type = ri.type_name(Direction::Reply, false);

    print_free_prototype(ri, cw, Direction::Reply, "");
    cw.block_start("");
    cw.p(&format!("{} *next = rsp;", sub_type));
    cw.nl();
    cw.block_start("while ((void *)next != YNL_LIST_END)");
    free_type_members_iter(ri.family, cw, reply);
    cw.p("rsp = next;");
    cw.p("next = rsp->next;");
    cw.nl();

    free_type_members(ri.family, cw, "rsp", reply, "obj.")?;
    cw.p("free(rsp);");
    cw.block_end("");
    cw.block_end("");
    cw.nl();
    Ok(())
}

fn print_ntf_type_free(ri: &RenderInfo, cw: &mut CodeWriter) -> GenResult<()> {
    let Some(reply) = &ri.reply else {
        return Ok(());
    };
    print_free_prototype(ri, cw, Direction::Reply, "");
    cw.block_start("");
    free_type_members_iter(ri.family, cw, reply);
    free_type_members(ri.family, cw, "rsp", reply, "obj.")?;
    cw.p("free(rsp);");
    cw.block_end("");
    cw.nl();
    Ok(())
}

fn notify_info<'f>(family: &'f Family, op: &'f Operation) -> GenResult<RenderInfo<'f>> {
    let ri = RenderInfo::for_op(family, Space::User, op, OpModeKind::Notify)?;
    if !ri.type_consistent {
        return Err(GenError::InconsistentNotification(op.name.clone()));
    }
    Ok(ri)
}

fn render_user_ntf_entry(ri: &RenderInfo, cw: &mut CodeWriter, op: &Operation) -> GenResult<()> {
    let reply = ri
        .reply
        .as_ref()
        .ok_or_else(|| GenError::InconsistentNotification(op.name.clone()))?;
    cw.block_start(&format!("[{}] =", op.enum_name));
    cw.p(&format!(".alloc_sz\t= sizeof({}),", ri.type_name(Direction::Reply, false)));
    cw.p(&format!(".cb\t\t= {}_parse,", ri.op_prefix(Direction::Reply, true)));
    cw.p(&format!(".policy\t\t= &{}_nest,", reply.render_name));
    cw.p(&format!(".free\t\t= (void *){}_free,", ri.op_prefix(Direction::Reply, false)));
    cw.block_end(",");
    Ok(())
}

/// The `ynl_family` descriptor, or its `extern` declaration.
pub fn render_user_family(family: &Family, cw: &mut CodeWriter, prototype: bool) -> GenResult<()> {
    let symbol = format!("const struct ynl_family ynl_{}_family", family.c_name);
    if prototype {
        cw.p(&format!("extern {};", symbol));
        return Ok(());
    }

    let has_ntfs = family.ntfs().next().is_some();
    if has_ntfs {
        cw.block_start(&format!("static const struct ynl_ntf_info {}_ntf_info[] =", family.name));
        for ntf in family.ntfs() {
            let ri = match &ntf.notify {
                Some(target) => notify_info(family, family.op(target)?)?,
                None => RenderInfo::for_op(family, Space::User, ntf, OpModeKind::Event)?,
            };
            render_user_ntf_entry(&ri, cw, ntf)?;
        }
        cw.block_end(";");
        cw.nl();
    }

    cw.block_start(&format!("{} =", symbol));
    cw.p(&format!(".name\t\t= \"{}\",", family.name));
    if has_ntfs {
        cw.p(&format!(".ntf_info\t= {}_ntf_info,", family.name));
        cw.p(&format!(".ntf_info_size\t= MNL_ARRAY_SIZE({}_ntf_info),", family.name));
    }
    cw.block_end(";");
    Ok(())
}

pub fn render_user_header(family: &Family, cw: &mut CodeWriter) -> GenResult<()> {
    cw.p("/* Enums */");
    put_op_name_fwd(family, cw);
    for enum_set in family.enum_sets() {
        put_enum_to_str_fwd(cw, enum_set);
    }
    cw.nl();

    cw.p("/* Common nested types */");
    for (attr_set, st) in &family.pure_nested_structs {
        let ri = RenderInfo::for_set(family, Space::User, attr_set);
        print_type(&ri, cw, Direction::Base, st)?;
    }

    for op in family.ops() {
        cw.p(&format!("/* ============== {} ============== */", op.enum_name));

        if op.do_.is_some() && op.event.is_none() {
            cw.p(&format!("/* {} - do */", op.enum_name));
            let ri = RenderInfo::for_op(family, Space::User, op, OpModeKind::Do)?;
            print_req_type(&ri, cw)?;
            cw.nl();
            print_rsp_type(&ri, cw)?;
            if ri.has_reply() {
                print_type_helpers(&ri, cw, Direction::Reply, false)?;
            }
            cw.nl();
            print_prototype(&ri, cw, Direction::Request, true, op.doc.as_deref())?;
            cw.nl();
        }

        if op.dump.is_some() {
            cw.p(&format!("/* {} - dump */", op.enum_name));
            let ri = RenderInfo::for_op(family, Space::User, op, OpModeKind::Dump)?;
            print_req_type(&ri, cw)?;
            if !ri.type_consistent {
                print_rsp_type(&ri, cw)?;
            }
            print_wrapped_type(&ri, cw);
            print_prototype(&ri, cw, Direction::Request, true, None)?;
            cw.nl();
        }

        if op.has_ntf {
            cw.p(&format!("/* {} - notify */", op.enum_name));
            let ri = notify_info(family, op)?;
            print_wrapped_type(&ri, cw);
        }
    }

    for op in family.ntfs() {
        if op.event.is_none() {
            continue;
        }
        let ri = RenderInfo::for_op(family, Space::User, op, OpModeKind::Event)?;
        cw.p(&format!("/* {} - event */", op.enum_name));
        print_rsp_type(&ri, cw)?;
        cw.nl();
        print_wrapped_type(&ri, cw);
    }
    cw.nl();
    Ok(())
}

pub fn render_user_source(family: &Family, cw: &mut CodeWriter) -> GenResult<()> {
    cw.p("/* Enums */");
    put_op_name(family, cw);
    for enum_set in family.enum_sets() {
        put_enum_to_str(cw, enum_set);
    }
    cw.nl();

    cw.p("/* Policies */");
    for name in family.pure_nested_structs.keys().chain(family.root_sets.keys()) {
        let st = Struct::new(family, name, None)?;
        put_typol(family, cw, &st)?;
    }

    cw.p("/* Common nested types */");
    for (attr_set, st) in &family.pure_nested_structs {
        let ri = RenderInfo::for_set(family, Space::User, attr_set);
        free_type(&ri, cw, Direction::Base, st)?;
        if st.request {
            put_req_nested(&ri, cw, st)?;
        }
        if st.reply {
            parse_rsp_nested(&ri, cw, st)?;
        }
    }

    for op in family.ops() {
        cw.p(&format!("/* ============== {} ============== */", op.enum_name));
        if op.do_.is_some() && op.event.is_none() {
            cw.p(&format!("/* {} - do */", op.enum_name));
            let ri = RenderInfo::for_op(family, Space::User, op, OpModeKind::Do)?;
            if let Some(request) = &ri.request {
                free_type(&ri, cw, Direction::Request, request)?;
            }
            if let Some(reply) = &ri.reply {
                free_type(&ri, cw, Direction::Reply, reply)?;
            }
            parse_rsp_msg(&ri, cw, false)?;
            print_req(&ri, cw)?;
            cw.nl();
        }

        if op.dump.is_some() {
            cw.p(&format!("/* {} - dump */", op.enum_name));
            let ri = RenderInfo::for_op(family, Space::User, op, OpModeKind::Dump)?;
            if !ri.type_consistent {
                parse_rsp_msg(&ri, cw, true)?;
            }
            print_dump_type_free(&ri, cw)?;
            print_dump(&ri, cw)?;
            cw.nl();
        }

        if op.has_ntf {
            cw.p(&format!("/* {} - notify */", op.enum_name));
            let ri = notify_info(family, op)?;
            print_ntf_type_free(&ri, cw)?;
        }
    }

    for op in family.ntfs() {
        if op.event.is_none() {
            continue;
        }
        cw.p(&format!("/* {} - event */", op.enum_name));

        let ri = RenderInfo::for_op(family, Space::User, op, OpModeKind::Do)?;
        parse_rsp_msg(&ri, cw, false)?;

        let ri = RenderInfo::for_op(family, Space::User, op, OpModeKind::Event)?;
        print_ntf_type_free(&ri, cw)?;
    }
    cw.nl();
    render_user_family(family, cw, false)
}
