/* Kernel rendering: nla_policy tables, genl op tables, multicast groups
 * and the genl_family struct. */

use super::attr::emit_policy;
use super::render_info::{RenderInfo, Space};
use super::writer::CodeWriter;
use crate::error::{GenError, GenResult};
use crate::spec::naming::{c_lower, c_upper};
use crate::spec::{Family, OpModeKind, Struct};
use ynl_types::KernelPolicy;

fn can_gen_family_struct(family: &Family) -> bool {
    family.protocol == "genetlink"
}

fn policy_should_be_static(family: &Family) -> bool {
    family.kernel_policy == KernelPolicy::Split || can_gen_family_struct(family)
}

fn print_req_policy_fwd(
    family: &Family,
    cw: &mut CodeWriter,
    st: &Struct,
    ri: Option<&RenderInfo>,
    terminate: bool,
) -> GenResult<()> {
    if terminate && ri.is_some() && policy_should_be_static(family) {
        return Ok(());
    }

    let prefix = if terminate {
        "extern "
    } else if ri.is_some() && policy_should_be_static(family) {
        "static "
    } else {
        ""
    };
    let suffix = if terminate { ";" } else { " = {" };

    let max_attr = st
        .attr_max_val(family)
        .ok_or_else(|| GenError::EmptyPolicy(st.space_name.clone()))?;

    let name = match ri.and_then(|ri| ri.op.zip(ri.op_mode)) {
        Some((op, mode)) if op.dual_policy => format!("{}_{}", op.render_name, mode.name()),
        Some((op, _)) => op.render_name.clone(),
        None => st.render_name.clone(),
    };
    cw.p(&format!(
        "{}const struct nla_policy {}_nl_policy[{} + 1]{}",
        prefix, name, max_attr.enum_name, suffix
    ));
    Ok(())
}

fn print_req_policy(family: &Family, cw: &mut CodeWriter, st: &Struct, ri: Option<&RenderInfo>) -> GenResult<()> {
    print_req_policy_fwd(family, cw, st, ri, false)?;
    for attr in st.members(family) {
        emit_policy(attr, &family.consts, cw)?;
    }
    cw.p("};");
    cw.nl();
    Ok(())
}

fn op_table_struct(family: &Family) -> &'static str {
    match family.kernel_policy {
        KernelPolicy::Global => "genl_small_ops",
        KernelPolicy::PerOp => "genl_ops",
        KernelPolicy::Split => "genl_split_ops",
    }
}

fn print_kernel_op_table_fwd(family: &Family, cw: &mut CodeWriter, terminate: bool) {
    let exported = !can_gen_family_struct(family);

    if !terminate || exported {
        cw.p(&format!("/* Ops table for {} */", family.name));

        let cnt = if !exported {
            String::new()
        } else if family.kernel_policy == KernelPolicy::Split {
            family
                .ops()
                .map(|op| op.do_.is_some() as usize + op.dump.is_some() as usize)
                .sum::<usize>()
                .to_string()
        } else {
            family.ops().count().to_string()
        };

        let qual = if exported { "const" } else { "static const" };
        let line = format!("{} struct {} {}_nl_ops[{}]", qual, op_table_struct(family), family.name, cnt);
        if terminate {
            cw.p(&format!("extern {};", line));
        } else {
            cw.block_start(&format!("{} =", line));
        }
    }

    if !terminate {
        return;
    }

    cw.nl();
    let doit_args = [
        "const struct genl_split_ops *ops".to_string(),
        "struct sk_buff *skb".to_string(),
        "struct genl_info *info".to_string(),
    ];
    let dumpit_args = ["struct netlink_callback *cb".to_string()];
    for name in &family.hooks.pre.do_ {
        cw.write_func_prot("int", &c_lower(name), &doit_args, None, ";");
    }
    for name in &family.hooks.post.do_ {
        cw.write_func_prot("void", &c_lower(name), &doit_args, None, ";");
    }
    for name in &family.hooks.pre.dump {
        cw.write_func_prot("int", &c_lower(name), &dumpit_args, None, ";");
    }
    for name in &family.hooks.post.dump {
        cw.write_func_prot("int", &c_lower(name), &dumpit_args, None, ";");
    }

    cw.nl();

    for op in family.ops() {
        if op.do_.is_some() {
            let name = c_lower(&format!("{}-nl-{}-doit", family.name, op.name));
            cw.write_func_prot(
                "int",
                &name,
                &["struct sk_buff *skb".to_string(), "struct genl_info *info".to_string()],
                None,
                ";",
            );
        }
        if op.dump.is_some() {
            let name = c_lower(&format!("{}-nl-{}-dumpit", family.name, op.name));
            cw.write_func_prot(
                "int",
                &name,
                &["struct sk_buff *skb".to_string(), "struct netlink_callback *cb".to_string()],
                None,
                ";",
            );
        }
    }
    cw.nl();
}

fn joined_flags(prefix: &str, flags: &[String]) -> String {
    flags
        .iter()
        .map(|flag| c_upper(&format!("{}{}", prefix, flag)))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn print_kernel_op_table(family: &Family, cw: &mut CodeWriter) -> GenResult<()> {
    print_kernel_op_table_fwd(family, cw, false);

    match family.kernel_policy {
        KernelPolicy::Global | KernelPolicy::PerOp => {
            for op in family.ops() {
                cw.block_start("");
                let mut members = vec![("cmd".to_string(), op.enum_name.clone())];
                if !op.dont_validate.is_empty() {
                    members.push((
                        "validate".to_string(),
                        joined_flags("genl-dont-validate-", &op.dont_validate),
                    ));
                }
                for (mode, present) in [("do", op.do_.is_some()), ("dump", op.dump.is_some())] {
                    if present {
                        let name = c_lower(&format!("{}-nl-{}-{}it", family.name, op.name, mode));
                        members.push((format!("{}it", mode), name));
                    }
                }
                if family.kernel_policy == KernelPolicy::PerOp {
                    if let (Some(set), Some(attrs)) = (&op.attr_set, op.request_attrs(OpModeKind::Do)) {
                        let st = Struct::new(family, set, Some(attrs))?;
                        let max_attr = st
                            .attr_max_val(family)
                            .ok_or_else(|| GenError::EmptyPolicy(op.name.clone()))?;
                        members.push((
                            "policy".to_string(),
                            c_lower(&format!("{}-{}-nl-policy", family.name, op.name)),
                        ));
                        members.push(("maxattr".to_string(), max_attr.enum_name.clone()));
                    }
                }
                if !op.flags.is_empty() {
                    members.push(("flags".to_string(), joined_flags("genl-", &op.flags)));
                }
                cw.write_struct_init(&members);
                cw.block_end(",");
            }
        }
        KernelPolicy::Split => {
            for op in family.ops() {
                for (kind, mode) in [(OpModeKind::Do, &op.do_), (OpModeKind::Dump, &op.dump)] {
                    let Some(mode) = mode else {
                        continue;
                    };
                    let (pre_cb, post_cb) = match kind {
                        OpModeKind::Dump => ("start", "done"),
                        _ => ("pre_doit", "post_doit"),
                    };

                    cw.block_start("");
                    let mut members = vec![("cmd".to_string(), op.enum_name.clone())];

                    /* strict checks only make sense for the matching mode */
                    let dont_validate: Vec<String> = op
                        .dont_validate
                        .iter()
                        .filter(|x| match kind {
                            OpModeKind::Do => !matches!(x.as_str(), "dump" | "dump-strict"),
                            _ => x.as_str() != "strict",
                        })
                        .cloned()
                        .collect();
                    if !dont_validate.is_empty() {
                        members.push((
                            "validate".to_string(),
                            joined_flags("genl-dont-validate-", &dont_validate),
                        ));
                    }

                    let name = c_lower(&format!("{}-nl-{}-{}it", family.name, op.name, kind.name()));
                    if let Some(pre) = &mode.pre {
                        members.push((pre_cb.to_string(), c_lower(pre)));
                    }
                    members.push((format!("{}it", kind.name()), name));
                    if let Some(post) = &mode.post {
                        members.push((post_cb.to_string(), c_lower(post)));
                    }

                    if let (Some(set), Some(request)) = (&op.attr_set, &mode.request) {
                        let st = Struct::new(family, set, Some(&request.attributes))?;
                        let max_attr = st
                            .attr_max_val(family)
                            .ok_or_else(|| GenError::EmptyPolicy(op.name.clone()))?;
                        let policy = if op.dual_policy {
                            c_lower(&format!("{}-{}-{}-nl-policy", family.name, op.name, kind.name()))
                        } else {
                            c_lower(&format!("{}-{}-nl-policy", family.name, op.name))
                        };
                        members.push(("policy".to_string(), policy));
                        members.push(("maxattr".to_string(), max_attr.enum_name.clone()));
                    }

                    let mut flags = op.flags.clone();
                    flags.push(format!("cmd-cap-{}", kind.name()));
                    members.push(("flags".to_string(), joined_flags("genl-", &flags)));
                    cw.write_struct_init(&members);
                    cw.block_end(",");
                }
            }
        }
    }

    cw.block_end(";");
    cw.nl();
    Ok(())
}

fn mcgrp_id(family: &Family, name: &str) -> String {
    c_upper(&format!("{}-nlgrp-{}", family.name, name))
}

fn print_kernel_mcgrp_hdr(family: &Family, cw: &mut CodeWriter) {
    if family.mcgrps.is_empty() {
        return;
    }

    cw.block_start("enum");
    for grp in &family.mcgrps {
        cw.p(&format!("{},", mcgrp_id(family, &grp.name)));
    }
    cw.block_end(";");
    cw.nl();
}

fn print_kernel_mcgrp_src(family: &Family, cw: &mut CodeWriter) {
    if family.mcgrps.is_empty() {
        return;
    }

    cw.block_start(&format!(
        "static const struct genl_multicast_group {}_nl_mcgrps[] =",
        family.name
    ));
    for grp in &family.mcgrps {
        cw.p(&format!("[{}] = {{ \"{}\", }},", mcgrp_id(family, &grp.name), grp.name));
    }
    cw.block_end(";");
    cw.nl();
}

fn print_kernel_family_struct_hdr(family: &Family, cw: &mut CodeWriter) {
    if !can_gen_family_struct(family) {
        return;
    }
    cw.p(&format!("extern struct genl_family {}_nl_family;", family.name));
    cw.nl();
}

fn print_kernel_family_struct_src(family: &Family, cw: &mut CodeWriter) {
    if !can_gen_family_struct(family) {
        return;
    }

    cw.block_start(&format!("struct genl_family {}_nl_family __ro_after_init =", family.name));
    cw.p(&format!(".name\t\t= {},", family.fam_key));
    cw.p(&format!(".version\t= {},", family.ver_key));
    cw.p(".netnsok\t= true,");
    cw.p(".parallel_ops\t= true,");
    cw.p(".module\t\t= THIS_MODULE,");
    match family.kernel_policy {
        KernelPolicy::PerOp => {
            cw.p(&format!(".ops\t\t= {}_nl_ops,", family.name));
            cw.p(&format!(".n_ops\t\t= ARRAY_SIZE({}_nl_ops),", family.name));
        }
        KernelPolicy::Split => {
            cw.p(&format!(".split_ops\t= {}_nl_ops,", family.name));
            cw.p(&format!(".n_split_ops\t= ARRAY_SIZE({}_nl_ops),", family.name));
        }
        KernelPolicy::Global => {}
    }
    if !family.mcgrps.is_empty() {
        cw.p(&format!(".mcgrps\t\t= {}_nl_mcgrps,", family.name));
        cw.p(&format!(".n_mcgrps\t= ARRAY_SIZE({}_nl_mcgrps),", family.name));
    }
    cw.block_end(";");
}

/* Nested structs in name order, only those sent by the originating peer */
fn request_nested_sorted(family: &Family) -> Vec<&Struct> {
    let mut structs: Vec<(&String, &Struct)> = family
        .pure_nested_structs
        .iter()
        .filter(|(_, st)| st.request)
        .collect();
    structs.sort_by(|a, b| a.0.cmp(b.0));
    structs.into_iter().map(|(_, st)| st).collect()
}

fn global_policy_struct(family: &Family) -> GenResult<Option<Struct>> {
    match &family.global_policy {
        Some(gp) => Ok(Some(Struct::new(family, &gp.set, Some(&gp.attrs))?)),
        None => Ok(None),
    }
}

pub fn render_kernel_header(family: &Family, cw: &mut CodeWriter) -> GenResult<()> {
    let nested = request_nested_sorted(family);
    if !nested.is_empty() {
        cw.p("/* Common nested types */");
    }
    for st in nested {
        print_req_policy_fwd(family, cw, st, None, true)?;
    }
    cw.nl();

    if family.kernel_policy == KernelPolicy::Global {
        cw.p(&format!("/* Global operation policy for {} */", family.name));
        if let Some(st) = global_policy_struct(family)? {
            print_req_policy_fwd(family, cw, &st, None, true)?;
        }
        cw.nl();
    }

    if family.kernel_policy != KernelPolicy::Global {
        for op in family.ops() {
            if op.do_.is_none() || op.event.is_some() {
                continue;
            }
            let ri = RenderInfo::for_op(family, Space::Kernel, op, OpModeKind::Do)?;
            if let Some(request) = &ri.request {
                print_req_policy_fwd(family, cw, request, Some(&ri), true)?;
                cw.nl();
            }
        }
    }

    print_kernel_op_table_fwd(family, cw, true);
    print_kernel_mcgrp_hdr(family, cw);
    print_kernel_family_struct_hdr(family, cw);
    Ok(())
}

pub fn render_kernel_source(family: &Family, cw: &mut CodeWriter) -> GenResult<()> {
    let nested = request_nested_sorted(family);
    if !nested.is_empty() {
        cw.p("/* Common nested types */");
    }
    for st in nested {
        print_req_policy(family, cw, st, None)?;
    }
    cw.nl();

    if family.kernel_policy == KernelPolicy::Global {
        cw.p(&format!("/* Global operation policy for {} */", family.name));
        if let Some(st) = global_policy_struct(family)? {
            print_req_policy(family, cw, &st, None)?;
        }
        cw.nl();
    }

    if family.kernel_policy != KernelPolicy::Global {
        for op in family.ops() {
            for kind in [OpModeKind::Do, OpModeKind::Dump] {
                if !op.has_request(kind) {
                    continue;
                }
                cw.p(&format!("/* {} - {} */", op.enum_name, kind.name()));
                let ri = RenderInfo::for_op(family, Space::Kernel, op, kind)?;
                if let Some(request) = &ri.request {
                    print_req_policy(family, cw, request, Some(&ri))?;
                }
                cw.nl();
            }
        }
    }

    print_kernel_op_table(family, cw)?;
    print_kernel_mcgrp_src(family, cw);
    print_kernel_family_struct_src(family, cw);
    Ok(())
}
