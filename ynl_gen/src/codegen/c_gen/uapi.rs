/* UAPI header: family defines, enums, attribute and command enums and
 * multicast group names. */

use super::writer::{CodeWriter, DefineValue};
use crate::error::GenResult;
use crate::spec::naming::{c_lower, c_upper};
use crate::spec::Family;
use ynl_types::DefinitionKind;

/* `enum-name` given: use it, or render anonymously when empty */
fn enum_start_line(family: &Family, enum_name: &Option<Option<String>>, fallback: Option<&str>) -> String {
    match enum_name {
        Some(Some(name)) if !name.is_empty() => format!("enum {}", c_lower(name)),
        Some(_) => "enum".to_string(),
        None => match fallback {
            Some(name) => format!("enum {}_{}", family.name, c_lower(name)),
            None => "enum".to_string(),
        },
    }
}

fn render_definitions(family: &Family, cw: &mut CodeWriter) {
    let mut defines = Vec::new();
    for def in &family.definitions {
        if def.kind != DefinitionKind::Const {
            cw.writes_defines(&defines);
            defines.clear();
            cw.nl();
        }

        match def.kind {
            DefinitionKind::Const => {
                let name = match &def.c_define_name {
                    Some(name) => c_upper(name),
                    None => c_upper(&format!("{}-{}", family.name, def.name)),
                };
                defines.push((name, DefineValue::Int(def.value.unwrap_or_default())));
            }
            DefinitionKind::Enum | DefinitionKind::Flags => {
                let Some(enum_set) = family.enum_set(&def.name) else {
                    continue;
                };

                if enum_set.has_doc() {
                    cw.p("/**");
                    let title = enum_set.enum_name.as_deref().unwrap_or(&enum_set.render_name);
                    match &enum_set.doc {
                        Some(doc) => cw.write_doc_line(&format!("{} - {}", title, doc), true),
                        None => cw.write_doc_line(title, true),
                    }
                    for entry in enum_set.entries.values() {
                        if let Some(doc) = &entry.doc {
                            cw.write_doc_line(&format!("@{}: {}", entry.c_name, doc), true);
                        }
                    }
                    cw.p(" */");
                }

                cw.block_start(&enum_start_line(family, &def.enum_name, Some(&def.name)));
                for entry in enum_set.entries.values() {
                    if entry.value_change {
                        cw.p(&format!("{} = {},", entry.c_name, entry.user_value(enum_set.is_flags)));
                    } else {
                        cw.p(&format!("{},", entry.c_name));
                    }
                }

                if enum_set.render_max {
                    cw.nl();
                    cw.p("/* private: */");
                    if enum_set.is_flags {
                        let max_name = c_upper(&format!("{}mask", enum_set.value_pfx));
                        cw.p(&format!("{} = {},", max_name, enum_set.get_mask(false)));
                    } else {
                        let max_name = c_upper(&format!("{}max", enum_set.value_pfx));
                        cw.p(&format!("__{},", max_name));
                        cw.p(&format!("{} = (__{} - 1)", max_name, max_name));
                    }
                }
                cw.block_end(";");
                cw.nl();
            }
        }
    }

    if !defines.is_empty() {
        cw.writes_defines(&defines);
        cw.nl();
    }
}

/* Count entry and max, either inside the enum or as a define after it */
fn render_enum_tail(family: &Family, cw: &mut CodeWriter, cnt_name: &str, max_name: &str) {
    let max_value = format!("({} - 1)", cnt_name);
    cw.nl();
    if family.max_by_define {
        cw.p(cnt_name);
    } else {
        cw.p(&format!("{},", cnt_name));
        cw.p(&format!("{} = {}", max_name, max_value));
    }
    cw.block_end(";");
    if family.max_by_define {
        cw.p(&format!("#define {} {}", max_name, max_value));
    }
    cw.nl();
}

fn render_attr_sets(family: &Family, cw: &mut CodeWriter) {
    for attr_set in family.attr_sets.values() {
        if attr_set.subset_of.is_some() {
            continue;
        }

        let cnt_name = match &family.attr_cnt_name {
            Some(name) => c_upper(name),
            None => format!("__{}MAX", attr_set.name_prefix),
        };

        cw.block_start(&enum_start_line(family, &attr_set.enum_name, None));
        let mut val = 0;
        for attr in attr_set.attrs.values() {
            if attr.value != val {
                cw.p(&format!("{} = {},", attr.enum_name, attr.value));
                val = attr.value;
            } else {
                cw.p(&format!("{},", attr.enum_name));
            }
            val += 1;
        }
        render_enum_tail(family, cw, &cnt_name, &attr_set.max_name);
    }
}

fn render_commands(family: &Family, cw: &mut CodeWriter) {
    let max_name = c_upper(
        family
            .cmd_max_name
            .as_deref()
            .unwrap_or(&format!("{}MAX", family.op_prefix)),
    );
    let cnt_name = c_upper(
        family
            .cmd_cnt_name
            .as_deref()
            .unwrap_or(&format!("__{}MAX", family.op_prefix)),
    );

    cw.block_start(&enum_start_line(family, &family.ops_enum_name, None));
    let mut val = 0;
    for op in family.msgs.values() {
        if family.separate_ntf && op.is_async {
            continue;
        }
        let value = op.value.or(op.req_value).unwrap_or(val);
        if value != val {
            cw.p(&format!("{} = {},", op.enum_name, value));
            val = value;
        } else {
            cw.p(&format!("{},", op.enum_name));
        }
        val += 1;
    }
    render_enum_tail(family, cw, &cnt_name, &max_name);

    if family.separate_ntf {
        cw.block_start(&enum_start_line(family, &family.async_enum_name, None));
        for op in family.msgs.values().filter(|op| op.is_async) {
            match op.spec_value {
                Some(value) => cw.p(&format!("{} = {},", op.enum_name, value)),
                None => cw.p(&format!("{},", op.enum_name)),
            }
        }
        cw.block_end(";");
        cw.nl();
    }
}

pub fn render_uapi(family: &Family, cw: &mut CodeWriter) -> GenResult<()> {
    let hdr_prot = format!("_UAPI_LINUX_{}_H", c_upper(&family.name));
    cw.p(&format!("#ifndef {}", hdr_prot));
    cw.p(&format!("#define {}", hdr_prot));
    cw.nl();

    cw.writes_defines(&[
        (family.fam_key.clone(), DefineValue::Str(family.name.clone())),
        (family.ver_key.clone(), DefineValue::Int(i64::from(family.version))),
    ]);
    cw.nl();

    render_definitions(family, cw);
    render_attr_sets(family, cw);
    render_commands(family, cw);

    let defines: Vec<(String, DefineValue)> = family
        .mcgrps
        .iter()
        .map(|grp| {
            let name = match &grp.c_define_name {
                Some(name) => c_upper(name),
                None => c_upper(&format!("{}-mcgrp-{}", family.name, grp.name)),
            };
            (name, DefineValue::Str(grp.name.clone()))
        })
        .collect();
    cw.nl();
    if !defines.is_empty() {
        cw.writes_defines(&defines);
        cw.nl();
    }

    cw.p(&format!("#endif /* {} */", hdr_prot));
    Ok(())
}
