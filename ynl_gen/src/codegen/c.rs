use crate::codegen::c_gen::{
    render_kernel_header, render_kernel_source, render_uapi, render_user_family, render_user_header,
    render_user_source, CodeWriter,
};
use crate::error::{GenError, GenResult};
use crate::spec::naming::c_upper;
use crate::spec::Family;
use std::path::{Path, PathBuf};
use tracing::debug;
use ynl_types::EnumModel;

/// Which consumer the output is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenMode {
    User,
    Kernel,
    Uapi,
}

impl GenMode {
    pub fn name(&self) -> &'static str {
        match self {
            GenMode::User => "user",
            GenMode::Kernel => "kernel",
            GenMode::Uapi => "uapi",
        }
    }
}

pub struct CCodeGenerator<'a> {
    family: &'a Family,
    options: CCodeGeneratorOptions,
}

pub struct CCodeGeneratorOptions {
    pub mode: GenMode,
    /* Header when set, source otherwise */
    pub header: bool,
    /* Extra includes for the user source */
    pub user_headers: Vec<String>,
    /* Exclusion patterns as given, echoed into the banner */
    pub exclude_ops: Vec<String>,
    pub out_file: Option<PathBuf>,
    pub spec_path: PathBuf,
}

impl Default for CCodeGeneratorOptions {
    fn default() -> Self {
        Self {
            mode: GenMode::User,
            header: true,
            user_headers: Vec::new(),
            exclude_ops: Vec::new(),
            out_file: None,
            spec_path: PathBuf::new(),
        }
    }
}

/* Path of the spec relative to the source tree root, the first parent
   holding a MAINTAINERS file. Falls back to the path as given. */
fn spec_display_path(spec: &Path) -> String {
    let Ok(full) = spec.canonicalize() else {
        return spec.display().to_string();
    };
    for dir in full.ancestors().skip(1) {
        if dir.join("MAINTAINERS").exists() {
            if let Ok(rel) = full.strip_prefix(dir) {
                return rel.display().to_string();
            }
        }
    }
    spec.display().to_string()
}

impl<'a> CCodeGenerator<'a> {
    pub fn new(family: &'a Family, options: CCodeGeneratorOptions) -> Self {
        Self { family, options }
    }

    fn check_enum_model(&self) -> GenResult<()> {
        let model = self.family.msg_id_model;
        if model == EnumModel::Directional && self.options.mode == GenMode::Uapi {
            return Err(GenError::UnsupportedEnumModel {
                model: "directional".to_string(),
                mode: self.options.mode.name().to_string(),
            });
        }
        Ok(())
    }

    fn emit_banner(&self, cw: &mut CodeWriter) {
        let opts = &self.options;
        let license = &self.family.license;
        if opts.mode == GenMode::Uapi || opts.header {
            cw.p(&format!("/* SPDX-License-Identifier: {} */", license));
        } else {
            cw.p(&format!("// SPDX-License-Identifier: {}", license));
        }
        cw.p("/* Do not edit directly, auto-generated from: */");
        cw.p(&format!("/*\t{} */", spec_display_path(&opts.spec_path)));
        cw.p(&format!(
            "/* YNL-GEN {} {} */",
            opts.mode.name(),
            if opts.header { "header" } else { "source" }
        ));
        if !opts.exclude_ops.is_empty() || !opts.user_headers.is_empty() {
            let mut line = String::new();
            for one in &opts.user_headers {
                line.push_str(&format!(" --user-header {}", one));
            }
            for one in &opts.exclude_ops {
                line.push_str(&format!(" --exclude-op {}", one));
            }
            cw.p(&format!("/* YNL-ARG{} */", line));
        }
        cw.nl();
    }

    fn emit_includes(&self, cw: &mut CodeWriter) {
        let family = self.family;
        let opts = &self.options;

        let mut headers = Vec::new();
        match opts.mode {
            GenMode::Kernel => {
                cw.p("#include <net/netlink.h>");
                cw.p("#include <net/genetlink.h>");
                cw.nl();
                if !opts.header {
                    if let Some(stem) = opts.out_file.as_deref().and_then(Path::file_stem) {
                        cw.p(&format!("#include \"{}.h\"", stem.to_string_lossy()));
                    }
                    cw.nl();
                }
                headers.push(format!("uapi/{}", family.uapi_header));
            }
            GenMode::User | GenMode::Uapi => {
                cw.p("#include <stdlib.h>");
                cw.p("#include <string.h>");
                if opts.header {
                    cw.p("#include <linux/types.h>");
                } else {
                    cw.p(&format!("#include \"{}-user.h\"", family.name));
                    cw.p("#include \"ynl.h\"");
                }
                headers.push(family.uapi_header.clone());
            }
        }
        headers.extend(family.definitions.iter().filter_map(|def| def.header.clone()));
        for one in &headers {
            cw.p(&format!("#include <{}>", one));
        }
        cw.nl();
    }

    /// Render the whole output file.
    pub fn emit_code(&self) -> GenResult<String> {
        self.check_enum_model()?;

        let family = self.family;
        let opts = &self.options;
        debug!(family = %family.name, mode = opts.mode.name(), header = opts.header, "rendering");

        let mut cw = CodeWriter::new();
        self.emit_banner(&mut cw);

        if opts.mode == GenMode::Uapi {
            render_uapi(family, &mut cw)?;
            return Ok(cw.finish());
        }

        let hdr_prot = format!("_LINUX_{}_GEN_H", c_upper(&family.name));
        if opts.header {
            cw.p(&format!("#ifndef {}", hdr_prot));
            cw.p(&format!("#define {}", hdr_prot));
            cw.nl();
        }

        self.emit_includes(&mut cw);

        match (opts.mode, opts.header) {
            (GenMode::Kernel, true) => render_kernel_header(family, &mut cw)?,
            (GenMode::Kernel, false) => render_kernel_source(family, &mut cw)?,
            (_, true) => {
                cw.p("struct ynl_sock;");
                cw.nl();
                render_user_family(family, &mut cw, true)?;
                cw.nl();
                render_user_header(family, &mut cw)?;
            }
            (_, false) => {
                cw.p("#include <libmnl/libmnl.h>");
                cw.p("#include <linux/genetlink.h>");
                cw.nl();
                for one in &opts.user_headers {
                    cw.p(&format!("#include \"{}\"", one));
                }
                cw.nl();
                render_user_source(family, &mut cw)?;
            }
        }

        if opts.header {
            cw.p(&format!("#endif /* {} */", hdr_prot));
        }
        Ok(cw.finish())
    }
}
