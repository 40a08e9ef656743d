/* Tab-indented C writer.
 *
 * A closing brace is held back until the next line so that `else` can be
 * joined onto it. A condition line without a brace indents exactly the
 * one line that follows it. */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefineValue {
    Int(i64),
    Str(String),
}

#[derive(Debug, Default)]
pub struct CodeWriter {
    out: String,
    nl: bool,
    block_end: bool,
    silent_block: bool,
    ind: usize,
}

fn is_cond(line: &str) -> bool {
    line.starts_with("if") || line.starts_with("while") || line.starts_with("for")
}

fn tabs(n: usize) -> String {
    "\t".repeat(n)
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flush any pending brace and hand back the text.
    pub fn finish(mut self) -> String {
        if self.block_end {
            self.out.push_str(&tabs(self.ind));
            self.out.push_str("}\n");
        }
        self.out
    }

    pub fn p(&mut self, line: &str) {
        self.p_ind(line, 0);
    }

    pub fn p_ind(&mut self, line: &str, add_ind: usize) {
        let mut line = line.to_string();
        if self.block_end {
            self.block_end = false;
            if line.starts_with("else") {
                line = format!("}} {}", line);
            } else {
                self.out.push_str(&tabs(self.ind));
                self.out.push_str("}\n");
            }
        }

        if self.nl {
            self.out.push('\n');
            self.nl = false;
        }

        let mut ind = self.ind;
        /* labels sit one level out */
        if line.ends_with(':') {
            ind = ind.saturating_sub(1);
        }
        if self.silent_block {
            ind += 1;
        }
        self.silent_block = line.ends_with(')') && is_cond(&line);
        ind += add_ind;

        self.out.push_str(&tabs(ind));
        self.out.push_str(&line);
        self.out.push('\n');
    }

    /// Request an empty line before the next printed line. Repeated
    /// requests collapse into one.
    pub fn nl(&mut self) {
        self.nl = true;
    }

    pub fn block_start(&mut self, line: &str) {
        if line.is_empty() {
            self.p("{");
        } else {
            self.p(&format!("{} {{", line));
        }
        self.ind += 1;
    }

    pub fn block_end(&mut self, line: &str) {
        self.ind = self.ind.saturating_sub(1);
        self.nl = false;
        if line.is_empty() {
            if self.block_end {
                self.out.push_str(&tabs(self.ind + 1));
                self.out.push_str("}\n");
            }
            self.block_end = true;
            return;
        }

        if self.block_end {
            self.out.push_str(&tabs(self.ind + 1));
            self.out.push_str("}\n");
            self.block_end = false;
        }
        if line.starts_with(';') || line.starts_with(',') {
            self.p(&format!("}}{}", line));
        } else {
            self.p(&format!("}} {}", line));
        }
    }

    /// One kdoc line, wrapped before column 79.
    pub fn write_doc_line(&mut self, doc: &str, indent: bool) {
        let mut line = String::from(" *");
        for word in doc.split_whitespace() {
            if line.len() + word.len() >= 79 {
                self.p(&line);
                line = String::from(" *");
                if indent {
                    line.push_str("  ");
                }
            }
            line.push(' ');
            line.push_str(word);
        }
        self.p(&line);
    }

    pub fn write_func_prot(&mut self, qual_ret: &str, name: &str, args: &[String], doc: Option<&str>, suffix: &str) {
        let void = [String::from("void")];
        let args = if args.is_empty() { &void[..] } else { args };

        if let Some(doc) = doc {
            self.p("/*");
            self.p(&format!(" * {}", doc));
            self.p(" */");
        }

        let mut oneline = qual_ret.to_string();
        if !qual_ret.ends_with('*') {
            oneline.push(' ');
        }
        oneline.push_str(&format!("{}({}){}", name, args.join(", "), suffix));
        if oneline.len() < 80 {
            self.p(&oneline);
            return;
        }

        let mut v = qual_ret.to_string();
        if v.len() > 3 {
            self.p(&v);
            v.clear();
        } else if !qual_ret.ends_with('*') {
            v.push(' ');
        }
        v.push_str(name);
        v.push('(');
        let ind = format!("{}{}", tabs(v.len() / 8), " ".repeat(v.len() % 8));
        let delta_ind = v.len() - ind.len();
        v.push_str(&args[0]);
        for arg in &args[1..] {
            let mut next_len = v.len() + arg.len();
            if v.starts_with('\t') {
                next_len += delta_ind;
            }
            if next_len > 76 {
                self.p(&format!("{},", v));
                v = ind.clone();
            } else {
                v.push_str(", ");
            }
            v.push_str(arg);
        }
        self.p(&format!("{}){}", v, suffix));
    }

    /// Local variable block, longest declaration first.
    pub fn write_func_lvar(&mut self, local_vars: &[String]) {
        if local_vars.is_empty() {
            return;
        }
        let mut vars = local_vars.to_vec();
        vars.sort_by(|a, b| b.len().cmp(&a.len()));
        for var in &vars {
            self.p(var);
        }
        self.nl();
    }

    pub fn write_func(&mut self, qual_ret: &str, name: &str, body: &[String], args: &[String], local_vars: &[String]) {
        self.write_func_prot(qual_ret, name, args, None, "");
        self.write_func_lvar(local_vars);

        self.block_start("");
        for line in body {
            self.p(line);
        }
        self.block_end("");
    }

    pub fn writes_defines(&mut self, defines: &[(String, DefineValue)]) {
        let longest = defines.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        let longest = ((longest + 8) / 8) * 8;
        for (name, value) in defines {
            let mut line = format!("#define {}", name);
            line.push_str(&tabs((longest - name.len() + 7) / 8));
            match value {
                DefineValue::Int(v) => line.push_str(&v.to_string()),
                DefineValue::Str(s) => line.push_str(&format!("\"{}\"", s)),
            }
            self.p(&line);
        }
    }

    /// Designated initializers with the `=` signs tab-aligned.
    pub fn write_struct_init(&mut self, members: &[(String, String)]) {
        let longest = members.iter().map(|(name, _)| name.len()).max().unwrap_or(0) + 1;
        let longest = ((longest + 8) / 8) * 8;
        for (name, value) in members {
            let line = format!(".{}{}= {},", name, tabs((longest - name.len() - 1 + 7) / 8), value);
            self.p(&line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_else_joins_closing_brace() {
        let mut cw = CodeWriter::new();
        cw.block_start("if (a)");
        cw.p("x();");
        cw.block_end("");
        cw.block_start("else if (b)");
        cw.p("y();");
        cw.block_end("");
        assert_eq!(cw.finish(), "if (a) {\n\tx();\n} else if (b) {\n\ty();\n}\n");
    }

    #[test]
    fn test_condition_without_brace_indents_next_line() {
        let mut cw = CodeWriter::new();
        cw.p("if (err < 0)");
        cw.p("return -1;");
        cw.p("done();");
        assert_eq!(cw.finish(), "if (err < 0)\n\treturn -1;\ndone();\n");
    }

    #[test]
    fn test_label_dedent_and_nl_collapse() {
        let mut cw = CodeWriter::new();
        cw.block_start("int f(void)");
        cw.p("return 0;");
        cw.nl();
        cw.nl();
        cw.p("err_free:");
        cw.p("return 1;");
        cw.block_end("");
        assert_eq!(
            cw.finish(),
            "int f(void) {\n\treturn 0;\n\nerr_free:\n\treturn 1;\n}\n"
        );
    }

    #[test]
    fn test_nested_block_ends() {
        let mut cw = CodeWriter::new();
        cw.block_start("while (x)");
        cw.block_start("if (y)");
        cw.p("z();");
        cw.block_end("");
        cw.block_end("");
        cw.p("done();");
        assert_eq!(cw.finish(), "while (x) {\n\tif (y) {\n\t\tz();\n\t}\n}\ndone();\n");
    }

    #[test]
    fn test_func_prot_wraps_long_argument_lists() {
        let mut cw = CodeWriter::new();
        let args: Vec<String> = vec![
            "struct ynl_sock *ys".into(),
            "struct devlink_trap_policer_get_req *req".into(),
            "unsigned int extra_argument".into(),
        ];
        cw.write_func_prot("struct devlink_trap_policer_get_rsp *", "devlink_trap_policer_get", &args, None, ";");
        let out = cw.finish();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "struct devlink_trap_policer_get_rsp *");
        assert!(lines[1].starts_with("devlink_trap_policer_get(struct ynl_sock *ys,"));
        assert!(lines.last().unwrap().ends_with("unsigned int extra_argument);"));
        assert!(lines.iter().all(|l| l.len() < 80));
    }

    #[test]
    fn test_func_prot_void_args() {
        let mut cw = CodeWriter::new();
        cw.write_func_prot("int", "f", &[], None, ";");
        assert_eq!(cw.finish(), "int f(void);\n");
    }

    #[test]
    fn test_local_vars_longest_first() {
        let mut cw = CodeWriter::new();
        cw.write_func_lvar(&["int i;".into(), "struct nlattr *nest;".into()]);
        cw.p("x;");
        assert_eq!(cw.finish(), "struct nlattr *nest;\nint i;\n\nx;\n");
    }

    #[test]
    fn test_defines_aligned() {
        let mut cw = CodeWriter::new();
        cw.writes_defines(&[
            ("A_NAME".into(), DefineValue::Str("a".into())),
            ("A_VERSION".into(), DefineValue::Int(1)),
        ]);
        assert_eq!(cw.finish(), "#define A_NAME\t\t\"a\"\n#define A_VERSION\t1\n");
    }

    #[test]
    fn test_struct_init_aligned() {
        let mut cw = CodeWriter::new();
        cw.write_struct_init(&[
            ("cmd".into(), "X_CMD_GET".into()),
            ("doit".into(), "x_nl_get_doit".into()),
        ]);
        assert_eq!(cw.finish(), ".cmd\t= X_CMD_GET,\n.doit\t= x_nl_get_doit,\n");
    }
}
