/* C identifier helpers shared by the model and the renderers */

const C_KEYWORDS: &[&str] = &[
    "auto", "bool", "break", "case", "char", "const", "continue", "default", "do", "double",
    "else", "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef", "union",
    "unsigned", "void", "volatile", "while",
];

pub fn c_upper(name: &str) -> String {
    name.to_uppercase().replace('-', "_")
}

pub fn c_lower(name: &str) -> String {
    name.to_lowercase().replace('-', "_")
}

pub fn is_c_keyword(name: &str) -> bool {
    C_KEYWORDS.contains(&name)
}

/// Lower-case C name with a trailing underscore when it collides with a
/// keyword.
pub fn c_ident(name: &str) -> String {
    let mut ident = c_lower(name);
    if is_c_keyword(&ident) {
        ident.push('_');
    }
    ident
}
