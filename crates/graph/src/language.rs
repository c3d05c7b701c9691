use crate::types::EntityKind;
use std::path::Path;

/// Source languages with a registered tree-sitter grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphLanguage {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Java,
}

/// Node kinds that carry a definition name
const IDENTIFIER_KINDS: &[&str] = &["identifier", "type_identifier", "property_identifier"];

/// Node kinds a call target name is read from
const CALLEE_KINDS: &[&str] = &[
    "identifier",
    "attribute",
    "member_expression",
    "field_expression",
    "scoped_identifier",
    "selector_expression",
];

const JS_DEFINABLE: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "class_declaration",
    "method_definition",
];

const TS_DEFINABLE: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "class_declaration",
    "abstract_class_declaration",
    "method_definition",
];

const GO_DEFINABLE: &[&str] = &["function_declaration", "method_declaration"];

const JAVA_DEFINABLE: &[&str] = &["class_declaration", "method_declaration"];

impl GraphLanguage {
    /// Resolve a language tag (`python`, `py`, `ts`, ...), case-insensitively
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "rust" | "rs" => Some(Self::Rust),
            "python" | "py" | "pyw" => Some(Self::Python),
            "javascript" | "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "typescript" | "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "go" | "golang" => Some(Self::Go),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    /// Resolve the language from a file extension
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
            Self::Java => "java",
        }
    }

    pub fn tree_sitter_language(self) -> tree_sitter::Language {
        match self {
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }

    /// Grammar kinds that declare a function, method or class
    pub fn definable_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["function_item"],
            Self::Python => &["function_definition", "class_definition"],
            Self::JavaScript => JS_DEFINABLE,
            Self::TypeScript | Self::Tsx => TS_DEFINABLE,
            Self::Go => GO_DEFINABLE,
            Self::Java => JAVA_DEFINABLE,
        }
    }

    pub fn call_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Python => &["call"],
            Self::Java => &["method_invocation"],
            Self::Rust | Self::JavaScript | Self::TypeScript | Self::Tsx | Self::Go => {
                &["call_expression"]
            }
        }
    }

    pub fn import_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["use_declaration"],
            Self::Python => &["import_statement", "import_from_statement"],
            Self::JavaScript | Self::TypeScript | Self::Tsx => &["import_statement"],
            Self::Go | Self::Java => &["import_declaration"],
        }
    }

    pub fn is_definable(self, kind: &str) -> bool {
        self.definable_kinds().contains(&kind)
    }

    pub fn is_call(self, kind: &str) -> bool {
        self.call_kinds().contains(&kind)
    }

    pub fn is_import(self, kind: &str) -> bool {
        self.import_kinds().contains(&kind)
    }
}

pub(crate) fn is_identifier_kind(kind: &str) -> bool {
    IDENTIFIER_KINDS.contains(&kind)
}

pub(crate) fn is_callee_kind(kind: &str) -> bool {
    CALLEE_KINDS.contains(&kind)
}

/// Entity kind for a definable grammar kind: anything mentioning "class" is a class
pub(crate) fn entity_kind_for(grammar_kind: &str) -> EntityKind {
    if grammar_kind.contains("class") {
        EntityKind::Class
    } else {
        EntityKind::Function
    }
}

/// Last segment of a dotted (or `::`-qualified) callee expression
pub(crate) fn call_target_name(callee: &str) -> Option<&str> {
    let last = callee.rsplit('.').next()?;
    let last = last.rsplit("::").next()?.trim();
    (!last.is_empty()).then_some(last)
}
