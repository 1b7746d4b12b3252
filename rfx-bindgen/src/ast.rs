//! Clang AST dump — subprocess driver and the typed node tree.
//!
//! The compiler front end is a black box: we invoke `clang` with
//! `-ast-dump=json` and deserialize its output into [`Node`], a closed
//! tagged-variant view of the dump. Node kinds we never dispatch on
//! collapse into [`NodeKind::Other`] and are skipped during ingestion.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer};
use tracing::debug;

/// Kind tag of an AST node. Clang emits many more kinds than the ones
/// named here; everything else maps to [`NodeKind::Other`] (or
/// [`NodeKind::OtherComment`] for documentation nodes) so that ingestion
/// can skip unknown constructs without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    TranslationUnitDecl,
    RecordDecl,
    FieldDecl,
    EnumDecl,
    EnumConstantDecl,
    TypedefDecl,
    FunctionDecl,
    ParmVarDecl,
    ElaboratedType,
    IntegerLiteral,
    BinaryOperator,
    LinkageSpecDecl,
    VisibilityAttr,
    FullComment,
    ParagraphComment,
    TextComment,
    /// Any other `*Comment` node (block commands, inline commands, ...).
    OtherComment,
    #[default]
    Other,
}

impl NodeKind {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "TranslationUnitDecl" => Self::TranslationUnitDecl,
            "RecordDecl" | "CXXRecordDecl" => Self::RecordDecl,
            "FieldDecl" => Self::FieldDecl,
            "EnumDecl" => Self::EnumDecl,
            "EnumConstantDecl" => Self::EnumConstantDecl,
            "TypedefDecl" => Self::TypedefDecl,
            "FunctionDecl" => Self::FunctionDecl,
            "ParmVarDecl" => Self::ParmVarDecl,
            "ElaboratedType" => Self::ElaboratedType,
            "IntegerLiteral" => Self::IntegerLiteral,
            "BinaryOperator" => Self::BinaryOperator,
            "LinkageSpecDecl" => Self::LinkageSpecDecl,
            "VisibilityAttr" => Self::VisibilityAttr,
            "FullComment" => Self::FullComment,
            "ParagraphComment" => Self::ParagraphComment,
            "TextComment" => Self::TextComment,
            other if other.ends_with("Comment") => Self::OtherComment,
            _ => Self::Other,
        }
    }

    /// Documentation-comment nodes of any flavor.
    pub fn is_comment(self) -> bool {
        matches!(
            self,
            Self::FullComment | Self::ParagraphComment | Self::TextComment | Self::OtherComment
        )
    }
}

fn kind_from_tag<'de, D>(deserializer: D) -> Result<NodeKind, D::Error>
where
    D: Deserializer<'de>,
{
    let tag = String::deserialize(deserializer)?;
    Ok(NodeKind::from_tag(&tag))
}

/// Source location of a node. Clang only repeats the `file` key when it
/// changes from the previous node, so a present `loc` with no `file` means
/// "same file as before" — the location filter treats it as in scope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Location {
    pub file: Option<String>,
    pub line: Option<u64>,
}

/// A `{"qualType": "..."}` wrapper.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QualType {
    #[serde(rename = "qualType")]
    pub qual_type: String,
}

/// Literal value payload. Clang prints integer literals as strings, but
/// hand-built trees (tests) may use plain numbers; accept both.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Int(i64),
    Str(String),
}

impl LiteralValue {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Int(v) => *v,
            Self::Str(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

/// One node of the clang AST dump.
///
/// Every payload field is optional; which ones are meaningful depends on
/// [`Node::kind`]. Children live in `inner`, in declaration order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Node {
    pub id: Option<String>,
    #[serde(deserialize_with = "kind_from_tag")]
    pub kind: NodeKind,
    pub name: Option<String>,
    pub loc: Option<Location>,
    #[serde(rename = "type")]
    pub ty: Option<QualType>,
    /// `BinaryOperator` operator spelling (`"<<"`, `"|"`, ...).
    pub opcode: Option<String>,
    /// `IntegerLiteral` value.
    pub value: Option<LiteralValue>,
    /// `"struct"` or `"union"` on record declarations.
    pub tag_used: Option<String>,
    pub complete_definition: bool,
    /// Explicit fixed underlying type of an enum (`enum E : uint8_t`).
    pub fixed_underlying_type: Option<QualType>,
    /// Tag declaration owned by a typedef (`typedef struct {...} T;`).
    /// Often a stub that must be resolved through the [`NodeIndex`].
    pub owned_tag_decl: Option<Box<Node>>,
    /// `TextComment` payload.
    pub text: Option<String>,
    pub inner: Vec<Node>,
}

impl Node {
    /// Flattened text of a documentation-comment subtree.
    pub fn comment_text(&self) -> Option<String> {
        fn collect(node: &Node, out: &mut Vec<String>) {
            if node.kind == NodeKind::TextComment
                && let Some(text) = &node.text
            {
                let text = text.trim();
                if !text.is_empty() {
                    out.push(text.to_string());
                }
            }
            for child in &node.inner {
                collect(child, out);
            }
        }
        let mut parts = Vec::new();
        collect(self, &mut parts);
        if parts.is_empty() { None } else { Some(parts.join("\n")) }
    }

    /// Documentation attached directly to this declaration (a
    /// `FullComment` child, which clang appends when comments are parsed).
    pub fn own_doc(&self) -> Option<String> {
        self.inner
            .iter()
            .rev()
            .find(|c| c.kind == NodeKind::FullComment)
            .and_then(Node::comment_text)
    }
}

// ---------------------------------------------------------------------------
// Node index
// ---------------------------------------------------------------------------

/// Index of node id → node, built once per run and passed by reference
/// into ingestion. When the same id appears more than once (definition
/// plus stub back-references), the entry carrying children wins.
#[derive(Debug, Default)]
pub struct NodeIndex<'a> {
    by_id: HashMap<&'a str, &'a Node>,
}

impl<'a> NodeIndex<'a> {
    pub fn build(root: &'a Node) -> Self {
        let mut index = Self::default();
        index.visit(root);
        debug!(nodes = index.by_id.len(), "indexed ast nodes");
        index
    }

    fn visit(&mut self, node: &'a Node) {
        if let Some(id) = node.id.as_deref()
            && (!self.by_id.contains_key(id) || !node.inner.is_empty())
        {
            self.by_id.insert(id, node);
        }
        if let Some(owned) = node.owned_tag_decl.as_deref() {
            self.visit(owned);
        }
        for child in &node.inner {
            self.visit(child);
        }
    }

    pub fn get(&self, id: &str) -> Option<&'a Node> {
        self.by_id.get(id).copied()
    }
}

// ---------------------------------------------------------------------------
// Subprocess driver
// ---------------------------------------------------------------------------

/// Run clang on `header` and return the parsed AST dump.
///
/// Requests the JSON syntax tree after preprocessing, with comments
/// parsed and diagnostics suppressed. A non-zero exit is fatal and
/// surfaces clang's stderr verbatim; there is no retry or timeout.
pub fn dump(header: &Path, clang_args: &[String]) -> Result<Node> {
    let mut cmd = Command::new("clang");
    cmd.arg("-Xclang")
        .arg("-ast-dump=json")
        .arg("-fsyntax-only")
        .arg("-fparse-all-comments")
        .arg("-Wno-everything");
    for arg in clang_args {
        cmd.arg(arg);
    }
    cmd.arg(header);

    let output = cmd
        .output()
        .with_context(|| format!("invoking clang on {}", header.display()))?;
    if !output.status.success() {
        bail!(
            "clang failed on {}:\n{}",
            header.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    debug!(bytes = output.stdout.len(), "received ast dump");
    let root: Node = serde_json::from_slice(&output.stdout)
        .with_context(|| format!("parsing clang AST dump for {}", header.display()))?;
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(value: serde_json::Value) -> Node {
        serde_json::from_value(value).expect("valid node")
    }

    #[test]
    fn unknown_kinds_collapse_to_other() {
        let n = node(serde_json::json!({"kind": "StaticAssertDecl"}));
        assert_eq!(n.kind, NodeKind::Other);
        let n = node(serde_json::json!({"kind": "VerbatimLineComment"}));
        assert_eq!(n.kind, NodeKind::OtherComment);
        assert!(n.kind.is_comment());
    }

    #[test]
    fn literal_value_accepts_string_and_number() {
        let n = node(serde_json::json!({"kind": "IntegerLiteral", "value": "42"}));
        assert_eq!(n.value.unwrap().as_i64(), 42);
        let n = node(serde_json::json!({"kind": "IntegerLiteral", "value": 7}));
        assert_eq!(n.value.unwrap().as_i64(), 7);
    }

    #[test]
    fn comment_text_flattens_paragraphs() {
        let n = node(serde_json::json!({
            "kind": "FullComment",
            "inner": [
                {"kind": "ParagraphComment", "inner": [
                    {"kind": "TextComment", "text": " First line. "},
                    {"kind": "TextComment", "text": " Second line. "}
                ]}
            ]
        }));
        assert_eq!(n.comment_text().as_deref(), Some("First line.\nSecond line."));
    }

    #[test]
    fn index_prefers_nodes_with_children() {
        let root = node(serde_json::json!({
            "kind": "TranslationUnitDecl",
            "inner": [
                {"id": "0x1", "kind": "EnumDecl"},
                {"id": "0x1", "kind": "EnumDecl", "inner": [
                    {"id": "0x2", "kind": "EnumConstantDecl", "name": "A"}
                ]}
            ]
        }));
        let index = NodeIndex::build(&root);
        assert_eq!(index.get("0x1").map(|n| n.inner.len()), Some(1));
        assert!(index.get("0x2").is_some());
    }
}
