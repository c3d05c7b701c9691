use crate::error::{GraphError, Result};
use crate::language::{
    call_target_name, entity_kind_for, is_callee_kind, is_identifier_kind, GraphLanguage,
};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

/// One source file handed to the builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Repository-relative path, used as the file node id
    pub path: String,

    /// Language tag (`python`, `rs`, ...)
    pub language: String,

    /// Raw file contents; must decode as UTF-8
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(
        path: impl Into<String>,
        language: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            bytes: bytes.into(),
        }
    }

    /// Source file whose language tag is taken from the path extension
    pub fn detect(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        let language = Path::new(&path)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_string();
        Self::new(path, language, bytes)
    }
}

/// What happened to the input files during a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub files_indexed: usize,
    pub skipped_unsupported: usize,
    pub skipped_undecodable: usize,
    pub skipped_unparseable: usize,
    pub imports_seen: usize,
}

impl BuildReport {
    pub fn files_skipped(&self) -> usize {
        self.skipped_unsupported + self.skipped_undecodable + self.skipped_unparseable
    }
}

/// Result of [`GraphBuilder::build`]
#[derive(Debug, Clone)]
pub struct GraphBuild {
    pub graph: EntityGraph,
    pub report: BuildReport,
}

struct ParsedFile<'a> {
    path: &'a str,
    language: GraphLanguage,
    source: &'a str,
    tree: Tree,
}

/// Build an entity graph from source files
///
/// Pass 1 registers file, function and class nodes for every file; pass 2 resolves call
/// sites against the complete node set, so calls across files are linked regardless of
/// input order.
pub struct GraphBuilder {
    parsers: HashMap<GraphLanguage, Parser>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    fn parser(&mut self, language: GraphLanguage) -> Result<&mut Parser> {
        if !self.parsers.contains_key(&language) {
            let mut parser = Parser::new();
            parser
                .set_language(&language.tree_sitter_language())
                .map_err(|e| GraphError::LanguageSetup {
                    language: language.as_str().to_string(),
                    reason: e.to_string(),
                })?;
            self.parsers.insert(language, parser);
        }
        self.parsers
            .get_mut(&language)
            .ok_or_else(|| GraphError::LanguageSetup {
                language: language.as_str().to_string(),
                reason: "parser cache miss".to_string(),
            })
    }

    /// Build the entity graph for an ordered list of files
    pub fn build(&mut self, files: &[SourceFile]) -> Result<GraphBuild> {
        let mut report = BuildReport::default();
        let mut parsed = Vec::with_capacity(files.len());

        for file in files {
            let Some(language) = GraphLanguage::from_tag(&file.language) else {
                log::debug!("Skipping {} (unsupported language '{}')", file.path, file.language);
                report.skipped_unsupported += 1;
                continue;
            };
            let Ok(source) = std::str::from_utf8(&file.bytes) else {
                log::warn!("Skipping {} (not valid UTF-8)", file.path);
                report.skipped_undecodable += 1;
                continue;
            };
            let Some(tree) = self.parser(language)?.parse(source, None) else {
                log::warn!("Skipping {} (parser returned no tree)", file.path);
                report.skipped_unparseable += 1;
                continue;
            };
            parsed.push(ParsedFile {
                path: &file.path,
                language,
                source,
                tree,
            });
        }

        let mut graph = EntityGraph::new();

        // Phase 1: nodes for files and their definitions
        for file in &parsed {
            let line_count = file.source.lines().count();
            let (file_idx, _) = graph.add_node(EntityNode::file(file.path, line_count));
            collect_definitions(&mut graph, file_idx, file.tree.root_node(), file);
        }

        // Phase 2: call edges, resolved against every node from phase 1
        for file in &parsed {
            collect_calls(&mut graph, file.tree.root_node(), file, file.path, &mut report);
        }

        report.files_indexed = parsed.len();

        log::info!(
            "Built entity graph: {} nodes, {} edges ({} files, {} skipped)",
            graph.node_count(),
            graph.edge_count(),
            report.files_indexed,
            report.files_skipped()
        );

        Ok(GraphBuild { graph, report })
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn node_text<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    source.get(node.start_byte()..node.end_byte())
}

/// Name of a definition: its `name` field, else its first identifier-typed child
///
/// The field matters where a return type precedes the name (Java methods) or the name
/// is a `field_identifier` (Go methods).
fn definition_name<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    let named = node.child_by_field_name("name").or_else(|| {
        let mut cursor = node.walk();
        let first = node
            .children(&mut cursor)
            .find(|child| is_identifier_kind(child.kind()));
        first
    });
    named
        .and_then(|child| node_text(child, source))
        .filter(|name| !name.is_empty())
}

/// Call target: last segment of the callee expression
///
/// Java's `method_invocation` carries the method in `name` (the receiver is `object`);
/// other grammars put the callee in `function`.
fn callee_name<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    let callee = node
        .child_by_field_name("name")
        .or_else(|| node.child_by_field_name("function"))
        .filter(|child| is_callee_kind(child.kind()))
        .or_else(|| {
            let mut cursor = node.walk();
            let first = node
                .children(&mut cursor)
                .find(|child| is_callee_kind(child.kind()));
            first
        })?;
    call_target_name(node_text(callee, source)?)
}

fn collect_definitions(
    graph: &mut EntityGraph,
    file_idx: petgraph::graph::NodeIndex,
    node: Node,
    file: &ParsedFile,
) {
    let kind = node.kind();
    if file.language.is_definable(kind) {
        if let Some(name) = definition_name(node, file.source) {
            let entity = EntityNode::definition(
                file.path,
                name,
                entity_kind_for(kind),
                node.start_position().row + 1,
                node.end_position().row + 1,
            );
            let (idx, inserted) = graph.add_node(entity);
            if inserted {
                graph.add_edge(file_idx, idx, EdgeKind::Contains);
            }
        }
    }

    // Nested definitions are registered on their own
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_definitions(graph, file_idx, child, file);
    }
}

fn collect_calls(
    graph: &mut EntityGraph,
    node: Node,
    file: &ParsedFile,
    context: &str,
    report: &mut BuildReport,
) {
    let kind = node.kind();

    let scoped = file
        .language
        .is_definable(kind)
        .then(|| definition_name(node, file.source))
        .flatten()
        .map(|name| entity_id(file.path, name));
    let context = scoped.as_deref().unwrap_or(context);

    if file.language.is_call(kind) {
        if let Some(target) = callee_name(node, file.source) {
            link_calls(graph, context, target);
        }
    } else if file.language.is_import(kind) {
        // Module resolution is not attempted; imports add no edges
        report.imports_seen += 1;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(graph, child, file, context, report);
    }
}

/// Link `context` to every function named `target`, except itself
fn link_calls(graph: &mut EntityGraph, context: &str, target: &str) {
    let Some(from) = graph.find(context) else {
        return;
    };
    let targets = graph.functions_named(target).to_vec();
    for to in targets {
        if to != from {
            graph.add_edge(from, to, EdgeKind::Calls);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build(files: &[SourceFile]) -> GraphBuild {
        GraphBuilder::new().build(files).unwrap()
    }

    fn call_targets(graph: &EntityGraph, from: &str) -> Vec<String> {
        let idx = graph.find(from).unwrap();
        graph
            .callees(idx)
            .into_iter()
            .map(|t| graph.node(t).unwrap().id.clone())
            .collect()
    }

    #[test]
    fn test_build_simple_graph() {
        let files = vec![SourceFile::new(
            "test.rs",
            "rust",
            "fn foo() { bar(); }\nfn bar() {}\n",
        )];

        let graph = build(&files).graph;

        assert_eq!(graph.node_count(), 3);
        assert_eq!(call_targets(&graph, "test.rs:foo"), vec!["test.rs:bar"]);
    }

    #[test]
    fn python_classes_and_methods() {
        let source = r#"
class Cache:
    def get(self, key):
        return self.lookup(key)

    def lookup(self, key):
        return None
"#;
        let graph = build(&[SourceFile::new("cache.py", "python", source)]).graph;

        let cache = graph.node_by_id("cache.py:Cache").unwrap();
        assert_eq!(cache.kind, EntityKind::Class);
        assert_eq!(cache.start_line, 2);
        assert_eq!(
            graph.node_by_id("cache.py:get").unwrap().kind,
            EntityKind::Function
        );
        // Attribute calls resolve on their last segment
        assert_eq!(call_targets(&graph, "cache.py:get"), vec!["cache.py:lookup"]);
        assert_eq!(graph.edge_count_of(EdgeKind::Contains), 3);
    }

    #[test]
    fn top_level_calls_originate_from_file() {
        let source = "def main():\n    pass\n\nmain()\n";
        let graph = build(&[SourceFile::new("run.py", "py", source)]).graph;
        assert_eq!(call_targets(&graph, "run.py"), vec!["run.py:main"]);
    }

    #[test]
    fn recursion_does_not_self_link() {
        let source = "def walk(n):\n    return walk(n - 1)\n";
        let graph = build(&[SourceFile::new("rec.py", "python", source)]).graph;
        assert_eq!(graph.edge_count_of(EdgeKind::Calls), 0);
    }

    #[test]
    fn context_is_restored_after_nested_definition() {
        let source = r#"
def outer():
    def inner():
        helper()
    helper()

def helper():
    pass
"#;
        let graph = build(&[SourceFile::new("nest.py", "python", source)]).graph;

        assert!(graph.node_by_id("nest.py:inner").is_some());
        assert_eq!(call_targets(&graph, "nest.py:inner"), vec!["nest.py:helper"]);
        assert_eq!(call_targets(&graph, "nest.py:outer"), vec!["nest.py:helper"]);
    }

    #[test]
    fn javascript_methods_and_member_calls() {
        let source = r#"
import { log } from "./log";

class Queue {
  push(item) {
    this.flush();
  }
  flush() {}
}

function drain(q) {
  q.flush();
}
"#;
        let build = build(&[SourceFile::new("queue.js", "javascript", source)]);
        let graph = build.graph;

        assert_eq!(
            graph.node_by_id("queue.js:Queue").unwrap().kind,
            EntityKind::Class
        );
        assert_eq!(call_targets(&graph, "queue.js:push"), vec!["queue.js:flush"]);
        assert_eq!(call_targets(&graph, "queue.js:drain"), vec!["queue.js:flush"]);
        assert_eq!(build.report.imports_seen, 1);
    }

    fn sorted_call_targets(graph: &EntityGraph, from: &str) -> Vec<String> {
        let mut targets = call_targets(graph, from);
        targets.sort();
        targets
    }

    #[test]
    fn tsx_components_keep_definitions_and_jsx_calls() {
        let source = r#"
import React from "react";

function format(label: string): string {
  return label.trim();
}

function track(event: string) {}

export function Button({ label }: { label: string }) {
  return <button onClick={() => track("click")}>{format(label)}</button>;
}

export function Panel() {
  return (
    <div className="panel">
      <Button label="ok" />
    </div>
  );
}
"#;
        let build = build(&[SourceFile::detect("ui/Button.tsx", source)]);
        let graph = build.graph;

        for id in ["ui/Button.tsx:Button", "ui/Button.tsx:Panel", "ui/Button.tsx:format"] {
            assert_eq!(graph.node_by_id(id).unwrap().kind, EntityKind::Function, "{id}");
        }
        assert_eq!(
            sorted_call_targets(&graph, "ui/Button.tsx:Button"),
            vec!["ui/Button.tsx:format", "ui/Button.tsx:track"]
        );
        assert_eq!(build.report.imports_seen, 1);
    }

    #[test]
    fn go_functions_methods_and_selector_calls() {
        let source = r#"
package store

import "fmt"

type Store struct{}

func (s *Store) Save(key string) {
	s.flush()
	fmt.Println(key)
}

func (s *Store) flush() {}

func Open() *Store {
	s := &Store{}
	s.Save("init")
	return s
}
"#;
        let build = build(&[SourceFile::detect("store/store.go", source)]);
        let graph = build.graph;

        assert_eq!(graph.node_count(), 4);
        assert!(graph.node_by_id("store/store.go:Save").is_some());
        assert_eq!(
            call_targets(&graph, "store/store.go:Save"),
            vec!["store/store.go:flush"]
        );
        assert_eq!(
            call_targets(&graph, "store/store.go:Open"),
            vec!["store/store.go:Save"]
        );
        assert_eq!(build.report.imports_seen, 1);
    }

    #[test]
    fn java_classes_and_method_invocations() {
        let source = r#"
package app;

import java.util.List;

public class Repository {
    public String find(String id) {
        return normalize(id);
    }

    private String normalize(String id) {
        return id.trim();
    }

    public void save(Repository other) {
        other.find("x");
    }
}
"#;
        let build = build(&[SourceFile::detect("app/Repository.java", source)]);
        let graph = build.graph;

        assert_eq!(
            graph.node_by_id("app/Repository.java:Repository").unwrap().kind,
            EntityKind::Class
        );
        // Method names come from the `name` field, not the return type
        assert!(graph.node_by_id("app/Repository.java:String").is_none());
        assert_eq!(
            call_targets(&graph, "app/Repository.java:find"),
            vec!["app/Repository.java:normalize"]
        );
        assert_eq!(
            call_targets(&graph, "app/Repository.java:save"),
            vec!["app/Repository.java:find"]
        );
        assert_eq!(build.report.imports_seen, 1);
    }

    #[test]
    fn skips_are_counted_not_fatal() {
        let files = vec![
            SourceFile::new("README.md", "markdown", "# title"),
            SourceFile::new("bad.py", "python", vec![0xff, 0xfe, 0x00]),
            SourceFile::new("ok.py", "python", "def ok():\n    pass\n"),
        ];
        let build = build(&files);

        assert_eq!(
            build.report,
            BuildReport {
                files_indexed: 1,
                skipped_unsupported: 1,
                skipped_undecodable: 1,
                skipped_unparseable: 0,
                imports_seen: 0,
            }
        );
        assert_eq!(build.graph.node_count(), 2);
    }

    #[test]
    fn detect_uses_extension() {
        let file = SourceFile::detect("src/lib.rs", "fn a() {}");
        assert_eq!(file.language, "rs");
        let file = SourceFile::detect("Makefile", "all:");
        assert_eq!(file.language, "");
    }
}
