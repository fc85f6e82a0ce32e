//! Top-level node extraction and the move-top-level-node fact

use crate::error::AstResult;
use crate::parser::parse_source;
use crate::solutions::{calculate_solutions, Solution, SolutionOptions};
use recast_foundation::{EditLocation, LineIndex, TopLevelNodeKind};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use swc_common::Spanned;
use swc_ecma_ast::*;
use swc_ecma_visit::{Visit, VisitWith};

/// One statement at a file's outermost scope
///
/// `trivia_start..start` holds the whitespace and comments attributed to the
/// node: everything after the previous node's end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopLevelNode {
    pub kind: TopLevelNodeKind,
    pub start: usize,
    pub end: usize,
    pub trivia_start: usize,
    pub trivia_end: usize,
    /// Names this node declares
    pub identifiers: Vec<String>,
    /// Names this node uses that other top-level nodes declare
    pub dependencies: Vec<String>,
}

impl TopLevelNode {
    /// Split the node's text into its leading line breaks and the rest
    ///
    /// The leading part stays in place when nodes are reordered; the rest
    /// (comments, indentation and code) travels with the node.
    pub fn split_trivia<'t>(&self, text: &'t str) -> (&'t str, &'t str) {
        let leading = &text[self.trivia_start..self.start];
        let blank = leading.len() - leading.trim_start().len();
        let cut = leading[..blank].rfind('\n').map_or(0, |i| i + 1);
        (
            &text[self.trivia_start..self.trivia_start + cut],
            &text[self.trivia_start + cut..self.trivia_end],
        )
    }

    pub fn declares(&self, name: &str) -> bool {
        self.identifiers.iter().any(|identifier| identifier == name)
    }
}

/// Parse a file into its ordered top-level nodes
pub fn build_top_level_nodes(file_name: &Path, text: &str) -> AstResult<Vec<TopLevelNode>> {
    let parsed = parse_source(file_name, text)?;

    let mut nodes: Vec<TopLevelNode> = Vec::with_capacity(parsed.module.body.len());
    let mut used: Vec<BTreeSet<String>> = Vec::with_capacity(parsed.module.body.len());
    let mut previous_end = 0;

    for item in &parsed.module.body {
        let range = parsed.range(item.span());
        let (kind, identifiers) = classify(item);

        let mut collector = NameCollector::default();
        item.visit_with(&mut collector);
        used.push(collector.names);

        nodes.push(TopLevelNode {
            kind,
            start: range.start,
            end: range.end,
            trivia_start: previous_end,
            trivia_end: range.end,
            identifiers,
            dependencies: Vec::new(),
        });
        previous_end = range.end;
    }

    let declared: Vec<Vec<String>> = nodes.iter().map(|node| node.identifiers.clone()).collect();
    for (index, node) in nodes.iter_mut().enumerate() {
        node.dependencies = used[index]
            .iter()
            .filter(|name| {
                !node.declares(name)
                    && declared
                        .iter()
                        .enumerate()
                        .any(|(other, names)| other != index && names.contains(name))
            })
            .cloned()
            .collect();
    }

    Ok(nodes)
}

fn classify(item: &ModuleItem) -> (TopLevelNodeKind, Vec<String>) {
    match item {
        ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => (
            TopLevelNodeKind::Import,
            import
                .specifiers
                .iter()
                .map(|specifier| match specifier {
                    ImportSpecifier::Named(named) => named.local.sym.to_string(),
                    ImportSpecifier::Default(default) => default.local.sym.to_string(),
                    ImportSpecifier::Namespace(namespace) => namespace.local.sym.to_string(),
                })
                .collect(),
        ),
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => classify_decl(&export.decl),
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => match &export.decl {
            DefaultDecl::Class(class) => (
                TopLevelNodeKind::Class,
                class.ident.iter().map(|i| i.sym.to_string()).collect(),
            ),
            DefaultDecl::Fn(function) => (
                TopLevelNodeKind::Function,
                function.ident.iter().map(|i| i.sym.to_string()).collect(),
            ),
            DefaultDecl::TsInterfaceDecl(interface) => {
                (TopLevelNodeKind::Interface, vec![interface.id.sym.to_string()])
            }
        },
        ModuleItem::Stmt(Stmt::Decl(decl)) => classify_decl(decl),
        ModuleItem::Stmt(Stmt::Block(_)) => (TopLevelNodeKind::Block, Vec::new()),
        _ => (TopLevelNodeKind::Unknown, Vec::new()),
    }
}

fn classify_decl(decl: &Decl) -> (TopLevelNodeKind, Vec<String>) {
    match decl {
        Decl::Class(class) => (TopLevelNodeKind::Class, vec![class.ident.sym.to_string()]),
        Decl::Fn(function) => (TopLevelNodeKind::Function, vec![function.ident.sym.to_string()]),
        Decl::TsInterface(interface) => {
            (TopLevelNodeKind::Interface, vec![interface.id.sym.to_string()])
        }
        Decl::TsTypeAlias(alias) => (TopLevelNodeKind::TypeAlias, vec![alias.id.sym.to_string()]),
        Decl::TsEnum(ts_enum) => (TopLevelNodeKind::Enum, vec![ts_enum.id.sym.to_string()]),
        Decl::Var(var) => (
            TopLevelNodeKind::Variable,
            var.decls
                .iter()
                .filter_map(|declarator| match &declarator.name {
                    Pat::Ident(binding) => Some(binding.id.sym.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        _ => (TopLevelNodeKind::Unknown, Vec::new()),
    }
}

/// Names used in value and type positions
#[derive(Default)]
struct NameCollector {
    names: BTreeSet<String>,
}

impl Visit for NameCollector {
    fn visit_expr(&mut self, n: &Expr) {
        if let Expr::Ident(ident) = n {
            self.names.insert(ident.sym.to_string());
        }
        n.visit_children_with(self);
    }

    fn visit_prop(&mut self, n: &Prop) {
        if let Prop::Shorthand(ident) = n {
            self.names.insert(ident.sym.to_string());
        }
        n.visit_children_with(self);
    }

    fn visit_ts_entity_name(&mut self, n: &TsEntityName) {
        match n {
            TsEntityName::Ident(ident) => {
                self.names.insert(ident.sym.to_string());
            }
            other => other.visit_children_with(self),
        }
    }
}

/// A request to relocate the nodes covering some ranges of a file
#[derive(Debug, Clone)]
pub struct MoveTopLevelNodeUserCommand {
    pub file_name: PathBuf,
    pub file_text: String,
    pub ranges: Vec<EditLocation>,
    pub options: SolutionOptions,
}

impl MoveTopLevelNodeUserCommand {
    /// Command selecting the whole of one (zero-based) line
    pub fn for_line(
        file_name: impl Into<PathBuf>,
        file_text: impl Into<String>,
        line: u32,
        options: SolutionOptions,
    ) -> Self {
        let file_text = file_text.into();
        let length = LineIndex::new(&file_text).line_length(line).unwrap_or(0) as u32;
        Self {
            file_name: file_name.into(),
            file_text,
            ranges: vec![EditLocation::new(line, 0, line, length)],
            options,
        }
    }
}

/// Everything derived from one file snapshot for a move request
#[derive(Debug, Clone)]
pub struct MoveTopLevelNodeFact {
    pub separator: &'static str,
    pub nodes: Vec<TopLevelNode>,
    pub line_index: LineIndex,
    /// Indices of nodes whose trivia-inclusive range covers a requested range
    pub selected: Vec<usize>,
    /// Solutions per selected node, best first
    pub solutions: Vec<Vec<Solution>>,
}

pub fn build_move_top_level_node_fact(
    command: &MoveTopLevelNodeUserCommand,
) -> AstResult<MoveTopLevelNodeFact> {
    let line_index = LineIndex::new(&command.file_text);
    let nodes = build_top_level_nodes(&command.file_name, &command.file_text)?;

    let character_ranges: Vec<(usize, usize)> = command
        .ranges
        .iter()
        .filter_map(|location| line_index.range(location))
        .collect();

    let selected: Vec<usize> = nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| {
            character_ranges
                .iter()
                .any(|(start, end)| node.trivia_start <= *start && *end <= node.trivia_end)
        })
        .map(|(index, _)| index)
        .collect();

    let solutions = selected
        .iter()
        .map(|index| calculate_solutions(&nodes, *index, &command.options))
        .collect();

    tracing::debug!(
        file = %command.file_name.display(),
        nodes = nodes.len(),
        selected = ?selected,
        "Built move-top-level-node fact"
    );

    Ok(MoveTopLevelNodeFact {
        separator: line_index.separator(),
        nodes,
        line_index,
        selected,
        solutions,
    })
}
