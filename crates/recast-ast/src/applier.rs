//! AST change applier
//!
//! Each change is planned against an immutable view of the current project
//! (a freshly built [`ReferenceIndex`] plus the parsed declaring file) and
//! then committed file by file. A change that cannot be planned is skipped
//! without affecting the others.

use crate::changes::ChangeDescription;
use crate::error::{AstError, AstResult};
use crate::imports::{relative_module_specifier, render_named_import};
use crate::parser::{parse_source, ParsedSource, SourceRange};
use crate::project::{normalize_path, Project};
use crate::references::{
    member_key, CallSite, DeclarationTarget, Reference, ReferenceIndex, ReferenceNode,
    ReferenceResolver,
};
use crate::transformer::{dedent, line_indent, rewrite_slice, transform, whole_lines};
use indexmap::IndexMap;
use recast_foundation::TextEdit;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use swc_common::{Span, Spanned};
use swc_ecma_ast::*;
use swc_ecma_visit::{Visit, VisitWith};

/// Files rewritten by a batch of changes, with one report per change
#[derive(Debug, Clone, Default)]
pub struct ApplyResult {
    pub files: BTreeMap<PathBuf, String>,
    pub reports: Vec<ChangeReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeReport {
    pub kind: &'static str,
    pub file: PathBuf,
    pub outcome: ChangeOutcome,
    /// References whose syntactic shape did not match and were left alone
    pub skipped_references: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum ChangeOutcome {
    Applied { files: Vec<PathBuf>, edits: usize },
    Skipped { reason: SkipReason },
}

/// Why a whole change was not applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "reason")]
pub enum SkipReason {
    FileNotFound,
    Unparsable { message: String },
    DeclarationNotFound { name: String },
    ParameterNotListed { parameter: String },
    NoStaticMembers { class: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FileNotFound => write!(f, "file is not part of the project"),
            SkipReason::Unparsable { message } => write!(f, "file could not be parsed: {}", message),
            SkipReason::DeclarationNotFound { name } => write!(f, "declaration '{}' not found", name),
            SkipReason::ParameterNotListed { parameter } => {
                write!(f, "parameter '{}' is not in the described parameter list", parameter)
            }
            SkipReason::NoStaticMembers { class } => {
                write!(f, "class '{}' has no static members to split", class)
            }
        }
    }
}

#[derive(Debug, Default)]
struct ChangePlan {
    edits: BTreeMap<PathBuf, Vec<TextEdit>>,
    skipped_references: usize,
}

impl ChangePlan {
    fn push(&mut self, file: &Path, edit: TextEdit) {
        self.edits.entry(file.to_path_buf()).or_default().push(edit);
    }

    fn skip_reference(&mut self, reference: &Reference, why: &str) {
        self.skipped_references += 1;
        tracing::debug!(file = %reference.file.display(), node = ?reference.node, why, "Skipping reference");
    }
}

/// Applies change descriptions to a project snapshot
pub struct AstChangeApplier<'p> {
    project: &'p mut Project,
}

impl<'p> AstChangeApplier<'p> {
    pub fn new(project: &'p mut Project) -> Self {
        Self { project }
    }

    /// Apply changes in order; each sees the result of the previous ones
    pub fn apply(&mut self, changes: &[ChangeDescription]) -> ApplyResult {
        let mut touched = BTreeSet::new();
        let mut reports = Vec::with_capacity(changes.len());

        for change in changes {
            let span = tracing::info_span!(
                "apply_change",
                kind = change.kind_name(),
                file = %change.file_path().display()
            );
            let _enter = span.enter();

            let report = match self.plan(change) {
                Ok(plan) => {
                    let skipped_references = plan.skipped_references;
                    let (files, edits) = self.commit(plan);
                    tracing::info!(files = files.len(), edits, skipped_references, "Applied change");
                    touched.extend(files.iter().cloned());
                    ChangeReport {
                        kind: change.kind_name(),
                        file: change.file_path().to_path_buf(),
                        outcome: ChangeOutcome::Applied { files, edits },
                        skipped_references,
                    }
                }
                Err(reason) => {
                    tracing::info!(reason = %reason, "Skipping change");
                    ChangeReport {
                        kind: change.kind_name(),
                        file: change.file_path().to_path_buf(),
                        outcome: ChangeOutcome::Skipped { reason },
                        skipped_references: 0,
                    }
                }
            };
            reports.push(report);
        }

        let files = touched
            .into_iter()
            .filter_map(|path| {
                let text = self.project.get(&path)?.to_string();
                Some((path, text))
            })
            .collect();

        ApplyResult { files, reports }
    }

    /// Write every rewritten file of a result to disk
    pub fn write_changes(result: &ApplyResult) -> AstResult<()> {
        for (path, text) in &result.files {
            std::fs::write(path, text)
                .map_err(|err| AstError::Core(recast_foundation::RecastError::io_at(path, err)))?;
            tracing::debug!(file = %path.display(), "Wrote rewritten file");
        }
        Ok(())
    }

    fn commit(&mut self, plan: ChangePlan) -> (Vec<PathBuf>, usize) {
        let mut files = Vec::new();
        let mut applied = 0;

        for (file, edits) in plan.edits {
            let Some(source) = self.project.get(&file) else {
                continue;
            };
            let result = transform(&file, source, edits);
            if result.text != source {
                applied += result.applied;
                self.project.set(&file, result.text);
                files.push(file);
            }
        }

        (files, applied)
    }

    fn plan(&self, change: &ChangeDescription) -> Result<ChangePlan, SkipReason> {
        let file = normalize_path(change.file_path());

        match change {
            ChangeDescription::FunctionParameterDeleted {
                function_name,
                deleted_parameter,
                ..
            } => self.plan_parameter_deletion(change, &file, deleted_parameter, |parsed| {
                if !has_top_level_function(&parsed.module, function_name) {
                    return Err(SkipReason::DeclarationNotFound {
                        name: function_name.clone(),
                    });
                }
                Ok(DeclarationTarget::Function {
                    file: file.clone(),
                    name: function_name.clone(),
                })
            }),
            ChangeDescription::ArrowFunctionParameterDeleted {
                arrow_function_name,
                deleted_parameter,
                ..
            } => self.plan_parameter_deletion(change, &file, deleted_parameter, |parsed| {
                if !has_top_level_variable(&parsed.module, arrow_function_name) {
                    return Err(SkipReason::DeclarationNotFound {
                        name: arrow_function_name.clone(),
                    });
                }
                Ok(DeclarationTarget::Variable {
                    file: file.clone(),
                    name: arrow_function_name.clone(),
                })
            }),
            ChangeDescription::ClassMethodParameterDeleted {
                class_name,
                method_name,
                deleted_parameter,
                ..
            } => self.plan_parameter_deletion(change, &file, deleted_parameter, |parsed| {
                let not_found = || SkipReason::DeclarationNotFound {
                    name: format!("{}.{}", class_name, method_name),
                };
                let located = locate_class(parsed, class_name).ok_or_else(not_found)?;
                let is_static = located
                    .class
                    .body
                    .iter()
                    .find_map(|member| match member {
                        ClassMember::Method(method)
                            if method.kind == MethodKind::Method
                                && member_key(member).is_some_and(|key| &*key.sym == method_name) =>
                        {
                            Some(method.is_static)
                        }
                        _ => None,
                    })
                    .ok_or_else(not_found)?;
                Ok(DeclarationTarget::ClassMember {
                    file: file.clone(),
                    class: class_name.clone(),
                    member: method_name.clone(),
                    is_static,
                })
            }),
            ChangeDescription::ClassSplit { class_name, .. } => {
                let text = self.project.get(&file).ok_or(SkipReason::FileNotFound)?;
                let parsed = parse_declaring_file(&file, text)?;
                let index = ReferenceIndex::build(&*self.project);
                ClassSplit::new(&*self.project, &index, &file, text, &parsed, class_name)?.plan()
            }
        }
    }

    fn plan_parameter_deletion<F>(
        &self,
        change: &ChangeDescription,
        file: &Path,
        deleted_parameter: &str,
        resolve: F,
    ) -> Result<ChangePlan, SkipReason>
    where
        F: FnOnce(&ParsedSource) -> Result<DeclarationTarget, SkipReason>,
    {
        let position = change
            .deleted_parameter_index()
            .ok_or_else(|| SkipReason::ParameterNotListed {
                parameter: deleted_parameter.to_string(),
            })?;

        let text = self.project.get(file).ok_or(SkipReason::FileNotFound)?;
        let parsed = parse_declaring_file(file, text)?;
        let target = resolve(&parsed)?;
        let index = ReferenceIndex::build(&*self.project);

        Ok(plan_argument_removal(&index, &target, position))
    }
}

fn parse_declaring_file(file: &Path, text: &str) -> Result<ParsedSource, SkipReason> {
    parse_source(file, text).map_err(|err| SkipReason::Unparsable {
        message: err.to_string(),
    })
}

fn plan_argument_removal(index: &ReferenceIndex, target: &DeclarationTarget, position: usize) -> ChangePlan {
    let mut plan = ChangePlan::default();

    for reference in index.find_references(target) {
        let call = match &reference.node {
            ReferenceNode::Declaration { .. } | ReferenceNode::ImportSpecifier { .. } => continue,
            ReferenceNode::Callee { call, .. } => call,
            ReferenceNode::PropertyAccess {
                call: Some(call), ..
            } => call,
            _ => {
                plan.skip_reference(&reference, "not a call");
                continue;
            }
        };

        match argument_removal(call, position) {
            ArgumentRemoval::Remove(range) => plan.push(
                &reference.file,
                TextEdit::delete(range.start, range.end)
                    .with_description(format!("remove argument {}", position)),
            ),
            ArgumentRemoval::Absent => {}
            ArgumentRemoval::Spread => plan.skip_reference(&reference, "spread argument"),
        }
    }

    plan
}

enum ArgumentRemoval {
    Remove(SourceRange),
    Absent,
    Spread,
}

/// Range to delete so that argument `position` disappears with its separator
///
/// A spread at or before the position makes the positional mapping unknown,
/// so such calls are left alone.
fn argument_removal(call: &CallSite, position: usize) -> ArgumentRemoval {
    let arguments = &call.arguments;
    if arguments.iter().take(position + 1).any(|argument| argument.spread) {
        return ArgumentRemoval::Spread;
    }
    let Some(argument) = arguments.get(position) else {
        return ArgumentRemoval::Absent;
    };

    let range = match (position.checked_sub(1), arguments.get(position + 1)) {
        (_, Some(next)) => SourceRange::new(argument.range.start, next.range.start),
        (Some(previous), None) => {
            SourceRange::new(arguments[previous].range.end, argument.range.end)
        }
        // sole argument: take any trailing comma up to the closing parenthesis
        (None, None) => SourceRange::new(argument.range.start, call.range.end - 1),
    };
    ArgumentRemoval::Remove(range)
}

fn top_level_decls(module: &Module) -> impl Iterator<Item = &Decl> {
    module.body.iter().filter_map(|item| match item {
        ModuleItem::Stmt(Stmt::Decl(decl)) => Some(decl),
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => Some(&export.decl),
        _ => None,
    })
}

fn has_top_level_function(module: &Module, name: &str) -> bool {
    let declared = top_level_decls(module)
        .any(|decl| matches!(decl, Decl::Fn(function) if &*function.ident.sym == name));
    declared
        || module.body.iter().any(|item| {
            matches!(
                item,
                ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(ExportDefaultDecl {
                    decl: DefaultDecl::Fn(FnExpr { ident: Some(ident), .. }),
                    ..
                })) if &*ident.sym == name
            )
        })
}

fn has_top_level_variable(module: &Module, name: &str) -> bool {
    top_level_decls(module).any(|decl| match decl {
        Decl::Var(var) => var.decls.iter().any(
            |declarator| matches!(&declarator.name, Pat::Ident(binding) if &*binding.id.sym == name),
        ),
        _ => false,
    })
}

struct LocatedClass {
    class: Class,
    /// The whole statement, including `export` when present
    statement: SourceRange,
    top_level: bool,
}

fn locate_class(parsed: &ParsedSource, name: &str) -> Option<LocatedClass> {
    for item in &parsed.module.body {
        let class = match item {
            ModuleItem::Stmt(Stmt::Decl(Decl::Class(decl)))
            | ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl {
                decl: Decl::Class(decl),
                ..
            })) if &*decl.ident.sym == name => Some(&*decl.class),
            ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(ExportDefaultDecl {
                decl:
                    DefaultDecl::Class(ClassExpr {
                        ident: Some(ident),
                        class,
                        ..
                    }),
                ..
            })) if &*ident.sym == name => Some(&**class),
            _ => None,
        };
        if let Some(class) = class {
            return Some(LocatedClass {
                class: class.clone(),
                statement: parsed.range(item.span()),
                top_level: true,
            });
        }
    }

    let mut locator = NestedClassLocator { name, found: None };
    parsed.module.visit_with(&mut locator);
    locator.found.map(|(class, span)| LocatedClass {
        class,
        statement: parsed.range(span),
        top_level: false,
    })
}

struct NestedClassLocator<'n> {
    name: &'n str,
    found: Option<(Class, Span)>,
}

impl Visit for NestedClassLocator<'_> {
    fn visit_class_decl(&mut self, n: &ClassDecl) {
        if self.found.is_none() && &*n.ident.sym == self.name {
            self.found = Some(((*n.class).clone(), n.class.span));
            return;
        }
        n.visit_children_with(self);
    }
}

/// A static member being promoted to a top-level declaration
enum StaticMember<'c> {
    Method {
        name: String,
        range: SourceRange,
        method: &'c ClassMethod,
    },
    Property {
        name: String,
        range: SourceRange,
        prop: &'c ClassProp,
    },
}

impl StaticMember<'_> {
    fn name(&self) -> &str {
        match self {
            StaticMember::Method { name, .. } | StaticMember::Property { name, .. } => name,
        }
    }

    fn range(&self) -> SourceRange {
        match self {
            StaticMember::Method { range, .. } | StaticMember::Property { range, .. } => *range,
        }
    }
}

/// Planning state for decomposing a class's static members
struct ClassSplit<'a> {
    project: &'a Project,
    index: &'a ReferenceIndex,
    file: &'a Path,
    text: &'a str,
    parsed: &'a ParsedSource,
    class_name: &'a str,
    located: LocatedClass,
}

impl<'a> ClassSplit<'a> {
    fn new(
        project: &'a Project,
        index: &'a ReferenceIndex,
        file: &'a Path,
        text: &'a str,
        parsed: &'a ParsedSource,
        class_name: &'a str,
    ) -> Result<Self, SkipReason> {
        let located = locate_class(parsed, class_name).ok_or_else(|| SkipReason::DeclarationNotFound {
            name: class_name.to_string(),
        })?;
        Ok(Self {
            project,
            index,
            file,
            text,
            parsed,
            class_name,
            located,
        })
    }

    fn static_members(&self) -> Vec<StaticMember<'_>> {
        self.located
            .class
            .body
            .iter()
            .filter_map(|member| {
                let name = member_key(member)?.sym.to_string();
                match member {
                    ClassMember::Method(method)
                        if method.is_static && method.kind == MethodKind::Method =>
                    {
                        Some(StaticMember::Method {
                            name,
                            range: self.parsed.range(method.span),
                            method,
                        })
                    }
                    ClassMember::ClassProp(prop) if prop.is_static => Some(StaticMember::Property {
                        name,
                        range: self.parsed.range(prop.span),
                        prop,
                    }),
                    _ => None,
                }
            })
            .collect()
    }

    fn plan(&self) -> Result<ChangePlan, SkipReason> {
        let members = self.static_members();
        if members.is_empty() {
            return Err(SkipReason::NoStaticMembers {
                class: self.class_name.to_string(),
            });
        }

        let remaining = self
            .located
            .class
            .body
            .iter()
            .filter(|member| !matches!(member, ClassMember::Empty(_)))
            .count()
            - members.len();
        let class_removed = remaining == 0;

        let mut plan = ChangePlan::default();
        let member_ranges: Vec<SourceRange> = members.iter().map(StaticMember::range).collect();
        let mut inner_edits = Vec::new();
        let mut imports_needed: IndexMap<PathBuf, Vec<String>> = IndexMap::new();
        let mut promoted = Vec::new();

        // Rewrite uses first: promoted bodies are rendered with their own
        // references already rewritten.
        for member in &members {
            let name = member.name();
            let usages: Vec<Reference> = self
                .index
                .find_references(&DeclarationTarget::ClassMember {
                    file: self.file.to_path_buf(),
                    class: self.class_name.to_string(),
                    member: name.to_string(),
                    is_static: true,
                })
                .into_iter()
                .filter(|reference| !matches!(reference.node, ReferenceNode::Declaration { .. }))
                .collect();

            if matches!(member, StaticMember::Property { .. }) && usages.is_empty() {
                tracing::debug!(member = name, "Dropping unreferenced static property");
                continue;
            }
            promoted.push(member);

            for usage in usages {
                let ReferenceNode::PropertyAccess { member: access, .. } = usage.node else {
                    plan.skip_reference(&usage, "not a property access");
                    continue;
                };
                let edit = TextEdit::replace(access.start, access.end, name)
                    .with_description(format!("{}.{} -> {}", self.class_name, name, name));

                if usage.file == self.file {
                    if member_ranges.iter().any(|range| range.contains(access)) {
                        inner_edits.push(edit);
                    } else {
                        plan.push(&usage.file, edit);
                    }
                } else {
                    let names = imports_needed.entry(usage.file.clone()).or_default();
                    if !names.iter().any(|existing| existing == name) {
                        names.push(name.to_string());
                    }
                    plan.push(&usage.file, edit);
                }
            }
        }

        let class_range = self.class_range();
        let indent = line_indent(self.text, self.located.statement.start);
        let declarations: Vec<String> = promoted
            .iter()
            .map(|member| self.render(member, &inner_edits, indent.len()))
            .collect();
        let separator = format!("\n\n{}", indent);
        let joined = declarations.join(separator.as_str());

        if class_removed {
            let edit = if joined.is_empty() {
                let range = whole_lines(self.text, class_range);
                TextEdit::delete(range.start, range.end)
            } else {
                TextEdit::replace(class_range.start, class_range.end, joined)
            };
            plan.push(self.file, edit.with_description(format!("split class {}", self.class_name)));
            self.remove_stale_imports(&mut plan, &mut imports_needed);
        } else {
            if !joined.is_empty() {
                plan.push(
                    self.file,
                    TextEdit::insert(class_range.start, format!("{}\n\n{}", joined, indent)),
                );
            }
            for range in &member_ranges {
                let range = whole_lines(self.text, *range);
                plan.push(self.file, TextEdit::delete(range.start, range.end));
            }
        }

        for (file, names) in imports_needed {
            if file == self.file {
                continue;
            }
            let specifier = relative_module_specifier(&file, self.file);
            let offset = self.index.first_import_offset(&file).unwrap_or(0);
            plan.push(
                &file,
                TextEdit::insert(offset, format!("{}\n", render_named_import(&names, &specifier)))
                    .with_description("import promoted members"),
            );
        }

        Ok(plan)
    }

    /// The class statement plus directly preceding `//` comment lines
    fn class_range(&self) -> SourceRange {
        let statement = self.located.statement;
        let mut start = statement.start;
        let mut line_start = self.text[..start].rfind('\n').map_or(0, |i| i + 1);

        while line_start > 0 {
            let previous_start = self.text[..line_start - 1].rfind('\n').map_or(0, |i| i + 1);
            let line = &self.text[previous_start..line_start - 1];
            let trimmed = line.trim_start();
            if !trimmed.starts_with("//") {
                break;
            }
            start = previous_start + (line.len() - trimmed.len());
            line_start = previous_start;
        }

        SourceRange::new(start, statement.end)
    }

    fn render(&self, member: &StaticMember<'_>, inner_edits: &[TextEdit], class_indent: usize) -> String {
        let export = if self.located.top_level { "export " } else { "" };
        let slice = |range: SourceRange| rewrite_slice(self.text, range, inner_edits);
        let member_indent = line_indent(self.text, member.range().start).len();

        let rendered = match member {
            StaticMember::Method { name, method, .. } => {
                let function = &method.function;
                let mut out = format!(
                    "{}{}function{} {}",
                    export,
                    if function.is_async { "async " } else { "" },
                    if function.is_generator { "*" } else { "" },
                    name
                );
                if let Some(type_params) = &function.type_params {
                    out.push_str(&slice(self.parsed.range(type_params.span)));
                }
                out.push('(');
                if let (Some(first), Some(last)) = (function.params.first(), function.params.last()) {
                    out.push_str(&slice(SourceRange::new(
                        self.parsed.offset(first.span.lo),
                        self.parsed.offset(last.span.hi),
                    )));
                }
                out.push(')');
                if let Some(return_type) = &function.return_type {
                    out.push_str(": ");
                    out.push_str(&slice(self.parsed.range(return_type.type_ann.span())));
                }
                match &function.body {
                    Some(body) => {
                        out.push(' ');
                        out.push_str(&slice(self.parsed.range(body.span)));
                    }
                    None => out.push(';'),
                }
                out
            }
            StaticMember::Property { name, prop, .. } => {
                let keyword = if prop.readonly && prop.value.is_some() {
                    "const"
                } else {
                    "let"
                };
                let mut out = format!("{}{} {}", export, keyword, name);
                if let Some(annotation) = &prop.type_ann {
                    out.push_str(": ");
                    out.push_str(&slice(self.parsed.range(annotation.type_ann.span())));
                }
                if let Some(value) = &prop.value {
                    out.push_str(" = ");
                    out.push_str(&slice(self.parsed.range(value.span())));
                }
                out.push(';');
                out
            }
        };

        dedent(&rendered, member_indent.saturating_sub(class_indent))
    }

    /// Drop import specifiers of the removed class
    ///
    /// A named specifier sharing its statement with other names is replaced
    /// by the promoted names that file needs, instead of a separate import.
    fn remove_stale_imports(&self, plan: &mut ChangePlan, imports_needed: &mut IndexMap<PathBuf, Vec<String>>) {
        let references = self.index.find_references(&DeclarationTarget::Class {
            file: self.file.to_path_buf(),
            name: self.class_name.to_string(),
        });
        for reference in references {
            let ReferenceNode::ImportSpecifier {
                statement,
                specifier,
                removal,
            } = reference.node
            else {
                continue;
            };

            let keeps_statement = removal.start > statement.start || removal.end < statement.end;
            let named = self
                .project
                .get(&reference.file)
                .and_then(|text| text.get(statement.start..specifier.start))
                .is_some_and(|head| head.contains('{'));
            if keeps_statement && named {
                if let Some(names) = imports_needed.shift_remove(&reference.file) {
                    plan.push(
                        &reference.file,
                        TextEdit::replace(specifier.start, specifier.end, names.join(", "))
                            .with_description(format!("import promoted members of {}", self.class_name)),
                    );
                    continue;
                }
            }

            plan.push(
                &reference.file,
                TextEdit::delete(removal.start, removal.end)
                    .with_description(format!("remove import of {}", self.class_name)),
            );
        }
    }
}
