//! Syntactic reference index over a project snapshot
//!
//! One swc pass per file records imports, top-level declarations, class
//! members, identifier uses, member accesses, call sites and bindings whose
//! type is a class. Lookups then join those facts across files through import
//! specifiers that resolve to the declaring file.
//!
//! Every identifier use carries the lexical scope that binds its name, so a
//! parameter or local that shadows a declaration is never taken for it.

use crate::parser::{parse_source, ParsedSource, SourceRange};
use crate::project::Project;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use swc_common::Spanned;
use swc_ecma_ast::*;
use swc_ecma_visit::{Visit, VisitWith};

/// Something that can enumerate every use site of a declaration
pub trait ReferenceResolver {
    fn find_references(&self, target: &DeclarationTarget) -> Vec<Reference>;
}

/// A declaration whose references are requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationTarget {
    Function {
        file: PathBuf,
        name: String,
    },
    Variable {
        file: PathBuf,
        name: String,
    },
    Class {
        file: PathBuf,
        name: String,
    },
    ClassMember {
        file: PathBuf,
        class: String,
        member: String,
        is_static: bool,
    },
}

impl DeclarationTarget {
    pub fn file(&self) -> &Path {
        match self {
            DeclarationTarget::Function { file, .. }
            | DeclarationTarget::Variable { file, .. }
            | DeclarationTarget::Class { file, .. }
            | DeclarationTarget::ClassMember { file, .. } => file,
        }
    }
}

/// One use site of a declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub file: PathBuf,
    pub node: ReferenceNode,
}

/// A call expression and its argument ranges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub range: SourceRange,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argument {
    pub range: SourceRange,
    pub spread: bool,
}

/// Syntactic context of a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceNode {
    /// The declaring name itself
    Declaration { name: SourceRange },
    /// A bare identifier that is not called
    Identifier { range: SourceRange },
    /// An identifier that is the callee of a call
    Callee { callee: SourceRange, call: CallSite },
    /// `object.member`, with the call if the access is immediately called
    PropertyAccess {
        member: SourceRange,
        call: Option<CallSite>,
    },
    /// An import specifier binding the declaration
    ImportSpecifier {
        statement: SourceRange,
        specifier: SourceRange,
        /// Range to delete to drop the specifier cleanly; the whole statement
        /// when it is the only specifier
        removal: SourceRange,
    },
}

#[derive(Debug, Clone)]
struct ImportStatement {
    range: SourceRange,
    source: String,
    resolved: Option<PathBuf>,
    specifiers: Vec<ImportedName>,
}

#[derive(Debug, Clone)]
struct ImportedName {
    local: String,
    imported: Imported,
    range: SourceRange,
    removal: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Imported {
    Named(String),
    Default,
    Namespace,
}

#[derive(Debug, Clone)]
struct DeclaredName {
    name: String,
    range: SourceRange,
}

/// Identifies an inner lexical scope of a file; module scope has none
type ScopeId = usize;

#[derive(Debug, Clone)]
struct DeclaredMember {
    class: String,
    member: String,
    is_static: bool,
    range: SourceRange,
    /// Scope binding the class name
    scope: Option<ScopeId>,
}

#[derive(Debug, Clone)]
struct IdentifierUse {
    name: String,
    range: SourceRange,
    call: Option<CallSite>,
    binding: Option<ScopeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MemberObject {
    Identifier {
        name: String,
        binding: Option<ScopeId>,
    },
    This(Option<ThisBinding>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ThisBinding {
    class: Option<String>,
    scope: Option<ScopeId>,
    is_static: bool,
}

#[derive(Debug, Clone)]
struct MemberUse {
    object: MemberObject,
    property: String,
    range: SourceRange,
    call: Option<CallSite>,
}

#[derive(Debug, Clone)]
struct TypedBinding {
    binding: String,
    class: String,
}

#[derive(Debug, Default)]
struct FileFacts {
    imports: Vec<ImportStatement>,
    declarations: Vec<DeclaredName>,
    default_export: Option<String>,
    class_members: Vec<DeclaredMember>,
    identifiers: Vec<IdentifierUse>,
    members: Vec<MemberUse>,
    typed_bindings: Vec<TypedBinding>,
}

/// Rebuildable index from declarations to their use sites
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    files: BTreeMap<PathBuf, FileFacts>,
}

impl ReferenceIndex {
    /// Index every parsable file of the project; unparsable files are skipped
    pub fn build(project: &Project) -> Self {
        let mut files = BTreeMap::new();

        for (path, text) in project.files() {
            let parsed = match parse_source(path, text) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "Skipping unparsable file in reference index");
                    continue;
                }
            };

            let mut facts = collect_file_facts(&parsed, text);
            for import in &mut facts.imports {
                import.resolved = project.resolve_module(path, &import.source);
            }
            files.insert(path.to_path_buf(), facts);
        }

        tracing::debug!(files = files.len(), "Built reference index");
        Self { files }
    }

    pub fn indexed_files(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Start offset of the first import statement of a file
    pub fn first_import_offset(&self, file: &Path) -> Option<usize> {
        self.files
            .get(file)?
            .imports
            .first()
            .map(|import| import.range.start)
    }

    /// Names a file binds to a declaration of `declaring`, plus namespace
    /// imports of that file
    fn local_names(&self, file: &Path, declaring: &Path, name: &str) -> (Vec<String>, Vec<String>) {
        if file == declaring {
            return (vec![name.to_string()], Vec::new());
        }

        let Some(facts) = self.files.get(file) else {
            return (Vec::new(), Vec::new());
        };
        let exported_default = self
            .files
            .get(declaring)
            .and_then(|declaring| declaring.default_export.as_deref())
            == Some(name);

        let mut locals = Vec::new();
        let mut namespaces = Vec::new();
        for import in facts
            .imports
            .iter()
            .filter(|import| import.resolved.as_deref() == Some(declaring))
        {
            for specifier in &import.specifiers {
                match &specifier.imported {
                    Imported::Named(imported) if imported == name => {
                        locals.push(specifier.local.clone())
                    }
                    Imported::Default if exported_default => locals.push(specifier.local.clone()),
                    Imported::Namespace => namespaces.push(specifier.local.clone()),
                    _ => {}
                }
            }
        }
        (locals, namespaces)
    }

    fn import_references(&self, file: &Path, facts: &FileFacts, declaring: &Path, name: &str) -> Vec<Reference> {
        let exported_default = self
            .files
            .get(declaring)
            .and_then(|declaring| declaring.default_export.as_deref())
            == Some(name);

        facts
            .imports
            .iter()
            .filter(|import| import.resolved.as_deref() == Some(declaring))
            .flat_map(|import| {
                import
                    .specifiers
                    .iter()
                    .filter(move |specifier| match &specifier.imported {
                        Imported::Named(imported) => imported == name,
                        Imported::Default => exported_default,
                        Imported::Namespace => false,
                    })
                    .map(move |specifier| Reference {
                        file: file.to_path_buf(),
                        node: ReferenceNode::ImportSpecifier {
                            statement: import.range,
                            specifier: specifier.range,
                            removal: specifier.removal,
                        },
                    })
            })
            .collect()
    }

    fn binding_references(&self, declaring: &Path, name: &str) -> Vec<Reference> {
        let mut references = Vec::new();

        for (file, facts) in &self.files {
            if file == declaring {
                references.extend(
                    facts
                        .declarations
                        .iter()
                        .filter(|declared| declared.name == name)
                        .map(|declared| Reference {
                            file: file.clone(),
                            node: ReferenceNode::Declaration {
                                name: declared.range,
                            },
                        }),
                );
            } else {
                references.extend(self.import_references(file, facts, declaring, name));
            }

            let (locals, namespaces) = self.local_names(file, declaring, name);
            for use_site in facts
                .identifiers
                .iter()
                .filter(|u| u.binding.is_none() && locals.contains(&u.name))
            {
                let node = match &use_site.call {
                    Some(call) => ReferenceNode::Callee {
                        callee: use_site.range,
                        call: call.clone(),
                    },
                    None => ReferenceNode::Identifier {
                        range: use_site.range,
                    },
                };
                references.push(Reference {
                    file: file.clone(),
                    node,
                });
            }

            for member in facts.members.iter().filter(|m| {
                m.property == name
                    && matches!(&m.object, MemberObject::Identifier { name, binding: None } if namespaces.contains(name))
            }) {
                references.push(Reference {
                    file: file.clone(),
                    node: ReferenceNode::PropertyAccess {
                        member: member.range,
                        call: member.call.clone(),
                    },
                });
            }
        }

        references
    }

    fn member_references(&self, declaring: &Path, class: &str, member: &str, is_static: bool) -> Vec<Reference> {
        let mut references = Vec::new();

        for (file, facts) in &self.files {
            let (class_locals, _) = self.local_names(file, declaring, class);
            let in_declaring_file = file == declaring;

            // Imported names live in module scope; in the declaring file the
            // class may itself be declared in an inner scope.
            let mut class_scopes = vec![None];
            if in_declaring_file {
                let mut declared: Vec<&DeclaredMember> = facts
                    .class_members
                    .iter()
                    .filter(|d| d.class == class && d.member == member && d.is_static == is_static)
                    .collect();
                // a top-level class wins over nested classes of the same name
                if declared.iter().any(|d| d.scope.is_none()) {
                    declared.retain(|d| d.scope.is_none());
                }
                class_scopes = declared.iter().map(|d| d.scope).collect();
                references.extend(declared.into_iter().map(|d| Reference {
                    file: file.clone(),
                    node: ReferenceNode::Declaration { name: d.range },
                }));
            }

            let typed: HashSet<&str> = if is_static {
                HashSet::new()
            } else {
                facts
                    .typed_bindings
                    .iter()
                    .filter(|b| class_locals.contains(&b.class))
                    .map(|b| b.binding.as_str())
                    .collect()
            };

            for use_site in facts.members.iter().filter(|m| m.property == member) {
                let matches = match &use_site.object {
                    MemberObject::Identifier { name, binding } if is_static => {
                        class_locals.contains(name) && class_scopes.contains(binding)
                    }
                    MemberObject::Identifier { name, .. } => typed.contains(name.as_str()),
                    MemberObject::This(Some(binding)) => {
                        in_declaring_file
                            && binding.class.as_deref() == Some(class)
                            && class_scopes.contains(&binding.scope)
                            && binding.is_static == is_static
                    }
                    MemberObject::This(None) => false,
                };
                if matches {
                    references.push(Reference {
                        file: file.clone(),
                        node: ReferenceNode::PropertyAccess {
                            member: use_site.range,
                            call: use_site.call.clone(),
                        },
                    });
                }
            }
        }

        references
    }
}

impl ReferenceResolver for ReferenceIndex {
    fn find_references(&self, target: &DeclarationTarget) -> Vec<Reference> {
        match target {
            DeclarationTarget::Function { file, name }
            | DeclarationTarget::Variable { file, name }
            | DeclarationTarget::Class { file, name } => self.binding_references(file, name),
            DeclarationTarget::ClassMember {
                file,
                class,
                member,
                is_static,
            } => self.member_references(file, class, member, *is_static),
        }
    }
}

fn collect_file_facts(parsed: &ParsedSource, text: &str) -> FileFacts {
    let mut facts = FileFacts::default();

    for item in &parsed.module.body {
        match item {
            ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
                facts.imports.push(import_statement(parsed, text, import));
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
                declared_names(parsed, &export.decl, &mut facts.declarations);
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => {
                let ident = match &export.decl {
                    DefaultDecl::Class(class) => class.ident.as_ref(),
                    DefaultDecl::Fn(function) => function.ident.as_ref(),
                    DefaultDecl::TsInterfaceDecl(_) => None,
                };
                if let Some(ident) = ident {
                    facts.default_export = Some(ident.sym.to_string());
                    facts.declarations.push(DeclaredName {
                        name: ident.sym.to_string(),
                        range: parsed.range(ident.span),
                    });
                }
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(export)) => {
                if let Expr::Ident(ident) = &*export.expr {
                    facts.default_export = Some(ident.sym.to_string());
                }
            }
            ModuleItem::Stmt(Stmt::Decl(decl)) => {
                declared_names(parsed, decl, &mut facts.declarations);
            }
            _ => {}
        }
    }

    let mut collector = UseCollector {
        parsed,
        facts: &mut facts,
        this_stack: Vec::new(),
        scopes: Vec::new(),
        next_scope: 0,
    };
    parsed.module.visit_with(&mut collector);

    facts
}

fn declared_names(parsed: &ParsedSource, decl: &Decl, out: &mut Vec<DeclaredName>) {
    let mut push = |ident: &Ident| {
        out.push(DeclaredName {
            name: ident.sym.to_string(),
            range: parsed.range(ident.span),
        })
    };
    match decl {
        Decl::Fn(function) => push(&function.ident),
        Decl::Class(class) => push(&class.ident),
        Decl::Var(var) => {
            for declarator in &var.decls {
                if let Pat::Ident(binding) = &declarator.name {
                    push(&binding.id);
                }
            }
        }
        Decl::TsEnum(ts_enum) => push(&ts_enum.id),
        _ => {}
    }
}

fn import_statement(parsed: &ParsedSource, text: &str, import: &ImportDecl) -> ImportStatement {
    let range = parsed.range(import.span);
    let source = parsed
        .range(import.src.span)
        .slice(text)
        .trim_matches(|c| c == '\'' || c == '"')
        .to_string();

    let mut specifiers: Vec<ImportedName> = import
        .specifiers
        .iter()
        .map(|specifier| match specifier {
            ImportSpecifier::Named(named) => {
                let imported = match &named.imported {
                    Some(ModuleExportName::Ident(ident)) => ident.sym.to_string(),
                    Some(ModuleExportName::Str(name)) => parsed
                        .range(name.span)
                        .slice(text)
                        .trim_matches(|c| c == '\'' || c == '"')
                        .to_string(),
                    None => named.local.sym.to_string(),
                };
                ImportedName {
                    local: named.local.sym.to_string(),
                    imported: Imported::Named(imported),
                    range: parsed.range(named.span),
                    removal: SourceRange::default(),
                }
            }
            ImportSpecifier::Default(default) => ImportedName {
                local: default.local.sym.to_string(),
                imported: Imported::Default,
                range: parsed.range(default.span),
                removal: SourceRange::default(),
            },
            ImportSpecifier::Namespace(namespace) => ImportedName {
                local: namespace.local.sym.to_string(),
                imported: Imported::Namespace,
                range: parsed.range(namespace.span),
                removal: SourceRange::default(),
            },
        })
        .collect();

    for i in 0..specifiers.len() {
        specifiers[i].removal = specifier_removal(text, range, &specifiers, i);
    }

    ImportStatement {
        range,
        source,
        resolved: None,
        specifiers,
    }
}

/// Range to delete so that specifier `i` disappears and the statement stays valid
fn specifier_removal(text: &str, statement: SourceRange, specifiers: &[ImportedName], i: usize) -> SourceRange {
    let current = &specifiers[i];

    if specifiers.len() == 1 {
        return crate::transformer::whole_lines(text, statement);
    }

    if current.imported == Imported::Default {
        let after = &text[current.range.end..statement.end];
        let end = after
            .find(',')
            .map(|comma| {
                let rest = &after[comma + 1..];
                current.range.end + comma + 1 + (rest.len() - rest.trim_start().len())
            })
            .unwrap_or(current.range.end);
        return SourceRange::new(current.range.start, end);
    }

    let named_siblings = specifiers
        .iter()
        .filter(|s| matches!(s.imported, Imported::Named(_)))
        .count();
    let is_named = matches!(current.imported, Imported::Named(_));

    if is_named && named_siblings == 1 {
        // `import D, { x }`: drop the whole brace group along with its comma
        let previous = &specifiers[i - 1];
        let end = text[current.range.end..statement.end]
            .find('}')
            .map(|brace| current.range.end + brace + 1)
            .unwrap_or(current.range.end);
        return SourceRange::new(previous.range.end, end);
    }

    match specifiers.get(i + 1) {
        Some(next) => SourceRange::new(current.range.start, next.range.start),
        None => SourceRange::new(specifiers[i - 1].range.end, current.range.end),
    }
}

/// Names declared by one inner lexical scope
struct Scope {
    id: ScopeId,
    names: HashSet<String>,
}

struct UseCollector<'a> {
    parsed: &'a ParsedSource,
    facts: &'a mut FileFacts,
    this_stack: Vec<Option<ThisBinding>>,
    scopes: Vec<Scope>,
    next_scope: ScopeId,
}

impl UseCollector<'_> {
    fn this_binding(&self) -> Option<ThisBinding> {
        self.this_stack.last().cloned().flatten()
    }

    /// Innermost scope declaring `name`; `None` means module scope or global
    fn binding_of(&self, name: &str) -> Option<ScopeId> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.names.contains(name))
            .map(|scope| scope.id)
    }

    fn scoped(&mut self, names: HashSet<String>, inner: impl FnOnce(&mut Self)) {
        self.next_scope += 1;
        self.scopes.push(Scope {
            id: self.next_scope,
            names,
        });
        inner(self);
        self.scopes.pop();
    }

    /// Parameters and hoisted `var`s of a function, then its children
    fn visit_function_scope(&mut self, function: &Function) {
        let mut names = hoisted_vars(&function.body);
        for param in &function.params {
            pat_names(&param.pat, &mut names);
        }
        self.scoped(names, |this| function.visit_children_with(this));
    }

    fn call_site(&self, call: &CallExpr) -> CallSite {
        CallSite {
            range: self.parsed.range(call.span),
            arguments: call
                .args
                .iter()
                .map(|arg| {
                    let expr = self.parsed.range(arg.expr.span());
                    let start = arg
                        .spread
                        .map(|spread| self.parsed.offset(spread.lo))
                        .unwrap_or(expr.start);
                    Argument {
                        range: SourceRange::new(start, expr.end),
                        spread: arg.spread.is_some(),
                    }
                })
                .collect(),
        }
    }

    fn record_identifier(&mut self, ident: &Ident, call: Option<CallSite>) {
        let binding = self.binding_of(&ident.sym);
        self.facts.identifiers.push(IdentifierUse {
            name: ident.sym.to_string(),
            range: self.parsed.range(ident.span),
            call,
            binding,
        });
    }

    fn record_member(&mut self, member: &MemberExpr, call: Option<CallSite>) {
        if let MemberProp::Ident(property) = &member.prop {
            let object = match &*member.obj {
                Expr::Ident(ident) => Some(MemberObject::Identifier {
                    name: ident.sym.to_string(),
                    binding: self.binding_of(&ident.sym),
                }),
                Expr::This(_) => Some(MemberObject::This(self.this_binding())),
                _ => None,
            };
            if let Some(object) = object {
                self.facts.members.push(MemberUse {
                    object,
                    property: property.sym.to_string(),
                    range: self.parsed.range(member.span),
                    call,
                });
            }
        }

        member.obj.visit_with(self);
        if let MemberProp::Computed(computed) = &member.prop {
            computed.visit_with(self);
        }
    }

    fn visit_class_body(&mut self, class_name: Option<String>, scope: Option<ScopeId>, class: &Class) {
        class.decorators.visit_with(self);
        class.super_class.visit_with(self);
        class.type_params.visit_with(self);
        class.super_type_params.visit_with(self);
        class.implements.visit_with(self);

        for member in &class.body {
            let is_static = match member {
                ClassMember::Method(method) => method.is_static,
                ClassMember::PrivateMethod(method) => method.is_static,
                ClassMember::ClassProp(prop) => prop.is_static,
                ClassMember::PrivateProp(prop) => prop.is_static,
                ClassMember::StaticBlock(_) => true,
                _ => false,
            };

            if let (Some(class), Some(key)) = (&class_name, member_key(member)) {
                self.facts.class_members.push(DeclaredMember {
                    class: class.clone(),
                    member: key.sym.to_string(),
                    is_static,
                    range: self.parsed.range(key.span),
                    scope,
                });
            }

            self.this_stack.push(Some(ThisBinding {
                class: class_name.clone(),
                scope,
                is_static,
            }));
            match member {
                ClassMember::Method(method) => {
                    method.key.visit_with(self);
                    self.visit_function_scope(&method.function);
                }
                ClassMember::PrivateMethod(method) => self.visit_function_scope(&method.function),
                other => other.visit_with(self),
            }
            self.this_stack.pop();
        }
    }
}

/// Identifier key of a method or property member
pub(crate) fn member_key(member: &ClassMember) -> Option<&IdentName> {
    let key = match member {
        ClassMember::Method(method) => &method.key,
        ClassMember::ClassProp(prop) => &prop.key,
        _ => return None,
    };
    match key {
        PropName::Ident(ident) => Some(ident),
        _ => None,
    }
}

fn pat_names(pat: &Pat, out: &mut HashSet<String>) {
    match pat {
        Pat::Ident(binding) => {
            out.insert(binding.id.sym.to_string());
        }
        Pat::Array(array) => {
            for element in array.elems.iter().flatten() {
                pat_names(element, out);
            }
        }
        Pat::Rest(rest) => pat_names(&rest.arg, out),
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(pair) => pat_names(&pair.value, out),
                    ObjectPatProp::Assign(assign) => {
                        out.insert(assign.key.id.sym.to_string());
                    }
                    ObjectPatProp::Rest(rest) => pat_names(&rest.arg, out),
                }
            }
        }
        Pat::Assign(assign) => pat_names(&assign.left, out),
        _ => {}
    }
}

/// Block-scoped declarations made directly by `stmts`
fn lexical_names(stmts: &[Stmt]) -> HashSet<String> {
    let mut names = HashSet::new();
    for stmt in stmts {
        let Stmt::Decl(decl) = stmt else {
            continue;
        };
        match decl {
            Decl::Var(var) if var.kind != VarDeclKind::Var => {
                for declarator in &var.decls {
                    pat_names(&declarator.name, &mut names);
                }
            }
            Decl::Fn(function) => {
                names.insert(function.ident.sym.to_string());
            }
            Decl::Class(class) => {
                names.insert(class.ident.sym.to_string());
            }
            Decl::TsEnum(ts_enum) => {
                names.insert(ts_enum.id.sym.to_string());
            }
            _ => {}
        }
    }
    names
}

fn head_names(decl: &VarDecl) -> HashSet<String> {
    let mut names = HashSet::new();
    if decl.kind != VarDeclKind::Var {
        for declarator in &decl.decls {
            pat_names(&declarator.name, &mut names);
        }
    }
    names
}

/// `var` declarations of a function body, without entering nested functions
#[derive(Default)]
struct HoistedVars {
    names: HashSet<String>,
}

impl Visit for HoistedVars {
    fn visit_var_decl(&mut self, n: &VarDecl) {
        if n.kind == VarDeclKind::Var {
            for declarator in &n.decls {
                pat_names(&declarator.name, &mut self.names);
            }
        }
        n.visit_children_with(self);
    }

    fn visit_function(&mut self, _: &Function) {}

    fn visit_arrow_expr(&mut self, _: &ArrowExpr) {}

    fn visit_class(&mut self, _: &Class) {}
}

fn hoisted_vars<N: VisitWith<HoistedVars>>(body: &N) -> HashSet<String> {
    let mut collector = HoistedVars::default();
    body.visit_with(&mut collector);
    collector.names
}

impl Visit for UseCollector<'_> {
    fn visit_class_decl(&mut self, n: &ClassDecl) {
        let scope = self.binding_of(&n.ident.sym);
        self.visit_class_body(Some(n.ident.sym.to_string()), scope, &n.class);
    }

    fn visit_class_expr(&mut self, n: &ClassExpr) {
        match &n.ident {
            // a named class expression binds its name inside its own body
            Some(ident) => {
                let name = ident.sym.to_string();
                self.scoped(HashSet::from([name.clone()]), |this| {
                    let scope = this.binding_of(&name);
                    this.visit_class_body(Some(name), scope, &n.class);
                });
            }
            None => self.visit_class_body(None, None, &n.class),
        }
    }

    fn visit_default_decl(&mut self, n: &DefaultDecl) {
        // `export default class C` and `export default function f` bind in module scope
        match n {
            DefaultDecl::Class(ClassExpr {
                ident: Some(ident),
                class,
                ..
            }) => {
                let scope = self.binding_of(&ident.sym);
                self.visit_class_body(Some(ident.sym.to_string()), scope, class);
            }
            DefaultDecl::Fn(FnExpr {
                ident: Some(_),
                function,
                ..
            }) => function.visit_with(self),
            _ => n.visit_children_with(self),
        }
    }

    fn visit_function(&mut self, n: &Function) {
        self.this_stack.push(None);
        self.visit_function_scope(n);
        self.this_stack.pop();
    }

    fn visit_fn_expr(&mut self, n: &FnExpr) {
        match &n.ident {
            Some(ident) => {
                let names = HashSet::from([ident.sym.to_string()]);
                self.scoped(names, |this| n.function.visit_with(this));
            }
            None => n.function.visit_with(self),
        }
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        let mut names = hoisted_vars(&n.body);
        for param in &n.params {
            pat_names(param, &mut names);
        }
        self.scoped(names, |this| n.visit_children_with(this));
    }

    fn visit_constructor(&mut self, n: &Constructor) {
        let mut names = hoisted_vars(&n.body);
        for param in &n.params {
            match param {
                ParamOrTsParamProp::Param(param) => pat_names(&param.pat, &mut names),
                ParamOrTsParamProp::TsParamProp(prop) => match &prop.param {
                    TsParamPropParam::Ident(binding) => {
                        names.insert(binding.id.sym.to_string());
                    }
                    TsParamPropParam::Assign(assign) => pat_names(&assign.left, &mut names),
                },
            }
        }
        self.scoped(names, |this| n.visit_children_with(this));
    }

    fn visit_block_stmt(&mut self, n: &BlockStmt) {
        self.scoped(lexical_names(&n.stmts), |this| n.visit_children_with(this));
    }

    fn visit_catch_clause(&mut self, n: &CatchClause) {
        let mut names = HashSet::new();
        if let Some(param) = &n.param {
            pat_names(param, &mut names);
        }
        self.scoped(names, |this| n.visit_children_with(this));
    }

    fn visit_for_stmt(&mut self, n: &ForStmt) {
        let names = match &n.init {
            Some(VarDeclOrExpr::VarDecl(decl)) => head_names(decl),
            _ => HashSet::new(),
        };
        self.scoped(names, |this| n.visit_children_with(this));
    }

    fn visit_for_in_stmt(&mut self, n: &ForInStmt) {
        let names = match &n.left {
            ForHead::VarDecl(decl) => head_names(decl),
            _ => HashSet::new(),
        };
        self.scoped(names, |this| n.visit_children_with(this));
    }

    fn visit_for_of_stmt(&mut self, n: &ForOfStmt) {
        let names = match &n.left {
            ForHead::VarDecl(decl) => head_names(decl),
            _ => HashSet::new(),
        };
        self.scoped(names, |this| n.visit_children_with(this));
    }

    fn visit_switch_stmt(&mut self, n: &SwitchStmt) {
        n.discriminant.visit_with(self);
        let names = n.cases.iter().flat_map(|case| lexical_names(&case.cons)).collect();
        self.scoped(names, |this| n.cases.visit_with(this));
    }

    fn visit_call_expr(&mut self, n: &CallExpr) {
        let site = self.call_site(n);
        if let Callee::Expr(callee) = &n.callee {
            match &**callee {
                Expr::Ident(ident) => self.record_identifier(ident, Some(site)),
                Expr::Member(member) => self.record_member(member, Some(site)),
                other => other.visit_with(self),
            }
        }
        n.type_args.visit_with(self);
        n.args.visit_with(self);
    }

    fn visit_member_expr(&mut self, n: &MemberExpr) {
        self.record_member(n, None);
    }

    fn visit_expr(&mut self, n: &Expr) {
        match n {
            Expr::Ident(ident) => self.record_identifier(ident, None),
            _ => n.visit_children_with(self),
        }
    }

    fn visit_prop(&mut self, n: &Prop) {
        match n {
            Prop::Shorthand(ident) => self.record_identifier(ident, None),
            _ => n.visit_children_with(self),
        }
    }

    fn visit_binding_ident(&mut self, n: &BindingIdent) {
        if let Some(annotation) = &n.type_ann {
            if let TsType::TsTypeRef(TsTypeRef {
                type_name: TsEntityName::Ident(class),
                ..
            }) = &*annotation.type_ann
            {
                self.facts.typed_bindings.push(TypedBinding {
                    binding: n.id.sym.to_string(),
                    class: class.sym.to_string(),
                });
            }
        }
        n.type_ann.visit_with(self);
    }

    fn visit_var_declarator(&mut self, n: &VarDeclarator) {
        if let (Pat::Ident(binding), Some(init)) = (&n.name, &n.init) {
            if let Expr::New(new) = &**init {
                if let Expr::Ident(class) = &*new.callee {
                    self.facts.typed_bindings.push(TypedBinding {
                        binding: binding.id.sym.to_string(),
                        class: class.sym.to_string(),
                    });
                }
            }
        }
        n.visit_children_with(self);
    }

    fn visit_ts_type_ref(&mut self, n: &TsTypeRef) {
        // types are not shadowed by value bindings
        if let TsEntityName::Ident(ident) = &n.type_name {
            self.facts.identifiers.push(IdentifierUse {
                name: ident.sym.to_string(),
                range: self.parsed.range(ident.span),
                call: None,
                binding: None,
            });
        }
        n.type_params.visit_with(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn index(files: &[(&str, &str)]) -> (Project, ReferenceIndex) {
        let project = Project::from_files(files.iter().map(|(p, t)| (*p, *t)));
        let index = ReferenceIndex::build(&project);
        (project, index)
    }

    fn texts<'a>(project: &'a Project, references: &[Reference]) -> Vec<(String, &'a str)> {
        references
            .iter()
            .filter_map(|reference| {
                let text = project.get(&reference.file)?;
                let range = match &reference.node {
                    ReferenceNode::Declaration { name } => *name,
                    ReferenceNode::Identifier { range } => *range,
                    ReferenceNode::Callee { call, .. } => call.range,
                    ReferenceNode::PropertyAccess { member, .. } => *member,
                    ReferenceNode::ImportSpecifier { specifier, .. } => *specifier,
                };
                let file = reference.file.file_name()?.to_string_lossy().into_owned();
                Some((file, range.slice(text)))
            })
            .collect()
    }

    #[test]
    fn test_function_references_follow_aliased_imports() {
        let (project, index) = index(&[
            ("/p/a.ts", "export function f(a: number) { return a; }\nf(1);\n"),
            (
                "/p/b.ts",
                "import { f as g } from './a';\nconst h = g;\ng(2);\n",
            ),
            ("/p/c.ts", "function f() {}\nf();\n"),
        ]);

        let references = index.find_references(&DeclarationTarget::Function {
            file: PathBuf::from("/p/a.ts"),
            name: "f".to_string(),
        });

        assert_eq!(
            texts(&project, &references),
            vec![
                ("a.ts".to_string(), "f"),
                ("a.ts".to_string(), "f(1)"),
                ("b.ts".to_string(), "f as g"),
                ("b.ts".to_string(), "g"),
                ("b.ts".to_string(), "g(2)"),
            ]
        );
    }

    #[test]
    fn test_static_member_references() {
        let (project, index) = index(&[
            (
                "/p/a.ts",
                "export class C {\n  static x = 1;\n  static m() { return this.x + C.x; }\n}\n",
            ),
            ("/p/b.ts", "import { C } from './a';\nC.m();\nconst y = C.x;\n"),
        ]);

        let references = index.find_references(&DeclarationTarget::ClassMember {
            file: PathBuf::from("/p/a.ts"),
            class: "C".to_string(),
            member: "x".to_string(),
            is_static: true,
        });

        assert_eq!(
            texts(&project, &references),
            vec![
                ("a.ts".to_string(), "x"),
                ("a.ts".to_string(), "this.x"),
                ("a.ts".to_string(), "C.x"),
                ("b.ts".to_string(), "C.x"),
            ]
        );
    }

    #[test]
    fn test_instance_member_references_through_typed_bindings() {
        let (project, index) = index(&[
            (
                "/p/a.ts",
                "export class C {\n  m(a: number) {}\n  run() { this.m(1); }\n}\n",
            ),
            (
                "/p/b.ts",
                "import { C } from './a';\nconst c = new C();\nc.m(2);\nfunction use(k: C) { k.m(3); }\nother.m(4);\n",
            ),
        ]);

        let references = index.find_references(&DeclarationTarget::ClassMember {
            file: PathBuf::from("/p/a.ts"),
            class: "C".to_string(),
            member: "m".to_string(),
            is_static: false,
        });

        assert_eq!(
            texts(&project, &references),
            vec![
                ("a.ts".to_string(), "m"),
                ("a.ts".to_string(), "this.m"),
                ("b.ts".to_string(), "c.m"),
                ("b.ts".to_string(), "k.m"),
            ]
        );
    }

    #[test]
    fn test_import_specifier_removal_ranges() {
        let text = "import { A, B } from './a';\nimport D, { E } from './a';\nimport { F } from './a';\n";
        let (project, index) = index(&[
            ("/p/a.ts", "export class A {}\nexport class B {}\nexport default class D {}\nexport class E {}\nexport class F {}\n"),
            ("/p/b.ts", text),
        ]);

        let removal_of = |name: &str| {
            index
                .find_references(&DeclarationTarget::Class {
                    file: PathBuf::from("/p/a.ts"),
                    name: name.to_string(),
                })
                .into_iter()
                .find_map(|reference| match reference.node {
                    ReferenceNode::ImportSpecifier { removal, .. } => Some(removal),
                    _ => None,
                })
                .unwrap()
        };

        let b_text = project.get(Path::new("/p/b.ts")).unwrap();
        assert_eq!(removal_of("A").slice(b_text), "A, ");
        assert_eq!(removal_of("B").slice(b_text), ", B");
        assert_eq!(removal_of("D").slice(b_text), "D, ");
        assert_eq!(removal_of("E").slice(b_text), ", { E }");
        assert_eq!(removal_of("F").slice(b_text), "import { F } from './a';\n");
    }

    #[test]
    fn test_shadowing_bindings_are_not_references() {
        let (project, index) = index(&[(
            "/p/a.ts",
            "export function f(a: number) {}\n\
             function g(f: () => void) { f(); }\n\
             function h() { const f = 1; return f; }\n\
             function k() { { let f = 2; } f(3); }\n\
             function m() { f(5); var f = () => {}; }\n\
             const n = (f: number) => f;\n\
             try {} catch (f) { f(); }\n\
             for (const f of []) { f(); }\n\
             f(4);\n",
        )]);

        let references = index.find_references(&DeclarationTarget::Function {
            file: PathBuf::from("/p/a.ts"),
            name: "f".to_string(),
        });

        assert_eq!(
            texts(&project, &references),
            vec![
                ("a.ts".to_string(), "f"),
                ("a.ts".to_string(), "f(3)"),
                ("a.ts".to_string(), "f(4)"),
            ]
        );
    }

    #[test]
    fn test_nested_class_of_the_same_name_is_kept_apart() {
        let (project, index) = index(&[(
            "/p/a.ts",
            "export class C {\n  static x = 1;\n  static y() { return this.x; }\n}\nC.x;\n\
             function outer(C: unknown) {\n  return C.x;\n}\n\
             function inner() {\n  class C {\n    static x = 2;\n    static y() { return this.x + C.x; }\n  }\n  return C.x;\n}\n",
        )]);

        let top_level = index.find_references(&DeclarationTarget::ClassMember {
            file: PathBuf::from("/p/a.ts"),
            class: "C".to_string(),
            member: "x".to_string(),
            is_static: true,
        });

        assert_eq!(
            texts(&project, &top_level),
            vec![
                ("a.ts".to_string(), "x"),
                ("a.ts".to_string(), "this.x"),
                ("a.ts".to_string(), "C.x"),
            ]
        );
        let text = project.get(Path::new("/p/a.ts")).unwrap();
        let outside = text.find("C.x;").unwrap();
        assert!(top_level.iter().any(|reference| matches!(
            reference.node,
            ReferenceNode::PropertyAccess { member, .. } if member.start == outside
        )));
    }
}
