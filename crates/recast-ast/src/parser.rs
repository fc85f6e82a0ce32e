//! swc parsing with byte-offset span conversion

use crate::error::{AstError, AstResult};
use std::path::Path;
use swc_common::{sync::Lrc, BytePos, FileName, FilePathMapping, SourceMap, Span};
use swc_ecma_ast::Module;
use swc_ecma_parser::{lexer::Lexer, Parser, StringInput, Syntax, TsSyntax};

/// Half-open byte range into a source text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

impl SourceRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, other: SourceRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// A parsed module together with what is needed to map its spans back to
/// offsets in the original text
pub struct ParsedSource {
    pub module: Module,
    base: BytePos,
}

impl ParsedSource {
    /// Byte offset of a position within the parsed text
    pub fn offset(&self, pos: BytePos) -> usize {
        (pos.0 - self.base.0) as usize
    }

    pub fn range(&self, span: Span) -> SourceRange {
        SourceRange::new(self.offset(span.lo), self.offset(span.hi))
    }
}

/// Whether a path names a file the project snapshot tracks
pub fn is_source_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("ts" | "tsx" | "js" | "jsx" | "mts" | "cts")
    ) && !path.to_string_lossy().ends_with(".d.ts")
}

/// Parse TypeScript (or JavaScript) source into a module
pub fn parse_source(file_path: &Path, source: &str) -> AstResult<ParsedSource> {
    let cm = Lrc::new(SourceMap::new(FilePathMapping::empty()));
    let file_name = Lrc::new(FileName::Real(file_path.to_path_buf()));
    let source_file = cm.new_source_file(file_name, source.to_string());

    let jsx = matches!(
        file_path.extension().and_then(|ext| ext.to_str()),
        Some("tsx" | "jsx")
    );
    let lexer = Lexer::new(
        Syntax::Typescript(TsSyntax {
            tsx: jsx,
            decorators: true,
            no_early_errors: true,
            ..Default::default()
        }),
        Default::default(),
        StringInput::from(&*source_file),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let module = parser.parse_module().map_err(|e| {
        AstError::parse(
            file_path.display().to_string(),
            format!("Failed to parse module: {:?}", e),
        )
    })?;

    let recovered = parser.take_errors();
    if !recovered.is_empty() {
        tracing::debug!(
            file = %file_path.display(),
            count = recovered.len(),
            "Parser recovered from syntax errors"
        );
    }

    Ok(ParsedSource {
        module,
        base: source_file.start_pos,
    })
}
