//! The translation unit.
//!
//! One `TranslationUnit` owns every table produced by the pipeline:
//! source text, tokens, the AST node arena, the canonical type table,
//! the scope table, the function list, the interner, and the
//! diagnostics. Tables are append-only; an index handed out by any of
//! them stays valid for the unit's lifetime.

use crate::ast::{Node, NodeId, NodeKind};
use crate::diag::{Diagnostic, Severity, Span};
use crate::intern::Interner;
use crate::lexer::{Token, TokenId};
use crate::resolver::ScopeTable;
use crate::ssa::Function;
use crate::types::TypeTable;

#[derive(Debug)]
pub struct TranslationUnit {
    pub filename: String,
    pub source: String,
    pub tokens: Vec<Token>,
    pub nodes: Vec<Node>,
    pub root: NodeId,
    pub types: TypeTable,
    pub scopes: ScopeTable,
    pub functions: Vec<Function>,
    pub interner: Interner,
    pub diagnostics: Vec<Diagnostic>,
}

impl TranslationUnit {
    pub fn new(filename: impl Into<String>, source: impl Into<String>) -> Self {
        TranslationUnit {
            filename: filename.into(),
            source: source.into(),
            tokens: Vec::new(),
            nodes: Vec::new(),
            root: NodeId(0),
            types: TypeTable::new(),
            scopes: ScopeTable::new(),
            functions: Vec::new(),
            interner: Interner::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn token(&self, id: TokenId) -> &Token {
        &self.tokens[id.0 as usize]
    }

    /// The token's text as written in the source.
    pub fn token_text(&self, id: TokenId) -> &str {
        self.token_text_raw(self.token(id))
    }

    pub fn token_text_raw(&self, token: &Token) -> &str {
        let start = token.index as usize;
        let end = (token.index + token.len) as usize;
        &self.source[start.min(self.source.len())..end.min(self.source.len())]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn push_node(&mut self, kind: NodeKind, token: TokenId) -> NodeId {
        self.nodes.push(Node {
            kind,
            token,
            token_end: None,
        });
        NodeId(self.nodes.len() as u32 - 1)
    }

    pub fn error_at(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(message, span));
    }

    pub fn note_at(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::note(message, span));
    }

    pub fn error_token(&mut self, token: TokenId, message: impl Into<String>) {
        let span = self.token(token).span();
        self.error_at(span, message);
    }

    pub fn error_node(&mut self, node: NodeId, message: impl Into<String>) {
        let span = crate::ast::node_span(self, node);
        self.error_at(span, message);
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_text_slices_source() {
        let mut tu = TranslationUnit::new("t.c", "int x;");
        crate::lexer::tokenize(&mut tu, 8);
        assert_eq!(tu.token_text(TokenId(0)), "int");
        assert_eq!(tu.token_text(TokenId(1)), "x");
    }

    #[test]
    fn test_error_count_ignores_notes() {
        let mut tu = TranslationUnit::new("t.c", "x");
        let span = Span {
            index: 0,
            len: 1,
            line: 1,
            column: 1,
        };
        tu.error_at(span, "bad");
        tu.note_at(span, "see here");
        assert_eq!(tu.error_count(), 1);
        assert_eq!(tu.diagnostics.len(), 2);
    }
}
