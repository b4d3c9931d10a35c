//! c23c compiler library.
//!
//! The front- and middle-end of a compiler for a large subset of C23:
//! lexing, recursive-descent parsing, canonical type construction,
//! lexical-scope resolution, and on-the-fly SSA construction. The
//! pipeline is strictly sequential; each phase reads and extends the
//! tables owned by the [`TranslationUnit`] and reports problems as
//! diagnostics on it rather than aborting.
//!
//! ```rust
//! use c23c::{CompilerConfig, compile_source};
//!
//! let tu = compile_source("test.c", "int main(void) { return 0; }",
//!                         &CompilerConfig::default());
//! assert!(!tu.has_errors());
//! assert_eq!(tu.functions.len(), 1);
//! ```

pub mod ast;
pub mod config;
pub mod diag;
pub mod intern;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod ssa;
pub mod tu;
pub mod types;

pub use ast::{dump_ast, NodeId, NodeKind};
pub use config::CompilerConfig;
pub use diag::{Diagnostic, Severity};
pub use lexer::{dump_tokens, Token, TokenKind};
pub use resolver::{dump_scopes, ScopeId, ScopeTable};
pub use ssa::{dump_ir, Function};
pub use tu::TranslationUnit;
pub use types::{StorageClass, TypeFlags, TypeId, TypeLayer, TypeTable};

use std::path::Path;

/// How far `compile_source` got before a phase gate stopped it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Lex,
    Parse,
    Resolve,
    Emit,
}

/// Run the full pipeline over one source buffer. Diagnostics accumulate
/// on the returned translation unit; a phase that reports errors gates
/// the phases after it, so later tables may be empty on bad input. With
/// `abort_on_error` set the gate also applies to lexical errors.
pub fn compile_source(
    filename: impl Into<String>,
    source: impl Into<String>,
    config: &CompilerConfig,
) -> TranslationUnit {
    let (tu, _) = compile_until(filename, source, config, Phase::Emit);
    tu
}

/// Run the pipeline up to and including `until`. Returns the unit and
/// the last phase that actually ran.
pub fn compile_until(
    filename: impl Into<String>,
    source: impl Into<String>,
    config: &CompilerConfig,
    until: Phase,
) -> (TranslationUnit, Phase) {
    let mut tu = TranslationUnit::new(filename, source);

    lexer::tokenize(&mut tu, config.tab_width);
    if until == Phase::Lex || (config.abort_on_error && tu.has_errors()) {
        return (tu, Phase::Lex);
    }

    parser::parse(&mut tu);
    if until == Phase::Parse || tu.has_errors() {
        // A broken AST is not worth resolving; the user sees every
        // diagnostic collected so far.
        return (tu, Phase::Parse);
    }

    resolver::resolve(&mut tu);
    if until == Phase::Resolve || tu.has_errors() {
        return (tu, Phase::Resolve);
    }

    ssa::emit(&mut tu);
    (tu, Phase::Emit)
}

/// Compile a file from disk. I/O failure is the only error reported
/// here; compilation problems live on the returned unit.
pub fn compile_file(path: &Path, config: &CompilerConfig) -> Result<TranslationUnit, String> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("unable to open file {} ({})", path.display(), e))?;
    Ok(compile_source(
        path.display().to_string(),
        source,
        config,
    ))
}
