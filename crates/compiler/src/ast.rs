//! Abstract syntax tree.
//!
//! Nodes live in an arena on the translation unit and refer to each
//! other by index, so the tree can be grown without invalidating
//! references. Every node keeps its first token, and nodes that span
//! multiple tokens keep a last-token marker for diagnostic extents.

use crate::diag::Span;
use crate::lexer::TokenId;
use crate::resolver::ScopeId;
use crate::tu::TranslationUnit;
use crate::types::{StorageClass, TypeId};
use std::fmt::Write as _;

/// Index into the translation unit's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// First token of the node.
    pub token: TokenId,
    /// Last token, when the node spans more than one.
    pub token_end: Option<TokenId>,
}

/// Shared payload of the three declarator kinds. Declarator syntax is
/// outside-in: a plain declarator with an inner child is a pointer
/// layer; one without is the declared name itself.
#[derive(Debug, Clone, Default)]
pub struct Declarator {
    pub inner: Option<NodeId>,
    /// The declared name. `None` for nameless declarators (casts,
    /// anonymous parameters).
    pub name: Option<TokenId>,
    pub nameless: bool,
    pub init: Option<NodeId>,
    /// Filled in by the resolver.
    pub scope: ScopeId,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Root {
        children: Vec<NodeId>,
    },
    Block {
        children: Vec<NodeId>,
    },

    // Expressions.
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    Ident {
        /// Bound by the resolver.
        scope: ScopeId,
    },
    BinaryOp {
        lhs: NodeId,
        rhs: NodeId,
    },
    UnaryOp {
        inner: NodeId,
    },
    PostfixOp {
        inner: NodeId,
    },
    Member {
        inner: NodeId,
        ident: NodeId,
    },
    Subscript {
        inner: NodeId,
        index: NodeId,
    },
    Ternary {
        cond: NodeId,
        then_expr: NodeId,
        else_expr: NodeId,
    },
    Call {
        callee: NodeId,
        args: Vec<NodeId>,
    },

    // Declarations.
    Declaration {
        /// Base type from the declaration specifiers (type table seed).
        base_type: TypeId,
        storage: Option<StorageClass>,
        /// Struct/union/enum specifier node, when the base type came
        /// from one.
        spec: Option<NodeId>,
        declarators: Vec<NodeId>,
    },
    Declarator(Declarator),
    ArrayDeclarator {
        d: Declarator,
        /// Unevaluated extent expression.
        extent: Option<NodeId>,
    },
    FunctionDeclarator {
        d: Declarator,
        /// Parameter declarations, resolved independently.
        params: Vec<NodeId>,
    },
    FunctionDefinition {
        decl: NodeId,
        body: NodeId,
    },
    StructDef {
        is_union: bool,
        name: Option<TokenId>,
        members: Vec<NodeId>,
        has_body: bool,
        /// Canonical type created from the member list.
        ty: TypeId,
    },
    EnumDef {
        name: Option<TokenId>,
        enumerators: Vec<NodeId>,
        has_body: bool,
        ty: TypeId,
    },
    Enumerator {
        name: TokenId,
        value: Option<NodeId>,
        /// Filled in by the resolver.
        scope: ScopeId,
    },
    StaticAssert {
        expr: NodeId,
        message: Option<NodeId>,
    },

    // Statements.
    Return {
        expr: Option<NodeId>,
    },
    If {
        cond: NodeId,
        then_stmt: NodeId,
        else_stmt: Option<NodeId>,
    },
    While {
        cond: NodeId,
        body: NodeId,
    },
    Do {
        body: NodeId,
        cond: NodeId,
    },
    For {
        init: Option<NodeId>,
        cond: Option<NodeId>,
        next: Option<NodeId>,
        body: NodeId,
    },
    Switch {
        expr: NodeId,
        body: NodeId,
    },
    Case {
        value: NodeId,
    },
    Default,
    Break,
    Continue,
    Goto {
        label: NodeId,
    },
    Label {
        name: NodeId,
    },
    Null,

    Error,
}

impl NodeKind {
    pub fn declarator(&self) -> Option<&Declarator> {
        match self {
            NodeKind::Declarator(d)
            | NodeKind::ArrayDeclarator { d, .. }
            | NodeKind::FunctionDeclarator { d, .. } => Some(d),
            _ => None,
        }
    }

    pub fn declarator_mut(&mut self) -> Option<&mut Declarator> {
        match self {
            NodeKind::Declarator(d)
            | NodeKind::ArrayDeclarator { d, .. }
            | NodeKind::FunctionDeclarator { d, .. } => Some(d),
            _ => None,
        }
    }
}

/// First token of the node's source extent.
pub fn node_begin(tu: &TranslationUnit, node: NodeId) -> TokenId {
    let n = tu.node(node);
    match &n.kind {
        NodeKind::BinaryOp { lhs, .. } => node_begin(tu, *lhs),
        NodeKind::PostfixOp { inner } => node_begin(tu, *inner),
        NodeKind::Ternary { cond, .. } => node_begin(tu, *cond),
        NodeKind::ArrayDeclarator { d, .. } | NodeKind::FunctionDeclarator { d, .. } => {
            match d.inner {
                Some(inner) => node_begin(tu, inner),
                None => n.token,
            }
        }
        _ => n.token,
    }
}

/// Last token of the node's source extent.
pub fn node_end(tu: &TranslationUnit, node: NodeId) -> TokenId {
    let n = tu.node(node);
    if let Some(end) = n.token_end {
        return end;
    }
    match &n.kind {
        NodeKind::FunctionDefinition { body, .. } => node_end(tu, *body),
        NodeKind::If {
            then_stmt,
            else_stmt,
            ..
        } => match else_stmt {
            Some(e) => node_end(tu, *e),
            None => node_end(tu, *then_stmt),
        },
        NodeKind::While { body, .. } => node_end(tu, *body),
        NodeKind::UnaryOp { inner } => node_end(tu, *inner),
        NodeKind::BinaryOp { rhs, .. } => node_end(tu, *rhs),
        NodeKind::Ternary { else_expr, .. } => node_end(tu, *else_expr),
        NodeKind::Declarator(d) => match d.inner {
            Some(inner) => node_end(tu, inner),
            None => n.token,
        },
        _ => n.token,
    }
}

/// Diagnostic span covering the whole node.
pub fn node_span(tu: &TranslationUnit, node: NodeId) -> Span {
    let begin = tu.token(node_begin(tu, node)).span();
    let end = tu.token(node_end(tu, node)).span();
    Span::extent(begin, end)
}

const MAX_DUMP_DEPTH: usize = 50;

/// Indented AST dump, two spaces per level, child links prefixed with
/// short labels.
pub fn dump_ast(tu: &TranslationUnit) -> String {
    if tu.nodes.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    dump_node(tu, &mut out, None, tu.root, 0);
    out
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

fn dump_node(tu: &TranslationUnit, out: &mut String, info: Option<&str>, node: NodeId, level: usize) {
    indent(out, level);
    if let Some(info) = info {
        out.push_str(info);
        out.push(' ');
    }
    if level > MAX_DUMP_DEPTH {
        out.push_str("...\n");
        return;
    }

    let n = tu.node(node);
    let text = tu.token_text(n.token);

    macro_rules! recur {
        ($child:expr) => {
            dump_node(tu, out, None, $child, level + 1)
        };
        ($label:expr, $child:expr) => {
            dump_node(tu, out, Some($label), $child, level + 1)
        };
    }

    match &n.kind {
        NodeKind::Root { children } => {
            out.push_str("root:\n");
            for &c in children {
                recur!(c);
            }
        }
        NodeKind::Block { children } => {
            out.push_str("block:\n");
            for &c in children {
                recur!(c);
            }
        }
        NodeKind::IntLiteral => {
            let _ = writeln!(out, "int: {} ({})", text, tu.token(n.token).int_value());
        }
        NodeKind::FloatLiteral => {
            let _ = writeln!(out, "float: {} ({})", text, tu.token(n.token).float_value());
        }
        NodeKind::StringLiteral => {
            let _ = writeln!(out, "string: {}", text);
        }
        NodeKind::Ident { .. } => {
            let _ = writeln!(out, "ident: {}", text);
        }
        NodeKind::BinaryOp { lhs, rhs } => {
            let _ = writeln!(out, "binop: {}", text);
            recur!("lhs:", *lhs);
            recur!("rhs:", *rhs);
        }
        NodeKind::UnaryOp { inner } => {
            let _ = writeln!(out, "unop: {}", text);
            recur!(*inner);
        }
        NodeKind::PostfixOp { inner } => {
            let _ = writeln!(out, "postfix: {}", text);
            recur!(*inner);
        }
        NodeKind::Member { inner, ident } => {
            out.push_str("member:\n");
            recur!("val:", *inner);
            recur!("nam:", *ident);
        }
        NodeKind::Subscript { inner, index } => {
            out.push_str("subscript:\n");
            recur!("arr:", *inner);
            recur!("sub:", *index);
        }
        NodeKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            out.push_str("ternary:\n");
            recur!("cnd:", *cond);
            recur!("tru:", *then_expr);
            recur!("fls:", *else_expr);
        }
        NodeKind::Call { callee, args } => {
            out.push_str("funcall:\n");
            recur!("fun:", *callee);
            for &a in args {
                recur!("arg:", a);
            }
        }
        NodeKind::Declaration {
            base_type,
            declarators,
            ..
        } => {
            out.push_str("decl:\n");
            indent(out, level + 1);
            let _ = writeln!(out, "typ: {}", tu.types.render(*base_type));
            for &d in declarators {
                recur!("dcl:", d);
            }
        }
        NodeKind::Declarator(_)
        | NodeKind::ArrayDeclarator { .. }
        | NodeKind::FunctionDeclarator { .. } => {
            out.push_str("d: ");
            let mut cur = node;
            loop {
                let cn = tu.node(cur);
                match &cn.kind {
                    NodeKind::Declarator(d) => {
                        // A plain declarator's token is either the
                        // declared name or the '*' of a pointer layer.
                        if d.nameless && d.inner.is_none() {
                            out.push_str("(nameless)");
                        } else {
                            out.push_str(tu.token_text(cn.token));
                        }
                        match d.inner {
                            Some(inner) => {
                                out.push_str(" -> ");
                                cur = inner;
                            }
                            None => break,
                        }
                    }
                    NodeKind::FunctionDeclarator { d, .. } => {
                        out.push_str("()");
                        match d.inner {
                            Some(inner) => {
                                out.push_str(" -> ");
                                cur = inner;
                            }
                            None => break,
                        }
                    }
                    NodeKind::ArrayDeclarator { d, .. } => {
                        out.push_str("[]");
                        match d.inner {
                            Some(inner) => {
                                out.push_str(" -> ");
                                cur = inner;
                            }
                            None => break,
                        }
                    }
                    _ => break,
                }
            }
            out.push('\n');
            if let Some(d) = n.kind.declarator() {
                if let Some(init) = d.init {
                    recur!("ini:", init);
                }
            }
        }
        NodeKind::FunctionDefinition { decl, body } => {
            out.push_str("function:\n");
            recur!("typ:", *decl);
            recur!("bdy:", *body);
        }
        NodeKind::StructDef {
            is_union, members, ..
        } => {
            if *is_union {
                out.push_str("union:\n");
            } else {
                out.push_str("struct:\n");
            }
            for &m in members {
                recur!(m);
            }
        }
        NodeKind::EnumDef { enumerators, .. } => {
            out.push_str("enum:\n");
            for &e in enumerators {
                recur!(e);
            }
        }
        NodeKind::Enumerator { name, value, .. } => {
            let _ = writeln!(out, "enumerator: {}", tu.token_text(*name));
            if let Some(v) = value {
                recur!("ini:", *v);
            }
        }
        NodeKind::StaticAssert { expr, message } => {
            out.push_str("static assert:\n");
            recur!("tst:", *expr);
            if let Some(m) = message {
                recur!("msg:", *m);
            }
        }
        NodeKind::Return { expr } => {
            out.push_str("return:\n");
            if let Some(e) = expr {
                recur!(*e);
            }
        }
        NodeKind::If {
            cond,
            then_stmt,
            else_stmt,
        } => {
            out.push_str("if:\n");
            recur!("cnd:", *cond);
            recur!("tru:", *then_stmt);
            if let Some(e) = else_stmt {
                recur!("fls:", *e);
            }
        }
        NodeKind::While { cond, body } => {
            out.push_str("while:\n");
            recur!("cnd:", *cond);
            recur!("blk:", *body);
        }
        NodeKind::Do { body, cond } => {
            out.push_str("do:\n");
            recur!("blk:", *body);
            recur!("cnd:", *cond);
        }
        NodeKind::For {
            init,
            cond,
            next,
            body,
        } => {
            out.push_str("for:\n");
            if let Some(i) = init {
                recur!("ini:", *i);
            }
            if let Some(c) = cond {
                recur!("cnd:", *c);
            }
            if let Some(x) = next {
                recur!("nxt:", *x);
            }
            recur!("blk:", *body);
        }
        NodeKind::Switch { expr, body } => {
            out.push_str("switch:\n");
            recur!("exp:", *expr);
            recur!("blk:", *body);
        }
        NodeKind::Case { value } => {
            out.push_str("case:\n");
            recur!(*value);
        }
        NodeKind::Default => out.push_str("default:\n"),
        NodeKind::Break => out.push_str("break:\n"),
        NodeKind::Continue => out.push_str("continue:\n"),
        NodeKind::Goto { label } => {
            out.push_str("goto:\n");
            recur!(*label);
        }
        NodeKind::Label { name } => {
            out.push_str("label:\n");
            recur!(*name);
        }
        NodeKind::Null => out.push_str("null:\n"),
        NodeKind::Error => {
            let _ = writeln!(out, "error: {}", text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(source: &str) -> TranslationUnit {
        let mut tu = TranslationUnit::new("test.c", source);
        crate::lexer::tokenize(&mut tu, 8);
        crate::parser::parse(&mut tu);
        tu
    }

    #[test]
    fn test_dump_simple_declaration() {
        let tu = parsed("int x = 1;");
        let dump = dump_ast(&tu);
        assert!(dump.starts_with("root:\n"));
        assert!(dump.contains("  decl:\n"));
        assert!(dump.contains("    typ: int\n"));
        assert!(dump.contains("    dcl: d: x\n"));
        assert!(dump.contains("      ini: int: 1 (1)\n"));
    }

    #[test]
    fn test_dump_if_labels() {
        let tu = parsed("int f(int b) { if (b) return 1; else return 2; }");
        let dump = dump_ast(&tu);
        assert!(dump.contains("cnd: ident: b\n"));
        assert!(dump.contains("tru: return:\n"));
        assert!(dump.contains("fls: return:\n"));
    }

    #[test]
    fn test_dump_binop_labels() {
        let tu = parsed("int main(void) { return 1 + 2; }");
        let dump = dump_ast(&tu);
        assert!(dump.contains("binop: +\n"));
        assert!(dump.contains("lhs: int: 1 (1)\n"));
        assert!(dump.contains("rhs: int: 2 (2)\n"));
    }

    #[test]
    fn test_dump_declarator_chain() {
        let tu = parsed("int (*f[3])(char);");
        let dump = dump_ast(&tu);
        // Outermost syntax first: function of pointer of array of name.
        assert!(dump.contains("dcl: d: () -> * -> [] -> f\n"), "{}", dump);
    }

    #[test]
    fn test_dump_is_stable_under_reparse() {
        let source = "int x = 1; int y = x + 2;";
        let first = dump_ast(&parsed(source));
        let second = dump_ast(&parsed(source));
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_tu_has_zero_children() {
        let tu = parsed("");
        match &tu.node(tu.root).kind {
            NodeKind::Root { children } => assert!(children.is_empty()),
            other => panic!("expected root, got {:?}", other),
        }
    }
}
