//! Scope resolution.
//!
//! Walks the AST once, allocating a scope entry for every declared name
//! and binding every identifier occurrence to the entry it names. The
//! scope table is a flat vector where each entry points at its lexical
//! parent, so lookup is a walk up the parent chain and shadowing falls
//! out of walk order. Entries are never destroyed; visibility is
//! controlled purely by block depth during the walk.
//!
//! Struct/union/enum tags live in a namespace of their own, separate
//! from ordinary identifiers; the `ns_tag` flag keeps the two lookup
//! paths apart.
//!
//! This pass also inverts declarator chains into canonical types: the
//! outermost declarator syntax becomes the innermost type layer.

use crate::ast::{NodeId, NodeKind};
use crate::intern::Symbol;
use crate::lexer::TokenId;
use crate::tu::TranslationUnit;
use crate::types::{StorageClass, TypeFlags, TypeId, TypeLayer};

/// Index into the translation unit's scope table. Index 0 is the
/// reserved NONE sentinel that terminates every parent chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub const NONE: ScopeId = ScopeId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        ScopeId::NONE
    }
}

/// One declared name.
#[derive(Debug, Clone)]
pub struct ScopeEntry {
    pub name: Symbol,
    pub name_token: TokenId,
    /// The declarator (or specifier node, for tags) that declared this
    /// name.
    pub decl: NodeId,
    pub parent: ScopeId,
    /// 0 at file scope.
    pub block_depth: u32,
    pub c_type: TypeId,
    pub storage: Option<StorageClass>,
    pub is_global: bool,
    /// Tag namespace (struct/union/enum tags) vs ordinary identifiers.
    pub ns_tag: bool,
    /// Current SSA version counter, bumped by the SSA builder on every
    /// write of this variable.
    pub ir_index: u32,
}

#[derive(Debug)]
pub struct ScopeTable {
    entries: Vec<ScopeEntry>,
}

impl ScopeTable {
    pub fn new() -> Self {
        // Entry 0 terminates parent chains and is never matched.
        ScopeTable {
            entries: vec![ScopeEntry {
                name: Symbol::EMPTY,
                name_token: TokenId(0),
                decl: NodeId(0),
                parent: ScopeId::NONE,
                block_depth: 0,
                c_type: TypeId::NONE,
                storage: None,
                is_global: false,
                ns_tag: false,
                ir_index: 0,
            }],
        }
    }

    pub fn entry(&self, id: ScopeId) -> &ScopeEntry {
        &self.entries[id.0 as usize]
    }

    pub fn entry_mut(&mut self, id: ScopeId) -> &mut ScopeEntry {
        &mut self.entries[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries except the sentinel, with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &ScopeEntry)> {
        self.entries
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, e)| (ScopeId(i as u32), e))
    }

    fn push(&mut self, entry: ScopeEntry) -> ScopeId {
        self.entries.push(entry);
        ScopeId(self.entries.len() as u32 - 1)
    }

    /// Walk the parent chain looking for `name` in the given namespace.
    /// The nearest (deepest) entry wins, which is what gives shadowing.
    pub fn lookup(&self, name: Symbol, from: ScopeId, ns_tag: bool) -> Option<ScopeId> {
        let mut cur = from;
        while !cur.is_none() {
            let entry = self.entry(cur);
            if entry.ns_tag == ns_tag && entry.name == name {
                return Some(cur);
            }
            cur = entry.parent;
        }
        None
    }

    /// Walk the parent chain only while entries are at `depth`, looking
    /// for a redefinition candidate in the given namespace.
    pub fn find_at_depth(
        &self,
        name: Symbol,
        from: ScopeId,
        depth: u32,
        ns_tag: bool,
    ) -> Option<ScopeId> {
        let mut cur = from;
        while !cur.is_none() {
            let entry = self.entry(cur);
            if entry.block_depth != depth {
                break;
            }
            if entry.ns_tag == ns_tag && entry.name == name {
                return Some(cur);
            }
            cur = entry.parent;
        }
        None
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Invert a declarator chain around `base`, producing the canonical
/// type. Outside-in declarator syntax becomes an inside-out layer
/// chain; every layer goes through `find_or_create`, so structurally
/// equal types share an index.
pub fn declarator_type(tu: &mut TranslationUnit, base: TypeId, d: NodeId) -> TypeId {
    let kind = tu.node(d).kind.clone();
    match kind {
        NodeKind::Declarator(decl) => match decl.inner {
            None => base,
            Some(inner) => {
                let ptr = tu
                    .types
                    .find_or_create(base, TypeLayer::Pointer, TypeFlags::empty());
                declarator_type(tu, ptr, inner)
            }
        },
        NodeKind::ArrayDeclarator { d: decl, .. } => {
            let arr = tu
                .types
                .find_or_create(base, TypeLayer::Array, TypeFlags::empty());
            match decl.inner {
                Some(inner) => declarator_type(tu, arr, inner),
                None => arr,
            }
        }
        NodeKind::FunctionDeclarator { d: decl, params } => {
            // Parameter types are computed independently of the chain.
            let mut param_types = Vec::new();
            for p in params {
                if let NodeKind::Declaration {
                    base_type,
                    declarators,
                    ..
                } = tu.node(p).kind.clone()
                {
                    let ty = match declarators.first() {
                        Some(&pd) => declarator_type(tu, base_type, pd),
                        None => base_type,
                    };
                    param_types.push(ty);
                }
            }
            let f = tu.types.find_or_create(
                base,
                TypeLayer::Function {
                    params: param_types,
                },
                TypeFlags::empty(),
            );
            match decl.inner {
                Some(inner) => declarator_type(tu, f, inner),
                None => f,
            }
        }
        _ => {
            tu.error_node(d, "invalid declarator kind");
            TypeId::NONE
        }
    }
}

/// Resolve names and types across the whole translation unit.
pub fn resolve(tu: &mut TranslationUnit) {
    resolve_node(tu, tu.root, 0, ScopeId::NONE);
}

/// Depth to pass when recursing into a statement in body position: a
/// compound statement increments depth itself, a single statement gets
/// the increment here.
fn stmt_depth(tu: &TranslationUnit, stmt: NodeId, depth: u32) -> u32 {
    if matches!(tu.node(stmt).kind, NodeKind::Block { .. }) {
        depth
    } else {
        depth + 1
    }
}

/// Recursive resolution walk. A node that creates a name visible to its
/// peers (a declaration) returns the new scope so siblings see it;
/// nodes that open sub-scopes recurse with a deeper block depth and
/// discard the scopes their children return.
fn resolve_node(
    tu: &mut TranslationUnit,
    node: NodeId,
    depth: u32,
    parent_scope: ScopeId,
) -> Option<ScopeId> {
    let kind = tu.node(node).kind.clone();
    let mut scope = parent_scope;

    match kind {
        NodeKind::Root { children } => {
            for child in children {
                if let Some(s) = resolve_node(tu, child, depth, scope) {
                    scope = s;
                }
            }
            None
        }
        NodeKind::Block { children } => {
            for child in children {
                if let Some(s) = resolve_node(tu, child, depth + 1, scope) {
                    scope = s;
                }
            }
            None
        }
        NodeKind::Declaration {
            base_type,
            storage,
            spec,
            declarators,
        } => {
            let mut base = base_type;
            if let Some(spec) = spec {
                base = resolve_record_spec(tu, spec, depth, &mut scope, base);
            }

            for d in declarators {
                let name_token = tu.node(d).kind.declarator().and_then(|decl| decl.name);
                let ty = declarator_type(tu, base, d);

                if let Some(token) = name_token {
                    let sym = tu.token(token).name().unwrap_or(Symbol::EMPTY);
                    if let Some(prev) = tu.scopes.find_at_depth(sym, scope, depth, false) {
                        let prev_token = tu.scopes.entry(prev).name_token;
                        let message = format!("redefinition of '{}'", tu.token_text(token));
                        tu.error_token(token, message);
                        let prev_span = tu.token(prev_token).span();
                        tu.note_at(prev_span, "previous definition is here");
                    }
                    scope = tu.scopes.push(ScopeEntry {
                        name: sym,
                        name_token: token,
                        decl: d,
                        parent: scope,
                        block_depth: depth,
                        c_type: ty,
                        storage,
                        is_global: depth == 0,
                        ns_tag: false,
                        ir_index: 0,
                    });
                    if let Some(decl) = tu.node_mut(d).kind.declarator_mut() {
                        decl.scope = scope;
                    }
                    tracing::debug!(
                        name = tu.token_text(token),
                        depth,
                        ty = %tu.types.render(ty),
                        "declared"
                    );
                }

                let init = tu.node(d).kind.declarator().and_then(|decl| decl.init);
                if let Some(init) = init {
                    resolve_node(tu, init, depth, scope);
                }
            }
            Some(scope)
        }
        NodeKind::FunctionDefinition { decl, body } => {
            let new_outer = resolve_node(tu, decl, depth, scope);
            let mut inner = new_outer.unwrap_or(scope);

            // Parameters sit one block deeper than the function name.
            // The body block increments depth on its own, so recursing
            // into it at the outer depth lands its statements at the
            // parameter depth and parameters cannot be shadowed by
            // top-level locals.
            let declarators = match &tu.node(decl).kind {
                NodeKind::Declaration { declarators, .. } => declarators.clone(),
                _ => Vec::new(),
            };
            if let Some(&d0) = declarators.first() {
                if let NodeKind::FunctionDeclarator { params, .. } = tu.node(d0).kind.clone() {
                    for p in params {
                        if let Some(s) = resolve_node(tu, p, depth + 1, inner) {
                            inner = s;
                        }
                    }
                }
            }

            resolve_node(tu, body, depth, inner);
            new_outer
        }
        NodeKind::Ident { .. } => {
            let token = tu.node(node).token;
            let found = tu
                .token(token)
                .name()
                .and_then(|sym| tu.scopes.lookup(sym, scope, false));
            match found {
                Some(id) => {
                    if let NodeKind::Ident { scope: binding } = &mut tu.node_mut(node).kind {
                        *binding = id;
                    }
                    tracing::debug!(
                        name = tu.token_text(token),
                        line = tu.token(token).line,
                        ty = %tu.types.render(tu.scopes.entry(id).c_type),
                        declared_line = tu.token(tu.scopes.entry(id).name_token).line,
                        "resolved"
                    );
                }
                None => {
                    let message = format!("undeclared identifier '{}'", tu.token_text(token));
                    tu.error_token(token, message);
                }
            }
            None
        }
        NodeKind::BinaryOp { lhs, rhs } => {
            resolve_node(tu, lhs, depth, scope);
            resolve_node(tu, rhs, depth, scope);
            None
        }
        NodeKind::UnaryOp { inner } | NodeKind::PostfixOp { inner } => {
            resolve_node(tu, inner, depth, scope);
            None
        }
        NodeKind::Member { inner, .. } => {
            // The member name lives in the struct type, not the scope
            // table; only the object expression resolves here.
            resolve_node(tu, inner, depth, scope);
            None
        }
        NodeKind::Subscript { inner, index } => {
            resolve_node(tu, inner, depth, scope);
            resolve_node(tu, index, depth, scope);
            None
        }
        NodeKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            resolve_node(tu, cond, depth, scope);
            resolve_node(tu, then_expr, depth, scope);
            resolve_node(tu, else_expr, depth, scope);
            None
        }
        NodeKind::Call { callee, args } => {
            resolve_node(tu, callee, depth, scope);
            for arg in args {
                resolve_node(tu, arg, depth, scope);
            }
            None
        }
        NodeKind::Return { expr } => {
            if let Some(expr) = expr {
                resolve_node(tu, expr, depth, scope);
            }
            None
        }
        NodeKind::If {
            cond,
            then_stmt,
            else_stmt,
        } => {
            resolve_node(tu, cond, depth, scope);
            let then_depth = stmt_depth(tu, then_stmt, depth);
            resolve_node(tu, then_stmt, then_depth, scope);
            if let Some(else_stmt) = else_stmt {
                let else_depth = stmt_depth(tu, else_stmt, depth);
                resolve_node(tu, else_stmt, else_depth, scope);
            }
            None
        }
        NodeKind::While { cond, body } => {
            resolve_node(tu, cond, depth, scope);
            let body_depth = stmt_depth(tu, body, depth);
            resolve_node(tu, body, body_depth, scope);
            None
        }
        NodeKind::Do { body, cond } => {
            let body_depth = stmt_depth(tu, body, depth);
            resolve_node(tu, body, body_depth, scope);
            resolve_node(tu, cond, depth, scope);
            None
        }
        NodeKind::For {
            init,
            cond,
            next,
            body,
        } => {
            // The init declaration opens the loop's own scope; the
            // body (block or single statement) nests inside it.
            let loop_depth = depth + 1;
            let mut loop_scope = scope;
            if let Some(init) = init {
                if let Some(s) = resolve_node(tu, init, loop_depth, loop_scope) {
                    loop_scope = s;
                }
            }
            if let Some(cond) = cond {
                resolve_node(tu, cond, loop_depth, loop_scope);
            }
            if let Some(next) = next {
                resolve_node(tu, next, loop_depth, loop_scope);
            }
            resolve_node(tu, body, loop_depth, loop_scope);
            None
        }
        NodeKind::Switch { expr, body } => {
            resolve_node(tu, expr, depth, scope);
            let body_depth = stmt_depth(tu, body, depth);
            resolve_node(tu, body, body_depth, scope);
            None
        }
        NodeKind::Case { value } => {
            resolve_node(tu, value, depth, scope);
            None
        }
        NodeKind::StaticAssert { expr, .. } => {
            resolve_node(tu, expr, depth, scope);
            None
        }
        // Labels and goto targets live in a function-level namespace
        // that is not resolved here.
        NodeKind::Label { .. } | NodeKind::Goto { .. } => None,
        _ => None,
    }
}

/// Handle the struct/union/enum specifier attached to a declaration:
/// declare tags and enumerators, and substitute the tag's canonical
/// type for bodiless references.
fn resolve_record_spec(
    tu: &mut TranslationUnit,
    spec: NodeId,
    depth: u32,
    scope: &mut ScopeId,
    base: TypeId,
) -> TypeId {
    let kind = tu.node(spec).kind.clone();
    match kind {
        NodeKind::StructDef {
            is_union,
            name,
            has_body,
            ty,
            ..
        } => {
            if has_body {
                if let Some(token) = name {
                    declare_tag(tu, token, spec, depth, scope, ty);
                }
                ty
            } else if let Some(token) = name {
                let sym = tu.token(token).name().unwrap_or(Symbol::EMPTY);
                match tu.scopes.lookup(sym, *scope, true) {
                    Some(id) => tu.scopes.entry(id).c_type,
                    None => {
                        let message = format!(
                            "undeclared {} tag '{}'",
                            if is_union { "union" } else { "struct" },
                            tu.token_text(token)
                        );
                        tu.error_token(token, message);
                        TypeId::NONE
                    }
                }
            } else {
                base
            }
        }
        NodeKind::EnumDef {
            name,
            enumerators,
            has_body,
            ty,
            ..
        } => {
            if has_body {
                if let Some(token) = name {
                    declare_tag(tu, token, spec, depth, scope, ty);
                }
                // Enumerators are ordinary identifiers with the enum's
                // type.
                for e in enumerators {
                    let NodeKind::Enumerator { name, value, .. } = tu.node(e).kind.clone() else {
                        continue;
                    };
                    if let Some(value) = value {
                        resolve_node(tu, value, depth, *scope);
                    }
                    let sym = tu.token(name).name().unwrap_or(Symbol::EMPTY);
                    if let Some(prev) = tu.scopes.find_at_depth(sym, *scope, depth, false) {
                        let prev_token = tu.scopes.entry(prev).name_token;
                        let message = format!("redefinition of '{}'", tu.token_text(name));
                        tu.error_token(name, message);
                        let prev_span = tu.token(prev_token).span();
                        tu.note_at(prev_span, "previous definition is here");
                    }
                    *scope = tu.scopes.push(ScopeEntry {
                        name: sym,
                        name_token: name,
                        decl: e,
                        parent: *scope,
                        block_depth: depth,
                        c_type: ty,
                        storage: None,
                        is_global: depth == 0,
                        ns_tag: false,
                        ir_index: 0,
                    });
                    if let NodeKind::Enumerator { scope: binding, .. } = &mut tu.node_mut(e).kind {
                        *binding = *scope;
                    }
                }
                ty
            } else if let Some(token) = name {
                let sym = tu.token(token).name().unwrap_or(Symbol::EMPTY);
                match tu.scopes.lookup(sym, *scope, true) {
                    Some(id) => tu.scopes.entry(id).c_type,
                    None => {
                        let message =
                            format!("undeclared enum tag '{}'", tu.token_text(token));
                        tu.error_token(token, message);
                        TypeId::NONE
                    }
                }
            } else {
                base
            }
        }
        _ => base,
    }
}

fn declare_tag(
    tu: &mut TranslationUnit,
    token: TokenId,
    spec: NodeId,
    depth: u32,
    scope: &mut ScopeId,
    ty: TypeId,
) {
    let sym = tu.token(token).name().unwrap_or(Symbol::EMPTY);
    if let Some(prev) = tu.scopes.find_at_depth(sym, *scope, depth, true) {
        let prev_token = tu.scopes.entry(prev).name_token;
        let message = format!("redefinition of tag '{}'", tu.token_text(token));
        tu.error_token(token, message);
        let prev_span = tu.token(prev_token).span();
        tu.note_at(prev_span, "previous definition is here");
    }
    *scope = tu.scopes.push(ScopeEntry {
        name: sym,
        name_token: token,
        decl: spec,
        parent: *scope,
        block_depth: depth,
        c_type: ty,
        storage: None,
        is_global: depth == 0,
        ns_tag: true,
        ir_index: 0,
    });
}

/// One line per scope entry: the declared name, storage class, and the
/// canonical type, in declaration order.
pub fn dump_scopes(tu: &TranslationUnit) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    for (_, entry) in tu.scopes.iter() {
        let name = tu.interner.resolve(entry.name);
        let mut line = String::new();
        if entry.ns_tag {
            line.push_str("tag ");
        }
        line.push_str(name);
        line.push_str(" has type ");
        if let Some(storage) = entry.storage {
            let _ = write!(line, "{} ", storage);
        }
        line.push_str(&tu.types.render(entry.c_type));
        let _ = writeln!(out, "{}", line);
    }
    out
}
