//! On-the-fly SSA construction.
//!
//! Implements the Braun, Buchwald et al. algorithm: the typed AST is
//! lowered to linear SSA directly, with per-block variable versions
//! tracked as blocks are emitted. Reads of a variable with no local
//! definition either recurse into the single predecessor, insert a φ,
//! or — when the block is not yet sealed — record an incomplete φ to be
//! completed once every predecessor is known. Trivial φs (at most one
//! distinct non-self operand) are removed on the spot, and removal
//! retries recursively on the φs that depended on them.
//!
//! Every assignment produces a new SSA version of the named variable,
//! unconditionally; compound assignments desugar to read-modify-write.

use super::{BinaryOp, BlockId, Function, Instr, UnaryOp, Value, ValueId, ValueKind};
use crate::ast::{NodeId, NodeKind};
use crate::lexer::TokenKind;
use crate::resolver::ScopeId;
use crate::tu::TranslationUnit;

/// Lower every function definition in the translation unit, appending
/// to the TU's function list. Declarations outside functions produce no
/// IR.
pub fn emit(tu: &mut TranslationUnit) {
    let children = match &tu.node(tu.root).kind {
        NodeKind::Root { children } => children.clone(),
        _ => return,
    };
    for child in children {
        if matches!(tu.node(child).kind, NodeKind::FunctionDefinition { .. }) {
            if let Some(function) = build_function(tu, child) {
                tu.functions.push(function);
            }
        }
    }
}

fn build_function(tu: &mut TranslationUnit, node: NodeId) -> Option<Function> {
    let NodeKind::FunctionDefinition { decl, body } = tu.node(node).kind.clone() else {
        return None;
    };

    let declarators = match &tu.node(decl).kind {
        NodeKind::Declaration { declarators, .. } => declarators.clone(),
        _ => return None,
    };
    let d0 = *declarators.first()?;
    let name = tu
        .node(d0)
        .kind
        .declarator()
        .and_then(|d| d.name)
        .map(|t| tu.token_text(t).to_string())
        .unwrap_or_else(|| "<anonymous>".to_string());

    let mut builder = Builder {
        tu,
        func: Function::new(name),
        cur: BlockId(0),
    };

    // The entry block has no predecessors and is sealed immediately.
    let entry = builder.func.add_block(None);
    builder.cur = entry;
    builder.func.block_mut(entry).sealed = true;

    // Parameters are definitions in the entry block.
    if let NodeKind::FunctionDeclarator { params, .. } = builder.tu.node(d0).kind.clone() {
        for p in params {
            let scope = match &builder.tu.node(p).kind {
                NodeKind::Declaration { declarators, .. } => declarators
                    .first()
                    .and_then(|&d| builder.tu.node(d).kind.declarator())
                    .map(|d| d.scope),
                _ => None,
            };
            if let Some(scope) = scope {
                if !scope.is_none() {
                    let value = builder.new_version(scope, entry, ValueKind::Param, false);
                    builder.write_variable(scope, entry, value);
                }
            }
        }
    }

    builder.emit_node(body, false);
    let cur = builder.cur;
    builder.func.block_mut(cur).filled = true;

    tracing::debug!(
        function = %builder.func.name,
        blocks = builder.func.blocks.len(),
        values = builder.func.values.len(),
        "lowered"
    );

    Some(builder.func)
}

struct Builder<'a> {
    tu: &'a mut TranslationUnit,
    func: Function,
    cur: BlockId,
}

impl<'a> Builder<'a> {
    fn push(&mut self, instr: Instr) {
        let cur = self.cur;
        self.func.block_mut(cur).instrs.push(instr);
    }

    fn new_block(&mut self, name: String) -> BlockId {
        self.func.add_block(Some(name))
    }

    fn fill_current(&mut self) {
        let cur = self.cur;
        self.func.block_mut(cur).filled = true;
    }

    fn new_temp(&mut self) -> ValueId {
        let index = self.func.temp_counter;
        self.func.temp_counter += 1;
        let block = self.cur;
        self.func.push_value(Value {
            block,
            index,
            scope: None,
            kind: ValueKind::Temp,
            forwarded: None,
        })
    }

    /// A new value versioning `scope`. Writes bump the variable's
    /// version counter; parameter creation does not.
    fn new_version(
        &mut self,
        scope: ScopeId,
        block: BlockId,
        kind: ValueKind,
        bump: bool,
    ) -> ValueId {
        let entry = self.tu.scopes.entry_mut(scope);
        if bump {
            entry.ir_index += 1;
        }
        let index = entry.ir_index;
        self.func.push_value(Value {
            block,
            index,
            scope: Some(scope),
            kind,
            forwarded: None,
        })
    }

    fn write_variable(&mut self, scope: ScopeId, block: BlockId, value: ValueId) {
        self.func.block_mut(block).owned_vars.insert(scope, value);
    }

    /// The current SSA value of `scope` as seen from `block`.
    fn read_variable(&mut self, scope: ScopeId, block: BlockId) -> ValueId {
        if let Some(&v) = self.func.block(block).owned_vars.get(&scope) {
            return self.func.resolve(v);
        }

        let value = if !self.func.block(block).sealed {
            // Predecessors are still unknown; park an incomplete φ.
            let phi = self.new_version(
                scope,
                block,
                ValueKind::Phi {
                    operands: Vec::new(),
                    dependents: Vec::new(),
                },
                true,
            );
            self.func.block_mut(block).incomplete_phis.push((scope, phi));
            phi
        } else if self.func.block(block).inputs.len() == 1 {
            let pred = self.func.block(block).inputs[0];
            self.read_variable(scope, pred)
        } else if self.func.block(block).inputs.is_empty() {
            // Reached function entry without a definition.
            if self.tu.scopes.entry(scope).is_global {
                self.func.push_value(Value {
                    block,
                    index: 0,
                    scope: Some(scope),
                    kind: ValueKind::Global,
                    forwarded: None,
                })
            } else {
                self.new_version(scope, block, ValueKind::Undef, true)
            }
        } else {
            // Multiple predecessors: place a φ first to break read
            // cycles, then fill its operands.
            let phi = self.new_version(
                scope,
                block,
                ValueKind::Phi {
                    operands: Vec::new(),
                    dependents: Vec::new(),
                },
                true,
            );
            self.write_variable(scope, block, phi);
            self.add_phi_operands(scope, phi)
        };

        self.write_variable(scope, block, value);
        value
    }

    /// Fill a φ's operands from its block's predecessors, then try the
    /// trivial-φ rewrite.
    fn add_phi_operands(&mut self, scope: ScopeId, phi: ValueId) -> ValueId {
        let block = self.func.value(phi).block;
        let preds = self.func.block(block).inputs.clone();
        for pred in preds {
            let operand = self.read_variable(scope, pred);
            if let ValueKind::Phi { operands, .. } = &mut self.func.value_mut(phi).kind {
                operands.push(operand);
            }
            // Dependents are maintained as operands are inserted.
            if operand != phi && self.func.is_phi(operand) {
                if let ValueKind::Phi { dependents, .. } = &mut self.func.value_mut(operand).kind {
                    if !dependents.contains(&phi) {
                        dependents.push(phi);
                    }
                }
            }
        }
        self.try_remove_trivial_phi(phi)
    }

    /// If the φ has no operands it becomes a fresh (undefined) value;
    /// if it has exactly one distinct operand besides itself it is
    /// replaced by that operand and every dependent φ is retried.
    fn try_remove_trivial_phi(&mut self, phi: ValueId) -> ValueId {
        let operands = match &self.func.value(phi).kind {
            ValueKind::Phi { operands, .. } => operands.clone(),
            _ => return self.func.resolve(phi),
        };

        let mut same: Option<ValueId> = None;
        for op in operands {
            let op = self.func.resolve(op);
            if op == phi || Some(op) == same {
                continue;
            }
            if same.is_some() {
                // Two distinct operands: the φ merges real information.
                return phi;
            }
            same = Some(op);
        }

        let replacement = match same {
            Some(v) => v,
            None => {
                let block = self.func.value(phi).block;
                match self.func.value(phi).scope {
                    Some(scope) => self.new_version(scope, block, ValueKind::Undef, true),
                    None => self.func.push_value(Value {
                        block,
                        index: 0,
                        scope: None,
                        kind: ValueKind::Undef,
                        forwarded: None,
                    }),
                }
            }
        };

        let dependents = match &self.func.value(phi).kind {
            ValueKind::Phi { dependents, .. } => dependents.clone(),
            _ => Vec::new(),
        };
        self.func.value_mut(phi).forwarded = Some(replacement);

        for dep in dependents {
            if dep != phi && self.func.value(dep).forwarded.is_none() {
                self.try_remove_trivial_phi(dep);
            }
        }

        self.func.resolve(replacement)
    }

    /// Mark all predecessors known and complete the parked φs.
    fn seal_block(&mut self, block: BlockId) {
        let phis = std::mem::take(&mut self.func.block_mut(block).incomplete_phis);
        for (scope, phi) in phis {
            self.add_phi_operands(scope, phi);
        }
        self.func.block_mut(block).sealed = true;
    }

    fn binary_op_for(kind: TokenKind) -> Option<BinaryOp> {
        match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Mod),
            TokenKind::Amp => Some(BinaryOp::And),
            TokenKind::Pipe => Some(BinaryOp::Or),
            TokenKind::Caret => Some(BinaryOp::Xor),
            TokenKind::Shr => Some(BinaryOp::Shr),
            TokenKind::Shl => Some(BinaryOp::Shl),
            TokenKind::Less
            | TokenKind::Greater
            | TokenKind::LessEq
            | TokenKind::GreaterEq
            | TokenKind::EqEq
            | TokenKind::NotEq => Some(BinaryOp::Test),
            _ => None,
        }
    }

    fn compound_op_for(kind: TokenKind) -> Option<BinaryOp> {
        match kind {
            TokenKind::PlusEq => Some(BinaryOp::Add),
            TokenKind::MinusEq => Some(BinaryOp::Sub),
            TokenKind::StarEq => Some(BinaryOp::Mul),
            TokenKind::SlashEq => Some(BinaryOp::Div),
            TokenKind::PercentEq => Some(BinaryOp::Mod),
            TokenKind::AmpEq => Some(BinaryOp::And),
            TokenKind::PipeEq => Some(BinaryOp::Or),
            TokenKind::CaretEq => Some(BinaryOp::Xor),
            TokenKind::ShrEq => Some(BinaryOp::Shr),
            TokenKind::ShlEq => Some(BinaryOp::Shl),
            _ => None,
        }
    }

    /// Lower one node. `write` selects write position: a bare
    /// identifier in write position produces a fresh SSA version
    /// instead of a read.
    fn emit_node(&mut self, node: NodeId, write: bool) -> Option<ValueId> {
        let kind = self.tu.node(node).kind.clone();
        match kind {
            NodeKind::Block { children } => {
                for child in children {
                    self.emit_node(child, false);
                }
                None
            }
            NodeKind::IntLiteral => {
                let token = self.tu.token(self.tu.node(node).token);
                let value = match token.kind {
                    TokenKind::KwTrue => 1,
                    TokenKind::KwFalse => 0,
                    _ => token.int_value(),
                };
                let dst = self.new_temp();
                self.push(Instr::Imm { dst, value });
                Some(dst)
            }
            NodeKind::Ident { scope } => {
                if scope.is_none() {
                    // Unresolved; the resolver already reported it.
                    return None;
                }
                if write {
                    let cur = self.cur;
                    let value = self.new_version(scope, cur, ValueKind::Temp, true);
                    self.write_variable(scope, cur, value);
                    Some(value)
                } else {
                    let cur = self.cur;
                    Some(self.read_variable(scope, cur))
                }
            }
            NodeKind::BinaryOp { lhs, rhs } => {
                let op_kind = self.tu.token(self.tu.node(node).token).kind;

                if op_kind == TokenKind::Assign {
                    // Right-hand side first, then the target in write
                    // position, then the move.
                    let src = self.emit_node(rhs, false)?;
                    if let NodeKind::UnaryOp { inner } = self.tu.node(lhs).kind.clone() {
                        if self.tu.token(self.tu.node(lhs).token).kind == TokenKind::Star {
                            let addr = self.emit_node(inner, false)?;
                            let offset = self.new_temp();
                            self.push(Instr::Imm {
                                dst: offset,
                                value: 0,
                            });
                            self.push(Instr::St { addr, src, offset });
                            return Some(src);
                        }
                    }
                    let dst = self.emit_node(lhs, true)?;
                    self.push(Instr::Move { dst, src });
                    return Some(dst);
                }

                if let Some(op) = Self::compound_op_for(op_kind) {
                    let old = self.emit_node(lhs, false)?;
                    let rhs_value = self.emit_node(rhs, false)?;
                    let tmp = self.new_temp();
                    self.push(Instr::Binary {
                        op,
                        dst: tmp,
                        lhs: old,
                        rhs: rhs_value,
                    });
                    let dst = self.emit_node(lhs, true)?;
                    self.push(Instr::Move { dst, src: tmp });
                    return Some(dst);
                }

                if op_kind == TokenKind::Comma {
                    self.emit_node(lhs, false);
                    return self.emit_node(rhs, false);
                }

                match Self::binary_op_for(op_kind) {
                    Some(op) => {
                        let lhs_value = self.emit_node(lhs, false)?;
                        let rhs_value = self.emit_node(rhs, false)?;
                        let dst = self.new_temp();
                        self.push(Instr::Binary {
                            op,
                            dst,
                            lhs: lhs_value,
                            rhs: rhs_value,
                        });
                        Some(dst)
                    }
                    None => {
                        let message = format!(
                            "unhandled binary operator '{}'",
                            op_kind.text()
                        );
                        self.tu.error_node(node, message);
                        None
                    }
                }
            }
            NodeKind::UnaryOp { inner } => {
                if write {
                    self.tu.error_node(node, "unhandled assignment target");
                    return None;
                }
                let op_kind = self.tu.token(self.tu.node(node).token).kind;
                match op_kind {
                    TokenKind::Plus => self.emit_node(inner, false),
                    TokenKind::Minus | TokenKind::Bang | TokenKind::Tilde => {
                        let op = match op_kind {
                            TokenKind::Minus => UnaryOp::Neg,
                            TokenKind::Bang => UnaryOp::Not,
                            _ => UnaryOp::Inv,
                        };
                        let src = self.emit_node(inner, false)?;
                        let dst = self.new_temp();
                        self.push(Instr::Unary { op, dst, src });
                        Some(dst)
                    }
                    TokenKind::Star => {
                        let addr = self.emit_node(inner, false)?;
                        let offset = self.new_temp();
                        self.push(Instr::Imm {
                            dst: offset,
                            value: 0,
                        });
                        let dst = self.new_temp();
                        self.push(Instr::Ld { dst, addr, offset });
                        Some(dst)
                    }
                    TokenKind::Amp => {
                        self.tu.error_node(node, "address-of is not implemented");
                        None
                    }
                    _ => {
                        self.tu.error_node(node, "unhandled node kind");
                        None
                    }
                }
            }
            NodeKind::Call { callee, args } => {
                let mut arg_values = Vec::new();
                for arg in args {
                    arg_values.push(self.emit_node(arg, false)?);
                }
                let callee_value = self.emit_node(callee, false)?;
                let dst = self.new_temp();
                self.push(Instr::Call {
                    dst,
                    callee: callee_value,
                    args: arg_values,
                });
                Some(dst)
            }
            NodeKind::Declaration { declarators, .. } => {
                for d in declarators {
                    let decl = match self.tu.node(d).kind.declarator() {
                        Some(decl) => decl.clone(),
                        None => continue,
                    };
                    let Some(init) = decl.init else { continue };
                    if decl.scope.is_none() {
                        continue;
                    }
                    if let Some(src) = self.emit_node(init, false) {
                        let cur = self.cur;
                        let dst = self.new_version(decl.scope, cur, ValueKind::Temp, true);
                        self.write_variable(decl.scope, cur, dst);
                        self.push(Instr::Move { dst, src });
                    }
                }
                None
            }
            NodeKind::Return { expr } => {
                let value = expr.and_then(|e| self.emit_node(e, false));
                self.push(Instr::Ret { value });
                // The block ends here; anything that follows in the
                // same block is unreachable but still lowered.
                None
            }
            NodeKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                let cond_value = self.emit_node(cond, false)?;
                self.func.cond_counter += 1;
                let id = self.func.cond_counter;
                let bb_true = self.new_block(format!("if{}.true", id));
                let bb_false = self.new_block(format!("if{}.false", id));
                let bb_end = self.new_block(format!("if{}.end", id));

                self.push(Instr::Jz {
                    target: bb_false,
                    cond: cond_value,
                });
                let branch = self.cur;
                self.func.add_edge(branch, bb_true);
                self.func.add_edge(branch, bb_false);
                self.fill_current();
                self.seal_block(bb_true);
                self.seal_block(bb_false);

                self.cur = bb_true;
                self.emit_node(then_stmt, false);
                self.push(Instr::Jmp { target: bb_end });
                let true_end = self.cur;
                self.func.add_edge(true_end, bb_end);
                self.fill_current();

                self.cur = bb_false;
                if let Some(else_stmt) = else_stmt {
                    self.emit_node(else_stmt, false);
                }
                let false_end = self.cur;
                self.func.add_edge(false_end, bb_end);
                self.fill_current();

                // Both incoming edges exist now.
                self.seal_block(bb_end);
                self.cur = bb_end;
                None
            }
            NodeKind::While { cond, body } => {
                self.func.cond_counter += 1;
                let id = self.func.cond_counter;
                let bb_test = self.new_block(format!("while{}.top", id));
                let bb_body = self.new_block(format!("while{}.body", id));
                let bb_end = self.new_block(format!("while{}.end", id));

                self.push(Instr::Jmp { target: bb_test });
                let enter = self.cur;
                self.func.add_edge(enter, bb_test);
                self.fill_current();

                // The test block must stay unsealed until the back
                // edge from the body has been added.
                self.cur = bb_test;
                let cond_value = self.emit_node(cond, false);
                if let Some(cond_value) = cond_value {
                    self.push(Instr::Jz {
                        target: bb_end,
                        cond: cond_value,
                    });
                }
                let test = self.cur;
                self.func.add_edge(test, bb_body);
                self.func.add_edge(test, bb_end);
                self.fill_current();
                self.seal_block(bb_body);

                self.cur = bb_body;
                self.emit_node(body, false);
                self.push(Instr::Jmp { target: bb_test });
                let body_end = self.cur;
                self.func.add_edge(body_end, bb_test);
                self.fill_current();

                self.seal_block(bb_test);
                self.seal_block(bb_end);
                self.cur = bb_end;
                None
            }
            NodeKind::Null | NodeKind::StaticAssert { .. } | NodeKind::Error => None,
            NodeKind::FloatLiteral
            | NodeKind::StringLiteral
            | NodeKind::PostfixOp { .. }
            | NodeKind::Member { .. }
            | NodeKind::Subscript { .. }
            | NodeKind::Ternary { .. }
            | NodeKind::Do { .. }
            | NodeKind::For { .. }
            | NodeKind::Switch { .. }
            | NodeKind::Case { .. }
            | NodeKind::Default
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Goto { .. }
            | NodeKind::Label { .. } => {
                self.tu.error_node(node, "unhandled node kind");
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tu::TranslationUnit;

    fn compiled(source: &str) -> TranslationUnit {
        let mut tu = TranslationUnit::new("test.c", source);
        crate::lexer::tokenize(&mut tu, 8);
        crate::parser::parse(&mut tu);
        crate::resolver::resolve(&mut tu);
        assert_eq!(tu.error_count(), 0, "unexpected front-end errors");
        emit(&mut tu);
        tu
    }

    fn scope_named(tu: &TranslationUnit, name: &str) -> Vec<ScopeId> {
        tu.scopes
            .iter()
            .filter(|(_, e)| tu.interner.resolve(e.name) == name)
            .map(|(id, _)| id)
            .collect()
    }

    #[test]
    fn test_empty_tu_emits_no_ir() {
        let tu = compiled("");
        assert!(tu.functions.is_empty());
    }

    #[test]
    fn test_global_declarations_emit_no_ir() {
        let tu = compiled("int x = 1;");
        assert!(tu.functions.is_empty());
    }

    #[test]
    fn test_minimal_main() {
        let tu = compiled("int main(void) { return 0; }");
        assert_eq!(tu.functions.len(), 1);
        let func = &tu.functions[0];
        assert_eq!(func.name, "main");
        assert_eq!(func.blocks.len(), 1);
        let entry = &func.blocks[0];
        assert_eq!(entry.instrs.len(), 2);
        assert!(matches!(entry.instrs[0], Instr::Imm { value: 0, .. }));
        assert!(matches!(entry.instrs[1], Instr::Ret { value: Some(_) }));
        func.validate().unwrap();
    }

    #[test]
    fn test_straight_line_arithmetic() {
        let tu = compiled("int main(void) { int a = 1; int b = a + 2; return b * a; }");
        let func = &tu.functions[0];
        assert_eq!(func.blocks.len(), 1);
        let ops: Vec<&Instr> = func.blocks[0]
            .instrs
            .iter()
            .filter(|i| matches!(i, Instr::Binary { .. }))
            .collect();
        assert_eq!(ops.len(), 2);
        func.validate().unwrap();
    }

    #[test]
    fn test_assignment_produces_new_version() {
        let tu = compiled("int main(void) { int a = 1; a = 2; a = 3; return a; }");
        let a = scope_named(&tu, "a")[0];
        // Three writes: the initializer and two assignments.
        assert_eq!(tu.scopes.entry(a).ir_index, 3);
        let func = &tu.functions[0];
        let versions: Vec<u32> = func
            .values
            .iter()
            .filter(|v| v.scope == Some(a))
            .map(|v| v.index)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
        func.validate().unwrap();
    }

    #[test]
    fn test_compound_assignment_desugars() {
        let tu = compiled("int main(void) { int a = 1; a += 2; return a; }");
        let func = &tu.functions[0];
        let instrs = &func.blocks[0].instrs;
        // imm 1, move a.1, read feeds add, imm 2, add, move a.2, ret
        assert!(
            instrs
                .iter()
                .any(|i| matches!(i, Instr::Binary { op: BinaryOp::Add, .. }))
        );
        let a = scope_named(&tu, "a")[0];
        assert_eq!(tu.scopes.entry(a).ir_index, 2);
        func.validate().unwrap();
    }

    #[test]
    fn test_nested_shadow_reads_outer_after_block() {
        // Two scope entries named x at different depths; the final read
        // resolves to the outer variable's value, not the inner one.
        let tu = compiled("int main(void) { int x = 1; { int x = 2; } return x; }");
        let xs = scope_named(&tu, "x");
        assert_eq!(xs.len(), 2);
        let outer = xs
            .iter()
            .copied()
            .min_by_key(|&id| tu.scopes.entry(id).block_depth)
            .unwrap();

        let func = &tu.functions[0];
        let ret = func.blocks[0]
            .instrs
            .iter()
            .find_map(|i| match i {
                Instr::Ret { value } => *value,
                _ => None,
            })
            .expect("expected a return");
        let value = func.value(func.resolve(ret));
        assert_eq!(value.scope, Some(outer));
        func.validate().unwrap();
    }

    #[test]
    fn test_if_else_merge_inserts_phi() {
        let tu = compiled(
            "int f(int b) { int a = 1; if (b) a = 2; else a = 3; return a; }",
        );
        let func = &tu.functions[0];
        // entry, then, else, join.
        assert_eq!(func.blocks.len(), 4);
        func.validate().unwrap();

        let a = scope_named(&tu, "a")[0];
        let join = BlockId(3);
        assert_eq!(func.block(join).inputs.len(), 2);

        // The return value is a φ over the two assigned versions.
        let ret = func
            .block(join)
            .instrs
            .iter()
            .find_map(|i| match i {
                Instr::Ret { value } => *value,
                _ => None,
            })
            .expect("expected a return in the join block");
        let ret = func.resolve(ret);
        let value = func.value(ret);
        assert_eq!(value.scope, Some(a));
        match &value.kind {
            ValueKind::Phi { operands, .. } => {
                assert_eq!(operands.len(), 2);
                let versions: Vec<u32> = operands
                    .iter()
                    .map(|&op| func.value(func.resolve(op)).index)
                    .collect();
                assert_eq!(versions, vec![2, 3]);
            }
            other => panic!("expected a phi, got {:?}", other),
        }
    }

    #[test]
    fn test_if_without_else_still_merges() {
        let tu = compiled("int f(int b) { int a = 1; if (b) a = 2; return a; }");
        let func = &tu.functions[0];
        assert_eq!(func.blocks.len(), 4);
        func.validate().unwrap();
    }

    #[test]
    fn test_branch_local_value_needs_no_phi() {
        // Both paths leave `a` at version 1; the join's φ is trivial
        // and must be removed.
        let tu = compiled("int f(int b) { int a = 1; if (b) b = 2; else b = 3; return a; }");
        let func = &tu.functions[0];
        func.validate().unwrap();
        let a = scope_named(&tu, "a")[0];
        let phis: Vec<&Value> = func
            .values
            .iter()
            .filter(|v| {
                v.scope == Some(a)
                    && v.forwarded.is_none()
                    && matches!(v.kind, ValueKind::Phi { .. })
            })
            .collect();
        assert!(phis.is_empty(), "trivial phi for 'a' survived");
    }

    #[test]
    fn test_while_loop_block_shape() {
        // while (1) ; => exactly test, body, end created, with edges
        // enter->test, test->body, body->test, test->end.
        let tu = compiled("int main(void) { while (1) ; return 0; }");
        let func = &tu.functions[0];
        assert_eq!(func.blocks.len(), 4);
        func.validate().unwrap();

        let enter = BlockId(0);
        let test = BlockId(1);
        let body = BlockId(2);
        let end = BlockId(3);
        assert_eq!(func.block(test).name.as_deref(), Some("while1.top"));
        assert_eq!(func.block(body).name.as_deref(), Some("while1.body"));
        assert_eq!(func.block(end).name.as_deref(), Some("while1.end"));

        assert_eq!(func.block(test).inputs, vec![enter, body]);
        assert_eq!(func.block(test).outputs, vec![body, end]);
        assert_eq!(func.block(body).outputs, vec![test]);
        assert_eq!(func.block(end).inputs, vec![test]);
    }

    #[test]
    fn test_loop_phi_over_initial_and_body_value() {
        let tu = compiled(
            "int main(void) { int n = 0; while (n < 10) n = n + 1; return n; }",
        );
        let func = &tu.functions[0];
        func.validate().unwrap();
        let n = scope_named(&tu, "n")[0];

        // The test block carries a φ over the initial value and the
        // body-updated value.
        let test = BlockId(1);
        let phi = func
            .values
            .iter()
            .enumerate()
            .find(|(_, v)| {
                v.block == test
                    && v.scope == Some(n)
                    && v.forwarded.is_none()
                    && matches!(v.kind, ValueKind::Phi { .. })
            })
            .map(|(i, _)| ValueId(i as u32))
            .expect("expected a live loop phi");

        let ValueKind::Phi { operands, .. } = &func.value(phi).kind else {
            unreachable!();
        };
        assert_eq!(operands.len(), 2);
        let versions: Vec<u32> = operands
            .iter()
            .map(|&op| func.value(func.resolve(op)).index)
            .collect();
        // Initial definition and the body's redefinition.
        assert!(versions.contains(&1));
        assert!(versions.len() == 2 && versions[0] != versions[1]);

        // The body's add reads the φ.
        let body = BlockId(2);
        let add_lhs = func
            .block(body)
            .instrs
            .iter()
            .find_map(|i| match i {
                Instr::Binary {
                    op: BinaryOp::Add,
                    lhs,
                    ..
                } => Some(*lhs),
                _ => None,
            })
            .expect("expected an add in the loop body");
        assert_eq!(func.resolve(add_lhs), phi);
    }

    #[test]
    fn test_call_lowering() {
        let tu = compiled("int g(int x) { return x; } int main(void) { return g(41) + 1; }");
        assert_eq!(tu.functions.len(), 2);
        let main = &tu.functions[1];
        let call = main.blocks[0]
            .instrs
            .iter()
            .find_map(|i| match i {
                Instr::Call { callee, args, .. } => Some((*callee, args.clone())),
                _ => None,
            })
            .expect("expected a call");
        assert_eq!(call.1.len(), 1);
        let callee = main.value(main.resolve(call.0));
        assert!(matches!(callee.kind, ValueKind::Global));
        main.validate().unwrap();
    }

    #[test]
    fn test_parameters_are_entry_definitions() {
        let tu = compiled("int f(int a, int b) { return a + b; }");
        let func = &tu.functions[0];
        let params: Vec<&Value> = func
            .values
            .iter()
            .filter(|v| matches!(v.kind, ValueKind::Param))
            .collect();
        assert_eq!(params.len(), 2);
        func.validate().unwrap();
    }

    #[test]
    fn test_unhandled_statement_reports_error() {
        let mut tu = TranslationUnit::new("test.c", "int main(void) { goto out; out: return 0; }");
        crate::lexer::tokenize(&mut tu, 8);
        crate::parser::parse(&mut tu);
        crate::resolver::resolve(&mut tu);
        emit(&mut tu);
        assert!(tu.has_errors());
        assert!(
            tu.diagnostics
                .iter()
                .any(|d| d.message.contains("unhandled node kind"))
        );
    }

    #[test]
    fn test_address_of_reports_unimplemented() {
        let mut tu = TranslationUnit::new("test.c", "int main(void) { int a = 1; int *p; p = &a; return 0; }");
        crate::lexer::tokenize(&mut tu, 8);
        crate::parser::parse(&mut tu);
        crate::resolver::resolve(&mut tu);
        emit(&mut tu);
        assert!(
            tu.diagnostics
                .iter()
                .any(|d| d.message.contains("address-of is not implemented"))
        );
    }

    fn reaches(func: &Function, from: BlockId, to: BlockId) -> bool {
        let mut seen = vec![from];
        let mut queue = vec![from];
        while let Some(b) = queue.pop() {
            if b == to {
                return true;
            }
            for &o in &func.block(b).outputs {
                if !seen.contains(&o) {
                    seen.push(o);
                    queue.push(o);
                }
            }
        }
        false
    }

    #[test]
    fn test_dominance_discipline() {
        // Every instruction-defined operand is defined in the same
        // block at an earlier position or in a block that reaches this
        // one; φs, parameters, and globals sit at block heads.
        let tu = compiled(
            "int f(int b) { int a = 1; if (b) a = 2; else a = 3; while (a < 9) a = a + b; return a; }",
        );
        let func = &tu.functions[0];
        func.validate().unwrap();

        for (bi, block) in func.blocks.iter().enumerate() {
            let bid = BlockId(bi as u32);
            let mut defined_here = Vec::new();
            for instr in &block.instrs {
                let (dst, operands): (Option<ValueId>, Vec<ValueId>) = match instr {
                    Instr::Binary { dst, lhs, rhs, .. } => (Some(*dst), vec![*lhs, *rhs]),
                    Instr::Unary { dst, src, .. } => (Some(*dst), vec![*src]),
                    Instr::Move { dst, src } => (Some(*dst), vec![*src]),
                    Instr::Imm { dst, .. } => (Some(*dst), vec![]),
                    Instr::Ret { value } => (None, value.iter().copied().collect()),
                    Instr::Jz { cond, .. } => (None, vec![*cond]),
                    _ => (None, vec![]),
                };
                for op in operands {
                    let op = func.resolve(op);
                    let value = func.value(op);
                    match value.kind {
                        ValueKind::Temp => {
                            if value.block == bid {
                                assert!(
                                    defined_here.contains(&op),
                                    "operand used before definition in block {}",
                                    bi
                                );
                            } else {
                                assert!(
                                    reaches(func, value.block, bid),
                                    "operand defined in a non-dominating block"
                                );
                            }
                        }
                        _ => {
                            assert!(
                                reaches(func, value.block, bid),
                                "operand defined in an unreachable block"
                            );
                        }
                    }
                }
                if let Some(dst) = dst {
                    defined_here.push(func.resolve(dst));
                }
            }
        }
    }

    #[test]
    fn test_ir_dump_shapes() {
        let tu = compiled("int main(void) { int x = 7; x = x + 1; return x; }");
        let dump = crate::ssa::dump_ir(&tu);
        assert!(dump.contains("function main:"));
        assert!(dump.contains("r0 := 7"));
        assert!(dump.contains("rx.1 := r0"));
        assert!(dump.contains("r1 := 1"));
        assert!(dump.contains("r2 := add rx.1, r1"));
        assert!(dump.contains("rx.2 := r2"));
        assert!(dump.contains("ret rx.2"));
    }

    #[test]
    fn test_ir_dump_labels_and_jumps() {
        let tu = compiled("int main(void) { int n = 0; while (n < 3) n = n + 1; return n; }");
        let dump = crate::ssa::dump_ir(&tu);
        assert!(dump.contains("label: while1.top:"));
        assert!(dump.contains("label: while1.body:"));
        assert!(dump.contains("label: while1.end:"));
        assert!(dump.contains("jmp while1.top"));
        assert!(dump.contains("jz while1.end, "));
        assert!(dump.contains(":= phi "));
    }
}
