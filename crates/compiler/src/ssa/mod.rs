//! SSA intermediate representation.
//!
//! A `Function` owns an ordered list of basic blocks and an arena of
//! `Value`s. Instructions reference values by index; every operand
//! refers to a previously produced value, and a value never changes
//! after its defining instruction has been emitted. φs are values, not
//! instructions: a merged variable is a `Value` with the `Phi` kind,
//! carrying its operand list and the list of φs that depend on it.
//!
//! Block life cycle: a block is *filled* once all its instructions have
//! been emitted and *sealed* once all its predecessors are known.
//! Incomplete φs accumulate on unsealed blocks and are completed at
//! seal time; see `builder` for the construction algorithm.

pub mod builder;

pub use builder::emit;

use crate::resolver::ScopeId;
use crate::tu::TranslationUnit;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Index into a function's block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

/// Index into a function's value arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shr,
    Shl,
    /// Comparison; all relational and equality operators lower to this.
    Test,
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shr => "shr",
            BinaryOp::Shl => "shl",
            BinaryOp::Test => "test",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Inv,
}

impl UnaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "not",
            UnaryOp::Inv => "inv",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Instr {
    /// Pseudo-instruction printed at the head of a named block.
    Label { name: String },
    /// Pseudo-instruction for static data; currently never emitted.
    Data,
    Binary {
        op: BinaryOp,
        dst: ValueId,
        lhs: ValueId,
        rhs: ValueId,
    },
    Unary {
        op: UnaryOp,
        dst: ValueId,
        src: ValueId,
    },
    Move { dst: ValueId, src: ValueId },
    Imm { dst: ValueId, value: u64 },
    /// dst <- [addr + offset]
    Ld {
        dst: ValueId,
        addr: ValueId,
        offset: ValueId,
    },
    /// [addr + offset] <- src
    St {
        addr: ValueId,
        src: ValueId,
        offset: ValueId,
    },
    Addr { dst: ValueId, src: ValueId },
    Call {
        dst: ValueId,
        callee: ValueId,
        args: Vec<ValueId>,
    },
    Ret { value: Option<ValueId> },
    Jz { target: BlockId, cond: ValueId },
    Jmp { target: BlockId },
}

#[derive(Debug, Clone)]
pub enum ValueKind {
    /// Defined by exactly one instruction.
    Temp,
    /// A function parameter, defined on entry.
    Param,
    /// A file-scope object or function name; unversioned.
    Global,
    /// A read of a variable with no reaching definition.
    Undef,
    Phi {
        operands: Vec<ValueId>,
        /// φs that use this φ as an operand, maintained at
        /// operand-insertion time for trivial-φ removal.
        dependents: Vec<ValueId>,
    },
}

#[derive(Debug, Clone)]
pub struct Value {
    pub block: BlockId,
    /// SSA version for named values, temporary number otherwise.
    pub index: u32,
    /// The source variable this value versions, if any.
    pub scope: Option<ScopeId>,
    pub kind: ValueKind,
    /// Set when trivial-φ removal replaced this value; readers resolve
    /// through the link.
    pub forwarded: Option<ValueId>,
}

#[derive(Debug, Default)]
pub struct BasicBlock {
    pub name: Option<String>,
    pub instrs: Vec<Instr>,
    pub inputs: Vec<BlockId>,
    pub outputs: Vec<BlockId>,
    /// Current SSA value for each variable defined or redefined here.
    pub owned_vars: HashMap<ScopeId, ValueId>,
    /// φs created before this block was sealed, completed at seal time.
    pub incomplete_phis: Vec<(ScopeId, ValueId)>,
    pub sealed: bool,
    pub filled: bool,
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub blocks: Vec<BasicBlock>,
    pub values: Vec<Value>,
    pub temp_counter: u32,
    pub cond_counter: u32,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Function {
            name: name.into(),
            blocks: Vec::new(),
            values: Vec::new(),
            temp_counter: 0,
            cond_counter: 0,
        }
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0 as usize]
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.0 as usize]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.0 as usize]
    }

    pub fn push_value(&mut self, value: Value) -> ValueId {
        self.values.push(value);
        ValueId(self.values.len() as u32 - 1)
    }

    /// Follow forwarding links left by trivial-φ removal.
    pub fn resolve(&self, id: ValueId) -> ValueId {
        let mut cur = id;
        while let Some(next) = self.value(cur).forwarded {
            cur = next;
        }
        cur
    }

    pub fn is_phi(&self, id: ValueId) -> bool {
        matches!(self.value(id).kind, ValueKind::Phi { .. })
    }

    /// Append a block. A named block gets a label pseudo-instruction;
    /// the entry block stays unnamed.
    pub fn add_block(&mut self, name: Option<String>) -> BlockId {
        let mut block = BasicBlock::default();
        if let Some(name) = &name {
            block.instrs.push(Instr::Label { name: name.clone() });
        }
        block.name = name;
        self.blocks.push(block);
        BlockId(self.blocks.len() as u32 - 1)
    }

    /// Record the edge `from -> to` on both endpoints together, keeping
    /// the input/output lists mirror images of each other.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).outputs.push(to);
        self.block_mut(to).inputs.push(from);
    }

    fn block_label(&self, id: BlockId) -> String {
        match &self.block(id).name {
            Some(name) => name.clone(),
            None => format!("bb{}", id.0),
        }
    }

    /// Check the structural SSA invariants; used by tests and debug
    /// dumps. Returns the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        for (i, block) in self.blocks.iter().enumerate() {
            if !block.sealed {
                return Err(format!("block {} is not sealed", i));
            }
            if !block.filled {
                return Err(format!("block {} is not filled", i));
            }
            if !block.incomplete_phis.is_empty() {
                return Err(format!("block {} still has incomplete phis", i));
            }
            for &input in &block.inputs {
                if !self.block(input).outputs.contains(&BlockId(i as u32)) {
                    return Err(format!("edge {} -> {} is one-sided", input.0, i));
                }
            }
            for &output in &block.outputs {
                if !self.block(output).inputs.contains(&BlockId(i as u32)) {
                    return Err(format!("edge {} -> {} is one-sided", i, output.0));
                }
            }
        }
        for (i, value) in self.values.iter().enumerate() {
            if value.forwarded.is_some() {
                continue;
            }
            if let ValueKind::Phi { operands, .. } = &value.kind {
                let block = self.value(ValueId(i as u32)).block;
                let inputs = self.block(block).inputs.len();
                if operands.len() != inputs {
                    return Err(format!(
                        "phi {} has {} operands for {} inputs",
                        i,
                        operands.len(),
                        inputs
                    ));
                }
                let mut distinct = Vec::new();
                for &op in operands {
                    let op = self.resolve(op);
                    if op == ValueId(i as u32) || distinct.contains(&op) {
                        continue;
                    }
                    distinct.push(op);
                }
                if distinct.len() < 2 {
                    return Err(format!("phi {} is trivial but was not removed", i));
                }
            }
        }
        Ok(())
    }
}

/// Print one value the way registers appear in the IR dump: `r7` for
/// temporaries, `rx.3` for version 3 of variable `x`, `rf` for globals.
fn render_value(tu: &TranslationUnit, func: &Function, id: ValueId) -> String {
    let id = func.resolve(id);
    let value = func.value(id);
    match value.scope {
        Some(scope) => {
            let name = tu.interner.resolve(tu.scopes.entry(scope).name);
            match value.kind {
                ValueKind::Global => format!("r{}", name),
                _ => format!("r{}.{}", name, value.index),
            }
        }
        None => format!("r{}", value.index),
    }
}

fn render_instr(tu: &TranslationUnit, func: &Function, instr: &Instr) -> String {
    let val = |id: &ValueId| render_value(tu, func, *id);
    match instr {
        Instr::Label { name } => format!("label: {}:", name),
        Instr::Data => "data".to_string(),
        Instr::Binary { op, dst, lhs, rhs } => {
            format!("{} := {} {}, {}", val(dst), op.mnemonic(), val(lhs), val(rhs))
        }
        Instr::Unary { op, dst, src } => {
            format!("{} := {} {}", val(dst), op.mnemonic(), val(src))
        }
        Instr::Move { dst, src } => format!("{} := {}", val(dst), val(src)),
        Instr::Imm { dst, value } => format!("{} := {}", val(dst), value),
        Instr::Ld { dst, addr, offset } => {
            format!("{} := ld {}, {}", val(dst), val(addr), val(offset))
        }
        Instr::St { addr, src, offset } => {
            format!("st {}, {}, {}", val(addr), val(src), val(offset))
        }
        Instr::Addr { dst, src } => format!("{} := addr {}", val(dst), val(src)),
        Instr::Call { dst, callee, args } => {
            let mut out = format!("{} := call {}", val(dst), val(callee));
            for arg in args {
                out.push_str(", ");
                out.push_str(&val(arg));
            }
            out
        }
        Instr::Ret { value } => match value {
            Some(v) => format!("ret {}", val(v)),
            None => "ret".to_string(),
        },
        Instr::Jz { target, cond } => {
            format!("jz {}, {}", func.block_label(*target), val(cond))
        }
        Instr::Jmp { target } => format!("jmp {}", func.block_label(*target)),
    }
}

/// One instruction per line. φ values print at the head of their block,
/// after the label, since they are values rather than instructions.
pub fn dump_ir(tu: &TranslationUnit) -> String {
    let mut out = String::new();
    for func in &tu.functions {
        let _ = writeln!(out, "function {}:", func.name);
        for (i, block) in func.blocks.iter().enumerate() {
            let block_id = BlockId(i as u32);
            let has_label = matches!(block.instrs.first(), Some(Instr::Label { .. }));
            if has_label {
                let _ = writeln!(out, "{}", render_instr(tu, func, &block.instrs[0]));
            }
            // φs print right under the label.
            for (v, value) in func.values.iter().enumerate() {
                if value.block != block_id || value.forwarded.is_some() {
                    continue;
                }
                if let ValueKind::Phi { operands, .. } = &value.kind {
                    let mut line = format!("{} := phi", render_value(tu, func, ValueId(v as u32)));
                    for (n, op) in operands.iter().enumerate() {
                        line.push_str(if n == 0 { " " } else { ", " });
                        line.push_str(&render_value(tu, func, *op));
                    }
                    let _ = writeln!(out, "{}", line);
                }
            }
            for instr in block.instrs.iter().skip(usize::from(has_label)) {
                let _ = writeln!(out, "{}", render_instr(tu, func, instr));
            }
        }
    }
    out
}
