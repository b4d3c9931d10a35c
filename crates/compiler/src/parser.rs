//! Recursive-descent parser.
//!
//! Consumes the token vector and builds the AST in the translation
//! unit's node arena. Declaration specifiers are resolved here, seeding
//! the canonical type table with each declaration's base type; the
//! declarator chains themselves are inverted later by the resolver.
//!
//! The parser uses single-token lookahead everywhere except two spots:
//! external definitions scan ahead to tell function definitions from
//! declarations, and assignment expressions are disambiguated from
//! conditional expressions with a snapshot/restore of the parser state.
//!
//! A parse error appends an Error node, reports a diagnostic, and
//! advances exactly one token.

use crate::ast::{Declarator, NodeId, NodeKind};
use crate::lexer::{TokenId, TokenKind};
use crate::tu::TranslationUnit;
use crate::types::{Field, StorageClass, TypeFlags, TypeId, TypeLayer};

bitflags::bitflags! {
    /// Type specifiers seen so far in one declaration-specifier run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct Seen: u16 {
        const CHAR = 1 << 0;
        const SHORT = 1 << 1;
        const LONG = 1 << 2;
        const LONG_TWICE = 1 << 3;
        const INT = 1 << 4;
        const SIGNED = 1 << 5;
        const UNSIGNED = 1 << 6;
        const FLOAT = 1 << 7;
        const DOUBLE = 1 << 8;
        const COMPLEX = 1 << 9;
        const VOID = 1 << 10;
        const BOOL = 1 << 11;
        const RECORD = 1 << 12;
    }
}

impl Seen {
    const ANY_FLOAT: Seen = Seen::FLOAT.union(Seen::DOUBLE).union(Seen::COMPLEX);
}

/// Parse the translation unit's tokens into an AST rooted at a Root
/// node. Parsing stops at the first top-level error (the error has
/// already been reported and an Error node recorded).
pub fn parse(tu: &mut TranslationUnit) {
    let mut parser = Parser {
        tu,
        pos: 0,
        errors: 0,
    };

    let root = parser.tu.push_node(
        NodeKind::Root {
            children: Vec::new(),
        },
        TokenId(0),
    );

    let mut children = Vec::new();
    while parser.more_data() && parser.errors == 0 {
        children.push(parser.parse_external_definition());
    }

    parser.tu.node_mut(root).kind = NodeKind::Root { children };
    parser.tu.root = root;
}

struct Parser<'a> {
    tu: &'a mut TranslationUnit,
    pos: usize,
    errors: usize,
}

impl<'a> Parser<'a> {
    fn kind(&self) -> TokenKind {
        self.tu.tokens[self.pos].kind
    }

    fn peek_kind(&self) -> TokenKind {
        let next = (self.pos + 1).min(self.tu.tokens.len() - 1);
        self.tu.tokens[next].kind
    }

    fn peekn_kind(&self, n: usize) -> TokenKind {
        let next = (self.pos + n).min(self.tu.tokens.len() - 1);
        self.tu.tokens[next].kind
    }

    fn token_id(&self) -> TokenId {
        TokenId(self.pos as u32)
    }

    fn more_data(&self) -> bool {
        self.kind() != TokenKind::Eof
    }

    fn pass(&mut self) {
        if self.pos + 1 < self.tu.tokens.len() {
            self.pos += 1;
        }
    }

    /// Consume a token of the given kind, reporting a syntax error if
    /// something else is there. Advances either way.
    fn eat(&mut self, kind: TokenKind, production: &str) {
        if self.kind() != kind {
            self.errors += 1;
            let message = format!(
                "expected '{}', found '{}' in {}",
                kind.text(),
                self.kind().text(),
                production
            );
            self.tu.error_token(self.token_id(), message);
        }
        self.pass();
    }

    fn new_node(&mut self, kind: NodeKind) -> NodeId {
        let token = self.token_id();
        self.tu.push_node(kind, token)
    }

    fn node_at(&mut self, kind: NodeKind, token: TokenId) -> NodeId {
        self.tu.push_node(kind, token)
    }

    fn set_end(&mut self, node: NodeId) {
        let end = self.token_id();
        self.tu.node_mut(node).token_end = Some(end);
    }

    /// Report an error at the current token, record an Error node, and
    /// advance one token (single-token resynchronization).
    fn error_node(&mut self, message: impl Into<String>) -> NodeId {
        self.errors += 1;
        let node = self.new_node(NodeKind::Error);
        self.tu.error_token(self.token_id(), message);
        if self.more_data() {
            self.pass();
        }
        node
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_ident(&mut self) -> NodeId {
        if self.kind() != TokenKind::Ident {
            return self.error_node("expected an identifier");
        }
        let node = self.new_node(NodeKind::Ident {
            scope: crate::resolver::ScopeId::NONE,
        });
        self.pass();
        node
    }

    fn parse_primary_expression(&mut self) -> NodeId {
        match self.kind() {
            TokenKind::IntLit | TokenKind::KwTrue | TokenKind::KwFalse => {
                let node = self.new_node(NodeKind::IntLiteral);
                self.pass();
                node
            }
            TokenKind::FloatLit => {
                let node = self.new_node(NodeKind::FloatLiteral);
                self.pass();
                node
            }
            TokenKind::StrLit => {
                let node = self.new_node(NodeKind::StringLiteral);
                self.pass();
                node
            }
            TokenKind::Ident => self.parse_ident(),
            TokenKind::LParen => {
                self.pass();
                let expr = self.parse_expression();
                self.set_end(expr);
                self.eat(TokenKind::RParen, "parenthesized expression");
                expr
            }
            _ => self.error_node("expected primary expression"),
        }
    }

    fn parse_postfix_expression(&mut self) -> NodeId {
        let mut inner = self.parse_primary_expression();
        loop {
            match self.kind() {
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let token = self.token_id();
                    self.pass();
                    inner = self.node_at(NodeKind::PostfixOp { inner }, token);
                }
                TokenKind::Dot | TokenKind::Arrow => {
                    if self.peek_kind() != TokenKind::Ident {
                        return self.error_node("expected an identifier after member reference");
                    }
                    let token = self.token_id();
                    self.pass();
                    let ident = self.parse_ident();
                    let node = self.node_at(NodeKind::Member { inner, ident }, token);
                    self.set_end(node);
                    inner = node;
                }
                TokenKind::LParen => {
                    let token = self.token_id();
                    self.pass();
                    let mut args = Vec::new();
                    while self.kind() != TokenKind::RParen && self.more_data() {
                        args.push(self.parse_assignment_expression());
                        if self.kind() != TokenKind::RParen {
                            self.eat(TokenKind::Comma, "call argument list");
                        }
                    }
                    let node = self.node_at(NodeKind::Call { callee: inner, args }, token);
                    self.set_end(node);
                    self.eat(TokenKind::RParen, "call argument list");
                    inner = node;
                }
                TokenKind::LBracket => {
                    let token = self.token_id();
                    self.pass();
                    let index = self.parse_expression();
                    let node = self.node_at(NodeKind::Subscript { inner, index }, token);
                    self.set_end(node);
                    self.eat(TokenKind::RBracket, "array subscript");
                    inner = node;
                }
                _ => break,
            }
        }
        inner
    }

    fn parse_prefix_expression(&mut self) -> NodeId {
        match self.kind() {
            TokenKind::PlusPlus
            | TokenKind::MinusMinus
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Amp
            | TokenKind::Tilde
            | TokenKind::Bang
            | TokenKind::KwSizeof
            | TokenKind::KwAlignof => {
                let token = self.token_id();
                self.pass();
                let inner = self.parse_prefix_expression();
                self.node_at(NodeKind::UnaryOp { inner }, token)
            }
            _ => self.parse_postfix_expression(),
        }
    }

    fn parse_cast_expression(&mut self) -> NodeId {
        // Cast syntax is not disambiguated yet; a parenthesized type
        // name here parses as a primary-expression error.
        self.parse_prefix_expression()
    }

    /// One level of the binary-operator ladder: parse `next`, then fold
    /// any number of operators this level accepts, left-associative.
    fn parse_binary_level(
        &mut self,
        next: fn(&mut Self) -> NodeId,
        accepts: fn(TokenKind) -> bool,
    ) -> NodeId {
        let mut result = next(self);
        while accepts(self.kind()) {
            let token = self.token_id();
            self.pass();
            let rhs = next(self);
            result = self.node_at(NodeKind::BinaryOp { lhs: result, rhs }, token);
        }
        result
    }

    fn parse_mul(&mut self) -> NodeId {
        self.parse_binary_level(Self::parse_cast_expression, |k| {
            matches!(k, TokenKind::Star | TokenKind::Slash | TokenKind::Percent)
        })
    }

    fn parse_add(&mut self) -> NodeId {
        self.parse_binary_level(Self::parse_mul, |k| {
            matches!(k, TokenKind::Plus | TokenKind::Minus)
        })
    }

    fn parse_shift(&mut self) -> NodeId {
        self.parse_binary_level(Self::parse_add, |k| {
            matches!(k, TokenKind::Shl | TokenKind::Shr)
        })
    }

    fn parse_rel(&mut self) -> NodeId {
        self.parse_binary_level(Self::parse_shift, |k| {
            matches!(
                k,
                TokenKind::Less | TokenKind::Greater | TokenKind::LessEq | TokenKind::GreaterEq
            )
        })
    }

    fn parse_eq(&mut self) -> NodeId {
        self.parse_binary_level(Self::parse_rel, |k| {
            matches!(k, TokenKind::EqEq | TokenKind::NotEq)
        })
    }

    fn parse_bitand(&mut self) -> NodeId {
        self.parse_binary_level(Self::parse_eq, |k| k == TokenKind::Amp)
    }

    fn parse_bitxor(&mut self) -> NodeId {
        self.parse_binary_level(Self::parse_bitand, |k| k == TokenKind::Caret)
    }

    fn parse_bitor(&mut self) -> NodeId {
        self.parse_binary_level(Self::parse_bitxor, |k| k == TokenKind::Pipe)
    }

    fn parse_and(&mut self) -> NodeId {
        self.parse_binary_level(Self::parse_bitor, |k| k == TokenKind::AmpAmp)
    }

    fn parse_or(&mut self) -> NodeId {
        self.parse_binary_level(Self::parse_and, |k| k == TokenKind::PipePipe)
    }

    fn parse_ternary_expression(&mut self) -> NodeId {
        let cond = self.parse_or();
        if self.kind() != TokenKind::Question {
            return cond;
        }
        let token = self.token_id();
        self.pass();
        let then_expr = self.parse_expression();
        self.eat(TokenKind::Colon, "conditional expression");
        let else_expr = self.parse_ternary_expression();
        self.node_at(
            NodeKind::Ternary {
                cond,
                then_expr,
                else_expr,
            },
            token,
        )
    }

    fn is_assignment_op(kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Assign
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::PercentEq
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::ShlEq
                | TokenKind::ShrEq
                | TokenKind::AmpEq
                | TokenKind::CaretEq
                | TokenKind::PipeEq
        )
    }

    fn parse_assignment_expression(&mut self) -> NodeId {
        // Trial-parse a unary expression; if an assignment operator
        // follows it was the left-hand side, otherwise restore and
        // parse the whole thing as a conditional expression.
        let saved_pos = self.pos;
        let saved_nodes = self.tu.nodes.len();
        let saved_diags = self.tu.diagnostics.len();
        let saved_errors = self.errors;

        let lhs = self.parse_prefix_expression();

        if Self::is_assignment_op(self.kind()) {
            let token = self.token_id();
            self.pass();
            let rhs = self.parse_assignment_expression();
            self.node_at(NodeKind::BinaryOp { lhs, rhs }, token)
        } else {
            self.pos = saved_pos;
            self.tu.nodes.truncate(saved_nodes);
            self.tu.diagnostics.truncate(saved_diags);
            self.errors = saved_errors;
            self.parse_ternary_expression()
        }
    }

    fn parse_expression(&mut self) -> NodeId {
        self.parse_binary_level(Self::parse_assignment_expression, |k| k == TokenKind::Comma)
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn is_type_qualifier(kind: TokenKind) -> bool {
        // C23(N3096) 6.7.3.1
        matches!(
            kind,
            TokenKind::KwConst
                | TokenKind::KwRestrict
                | TokenKind::KwVolatile
                | TokenKind::KwAtomic
        )
    }

    fn is_storage_class(kind: TokenKind) -> bool {
        // C23(N3096) 6.7.1.1
        matches!(
            kind,
            TokenKind::KwAuto
                | TokenKind::KwConstexpr
                | TokenKind::KwExtern
                | TokenKind::KwRegister
                | TokenKind::KwStatic
                | TokenKind::KwThreadLocal
                | TokenKind::KwTypedef
        )
    }

    fn is_bare_type_specifier(kind: TokenKind) -> bool {
        // C23(N3096) 6.7.2.1
        matches!(
            kind,
            TokenKind::KwVoid
                | TokenKind::KwChar
                | TokenKind::KwShort
                | TokenKind::KwInt
                | TokenKind::KwLong
                | TokenKind::KwFloat
                | TokenKind::KwDouble
                | TokenKind::KwSigned
                | TokenKind::KwUnsigned
                | TokenKind::KwBool
                | TokenKind::KwComplex
                | TokenKind::KwDecimal32
                | TokenKind::KwDecimal64
                | TokenKind::KwDecimal128
        )
    }

    fn is_function_specifier(kind: TokenKind) -> bool {
        // C23(N3096) 6.7.4.1
        matches!(kind, TokenKind::KwInline | TokenKind::KwNoreturn)
    }

    fn is_declaration_specifier(kind: TokenKind) -> bool {
        Self::is_type_qualifier(kind)
            || Self::is_bare_type_specifier(kind)
            || Self::is_storage_class(kind)
            || Self::is_function_specifier(kind)
            || matches!(
                kind,
                TokenKind::KwStruct | TokenKind::KwUnion | TokenKind::KwEnum | TokenKind::KwAlignas
            )
    }

    fn begins_type_name(kind: TokenKind) -> bool {
        Self::is_declaration_specifier(kind)
    }

    /// Does this specifier conflict with one already seen? The check
    /// runs before the combining rules so a conflicting token leaves
    /// the table untouched.
    fn incompatible_specifier(seen: Seen, kind: TokenKind) -> bool {
        let non_int = Seen::ANY_FLOAT | Seen::VOID | Seen::BOOL | Seen::RECORD;
        match kind {
            TokenKind::KwChar => {
                seen.intersects(Seen::CHAR | Seen::SHORT | Seen::LONG | non_int)
            }
            TokenKind::KwShort => seen.intersects(Seen::CHAR | Seen::LONG | non_int),
            TokenKind::KwLong => {
                seen.intersects(Seen::CHAR | Seen::LONG_TWICE | Seen::FLOAT | Seen::VOID | Seen::BOOL | Seen::RECORD)
            }
            TokenKind::KwInt => seen.intersects(Seen::CHAR | Seen::INT | non_int),
            TokenKind::KwSigned => seen.intersects(Seen::UNSIGNED | non_int),
            TokenKind::KwUnsigned => seen.intersects(Seen::SIGNED | non_int),
            TokenKind::KwFloat => seen.intersects(
                Seen::CHAR
                    | Seen::SHORT
                    | Seen::LONG
                    | Seen::INT
                    | Seen::SIGNED
                    | Seen::UNSIGNED
                    | Seen::FLOAT
                    | Seen::DOUBLE
                    | Seen::VOID
                    | Seen::BOOL
                    | Seen::RECORD,
            ),
            TokenKind::KwDouble => seen.intersects(
                Seen::CHAR
                    | Seen::SHORT
                    | Seen::INT
                    | Seen::SIGNED
                    | Seen::UNSIGNED
                    | Seen::FLOAT
                    | Seen::DOUBLE
                    | Seen::VOID
                    | Seen::BOOL
                    | Seen::RECORD,
            ),
            TokenKind::KwVoid | TokenKind::KwBool => seen.intersects(
                Seen::CHAR
                    | Seen::SHORT
                    | Seen::LONG
                    | Seen::INT
                    | Seen::SIGNED
                    | Seen::UNSIGNED
                    | non_int,
            ),
            TokenKind::KwComplex => seen.intersects(
                Seen::CHAR
                    | Seen::SHORT
                    | Seen::INT
                    | Seen::SIGNED
                    | Seen::UNSIGNED
                    | Seen::VOID
                    | Seen::BOOL
                    | Seen::RECORD,
            ),
            TokenKind::KwStruct | TokenKind::KwUnion | TokenKind::KwEnum => {
                seen.intersects(!Seen::empty())
            }
            _ => false,
        }
    }

    /// Collapse a run of declaration specifiers into a canonical base
    /// type, storage class, and optional struct/union/enum specifier
    /// node. On failure the Error node is returned instead.
    fn parse_declaration_specifiers(
        &mut self,
    ) -> Result<(TypeId, Option<StorageClass>, Option<NodeId>), NodeId> {
        let mut seen = Seen::empty();
        let mut base: Option<TypeLayer> = None;
        let mut record: Option<(TypeId, NodeId)> = None;
        let mut complex = false;
        let mut flags = TypeFlags::empty();
        let mut storage: Option<StorageClass> = None;

        macro_rules! conflict {
            () => {{
                // Commit the base accumulated so far so the table
                // reflects everything that resolved cleanly.
                if let Some(layer) = base.take() {
                    self.tu.types.find_or_create(TypeId::NONE, layer, TypeFlags::empty());
                }
                return Err(
                    self.error_node("invalid combination of declaration specifiers")
                );
            }};
        }

        while Self::is_declaration_specifier(self.kind()) {
            let kind = self.kind();
            if Self::incompatible_specifier(seen, kind) {
                conflict!();
            }

            match kind {
                TokenKind::KwStruct | TokenKind::KwUnion => {
                    seen |= Seen::RECORD;
                    let node = self.parse_struct();
                    let ty = match &self.tu.node(node).kind {
                        NodeKind::StructDef { ty, .. } => *ty,
                        _ => TypeId::NONE,
                    };
                    record = Some((ty, node));
                    continue;
                }
                TokenKind::KwEnum => {
                    seen |= Seen::RECORD;
                    let node = self.parse_enum();
                    let ty = match &self.tu.node(node).kind {
                        NodeKind::EnumDef { ty, .. } => *ty,
                        _ => TypeId::NONE,
                    };
                    record = Some((ty, node));
                    continue;
                }

                TokenKind::KwConst => flags |= TypeFlags::CONST,
                TokenKind::KwVolatile => flags |= TypeFlags::VOLATILE,
                TokenKind::KwAtomic => flags |= TypeFlags::ATOMIC,
                TokenKind::KwRestrict => flags |= TypeFlags::RESTRICT,
                TokenKind::KwInline => flags |= TypeFlags::INLINE,
                TokenKind::KwNoreturn => flags |= TypeFlags::NORETURN,

                TokenKind::KwAlignas => {
                    self.pass();
                    self.eat(TokenKind::LParen, "alignas specifier");
                    if self.kind() != TokenKind::IntLit {
                        return Err(self.error_node("alignas requires an integer constant"));
                    }
                    let value = self.tu.token(self.token_id()).int_value();
                    if !value.is_power_of_two() {
                        return Err(self.error_node("alignas requires a power of two"));
                    }
                    flags = flags.with_alignas_log2(value.trailing_zeros() as u16);
                    self.pass();
                    self.eat(TokenKind::RParen, "alignas specifier");
                    continue;
                }

                TokenKind::KwAuto
                | TokenKind::KwConstexpr
                | TokenKind::KwExtern
                | TokenKind::KwRegister
                | TokenKind::KwStatic
                | TokenKind::KwThreadLocal
                | TokenKind::KwTypedef => {
                    if storage.is_some() {
                        return Err(self.error_node("duplicate storage class"));
                    }
                    storage = Some(match kind {
                        TokenKind::KwAuto => StorageClass::Auto,
                        TokenKind::KwConstexpr => StorageClass::Constexpr,
                        TokenKind::KwExtern => StorageClass::Extern,
                        TokenKind::KwRegister => StorageClass::Register,
                        TokenKind::KwThreadLocal => StorageClass::ThreadLocal,
                        TokenKind::KwTypedef => StorageClass::Typedef,
                        _ => StorageClass::Static,
                    });
                }

                TokenKind::KwChar => {
                    seen |= Seen::CHAR;
                    base = match base.clone() {
                        Some(TypeLayer::UnsignedInt) => Some(TypeLayer::UnsignedChar),
                        Some(TypeLayer::SignedInt) | None => Some(TypeLayer::SignedChar),
                        _ => conflict!(),
                    };
                }
                TokenKind::KwShort => {
                    seen |= Seen::SHORT;
                    base = match base.clone() {
                        Some(TypeLayer::SignedInt) | None => Some(TypeLayer::SignedShort),
                        Some(TypeLayer::UnsignedInt) => Some(TypeLayer::UnsignedShort),
                        _ => conflict!(),
                    };
                }
                TokenKind::KwLong => {
                    if seen.contains(Seen::LONG) {
                        seen |= Seen::LONG_TWICE;
                    }
                    seen |= Seen::LONG;
                    base = match base.clone() {
                        Some(TypeLayer::SignedInt) | None => Some(TypeLayer::SignedLong),
                        Some(TypeLayer::UnsignedInt) => Some(TypeLayer::UnsignedLong),
                        Some(TypeLayer::SignedLong) => Some(TypeLayer::SignedLongLong),
                        Some(TypeLayer::UnsignedLong) => Some(TypeLayer::UnsignedLongLong),
                        Some(TypeLayer::Double) => Some(TypeLayer::LongDouble),
                        _ => conflict!(),
                    };
                }
                TokenKind::KwInt => {
                    seen |= Seen::INT;
                    base = match base.clone() {
                        None => Some(TypeLayer::SignedInt),
                        Some(
                            layer @ (TypeLayer::SignedShort
                            | TypeLayer::SignedInt
                            | TypeLayer::SignedLong
                            | TypeLayer::SignedLongLong
                            | TypeLayer::UnsignedShort
                            | TypeLayer::UnsignedInt
                            | TypeLayer::UnsignedLong
                            | TypeLayer::UnsignedLongLong),
                        ) => Some(layer),
                        _ => conflict!(),
                    };
                }
                TokenKind::KwSigned => {
                    seen |= Seen::SIGNED;
                    base = match base.clone() {
                        None => Some(TypeLayer::SignedInt),
                        Some(
                            layer @ (TypeLayer::SignedChar
                            | TypeLayer::SignedShort
                            | TypeLayer::SignedInt
                            | TypeLayer::SignedLong
                            | TypeLayer::SignedLongLong),
                        ) => Some(layer),
                        _ => conflict!(),
                    };
                }
                TokenKind::KwUnsigned => {
                    seen |= Seen::UNSIGNED;
                    base = match base.clone() {
                        None => Some(TypeLayer::UnsignedInt),
                        Some(TypeLayer::SignedChar) => Some(TypeLayer::UnsignedChar),
                        Some(TypeLayer::SignedShort) => Some(TypeLayer::UnsignedShort),
                        Some(TypeLayer::SignedInt) => Some(TypeLayer::UnsignedInt),
                        Some(TypeLayer::SignedLong) => Some(TypeLayer::UnsignedLong),
                        Some(TypeLayer::SignedLongLong) => Some(TypeLayer::UnsignedLongLong),
                        Some(
                            layer @ (TypeLayer::UnsignedChar
                            | TypeLayer::UnsignedShort
                            | TypeLayer::UnsignedInt
                            | TypeLayer::UnsignedLong
                            | TypeLayer::UnsignedLongLong),
                        ) => Some(layer),
                        _ => conflict!(),
                    };
                }
                TokenKind::KwFloat => {
                    seen |= Seen::FLOAT;
                    base = match base.clone() {
                        None => Some(TypeLayer::Float),
                        _ => conflict!(),
                    };
                }
                TokenKind::KwDouble => {
                    seen |= Seen::DOUBLE;
                    base = match base.clone() {
                        None => Some(TypeLayer::Double),
                        Some(TypeLayer::SignedLong) => Some(TypeLayer::LongDouble),
                        _ => conflict!(),
                    };
                }
                TokenKind::KwVoid => {
                    seen |= Seen::VOID;
                    base = match base.clone() {
                        None => Some(TypeLayer::Void),
                        _ => conflict!(),
                    };
                }
                TokenKind::KwBool => {
                    seen |= Seen::BOOL;
                    base = match base.clone() {
                        None => Some(TypeLayer::Bool),
                        _ => conflict!(),
                    };
                }
                TokenKind::KwComplex => {
                    seen |= Seen::COMPLEX;
                    complex = true;
                }
                TokenKind::KwDecimal32 | TokenKind::KwDecimal64 | TokenKind::KwDecimal128 => {
                    return Err(self.error_node("decimal floating types are not supported"));
                }
                _ => {
                    return Err(self.error_node("invalid declaration specifier"));
                }
            }
            self.pass();
        }

        if complex {
            base = match base.clone() {
                Some(TypeLayer::Float) => Some(TypeLayer::ComplexFloat),
                Some(TypeLayer::Double) | None => Some(TypeLayer::ComplexDouble),
                Some(TypeLayer::LongDouble) => Some(TypeLayer::ComplexLongDouble),
                _ => {
                    return Err(
                        self.error_node("invalid combination of declaration specifiers")
                    );
                }
            };
        }

        if let Some((record_ty, spec_node)) = record {
            let base_ty = if flags.is_empty() || record_ty.is_none() {
                record_ty
            } else {
                // Qualified struct/union/enum gets its own canonical
                // entry with the same layer and the qualifier flags.
                let entry = self.tu.types.entry(record_ty).clone();
                self.tu.types.find_or_create(entry.inner, entry.layer, flags)
            };
            return Ok((base_ty, storage, Some(spec_node)));
        }

        match base {
            Some(layer) => {
                let ty = self.tu.types.find_or_create(TypeId::NONE, layer, flags);
                Ok((ty, storage, None))
            }
            None => Err(self.error_node("declaration specifiers name no type")),
        }
    }

    /// Struct or union specifier, with an optional tag and an optional
    /// member list. An inline definition emits a canonical type.
    fn parse_struct(&mut self) -> NodeId {
        let token = self.token_id();
        let is_union = self.kind() == TokenKind::KwUnion;
        if self.kind() != TokenKind::KwStruct && self.kind() != TokenKind::KwUnion {
            return self.error_node("expected a struct or union specifier");
        }
        self.pass();

        let name = if self.kind() == TokenKind::Ident {
            let name = self.token_id();
            self.pass();
            Some(name)
        } else {
            None
        };

        if self.kind() != TokenKind::LBrace {
            // Tag reference; the resolver substitutes the tag's type.
            return self.node_at(
                NodeKind::StructDef {
                    is_union,
                    name,
                    members: Vec::new(),
                    has_body: false,
                    ty: TypeId::NONE,
                },
                token,
            );
        }

        self.eat(TokenKind::LBrace, "struct definition");
        let mut members = Vec::new();
        while self.kind() != TokenKind::RBrace && self.more_data() {
            members.push(self.parse_declaration());
        }

        let mut fields = Vec::new();
        for &member in &members {
            let (base, declarators) = match &self.tu.node(member).kind {
                NodeKind::Declaration {
                    base_type,
                    declarators,
                    ..
                } => (*base_type, declarators.clone()),
                _ => continue,
            };
            for d in declarators {
                let name_token = self
                    .tu
                    .node(d)
                    .kind
                    .declarator()
                    .and_then(|decl| decl.name);
                let Some(name_token) = name_token else { continue };
                let Some(sym) = self.tu.token(name_token).name() else {
                    continue;
                };
                let ty = crate::resolver::declarator_type(self.tu, base, d);
                fields.push(Field { name: sym, ty });
            }
        }

        let layer = if is_union {
            TypeLayer::Union { fields }
        } else {
            TypeLayer::Struct { fields }
        };
        let ty = self
            .tu
            .types
            .find_or_create(TypeId::NONE, layer, TypeFlags::empty());

        let node = self.node_at(
            NodeKind::StructDef {
                is_union,
                name,
                members,
                has_body: true,
                ty,
            },
            token,
        );
        self.set_end(node);
        self.eat(TokenKind::RBrace, "struct definition");
        node
    }

    /// Enum specifier. The enum layer's inner type is the int base.
    fn parse_enum(&mut self) -> NodeId {
        let token = self.token_id();
        self.eat(TokenKind::KwEnum, "enum specifier");

        let name = if self.kind() == TokenKind::Ident {
            let name = self.token_id();
            self.pass();
            Some(name)
        } else {
            None
        };

        if self.kind() != TokenKind::LBrace {
            return self.node_at(
                NodeKind::EnumDef {
                    name,
                    enumerators: Vec::new(),
                    has_body: false,
                    ty: TypeId::NONE,
                },
                token,
            );
        }

        self.eat(TokenKind::LBrace, "enum definition");
        let mut enumerators = Vec::new();
        while self.kind() != TokenKind::RBrace && self.more_data() {
            if self.kind() != TokenKind::Ident {
                enumerators.push(self.error_node("expected an enumerator name"));
                continue;
            }
            let name_token = self.token_id();
            self.pass();
            let value = if self.kind() == TokenKind::Assign {
                self.pass();
                Some(self.parse_assignment_expression())
            } else {
                None
            };
            enumerators.push(self.node_at(
                NodeKind::Enumerator {
                    name: name_token,
                    value,
                    scope: crate::resolver::ScopeId::NONE,
                },
                name_token,
            ));
            if self.kind() != TokenKind::RBrace {
                self.eat(TokenKind::Comma, "enum definition");
            }
        }

        let int = self
            .tu
            .types
            .find_or_create(TypeId::NONE, TypeLayer::SignedInt, TypeFlags::empty());
        let ty = self
            .tu
            .types
            .find_or_create(int, TypeLayer::Enum, TypeFlags::empty());

        let node = self.node_at(
            NodeKind::EnumDef {
                name,
                enumerators,
                has_body: true,
                ty,
            },
            token,
        );
        self.set_end(node);
        self.eat(TokenKind::RBrace, "enum definition");
        node
    }

    fn declarator_name(&self, node: NodeId) -> Option<TokenId> {
        self.tu.node(node).kind.declarator().and_then(|d| d.name)
    }

    fn parse_declarator(&mut self) -> NodeId {
        if self.kind() == TokenKind::Star {
            let token = self.token_id();
            self.pass();
            let inner = self.parse_declarator();
            let name = self.declarator_name(inner);
            self.node_at(
                NodeKind::Declarator(Declarator {
                    inner: Some(inner),
                    name,
                    ..Declarator::default()
                }),
                token,
            )
        } else {
            self.parse_direct_declarator()
        }
    }

    fn parse_direct_declarator(&mut self) -> NodeId {
        let mut node = match self.kind() {
            TokenKind::Ident => {
                let token = self.token_id();
                self.pass();
                self.node_at(
                    NodeKind::Declarator(Declarator {
                        name: Some(token),
                        ..Declarator::default()
                    }),
                    token,
                )
            }
            TokenKind::LParen => {
                self.pass();
                let inner = self.parse_declarator();
                self.set_end(inner);
                self.eat(TokenKind::RParen, "declarator");
                inner
            }
            TokenKind::Comma | TokenKind::Semi | TokenKind::RParen => {
                // A declarator with no name, as in a cast or an
                // anonymous parameter.
                self.node_at(
                    NodeKind::Declarator(Declarator {
                        nameless: true,
                        ..Declarator::default()
                    }),
                    self.token_id(),
                )
            }
            _ => return self.error_node("unable to parse declarator"),
        };

        loop {
            match self.kind() {
                TokenKind::LBracket => {
                    let token = self.token_id();
                    self.pass();
                    let extent = if self.kind() != TokenKind::RBracket {
                        Some(self.parse_assignment_expression())
                    } else {
                        None
                    };
                    let name = self.declarator_name(node);
                    let wrapped = self.node_at(
                        NodeKind::ArrayDeclarator {
                            d: Declarator {
                                inner: Some(node),
                                name,
                                ..Declarator::default()
                            },
                            extent,
                        },
                        token,
                    );
                    self.set_end(wrapped);
                    self.eat(TokenKind::RBracket, "array declarator");
                    node = wrapped;
                }
                TokenKind::LParen => {
                    let token = self.token_id();
                    self.eat(TokenKind::LParen, "function declarator");
                    let mut params = Vec::new();
                    while self.kind() != TokenKind::RParen && self.more_data() {
                        params.push(self.parse_single_declaration());
                        if self.kind() != TokenKind::RParen {
                            self.eat(TokenKind::Comma, "parameter list");
                        }
                    }
                    let name = self.declarator_name(node);
                    let wrapped = self.node_at(
                        NodeKind::FunctionDeclarator {
                            d: Declarator {
                                inner: Some(node),
                                name,
                                ..Declarator::default()
                            },
                            params,
                        },
                        token,
                    );
                    self.set_end(wrapped);
                    self.eat(TokenKind::RParen, "function declarator");
                    node = wrapped;
                }
                _ => break,
            }
        }

        node
    }

    fn parse_full_declarator(&mut self) -> NodeId {
        let node = self.parse_declarator();
        if self.kind() == TokenKind::Assign {
            self.pass();
            let init = self.parse_assignment_expression();
            if let Some(d) = self.tu.node_mut(node).kind.declarator_mut() {
                d.init = Some(init);
            }
        }
        node
    }

    fn parse_static_assert_declaration(&mut self) -> NodeId {
        let token = self.token_id();
        self.pass();
        self.eat(TokenKind::LParen, "static assert");
        let expr = self.parse_assignment_expression();
        let message = if self.kind() == TokenKind::Comma {
            self.eat(TokenKind::Comma, "static assert");
            if self.kind() == TokenKind::StrLit {
                let node = self.new_node(NodeKind::StringLiteral);
                self.pass();
                Some(node)
            } else {
                Some(self.error_node("static assert message must be a string literal"))
            }
        } else {
            None
        };
        self.eat(TokenKind::RParen, "static assert");
        let node = self.node_at(NodeKind::StaticAssert { expr, message }, token);
        self.set_end(node);
        self.eat(TokenKind::Semi, "static assert");
        node
    }

    fn parse_declaration(&mut self) -> NodeId {
        if self.kind() == TokenKind::KwStaticAssert {
            return self.parse_static_assert_declaration();
        }

        let token = self.token_id();
        let (base_type, storage, spec) = match self.parse_declaration_specifiers() {
            Ok(result) => result,
            Err(error) => return error,
        };

        let mut declarators = Vec::new();
        while self.kind() != TokenKind::Semi && self.more_data() {
            declarators.push(self.parse_full_declarator());
            if self.kind() != TokenKind::Semi {
                self.eat(TokenKind::Comma, "declaration");
            }
        }
        let node = self.node_at(
            NodeKind::Declaration {
                base_type,
                storage,
                spec,
                declarators,
            },
            token,
        );
        self.set_end(node);
        self.eat(TokenKind::Semi, "declaration");
        node
    }

    /// A declaration with zero or one declarators and no trailing
    /// semicolon, for function definitions and parameters.
    fn parse_single_declaration(&mut self) -> NodeId {
        let token = self.token_id();
        let (base_type, storage, spec) = match self.parse_declaration_specifiers() {
            Ok(result) => result,
            Err(error) => return error,
        };

        let mut declarators = Vec::new();
        if matches!(
            self.kind(),
            TokenKind::Star | TokenKind::LParen | TokenKind::Ident
        ) {
            declarators.push(self.parse_declarator());
        }

        self.node_at(
            NodeKind::Declaration {
                base_type,
                storage,
                spec,
                declarators,
            },
            token,
        )
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_expression_statement(&mut self) -> NodeId {
        let expr = self.parse_expression();
        self.eat(TokenKind::Semi, "expression statement");
        expr
    }

    fn parse_compound_statement(&mut self) -> NodeId {
        let token = self.token_id();
        self.eat(TokenKind::LBrace, "compound statement");
        let mut children = Vec::new();
        while self.kind() != TokenKind::RBrace && self.more_data() {
            children.push(self.parse_statement());
        }
        let node = self.node_at(NodeKind::Block { children }, token);
        self.set_end(node);
        self.eat(TokenKind::RBrace, "compound statement");
        node
    }

    fn parse_label(&mut self) -> NodeId {
        let token = self.token_id();
        let name = self.parse_ident();
        let node = self.node_at(NodeKind::Label { name }, token);
        self.set_end(node);
        self.eat(TokenKind::Colon, "label");
        node
    }

    fn parse_return_statement(&mut self) -> NodeId {
        let token = self.token_id();
        self.pass();
        let expr = if self.kind() != TokenKind::Semi {
            Some(self.parse_expression())
        } else {
            None
        };
        let node = self.node_at(NodeKind::Return { expr }, token);
        self.set_end(node);
        self.eat(TokenKind::Semi, "return statement");
        node
    }

    fn parse_null_statement(&mut self) -> NodeId {
        let node = self.new_node(NodeKind::Null);
        self.eat(TokenKind::Semi, "null statement");
        node
    }

    fn parse_if_statement(&mut self) -> NodeId {
        let token = self.token_id();
        self.eat(TokenKind::KwIf, "if statement");
        self.eat(TokenKind::LParen, "if statement");
        let cond = self.parse_expression();
        self.eat(TokenKind::RParen, "if statement");
        let then_stmt = self.parse_statement();
        let else_stmt = if self.kind() == TokenKind::KwElse {
            self.eat(TokenKind::KwElse, "if statement");
            Some(self.parse_statement())
        } else {
            None
        };
        self.node_at(
            NodeKind::If {
                cond,
                then_stmt,
                else_stmt,
            },
            token,
        )
    }

    fn parse_while_statement(&mut self) -> NodeId {
        let token = self.token_id();
        self.eat(TokenKind::KwWhile, "while statement");
        self.eat(TokenKind::LParen, "while statement");
        let cond = self.parse_expression();
        self.eat(TokenKind::RParen, "while statement");
        let body = self.parse_statement();
        self.node_at(NodeKind::While { cond, body }, token)
    }

    fn parse_do_statement(&mut self) -> NodeId {
        let token = self.token_id();
        self.eat(TokenKind::KwDo, "do statement");
        let body = self.parse_statement();
        self.eat(TokenKind::KwWhile, "do statement");
        self.eat(TokenKind::LParen, "do statement");
        let cond = self.parse_expression();
        self.eat(TokenKind::RParen, "do statement");
        let node = self.node_at(NodeKind::Do { body, cond }, token);
        self.set_end(node);
        self.eat(TokenKind::Semi, "do statement");
        node
    }

    fn parse_for_statement(&mut self) -> NodeId {
        let token = self.token_id();
        self.eat(TokenKind::KwFor, "for statement");
        self.eat(TokenKind::LParen, "for statement");

        let init = if self.kind() != TokenKind::Semi {
            if Self::begins_type_name(self.kind()) {
                Some(self.parse_declaration())
            } else {
                let expr = self.parse_expression();
                self.eat(TokenKind::Semi, "for statement");
                Some(expr)
            }
        } else {
            self.eat(TokenKind::Semi, "for statement");
            None
        };
        let cond = if self.kind() != TokenKind::Semi {
            Some(self.parse_expression())
        } else {
            None
        };
        self.eat(TokenKind::Semi, "for statement");
        let next = if self.kind() != TokenKind::RParen {
            Some(self.parse_expression())
        } else {
            None
        };
        self.eat(TokenKind::RParen, "for statement");
        let body = self.parse_statement();
        self.node_at(
            NodeKind::For {
                init,
                cond,
                next,
                body,
            },
            token,
        )
    }

    fn parse_switch_statement(&mut self) -> NodeId {
        let token = self.token_id();
        self.eat(TokenKind::KwSwitch, "switch statement");
        self.eat(TokenKind::LParen, "switch statement");
        let expr = self.parse_expression();
        self.eat(TokenKind::RParen, "switch statement");
        let body = self.parse_statement();
        self.node_at(NodeKind::Switch { expr, body }, token)
    }

    fn parse_case_statement(&mut self) -> NodeId {
        let token = self.token_id();
        self.eat(TokenKind::KwCase, "case label");
        let value = self.parse_expression();
        self.eat(TokenKind::Colon, "case label");
        self.node_at(NodeKind::Case { value }, token)
    }

    fn parse_goto_statement(&mut self) -> NodeId {
        let token = self.token_id();
        self.eat(TokenKind::KwGoto, "goto statement");
        let label = self.parse_ident();
        let node = self.node_at(NodeKind::Goto { label }, token);
        self.eat(TokenKind::Semi, "goto statement");
        node
    }

    fn parse_statement(&mut self) -> NodeId {
        match self.kind() {
            TokenKind::LBrace => return self.parse_compound_statement(),
            TokenKind::Semi => return self.parse_null_statement(),
            TokenKind::KwStaticAssert => return self.parse_declaration(),
            TokenKind::Ident => {
                if self.peek_kind() == TokenKind::Colon {
                    return self.parse_label();
                }
                return self.parse_expression_statement();
            }
            TokenKind::KwReturn => return self.parse_return_statement(),
            TokenKind::KwIf => return self.parse_if_statement(),
            TokenKind::KwWhile => return self.parse_while_statement(),
            TokenKind::KwDo => return self.parse_do_statement(),
            TokenKind::KwFor => return self.parse_for_statement(),
            TokenKind::KwSwitch => return self.parse_switch_statement(),
            TokenKind::KwCase => return self.parse_case_statement(),
            TokenKind::KwGoto => return self.parse_goto_statement(),
            TokenKind::KwBreak => {
                let node = self.new_node(NodeKind::Break);
                self.pass();
                self.eat(TokenKind::Semi, "break statement");
                return node;
            }
            TokenKind::KwContinue => {
                let node = self.new_node(NodeKind::Continue);
                self.pass();
                self.eat(TokenKind::Semi, "continue statement");
                return node;
            }
            TokenKind::KwDefault => {
                let node = self.new_node(NodeKind::Default);
                self.pass();
                self.eat(TokenKind::Colon, "default label");
                return node;
            }
            _ => {}
        }

        if Self::begins_type_name(self.kind()) {
            return self.parse_declaration();
        }

        self.parse_expression_statement()
    }

    // ------------------------------------------------------------------
    // External definitions
    // ------------------------------------------------------------------

    fn parse_function_definition(&mut self) -> NodeId {
        let token = self.token_id();
        let decl = self.parse_single_declaration();
        let body = self.parse_compound_statement();
        self.node_at(NodeKind::FunctionDefinition { decl, body }, token)
    }

    fn parse_external_definition(&mut self) -> NodeId {
        // Single-token lookahead cannot tell a function definition from
        // a declaration, so scan ahead for the first decisive token.
        // The brace group of a struct/union/enum specifier is skipped;
        // only a function body's '{' decides.
        let mut i = 0;
        loop {
            match self.peekn_kind(i) {
                TokenKind::Eof => {
                    return self.error_node("unknown external definition");
                }
                TokenKind::KwStruct | TokenKind::KwUnion | TokenKind::KwEnum => {
                    i += 1;
                    if self.peekn_kind(i) == TokenKind::Ident {
                        i += 1;
                    }
                    if self.peekn_kind(i) == TokenKind::LBrace {
                        let mut depth = 0usize;
                        loop {
                            match self.peekn_kind(i) {
                                TokenKind::LBrace => depth += 1,
                                TokenKind::RBrace => {
                                    depth -= 1;
                                    if depth == 0 {
                                        i += 1;
                                        break;
                                    }
                                }
                                TokenKind::Eof => {
                                    return self.error_node("unknown external definition");
                                }
                                _ => {}
                            }
                            i += 1;
                        }
                    }
                }
                TokenKind::LBrace => return self.parse_function_definition(),
                TokenKind::Assign | TokenKind::Semi | TokenKind::KwStaticAssert => {
                    return self.parse_declaration();
                }
                _ => i += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tu::TranslationUnit;

    fn parsed(source: &str) -> TranslationUnit {
        let mut tu = TranslationUnit::new("test.c", source);
        crate::lexer::tokenize(&mut tu, 8);
        parse(&mut tu);
        tu
    }

    fn root_children(tu: &TranslationUnit) -> Vec<NodeId> {
        match &tu.node(tu.root).kind {
            NodeKind::Root { children } => children.clone(),
            other => panic!("expected root, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_translation_unit() {
        let tu = parsed("");
        assert!(root_children(&tu).is_empty());
        assert_eq!(tu.error_count(), 0);
    }

    #[test]
    fn test_simple_declaration() {
        let tu = parsed("int x = 1;");
        let children = root_children(&tu);
        assert_eq!(children.len(), 1);
        match &tu.node(children[0]).kind {
            NodeKind::Declaration {
                base_type,
                storage,
                declarators,
                ..
            } => {
                assert_eq!(tu.types.render(*base_type), "int");
                assert!(storage.is_none());
                assert_eq!(declarators.len(), 1);
                let d = tu.node(declarators[0]).kind.declarator().unwrap().clone();
                assert!(d.init.is_some());
                assert_eq!(tu.token_text(d.name.unwrap()), "x");
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_declarators_share_base() {
        let tu = parsed("long a, *b, c[4];");
        let children = root_children(&tu);
        match &tu.node(children[0]).kind {
            NodeKind::Declaration {
                base_type,
                declarators,
                ..
            } => {
                assert_eq!(tu.types.render(*base_type), "long");
                assert_eq!(declarators.len(), 3);
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_storage_class_is_separate_from_type() {
        let tu = parsed("static int x;");
        let children = root_children(&tu);
        match &tu.node(children[0]).kind {
            NodeKind::Declaration {
                base_type, storage, ..
            } => {
                assert_eq!(*storage, Some(StorageClass::Static));
                assert_eq!(tu.types.render(*base_type), "int");
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_storage_class_fails() {
        let tu = parsed("static extern int x;");
        assert_eq!(tu.error_count(), 1);
        assert!(tu.diagnostics[0].message.contains("duplicate storage class"));
    }

    #[test]
    fn test_specifier_conflict_int_float() {
        let tu = parsed("int float x;");
        assert_eq!(tu.error_count(), 1);
        assert!(
            tu.diagnostics[0]
                .message
                .contains("invalid combination of declaration specifiers")
        );
        // int resolved cleanly before the conflict; float was rejected.
        assert!(tu.types.contains_layer(&TypeLayer::SignedInt));
        assert!(!tu.types.contains_layer(&TypeLayer::Float));
    }

    #[test]
    fn test_specifier_combining_rules() {
        for (source, rendered) in [
            ("unsigned x;", "unsigned int"),
            ("unsigned char x;", "unsigned char"),
            ("char unsigned x;", "unsigned char"),
            ("long long x;", "long long"),
            ("unsigned long long int x;", "unsigned long long"),
            ("short int x;", "short"),
            ("signed x;", "int"),
            ("long double x;", "long double"),
            ("double long x;", "long double"),
            ("float _Complex x;", "complex float"),
            ("bool x;", "bool"),
        ] {
            let tu = parsed(source);
            assert_eq!(tu.error_count(), 0, "unexpected error for {}", source);
            let children = root_children(&tu);
            match &tu.node(children[0]).kind {
                NodeKind::Declaration { base_type, .. } => {
                    assert_eq!(tu.types.render(*base_type), rendered, "for {}", source);
                }
                other => panic!("expected declaration, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_specifier_conflicts_rejected() {
        for source in [
            "char short x;",
            "long long long x;",
            "signed unsigned x;",
            "float int x;",
            "double double x;",
            "void int x;",
            "bool char x;",
        ] {
            let tu = parsed(source);
            assert!(tu.error_count() > 0, "expected error for {}", source);
        }
    }

    #[test]
    fn test_qualifier_flags() {
        let tu = parsed("const volatile int x;");
        let children = root_children(&tu);
        match &tu.node(children[0]).kind {
            NodeKind::Declaration { base_type, .. } => {
                assert_eq!(tu.types.render(*base_type), "const volatile int");
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_alignas_specifier() {
        let tu = parsed("alignas(16) int x;");
        assert_eq!(tu.error_count(), 0);
        let children = root_children(&tu);
        match &tu.node(children[0]).kind {
            NodeKind::Declaration { base_type, .. } => {
                assert_eq!(tu.types.render(*base_type), "int alignas(16)");
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_alignas_rejects_non_power_of_two() {
        let tu = parsed("alignas(12) int x;");
        assert_eq!(tu.error_count(), 1);
        assert!(tu.diagnostics[0].message.contains("power of two"));
    }

    #[test]
    fn test_function_definition_shape() {
        let tu = parsed("int main(void) { return 0; }");
        let children = root_children(&tu);
        assert_eq!(children.len(), 1);
        match &tu.node(children[0]).kind {
            NodeKind::FunctionDefinition { decl, body } => {
                assert!(matches!(
                    tu.node(*decl).kind,
                    NodeKind::Declaration { .. }
                ));
                assert!(matches!(tu.node(*body).kind, NodeKind::Block { .. }));
            }
            other => panic!("expected function definition, got {:?}", other),
        }
    }

    #[test]
    fn test_declarator_chain_for_complex_declaration() {
        // int (*f[3])(char): function declarator wrapping a pointer
        // wrapping an array wrapping the name.
        let tu = parsed("int (*f[3])(char);");
        assert_eq!(tu.error_count(), 0);
        let children = root_children(&tu);
        let d = match &tu.node(children[0]).kind {
            NodeKind::Declaration { declarators, .. } => declarators[0],
            other => panic!("expected declaration, got {:?}", other),
        };
        let NodeKind::FunctionDeclarator { d: fd, params } = &tu.node(d).kind else {
            panic!("expected function declarator");
        };
        assert_eq!(params.len(), 1);
        let ptr = fd.inner.unwrap();
        let NodeKind::Declarator(pd) = &tu.node(ptr).kind else {
            panic!("expected pointer declarator");
        };
        let arr = pd.inner.unwrap();
        let NodeKind::ArrayDeclarator { d: ad, extent } = &tu.node(arr).kind else {
            panic!("expected array declarator");
        };
        assert!(extent.is_some());
        let name = ad.inner.unwrap();
        let NodeKind::Declarator(nd) = &tu.node(name).kind else {
            panic!("expected name declarator");
        };
        assert!(nd.inner.is_none());
        assert_eq!(tu.token_text(nd.name.unwrap()), "f");
    }

    #[test]
    fn test_assignment_vs_conditional_disambiguation() {
        let tu = parsed("int main(void) { int a = 1; a = a ? 2 : 3; a + 1; }");
        assert_eq!(tu.error_count(), 0);
    }

    #[test]
    fn test_precedence_shape() {
        let tu = parsed("int x = 1 + 2 * 3;");
        let children = root_children(&tu);
        let NodeKind::Declaration { declarators, .. } = &tu.node(children[0]).kind else {
            panic!("expected declaration");
        };
        let d = tu.node(declarators[0]).kind.declarator().unwrap().clone();
        let NodeKind::BinaryOp { lhs, rhs } = &tu.node(d.init.unwrap()).kind else {
            panic!("expected binop initializer");
        };
        // + at the top, * underneath on the right.
        assert_eq!(tu.token_text(tu.node(d.init.unwrap()).token), "+");
        assert!(matches!(tu.node(*lhs).kind, NodeKind::IntLiteral));
        assert!(matches!(tu.node(*rhs).kind, NodeKind::BinaryOp { .. }));
    }

    #[test]
    fn test_statement_kinds_parse() {
        let source = r#"
int f(int n) {
    l: ;
    if (n) n = 1; else n = 2;
    while (n) n = n - 1;
    do n = n + 1; while (n < 3);
    for (int i = 0; i < 4; i = i + 1) n = n + i;
    switch (n) {
    case 1:
        break;
    default:
        n = 0;
    }
    goto l;
    return n;
}
"#;
        let tu = parsed(source);
        assert_eq!(tu.error_count(), 0);
    }

    #[test]
    fn test_struct_definition_creates_type() {
        let tu = parsed("struct point { int x; int y; } p;");
        assert_eq!(tu.error_count(), 0);
        let children = root_children(&tu);
        let NodeKind::Declaration {
            base_type, spec, ..
        } = &tu.node(children[0]).kind
        else {
            panic!("expected declaration");
        };
        assert!(spec.is_some());
        let entry = tu.types.entry(*base_type);
        match &entry.layer {
            TypeLayer::Struct { fields } => assert_eq!(fields.len(), 2),
            other => panic!("expected struct layer, got {:?}", other),
        }
    }

    #[test]
    fn test_enum_definition_creates_type() {
        let tu = parsed("enum color { RED, GREEN = 2, BLUE } c;");
        assert_eq!(tu.error_count(), 0);
        let children = root_children(&tu);
        let NodeKind::Declaration { base_type, .. } = &tu.node(children[0]).kind else {
            panic!("expected declaration");
        };
        let entry = tu.types.entry(*base_type);
        assert!(matches!(entry.layer, TypeLayer::Enum));
        assert_eq!(tu.types.render(entry.inner), "int");
    }

    #[test]
    fn test_static_assert_parses() {
        let tu = parsed("static_assert(1);");
        assert_eq!(tu.error_count(), 0);
        let children = root_children(&tu);
        assert!(matches!(
            tu.node(children[0]).kind,
            NodeKind::StaticAssert { .. }
        ));
    }

    #[test]
    fn test_error_inserts_error_node_and_resyncs() {
        let tu = parsed("int x = $;");
        assert!(tu.error_count() > 0);
    }

    #[test]
    fn test_unknown_external_definition() {
        let tu = parsed("+");
        assert_eq!(tu.error_count(), 1);
        assert!(tu.diagnostics[0].message.contains("unknown external definition"));
    }

    #[test]
    fn test_unterminated_block_does_not_hang() {
        let tu = parsed("int main(void) { return 0;");
        assert!(tu.error_count() > 0);
    }
}
