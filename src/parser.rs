//! Pascal Parser
//!
//! Single-pass recursive descent parser. Each grammar rule checks its
//! operands against the symbol table and type rules as it is recognized and
//! returns the synthesized attribute (typed code for expressions, plain code
//! for statements) directly; no syntax tree is built.

use crate::codegen::{self, Code, Direction, Instr};
use crate::context::Context;
use crate::error::{CompileError, Diagnostic, Result, Span};
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::semantic::{check_assignment, check_operation, BinaryOp, SymbolTable};
use crate::types::{StatementCode, Type, TypedExpr, VarType};

/// Result of a successful compilation
#[derive(Debug, Clone)]
pub struct Compilation {
    /// Program name from the header
    pub name: String,
    pub code: Code,
    pub symbols: SymbolTable,
    /// Advisory diagnostics that did not block code generation
    pub warnings: Vec<Diagnostic>,
}

impl Compilation {
    /// The instruction listing, one instruction per line
    pub fn listing(&self) -> String {
        self.code.to_string()
    }
}

/// Array subscript as written
#[derive(Debug, Clone)]
enum Index {
    /// Integer literal: offset is resolved at compile time
    Const(i64),
    /// Any other expression: offset is computed at runtime
    Dynamic(TypedExpr),
}

/// Parser state
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    ctx: Context,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self::with_context(source, Context::new())
    }

    /// Reuse an existing context; it is reset before parsing starts
    pub fn with_context(source: &str, mut ctx: Context) -> Self {
        ctx.reset();
        let (tokens, lex_errors) = tokenize(source);
        ctx.diagnostics.extend(lex_errors);
        Self {
            tokens,
            pos: 0,
            ctx,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn into_context(self) -> Context {
        self.ctx
    }

    /// Parse a complete program and assemble its code.
    ///
    /// Stops at the first syntax error. Blocking semantic errors are
    /// reported together once the whole program has been read.
    pub fn parse_program(&mut self) -> Result<Compilation> {
        self.expect(Token::Program)?;
        let (name, _) = self.expect_identifier()?;
        self.expect(Token::Semicolon)?;

        self.parse_var_decls()?;

        self.expect(Token::Begin)?;
        let body = self.parse_statements(&[Token::End])?;
        self.expect(Token::End)?;
        self.expect(Token::Dot)?;

        if !self.at_end() {
            return Err(self.unexpected());
        }

        if self.ctx.has_errors() {
            return Err(CompileError::Semantic(self.ctx.diagnostics.clone()));
        }

        let code = codegen::assemble(&self.ctx.symbols, body.into_code());

        Ok(Compilation {
            name,
            code,
            symbols: self.ctx.symbols.clone(),
            warnings: self.ctx.diagnostics.warnings().cloned().collect(),
        })
    }

    // =========================================================================
    // Token Management
    // =========================================================================

    fn current(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn current_token(&self) -> Option<&Token> {
        self.current().map(|t| &t.token)
    }

    fn peek_token(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::new(0, 0)
        }
    }

    /// Line of the current token, or of the last one at end of input
    fn current_line(&self) -> usize {
        self.current()
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Option<SpannedToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, expected: &Token) -> bool {
        self.current_token() == Some(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> CompileError {
        match self.current() {
            Some(t) => CompileError::unexpected(t.text.clone(), t.token.kind(), t.line, t.span),
            None => CompileError::eof(self.prev_span()),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<SpannedToken> {
        if self.check(&expected) {
            if let Some(token) = self.advance() {
                return Ok(token);
            }
        }
        Err(self.unexpected())
    }

    fn expect_identifier(&mut self) -> Result<(String, usize)> {
        match self.current() {
            Some(SpannedToken {
                token: Token::Identifier(name),
                line,
                ..
            }) => {
                let found = (name.clone(), *line);
                self.pos += 1;
                Ok(found)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Source text of tokens `start..self.pos`, without whitespace
    fn text_since(&self, start: usize) -> String {
        self.tokens[start..self.pos]
            .iter()
            .map(|t| t.text.as_str())
            .collect()
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn parse_var_decls(&mut self) -> Result<()> {
        if !self.eat(&Token::Var) {
            return Ok(());
        }

        loop {
            self.parse_var_decl()?;
            self.expect(Token::Semicolon)?;
            if !matches!(self.current_token(), Some(Token::Identifier(_))) {
                break;
            }
        }
        Ok(())
    }

    fn parse_var_decl(&mut self) -> Result<()> {
        let mut names = vec![self.expect_identifier()?];
        while self.eat(&Token::Comma) {
            names.push(self.expect_identifier()?);
        }
        self.expect(Token::Colon)?;
        let ty = self.parse_type()?;

        for (name, line) in names {
            self.ctx.declare(&name, ty, line);
        }
        Ok(())
    }

    fn parse_type(&mut self) -> Result<VarType> {
        if !self.eat(&Token::Array) {
            return Ok(VarType::Scalar(self.parse_simple_type()?));
        }

        self.expect(Token::LBracket)?;
        let lower = self.parse_bound()?;
        self.expect(Token::DotDot)?;
        let upper = self.parse_bound()?;
        self.expect(Token::RBracket)?;
        self.expect(Token::Of)?;
        let element = self.parse_simple_type()?;

        Ok(VarType::Array {
            element,
            lower,
            upper,
        })
    }

    fn parse_simple_type(&mut self) -> Result<Type> {
        let ty = match self.current_token() {
            Some(Token::IntegerType) => Type::Integer,
            Some(Token::RealType) => Type::Real,
            Some(Token::BooleanType) => Type::Boolean,
            Some(Token::CharType) => Type::Char,
            Some(Token::StringType) => Type::String,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        Ok(ty)
    }

    fn parse_bound(&mut self) -> Result<i64> {
        let negative = self.eat(&Token::Minus);
        match self.current_token() {
            Some(Token::Integer(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(if negative { -n } else { n })
            }
            _ => Err(self.unexpected()),
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn at_terminator(&self, terminators: &[Token]) -> bool {
        match self.current_token() {
            Some(token) => terminators.contains(token),
            None => true,
        }
    }

    /// Statements separated by `;`, up to (not including) a terminator.
    /// Empty statements are allowed.
    fn parse_statements(&mut self, terminators: &[Token]) -> Result<StatementCode> {
        let mut code = Code::new();
        loop {
            if self.eat(&Token::Semicolon) {
                continue;
            }
            if self.at_terminator(terminators) {
                break;
            }
            code.append(self.parse_statement()?.into_code());
            if !self.check(&Token::Semicolon) && !self.at_terminator(terminators) {
                return Err(self.unexpected());
            }
        }
        Ok(code.into())
    }

    fn parse_statement(&mut self) -> Result<StatementCode> {
        match self.current_token() {
            Some(Token::Identifier(_)) => self.parse_assignment(),
            Some(Token::Writeln) => self.parse_write(true),
            Some(Token::Write) => self.parse_write(false),
            Some(Token::Readln) => self.parse_readln(),
            Some(Token::If) => self.parse_if_stmt(),
            Some(Token::While) => self.parse_while_stmt(),
            Some(Token::For) => self.parse_for_stmt(),
            Some(Token::Repeat) => self.parse_repeat_stmt(),
            Some(Token::Begin) => self.parse_block_stmt(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_block_stmt(&mut self) -> Result<StatementCode> {
        self.expect(Token::Begin)?;
        let body = self.parse_statements(&[Token::End])?;
        self.expect(Token::End)?;
        Ok(body)
    }

    fn parse_assignment(&mut self) -> Result<StatementCode> {
        let start = self.pos;
        let (name, line) = self.expect_identifier()?;

        if self.eat(&Token::LBracket) {
            let index = self.parse_index()?;
            self.expect(Token::RBracket)?;
            let target = self.text_since(start);
            self.expect(Token::Assign)?;
            let value = self.parse_expression()?;
            return Ok(self.assign_element(&name, &target, index, value, line));
        }

        self.expect(Token::Assign)?;
        let value = self.parse_expression()?;
        Ok(self.assign_scalar(&name, value, line))
    }

    fn assign_scalar(&mut self, name: &str, value: TypedExpr, line: usize) -> StatementCode {
        let Some(symbol) = self.ctx.resolve(name, "Variable", line) else {
            return StatementCode::empty();
        };
        if symbol.is_array() {
            self.ctx.error(
                line,
                format!("Cannot assign directly to array '{}' (use an index)", name),
            );
            return StatementCode::empty();
        }

        match self.coerce(symbol.ty.base(), value, name, line) {
            Some(code) => code.then(Instr::StoreG(symbol.address)).into(),
            None => StatementCode::empty(),
        }
    }

    fn assign_element(
        &mut self,
        name: &str,
        target: &str,
        index: Index,
        value: TypedExpr,
        line: usize,
    ) -> StatementCode {
        let Some((element, address)) = self.element_address(name, index, line) else {
            return StatementCode::empty();
        };

        match self.coerce(element, value, target, line) {
            Some(code) => address.then(code).then(Instr::Store(0)).into(),
            None => StatementCode::empty(),
        }
    }

    /// Apply assignment compatibility rules, returning the value's code with
    /// any implicit conversion appended
    fn coerce(&mut self, target: Type, value: TypedExpr, name: &str, line: usize) -> Option<Code> {
        match check_assignment(target, value.ty, name) {
            Ok(coercion) => {
                if let Some(warning) = coercion.warning(name) {
                    self.ctx.warn(line, warning);
                }
                Some(value.code.then(coercion.instrs()))
            }
            Err(message) => {
                self.ctx.error(line, message);
                None
            }
        }
    }

    fn parse_index(&mut self) -> Result<Index> {
        if let (Some(Token::Integer(n)), Some(Token::RBracket)) =
            (self.current_token(), self.peek_token(1))
        {
            let n = *n;
            self.pos += 1;
            return Ok(Index::Const(n));
        }
        Ok(Index::Dynamic(self.parse_expression()?))
    }

    /// Code pushing the address of `name[index]`, with the element type
    fn element_address(&mut self, name: &str, index: Index, line: usize) -> Option<(Type, Code)> {
        let symbol = self.ctx.resolve(name, "Array", line)?;
        let VarType::Array {
            element,
            lower,
            upper,
        } = symbol.ty
        else {
            self.ctx.error(line, format!("'{}' is not an array", name));
            return None;
        };

        let mut code = Code::from(Instr::PushG(symbol.address));
        match index {
            Index::Const(i) => {
                let Some(offset) = i.checked_sub(lower) else {
                    self.ctx.error(
                        line,
                        format!(
                            "Index {} out of range for array {}[{}..{}]",
                            i, name, lower, upper
                        ),
                    );
                    return None;
                };
                if i < lower || i > upper {
                    self.ctx.warn(
                        line,
                        format!(
                            "Index {} out of bounds for array {}[{}..{}]",
                            i, name, lower, upper
                        ),
                    );
                }
                code.extend([Instr::PushI(offset), Instr::PAdd]);
            }
            Index::Dynamic(expr) => {
                if expr.ty != Type::Integer {
                    self.ctx
                        .error(line, format!("Array index must be integer, not {}", expr.ty));
                }
                code.append(expr.code);
                code.extend([Instr::PushI(lower), Instr::Sub, Instr::PAdd]);
            }
        }
        Some((element, code))
    }

    fn parse_write(&mut self, newline: bool) -> Result<StatementCode> {
        self.advance();

        let mut args = Vec::new();
        if self.eat(&Token::LParen) {
            if !self.check(&Token::RParen) {
                loop {
                    args.push(self.parse_expression()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
            }
            self.expect(Token::RParen)?;
        }

        let mut code = Code::new();
        for arg in args {
            code.append(codegen::write_value(arg, &mut self.ctx.labels));
        }
        if newline {
            code.push(Instr::WriteLn);
        }
        Ok(code.into())
    }

    fn parse_readln(&mut self) -> Result<StatementCode> {
        self.expect(Token::Readln)?;
        self.expect(Token::LParen)?;
        let (name, line) = self.expect_identifier()?;

        let index = if self.eat(&Token::LBracket) {
            let index = self.parse_index()?;
            self.expect(Token::RBracket)?;
            Some(index)
        } else {
            None
        };
        self.expect(Token::RParen)?;

        if let Some(index) = index {
            let Some((element, address)) = self.element_address(&name, index, line) else {
                return Ok(StatementCode::empty());
            };
            return Ok(address
                .then(codegen::read_value(element))
                .then(Instr::Store(0))
                .into());
        }

        let Some(symbol) = self.ctx.resolve(&name, "Variable", line) else {
            return Ok(StatementCode::empty());
        };
        if symbol.is_array() {
            self.ctx.error(
                line,
                format!("Cannot read into array '{}' directly (use an index)", name),
            );
            return Ok(StatementCode::empty());
        }

        Ok(codegen::read_value(symbol.ty.base())
            .then(Instr::StoreG(symbol.address))
            .into())
    }

    fn check_condition(&mut self, cond: &TypedExpr, construct: &str, line: usize) {
        if !cond.ty.is_boolean() {
            self.ctx.error(
                line,
                format!("{} condition must be boolean, not {}", construct, cond.ty),
            );
        }
    }

    fn parse_if_stmt(&mut self) -> Result<StatementCode> {
        let line = self.current_line();
        self.expect(Token::If)?;
        let cond = self.parse_expression()?;
        self.expect(Token::Then)?;
        let then_code = self.parse_statement()?;
        let else_code = if self.eat(&Token::Else) {
            Some(self.parse_statement()?)
        } else {
            None
        };

        self.check_condition(&cond, "IF", line);
        let id = self.ctx.fresh_label();

        Ok(match else_code {
            Some(else_code) => codegen::if_then_else(
                cond.code,
                then_code.into_code(),
                else_code.into_code(),
                id,
            ),
            None => codegen::if_then(cond.code, then_code.into_code(), id),
        }
        .into())
    }

    fn parse_while_stmt(&mut self) -> Result<StatementCode> {
        let line = self.current_line();
        self.expect(Token::While)?;
        let cond = self.parse_expression()?;
        self.expect(Token::Do)?;
        let body = self.parse_statement()?;

        self.check_condition(&cond, "WHILE", line);
        let id = self.ctx.fresh_label();

        Ok(codegen::while_do(cond.code, body.into_code(), id).into())
    }

    fn parse_repeat_stmt(&mut self) -> Result<StatementCode> {
        let line = self.current_line();
        self.expect(Token::Repeat)?;
        let body = self.parse_statements(&[Token::Until])?;
        self.expect(Token::Until)?;
        let cond = self.parse_expression()?;

        self.check_condition(&cond, "UNTIL", line);
        let id = self.ctx.fresh_label();

        Ok(codegen::repeat_until(body.into_code(), cond.code, id).into())
    }

    fn parse_for_stmt(&mut self) -> Result<StatementCode> {
        self.expect(Token::For)?;
        let (name, line) = self.expect_identifier()?;
        self.expect(Token::Assign)?;
        let start = self.parse_expression()?;
        let direction = if self.eat(&Token::To) {
            Direction::To
        } else if self.eat(&Token::Downto) {
            Direction::Downto
        } else {
            return Err(self.unexpected());
        };
        let end = self.parse_expression()?;
        self.expect(Token::Do)?;
        let body = self.parse_statement()?;

        let Some(symbol) = self.ctx.resolve(&name, "Variable", line) else {
            return Ok(StatementCode::empty());
        };
        if symbol.is_array() {
            self.ctx.error(
                line,
                format!("FOR control variable '{}' must be a scalar", name),
            );
            return Ok(StatementCode::empty());
        }
        if symbol.ty.base() != Type::Integer {
            self.ctx.error(
                line,
                format!("FOR control variable must be integer, not {}", symbol.ty),
            );
        }
        if start.ty != Type::Integer {
            self.ctx
                .error(line, format!("FOR start value must be integer, not {}", start.ty));
        }
        if end.ty != Type::Integer {
            self.ctx
                .error(line, format!("FOR end value must be integer, not {}", end.ty));
        }

        let id = self.ctx.fresh_label();
        Ok(codegen::for_loop(
            symbol.address,
            start.code,
            end.code,
            body.into_code(),
            direction,
            id,
        )
        .into())
    }

    // =========================================================================
    // Expressions (precedence climbing, lowest binding first)
    // =========================================================================

    fn parse_expression(&mut self) -> Result<TypedExpr> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<TypedExpr> {
        let mut left = self.parse_and_expr()?;
        while self.check(&Token::Or) {
            let line = self.current_line();
            self.advance();
            let right = self.parse_and_expr()?;
            left = self.binary(BinaryOp::Or, left, right, line);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<TypedExpr> {
        let mut left = self.parse_relational_expr()?;
        while self.check(&Token::And) {
            let line = self.current_line();
            self.advance();
            let right = self.parse_relational_expr()?;
            left = self.binary(BinaryOp::And, left, right, line);
        }
        Ok(left)
    }

    /// At most one comparison: relational operators do not associate
    fn parse_relational_expr(&mut self) -> Result<TypedExpr> {
        let left = self.parse_simple_expr()?;

        let op = match self.current_token() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(left),
        };
        let line = self.current_line();
        self.advance();
        let right = self.parse_simple_expr()?;
        Ok(self.binary(op, left, right, line))
    }

    fn parse_simple_expr(&mut self) -> Result<TypedExpr> {
        let sign = match self.current_token() {
            Some(Token::Minus) => Some(true),
            Some(Token::Plus) => Some(false),
            _ => None,
        };
        let sign_line = self.current_line();
        if sign.is_some() {
            self.advance();
        }

        let mut left = self.parse_term()?;
        if let Some(negate) = sign {
            left = self.unary_sign(negate, left, sign_line);
        }

        loop {
            let op = match self.current_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            let line = self.current_line();
            self.advance();
            let right = self.parse_term()?;
            left = self.binary(op, left, right, line);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<TypedExpr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.current_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Divide,
                Some(Token::Div) => BinaryOp::IntDiv,
                Some(Token::Mod) => BinaryOp::Mod,
                _ => break,
            };
            let line = self.current_line();
            self.advance();
            let right = self.parse_factor()?;
            left = self.binary(op, left, right, line);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<TypedExpr> {
        let line = self.current_line();
        let Some(token) = self.advance() else {
            return Err(self.unexpected());
        };

        let expr = match token.token {
            Token::Integer(n) => TypedExpr::new(Type::Integer, Instr::PushI(n)),
            Token::Real(x) => TypedExpr::new(Type::Real, Instr::PushF(x)),
            Token::String(s) => TypedExpr::new(Type::String, Instr::PushS(s)),
            Token::Char(c) => TypedExpr::new(Type::Char, Instr::PushS(c.to_string())),
            Token::True => TypedExpr::new(Type::Boolean, Instr::PushI(1)),
            Token::False => TypedExpr::new(Type::Boolean, Instr::PushI(0)),
            Token::Identifier(name) => {
                if self.eat(&Token::LBracket) {
                    let index = self.parse_index()?;
                    self.expect(Token::RBracket)?;
                    return Ok(match self.element_address(&name, index, line) {
                        Some((element, address)) => {
                            TypedExpr::new(element, address.then(Instr::Load(0)))
                        }
                        None => TypedExpr::empty(Type::Integer),
                    });
                }
                self.variable(&name, line)
            }
            Token::LParen => {
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                inner
            }
            Token::Not => {
                let operand = self.parse_factor()?;
                if !operand.ty.is_boolean() {
                    self.ctx.error(
                        line,
                        format!("Operator 'not' requires a boolean operand, not {}", operand.ty),
                    );
                    return Ok(TypedExpr::empty(Type::Boolean));
                }
                TypedExpr::new(Type::Boolean, operand.code.then(Instr::Not))
            }
            Token::Length => {
                self.expect(Token::LParen)?;
                let arg = self.parse_expression()?;
                self.expect(Token::RParen)?;
                if !arg.ty.is_text() {
                    self.ctx.error(
                        line,
                        format!(
                            "Function 'length' requires a string or char argument, not {}",
                            arg.ty
                        ),
                    );
                    return Ok(TypedExpr::empty(Type::Integer));
                }
                TypedExpr::new(Type::Integer, arg.code.then(Instr::Strlen))
            }
            _ => {
                self.pos -= 1;
                return Err(self.unexpected());
            }
        };
        Ok(expr)
    }

    fn variable(&mut self, name: &str, line: usize) -> TypedExpr {
        let Some(symbol) = self.ctx.resolve(name, "Variable", line) else {
            return TypedExpr::empty(Type::Integer);
        };
        if symbol.is_array() {
            self.ctx.error(
                line,
                format!("'{}' is an array and cannot be used as a simple value", name),
            );
            return TypedExpr::empty(Type::Integer);
        }
        TypedExpr::new(symbol.ty.base(), Instr::PushG(symbol.address))
    }

    fn unary_sign(&mut self, negate: bool, operand: TypedExpr, line: usize) -> TypedExpr {
        if !operand.ty.is_numeric() {
            let op = if negate { '-' } else { '+' };
            self.ctx.error(
                line,
                format!(
                    "Unary operator '{}' requires a numeric operand, not {}",
                    op, operand.ty
                ),
            );
            return TypedExpr::empty(Type::Integer);
        }
        if !negate {
            return operand;
        }
        let code = match operand.ty {
            Type::Real => Code::from(Instr::PushF(0.0))
                .then(operand.code)
                .then(Instr::FSub),
            _ => Code::from(Instr::PushI(0))
                .then(operand.code)
                .then(Instr::Sub),
        };
        TypedExpr::new(operand.ty, code)
    }

    /// Check and generate a binary operation, widening integer operands
    /// when the operation is carried out in real arithmetic
    fn binary(&mut self, op: BinaryOp, left: TypedExpr, right: TypedExpr, line: usize) -> TypedExpr {
        if op == BinaryOp::Add && left.ty.is_text() && right.ty.is_text() {
            return TypedExpr::new(
                Type::String,
                left.code.then(right.code).then(Instr::Concat),
            );
        }

        if let Err(message) = check_operation(op, left.ty, right.ty) {
            self.ctx.error(line, message);
            return TypedExpr::empty(op.fallback_type());
        }

        let numeric = left.ty.is_numeric() && right.ty.is_numeric();
        let real = numeric
            && match op {
                BinaryOp::Divide => true,
                BinaryOp::IntDiv | BinaryOp::Mod => false,
                _ => left.ty == Type::Real || right.ty == Type::Real,
            };

        let widen = |expr: TypedExpr| {
            if real && expr.ty == Type::Integer {
                expr.code.then(Instr::Itof)
            } else {
                expr.code
            }
        };

        let result = if op.is_comparison() || op.is_logical() {
            Type::Boolean
        } else if real {
            Type::Real
        } else {
            Type::Integer
        };

        let code = widen(left)
            .then(widen(right))
            .then(codegen::binary_instrs(op, real));
        TypedExpr::new(result, code)
    }
}

/// Compile a complete source text into a VM instruction listing
pub fn compile(source: &str) -> Result<Compilation> {
    Parser::new(source).parse_program()
}
