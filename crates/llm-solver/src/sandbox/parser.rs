// Snippet parser - converts token streams into statement lists.
// Recursive descent, one function per precedence level (lowest first):
// sequence, assignment/arrow, conditional, ??, ||, &&, |, ^, &, equality,
// relational, shift, additive, multiplicative, **, unary, postfix,
// call/member, primary.

use super::ast::{
    BinaryOp, DeclKind, Expr, FunctionBody, FunctionDef, LogicalOp, Param, Stmt, SwitchCase,
    TemplatePart, UnaryOp,
};
use super::error::ExecutionError;
use super::lexer::{Spanned, TemplateChunk, Token, tokenize};
use std::rc::Rc;

const MAX_NESTING: usize = 256;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "default", "do", "else", "finally",
    "for", "function", "if", "let", "new", "return", "switch", "throw", "try", "typeof", "var",
    "while",
];

/// Parses a snippet into a function body.
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, ExecutionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let mut body = Vec::new();
    while !parser.at_end() {
        body.push(parser.statement()?);
    }
    Ok(body)
}

fn parse_embedded_expr(source: &str) -> Result<Expr, ExecutionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.expression()?;
    if !parser.at_end() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => n.to_string(),
        Token::Str(_) => "string".to_string(),
        Token::Template(_) => "template string".to_string(),
        Token::Ident(name) => name.clone(),
        Token::LParen => "(".to_string(),
        Token::RParen => ")".to_string(),
        Token::LBrace => "{".to_string(),
        Token::RBrace => "}".to_string(),
        Token::LBracket => "[".to_string(),
        Token::RBracket => "]".to_string(),
        Token::Comma => ",".to_string(),
        Token::Semicolon => ";".to_string(),
        Token::Colon => ":".to_string(),
        Token::Dot => ".".to_string(),
        Token::Ellipsis => "...".to_string(),
        Token::Question => "?".to_string(),
        Token::QuestionQuestion => "??".to_string(),
        Token::QuestionDot => "?.".to_string(),
        Token::Arrow => "=>".to_string(),
        Token::Plus => "+".to_string(),
        Token::Minus => "-".to_string(),
        Token::Star => "*".to_string(),
        Token::StarStar => "**".to_string(),
        Token::Slash => "/".to_string(),
        Token::Percent => "%".to_string(),
        Token::PlusPlus => "++".to_string(),
        Token::MinusMinus => "--".to_string(),
        Token::Bang => "!".to_string(),
        Token::AndAnd => "&&".to_string(),
        Token::OrOr => "||".to_string(),
        Token::EqEq => "==".to_string(),
        Token::EqEqEq => "===".to_string(),
        Token::NotEq => "!=".to_string(),
        Token::NotEqEq => "!==".to_string(),
        Token::Lt => "<".to_string(),
        Token::LtEq => "<=".to_string(),
        Token::Gt => ">".to_string(),
        Token::GtEq => ">=".to_string(),
        Token::Assign => "=".to_string(),
        Token::PlusAssign => "+=".to_string(),
        Token::MinusAssign => "-=".to_string(),
        Token::StarAssign => "*=".to_string(),
        Token::StarStarAssign => "**=".to_string(),
        Token::SlashAssign => "/=".to_string(),
        Token::PercentAssign => "%=".to_string(),
        Token::Pipe => "|".to_string(),
        Token::Amp => "&".to_string(),
        Token::Caret => "^".to_string(),
        Token::Tilde => "~".to_string(),
        Token::LtLt => "<<".to_string(),
        Token::GtGt => ">>".to_string(),
        Token::GtGtGt => ">>>".to_string(),
        Token::PipeAssign => "|=".to_string(),
        Token::AmpAssign => "&=".to_string(),
        Token::CaretAssign => "^=".to_string(),
        Token::LtLtAssign => "<<=".to_string(),
        Token::GtGtAssign => ">>=".to_string(),
        Token::GtGtGtAssign => ">>>=".to_string(),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn newline_before(&self) -> bool {
        self.tokens.get(self.pos).is_some_and(|s| s.newline_before)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn check_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(n)) if n == name)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if self.check_ident(name) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> ExecutionError {
        match self.tokens.get(self.pos) {
            Some(spanned) => ExecutionError::Syntax(format!(
                "Unexpected token '{}' (line {})",
                describe(&spanned.token),
                spanned.line
            )),
            None => ExecutionError::Syntax("Unexpected end of input".to_string()),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ExecutionError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn binding_name(&mut self) -> Result<String, ExecutionError> {
        match self.peek() {
            Some(Token::Ident(name)) if !RESERVED.contains(&name.as_str()) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn enter(&mut self) -> Result<(), ExecutionError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ExecutionError::Syntax(
                "Maximum nesting depth exceeded".to_string(),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // Automatic semicolon insertion, approximated: a statement may end at
    // `;`, before `}`, at end of input, or at a line break.
    fn end_statement(&mut self) -> Result<(), ExecutionError> {
        if self.eat(&Token::Semicolon) || self.at_end() || self.check(&Token::RBrace) {
            return Ok(());
        }
        if self.newline_before() {
            return Ok(());
        }
        Err(self.unexpected())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statement(&mut self) -> Result<Stmt, ExecutionError> {
        self.enter()?;
        let stmt = self.statement_inner();
        self.leave();
        stmt
    }

    fn statement_inner(&mut self) -> Result<Stmt, ExecutionError> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected());
        };

        match token {
            Token::Semicolon => {
                self.pos += 1;
                Ok(Stmt::Empty)
            }
            Token::LBrace => Ok(Stmt::Block(self.block()?)),
            Token::Ident(word) => match word.as_str() {
                "let" | "const" | "var" => {
                    let stmt = self.declaration()?;
                    self.end_statement()?;
                    Ok(stmt)
                }
                "function" if matches!(self.peek_at(1), Some(Token::Ident(_))) => {
                    self.pos += 1;
                    let def = self.function_rest(true)?;
                    Ok(Stmt::Function(def))
                }
                "if" => self.if_statement(),
                "for" => self.for_statement(),
                "while" => {
                    self.pos += 1;
                    self.expect(&Token::LParen)?;
                    let test = self.expression()?;
                    self.expect(&Token::RParen)?;
                    let body = Box::new(self.statement()?);
                    Ok(Stmt::While { test, body })
                }
                "do" => {
                    self.pos += 1;
                    let body = Box::new(self.statement()?);
                    if !self.eat_ident("while") {
                        return Err(self.unexpected());
                    }
                    self.expect(&Token::LParen)?;
                    let test = self.expression()?;
                    self.expect(&Token::RParen)?;
                    self.eat(&Token::Semicolon);
                    Ok(Stmt::DoWhile { body, test })
                }
                "return" => {
                    self.pos += 1;
                    let value = if self.at_end()
                        || self.check(&Token::Semicolon)
                        || self.check(&Token::RBrace)
                        || self.newline_before()
                    {
                        None
                    } else {
                        Some(self.expression()?)
                    };
                    self.end_statement()?;
                    Ok(Stmt::Return(value))
                }
                "throw" => {
                    self.pos += 1;
                    let value = self.expression()?;
                    self.end_statement()?;
                    Ok(Stmt::Throw(value))
                }
                "break" => {
                    self.pos += 1;
                    self.end_statement()?;
                    Ok(Stmt::Break)
                }
                "continue" => {
                    self.pos += 1;
                    self.end_statement()?;
                    Ok(Stmt::Continue)
                }
                "try" => self.try_statement(),
                "switch" => self.switch_statement(),
                _ => self.expression_statement(),
            },
            _ => self.expression_statement(),
        }
    }

    fn expression_statement(&mut self) -> Result<Stmt, ExecutionError> {
        let expr = self.expression()?;
        self.end_statement()?;
        Ok(Stmt::Expr(expr))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ExecutionError> {
        self.expect(&Token::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.at_end() {
                return Err(self.unexpected());
            }
            body.push(self.statement()?);
        }
        self.pos += 1;
        Ok(body)
    }

    fn decl_kind(&mut self) -> Result<DeclKind, ExecutionError> {
        let kind = match self.peek() {
            Some(Token::Ident(w)) if w == "let" => DeclKind::Let,
            Some(Token::Ident(w)) if w == "const" => DeclKind::Const,
            Some(Token::Ident(w)) if w == "var" => DeclKind::Var,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        Ok(kind)
    }

    fn declaration(&mut self) -> Result<Stmt, ExecutionError> {
        let kind = self.decl_kind()?;
        let first = self.binding_name()?;
        self.declarators_from(kind, first)
    }

    fn declarators_from(&mut self, kind: DeclKind, first: String) -> Result<Stmt, ExecutionError> {
        let mut declarators = Vec::new();
        let mut name = first;
        loop {
            let init = if self.eat(&Token::Assign) {
                Some(self.assignment()?)
            } else {
                None
            };
            if kind == DeclKind::Const && init.is_none() {
                return Err(ExecutionError::Syntax(
                    "Missing initializer in const declaration".to_string(),
                ));
            }
            declarators.push((name, init));
            if !self.eat(&Token::Comma) {
                break;
            }
            name = self.binding_name()?;
        }
        Ok(Stmt::Declare { kind, declarators })
    }

    fn if_statement(&mut self) -> Result<Stmt, ExecutionError> {
        self.pos += 1;
        self.expect(&Token::LParen)?;
        let test = self.expression()?;
        self.expect(&Token::RParen)?;
        let consequent = Box::new(self.statement()?);
        let alternate = if self.eat_ident("else") {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn for_statement(&mut self) -> Result<Stmt, ExecutionError> {
        self.pos += 1;
        self.expect(&Token::LParen)?;

        let init = if self.eat(&Token::Semicolon) {
            None
        } else if self.check_ident("let") || self.check_ident("const") || self.check_ident("var")
        {
            let kind = self.decl_kind()?;
            let name = self.binding_name()?;
            if self.eat_ident("of") {
                let iterable = self.assignment()?;
                self.expect(&Token::RParen)?;
                let body = Box::new(self.statement()?);
                return Ok(Stmt::ForOf {
                    kind,
                    name,
                    iterable,
                    body,
                });
            }
            let decl = self.declarators_from(kind, name)?;
            self.expect(&Token::Semicolon)?;
            Some(Box::new(decl))
        } else {
            let expr = self.expression()?;
            self.expect(&Token::Semicolon)?;
            Some(Box::new(Stmt::Expr(expr)))
        };

        let test = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&Token::Semicolon)?;

        let update = if self.check(&Token::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&Token::RParen)?;

        let body = Box::new(self.statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn try_statement(&mut self) -> Result<Stmt, ExecutionError> {
        self.pos += 1;
        let block = self.block()?;

        let mut param = None;
        let mut handler = None;
        if self.eat_ident("catch") {
            if self.eat(&Token::LParen) {
                param = Some(self.binding_name()?);
                self.expect(&Token::RParen)?;
            }
            handler = Some(self.block()?);
        }

        let finalizer = if self.eat_ident("finally") {
            Some(self.block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(ExecutionError::Syntax(
                "Missing catch or finally after try".to_string(),
            ));
        }

        Ok(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    fn switch_statement(&mut self) -> Result<Stmt, ExecutionError> {
        self.pos += 1;
        self.expect(&Token::LParen)?;
        let discriminant = self.expression()?;
        self.expect(&Token::RParen)?;
        self.expect(&Token::LBrace)?;

        let mut cases = Vec::new();
        while !self.eat(&Token::RBrace) {
            let test = if self.eat_ident("case") {
                Some(self.expression()?)
            } else if self.eat_ident("default") {
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect(&Token::Colon)?;

            let mut body = Vec::new();
            while !self.check_ident("case")
                && !self.check_ident("default")
                && !self.check(&Token::RBrace)
            {
                if self.at_end() {
                    return Err(self.unexpected());
                }
                body.push(self.statement()?);
            }
            cases.push(SwitchCase { test, body });
        }

        Ok(Stmt::Switch {
            discriminant,
            cases,
        })
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    /// Parses `name? (params) { body }` after the `function` keyword.
    fn function_rest(&mut self, require_name: bool) -> Result<Rc<FunctionDef>, ExecutionError> {
        let name = if require_name || matches!(self.peek(), Some(Token::Ident(_))) {
            Some(self.binding_name()?)
        } else {
            None
        };
        let params = self.params()?;
        let body = FunctionBody::Block(self.block()?);
        Ok(Rc::new(FunctionDef { name, params, body }))
    }

    fn params(&mut self) -> Result<Vec<Param>, ExecutionError> {
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        while !self.eat(&Token::RParen) {
            let rest = self.eat(&Token::Ellipsis);
            let name = self.binding_name()?;
            let default = if !rest && self.eat(&Token::Assign) {
                Some(self.assignment()?)
            } else {
                None
            };
            params.push(Param {
                name,
                default,
                rest,
            });
            if rest {
                self.expect(&Token::RParen)?;
                break;
            }
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RParen)?;
                break;
            }
        }
        Ok(params)
    }

    fn arrow_ahead(&self) -> bool {
        match self.peek() {
            Some(Token::Ident(_)) => self.peek_at(1) == Some(&Token::Arrow),
            Some(Token::LParen) => {
                let mut depth = 0usize;
                let mut i = self.pos;
                while let Some(spanned) = self.tokens.get(i) {
                    match spanned.token {
                        Token::LParen => depth += 1,
                        Token::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self.tokens.get(i + 1).map(|s| &s.token)
                                    == Some(&Token::Arrow);
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                false
            }
            _ => false,
        }
    }

    fn arrow_function(&mut self) -> Result<Expr, ExecutionError> {
        let params = if self.check(&Token::LParen) {
            self.params()?
        } else {
            vec![Param {
                name: self.binding_name()?,
                default: None,
                rest: false,
            }]
        };
        self.expect(&Token::Arrow)?;
        let body = if self.check(&Token::LBrace) {
            FunctionBody::Block(self.block()?)
        } else {
            FunctionBody::Expr(self.assignment()?)
        };
        Ok(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
        })))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, ExecutionError> {
        let first = self.assignment()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&Token::Comma) {
            exprs.push(self.assignment()?);
        }
        Ok(Expr::Sequence(exprs))
    }

    fn assignment(&mut self) -> Result<Expr, ExecutionError> {
        self.enter()?;
        let expr = self.assignment_inner();
        self.leave();
        expr
    }

    fn assignment_inner(&mut self) -> Result<Expr, ExecutionError> {
        if self.arrow_ahead() {
            return self.arrow_function();
        }

        let target = self.conditional()?;

        let op = match self.peek() {
            Some(Token::Assign) => None,
            Some(Token::PlusAssign) => Some(BinaryOp::Add),
            Some(Token::MinusAssign) => Some(BinaryOp::Sub),
            Some(Token::StarAssign) => Some(BinaryOp::Mul),
            Some(Token::StarStarAssign) => Some(BinaryOp::Pow),
            Some(Token::SlashAssign) => Some(BinaryOp::Div),
            Some(Token::PercentAssign) => Some(BinaryOp::Rem),
            Some(Token::PipeAssign) => Some(BinaryOp::BitOr),
            Some(Token::AmpAssign) => Some(BinaryOp::BitAnd),
            Some(Token::CaretAssign) => Some(BinaryOp::BitXor),
            Some(Token::LtLtAssign) => Some(BinaryOp::Shl),
            Some(Token::GtGtAssign) => Some(BinaryOp::Shr),
            Some(Token::GtGtGtAssign) => Some(BinaryOp::UShr),
            _ => return Ok(target),
        };

        if !matches!(target, Expr::Ident(_) | Expr::Member { optional: false, .. }) {
            return Err(ExecutionError::Syntax(
                "Invalid left-hand side in assignment".to_string(),
            ));
        }
        self.pos += 1;
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> Result<Expr, ExecutionError> {
        let test = self.nullish()?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect(&Token::Colon)?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn nullish(&mut self) -> Result<Expr, ExecutionError> {
        let mut left = self.or()?;
        while self.eat(&Token::QuestionQuestion) {
            let right = self.or()?;
            left = Expr::Logical {
                op: LogicalOp::Nullish,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn or(&mut self) -> Result<Expr, ExecutionError> {
        let mut left = self.and()?;
        while self.eat(&Token::OrOr) {
            let right = self.and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExecutionError> {
        let mut left = self.bit_or()?;
        while self.eat(&Token::AndAnd) {
            let right = self.bit_or()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, ExecutionError>,
        table: &[(Token, BinaryOp)],
    ) -> Result<Expr, ExecutionError> {
        let mut left = next(self)?;
        loop {
            let Some(op) = self
                .peek()
                .and_then(|t| table.iter().find(|(tok, _)| tok == t).map(|(_, op)| *op))
            else {
                return Ok(left);
            };
            self.pos += 1;
            let right = next(self)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn bit_or(&mut self) -> Result<Expr, ExecutionError> {
        self.binary_level(Self::bit_xor, &[(Token::Pipe, BinaryOp::BitOr)])
    }

    fn bit_xor(&mut self) -> Result<Expr, ExecutionError> {
        self.binary_level(Self::bit_and, &[(Token::Caret, BinaryOp::BitXor)])
    }

    fn bit_and(&mut self) -> Result<Expr, ExecutionError> {
        self.binary_level(Self::equality, &[(Token::Amp, BinaryOp::BitAnd)])
    }

    fn equality(&mut self) -> Result<Expr, ExecutionError> {
        self.binary_level(
            Self::relational,
            &[
                (Token::EqEqEq, BinaryOp::StrictEq),
                (Token::NotEqEq, BinaryOp::StrictNotEq),
                (Token::EqEq, BinaryOp::Eq),
                (Token::NotEq, BinaryOp::NotEq),
            ],
        )
    }

    fn relational(&mut self) -> Result<Expr, ExecutionError> {
        self.binary_level(
            Self::shift,
            &[
                (Token::Lt, BinaryOp::Lt),
                (Token::LtEq, BinaryOp::LtEq),
                (Token::Gt, BinaryOp::Gt),
                (Token::GtEq, BinaryOp::GtEq),
            ],
        )
    }

    fn shift(&mut self) -> Result<Expr, ExecutionError> {
        self.binary_level(
            Self::additive,
            &[
                (Token::LtLt, BinaryOp::Shl),
                (Token::GtGt, BinaryOp::Shr),
                (Token::GtGtGt, BinaryOp::UShr),
            ],
        )
    }

    fn additive(&mut self) -> Result<Expr, ExecutionError> {
        self.binary_level(
            Self::multiplicative,
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, ExecutionError> {
        self.binary_level(
            Self::exponent,
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Rem),
            ],
        )
    }

    // Right-associative.
    fn exponent(&mut self) -> Result<Expr, ExecutionError> {
        let base = self.unary()?;
        if !self.eat(&Token::StarStar) {
            return Ok(base);
        }
        self.enter()?;
        let power = self.exponent();
        self.leave();
        Ok(Expr::Binary {
            op: BinaryOp::Pow,
            left: Box::new(base),
            right: Box::new(power?),
        })
    }

    fn unary(&mut self) -> Result<Expr, ExecutionError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Tilde) => UnaryOp::BitNot,
            Some(Token::Ident(w)) if w == "typeof" => UnaryOp::TypeOf,
            Some(Token::PlusPlus) | Some(Token::MinusMinus) => {
                let increment = self.check(&Token::PlusPlus);
                self.pos += 1;
                self.enter()?;
                let target = self.unary();
                self.leave();
                let target = target?;
                if !matches!(target, Expr::Ident(_) | Expr::Member { .. }) {
                    return Err(ExecutionError::Syntax(
                        "Invalid left-hand side expression in prefix operation".to_string(),
                    ));
                }
                return Ok(Expr::Update {
                    increment,
                    prefix: true,
                    target: Box::new(target),
                });
            }
            _ => return self.postfix(),
        };
        self.pos += 1;
        self.enter()?;
        let operand = self.unary();
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExecutionError> {
        let expr = self.call_member()?;
        let increment = match self.peek() {
            Some(Token::PlusPlus) if !self.newline_before() => true,
            Some(Token::MinusMinus) if !self.newline_before() => false,
            _ => return Ok(expr),
        };
        if !matches!(expr, Expr::Ident(_) | Expr::Member { .. }) {
            return Err(ExecutionError::Syntax(
                "Invalid left-hand side expression in postfix operation".to_string(),
            ));
        }
        self.pos += 1;
        Ok(Expr::Update {
            increment,
            prefix: false,
            target: Box::new(expr),
        })
    }

    fn property_name(&mut self) -> Result<Expr, ExecutionError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let key = Expr::Str(Rc::from(name.as_str()));
                self.pos += 1;
                Ok(key)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn call_member(&mut self) -> Result<Expr, ExecutionError> {
        let mut expr = if self.check_ident("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };

        loop {
            if self.eat(&Token::Dot) {
                let property = self.property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(property),
                    optional: false,
                };
            } else if self.eat(&Token::QuestionDot) {
                let property = if self.eat(&Token::LBracket) {
                    let computed = self.expression()?;
                    self.expect(&Token::RBracket)?;
                    computed
                } else {
                    self.property_name()?
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(property),
                    optional: true,
                };
            } else if self.check(&Token::LBracket) {
                self.pos += 1;
                let property = self.expression()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(property),
                    optional: false,
                };
            } else if self.check(&Token::LParen) {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn new_expression(&mut self) -> Result<Expr, ExecutionError> {
        self.pos += 1;
        let mut callee = self.primary()?;
        while self.eat(&Token::Dot) {
            let property = self.property_name()?;
            callee = Expr::Member {
                object: Box::new(callee),
                property: Box::new(property),
                optional: false,
            };
        }
        let args = if self.check(&Token::LParen) {
            self.arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ExecutionError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        while !self.eat(&Token::RParen) {
            if self.eat(&Token::Ellipsis) {
                args.push(Expr::Spread(Box::new(self.assignment()?)));
            } else {
                args.push(self.assignment()?);
            }
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RParen)?;
                break;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ExecutionError> {
        let Some(token) = self.advance() else {
            return Err(self.unexpected());
        };

        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(Rc::from(s.as_str()))),
            Token::Template(chunks) => {
                let mut parts = Vec::with_capacity(chunks.len());
                for chunk in chunks {
                    parts.push(match chunk {
                        TemplateChunk::Text(text) => TemplatePart::Text(text),
                        TemplateChunk::Expr(source) => {
                            TemplatePart::Expr(parse_embedded_expr(&source)?)
                        }
                    });
                }
                Ok(Expr::Template(parts))
            }
            Token::LParen => {
                let expr = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => self.array_literal(),
            Token::LBrace => self.object_literal(),
            Token::Ident(word) => match word.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "undefined" => Ok(Expr::Undefined),
                "function" => Ok(Expr::Function(self.function_rest(false)?)),
                w if RESERVED.contains(&w) => {
                    self.pos -= 1;
                    Err(self.unexpected())
                }
                _ => Ok(Expr::Ident(word)),
            },
            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }

    fn array_literal(&mut self) -> Result<Expr, ExecutionError> {
        let mut items = Vec::new();
        while !self.eat(&Token::RBracket) {
            if self.eat(&Token::Ellipsis) {
                items.push(Expr::Spread(Box::new(self.assignment()?)));
            } else {
                items.push(self.assignment()?);
            }
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBracket)?;
                break;
            }
        }
        Ok(Expr::Array(items))
    }

    fn object_literal(&mut self) -> Result<Expr, ExecutionError> {
        let mut props = Vec::new();
        while !self.eat(&Token::RBrace) {
            let key = match self.peek() {
                Some(Token::Ident(name)) | Some(Token::Str(name)) => name.clone(),
                Some(Token::Number(n)) => super::value::number_to_string(*n),
                _ => return Err(self.unexpected()),
            };
            self.pos += 1;

            let value = if self.eat(&Token::Colon) {
                self.assignment()?
            } else if self.check(&Token::LParen) {
                let params = self.params()?;
                let body = FunctionBody::Block(self.block()?);
                Expr::Function(Rc::new(FunctionDef {
                    name: Some(key.clone()),
                    params,
                    body,
                }))
            } else {
                Expr::Ident(key.clone())
            };
            props.push((key, value));

            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace)?;
                break;
            }
        }
        Ok(Expr::Object(props))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Vec<Stmt> {
        parse_program(src).unwrap_or_else(|e| panic!("failed to parse {src:?}: {e}"))
    }

    #[test]
    fn test_return_expression() {
        let body = parse_ok("return 2+2;");
        assert!(matches!(
            &body[..],
            [Stmt::Return(Some(Expr::Binary { op: BinaryOp::Add, .. }))]
        ));
    }

    #[test]
    fn test_precedence() {
        let body = parse_ok("x = 1 + 2 * 3 ** 2");
        let Stmt::Expr(Expr::Assign { value, .. }) = &body[0] else {
            panic!("expected assignment");
        };
        let Expr::Binary { op, right, .. } = value.as_ref() else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(right.as_ref(), Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_semicolon_insertion_on_newline() {
        let body = parse_ok("let a = 1\nlet b = 2\nreturn a + b");
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn test_return_followed_by_newline_returns_nothing() {
        let body = parse_ok("return\n42");
        assert!(matches!(body[0], Stmt::Return(None)));
    }

    #[test]
    fn test_missing_separator_is_error() {
        let err = parse_program("let a = 1 let b = 2").unwrap_err();
        assert!(err.to_string().starts_with("Unexpected token 'let'"));
    }

    #[test]
    fn test_for_variants() {
        let body = parse_ok(
            "for (let i = 0; i < 3; i++) {}\nfor (const x of [1,2]) {}\nfor (;;) { break; }",
        );
        assert!(matches!(body[0], Stmt::For { .. }));
        assert!(matches!(body[1], Stmt::ForOf { .. }));
        assert!(matches!(body[2], Stmt::For { init: None, test: None, update: None, .. }));
    }

    #[test]
    fn test_arrow_functions() {
        let body = parse_ok("const f = (a, b = 2) => a + b; const g = x => { return x; };");
        assert_eq!(body.len(), 2);
        let Stmt::Declare { declarators, .. } = &body[0] else {
            panic!("expected declaration");
        };
        let Some(Expr::Function(def)) = &declarators[0].1 else {
            panic!("expected function");
        };
        assert_eq!(def.params.len(), 2);
        assert!(def.params[1].default.is_some());
    }

    #[test]
    fn test_object_and_array_literals() {
        let body = parse_ok("return { a: 1, 'b': [1, ...xs], c, f(x) { return x; } };");
        let Stmt::Return(Some(Expr::Object(props))) = &body[0] else {
            panic!("expected object literal");
        };
        let keys: Vec<_> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "f"]);
    }

    #[test]
    fn test_const_requires_initializer() {
        assert!(parse_program("const x;").is_err());
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(parse_program("1 = 2;").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let src = format!("return {}1{};", "(".repeat(400), ")".repeat(400));
        let err = std::thread::Builder::new()
            .stack_size(32 * 1024 * 1024)
            .spawn(move || parse_program(&src).err())
            .unwrap()
            .join()
            .unwrap()
            .expect("nesting should be rejected");
        assert_eq!(err.to_string(), "Maximum nesting depth exceeded");
    }

    #[test]
    fn test_deep_prefix_update_is_rejected() {
        let src = format!("let a = 1; return {}a;", "++".repeat(20_000));
        let err = std::thread::Builder::new()
            .stack_size(32 * 1024 * 1024)
            .spawn(move || parse_program(&src).err())
            .unwrap()
            .join()
            .unwrap()
            .expect("nesting should be rejected");
        assert_eq!(err.to_string(), "Maximum nesting depth exceeded");
    }

    #[test]
    fn test_bitwise_precedence() {
        let body = parse_ok("return a | b & c << 1;");
        let Stmt::Return(Some(Expr::Binary { op, right, .. })) = &body[0] else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::BitOr);
        let Expr::Binary { op, right, .. } = right.as_ref() else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::BitAnd);
        assert!(matches!(right.as_ref(), Expr::Binary { op: BinaryOp::Shl, .. }));
    }

    #[test]
    fn test_try_switch_parse() {
        let body = parse_ok(
            "try { throw new Error('x'); } catch (e) { } finally { }\n\
             switch (n) { case 1: r = 1; break; default: r = 0; }",
        );
        assert!(matches!(body[0], Stmt::Try { .. }));
        assert!(matches!(body[1], Stmt::Switch { .. }));
    }

    #[test]
    fn test_template_literal() {
        let body = parse_ok("return `p=${p.toFixed(2)}`;");
        assert!(matches!(&body[0], Stmt::Return(Some(Expr::Template(parts))) if parts.len() == 2));
    }
}
