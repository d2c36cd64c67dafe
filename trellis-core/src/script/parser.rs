//! Recursive descent parser for the script language.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! module     := (NEWLINE | stmt)* EOF
//! stmt       := "def" NAME "(" params ")" ":" block
//!             | "if" expr ":" block ("elif" expr ":" block)* ("else" ":" block)?
//!             | "for" NAME "in" expr ":" block
//!             | simple NEWLINE
//! simple     := "return" expr? | "pass" | NAME "=" expr | expr
//! block      := NEWLINE INDENT stmt+ DEDENT | simple NEWLINE
//! expr       := and ("or" and)*
//! and        := not ("and" not)*
//! not        := "not" not | comparison
//! comparison := additive (cmp_op additive)?
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/" | "%") unary)*
//! unary      := "-" unary | postfix
//! postfix    := primary ("(" args ")" | "[" expr "]" | "." NAME)*
//! ```
//!
//! Functions may only be defined at the top level.

use super::ast::*;
use super::lexer::{tokenize, Span, SpannedToken, Token};
use crate::error::ParseError;
use crate::value::Value;

/// Parse a whole script.
pub fn parse(source: &str) -> Result<Module, ParseError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse_module()
}

/// Parse a single expression, as found inside an f-string interpolation.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.expression()?;
    parser.skip_newlines();
    parser.expect(&Token::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    in_function: bool,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            in_function: false,
        }
    }

    // ---- Token helpers ----

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .or_else(|| self.tokens.last())
            .map_or(&Token::Eof, |t| &t.token)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or_else(Span::default, |t| t.span)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&token.to_string()))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::new(
            format!("expected {}, found {}", expected, self.peek()),
            self.span(),
        )
    }

    fn skip_newlines(&mut self) {
        while self.eat(&Token::Newline) {}
    }

    // ---- Statements ----

    fn parse_module(&mut self) -> Result<Module, ParseError> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&Token::Eof) {
                break;
            }
            if self.check(&Token::Indent) {
                return Err(ParseError::new("unexpected indent", self.span()));
            }
            body.push(self.statement()?);
        }
        Ok(Module { body })
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Token::Def => self.function_def(),
            Token::If => self.if_statement(),
            Token::For => self.for_statement(),
            _ => {
                let stmt = self.simple_statement()?;
                self.end_of_statement()?;
                Ok(stmt)
            }
        }
    }

    fn end_of_statement(&mut self) -> Result<(), ParseError> {
        if self.eat(&Token::Newline) || self.check(&Token::Eof) || self.check(&Token::Dedent) {
            Ok(())
        } else {
            Err(self.unexpected("end of statement"))
        }
    }

    fn simple_statement(&mut self) -> Result<Stmt, ParseError> {
        let span = self.span();
        let kind = match self.peek().clone() {
            Token::Return => {
                if !self.in_function {
                    return Err(ParseError::new("'return' outside function", span));
                }
                self.advance();
                if matches!(self.peek(), Token::Newline | Token::Eof | Token::Dedent) {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.expression()?))
                }
            }
            Token::Pass => {
                self.advance();
                StmtKind::Pass
            }
            Token::Ident(target) if self.peek_at(1) == &Token::Eq => {
                self.advance();
                self.advance();
                StmtKind::Assign {
                    target,
                    value: self.expression()?,
                }
            }
            _ => StmtKind::Expr(self.expression()?),
        };
        Ok(Stmt { kind, span })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&Token::Colon)?;
        if !self.eat(&Token::Newline) {
            // Single-line body: `if x: pass`
            let stmt = self.simple_statement()?;
            self.end_of_statement()?;
            return Ok(vec![stmt]);
        }
        self.skip_newlines();
        self.expect(&Token::Indent)?;
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&Token::Dedent) || self.check(&Token::Eof) {
                break;
            }
            body.push(self.statement()?);
        }
        if body.is_empty() {
            return Err(ParseError::new("expected an indented block", self.span()));
        }
        Ok(body)
    }

    fn function_def(&mut self) -> Result<Stmt, ParseError> {
        let span = self.span();
        if self.in_function {
            return Err(ParseError::new(
                "nested function definitions are not supported",
                span,
            ));
        }
        self.expect(&Token::Def)?;
        let name = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            let param = self.expect_ident()?;
            if params.contains(&param) {
                return Err(ParseError::new(
                    format!("duplicate parameter '{}' in function definition", param),
                    self.span(),
                ));
            }
            params.push(param);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;

        self.in_function = true;
        let body = self.block();
        self.in_function = false;

        Ok(Stmt {
            kind: StmtKind::Def(std::sync::Arc::new(FunctionDef {
                name,
                params,
                body: body?,
                span,
            })),
            span,
        })
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        let span = self.span();
        self.expect(&Token::If)?;
        let mut branches = vec![(self.expression()?, self.block()?)];
        let mut orelse = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&Token::Elif) {
                branches.push((self.expression()?, self.block()?));
            } else if self.eat(&Token::Else) {
                orelse = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt {
            kind: StmtKind::If { branches, orelse },
            span,
        })
    }

    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        let span = self.span();
        self.expect(&Token::For)?;
        let target = self.expect_ident()?;
        self.expect(&Token::In)?;
        let iter = self.expression()?;
        let body = self.block()?;
        Ok(Stmt {
            kind: StmtKind::For { target, iter, body },
            span,
        })
    }

    // ---- Expressions ----

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and_expr()?;
        while self.check(&Token::Or) {
            let span = left.span;
            self.advance();
            let right = self.and_expr()?;
            left = Expr::new(
                ExprKind::Logical {
                    op: LogicalOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.not_expr()?;
        while self.check(&Token::And) {
            let span = left.span;
            self.advance();
            let right = self.not_expr()?;
            left = Expr::new(
                ExprKind::Logical {
                    op: LogicalOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Token::Not) {
            let span = self.span();
            self.advance();
            let operand = self.not_expr()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Token::EqEq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::NotEq,
            Token::Lt => BinaryOp::Lt,
            Token::Le => BinaryOp::Le,
            Token::Gt => BinaryOp::Gt,
            Token::Ge => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;
        let span = left.span;
        Ok(Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        ))
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            let span = left.span;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            let span = left.span;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Token::Minus) {
            let span = self.span();
            self.advance();
            let operand = self.unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Token::LParen => {
                    let func = match &expr.kind {
                        ExprKind::Name(name) => name.clone(),
                        _ => {
                            return Err(ParseError::new(
                                "only named functions can be called",
                                self.span(),
                            ))
                        }
                    };
                    self.advance();
                    let (args, keywords) = self.call_arguments()?;
                    expr = Expr::new(
                        ExprKind::Call {
                            func,
                            args,
                            keywords,
                        },
                        expr.span,
                    );
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(&Token::RBracket)?;
                    let span = expr.span;
                    expr = Expr::new(
                        ExprKind::Index {
                            value: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                Token::Dot => {
                    self.advance();
                    let attr = self.expect_ident()?;
                    let span = expr.span;
                    expr = Expr::new(
                        ExprKind::Attribute {
                            value: Box::new(expr),
                            attr,
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn call_arguments(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>), ParseError> {
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();
        while !self.check(&Token::RParen) {
            let keyword = match (self.peek(), self.peek_at(1)) {
                (Token::Ident(name), Token::Eq) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword {
                let span = self.span();
                self.advance();
                self.advance();
                if keywords.iter().any(|k| k.name == name) {
                    return Err(ParseError::new(
                        format!("keyword argument repeated: {}", name),
                        span,
                    ));
                }
                keywords.push(Keyword {
                    name,
                    value: self.expression()?,
                });
            } else {
                if !keywords.is_empty() {
                    return Err(ParseError::new(
                        "positional argument follows keyword argument",
                        self.span(),
                    ));
                }
                args.push(self.expression()?);
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok((args, keywords))
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        let kind = match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                ExprKind::Literal(Value::Number(n))
            }
            Token::Str(s) => {
                self.advance();
                // Adjacent literals concatenate
                let mut text = s;
                while let Token::Str(next) = self.peek().clone() {
                    self.advance();
                    text.push_str(&next);
                }
                ExprKind::Literal(Value::from(text))
            }
            Token::FStr(raw) => {
                self.advance();
                ExprKind::FString(parse_fstring(&raw, span)?)
            }
            Token::True => {
                self.advance();
                ExprKind::Literal(Value::Bool(true))
            }
            Token::False => {
                self.advance();
                ExprKind::Literal(Value::Bool(false))
            }
            Token::None_ => {
                self.advance();
                ExprKind::Literal(Value::Null)
            }
            Token::Ident(name) => {
                self.advance();
                ExprKind::Name(name)
            }
            Token::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&Token::RParen)?;
                return Ok(inner);
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(&Token::RBracket) {
                    items.push(self.expression()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBracket)?;
                ExprKind::List(items)
            }
            Token::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(&Token::RBrace) {
                    let key = self.expression()?;
                    self.expect(&Token::Colon)?;
                    let value = self.expression()?;
                    entries.push((key, value));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBrace)?;
                ExprKind::Dict(entries)
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr::new(kind, span))
    }
}

/// Split an f-string body into literal text and interpolated expressions.
///
/// `{{` and `}}` are literal braces. An interpolation may end in a `:.Nf`
/// precision spec.
fn parse_fstring(raw: &str, span: Span) -> Result<Vec<FPart>, ParseError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let chars: Vec<(usize, char)> = raw.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (_, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);
        match c {
            '{' if next == Some('{') => {
                literal.push('{');
                i += 2;
            }
            '}' if next == Some('}') => {
                literal.push('}');
                i += 2;
            }
            '}' => {
                return Err(ParseError::new("f-string: single '}' is not allowed", span));
            }
            '{' => {
                let start = i + 1;
                let mut depth = 1;
                let mut j = start;
                while j < chars.len() {
                    match chars[j].1 {
                        '{' | '[' | '(' => depth += 1,
                        '}' | ']' | ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(ParseError::new("f-string: expecting '}'", span));
                }

                if !literal.is_empty() {
                    parts.push(FPart::Literal(super::lexer::unescape(&literal)));
                    literal.clear();
                }

                let begin = chars[start].0;
                let end = chars[j].0;
                let fragment = &raw[begin..end];
                let (source, precision) = split_format_spec(fragment);
                let trimmed = source.trim_start();
                if trimmed.trim_end().is_empty() {
                    return Err(ParseError::new("f-string: empty expression not allowed", span));
                }
                let lead = (source.len() - trimmed.len()) as u32;

                // +2 skips the `f"` prefix
                let origin = Span::new(span.line, span.col + 2 + start as u32 + lead);
                let expr = parse_expression(trimmed).map_err(|err| {
                    ParseError::new(
                        format!("f-string: {}", err.message),
                        err.span.relative_to(origin),
                    )
                })?;
                parts.push(FPart::Expr {
                    expr: shift_spans(expr, origin),
                    precision,
                });
                i = j + 1;
            }
            _ => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if !literal.is_empty() {
        parts.push(FPart::Literal(super::lexer::unescape(&literal)));
    }
    Ok(parts)
}

fn split_format_spec(fragment: &str) -> (&str, Option<usize>) {
    if let Some(colon) = fragment.rfind(':') {
        let spec = &fragment[colon + 1..];
        if let Some(digits) = spec.strip_prefix('.').and_then(|s| s.strip_suffix('f')) {
            if let Ok(precision) = digits.parse::<usize>() {
                return (&fragment[..colon], Some(precision));
            }
        }
    }
    (fragment, None)
}

/// Move the spans of an interpolated expression into the coordinates of the
/// enclosing file.
fn shift_spans(expr: Expr, origin: Span) -> Expr {
    let span = expr.span.relative_to(origin);
    let shift = |e: Expr| shift_spans(e, origin);
    let boxed = |e: Box<Expr>| Box::new(shift_spans(*e, origin));
    let kind = match expr.kind {
        ExprKind::FString(parts) => ExprKind::FString(
            parts
                .into_iter()
                .map(|part| match part {
                    FPart::Expr { expr, precision } => FPart::Expr {
                        expr: shift(expr),
                        precision,
                    },
                    literal => literal,
                })
                .collect(),
        ),
        ExprKind::List(items) => ExprKind::List(items.into_iter().map(shift).collect()),
        ExprKind::Dict(entries) => ExprKind::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (shift(k), shift(v)))
                .collect(),
        ),
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op,
            operand: boxed(operand),
        },
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op,
            left: boxed(left),
            right: boxed(right),
        },
        ExprKind::Logical { op, left, right } => ExprKind::Logical {
            op,
            left: boxed(left),
            right: boxed(right),
        },
        ExprKind::Call {
            func,
            args,
            keywords,
        } => ExprKind::Call {
            func,
            args: args.into_iter().map(shift).collect(),
            keywords: keywords
                .into_iter()
                .map(|k| Keyword {
                    name: k.name,
                    value: shift(k.value),
                })
                .collect(),
        },
        ExprKind::Index { value, index } => ExprKind::Index {
            value: boxed(value),
            index: boxed(index),
        },
        ExprKind::Attribute { value, attr } => ExprKind::Attribute {
            value: boxed(value),
            attr,
        },
        leaf @ (ExprKind::Literal(_) | ExprKind::Name(_)) => leaf,
    };
    Expr::new(kind, span)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_expr(source: &str) -> Expr {
        let module = parse(source).unwrap();
        match &module.body[0].kind {
            StmtKind::Expr(e) | StmtKind::Assign { value: e, .. } => e.clone(),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn parses_assignment_and_call() {
        let module = parse("n = slider(\"N\", min=0, max=10)\ntext(n)\n").unwrap();
        assert_eq!(module.body.len(), 2);

        match &module.body[0].kind {
            StmtKind::Assign { target, value } => {
                assert_eq!(target, "n");
                match &value.kind {
                    ExprKind::Call {
                        func,
                        args,
                        keywords,
                    } => {
                        assert_eq!(func, "slider");
                        assert_eq!(args.len(), 1);
                        assert_eq!(keywords.len(), 2);
                        assert_eq!(keywords[1].name, "max");
                    }
                    other => panic!("expected call, got {:?}", other),
                }
            }
            other => panic!("expected assignment, got {:?}", other),
        }
        assert_eq!(module.body[1].span, Span::new(2, 1));
    }

    #[test]
    fn precedence() {
        let expr = first_expr("1 + 2 * 3");
        match expr.kind {
            ExprKind::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn function_definition_with_control_flow() {
        let source = "\
def label(n):
    if n > 5:
        return \"big\"
    elif n > 2:
        return \"medium\"
    else:
        return \"small\"
";
        let module = parse(source).unwrap();
        match &module.body[0].kind {
            StmtKind::Def(def) => {
                assert_eq!(def.name, "label");
                assert_eq!(def.params, vec!["n".to_string()]);
                match &def.body[0].kind {
                    StmtKind::If { branches, orelse } => {
                        assert_eq!(branches.len(), 2);
                        assert_eq!(orelse.len(), 1);
                    }
                    other => panic!("expected if, got {:?}", other),
                }
            }
            other => panic!("expected def, got {:?}", other),
        }
    }

    #[test]
    fn nested_def_is_rejected() {
        let err = parse("def outer():\n    def inner():\n        pass\n").unwrap_err();
        assert!(err.message.contains("nested"));
        assert_eq!(err.span, Span::new(2, 5));
    }

    #[test]
    fn return_outside_function_is_rejected() {
        let err = parse("return 1\n").unwrap_err();
        assert!(err.message.contains("outside function"));
    }

    #[test]
    fn fstring_interpolations_are_parsed() {
        let expr = first_expr("text(f\"Value: {n + 1} ({ratio:.2f})\")");
        let ExprKind::Call { args, .. } = expr.kind else {
            panic!("expected call");
        };
        let ExprKind::FString(parts) = &args[0].kind else {
            panic!("expected f-string");
        };
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], FPart::Literal("Value: ".into()));
        match &parts[1] {
            FPart::Expr { expr, precision } => {
                assert!(matches!(expr.kind, ExprKind::Binary { .. }));
                assert_eq!(*precision, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &parts[3] {
            FPart::Expr { expr, precision } => {
                assert_eq!(expr.kind, ExprKind::Name("ratio".into()));
                assert_eq!(*precision, Some(2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn fstring_spans_point_into_the_file() {
        // text(f"{n}") -- `n` sits at column 9
        let expr = first_expr("text(f\"{n}\")");
        let ExprKind::Call { args, .. } = expr.kind else {
            panic!("expected call");
        };
        let ExprKind::FString(parts) = &args[0].kind else {
            panic!("expected f-string");
        };
        let FPart::Expr { expr, .. } = &parts[0] else {
            panic!("expected interpolation");
        };
        assert_eq!(expr.span, Span::new(1, 9));
    }

    #[test]
    fn escaped_braces_are_literal() {
        let expr = first_expr("f\"{{x}}\"");
        assert_eq!(
            expr.kind,
            ExprKind::FString(vec![FPart::Literal("{x}".into())])
        );
    }

    #[test]
    fn multiline_call() {
        let module = parse("table(\n    data,\n    title=\"T\",\n)\n").unwrap();
        assert_eq!(module.body.len(), 1);
    }

    #[test]
    fn positional_after_keyword_is_rejected() {
        assert!(parse("f(a=1, 2)").is_err());
    }

    #[test]
    fn display_round_trips_through_parser() {
        let source = "x = f(a, b=[1, 2], c={\"k\": -y})\n";
        let module = parse(source).unwrap();
        let printed = module.to_string();
        assert_eq!(parse(&printed).unwrap().body.len(), 1);
    }
}
