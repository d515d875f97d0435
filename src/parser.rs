use crate::ast::{
    BinaryOperator, Expression, Literal, Parameter, Program, Statement, TypeAnnotation,
    UnaryOperator,
};
use crate::error::{ParseError, ParseResult};
use crate::lexer::{Token, TokenType};
use crate::types::PrimitiveType;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    pub fn parse(&mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        Ok(Program { statements })
    }

    // Statements

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match &self.peek().token_type {
            TokenType::Type => self.parse_type_decl(),
            TokenType::Interface => self.parse_interface_decl(),
            TokenType::Let => self.parse_var_decl(false),
            TokenType::Const => self.parse_var_decl(true),
            TokenType::Fn => self.parse_fn_decl(false),
            TokenType::Async if self.peek_at(1).token_type == TokenType::Fn => {
                self.advance(); // consume 'async'
                self.parse_fn_decl(true)
            }
            TokenType::Return => self.parse_return(),
            TokenType::If => self.parse_if(),
            TokenType::For => self.parse_for(),
            _ => Ok(Statement::Expression(self.parse_expression()?)),
        }
    }

    fn parse_type_decl(&mut self) -> ParseResult<Statement> {
        self.advance(); // consume 'type'
        let name = self.expect_identifier("type name after 'type'")?;
        self.expect(&TokenType::Equal, "'=' after type name")?;
        let annotation = self.parse_type_annotation()?;
        Ok(Statement::TypeDecl { name, annotation })
    }

    fn parse_interface_decl(&mut self) -> ParseResult<Statement> {
        self.advance(); // consume 'interface'
        let name = self.expect_identifier("interface name after 'interface'")?;
        self.expect(&TokenType::LeftBrace, "'{' after interface name")?;

        let mut fields = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            let field_name = self.expect_identifier("field name")?;
            self.expect(&TokenType::Colon, "':' after field name")?;
            let field_type = self.parse_type_annotation()?;
            fields.push((field_name, field_type));

            if self.check(&TokenType::Comma) {
                self.advance();
            }
        }
        self.expect(&TokenType::RightBrace, "'}' after interface fields")?;

        Ok(Statement::InterfaceDecl { name, fields })
    }

    fn parse_var_decl(&mut self, constant: bool) -> ParseResult<Statement> {
        self.advance(); // consume 'let' / 'const'
        let name = self.expect_identifier("variable name")?;

        let annotation = if self.check(&TokenType::Colon) {
            self.advance();
            Some(self.parse_type_annotation()?)
        } else {
            None
        };

        self.expect(&TokenType::Equal, "'=' after variable name")?;
        let value = self.parse_expression()?;

        Ok(Statement::VarDecl {
            name,
            constant,
            annotation,
            value,
        })
    }

    fn parse_fn_decl(&mut self, is_async: bool) -> ParseResult<Statement> {
        self.advance(); // consume 'fn'
        let name = self.expect_identifier("function name after 'fn'")?;
        self.expect(&TokenType::LeftParen, "'(' after function name")?;

        let mut params = Vec::new();
        while !self.check(&TokenType::RightParen) && !self.is_at_end() {
            let param_name = self.expect_identifier("parameter name")?;
            let annotation = if self.check(&TokenType::Colon) {
                self.advance();
                Some(self.parse_type_annotation()?)
            } else {
                None
            };
            params.push(Parameter {
                name: param_name,
                annotation,
            });

            if self.check(&TokenType::Comma) {
                self.advance();
            }
        }
        self.expect(&TokenType::RightParen, "')' after parameters")?;

        let return_annotation = if self.check(&TokenType::Arrow) {
            self.advance();
            Some(self.parse_type_annotation()?)
        } else {
            None
        };

        let body = self.parse_block()?;

        Ok(Statement::FuncDecl {
            name,
            params,
            return_annotation,
            body,
            is_async,
        })
    }

    fn parse_return(&mut self) -> ParseResult<Statement> {
        self.advance(); // consume 'return'
        if self.starts_expression() {
            Ok(Statement::Return(Some(self.parse_expression()?)))
        } else {
            Ok(Statement::Return(None))
        }
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        self.advance(); // consume 'if'
        let condition = self.parse_expression()?;
        let then_body = self.parse_block()?;

        let else_body = if self.check(&TokenType::Else) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            then_body,
            else_body,
        })
    }

    fn parse_for(&mut self) -> ParseResult<Statement> {
        self.advance(); // consume 'for'
        let is_await = if self.check(&TokenType::Await) {
            self.advance();
            true
        } else {
            false
        };

        let variable = self.expect_identifier("loop variable after 'for'")?;
        self.expect(&TokenType::In, "'in' after loop variable")?;
        let iterable = self.parse_expression()?;
        let body = self.parse_block()?;

        Ok(Statement::For {
            variable,
            iterable,
            body,
            is_await,
        })
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(&TokenType::LeftBrace, "'{'")?;
        let mut statements = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        self.expect(&TokenType::RightBrace, "'}'")?;
        Ok(statements)
    }

    // Expressions, lowest precedence first

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ParseResult<Expression> {
        let expr = self.parse_conditional()?;

        if self.check(&TokenType::Equal) {
            self.advance();
            // right-associative
            let value = self.parse_assignment()?;
            return Ok(Expression::Assignment {
                target: Box::new(expr),
                value: Box::new(value),
            });
        }

        Ok(expr)
    }

    fn parse_conditional(&mut self) -> ParseResult<Expression> {
        let condition = self.parse_logical_or()?;

        if self.check(&TokenType::Question) {
            self.advance();
            let then_branch = self.parse_expression()?;
            self.expect(&TokenType::Colon, "':' in conditional expression")?;
            let else_branch = self.parse_expression()?;
            return Ok(Expression::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }

        Ok(condition)
    }

    fn parse_logical_or(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_logical_and()?;

        while self.check(&TokenType::OrOr) {
            self.advance();
            let right = self.parse_logical_and()?;
            expr = Expression::Binary {
                operator: BinaryOperator::Or,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn parse_logical_and(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_equality()?;

        while self.check(&TokenType::AndAnd) {
            self.advance();
            let right = self.parse_equality()?;
            expr = Expression::Binary {
                operator: BinaryOperator::And,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn parse_equality(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_relational()?;

        loop {
            let operator = match self.peek().token_type {
                TokenType::EqualEqual => BinaryOperator::Equal,
                TokenType::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            expr = Expression::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn parse_relational(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_additive()?;

        loop {
            let operator = match self.peek().token_type {
                TokenType::Less => BinaryOperator::Less,
                TokenType::LessEqual => BinaryOperator::LessEqual,
                TokenType::Greater => BinaryOperator::Greater,
                TokenType::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            expr = Expression::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_multiplicative()?;

        loop {
            let operator = match self.peek().token_type {
                TokenType::Plus => BinaryOperator::Add,
                TokenType::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            expr = Expression::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_unary()?;

        loop {
            let operator = match self.peek().token_type {
                TokenType::Star => BinaryOperator::Multiply,
                TokenType::Slash => BinaryOperator::Divide,
                TokenType::Percent => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = Expression::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        match self.peek().token_type {
            TokenType::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expression::Unary {
                    operator: UnaryOperator::Not,
                    operand: Box::new(operand),
                })
            }
            TokenType::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expression::Unary {
                    operator: UnaryOperator::Negate,
                    operand: Box::new(operand),
                })
            }
            TokenType::Await => {
                self.advance();
                let argument = self.parse_unary()?;
                Ok(Expression::Await(Box::new(argument)))
            }
            _ => self.parse_call_member(),
        }
    }

    fn parse_call_member(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek().token_type {
                TokenType::Dot => {
                    self.advance();
                    let name = self.expect_identifier("property name after '.'")?;
                    expr = Expression::Member {
                        object: Box::new(expr),
                        property: Box::new(Expression::Identifier(name)),
                        computed: false,
                    };
                }
                TokenType::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenType::RightBracket, "']' after index")?;
                    // only literal indices are supported; anything else
                    // would need runtime key resolution
                    match index {
                        Expression::Literal(lit) => {
                            expr = Expression::Member {
                                object: Box::new(expr),
                                property: Box::new(Expression::Literal(lit)),
                                computed: true,
                            };
                        }
                        _ => return Err(ParseError::ComplexComputedMember),
                    }
                }
                TokenType::LeftParen => {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.check(&TokenType::RightParen) && !self.is_at_end() {
                        args.push(self.parse_expression()?);
                        if self.check(&TokenType::Comma) {
                            self.advance();
                        }
                    }
                    self.expect(&TokenType::RightParen, "')' after arguments")?;
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.peek().token_type.clone() {
            TokenType::Number(n) => {
                self.advance();
                Ok(Expression::Literal(Literal::Number(n)))
            }
            TokenType::String(s) => {
                self.advance();
                Ok(Expression::Literal(Literal::String(s)))
            }
            TokenType::True => {
                self.advance();
                Ok(Expression::Literal(Literal::Bool(true)))
            }
            TokenType::False => {
                self.advance();
                Ok(Expression::Literal(Literal::Bool(false)))
            }
            TokenType::Null => {
                self.advance();
                Ok(Expression::Literal(Literal::Null))
            }
            TokenType::Async => {
                self.advance();
                self.parse_async_arrow()
            }
            TokenType::Identifier(name) => {
                if self.peek_at(1).token_type == TokenType::FatArrow {
                    // single-parameter arrow: x => body
                    self.advance(); // consume identifier
                    self.advance(); // consume '=>'
                    let body = self.parse_expression()?;
                    return Ok(Expression::Arrow {
                        params: vec![name],
                        body: Box::new(body),
                        is_async: false,
                    });
                }
                self.advance();
                Ok(Expression::Identifier(name))
            }
            TokenType::LeftParen => {
                if self.is_arrow_ahead() {
                    self.parse_paren_arrow(false)
                } else {
                    self.advance(); // consume '('
                    let expr = self.parse_expression()?;
                    self.expect(&TokenType::RightParen, "')' after expression")?;
                    Ok(expr)
                }
            }
            TokenType::LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(&TokenType::RightBracket) && !self.is_at_end() {
                    elements.push(self.parse_expression()?);
                    if self.check(&TokenType::Comma) {
                        self.advance();
                    }
                }
                self.expect(&TokenType::RightBracket, "']' after array elements")?;
                Ok(Expression::Array(elements))
            }
            TokenType::LeftBrace => self.parse_object_literal(),
            _ => Err(ParseError::UnexpectedToken {
                token: self.peek().token_type.describe(),
                line: self.peek().line,
            }),
        }
    }

    /// After a consumed `async` in expression position: either
    /// `async x => body` or `async (a, b) => body`.
    fn parse_async_arrow(&mut self) -> ParseResult<Expression> {
        match self.peek().token_type.clone() {
            TokenType::Identifier(name)
                if self.peek_at(1).token_type == TokenType::FatArrow =>
            {
                self.advance(); // consume identifier
                self.advance(); // consume '=>'
                let body = self.parse_expression()?;
                Ok(Expression::Arrow {
                    params: vec![name],
                    body: Box::new(body),
                    is_async: true,
                })
            }
            TokenType::LeftParen => self.parse_paren_arrow(true),
            _ => Err(self.expected_error("arrow function after 'async'")),
        }
    }

    /// Parse `(a, b) => body` starting at the opening paren.
    fn parse_paren_arrow(&mut self, is_async: bool) -> ParseResult<Expression> {
        self.expect(&TokenType::LeftParen, "'(' before arrow parameters")?;
        let mut params = Vec::new();
        while !self.check(&TokenType::RightParen) && !self.is_at_end() {
            params.push(self.expect_identifier("arrow parameter name")?);
            if self.check(&TokenType::Comma) {
                self.advance();
            }
        }
        self.expect(&TokenType::RightParen, "')' after arrow parameters")?;
        self.expect(&TokenType::FatArrow, "'=>' after arrow parameters")?;
        let body = self.parse_expression()?;
        Ok(Expression::Arrow {
            params,
            body: Box::new(body),
            is_async,
        })
    }

    /// Bounded lookahead from an opening paren: scan to the matching
    /// close paren and report whether `=>` follows. The caller keeps
    /// the paren as its backtrack anchor; nothing is consumed here.
    fn is_arrow_ahead(&self) -> bool {
        let mut i = self.current + 1;
        let mut depth = 1usize;

        while i < self.tokens.len() {
            match self.tokens[i].token_type {
                TokenType::LeftParen => depth += 1,
                TokenType::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        return i + 1 < self.tokens.len()
                            && self.tokens[i + 1].token_type == TokenType::FatArrow;
                    }
                }
                TokenType::Eof => return false,
                _ => {}
            }
            i += 1;
        }
        false
    }

    fn parse_object_literal(&mut self) -> ParseResult<Expression> {
        self.expect(&TokenType::LeftBrace, "'{'")?;
        let mut fields = Vec::new();

        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            let key = match self.peek().token_type.clone() {
                TokenType::Identifier(name) => {
                    self.advance();
                    name
                }
                TokenType::String(s) => {
                    self.advance();
                    s
                }
                _ => return Err(self.expected_error("object key")),
            };
            self.expect(&TokenType::Colon, "':' after object key")?;
            let value = self.parse_expression()?;
            fields.push((key, value));

            if self.check(&TokenType::Comma) {
                self.advance();
            }
        }
        self.expect(&TokenType::RightBrace, "'}' after object fields")?;

        Ok(Expression::Object {
            fields,
            inferred_type: None,
        })
    }

    // Type annotations

    fn parse_type_annotation(&mut self) -> ParseResult<TypeAnnotation> {
        let mut parts = vec![self.parse_postfix_type()?];

        while self.check(&TokenType::Pipe) {
            self.advance();
            parts.push(self.parse_postfix_type()?);
        }

        if parts.len() == 1 {
            Ok(parts.into_iter().next().unwrap())
        } else {
            Ok(TypeAnnotation::Union(parts))
        }
    }

    fn parse_postfix_type(&mut self) -> ParseResult<TypeAnnotation> {
        let mut ty = self.parse_primary_type()?;

        while self.check(&TokenType::LeftBracket) {
            self.advance();
            self.expect(&TokenType::RightBracket, "']' in array type")?;
            ty = TypeAnnotation::Array(Box::new(ty));
        }

        Ok(ty)
    }

    fn parse_primary_type(&mut self) -> ParseResult<TypeAnnotation> {
        match self.peek().token_type.clone() {
            TokenType::Identifier(name) => {
                self.advance();
                match name.as_str() {
                    "number" => Ok(TypeAnnotation::Primitive(PrimitiveType::Number)),
                    "string" => Ok(TypeAnnotation::Primitive(PrimitiveType::String)),
                    "boolean" => Ok(TypeAnnotation::Primitive(PrimitiveType::Boolean)),
                    "Promise" if self.check(&TokenType::Less) => {
                        self.advance(); // consume '<'
                        let resolve = self.parse_type_annotation()?;
                        self.expect(&TokenType::Greater, "'>' after Promise type argument")?;
                        Ok(TypeAnnotation::Promise(Box::new(resolve)))
                    }
                    _ => Ok(TypeAnnotation::Reference(name)),
                }
            }
            TokenType::Null => {
                self.advance();
                Ok(TypeAnnotation::Primitive(PrimitiveType::Null))
            }
            TokenType::LeftBrace => {
                self.advance();
                let mut fields = Vec::new();
                while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
                    let field_name = self.expect_identifier("field name in object type")?;
                    self.expect(&TokenType::Colon, "':' after field name")?;
                    let field_type = self.parse_type_annotation()?;
                    fields.push((field_name, field_type));
                    if self.check(&TokenType::Comma) {
                        self.advance();
                    }
                }
                self.expect(&TokenType::RightBrace, "'}' after object type fields")?;
                Ok(TypeAnnotation::Object(fields))
            }
            _ => Err(self.expected_error("type annotation")),
        }
    }

    // Cursor helpers

    /// Can the current token begin an expression? Used to decide
    /// whether `return` carries a value.
    fn starts_expression(&self) -> bool {
        matches!(
            self.peek().token_type,
            TokenType::Number(_)
                | TokenType::String(_)
                | TokenType::Identifier(_)
                | TokenType::True
                | TokenType::False
                | TokenType::Null
                | TokenType::LeftParen
                | TokenType::LeftBracket
                | TokenType::LeftBrace
                | TokenType::Bang
                | TokenType::Minus
                | TokenType::Async
                | TokenType::Await
        )
    }

    fn expect(&mut self, token_type: &TokenType, description: &str) -> ParseResult<Token> {
        if self.peek().token_type == *token_type {
            Ok(self.advance())
        } else {
            Err(self.expected_error(description))
        }
    }

    fn expect_identifier(&mut self, description: &str) -> ParseResult<String> {
        match self.peek().token_type.clone() {
            TokenType::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.expected_error(description)),
        }
    }

    fn expected_error(&self, description: &str) -> ParseError {
        ParseError::Expected {
            expected: description.to_string(),
            found: self.peek().token_type.describe(),
            line: self.peek().line,
        }
    }

    fn check(&self, token_type: &TokenType) -> bool {
        self.peek().token_type == *token_type
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.current + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens[self.current - 1].clone()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }
}
