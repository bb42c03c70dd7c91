use std::rc::Rc;

use log::{debug, error, trace};

use crate::{
    ast::{
        ArithmeticOperator, ElifBranch, Expr, FunctionDeclaration, IfStmt, LogicalOperator,
        Program, Property, RelationalOperator, Stmt,
    },
    config::ElifPolicy,
    error::ParseError,
    lexer::{Token, TokenKind},
};

/// Parses a token sequence with the default elif policy.
pub fn parse(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse_program()
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    elif_policy: ElifPolicy,
    diagnostics: Vec<String>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|token| token.kind) != Some(TokenKind::Eof) {
            let line = tokens.last().map_or(1, |token| token.line);
            tokens.push(Token {
                value: "EndOfFile".to_string(),
                kind: TokenKind::Eof,
                line,
            });
        }
        Self {
            tokens,
            current: 0,
            elif_policy: ElifPolicy::default(),
            diagnostics: Vec::new(),
        }
    }

    pub fn with_elif_policy(mut self, elif_policy: ElifPolicy) -> Self {
        self.elif_policy = elif_policy;
        self
    }

    /// Non-fatal problems noticed while parsing.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        trace!("parsed {} top-level statement(s)", body.len());
        Ok(Program { body })
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let stmt = match self.current_kind() {
            TokenKind::Var | TokenKind::Const => self.parse_var_declaration()?,
            TokenKind::If => self.parse_if_statement()?,
            TokenKind::Func => self.parse_function_declaration()?,
            TokenKind::Return => self.parse_return_statement()?,
            TokenKind::Identifier if self.current_token().value == "return" => {
                self.parse_return_statement()?
            }
            TokenKind::Pull => self.parse_import_statement()?,
            _ => Stmt::Expr(self.parse_expression()?),
        };

        if self.current_kind() == TokenKind::Semicolon {
            self.advance();
        }

        Ok(stmt)
    }

    // ( have | const ) IDENT ( ; | : TYPE | := EXPR | = EXPR )
    fn parse_var_declaration(&mut self) -> Result<Stmt, ParseError> {
        let is_constant = self.advance().kind == TokenKind::Const;
        let name = self.expect(
            TokenKind::Identifier,
            "following 'have' or 'const' keywords",
        )?;

        match (self.current_kind(), self.peek_kind()) {
            (TokenKind::Semicolon, _) => {
                self.advance();
                return Ok(self.uninitialized_declaration(name, is_constant));
            }
            (TokenKind::Colon, TokenKind::Equals) => {
                self.advance();
                self.advance();
            }
            (TokenKind::Colon, _) => {
                self.advance();
                self.expect(TokenKind::Identifier, "as type name after ':'")?;
                return Ok(self.uninitialized_declaration(name, is_constant));
            }
            (TokenKind::Equals, _) => {
                self.advance();
            }
            _ => return Err(self.unexpected("':=' or '=' after variable name")),
        }

        let value = self.parse_expression()?;
        Ok(Stmt::VarDeclaration {
            identifier: name.value,
            value: Some(value),
            is_constant,
        })
    }

    fn uninitialized_declaration(&mut self, name: Token, is_constant: bool) -> Stmt {
        if is_constant {
            let message = format!(
                "[Parser] Error on line {}: Cannot declare constant '{}' without a value being assigned",
                name.line, name.value
            );
            error!("{}", message);
            self.diagnostics.push(message);
        }
        Stmt::VarDeclaration {
            identifier: name.value,
            value: None,
            is_constant: false,
        }
    }

    fn parse_if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let condition = self.parse_expression()?;
        let then_branch = self.parse_block("after if condition")?;

        let mut elif_branches = Vec::new();
        let mut else_branch = None;

        loop {
            match self.current_kind() {
                TokenKind::Else => {
                    self.advance();
                    else_branch = Some(self.parse_block("after 'else'")?);
                }
                TokenKind::Elif => {
                    self.advance();
                    let condition = self.parse_expression()?;
                    let body = self.parse_block("after elif condition")?;
                    if self.elif_policy == ElifPolicy::LastWins {
                        elif_branches.clear();
                    }
                    elif_branches.push(ElifBranch { condition, body });
                }
                _ => break,
            }
        }

        debug!(
            "parsed if statement with {} elif arm(s), else: {}",
            elif_branches.len(),
            else_branch.is_some()
        );

        Ok(Stmt::If(IfStmt {
            condition,
            then_branch,
            elif_branches,
            else_branch,
        }))
    }

    // func NAME ( PARAMS ) { STMTS }
    fn parse_function_declaration(&mut self) -> Result<Stmt, ParseError> {
        let line = self.advance().line;
        let name = self.expect(TokenKind::Identifier, "as function name")?.value;

        let mut parameters = Vec::new();
        for arg in self.parse_arguments()? {
            match arg {
                Expr::Identifier(symbol) => parameters.push(symbol),
                other => {
                    return Err(ParseError::InvalidParameter {
                        found: other.kind_name().to_string(),
                        line,
                    })
                }
            }
        }

        let body = self.parse_block("after function parameters")?;
        debug!("parsed function '{}' with {} parameter(s)", name, parameters.len());

        Ok(Stmt::FunctionDeclaration(FunctionDeclaration {
            name,
            parameters,
            body: Rc::new(body),
        }))
    }

    fn parse_return_statement(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        Ok(Stmt::Return(self.parse_expression()?))
    }

    // pull NAME ( . NAME )*
    fn parse_import_statement(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let mut module = self.expect(TokenKind::Identifier, "as module name after 'pull'")?.value;
        while self.current_kind() == TokenKind::Dot {
            self.advance();
            let segment = self.expect(TokenKind::Identifier, "as module path segment")?;
            module.push('.');
            module.push_str(&segment.value);
        }
        Ok(Stmt::Import { module })
    }

    fn parse_block(&mut self, context: &str) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace, context)?;
        let mut body = Vec::new();
        while !self.is_at_end() && self.current_kind() != TokenKind::RBrace {
            body.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace, "to close block")?;
        Ok(body)
    }

    /// Assignment-level expression followed by the `?`, relational, equality
    /// and logical suffix loops. Each loop re-enters at assignment level for
    /// its right operand, so the three tiers do not nest beneath each other.
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_assignment_expression()?;

        while self.current_kind() == TokenKind::Null {
            self.advance();
            expr = Expr::Null;
        }

        while let Some(operator) = self.relational_operator() {
            self.advance();
            let right = self.parse_assignment_expression()?;
            expr = Expr::Relational {
                left: Box::new(expr),
                right: Box::new(right),
                operator,
            };
        }

        while let Some(operator) = self.equality_operator() {
            self.advance();
            let right = self.parse_assignment_expression()?;
            expr = Expr::Relational {
                left: Box::new(expr),
                right: Box::new(right),
                operator,
            };
        }

        while let Some(operator) = self.logical_operator() {
            self.advance();
            let right = self.parse_assignment_expression()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                right: Box::new(right),
                operator,
            };
        }

        Ok(expr)
    }

    fn relational_operator(&self) -> Option<RelationalOperator> {
        match self.current_kind() {
            TokenKind::GreaterThan => Some(RelationalOperator::GreaterThan),
            TokenKind::GreaterThanOrEqual => Some(RelationalOperator::GreaterThanOrEqual),
            TokenKind::LessThan => Some(RelationalOperator::LessThan),
            TokenKind::LessThanOrEqual => Some(RelationalOperator::LessThanOrEqual),
            _ => None,
        }
    }

    fn equality_operator(&self) -> Option<RelationalOperator> {
        match self.current_kind() {
            TokenKind::EqualTo => Some(RelationalOperator::Equals),
            TokenKind::NotEqual => Some(RelationalOperator::NotEquals),
            _ => None,
        }
    }

    fn logical_operator(&self) -> Option<LogicalOperator> {
        match self.current_kind() {
            TokenKind::And => Some(LogicalOperator::And),
            TokenKind::Or => Some(LogicalOperator::Or),
            _ => None,
        }
    }

    fn parse_assignment_expression(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_object_expression()?;

        match self.current_kind() {
            TokenKind::Colon => {
                self.advance();
                self.expect(TokenKind::Equals, "after ':' in assignment")?;
                let value = self.parse_assignment_expression()?;
                Ok(Expr::Assignment {
                    assignee: Box::new(left),
                    value: Box::new(value),
                })
            }
            TokenKind::PlusEqual | TokenKind::MinusEqual => {
                let operator = if self.advance().kind == TokenKind::PlusEqual {
                    ArithmeticOperator::Add
                } else {
                    ArithmeticOperator::Sub
                };
                let value = self.parse_assignment_expression()?;
                Ok(Expr::CompoundAssignment {
                    assignee: Box::new(left),
                    operator,
                    value: Box::new(value),
                })
            }
            _ => Ok(left),
        }
    }

    // { KEY, KEY: EXPR, ... }
    fn parse_object_expression(&mut self) -> Result<Expr, ParseError> {
        if self.current_kind() != TokenKind::LBrace {
            return self.parse_additive_expression();
        }
        self.advance();

        let mut properties = Vec::new();

        while !self.is_at_end() && self.current_kind() != TokenKind::RBrace {
            let key = self.expect(TokenKind::Identifier, "as object key")?.value;

            match self.current_kind() {
                TokenKind::Comma => {
                    self.advance();
                    properties.push(Property { key, value: None });
                    continue;
                }
                TokenKind::RBrace => {
                    properties.push(Property { key, value: None });
                    continue;
                }
                _ => {}
            }

            self.expect(TokenKind::Colon, "after object key")?;
            let value = self.parse_expression()?;
            properties.push(Property {
                key,
                value: Some(value),
            });

            if self.current_kind() != TokenKind::RBrace {
                self.expect(TokenKind::Comma, "or RBrace after property")?;
            }
        }

        self.expect(TokenKind::RBrace, "to close object literal")?;
        Ok(Expr::Object(properties))
    }

    fn parse_additive_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative_expression()?;

        while let Some(operator) = self.arithmetic_operator(&["+", "-"]) {
            self.advance();
            let right = self.parse_multiplicative_expression()?;
            left = Expr::Binary {
                left: Box::new(left),
                right: Box::new(right),
                operator,
            };
        }

        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_call_member_expression()?;

        while let Some(operator) = self.arithmetic_operator(&["*", "/", "%"]) {
            self.advance();
            let right = self.parse_call_member_expression()?;
            left = Expr::Binary {
                left: Box::new(left),
                right: Box::new(right),
                operator,
            };
        }

        Ok(left)
    }

    fn arithmetic_operator(&self, symbols: &[&str]) -> Option<ArithmeticOperator> {
        let token = self.current_token();
        if token.kind == TokenKind::BinaryOperator && symbols.contains(&token.value.as_str()) {
            ArithmeticOperator::from_symbol(&token.value)
        } else {
            None
        }
    }

    // obj.a.b(x)[y], f()()
    fn parse_call_member_expression(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_expression()?;

        loop {
            match self.current_kind() {
                TokenKind::Dot => {
                    let line = self.advance().line;
                    let property = self.parse_primary_expression()?;
                    if !matches!(property, Expr::Identifier(_)) {
                        return Err(ParseError::InvalidMemberProperty {
                            found: property.kind_name().to_string(),
                            line,
                        });
                    }
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: Box::new(property),
                        computed: false,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let property = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "to close computed member access")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: Box::new(property),
                        computed: true,
                    };
                }
                TokenKind::LParen => {
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        caller: Box::new(expr),
                        args,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    // Arguments are parsed at assignment level, so `f(a < b)` needs parentheses.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::LParen, "to open argument list")?;
        let mut args = Vec::new();

        if self.current_kind() != TokenKind::RParen {
            args.push(self.parse_assignment_expression()?);
            while self.current_kind() == TokenKind::Comma {
                self.advance();
                args.push(self.parse_assignment_expression()?);
            }
        }

        self.expect(TokenKind::RParen, "to close argument list")?;
        Ok(args)
    }

    fn parse_primary_expression(&mut self) -> Result<Expr, ParseError> {
        let token = self.current_token().clone();

        match token.kind {
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Identifier(token.value))
            }
            TokenKind::Number => {
                let value = token.value.parse::<f64>().map_err(|_| {
                    ParseError::InvalidExpression {
                        found: token.kind,
                        value: token.value.clone(),
                        line: token.line,
                    }
                })?;
                self.advance();
                Ok(Expr::NumericLiteral(value))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::StringLiteral(token.value))
            }
            TokenKind::LParen => {
                self.advance();
                let value = self.parse_expression()?;
                self.expect(TokenKind::RParen, "to close parenthesised expression")?;
                Ok(value)
            }
            _ => Err(ParseError::InvalidExpression {
                found: token.kind,
                value: token.value,
                line: token.line,
            }),
        }
    }

    fn expect(&mut self, expected: TokenKind, context: &str) -> Result<Token, ParseError> {
        if self.current_kind() == expected {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{} {}", expected, context)))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current_token();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: token.kind,
            value: token.value.clone(),
            line: token.line,
        }
    }

    fn is_at_end(&self) -> bool {
        self.current_kind() == TokenKind::Eof
    }

    fn current_token(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn current_kind(&self) -> TokenKind {
        self.current_token().kind
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens
            .get(self.current + 1)
            .map_or(TokenKind::Eof, |token| token.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.current_token().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }
}
