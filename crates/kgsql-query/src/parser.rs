//! Pattern query parser
//!
//! Recursive descent over the token stream. Supports:
//! MATCH (chains of node and relationship patterns), WHERE, RETURN [DISTINCT],
//! ORDER BY, SKIP, LIMIT. The first syntax error aborts parsing.

use crate::ast::*;
use crate::lexer::{Token, TokenKind, end_of_input, tokenize};
use kgsql_core::{Direction, ParseError, Result, Span};

/// Parse a token stream into a query
pub fn parse(tokens: &[Token<'_>]) -> std::result::Result<Query, ParseError> {
    let eof = tokens
        .last()
        .map(|t| {
            let width = t.lexeme.chars().count() as u32;
            Span::new(t.span.end(), 0, t.span.line, t.span.column + width)
        })
        .unwrap_or_else(|| Span::new(0, 0, 1, 1));
    Parser::new(tokens, eof).parse_query()
}

/// Tokenize and parse a query string
pub fn parse_query(text: &str) -> Result<Query> {
    let tokens = tokenize(text)?;
    let query = Parser::new(&tokens, end_of_input(text)).parse_query()?;
    Ok(query)
}

type ParseResult<T> = std::result::Result<T, ParseError>;

struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    eof: Span,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn new(tokens: &'t [Token<'a>], eof: Span) -> Self {
        Self {
            tokens,
            pos: 0,
            eof,
        }
    }

    fn parse_query(&mut self) -> ParseResult<Query> {
        self.expect(&TokenKind::Match, "MATCH")?;
        let chain = self.parse_chain()?;

        let where_clause = if self.consume(&TokenKind::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.expect(&TokenKind::Return, "WHERE or RETURN")?;
        let distinct = self.consume(&TokenKind::Distinct);
        let projection = self.parse_return_items()?;

        let mut order_by = Vec::new();
        if self.consume(&TokenKind::Order) {
            self.expect(&TokenKind::By, "BY")?;
            order_by = self.parse_order_items()?;
        }

        let skip = if self.consume(&TokenKind::Skip) {
            Some(self.parse_count()?)
        } else {
            None
        };

        let limit = if self.consume(&TokenKind::Limit) {
            Some(self.parse_count()?)
        } else {
            None
        };

        self.consume(&TokenKind::Semicolon);
        if self.peek().is_some() {
            return Err(self.error("end of query"));
        }

        Ok(Query {
            chain,
            where_clause,
            distinct,
            projection,
            order_by,
            skip,
            limit,
        })
    }

    // ========== Patterns ==========

    fn parse_chain(&mut self) -> ParseResult<PatternChain> {
        let head = self.parse_node()?;
        let mut hops = Vec::new();

        while matches!(
            self.peek(),
            Some(
                TokenKind::Minus
                    | TokenKind::ArrowLeftDash
                    | TokenKind::DoubleDash
                    | TokenKind::ArrowRight
                    | TokenKind::ArrowLeft
            )
        ) {
            let relationship = self.parse_relationship()?;
            let node = self.parse_node()?;
            hops.push(Hop { relationship, node });
        }

        Ok(PatternChain { head, hops })
    }

    fn parse_node(&mut self) -> ParseResult<NodePattern> {
        let offset = self.expect(&TokenKind::LParen, "'(' to start a node pattern")?.span.offset;

        let variable = self.parse_variable();
        let mut labels = Vec::new();
        while self.consume(&TokenKind::Colon) {
            labels.push(self.parse_symbolic_name("label name")?);
        }

        let properties = if self.peek() == Some(&TokenKind::LBrace) {
            self.parse_map()?
        } else {
            Vec::new()
        };

        self.expect(&TokenKind::RParen, "')' to close the node pattern")?;

        Ok(NodePattern {
            variable,
            labels,
            properties,
            offset,
        })
    }

    fn parse_relationship(&mut self) -> ParseResult<RelationshipPattern> {
        let offset = self.current_span().offset;
        let mut relationship = RelationshipPattern {
            variable: None,
            rel_types: Vec::new(),
            direction: Direction::Either,
            properties: Vec::new(),
            length: None,
            offset,
        };

        let (left_arrow, right_arrow) = match self.peek() {
            Some(TokenKind::ArrowRight) => {
                self.advance();
                (false, true)
            }
            Some(TokenKind::ArrowLeft) => {
                self.advance();
                // `<-->` reads as undirected
                let right = self.consume(&TokenKind::GreaterThan);
                (true, right)
            }
            Some(TokenKind::DoubleDash) => {
                self.advance();
                (false, false)
            }
            Some(TokenKind::Minus) | Some(TokenKind::ArrowLeftDash) => {
                let left = self.peek() == Some(&TokenKind::ArrowLeftDash);
                self.advance();
                if self.peek() == Some(&TokenKind::LBracket) {
                    self.parse_relationship_detail(&mut relationship)?;
                }
                let right = match self.peek() {
                    Some(TokenKind::Minus) => false,
                    Some(TokenKind::DashArrowRight) => true,
                    _ => return Err(self.error("'-' or '->' to close the relationship pattern")),
                };
                self.advance();
                (left, right)
            }
            _ => return Err(self.error("relationship pattern")),
        };

        relationship.direction = match (left_arrow, right_arrow) {
            (true, false) => Direction::Incoming,
            (false, true) => Direction::Outgoing,
            _ => Direction::Either,
        };

        if self.peek() == Some(&TokenKind::LBrace) {
            if relationship.length.is_some() {
                return Err(self.error("a single hop bound"));
            }
            relationship.length = Some(self.parse_quantifier()?);
        }

        Ok(relationship)
    }

    fn parse_relationship_detail(&mut self, rel: &mut RelationshipPattern) -> ParseResult<()> {
        self.expect(&TokenKind::LBracket, "'['")?;
        rel.variable = self.parse_variable();

        if self.consume(&TokenKind::Colon) {
            rel.rel_types.push(self.parse_symbolic_name("relationship type")?);
            while self.consume(&TokenKind::Pipe) {
                self.consume(&TokenKind::Colon);
                rel.rel_types.push(self.parse_symbolic_name("relationship type")?);
            }
        }

        if self.consume(&TokenKind::Star) {
            rel.length = Some(self.parse_star_range()?);
        }

        if self.peek() == Some(&TokenKind::LBrace) {
            rel.properties = self.parse_map()?;
        }

        self.expect(&TokenKind::RBracket, "']' to close the relationship pattern")?;
        Ok(())
    }

    /// `*`, `*n`, `*n..`, `*..m`, `*n..m`
    fn parse_star_range(&mut self) -> ParseResult<HopBounds> {
        let min = self.parse_optional_hop()?;
        if self.consume(&TokenKind::DoubleDot) {
            let max = self.parse_optional_hop()?;
            Ok(HopBounds { min, max })
        } else if min.is_some() {
            Ok(HopBounds { min, max: min })
        } else {
            Ok(HopBounds {
                min: None,
                max: None,
            })
        }
    }

    /// `{n}`, `{n,}`, `{n,m}`
    fn parse_quantifier(&mut self) -> ParseResult<HopBounds> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let min = self
            .parse_optional_hop()?
            .ok_or_else(|| self.error("hop count"))?;
        let bounds = if self.consume(&TokenKind::Comma) {
            HopBounds {
                min: Some(min),
                max: self.parse_optional_hop()?,
            }
        } else {
            HopBounds {
                min: Some(min),
                max: Some(min),
            }
        };
        self.expect(&TokenKind::RBrace, "'}' to close the hop quantifier")?;
        Ok(bounds)
    }

    fn parse_optional_hop(&mut self) -> ParseResult<Option<u32>> {
        match self.peek() {
            Some(TokenKind::Integer(n)) => {
                let hops = u32::try_from(*n).map_err(|_| self.error("hop count below 2^32"))?;
                self.advance();
                Ok(Some(hops))
            }
            _ => Ok(None),
        }
    }

    fn parse_map(&mut self) -> ParseResult<Vec<MapEntry>> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut entries = Vec::new();
        if self.consume(&TokenKind::RBrace) {
            return Ok(entries);
        }

        loop {
            let key = self.parse_symbolic_name("property name")?;
            self.expect(&TokenKind::Colon, "':' after the property name")?;
            let value = self.parse_expression()?;
            entries.push(MapEntry { key, value });

            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::RBrace, "'}' to close the property map")?;
        Ok(entries)
    }

    // ========== Projection ==========

    fn parse_return_items(&mut self) -> ParseResult<Vec<ReturnItem>> {
        let mut items = Vec::new();

        loop {
            let expression = self.parse_expression()?;
            let alias = if self.consume(&TokenKind::As) {
                Some(self.parse_symbolic_name("alias")?)
            } else {
                None
            };
            items.push(ReturnItem { expression, alias });

            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }

        Ok(items)
    }

    fn parse_order_items(&mut self) -> ParseResult<Vec<OrderItem>> {
        let mut items = Vec::new();

        loop {
            let expression = self.parse_expression()?;
            let ascending = if self.consume(&TokenKind::Desc) {
                false
            } else {
                self.consume(&TokenKind::Asc);
                true
            };
            items.push(OrderItem {
                expression,
                ascending,
            });

            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }

        Ok(items)
    }

    fn parse_count(&mut self) -> ParseResult<Count> {
        let count = match self.peek() {
            Some(TokenKind::Integer(n)) => Count::Literal(*n as u64),
            Some(TokenKind::Parameter(name)) => Count::Parameter {
                name: name.clone(),
                offset: self.current_span().offset,
            },
            _ => return Err(self.error("non-negative integer or parameter")),
        };
        self.advance();
        Ok(count)
    }

    // ========== Expressions ==========

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_xor()?;
        while self.consume(&TokenKind::Or) {
            let right = self.parse_xor()?;
            left = binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_and()?;
        while self.consume(&TokenKind::Xor) {
            let right = self.parse_and()?;
            left = binary(left, BinaryOp::Xor, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_not()?;
        while self.consume(&TokenKind::And) {
            let right = self.parse_not()?;
            left = binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<Expression> {
        if self.peek() == Some(&TokenKind::Not) {
            let offset = self.current_span().offset;
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expression::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                offset,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let left = self.parse_atom()?;

        let op = match self.peek() {
            Some(TokenKind::Equals) => BinaryOp::Equals,
            Some(TokenKind::NotEquals) => BinaryOp::NotEquals,
            Some(TokenKind::LessThan) => BinaryOp::LessThan,
            Some(TokenKind::LessEquals) => BinaryOp::LessEquals,
            Some(TokenKind::GreaterThan) => BinaryOp::GreaterThan,
            Some(TokenKind::GreaterEquals) => BinaryOp::GreaterEquals,
            Some(TokenKind::In) => BinaryOp::In,
            Some(TokenKind::Contains) => BinaryOp::Contains,
            // `a.x<-1` lexes with an arrow; after an operand it reads as `<`
            // and a negative number
            Some(TokenKind::ArrowLeftDash) => {
                let minus = self.current_span().offset + 1;
                self.advance();
                let right = self.negative_number(minus, "number after '<-'")?;
                return Ok(binary(left, BinaryOp::LessThan, right));
            }
            Some(TokenKind::Starts) => {
                self.advance();
                self.expect(&TokenKind::With, "WITH after STARTS")?;
                let right = self.parse_atom()?;
                return Ok(binary(left, BinaryOp::StartsWith, right));
            }
            Some(TokenKind::Ends) => {
                self.advance();
                self.expect(&TokenKind::With, "WITH after ENDS")?;
                let right = self.parse_atom()?;
                return Ok(binary(left, BinaryOp::EndsWith, right));
            }
            Some(TokenKind::Is) => {
                self.advance();
                let op = if self.consume(&TokenKind::Not) {
                    UnaryOp::IsNotNull
                } else {
                    UnaryOp::IsNull
                };
                self.expect(&TokenKind::Null, "NULL")?;
                let offset = left.offset;
                return Ok(Expression::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(left),
                    },
                    offset,
                ));
            }
            _ => return Ok(left),
        };

        self.advance();
        let right = self.parse_atom()?;
        Ok(binary(left, op, right))
    }

    fn parse_atom(&mut self) -> ParseResult<Expression> {
        let Some(token) = self.tokens.get(self.pos) else {
            return Err(self.error("expression"));
        };
        let offset = token.span.offset;

        let kind = match &token.kind {
            TokenKind::Integer(n) => ExprKind::Literal(Literal::Integer(*n)),
            TokenKind::Float(x) => ExprKind::Literal(Literal::Float(*x)),
            TokenKind::String(s) => ExprKind::Literal(Literal::String(s.clone())),
            TokenKind::True => ExprKind::Literal(Literal::Boolean(true)),
            TokenKind::False => ExprKind::Literal(Literal::Boolean(false)),
            TokenKind::Null => ExprKind::Literal(Literal::Null),
            TokenKind::Parameter(name) => ExprKind::Parameter(name.clone()),
            TokenKind::Minus => {
                self.advance();
                return self.negative_number(offset, "number after '-'");
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.consume(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expression()?);
                        if !self.consume(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RBracket, "']' to close the list")?;
                }
                return Ok(Expression::new(ExprKind::List(items), offset));
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::Identifier(name) | TokenKind::EscapedIdentifier(name) => {
                let name = name.clone();
                self.advance();
                return self.parse_identifier_tail(name, offset);
            }
            _ => return Err(self.error("expression")),
        };

        self.advance();
        Ok(Expression::new(kind, offset))
    }

    /// Function call, property access or plain variable after an identifier
    fn parse_identifier_tail(&mut self, name: String, offset: usize) -> ParseResult<Expression> {
        if self.consume(&TokenKind::LParen) {
            let mut args = Vec::new();
            if !self.consume(&TokenKind::RParen) {
                loop {
                    args.push(self.parse_expression()?);
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RParen, "')' to close the argument list")?;
            }
            return Ok(Expression::new(ExprKind::Function { name, args }, offset));
        }

        if self.consume(&TokenKind::Dot) {
            let key = self.parse_symbolic_name("property name")?;
            return Ok(Expression::new(
                ExprKind::Property {
                    variable: name,
                    key: key.value,
                },
                offset,
            ));
        }

        Ok(Expression::new(ExprKind::Variable(name), offset))
    }

    // ========== Names ==========

    fn parse_variable(&mut self) -> Option<Name> {
        let token = self.tokens.get(self.pos)?;
        match &token.kind {
            TokenKind::Identifier(name) | TokenKind::EscapedIdentifier(name) => {
                let name = Name::new(name.clone(), token.span.offset);
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    /// Label, type, property or alias name; keywords are accepted verbatim
    fn parse_symbolic_name(&mut self, expected: &str) -> ParseResult<Name> {
        let Some(token) = self.tokens.get(self.pos) else {
            return Err(self.error(expected));
        };
        let name = match &token.kind {
            TokenKind::Identifier(name) | TokenKind::EscapedIdentifier(name) => name.clone(),
            kind if kind.is_keyword() => token.lexeme.to_string(),
            _ => return Err(self.error(expected)),
        };
        let name = Name::new(name, token.span.offset);
        self.advance();
        Ok(name)
    }

    /// The numeric literal after a consumed minus sign
    fn negative_number(&mut self, offset: usize, expected: &str) -> ParseResult<Expression> {
        let kind = match self.peek() {
            Some(TokenKind::Integer(n)) => ExprKind::Literal(Literal::Integer(-*n)),
            Some(TokenKind::Float(x)) => ExprKind::Literal(Literal::Float(-*x)),
            _ => return Err(self.error(expected)),
        };
        self.advance();
        Ok(Expression::new(kind, offset))
    }

    // ========== Token helpers ==========

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<&'t Token<'a>> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> ParseResult<&'t Token<'a>> {
        match self.tokens.get(self.pos) {
            Some(token) if &token.kind == kind => {
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.error(expected)),
        }
    }

    fn current_span(&self) -> Span {
        self.tokens.get(self.pos).map(|t| t.span).unwrap_or(self.eof)
    }

    fn error(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some(token) => ParseError::new(token.span, expected, token.to_string()),
            None => ParseError::new(self.eof, expected, "end of input"),
        }
    }
}

fn binary(left: Expression, op: BinaryOp, right: Expression) -> Expression {
    let offset = left.offset;
    Expression::new(
        ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        offset,
    )
}
