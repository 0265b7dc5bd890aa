//! Recursive-descent parser
//!
//! ```text
//! or_expr  := and_expr ("or" and_expr)*
//! and_expr := not_expr ("and" not_expr)*
//! not_expr := "not" not_expr | primary
//! primary  := "(" or_expr ")" | field "exists" | field op value
//!           | field "in" "(" value ("," value)* ")"
//! ```

use contracts::ContractError;

use crate::ast::{CmpOp, Expr, Field, Literal};
use crate::lexer::{LexToken, Lexer, Token};

type PResult<T> = Result<T, ContractError>;

/// Maximum nesting of parentheses and `not`
const MAX_NESTING: usize = 256;

/// Maximum number of comparisons in one expression; bounds the tree depth
/// of long `and` / `or` chains
const MAX_TERMS: usize = 1024;

pub struct Parser {
    tokens: Vec<LexToken>,
    pos: usize,
    depth: usize,
    terms: usize,
}

impl Parser {
    pub fn new(src: &str) -> PResult<Self> {
        let tokens = Lexer::new(src).tokenize()?;
        Ok(Self {
            tokens,
            pos: 0,
            depth: 0,
            terms: 0,
        })
    }

    /// Parse a complete expression; trailing input is an error
    pub fn parse(mut self) -> PResult<Expr> {
        if self.at(&Token::Eof) {
            return self.err_here("empty filter expression");
        }
        let expr = self.parse_or()?;
        if !self.at(&Token::Eof) {
            return self.err_here(format!("unexpected trailing input {:?}", self.current().kind));
        }
        Ok(expr)
    }

    fn current(&self) -> &LexToken {
        // tokenize() always ends with Eof, and bump() never moves past it
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> LexToken {
        let token = self.current().clone();
        if token.kind != Token::Eof {
            self.pos += 1;
        }
        token
    }

    fn at(&self, t: &Token) -> bool {
        &self.current().kind == t
    }

    fn consume(&mut self, t: &Token) -> bool {
        if self.at(t) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, t: &Token) -> PResult<()> {
        if self.consume(t) {
            Ok(())
        } else {
            self.err_here(format!("expected {t:?}, found {:?}", self.current().kind))
        }
    }

    fn err_here<T>(&self, msg: impl Into<String>) -> PResult<T> {
        Err(ContractError::filter_syntax(self.current().offset, msg))
    }

    /// Called after consuming `(` or `not`; errors refer to the next token
    fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return self.err_here(format!("expression nested too deeply (limit {MAX_NESTING})"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.consume(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_not()?;
        while self.consume(&Token::And) {
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.consume(&Token::Not) {
            self.enter()?;
            let inner = self.parse_not()?;
            self.leave();
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        if self.consume(&Token::LParen) {
            self.enter()?;
            let inner = self.parse_or()?;
            self.expect(&Token::RParen)?;
            self.leave();
            return Ok(inner);
        }

        self.terms += 1;
        if self.terms > MAX_TERMS {
            return self.err_here(format!("too many comparisons (limit {MAX_TERMS})"));
        }

        let field = self.parse_field()?;

        if self.consume(&Token::Exists) {
            return Ok(Expr::Exists(field));
        }

        if self.consume(&Token::In) {
            return self.parse_in_list(field);
        }

        let op_offset = self.current().offset;
        let op = self.parse_op()?;
        let value = self.parse_value()?;
        Self::check_operands(&field, op, &value, op_offset)?;
        Ok(Expr::Compare { field, op, value })
    }

    fn parse_field(&mut self) -> PResult<Field> {
        let token = self.bump();
        match token.kind {
            Token::Word(name) => Field::from_name(&name).ok_or_else(|| {
                ContractError::filter_syntax(token.offset, format!("unknown field '{name}'"))
            }),
            other => Err(ContractError::filter_syntax(
                token.offset,
                format!("expected field name, found {other:?}"),
            )),
        }
    }

    fn parse_op(&mut self) -> PResult<CmpOp> {
        let op = match self.current().kind {
            Token::Eq => CmpOp::Eq,
            Token::Ne => CmpOp::Ne,
            Token::Lt => CmpOp::Lt,
            Token::Le => CmpOp::Le,
            Token::Gt => CmpOp::Gt,
            Token::Ge => CmpOp::Ge,
            Token::Contains => CmpOp::Contains,
            Token::StartsWith => CmpOp::StartsWith,
            Token::EndsWith => CmpOp::EndsWith,
            ref other => {
                return self.err_here(format!("expected comparison operator, found {other:?}"))
            }
        };
        self.bump();
        Ok(op)
    }

    fn parse_value(&mut self) -> PResult<Literal> {
        let token = self.bump();
        match token.kind {
            Token::Str(s) | Token::Word(s) => Ok(Literal::Str(s)),
            Token::Num(n) => Ok(Literal::Num(n)),
            Token::True => Ok(Literal::Bool(true)),
            Token::False => Ok(Literal::Bool(false)),
            other => Err(ContractError::filter_syntax(
                token.offset,
                format!("expected value, found {other:?}"),
            )),
        }
    }

    fn parse_in_list(&mut self, field: Field) -> PResult<Expr> {
        self.expect(&Token::LParen)?;
        let mut values = vec![self.parse_value()?];
        while self.consume(&Token::Comma) {
            values.push(self.parse_value()?);
        }
        self.expect(&Token::RParen)?;
        Ok(Expr::In { field, values })
    }

    fn check_operands(field: &Field, op: CmpOp, value: &Literal, offset: usize) -> PResult<()> {
        if op.is_ordering() && !matches!(value, Literal::Num(_)) {
            return Err(ContractError::filter_syntax(
                offset,
                format!("operator {op:?} on '{field}' needs a numeric operand, got '{value}'"),
            ));
        }
        if op.is_text() && matches!(value, Literal::Bool(_)) {
            return Err(ContractError::filter_syntax(
                offset,
                format!("operator {op:?} on '{field}' needs a text operand"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> PResult<Expr> {
        Parser::new(src)?.parse()
    }

    #[test]
    fn test_precedence_and_binds_tighter() {
        let expr = parse("evt.num = 1 or evt.num = 2 and evt.len > 3").unwrap();
        match expr {
            Expr::Or(_, rhs) => assert!(matches!(*rhs, Expr::And(_, _))),
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_parentheses_and_not() {
        let expr = parse("not (evt.source = dummy or json.a.b exists)").unwrap();
        let Expr::Not(inner) = expr else {
            panic!("expected not");
        };
        assert!(matches!(*inner, Expr::Or(_, _)));
    }

    #[test]
    fn test_in_list() {
        let expr = parse("json.verb in (create, 'delete', 3)").unwrap();
        assert_eq!(
            expr,
            Expr::In {
                field: Field::Json(vec!["verb".into()]),
                values: vec![
                    Literal::Str("create".into()),
                    Literal::Str("delete".into()),
                    Literal::Num(3.0),
                ],
            }
        );
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("invalid!!syntax").is_err());
        assert!(parse("evt.unknown = 1").is_err());
        assert!(parse("evt.num = 1 evt.len = 2").is_err());
        assert!(parse("(evt.num = 1").is_err());
        assert!(parse("evt.num > abc").is_err());
        assert!(parse("json. = 1").is_err());
        assert!(parse("evt.num =").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let at_limit = format!(
            "{}evt.num = 1{}",
            "(".repeat(MAX_NESTING),
            ")".repeat(MAX_NESTING)
        );
        assert!(parse(&at_limit).is_ok());

        let deep = format!("{}evt.num = 1{}", "(".repeat(200_000), ")".repeat(200_000));
        let err = parse(&deep).unwrap_err();
        assert!(matches!(
            err,
            ContractError::FilterSyntax { position, .. } if position == MAX_NESTING + 1
        ));
        assert!(err.to_string().contains("nested too deeply"));

        let nots = format!("{}evt.num = 1", "not ".repeat(100_000));
        assert!(parse(&nots).unwrap_err().to_string().contains("nested too deeply"));
    }

    #[test]
    fn test_term_limit() {
        let chain = |n: usize| vec!["evt.num = 1"; n].join(" or ");
        assert!(parse(&chain(MAX_TERMS)).is_ok());

        let err = parse(&chain(50_000)).unwrap_err();
        assert!(err.to_string().contains("too many comparisons"));
    }

    #[test]
    fn test_error_position_points_at_unknown_field() {
        let err = parse("evt.num = 1 and bogus = 2").unwrap_err();
        assert!(matches!(err, ContractError::FilterSyntax { position: 16, .. }));
    }
}
