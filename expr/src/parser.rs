//! Recursive-descent parser implementing spec 4.3.2's precedence ladder,
//! lowest to highest: ternary, or, and, `|`, `^`, `&`, equality,
//! relational, shift, additive, multiplicative, unary, postfix, primary.

use crate::ast::{BinOp, Expr, UnOp};
use crate::lexer::{Lexer, Spanned, Tok};
use binfmt_error::Error;

pub fn parse(src: &str) -> Result<Expr, Error> {
    let toks = Lexer::tokenize(src)?;
    let mut parser = Parser { toks, i: 0 };
    let expr = parser.ternary()?;
    if parser.peek().tok != Tok::Eof {
        return Err(Error::parse_at(
            format!("unexpected trailing token {:?}", parser.peek().tok),
            parser.peek().pos,
        ));
    }
    Ok(expr)
}

struct Parser {
    toks: Vec<Spanned>,
    i: usize,
}

impl Parser {
    fn peek(&self) -> &Spanned {
        &self.toks[self.i]
    }

    fn bump(&mut self) -> Spanned {
        let t = self.toks[self.i].clone();
        if self.i + 1 < self.toks.len() {
            self.i += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Tok) -> Option<Spanned> {
        if &self.peek().tok == tok {
            Some(self.bump())
        } else {
            None
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<Spanned, Error> {
        self.eat(&tok)
            .ok_or_else(|| Error::parse_at(format!("expected {what}"), self.peek().pos))
    }

    // 1. ternary (right-associative)
    fn ternary(&mut self) -> Result<Expr, Error> {
        let cond = self.logical_or()?;
        if self.eat(&Tok::Question).is_some() {
            let then_branch = self.ternary()?;
            self.expect(Tok::Colon, "`:` in ternary expression")?;
            let else_branch = self.ternary()?;
            Ok(Expr::Ternary(Box::new(cond), Box::new(then_branch), Box::new(else_branch)))
        } else {
            Ok(cond)
        }
    }

    // 2. or
    fn logical_or(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.logical_and()?;
        while self.eat(&Tok::Or).is_some() {
            let rhs = self.logical_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // 3. and
    fn logical_and(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.bitor()?;
        while self.eat(&Tok::And).is_some() {
            let rhs = self.bitor()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // 4. |
    fn bitor(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.bitxor()?;
        while self.eat(&Tok::Pipe).is_some() {
            let rhs = self.bitxor()?;
            lhs = Expr::Binary(BinOp::BitOr, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // 5. ^
    fn bitxor(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.bitand()?;
        while self.eat(&Tok::Caret).is_some() {
            let rhs = self.bitand()?;
            lhs = Expr::Binary(BinOp::BitXor, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // 6. &
    fn bitand(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.equality()?;
        while self.eat(&Tok::Amp).is_some() {
            let rhs = self.equality()?;
            lhs = Expr::Binary(BinOp::BitAnd, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // 7. == !=
    fn equality(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.relational()?;
        loop {
            let op = if self.eat(&Tok::EqEq).is_some() {
                BinOp::Eq
            } else if self.eat(&Tok::Ne).is_some() {
                BinOp::Ne
            } else {
                break;
            };
            let rhs = self.relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // 8. < <= > >=
    fn relational(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.shift()?;
        loop {
            let op = if self.eat(&Tok::Lt).is_some() {
                BinOp::Lt
            } else if self.eat(&Tok::Le).is_some() {
                BinOp::Le
            } else if self.eat(&Tok::Gt).is_some() {
                BinOp::Gt
            } else if self.eat(&Tok::Ge).is_some() {
                BinOp::Ge
            } else {
                break;
            };
            let rhs = self.shift()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // 9. << >>
    fn shift(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.additive()?;
        loop {
            let op = if self.eat(&Tok::Shl).is_some() {
                BinOp::Shl
            } else if self.eat(&Tok::Shr).is_some() {
                BinOp::Shr
            } else {
                break;
            };
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // 10. + -
    fn additive(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = if self.eat(&Tok::Plus).is_some() {
                BinOp::Add
            } else if self.eat(&Tok::Minus).is_some() {
                BinOp::Sub
            } else {
                break;
            };
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // 11. * / %
    fn multiplicative(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(&Tok::Star).is_some() {
                BinOp::Mul
            } else if self.eat(&Tok::Slash).is_some() {
                BinOp::Div
            } else if self.eat(&Tok::Percent).is_some() {
                BinOp::Mod
            } else {
                break;
            };
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // 12. unary - not
    fn unary(&mut self) -> Result<Expr, Error> {
        if self.eat(&Tok::Minus).is_some() {
            return Ok(Expr::Unary(UnOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat(&Tok::Not).is_some() {
            return Ok(Expr::Unary(UnOp::Not, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    // 13. postfix: .name, [expr], .name(args)
    fn postfix(&mut self) -> Result<Expr, Error> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Tok::Dot).is_some() {
                let name = self.ident_name()?;
                if self.eat(&Tok::LParen).is_some() {
                    let args = self.call_args()?;
                    expr = Expr::MethodCall(Box::new(expr), name, args);
                } else {
                    expr = Expr::Member(Box::new(expr), name);
                }
            } else if self.eat(&Tok::LBracket).is_some() {
                let idx = self.ternary()?;
                self.expect(Tok::RBracket, "`]`")?;
                expr = Expr::Index(Box::new(expr), Box::new(idx));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, Error> {
        let mut args = Vec::new();
        if self.eat(&Tok::RParen).is_some() {
            return Ok(args);
        }
        loop {
            args.push(self.ternary()?);
            if self.eat(&Tok::Comma).is_some() {
                continue;
            }
            self.expect(Tok::RParen, "`)`")?;
            break;
        }
        Ok(args)
    }

    fn ident_name(&mut self) -> Result<String, Error> {
        match self.bump().tok {
            Tok::Ident(name) => Ok(name),
            other => Err(Error::parse(format!("expected identifier, found {other:?}"))),
        }
    }

    // 14. primary: literal, identifier, Name::member, (expr)
    fn primary(&mut self) -> Result<Expr, Error> {
        let tok = self.bump();
        match tok.tok {
            Tok::Int(n) => Ok(Expr::Int(n)),
            Tok::Float(f) => Ok(Expr::Float(f)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::Bool(b) => Ok(Expr::Bool(b)),
            Tok::Ident(name) => {
                if self.eat(&Tok::ColonColon).is_some() {
                    let member = self.ident_name()?;
                    Ok(Expr::EnumAccess(name, member))
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            Tok::LParen => {
                let inner = self.ternary()?;
                self.expect(Tok::RParen, "`)`")?;
                Ok(inner)
            }
            other => Err(Error::parse_at(format!("unexpected token {other:?}"), tok.pos)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_precedence_correctly() {
        // `1 + 2 * 3` should parse as `1 + (2 * 3)`, not `(1 + 2) * 3`.
        let e = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            e,
            Expr::Binary(
                BinOp::Add,
                Box::new(Expr::Int(1)),
                Box::new(Expr::Binary(BinOp::Mul, Box::new(Expr::Int(2)), Box::new(Expr::Int(3))))
            )
        );
    }

    #[test]
    fn ternary_is_right_associative() {
        let e = parse("a ? b : c ? d : e").unwrap();
        // a ? b : (c ? d : e)
        match e {
            Expr::Ternary(_, _, else_branch) => {
                assert!(matches!(*else_branch, Expr::Ternary(..)));
            }
            _ => panic!("expected ternary"),
        }
    }

    #[test]
    fn parses_enum_scope_access() {
        let e = parse("Foo::bar").unwrap();
        assert_eq!(e, Expr::EnumAccess("Foo".into(), "bar".into()));
    }

    #[test]
    fn method_call_only_after_member_access() {
        let e = parse("x.length").unwrap();
        assert_eq!(e, Expr::Member(Box::new(Expr::Ident("x".into())), "length".into()));

        let e = parse("x.to_i()").unwrap();
        assert_eq!(
            e,
            Expr::MethodCall(Box::new(Expr::Ident("x".into())), "to_i".into(), vec![])
        );
    }

    #[test]
    fn trailing_token_is_an_error() {
        assert!(parse("1 + 1 2").is_err());
    }

    #[test]
    fn parses_index_access() {
        let e = parse("a[0]").unwrap();
        assert_eq!(e, Expr::Index(Box::new(Expr::Ident("a".into())), Box::new(Expr::Int(0))));
    }
}
