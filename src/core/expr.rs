//! Address expressions
//!
//! Numbers, symbol names, `+ - * / %`, unary minus and parentheses.
//! Arithmetic wraps at the width of [`Address`].

use super::{symbols::SymbolTable, Address};
use crate::prelude::{Error, FdResult};

/// Deepest nesting of parentheses and unary signs
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(Address),
    Ident(String),
    Op(char),
    Open,
    Close,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.' || c == '$'
}

fn is_ident(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

fn parse_number(text: &str) -> FdResult<Address> {
    let (digits, radix) = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (hex, 16)
    } else if let Some(bin) = text
        .strip_prefix("0b")
        .or_else(|| text.strip_prefix("0B"))
    {
        (bin, 2)
    } else {
        (text, 10)
    };
    Address::from_str_radix(digits, radix)
        .map_err(|_| Error::Expression(format!("bad number: {}", text)))
}

fn tokenize(text: &str) -> FdResult<Vec<Token>> {
    let mut tokens = vec![];
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_digit() || is_ident_start(c) {
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if !is_ident(c) {
                    break;
                }
                end = i + c.len_utf8();
                chars.next();
            }
            let word = &text[start..end];
            tokens.push(if c.is_ascii_digit() {
                Token::Number(parse_number(word)?)
            } else {
                Token::Ident(word.to_owned())
            });
            continue;
        }

        tokens.push(match c {
            '+' | '-' | '*' | '/' | '%' => Token::Op(c),
            '(' => Token::Open,
            ')' => Token::Close,
            _ => return Err(Error::Expression(format!("unexpected character: {}", c))),
        });
        chars.next();
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    stab: &'a SymbolTable,
}

impl Parser<'_> {
    fn peek_op(&self) -> Option<char> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn nested(&mut self, f: fn(&mut Self) -> FdResult<Address>) -> FdResult<Address> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::Expression("expression nested too deeply".into()));
        }
        self.depth += 1;
        let value = f(self);
        self.depth -= 1;
        value
    }

    fn sum(&mut self) -> FdResult<Address> {
        let mut value = self.product()?;
        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.pos += 1;
            let rhs = self.product()?;
            value = if op == '+' {
                value.wrapping_add(rhs)
            } else {
                value.wrapping_sub(rhs)
            };
        }
        Ok(value)
    }

    fn product(&mut self) -> FdResult<Address> {
        let mut value = self.unary()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek_op() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                '*' => value.wrapping_mul(rhs),
                '/' => value.checked_div(rhs).ok_or(Error::DivisionByZero)?,
                _ => value.checked_rem(rhs).ok_or(Error::DivisionByZero)?,
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> FdResult<Address> {
        match self.peek_op() {
            Some('-') => {
                self.pos += 1;
                Ok(self.nested(Self::unary)?.wrapping_neg())
            }
            Some('+') => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> FdResult<Address> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| Error::Expression("unexpected end of expression".into()))?;
        self.pos += 1;

        match token {
            Token::Number(value) => Ok(*value),
            Token::Ident(name) => self
                .stab
                .get(name)
                .ok_or_else(|| Error::SymbolNotFound(name.clone())),
            Token::Open => {
                let value = self.nested(Self::sum)?;
                match self.tokens.get(self.pos) {
                    Some(Token::Close) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err(Error::Expression("expected )".into())),
                }
            }
            Token::Op(op) => Err(Error::Expression(format!("unexpected operator: {}", op))),
            Token::Close => Err(Error::Expression("unexpected )".into())),
        }
    }
}

/// Evaluate `text`, resolving bare names through `stab`
pub fn evaluate(stab: &SymbolTable, text: &str) -> FdResult<Address> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(Error::Expression("empty expression".into()));
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        stab,
    };
    let value = parser.sum()?;
    if parser.pos != tokens.len() {
        return Err(Error::Expression(format!("trailing input in: {}", text)));
    }
    Ok(value)
}

#[cfg(test)]
mod test {
    use super::evaluate;
    use crate::core::symbols::SymbolTable;
    use crate::prelude::Error;

    fn stab() -> SymbolTable {
        let mut stab = SymbolTable::new();
        stab.set("main", 0x4400).unwrap();
        stab.set("__stack", 0x0a00).unwrap();
        stab.set(".L1", 0x10).unwrap();
        stab
    }

    #[test]
    fn numbers() {
        let stab = stab();
        assert_eq!(42, evaluate(&stab, "42").unwrap());
        assert_eq!(0xff00, evaluate(&stab, "0xff00").unwrap());
        assert_eq!(0xab, evaluate(&stab, "0XaB").unwrap());
        assert_eq!(5, evaluate(&stab, "0b101").unwrap());
    }

    #[test]
    fn symbols() {
        let stab = stab();
        assert_eq!(0x4400, evaluate(&stab, "main").unwrap());
        assert_eq!(0x4404, evaluate(&stab, "main + 4").unwrap());
        assert_eq!(0x0a00 - 2, evaluate(&stab, "__stack-2").unwrap());
        assert_eq!(0x20, evaluate(&stab, ".L1*2").unwrap());
    }

    #[test]
    fn precedence() {
        let stab = stab();
        assert_eq!(14, evaluate(&stab, "2 + 3 * 4").unwrap());
        assert_eq!(20, evaluate(&stab, "(2 + 3) * 4").unwrap());
        assert_eq!(1, evaluate(&stab, "10 % 3").unwrap());
        assert_eq!(3, evaluate(&stab, "-2 + 5").unwrap());
        assert_eq!(7, evaluate(&stab, "10 - 2 - 1").unwrap());
    }

    #[test]
    fn wraps() {
        let stab = stab();
        assert_eq!(u64::MAX, evaluate(&stab, "0 - 1").unwrap());
        assert_eq!(u64::MAX, evaluate(&stab, "-1").unwrap());
    }

    #[test]
    fn unknown_symbol() {
        let stab = stab();
        let err = evaluate(&stab, "main + nope").unwrap_err();
        assert!(matches!(err, Error::SymbolNotFound(name) if name == "nope"));
    }

    #[test]
    fn errors() {
        let stab = stab();
        assert!(matches!(evaluate(&stab, "4 / 0"), Err(Error::DivisionByZero)));
        assert!(matches!(evaluate(&stab, "4 % 0"), Err(Error::DivisionByZero)));
        assert!(matches!(evaluate(&stab, ""), Err(Error::Expression(_))));
        assert!(matches!(evaluate(&stab, "(1 + 2"), Err(Error::Expression(_))));
        assert!(matches!(evaluate(&stab, "1 2"), Err(Error::Expression(_))));
        assert!(matches!(evaluate(&stab, "1 +"), Err(Error::Expression(_))));
        assert!(matches!(evaluate(&stab, "1 @ 2"), Err(Error::Expression(_))));
        assert!(matches!(evaluate(&stab, "0xzz"), Err(Error::Expression(_))));
    }

    #[test]
    fn nesting_is_bounded() {
        let stab = stab();
        let deep = format!("{}1{}", "(".repeat(10000), ")".repeat(10000));
        assert!(matches!(evaluate(&stab, &deep), Err(Error::Expression(_))));
        let signs = format!("{}1", "-".repeat(10000));
        assert!(matches!(evaluate(&stab, &signs), Err(Error::Expression(_))));

        let shallow = format!("{}main{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(0x4400, evaluate(&stab, &shallow).unwrap());
        assert_eq!(0x4400, evaluate(&stab, "--main").unwrap());
    }
}
