use std::convert::TryInto;

use logos::{Lexer, Logos};

/// Tokens of protobuf constant expressions, as found in option values and field numbers.
#[derive(Debug, Clone, Logos, PartialEq)]
#[logos(skip r"[\t\n\v\f\r ]+")]
#[logos(subpattern exponent = r"[eE][+\-]?[0-9]+")]
pub(crate) enum Token<'a> {
    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'a str),
    #[regex("0", |_| 0u64)]
    #[regex("0[0-7]+", |lex| int(lex, 8, 1))]
    #[regex("[1-9][0-9]*", |lex| int(lex, 10, 0))]
    #[regex("0[xX][0-9A-Fa-f]+", |lex| int(lex, 16, 2))]
    IntLiteral(u64),
    #[regex(r#"[0-9]+\.[0-9]*(?&exponent)?"#, float)]
    #[regex(r#"[0-9]+(?&exponent)"#, float)]
    #[regex(r#"\.[0-9]+(?&exponent)?"#, float)]
    FloatLiteral(f64),
    #[regex(r#"'|""#, string)]
    StringLiteral(String),
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("<")]
    LeftAngleBracket,
    #[token(">")]
    RightAngleBracket,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
}

fn int<'a>(lex: &mut Lexer<'a, Token<'a>>, radix: u32, prefix_len: usize) -> Option<u64> {
    debug_assert!(lex.slice().len() > prefix_len);
    u64::from_str_radix(&lex.slice()[prefix_len..], radix).ok()
}

fn float<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn string<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Option<String> {
    #[derive(Logos)]
    #[logos(subpattern hex = r"[0-9A-Fa-f]")]
    enum Component<'a> {
        #[regex(r#"[^\x00\n\\'"]+"#)]
        Unescaped(&'a str),
        #[regex(r#"['"]"#, terminator)]
        Terminator(u8),
        #[regex(r#"\\[xX](?&hex)(?&hex)?"#, hex_escape)]
        #[regex(r#"\\[0-7][0-7]?[0-7]?"#, oct_escape)]
        #[regex(r#"\\[abfnrtv?\\'"]"#, char_escape)]
        Byte(u8),
        #[regex(r#"\\u(?&hex)(?&hex)(?&hex)(?&hex)"#, unicode_escape)]
        #[regex(
            r#"\\U(?&hex)(?&hex)(?&hex)(?&hex)(?&hex)(?&hex)(?&hex)(?&hex)"#,
            unicode_escape
        )]
        Char(char),
    }

    fn terminator<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Option<u8> {
        lex.slice().bytes().next()
    }

    fn hex_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Option<u8> {
        u32::from_str_radix(&lex.slice()[2..], 16)
            .ok()?
            .try_into()
            .ok()
    }

    fn oct_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Option<u8> {
        u32::from_str_radix(&lex.slice()[1..], 8)
            .ok()?
            .try_into()
            .ok()
    }

    fn char_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Option<u8> {
        match lex.slice().as_bytes()[1] {
            b'a' => Some(b'\x07'),
            b'b' => Some(b'\x08'),
            b'f' => Some(b'\x0c'),
            b'n' => Some(b'\n'),
            b'r' => Some(b'\r'),
            b't' => Some(b'\t'),
            b'v' => Some(b'\x0b'),
            b'?' => Some(b'?'),
            b'\\' => Some(b'\\'),
            b'\'' => Some(b'\''),
            b'"' => Some(b'"'),
            _ => None,
        }
    }

    fn unicode_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Option<char> {
        let value = u32::from_str_radix(&lex.slice()[2..], 16).ok()?;
        char::from_u32(value)
    }

    let mut result = Vec::new();
    let mut char_lexer = Component::lexer(lex.remainder());
    let terminator = lex.slice().as_bytes()[0];

    let terminated = loop {
        match char_lexer.next() {
            Some(Ok(Component::Unescaped(s))) => result.extend_from_slice(s.as_bytes()),
            Some(Ok(Component::Terminator(t))) if t == terminator => break true,
            Some(Ok(Component::Terminator(ch) | Component::Byte(ch))) => result.push(ch),
            Some(Ok(Component::Char(ch))) => {
                let mut buf = [0; 4];
                result.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            // An invalid escape keeps the escaped character, matching protoc's recovery.
            Some(Err(())) if char_lexer.slice().starts_with('\\') => {
                result.extend_from_slice(char_lexer.slice()[1..].as_bytes())
            }
            Some(Err(())) | None => break false,
        }
    };

    let consumed = char_lexer.span().end;
    lex.bump(consumed);

    if terminated {
        Some(String::from_utf8_lossy(&result).into_owned())
    } else {
        None
    }
}
