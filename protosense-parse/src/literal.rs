//! Interpretation of numeric literals and option values.

use logos::Logos;

use crate::{ast::OptionValue, lex::Token};

/// Parses an integer literal with an optional sign, in decimal, octal or hexadecimal.
///
/// Returns `None` if the text is not a single integer or does not fit in an `i64`.
pub(crate) fn parse_int(text: &str) -> Option<i64> {
    let tokens = lex(text)?;
    let (negative, rest) = split_sign(&tokens);

    match rest {
        [Token::IntLiteral(value)] => {
            let value = i128::from(*value);
            i64::try_from(if negative { -value } else { value }).ok()
        }
        _ => None,
    }
}

/// Interprets the text of an option value.
///
/// Never fails: text which is not a recognizable constant becomes [`OptionValue::Other`].
pub(crate) fn parse_constant(text: &str) -> OptionValue {
    let text = text.trim();
    if text.starts_with('{') {
        return OptionValue::Aggregate(text.to_owned());
    }

    let tokens = match lex(text) {
        Some(tokens) if !tokens.is_empty() => tokens,
        _ => return OptionValue::Other(text.to_owned()),
    };

    if let Some(value) = concatenated_string(&tokens) {
        return OptionValue::String(value);
    }

    let (negative, rest) = split_sign(&tokens);
    let sign = if negative { -1.0 } else { 1.0 };
    match rest {
        [Token::IntLiteral(value)] => {
            let value = i128::from(*value);
            let value = if negative { -value } else { value };
            match i64::try_from(value) {
                Ok(value) => OptionValue::Int(value),
                Err(_) => OptionValue::Float(value as f64),
            }
        }
        [Token::FloatLiteral(value)] => OptionValue::Float(sign * value),
        [Token::Ident(ident)] if ident.eq_ignore_ascii_case("inf") => {
            OptionValue::Float(sign * f64::INFINITY)
        }
        [Token::Ident(ident)] if ident.eq_ignore_ascii_case("infinity") => {
            OptionValue::Float(sign * f64::INFINITY)
        }
        [Token::Ident(ident)] if ident.eq_ignore_ascii_case("nan") => OptionValue::Float(f64::NAN),
        [Token::Ident("true")] if tokens.len() == 1 => OptionValue::Bool(true),
        [Token::Ident("false")] if tokens.len() == 1 => OptionValue::Bool(false),
        _ if tokens.len() == rest.len() => match dotted_ident(rest) {
            Some(ident) => OptionValue::Identifier(ident),
            None => OptionValue::Other(text.to_owned()),
        },
        _ => OptionValue::Other(text.to_owned()),
    }
}

fn lex(text: &str) -> Option<Vec<Token<'_>>> {
    Token::lexer(text).collect::<Result<Vec<_>, ()>>().ok()
}

fn split_sign<'t, 'a>(tokens: &'t [Token<'a>]) -> (bool, &'t [Token<'a>]) {
    match tokens {
        [Token::Minus, rest @ ..] => (true, rest),
        [Token::Plus, rest @ ..] => (false, rest),
        _ => (false, tokens),
    }
}

/// Adjacent string literals are concatenated, as in C.
fn concatenated_string(tokens: &[Token<'_>]) -> Option<String> {
    let mut result = String::new();
    for token in tokens {
        match token {
            Token::StringLiteral(value) => result.push_str(value),
            _ => return None,
        }
    }
    Some(result)
}

fn dotted_ident(tokens: &[Token<'_>]) -> Option<String> {
    let mut result = String::new();
    let mut expect_ident = true;
    for (index, token) in tokens.iter().enumerate() {
        match token {
            Token::Dot if index == 0 || !expect_ident => {
                result.push('.');
                expect_ident = true;
            }
            Token::Ident(ident) if expect_ident => {
                result.push_str(ident);
                expect_ident = false;
            }
            _ => return None,
        }
    }

    if expect_ident {
        None
    } else {
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(parse_int("1"), Some(1));
        assert_eq!(parse_int("0x10"), Some(16));
        assert_eq!(parse_int("0X1f"), Some(31));
        assert_eq!(parse_int("-0x10"), Some(-16));
        assert_eq!(parse_int("- 5"), Some(-5));
        assert_eq!(parse_int("+7"), Some(7));
        assert_eq!(parse_int("010"), Some(8));
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_int("9223372036854775808"), None);
        assert_eq!(parse_int("1.5"), None);
        assert_eq!(parse_int("foo"), None);
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("1 2"), None);
    }

    #[test]
    fn strings() {
        assert_eq!(
            parse_constant(r#""foo" "bar""#),
            OptionValue::String("foobar".to_owned())
        );
        assert_eq!(
            parse_constant("'single' \"double\""),
            OptionValue::String("singledouble".to_owned())
        );
        assert_eq!(
            parse_constant(r#""a\nb""#),
            OptionValue::String("a\nb".to_owned())
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_constant("42"), OptionValue::Int(42));
        assert_eq!(parse_constant("-0x10"), OptionValue::Int(-16));
        assert_eq!(parse_constant("1.5"), OptionValue::Float(1.5));
        assert_eq!(parse_constant(".5"), OptionValue::Float(0.5));
        assert_eq!(parse_constant("-1e3"), OptionValue::Float(-1000.0));
        assert_eq!(parse_constant("inf"), OptionValue::Float(f64::INFINITY));
        assert_eq!(parse_constant("+inf"), OptionValue::Float(f64::INFINITY));
        assert_eq!(parse_constant("-inf"), OptionValue::Float(f64::NEG_INFINITY));
        assert!(matches!(parse_constant("nan"), OptionValue::Float(v) if v.is_nan()));
        assert_eq!(
            parse_constant("18446744073709551615"),
            OptionValue::Float(18446744073709551615.0)
        );
    }

    #[test]
    fn identifiers_and_bools() {
        assert_eq!(parse_constant("true"), OptionValue::Bool(true));
        assert_eq!(parse_constant("false"), OptionValue::Bool(false));
        assert_eq!(
            parse_constant("SPEED"),
            OptionValue::Identifier("SPEED".to_owned())
        );
        assert_eq!(
            parse_constant("foo.Bar"),
            OptionValue::Identifier("foo.Bar".to_owned())
        );
        assert_eq!(parse_constant("-true"), OptionValue::Other("-true".to_owned()));
        assert_eq!(parse_constant("foo."), OptionValue::Other("foo.".to_owned()));
    }

    #[test]
    fn aggregates_and_garbage() {
        assert_eq!(
            parse_constant("{ a: 1 b: \"x\" }"),
            OptionValue::Aggregate("{ a: 1 b: \"x\" }".to_owned())
        );
        assert_eq!(parse_constant(""), OptionValue::Other(String::new()));
        assert_eq!(parse_constant("\"open"), OptionValue::Other("\"open".to_owned()));
        assert_eq!(parse_constant("1 2"), OptionValue::Other("1 2".to_owned()));
    }
}
