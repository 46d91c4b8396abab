//! Naming convention checks and conversions for declared names.

/// `PascalCase`: an uppercase letter followed by letters and digits.
pub(crate) fn is_pascal_case(s: &str) -> bool {
    !s.is_empty()
        && s.as_bytes()[0].is_ascii_uppercase()
        && s.as_bytes()[1..].iter().all(|&ch| ch.is_ascii_alphanumeric())
}

/// `lower_snake_case`: a lowercase letter followed by lowercase letters, digits and underscores.
pub(crate) fn is_lower_snake_case(s: &str) -> bool {
    !s.is_empty()
        && s.as_bytes()[0].is_ascii_lowercase()
        && s.as_bytes()[1..]
            .iter()
            .all(|&ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == b'_')
}

/// `UPPER_SNAKE_CASE`: an uppercase letter followed by uppercase letters, digits and underscores.
pub(crate) fn is_upper_snake_case(s: &str) -> bool {
    !s.is_empty()
        && s.as_bytes()[0].is_ascii_uppercase()
        && s.as_bytes()[1..]
            .iter()
            .all(|&ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == b'_')
}

pub(crate) fn to_pascal_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = true;

    for ch in name.chars() {
        if ch == '_' {
            uppercase_next = true
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

pub(crate) fn to_lower_snake_case(name: &str) -> String {
    words(name).join("_").to_ascii_lowercase()
}

pub(crate) fn to_upper_snake_case(name: &str) -> String {
    words(name).join("_").to_ascii_uppercase()
}

/// Splits a name at underscores and at lowercase-to-uppercase transitions.
///
/// A run of capitals followed by a lowercase letter ends one letter early, so `HTTPServer` splits
/// into `HTTP` and `Server`.
fn words(name: &str) -> Vec<&str> {
    let bytes = name.as_bytes();
    let mut words = Vec::new();
    let mut start = 0;

    for i in 0..bytes.len() {
        if bytes[i] == b'_' {
            if start < i {
                words.push(&name[start..i]);
            }
            start = i + 1;
            continue;
        }
        if i > start && bytes[i].is_ascii_uppercase() {
            let prev = bytes[i - 1];
            let next_is_lower = bytes.get(i + 1).is_some_and(|b| b.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                words.push(&name[start..i]);
                start = i;
            }
        }
    }
    if start < bytes.len() {
        words.push(&name[start..]);
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conventions() {
        assert!(is_pascal_case("UserProfile"));
        assert!(is_pascal_case("V2"));
        assert!(!is_pascal_case("userProfile"));
        assert!(!is_pascal_case("User_Profile"));
        assert!(!is_pascal_case(""));

        assert!(is_lower_snake_case("user_id"));
        assert!(is_lower_snake_case("address2"));
        assert!(!is_lower_snake_case("userId"));
        assert!(!is_lower_snake_case("_private"));

        assert!(is_upper_snake_case("STATUS_OK"));
        assert!(!is_upper_snake_case("StatusOk"));
        assert!(!is_upper_snake_case("status_ok"));
    }

    #[test]
    fn conversions() {
        assert_eq!(to_pascal_case("user_profile"), "UserProfile");
        assert_eq!(to_pascal_case("userProfile"), "UserProfile");

        assert_eq!(to_lower_snake_case("userId"), "user_id");
        assert_eq!(to_lower_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_lower_snake_case("Already_Snake"), "already_snake");
        assert_eq!(to_lower_snake_case("__x__y"), "x_y");

        assert_eq!(to_upper_snake_case("statusOk"), "STATUS_OK");
        assert_eq!(to_upper_snake_case("StatusOK"), "STATUS_OK");
        assert_eq!(to_upper_snake_case("v2Value"), "V2_VALUE");
    }
}
