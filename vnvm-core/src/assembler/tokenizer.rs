//! Line tokenizer: whitespace-separated, shell-like tokens with
//! double-quoted strings and `;`-to-end-of-line comments.

/// Split one source line into tokens, stopping at an unquoted `;`.
pub fn tokenize_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        match chars.peek() {
            None => break,
            Some(';') => break,
            Some('"') => {
                chars.next();
                let mut token = String::new();
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    token.push(c);
                }
                tokens.push(token);
            }
            Some(_) => {
                let mut token = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == ';' {
                        break;
                    }
                    token.push(c);
                    chars.next();
                }
                tokens.push(token);
            }
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(tokenize_line("set i0 7"), vec!["set", "i0", "7"]);
    }

    #[test]
    fn keeps_quoted_strings_together() {
        assert_eq!(tokenize_line(r#"fire "go home""#), vec!["fire", "go home"]);
    }

    #[test]
    fn stops_at_unquoted_semicolon() {
        assert_eq!(tokenize_line("set i0 7 ; comment here"), vec!["set", "i0", "7"]);
    }

    #[test]
    fn semicolon_inside_quotes_is_not_a_comment() {
        assert_eq!(tokenize_line(r#"say i0 "a;b""#), vec!["say", "i0", "a;b"]);
    }

    #[test]
    fn blank_line_is_no_tokens() {
        assert!(tokenize_line("   ").is_empty());
    }
}
