use super::AuthToken;

/// Parse a boolean value from a string, supporting multiple formats
///
/// Accepts: "true", "false", "1", "0", "yes", "no" (case insensitive)
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse a comma separated list, dropping empty entries
pub fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Parse `AUTH_TOKENS` style values: `name:token,name:token`
///
/// An entry without a colon is a bare token and gets its position as a name.
pub fn parse_auth_tokens(s: &str) -> Vec<AuthToken> {
    parse_list(s)
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| match entry.split_once(':') {
            Some((name, token)) => AuthToken {
                token: token.trim().to_string(),
                name: name.trim().to_string(),
            },
            None => AuthToken {
                token: entry,
                name: format!("token-{idx}"),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_variants() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("Yes"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_variants() {
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("NO"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid() {
        assert_eq!(parse_bool("invalid"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_parse_list_trims_and_skips_empty() {
        assert_eq!(
            parse_list(" a, b ,,c "),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_parse_auth_tokens_named_and_bare() {
        let tokens = parse_auth_tokens("kitchen:abc123, deadbeef");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].name, "kitchen");
        assert_eq!(tokens[0].token, "abc123");
        assert_eq!(tokens[1].name, "token-1");
        assert_eq!(tokens[1].token, "deadbeef");
    }
}
