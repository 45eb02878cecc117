/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Masks all but the last four characters of an account number so that it can be written to logs.
pub fn mask_account_number(account: &str) -> String {
    let account = account.trim();
    let visible = account.len().saturating_sub(4);
    account.chars().enumerate().map(|(i, c)| if i < visible { '*' } else { c }).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("Yes".into()), false));
        assert!(!parse_boolean_flag(Some(" off ".into()), true));
        assert!(parse_boolean_flag(Some("maybe".into()), true));
        assert!(!parse_boolean_flag(None, false));
    }

    #[test]
    fn masked_accounts() {
        assert_eq!(mask_account_number("123456789"), "*****6789");
        assert_eq!(mask_account_number(" 12 "), "12");
        assert_eq!(mask_account_number(""), "");
    }
}
