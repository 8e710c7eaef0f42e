//! Validation utilities shared by the server and the browser client

// ============================================================================
// Catalogue Validations
// ============================================================================

/// Validate SKU code format: 1-50 characters, letters, digits, `-`, `_` or `.`
pub fn validate_sku_code(code: &str) -> Result<(), &'static str> {
    if code.trim().is_empty() {
        return Err("SKU code is required");
    }
    if code.chars().count() > 50 {
        return Err("SKU code must be at most 50 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("SKU code may only contain letters, digits, '-', '_' and '.'");
    }
    Ok(())
}

/// Validate a required, trimmed, length-bounded text field
pub fn validate_required_text(value: &str, max_chars: usize) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("Value is required");
    }
    if value.chars().count() > max_chars {
        return Err("Value is too long");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email format");
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err("Invalid email format");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

/// Trim text and turn blank strings into `None`
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku_code() {
        assert!(validate_sku_code("COF-001").is_ok());
        assert!(validate_sku_code("a.b_c").is_ok());
        assert!(validate_sku_code("").is_err());
        assert!(validate_sku_code("has space").is_err());
        assert!(validate_sku_code(&"X".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_required_text() {
        assert!(validate_required_text("Beans", 255).is_ok());
        assert!(validate_required_text("   ", 255).is_err());
        assert!(validate_required_text("abcdef", 5).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ops@example.com").is_ok());
        assert!(validate_email("no-at-sign.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ops@localhost").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional(Some("  tea ".into())), Some("tea".into()));
        assert_eq!(normalize_optional(Some("   ".into())), None);
        assert_eq!(normalize_optional(None), None);
    }
}
