//! Input validation for the verification conversation
//!
//! Validation failures are local and recoverable: the conversation re-prompts
//! the same step and no attempt is consumed.

use crate::utils::errors::{MedGuardError, Result};

/// Validate a claimed full name: 3-100 characters, 2-4 whitespace-separated
/// tokens, each token alphabetic or hyphenated.
pub fn validate_full_name(full_name: &str) -> Result<()> {
    let trimmed = full_name.trim();

    if trimmed.chars().count() < 3 {
        return Err(MedGuardError::InvalidInput(
            "Full name must be at least 3 characters".to_string(),
        ));
    }

    if full_name.chars().count() > 100 {
        return Err(MedGuardError::InvalidInput(
            "Full name is too long (maximum 100 characters)".to_string(),
        ));
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() < 2 || words.len() > 4 {
        return Err(MedGuardError::InvalidInput(
            "Full name must contain 2-4 words (surname, given name, patronymic)".to_string(),
        ));
    }

    for word in &words {
        if !word.chars().all(|c| c.is_alphabetic() || c == '-') {
            return Err(MedGuardError::InvalidInput(
                "Full name may contain only letters and hyphens".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validate a workplace name: 3-200 characters, no structural constraint.
pub fn validate_workplace(workplace: &str) -> Result<()> {
    let trimmed = workplace.trim();

    if trimmed.chars().count() < 3 {
        return Err(MedGuardError::InvalidInput(
            "Workplace must be at least 3 characters".to_string(),
        ));
    }

    if workplace.chars().count() > 200 {
        return Err(MedGuardError::InvalidInput(
            "Workplace name is too long (maximum 200 characters)".to_string(),
        ));
    }

    Ok(())
}

/// Validate and normalize a website URL. A missing scheme gets `https://`
/// prefixed; the normalized form must parse, contain a dot and exceed ten
/// characters. Returns the normalized URL on success.
pub fn validate_website_url(input: &str) -> Result<String> {
    let trimmed = input.trim().to_lowercase();

    if trimmed.chars().count() < 5 {
        return Err(MedGuardError::InvalidInput("URL is too short".to_string()));
    }

    let normalized = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed
    } else {
        format!("https://{}", trimmed)
    };

    if !normalized.contains('.') || normalized.len() <= 10 {
        return Err(MedGuardError::InvalidInput("Invalid URL format".to_string()));
    }

    url::Url::parse(&normalized)?;

    Ok(normalized)
}

/// Validate an uploaded file size against the configured ceiling.
pub fn validate_file_size(file_size: u32, max_size_bytes: u32, max_size_mb: u32) -> Result<()> {
    if file_size > max_size_bytes {
        return Err(MedGuardError::InvalidInput(format!(
            "File is too large: {:.1} MB (maximum {} MB)",
            file_size as f64 / 1024.0 / 1024.0,
            max_size_mb
        )));
    }
    Ok(())
}

/// Validate a declared MIME type against the configured allow-list.
pub fn validate_file_type(mime_type: &str, allowed_types: &[String]) -> Result<()> {
    if !allowed_types.iter().any(|t| t == mime_type) {
        return Err(MedGuardError::InvalidInput(format!(
            "Unsupported file type {} (allowed: {})",
            mime_type,
            allowed_types.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_accepts_two_to_four_words() {
        assert!(validate_full_name("Ivanov Ivan").is_ok());
        assert!(validate_full_name("Ivanov Ivan Ivanovich").is_ok());
        assert!(validate_full_name("Petrova-Sidorova Anna Pavlovna Junior").is_ok());
    }

    #[test]
    fn test_full_name_rejects_bad_shapes() {
        assert!(validate_full_name("Ivanov").is_err());
        assert!(validate_full_name("One Two Three Four Five").is_err());
        assert!(validate_full_name("Iv4nov Ivan").is_err());
        assert!(validate_full_name("ab").is_err());
        assert!(validate_full_name(&"a ".repeat(60)).is_err());
    }

    #[test]
    fn test_full_name_allows_hyphens() {
        assert!(validate_full_name("Petrova-Vodkina Anna").is_ok());
    }

    #[test]
    fn test_workplace_bounds() {
        assert!(validate_workplace("City Hospital No. 1").is_ok());
        assert!(validate_workplace("ab").is_err());
        assert!(validate_workplace(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_url_scheme_prefixing() {
        assert_eq!(
            validate_website_url("hospital1.ru").unwrap(),
            "https://hospital1.ru"
        );
        assert_eq!(
            validate_website_url("https://cardio-institute.org").unwrap(),
            "https://cardio-institute.org"
        );
    }

    #[test]
    fn test_url_rejects_short_or_dotless() {
        assert!(validate_website_url("a.b").is_err());
        assert!(validate_website_url("nodots").is_err());
    }

    #[test]
    fn test_file_size_ceiling() {
        assert!(validate_file_size(1024, 20 * 1024 * 1024, 20).is_ok());
        assert!(validate_file_size(21 * 1024 * 1024, 20 * 1024 * 1024, 20).is_err());
    }

    #[test]
    fn test_file_type_allow_list() {
        let allowed = vec![
            "image/jpeg".to_string(),
            "image/png".to_string(),
            "application/pdf".to_string(),
        ];
        assert!(validate_file_type("image/png", &allowed).is_ok());
        assert!(validate_file_type("text/html", &allowed).is_err());
    }
}
