//! Free-text field validation.
//!
//! Pure functions: each rule trims the raw input and either returns the
//! normalized value or a rejection message the engine shows to the user.
//! Phone numbers use the strict Russian mobile format (`+7` or `8` followed
//! by 10 digits); the permissive `^\+?\d+$` variant is deliberately not
//! supported.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;

static TAX_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$|^\d{12}$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\+7|8)\d{10}$").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// Free-text fields the questionnaire collects, each with its own rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    CompanyName,
    /// Optional: empty is accepted, otherwise exactly 10 or 12 digits.
    TaxId,
    /// Exactly three whitespace-separated tokens, each at least 2 chars.
    FullName,
    Position,
    Phone,
    Email,
    /// Free-form answer text, any non-empty input.
    FreeText,
}

impl Field {
    /// Validates `input` against this field's rule, returning the trimmed
    /// normalized value or a user-facing rejection message.
    pub fn validate(self, input: &str) -> Result<String, ValidationError> {
        let value = input.trim();
        match self {
            Field::CompanyName => {
                if value.is_empty() {
                    return Err(ValidationError::new(
                        "Пожалуйста, введите непустое название компании.",
                    ));
                }
            }
            Field::TaxId => {
                if !value.is_empty() && !TAX_ID_RE.is_match(value) {
                    return Err(ValidationError::new(
                        "Пожалуйста, введите ИНН из 10 или 12 цифр.",
                    ));
                }
            }
            Field::FullName => {
                let words: Vec<&str> = value.split_whitespace().collect();
                if words.len() != 3 || words.iter().any(|w| w.chars().count() < 2) {
                    return Err(ValidationError::new(
                        "Пожалуйста, введите ФИО полностью (фамилия, имя, отчество, каждое не короче 2 символов).",
                    ));
                }
            }
            Field::Position => {
                if value.chars().count() < 3 {
                    return Err(ValidationError::new(
                        "Пожалуйста, введите должность (не менее 3 символов).",
                    ));
                }
            }
            Field::Phone => {
                if !PHONE_RE.is_match(value) {
                    return Err(ValidationError::new(
                        "Пожалуйста, введите телефон в формате +7 или 8, за которыми следуют 10 цифр (например, +79991234567).",
                    ));
                }
            }
            Field::Email => {
                if !EMAIL_RE.is_match(value) {
                    return Err(ValidationError::new(
                        "Пожалуйста, введите корректный email (например, user@domain.com).",
                    ));
                }
            }
            Field::FreeText => {
                if value.is_empty() {
                    return Err(ValidationError::new("Пожалуйста, введите непустой ответ."));
                }
            }
        }
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_name_rejects_whitespace_only() {
        assert!(Field::CompanyName.validate("   ").is_err());
        assert_eq!(
            Field::CompanyName.validate("  Acme LLC ").unwrap(),
            "Acme LLC"
        );
    }

    #[test]
    fn tax_id_is_optional_or_10_or_12_digits() {
        assert_eq!(Field::TaxId.validate("").unwrap(), "");
        assert_eq!(Field::TaxId.validate("1234567890").unwrap(), "1234567890");
        assert_eq!(
            Field::TaxId.validate("123456789012").unwrap(),
            "123456789012"
        );
        assert!(Field::TaxId.validate("123").is_err());
        assert!(Field::TaxId.validate("12345678901").is_err());
        assert!(Field::TaxId.validate("12345abc90").is_err());
    }

    #[test]
    fn full_name_requires_three_words_of_two_chars() {
        assert!(Field::FullName.validate("John").is_err());
        assert!(Field::FullName.validate("Иванов И Иванович").is_err());
        assert_eq!(
            Field::FullName.validate("Иванов Иван Иванович").unwrap(),
            "Иванов Иван Иванович"
        );
    }

    #[test]
    fn position_needs_three_chars() {
        assert!(Field::Position.validate("IT").is_err());
        assert!(Field::Position.validate("CTO").is_ok());
    }

    #[test]
    fn phone_is_strict_russian_mobile() {
        assert!(Field::Phone.validate("12345").is_err());
        assert!(Field::Phone.validate("+7999123456").is_err());
        assert!(Field::Phone.validate("+79991234567").is_ok());
        assert!(Field::Phone.validate("89991234567").is_ok());
    }

    #[test]
    fn email_needs_domain_with_tld() {
        assert!(Field::Email.validate("user@domain").is_err());
        assert!(Field::Email.validate("not-an-email").is_err());
        assert!(Field::Email.validate("user@domain.com").is_ok());
        assert!(Field::Email.validate("a.b+c@sub.domain.ru").is_ok());
    }
}
