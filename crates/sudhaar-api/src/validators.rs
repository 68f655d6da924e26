//! Field validators shared by the registration, profile and money-taking
//! endpoints. Each returns the normalised value or a user-facing message.

use std::str::FromStr;

use email_address::EmailAddress;
use rust_decimal::Decimal;
use sudhaar_types::money;

pub const MAX_NAME_LEN: usize = 50;

const PASSWORD_SYMBOLS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

pub fn password_strength(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long.");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number.");
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        return Err("Password must contain at least one symbol (!@#$%^&* etc.).");
    }
    Ok(())
}

pub fn name_length(name: &str) -> Result<(), &'static str> {
    if name.chars().count() > MAX_NAME_LEN {
        return Err("Name cannot be longer than 50 characters.");
    }
    Ok(())
}

/// "first last", trimmed, must fit the same limit as a single name.
pub fn full_name_length(first: &str, last: &str) -> Result<(), &'static str> {
    let full = format!("{} {}", first, last);
    if full.trim().chars().count() > MAX_NAME_LEN {
        return Err("Full name cannot exceed 50 characters.");
    }
    Ok(())
}

/// Pakistani mobile number, returned as its 11 digits.
pub fn phone_number(value: &str) -> Result<String, &'static str> {
    let digits = only_digits(value);
    if digits.len() != 11 {
        return Err("Phone number must be exactly 11 digits (e.g., 03211234567).");
    }
    if !digits.starts_with("03") {
        return Err("Phone number must start with '03'.");
    }
    Ok(digits)
}

/// National identity card number, returned as its 13 digits.
pub fn cnic(value: &str) -> Result<String, &'static str> {
    let digits = only_digits(value);
    if digits.len() != 13 {
        return Err("CNIC must be exactly 13 digits.");
    }
    Ok(digits)
}

/// The domain part must be dotted; `user@localhost` is refused.
pub fn email(value: &str) -> Result<(), &'static str> {
    match EmailAddress::from_str(value) {
        Ok(address) if address.domain().contains('.') => Ok(()),
        _ => Err("Please enter a valid email address."),
    }
}

/// Converts a non-negative amount to cents.
pub fn amount_cents(amount: Decimal) -> Result<i64, &'static str> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err("Ensure this value is greater than or equal to 0.");
    }
    money::to_cents(amount)
        .ok_or("Ensure there are no more than 12 digits in total and no more than 2 decimal places.")
}

pub fn required_text(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("This field may not be blank.");
    }
    Ok(())
}

pub fn max_length(value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!("Ensure this field has no more than {} characters.", max));
    }
    Ok(())
}

fn only_digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rules_checked_in_order() {
        assert_eq!(
            password_strength("a1!"),
            Err("Password must be at least 8 characters long.")
        );
        assert_eq!(
            password_strength("abcdefgh!"),
            Err("Password must contain at least one number.")
        );
        assert_eq!(
            password_strength("abcdefgh1"),
            Err("Password must contain at least one symbol (!@#$%^&* etc.).")
        );
        assert!(password_strength("abcdefg1!").is_ok());
        assert!(password_strength("secret12\\").is_ok());
    }

    #[test]
    fn phone_is_normalised_to_digits() {
        assert_eq!(phone_number("0321-1234567").as_deref(), Ok("03211234567"));
        assert!(phone_number("0421234567").is_err());
        assert_eq!(
            phone_number("04211234567"),
            Err("Phone number must start with '03'.")
        );
    }

    #[test]
    fn cnic_requires_thirteen_digits() {
        assert_eq!(cnic("35202-1234567-1").as_deref(), Ok("3520212345671"));
        assert!(cnic("35202-123456").is_err());
    }

    #[test]
    fn names_are_limited_to_fifty_chars() {
        let long = "x".repeat(51);
        assert!(name_length(&long).is_err());
        assert!(name_length(&"x".repeat(50)).is_ok());
        assert!(full_name_length(&"a".repeat(25), &"b".repeat(24)).is_ok());
        assert!(full_name_length(&"a".repeat(25), &"b".repeat(25)).is_err());
        assert!(full_name_length(&"a".repeat(50), "").is_ok());
    }

    #[test]
    fn email_needs_a_domain() {
        assert!(email("amna@example.com").is_ok());
        assert!(email("amna@localhost").is_err());
        assert!(email("a.b@localhost").is_err());
        assert!(email("a.b@mail.example.pk").is_ok());
        assert!(email("not an email").is_err());
    }

    #[test]
    fn amounts_must_be_non_negative_cents() {
        assert_eq!(amount_cents(Decimal::from_str("500").unwrap()), Ok(50_000));
        assert_eq!(amount_cents(Decimal::ZERO), Ok(0));
        assert!(amount_cents(Decimal::from_str("-1").unwrap()).is_err());
        assert!(amount_cents(Decimal::from_str("0.001").unwrap()).is_err());
    }
}
