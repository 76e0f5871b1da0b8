//! Input validation for API requests.
//!
//! Validators return `Err(message)`; collect them into an `ApiError` with
//! the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::Location;

lazy_static! {
    /// Loose email shape check: local@domain.tld
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// Letters, digits, dot, dash, underscore and single spaces
    static ref USERNAME_REGEX: Regex = Regex::new(
        r"^[\p{L}\p{N}._-]+( [\p{L}\p{N}._-]+)*$"
    ).unwrap();

    static ref HTTP_URL_REGEX: Regex = Regex::new(
        r"^https?://[^\s/$.?#][^\s]*$"
    ).unwrap();
}

pub const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_DESCRIPTION_LENGTH: usize = 5000;

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    let username = username.trim();
    if username.is_empty() {
        return Err("Username is required".to_string());
    }
    if username.chars().count() < 2 {
        return Err("Username is too short (min 2 characters)".to_string());
    }
    if username.chars().count() > 50 {
        return Err("Username is too long (max 50 characters)".to_string());
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err("Username contains invalid characters".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if password.len() > 1024 {
        return Err("Password is too long".to_string());
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), String> {
    if description.trim().is_empty() {
        return Err("Description is required".to_string());
    }
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(format!(
            "Description is too long (max {} characters)",
            MAX_DESCRIPTION_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), String> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err("Latitude must be between -90 and 90".to_string());
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err("Longitude must be between -180 and 180".to_string());
    }
    Ok(())
}

/// A report location needs valid coordinates and every address level
pub fn validate_location(location: &Location) -> Result<(), String> {
    validate_coordinates(location.lat, location.lng)?;

    let levels = [
        ("Province", &location.province),
        ("City", &location.city),
        ("District", &location.district),
        ("Village", &location.village),
    ];
    for (label, value) in levels {
        if value.trim().is_empty() {
            return Err(format!("{} is required", label));
        }
    }
    Ok(())
}

pub fn validate_reward_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Reward name is required".to_string());
    }
    if name.chars().count() > 100 {
        return Err("Reward name is too long (max 100 characters)".to_string());
    }
    Ok(())
}

pub fn validate_points(points: i64) -> Result<(), String> {
    if points < 0 {
        return Err("Points required cannot be negative".to_string());
    }
    if points > 1_000_000 {
        return Err("Points required is too large (max 1000000)".to_string());
    }
    Ok(())
}

/// Optional image URL; empty means none
pub fn validate_image_url(url: &Option<String>) -> Result<(), String> {
    if let Some(u) = url {
        if u.trim().is_empty() {
            return Ok(());
        }
        if u.len() > 2048 {
            return Err("Image URL is too long (max 2048 characters)".to_string());
        }
        if !HTTP_URL_REGEX.is_match(u) {
            return Err("Image URL must be an HTTP(S) URL".to_string());
        }
    }
    Ok(())
}

pub fn validate_region_id(id: &str, field_name: &str) -> Result<(), String> {
    if !crate::geo::is_region_id(id) {
        return Err(format!("Invalid {} format", field_name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("warga@example.com").is_ok());
        assert!(validate_email("  Warga@Example.co.id ").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("two@@example.com").is_err());
        assert!(validate_email("spaced out@example.com").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("Budi Santoso").is_ok());
        assert!(validate_username("eco_warrior-7").is_ok());
        assert!(validate_username("a").is_err());
        assert!(validate_username("   ").is_err());
        assert!(validate_username("double  space").is_err());
        assert!(validate_username("<script>").is_err());
        assert!(validate_username(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("correct horse").is_ok());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password("").is_err());
    }

    #[test]
    fn test_validate_description() {
        assert!(validate_description("Sampah menumpuk di pinggir jalan").is_ok());
        assert!(validate_description(" \n\t").is_err());
        assert!(validate_description(&"a".repeat(5001)).is_err());
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(-6.9175, 107.6191).is_ok());
        assert!(validate_coordinates(90.0, -180.0).is_ok());
        assert!(validate_coordinates(90.1, 0.0).is_err());
        assert!(validate_coordinates(0.0, 180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_validate_location_requires_all_levels() {
        let mut location = crate::testing::bandung();
        assert!(validate_location(&location).is_ok());

        location.village = " ".to_string();
        assert_eq!(
            validate_location(&location),
            Err("Village is required".to_string())
        );
    }

    #[test]
    fn test_validate_reward_fields() {
        assert!(validate_reward_name("Tumbler").is_ok());
        assert!(validate_reward_name("").is_err());
        assert!(validate_points(0).is_ok());
        assert!(validate_points(-5).is_err());
        assert!(validate_image_url(&None).is_ok());
        assert!(validate_image_url(&Some(String::new())).is_ok());
        assert!(validate_image_url(&Some("https://cdn.example.com/a.png".to_string())).is_ok());
        assert!(validate_image_url(&Some("javascript:alert(1)".to_string())).is_err());
    }

    #[test]
    fn test_validate_region_id() {
        assert!(validate_region_id("32", "province ID").is_ok());
        assert!(validate_region_id("3273010001", "district ID").is_ok());
        assert_eq!(
            validate_region_id("../provinces", "province ID"),
            Err("Invalid province ID format".to_string())
        );
        assert!(validate_region_id("", "province ID").is_err());
        assert!(validate_region_id("32?x=1", "province ID").is_err());
        assert!(validate_region_id("٣٢", "province ID").is_err());
    }
}
