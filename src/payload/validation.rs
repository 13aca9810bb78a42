//! Field validators that gate formatting. A failure blocks only the item it belongs to.

use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;

use super::{CalendarData, Coin, QrData, VCardData};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{0}")]
    Invalid(&'static str),
}

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("regex literal"));
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://[^\s/?#@]+(?:[/?#]\S*)?$").expect("regex literal"));
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?\d{7,15}$").expect("regex literal"));
static PHONE_STRIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\-().]").expect("regex literal"));
static BTC_LEGACY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[13][a-km-zA-HJ-NP-Z1-9]{25,34}$").expect("regex literal"));
static BTC_BECH32_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^bc1[a-zA-HJ-NP-Z0-9]{25,89}$").expect("regex literal"));
static ETH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("regex literal"));
static LTC_LEGACY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[LM3][a-km-zA-HJ-NP-Z1-9]{25,34}$").expect("regex literal"));
static LTC_BECH32_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ltc1[a-zA-HJ-NP-Z0-9]{25,89}$").expect("regex literal"));

pub type FieldResult = Result<(), ValidationError>;

pub fn validate_required(value: &str, field: &'static str) -> FieldResult {
    if value.trim().is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(())
}

fn is_valid_url(url: &str) -> bool {
    let trimmed = url.trim();
    if super::has_http_scheme(trimmed) {
        URL_RE.is_match(trimmed)
    } else {
        URL_RE.is_match(&format!("https://{trimmed}"))
    }
}

pub fn validate_url(url: &str) -> FieldResult {
    validate_required(url, "URL")?;
    if !is_valid_url(url) {
        return Err(ValidationError::Invalid("Please enter a valid URL"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> FieldResult {
    validate_required(email, "Email")?;
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::Invalid("Please enter a valid email address"));
    }
    Ok(())
}

pub fn validate_ssid(ssid: &str) -> FieldResult {
    validate_required(ssid, "Network name (SSID)")
}

pub fn validate_phone(phone: &str) -> FieldResult {
    let cleaned = PHONE_STRIP_RE.replace_all(phone, "");
    if cleaned.is_empty() {
        return Err(ValidationError::Required("Phone number"));
    }
    if !PHONE_RE.is_match(&cleaned) {
        return Err(ValidationError::Invalid(
            "Enter a valid phone number (7-15 digits)",
        ));
    }
    Ok(())
}

pub fn validate_crypto_address(address: &str, coin: Coin) -> FieldResult {
    validate_required(address, "Wallet address")?;
    let ok = match coin {
        Coin::Btc => BTC_LEGACY_RE.is_match(address) || BTC_BECH32_RE.is_match(address),
        Coin::Eth => ETH_RE.is_match(address),
        Coin::Ltc => LTC_LEGACY_RE.is_match(address) || LTC_BECH32_RE.is_match(address),
    };
    if ok {
        return Ok(());
    }
    Err(ValidationError::Invalid(match coin {
        Coin::Btc => "Enter a valid Bitcoin address",
        Coin::Eth => "Enter a valid Ethereum address (0x...)",
        Coin::Ltc => "Enter a valid Litecoin address",
    }))
}

fn check_range(
    value: &str,
    field: &'static str,
    bound: f64,
    message: &'static str,
) -> FieldResult {
    validate_required(value, field)?;
    match value.trim().parse::<f64>() {
        Ok(v) if (-bound..=bound).contains(&v) => Ok(()),
        _ => Err(ValidationError::Invalid(message)),
    }
}

/// Latitude and longitude are checked independently; both results are returned.
pub fn validate_coordinates(lat: &str, lng: &str) -> (FieldResult, FieldResult) {
    (
        check_range(lat, "Latitude", 90.0, "Latitude must be between -90 and 90"),
        check_range(lng, "Longitude", 180.0, "Longitude must be between -180 and 180"),
    )
}

pub fn validate_vcard(data: &VCardData) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if data.first_name.trim().is_empty() && data.last_name.trim().is_empty() {
        errors.push(ValidationError::Required("At least first name or last name"));
    }
    if !data.email.is_empty() && !EMAIL_RE.is_match(&data.email) {
        errors.push(ValidationError::Invalid("Please enter a valid email address"));
    }
    if !data.website.is_empty() && !is_valid_url(&data.website) {
        errors.push(ValidationError::Invalid("Please enter a valid website URL"));
    }
    errors
}

fn parse_local(date: &str, time: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&format!("{date}T{time}"), "%Y-%m-%dT%H:%M").ok()
}

pub fn validate_calendar(data: &CalendarData) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let required = [
        (&data.title, "Event title"),
        (&data.start_date, "Start date"),
        (&data.start_time, "Start time"),
        (&data.end_date, "End date"),
        (&data.end_time, "End time"),
    ];
    for (value, field) in required {
        if value.trim().is_empty() {
            errors.push(ValidationError::Required(field));
        }
    }
    if !errors.is_empty() {
        return errors;
    }
    match (
        parse_local(&data.start_date, &data.start_time),
        parse_local(&data.end_date, &data.end_time),
    ) {
        (Some(start), Some(end)) if end <= start => {
            errors.push(ValidationError::Invalid("End must be after start"));
        }
        (Some(_), Some(_)) => {}
        _ => errors.push(ValidationError::Invalid(
            "Dates must be YYYY-MM-DD and times HH:MM",
        )),
    }
    errors
}

fn collect(results: impl IntoIterator<Item = FieldResult>) -> Vec<ValidationError> {
    results.into_iter().filter_map(Result::err).collect()
}

/// All validation errors for one typed value.
pub fn validate_data(data: &QrData) -> Result<(), Vec<ValidationError>> {
    let errors = match data {
        QrData::Url(url) => collect([validate_url(url)]),
        QrData::Text(text) => collect([validate_required(text, "Text")]),
        QrData::Wifi(w) => collect([validate_ssid(&w.ssid)]),
        QrData::Vcard(v) => validate_vcard(v),
        QrData::Email(e) => collect([validate_email(&e.email)]),
        QrData::Sms(m) | QrData::Whatsapp(m) => collect([validate_phone(&m.phone)]),
        QrData::Crypto(c) => collect([validate_crypto_address(&c.address, c.coin)]),
        QrData::Calendar(c) => validate_calendar(c),
        QrData::Geo(g) => {
            let (lat, lng) = validate_coordinates(&g.latitude, &g.longitude);
            collect([lat, lng])
        }
    };
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_message() {
        assert_eq!(
            validate_required("  ", "Name").unwrap_err().to_string(),
            "Name is required"
        );
        assert!(validate_required("x", "Name").is_ok());
    }

    #[test]
    fn test_url() {
        assert!(validate_url("example.com").is_ok());
        assert!(validate_url("https://example.com/path?q=1").is_ok());
        assert_eq!(validate_url("").unwrap_err().to_string(), "URL is required");
        assert_eq!(
            validate_url("not a url").unwrap_err().to_string(),
            "Please enter a valid URL"
        );
    }

    #[test]
    fn test_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("user@example").is_err());
        assert_eq!(
            validate_email("").unwrap_err(),
            ValidationError::Required("Email")
        );
    }

    #[test]
    fn test_ssid() {
        assert_eq!(
            validate_ssid("").unwrap_err().to_string(),
            "Network name (SSID) is required"
        );
    }

    #[test]
    fn test_phone() {
        assert!(validate_phone("+1 (234) 567-890").is_ok());
        assert!(validate_phone("123").is_err());
        assert!(validate_phone("1234567890123456").is_err());
        assert_eq!(
            validate_phone("").unwrap_err().to_string(),
            "Phone number is required"
        );
    }

    #[test]
    fn test_crypto_addresses() {
        assert!(validate_crypto_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", Coin::Btc).is_ok());
        assert!(
            validate_crypto_address("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq", Coin::Btc).is_ok()
        );
        assert!(validate_crypto_address("0x123", Coin::Eth).is_err());
        assert!(
            validate_crypto_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44e", Coin::Eth).is_ok()
        );
        assert!(validate_crypto_address("LcHKqHWxZLuYaHnCvWxTJc8Cz9jVj5k4Ap", Coin::Ltc).is_ok());
    }

    #[test]
    fn test_coordinates_inclusive_bounds() {
        let (lat, lng) = validate_coordinates("90", "-180");
        assert!(lat.is_ok() && lng.is_ok());
        let (lat, lng) = validate_coordinates("90.01", "abc");
        assert_eq!(
            lat.unwrap_err().to_string(),
            "Latitude must be between -90 and 90"
        );
        assert_eq!(
            lng.unwrap_err().to_string(),
            "Longitude must be between -180 and 180"
        );
    }

    #[test]
    fn test_coordinates_opposite_bounds() {
        let (lat, lng) = validate_coordinates("-90", "180");
        assert!(lat.is_ok() && lng.is_ok());
        let (lat, lng) = validate_coordinates("91", "-181");
        assert!(lat.is_err());
        assert!(lng.is_err());
        let (lat, lng) = validate_coordinates("-91", "181");
        assert!(lat.is_err() && lng.is_err());
    }

    #[test]
    fn test_vcard_collects_all_errors() {
        let errors = validate_vcard(&VCardData {
            email: "bad".into(),
            ..Default::default()
        });
        assert_eq!(errors.len(), 2);
        assert!(validate_vcard(&VCardData {
            last_name: "Doe".into(),
            website: "example.com".into(),
            ..Default::default()
        })
        .is_empty());
    }

    #[test]
    fn test_calendar_end_after_start() {
        let mut cal = CalendarData {
            title: "Standup".into(),
            start_date: "2025-03-01".into(),
            start_time: "10:00".into(),
            end_date: "2025-03-01".into(),
            end_time: "10:00".into(),
            ..Default::default()
        };
        assert_eq!(
            validate_calendar(&cal),
            vec![ValidationError::Invalid("End must be after start")]
        );
        cal.end_time = "10:15".into();
        assert!(validate_calendar(&cal).is_empty());
    }

    #[test]
    fn test_calendar_missing_fields() {
        let errors = validate_calendar(&CalendarData::default());
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_validate_data_blocks_to_payload() {
        let data = QrData::Geo(super::super::GeoData {
            latitude: "100".into(),
            longitude: "0".into(),
        });
        assert!(data.to_payload().is_err());
    }
}
