//! Payload formatters: typed field data → the canonical string encoded into the symbol.
//!
//! Formatters are pure and never fail. When the input carries nothing to encode
//! (per-type rule, e.g. empty SSID) they return an empty string.

pub mod validation;

use anyhow::Result;
use std::collections::BTreeMap;

use crate::QrType;
use validation::ValidationError;

/// WiFi authentication type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WifiEncryption {
    #[default]
    Wpa,
    Wep,
    NoPass,
}

impl WifiEncryption {
    pub fn as_str(self) -> &'static str {
        match self {
            WifiEncryption::Wpa => "WPA",
            WifiEncryption::Wep => "WEP",
            WifiEncryption::NoPass => "nopass",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wpa" | "wpa2" => Some(Self::Wpa),
            "wep" => Some(Self::Wep),
            "nopass" | "none" | "" => Some(Self::NoPass),
            _ => None,
        }
    }
}

/// Supported payment-URI coins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Coin {
    #[default]
    Btc,
    Eth,
    Ltc,
}

impl Coin {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BTC" | "BITCOIN" => Some(Self::Btc),
            "ETH" | "ETHEREUM" => Some(Self::Eth),
            "LTC" | "LITECOIN" => Some(Self::Ltc),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WifiData {
    pub ssid: String,
    pub password: String,
    pub encryption: WifiEncryption,
    pub hidden: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VCardData {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub organization: String,
    pub title: String,
    pub website: String,
    pub address: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmailData {
    pub email: String,
    pub subject: String,
    pub body: String,
}

/// Phone + optional message; shared by SMS and WhatsApp.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageData {
    pub phone: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CryptoData {
    pub coin: Coin,
    pub address: String,
    pub amount: String,
    pub label: String,
}

/// Dates are `YYYY-MM-DD`, times `HH:MM` (form input shape).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CalendarData {
    pub title: String,
    pub location: String,
    pub start_date: String,
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeoData {
    pub latitude: String,
    pub longitude: String,
}

/// Structured input for one QR code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QrData {
    Url(String),
    Text(String),
    Wifi(WifiData),
    Vcard(VCardData),
    Email(EmailData),
    Sms(MessageData),
    Whatsapp(MessageData),
    Crypto(CryptoData),
    Calendar(CalendarData),
    Geo(GeoData),
}

// ---- Escaping ----

/// Backslash-escape the characters that delimit fields in a `WIFI:` URI.
pub fn escape_wifi(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ';' | ',' | ':' | '"' | '\'') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Build `?k=v&k2=v2` from non-empty params, each value percent-encoded. Empty when no params survive.
pub fn query_string(params: &[(&str, &str)]) -> String {
    let parts: Vec<String> = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("?{}", parts.join("&"))
    }
}

/// True when `s` starts with `http://` or `https://` (case-insensitive).
pub fn has_http_scheme(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

// ---- Formatters ----

pub fn format_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

pub fn format_text(text: &str) -> String {
    text.to_string()
}

pub fn format_wifi(ssid: &str, password: &str, encryption: WifiEncryption, hidden: bool) -> String {
    if ssid.is_empty() {
        return String::new();
    }
    format!(
        "WIFI:T:{};S:{};P:{};H:{};;",
        encryption.as_str(),
        escape_wifi(ssid),
        escape_wifi(password),
        hidden
    )
}

pub fn format_vcard(data: &VCardData) -> String {
    if data.first_name.trim().is_empty() && data.last_name.trim().is_empty() {
        return String::new();
    }
    let mut lines = vec![
        "BEGIN:VCARD".to_string(),
        "VERSION:3.0".to_string(),
        format!("N:{};{};;;", data.last_name, data.first_name),
        format!("FN:{} {}", data.first_name, data.last_name)
            .trim()
            .to_string(),
    ];
    let optional = [
        ("TEL:", &data.phone),
        ("EMAIL:", &data.email),
        ("ORG:", &data.organization),
        ("TITLE:", &data.title),
        ("URL:", &data.website),
    ];
    for (prefix, value) in optional {
        if !value.is_empty() {
            lines.push(format!("{prefix}{value}"));
        }
    }
    if !data.address.is_empty() {
        lines.push(format!("ADR:;;{};;;;", data.address));
    }
    lines.push("END:VCARD".to_string());
    lines.join("\n")
}

pub fn format_email(email: &str, subject: &str, body: &str) -> String {
    if email.is_empty() {
        return String::new();
    }
    let query = query_string(&[("subject", subject), ("body", body)]);
    format!("mailto:{email}{query}")
}

pub fn format_sms(phone: &str, message: &str) -> String {
    let cleaned: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if cleaned.is_empty() {
        return String::new();
    }
    format!("sms:{}{}", cleaned, query_string(&[("body", message)]))
}

pub fn format_whatsapp(phone: &str, message: &str) -> String {
    let cleaned: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if cleaned.is_empty() {
        return String::new();
    }
    format!(
        "https://wa.me/{}{}",
        cleaned,
        query_string(&[("text", message)])
    )
}

pub fn format_crypto(data: &CryptoData) -> String {
    if data.address.is_empty() {
        return String::new();
    }
    match data.coin {
        Coin::Btc => format!(
            "bitcoin:{}{}",
            data.address,
            query_string(&[("amount", &data.amount), ("label", &data.label)])
        ),
        Coin::Eth => format!(
            "ethereum:{}{}",
            data.address,
            query_string(&[("value", &data.amount)])
        ),
        Coin::Ltc => format!(
            "litecoin:{}{}",
            data.address,
            query_string(&[("amount", &data.amount), ("label", &data.label)])
        ),
    }
}

/// `2025-03-01` + `14:30` → `20250301T143000Z`.
fn to_ical_date(date: &str, time: &str) -> String {
    format!("{}T{}00Z", date.replace('-', ""), time.replace(':', ""))
}

pub fn format_calendar(data: &CalendarData) -> String {
    if data.title.trim().is_empty() {
        return String::new();
    }
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("DTSTART:{}", to_ical_date(&data.start_date, &data.start_time)),
        format!("DTEND:{}", to_ical_date(&data.end_date, &data.end_time)),
        format!("SUMMARY:{}", data.title),
    ];
    if !data.location.is_empty() {
        lines.push(format!("LOCATION:{}", data.location));
    }
    if !data.description.is_empty() {
        lines.push(format!("DESCRIPTION:{}", data.description));
    }
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());
    lines.join("\n")
}

pub fn format_geo(lat: &str, lng: &str) -> String {
    if lat.trim().is_empty() || lng.trim().is_empty() {
        return String::new();
    }
    format!("geo:{lat},{lng}")
}

impl QrData {
    pub fn qr_type(&self) -> QrType {
        match self {
            QrData::Url(_) => QrType::Url,
            QrData::Text(_) => QrType::Text,
            QrData::Wifi(_) => QrType::Wifi,
            QrData::Vcard(_) => QrType::Vcard,
            QrData::Email(_) => QrType::Email,
            QrData::Sms(_) => QrType::Sms,
            QrData::Whatsapp(_) => QrType::Whatsapp,
            QrData::Crypto(_) => QrType::Crypto,
            QrData::Calendar(_) => QrType::Calendar,
            QrData::Geo(_) => QrType::Geo,
        }
    }

    /// Canonical payload string; empty when there is nothing to encode.
    pub fn format(&self) -> String {
        match self {
            QrData::Url(url) => format_url(url),
            QrData::Text(text) => format_text(text),
            QrData::Wifi(w) => format_wifi(&w.ssid, &w.password, w.encryption, w.hidden),
            QrData::Vcard(v) => format_vcard(v),
            QrData::Email(e) => format_email(&e.email, &e.subject, &e.body),
            QrData::Sms(m) => format_sms(&m.phone, &m.message),
            QrData::Whatsapp(m) => format_whatsapp(&m.phone, &m.message),
            QrData::Crypto(c) => format_crypto(c),
            QrData::Calendar(c) => format_calendar(c),
            QrData::Geo(g) => format_geo(&g.latitude, &g.longitude),
        }
    }

    /// Run the type's field validation. Returns every message, not just the first.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        validation::validate_data(self)
    }

    /// Validate, then format. Validation failures block formatting for this item only.
    pub fn to_payload(&self) -> std::result::Result<String, Vec<ValidationError>> {
        self.validate()?;
        Ok(self.format())
    }

    /// Build typed data from `key=value` fields (CLI `single`). Unknown keys are ignored; missing ones are empty.
    ///
    /// Keys are snake_case field names (`ssid`, `first_name`, `start_date`, ...). `message`
    /// also accepts `body`/`text`; `latitude`/`longitude` also accept `lat`/`lng`.
    pub fn from_fields(qr_type: QrType, fields: &BTreeMap<String, String>) -> Result<Self> {
        let get = |keys: &[&str]| -> String {
            keys.iter()
                .find_map(|k| fields.get(*k))
                .cloned()
                .unwrap_or_default()
        };
        let data = match qr_type {
            QrType::Url => QrData::Url(get(&["url"])),
            QrType::Text => QrData::Text(get(&["text"])),
            QrType::Wifi => {
                let enc = get(&["encryption"]);
                let encryption = if enc.is_empty() {
                    WifiEncryption::Wpa
                } else {
                    WifiEncryption::parse(&enc)
                        .ok_or_else(|| anyhow::anyhow!("unknown WiFi encryption {:?}", enc))?
                };
                let hidden = get(&["hidden"]);
                QrData::Wifi(WifiData {
                    ssid: get(&["ssid"]),
                    password: get(&["password"]),
                    encryption,
                    hidden: matches!(hidden.trim(), "true" | "1" | "yes"),
                })
            }
            QrType::Vcard => QrData::Vcard(VCardData {
                first_name: get(&["first_name"]),
                last_name: get(&["last_name"]),
                phone: get(&["phone"]),
                email: get(&["email"]),
                organization: get(&["organization", "org"]),
                title: get(&["title"]),
                website: get(&["website", "url"]),
                address: get(&["address"]),
            }),
            QrType::Email => QrData::Email(EmailData {
                email: get(&["email"]),
                subject: get(&["subject"]),
                body: get(&["body"]),
            }),
            QrType::Sms => QrData::Sms(MessageData {
                phone: get(&["phone"]),
                message: get(&["message", "body"]),
            }),
            QrType::Whatsapp => QrData::Whatsapp(MessageData {
                phone: get(&["phone"]),
                message: get(&["message", "text"]),
            }),
            QrType::Crypto => {
                let coin = get(&["coin"]);
                let coin = if coin.is_empty() {
                    Coin::Btc
                } else {
                    Coin::parse(&coin).ok_or_else(|| anyhow::anyhow!("unknown coin {:?}", coin))?
                };
                QrData::Crypto(CryptoData {
                    coin,
                    address: get(&["address"]),
                    amount: get(&["amount"]),
                    label: get(&["label"]),
                })
            }
            QrType::Calendar => QrData::Calendar(CalendarData {
                title: get(&["title"]),
                location: get(&["location"]),
                start_date: get(&["start_date"]),
                start_time: get(&["start_time"]),
                end_date: get(&["end_date"]),
                end_time: get(&["end_time"]),
                description: get(&["description"]),
            }),
            QrType::Geo => QrData::Geo(GeoData {
                latitude: get(&["latitude", "lat"]),
                longitude: get(&["longitude", "lng"]),
            }),
        };
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_prefixing() {
        assert_eq!(format_url("example.com"), "https://example.com");
        assert_eq!(format_url("https://example.com"), "https://example.com");
        assert_eq!(format_url("http://example.com"), "http://example.com");
        assert_eq!(format_url("HTTPS://Example.com"), "HTTPS://Example.com");
        assert_eq!(format_url("example.com/path?q=1"), "https://example.com/path?q=1");
        assert_eq!(format_url("   "), "");
    }

    #[test]
    fn test_text_verbatim() {
        assert_eq!(format_text("Hello & goodbye <world>"), "Hello & goodbye <world>");
        assert_eq!(format_text(""), "");
    }

    #[test]
    fn test_wifi_formats() {
        assert_eq!(
            format_wifi("MyNetwork", "pass123", WifiEncryption::Wpa, false),
            "WIFI:T:WPA;S:MyNetwork;P:pass123;H:false;;"
        );
        assert_eq!(
            format_wifi("Hidden", "", WifiEncryption::NoPass, true),
            "WIFI:T:nopass;S:Hidden;P:;H:true;;"
        );
        assert_eq!(
            format_wifi("OldNet", "wepkey", WifiEncryption::Wep, false),
            "WIFI:T:WEP;S:OldNet;P:wepkey;H:false;;"
        );
    }

    #[test]
    fn test_wifi_escapes_special_characters() {
        let result = format_wifi("My \"Network\"", "pass", WifiEncryption::Wpa, false);
        assert!(result.contains(r#"S:My \"Network\""#));
        assert_eq!(escape_wifi(r"a\b;c,d:e'f"), r"a\\b\;c\,d\:e\'f");
    }

    #[test]
    fn test_wifi_empty_ssid_is_nothing_to_encode() {
        assert_eq!(format_wifi("", "pass", WifiEncryption::Wpa, false), "");
    }

    #[test]
    fn test_vcard_full_and_minimal() {
        let full = format_vcard(&VCardData {
            first_name: "John".into(),
            last_name: "Doe".into(),
            phone: "+1234567890".into(),
            email: "john@example.com".into(),
            organization: "Acme Corp".into(),
            address: "1 Main St".into(),
            ..Default::default()
        });
        assert_eq!(
            full,
            "BEGIN:VCARD\nVERSION:3.0\nN:Doe;John;;;\nFN:John Doe\nTEL:+1234567890\n\
             EMAIL:john@example.com\nORG:Acme Corp\nADR:;;1 Main St;;;;\nEND:VCARD"
        );

        let minimal = format_vcard(&VCardData {
            first_name: "Jane".into(),
            ..Default::default()
        });
        assert_eq!(minimal, "BEGIN:VCARD\nVERSION:3.0\nN:;Jane;;;\nFN:Jane\nEND:VCARD");
        assert_eq!(format_vcard(&VCardData::default()), "");
    }

    #[test]
    fn test_email_query_params() {
        assert_eq!(
            format_email("test@example.com", "Hello", "Body text"),
            "mailto:test@example.com?subject=Hello&body=Body%20text"
        );
        assert_eq!(format_email("test@example.com", "", ""), "mailto:test@example.com");
        assert_eq!(
            format_email("test@example.com", "", "only body"),
            "mailto:test@example.com?body=only%20body"
        );
        assert!(format_email("a@b.co", "Hello & World", "").contains("subject=Hello%20%26%20World"));
    }

    #[test]
    fn test_sms_and_whatsapp_clean_phone() {
        assert_eq!(format_sms("+1 (234) 567-890", ""), "sms:+1234567890");
        assert_eq!(format_sms("+1234567890", "Hello"), "sms:+1234567890?body=Hello");
        assert_eq!(format_whatsapp("+1 234-567-890", ""), "https://wa.me/1234567890");
        assert_eq!(
            format_whatsapp("1234567890", "Hi there"),
            "https://wa.me/1234567890?text=Hi%20there"
        );
        assert_eq!(format_sms("()", "x"), "");
    }

    #[test]
    fn test_crypto_uris() {
        let btc = CryptoData {
            coin: Coin::Btc,
            address: "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".into(),
            amount: "0.5".into(),
            label: "Donation".into(),
        };
        assert_eq!(
            format_crypto(&btc),
            "bitcoin:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa?amount=0.5&label=Donation"
        );
        let eth = CryptoData {
            coin: Coin::Eth,
            address: "0xabc".into(),
            amount: "1.0".into(),
            label: "ignored".into(),
        };
        assert_eq!(format_crypto(&eth), "ethereum:0xabc?value=1.0");
        let ltc = CryptoData {
            coin: Coin::Ltc,
            address: "LcHK".into(),
            amount: "10".into(),
            ..Default::default()
        };
        assert_eq!(format_crypto(&ltc), "litecoin:LcHK?amount=10");
    }

    #[test]
    fn test_calendar_event() {
        let cal = CalendarData {
            title: "Meeting".into(),
            location: "Downtown Cafe".into(),
            start_date: "2025-03-01".into(),
            start_time: "14:30".into(),
            end_date: "2025-03-01".into(),
            end_time: "15:30".into(),
            description: String::new(),
        };
        assert_eq!(
            format_calendar(&cal),
            "BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VEVENT\nDTSTART:20250301T143000Z\n\
             DTEND:20250301T153000Z\nSUMMARY:Meeting\nLOCATION:Downtown Cafe\n\
             END:VEVENT\nEND:VCALENDAR"
        );
    }

    #[test]
    fn test_geo() {
        assert_eq!(format_geo("0", "0"), "geo:0,0");
        assert_eq!(format_geo("40.7128", "-74.0060"), "geo:40.7128,-74.0060");
        assert_eq!(format_geo("", "1"), "");
    }

    #[test]
    fn test_formatting_is_deterministic() {
        let data = QrData::Email(EmailData {
            email: "a@b.co".into(),
            subject: "Hi there".into(),
            body: "x&y".into(),
        });
        assert_eq!(data.format(), data.format());
    }

    #[test]
    fn test_from_fields_wifi() {
        let fields: BTreeMap<String, String> = [
            ("ssid", "Home"),
            ("password", "p;w"),
            ("encryption", "wep"),
            ("hidden", "true"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let data = QrData::from_fields(QrType::Wifi, &fields).unwrap();
        assert_eq!(data.qr_type(), QrType::Wifi);
        assert_eq!(data.format(), r"WIFI:T:WEP;S:Home;P:p\;w;H:true;;");
    }

    #[test]
    fn test_from_fields_rejects_unknown_coin() {
        let fields: BTreeMap<String, String> =
            [("coin".to_string(), "DOGE".to_string())].into_iter().collect();
        assert!(QrData::from_fields(QrType::Crypto, &fields).is_err());
    }
}
