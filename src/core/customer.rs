//! The per-job customer file.
//!
//! Line meaning is positional: name, address, phone, job number, job date,
//! technician, and an optional secondary address. Blank lines are ignored.

use crate::utils::error::{PermitError, Result};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

const NAME: usize = 0;
const ADDRESS: usize = 1;
const PHONE: usize = 2;
const JOB_NUMBER: usize = 3;
const JOB_DATE: usize = 4;
const TECHNICIAN: usize = 5;
const SECONDARY_ADDRESS: usize = 6;

/// Keys produced by [`CustomerRecord::values`].
pub const VALUE_KEYS: &[&str] = &[
    "customer_name",
    "last_name",
    "full_address",
    "street",
    "street_line",
    "street_only",
    "city",
    "city_state_zip",
    "zip",
    "zip_last3",
    "phone",
    "phone_digits",
    "area_code",
    "phone_rest",
    "phone_spaced",
    "job_number",
    "job_date",
    "technician",
    "second_address",
    "second_town",
    "second_zip",
    "today",
    "today_short",
    "today_month",
    "today_day",
    "today_year2",
];

struct Patterns {
    job_address: Regex,
    zip: Regex,
    street_suffix: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        job_address: Regex::new(r"^\d+.*\d{5}").expect("valid address pattern"),
        zip: Regex::new(r"\b\d{5}\b").expect("valid zip pattern"),
        street_suffix: Regex::new(
            r"(?i)^(.*?\b(?:St|Street|Rd|Road|Ave|Avenue|Dr|Drive|Blvd|Lane|Ln|Way|Ct)\b)",
        )
        .expect("valid street pattern"),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerRecord {
    lines: Vec<String>,
}

impl CustomerRecord {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn line(&self, index: usize) -> &str {
        self.lines.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.line(NAME)
    }

    pub fn address(&self) -> &str {
        self.line(ADDRESS)
    }

    pub fn phone(&self) -> &str {
        self.line(PHONE)
    }

    pub fn job_number(&self) -> &str {
        self.line(JOB_NUMBER)
    }

    pub fn job_date(&self) -> &str {
        self.line(JOB_DATE)
    }

    pub fn technician(&self) -> &str {
        self.line(TECHNICIAN)
    }

    /// Empty when the file has fewer than seven lines.
    pub fn secondary_address(&self) -> &str {
        self.line(SECONDARY_ADDRESS)
    }

    pub fn last_name(&self) -> &str {
        self.name().split_whitespace().last().unwrap_or("")
    }

    /// First line that starts with a number and carries a five-digit zip.
    pub fn job_address(&self) -> Option<&str> {
        self.lines
            .iter()
            .map(String::as_str)
            .find(|line| patterns().job_address.is_match(line))
    }

    pub fn require_job_address(&self, source: &Path) -> Result<&str> {
        self.job_address()
            .ok_or_else(|| PermitError::AddressNotFound {
                path: source.display().to_string(),
            })
    }

    /// Every value a permit form layout can reference.
    pub fn values(&self, today: NaiveDate) -> HashMap<String, String> {
        let mut values = HashMap::new();
        let mut put = |key: &str, value: String| {
            values.insert(key.to_string(), value);
        };

        let address = AddressParts::split(self.address());
        let second = AddressParts::split(self.secondary_address());
        let phone = PhoneParts::parse(self.phone());

        put("customer_name", self.name().to_string());
        put("last_name", self.last_name().to_string());
        put("full_address", self.address().to_string());
        put("street", address.street());
        put("street_line", address.street_line());
        put("street_only", street_only(self.address()));
        put("city", address.city());
        put("city_state_zip", address.city_state_zip());
        put("zip", zip(self.address()));
        put("zip_last3", zip_last3(self.address()));
        put("phone", self.phone().to_string());
        put("phone_digits", phone.digits.clone());
        put("area_code", phone.area_code());
        put("phone_rest", phone.rest());
        put("phone_spaced", phone.spaced(self.phone()));
        put("job_number", self.job_number().to_string());
        put("job_date", self.job_date().to_string());
        put("technician", self.technician().to_string());
        put("second_address", self.secondary_address().to_string());
        put("second_town", second.city());
        put("second_zip", second.trailing_zip());
        put("today", today.format("%m/%d/%Y").to_string());
        put("today_short", today.format("%m/%d/%y").to_string());
        put("today_month", format!("{:02}", today.month()));
        put("today_day", format!("{:02}", today.day()));
        put("today_year2", format!("{:02}", today.year() % 100));

        values
    }
}

/// Comma-separated pieces of a one-line address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParts {
    parts: Vec<String>,
}

impl AddressParts {
    pub fn split(address: &str) -> Self {
        let parts = if address.trim().is_empty() {
            Vec::new()
        } else {
            address.split(',').map(|p| p.trim().to_string()).collect()
        };
        Self { parts }
    }

    /// Number and street only.
    pub fn street(&self) -> String {
        self.parts.first().cloned().unwrap_or_default()
    }

    /// Everything before city and state/zip, so unit numbers are kept.
    pub fn street_line(&self) -> String {
        if self.parts.len() > 2 {
            self.parts[..self.parts.len() - 2].join(", ")
        } else {
            self.street()
        }
    }

    pub fn city(&self) -> String {
        if self.parts.len() >= 3 {
            self.parts[self.parts.len() - 2].clone()
        } else {
            String::new()
        }
    }

    pub fn city_state_zip(&self) -> String {
        match self.parts.len() {
            0 | 1 => String::new(),
            2 => self.parts[1].clone(),
            n => self.parts[n - 2..].join(", "),
        }
    }

    /// Last word of the last part when there are at least three parts.
    pub fn trailing_zip(&self) -> String {
        if self.parts.len() >= 3 {
            self.parts
                .last()
                .and_then(|p| p.split_whitespace().last())
                .unwrap_or("")
                .to_string()
        } else {
            String::new()
        }
    }
}

pub fn zip(address: &str) -> String {
    patterns()
        .zip
        .find(address)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

pub fn zip_last3(address: &str) -> String {
    let zip = zip(address);
    zip.get(2..).unwrap_or("").to_string()
}

/// Address text up to the first street-type word, or the whole address.
pub fn street_only(address: &str) -> String {
    patterns()
        .street_suffix
        .captures(address)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| address.trim().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneParts {
    pub digits: String,
}

impl PhoneParts {
    pub fn parse(raw: &str) -> Self {
        Self {
            digits: raw.chars().filter(|c| c.is_ascii_digit()).collect(),
        }
    }

    pub fn area_code(&self) -> String {
        self.digits.chars().take(3).collect()
    }

    /// `XXX-XXXX`
    pub fn rest(&self) -> String {
        let exchange: String = self.digits.chars().skip(3).take(3).collect();
        let line: String = self.digits.chars().skip(6).collect();
        if line.is_empty() {
            exchange
        } else {
            format!("{}-{}", exchange, line)
        }
    }

    /// `XXX XXX-XXXX`; raw text without a dash keeps its own punctuation.
    pub fn spaced(&self, raw: &str) -> String {
        let cleaned: String = raw
            .chars()
            .filter(|c| !matches!(c, '(' | ')' | ' '))
            .collect();
        if cleaned.contains('-') {
            let head: String = cleaned.chars().take(3).collect();
            let tail: String = cleaned.chars().skip(3).collect();
            format!("{} {}", head, tail)
        } else if self.digits.len() >= 10 {
            format!("{} {}", self.area_code(), self.rest())
        } else {
            cleaned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const FULL: &str = "\
John Q Smith
123 Main St, Buffalo, NY 14221

(716) 555-1234
J-20431
10/21/2026
Mike
45 Oak Ave, Lockport, NY 14094
";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
    }

    #[test]
    fn test_positional_lines_skip_blanks() {
        let record = CustomerRecord::parse(FULL);
        assert_eq!(record.lines().len(), 7);
        assert_eq!(record.name(), "John Q Smith");
        assert_eq!(record.last_name(), "Smith");
        assert_eq!(record.phone(), "(716) 555-1234");
        assert_eq!(record.job_number(), "J-20431");
        assert_eq!(record.technician(), "Mike");
        assert_eq!(record.secondary_address(), "45 Oak Ave, Lockport, NY 14094");
    }

    #[test]
    fn test_short_file_leaves_secondary_address_blank() {
        let record = CustomerRecord::parse("Jane Doe\n9 Elm Rd, Depew, NY 14043\n716-555-0000\n");
        assert_eq!(record.secondary_address(), "");
        assert_eq!(record.technician(), "");

        let values = record.values(today());
        assert_eq!(values["second_address"], "");
        assert_eq!(values["second_town"], "");
        assert_eq!(values["job_date"], "");
    }

    #[test]
    fn test_job_address_extraction() {
        let record = CustomerRecord::parse(FULL);
        assert_eq!(record.job_address(), Some("123 Main St, Buffalo, NY 14221"));

        let record = CustomerRecord::parse("Jane Doe\nMain Street\n555-1234\n");
        assert_eq!(record.job_address(), None);
        assert!(matches!(
            record.require_job_address(Path::new("Customer_data.txt")),
            Err(PermitError::AddressNotFound { .. })
        ));
    }

    #[test]
    fn test_derived_values() {
        let values = CustomerRecord::parse(FULL).values(today());

        assert_eq!(values["street"], "123 Main St");
        assert_eq!(values["street_line"], "123 Main St");
        assert_eq!(values["city"], "Buffalo");
        assert_eq!(values["city_state_zip"], "Buffalo, NY 14221");
        assert_eq!(values["zip"], "14221");
        assert_eq!(values["zip_last3"], "221");
        assert_eq!(values["street_only"], "123 Main St");
        assert_eq!(values["area_code"], "716");
        assert_eq!(values["phone_rest"], "555-1234");
        assert_eq!(values["phone_spaced"], "716 555-1234");
        assert_eq!(values["second_town"], "Lockport");
        assert_eq!(values["second_zip"], "14094");
        assert_eq!(values["today"], "03/07/2026");
        assert_eq!(values["today_short"], "03/07/26");
        assert_eq!(values["today_month"], "03");
        assert_eq!(values["today_day"], "07");
        assert_eq!(values["today_year2"], "26");
    }

    #[test]
    fn test_value_keys_match_values() {
        let values = CustomerRecord::default().values(today());
        let mut produced: Vec<&str> = values.keys().map(String::as_str).collect();
        let mut declared = VALUE_KEYS.to_vec();
        produced.sort_unstable();
        declared.sort_unstable();
        assert_eq!(produced, declared);
    }

    #[test]
    fn test_address_parts_edge_cases() {
        let four = AddressParts::split("12 Pine Ln, Apt 4, Clarence, NY 14031");
        assert_eq!(four.street(), "12 Pine Ln");
        assert_eq!(four.street_line(), "12 Pine Ln, Apt 4");
        assert_eq!(four.city(), "Clarence");
        assert_eq!(four.city_state_zip(), "Clarence, NY 14031");

        let two = AddressParts::split("12 Pine Ln, Clarence NY 14031");
        assert_eq!(two.city_state_zip(), "Clarence NY 14031");
        assert_eq!(two.city(), "");

        let one = AddressParts::split("12 Pine Ln");
        assert_eq!(one.street_line(), "12 Pine Ln");
        assert_eq!(one.city_state_zip(), "");

        let empty = AddressParts::split("");
        assert_eq!(empty.street(), "");
    }

    #[test]
    fn test_street_only_stops_at_suffix() {
        assert_eq!(
            street_only("77 Transit Road Lockport NY 14094"),
            "77 Transit Road"
        );
        assert_eq!(street_only("5 market st, Lockport"), "5 market st");
        assert_eq!(street_only("PO Box 9"), "PO Box 9");
    }

    #[test]
    fn test_phone_formats() {
        let phone = PhoneParts::parse("716.555.9876");
        assert_eq!(phone.area_code(), "716");
        assert_eq!(phone.rest(), "555-9876");
        assert_eq!(phone.spaced("716.555.9876"), "716 555-9876");
        assert_eq!(PhoneParts::parse("(716)555-1234").spaced("(716)555-1234"), "716 555-1234");
    }

    #[test]
    fn test_load_from_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), FULL).unwrap();
        let record = CustomerRecord::load(file.path()).unwrap();
        assert_eq!(record.address(), "123 Main St, Buffalo, NY 14221");
    }
}
