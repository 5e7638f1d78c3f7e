//! Display formatting for values substituted into documents and emails.

use chrono::{Datelike, NaiveDate};

/// Format a phone number for display
/// Handles various input formats and normalizes to (XXX) XXX-XXXX
pub fn format_phone(phone: &str) -> String {
    // Extract just the digits
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 => format!(
            "({}) {}-{}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..10]
        ),
        11 if digits.starts_with('1') => format!(
            "({}) {}-{}",
            &digits[1..4],
            &digits[4..7],
            &digits[7..11]
        ),
        _ => phone.to_string(), // Return original if can't format
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Dollar amount with thousands separators and cents: `$1,250.00`
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let dollars = (cents / 100).to_string();
    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, c) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Long-form date used in contract text: `September 1, 2026`
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Short date used in lists: `Sep 01, 2026`
pub fn format_short_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

/// Academic season containing `date`. Seasons start in August:
/// 2026-10-19 falls in `2026-2027`, 2027-03-01 in `2026-2027`.
pub fn season_for(date: NaiveDate) -> String {
    let start_year = if date.month() >= 8 {
        date.year()
    } else {
        date.year() - 1
    };
    format!("{}-{}", start_year, start_year + 1)
}
