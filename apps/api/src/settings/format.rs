/// Formats an amount the way fr-GN displays whole currency units:
/// digits grouped by three with a narrow no-break space, no decimals,
/// currency code last. Display only.
pub fn format_currency(amount: i64, currency: &str) -> String {
    const GROUP_SEPARATOR: char = '\u{202F}';

    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 * 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(GROUP_SEPARATOR);
        }
        grouped.push(ch);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{grouped}\u{A0}{currency}")
}
