use chrono::DateTime;

pub fn format_amount(amount: f64) -> String {
    const UNITS: [&str; 4] = ["", "K", "M", "B"];

    if !amount.is_finite() {
        return "-".to_owned();
    }

    let mut value = amount.abs();
    let mut unit = 0usize;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    if unit == 0 {
        format!("{sign}${value:.2}")
    } else {
        format!("{sign}${value:.2}{}", UNITS[unit])
    }
}

/// `0x1234…abcd` style shortening for wallet addresses.
pub fn short_address(address: &str) -> String {
    let address = address.trim();
    if address.chars().count() <= 12 {
        return address.to_owned();
    }

    let head = address.chars().take(6).collect::<String>();
    let tail = address
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<String>();
    format!("{head}…{tail}")
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    if timestamp_ms <= 0 {
        return "unknown".to_owned();
    }
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_use_thousand_units() {
        assert_eq!(format_amount(950.0), "$950.00");
        assert_eq!(format_amount(12_500.0), "$12.50K");
        assert_eq!(format_amount(3_200_000.0), "$3.20M");
        assert_eq!(format_amount(f64::NAN), "-");
    }

    #[test]
    fn long_addresses_are_shortened() {
        assert_eq!(
            short_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44e"),
            "0x742d…f44e"
        );
        assert_eq!(short_address("0xabc"), "0xabc");
    }

    #[test]
    fn timestamps_render_in_utc() {
        assert_eq!(format_timestamp(1_700_000_000_000), "2023-11-14 22:13");
        assert_eq!(format_timestamp(0), "unknown");
    }
}
