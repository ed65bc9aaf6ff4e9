//! Display formatting for amounts, counts, months and exclusion codes

use chrono::NaiveDate;

/// Magnitude tiers: threshold, divisor suffix, decimals for currency, decimals for counts
const TIERS: &[(f64, &str, usize, usize)] = &[
    (1e12, "T", 2, 2),
    (1e9, "B", 2, 2),
    (1e6, "M", 1, 1),
    (1e3, "K", 0, 1),
];

/// Format a dollar amount: `$1.09T`, `$3.40B`, `$12.5M`, `$250K`, `$42.50`
pub fn format_dollars(amount: f64) -> String {
    if !amount.is_finite() {
        return format!("${amount}");
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    let abs = amount.abs();

    for &(threshold, suffix, decimals, _) in TIERS {
        if abs >= threshold {
            return format!("{sign}${:.*}{suffix}", decimals, abs / threshold);
        }
    }
    format!("{sign}${abs:.2}")
}

/// Format a count: `2.10B`, `3.4M`, `12.3K`, `999`
pub fn format_count(count: f64) -> String {
    if !count.is_finite() {
        return count.to_string();
    }
    let sign = if count < 0.0 { "-" } else { "" };
    let abs = count.abs();

    for &(threshold, suffix, _, decimals) in TIERS {
        if abs >= threshold {
            return format!("{sign}{:.*}{suffix}", decimals, abs / threshold);
        }
    }

    if abs.fract() == 0.0 {
        format!("{sign}{abs:.0}")
    } else {
        let fixed = format!("{abs:.3}");
        let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
        format!("{sign}{trimmed}")
    }
}

/// `"2024-03"` -> `"Mar 2024"`. Anything else is returned verbatim.
pub fn format_month(month: &str) -> String {
    let valid_shape = month.len() == 7 && month.as_bytes()[4] == b'-';
    if !valid_shape {
        return month.to_string();
    }
    match NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d") {
        Ok(date) => date.format("%b %Y").to_string(),
        Err(_) => month.to_string(),
    }
}

/// Exclusion authorities from the federal exclusion list
const EXCLUSION_LABELS: &[(&str, &str)] = &[
    ("1128a1", "Conviction of program-related crimes"),
    ("1128a2", "Conviction relating to patient abuse or neglect"),
    ("1128a3", "Felony conviction relating to health care fraud"),
    ("1128a4", "Felony conviction relating to controlled substances"),
    ("1128b1", "Misdemeanor conviction relating to health care fraud"),
    ("1128b2", "Conviction relating to obstruction of an investigation"),
    ("1128b3", "Misdemeanor conviction relating to controlled substances"),
    ("1128b4", "License revocation, suspension or surrender"),
    ("1128b5", "Exclusion or suspension under a federal or state health care program"),
    ("1128b6", "Claims for excessive charges or unnecessary services"),
    ("1128b7", "Fraud, kickbacks and other prohibited activities"),
    ("1128b8", "Entity controlled by a sanctioned individual"),
    ("1128b8a", "Entity with an officer or managing employee who was sanctioned"),
    ("1128b9", "Failure to disclose required information"),
    ("1128b10", "Failure to supply requested information on subcontractors and suppliers"),
    ("1128b11", "Failure to supply payment information"),
    ("1128b12", "Failure to grant immediate access"),
    ("1128b13", "Failure to take corrective action"),
    ("1128b14", "Default on health education loan or scholarship obligations"),
    ("1128b15", "Individual controlling a sanctioned entity"),
    ("1128b16", "Making false statements or misrepresentation of material facts"),
    ("1128Aa", "Civil monetary penalty"),
    ("1156", "Failure to meet statutory obligations (peer review)"),
    ("BRCH SA", "Breach of settlement agreement"),
    ("BRCH CIA", "Breach of corporate integrity agreement"),
];

/// Human-readable label for an exclusion code, or the code itself if unknown
pub fn exclusion_label(code: &str) -> String {
    let trimmed = code.trim();
    EXCLUSION_LABELS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(trimmed))
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dollar_tiers() {
        assert_eq!(format_dollars(1_090_000_000_000.0), "$1.09T");
        assert_eq!(format_dollars(3_400_000_000.0), "$3.40B");
        assert_eq!(format_dollars(12_500_000.0), "$12.5M");
        assert_eq!(format_dollars(250_000.0), "$250K");
        assert_eq!(format_dollars(42.5), "$42.50");
        assert_eq!(format_dollars(0.0), "$0.00");
    }

    #[test]
    fn test_negative_dollars_keep_sign() {
        assert_eq!(format_dollars(-250_000.0), "-$250K");
    }

    #[test]
    fn test_count_tiers() {
        assert_eq!(format_count(2_100_000_000.0), "2.10B");
        assert_eq!(format_count(3_400_000.0), "3.4M");
        assert_eq!(format_count(12_345.0), "12.3K");
        assert_eq!(format_count(999.0), "999");
        assert_eq!(format_count(2.5), "2.5");
        assert_eq!(format_count(4_000_000_000_000.0), "4.00T");
    }

    #[test]
    fn test_month_labels() {
        assert_eq!(format_month("2024-03"), "Mar 2024");
        assert_eq!(format_month("2018-12"), "Dec 2018");
        assert_eq!(format_month("2024-13"), "2024-13");
        assert_eq!(format_month("March"), "March");
        assert_eq!(format_month("2024-03-01"), "2024-03-01");
    }

    #[test]
    fn test_exclusion_labels() {
        assert_eq!(exclusion_label("1128b4"), "License revocation, suspension or surrender");
        assert_eq!(exclusion_label("1128A1"), "Conviction of program-related crimes");
        assert_eq!(exclusion_label("XYZ"), "XYZ");
    }
}
