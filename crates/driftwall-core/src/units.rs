//! Byte-size parsing and formatting used for quota comparison and block reasons.

const KIB: u64 = 1024;

fn multiplier(suffix: char) -> Option<u64> {
    let exp = match suffix.to_ascii_uppercase() {
        'K' => 1,
        'M' => 2,
        'G' => 3,
        'T' => 4,
        'P' => 5,
        _ => return None,
    };
    Some(KIB.pow(exp))
}

/// Strictly parse a size: empty, `none`, raw byte count, or a number (fractions
/// allowed) followed by K/M/G/T/P. Returns `None` for anything else.
pub fn parse_size(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Some(0);
    }

    if let Ok(bytes) = value.parse::<u64>() {
        return Some(bytes);
    }

    let suffix = value.chars().last()?;
    let mult = multiplier(suffix)?;
    let number = &value[..value.len() - suffix.len_utf8()];
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let n: f64 = number.parse().ok()?;
    Some((n * mult as f64) as u64)
}

/// Normalise a quota string to bytes for comparison. Unparseable values count
/// as 0 (no quota); document validation rejects them before they get here.
pub fn parse_quota(value: &str) -> u64 {
    parse_size(value).unwrap_or(0)
}

/// Format a byte count with binary units, e.g. `1.0 KiB`, `2.0 GiB`.
pub fn humanise_bytes(bytes: u64) -> String {
    if bytes < KIB {
        return format!("{} B", bytes);
    }
    let mut div = KIB;
    let mut exp = 0;
    let mut n = bytes / KIB;
    while n >= KIB {
        div *= KIB;
        exp += 1;
        n /= KIB;
    }
    let unit = b"KMGTPE"[exp] as char;
    format!("{:.1} {}iB", bytes as f64 / div as f64, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_suffixes_are_binary() {
        assert_eq!(parse_quota("1T"), 1024u64.pow(4));
        assert_eq!(parse_quota("500G"), 500 * 1024u64.pow(3));
        assert_eq!(parse_quota("100M"), 100 * 1024 * 1024);
        assert_eq!(parse_quota("1.5K"), 1536);
    }

    #[test]
    fn quota_empty_forms_are_zero() {
        assert_eq!(parse_quota(""), 0);
        assert_eq!(parse_quota("none"), 0);
        assert_eq!(parse_quota("0"), 0);
    }

    #[test]
    fn quota_raw_bytes_pass_through() {
        assert_eq!(parse_quota("2147483648"), 2_147_483_648);
    }

    #[test]
    fn same_quota_in_different_spellings_is_equal() {
        assert_eq!(parse_quota("2G"), parse_quota("2147483648"));
    }

    #[test]
    fn strict_parse_rejects_typos() {
        assert_eq!(parse_size("10X"), None);
        assert_eq!(parse_size("G"), None);
        assert_eq!(parse_size("1,5G"), None);
        assert_eq!(parse_size("-1G"), None);
    }

    #[test]
    fn humanise_formats_binary_units() {
        assert_eq!(humanise_bytes(0), "0 B");
        assert_eq!(humanise_bytes(1023), "1023 B");
        assert_eq!(humanise_bytes(1024), "1.0 KiB");
        assert_eq!(humanise_bytes(1024 * 1024), "1.0 MiB");
        assert_eq!(humanise_bytes(2 * 1024u64.pow(3)), "2.0 GiB");
    }
}
