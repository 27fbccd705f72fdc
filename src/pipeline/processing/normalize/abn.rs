use crate::constants::{ABN_LENGTH, ABN_MODULUS, ABN_WEIGHTS};

/// Strips every non-digit and left-pads with zeros to eleven characters.
///
/// Short identifiers are padded rather than rejected; [`is_valid_abn`] decides.
/// Empty input stays empty.
pub fn clean_abn(abn: &str) -> String {
    if abn.trim().is_empty() {
        return String::new();
    }
    let digits: String = abn.chars().filter(char::is_ascii_digit).collect();
    format!("{:0>width$}", digits, width = ABN_LENGTH)
}

/// Weighted modulus-89 check: subtract one from the first digit, weight each digit,
/// and require the sum to divide evenly by 89.
pub fn is_valid_abn(abn: &str) -> bool {
    if abn.len() != ABN_LENGTH || !abn.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: i64 = abn
        .bytes()
        .map(|b| i64::from(b - b'0'))
        .enumerate()
        .map(|(i, digit)| {
            let digit = if i == 0 { digit - 1 } else { digit };
            digit * ABN_WEIGHTS[i]
        })
        .sum();

    sum % ABN_MODULUS == 0
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Builds a checksum-valid ABN whose last nine digits are `seed`.
    pub fn make_abn(seed: u32) -> String {
        let tail = format!("{:09}", seed % 1_000_000_000);
        let rest: i64 = tail
            .bytes()
            .enumerate()
            .map(|(i, b)| i64::from(b - b'0') * ABN_WEIGHTS[i + 2])
            .sum();
        // (first - 1) * 10 + second must cancel `rest` modulo 89
        let lead = (ABN_MODULUS - rest % ABN_MODULUS) % ABN_MODULUS;
        let first = lead / 10 + 1;
        let second = lead % 10;
        format!("{}{}{}", first, second, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::make_abn;
    use super::*;

    #[test]
    fn test_known_valid_abn() {
        assert!(is_valid_abn("51824753556"));
    }

    #[test]
    fn test_changed_last_digit_fails() {
        assert!(!is_valid_abn("51824753557"));
        assert!(!is_valid_abn("51824753555"));
    }

    #[test]
    fn test_wrong_length_or_non_digits_fail() {
        assert!(!is_valid_abn("5182475355"));
        assert!(!is_valid_abn("518247535566"));
        assert!(!is_valid_abn("5182475355a"));
        assert!(!is_valid_abn(""));
        assert!(!is_valid_abn("00000000000"));
    }

    #[test]
    fn test_clean_abn_strips_and_pads() {
        assert_eq!(clean_abn("51 824 753 556"), "51824753556");
        assert_eq!(clean_abn("ABN: 51-824-753-556"), "51824753556");
        assert_eq!(clean_abn("1234"), "00000001234");
        assert_eq!(clean_abn(""), "");
    }

    #[test]
    fn test_clean_abn_is_idempotent() {
        for abn in ["51824753556", "00000001234", "12 345 678 901"] {
            let once = clean_abn(abn);
            assert_eq!(clean_abn(&once), once);
        }
    }

    #[test]
    fn test_generated_abns_are_valid() {
        for seed in [0, 1, 42, 824_753_556, 999_999_999] {
            let abn = make_abn(seed);
            assert_eq!(abn.len(), 11);
            assert!(is_valid_abn(&abn), "{} should be valid", abn);
        }
        assert_eq!(make_abn(824_753_556), "51824753556");
    }
}
