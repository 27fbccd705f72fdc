/// Converts a registry-native `YYYYMMDD` date into `YYYY-MM-DD`.
///
/// Anything that is not exactly eight characters yields an empty string; the
/// normalizer decides later whether the result is a real calendar date.
pub fn registry_date_to_iso(date: &str) -> String {
    let date = date.trim();
    if date.len() != 8 || !date.is_char_boundary(4) || !date.is_char_boundary(6) {
        return String::new();
    }
    format!("{}-{}-{}", &date[0..4], &date[4..6], &date[6..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_date_conversion() {
        assert_eq!(registry_date_to_iso("20230615"), "2023-06-15");
        assert_eq!(registry_date_to_iso(" 19991101 "), "1999-11-01");
        assert_eq!(registry_date_to_iso(""), "");
        assert_eq!(registry_date_to_iso("2023-06-15"), "");
        assert_eq!(registry_date_to_iso("2023061"), "");
    }

    #[test]
    fn test_conversion_does_not_validate() {
        // Out-of-range months are left for the normalizer to reject
        assert_eq!(registry_date_to_iso("19001301"), "1900-13-01");
    }
}
