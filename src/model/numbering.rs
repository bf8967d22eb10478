/// Document numbers look like `RENT-2026-00042`: prefix, year, sequence
/// padded to five digits. Sequences past 99999 simply grow wider.
pub fn document_number(prefix: &str, year: i32, sequence: u64) -> String {
    format!("{prefix}-{year}-{sequence:05}")
}

/// Next number given the highest sequence issued this year, if any.
pub fn next_document_number(prefix: &str, year: i32, last_sequence: Option<u64>) -> String {
    document_number(prefix, year, last_sequence.unwrap_or(0) + 1)
}

/// `LIKE` pattern matching every number of the given year.
pub fn year_pattern(prefix: &str, year: i32) -> String {
    format!("{prefix}-{year}-%")
}

/// SQL expression for the numeric sequence of a number column. Text order
/// would put `-100000` below `-99999`.
pub fn sequence_sql(column: &str) -> String {
    format!("CAST(SUBSTRING_INDEX({column}, '-', -1) AS UNSIGNED)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_number_of_year() {
        assert_eq!(next_document_number("RENT", 2026, None), "RENT-2026-00001");
    }

    #[test]
    fn continues_sequence() {
        assert_eq!(next_document_number("INV", 2026, Some(41)), "INV-2026-00042");
    }

    #[test]
    fn sequence_outgrows_padding() {
        assert_eq!(
            next_document_number("RENT", 2026, Some(99_999)),
            "RENT-2026-100000"
        );
        assert_eq!(
            next_document_number("RENT", 2026, Some(100_000)),
            "RENT-2026-100001"
        );
    }

    #[test]
    fn pattern_and_sequence_sql() {
        assert_eq!(year_pattern("RENT", 2026), "RENT-2026-%");
        assert_eq!(
            sequence_sql("rental_number"),
            "CAST(SUBSTRING_INDEX(rental_number, '-', -1) AS UNSIGNED)"
        );
    }
}
