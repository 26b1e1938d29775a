use calamine::Data;
use chrono::NaiveDate;

// ── Coercions ─────────────────────────────────────────────────────────────────

/// Parse a resolution price: the documents use a comma decimal separator.
/// "1,23" → 1.23 | "4.10" → 4.1. Anything else is not a price row.
pub fn parse_precio(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.replace(',', ".").parse().ok()
}

/// Parse an effective date. BOE emits "2020-03-01" in the XML body and
/// "20200301" in metadata fields; portal pages use "01/03/2020".
pub fn parse_fecha(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%d/%m/%Y") {
        return Some(d);
    }

    None
}

/// Coerce a spreadsheet cell to an integer total. Truncates fractional
/// values the way the reports store rounded totals as floats.
pub fn parse_total(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) => Some(*f as i64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-empty text content of a spreadsheet cell.
pub fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => {
            let s = s.trim();
            if s.is_empty() { None } else { Some(s.to_string()) }
        }
        _ => None,
    }
}

/// Drop thousands separators from a numeric text field ("62,348,447").
pub fn strip_thousands(s: &str) -> String {
    s.replace(',', "")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_precio() {
        assert_eq!(parse_precio("1,23"), Some(1.23));
        assert_eq!(parse_precio("4.10"), Some(4.1));
        assert_eq!(parse_precio(" 0,50 "), Some(0.5));
        assert_eq!(parse_precio("N/A"), None);
        assert_eq!(parse_precio(""), None);
        // two separators cannot form a number
        assert_eq!(parse_precio("1.234,56"), None);
    }

    #[test]
    fn test_parse_fecha() {
        let d = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        assert_eq!(parse_fecha("2020-03-01"), Some(d));
        assert_eq!(parse_fecha("20200301"), Some(d));
        assert_eq!(parse_fecha("01/03/2020"), Some(d));
        assert_eq!(parse_fecha("marzo de 2020"), None);
        assert_eq!(parse_fecha(""), None);
    }

    #[test]
    fn test_parse_total() {
        assert_eq!(parse_total(&Data::Int(100)), Some(100));
        assert_eq!(parse_total(&Data::Float(50.0)), Some(50));
        assert_eq!(parse_total(&Data::Float(50.9)), Some(50));
        assert_eq!(parse_total(&Data::String(" 10 ".into())), Some(10));
        assert_eq!(parse_total(&Data::String("n.d.".into())), None);
        assert_eq!(parse_total(&Data::Empty), None);
    }

    #[test]
    fn test_strip_thousands() {
        assert_eq!(strip_thousands("62,348,447"), "62348447");
        assert_eq!(strip_thousands("1234"), "1234");
    }
}
