//! Turns decoded CSV text into an ordered sequence of admission rows.
//!
//! Header keys are lower-cased and trimmed, so `RegNo`, ` REGNO ` and
//! `regno` all address the same field. Values keep their case; surrounding
//! whitespace is trimmed. The report-only `status`/`error` columns are
//! tolerated in the input and ignored.

use std::collections::HashMap;

use crate::error::AdmissionError;
use crate::types::admission::AdmissionRow;

/// Header fields every admission file must carry.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "regno",
    "firstname",
    "surname",
    "othername",
    "levelid",
    "programmeid",
    "departmentid",
    "mobile",
    "email",
];

/// Columns a previously annotated report may carry; stripped before the
/// extra-column check.
const OPTIONAL_FIELDS: [&str; 2] = ["status", "error"];

/// Parse delimited text into admission rows, in file order.
///
/// Fails with a header error when a required column is missing, an unknown
/// column is present, or any data row is wider than the header. Rows
/// narrower than the header are padded with empty values and left for
/// per-row validation to reject.
pub fn normalize(text: &str, delimiter: u8) -> Result<Vec<AdmissionRow>, AdmissionError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|_| AdmissionError::RaggedRow { line: 1 })?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut extras: Vec<String> = Vec::new();
    for (idx, name) in headers.iter().enumerate() {
        let required = REQUIRED_FIELDS.iter().copied().find(|f| *f == name.as_str());
        if let (Some(key), false) = (required, positions.contains_key(name.as_str())) {
            positions.insert(key, idx);
        } else if !OPTIONAL_FIELDS.contains(&name.as_str()) {
            // Repeated required columns count as extras too.
            extras.push(name.clone());
        }
    }

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .filter(|f| !positions.contains_key(*f))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(AdmissionError::MissingColumns(missing.join(", ")));
    }
    if !extras.is_empty() {
        return Err(AdmissionError::ExtraColumns(extras.join(", ")));
    }

    let field = |record: &csv::StringRecord, name: &str| -> String {
        positions
            .get(name)
            .and_then(|idx| record.get(*idx))
            .unwrap_or("")
            .to_string()
    };

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|_| AdmissionError::RaggedRow { line: idx + 2 })?;
        if record.len() > headers.len() {
            // Line number as the administrator sees it: header is line 1.
            return Err(AdmissionError::RaggedRow { line: idx + 2 });
        }

        rows.push(AdmissionRow {
            regno: field(&record, "regno"),
            email: field(&record, "email"),
            firstname: field(&record, "firstname"),
            surname: field(&record, "surname"),
            othername: field(&record, "othername"),
            mobile: field(&record, "mobile"),
            departmentid: field(&record, "departmentid"),
            programmeid: field(&record, "programmeid"),
            levelid: field(&record, "levelid"),
        });
    }

    Ok(rows)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "regno,email,firstname,surname,othername,mobile,departmentid,programmeid,levelid";

    #[test]
    fn test_normalize_single_row() {
        let text = format!("{}\nA100,a@x.com,Ann,Lee,,0912345678,1,2,3\n", HEADER);
        let rows = normalize(&text, b',').unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].regno, "A100");
        assert_eq!(rows[0].email, "a@x.com");
        assert_eq!(rows[0].othername, "");
        assert_eq!(rows[0].levelid, "3");
    }

    #[test]
    fn test_normalize_headers_case_and_whitespace_insensitive() {
        let text = "RegNo , EMAIL ,FirstName,Surname,OtherName,Mobile,DepartmentId,ProgrammeId,LevelId\nA100,a@x.com,Ann,Lee,,,1,2,3\n";
        let rows = normalize(text, b',').unwrap();
        assert_eq!(rows[0].regno, "A100");
    }

    #[test]
    fn test_normalize_values_trimmed_case_preserved() {
        let text = format!("{}\n  a100 , A@X.com ,Ann,Lee,,,1,2,3\n", HEADER);
        let rows = normalize(&text, b',').unwrap();
        assert_eq!(rows[0].regno, "a100");
        assert_eq!(rows[0].email, "A@X.com");
    }

    #[test]
    fn test_normalize_tolerates_status_and_error_columns() {
        let text = format!(
            "{},status,error\nA100,a@x.com,Ann,Lee,,,1,2,3,Created,\n",
            HEADER
        );
        let rows = normalize(&text, b',').unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].regno, "A100");
    }

    #[test]
    fn test_normalize_missing_column() {
        let text = "regno,email,firstname,surname,othername,mobile,departmentid,programmeid\nA100,a@x.com,Ann,Lee,,,1,2\n";
        let err = normalize(text, b',').unwrap_err();
        assert!(matches!(err, AdmissionError::MissingColumns(ref cols) if cols == "levelid"));
    }

    #[test]
    fn test_normalize_extra_column() {
        let text = format!("{},nickname\nA100,a@x.com,Ann,Lee,,,1,2,3,Annie\n", HEADER);
        let err = normalize(&text, b',').unwrap_err();
        assert!(matches!(err, AdmissionError::ExtraColumns(ref cols) if cols == "nickname"));
    }

    #[test]
    fn test_normalize_repeated_column_is_extra() {
        let text = format!("{},regno\nA100,a@x.com,Ann,Lee,,,1,2,3,A100\n", HEADER);
        assert!(matches!(
            normalize(&text, b','),
            Err(AdmissionError::ExtraColumns(_))
        ));
    }

    #[test]
    fn test_normalize_ragged_row() {
        let text = format!("{}\nA100,a@x.com,Ann,Lee,,,1,2,3,unexpected\n", HEADER);
        let err = normalize(&text, b',').unwrap_err();
        assert!(matches!(err, AdmissionError::RaggedRow { line: 2 }));
    }

    #[test]
    fn test_normalize_short_row_padded() {
        let text = format!("{}\nA100,a@x.com,Ann\n", HEADER);
        let rows = normalize(&text, b',').unwrap();
        assert_eq!(rows[0].firstname, "Ann");
        assert_eq!(rows[0].surname, "");
        assert_eq!(rows[0].levelid, "");
    }

    #[test]
    fn test_normalize_semicolon_delimiter() {
        let text = "regno;email;firstname;surname;othername;mobile;departmentid;programmeid;levelid\nA100;a@x.com;Ann;Lee;;;1;2;3\n";
        let rows = normalize(text, b';').unwrap();
        assert_eq!(rows[0].email, "a@x.com");
    }

    #[test]
    fn test_normalize_preserves_file_order() {
        let text = format!(
            "{}\nB200,b@x.com,Bo,Li,,,1,2,3\nA100,a@x.com,Ann,Lee,,,1,2,3\n",
            HEADER
        );
        let rows = normalize(&text, b',').unwrap();
        assert_eq!(rows[0].regno, "B200");
        assert_eq!(rows[1].regno, "A100");
    }
}
