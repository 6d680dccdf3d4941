use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use super::{CatalogError, OptionRule, QuestionOptions};

#[derive(Debug)]
pub enum CatalogImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Row { line: u64, message: String },
}

impl std::fmt::Display for CatalogImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogImportError::Io(err) => write!(f, "failed to read catalog file: {}", err),
            CatalogImportError::Csv(err) => write!(f, "invalid catalog CSV data: {}", err),
            CatalogImportError::Row { line, message } => {
                write!(f, "invalid catalog row on line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for CatalogImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogImportError::Io(err) => Some(err),
            CatalogImportError::Csv(err) => Some(err),
            CatalogImportError::Row { .. } => None,
        }
    }
}

impl From<std::io::Error> for CatalogImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for CatalogImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// One question line of a catalog file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub type_name: String,
    pub group_name: String,
    pub question: String,
    pub options: QuestionOptions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogImportSummary {
    pub types: usize,
    pub groups: usize,
    pub questions: usize,
}

pub struct CatalogImporter;

impl CatalogImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<CatalogRow>, CatalogImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<CatalogRow>, CatalogImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut rows = Vec::new();

        for (index, record) in csv_reader.deserialize::<RawRow>().enumerate() {
            // header is line 1
            let line = index as u64 + 2;
            let raw = record?;
            let row = raw
                .into_row()
                .map_err(|message| CatalogImportError::Row { line, message })?;
            row.options
                .validate()
                .map_err(|err| CatalogImportError::Row {
                    line,
                    message: err.to_string(),
                })?;
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(CatalogImportError::Row {
                line: 1,
                message: "catalog file contains no questions".to_string(),
            });
        }

        Ok(rows)
    }

    /// Counts what an import of `rows` would create without touching a store.
    pub fn summarize(rows: &[CatalogRow]) -> CatalogImportSummary {
        let plan = group_rows(rows.to_vec());
        CatalogImportSummary {
            types: plan.len(),
            groups: plan.iter().map(|planned| planned.groups.len()).sum(),
            questions: rows.len(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(rename = "group")]
    group_name: String,
    question: String,
    yes_score: u32,
    no_score: u32,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    yes_require_comment: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    no_require_comment: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    comment_min_len: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    yes_require_image: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    no_require_image: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    max_images: Option<String>,
}

impl RawRow {
    fn into_row(self) -> Result<CatalogRow, String> {
        for (field, value) in [
            ("type", &self.type_name),
            ("group", &self.group_name),
            ("question", &self.question),
        ] {
            if value.is_empty() {
                return Err(format!("column '{field}' must not be empty"));
            }
        }

        let yes_require_comment = parse_flag("yes_require_comment", &self.yes_require_comment)?;
        let no_require_comment = parse_flag("no_require_comment", &self.no_require_comment)?;
        let comment_min_len = parse_number("comment_min_len", &self.comment_min_len)?.unwrap_or(0);
        let max_images = parse_number("max_images", &self.max_images)?
            .unwrap_or_else(|| OptionRule::default().max_images);

        // the minimum length only applies to options that ask for a comment
        let rule = |score, require_comment, require_image| OptionRule {
            score,
            require_comment,
            require_image,
            comment_min_len: if require_comment { comment_min_len } else { 0 },
            max_images,
            ..OptionRule::default()
        };

        Ok(CatalogRow {
            options: QuestionOptions::new(
                rule(
                    self.yes_score,
                    yes_require_comment,
                    parse_flag("yes_require_image", &self.yes_require_image)?,
                ),
                rule(
                    self.no_score,
                    no_require_comment,
                    parse_flag("no_require_image", &self.no_require_image)?,
                ),
            ),
            type_name: self.type_name,
            group_name: self.group_name,
            question: self.question,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_flag(field: &str, value: &Option<String>) -> Result<bool, String> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("true" | "yes" | "y" | "1") => Ok(true),
        Some("false" | "no" | "n" | "0") => Ok(false),
        Some(other) => Err(format!("column '{field}' has invalid flag '{other}'")),
    }
}

fn parse_number(field: &str, value: &Option<String>) -> Result<Option<u32>, String> {
    value
        .as_deref()
        .map(|raw| {
            raw.parse::<u32>()
                .map_err(|_| format!("column '{field}' must be a non-negative integer"))
        })
        .transpose()
}

pub(crate) struct PlannedType {
    pub(crate) name: String,
    pub(crate) groups: Vec<PlannedGroup>,
}

pub(crate) struct PlannedGroup {
    pub(crate) name: String,
    pub(crate) questions: Vec<PlannedQuestion>,
}

pub(crate) struct PlannedQuestion {
    pub(crate) text: String,
    pub(crate) options: QuestionOptions,
}

/// Groups rows by type and group name, preserving first-seen order.
fn group_rows(rows: Vec<CatalogRow>) -> Vec<PlannedType> {
    let mut plan: Vec<PlannedType> = Vec::new();

    for row in rows {
        let type_index = match plan.iter().position(|planned| planned.name == row.type_name) {
            Some(index) => index,
            None => {
                plan.push(PlannedType {
                    name: row.type_name.clone(),
                    groups: Vec::new(),
                });
                plan.len() - 1
            }
        };
        let groups = &mut plan[type_index].groups;
        let group_index = match groups.iter().position(|group| group.name == row.group_name) {
            Some(index) => index,
            None => {
                groups.push(PlannedGroup {
                    name: row.group_name.clone(),
                    questions: Vec::new(),
                });
                groups.len() - 1
            }
        };
        groups[group_index].questions.push(PlannedQuestion {
            text: row.question,
            options: row.options,
        });
    }

    plan
}

pub(crate) fn plan(rows: Vec<CatalogRow>) -> Result<Vec<PlannedType>, CatalogError> {
    if rows.is_empty() {
        return Err(CatalogError::Invalid(
            "catalog import contains no questions".to_string(),
        ));
    }
    for row in &rows {
        row.options.validate()?;
    }
    Ok(group_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
type,group,question,yes_score,no_score,no_require_comment,comment_min_len
Fire,Equipment,Extinguishers are inspected,2,0,true,10
Fire,Equipment,Alarms are tested,1,0,,
Fire,Training,Staff drill held,1,0,,
Theft,Access,Doors lock at night,3,0,yes,
";

    #[test]
    fn parses_rows_with_optional_columns() {
        let rows = CatalogImporter::from_reader(SAMPLE.as_bytes()).expect("sample parses");

        assert_eq!(rows.len(), 4);
        let first = &rows[0];
        assert_eq!(first.type_name, "Fire");
        assert_eq!(first.options.yes.score, 2);
        assert!(!first.options.yes.require_comment);
        assert_eq!(first.options.yes.comment_min_len, 0);
        assert!(first.options.no.require_comment);
        assert_eq!(first.options.no.comment_min_len, 10);
        assert_eq!(first.options.no.max_images, 3);
    }

    #[test]
    fn summary_groups_rows_in_first_seen_order() {
        let rows = CatalogImporter::from_reader(SAMPLE.as_bytes()).expect("sample parses");
        let summary = CatalogImporter::summarize(&rows);

        assert_eq!(
            summary,
            CatalogImportSummary {
                types: 2,
                groups: 3,
                questions: 4,
            }
        );

        let plan = plan(rows).expect("plan builds");
        assert_eq!(plan[0].name, "Fire");
        assert_eq!(plan[0].groups[0].name, "Equipment");
        assert_eq!(plan[0].groups[0].questions[1].text, "Alarms are tested");
        assert_eq!(plan[1].name, "Theft");
    }

    #[test]
    fn rejects_unknown_flag_values_with_line_number() {
        let csv = "type,group,question,yes_score,no_score,yes_require_image\nFire,Equipment,Q,1,0,maybe\n";
        let err = CatalogImporter::from_reader(csv.as_bytes()).expect_err("flag is invalid");

        match err {
            CatalogImportError::Row { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("yes_require_image"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_scores_above_the_option_limit() {
        let csv = "type,group,question,yes_score,no_score\nFire,Equipment,Ok,1,0\nFire,Equipment,Q,4294967295,0\n";
        let err = CatalogImporter::from_reader(csv.as_bytes()).expect_err("score too large");

        match err {
            CatalogImportError::Row { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("score must be at most"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_empty_files() {
        let err = CatalogImporter::from_reader("type,group,question,yes_score,no_score\n".as_bytes())
            .expect_err("no rows");
        assert!(matches!(err, CatalogImportError::Row { line: 1, .. }));
    }
}
