//! CSV/TSV parser.
//!
//! Detects the delimiter, quote character and header row, infers per-column
//! types with statistics for numeric columns, and emits one `schema` symbol,
//! one `header` symbol per column and one `statistic` aggregate per file.
//!
//! Detection rules:
//! - delimiter: candidates `,` tab `|` `;` `:` space scored over the first
//!   ten non-blank lines; a candidate only counts when its per-line count is
//!   identical and non-zero; the highest consistent count wins, comma on
//!   ties or unusable input.
//! - header: the first row is header-like when more than 70% of its cells
//!   are non-numeric while more than 30% of the following cells (up to ten
//!   rows) are numeric.
//! - types: per cell over the first 1000 data rows -- boolean set, numeric
//!   parse, date parse against a fixed format list, else string; the column
//!   type is the predominant one above 80% agreement, otherwise `mixed`.

use crate::parsing::parser::{ParsedFile, SourceParser};
use crate::symbol::Symbol;
use crate::types::{Range, SymbolKind};
use serde_json::{Map, Value, json};
use std::path::Path;

const DELIMITER_CANDIDATES: &[char] = &[',', '\t', '|', ';', ':', ' '];
const SAMPLE_LINES: usize = 10;
const MAX_SAMPLE_ROWS: usize = 1000;
const TYPE_SAMPLE_VALUES: usize = 100;
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
];

#[derive(Debug, Clone, PartialEq)]
struct ColumnInfo {
    name: String,
    index: usize,
    data_type: &'static str,
    nullable: bool,
    unique_values: usize,
    sample_values: Vec<String>,
    statistics: Option<Map<String, Value>>,
}

#[derive(Debug)]
struct CsvSchema {
    delimiter: char,
    quote_char: char,
    has_header: bool,
    columns: Vec<ColumnInfo>,
    row_count: usize,
}

pub struct CsvParser;

impl CsvParser {
    pub fn new() -> Self {
        Self
    }

    fn detect_delimiter(content: &str) -> char {
        let sample: Vec<&str> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .take(SAMPLE_LINES)
            .collect();

        let mut best: Option<(char, usize)> = None;
        for &candidate in DELIMITER_CANDIDATES {
            let counts: Vec<usize> = sample
                .iter()
                .map(|line| line.matches(candidate).count())
                .collect();
            let Some(&first) = counts.first() else { continue };
            if first == 0 || counts.iter().any(|&c| c != first) {
                continue;
            }
            match best {
                Some((_, count)) if count >= first => {}
                _ => best = Some((candidate, first)),
            }
        }
        best.map(|(c, _)| c).unwrap_or(',')
    }

    fn detect_quote_char(content: &str) -> char {
        let double = content.matches('"').count();
        let single = content.matches('\'').count();
        if single > double { '\'' } else { '"' }
    }

    /// Split one line into fields, honoring the quote character (doubled
    /// quotes escape themselves).
    fn split_row(line: &str, delimiter: char, quote: char) -> Vec<String> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if c == quote {
                if in_quotes && chars.peek() == Some(&quote) {
                    field.push(quote);
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            } else if c == delimiter && !in_quotes {
                fields.push(field.clone());
                field.clear();
            } else {
                field.push(c);
            }
        }
        fields.push(field);
        fields
    }

    fn is_numeric(cell: &str) -> bool {
        !cell.trim().is_empty() && cell.trim().parse::<f64>().is_ok()
    }

    fn detect_header(rows: &[Vec<String>]) -> bool {
        if rows.len() < 2 {
            return true;
        }
        let first = &rows[0];
        let others = &rows[1..rows.len().min(11)];

        let header_score = first.iter().filter(|cell| !Self::is_numeric(cell)).count();
        let numeric_count: usize = others
            .iter()
            .flat_map(|row| row.iter())
            .filter(|cell| Self::is_numeric(cell))
            .count();

        header_score as f64 > first.len() as f64 * 0.7
            && numeric_count as f64 > (others.len() * first.len()) as f64 * 0.3
    }

    fn cell_type(cell: &str) -> &'static str {
        let value = cell.trim();
        let lowered = value.to_lowercase();
        if matches!(lowered.as_str(), "true" | "false" | "yes" | "no" | "1" | "0") {
            return "boolean";
        }
        if value.parse::<f64>().is_ok() {
            return "number";
        }
        for format in DATE_FORMATS {
            if format.contains("%H") {
                if chrono::NaiveDateTime::parse_from_str(value, format).is_ok() {
                    return "date";
                }
            } else if chrono::NaiveDate::parse_from_str(value, format).is_ok() {
                return "date";
            }
        }
        "string"
    }

    fn infer_type(values: &[String]) -> &'static str {
        let mut counts: std::collections::BTreeMap<&'static str, usize> = Default::default();
        for value in values.iter().take(TYPE_SAMPLE_VALUES) {
            if value.trim().is_empty() {
                continue;
            }
            *counts.entry(Self::cell_type(value)).or_insert(0) += 1;
        }
        if counts.is_empty() {
            return "string";
        }
        let total: usize = counts.values().sum();
        let Some((&kind, &count)) = counts.iter().max_by_key(|&(_, &count)| count) else {
            return "string";
        };
        if count as f64 / total as f64 > 0.8 { kind } else { "mixed" }
    }

    fn numeric_statistics(values: &[String]) -> Option<Map<String, Value>> {
        let mut numbers: Vec<f64> = values
            .iter()
            .filter_map(|v| v.trim().parse::<f64>().ok())
            .collect();
        if numbers.is_empty() {
            return None;
        }
        numbers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = numbers.len();
        let mean = numbers.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 1 {
            numbers[count / 2]
        } else {
            (numbers[count / 2 - 1] + numbers[count / 2]) / 2.0
        };
        let std_dev = if count > 1 {
            let variance =
                numbers.iter().map(|n| (n - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        let mut stats = Map::new();
        stats.insert("mean".into(), json!(mean));
        stats.insert("median".into(), json!(median));
        stats.insert("min".into(), json!(numbers[0]));
        stats.insert("max".into(), json!(numbers[count - 1]));
        stats.insert("std_dev".into(), json!(std_dev));
        Some(stats)
    }

    fn analyze_column(name: &str, index: usize, values: Vec<String>) -> ColumnInfo {
        let clean: Vec<String> = values
            .iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        let nullable = clean.len() < values.len();
        let unique_values = clean
            .iter()
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        let data_type = Self::infer_type(&clean);
        let statistics = (data_type == "number")
            .then(|| Self::numeric_statistics(&clean))
            .flatten();
        let sample_values = clean.iter().take(5).cloned().collect();

        ColumnInfo {
            name: name.to_string(),
            index,
            data_type,
            nullable,
            unique_values,
            sample_values,
            statistics,
        }
    }

    fn detect_schema(content: &str) -> Option<CsvSchema> {
        let delimiter = Self::detect_delimiter(content);
        let quote_char = Self::detect_quote_char(content);

        let rows: Vec<Vec<String>> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| Self::split_row(line, delimiter, quote_char))
            .collect();
        if rows.is_empty() {
            return None;
        }

        let has_header = Self::detect_header(&rows);
        let (names, data_rows): (Vec<String>, &[Vec<String>]) = if has_header {
            (rows[0].clone(), &rows[1..])
        } else {
            (
                (0..rows[0].len()).map(|i| format!("column_{i}")).collect(),
                &rows[..],
            )
        };
        let data_rows = &data_rows[..data_rows.len().min(MAX_SAMPLE_ROWS)];

        let columns = names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let values: Vec<String> = data_rows
                    .iter()
                    .map(|row| row.get(idx).cloned().unwrap_or_default())
                    .collect();
                Self::analyze_column(name, idx, values)
            })
            .collect();

        Some(CsvSchema {
            delimiter,
            quote_char,
            has_header,
            columns,
            row_count: rows.len() - usize::from(has_header),
        })
    }

    fn column_doc(column: &ColumnInfo) -> String {
        let mut doc = vec![
            format!("Column: {}", column.name),
            format!("Type: {}", column.data_type),
            format!("Nullable: {}", column.nullable),
            format!("Unique Values: {}", column.unique_values),
        ];
        if !column.sample_values.is_empty() {
            doc.push(format!(
                "Sample Values: {}",
                column.sample_values[..column.sample_values.len().min(3)].join(", ")
            ));
        }
        doc.join("\n")
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for CsvParser {
    fn language(&self) -> &'static str {
        "csv"
    }

    fn parse(&mut self, path: &Path, content: &str) -> ParsedFile {
        let mut parsed = ParsedFile::new(self.language());
        let Some(schema) = Self::detect_schema(content) else {
            return parsed;
        };
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("data");

        let schema_meta = json!({
            "delimiter": schema.delimiter.to_string(),
            "quote_char": schema.quote_char.to_string(),
            "has_header": schema.has_header,
            "column_count": schema.columns.len(),
            "row_count": schema.row_count,
        });
        parsed.symbols.push(
            Symbol::new(
                format!("{stem}_schema"),
                SymbolKind::Schema,
                Range::single_line(1, 0, 0),
            )
            .with_signature(format!(
                "delimiter={:?}, columns={}, rows={}",
                schema.delimiter,
                schema.columns.len(),
                schema.row_count
            ))
            .with_meta("schema", schema_meta),
        );

        if schema.has_header {
            for column in &schema.columns {
                let mut symbol = Symbol::new(
                    &column.name,
                    SymbolKind::Header,
                    Range::single_line(1, column.index.min(u16::MAX as usize) as u16, 0),
                )
                .with_signature(format!("{}: {}", column.name, column.data_type))
                .with_doc(Self::column_doc(column))
                .with_meta("column_index", column.index)
                .with_meta("data_type", column.data_type)
                .with_meta("nullable", column.nullable)
                .with_meta("unique_values", column.unique_values);
                if let Some(stats) = &column.statistics {
                    symbol = symbol.with_meta("statistics", Value::Object(stats.clone()));
                }
                parsed.symbols.push(symbol);
            }
        }

        let count_of = |wanted: &str| {
            schema
                .columns
                .iter()
                .filter(|c| c.data_type == wanted)
                .count()
        };
        parsed.symbols.push(
            Symbol::new(
                format!("{stem}_statistics"),
                SymbolKind::Statistic,
                Range::single_line(1, 0, 0),
            )
            .with_signature(format!(
                "rows={}, columns={}",
                schema.row_count,
                schema.columns.len()
            ))
            .with_meta("total_rows", schema.row_count)
            .with_meta("total_columns", schema.columns.len())
            .with_meta("delimiter", schema.delimiter.to_string())
            .with_meta("has_header", schema.has_header)
            .with_meta("numeric_columns", count_of("number"))
            .with_meta("string_columns", count_of("string"))
            .with_meta("date_columns", count_of("date"))
            .with_meta("boolean_columns", count_of("boolean"))
            .with_meta("mixed_columns", count_of("mixed")),
        );

        parsed
            .file_metadata
            .insert("row_count".into(), json!(schema.row_count));
        parsed
            .file_metadata
            .insert("column_count".into(), json!(schema.columns.len()));
        parsed
    }
}
