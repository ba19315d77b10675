//! Schema inference over a sampled prefix of raw rows
//!
//! Each column gets the most specific type on the ladder
//! boolean → integer → float → datetime → text under which every sampled
//! non-null value coerces. The result depends only on the inputs.

use crate::data::datatable::{DataColumn, DataType};
use crate::data::type_inference::TypeCoercer;
use std::collections::HashSet;
use tracing::debug;

/// Default number of data rows sampled for inference
pub const DEFAULT_SAMPLE_ROWS: usize = 1000;

pub struct SchemaInferrer<'a> {
    coercer: &'a TypeCoercer,
    sample_rows: Option<usize>,
}

impl<'a> SchemaInferrer<'a> {
    /// `sample_rows` of `None` (or `Some(0)`) samples every row
    pub fn new(coercer: &'a TypeCoercer, sample_rows: Option<usize>) -> Self {
        Self {
            coercer,
            sample_rows: sample_rows.filter(|n| *n > 0),
        }
    }

    /// Infer the schema for `headers` from the leading rows of `rows`.
    /// Rows may be ragged: missing cells count as null, extra cells are ignored.
    pub fn infer(&self, headers: &[String], rows: &[Vec<String>]) -> Vec<DataColumn> {
        let names = unique_column_names(headers);
        let sample = match self.sample_rows {
            Some(n) => &rows[..rows.len().min(n)],
            None => rows,
        };

        let columns: Vec<DataColumn> = names
            .into_iter()
            .enumerate()
            .map(|(col_idx, name)| {
                let values = sample
                    .iter()
                    .map(|row| row.get(col_idx).map(String::as_str).unwrap_or(""));
                let (data_type, null_count) = self.infer_column(values);
                DataColumn {
                    name,
                    data_type,
                    nullable: null_count > 0,
                    null_count,
                }
            })
            .collect();

        debug!(
            columns = columns.len(),
            sampled_rows = sample.len(),
            "Inferred schema"
        );

        columns
    }

    /// Returns the committed type and the number of nulls seen
    fn infer_column<'v, I>(&self, values: I) -> (DataType, usize)
    where
        I: Iterator<Item = &'v str>,
    {
        let mut candidates: Vec<DataType> = DataType::LADDER.to_vec();
        let mut empty_count = 0;
        // whitespace-only cells are null for typed columns but kept verbatim as text
        let mut blank_count = 0;
        let mut seen_value = false;

        for value in values {
            if value.is_empty() {
                empty_count += 1;
                continue;
            }
            if value.trim().is_empty() {
                blank_count += 1;
                continue;
            }
            seen_value = true;
            candidates.retain(|candidate| self.coercer.can_coerce_to(value, *candidate));
        }

        if !seen_value {
            return (DataType::Text, empty_count);
        }

        // Text is always a candidate, so the first remaining one is the most specific
        let data_type = candidates.first().copied().unwrap_or(DataType::Text);
        let null_count = match data_type {
            DataType::Text => empty_count,
            _ => empty_count + blank_count,
        };
        (data_type, null_count)
    }
}

/// Make header names unique (ASCII case-insensitive) by appending the 1-based
/// column position. Blank headers become `column_<position>`.
pub fn unique_column_names(headers: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(headers.len());

    for (idx, header) in headers.iter().enumerate() {
        let position = idx + 1;
        let base = if header.trim().is_empty() {
            format!("column_{}", position)
        } else {
            header.clone()
        };

        let mut candidate = base.clone();
        while seen.contains(&candidate.to_ascii_lowercase()) {
            candidate = format!("{}_{}", candidate, position);
        }
        if candidate != base {
            debug!(header = %base, renamed = %candidate, "Disambiguated duplicate header");
        }

        seen.insert(candidate.to_ascii_lowercase());
        names.push(candidate);
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::datatable::DataValue;
    use crate::data::type_inference::{Coerced, CoercionOptions};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter().map(|r| strings(r)).collect()
    }

    #[test]
    fn test_infers_example_schema() {
        let coercer = TypeCoercer::default();
        let inferrer = SchemaInferrer::new(&coercer, None);
        let schema = inferrer.infer(
            &strings(&["id", "name", "age"]),
            &rows(&[&["1", "Alice", "30"], &["2", "Bob", ""]]),
        );

        let summary: Vec<String> = schema.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            summary,
            vec!["id:integer", "name:text", "age:integer(nullable)"]
        );
    }

    #[test]
    fn test_whitespace_cells_null_only_for_typed_columns() {
        let coercer = TypeCoercer::default();
        let inferrer = SchemaInferrer::new(&coercer, None);
        let schema = inferrer.infer(
            &strings(&["note", "qty", "blank"]),
            &rows(&[&[" ", "1", " "], &["x", "  ", ""]]),
        );

        let summary: Vec<String> = schema.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            summary,
            vec!["note:text", "qty:integer(nullable)", "blank:text(nullable)"]
        );
        assert_eq!(coercer.coerce(" ", DataType::Text), Coerced::Value(DataValue::Text(" ".to_string())));
    }

    #[test]
    fn test_ladder_picks_most_specific_common_type() {
        let coercer = TypeCoercer::default();
        let inferrer = SchemaInferrer::new(&coercer, None);
        let schema = inferrer.infer(
            &strings(&["flag", "count", "price", "when", "mixed"]),
            &rows(&[
                &["true", "1", "1", "2024-01-01", "1"],
                &["false", "2", "2.5", "2024-02-01 10:00:00", "x"],
            ]),
        );

        let types: Vec<DataType> = schema.iter().map(|c| c.data_type).collect();
        assert_eq!(
            types,
            vec![
                DataType::Boolean,
                DataType::Integer,
                DataType::Float,
                DataType::DateTime,
                DataType::Text
            ]
        );
    }

    #[test]
    fn test_boolean_vocabulary_drives_inference() {
        let options = CoercionOptions {
            true_values: vec!["1".to_string()],
            false_values: vec!["0".to_string()],
            ..CoercionOptions::default()
        };
        let coercer = TypeCoercer::new(&options);
        let inferrer = SchemaInferrer::new(&coercer, None);
        let schema = inferrer.infer(&strings(&["active"]), &rows(&[&["1"], &["0"]]));
        assert_eq!(schema[0].data_type, DataType::Boolean);

        let default = TypeCoercer::default();
        let schema = SchemaInferrer::new(&default, None)
            .infer(&strings(&["active"]), &rows(&[&["1"], &["0"]]));
        assert_eq!(schema[0].data_type, DataType::Integer);
    }

    #[test]
    fn test_all_null_column_is_nullable_text() {
        let coercer = TypeCoercer::default();
        let schema = SchemaInferrer::new(&coercer, None)
            .infer(&strings(&["empty"]), &rows(&[&[""], &[""]]));
        assert_eq!(schema[0].data_type, DataType::Text);
        assert!(schema[0].nullable);
        assert_eq!(schema[0].null_count, 2);
    }

    #[test]
    fn test_sample_is_bounded() {
        let coercer = TypeCoercer::default();
        let data = rows(&[&["1"], &["2"], &["oops"]]);

        let sampled = SchemaInferrer::new(&coercer, Some(2)).infer(&strings(&["n"]), &data);
        assert_eq!(sampled[0].data_type, DataType::Integer);

        let full = SchemaInferrer::new(&coercer, Some(0)).infer(&strings(&["n"]), &data);
        assert_eq!(full[0].data_type, DataType::Text);
    }

    #[test]
    fn test_short_rows_count_as_null() {
        let coercer = TypeCoercer::default();
        let schema = SchemaInferrer::new(&coercer, None)
            .infer(&strings(&["a", "b"]), &rows(&[&["1", "2"], &["3"]]));
        assert!(!schema[0].nullable);
        assert!(schema[1].nullable);
        assert_eq!(schema[1].data_type, DataType::Integer);
    }

    #[test]
    fn test_inference_is_deterministic() {
        let coercer = TypeCoercer::default();
        let inferrer = SchemaInferrer::new(&coercer, Some(10));
        let headers = strings(&["a", "b", "c"]);
        let data = rows(&[&["1", "x", "2024-01-01"], &["", "y", "2024-01-02"]]);
        assert_eq!(inferrer.infer(&headers, &data), inferrer.infer(&headers, &data));
    }

    #[test]
    fn test_duplicate_headers_get_positional_suffix() {
        let names = unique_column_names(&strings(&["id", "name", "ID", "name", ""]));
        assert_eq!(names, vec!["id", "name", "ID_3", "name_4", "column_5"]);
    }

    #[test]
    fn test_suffix_collision_is_resolved() {
        let names = unique_column_names(&strings(&["a_2", "a", "a"]));
        assert_eq!(names, vec!["a_2", "a", "a_3"]);

        let names = unique_column_names(&strings(&["a", "a", "a_2"]));
        assert_eq!(names, vec!["a", "a_2", "a_2_3"]);
    }
}
