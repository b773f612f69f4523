//! Loading input items from files and appending routed items to output files

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{CommonError, Result};
use crate::types::{AttributeSet, InputItem};

/// Read one attribute set per line from a JSON-lines file.
///
/// Each line must be a JSON object. String values are kept as-is, `null` stays
/// null, and any other scalar is stringified. Nested arrays/objects are
/// rejected since attribute sets are flat.
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<InputItem>> {
    let path = path.as_ref();
    let mut items = Vec::new();

    for (index, line) in serde_jsonlines::json_lines::<BTreeMap<String, Value>, _>(path)?.enumerate() {
        let object = line.map_err(|e| CommonError::invalid_input(index + 1, e.to_string()))?;
        let mut attributes = AttributeSet::new();
        for (name, value) in object {
            let raw = match value {
                Value::Null => None,
                Value::String(s) => Some(s),
                Value::Bool(b) => Some(b.to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Array(_) | Value::Object(_) => {
                    return Err(CommonError::invalid_input(
                        index + 1,
                        format!("attribute '{}' is not a scalar", name),
                    ));
                },
            };
            attributes.insert(name, raw);
        }
        items.push(InputItem::new(attributes));
    }

    debug!(path = %path.display(), items = items.len(), "Loaded JSON-lines input");
    Ok(items)
}

/// Read one attribute set per row from a CSV file with a header row.
///
/// Empty cells are kept as blank strings.
pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<InputItem>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut items = Vec::new();
    for row in reader.records() {
        let row = row?;
        let attributes: AttributeSet = headers
            .iter()
            .zip(row.iter())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        items.push(InputItem::new(attributes));
    }

    debug!(path = %path.display(), items = items.len(), "Loaded CSV input");
    Ok(items)
}

/// Append serializable values to a JSON-lines file, creating it if needed
pub fn append_jsonl<T, I>(path: impl AsRef<Path>, values: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    serde_jsonlines::append_json_lines(path, values)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_jsonl_keeps_nulls_and_stringifies_scalars() {
        let file = temp_file(
            "{\"x\": \"1.5\", \"y\": null, \"n\": 42, \"flag\": true}\n{\"x\": \"2\"}\n",
        );

        let items = read_jsonl(file.path()).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0].attributes;
        assert_eq!(first.get("x"), Some("1.5"));
        assert_eq!(first.get("y"), None);
        assert!(first.contains("y"));
        assert_eq!(first.get("n"), Some("42"));
        assert_eq!(first.get("flag"), Some("true"));
    }

    #[test]
    fn test_read_jsonl_rejects_nested_values() {
        let file = temp_file("{\"x\": \"1\"}\n{\"x\": [1, 2]}\n");

        let err = read_jsonl(file.path()).unwrap_err();
        assert!(matches!(err, CommonError::InvalidInput { line: 2, .. }));
    }

    #[test]
    fn test_read_csv_uses_header_names() {
        let file = temp_file("x,y,TEXT\n1.0,2.0,hello\n3.0,,\n");

        let items = read_csv(file.path()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].attributes.get("TEXT"), Some("hello"));
        assert_eq!(items[1].attributes.get("y"), Some(""));
    }

    #[test]
    fn test_append_jsonl_appends() {
        let file = NamedTempFile::new().unwrap();

        append_jsonl(file.path(), [serde_json::json!({"a": 1})]).unwrap();
        append_jsonl(file.path(), [serde_json::json!({"a": 2})]).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
