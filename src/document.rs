use crate::types::CellValue;

/// One row of data addressed by column name.
///
/// Columns keep their insertion order, which is the order they are written
/// to the engine in. Setting a column that already exists replaces its value
/// in place without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, CellValue)>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Document {
            entries: Vec::new(),
        }
    }

    /// Set a column value, replacing any existing value for the same column.
    pub fn set(&mut self, column: impl Into<String>, value: CellValue) {
        let column = column.into();
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| *name == column) {
            entry.1 = value;
        } else {
            self.entries.push((column, value));
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild the document by passing every value through `f`, keeping the
    /// column order intact.
    #[must_use]
    pub fn map_values(self, mut f: impl FnMut(CellValue) -> CellValue) -> Self {
        Document {
            entries: self
                .entries
                .into_iter()
                .map(|(name, value)| (name, f(value)))
                .collect(),
        }
    }
}

impl FromIterator<(String, CellValue)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, CellValue)>>(iter: T) -> Self {
        let mut doc = Document::new();
        for (name, value) in iter {
            doc.set(name, value);
        }
        doc
    }
}

impl IntoIterator for Document {
    type Item = (String, CellValue);
    type IntoIter = std::vec::IntoIter<(String, CellValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_preserves_insertion_order() {
        let mut doc = Document::new();
        doc.set("b", CellValue::Int(2));
        doc.set("a", CellValue::Int(1));
        doc.set("b", CellValue::Int(20));

        let columns: Vec<&str> = doc.columns().collect();
        assert_eq!(columns, vec!["b", "a"]);
        assert_eq!(doc.get("b"), Some(&CellValue::Int(20)));
    }

    #[test]
    fn map_values_keeps_columns() {
        let doc: Document = vec![
            ("x".to_string(), CellValue::Int(1)),
            ("y".to_string(), CellValue::Null),
        ]
        .into_iter()
        .collect();

        let doubled = doc.map_values(|v| match v {
            CellValue::Int(i) => CellValue::Int(i * 2),
            other => other,
        });

        assert_eq!(doubled.get("x"), Some(&CellValue::Int(2)));
        assert_eq!(doubled.get("y"), Some(&CellValue::Null));
    }
}
