use indexmap::IndexMap;

/// One extracted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Int(u32),
    List(Vec<String>),
    /// The label for this field never appeared on the page.
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Renders the value as a single CSV cell with no line breaks.
    pub fn to_cell(&self) -> String {
        match self {
            Value::Text(s) => single_line(s),
            Value::Int(n) => n.to_string(),
            Value::List(items) => items
                .iter()
                .map(|item| single_line(item))
                .collect::<Vec<_>>()
                .join("; "),
            Value::Missing => String::new(),
        }
    }
}

impl From<Option<&str>> for Value {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Value::Missing, |s| Value::Text(s.to_string()))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::List(value)
    }
}

#[inline]
fn single_line(s: &str) -> String {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Where a record was scraped from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub url: String,
    pub page_number: usize,
    pub number: usize,
}

/// Field name -> value, in insertion order. The order becomes the CSV column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a field. A replaced field keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn cells(&self) -> impl Iterator<Item = String> + '_ {
        self.fields.values().map(Value::to_cell)
    }

    pub fn with_provenance(&self, provenance: &Provenance) -> Record {
        let mut record = self.clone();
        record.insert("url", provenance.url.as_str());
        record.insert("page_number", Value::Text(provenance.page_number.to_string()));
        record.insert("number", Value::Text(provenance.number.to_string()));
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_never_span_lines() {
        let value = Value::Text("  Unit 4\n\n  Dock Road \r\nLiverpool\n".to_string());
        assert_eq!(value.to_cell(), "Unit 4 Dock Road Liverpool");

        let list = Value::List(vec!["Acme\nLtd".to_string(), "Beta".to_string()]);
        assert_eq!(list.to_cell(), "Acme Ltd; Beta");
        assert_eq!(Value::Missing.to_cell(), "");
    }

    #[test]
    fn provenance_columns_come_last() {
        let mut record = Record::new();
        record.insert("title", "Road works");
        record.insert("suppliers_n", 2u32);

        let with = record.with_provenance(&Provenance {
            url: "https://example.org/notice/1".to_string(),
            page_number: 3,
            number: 7,
        });
        let names: Vec<&str> = with.field_names().collect();
        assert_eq!(names, ["title", "suppliers_n", "url", "page_number", "number"]);
        let cells: Vec<String> = with.cells().collect();
        assert_eq!(cells[1..], ["2", "https://example.org/notice/1", "3", "7"]);
    }
}
