//! Query-string parameters for kintone GET requests

/// Ordered list of query parameters.
///
/// kintone expects arrays as indexed keys (`fields[0]=a&fields[1]=b`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single parameter
    pub fn set(mut self, key: &str, value: impl ToString) -> Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a parameter only when a value is present
    pub fn set_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    /// Add an array parameter as `key[0]`, `key[1]`, ...
    pub fn set_list<S: AsRef<str>>(mut self, key: &str, values: &[S]) -> Self {
        for (i, v) in values.iter().enumerate() {
            self.pairs
                .push((format!("{}[{}]", key, i), v.as_ref().to_string()));
        }
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_lists_and_optional_values() {
        let q = Query::new()
            .set("app", "5")
            .set_opt("query", None::<String>)
            .set_list("fields", &["a", "b"])
            .set("limit", 10)
            .set_opt("name", Some("Sales"));

        assert_eq!(
            q.pairs(),
            &[
                ("app".to_string(), "5".to_string()),
                ("fields[0]".to_string(), "a".to_string()),
                ("fields[1]".to_string(), "b".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("name".to_string(), "Sales".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_list_adds_nothing() {
        let q = Query::new().set_list::<String>("ids", &[]);
        assert!(q.is_empty());
    }
}
