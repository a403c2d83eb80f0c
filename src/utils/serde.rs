use serde::{Deserialize, Serialize};

/// Upstream fields that arrive as a single object, a list, or nothing at all.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    None,
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::None
    }
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            Self::None => [].iter(),
            Self::One(value) => std::slice::from_ref(value).iter(),
            Self::Many(values) => values.iter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OneOrMany;

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Term {
        term: Option<String>,
    }

    #[test]
    fn one_or_many_helpers_cover_all_shapes() {
        assert_eq!(OneOrMany::<String>::None.iter().count(), 0);
        assert_eq!(
            OneOrMany::One("X".to_string()).iter().next().map(String::as_str),
            Some("X")
        );
        assert_eq!(
            OneOrMany::Many(vec!["A".to_string(), "B".to_string()])
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        assert_eq!(OneOrMany::One(1).iter().count(), 1);
    }

    #[test]
    fn one_or_many_deserializes_objects_and_lists() {
        let one: OneOrMany<Term> = serde_json::from_value(serde_json::json!({"term": "a"})).unwrap();
        assert_eq!(one.iter().count(), 1);

        let many: OneOrMany<Term> =
            serde_json::from_value(serde_json::json!([{"term": "a"}, {"term": "b"}])).unwrap();
        assert_eq!(many.iter().count(), 2);

        let none: OneOrMany<Term> = serde_json::from_value(serde_json::Value::Null).unwrap();
        assert!(none.iter().next().is_none());
    }
}
