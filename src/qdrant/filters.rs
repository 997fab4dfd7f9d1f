//! Filter helpers for scoping Qdrant point operations.

use serde_json::{Value, json};

/// Exact-match filter selecting every record of one source file.
pub fn file_path_filter(file_path: &str) -> Value {
    json!({
        "must": [
            {
                "key": "file_path",
                "match": { "value": file_path }
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_path_filter_matches_exact_value() {
        let filter = file_path_filter("/docs/guides/setup.md");
        assert_eq!(
            filter,
            json!({
                "must": [
                    {
                        "key": "file_path",
                        "match": { "value": "/docs/guides/setup.md" }
                    }
                ]
            })
        );
    }
}
