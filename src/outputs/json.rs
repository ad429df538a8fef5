//! JSON rendering.
//!
//! A single collection renders as the serialized [`TrendCollection`]. A batch
//! renders as:
//!
//! ```text
//! {
//!   "results": { "<source>": <collection>, ... },
//!   "errors":  { "<source>": { "kind": "parse", "message": "..." }, ... }
//! }
//! ```

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::manager::BatchReport;
use crate::models::TrendCollection;

#[derive(Serialize)]
struct ErrorEntry {
    kind: &'static str,
    message: String,
}

#[derive(Serialize)]
struct BatchDocument<'a> {
    results: BTreeMap<&'a str, &'a TrendCollection>,
    errors: BTreeMap<&'a str, ErrorEntry>,
}

pub fn collection_to_json(collection: &TrendCollection) -> Result<String> {
    Ok(serde_json::to_string_pretty(collection)?)
}

pub fn batch_to_json(report: &BatchReport) -> Result<String> {
    let document = BatchDocument {
        results: report.successes().collect(),
        errors: report
            .failures()
            .map(|(name, e)| {
                (
                    name,
                    ErrorEntry {
                        kind: e.kind(),
                        message: e.to_string(),
                    },
                )
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::Trend;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    #[test]
    fn test_collection_json_has_total_count() {
        let trends = vec![
            Trend::builder("One", "demo").build().unwrap(),
            Trend::builder("Two", "demo").tag("ai").build().unwrap(),
        ];
        let json = collection_to_json(&TrendCollection::with_trends("demo", trends)).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["source"], "demo");
        assert_eq!(value["total_count"], 2);
        assert_eq!(value["trends"][1]["tags"][0], "ai");
    }

    #[test]
    fn test_batch_json_separates_errors() {
        let report = BatchReport::from(BTreeMap::from([
            ("demo".to_string(), Ok(TrendCollection::new("demo"))),
            (
                "gone".to_string(),
                Err(Error::NotFound {
                    name: "gone".to_string(),
                }),
            ),
        ]));
        let value: Value = serde_json::from_str(&batch_to_json(&report).unwrap()).unwrap();

        assert_eq!(value["results"]["demo"]["total_count"], 0);
        assert_eq!(value["errors"]["gone"]["kind"], "not_found");
        assert!(value["results"].get("gone").is_none());
    }
}
