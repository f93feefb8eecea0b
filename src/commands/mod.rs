//! Command implementations behind the `systemlink` binary. Every command
//! writes JSON to the given writer.

use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::batch::{BatchItem, ItemError, PartialSuccess};

mod config;
pub mod executions;
pub mod notebooks;
pub mod results;

pub use config::connection;

fn print_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[derive(Serialize)]
struct FailedItem<'a> {
    id: Option<&'a str>,
    error: &'a ItemError,
}

#[derive(Serialize)]
struct BatchReport<'a, T> {
    succeeded: &'a [T],
    failed: Vec<FailedItem<'a>>,
}

/// Prints a batch outcome and fails when any item failed.
fn report_batch<W, I, T>(out: &mut W, outcome: &PartialSuccess<I, T>, what: &str) -> Result<()>
where
    W: Write,
    I: BatchItem,
    T: Serialize,
{
    let report = BatchReport {
        succeeded: &outcome.succeeded,
        failed: outcome
            .failed
            .iter()
            .map(|(item, error)| FailedItem {
                id: item.batch_id(),
                error,
            })
            .collect(),
    };
    print_json(out, &report)?;

    if outcome.has_failures() {
        anyhow::bail!(
            "{} of {} {} failed",
            outcome.failed.len(),
            outcome.len(),
            what
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_report_batch_fails_on_partial_failure() {
        let outcome: PartialSuccess<String> = PartialSuccess {
            succeeded: vec!["a".to_string()],
            failed: vec![("b".to_string(), ItemError::new("NotFound", "gone"))],
            error_summary: Vec::new(),
        };

        let mut out = Vec::new();
        let err = report_batch(&mut out, &outcome, "deletions").unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 deletions failed");

        let printed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            printed,
            json!({
                "succeeded": ["a"],
                "failed": [{"id": "b", "error": {"code": "NotFound", "message": "gone"}}]
            })
        );
    }
}
