//! Partial-success aggregation for batch create, update and delete calls.
//!
//! Batch endpoints answer with the items that succeeded, the submitted items
//! that failed, and an error tree. [`aggregate`] folds those three lists back
//! onto the submitted inputs so every input ends up in exactly one of
//! `succeeded` or `failed`, in submission order.

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::http::ClientError;

/// Code given to inputs the server reported no outcome for.
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN";

/// Identity used to match server outcomes back to submitted inputs.
pub trait BatchItem {
    /// Id that errors and echoed failures refer to.
    fn batch_id(&self) -> Option<&str>;

    /// Key shared by an input and the item it produced on success.
    fn match_key(&self) -> Option<&str> {
        self.batch_id()
    }
}

impl BatchItem for String {
    fn batch_id(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

/// Error attributed to one batch item, or to the batch as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl ItemError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            resource_id: None,
        }
    }

    pub fn unknown(resource_id: Option<&str>) -> Self {
        Self {
            code: UNKNOWN_ERROR_CODE.to_string(),
            message: "The server did not report an outcome for this item".to_string(),
            resource_id: resource_id.map(str::to_string),
        }
    }
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.resource_id {
            Some(id) => write!(f, "{} ({}): {}", self.code, id, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/// Error object as the services serialize it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Position of the submitted item this error belongs to, when the
    /// service reports one.
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub inner_errors: Vec<ApiErrorBody>,
}

impl ApiErrorBody {
    /// Collapses the wire error into an [`ItemError`]. `name` wins over the
    /// numeric `code`.
    pub fn to_item_error(&self) -> ItemError {
        let code = self
            .name
            .clone()
            .or_else(|| self.code.map(|c| c.to_string()))
            .unwrap_or_else(|| UNKNOWN_ERROR_CODE.to_string());
        ItemError {
            code,
            message: self.message.clone().unwrap_or_default(),
            resource_id: self.resource_id.clone(),
        }
    }

    fn correlation(&self) -> Correlation {
        match (self.index, &self.resource_id) {
            (Some(index), _) => Correlation::Index(index),
            (None, Some(id)) => Correlation::Id(id.clone()),
            (None, None) => Correlation::Positional,
        }
    }
}

/// How an error names the input it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    Index(usize),
    Id(String),
    /// No tag; matched against the echoed failures, then the first input
    /// without an outcome.
    Positional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedError {
    pub correlation: Correlation,
    pub error: ItemError,
}

/// Batch response split into its parts, before correlation with inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatchResponse<I, T = I> {
    pub succeeded: Vec<T>,
    pub failed: Vec<I>,
    pub errors: Vec<TaggedError>,
    /// Error reported for the whole batch without per-item detail.
    pub batch_error: Option<ItemError>,
}

impl<I, T> RawBatchResponse<I, T> {
    /// Splits the service error tree: inner errors become per-item errors,
    /// a top-level error without inner errors applies to the whole batch.
    pub fn new(succeeded: Vec<T>, failed: Vec<I>, error: Option<ApiErrorBody>) -> Self {
        let (errors, batch_error) = match error {
            Some(error) if !error.inner_errors.is_empty() => {
                let errors = error
                    .inner_errors
                    .iter()
                    .map(|inner| TaggedError {
                        correlation: inner.correlation(),
                        error: inner.to_item_error(),
                    })
                    .collect();
                (errors, None)
            }
            Some(error) => (Vec::new(), Some(error.to_item_error())),
            None => (Vec::new(), None),
        };

        Self {
            succeeded,
            failed,
            errors,
            batch_error,
        }
    }
}

/// Outcome of a batch call. Inspect `failed` to detect partial failure.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialSuccess<I, T = I> {
    pub succeeded: Vec<T>,
    pub failed: Vec<(I, ItemError)>,
    pub error_summary: Vec<ItemError>,
}

impl<I, T> PartialSuccess<I, T> {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum Slot<T> {
    Pending,
    Succeeded(T),
    Failed(Option<ItemError>),
}

fn is_pending<T>(slot: &Slot<T>) -> bool {
    matches!(slot, Slot::Pending)
}

/// Finds the pending input an echoed failure refers to: by id first, then by
/// value.
fn position_of_echo<I, T>(inputs: &[I], slots: &[Slot<T>], echoed: &I) -> Option<usize>
where
    I: BatchItem + PartialEq,
{
    if let Some(id) = echoed.batch_id() {
        let by_id = (0..inputs.len())
            .find(|&i| is_pending(&slots[i]) && inputs[i].batch_id() == Some(id));
        if by_id.is_some() {
            return by_id;
        }
    }
    (0..inputs.len()).find(|&i| is_pending(&slots[i]) && &inputs[i] == echoed)
}

/// Correlates a raw batch response with the submitted `inputs`.
///
/// 1. Echoed failures are matched to inputs by id, then by value.
/// 2. Errors are attached by explicit index, then by resource id, otherwise
///    positionally: the k-th untagged error belongs to the k-th echoed
///    failure, or to the first input still without an outcome.
/// 3. Succeeded items are matched by match key when an input carries it, else
///    they fill the remaining inputs in submission order.
/// 4. Inputs still without an outcome fail with an `UNKNOWN` error.
///
/// An index out of range, an unknown resource id, or more outcomes than
/// inputs is a [`ClientError::Protocol`].
pub fn aggregate<I, T>(inputs: Vec<I>, raw: RawBatchResponse<I, T>) -> Result<PartialSuccess<I, T>>
where
    I: BatchItem + PartialEq,
    T: BatchItem,
{
    let RawBatchResponse {
        succeeded: raw_succeeded,
        failed: raw_failed,
        errors,
        batch_error,
    } = raw;

    let n = inputs.len();
    let mut slots: Vec<Slot<T>> = (0..n).map(|_| Slot::Pending).collect();
    let mut error_summary = Vec::new();

    if let Some(error) = &batch_error {
        error_summary.push(error.clone());
    }

    let mut echoed_positions = Vec::with_capacity(raw_failed.len());
    for echoed in &raw_failed {
        let position = position_of_echo(&inputs, &slots, echoed).ok_or_else(|| {
            ClientError::protocol(format!(
                "failed item {} does not match any submitted item",
                echoed.batch_id().unwrap_or("without id")
            ))
        })?;
        slots[position] = Slot::Failed(None);
        echoed_positions.push(position);
    }

    let mut untagged = 0;
    for tagged in errors {
        error_summary.push(tagged.error.clone());

        let target = match &tagged.correlation {
            Correlation::Index(index) => {
                if *index >= n {
                    return Err(ClientError::protocol(format!(
                        "error references item index {} but only {} items were submitted",
                        index, n
                    ))
                    .into());
                }
                Some(*index)
            }
            Correlation::Id(id) => {
                let matches_id = |i: usize| inputs[i].batch_id() == Some(id.as_str());
                let position = (0..n)
                    .find(|&i| matches_id(i) && !matches!(slots[i], Slot::Failed(Some(_))))
                    .or_else(|| (0..n).find(|&i| matches_id(i)))
                    .ok_or_else(|| {
                        ClientError::protocol(format!(
                            "error references id {} which was not submitted",
                            id
                        ))
                    })?;
                Some(position)
            }
            Correlation::Positional => {
                let position = echoed_positions
                    .get(untagged)
                    .copied()
                    .or_else(|| slots.iter().position(is_pending));
                untagged += 1;
                position
            }
        };

        if let Some(position) = target {
            let slot = &mut slots[position];
            if !matches!(slot, Slot::Failed(Some(_))) {
                *slot = Slot::Failed(Some(tagged.error));
            }
        }
    }

    for item in raw_succeeded {
        let position = match item.match_key() {
            Some(id) if inputs.iter().any(|input| input.match_key() == Some(id)) => (0..n)
                .find(|&i| is_pending(&slots[i]) && inputs[i].match_key() == Some(id))
                .ok_or_else(|| {
                    ClientError::protocol(format!(
                        "item {} reported as succeeded after it was already accounted for",
                        id
                    ))
                })?,
            _ => slots.iter().position(is_pending).ok_or_else(|| {
                ClientError::protocol(format!(
                    "server reported more outcomes than the {} submitted items",
                    n
                ))
            })?,
        };
        slots[position] = Slot::Succeeded(item);
    }

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for (input, slot) in inputs.into_iter().zip(slots) {
        match slot {
            Slot::Succeeded(item) => succeeded.push(item),
            Slot::Failed(Some(error)) => failed.push((input, error)),
            Slot::Failed(None) => {
                let error = match &batch_error {
                    Some(error) => error.clone(),
                    None => {
                        let error = ItemError::unknown(input.batch_id());
                        error_summary.push(error.clone());
                        error
                    }
                };
                failed.push((input, error));
            }
            Slot::Pending => {
                warn!(
                    "No outcome reported for submitted item {}, treating it as failed",
                    input.batch_id().unwrap_or("without id")
                );
                let error = ItemError::unknown(input.batch_id());
                error_summary.push(error.clone());
                failed.push((input, error));
            }
        }
    }

    info!(
        "Batch finished: {} succeeded, {} failed",
        succeeded.len(),
        failed.len()
    );

    Ok(PartialSuccess {
        succeeded,
        failed,
        error_summary,
    })
}
