//! CSV loading of payment batches.
//!
//! Expects a header row with `addr` and `amnt` columns. Amounts are kept as
//! text so that a malformed value can be reported against its position in
//! the batch by the validator.

use crate::error::Result;
use crate::request::{PaymentRequest, PaymentRow};
use csv::{ReaderBuilder, Trim};
use log::debug;
use std::io::Read;

/// Reads every payment row, in file order.
///
/// A row the CSV reader cannot decode at all is fatal: the batch must be
/// processed in full or not at all.
pub fn load_requests<R: Read>(reader: R) -> Result<Vec<PaymentRequest>> {
    let mut csv_reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut requests = Vec::new();
    for result in csv_reader.deserialize::<PaymentRow>() {
        let row = result?;
        requests.push(PaymentRequest::from(row));
    }

    debug!("Loaded {} payment rows", requests.len());
    Ok(requests)
}
