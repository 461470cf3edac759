//! Fee and amount summary of a prepared transaction

use serde::{Deserialize, Serialize};

use super::prepared::{OutputCategory, PreparedTransaction};
use crate::error::{SignerError, SignerResult};
use crate::types::Network;
use crate::utils::amount::{format_amount, parse_amount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub network: Network,
    pub network_fee: String,
    pub blockio_fee: String,
    pub total_amount_to_send: String,
}

pub fn summarize_prepared_transaction(prepared: &PreparedTransaction) -> SignerResult<TransactionSummary> {
    let mut input_total: u64 = 0;
    for input in &prepared.inputs {
        input_total = checked_add(input_total, parse_amount(&input.input_value)?)?;
    }

    let mut output_total: u64 = 0;
    let mut blockio_fee: u64 = 0;
    let mut to_send: u64 = 0;
    for output in &prepared.outputs {
        let value = parse_amount(&output.output_value)?;
        output_total = checked_add(output_total, value)?;
        match output.output_category {
            OutputCategory::BlockioFee => blockio_fee = checked_add(blockio_fee, value)?,
            OutputCategory::UserSpecified => to_send = checked_add(to_send, value)?,
            OutputCategory::Change => {}
        }
    }

    let network_fee = input_total.checked_sub(output_total).ok_or_else(|| {
        SignerError::invalid_transaction(format!(
            "Outputs ({}) exceed inputs ({})",
            format_amount(output_total),
            format_amount(input_total)
        ))
    })?;

    Ok(TransactionSummary {
        network: prepared.network,
        network_fee: format_amount(network_fee),
        blockio_fee: format_amount(blockio_fee),
        total_amount_to_send: format_amount(to_send),
    })
}

fn checked_add(a: u64, b: u64) -> SignerResult<u64> {
    a.checked_add(b)
        .ok_or_else(|| SignerError::invalid_transaction("Amount total overflows"))
}
