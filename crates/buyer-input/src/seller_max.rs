//! Greedy packing that tries to fill the whole seller budget.
//!
//! The size of the payload is tracked as the sum of the compressed sizes of
//! every candidate on its own. That sum drifts from the real compressed size
//! so whenever a candidate seems not to fit the exact size is computed
//! instead, at most `max_recalculations` times per run.

use {
    crate::{
        Error,
        Packer,
        Payload,
        Status,
        encoding::BuyerInput,
        input::{self, Inputs},
        metrics,
    },
    model::BuyerId,
};

/// Once recalculations are exhausted the loop stops as soon as the estimate
/// reaches this share of the budget.
const STOPPING_THRESHOLD: f64 = 0.95;

pub(crate) fn pack(
    packer: &Packer,
    inputs: &Inputs,
    max_recalculations: usize,
) -> Result<Payload, Error> {
    let compressor = packer.compressor.as_ref();
    let max_size = packer.max_size_bytes;
    let mut accumulators = inputs.accumulators();

    // Signals are all or nothing so every buyer is treated equally.
    let signal_buyers = inputs
        .buyers
        .values()
        .filter(|records| records.signals.is_some())
        .count();
    let signals_fit = signal_buyers
        .checked_mul(packer.per_buyer_signals_max_size_bytes)
        .is_some_and(|total| total <= max_size);
    if signals_fit {
        for (buyer, records) in &inputs.buyers {
            if let Some(signals) = records.signals {
                accumulators.get_mut(buyer).set_signals(signals);
            }
        }
    } else {
        tracing::debug!(
            signal_buyers,
            per_buyer_max = packer.per_buyer_signals_max_size_bytes,
            max_size,
            "omitting buyer signals"
        );
    }

    let mut estimated = accumulators.exact_size(compressor)?;
    let mut recalculations = 0;
    // Buyers in the order their candidates were added.
    let mut added: Vec<&BuyerId> = Vec::new();

    for &position in &inputs.by_priority {
        let (buyer, record) = inputs.record(position);
        let size = input::compress(compressor, &BuyerInput::with_candidates([record]))?.len();

        if estimated + size > max_size {
            if recalculations >= max_recalculations {
                if estimated as f64 >= max_size as f64 * STOPPING_THRESHOLD {
                    break;
                }
                continue;
            }
            recalculations += 1;
            estimated = accumulators.exact_size(compressor)?;
            if estimated + size > max_size {
                continue;
            }
        }

        accumulators.get_mut(buyer).insert(record);
        added.push(buyer);
        estimated += size;
    }

    let mut buyers = accumulators.compress(compressor)?;
    let mut status = Status::WithinBudget;
    let mut truncated = 0;
    while input::total_size(&buyers) > max_size {
        // Candidates are added in descending priority order so the most
        // recently added one is the lowest priority candidate of its buyer.
        let Some(buyer) = added.pop() else {
            status = Status::OverBudget;
            break;
        };
        let accumulator = accumulators.get_mut(buyer);
        accumulator.pop_lowest();
        if accumulator.is_empty() {
            buyers.shift_remove(buyer);
        } else {
            buyers.insert(buyer.clone(), input::compress(compressor, accumulator)?);
        }
        status = Status::Truncated;
        truncated += 1;
    }

    metrics::seller_max(recalculations, truncated);
    Ok(Payload::new(buyers, &accumulators, status, recalculations))
}
