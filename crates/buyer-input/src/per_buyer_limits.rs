//! Greedy packing with a byte limit per buyer.
//!
//! Sizes are estimated from a single compression ratio sample per buyer so
//! the number of compressions stays independent of the number of
//! candidates. Space a buyer leaves unused is handed out round-robin to the
//! candidates that didn't fit their own buyer's limit.

use {
    crate::{
        Error,
        Packer,
        Payload,
        Status,
        UTILIZATION_GOAL,
        encoding::{self, CandidateRecord},
        estimator::CompressionRatio,
        input::{self, Accumulators, Inputs},
        metrics,
    },
    indexmap::IndexMap,
    model::BuyerId,
};

/// Candidates estimated below this size are not worth deferring once a
/// buyer's remaining budget got this small.
const MINIMUM_CANDIDATE_SIZE: usize = 64;

pub(crate) fn pack(
    packer: &Packer,
    inputs: &Inputs,
    targets: &IndexMap<BuyerId, usize>,
) -> Result<Payload, Error> {
    let compressor = packer.compressor.as_ref();
    let max_size = packer.max_size_bytes;
    let signals_max = packer.per_buyer_signals_max_size_bytes;
    let goal = (max_size as f64 * UTILIZATION_GOAL) as usize;

    let limits = derive_limits(inputs.buyers.keys().copied(), targets, max_size);
    let ratios = inputs
        .buyers
        .iter()
        .map(|(buyer, records)| {
            Ok((
                *buyer,
                CompressionRatio::measure(compressor, &records.full_input())?,
            ))
        })
        .collect::<Result<IndexMap<_, _>, Error>>()?;

    let mut accumulators = inputs.accumulators();
    let mut remaining = limits.clone();
    let mut total = 0;

    if max_size > signals_max {
        for (buyer, records) in &inputs.buyers {
            let Some(signals) = records.signals else {
                continue;
            };
            if limits[buyer] < signals_max {
                tracing::debug!(%buyer, limit = limits[buyer], "omitting buyer signals");
                continue;
            }
            let estimate = ratios[buyer].estimate(encoding::signals_len(signals)?);
            accumulators.get_mut(buyer).set_signals(signals);
            remaining[buyer] = remaining[buyer].saturating_sub(estimate);
            total += estimate;
        }
    }

    let (mut total, deferred) = fill(
        inputs,
        &ratios,
        &remaining,
        &mut accumulators,
        total,
        max_size,
    );
    if total <= goal {
        total = redistribute(&mut accumulators, &deferred, &ratios, total, goal);
    }

    let mut buyers = accumulators.compress(compressor)?;
    let exact = input::total_size(&buyers);
    let mut status = Status::WithinBudget;
    let mut truncated = 0;
    if exact > max_size {
        let overflow = exact - max_size + (max_size - goal) + 1;
        truncated = truncate(&mut accumulators, &ratios, overflow);
        buyers = accumulators.compress(compressor)?;
        status = if input::total_size(&buyers) > max_size {
            Status::OverBudget
        } else {
            Status::Truncated
        };
    }

    tracing::trace!(estimated = total, exact, max_size, "packed per buyer limits");
    metrics::per_buyer_limits(truncated);
    Ok(Payload::new(buyers, &accumulators, status, 0))
}

/// Byte limit of every buyer. Targets are used as is if they fit the budget
/// and scaled down proportionally otherwise. Buyers without a target get an
/// equal share of the budget.
pub(crate) fn derive_limits<'a>(
    buyers: impl ExactSizeIterator<Item = &'a BuyerId>,
    targets: &IndexMap<BuyerId, usize>,
    max_size: usize,
) -> IndexMap<&'a BuyerId, usize> {
    let equal_share = max_size / buyers.len().max(1);
    let requested: IndexMap<_, _> = buyers
        .map(|buyer| (buyer, targets.get(buyer).copied().unwrap_or(equal_share)))
        .collect();
    let sum: usize = requested.values().sum();
    if sum <= max_size {
        return requested;
    }
    requested
        .into_iter()
        .map(|(buyer, target)| {
            let scaled = target as u128 * max_size as u128 / sum as u128;
            (buyer, usize::try_from(scaled).unwrap_or(max_size))
        })
        .collect()
}

/// Adds every buyer's candidates in priority order while they fit the
/// buyer's remaining budget. Candidates that don't fit are deferred. Once the
/// budget drops to [`MINIMUM_CANDIDATE_SIZE`] the rest of the buyer's
/// candidates are deferred without looking at them. Returns the new
/// estimated total and the deferred candidates per buyer.
fn fill<'a>(
    inputs: &'a Inputs,
    ratios: &IndexMap<&BuyerId, CompressionRatio>,
    remaining: &IndexMap<&BuyerId, usize>,
    accumulators: &mut Accumulators<'a>,
    mut total: usize,
    max_size: usize,
) -> (usize, IndexMap<&'a BuyerId, Vec<&'a CandidateRecord>>) {
    let mut deferred: IndexMap<&BuyerId, Vec<&CandidateRecord>> = IndexMap::new();
    for (buyer, records) in &inputs.buyers {
        let ratio = ratios[buyer];
        let mut budget = (remaining[buyer] as f64 * UTILIZATION_GOAL) as usize;
        let pool = deferred.entry(*buyer).or_default();
        let mut candidates = records.candidates.iter();
        while let Some(record) = candidates.next() {
            let estimate = ratio.estimate(record.len());
            if estimate <= budget && total + estimate <= max_size {
                accumulators.get_mut(buyer).insert(record);
                budget -= estimate;
                total += estimate;
            } else if budget > MINIMUM_CANDIDATE_SIZE {
                pool.push(record);
            } else {
                pool.push(record);
                pool.extend(candidates.by_ref());
                break;
            }
        }
    }
    (total, deferred)
}

/// Visits the deferred candidates round-robin, one per buyer and round in
/// each buyer's priority order, adding those that keep the total below the
/// goal. Returns the new estimated total.
fn redistribute<'a>(
    accumulators: &mut Accumulators<'a>,
    deferred: &IndexMap<&BuyerId, Vec<&'a CandidateRecord>>,
    ratios: &IndexMap<&BuyerId, CompressionRatio>,
    mut total: usize,
    goal: usize,
) -> usize {
    let rounds = deferred.values().map(Vec::len).max().unwrap_or_default();
    for round in 0..rounds {
        for (buyer, pool) in deferred {
            let Some(&record) = pool.get(round) else {
                continue;
            };
            let estimate = ratios[buyer].estimate(record.len());
            if total + estimate < goal {
                accumulators.get_mut(buyer).insert(record);
                total += estimate;
            } else if total >= goal.saturating_sub(MINIMUM_CANDIDATE_SIZE) {
                return total;
            }
        }
    }
    total
}

/// Removes the lowest priority candidate of every buyer with more than one
/// candidate, round-robin, until the estimated removed size covers
/// `overflow`. Returns the number of removed candidates.
fn truncate(
    accumulators: &mut Accumulators,
    ratios: &IndexMap<&BuyerId, CompressionRatio>,
    mut overflow: usize,
) -> usize {
    let mut removed = 0;
    while overflow > 0 {
        let mut progressed = false;
        for (buyer, accumulator) in accumulators.0.iter_mut() {
            if overflow == 0 {
                break;
            }
            if accumulator.candidates().len() <= 1 {
                continue;
            }
            if let Some(record) = accumulator.pop_lowest() {
                overflow = overflow.saturating_sub(ratios[buyer].estimate(record.len()));
                removed += 1;
                progressed = true;
            }
        }
        if !progressed {
            tracing::warn!(overflow, "every buyer is down to a single candidate");
            break;
        }
    }
    removed
}
