//! Per-bank review count constraint
//!
//! Banks above the maximum are sampled down to exactly the maximum; banks
//! below the minimum are kept whole with a warning. One RNG is seeded per run
//! and consumed group by group in first-appearance order, so the same input
//! and seed always select the same rows.

use crate::config::SamplingConfig;
use crate::dataset::{distinct_in_order, text_column};
use crate::error::Result;
use crate::model::COL_BANK;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

/// What the constraint did to one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupAction {
    /// Above the maximum; sampled down
    Sampled,
    /// Below the minimum; kept whole
    BelowMinimum,
    /// Within range; kept whole
    WithinRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    pub group: String,
    pub rows_in: usize,
    pub rows_out: usize,
    pub action: GroupAction,
}

/// Row positions to keep from one group of `rows`, in their original order
pub fn constrain_group(
    group: &str,
    rows: &[IdxSize],
    config: &SamplingConfig,
    rng: &mut StdRng,
) -> (Vec<IdxSize>, GroupOutcome) {
    let count = rows.len();

    let (kept, action) = if count > config.max_per_group {
        info!(
            "Bank {}: {} reviews found. Sampling down to {} reviews.",
            group, count, config.max_per_group
        );
        let mut shuffled = rows.to_vec();
        shuffled.shuffle(rng);
        shuffled.truncate(config.max_per_group);
        shuffled.sort_unstable();
        (shuffled, GroupAction::Sampled)
    } else if count < config.min_per_group {
        warn!(
            "Bank {}: only {} reviews found. Minimum target ({}) not met. Keeping all.",
            group, count, config.min_per_group
        );
        (rows.to_vec(), GroupAction::BelowMinimum)
    } else {
        info!(
            "Bank {}: {} reviews found. Constraint met. Keeping all.",
            group, count
        );
        (rows.to_vec(), GroupAction::WithinRange)
    };

    let outcome = GroupOutcome {
        group: group.to_string(),
        rows_in: count,
        rows_out: kept.len(),
        action,
    };
    (kept, outcome)
}

/// Apply the min/max constraint to every bank in `df`
pub fn apply_review_constraints(
    df: &DataFrame,
    config: &SamplingConfig,
) -> Result<(DataFrame, Vec<GroupOutcome>)> {
    info!(
        "Applying review count constraints (Min: {}, Max: {}) per bank...",
        config.min_per_group, config.max_per_group
    );

    if df.height() == 0 {
        return Ok((df.clone(), Vec::new()));
    }

    let banks = text_column(df, COL_BANK)?;
    let order = distinct_in_order(&banks);

    let mut positions: std::collections::HashMap<&str, Vec<IdxSize>> =
        std::collections::HashMap::new();
    for (idx, bank) in banks.into_iter().enumerate() {
        if let Some(bank) = bank {
            positions.entry(bank).or_default().push(idx as IdxSize);
        }
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut selected: Vec<IdxSize> = Vec::with_capacity(df.height());
    let mut outcomes = Vec::with_capacity(order.len());

    for bank in &order {
        let rows = positions.get(bank.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        let (kept, outcome) = constrain_group(bank, rows, config, &mut rng);
        selected.extend(kept);
        outcomes.push(outcome);
    }

    let indices = IdxCa::from_vec("idx", selected);
    let constrained = df.take(&indices)?;

    Ok((constrained, outcomes))
}
