//! Inflation: weekly mint into the fee pool.

use crate::{OpContext, Result};
use meridian_ledger::LedgerDelta;
use meridian_wire::InflationResult;

/// Inflation may run once per week of ledger close time.
pub const INFLATION_FREQUENCY: u64 = 7 * 24 * 60 * 60;

/// Weekly rate, in billionths (about 1% a year).
const INFLATION_RATE_BILLIONTHS: i128 = 190_721;

pub(super) fn apply(
    delta: &mut LedgerDelta<'_>,
    ctx: &OpContext<'_>,
) -> Result<InflationResult> {
    let header = delta.header().clone();
    if header.close_time < header.inflation_last_run + INFLATION_FREQUENCY {
        ctx.metrics.mark(&["op-inflation", "failure", "not-time"]);
        return Ok(InflationResult::NotTime);
    }

    let minted =
        (header.total_coins as i128 * INFLATION_RATE_BILLIONTHS / 1_000_000_000) as i64;

    let header = delta.header_mut()?;
    header.total_coins += minted;
    header.fee_pool += minted;
    header.inflation_last_run = header.close_time;

    ctx.metrics.mark(&["op-inflation", "success", "apply"]);
    Ok(InflationResult::Success { minted })
}
