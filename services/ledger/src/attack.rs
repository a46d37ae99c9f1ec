//! Scenario runner and post-run invariant evaluation
//!
//! A run records reference values from the freshly built world (pool
//! invariants, lending prices, protected balances), submits each unit in
//! order, and compares the final ledger against those references.

use crate::collateral::{required_collateral, LendingPool};
use crate::config::ScenarioConfig;
use crate::logging::LogEmoji;
use crate::sequencer::Ledger;
use crate::state::{Holdings, LedgerState};
use crate::{log_invariant, log_profit};
use breach_amm::U256;
use breach_types::{format_ether, serde_amount_map, AccountId, Amount, Asset, ErrorKind};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitReport {
    pub index: usize,
    pub label: String,
    pub caller: AccountId,
    pub committed: bool,
    pub effects: usize,
    pub failed_at: Option<Vec<usize>>,
    pub kind: Option<ErrorKind>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantReport {
    pub name: String,
    pub held: bool,
    pub detail: String,
}

impl InvariantReport {
    fn new(name: impl Into<String>, held: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            held,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AccountBalances(#[serde(with = "serde_amount_map")] pub Holdings);

#[derive(Debug, Clone, Serialize)]
pub struct AttackOutcome {
    pub scenario: String,
    pub final_time: u64,
    pub units: Vec<UnitReport>,
    pub balances: BTreeMap<AccountId, AccountBalances>,
    pub invariants: Vec<InvariantReport>,
    pub pool_solvency_held: bool,
    pub zero_residual_debt_held: bool,
}

impl AttackOutcome {
    pub fn balance(&self, account: &str, asset: &str) -> Amount {
        self.balances
            .get(&AccountId::from(account))
            .and_then(|holdings| holdings.0.get(&Asset::from(asset)))
            .copied()
            .unwrap_or(0)
    }

    pub fn committed_units(&self) -> usize {
        self.units.iter().filter(|unit| unit.committed).count()
    }

    pub fn invariant(&self, name: &str) -> Option<&InvariantReport> {
        self.invariants.iter().find(|report| report.name == name)
    }

    /// True when the attacker broke pool solvency
    pub fn attack_succeeded(&self) -> bool {
        !self.pool_solvency_held
    }
}

/// Values captured before the first unit runs
struct Baseline {
    pool_k: BTreeMap<AccountId, U256>,
    lending_prices: BTreeMap<AccountId, Option<Amount>>,
    protected: BTreeMap<AccountId, Holdings>,
}

impl Baseline {
    fn capture(state: &LedgerState, protected: &[AccountId]) -> Self {
        Self {
            pool_k: state
                .pools()
                .map(|pool| (pool.account.clone(), pool.invariant(state)))
                .collect(),
            lending_prices: state
                .lending_pools()
                .map(|pool| (pool.account.clone(), state.lending_price(&pool.account).ok()))
                .collect(),
            protected: protected
                .iter()
                .map(|account| (account.clone(), state.holdings(account)))
                .collect(),
        }
    }
}

/// Build the scenario's world, run every unit, and report what held
pub fn run_attack(config: &ScenarioConfig) -> anyhow::Result<AttackOutcome> {
    config.validate()?;
    let state = config.setup.build()?;
    let baseline = Baseline::capture(&state, &config.setup.protected);
    let mut ledger = Ledger::with_settings(state, config.settings.clone());

    info!("{} running scenario '{}' ({} units)", LogEmoji::EXECUTE, config.name, config.units.len());

    let mut units = Vec::with_capacity(config.units.len());
    for (index, unit) in config.units.iter().enumerate() {
        if unit.advance_time > 0 {
            ledger.advance_time(unit.advance_time)?;
        }
        let result = ledger
            .unit(unit.caller.clone())
            .extend(unit.ops.iter().cloned())
            .commit();
        let report = match result {
            Ok(effects) => UnitReport {
                index,
                label: unit.label.clone(),
                caller: unit.caller.clone(),
                committed: true,
                effects: effects.len(),
                failed_at: None,
                kind: None,
                error: None,
            },
            Err(abort) => UnitReport {
                index,
                label: unit.label.clone(),
                caller: unit.caller.clone(),
                committed: false,
                effects: 0,
                failed_at: Some(abort.path.clone()),
                kind: Some(abort.kind),
                error: Some(abort.error.to_string()),
            },
        };
        units.push(report);
    }

    let state = ledger.state();
    let solvency = solvency_invariants(state, &baseline);
    let debt = debt_invariants(state);
    let pool_solvency_held = solvency.iter().all(|report| report.held);
    let zero_residual_debt_held = debt.iter().all(|report| report.held);

    for report in solvency.iter().chain(debt.iter()).filter(|report| !report.held) {
        log_invariant!("{} broken: {}", report.name, report.detail);
    }
    for (account, before) in &baseline.protected {
        for (asset, amount) in before {
            let after = state.balance(account, asset);
            if after < *amount {
                log_profit!(
                    "{} lost {} {}",
                    account,
                    format_ether(amount - after),
                    asset
                );
            }
        }
    }

    Ok(AttackOutcome {
        scenario: config.name.clone(),
        final_time: state.now(),
        units,
        balances: state
            .accounts()
            .map(|(account, holdings)| (account.clone(), AccountBalances(holdings.clone())))
            .collect(),
        invariants: solvency.into_iter().chain(debt).collect(),
        pool_solvency_held,
        zero_residual_debt_held,
    })
}

fn solvency_invariants(state: &LedgerState, baseline: &Baseline) -> Vec<InvariantReport> {
    let mut reports = Vec::new();

    for pool in state.pools() {
        let before = baseline.pool_k.get(&pool.account).copied().unwrap_or_default();
        let after = pool.invariant(state);
        reports.push(InvariantReport::new(
            format!("amm_k:{}", pool.account),
            after >= before,
            format!("k {before} -> {after}"),
        ));
    }

    for pool in state.lending_pools() {
        let name = format!("collateralised:{}", pool.account);
        let principal = pool.total_principal();
        let collateral = pool.total_collateral();
        let report = match baseline.lending_prices.get(&pool.account).copied().flatten() {
            None => InvariantReport::new(name, true, "no reference price at setup"),
            Some(price) => match required_collateral(principal, price, pool.collateral_ratio) {
                Ok(required) => InvariantReport::new(
                    name,
                    collateral >= required,
                    format!(
                        "{} {} lent against {} {} (needs {} at reference price)",
                        format_ether(principal),
                        pool.asset,
                        format_ether(collateral),
                        pool.collateral_asset,
                        format_ether(required)
                    ),
                ),
                Err(e) => InvariantReport::new(name, false, e.to_string()),
            },
        };
        reports.push(report);
    }

    for (account, before) in &baseline.protected {
        let shortfalls: Vec<String> = before
            .iter()
            .filter_map(|(asset, amount)| {
                let after = state.balance(account, asset);
                (after < *amount).then(|| {
                    format!(
                        "{asset} {} -> {}",
                        format_ether(*amount),
                        format_ether(after)
                    )
                })
            })
            .collect();
        reports.push(InvariantReport::new(
            format!("protected:{account}"),
            shortfalls.is_empty(),
            if shortfalls.is_empty() {
                "no balance below its starting point".to_string()
            } else {
                shortfalls.join(", ")
            },
        ));
    }

    reports
}

/// Obligations still outstanding after the last unit
///
/// Flash frames cannot outlive the operation that opened them, so what is
/// checked here is debt recorded in component state: deposit ledgers the
/// holder can no longer pay out and lending positions worth more than their
/// collateral at the current price.
fn debt_invariants(state: &LedgerState) -> Vec<InvariantReport> {
    let mut reports = Vec::new();

    let owed = state
        .flash_lenders()
        .filter(|lender| lender.accepts_deposits || !lender.deposits.is_empty())
        .map(|lender| (&lender.account, &lender.asset, lender.total_deposits()))
        .chain(state.reward_pools().map(|pool| {
            (&pool.account, &pool.liquidity_asset, pool.total_deposits())
        }));
    for (account, asset, credited) in owed {
        let held = state.balance(account, asset);
        reports.push(InvariantReport::new(
            format!("deposits_backed:{account}"),
            held >= credited,
            format!(
                "{} {asset} credited to depositors, {} held",
                format_ether(credited),
                format_ether(held)
            ),
        ));
    }

    for pool in state.lending_pools() {
        reports.push(debt_coverage(state, pool));
    }

    reports.push(match state.check_supply() {
        Ok(()) => InvariantReport::new("supply", true, "balances sum to minted supply"),
        Err(e) => InvariantReport::new("supply", false, e.to_string()),
    });
    reports
}

/// Every open position's collateral covers its principal at the current price
fn debt_coverage(state: &LedgerState, pool: &LendingPool) -> InvariantReport {
    let name = format!("debt_covered:{}", pool.account);
    if pool.positions.is_empty() {
        return InvariantReport::new(name, true, "no open positions");
    }
    let price = match state.lending_price(&pool.account) {
        Ok(price) => price,
        Err(e) => return InvariantReport::new(name, false, e.to_string()),
    };
    let mut underwater = Vec::new();
    for position in pool.positions.values() {
        match required_collateral(position.principal, price, 1) {
            Ok(value) if value <= position.collateral_deposited => {}
            Ok(value) => underwater.push(format!(
                "{} owes {} {} worth {} against {}",
                position.borrower,
                format_ether(position.principal),
                pool.asset,
                format_ether(value),
                format_ether(position.collateral_deposited)
            )),
            Err(e) => underwater.push(format!("{}: {e}", position.borrower)),
        }
    }
    if underwater.is_empty() {
        InvariantReport::new(
            name,
            true,
            format!("{} positions covered at current price", pool.positions.len()),
        )
    } else {
        InvariantReport::new(name, false, underwater.join(", "))
    }
}
