//! # Scenario Configuration - Setup, Units and Ledger Settings
//!
//! ## Purpose
//!
//! Describes a complete attack run as data: the initial world (accounts,
//! balances, components), the ordered units to submit, and the ledger's
//! execution limits. Scenarios load from JSON or TOML, take environment
//! overrides, and are validated by building the world before anything runs.
//!
//! ## Integration Points
//!
//! - **Input Sources**: `.json` / `.toml` files, built-in presets, `BREACH_*` environment variables
//! - **Output Destinations**: [`crate::run_attack`], the `breach` binary
//! - **Validation**: `validate()` builds the setup, so unknown references and duplicate components fail early
//!
//! ## Amounts
//!
//! Every amount field accepts an integer (base units) or a string with a unit,
//! e.g. `"1000 ether"`, so TOML files are not limited to i64.

use crate::collateral::{LendingPool, PriceSource};
use crate::error::{LedgerError, Result};
use crate::exchange::Exchange;
use crate::flash::{CallbackMode, FlashFee, FlashLender};
use crate::operation::Operation;
use crate::oracle::PriceOracle;
use crate::pools::AmmPool;
use crate::rewards::RewardPool;
use crate::state::LedgerState;
use crate::timelock::{ProposalGate, Timelock};
use crate::vault::{Vault, VaultLogic};
use breach_amm::FeeRatio;
use breach_types::{serde_amount, serde_amount_map, AccountId, Amount, Asset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Execution limits of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Deepest nesting of callbacks, batches and invokes
    pub max_call_depth: usize,
    /// Verify after every unit that balances sum to minted supply
    pub check_supply: bool,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_call_depth: 64,
            check_supply: true,
        }
    }
}

/// A complete scenario: world, units, settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub settings: LedgerSettings,
    pub setup: SetupConfig,
    #[serde(default)]
    pub units: Vec<UnitConfig>,
}

/// One atomic unit, submitted after advancing the clock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    pub caller: AccountId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub advance_time: u64,
    pub ops: Vec<Operation>,
}

impl UnitConfig {
    pub fn new(caller: impl Into<AccountId>, label: impl Into<String>, ops: Vec<Operation>) -> Self {
        Self {
            caller: caller.into(),
            label: label.into(),
            advance_time: 0,
            ops,
        }
    }

    pub fn after(mut self, seconds: u64) -> Self {
        self.advance_time = seconds;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    pub start_time: u64,
    pub accounts: Vec<AccountSetup>,
    pub pools: Vec<PoolSetup>,
    pub oracles: Vec<OracleSetup>,
    pub lending_pools: Vec<LendingSetup>,
    pub flash_lenders: Vec<FlashLenderSetup>,
    pub timelocks: Vec<TimelockSetup>,
    pub vaults: Vec<VaultSetup>,
    pub reward_pools: Vec<RewardPoolSetup>,
    pub exchanges: Vec<ExchangeSetup>,
    /// Accounts whose balances must never drop below their starting point
    pub protected: Vec<AccountId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSetup {
    pub id: AccountId,
    #[serde(default, with = "serde_amount_map")]
    pub balances: BTreeMap<Asset, Amount>,
    #[serde(default)]
    pub controller: Option<AccountId>,
    #[serde(default)]
    pub on_flash_loan: Vec<Operation>,
}

impl AccountSetup {
    pub fn new(id: impl Into<AccountId>) -> Self {
        Self {
            id: id.into(),
            balances: BTreeMap::new(),
            controller: None,
            on_flash_loan: Vec::new(),
        }
    }

    pub fn holding(mut self, asset: impl Into<Asset>, amount: Amount) -> Self {
        self.balances.insert(asset.into(), amount);
        self
    }

    pub fn controlled_by(mut self, controller: impl Into<AccountId>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    pub fn on_flash_loan(mut self, ops: Vec<Operation>) -> Self {
        self.on_flash_loan = ops;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSetup {
    pub account: AccountId,
    pub asset_a: Asset,
    pub asset_b: Asset,
    #[serde(with = "serde_amount")]
    pub reserve_a: Amount,
    #[serde(with = "serde_amount")]
    pub reserve_b: Amount,
    #[serde(default)]
    pub fee: FeeRatio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialPrice {
    pub reporter: AccountId,
    pub asset: Asset,
    #[serde(with = "serde_amount")]
    pub price: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSetup {
    pub account: AccountId,
    pub sources: Vec<AccountId>,
    #[serde(default)]
    pub initial_prices: Vec<InitialPrice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendingSetup {
    pub account: AccountId,
    pub asset: Asset,
    pub collateral_asset: Asset,
    pub price_source: PriceSource,
    pub collateral_ratio: u32,
    #[serde(with = "serde_amount")]
    pub liquidity: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositSetup {
    pub account: AccountId,
    #[serde(with = "serde_amount")]
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashLenderSetup {
    pub account: AccountId,
    pub asset: Asset,
    #[serde(with = "serde_amount")]
    pub liquidity: Amount,
    #[serde(default)]
    pub fee: FlashFee,
    #[serde(default)]
    pub callback_mode: CallbackMode,
    #[serde(default)]
    pub reentrancy_guard: bool,
    #[serde(default)]
    pub accepts_deposits: bool,
    /// Existing deposit credits, backed by `liquidity`
    #[serde(default)]
    pub deposits: Vec<DepositSetup>,
    #[serde(default)]
    pub governor: Option<AccountId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelockSetup {
    pub account: AccountId,
    pub delay: u64,
    #[serde(default)]
    pub gate: ProposalGate,
    #[serde(default)]
    pub admins: Vec<AccountId>,
    #[serde(default)]
    pub proposers: Vec<AccountId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSetup {
    pub account: AccountId,
    pub owner: AccountId,
    pub sweeper: AccountId,
    #[serde(default)]
    pub logic: VaultLogic,
    #[serde(default, with = "serde_amount_map")]
    pub holdings: BTreeMap<Asset, Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardPoolSetup {
    pub account: AccountId,
    pub liquidity_asset: Asset,
    pub reward_asset: Asset,
    /// Deposits already made; the pool holds their sum
    #[serde(default)]
    pub deposits: Vec<DepositSetup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSetup {
    pub account: AccountId,
    pub oracle: AccountId,
    pub item_asset: Asset,
    pub payment_asset: Asset,
    #[serde(with = "serde_amount")]
    pub liquidity: Amount,
}

impl SetupConfig {
    /// Build the initial ledger state; every component's funds are minted to its account
    pub fn build(&self) -> Result<LedgerState> {
        let mut state = LedgerState::new(self.start_time);

        for account in &self.accounts {
            for (asset, amount) in &account.balances {
                state.mint(&account.id, asset, *amount)?;
            }
            if let Some(controller) = &account.controller {
                state.set_controller(account.id.clone(), controller.clone());
            }
            if !account.on_flash_loan.is_empty() {
                state.install_program(account.id.clone(), account.on_flash_loan.clone());
            }
        }

        for pool in &self.pools {
            pool.fee.validate()?;
            state.mint(&pool.account, &pool.asset_a, pool.reserve_a)?;
            state.mint(&pool.account, &pool.asset_b, pool.reserve_b)?;
            state.add_pool(AmmPool::new(
                pool.account.clone(),
                pool.asset_a.clone(),
                pool.asset_b.clone(),
                pool.fee,
            ))?;
        }

        for setup in &self.oracles {
            let mut oracle = PriceOracle::new(setup.account.clone(), setup.sources.iter().cloned());
            for initial in &setup.initial_prices {
                oracle.post_price(&initial.reporter, &initial.asset, initial.price, self.start_time)?;
            }
            state.add_oracle(oracle)?;
        }

        for setup in &self.lending_pools {
            match &setup.price_source {
                PriceSource::SpotPool { pool } => {
                    state.amm_pool(pool)?;
                }
                PriceSource::Oracle { oracle } => {
                    state.oracle(oracle)?;
                }
            }
            state.mint(&setup.account, &setup.asset, setup.liquidity)?;
            state.add_lending_pool(LendingPool {
                account: setup.account.clone(),
                asset: setup.asset.clone(),
                collateral_asset: setup.collateral_asset.clone(),
                price_source: setup.price_source.clone(),
                collateral_ratio: setup.collateral_ratio,
                positions: BTreeMap::new(),
            })?;
        }

        for setup in &self.flash_lenders {
            state.mint(&setup.account, &setup.asset, setup.liquidity)?;
            let mut lender = FlashLender::new(setup.account.clone(), setup.asset.clone());
            lender.fee = setup.fee;
            lender.callback_mode = setup.callback_mode;
            lender.reentrancy_guard = setup.reentrancy_guard;
            lender.accepts_deposits = setup.accepts_deposits;
            lender.governor = setup.governor.clone();
            for deposit in &setup.deposits {
                lender.credit(&deposit.account, deposit.amount)?;
            }
            state.add_flash_lender(lender)?;
        }

        for setup in &self.timelocks {
            state.add_timelock(Timelock::new(
                setup.account.clone(),
                setup.delay,
                setup.gate.clone(),
                setup.admins.iter().cloned(),
                setup.proposers.iter().cloned(),
            )?)?;
        }

        for setup in &self.vaults {
            for (asset, amount) in &setup.holdings {
                state.mint(&setup.account, asset, *amount)?;
            }
            state.add_vault(Vault {
                account: setup.account.clone(),
                owner: setup.owner.clone(),
                sweeper: setup.sweeper.clone(),
                logic: setup.logic,
            })?;
        }

        for setup in &self.reward_pools {
            let mut deposits = BTreeMap::new();
            for deposit in &setup.deposits {
                state.mint(&setup.account, &setup.liquidity_asset, deposit.amount)?;
                *deposits.entry(deposit.account.clone()).or_insert(0) += deposit.amount;
            }
            state.add_reward_pool(RewardPool::new(
                setup.account.clone(),
                setup.liquidity_asset.clone(),
                setup.reward_asset.clone(),
                deposits,
                self.start_time,
            ))?;
        }

        for setup in &self.exchanges {
            state.oracle(&setup.oracle)?;
            state.mint(&setup.account, &setup.payment_asset, setup.liquidity)?;
            state.add_exchange(Exchange {
                account: setup.account.clone(),
                oracle: setup.oracle.clone(),
                item_asset: setup.item_asset.clone(),
                payment_asset: setup.payment_asset.clone(),
            })?;
        }

        Ok(state)
    }
}

impl ScenarioConfig {
    /// Load from `.json` or `.toml`, chosen by extension
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&contents)?,
            Some("json") => Self::from_json_str(&contents)?,
            other => anyhow::bail!(
                "Unsupported scenario format {:?} for {}",
                other,
                path.display()
            ),
        };
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Apply `BREACH_MAX_CALL_DEPTH` / `BREACH_START_TIME` from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("BREACH_MAX_CALL_DEPTH") {
            if let Ok(depth) = value.parse::<usize>() {
                self.settings.max_call_depth = depth;
            }
        }
        if let Some(value) = lookup("BREACH_START_TIME") {
            if let Ok(start) = value.parse::<u64>() {
                self.setup.start_time = start;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("scenario name must not be empty");
        }
        if self.settings.max_call_depth == 0 {
            anyhow::bail!("max_call_depth must be positive");
        }
        for (index, unit) in self.units.iter().enumerate() {
            if unit.ops.is_empty() {
                anyhow::bail!("unit {} ({}) has no operations", index, unit.label);
            }
        }
        for lending in &self.setup.lending_pools {
            if lending.collateral_ratio == 0 {
                anyhow::bail!("lending pool {} has a zero collateral ratio", lending.account);
            }
        }
        self.setup
            .build()
            .map_err(|e: LedgerError| anyhow::anyhow!("invalid setup for '{}': {}", self.name, e))?;
        Ok(())
    }
}
