//! Ledger state: clock, balances, allowances, supply, and component registries
//!
//! Everything a unit may touch lives in one `Clone` value so the sequencer can
//! stage a unit on a copy and commit by swapping it in. Component funds are
//! ordinary balances of the component's account; registries only hold
//! configuration and bookkeeping.

use crate::collateral::LendingPool;
use crate::error::{LedgerError, Result};
use crate::exchange::Exchange;
use crate::flash::FlashLender;
use crate::operation::Operation;
use crate::oracle::PriceOracle;
use crate::pools::AmmPool;
use crate::rewards::RewardPool;
use crate::timelock::Timelock;
use crate::vault::Vault;
use breach_types::{AccountId, Amount, Asset};
use std::collections::BTreeMap;

pub type Holdings = BTreeMap<Asset, Amount>;

#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    now: u64,
    balances: BTreeMap<AccountId, Holdings>,
    allowances: BTreeMap<(AccountId, AccountId, Asset), Amount>,
    supply: BTreeMap<Asset, Amount>,
    controllers: BTreeMap<AccountId, AccountId>,
    programs: BTreeMap<AccountId, Vec<Operation>>,
    pub(crate) pools: BTreeMap<AccountId, AmmPool>,
    pub(crate) oracles: BTreeMap<AccountId, PriceOracle>,
    pub(crate) lending_pools: BTreeMap<AccountId, LendingPool>,
    pub(crate) flash_lenders: BTreeMap<AccountId, FlashLender>,
    pub(crate) timelocks: BTreeMap<AccountId, Timelock>,
    pub(crate) vaults: BTreeMap<AccountId, Vault>,
    pub(crate) reward_pools: BTreeMap<AccountId, RewardPool>,
    pub(crate) exchanges: BTreeMap<AccountId, Exchange>,
}

fn lookup<'a, T>(
    registry: &'a BTreeMap<AccountId, T>,
    id: &AccountId,
    component: &'static str,
) -> Result<&'a T> {
    registry.get(id).ok_or_else(|| LedgerError::UnknownComponent {
        component,
        id: id.clone(),
    })
}

fn lookup_mut<'a, T>(
    registry: &'a mut BTreeMap<AccountId, T>,
    id: &AccountId,
    component: &'static str,
) -> Result<&'a mut T> {
    registry.get_mut(id).ok_or_else(|| LedgerError::UnknownComponent {
        component,
        id: id.clone(),
    })
}

fn register<T>(
    registry: &mut BTreeMap<AccountId, T>,
    id: AccountId,
    component: &'static str,
    value: T,
) -> Result<()> {
    if registry.contains_key(&id) {
        return Err(LedgerError::DuplicateComponent { component, id });
    }
    registry.insert(id, value);
    Ok(())
}

impl LedgerState {
    pub fn new(start_time: u64) -> Self {
        Self {
            now: start_time,
            ..Self::default()
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub(crate) fn advance_time(&mut self, seconds: u64) -> Result<()> {
        self.now = self
            .now
            .checked_add(seconds)
            .ok_or(LedgerError::Overflow("ledger clock"))?;
        Ok(())
    }

    // ---- balances -------------------------------------------------------

    pub fn balance(&self, account: &AccountId, asset: &Asset) -> Amount {
        self.balances
            .get(account)
            .and_then(|holdings| holdings.get(asset))
            .copied()
            .unwrap_or(0)
    }

    pub fn holdings(&self, account: &AccountId) -> Holdings {
        self.balances.get(account).cloned().unwrap_or_default()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &Holdings)> {
        self.balances.iter()
    }

    pub fn supply(&self, asset: &Asset) -> Amount {
        self.supply.get(asset).copied().unwrap_or(0)
    }

    /// Sum of every account's balance of `asset`
    pub fn circulating(&self, asset: &Asset) -> Amount {
        self.balances
            .values()
            .filter_map(|holdings| holdings.get(asset))
            .fold(0u128, |total, amount| total.saturating_add(*amount))
    }

    /// Create `amount` of `asset` out of thin air (setup, rewards, exchange items)
    pub fn mint(&mut self, account: &AccountId, asset: &Asset, amount: Amount) -> Result<()> {
        let supply = self.supply.entry(asset.clone()).or_insert(0);
        *supply = supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("asset supply"))?;
        let balance = self
            .balances
            .entry(account.clone())
            .or_default()
            .entry(asset.clone())
            .or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("account balance"))?;
        Ok(())
    }

    pub fn burn(&mut self, account: &AccountId, asset: &Asset, amount: Amount) -> Result<()> {
        self.debit(account, asset, amount)?;
        let supply = self.supply.entry(asset.clone()).or_insert(0);
        *supply = supply.saturating_sub(amount);
        Ok(())
    }

    /// Move `amount` between two accounts. Debits before crediting, so a
    /// failure leaves both balances untouched.
    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        asset: &Asset,
        amount: Amount,
    ) -> Result<()> {
        if amount == 0 || from == to {
            let available = self.balance(from, asset);
            if available < amount {
                return Err(LedgerError::InsufficientBalance {
                    account: from.clone(),
                    asset: asset.clone(),
                    available,
                    required: amount,
                });
            }
            return Ok(());
        }
        self.debit(from, asset, amount)?;
        let balance = self
            .balances
            .entry(to.clone())
            .or_default()
            .entry(asset.clone())
            .or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("account balance"))?;
        Ok(())
    }

    fn debit(&mut self, account: &AccountId, asset: &Asset, amount: Amount) -> Result<()> {
        let available = self.balance(account, asset);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: account.clone(),
                asset: asset.clone(),
                available,
                required: amount,
            });
        }
        if let Some(balance) = self
            .balances
            .get_mut(account)
            .and_then(|holdings| holdings.get_mut(asset))
        {
            *balance = available - amount;
        }
        Ok(())
    }

    /// Every asset's circulating amount must equal its recorded supply
    pub fn check_supply(&self) -> Result<()> {
        for (asset, supply) in &self.supply {
            let circulating = self.circulating(asset);
            if circulating != *supply {
                return Err(LedgerError::Postcondition(format!(
                    "{asset} supply {supply} but {circulating} circulating"
                )));
            }
        }
        Ok(())
    }

    // ---- allowances -----------------------------------------------------

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId, asset: &Asset) -> Amount {
        self.allowances
            .get(&(owner.clone(), spender.clone(), asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, asset: &Asset, amount: Amount) {
        self.allowances
            .insert((owner.clone(), spender.clone(), asset.clone()), amount);
    }

    pub(crate) fn spend_allowance(
        &mut self,
        owner: &AccountId,
        spender: &AccountId,
        asset: &Asset,
        amount: Amount,
    ) -> Result<()> {
        let allowed = self.allowance(owner, spender, asset);
        if allowed < amount {
            return Err(LedgerError::unauthorized(
                spender,
                format!("spend {amount} {asset} of {owner} (allowance {allowed})"),
            ));
        }
        self.approve(owner, spender, asset, allowed - amount);
        Ok(())
    }

    // ---- controllers and programs ---------------------------------------

    pub fn set_controller(&mut self, account: AccountId, controller: AccountId) {
        self.controllers.insert(account, controller);
    }

    /// True if `caller` is `account` or its registered controller
    pub fn controls(&self, caller: &AccountId, account: &AccountId) -> bool {
        caller == account || self.controllers.get(account) == Some(caller)
    }

    /// Install the operations `account` runs when it receives a flash loan
    pub fn install_program(&mut self, account: AccountId, ops: Vec<Operation>) {
        self.programs.insert(account, ops);
    }

    pub fn program(&self, account: &AccountId) -> Option<&[Operation]> {
        self.programs.get(account).map(Vec::as_slice)
    }

    // ---- component registries -------------------------------------------

    pub fn amm_pool(&self, id: &AccountId) -> Result<&AmmPool> {
        lookup(&self.pools, id, "pool")
    }

    pub fn oracle(&self, id: &AccountId) -> Result<&PriceOracle> {
        lookup(&self.oracles, id, "oracle")
    }

    pub(crate) fn oracle_mut(&mut self, id: &AccountId) -> Result<&mut PriceOracle> {
        lookup_mut(&mut self.oracles, id, "oracle")
    }

    pub fn lending_pool(&self, id: &AccountId) -> Result<&LendingPool> {
        lookup(&self.lending_pools, id, "lending pool")
    }

    pub(crate) fn lending_pool_mut(&mut self, id: &AccountId) -> Result<&mut LendingPool> {
        lookup_mut(&mut self.lending_pools, id, "lending pool")
    }

    pub fn flash_lender(&self, id: &AccountId) -> Result<&FlashLender> {
        lookup(&self.flash_lenders, id, "flash lender")
    }

    pub(crate) fn flash_lender_mut(&mut self, id: &AccountId) -> Result<&mut FlashLender> {
        lookup_mut(&mut self.flash_lenders, id, "flash lender")
    }

    pub fn timelock(&self, id: &AccountId) -> Result<&Timelock> {
        lookup(&self.timelocks, id, "timelock")
    }

    pub(crate) fn timelock_mut(&mut self, id: &AccountId) -> Result<&mut Timelock> {
        lookup_mut(&mut self.timelocks, id, "timelock")
    }

    pub fn vault(&self, id: &AccountId) -> Result<&Vault> {
        lookup(&self.vaults, id, "vault")
    }

    pub(crate) fn vault_mut(&mut self, id: &AccountId) -> Result<&mut Vault> {
        lookup_mut(&mut self.vaults, id, "vault")
    }

    pub fn reward_pool(&self, id: &AccountId) -> Result<&RewardPool> {
        lookup(&self.reward_pools, id, "reward pool")
    }

    pub(crate) fn reward_pool_mut(&mut self, id: &AccountId) -> Result<&mut RewardPool> {
        lookup_mut(&mut self.reward_pools, id, "reward pool")
    }

    pub fn exchange(&self, id: &AccountId) -> Result<&Exchange> {
        lookup(&self.exchanges, id, "exchange")
    }

    pub fn add_pool(&mut self, pool: AmmPool) -> Result<()> {
        register(&mut self.pools, pool.account.clone(), "pool", pool)
    }

    pub fn add_oracle(&mut self, oracle: PriceOracle) -> Result<()> {
        register(&mut self.oracles, oracle.account.clone(), "oracle", oracle)
    }

    pub fn add_lending_pool(&mut self, pool: LendingPool) -> Result<()> {
        register(
            &mut self.lending_pools,
            pool.account.clone(),
            "lending pool",
            pool,
        )
    }

    pub fn add_flash_lender(&mut self, lender: FlashLender) -> Result<()> {
        register(
            &mut self.flash_lenders,
            lender.account.clone(),
            "flash lender",
            lender,
        )
    }

    pub fn add_timelock(&mut self, timelock: Timelock) -> Result<()> {
        register(
            &mut self.timelocks,
            timelock.account.clone(),
            "timelock",
            timelock,
        )
    }

    pub fn add_vault(&mut self, vault: Vault) -> Result<()> {
        register(&mut self.vaults, vault.account.clone(), "vault", vault)
    }

    pub fn add_reward_pool(&mut self, pool: RewardPool) -> Result<()> {
        register(
            &mut self.reward_pools,
            pool.account.clone(),
            "reward pool",
            pool,
        )
    }

    pub fn add_exchange(&mut self, exchange: Exchange) -> Result<()> {
        register(
            &mut self.exchanges,
            exchange.account.clone(),
            "exchange",
            exchange,
        )
    }

    pub fn pools(&self) -> impl Iterator<Item = &AmmPool> {
        self.pools.values()
    }

    pub fn lending_pools(&self) -> impl Iterator<Item = &LendingPool> {
        self.lending_pools.values()
    }

    pub fn flash_lenders(&self) -> impl Iterator<Item = &FlashLender> {
        self.flash_lenders.values()
    }

    pub fn reward_pools(&self) -> impl Iterator<Item = &RewardPool> {
        self.reward_pools.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AccountId {
        AccountId::from("alice")
    }

    fn bob() -> AccountId {
        AccountId::from("bob")
    }

    #[test]
    fn test_transfer_moves_balance_and_keeps_supply() {
        let dvt = Asset::from("DVT");
        let mut state = LedgerState::new(0);
        state.mint(&alice(), &dvt, 100).unwrap();

        state.transfer(&alice(), &bob(), &dvt, 40).unwrap();
        assert_eq!(state.balance(&alice(), &dvt), 60);
        assert_eq!(state.balance(&bob(), &dvt), 40);
        assert_eq!(state.supply(&dvt), 100);
        state.check_supply().unwrap();
    }

    #[test]
    fn test_transfer_overdraft_is_rejected_untouched() {
        let dvt = Asset::from("DVT");
        let mut state = LedgerState::new(0);
        state.mint(&alice(), &dvt, 10).unwrap();

        let err = state.transfer(&alice(), &bob(), &dvt, 11).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                available: 10,
                required: 11,
                ..
            }
        ));
        assert_eq!(state.balance(&alice(), &dvt), 10);
        assert_eq!(state.balance(&bob(), &dvt), 0);
    }

    #[test]
    fn test_allowance_is_consumed() {
        let dvt = Asset::from("DVT");
        let mut state = LedgerState::new(0);
        state.approve(&alice(), &bob(), &dvt, 50);

        state.spend_allowance(&alice(), &bob(), &dvt, 30).unwrap();
        assert_eq!(state.allowance(&alice(), &bob(), &dvt), 20);
        assert!(state.spend_allowance(&alice(), &bob(), &dvt, 21).is_err());
    }

    #[test]
    fn test_controllers() {
        let mut state = LedgerState::new(0);
        let contract = AccountId::from("attack-contract");
        state.set_controller(contract.clone(), alice());

        assert!(state.controls(&alice(), &contract));
        assert!(state.controls(&contract, &contract));
        assert!(!state.controls(&bob(), &contract));
    }

    #[test]
    fn test_burn_reduces_supply() {
        let item = Asset::from("DVNFT");
        let mut state = LedgerState::new(0);
        state.mint(&alice(), &item, 2).unwrap();
        state.burn(&alice(), &item, 1).unwrap();

        assert_eq!(state.supply(&item), 1);
        assert!(state.burn(&bob(), &item, 1).is_err());
        state.check_supply().unwrap();
    }
}
