//! Recursive interpreter over operation lists
//!
//! One interpreter evaluates one atomic unit against a staged copy of the
//! ledger state. Flash callbacks, timelock batches and invokes recurse into
//! [`Interpreter::run`], each level bounded by `max_call_depth`. Open flash
//! loans live on an explicit frame stack that records the lender's balance
//! at the depth the loan was opened.
//!
//! Authorization is evaluated when each operation runs, against whatever
//! the earlier operations of the unit left behind.

use crate::config::LedgerSettings;
use crate::effects::{Effect, Effects};
use crate::error::{LedgerError, Result};
use crate::flash::{CallbackMode, FlashFrame, FlashLender};
use crate::logging::LogEmoji;
use crate::operation::{Check, Operation};
use crate::state::LedgerState;
use crate::timelock::{ActionId, Call, ProposalGate, Role};
use breach_amm::{plan_price_shift, AmmError, ConstantProduct};
use breach_types::{format_ether, AccountId, Amount, Asset};
use tracing::debug;

/// An error together with the index path to the operation that raised it
#[derive(Debug)]
pub(crate) struct Fault {
    pub path: Vec<usize>,
    pub error: LedgerError,
}

impl Fault {
    fn within(mut self, index: usize) -> Self {
        self.path.insert(0, index);
        self
    }
}

impl From<LedgerError> for Fault {
    fn from(error: LedgerError) -> Self {
        Self {
            path: Vec::new(),
            error,
        }
    }
}

impl From<AmmError> for Fault {
    fn from(error: AmmError) -> Self {
        LedgerError::from(error).into()
    }
}

type Step = std::result::Result<(), Fault>;

pub(crate) struct Interpreter<'a> {
    state: &'a mut LedgerState,
    settings: &'a LedgerSettings,
    frames: Vec<FlashFrame>,
    effects: Vec<Effect>,
    depth: usize,
    flash_loans: u64,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(state: &'a mut LedgerState, settings: &'a LedgerSettings) -> Self {
        Self {
            state,
            settings,
            frames: Vec::new(),
            effects: Vec::new(),
            depth: 0,
            flash_loans: 0,
        }
    }

    /// Run a unit's operations, then verify supply if configured
    ///
    /// Every flash frame is popped by the borrow that pushed it before that
    /// borrow returns, so no loan can be open once `run` finishes.
    pub(crate) fn run_unit(
        mut self,
        caller: &AccountId,
        ops: &[Operation],
    ) -> std::result::Result<Effects, Fault> {
        self.run(caller, ops)?;
        if self.settings.check_supply {
            self.state.check_supply()?;
        }
        Ok(Effects {
            effects: self.effects,
            flash_loans: self.flash_loans,
        })
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.settings.max_call_depth {
            return Err(LedgerError::CallDepthExceeded {
                depth: self.depth + 1,
                limit: self.settings.max_call_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Apply `ops` in order as `caller`, one call level deeper
    pub(crate) fn run(&mut self, caller: &AccountId, ops: &[Operation]) -> Step {
        self.enter()?;
        let mut outcome = Ok(());
        for (index, op) in ops.iter().enumerate() {
            if let Err(fault) = self.apply(caller, op) {
                outcome = Err(fault.within(index));
                break;
            }
        }
        self.leave();
        outcome
    }

    fn apply(&mut self, caller: &AccountId, op: &Operation) -> Step {
        debug!(caller = %caller, op = op.name(), depth = self.depth, "apply");
        match op {
            Operation::FlashBorrow {
                lender,
                amount,
                receiver,
                callback,
            } => self.flash_borrow(caller, lender, *amount, receiver.as_ref(), callback),
            Operation::Execute {
                timelock,
                calls,
                salt,
            } => self.execute(timelock, calls, salt),
            Operation::Invoke { account, ops } => {
                if !self.state.controls(caller, account) {
                    return Err(LedgerError::unauthorized(caller, format!("act as {account}")).into());
                }
                self.run(account, ops)
            }
            leaf => self.apply_leaf(caller, leaf).map_err(Fault::from),
        }
    }

    fn apply_leaf(&mut self, caller: &AccountId, op: &Operation) -> Result<()> {
        match op {
            Operation::Transfer { to, asset, amount } => self.transfer(caller, to, asset, *amount),
            Operation::Approve {
                spender,
                asset,
                amount,
            } => {
                self.state.approve(caller, spender, asset, *amount);
                self.effects.push(Effect::Approved {
                    owner: caller.clone(),
                    spender: spender.clone(),
                    asset: asset.clone(),
                    amount: *amount,
                });
                Ok(())
            }
            Operation::TransferFrom {
                owner,
                to,
                asset,
                amount,
            } => {
                self.state.spend_allowance(owner, caller, asset, *amount)?;
                self.transfer(owner, to, asset, *amount)
            }
            Operation::Swap {
                pool,
                asset_in,
                amount_in,
                min_out,
                deadline,
            } => self
                .swap(caller, pool, asset_in, *amount_in, *min_out, *deadline)
                .map(|_| ()),
            Operation::ShiftPrice {
                pool,
                asset_in,
                target_price,
                max_in,
            } => self.shift_price(caller, pool, asset_in, *target_price, *max_in),
            Operation::AddLiquidity {
                pool,
                amount_a,
                amount_b,
            } => self.add_liquidity(caller, pool, *amount_a, *amount_b),
            Operation::PostPrice {
                oracle,
                asset,
                price,
            } => {
                let now = self.state.now();
                self.state
                    .oracle_mut(oracle)?
                    .post_price(caller, asset, *price, now)?;
                self.effects.push(Effect::PricePosted {
                    oracle: oracle.clone(),
                    reporter: caller.clone(),
                    asset: asset.clone(),
                    price: *price,
                });
                Ok(())
            }
            Operation::Borrow {
                lending_pool,
                amount,
            } => self.borrow(caller, lending_pool, *amount),
            Operation::Repay { lending_pool } => self.repay(caller, lending_pool),
            Operation::RepayFlash { lender } => self.repay_flash(caller, lender),
            Operation::Deposit { lender, amount } => self.deposit(caller, lender, *amount),
            Operation::Withdraw { lender } => self.withdraw(caller, lender),
            Operation::DrainLender { lender, to } => self.drain_lender(caller, lender, to),
            Operation::GrantRole {
                timelock,
                role,
                account,
            } => {
                self.state
                    .timelock_mut(timelock)?
                    .grant_role(caller, *role, account.clone())?;
                self.effects.push(Effect::RoleGranted {
                    timelock: timelock.clone(),
                    role: *role,
                    account: account.clone(),
                });
                Ok(())
            }
            Operation::RevokeRole {
                timelock,
                role,
                account,
            } => {
                self.state
                    .timelock_mut(timelock)?
                    .revoke_role(caller, *role, account)?;
                self.effects.push(Effect::RoleRevoked {
                    timelock: timelock.clone(),
                    role: *role,
                    account: account.clone(),
                });
                Ok(())
            }
            Operation::UpdateDelay { timelock, delay } => {
                self.state
                    .timelock_mut(timelock)?
                    .update_delay(caller, *delay)?;
                self.effects.push(Effect::DelayUpdated {
                    timelock: timelock.clone(),
                    delay: *delay,
                });
                Ok(())
            }
            Operation::Schedule {
                timelock,
                calls,
                salt,
                delay,
            } => self.schedule(caller, timelock, calls, salt, *delay),
            Operation::Upgrade { vault, logic } => {
                self.state.vault_mut(vault)?.upgrade(caller, *logic)?;
                self.effects.push(Effect::Upgraded {
                    vault: vault.clone(),
                    logic: *logic,
                });
                Ok(())
            }
            Operation::SetSweeper { vault, sweeper } => {
                self.state
                    .vault_mut(vault)?
                    .set_sweeper(caller, sweeper.clone())?;
                self.effects.push(Effect::SweeperSet {
                    vault: vault.clone(),
                    sweeper: sweeper.clone(),
                });
                Ok(())
            }
            Operation::Sweep { vault, asset } => {
                let vault = self.state.vault(vault)?;
                vault.authorize_sweep(caller)?;
                let account = vault.account.clone();
                let amount = self.state.balance(&account, asset);
                self.transfer(&account, caller, asset, amount)
            }
            Operation::DepositRewards { rewarder, amount } => {
                self.deposit_rewards(caller, rewarder, *amount)
            }
            Operation::WithdrawRewards { rewarder, amount } => {
                self.state.reward_pool_mut(rewarder)?.debit(caller, *amount)?;
                let pool = self.state.reward_pool(rewarder)?;
                let (account, asset) = (pool.account.clone(), pool.liquidity_asset.clone());
                self.transfer(&account, caller, &asset, *amount)
            }
            Operation::DistributeRewards { rewarder } => self.distribute_rewards(caller, rewarder),
            Operation::BuyOne {
                exchange,
                max_price,
            } => self.buy_one(caller, exchange, *max_price),
            Operation::SellOne { exchange } => self.sell_one(caller, exchange),
            Operation::Require { check } => self.require(check),
            Operation::Abort { reason } => Err(LedgerError::Aborted(reason.clone())),
            Operation::FlashBorrow { .. } | Operation::Execute { .. } | Operation::Invoke { .. } => {
                Err(LedgerError::InvalidState(format!(
                    "{} is not a leaf operation",
                    op.name()
                )))
            }
        }
    }

    fn transfer(&mut self, from: &AccountId, to: &AccountId, asset: &Asset, amount: Amount) -> Result<()> {
        self.state.transfer(from, to, asset, amount)?;
        if amount > 0 {
            self.effects.push(Effect::Transferred {
                from: from.clone(),
                to: to.clone(),
                asset: asset.clone(),
                amount,
            });
        }
        Ok(())
    }

    // ---- AMM --------------------------------------------------------------

    fn swap(
        &mut self,
        trader: &AccountId,
        pool_id: &AccountId,
        asset_in: &Asset,
        amount_in: Amount,
        min_out: Amount,
        deadline: Option<u64>,
    ) -> Result<Amount> {
        let now = self.state.now();
        if let Some(deadline) = deadline {
            if now > deadline {
                return Err(LedgerError::InvalidInput(format!(
                    "swap deadline t={deadline} passed at t={now}"
                )));
            }
        }
        let pool = self.state.amm_pool(pool_id)?.clone();
        let (direction, asset_out) = pool.direction(asset_in)?;
        let mut reserves = pool.reserves(self.state)?;
        let (reserve_in, reserve_out) = reserves.oriented(direction);
        let outcome = reserves.swap(direction, amount_in, min_out)?;

        self.transfer(trader, &pool.account, asset_in, amount_in)?;
        self.transfer(&pool.account, trader, &asset_out, outcome.amount_out)?;

        if let Ok(impact) = ConstantProduct::price_impact(amount_in, reserve_in, reserve_out) {
            debug!(
                "{} {} sold {} {} for {} {} on {} (impact {}%)",
                LogEmoji::POOL,
                trader,
                format_ether(amount_in),
                asset_in,
                format_ether(outcome.amount_out),
                asset_out,
                pool.account,
                impact
            );
        }
        self.effects.push(Effect::Swapped {
            pool: pool.account.clone(),
            trader: trader.clone(),
            asset_in: asset_in.clone(),
            amount_in,
            asset_out,
            amount_out: outcome.amount_out,
        });
        Ok(outcome.amount_out)
    }

    fn shift_price(
        &mut self,
        trader: &AccountId,
        pool_id: &AccountId,
        asset_in: &Asset,
        target_price: Amount,
        max_in: Amount,
    ) -> Result<()> {
        let pool = self.state.amm_pool(pool_id)?.clone();
        let (direction, _) = pool.direction(asset_in)?;
        let (reserve_in, reserve_out) = pool.reserves(self.state)?.oriented(direction);
        let plan = plan_price_shift(target_price, reserve_in, reserve_out, pool.fee)?;
        if plan.amount_in == 0 {
            return Ok(());
        }
        if plan.amount_in > max_in {
            return Err(LedgerError::Postcondition(format!(
                "pricing {asset_in} at {target_price} on {pool_id} needs {} in, limit {max_in}",
                plan.amount_in
            )));
        }
        self.swap(trader, pool_id, asset_in, plan.amount_in, plan.amount_out, None)?;
        Ok(())
    }

    fn add_liquidity(
        &mut self,
        provider: &AccountId,
        pool_id: &AccountId,
        amount_a: Amount,
        amount_b: Amount,
    ) -> Result<()> {
        if amount_a == 0 || amount_b == 0 {
            return Err(LedgerError::InvalidInput(
                "liquidity must be added on both sides".into(),
            ));
        }
        let pool = self.state.amm_pool(pool_id)?.clone();
        self.transfer(provider, &pool.account, &pool.asset_a, amount_a)?;
        self.transfer(provider, &pool.account, &pool.asset_b, amount_b)
    }

    // ---- lending ----------------------------------------------------------

    fn borrow(&mut self, borrower: &AccountId, pool_id: &AccountId, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(LedgerError::InvalidInput("borrow amount must be positive".into()));
        }
        let pool = self.state.lending_pool(pool_id)?.clone();
        let available = self.state.balance(&pool.account, &pool.asset);
        if amount > available {
            return Err(LedgerError::InsufficientPool {
                pool: pool.account.clone(),
                asset: pool.asset.clone(),
                available,
                requested: amount,
            });
        }
        let collateral = self.state.deposit_required(pool_id, amount)?;

        self.transfer(borrower, &pool.account, &pool.collateral_asset, collateral)?;
        self.transfer(&pool.account, borrower, &pool.asset, amount)?;
        self.state
            .lending_pool_mut(pool_id)?
            .record_borrow(borrower, amount, collateral)?;
        self.effects.push(Effect::Borrowed {
            lending_pool: pool.account,
            borrower: borrower.clone(),
            amount,
            collateral,
        });
        Ok(())
    }

    fn repay(&mut self, borrower: &AccountId, pool_id: &AccountId) -> Result<()> {
        let pool = self.state.lending_pool(pool_id)?.clone();
        let position = pool.position(borrower).cloned().ok_or_else(|| {
            LedgerError::InvalidState(format!("{borrower} has no open position in {pool_id}"))
        })?;
        self.transfer(borrower, &pool.account, &pool.asset, position.principal)?;
        self.transfer(
            &pool.account,
            borrower,
            &pool.collateral_asset,
            position.collateral_deposited,
        )?;
        self.state.lending_pool_mut(pool_id)?.close(borrower)?;
        self.effects.push(Effect::Repaid {
            lending_pool: pool.account,
            borrower: borrower.clone(),
            principal: position.principal,
            collateral: position.collateral_deposited,
        });
        Ok(())
    }

    // ---- flash loans ------------------------------------------------------

    fn flash_borrow(
        &mut self,
        caller: &AccountId,
        lender_id: &AccountId,
        amount: Amount,
        receiver: Option<&AccountId>,
        callback: &[Operation],
    ) -> Step {
        let lender = self.state.flash_lender(lender_id)?.clone();
        if lender.reentrancy_guard && self.frames.iter().any(|f| f.lender == lender.account) {
            return Err(LedgerError::Reentrancy {
                lender: lender.account,
            }
            .into());
        }
        let receiver = receiver.cloned().unwrap_or_else(|| caller.clone());
        let balance_before = self.state.balance(&lender.account, &lender.asset);
        if amount > balance_before {
            return Err(LedgerError::InsufficientPool {
                pool: lender.account,
                asset: lender.asset,
                available: balance_before,
                requested: amount,
            }
            .into());
        }
        let fee = lender.fee.fee_for(amount)?;
        let (runner, program) = self.flash_callback(caller, &lender, &receiver, callback)?;

        let mut frame = FlashFrame::new(
            &lender,
            receiver.clone(),
            amount,
            fee,
            balance_before,
            self.depth,
        );
        frame.lend()?;
        crate::log_flash!(
            "{} lends {} {} to {} (fee {}, depth {})",
            lender.account,
            format_ether(amount),
            lender.asset,
            receiver,
            format_ether(fee),
            self.depth
        );
        self.effects.push(Effect::FlashLent {
            lender: lender.account.clone(),
            receiver: receiver.clone(),
            amount,
            fee,
            depth: self.depth,
        });
        self.frames.push(frame);

        let mut outcome: Step = self
            .transfer(&lender.account, &receiver, &lender.asset, amount)
            .map_err(Fault::from);
        if outcome.is_ok() {
            outcome = self.run(&runner, &program);
        }
        let frame = self.frames.pop();
        outcome?;

        let mut frame = frame
            .ok_or_else(|| LedgerError::InvalidState("flash frame stack underflow".into()))?;
        let balance_after = self.state.balance(&lender.account, &lender.asset);
        frame.settle(balance_after)?;
        self.flash_loans += 1;
        crate::log_flash!(
            "{} settled at {} {} (depth {})",
            lender.account,
            format_ether(balance_after),
            lender.asset,
            frame.depth
        );
        self.effects.push(Effect::FlashSettled {
            lender: lender.account,
            amount,
            fee,
            depth: frame.depth,
        });
        Ok(())
    }

    /// Identity and operations the loan's callback runs with
    fn flash_callback(
        &self,
        caller: &AccountId,
        lender: &FlashLender,
        receiver: &AccountId,
        callback: &[Operation],
    ) -> Result<(AccountId, Vec<Operation>)> {
        if callback.is_empty() {
            let program = self
                .state
                .program(receiver)
                .map(<[Operation]>::to_vec)
                .unwrap_or_default();
            return Ok((receiver.clone(), program));
        }
        match lender.callback_mode {
            CallbackMode::Lender => Ok((lender.account.clone(), callback.to_vec())),
            CallbackMode::Receiver => {
                if !self.state.controls(caller, receiver) {
                    return Err(LedgerError::unauthorized(
                        caller,
                        format!("run a flash callback as {receiver}"),
                    ));
                }
                Ok((receiver.clone(), callback.to_vec()))
            }
        }
    }

    fn repay_flash(&mut self, payer: &AccountId, lender_id: &AccountId) -> Result<()> {
        let frame = self
            .frames
            .iter()
            .rev()
            .find(|frame| frame.lender == *lender_id)
            .ok_or_else(|| {
                LedgerError::InvalidState(format!("no open flash loan from {lender_id}"))
            })?;
        let (asset, owed) = (frame.asset.clone(), frame.outstanding()?);
        self.transfer(payer, lender_id, &asset, owed)
    }

    fn deposit(&mut self, depositor: &AccountId, lender_id: &AccountId, amount: Amount) -> Result<()> {
        let lender = self.state.flash_lender(lender_id)?.clone();
        if !lender.accepts_deposits {
            return Err(LedgerError::InvalidInput(format!(
                "{lender_id} does not take deposits"
            )));
        }
        self.transfer(depositor, &lender.account, &lender.asset, amount)?;
        self.state
            .flash_lender_mut(lender_id)?
            .credit(depositor, amount)
    }

    fn withdraw(&mut self, depositor: &AccountId, lender_id: &AccountId) -> Result<()> {
        let lender = self.state.flash_lender_mut(lender_id)?;
        let amount = lender.take_deposit(depositor);
        let (account, asset) = (lender.account.clone(), lender.asset.clone());
        self.transfer(&account, depositor, &asset, amount)
    }

    fn drain_lender(&mut self, caller: &AccountId, lender_id: &AccountId, to: &AccountId) -> Result<()> {
        let lender = self.state.flash_lender(lender_id)?.clone();
        if lender.governor.as_ref() != Some(caller) {
            return Err(LedgerError::unauthorized(
                caller,
                format!("drain {lender_id}"),
            ));
        }
        let amount = self.state.balance(&lender.account, &lender.asset);
        self.transfer(&lender.account, to, &lender.asset, amount)
    }

    // ---- governance -------------------------------------------------------

    fn schedule(
        &mut self,
        proposer: &AccountId,
        timelock_id: &AccountId,
        calls: &[Call],
        salt: &str,
        delay: Option<u64>,
    ) -> Result<()> {
        let timelock = self.state.timelock(timelock_id)?;
        match &timelock.gate {
            ProposalGate::Role => {
                if !timelock.has_role(proposer, Role::Proposer) {
                    return Err(LedgerError::unauthorized(
                        proposer,
                        format!("propose to {timelock_id}"),
                    ));
                }
            }
            ProposalGate::VoteMajority { asset } => {
                let votes = self.state.balance(proposer, asset);
                let supply = self.state.supply(asset);
                if votes <= supply / 2 {
                    return Err(LedgerError::unauthorized(
                        proposer,
                        format!("propose to {timelock_id} with {votes} of {supply} {asset}"),
                    ));
                }
            }
        }
        for call in calls {
            check_call_target(call)?;
        }
        let now = self.state.now();
        let action = self.state.timelock_mut(timelock_id)?.schedule(
            calls.to_vec(),
            salt.to_string(),
            delay,
            now,
        )?;
        debug!(
            "{} {} scheduled on {}, ready at t={}",
            LogEmoji::CLOCK,
            action.id,
            timelock_id,
            action.ready_at
        );
        self.effects.push(Effect::ActionScheduled {
            timelock: timelock_id.clone(),
            id: action.id.to_string(),
            ready_at: action.ready_at,
        });
        Ok(())
    }

    fn execute(&mut self, timelock_id: &AccountId, calls: &[Call], salt: &str) -> Step {
        let id = ActionId::compute(calls, salt)?;
        let now = self.state.now();
        let timelock = self.state.timelock_mut(timelock_id)?;
        timelock.begin_execution(&id, now)?;
        let executor = timelock.account.clone();

        self.enter()?;
        let mut outcome = Ok(());
        for (index, call) in calls.iter().enumerate() {
            if let Err(fault) = self.dispatch(&executor, call) {
                outcome = Err(fault.within(index));
                break;
            }
        }
        self.leave();
        outcome?;

        self.effects.push(Effect::ActionExecuted {
            timelock: timelock_id.clone(),
            id: id.to_string(),
        });
        Ok(())
    }

    fn dispatch(&mut self, executor: &AccountId, call: &Call) -> Step {
        check_call_target(call)?;
        if call.value > 0 {
            self.transfer(executor, &call.target, &Asset::native(), call.value)?;
        }
        self.apply(executor, &call.payload)
    }

    // ---- rewards ----------------------------------------------------------

    fn deposit_rewards(&mut self, depositor: &AccountId, rewarder_id: &AccountId, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(LedgerError::InvalidInput("deposit must be positive".into()));
        }
        let pool = self.state.reward_pool(rewarder_id)?;
        let (account, asset) = (pool.account.clone(), pool.liquidity_asset.clone());
        self.transfer(depositor, &account, &asset, amount)?;
        self.state
            .reward_pool_mut(rewarder_id)?
            .credit(depositor, amount)?;
        self.distribute_rewards(depositor, rewarder_id)
    }

    fn distribute_rewards(&mut self, account: &AccountId, rewarder_id: &AccountId) -> Result<()> {
        let now = self.state.now();
        let pool = self.state.reward_pool_mut(rewarder_id)?;
        if pool.roll_round(now) {
            debug!("{} {} opened round {}", LogEmoji::CLOCK, rewarder_id, pool.round);
        }
        let amount = pool.claimable(account);
        if amount == 0 {
            return Ok(());
        }
        pool.mark_claimed(account);
        let (reward_asset, round) = (pool.reward_asset.clone(), pool.round);
        self.state.mint(account, &reward_asset, amount)?;
        self.effects.push(Effect::RewardsClaimed {
            rewarder: rewarder_id.clone(),
            account: account.clone(),
            amount,
            round,
        });
        Ok(())
    }

    // ---- exchange ---------------------------------------------------------

    fn buy_one(&mut self, buyer: &AccountId, exchange_id: &AccountId, max_price: Amount) -> Result<()> {
        if max_price == 0 {
            return Err(LedgerError::InvalidInput(
                "payment offered must be greater than zero".into(),
            ));
        }
        let exchange = self.state.exchange(exchange_id)?.clone();
        let price = self.state.exchange_price(exchange_id)?;
        if price > max_price {
            return Err(LedgerError::InsufficientBalance {
                account: buyer.clone(),
                asset: exchange.payment_asset,
                available: max_price,
                required: price,
            });
        }
        self.transfer(buyer, &exchange.account, &exchange.payment_asset, price)?;
        self.state.mint(buyer, &exchange.item_asset, 1)?;
        self.effects.push(Effect::ItemBought {
            exchange: exchange.account,
            buyer: buyer.clone(),
            price,
        });
        Ok(())
    }

    fn sell_one(&mut self, seller: &AccountId, exchange_id: &AccountId) -> Result<()> {
        let exchange = self.state.exchange(exchange_id)?.clone();
        let price = self.state.exchange_price(exchange_id)?;
        self.state.burn(seller, &exchange.item_asset, 1)?;
        self.transfer(&exchange.account, seller, &exchange.payment_asset, price)?;
        self.effects.push(Effect::ItemSold {
            exchange: exchange.account,
            seller: seller.clone(),
            price,
        });
        Ok(())
    }

    fn require(&self, check: &Check) -> Result<()> {
        match check {
            Check::BalanceAtLeast {
                account,
                asset,
                amount,
            } => {
                let held = self.state.balance(account, asset);
                if held < *amount {
                    return Err(LedgerError::Postcondition(format!(
                        "{account} holds {held} {asset}, expected at least {amount}"
                    )));
                }
            }
            Check::BalanceAtMost {
                account,
                asset,
                amount,
            } => {
                let held = self.state.balance(account, asset);
                if held > *amount {
                    return Err(LedgerError::Postcondition(format!(
                        "{account} holds {held} {asset}, expected at most {amount}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A batch call must address the account it declares
fn check_call_target(call: &Call) -> Result<()> {
    match call.payload.target() {
        Some(target) if *target != call.target => Err(LedgerError::InvalidInput(format!(
            "call declares target {} but {} addresses {target}",
            call.target,
            call.payload.name()
        ))),
        _ => Ok(()),
    }
}
