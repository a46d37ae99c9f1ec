//! Operation descriptors executed by the interpreter
//!
//! Operations are plain data (serde-tagged by `op`) so scenarios can be
//! written in JSON or TOML, hashed into timelock action ids, and installed
//! as receiver programs.

use crate::timelock::{Call, Role};
use crate::vault::VaultLogic;
use breach_types::{serde_amount, AccountId, Amount, Asset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Transfer {
        to: AccountId,
        asset: Asset,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    Approve {
        spender: AccountId,
        asset: Asset,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    TransferFrom {
        owner: AccountId,
        to: AccountId,
        asset: Asset,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    Swap {
        pool: AccountId,
        asset_in: Asset,
        #[serde(with = "serde_amount")]
        amount_in: Amount,
        #[serde(default, with = "serde_amount")]
        min_out: Amount,
        #[serde(default)]
        deadline: Option<u64>,
    },
    /// Sell the least `asset_in` that prices it at or below `target_price`
    ShiftPrice {
        pool: AccountId,
        asset_in: Asset,
        #[serde(with = "serde_amount")]
        target_price: Amount,
        #[serde(with = "serde_amount")]
        max_in: Amount,
    },
    AddLiquidity {
        pool: AccountId,
        #[serde(with = "serde_amount")]
        amount_a: Amount,
        #[serde(with = "serde_amount")]
        amount_b: Amount,
    },
    PostPrice {
        oracle: AccountId,
        asset: Asset,
        #[serde(with = "serde_amount")]
        price: Amount,
    },
    Borrow {
        lending_pool: AccountId,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    Repay {
        lending_pool: AccountId,
    },
    FlashBorrow {
        lender: AccountId,
        #[serde(with = "serde_amount")]
        amount: Amount,
        #[serde(default)]
        receiver: Option<AccountId>,
        #[serde(default)]
        callback: Vec<Operation>,
    },
    /// Return principal plus fee of the innermost open loan from `lender`
    RepayFlash {
        lender: AccountId,
    },
    Deposit {
        lender: AccountId,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    Withdraw {
        lender: AccountId,
    },
    DrainLender {
        lender: AccountId,
        to: AccountId,
    },
    GrantRole {
        timelock: AccountId,
        role: Role,
        account: AccountId,
    },
    RevokeRole {
        timelock: AccountId,
        role: Role,
        account: AccountId,
    },
    UpdateDelay {
        timelock: AccountId,
        delay: u64,
    },
    Schedule {
        timelock: AccountId,
        calls: Vec<Call>,
        salt: String,
        #[serde(default)]
        delay: Option<u64>,
    },
    Execute {
        timelock: AccountId,
        calls: Vec<Call>,
        salt: String,
    },
    Upgrade {
        vault: AccountId,
        logic: VaultLogic,
    },
    SetSweeper {
        vault: AccountId,
        sweeper: AccountId,
    },
    Sweep {
        vault: AccountId,
        asset: Asset,
    },
    DepositRewards {
        rewarder: AccountId,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    WithdrawRewards {
        rewarder: AccountId,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    DistributeRewards {
        rewarder: AccountId,
    },
    BuyOne {
        exchange: AccountId,
        #[serde(with = "serde_amount")]
        max_price: Amount,
    },
    SellOne {
        exchange: AccountId,
    },
    /// Run `ops` as `account`; the caller must be it or control it
    Invoke {
        account: AccountId,
        ops: Vec<Operation>,
    },
    Require {
        check: Check,
    },
    Abort {
        reason: String,
    },
}

/// Balance postcondition evaluated mid-unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    BalanceAtLeast {
        account: AccountId,
        asset: Asset,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    BalanceAtMost {
        account: AccountId,
        asset: Asset,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Transfer { .. } => "transfer",
            Operation::Approve { .. } => "approve",
            Operation::TransferFrom { .. } => "transfer_from",
            Operation::Swap { .. } => "swap",
            Operation::ShiftPrice { .. } => "shift_price",
            Operation::AddLiquidity { .. } => "add_liquidity",
            Operation::PostPrice { .. } => "post_price",
            Operation::Borrow { .. } => "borrow",
            Operation::Repay { .. } => "repay",
            Operation::FlashBorrow { .. } => "flash_borrow",
            Operation::RepayFlash { .. } => "repay_flash",
            Operation::Deposit { .. } => "deposit",
            Operation::Withdraw { .. } => "withdraw",
            Operation::DrainLender { .. } => "drain_lender",
            Operation::GrantRole { .. } => "grant_role",
            Operation::RevokeRole { .. } => "revoke_role",
            Operation::UpdateDelay { .. } => "update_delay",
            Operation::Schedule { .. } => "schedule",
            Operation::Execute { .. } => "execute",
            Operation::Upgrade { .. } => "upgrade",
            Operation::SetSweeper { .. } => "set_sweeper",
            Operation::Sweep { .. } => "sweep",
            Operation::DepositRewards { .. } => "deposit_rewards",
            Operation::WithdrawRewards { .. } => "withdraw_rewards",
            Operation::DistributeRewards { .. } => "distribute_rewards",
            Operation::BuyOne { .. } => "buy_one",
            Operation::SellOne { .. } => "sell_one",
            Operation::Invoke { .. } => "invoke",
            Operation::Require { .. } => "require",
            Operation::Abort { .. } => "abort",
        }
    }

    /// The component or account the operation is addressed to, if any
    ///
    /// Token-level operations (transfers, approvals) have no natural target
    /// and accept any declared target inside a timelock batch.
    pub fn target(&self) -> Option<&AccountId> {
        match self {
            Operation::Swap { pool, .. }
            | Operation::ShiftPrice { pool, .. }
            | Operation::AddLiquidity { pool, .. } => Some(pool),
            Operation::PostPrice { oracle, .. } => Some(oracle),
            Operation::Borrow { lending_pool, .. } | Operation::Repay { lending_pool } => {
                Some(lending_pool)
            }
            Operation::FlashBorrow { lender, .. }
            | Operation::RepayFlash { lender }
            | Operation::Deposit { lender, .. }
            | Operation::Withdraw { lender }
            | Operation::DrainLender { lender, .. } => Some(lender),
            Operation::GrantRole { timelock, .. }
            | Operation::RevokeRole { timelock, .. }
            | Operation::UpdateDelay { timelock, .. }
            | Operation::Schedule { timelock, .. }
            | Operation::Execute { timelock, .. } => Some(timelock),
            Operation::Upgrade { vault, .. }
            | Operation::SetSweeper { vault, .. }
            | Operation::Sweep { vault, .. } => Some(vault),
            Operation::DepositRewards { rewarder, .. }
            | Operation::WithdrawRewards { rewarder, .. }
            | Operation::DistributeRewards { rewarder } => Some(rewarder),
            Operation::BuyOne { exchange, .. } | Operation::SellOne { exchange } => Some(exchange),
            Operation::Invoke { account, .. } => Some(account),
            Operation::Transfer { .. }
            | Operation::Approve { .. }
            | Operation::TransferFrom { .. }
            | Operation::Require { .. }
            | Operation::Abort { .. } => None,
        }
    }
}
