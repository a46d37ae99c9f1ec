//! Timelock governance: propose, wait, execute
//!
//! Each action moves `Unknown → Scheduled → Executed`. Execution checks the
//! action's state and readiness and marks it executed before any of its calls
//! run, so a batch cannot shorten its own delay and then pass the check.

use crate::error::{LedgerError, Result};
use crate::operation::Operation;
use breach_types::{serde_amount, AccountId, Amount};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Longest delay `UpdateDelay` accepts
pub const MAX_DELAY: u64 = 14 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Proposer,
}

/// Who may schedule actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProposalGate {
    /// Holders of [`Role::Proposer`]
    #[default]
    Role,
    /// Anyone whose live balance of `asset` exceeds half its supply
    VoteMajority { asset: breach_types::Asset },
}

/// One call of a batch: target, native value sent along, and the operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub target: AccountId,
    #[serde(default, with = "serde_amount")]
    pub value: Amount,
    pub payload: Operation,
}

impl Call {
    pub fn new(target: impl Into<AccountId>, payload: Operation) -> Self {
        Self {
            target: target.into(),
            value: 0,
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionId([u8; 32]);

impl ActionId {
    /// Keccak-256 over the batch's canonical JSON followed by the salt
    pub fn compute(calls: &[Call], salt: &str) -> Result<Self> {
        let encoded = serde_json::to_vec(calls)
            .map_err(|e| LedgerError::InvalidInput(format!("unencodable batch: {e}")))?;
        let mut hasher = Keccak256::new();
        hasher.update(&encoded);
        hasher.update(salt.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for ActionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionState {
    Unknown,
    Scheduled,
    Executed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledAction {
    pub id: ActionId,
    pub calls: Vec<Call>,
    pub salt: String,
    pub ready_at: u64,
    pub state: ActionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timelock {
    pub account: AccountId,
    pub delay: u64,
    pub gate: ProposalGate,
    roles: BTreeMap<Role, BTreeSet<AccountId>>,
    actions: BTreeMap<ActionId, ScheduledAction>,
}

impl Timelock {
    /// A timelock that administers itself, plus the given admins and proposers
    pub fn new(
        account: impl Into<AccountId>,
        delay: u64,
        gate: ProposalGate,
        admins: impl IntoIterator<Item = AccountId>,
        proposers: impl IntoIterator<Item = AccountId>,
    ) -> Result<Self> {
        if delay > MAX_DELAY {
            return Err(LedgerError::InvalidInput(format!(
                "delay {delay}s exceeds maximum {MAX_DELAY}s"
            )));
        }
        let account = account.into();
        let mut admin_set: BTreeSet<AccountId> = admins.into_iter().collect();
        admin_set.insert(account.clone());
        let mut roles = BTreeMap::new();
        roles.insert(Role::Admin, admin_set);
        roles.insert(Role::Proposer, proposers.into_iter().collect());
        Ok(Self {
            account,
            delay,
            gate,
            roles,
            actions: BTreeMap::new(),
        })
    }

    pub fn has_role(&self, account: &AccountId, role: Role) -> bool {
        self.roles
            .get(&role)
            .is_some_and(|holders| holders.contains(account))
    }

    fn require_admin(&self, caller: &AccountId) -> Result<()> {
        if !self.has_role(caller, Role::Admin) {
            return Err(LedgerError::unauthorized(
                caller,
                format!("administer timelock {}", self.account),
            ));
        }
        Ok(())
    }

    pub fn grant_role(&mut self, caller: &AccountId, role: Role, account: AccountId) -> Result<()> {
        self.require_admin(caller)?;
        self.roles.entry(role).or_default().insert(account);
        Ok(())
    }

    pub fn revoke_role(&mut self, caller: &AccountId, role: Role, account: &AccountId) -> Result<()> {
        self.require_admin(caller)?;
        if let Some(holders) = self.roles.get_mut(&role) {
            holders.remove(account);
        }
        Ok(())
    }

    /// Only the timelock itself (i.e. an executed batch) may change its delay
    pub fn update_delay(&mut self, caller: &AccountId, delay: u64) -> Result<()> {
        if *caller != self.account {
            return Err(LedgerError::unauthorized(
                caller,
                format!("update delay of {}", self.account),
            ));
        }
        if delay > MAX_DELAY {
            return Err(LedgerError::InvalidInput(format!(
                "delay {delay}s exceeds maximum {MAX_DELAY}s"
            )));
        }
        self.delay = delay;
        Ok(())
    }

    pub fn state_of(&self, id: &ActionId) -> ActionState {
        self.actions
            .get(id)
            .map_or(ActionState::Unknown, |action| action.state)
    }

    /// Unknown → Scheduled. Proposer authorization is the caller's job.
    pub(crate) fn schedule(
        &mut self,
        calls: Vec<Call>,
        salt: String,
        delay: Option<u64>,
        now: u64,
    ) -> Result<ScheduledAction> {
        let delay = delay.unwrap_or(self.delay);
        if delay < self.delay {
            return Err(LedgerError::InvalidInput(format!(
                "delay {delay}s below minimum {}s",
                self.delay
            )));
        }
        let id = ActionId::compute(&calls, &salt)?;
        if self.state_of(&id) != ActionState::Unknown {
            return Err(LedgerError::AlreadyScheduled { id: id.to_string() });
        }
        let ready_at = now
            .checked_add(delay)
            .ok_or(LedgerError::Overflow("ready timestamp"))?;
        let action = ScheduledAction {
            id,
            calls,
            salt,
            ready_at,
            state: ActionState::Scheduled,
        };
        self.actions.insert(id, action.clone());
        Ok(action)
    }

    /// Scheduled → Executed, checked against `now` before any call runs
    pub(crate) fn begin_execution(&mut self, id: &ActionId, now: u64) -> Result<()> {
        let action = self.actions.get_mut(id).ok_or_else(|| LedgerError::NotReady {
            id: id.to_string(),
            now,
            reason: "action was never scheduled".into(),
        })?;
        match action.state {
            ActionState::Executed => Err(LedgerError::AlreadyExecuted { id: id.to_string() }),
            ActionState::Unknown => Err(LedgerError::NotReady {
                id: id.to_string(),
                now,
                reason: "action was never scheduled".into(),
            }),
            ActionState::Scheduled if now < action.ready_at => Err(LedgerError::NotReady {
                id: id.to_string(),
                now,
                reason: format!("ready at t={}", action.ready_at),
            }),
            ActionState::Scheduled => {
                action.state = ActionState::Executed;
                Ok(())
            }
        }
    }
}
