//! Upgradeable vault with an owner and a sweeper
//!
//! The `Guarded` logic refuses to change the sweeper. The owner can upgrade
//! to `Open` logic, after which anyone with the upgrade right controls who
//! may sweep.

use crate::error::{LedgerError, Result};
use breach_types::AccountId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultLogic {
    #[default]
    Guarded,
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub account: AccountId,
    pub owner: AccountId,
    pub sweeper: AccountId,
    #[serde(default)]
    pub logic: VaultLogic,
}

impl Vault {
    pub fn upgrade(&mut self, caller: &AccountId, logic: VaultLogic) -> Result<()> {
        if *caller != self.owner {
            return Err(LedgerError::unauthorized(
                caller,
                format!("upgrade vault {}", self.account),
            ));
        }
        self.logic = logic;
        Ok(())
    }

    pub fn set_sweeper(&mut self, caller: &AccountId, sweeper: AccountId) -> Result<()> {
        match self.logic {
            VaultLogic::Guarded => Err(LedgerError::unauthorized(
                caller,
                format!("set sweeper of guarded vault {}", self.account),
            )),
            VaultLogic::Open => {
                self.sweeper = sweeper;
                Ok(())
            }
        }
    }

    pub fn authorize_sweep(&self, caller: &AccountId) -> Result<()> {
        if *caller != self.sweeper {
            return Err(LedgerError::unauthorized(
                caller,
                format!("sweep vault {}", self.account),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> Vault {
        Vault {
            account: "vault".into(),
            owner: "timelock".into(),
            sweeper: "sweeper".into(),
            logic: VaultLogic::Guarded,
        }
    }

    #[test]
    fn test_guarded_vault_keeps_sweeper() {
        let mut v = vault();
        let mallory = AccountId::from("mallory");
        assert!(v.set_sweeper(&mallory, mallory.clone()).is_err());
        assert!(v.authorize_sweep(&mallory).is_err());
        assert!(v.upgrade(&mallory, VaultLogic::Open).is_err());
        v.authorize_sweep(&"sweeper".into()).unwrap();
    }

    #[test]
    fn test_open_logic_after_owner_upgrade() {
        let mut v = vault();
        let mallory = AccountId::from("mallory");
        v.upgrade(&"timelock".into(), VaultLogic::Open).unwrap();
        v.set_sweeper(&mallory, mallory.clone()).unwrap();
        v.authorize_sweep(&mallory).unwrap();
    }
}
