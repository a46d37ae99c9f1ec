//! Built-in attack scenarios
//!
//! Each preset is a complete [`ScenarioConfig`]: the world as deployed and
//! the attacker's units. Amounts mirror well-known challenge setups so the
//! exact integer outcomes can be checked.

use crate::collateral::PriceSource;
use crate::config::{
    AccountSetup, DepositSetup, ExchangeSetup, FlashLenderSetup, InitialPrice, LedgerSettings,
    LendingSetup, OracleSetup, PoolSetup, RewardPoolSetup, ScenarioConfig, SetupConfig,
    TimelockSetup, UnitConfig, VaultSetup,
};
use crate::flash::{CallbackMode, FlashFee};
use crate::operation::{Check, Operation};
use crate::rewards::ROUND_DURATION;
use crate::timelock::{Call, ProposalGate, Role};
use crate::vault::VaultLogic;
use breach_amm::FeeRatio;
use breach_types::{AccountId, Amount, Asset, WEI_PER_ETHER};
use std::collections::BTreeMap;

pub const ATTACKER: &str = "attacker";

/// Scenario names, in the order `all()` returns them
pub const NAMES: [&str; 10] = [
    "spot_price_lending",
    "spot_price_lending_v2",
    "flash_price_shift",
    "compromised_oracle",
    "side_entrance",
    "naive_receiver",
    "truster",
    "selfie",
    "rewarder",
    "climber",
];

pub fn names() -> &'static [&'static str] {
    &NAMES
}

pub fn preset(name: &str) -> Option<ScenarioConfig> {
    let config = match name {
        "spot_price_lending" => spot_price_lending(),
        "spot_price_lending_v2" => spot_price_lending_v2(),
        "flash_price_shift" => flash_price_shift(),
        "compromised_oracle" => compromised_oracle(),
        "side_entrance" => side_entrance(),
        "naive_receiver" => naive_receiver(),
        "truster" => truster(),
        "selfie" => selfie(),
        "rewarder" => rewarder(),
        "climber" => climber(),
        _ => return None,
    };
    Some(config)
}

pub fn all() -> Vec<ScenarioConfig> {
    NAMES.iter().filter_map(|name| preset(name)).collect()
}

fn ether(amount: u128) -> Amount {
    amount * WEI_PER_ETHER
}

fn scenario(name: &str, description: &str, setup: SetupConfig, units: Vec<UnitConfig>) -> ScenarioConfig {
    ScenarioConfig {
        name: name.to_string(),
        description: description.to_string(),
        settings: LedgerSettings::default(),
        setup,
        units,
    }
}

fn at_least(account: &str, asset: &str, amount: Amount) -> Operation {
    Operation::Require {
        check: Check::BalanceAtLeast {
            account: account.into(),
            asset: asset.into(),
            amount,
        },
    }
}

fn uniswap(asset_a: &str, reserve_a: Amount, asset_b: &str, reserve_b: Amount) -> PoolSetup {
    PoolSetup {
        account: "uniswap".into(),
        asset_a: asset_a.into(),
        asset_b: asset_b.into(),
        reserve_a,
        reserve_b,
        fee: FeeRatio::UNISWAP,
    }
}

fn spot_lending(collateral: &str, ratio: u32, liquidity: Amount) -> LendingSetup {
    LendingSetup {
        account: "lending-pool".into(),
        asset: "DVT".into(),
        collateral_asset: collateral.into(),
        price_source: PriceSource::SpotPool {
            pool: "uniswap".into(),
        },
        collateral_ratio: ratio,
        liquidity,
    }
}

fn flash_lender(account: &str, asset: &str, liquidity: Amount) -> FlashLenderSetup {
    FlashLenderSetup {
        account: account.into(),
        asset: asset.into(),
        liquidity,
        fee: FlashFee::Zero,
        callback_mode: CallbackMode::Receiver,
        reentrancy_guard: false,
        accepts_deposits: false,
        deposits: Vec::new(),
        governor: None,
    }
}

/// Dump tokens into a thin pool, then borrow against the crashed spot price
pub fn spot_price_lending() -> ScenarioConfig {
    let setup = SetupConfig {
        accounts: vec![AccountSetup::new(ATTACKER)
            .holding(Asset::native(), ether(25))
            .holding("DVT", ether(1_000))],
        pools: vec![uniswap("DVT", ether(10), "ETH", ether(10))],
        lending_pools: vec![spot_lending("ETH", 2, ether(100_000))],
        protected: vec!["lending-pool".into()],
        ..SetupConfig::default()
    };
    let units = vec![UnitConfig::new(
        ATTACKER,
        "dump DVT and borrow the pool",
        vec![
            Operation::Swap {
                pool: "uniswap".into(),
                asset_in: "DVT".into(),
                amount_in: ether(999),
                min_out: 1,
                deadline: Some(300),
            },
            Operation::Borrow {
                lending_pool: "lending-pool".into(),
                amount: ether(100_000),
            },
            at_least(ATTACKER, "DVT", ether(100_000)),
        ],
    )];
    scenario(
        "spot_price_lending",
        "Lending pool priced by a thin constant-product pool's spot price",
        setup,
        units,
    )
}

/// Same manipulation against a WETH-quoted pool with a 3x requirement
pub fn spot_price_lending_v2() -> ScenarioConfig {
    let setup = SetupConfig {
        accounts: vec![AccountSetup::new(ATTACKER)
            .holding("WETH", ether(20))
            .holding("DVT", ether(10_000))],
        pools: vec![uniswap("DVT", ether(100), "WETH", ether(10))],
        lending_pools: vec![spot_lending("WETH", 3, ether(1_000_000))],
        protected: vec!["lending-pool".into()],
        ..SetupConfig::default()
    };
    let units = vec![UnitConfig::new(
        ATTACKER,
        "dump DVT for WETH and borrow the pool",
        vec![
            Operation::Swap {
                pool: "uniswap".into(),
                asset_in: "DVT".into(),
                amount_in: ether(10_000),
                min_out: 0,
                deadline: None,
            },
            Operation::Borrow {
                lending_pool: "lending-pool".into(),
                amount: ether(1_000_000),
            },
            at_least(ATTACKER, "DVT", ether(1_000_000)),
        ],
    )];
    scenario(
        "spot_price_lending_v2",
        "Spot-price lending against a DVT/WETH pool",
        setup,
        units,
    )
}

/// Borrow → shift price → borrow against it → repay, all inside one flash loan
pub fn flash_price_shift() -> ScenarioConfig {
    let setup = SetupConfig {
        accounts: vec![AccountSetup::new(ATTACKER).holding("WETH", ether(30))],
        pools: vec![uniswap("DVT", ether(100), "WETH", ether(10))],
        lending_pools: vec![spot_lending("WETH", 3, ether(1_000_000))],
        flash_lenders: vec![flash_lender("flash-lender", "DVT", ether(10_000))],
        protected: vec!["lending-pool".into(), "flash-lender".into()],
        ..SetupConfig::default()
    };
    let units = vec![UnitConfig::new(
        ATTACKER,
        "flash-funded price shift",
        vec![
            Operation::FlashBorrow {
                lender: "flash-lender".into(),
                amount: ether(10_000),
                receiver: None,
                callback: vec![
                    Operation::ShiftPrice {
                        pool: "uniswap".into(),
                        asset_in: "DVT".into(),
                        target_price: 10_000_000_000_000,
                        max_in: ether(10_000),
                    },
                    Operation::Borrow {
                        lending_pool: "lending-pool".into(),
                        amount: ether(1_000_000),
                    },
                    Operation::RepayFlash {
                        lender: "flash-lender".into(),
                    },
                ],
            },
            at_least(ATTACKER, "DVT", ether(990_000)),
        ],
    )];
    scenario(
        "flash_price_shift",
        "Flash-borrowed tokens push the spot price to a target before borrowing",
        setup,
        units,
    )
}

/// Two of three oracle sources are attacker-controlled
pub fn compromised_oracle() -> ScenarioConfig {
    let sources: Vec<AccountId> = ["source-1", "source-2", "source-3"]
        .into_iter()
        .map(AccountId::from)
        .collect();
    let setup = SetupConfig {
        accounts: vec![
            AccountSetup::new(ATTACKER).holding(Asset::native(), WEI_PER_ETHER / 10),
            AccountSetup::new("source-1").controlled_by(ATTACKER),
            AccountSetup::new("source-2").controlled_by(ATTACKER),
        ],
        oracles: vec![OracleSetup {
            account: "oracle".into(),
            sources: sources.clone(),
            initial_prices: sources
                .iter()
                .map(|source| InitialPrice {
                    reporter: source.clone(),
                    asset: "DVNFT".into(),
                    price: ether(999),
                })
                .collect(),
        }],
        exchanges: vec![ExchangeSetup {
            account: "exchange".into(),
            oracle: "oracle".into(),
            item_asset: "DVNFT".into(),
            payment_asset: Asset::native(),
            liquidity: ether(9_990),
        }],
        protected: vec!["exchange".into()],
        ..SetupConfig::default()
    };

    let post_from_both = |price: Amount| -> Vec<Operation> {
        ["source-1", "source-2"]
            .into_iter()
            .map(|source| Operation::Invoke {
                account: source.into(),
                ops: vec![Operation::PostPrice {
                    oracle: "oracle".into(),
                    asset: "DVNFT".into(),
                    price,
                }],
            })
            .collect()
    };

    let mut buy = post_from_both(0);
    buy.push(Operation::BuyOne {
        exchange: "exchange".into(),
        max_price: WEI_PER_ETHER / 100,
    });
    let mut sell = post_from_both(ether(9_990));
    sell.push(Operation::SellOne {
        exchange: "exchange".into(),
    });

    let units = vec![
        UnitConfig::new(ATTACKER, "crash the median and buy", buy),
        UnitConfig::new(ATTACKER, "inflate the median and sell", sell),
        UnitConfig::new(ATTACKER, "restore the price", post_from_both(ether(999))),
    ];
    scenario(
        "compromised_oracle",
        "Median oracle with a compromised majority of reporters",
        setup,
        units,
    )
}

/// Repay a flash loan with a deposit credited to the borrower
pub fn side_entrance() -> ScenarioConfig {
    let mut lender = flash_lender("side-entrance-pool", Asset::NATIVE, ether(1_000));
    lender.accepts_deposits = true;
    lender.deposits = vec![DepositSetup {
        account: "deployer".into(),
        amount: ether(1_000),
    }];
    let setup = SetupConfig {
        accounts: vec![AccountSetup::new(ATTACKER).holding(Asset::native(), ether(1))],
        flash_lenders: vec![lender],
        protected: vec!["side-entrance-pool".into()],
        ..SetupConfig::default()
    };
    let units = vec![UnitConfig::new(
        ATTACKER,
        "deposit the loan, then withdraw it",
        vec![
            Operation::FlashBorrow {
                lender: "side-entrance-pool".into(),
                amount: ether(1_000),
                receiver: None,
                callback: vec![Operation::Deposit {
                    lender: "side-entrance-pool".into(),
                    amount: ether(1_000),
                }],
            },
            Operation::Withdraw {
                lender: "side-entrance-pool".into(),
            },
        ],
    )];
    scenario(
        "side_entrance",
        "Balance-only settlement accepts the lender's own deposit ledger",
        setup,
        units,
    )
}

/// Anyone may trigger loans on behalf of a receiver that pays a fixed fee
pub fn naive_receiver() -> ScenarioConfig {
    let mut lender = flash_lender("naive-pool", Asset::NATIVE, ether(1_000));
    lender.fee = FlashFee::Fixed { amount: ether(1) };
    let setup = SetupConfig {
        accounts: vec![
            AccountSetup::new(ATTACKER),
            AccountSetup::new("flash-receiver")
                .holding(Asset::native(), ether(10))
                .on_flash_loan(vec![Operation::RepayFlash {
                    lender: "naive-pool".into(),
                }]),
        ],
        flash_lenders: vec![lender],
        protected: vec!["flash-receiver".into()],
        ..SetupConfig::default()
    };
    let loan = Operation::FlashBorrow {
        lender: "naive-pool".into(),
        amount: 0,
        receiver: Some("flash-receiver".into()),
        callback: Vec::new(),
    };
    let units = vec![UnitConfig::new(
        ATTACKER,
        "ten empty loans for the receiver",
        vec![loan; 10],
    )];
    scenario(
        "naive_receiver",
        "Fixed-fee loans drained from a receiver that never initiated them",
        setup,
        units,
    )
}

/// The lender performs an arbitrary call on the borrower's behalf
pub fn truster() -> ScenarioConfig {
    let mut lender = flash_lender("truster-pool", "DVT", ether(1_000_000));
    lender.callback_mode = CallbackMode::Lender;
    let setup = SetupConfig {
        accounts: vec![AccountSetup::new(ATTACKER)],
        flash_lenders: vec![lender],
        protected: vec!["truster-pool".into()],
        ..SetupConfig::default()
    };
    let units = vec![UnitConfig::new(
        ATTACKER,
        "approve via the lender, then pull",
        vec![
            Operation::FlashBorrow {
                lender: "truster-pool".into(),
                amount: 0,
                receiver: None,
                callback: vec![Operation::Approve {
                    spender: ATTACKER.into(),
                    asset: "DVT".into(),
                    amount: ether(1_000_000),
                }],
            },
            Operation::TransferFrom {
                owner: "truster-pool".into(),
                to: ATTACKER.into(),
                asset: "DVT".into(),
                amount: ether(1_000_000),
            },
        ],
    )];
    scenario(
        "truster",
        "Lender-executed callbacks grant allowances on the lender's funds",
        setup,
        units,
    )
}

fn drain_selfie_pool() -> Vec<Call> {
    vec![Call::new(
        "selfie-pool",
        Operation::DrainLender {
            lender: "selfie-pool".into(),
            to: ATTACKER.into(),
        },
    )]
}

/// Flash-borrowed voting power queues a governance action
pub fn selfie() -> ScenarioConfig {
    let mut lender = flash_lender("selfie-pool", "DVT", ether(1_500_000));
    lender.governor = Some("governance".into());
    let setup = SetupConfig {
        accounts: vec![
            AccountSetup::new(ATTACKER),
            AccountSetup::new("treasury").holding("DVT", ether(500_000)),
        ],
        flash_lenders: vec![lender],
        timelocks: vec![TimelockSetup {
            account: "governance".into(),
            delay: 2 * 24 * 60 * 60,
            gate: ProposalGate::VoteMajority { asset: "DVT".into() },
            admins: Vec::new(),
            proposers: Vec::new(),
        }],
        protected: vec!["selfie-pool".into()],
        ..SetupConfig::default()
    };
    let units = vec![
        UnitConfig::new(
            ATTACKER,
            "queue the drain with borrowed votes",
            vec![Operation::FlashBorrow {
                lender: "selfie-pool".into(),
                amount: ether(1_500_000),
                receiver: None,
                callback: vec![
                    Operation::Schedule {
                        timelock: "governance".into(),
                        calls: drain_selfie_pool(),
                        salt: "selfie".into(),
                        delay: None,
                    },
                    Operation::RepayFlash {
                        lender: "selfie-pool".into(),
                    },
                ],
            }],
        ),
        UnitConfig::new(
            ATTACKER,
            "execute the drain",
            vec![Operation::Execute {
                timelock: "governance".into(),
                calls: drain_selfie_pool(),
                salt: "selfie".into(),
            }],
        )
        .after(2 * 24 * 60 * 60),
    ];
    scenario(
        "selfie",
        "Governance weighted by live balances, fed by a flash loan",
        setup,
        units,
    )
}

/// A flash-borrowed deposit triggers and dominates a reward snapshot
pub fn rewarder() -> ScenarioConfig {
    let users = ["alice", "bob", "charlie", "david"];
    let setup = SetupConfig {
        accounts: vec![AccountSetup::new(ATTACKER)],
        flash_lenders: vec![flash_lender("flash-loaner", "DVT", ether(1_000_000))],
        reward_pools: vec![RewardPoolSetup {
            account: "rewarder-pool".into(),
            liquidity_asset: "DVT".into(),
            reward_asset: "RWT".into(),
            deposits: users
                .iter()
                .map(|user| DepositSetup {
                    account: (*user).into(),
                    amount: ether(100),
                })
                .collect(),
        }],
        protected: vec!["flash-loaner".into(), "rewarder-pool".into()],
        ..SetupConfig::default()
    };

    let mut units = vec![UnitConfig::new(
        ATTACKER,
        "deposit, claim, withdraw within one loan",
        vec![Operation::FlashBorrow {
            lender: "flash-loaner".into(),
            amount: ether(1_000_000),
            receiver: None,
            callback: vec![
                Operation::DepositRewards {
                    rewarder: "rewarder-pool".into(),
                    amount: ether(1_000_000),
                },
                Operation::WithdrawRewards {
                    rewarder: "rewarder-pool".into(),
                    amount: ether(1_000_000),
                },
                Operation::RepayFlash {
                    lender: "flash-loaner".into(),
                },
            ],
        }],
    )
    .after(ROUND_DURATION)];
    units.extend(users.iter().map(|user| {
        UnitConfig::new(
            *user,
            "claim this round",
            vec![Operation::DistributeRewards {
                rewarder: "rewarder-pool".into(),
            }],
        )
    }));
    scenario(
        "rewarder",
        "Reward snapshot taken from live deposits during a flash loan",
        setup,
        units,
    )
}

/// Contract the takeover batch hands proposer rights to
pub const CLIMBER_CONTRACT: &str = "attack-contract";

/// Batch that takes over the vault and then schedules itself
///
/// The last call is a zero-amount loan whose receiver program schedules this
/// same batch with no delay. A timelock that only checks readiness after
/// running the calls would find the batch scheduled and ready.
pub fn climber_takeover_batch() -> Vec<Call> {
    vec![
        Call::new(
            "climber-timelock",
            Operation::UpdateDelay {
                timelock: "climber-timelock".into(),
                delay: 0,
            },
        ),
        Call::new(
            "climber-timelock",
            Operation::GrantRole {
                timelock: "climber-timelock".into(),
                role: Role::Proposer,
                account: CLIMBER_CONTRACT.into(),
            },
        ),
        Call::new(
            "climber-vault",
            Operation::Upgrade {
                vault: "climber-vault".into(),
                logic: VaultLogic::Open,
            },
        ),
        Call::new(
            "climber-vault",
            Operation::SetSweeper {
                vault: "climber-vault".into(),
                sweeper: ATTACKER.into(),
            },
        ),
        Call::new(
            "climber-relay",
            Operation::FlashBorrow {
                lender: "climber-relay".into(),
                amount: 0,
                receiver: Some(CLIMBER_CONTRACT.into()),
                callback: Vec::new(),
            },
        ),
    ]
}

/// Schedule the takeover batch with the delay it just set to zero
fn climber_self_schedule() -> Operation {
    Operation::Schedule {
        timelock: "climber-timelock".into(),
        calls: climber_takeover_batch(),
        salt: "climb".into(),
        delay: Some(0),
    }
}

/// Execute-before-schedule against a check-before-act timelock
pub fn climber() -> ScenarioConfig {
    let setup = SetupConfig {
        accounts: vec![
            AccountSetup::new(ATTACKER).holding(Asset::native(), WEI_PER_ETHER / 10),
            AccountSetup::new(CLIMBER_CONTRACT)
                .controlled_by(ATTACKER)
                .on_flash_loan(vec![climber_self_schedule()]),
        ],
        flash_lenders: vec![flash_lender("climber-relay", "DVT", 0)],
        timelocks: vec![TimelockSetup {
            account: "climber-timelock".into(),
            delay: 60 * 60,
            gate: ProposalGate::Role,
            admins: vec!["deployer".into()],
            proposers: vec!["proposer".into()],
        }],
        vaults: vec![VaultSetup {
            account: "climber-vault".into(),
            owner: "climber-timelock".into(),
            sweeper: "sweeper".into(),
            logic: VaultLogic::Guarded,
            holdings: BTreeMap::from([(Asset::from("DVT"), ether(10_000_000))]),
        }],
        protected: vec!["climber-vault".into()],
        ..SetupConfig::default()
    };
    let units = vec![
        UnitConfig::new(
            ATTACKER,
            "execute a takeover batch that schedules itself",
            vec![
                Operation::Execute {
                    timelock: "climber-timelock".into(),
                    calls: climber_takeover_batch(),
                    salt: "climb".into(),
                },
                Operation::Sweep {
                    vault: "climber-vault".into(),
                    asset: "DVT".into(),
                },
            ],
        ),
        UnitConfig::new(
            ATTACKER,
            "schedule without proposer rights",
            vec![climber_self_schedule()],
        ),
    ];
    scenario(
        "climber",
        "Timelock that verifies readiness before running any call of a batch",
        setup,
        units,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_resolves() {
        for name in names() {
            let config = preset(name).unwrap();
            assert_eq!(config.name, *name);
            config.validate().unwrap();
        }
        assert!(preset("unknown").is_none());
        assert_eq!(all().len(), NAMES.len());
    }

    #[test]
    fn test_presets_survive_json() {
        for config in all() {
            let json = config.to_json_pretty().unwrap();
            let back = ScenarioConfig::from_json_str(&json).unwrap();
            assert_eq!(back.units.len(), config.units.len());
        }
    }
}
