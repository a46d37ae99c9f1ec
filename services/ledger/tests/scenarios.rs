//! End-to-end runs of the built-in attack scenarios
//!
//! Expected amounts are the exact integer results of the constant-product
//! and collateral formulas for each preset's starting reserves.

use breach_ledger::presets::{self, ATTACKER};
use breach_ledger::{run_attack, AttackOutcome, Operation, ScenarioConfig, UnitConfig};
use breach_types::{ErrorKind, WEI_PER_ETHER};
use std::io::Write;

fn ether(amount: u128) -> u128 {
    amount * WEI_PER_ETHER
}

fn run(name: &str) -> AttackOutcome {
    let config = presets::preset(name).unwrap();
    run_attack(&config).unwrap()
}

#[test]
fn test_spot_price_lending_drains_pool_for_a_fraction_of_its_value() {
    let outcome = run("spot_price_lending");
    assert_eq!(outcome.committed_units(), 1);

    let swapped = 9_900_596_717_902_431_702u128;
    let deposit = 19_703_326_481_183_000_000u128;
    assert_eq!(outcome.balance(ATTACKER, "DVT"), ether(100_001));
    assert_eq!(outcome.balance(ATTACKER, "ETH"), ether(25) + swapped - deposit);
    assert_eq!(outcome.balance("lending-pool", "DVT"), 0);
    assert_eq!(outcome.balance("lending-pool", "ETH"), deposit);

    assert!(outcome.attack_succeeded());
    assert!(!outcome.invariant("collateralised:lending-pool").unwrap().held);
    assert!(!outcome.invariant("protected:lending-pool").unwrap().held);
    assert!(outcome.invariant("amm_k:uniswap").unwrap().held);
    assert!(outcome.invariant("debt_covered:lending-pool").unwrap().held);
    assert!(outcome.zero_residual_debt_held);
}

#[test]
fn test_restoring_the_spot_price_leaves_uncovered_debt() {
    let mut config = presets::spot_price_lending();
    config.units.push(UnitConfig::new(
        ATTACKER,
        "buy the price back",
        vec![Operation::Swap {
            pool: "uniswap".into(),
            asset_in: "ETH".into(),
            amount_in: ether(9),
            min_out: 0,
            deadline: None,
        }],
    ));
    let outcome = run_attack(&config).unwrap();

    assert_eq!(outcome.committed_units(), 2);
    let coverage = outcome.invariant("debt_covered:lending-pool").unwrap();
    assert!(!coverage.held, "{}", coverage.detail);
    assert!(coverage.detail.contains(ATTACKER));
    assert!(outcome.invariant("supply").unwrap().held);
    assert!(!outcome.zero_residual_debt_held);
}

#[test]
fn test_spot_price_lending_v2() {
    let outcome = run("spot_price_lending_v2");
    let swapped = 9_900_695_134_061_569_016u128;
    // floor(1e24 · 9_832_164_944_399 · 3 / 1e18): the spot price is floored per whole DVT first
    let deposit = 29_496_494_833_197_000_000u128;

    assert_eq!(outcome.committed_units(), 1);
    assert_eq!(outcome.balance(ATTACKER, "DVT"), ether(1_000_000));
    assert_eq!(outcome.balance(ATTACKER, "WETH"), ether(20) + swapped - deposit);
    assert_eq!(outcome.balance("lending-pool", "DVT"), 0);
    assert!(outcome.attack_succeeded());
}

#[test]
fn test_flash_price_shift_borrows_whole_pool() {
    let outcome = run("flash_price_shift");
    assert_eq!(outcome.committed_units(), 1);
    assert!(outcome.balance(ATTACKER, "DVT") >= ether(990_000));
    assert_eq!(outcome.balance("flash-lender", "DVT"), ether(10_000));
    assert_eq!(outcome.balance("lending-pool", "DVT"), 0);
    assert!(outcome.balance(ATTACKER, "WETH") < ether(30));
    assert!(outcome.attack_succeeded());
    assert!(outcome.zero_residual_debt_held);
}

#[test]
fn test_compromised_oracle_empties_exchange() {
    let outcome = run("compromised_oracle");
    assert_eq!(outcome.committed_units(), 3);
    assert_eq!(
        outcome.balance(ATTACKER, "ETH"),
        WEI_PER_ETHER / 10 + ether(9_990)
    );
    assert_eq!(outcome.balance("exchange", "ETH"), 0);
    assert_eq!(outcome.balance(ATTACKER, "DVNFT"), 0);
    assert!(outcome.attack_succeeded());
}

#[test]
fn test_side_entrance_withdraws_borrowed_deposit() {
    let outcome = run("side_entrance");
    assert_eq!(outcome.committed_units(), 1);
    assert_eq!(outcome.balance(ATTACKER, "ETH"), ether(1_001));
    assert_eq!(outcome.balance("side-entrance-pool", "ETH"), 0);
    assert!(outcome.attack_succeeded());

    // the deployer's 1000 ETH credit survives with nothing behind it
    let backing = outcome.invariant("deposits_backed:side-entrance-pool").unwrap();
    assert!(!backing.held);
    assert!(!outcome.zero_residual_debt_held);
}

#[test]
fn test_naive_receiver_pays_every_fee() {
    let outcome = run("naive_receiver");
    assert_eq!(outcome.committed_units(), 1);
    assert_eq!(outcome.balance("flash-receiver", "ETH"), 0);
    assert_eq!(outcome.balance("naive-pool", "ETH"), ether(1_010));
    assert!(outcome.attack_succeeded());
}

#[test]
fn test_truster_pulls_approved_funds() {
    let outcome = run("truster");
    assert_eq!(outcome.committed_units(), 1);
    assert_eq!(outcome.balance(ATTACKER, "DVT"), ether(1_000_000));
    assert_eq!(outcome.balance("truster-pool", "DVT"), 0);
}

#[test]
fn test_selfie_governance_drain() {
    let outcome = run("selfie");
    assert_eq!(outcome.committed_units(), 2);
    assert_eq!(outcome.balance(ATTACKER, "DVT"), ether(1_500_000));
    assert_eq!(outcome.balance("selfie-pool", "DVT"), 0);
    assert_eq!(outcome.final_time, 2 * 24 * 60 * 60);
}

#[test]
fn test_rewarder_snapshot_dominated_by_flash_deposit() {
    let outcome = run("rewarder");
    assert_eq!(outcome.committed_units(), 5);
    assert_eq!(outcome.balance(ATTACKER, "RWT"), 99_960_015_993_602_558_976);
    for user in ["alice", "bob", "charlie", "david"] {
        assert_eq!(outcome.balance(user, "RWT"), 9_996_001_599_360_255);
    }
    assert_eq!(outcome.balance(ATTACKER, "DVT"), 0);
    assert_eq!(outcome.balance("flash-loaner", "DVT"), ether(1_000_000));
    assert!(outcome.invariant("deposits_backed:rewarder-pool").unwrap().held);
}

#[test]
fn test_climber_self_scheduling_batch_is_rejected() {
    let outcome = run("climber");
    assert_eq!(outcome.committed_units(), 0);

    let execute = &outcome.units[0];
    assert_eq!(execute.kind, Some(ErrorKind::NotReady));
    assert_eq!(execute.failed_at, Some(vec![0]));

    let schedule = &outcome.units[1];
    assert_eq!(schedule.kind, Some(ErrorKind::Unauthorized));

    assert_eq!(outcome.balance("climber-vault", "DVT"), ether(10_000_000));
    assert_eq!(outcome.balance(ATTACKER, "DVT"), 0);
    assert_eq!(outcome.balance(presets::CLIMBER_CONTRACT, "DVT"), 0);
    assert!(outcome.pool_solvency_held);
    assert!(outcome.invariant("protected:climber-vault").unwrap().held);
    assert!(!outcome.attack_succeeded());
}

#[test]
fn test_scenario_file_runs_end_to_end() {
    let scenario = r#"
name = "file-swap"

[setup]
protected = ["uniswap"]

[[setup.accounts]]
id = "trader"
balances = { DVT = "10000 ether" }

[[setup.pools]]
account = "uniswap"
asset_a = "DVT"
asset_b = "ETH"
reserve_a = "100 ether"
reserve_b = "10 ether"

[[units]]
caller = "trader"
label = "dump"

[[units.ops]]
op = "swap"
pool = "uniswap"
asset_in = "DVT"
amount_in = "10000 ether"
"#;
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(scenario.as_bytes()).unwrap();

    let config = ScenarioConfig::from_file(file.path()).unwrap();
    let outcome = run_attack(&config).unwrap();

    assert_eq!(outcome.balance("trader", "ETH"), 9_900_695_134_061_569_016);
    assert!(outcome.invariant("amm_k:uniswap").unwrap().held);
    assert!(!outcome.invariant("protected:uniswap").unwrap().held);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["scenario"], "file-swap");
    assert_eq!(json["units"][0]["committed"], true);
}

#[test]
fn test_every_preset_keeps_supply_conserved() {
    for config in presets::all() {
        let outcome = run_attack(&config).unwrap();
        assert!(
            outcome.invariant("supply").unwrap().held,
            "supply broken in {}",
            config.name
        );
    }
}
