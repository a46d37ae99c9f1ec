//! All-or-nothing units, flash-loan settlement and exact swap math
//!
//! Each test drives a hand-built ledger through `submit` and checks what is
//! observable afterwards: committed balances, abort kind and failing path.

use breach_amm::{ConstantProduct, FeeRatio};
use breach_ledger::{
    AmmPool, Check, FlashFee, FlashLender, Ledger, LedgerState, Operation,
};
use breach_types::{AccountId, Amount, Asset, ErrorKind, WEI_PER_ETHER};
use proptest::prelude::*;

fn ether(amount: u128) -> Amount {
    amount * WEI_PER_ETHER
}

fn dvt() -> Asset {
    Asset::from("DVT")
}

fn eth() -> Asset {
    Asset::native()
}

fn lender_world(fee: FlashFee, guarded: bool) -> Ledger {
    let mut state = LedgerState::new(0);
    state.mint(&"lender".into(), &dvt(), ether(1_000)).unwrap();
    state.mint(&"alice".into(), &dvt(), ether(10)).unwrap();
    let mut lender = FlashLender::new("lender", dvt());
    lender.fee = fee;
    lender.reentrancy_guard = guarded;
    state.add_flash_lender(lender).unwrap();
    Ledger::new(state)
}

fn repay() -> Operation {
    Operation::RepayFlash {
        lender: "lender".into(),
    }
}

fn flash(amount: Amount, callback: Vec<Operation>) -> Operation {
    Operation::FlashBorrow {
        lender: "lender".into(),
        amount,
        receiver: None,
        callback,
    }
}

#[test]
fn test_closed_form_swap_matches_through_ledger() {
    // Whole units: floor(997·10000·10 / (100·1000 + 997·10000)) = 9
    assert_eq!(
        ConstantProduct::swap_output(10_000, 100, 10, FeeRatio::UNISWAP).unwrap(),
        997 * 10_000 * 10 / (100 * 1000 + 997 * 10_000)
    );

    let mut state = LedgerState::new(0);
    state.mint(&"uniswap".into(), &dvt(), ether(100)).unwrap();
    state.mint(&"uniswap".into(), &eth(), ether(10)).unwrap();
    state.mint(&"trader".into(), &dvt(), ether(10_000)).unwrap();
    state
        .add_pool(AmmPool::new("uniswap", dvt(), eth(), FeeRatio::UNISWAP))
        .unwrap();
    let mut ledger = Ledger::new(state);

    let effects = ledger
        .submit(
            &"trader".into(),
            &[Operation::Swap {
                pool: "uniswap".into(),
                asset_in: dvt(),
                amount_in: ether(10_000),
                min_out: 0,
                deadline: None,
            }],
        )
        .unwrap();

    let expected =
        ConstantProduct::swap_output(ether(10_000), ether(100), ether(10), FeeRatio::UNISWAP)
            .unwrap();
    assert_eq!(expected, 9_900_695_134_061_569_016);
    assert_eq!(ledger.balance(&"trader".into(), &eth()), expected);
    assert_eq!(ledger.balance(&"uniswap".into(), &dvt()), ether(10_100));
    assert_eq!(effects.swaps().count(), 1);
}

#[test]
fn test_slippage_failure_rolls_back_earlier_transfer() {
    let mut state = LedgerState::new(0);
    state.mint(&"uniswap".into(), &dvt(), ether(100)).unwrap();
    state.mint(&"uniswap".into(), &eth(), ether(10)).unwrap();
    state.mint(&"trader".into(), &dvt(), ether(20)).unwrap();
    state
        .add_pool(AmmPool::new("uniswap", dvt(), eth(), FeeRatio::UNISWAP))
        .unwrap();
    let mut ledger = Ledger::new(state);

    let abort = ledger
        .submit(
            &"trader".into(),
            &[
                Operation::Transfer {
                    to: "friend".into(),
                    asset: dvt(),
                    amount: ether(5),
                },
                Operation::Swap {
                    pool: "uniswap".into(),
                    asset_in: dvt(),
                    amount_in: ether(10),
                    min_out: ether(1),
                    deadline: None,
                },
            ],
        )
        .unwrap_err();

    assert_eq!(abort.index, 1);
    assert_eq!(abort.kind, ErrorKind::PostconditionFailed);
    assert_eq!(ledger.balance(&"friend".into(), &dvt()), 0);
    assert_eq!(ledger.balance(&"trader".into(), &dvt()), ether(20));
    assert_eq!(ledger.balance(&"uniswap".into(), &eth()), ether(10));
}

#[test]
fn test_repaid_flash_loan_commits() {
    let mut ledger = lender_world(FlashFee::Zero, false);
    let effects = ledger
        .submit(&"alice".into(), &[flash(ether(1_000), vec![repay()])])
        .unwrap();

    assert_eq!(effects.flash_loans, 1);
    assert_eq!(ledger.balance(&"lender".into(), &dvt()), ether(1_000));
    assert_eq!(ledger.stats().flash_loans_settled, 1);
}

#[test]
fn test_fee_shortfall_aborts_with_pool_unchanged() {
    let mut ledger = lender_world(FlashFee::Fixed { amount: ether(20) }, false);
    let abort = ledger
        .submit(&"alice".into(), &[flash(ether(100), vec![repay()])])
        .unwrap_err();

    // alice holds 10 DVT and cannot cover the 20 DVT fee
    assert_eq!(abort.kind, ErrorKind::InsufficientBalance);
    assert_eq!(abort.path, vec![0, 0]);
    assert_eq!(ledger.balance(&"lender".into(), &dvt()), ether(1_000));
    assert_eq!(ledger.balance(&"alice".into(), &dvt()), ether(10));
}

#[test]
fn test_partial_repayment_fails_settlement() {
    let mut ledger = lender_world(FlashFee::Zero, false);
    let abort = ledger
        .submit(
            &"alice".into(),
            &[flash(
                ether(100),
                vec![Operation::Transfer {
                    to: "lender".into(),
                    asset: dvt(),
                    amount: ether(99),
                }],
            )],
        )
        .unwrap_err();

    assert_eq!(abort.kind, ErrorKind::PostconditionFailed);
    assert_eq!(abort.path, vec![0]);
    assert_eq!(ledger.balance(&"lender".into(), &dvt()), ether(1_000));
}

#[test]
fn test_loan_larger_than_lender_is_rejected() {
    let mut ledger = lender_world(FlashFee::Zero, false);
    let abort = ledger
        .submit(&"alice".into(), &[flash(ether(1_001), vec![repay()])])
        .unwrap_err();
    assert_eq!(abort.kind, ErrorKind::InsufficientBalance);
}

#[test]
fn test_nested_loans_settle_per_depth() {
    let mut ledger = lender_world(FlashFee::Zero, false);
    let effects = ledger
        .submit(
            &"alice".into(),
            &[flash(
                ether(400),
                vec![flash(ether(600), vec![repay()]), repay()],
            )],
        )
        .unwrap();

    assert_eq!(effects.flash_loans, 2);
    assert_eq!(ledger.balance(&"lender".into(), &dvt()), ether(1_000));
}

#[test]
fn test_guarded_lender_rejects_reentry() {
    let mut ledger = lender_world(FlashFee::Zero, true);
    let abort = ledger
        .submit(
            &"alice".into(),
            &[flash(
                ether(400),
                vec![flash(ether(100), vec![repay()]), repay()],
            )],
        )
        .unwrap_err();

    assert_eq!(abort.kind, ErrorKind::InvalidState);
    assert_eq!(abort.path, vec![0, 0]);
    assert_eq!(ledger.balance(&"lender".into(), &dvt()), ether(1_000));
}

#[test]
fn test_callback_as_uncontrolled_receiver_is_unauthorized() {
    let mut ledger = lender_world(FlashFee::Zero, false);
    let abort = ledger
        .submit(
            &"alice".into(),
            &[Operation::FlashBorrow {
                lender: "lender".into(),
                amount: ether(1),
                receiver: Some("bob".into()),
                callback: vec![repay()],
            }],
        )
        .unwrap_err();
    assert_eq!(abort.kind, ErrorKind::Unauthorized);
}

#[test]
fn test_invoke_requires_control() {
    let mut state = LedgerState::new(0);
    state.mint(&"vault".into(), &eth(), ether(5)).unwrap();
    state.set_controller("vault".into(), "alice".into());
    let mut ledger = Ledger::new(state);

    let take = |caller: &str| {
        vec![Operation::Invoke {
            account: "vault".into(),
            ops: vec![Operation::Transfer {
                to: AccountId::from(caller),
                asset: eth(),
                amount: ether(5),
            }],
        }]
    };

    let abort = ledger.submit(&"mallory".into(), &take("mallory")).unwrap_err();
    assert_eq!(abort.kind, ErrorKind::Unauthorized);

    ledger.submit(&"alice".into(), &take("alice")).unwrap();
    assert_eq!(ledger.balance(&"alice".into(), &eth()), ether(5));
}

#[test]
fn test_failed_require_aborts_with_index() {
    let mut ledger = lender_world(FlashFee::Zero, false);
    let abort = ledger
        .unit("alice")
        .then(Operation::Transfer {
            to: "bob".into(),
            asset: dvt(),
            amount: ether(1),
        })
        .then(Operation::Require {
            check: Check::BalanceAtMost {
                account: "alice".into(),
                asset: dvt(),
                amount: ether(1),
            },
        })
        .commit()
        .unwrap_err();

    assert_eq!(abort.index, 1);
    assert_eq!(abort.kind, ErrorKind::PostconditionFailed);
    assert_eq!(ledger.balance(&"bob".into(), &dvt()), 0);
}

proptest! {
    #[test]
    fn prop_unrepaid_loans_never_move_the_lender(amount in 1u128..=1_000, kept in 1u128..=1_000) {
        let amount = ether(amount);
        let kept = ether(kept).min(amount);
        let mut ledger = lender_world(FlashFee::Zero, false);
        let result = ledger.submit(
            &"alice".into(),
            &[flash(
                amount,
                vec![Operation::Transfer {
                    to: "lender".into(),
                    asset: dvt(),
                    amount: amount - kept,
                }],
            )],
        );

        prop_assert!(result.is_err());
        prop_assert_eq!(ledger.balance(&"lender".into(), &dvt()), ether(1_000));
        prop_assert_eq!(ledger.balance(&"alice".into(), &dvt()), ether(10));
    }
}
