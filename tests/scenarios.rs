//! End-to-end scenarios over the standard provider graph.

#![allow(clippy::panic)]

use std::sync::Arc;

use vesting_ledger::clock::ManualClock;
use vesting_ledger::config::LedgerConfig;
use vesting_ledger::deploy::StandardProviders;
use vesting_ledger::domain::{
    Address, AssetId, Balances, EventFilter, PoolId, SplitPayload, SplitRequest, TransferOutcome,
};
use vesting_ledger::error::{ErrorKind, LedgerError};
use vesting_ledger::ledger::{Ledger, NewCollateral, NewPool, NewRefund, REGISTRY_ADDRESS};
use vesting_ledger::math::{Amount, RATE_SCALE, Ratio};
use vesting_ledger::providers::{FeeTiming, ProviderClass, ProviderKind};
use vesting_ledger::service::LedgerService;

const ADMIN: Address = Address::from_low_u64(1);
const PROJECT: Address = Address::from_low_u64(2);
const ALICE: Address = Address::from_low_u64(3);
const BOB: Address = Address::from_low_u64(4);
const CAROL: Address = Address::from_low_u64(5);
const COLLECTOR: Address = Address::from_low_u64(9);
const INDEXER: Address = Address::from_low_u64(10);

const TOKEN: AssetId = AssetId::new(Address::from_low_u64(100));
const MAIN: AssetId = AssetId::new(Address::from_low_u64(101));

const T: u64 = 1_700_000_000;
const DAY: u64 = 86_400;
const WEEK: u64 = 7 * DAY;
const SUPPLY: Amount = 1_000_000;

struct World {
    ledger: Ledger,
    clock: ManualClock,
    p: StandardProviders,
}

fn world_with(config: LedgerConfig, now: u64) -> World {
    vesting_ledger::telemetry::init_tracing(false);
    let clock = ManualClock::new(now);
    let mut ledger = Ledger::new(ADMIN, Balances::new(), Arc::new(clock.clone()), config);
    for holder in [PROJECT, ALICE, BOB] {
        for asset in [TOKEN, MAIN] {
            let Ok(()) = ledger.book_mut().mint(asset, holder, SUPPLY) else {
                panic!("fund {holder}");
            };
        }
    }
    let Ok(p) = StandardProviders::deploy(&mut ledger, ADMIN, COLLECTOR) else {
        panic!("deploy standard providers");
    };
    World { ledger, clock, p }
}

fn world(now: u64) -> World {
    world_with(LedgerConfig::default(), now)
}

fn percent(value: u128) -> Ratio {
    let Ok(ratio) = Ratio::from_percent(value) else {
        panic!("ratio {value}");
    };
    ratio
}

impl World {
    fn create(&mut self, owner: Address, provider: Address, params: Vec<Amount>) -> PoolId {
        let request = NewPool {
            owner,
            asset: TOKEN,
            provider,
            params,
        };
        let Ok(pool_id) = self.ledger.create_pool(PROJECT, request) else {
            panic!("create pool");
        };
        pool_id
    }

    fn params(&self, pool_id: PoolId) -> Vec<Amount> {
        let Ok(snapshot) = self.ledger.get_data(pool_id) else {
            panic!("snapshot of {pool_id}");
        };
        snapshot.params
    }

    fn balance(&self, asset: AssetId, holder: Address) -> Amount {
        self.ledger.book().balance_of(asset, holder)
    }
}

#[test]
fn timed_pool_vests_linearly_and_splits_in_half() {
    let mut w = world(T);
    let timed = w.p.timed;
    let pool_id = w.create(ALICE, timed, vec![100_000, u128::from(T), u128::from(T + WEEK)]);

    w.clock.set(T + WEEK / 2);
    assert_eq!(w.ledger.withdrawable(pool_id), Ok(50_000));
    let Ok(outcome) = w.ledger.withdraw(ALICE, pool_id) else {
        panic!("withdraw");
    };
    assert_eq!(outcome.released, 50_000);
    assert!(!outcome.is_final);
    assert_eq!(w.ledger.committed(pool_id), Ok(50_000));

    let Ok(new_pool) = w
        .ledger
        .split(ALICE, pool_id, SplitRequest::Ratio(percent(50)), BOB)
    else {
        panic!("split");
    };
    let old = w.params(pool_id);
    let new = w.params(new_pool);
    assert_eq!(old.first(), Some(&25_000));
    assert_eq!(new.first(), Some(&25_000));
    assert_eq!(old.get(1..3), new.get(1..3));
    assert_eq!(old.get(1..3), Some(&[u128::from(T), u128::from(T + WEEK)][..]));
}

#[test]
fn timed_vesting_is_monotonic() {
    let mut w = world(T);
    let timed = w.p.timed;
    let pool_id = w.create(ALICE, timed, vec![99_999, u128::from(T + DAY), u128::from(T + 3 * DAY)]);
    let mut last = 0;
    for step in 0..=40 {
        w.clock.set(T + step * 2 * 3_600);
        let Ok(now) = w.ledger.withdrawable(pool_id) else {
            panic!("withdrawable");
        };
        assert!(now >= last);
        last = now;
    }
    w.clock.set(T + 3 * DAY);
    assert_eq!(w.ledger.withdrawable(pool_id), Ok(99_999));
}

#[test]
fn bundle_releases_children_as_they_unlock() {
    let mut w = world(T - 100);
    let (deal, lock, timed, bundle) = (w.p.deal, w.p.lock, w.p.timed, w.p.bundle);
    let Ok(parent) = w.ledger.create_bundle(
        PROJECT,
        ALICE,
        TOKEN,
        bundle,
        &[deal, lock, timed],
        &[
            vec![100_000],
            vec![100_000, u128::from(T)],
            vec![100_000, u128::from(T), u128::from(T + WEEK)],
        ],
    ) else {
        panic!("create bundle");
    };
    assert_eq!(w.ledger.total_remaining(parent), Ok(300_000));

    w.clock.set(T);
    let Ok(first) = w.ledger.withdraw(ALICE, parent) else {
        panic!("withdraw at start");
    };
    assert_eq!(first.released, 200_000);
    assert!(!first.is_final);
    assert_eq!(w.ledger.total_remaining(parent), Ok(100_000));

    w.clock.set(T + WEEK);
    let Ok(last) = w.ledger.withdraw(ALICE, parent) else {
        panic!("withdraw at finish");
    };
    assert_eq!(last.released, 100_000);
    assert!(last.is_final);
    assert_eq!(w.ledger.get_data(parent), Err(LedgerError::PoolTerminal(parent)));
    assert_eq!(
        w.ledger.total_remaining(parent),
        Err(LedgerError::InvalidProviderPoolId(parent))
    );
    assert_eq!(w.balance(TOKEN, ALICE), SUPPLY + 300_000);
}

#[test]
fn bundle_split_conserves_children() {
    let mut w = world(T - 100);
    let (deal, lock, timed, bundle) = (w.p.deal, w.p.lock, w.p.timed, w.p.bundle);
    let Ok(parent) = w.ledger.create_bundle(
        PROJECT,
        ALICE,
        TOKEN,
        bundle,
        &[deal, lock, timed],
        &[
            vec![100_000],
            vec![100_000, u128::from(T)],
            vec![100_000, u128::from(T), u128::from(T + WEEK)],
        ],
    ) else {
        panic!("create bundle");
    };
    let Ok(new_parent) = w
        .ledger
        .split(ALICE, parent, SplitRequest::Ratio(percent(50)), BOB)
    else {
        panic!("split bundle");
    };
    assert_eq!(w.ledger.total_remaining(parent), Ok(150_000));
    assert_eq!(w.ledger.total_remaining(new_parent), Ok(150_000));
    assert_eq!(w.ledger.pools_of(BOB), vec![new_parent]);
    assert_eq!(w.ledger.check_solvency(), Ok(()));
}

#[test]
fn uneven_bundle_split_leaves_dust_children_behind() {
    let mut w = world(T);
    let (deal, bundle) = (w.p.deal, w.p.bundle);
    let Ok(parent) = w.ledger.create_bundle(
        PROJECT,
        ALICE,
        TOKEN,
        bundle,
        &[deal, deal],
        &[vec![1], vec![100_000]],
    ) else {
        panic!("create bundle");
    };
    let Ok(new_parent) = w
        .ledger
        .split(ALICE, parent, SplitRequest::Ratio(percent(50)), BOB)
    else {
        panic!("split uneven bundle");
    };
    assert_eq!(w.ledger.total_remaining(parent), Ok(50_001));
    assert_eq!(w.ledger.total_remaining(new_parent), Ok(50_000));
    assert_eq!(w.ledger.check_solvency(), Ok(()));

    let Ok(bob) = w.ledger.withdraw(BOB, new_parent) else {
        panic!("withdraw new bundle");
    };
    assert_eq!(bob.released, 50_000);
    assert!(bob.is_final);
    let Ok(alice) = w.ledger.withdraw(ALICE, parent) else {
        panic!("withdraw old bundle");
    };
    assert_eq!(alice.released, 50_001);
}

#[test]
fn bundle_split_moving_nothing_is_rejected() {
    let mut w = world(T);
    let (deal, bundle) = (w.p.deal, w.p.bundle);
    let Ok(parent) = w.ledger.create_bundle(
        PROJECT,
        ALICE,
        TOKEN,
        bundle,
        &[deal, deal],
        &[vec![1], vec![1]],
    ) else {
        panic!("create bundle");
    };
    assert_eq!(
        w.ledger
            .split(ALICE, parent, SplitRequest::Ratio(percent(50)), BOB),
        Err(LedgerError::InvalidSplit {
            requested: 0,
            available: 2
        })
    );
    assert!(w.ledger.pools_of(BOB).is_empty());
    assert_eq!(w.ledger.total_remaining(parent), Ok(2));
}

#[test]
fn bundle_children_are_not_publicly_mutable() {
    let mut w = world(T);
    let (deal, bundle) = (w.p.deal, w.p.bundle);
    let Ok(parent) = w.ledger.create_bundle(
        PROJECT,
        ALICE,
        TOKEN,
        bundle,
        &[deal, deal],
        &[vec![10], vec![20]],
    ) else {
        panic!("create bundle");
    };
    let child = parent.next();
    assert_eq!(
        w.ledger.withdraw(ALICE, child),
        Err(LedgerError::ProviderOwnedPool(child))
    );
    assert_eq!(
        w.ledger.transfer(ALICE, child, BOB, None),
        Err(LedgerError::ProviderOwnedPool(child))
    );
}

#[test]
fn terminal_pool_never_releases_twice() {
    let mut w = world(T);
    let deal = w.p.deal;
    let pool_id = w.create(ALICE, deal, vec![1_000]);
    let Ok(outcome) = w.ledger.withdraw(ALICE, pool_id) else {
        panic!("withdraw");
    };
    assert!(outcome.is_final);
    let before = w.balance(TOKEN, ALICE);
    for _ in 0..3 {
        let Err(err) = w.ledger.withdraw(ALICE, pool_id) else {
            panic!("terminal pool withdrew again");
        };
        assert_eq!(err, LedgerError::PoolTerminal(pool_id));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
    assert_eq!(w.balance(TOKEN, ALICE), before);
}

#[test]
fn custody_covers_commitments_through_a_busy_sequence() {
    let mut w = world(T);
    let (deal, lock, timed) = (w.p.deal, w.p.lock, w.p.timed);
    let a = w.create(ALICE, timed, vec![90_000, u128::from(T), u128::from(T + WEEK)]);
    let b = w.create(ALICE, lock, vec![7_777, u128::from(T + DAY)]);
    let c = w.create(BOB, deal, vec![12_345]);

    w.clock.set(T + DAY);
    let Ok(_) = w.ledger.withdraw(ALICE, a) else {
        panic!("withdraw a");
    };
    let Ok(a2) = w.ledger.split(ALICE, a, SplitRequest::Amount(33_333), CAROL) else {
        panic!("split a");
    };
    let Ok(_) = w.ledger.split(ALICE, b, SplitRequest::Ratio(percent(10)), BOB) else {
        panic!("split b");
    };
    let Ok(_) = w.ledger.split(BOB, c, SplitRequest::Amount(1), ALICE) else {
        panic!("split c");
    };
    w.clock.set(T + 4 * DAY);
    let Ok(_) = w.ledger.withdraw(CAROL, a2) else {
        panic!("withdraw a2");
    };
    let Ok(_) = w.ledger.multi_withdraw(ALICE) else {
        panic!("multi-withdraw alice");
    };

    assert_eq!(w.ledger.check_solvency(), Ok(()));
    let committed: Amount = [ALICE, BOB, CAROL]
        .iter()
        .flat_map(|owner| w.ledger.pools_of(*owner))
        .filter_map(|pool_id| w.ledger.committed(pool_id).ok())
        .sum();
    assert!(w.ledger.vault().total_custodied(TOKEN) >= committed);
    let circulating: Amount = [PROJECT, ALICE, BOB, CAROL]
        .iter()
        .map(|holder| w.balance(TOKEN, *holder))
        .sum();
    assert_eq!(
        circulating + w.ledger.vault().total_custodied(TOKEN),
        3 * SUPPLY
    );
}

#[test]
fn disallowed_compositions_register_nothing() {
    let mut w = world(T);
    let (deal, collateral, refund, bundle) = (w.p.deal, w.p.collateral, w.p.refund, w.p.bundle);

    let result = w.ledger.create_bundle(
        PROJECT,
        ALICE,
        TOKEN,
        bundle,
        &[deal, collateral],
        &[vec![10], vec![10]],
    );
    let Err(err) = result else {
        panic!("bundle over collateral accepted");
    };
    assert_eq!(
        err,
        LedgerError::InvalidProviderType {
            outer: ProviderClass::Bundle,
            inner: ProviderClass::Collateral
        }
    );
    assert_eq!(err.kind(), ErrorKind::InvalidComposition);

    let Ok(collateral_pool) = w.ledger.create_collateral(
        PROJECT,
        NewCollateral {
            owner: PROJECT,
            provider: collateral,
            token: TOKEN,
            main_coin: MAIN,
            amount: 1_000,
            rate: RATE_SCALE,
            finish: T + DAY,
        },
    ) else {
        panic!("create collateral");
    };
    let pools_before = w.ledger.pools_of(ALICE);
    let result = w.ledger.create_refund(
        PROJECT,
        NewRefund {
            provider: refund,
            collateral: collateral_pool,
            schedule: NewPool {
                owner: ALICE,
                asset: TOKEN,
                provider: bundle,
                params: vec![10],
            },
        },
    );
    assert!(matches!(
        result,
        Err(LedgerError::InvalidProviderType {
            outer: ProviderClass::Refund,
            inner: ProviderClass::Bundle
        })
    ));
    assert_eq!(w.ledger.pools_of(ALICE), pools_before);

    let Err(err) = w
        .ledger
        .install_provider(ADMIN, ProviderKind::Bundle)
        .and_then(|nested| w.ledger.install_provider(ADMIN, ProviderKind::Lock { inner: nested }))
    else {
        panic!("lock over bundle accepted");
    };
    assert_eq!(err.kind(), ErrorKind::InvalidComposition);

    let result = w
        .ledger
        .create_bundle(PROJECT, ALICE, TOKEN, bundle, &[deal], &[vec![10]]);
    assert_eq!(result, Err(LedgerError::InvalidAddressesLength(1)));
    let result = w
        .ledger
        .create_bundle(PROJECT, ALICE, TOKEN, bundle, &[deal, deal], &[vec![10]]);
    assert_eq!(
        result,
        Err(LedgerError::ProvidersParamsLengthMismatch {
            providers: 2,
            params: 1
        })
    );
}

#[test]
fn failing_child_rolls_back_the_whole_bundle() {
    let mut w = world(T);
    let (deal, lock, bundle) = (w.p.deal, w.p.lock, w.p.bundle);
    let custody_before = w.ledger.vault().total_custodied(TOKEN);
    let result = w.ledger.create_bundle(
        PROJECT,
        ALICE,
        TOKEN,
        bundle,
        &[deal, lock],
        &[vec![500], vec![500, u128::from(T - 1)]],
    );
    assert_eq!(
        result,
        Err(LedgerError::InvalidStartTime {
            start: T - 1,
            now: T
        })
    );
    assert!(w.ledger.pools_of(ALICE).is_empty());
    assert_eq!(w.balance(TOKEN, PROJECT), SUPPLY);
    assert_eq!(w.ledger.vault().total_custodied(TOKEN), custody_before);
}

#[test]
fn split_by_transfer_payload_and_withdraw_by_transfer() {
    let mut w = world(T);
    let deal = w.p.deal;
    let pool_id = w.create(ALICE, deal, vec![1_000]);
    let payload = SplitPayload {
        ratio: percent(25),
        new_owner: BOB,
    };
    assert_eq!(
        w.ledger.transfer(ALICE, pool_id, CAROL, Some(payload)),
        Err(LedgerError::InvalidTransferTarget {
            pool_id,
            to: CAROL
        })
    );
    let Ok(TransferOutcome::Split { new_pool_id }) =
        w.ledger.transfer(ALICE, pool_id, REGISTRY_ADDRESS, Some(payload))
    else {
        panic!("split by transfer");
    };
    assert_eq!(w.ledger.committed(new_pool_id), Ok(250));
    assert_eq!(w.ledger.committed(pool_id), Ok(750));

    let Ok(TransferOutcome::Withdrawn(outcome)) =
        w.ledger.transfer(BOB, new_pool_id, REGISTRY_ADDRESS, None)
    else {
        panic!("withdraw by transfer");
    };
    assert_eq!(outcome.released, 250);
    assert_eq!(w.balance(TOKEN, BOB), SUPPLY + 250);
    assert_eq!(
        w.ledger.transfer(ALICE, pool_id, Address::ZERO, None),
        Err(LedgerError::ZeroAddress)
    );
}

#[test]
fn refund_and_collateral_settlement() {
    let mut w = world(T);
    let (deal, collateral, refund) = (w.p.deal, w.p.collateral, w.p.refund);
    let Ok(collateral_pool) = w.ledger.create_collateral(
        PROJECT,
        NewCollateral {
            owner: PROJECT,
            provider: collateral,
            token: TOKEN,
            main_coin: MAIN,
            amount: 10_000,
            rate: RATE_SCALE / 10,
            finish: T + 30 * DAY,
        },
    ) else {
        panic!("create collateral");
    };

    let refund_pool = |w: &mut World, owner: Address| {
        let request = NewRefund {
            provider: refund,
            collateral: collateral_pool,
            schedule: NewPool {
                owner,
                asset: TOKEN,
                provider: deal,
                params: vec![1_000],
            },
        };
        let Ok(pool_id) = w.ledger.create_refund(PROJECT, request) else {
            panic!("create refund");
        };
        pool_id
    };
    let alice_refund = refund_pool(&mut w, ALICE);
    let bob_refund = refund_pool(&mut w, BOB);
    let carol_refund = refund_pool(&mut w, CAROL);
    assert_eq!(w.params(alice_refund).first(), Some(&1_000));

    // Alice hands her tokens back for main coin.
    let Ok(TransferOutcome::Refunded {
        main_coin_pool: Some(main_pool),
    }) = w.ledger.transfer(ALICE, alice_refund, refund, None)
    else {
        panic!("refund");
    };
    let Ok(paid) = w.ledger.withdraw(ALICE, main_pool) else {
        panic!("withdraw main coin");
    };
    assert_eq!(paid.released, 100);
    assert_eq!(w.balance(MAIN, ALICE), SUPPLY + 100);

    // Bob keeps his tokens; the project earns his main coin.
    let Ok(kept) = w.ledger.withdraw(BOB, bob_refund) else {
        panic!("withdraw refund pool");
    };
    assert_eq!(kept.released, 1_000);
    assert_eq!(w.ledger.withdrawable(collateral_pool), Ok(100));

    let Ok(TransferOutcome::Withdrawn(early)) =
        w.ledger.transfer(PROJECT, collateral_pool, collateral, None)
    else {
        panic!("early collateral withdraw");
    };
    assert_eq!(early.released, 100);
    assert!(!early.is_final);
    assert_eq!(w.balance(TOKEN, PROJECT), SUPPLY - 3_000 + 1_000);

    // After finish the window is closed and the project takes the rest.
    w.clock.set(T + 30 * DAY);
    assert_eq!(
        w.ledger.transfer(CAROL, carol_refund, refund, None),
        Err(LedgerError::RefundWindowClosed {
            finish: T + 30 * DAY
        })
    );
    let Ok(TransferOutcome::Withdrawn(last)) =
        w.ledger.transfer(PROJECT, collateral_pool, collateral, None)
    else {
        panic!("final collateral withdraw");
    };
    assert_eq!(last.released, 9_800);
    assert!(last.is_final);
    assert_eq!(w.balance(MAIN, PROJECT), SUPPLY - 100);

    let Ok(carol) = w.ledger.withdraw(CAROL, carol_refund) else {
        panic!("carol keeps her tokens");
    };
    assert_eq!(carol.released, 1_000);
    assert_eq!(w.ledger.check_solvency(), Ok(()));
}

#[test]
fn collateral_split_divides_the_surplus() {
    let mut w = world(T);
    let collateral = w.p.collateral;
    let Ok(pool_id) = w.ledger.create_collateral(
        PROJECT,
        NewCollateral {
            owner: PROJECT,
            provider: collateral,
            token: TOKEN,
            main_coin: MAIN,
            amount: 1_000,
            rate: RATE_SCALE,
            finish: T + DAY,
        },
    ) else {
        panic!("create collateral");
    };
    let Ok(new_pool) = w
        .ledger
        .split(PROJECT, pool_id, SplitRequest::Ratio(percent(50)), BOB)
    else {
        panic!("split collateral");
    };
    assert_eq!(w.ledger.committed(pool_id), Ok(500));
    assert_eq!(w.ledger.committed(new_pool), Ok(500));
    assert_eq!(w.ledger.check_solvency(), Ok(()));
}

#[test]
fn fee_pool_requires_the_collector_step() {
    let mut w = world(T);
    let (deal, deal_fee) = (w.p.deal, w.p.deal_fee);
    let pool_id = w.create(ALICE, deal_fee, vec![10_000]);

    assert_eq!(
        w.ledger.withdraw(ALICE, pool_id),
        Err(LedgerError::FeeNotCollected(pool_id))
    );
    assert_eq!(
        w.ledger.transfer(ALICE, pool_id, deal, None),
        Err(LedgerError::FeeNotCollected(pool_id))
    );
    let Ok(TransferOutcome::FeeCollected { fee, withdrawal }) =
        w.ledger.transfer(ALICE, pool_id, deal_fee, None)
    else {
        panic!("collector step");
    };
    assert_eq!(fee, 100);
    assert_eq!(withdrawal.released, 9_900);
    assert!(withdrawal.is_final);
    assert_eq!(w.balance(TOKEN, COLLECTOR), 100);
}

#[test]
fn fee_at_creation_is_skimmed_up_front() {
    let config = LedgerConfig {
        fee_timing: FeeTiming::AtCreation,
        ..LedgerConfig::default()
    };
    let mut w = world_with(config, T);
    let deal_fee = w.p.deal_fee;
    let pool_id = w.create(ALICE, deal_fee, vec![10_000]);
    assert_eq!(w.balance(TOKEN, COLLECTOR), 100);
    assert_eq!(w.ledger.withdrawable(pool_id), Ok(9_900));
    assert_eq!(
        w.ledger.transfer(ALICE, pool_id, deal_fee, None),
        Err(LedgerError::FeeAlreadyCollected(pool_id))
    );
    let Ok(outcome) = w.ledger.withdraw(ALICE, pool_id) else {
        panic!("withdraw");
    };
    assert_eq!(outcome.released, 9_900);
}

#[test]
fn delay_vault_tiers_upgrades_and_settlement() {
    let mut w = world(T);
    let vault = w.p.delay_vault;
    assert_eq!(w.ledger.the_type_of(vault, 1_000), Ok(0));
    assert_eq!(w.ledger.the_type_of(vault, 1_001), Ok(1));
    assert_eq!(w.ledger.the_type_of(vault, 10_000_000), Ok(2));

    let Ok(small) = w.ledger.delay_deposit(ALICE, vault, TOKEN, 500) else {
        panic!("first deposit");
    };
    let Ok(large) = w.ledger.delay_deposit(ALICE, vault, TOKEN, 2_000) else {
        panic!("second deposit");
    };
    assert_eq!(w.ledger.user_total(vault, ALICE), 2_500);
    assert_eq!(w.params(small), vec![500, 0]);
    assert_eq!(w.params(large), vec![2_000, 1]);
    assert_eq!(w.ledger.withdrawable(large), Ok(0));

    let Ok(()) = w.ledger.upgrade_type(ALICE, small, 1) else {
        panic!("upgrade");
    };
    assert_eq!(
        w.ledger.upgrade_type(ALICE, small, 1),
        Err(LedgerError::InvalidTier {
            requested: 1,
            current: 1,
            count: 3
        })
    );
    assert!(w.ledger.upgrade_type(ALICE, small, 3).is_err());

    let Ok(TransferOutcome::Settled { new_pool_id }) =
        w.ledger.transfer(ALICE, large, vault, None)
    else {
        panic!("settle");
    };
    let Ok(snapshot) = w.ledger.get_data(new_pool_id) else {
        panic!("settled snapshot");
    };
    assert_eq!(snapshot.provider_class, ProviderClass::Lock);
    assert_eq!(snapshot.params, vec![2_000, u128::from(T + WEEK)]);
    assert_eq!(w.ledger.user_total(vault, ALICE), 500);

    let Ok(TransferOutcome::Transferred) = w.ledger.transfer(ALICE, small, BOB, None) else {
        panic!("transfer delay pool");
    };
    assert_eq!(w.ledger.user_total(vault, ALICE), 0);
    assert_eq!(w.ledger.user_total(vault, BOB), 500);
}

#[test]
fn approved_contracts_register_and_withdraw_for_owners() {
    let mut w = world(T);
    let timed = w.p.timed;
    let pool_id = w.create(ALICE, timed, vec![1_000, u128::from(T), u128::from(T + WEEK)]);
    let moved = vec![1_000, u128::from(T), u128::from(T + 2 * WEEK), 1_000];
    assert_eq!(
        w.ledger.register_pool(INDEXER, pool_id, moved.clone()),
        Err(LedgerError::ContractNotApproved(INDEXER))
    );
    let Ok(()) = w.ledger.set_approved_contract(ADMIN, INDEXER, true) else {
        panic!("approve contract");
    };
    let Ok(()) = w.ledger.register_pool(INDEXER, pool_id, moved.clone()) else {
        panic!("register");
    };
    assert_eq!(w.params(pool_id), moved);
    assert_eq!(
        w.ledger
            .register_pool(INDEXER, pool_id, vec![900, u128::from(T), u128::from(T + WEEK), 1_000]),
        Err(LedgerError::CommittedAmountChanged {
            expected: 1_000,
            got: 900
        })
    );

    w.clock.set(T + 2 * WEEK);
    let Ok(outcome) = w.ledger.withdraw(INDEXER, pool_id) else {
        panic!("contract withdraw");
    };
    assert_eq!(outcome.released, 1_000);
    assert_eq!(w.balance(TOKEN, ALICE), SUPPLY + 1_000);
    assert_eq!(w.balance(TOKEN, INDEXER), 0);
}

#[test]
fn register_rejects_principal_below_left_amount() {
    let mut w = world(T);
    let timed = w.p.timed;
    let pool_id = w.create(ALICE, timed, vec![1_000, u128::from(T), u128::from(T + WEEK)]);
    let Ok(()) = w.ledger.set_approved_contract(ADMIN, CAROL, true) else {
        panic!("approve contract");
    };
    let before = w.params(pool_id);
    assert_eq!(
        w.ledger
            .register_pool(CAROL, pool_id, vec![1_000, u128::from(T), u128::from(T + WEEK), 10]),
        Err(LedgerError::InvalidStartAmount {
            left: 1_000,
            start_amount: 10
        })
    );
    assert_eq!(w.params(pool_id), before);

    let Ok(new_pool) = w.ledger.split(ALICE, pool_id, SplitRequest::Amount(500), BOB) else {
        panic!("split after rejected register");
    };
    for side in [pool_id, new_pool] {
        let params = w.params(side);
        assert!(params.first() <= params.get(3), "{params:?}");
    }
}

#[test]
fn revoked_provider_freezes_its_pools() {
    let mut w = world(T);
    let deal = w.p.deal;
    let pool_id = w.create(ALICE, deal, vec![100]);
    let Ok(()) = w.ledger.set_approved_provider(ADMIN, deal, false) else {
        panic!("revoke");
    };
    assert_eq!(
        w.ledger.withdraw(ALICE, pool_id),
        Err(LedgerError::ProviderNotApproved(deal))
    );
    assert_eq!(
        w.ledger.set_approved_provider(ALICE, deal, true),
        Err(LedgerError::NotRegistryOwner(ALICE))
    );
}

#[test]
fn service_publishes_committed_events_to_followers() {
    let w = world(T);
    let deal = w.p.deal;
    let service = LedgerService::new(w.ledger);
    let mut rx = service.event_bus().subscribe();

    let pool_id = tokio_test::block_on(async {
        let request = NewPool {
            owner: ALICE,
            asset: TOKEN,
            provider: deal,
            params: vec![500],
        };
        let Ok(created) = service.create_pool(PROJECT, request).await else {
            panic!("create through service");
        };
        assert!(service.withdraw(BOB, created.value).await.is_err());
        let Ok(withdrawn) = service.withdraw(ALICE, created.value).await else {
            panic!("withdraw through service");
        };
        assert_eq!(withdrawn.value.released, 500);
        assert_ne!(created.tx_id, withdrawn.tx_id);
        created.value
    });

    let mut filter = EventFilter::new();
    filter.follow(&[pool_id]);
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if filter.admit(&event) {
            seen.push(event.event_type_str());
        }
    }
    assert_eq!(seen.first(), Some(&"pool_created"));
    assert_eq!(seen.iter().filter(|kind| **kind == "pool_withdrawn").count(), 1);
}
