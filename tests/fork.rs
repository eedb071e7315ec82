pub mod common;

use alloy_primitives::{Bytes, B256, U256};
use alloy_sol_types::SolValue;
use common::{
    contract, fork, init_code, mock_address, BLOCK_NUMBER, CLOCK, FORK_POINT, REVERTER, STORE,
};
use globe_fork::{ForkError, BLOCK_INTERVAL};

fn word(data: &Bytes) -> U256 {
    U256::from_be_bytes(B256::from_slice(data).0)
}

#[test]
fn impersonation_is_enforced() {
    let clock = mock_address(1);
    let alice = mock_address(2);
    let mut fork = fork([(clock, contract(CLOCK))]);

    let signer = fork.impersonate(alice);
    assert!(fork.is_impersonated(&alice));
    fork.send(signer, clock, Bytes::new()).unwrap();

    fork.stop_impersonating(alice);
    assert!(!fork.is_impersonated(&alice));
    assert_eq!(
        fork.send(signer, clock, Bytes::new()),
        Err(ForkError::NotImpersonated(alice))
    );
}

#[test]
fn transfers_are_exact() {
    let alice = mock_address(2);
    let bob = mock_address(3);
    let mut fork = fork([]);
    let ether = U256::from(10).pow(U256::from(18));

    fork.set_balance(alice, ether * U256::from(10)).unwrap();
    let signer = fork.impersonate(alice);
    fork.transfer(signer, bob, ether * U256::from(3)).unwrap();

    // Transactions are free so only the value moves.
    assert_eq!(fork.balance(alice).unwrap(), ether * U256::from(7));
    assert_eq!(fork.balance(bob).unwrap(), ether * U256::from(3));
}

#[test]
fn call_does_not_commit() {
    let store = mock_address(1);
    let alice = mock_address(2);
    let mut fork = fork([(store, contract(STORE))]);
    let data = Bytes::from([[0u8; 4].as_slice(), &U256::from(42).abi_encode()].concat());

    fork.call(alice, store, data.clone()).unwrap();
    assert_eq!(fork.storage_at(store, U256::ZERO).unwrap(), U256::ZERO);

    let signer = fork.impersonate(alice);
    let receipt = fork.send(signer, store, data).unwrap();
    assert_eq!(receipt.block_number, FORK_POINT.number + 1);
    assert_eq!(fork.storage_at(store, U256::ZERO).unwrap(), U256::from(42));
}

#[test]
fn storage_overrides_are_visible_to_contracts() {
    let store = mock_address(1);
    let mut fork = fork([(store, contract(STORE))]);

    fork.set_storage_at(store, U256::from(5), U256::from(7)).unwrap();
    assert_eq!(fork.storage_at(store, U256::from(5)).unwrap(), U256::from(7));
    assert_eq!(fork.code_at(store).unwrap(), STORE);
    assert!(fork.code_at(mock_address(9)).unwrap().is_empty());
}

#[test]
fn increase_time_moves_the_clock() {
    let clock = mock_address(1);
    let mut fork = fork([(clock, contract(CLOCK))]);
    let before = word(&fork.call(mock_address(2), clock, Bytes::new()).unwrap());
    assert_eq!(before, U256::from(FORK_POINT.timestamp));

    let fifteen_days = 60 * 60 * 24 * 15;
    fork.increase_time(fifteen_days);

    let after = word(&fork.call(mock_address(2), clock, Bytes::new()).unwrap());
    assert_eq!(after, before + U256::from(fifteen_days));
    assert_eq!(fork.block_number(), FORK_POINT.number + 1);
}

#[test]
fn mine_moves_the_block_number() {
    let number = mock_address(1);
    let mut fork = fork([(number, contract(BLOCK_NUMBER))]);

    fork.mine(5);

    let mined = word(&fork.call(mock_address(2), number, Bytes::new()).unwrap());
    assert_eq!(mined, U256::from(FORK_POINT.number + 5));
    assert_eq!(fork.timestamp(), FORK_POINT.timestamp + 5 * BLOCK_INTERVAL);
}

#[test]
fn revert_restores_state_and_block() {
    let store = mock_address(1);
    let alice = mock_address(2);
    let mut fork = fork([(store, contract(STORE))]);
    let signer = fork.impersonate(alice);
    let data = Bytes::from([[0u8; 4].as_slice(), &U256::from(42).abi_encode()].concat());

    let snapshot = fork.snapshot();
    fork.send(signer, store, data).unwrap();
    fork.set_balance(alice, U256::from(1)).unwrap();
    fork.increase_time(100);

    fork.revert(snapshot).unwrap();
    assert_eq!(fork.storage_at(store, U256::ZERO).unwrap(), U256::ZERO);
    assert_eq!(fork.balance(alice).unwrap(), U256::ZERO);
    assert_eq!(fork.block_number(), FORK_POINT.number);
    assert_eq!(fork.timestamp(), FORK_POINT.timestamp);
}

#[test]
fn revert_discards_later_snapshots() {
    let mut fork = fork([]);
    let first = fork.snapshot();
    fork.mine(1);
    let second = fork.snapshot();

    fork.revert(first).unwrap();
    assert_eq!(
        fork.revert(second),
        Err(ForkError::UnknownSnapshot(second))
    );
    assert_eq!(fork.revert(first), Err(ForkError::UnknownSnapshot(first)));

    // Snapshots can be taken again after reverting.
    let third = fork.snapshot();
    fork.mine(3);
    fork.revert(third).unwrap();
    assert_eq!(fork.block_number(), FORK_POINT.number);
}

#[test]
fn deploy_installs_runtime_code() {
    let deployer = mock_address(2);
    let mut fork = fork([]);
    let signer = fork.impersonate(deployer);

    let address = fork.deploy(signer, init_code(&CLOCK)).unwrap();
    assert_eq!(address, deployer.create(0));
    assert_eq!(fork.code_at(address).unwrap(), CLOCK);

    let now = word(&fork.call(deployer, address, Bytes::new()).unwrap());
    assert_eq!(now, U256::from(fork.timestamp()));
}

#[test]
fn empty_revert_has_no_reason() {
    let reverter = mock_address(1);
    let mut fork = fork([(reverter, contract(REVERTER))]);
    let signer = fork.impersonate(mock_address(2));

    assert_eq!(
        fork.send(signer, reverter, Bytes::new()),
        Err(ForkError::Reverted {
            reason: None,
            output: Bytes::new()
        })
    );
    assert!(matches!(
        fork.call(mock_address(2), reverter, Bytes::new()),
        Err(ForkError::Reverted { reason: None, .. })
    ));
}

#[test]
fn mocked_code_runs_at_every_mock_address() {
    for idx in 0..=16 {
        let clock = mock_address(idx);
        let fork = fork([(clock, contract(CLOCK))]);
        let now = word(&fork.call(mock_address(100), clock, Bytes::new()).unwrap());
        assert_eq!(now, U256::from(FORK_POINT.timestamp), "mock address {idx}");
    }
}
