// https://doc.rust-lang.org/book/ch11-03-test-organization.html
use alloy_primitives::{bytes, hex, Address, Bytes, U160, U256};
use globe_fork::{
    token_balance::{BalanceSlot, MappingLayout},
    EvmAccount, Fork, ForkChain, ForkPoint, InMemoryStorage,
};

// Hand-assembled runtimes. Each ignores the selector unless noted.

// Returns `block.timestamp`.
pub const CLOCK: Bytes = bytes!("4260005260206000f3");
// Returns `block.number`.
pub const BLOCK_NUMBER: Bytes = bytes!("4360005260206000f3");
// Reverts without data.
pub const REVERTER: Bytes = bytes!("60006000fd");
// Stores the first argument at slot 0.
pub const STORE: Bytes = bytes!("60043560005500");
// Accepts any call.
pub const STOP: Bytes = bytes!("00");
// Returns zero for any call, like a token without balances.
pub const ZERO: Bytes = bytes!("600060005260206000f3");
// Returns the storage slot keyed by the call's selector, to mock getters.
pub const SELECTOR_GETTER: Bytes = bytes!("60003560e01c5460005260206000f3");

pub const FORK_POINT: ForkPoint = ForkPoint {
    chain_id: 43114,
    number: 30_000_000,
    timestamp: 1_700_000_000,
    gas_limit: U256::from_limbs([15_000_000, 0, 0, 0]),
    base_fee: U256::from_limbs([25_000_000_000, 0, 0, 0]),
};

// A token answering every call with `balanceOf(first argument)` read from
// the mapping at `slot`.
pub fn balance_token(slot: BalanceSlot) -> Bytes {
    assert!(slot.index <= 0xff);
    let index = slot.index as u8;
    let mut code = match slot.layout {
        // mem[0] = holder, mem[32] = index
        MappingLayout::Solidity => vec![0x60, 0x04, 0x35, 0x60, 0x00, 0x52, 0x60, index, 0x60, 0x20, 0x52],
        // mem[0] = index, mem[32] = holder
        MappingLayout::Vyper => vec![0x60, index, 0x60, 0x00, 0x52, 0x60, 0x04, 0x35, 0x60, 0x20, 0x52],
    };
    // return sload(keccak256(mem[0..64]))
    code.extend_from_slice(&[
        0x60, 0x40, 0x60, 0x00, 0x20, 0x54, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ]);
    code.into()
}

// A token that is also the ledger of a globe & strategy forwarding to it
// (see [forwarder]). Balances sit in a Solidity mapping at slot 0.
//
//   balanceOf(a)   a's balance when called directly, zero shares otherwise
//   depositAll()   moves the origin's balance to the caller
//   deposit(n)     moves n from the origin to the caller
//   withdrawAll()  moves the caller's balance plus a yield to the origin
//   harvest()      increments slot 1
//   balanceOf()    slot 1
//   anything else  succeeds without effect
const VAULT_TOKEN: Bytes = bytes!("60003560e01c806370a0823114610049578063722713f7146100755780634641257d14610081578063de5f62681461008c578063b6b55f25146100a0578063853828b6146100e957005b32331461005b57600060005260206000f35b600435600052600060205260406000205460005260206000f35b60015460005260206000f35b600154600101600155005b3260005260006020526040600020546100a8565b6004356100a8565b803260005260006020526040600020540332600052600060205260406000205533600052600060205260406000205401336000526000602052604060002055005b33600052600060205260406000205460000160003360005260006020526040600020553260005260006020526040600020540132600052600060205260406000205500");

// Offset of the yield paid by `withdrawAll` in [VAULT_TOKEN].
const VAULT_YIELD_OFFSET: usize = 250;

// [VAULT_TOKEN] paying `yield_amount` on every `withdrawAll`.
pub fn vault_token(yield_amount: u8) -> Bytes {
    let mut code = VAULT_TOKEN.to_vec();
    assert_eq!(code[VAULT_YIELD_OFFSET - 1], 0x60);
    code[VAULT_YIELD_OFFSET] = yield_amount;
    code.into()
}

// Forwards every call to `target` and returns or reverts with its result.
pub fn forwarder(target: Address) -> Bytes {
    // calldatacopy(0, 0, calldatasize)
    // call(gas, target, 0, 0, calldatasize, 0, 0)
    let mut code = hex!("36600060003760006000366000600073").to_vec();
    code.extend_from_slice(target.as_slice());
    // returndatacopy(0, 0, returndatasize), then return or revert it
    code.extend_from_slice(&hex!("5af13d600060003e6033573d6000fd5b3d6000f3"));
    code.into()
}

// Creation code that deploys `runtime` as is.
pub fn init_code(runtime: &[u8]) -> Bytes {
    assert!(runtime.len() <= 0xff);
    let mut code = vec![
        0x60,
        runtime.len() as u8,
        0x80,
        0x60,
        0x0b,
        0x60,
        0x00,
        0x39,
        0x60,
        0x00,
        0xf3,
    ];
    code.extend_from_slice(runtime);
    code.into()
}

// Storage key mocked by [SELECTOR_GETTER] for a call with `selector`.
pub fn selector_slot(selector: [u8; 4]) -> U256 {
    U256::from(u32::from_be_bytes(selector))
}

// Offset of mock addresses, past the precompiles at 0x01..=0x0a.
const MOCK_ADDRESS_OFFSET: u64 = 0x1000;

// Mock an account from an integer index. Low addresses are precompiles,
// which would run instead of any code mocked there.
pub fn mock_address(idx: u64) -> Address {
    Address::from(U160::from(MOCK_ADDRESS_OFFSET + idx))
}

pub fn contract(code: Bytes) -> EvmAccount {
    EvmAccount::with_code(code)
}

pub fn fork(accounts: impl IntoIterator<Item = (Address, EvmAccount)>) -> Fork<InMemoryStorage> {
    Fork::new(
        InMemoryStorage::new(accounts, []),
        ForkChain::avalanche(),
        &FORK_POINT,
    )
}
