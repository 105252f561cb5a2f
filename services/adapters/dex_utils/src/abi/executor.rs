//! Flash-loan executor contract entry point
//!
//! The executor borrows `amount` of `token` from `provider`, runs every call in
//! order and reverts the whole transaction if the loan cannot be repaid.

use super::{encode, function};
use ethers::abi::{Function, ParamType, StateMutability, Token};
use ethers::types::Bytes;
use once_cell::sync::Lazy;
use types::{Bundle, EngineResult};

/// executeBundle(address provider, address token, uint256 amount, (address target, bytes data, uint256 value)[] calls)
pub static EXECUTE_BUNDLE: Lazy<Function> = Lazy::new(|| {
    let call = ParamType::Tuple(vec![
        ParamType::Address,
        ParamType::Bytes,
        ParamType::Uint(256),
    ]);
    function(
        "executeBundle",
        &[
            ("provider", ParamType::Address),
            ("token", ParamType::Address),
            ("amount", ParamType::Uint(256)),
            ("calls", ParamType::Array(Box::new(call))),
        ],
        &[],
        StateMutability::Payable,
    )
});

pub fn encode_execute_bundle(bundle: &Bundle) -> EngineResult<Bytes> {
    let calls = bundle
        .calls
        .iter()
        .map(|call| {
            Token::Tuple(vec![
                Token::Address(call.target),
                Token::Bytes(call.calldata.to_vec()),
                Token::Uint(call.value),
            ])
        })
        .collect();
    encode(
        &EXECUTE_BUNDLE,
        &[
            Token::Address(bundle.flashloan.provider),
            Token::Address(bundle.flashloan.token),
            Token::Uint(bundle.flashloan.amount),
            Token::Array(calls),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::decode_call;
    use ethers::types::{Address, U256};
    use hex_literal::hex;
    use types::{Call, CallKind, FlashLoanRequest};

    #[test]
    fn test_execute_bundle_layout() {
        let bundle = Bundle {
            flashloan: FlashLoanRequest {
                provider: Address::repeat_byte(0xaa),
                token: Address::repeat_byte(0xbb),
                amount: U256::exp10(18),
            },
            calls: vec![
                Call::new(CallKind::Swap, Address::repeat_byte(1), Bytes::from(vec![1, 2, 3])),
                Call::new(CallKind::Tip, Address::repeat_byte(2), Bytes::default())
                    .with_value(U256::from(42)),
            ],
            base_token: Address::repeat_byte(0xbb),
            expected_profit: U256::zero(),
        };

        let calldata = encode_execute_bundle(&bundle).unwrap();
        assert_eq!(&calldata[..4], &hex!("d44109b1"));

        let tokens = decode_call(&EXECUTE_BUNDLE, &calldata).unwrap();
        let calls = tokens[3].clone().into_array().unwrap();
        assert_eq!(calls.len(), 2);
        let tip = calls[1].clone().into_tuple().unwrap();
        assert_eq!(tip[2], Token::Uint(U256::from(42)));
    }
}
