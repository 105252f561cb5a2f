//! Uniswap Universal Router command streams
//!
//! `execute(bytes commands, bytes[] inputs[, uint256 deadline])`: each command
//! byte selects an action whose ABI-encoded arguments sit at the same index
//! in `inputs`. Only the swap and WETH wrapping commands are decoded.

use super::{decode_call, function, selector, DecodeError, SwapArgs, Tokens};
use crate::path::decode_path;
use ethers::abi::{decode, Function, ParamType, StateMutability};
use ethers::types::{Address, U256};
use once_cell::sync::Lazy;

pub const V3_SWAP_EXACT_IN: u8 = 0x00;
pub const V3_SWAP_EXACT_OUT: u8 = 0x01;
pub const V2_SWAP_EXACT_IN: u8 = 0x08;
pub const V2_SWAP_EXACT_OUT: u8 = 0x09;
pub const WRAP_ETH: u8 = 0x0b;
pub const UNWRAP_WETH: u8 = 0x0c;

/// Low bits select the command; the high bit marks "allow revert"
pub const COMMAND_TYPE_MASK: u8 = 0x3f;

/// Recipient sentinel for `msg.sender`
pub fn msg_sender() -> Address {
    Address::from_low_u64_be(1)
}

/// Recipient sentinel for the router itself
pub fn address_this() -> Address {
    Address::from_low_u64_be(2)
}

/// Amount sentinel meaning "the router's whole balance of the input token"
pub fn contract_balance() -> U256 {
    U256::one() << 255
}

fn execute(with_deadline: bool) -> Function {
    let mut inputs = vec![
        ("commands", ParamType::Bytes),
        ("inputs", ParamType::Array(Box::new(ParamType::Bytes))),
    ];
    if with_deadline {
        inputs.push(("deadline", ParamType::Uint(256)));
    }
    function("execute", &inputs, &[], StateMutability::Payable)
}

/// execute(bytes commands, bytes[] inputs, uint256 deadline)
pub static EXECUTE_WITH_DEADLINE: Lazy<Function> = Lazy::new(|| execute(true));

/// execute(bytes commands, bytes[] inputs)
pub static EXECUTE: Lazy<Function> = Lazy::new(|| execute(false));

/// One decoded command of an `execute` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterCommand {
    V3Swap(SwapArgs),
    V2Swap(SwapArgs),
    WrapEth { recipient: Address, amount_min: U256 },
    UnwrapWeth { recipient: Address, amount_min: U256 },
    /// Any command without a decoder
    Other(u8),
}

impl RouterCommand {
    pub fn swap(&self) -> Option<&SwapArgs> {
        match self {
            RouterCommand::V3Swap(args) | RouterCommand::V2Swap(args) => Some(args),
            _ => None,
        }
    }
}

/// Commands of an `execute` call, `None` when the selector is not `execute`
pub fn decode_execute(calldata: &[u8]) -> Option<Result<Vec<RouterCommand>, DecodeError>> {
    let selector = selector(calldata).ok()?;
    let function = if selector == EXECUTE_WITH_DEADLINE.short_signature() {
        &*EXECUTE_WITH_DEADLINE
    } else if selector == EXECUTE.short_signature() {
        &*EXECUTE
    } else {
        return None;
    };
    Some(decode_call(function, calldata).and_then(|tokens| {
        let args = Tokens::new(&tokens);
        let commands = args.bytes(0, "commands")?;
        let inputs = args.bytes_array(1, "inputs")?;
        if commands.len() != inputs.len() {
            return Err(DecodeError::Abi(format!(
                "{} commands for {} inputs",
                commands.len(),
                inputs.len()
            )));
        }
        commands
            .iter()
            .zip(&inputs)
            .map(|(command, input)| decode_command(*command, input))
            .collect()
    }))
}

fn decode_command(command: u8, input: &[u8]) -> Result<RouterCommand, DecodeError> {
    let command = command & COMMAND_TYPE_MASK;
    match command {
        V3_SWAP_EXACT_IN | V3_SWAP_EXACT_OUT => {
            let exact_output = command == V3_SWAP_EXACT_OUT;
            let tokens = decode(&swap_params(ParamType::Bytes), input)?;
            let args = Tokens::new(&tokens);
            let (mut path, mut fees) = decode_path(&args.bytes(3, "path")?)?;
            if exact_output {
                path.reverse();
                fees.reverse();
            }
            Ok(RouterCommand::V3Swap(swap_args(&args, path, fees, exact_output)?))
        }
        V2_SWAP_EXACT_IN | V2_SWAP_EXACT_OUT => {
            let tokens = decode(
                &swap_params(ParamType::Array(Box::new(ParamType::Address))),
                input,
            )?;
            let args = Tokens::new(&tokens);
            let path = args.address_array(3, "path")?;
            if path.len() < 2 {
                return Err(DecodeError::InvalidPath(format!(
                    "path has {} tokens",
                    path.len()
                )));
            }
            Ok(RouterCommand::V2Swap(swap_args(
                &args,
                path,
                Vec::new(),
                command == V2_SWAP_EXACT_OUT,
            )?))
        }
        WRAP_ETH | UNWRAP_WETH => {
            let tokens = decode(&[ParamType::Address, ParamType::Uint(256)], input)?;
            let args = Tokens::new(&tokens);
            let recipient = args.address(0, "recipient")?;
            let amount_min = args.uint(1, "amountMin")?;
            Ok(if command == WRAP_ETH {
                RouterCommand::WrapEth {
                    recipient,
                    amount_min,
                }
            } else {
                RouterCommand::UnwrapWeth {
                    recipient,
                    amount_min,
                }
            })
        }
        other => Ok(RouterCommand::Other(other)),
    }
}

/// (address recipient, uint256 amount, uint256 limit, <path>, bool payerIsUser)
fn swap_params(path: ParamType) -> [ParamType; 5] {
    [
        ParamType::Address,
        ParamType::Uint(256),
        ParamType::Uint(256),
        path,
        ParamType::Bool,
    ]
}

fn swap_args(
    args: &Tokens<'_>,
    path: Vec<Address>,
    fees: Vec<u32>,
    exact_output: bool,
) -> Result<SwapArgs, DecodeError> {
    let recipient = args.address(0, "recipient")?;
    let specified = args.uint(1, "amount")?;
    let limit = args.uint(2, "amountLimit")?;
    let (amount_in, amount_out_min) = if exact_output {
        (limit, specified)
    } else {
        (specified, limit)
    };
    Ok(SwapArgs {
        path,
        fees,
        amount_in,
        amount_out_min,
        recipient,
        exact_output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::encode;
    use ethers::abi::Token;
    use hex_literal::hex;

    #[test]
    fn test_execute_selectors() {
        assert_eq!(EXECUTE_WITH_DEADLINE.short_signature(), hex!("3593564c"));
        assert_eq!(EXECUTE.short_signature(), hex!("24856bc3"));
    }

    #[test]
    fn test_allow_revert_flag_is_masked() {
        let input = ethers::abi::encode(&[
            Token::Address(msg_sender()),
            Token::Uint(U256::from(7)),
        ]);
        let calldata = encode(
            &EXECUTE,
            &[
                Token::Bytes(vec![0x80 | WRAP_ETH, 0x21]),
                Token::Array(vec![Token::Bytes(input.clone()), Token::Bytes(input)]),
            ],
        )
        .unwrap();
        let commands = decode_execute(&calldata).unwrap().unwrap();
        assert_eq!(
            commands[0],
            RouterCommand::WrapEth {
                recipient: msg_sender(),
                amount_min: U256::from(7)
            }
        );
        assert_eq!(commands[1], RouterCommand::Other(0x21));
    }

    #[test]
    fn test_mismatched_inputs_rejected() {
        let calldata = encode(
            &EXECUTE,
            &[Token::Bytes(vec![V2_SWAP_EXACT_IN]), Token::Array(vec![])],
        )
        .unwrap();
        assert!(decode_execute(&calldata).unwrap().is_err());
    }
}
