//! Constructor and call arguments.

use std::str::FromStr;

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_core::primitives::{
    Address, B256, Bytes, I256, U256, keccak256,
    utils::{ParseUnits, parse_units},
};
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// A single constructor or call argument.
///
/// Numbers are carried as 256-bit integers end to end. Scaled quantities (a
/// reserve ratio in ppm, an amount in wei) are never routed through floats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorArg {
    Uint(U256),
    Int(I256),
    Address(Address),
    Bool(bool),
    String(String),
    Bytes(Bytes),
    /// The address produced by the step at this index.
    Ref(usize),
}

impl ConstructorArg {
    pub fn uint(value: u128) -> Self {
        Self::Uint(U256::from(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn reference(&self) -> Option<usize> {
        match self {
            Self::Ref(index) => Some(*index),
            _ => None,
        }
    }

    /// Substitute references with the recorded addresses.
    ///
    /// Returns `None` when a reference points past `outputs`.
    pub fn resolve(&self, outputs: &[Address]) -> Option<DynSolValue> {
        let value = match self {
            Self::Uint(value) => DynSolValue::Uint(*value, 256),
            Self::Int(value) => DynSolValue::Int(*value, 256),
            Self::Address(address) => DynSolValue::Address(*address),
            Self::Bool(value) => DynSolValue::Bool(*value),
            Self::String(value) => DynSolValue::String(value.clone()),
            Self::Bytes(value) => DynSolValue::Bytes(value.to_vec()),
            Self::Ref(index) => DynSolValue::Address(*outputs.get(*index)?),
        };
        Some(value)
    }
}

/// Parse an unsigned amount such as `330000`, `0x2710`, `1_000` or `9 ether`.
///
/// Unit-suffixed amounts are scaled into base units exactly.
pub fn parse_amount(text: &str) -> anyhow::Result<U256> {
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("Empty amount");
    }

    if let Some((amount, unit)) = text.split_once(char::is_whitespace) {
        let parsed = parse_units(amount.trim(), unit.trim())
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Invalid amount `{text}`"))?;
        return match parsed {
            ParseUnits::U256(value) => Ok(value),
            ParseUnits::I256(_) => anyhow::bail!("Amount `{text}` must not be negative"),
        };
    }

    let digits = text.replace('_', "");
    U256::from_str(&digits).with_context(|| format!("Invalid unsigned integer `{text}`"))
}

/// Parse a signed integer literal.
pub fn parse_signed(text: &str) -> anyhow::Result<I256> {
    let digits = text.trim().replace('_', "");
    I256::from_dec_str(&digits).with_context(|| format!("Invalid signed integer `{text}`"))
}

/// ABI-encode resolved arguments as a parameter list, as appended to creation code.
pub fn encode_arguments(args: &[DynSolValue]) -> Vec<u8> {
    if args.is_empty() {
        return Vec::new();
    }
    DynSolValue::Tuple(args.to_vec()).abi_encode_params()
}

/// Build calldata for `signature` (e.g. `createToken(string,uint32)`).
///
/// Arguments are checked against the declared parameter types and narrowed to
/// them. The selector is computed over the canonical form, so `uint` and
/// `uint256` select the same function.
pub fn encode_call(signature: &str, args: &[DynSolValue]) -> anyhow::Result<Bytes> {
    let signature: String = signature.chars().filter(|c| !c.is_whitespace()).collect();
    let malformed = || format!("Malformed function signature `{signature}`");

    let (name, params) = signature
        .find('(')
        .filter(|&open| open > 0)
        .map(|open| signature.split_at(open))
        .with_context(malformed)?;

    let params = DynSolType::parse(params)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(malformed)?;
    let DynSolType::Tuple(types) = &params else {
        anyhow::bail!(malformed());
    };

    if types.len() != args.len() {
        anyhow::bail!(
            "`{signature}` takes {} argument(s), {} given",
            types.len(),
            args.len()
        );
    }

    let values = types
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (ty, value))| {
            coerce(ty, value).with_context(|| format!("Argument {index} of `{signature}`"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let canonical = format!("{name}{}", params.sol_type_name());
    let mut data = keccak256(canonical.as_bytes())[..4].to_vec();
    data.extend(encode_arguments(&values));
    Ok(data.into())
}

/// Narrow `value` to the parameter type `ty`, rejecting values that do not fit.
fn coerce(ty: &DynSolType, value: &DynSolValue) -> anyhow::Result<DynSolValue> {
    let coerced = match (ty, value) {
        (DynSolType::Uint(size), DynSolValue::Uint(value, _)) => {
            if value.bit_len() > *size {
                anyhow::bail!("{value} does not fit in uint{size}");
            }
            DynSolValue::Uint(*value, *size)
        }
        (DynSolType::Int(size), DynSolValue::Int(value, _)) => {
            let limit = U256::from(1u8) << (*size - 1);
            let fits = if value.is_negative() {
                value.unsigned_abs() <= limit
            } else {
                value.into_raw() < limit
            };
            if !fits {
                anyhow::bail!("{value} does not fit in int{size}");
            }
            DynSolValue::Int(*value, *size)
        }
        (DynSolType::FixedBytes(size), DynSolValue::Bytes(bytes)) => {
            if bytes.len() != *size {
                anyhow::bail!("expected {size} bytes, got {}", bytes.len());
            }
            let mut word = B256::ZERO;
            word[..*size].copy_from_slice(bytes);
            DynSolValue::FixedBytes(word, *size)
        }
        (ty, value) if ty.matches(value) => value.clone(),
        (ty, value) => anyhow::bail!(
            "expected {}, got {}",
            ty.sol_type_name(),
            value.sol_type_name().as_deref().unwrap_or("an unsupported value")
        ),
    };
    Ok(coerced)
}
