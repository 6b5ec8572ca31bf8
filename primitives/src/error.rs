// Copyright 2024 The Relay Gateway Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The closed error taxonomy. Every RPC failure path terminates in one of
//! these variants; `InternalError` is the catch-all for collaborator
//! failures the caller must never see the detail of.

use thiserror::Error;

/// Classification bits a caller (dispatcher, submission pipeline, metrics)
/// consults to decide whether to retry, surface the message verbatim, or
/// count the failure as a precheck rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClass {
	pub retryable: bool,
	pub user_surfaceable: bool,
	pub precheck_level: bool,
}

const PRECHECK: ErrorClass = ErrorClass { retryable: false, user_surfaceable: true, precheck_level: true };
const DISPATCH: ErrorClass = ErrorClass { retryable: false, user_surfaceable: true, precheck_level: false };
const INTERNAL: ErrorClass = ErrorClass { retryable: true, user_surfaceable: false, precheck_level: false };

/// Stable, closed set of gateway error kinds. Variants carry exactly the
/// fields needed to render the templated message distilled spec §4.1
/// requires; any other backend failure is wrapped as [`RelayError::Internal`]
/// with the raw cause kept only for logs.
#[derive(Debug, Error, Clone)]
pub enum RelayError {
	#[error("Invalid request")]
	InvalidRequest,

	#[error("Invalid parameter {index}: {reason}")]
	InvalidParameter { index: usize, reason: String },

	#[error("Missing required parameter {index}")]
	MissingRequiredParameter { index: usize },

	#[error("Method {0} not found")]
	MethodNotFound(String),

	#[error("Unsupported method")]
	UnsupportedMethod,

	#[error("Unsupported operation. {0}")]
	UnsupportedOperation(String),

	#[error("IP rate limit exceeded for method {0}")]
	IpRateLimitExceeded(String),

	#[error("WS batch requests are disabled")]
	WsBatchRequestsDisabled,

	#[error("Batch requests amount max exceeded ({actual} > {max})")]
	BatchRequestsAmountMaxExceeded { actual: usize, max: usize },

	#[error("Method {0} is not permitted as part of a batch request")]
	BatchRequestsMethodNotPermitted(String),

	#[error("Exceeded maximum allowed subscriptions")]
	MaxSubscriptions,

	#[error("Unsupported chain id. Expected {want:#x} got {got:#x}")]
	UnsupportedChainId { got: u64, want: u64 },

	#[error("Nonce too low. Provided nonce: {got}, current nonce: {current}")]
	NonceTooLow { got: u64, current: u64 },

	#[error("Nonce too high. Provided nonce: {got}, current nonce: {current}")]
	NonceTooHigh { got: u64, current: u64 },

	#[error("Gas price below configured minimum gas price. Gas price: {got}, minimum: {reference}")]
	GasPriceTooLow { got: u128, reference: u128 },

	#[error("Transaction gas limit provided below intrinsic gas cost: {got}, floor: {floor}")]
	GasLimitTooLow { got: u64, floor: u64 },

	#[error("Transaction gas limit provided above maximum transaction fee threshold: {got}, ceiling: {ceiling}")]
	GasLimitTooHigh { got: u64, ceiling: u64 },

	#[error("Insufficient funds for transfer")]
	InsufficientAccountBalance,

	#[error("Cannot transfer to an account that requires a receiver signature")]
	ReceiverSignatureEnabled,

	#[error("Transaction size {size} exceeds the configured limit of {limit} bytes")]
	TransactionSizeLimitExceeded { size: usize, limit: usize },

	#[error("Call data size {size} exceeds the configured limit of {limit} bytes")]
	CallDataSizeLimitExceeded { size: usize, limit: usize },

	#[error("Contract code size {size} exceeds the configured limit of {limit} bytes")]
	ContractCodeSizeLimitExceeded { size: usize, limit: usize },

	#[error("Missing value for `fromBlock` for range params")]
	MissingFromBlockParam,

	#[error("Invalid arguments: {0}")]
	InvalidArguments(String),

	#[error("Resource not found. {0}")]
	ResourceNotFound(String),

	#[error("Log filter has {got} addresses, exceeding the configured maximum of {max}")]
	TooManyFilterAddresses { got: usize, max: usize },

	#[error("Internal error")]
	Internal {
		/// The raw collaborator error rendered to a string, preserved for
		/// logs, never surfaced to the caller.
		cause: std::sync::Arc<str>,
	},
}

impl RelayError {
	/// Wrap any collaborator error (Mirror API client, consensus node
	/// client, shared cache) as an internal error, preserving the cause for
	/// logging. Logs the raw cause immediately, since it is otherwise
	/// unreachable once translated to a user-facing response.
	pub fn internal(cause: impl std::fmt::Display) -> Self {
		let rendered = cause.to_string();
		log::error!("internal error: {rendered}");
		RelayError::Internal { cause: std::sync::Arc::from(rendered) }
	}

	/// The stable integer code, in the JSON-RPC implementation-defined
	/// server-error range (-32000..-32099) except where a JSON-RPC 2.0
	/// standard code applies.
	pub fn code(&self) -> i64 {
		use RelayError::*;
		match self {
			InvalidRequest => -32600,
			InvalidParameter { .. } | MissingRequiredParameter { .. } => -32602,
			MethodNotFound(_) => -32601,
			UnsupportedMethod => -32001,
			UnsupportedOperation(_) => -32002,
			IpRateLimitExceeded(_) => -32003,
			WsBatchRequestsDisabled => -32004,
			BatchRequestsAmountMaxExceeded { .. } => -32005,
			BatchRequestsMethodNotPermitted(_) => -32006,
			MaxSubscriptions => -32007,
			UnsupportedChainId { .. } => -32008,
			NonceTooLow { .. } => -32009,
			NonceTooHigh { .. } => -32010,
			GasPriceTooLow { .. } => -32011,
			GasLimitTooLow { .. } => -32012,
			GasLimitTooHigh { .. } => -32013,
			InsufficientAccountBalance => -32014,
			ReceiverSignatureEnabled => -32015,
			TransactionSizeLimitExceeded { .. } => -32016,
			CallDataSizeLimitExceeded { .. } => -32017,
			ContractCodeSizeLimitExceeded { .. } => -32018,
			MissingFromBlockParam => -32019,
			InvalidArguments(_) => -32020,
			ResourceNotFound(_) => -32021,
			TooManyFilterAddresses { .. } => -32022,
			Internal { .. } => -32603,
		}
	}

	pub fn class(&self) -> ErrorClass {
		use RelayError::*;
		match self {
			UnsupportedChainId { .. }
			| NonceTooLow { .. }
			| NonceTooHigh { .. }
			| GasPriceTooLow { .. }
			| GasLimitTooLow { .. }
			| GasLimitTooHigh { .. }
			| InsufficientAccountBalance
			| ReceiverSignatureEnabled
			| TransactionSizeLimitExceeded { .. }
			| CallDataSizeLimitExceeded { .. }
			| ContractCodeSizeLimitExceeded { .. }
			| InvalidArguments(_) => PRECHECK,
			Internal { .. } => INTERNAL,
			_ => DISPATCH,
		}
	}

	/// Index of the offending parameter, when this error originates from
	/// parameter validation. Dispatcher uses this to build the JSON-RPC
	/// error data field.
	pub fn param_index(&self) -> Option<usize> {
		match self {
			RelayError::InvalidParameter { index, .. } => Some(*index),
			RelayError::MissingRequiredParameter { index } => Some(*index),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unsupported_chain_id_message_contains_both_ids() {
		let err = RelayError::UnsupportedChainId { got: 999, want: 295 };
		let message = err.to_string();
		assert!(message.contains("0x3e7"));
		assert!(message.contains("0x127"));
	}

	#[test]
	fn precheck_errors_are_precheck_level_and_not_retryable() {
		let err = RelayError::GasLimitTooLow { got: 100, floor: 15_000_000 };
		let class = err.class();
		assert!(class.precheck_level);
		assert!(!class.retryable);
		assert!(class.user_surfaceable);
	}

	#[test]
	fn internal_errors_are_retryable_and_not_user_surfaceable() {
		let err = RelayError::internal("mirror node returned 503");
		let class = err.class();
		assert!(class.retryable);
		assert!(!class.user_surfaceable);
		assert_eq!(err.code(), -32603);
	}

	#[test]
	fn invalid_parameter_exposes_its_index() {
		let err = RelayError::InvalidParameter { index: 0, reason: "bad hex".into() };
		assert_eq!(err.param_index(), Some(0));
	}
}
