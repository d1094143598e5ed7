//! Failure types and contract-call error normalization.
//!
//! Raw failures reach the gateway from three places (the wallet provider,
//! the RPC node, and local checks) and share no common structure. They are
//! collapsed into a [`NormalizedError`] by matching message substrings
//! against an ordered rule list; the first rule that hits wins.

use std::sync::LazyLock;

use alloy::transports::TransportError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A raw failure as reported by the wallet provider or an RPC node.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ProviderError {
    /// JSON-RPC / EIP-1193 error code, when the origin supplied one.
    pub code: Option<i64>,
    pub message: String,
    /// Structured payload attached to the error, if any.
    pub data: Option<serde_json::Value>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The most specific message carried by this error.
    ///
    /// Nested provider errors (`data.error.message`) are preferred over a
    /// node message (`data.message`), which is preferred over the top-level
    /// message.
    pub fn detail(&self) -> &str {
        if let Some(data) = &self.data {
            if let Some(msg) = data.pointer("/error/message").and_then(|v| v.as_str()) {
                return msg;
            }
            if let Some(msg) = data.get("message").and_then(|v| v.as_str()) {
                return msg;
            }
        }
        &self.message
    }
}

impl From<TransportError> for ProviderError {
    fn from(e: TransportError) -> Self {
        match e.as_error_resp() {
            Some(payload) => Self {
                code: Some(payload.code),
                message: payload.message.to_string(),
                data: payload
                    .data
                    .as_ref()
                    .and_then(|raw| serde_json::from_str(raw.get()).ok()),
            },
            None => Self::new(e.to_string()),
        }
    }
}

/// Category of a normalized failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ProviderUnavailable,
    UserRejected,
    InsufficientFunds,
    AllowanceExceeded,
    SlippageExceeded,
    ProtocolPaused,
    /// The message carries the extracted revert reason.
    ContractRevert,
    Unknown,
}

/// A failure reduced to a category and one human-readable sentence.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct NormalizedError {
    pub category: ErrorCategory,
    pub message: String,
}

impl NormalizedError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn provider_unavailable() -> Self {
        Self::new(
            ErrorCategory::ProviderUnavailable,
            "No wallet provider detected. Please install a browser wallet.",
        )
    }

    pub fn not_configured(contract: &str) -> Self {
        Self::new(
            ErrorCategory::Unknown,
            format!("{contract} contract address is not configured."),
        )
    }
}

impl From<ProviderError> for NormalizedError {
    fn from(e: ProviderError) -> Self {
        normalize(&e)
    }
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid address in {key}: {message}")]
    InvalidAddress { key: String, message: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),
}

struct Rule {
    needle: &'static str,
    category: ErrorCategory,
    message: &'static str,
}

/// Evaluated top to bottom. Needles are lowercase.
const RULES: &[Rule] = &[
    Rule {
        needle: "user rejected",
        category: ErrorCategory::UserRejected,
        message: "Transaction was rejected by the user.",
    },
    Rule {
        needle: "insufficient funds",
        category: ErrorCategory::InsufficientFunds,
        message: "Insufficient funds for transaction or gas.",
    },
    Rule {
        needle: "allowance exceeded",
        category: ErrorCategory::AllowanceExceeded,
        message: "Insufficient token allowance. Please approve the vault to spend your tokens.",
    },
    Rule {
        needle: "slippageexceeded",
        category: ErrorCategory::SlippageExceeded,
        message: "Transaction failed due to high slippage. Please try adjusting your slippage tolerance.",
    },
    Rule {
        needle: "paused",
        category: ErrorCategory::ProtocolPaused,
        message: "The protocol is currently paused. Transactions cannot be processed right now.",
    },
];

static REVERT_REASON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"execution reverted: "?([^"]+)"#).expect("revert reason pattern is valid")
});

/// Reduce a raw failure to a [`NormalizedError`].
pub fn normalize(error: &ProviderError) -> NormalizedError {
    normalize_message(error.detail())
}

/// Classify a bare failure message.
pub fn normalize_message(message: &str) -> NormalizedError {
    if message.trim().is_empty() {
        return NormalizedError::new(ErrorCategory::Unknown, "An unknown error occurred");
    }

    let lowered = message.to_ascii_lowercase();
    if let Some(rule) = RULES.iter().find(|rule| lowered.contains(rule.needle)) {
        return NormalizedError::new(rule.category, rule.message);
    }

    if let Some(reason) = extract_revert_reason(message) {
        return NormalizedError::new(ErrorCategory::ContractRevert, reason);
    }

    NormalizedError::new(ErrorCategory::Unknown, message)
}

/// Pull the revert reason out of an `execution reverted: ...` message.
pub fn extract_revert_reason(message: &str) -> Option<String> {
    let captures = REVERT_REASON.captures(message)?;
    let reason = captures.get(1)?.as_str().trim();
    if reason.is_empty() {
        None
    } else {
        Some(reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_rejected_beats_everything() {
        let err = normalize_message(
            "user rejected transaction: insufficient funds, execution reverted: \"Foo\"",
        );
        assert_eq!(err.category, ErrorCategory::UserRejected);
        assert_eq!(err.message, "Transaction was rejected by the user.");
    }

    #[test]
    fn test_insufficient_funds_beats_revert() {
        let err = normalize_message("insufficient funds; execution reverted: \"Bar\"");
        assert_eq!(err.category, ErrorCategory::InsufficientFunds);
    }

    #[test]
    fn test_allowance_message_mentions_approval() {
        let err = normalize_message("ERC20: transfer amount allowance exceeded");
        assert_eq!(err.category, ErrorCategory::AllowanceExceeded);
        assert!(err.message.contains("approve"));
    }

    #[test]
    fn test_slippage_before_paused() {
        let err = normalize_message("execution reverted: SlippageExceeded() while paused");
        assert_eq!(err.category, ErrorCategory::SlippageExceeded);
    }

    #[test]
    fn test_paused() {
        let err = normalize_message("execution reverted: Pausable: paused");
        assert_eq!(err.category, ErrorCategory::ProtocolPaused);
    }

    #[test]
    fn test_quoted_revert_reason() {
        let err = normalize_message("execution reverted: \"Foo\"");
        assert_eq!(err.category, ErrorCategory::ContractRevert);
        assert_eq!(err.message, "Foo");
    }

    #[test]
    fn test_unquoted_revert_reason() {
        let err = normalize_message("execution reverted: Vault: zero shares");
        assert_eq!(err.category, ErrorCategory::ContractRevert);
        assert_eq!(err.message, "Vault: zero shares");
    }

    #[test]
    fn test_unknown_returns_raw_message() {
        let err = normalize_message("connection refused");
        assert_eq!(err.category, ErrorCategory::Unknown);
        assert_eq!(err.message, "connection refused");
    }

    #[test]
    fn test_empty_message() {
        let err = normalize_message("");
        assert_eq!(err.category, ErrorCategory::Unknown);
        assert_eq!(err.message, "An unknown error occurred");
    }

    #[test]
    fn test_detail_prefers_nested_provider_message() {
        let err = ProviderError::new("could not coalesce error").with_data(json!({
            "message": "node said something",
            "error": { "message": "user rejected the request" }
        }));
        assert_eq!(err.detail(), "user rejected the request");
        assert_eq!(normalize(&err).category, ErrorCategory::UserRejected);
    }

    #[test]
    fn test_detail_falls_back_to_data_message() {
        let err = ProviderError::new("internal error")
            .with_data(json!({ "message": "execution reverted: \"Cap reached\"" }));
        let normalized = normalize(&err);
        assert_eq!(normalized.category, ErrorCategory::ContractRevert);
        assert_eq!(normalized.message, "Cap reached");
    }

    #[test]
    fn test_detail_ignores_non_object_data() {
        let err = ProviderError::with_code(3, "execution reverted: Foo").with_data(json!("0x08c379a0"));
        assert_eq!(err.detail(), "execution reverted: Foo");
    }
}
