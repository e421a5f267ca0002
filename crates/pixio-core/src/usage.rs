//! Usage records for metered tool invocations.
//!
//! One record is written for every invocation that reaches the image provider,
//! whether it succeeded or not. Records are never updated.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, PixioError, UsageRecordId};

/// Credits charged per successful tool invocation.
pub const DEFAULT_TOOL_COST: i64 = 1;

/// Credit-consuming image tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    /// Text-to-image generation.
    Generate,
    /// Upscaling.
    Enhance,
    /// Background removal.
    RemoveBackground,
    /// Text removal.
    RemoveText,
    /// Outpainting.
    Uncrop,
    /// Background replacement from a prompt.
    ReplaceBackground,
    /// Masked object cleanup.
    Cleanup,
}

impl Tool {
    /// All supported tools.
    pub const ALL: [Self; 7] = [
        Self::Generate,
        Self::Enhance,
        Self::RemoveBackground,
        Self::RemoveText,
        Self::Uncrop,
        Self::ReplaceBackground,
        Self::Cleanup,
    ];

    /// The tool name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Enhance => "enhance",
            Self::RemoveBackground => "remove-background",
            Self::RemoveText => "remove-text",
            Self::Uncrop => "uncrop",
            Self::ReplaceBackground => "replace-background",
            Self::Cleanup => "cleanup",
        }
    }
}

impl FromStr for Tool {
    type Err = PixioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| PixioError::UnsupportedTool(s.to_string()))
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    /// The provider call succeeded and credits were charged.
    Success,
    /// The provider call failed; nothing was charged.
    Failed,
}

/// A single tool invocation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Unique record ID (ULID for time-ordering).
    pub id: UsageRecordId,

    /// The account that invoked the tool.
    pub account_id: AccountId,

    /// The tool invoked.
    pub tool: Tool,

    /// Credits charged. Zero for failed attempts.
    pub credits_charged: i64,

    /// Prompt text, for prompt-driven tools.
    pub prompt: Option<String>,

    /// Outcome.
    pub status: UsageStatus,

    /// When the attempt was recorded.
    pub created_at: DateTime<Utc>,
}

impl UsageRecord {
    /// A successful invocation charging `cost` credits.
    #[must_use]
    pub fn succeeded(account_id: AccountId, tool: Tool, cost: i64, prompt: Option<String>) -> Self {
        Self {
            id: UsageRecordId::generate(),
            account_id,
            tool,
            credits_charged: cost.max(0),
            prompt,
            status: UsageStatus::Success,
            created_at: Utc::now(),
        }
    }

    /// A failed invocation. Always charges zero.
    #[must_use]
    pub fn failed(account_id: AccountId, tool: Tool, prompt: Option<String>) -> Self {
        Self {
            id: UsageRecordId::generate(),
            account_id,
            tool,
            credits_charged: 0,
            prompt,
            status: UsageStatus::Failed,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_roundtrip() {
        for tool in Tool::ALL {
            assert_eq!(tool.as_str().parse::<Tool>().unwrap(), tool);
        }
    }

    #[test]
    fn tool_serde_matches_wire_name() {
        let json = serde_json::to_string(&Tool::RemoveBackground).unwrap();
        assert_eq!(json, "\"remove-background\"");
    }

    #[test]
    fn unknown_tool_is_rejected() {
        assert!(matches!(
            "sharpen".parse::<Tool>(),
            Err(PixioError::UnsupportedTool(_))
        ));
    }

    #[test]
    fn failed_record_charges_nothing() {
        let record = UsageRecord::failed(AccountId::generate(), Tool::Cleanup, None);
        assert_eq!(record.credits_charged, 0);
        assert_eq!(record.status, UsageStatus::Failed);
    }

    #[test]
    fn succeeded_record_keeps_prompt() {
        let record = UsageRecord::succeeded(
            AccountId::generate(),
            Tool::Generate,
            1,
            Some("a red fox".into()),
        );
        assert_eq!(record.credits_charged, 1);
        assert_eq!(record.prompt.as_deref(), Some("a red fox"));
    }
}
