//! Test suites and run progress notifications

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// Test suite that can be launched from the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suite {
    Acceptance,
    Regression,
    Firmware,
}

impl Suite {
    pub const ALL: [Suite; 3] = [Suite::Acceptance, Suite::Regression, Suite::Firmware];

    pub fn as_str(&self) -> &'static str {
        match self {
            Suite::Acceptance => "acceptance",
            Suite::Regression => "regression",
            Suite::Firmware => "firmware",
        }
    }
}

impl std::fmt::Display for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Suite {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Suite::ALL
            .into_iter()
            .find(|suite| suite.as_str() == s)
            .ok_or_else(|| Error::not_found("suite", s))
    }
}

/// One notification of a run's progress stream. A stream carries any number
/// of ticks followed by exactly one terminal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub progress: u8,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl ProgressEvent {
    /// Intermediate tick after `completed` of `total` devices.
    pub fn tick(completed: usize, total: usize) -> Self {
        let progress = if total == 0 {
            100
        } else {
            (completed.min(total) * 100 / total) as u8
        };
        Self {
            progress,
            done: false,
            result: None,
        }
    }

    /// Terminal event carrying the run result.
    pub fn finished(result: impl Into<String>) -> Self {
        Self {
            progress: 100,
            done: true,
            result: Some(result.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.done
    }
}
