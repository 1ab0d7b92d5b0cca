/// Typed action configuration
///
/// Nodes store their configuration as a loose field-key mapping so documents
/// round-trip untouched. Before dispatch the mapping is resolved into a closed
/// `Action` enum carrying one strongly-typed config per action kind.

use crate::error::{EngineError, EngineResult};
use crate::workflow::types::{ActionKind, Node};
use anyhow::Result;
use chrono::{DateTime, NaiveTime, TimeZone};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

/// User input field keys understood by the engine
pub mod keys {
    pub const JAVASCRIPT_CODE: &str = "JAVASCRIPT_CODE";
    pub const URL: &str = "URL";
    pub const METHOD: &str = "METHOD";
    pub const HEADERS: &str = "HEADERS";
    pub const BODY: &str = "BODY";
    pub const EXPRESSION_CODE: &str = "EXPRESSION_CODE";
    pub const TRIGGER_ON: &str = "TRIGGER_ON";
    pub const INTERVAL_BETWEEN_TRIGGER: &str = "INTERVAL_BETWEEN_TRIGGER";
    pub const TIME_TO_TRIGGER: &str = "TIME_TO_TRIGGER";
}

/// Resolved, executable form of a node
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Pass-through marker; carries the trigger's wire name
    Trigger(ActionKind),
    RunCode(RunCodeConfig),
    ApiCall(ApiCallConfig),
    Computation(ComputationConfig),
    /// No behaviour attached; not a failure
    NoOp,
}

impl Action {
    /// Resolve a node's user input into a typed action
    pub fn from_node(node: &Node) -> Result<Self> {
        let action = match &node.action_kind {
            kind @ (ActionKind::ManualTrigger | ActionKind::ScheduleTrigger) => Action::Trigger(kind.clone()),
            ActionKind::RunCode => Action::RunCode(RunCodeConfig::from_node(node)),
            ActionKind::ApiCall => Action::ApiCall(ApiCallConfig::from_node(node)?),
            ActionKind::Computation => Action::Computation(ComputationConfig::from_node(node)?),
            ActionKind::Unknown(_) => Action::NoOp,
        };
        Ok(action)
    }
}

/// Script source for a RunCode node
#[derive(Debug, Clone, PartialEq)]
pub struct RunCodeConfig {
    pub code: String,
}

impl RunCodeConfig {
    /// Falls back to the node's carried `executable_code` when no code field is set
    pub fn from_node(node: &Node) -> Self {
        let code = node
            .input_str(keys::JAVASCRIPT_CODE)
            .map(str::to_string)
            .unwrap_or_else(|| node.executable_code.clone());
        Self { code }
    }
}

/// Expression for a Computation node
#[derive(Debug, Clone, PartialEq)]
pub struct ComputationConfig {
    pub expression: String,
}

impl ComputationConfig {
    pub fn from_node(node: &Node) -> Result<Self> {
        let expression = node
            .input_str(keys::EXPRESSION_CODE)
            .filter(|expr| !expr.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Computation node missing '{}'", keys::EXPRESSION_CODE))?;
        Ok(Self { expression: expression.to_string() })
    }
}

/// Outgoing HTTP request description for an ApiCall node
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCallConfig {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    /// Always `None` for GET requests
    pub body: Option<String>,
}

impl ApiCallConfig {
    pub fn from_node(node: &Node) -> Result<Self> {
        let url = node
            .input_str(keys::URL)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("API call node missing '{}'", keys::URL))?
            .trim()
            .to_string();

        let method = match node.input_str(keys::METHOD).map(str::trim) {
            None | Some("") => Method::GET,
            Some(raw) => Method::from_bytes(raw.to_uppercase().as_bytes())
                .map_err(|_| anyhow::anyhow!("Unsupported HTTP method: {}", raw))?,
        };

        let headers = parse_headers(node.user_input.get(keys::HEADERS), &node.id);

        // GET requests never look at the body field
        let body = if method == Method::GET {
            None
        } else {
            node.user_input.get(keys::BODY).and_then(|body| match body {
                Value::Null => None,
                Value::String(text) if text.is_empty() => None,
                Value::String(text) => Some(text.clone()),
                other => Some(other.to_string()),
            })
        };

        Ok(Self { url, method, headers, body })
    }
}

/// Parse the HEADERS field; anything unparseable becomes an empty header set
fn parse_headers(raw: Option<&Value>, node_id: &str) -> Vec<(String, String)> {
    let object = match raw {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::String(text)) if text.trim().is_empty() => return Vec::new(),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map,
            _ => {
                tracing::warn!("⚠️ Ignoring unparseable HEADERS on node '{}'", node_id);
                return Vec::new();
            }
        },
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            tracing::warn!("⚠️ Ignoring non-object HEADERS on node '{}'", node_id);
            return Vec::new();
        }
    };

    object
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (name, value)
        })
        .collect()
}

/// Unit for the `TRIGGER_ON` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    /// Fixed 30-day approximation
    Month,
}

impl TriggerUnit {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sec" => Some(TriggerUnit::Second),
            "min" => Some(TriggerUnit::Minute),
            "hour" => Some(TriggerUnit::Hour),
            "day" => Some(TriggerUnit::Day),
            "week" => Some(TriggerUnit::Week),
            "month" => Some(TriggerUnit::Month),
            _ => None,
        }
    }

    pub fn millis(self) -> u64 {
        match self {
            TriggerUnit::Second => 1_000,
            TriggerUnit::Minute => 60_000,
            TriggerUnit::Hour => 3_600_000,
            TriggerUnit::Day => 86_400_000,
            TriggerUnit::Week => 604_800_000,
            TriggerUnit::Month => 2_592_000_000,
        }
    }

    fn name(self) -> &'static str {
        match self {
            TriggerUnit::Second => "sec",
            TriggerUnit::Minute => "min",
            TriggerUnit::Hour => "hour",
            TriggerUnit::Day => "day",
            TriggerUnit::Week => "week",
            TriggerUnit::Month => "month",
        }
    }
}

/// Recurring schedule of a ScheduleTrigger node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub unit: TriggerUnit,
    /// Positive multiplier applied to the unit
    pub every: u64,
    /// Time of day of the first fire; `None` fires straight away
    pub at: Option<NaiveTime>,
}

impl ScheduleConfig {
    pub fn from_node(node: &Node) -> EngineResult<Self> {
        let unit_raw = node
            .input_str(keys::TRIGGER_ON)
            .ok_or_else(|| EngineError::InvalidSchedule(format!("missing {}", keys::TRIGGER_ON)))?;
        let unit = TriggerUnit::parse(unit_raw)
            .ok_or_else(|| EngineError::InvalidSchedule(format!("unknown unit '{}'", unit_raw)))?;

        let every = match node.user_input.get(keys::INTERVAL_BETWEEN_TRIGGER) {
            None | Some(Value::Null) => 1,
            Some(Value::Number(n)) => n.as_u64().filter(|n| *n > 0).ok_or_else(|| {
                EngineError::InvalidSchedule(format!("interval must be a positive integer, got {}", n))
            })?,
            Some(Value::String(s)) => s.trim().parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(|| {
                EngineError::InvalidSchedule(format!("interval must be a positive integer, got '{}'", s))
            })?,
            Some(other) => {
                return Err(EngineError::InvalidSchedule(format!(
                    "interval must be a positive integer, got {}",
                    other
                )))
            }
        };

        let at = match node.input_str(keys::TIME_TO_TRIGGER).map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| {
                EngineError::InvalidSchedule(format!("time of day must be HH:MM, got '{}'", raw))
            })?),
        };

        Ok(Self { unit, every, at })
    }

    pub fn interval_ms(&self) -> u64 {
        self.every.saturating_mul(self.unit.millis())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms())
    }

    /// Milliseconds from `now` until the next occurrence of the configured time of day
    ///
    /// Today if that time has not passed yet, tomorrow otherwise.
    pub fn first_delay_ms<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> u64 {
        let Some(at) = self.at else {
            return 0;
        };
        let now = now.naive_local();
        let mut target = now.date().and_time(at);
        if target < now {
            target += chrono::Duration::days(1);
        }
        u64::try_from((target - now).num_milliseconds()).unwrap_or(0)
    }

    pub fn describe(&self) -> String {
        let every = format!("every {} {}", self.every, self.unit.name());
        match self.at {
            Some(at) => format!("Schedule trigger ({}, first at {})", every, at.format("%H:%M")),
            None => format!("Schedule trigger ({})", every),
        }
    }
}
