//! Rule file format and the compiled rule model.
//!
//! Rules are written as a JSON array (or `{"rules": [...]}`):
//!
//! ```json
//! [
//!   {
//!     "name": "Old logs",
//!     "conditions": [
//!       {"field": "extension", "operator": "is", "value": ".log"},
//!       {"field": "age_days", "operator": "gt", "value": 30}
//!     ],
//!     "action": {"type": "trash"}
//!   },
//!   {
//!     "name": "Screenshots",
//!     "conditions": [{"field": "filename", "operator": "startswith", "value": "Screenshot"}],
//!     "action": "add_tag",
//!     "action_value": "screenshot"
//!   }
//! ]
//! ```

use crate::error::{CuratorError, Result};
use crate::repo::normalize_rel_path;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRuleFile {
    List(Vec<RawRule>),
    Wrapped { rules: Vec<RawRule> },
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    conditions: Vec<RawCondition>,
    action: RawAction,
    #[serde(default)]
    action_value: Option<Value>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAction {
    Name(String),
    Tagged {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        value: Option<Value>,
    },
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    field: String,
    operator: String,
    #[serde(default)]
    value: Option<Value>,
}

/// File attribute a condition looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Lower-case, with the leading dot (`.log`), empty when there is none
    Extension,
    /// Basename
    Filename,
    /// Repository-relative path
    Path,
    AgeDays,
    /// Bytes
    Size,
}

impl Field {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "extension" | "ext" => Ok(Field::Extension),
            "filename" | "name" => Ok(Field::Filename),
            "path" => Ok(Field::Path),
            "age_days" => Ok(Field::AgeDays),
            "size" => Ok(Field::Size),
            other => Err(CuratorError::validation(format!(
                "Unknown rule field '{}'. Allowed: extension, filename, path, age_days, size",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Extension => "extension",
            Field::Filename => "filename",
            Field::Path => "path",
            Field::AgeDays => "age_days",
            Field::Size => "size",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Is,
    Contains,
    StartsWith,
    EndsWith,
    Gt,
    Lt,
    Regex,
}

impl Operator {
    /// Parse an operator name, returning it with its negation flag.
    fn parse(raw: &str) -> Result<(Self, bool)> {
        let name = raw.trim().to_ascii_lowercase();
        if name == "is_not" {
            return Ok((Operator::Is, true));
        }
        let (base, negated) = match name.strip_prefix("not_") {
            Some(rest) => (rest, true),
            None => (name.as_str(), false),
        };
        let op = match base {
            "is" => Operator::Is,
            "contains" => Operator::Contains,
            "startswith" => Operator::StartsWith,
            "endswith" => Operator::EndsWith,
            "gt" => Operator::Gt,
            "lt" => Operator::Lt,
            "regex" => Operator::Regex,
            _ => {
                return Err(CuratorError::validation(format!(
                    "Unknown rule operator '{}'",
                    raw.trim()
                )))
            }
        };
        Ok((op, negated))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Is => "is",
            Operator::Contains => "contains",
            Operator::StartsWith => "startswith",
            Operator::EndsWith => "endswith",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Regex => "regex",
        }
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone)]
pub enum Operand {
    /// Literal, with its numeric reading when it has one
    Value { text: String, number: Option<f64> },
    Pattern(Regex),
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub field: Field,
    pub operator: Operator,
    pub negated: bool,
    pub operand: Operand,
}

/// What a matching rule asks for. Applying it is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Trash,
    AddTag(String),
    RemoveTag(String),
    /// New bare file name
    Rename(String),
    /// Destination directory, repository-relative (`""` is the root)
    Move(String),
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Trash => "trash",
            Action::AddTag(_) => "add_tag",
            Action::RemoveTag(_) => "remove_tag",
            Action::Rename(_) => "rename",
            Action::Move(_) => "move",
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Action::Trash => None,
            Action::AddTag(v) | Action::RemoveTag(v) | Action::Rename(v) | Action::Move(v) => {
                Some(v)
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "{}({})", self.kind(), value),
            None => f.write_str(self.kind()),
        }
    }
}

/// A compiled rule. Matches when every condition holds.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub conditions: Vec<Condition>,
    pub action: Action,
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compile_condition(rule_name: &str, raw: RawCondition) -> Result<Condition> {
    let field = Field::parse(&raw.field)?;
    let (operator, negated) = Operator::parse(&raw.operator)?;
    let text = raw.value.as_ref().and_then(value_text).ok_or_else(|| {
        CuratorError::validation(format!(
            "Rule '{}': condition on '{}' needs a string or number value",
            rule_name, raw.field
        ))
    })?;

    let operand = if operator == Operator::Regex {
        let regex = Regex::new(&text).map_err(|e| {
            CuratorError::validation(format!("Rule '{}': invalid regex '{}': {}", rule_name, text, e))
        })?;
        Operand::Pattern(regex)
    } else {
        let text = if field == Field::Extension {
            let lowered = text.trim().to_lowercase();
            if operator == Operator::Is && !lowered.is_empty() && !lowered.starts_with('.') {
                format!(".{}", lowered)
            } else {
                lowered
            }
        } else {
            text
        };
        let number = match raw.value {
            Some(Value::Number(ref n)) => n.as_f64(),
            _ => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        };
        Operand::Value { text, number }
    };

    Ok(Condition {
        field,
        operator,
        negated,
        operand,
    })
}

fn required_value(rule_name: &str, kind: &str, value: Option<Value>) -> Result<String> {
    value
        .as_ref()
        .and_then(value_text)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            CuratorError::validation(format!(
                "Rule '{}': action '{}' needs a value",
                rule_name, kind
            ))
        })
}

fn compile_action(rule_name: &str, kind: &str, value: Option<Value>) -> Result<Action> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "trash" | "delete" => Ok(Action::Trash),
        "add_tag" | "tag" => Ok(Action::AddTag(required_value(rule_name, kind, value)?)),
        "remove_tag" | "untag" => Ok(Action::RemoveTag(required_value(rule_name, kind, value)?)),
        "rename" => {
            let name = required_value(rule_name, kind, value)?;
            if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
                return Err(CuratorError::validation(format!(
                    "Rule '{}': rename value must be a bare file name, got '{}'",
                    rule_name, name
                )));
            }
            Ok(Action::Rename(name))
        }
        "move" => {
            let dest = required_value(rule_name, kind, value)?;
            let dest = match dest.as_str() {
                "." | "./" | "/" => String::new(),
                other => normalize_rel_path(other).map_err(|e| {
                    CuratorError::validation(format!("Rule '{}': {}", rule_name, e))
                })?,
            };
            Ok(Action::Move(dest))
        }
        other => Err(CuratorError::validation(format!(
            "Rule '{}': unknown action '{}'. Allowed: trash, add_tag, remove_tag, rename, move",
            rule_name, other
        ))),
    }
}

fn compile_rule(index: usize, raw: RawRule) -> Result<Rule> {
    let name = raw
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("rule-{}", index + 1));

    let conditions = raw
        .conditions
        .into_iter()
        .map(|c| compile_condition(&name, c))
        .collect::<Result<Vec<_>>>()?;

    let action = match raw.action {
        RawAction::Name(kind) => compile_action(&name, &kind, raw.action_value)?,
        RawAction::Tagged { kind, value } => {
            compile_action(&name, &kind, value.or(raw.action_value))?
        }
    };

    Ok(Rule {
        name,
        conditions,
        action,
    })
}

/// Parse and compile a rules document. Disabled rules are dropped.
pub fn parse_rules(json: &str) -> Result<Vec<Rule>> {
    let raw: RawRuleFile = serde_json::from_str(json)
        .map_err(|e| CuratorError::validation(format!("Invalid rules file: {}", e)))?;
    let raw_rules = match raw {
        RawRuleFile::List(rules) | RawRuleFile::Wrapped { rules } => rules,
    };
    raw_rules
        .into_iter()
        .enumerate()
        .filter(|(_, rule)| rule.enabled)
        .map(|(index, rule)| compile_rule(index, rule))
        .collect()
}

/// Load rules from disk. A missing file means no rules.
pub fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No rules file");
            return Ok(Vec::new());
        }
        Err(e) => return Err(CuratorError::io(path, e)),
    };
    let rules = parse_rules(&json).map_err(|e| match e {
        CuratorError::Validation(msg) => {
            CuratorError::validation(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })?;
    info!(path = %path.display(), count = rules.len(), "Loaded rules");
    Ok(rules)
}
