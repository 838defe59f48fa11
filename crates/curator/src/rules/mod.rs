//! Declarative curation rules.
//!
//! A rule is a list of conditions over file attributes plus one action.
//! Rules are tried in file order and the first one whose conditions all hold
//! decides the action. The engine only describes actions; [`run_rules`]
//! previews or applies them through [`crate::ops`].

pub mod apply;
pub mod engine;
pub mod model;

pub use apply::{run_rules, RuleResult, RulesReport, RunMode};
pub use engine::{evaluate, first_match, rule_matches, FileAttributes};
pub use model::{load_rules, parse_rules, Action, Condition, Field, Operand, Operator, Rule};
