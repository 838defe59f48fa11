//! First-match-wins evaluation of compiled rules.

use super::model::{Action, Condition, Field, Operand, Operator, Rule};
use crate::repo::file_name_of;
use crate::scan::FileDescriptor;
use chrono::{DateTime, FixedOffset, Utc};
use std::path::Path;
use std::time::SystemTime;

/// What the engine knows about a file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAttributes {
    /// Forward-slash path relative to the repository root
    pub rel_path: String,
    pub size: Option<u64>,
    pub modified: Option<SystemTime>,
}

impl FileAttributes {
    pub fn new(rel_path: impl Into<String>, size: Option<u64>, modified: Option<SystemTime>) -> Self {
        Self {
            rel_path: rel_path.into(),
            size,
            modified,
        }
    }

    /// Read size and mtime from disk. Unreadable metadata leaves both unset.
    pub fn from_path(rel_path: impl Into<String>, path: &Path) -> Self {
        let metadata = path.metadata().ok();
        Self {
            rel_path: rel_path.into(),
            size: metadata.as_ref().map(|m| m.len()),
            modified: metadata.and_then(|m| m.modified().ok()),
        }
    }

    pub fn file_name(&self) -> &str {
        file_name_of(&self.rel_path)
    }

    /// Lower-case extension with its dot, or empty.
    pub fn extension(&self) -> String {
        Path::new(self.file_name())
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default()
    }

    /// Whole days since the last modification; future mtimes count as 0.
    pub fn age_days(&self, now: DateTime<FixedOffset>) -> Option<i64> {
        let modified: DateTime<Utc> = self.modified?.into();
        Some((now.with_timezone(&Utc) - modified).num_days().max(0))
    }
}

impl From<&FileDescriptor> for FileAttributes {
    fn from(file: &FileDescriptor) -> Self {
        Self::new(file.path.clone(), Some(file.size), file.modified)
    }
}

/// An attribute as both text and (when it has one) a number.
struct Attribute {
    text: String,
    number: Option<f64>,
}

impl Attribute {
    fn text(text: String) -> Self {
        Self { text, number: None }
    }

    fn number(n: i64) -> Self {
        Self {
            text: n.to_string(),
            number: Some(n as f64),
        }
    }
}

fn attribute(attrs: &FileAttributes, field: Field, now: DateTime<FixedOffset>) -> Option<Attribute> {
    match field {
        Field::Extension => Some(Attribute::text(attrs.extension())),
        Field::Filename => Some(Attribute::text(attrs.file_name().to_string())),
        Field::Path => Some(Attribute::text(attrs.rel_path.clone())),
        Field::AgeDays => attrs.age_days(now).map(Attribute::number),
        Field::Size => attrs
            .size
            .and_then(|s| i64::try_from(s).ok())
            .map(Attribute::number),
    }
}

fn compare(actual: &Attribute, operator: Operator, operand: &Operand) -> bool {
    let (text, number) = match operand {
        Operand::Pattern(regex) => return regex.is_match(&actual.text),
        Operand::Value { text, number } => (text.as_str(), *number),
    };
    let actual_number = actual
        .number
        .or_else(|| actual.text.trim().parse::<f64>().ok());

    match operator {
        Operator::Is => match (actual.number, number) {
            (Some(a), Some(b)) => a == b,
            _ => actual.text == text,
        },
        Operator::Contains => actual.text.contains(text),
        Operator::StartsWith => actual.text.starts_with(text),
        Operator::EndsWith => actual.text.ends_with(text),
        Operator::Gt => matches!((actual_number, number), (Some(a), Some(b)) if a > b),
        Operator::Lt => matches!((actual_number, number), (Some(a), Some(b)) if a < b),
        // Regex operands are always compiled into `Operand::Pattern`.
        Operator::Regex => false,
    }
}

/// A condition on an attribute that cannot be derived is false, negated or not.
pub fn condition_holds(
    condition: &Condition,
    attrs: &FileAttributes,
    now: DateTime<FixedOffset>,
) -> bool {
    let Some(actual) = attribute(attrs, condition.field, now) else {
        return false;
    };
    let outcome = compare(&actual, condition.operator, &condition.operand);
    outcome != condition.negated
}

/// True when every condition holds; a rule without conditions always matches.
pub fn rule_matches(rule: &Rule, attrs: &FileAttributes, now: DateTime<FixedOffset>) -> bool {
    rule.conditions
        .iter()
        .all(|condition| condition_holds(condition, attrs, now))
}

/// First rule, in declared order, that matches the file.
pub fn first_match<'r>(
    attrs: &FileAttributes,
    rules: &'r [Rule],
    now: DateTime<FixedOffset>,
) -> Option<&'r Rule> {
    rules.iter().find(|rule| rule_matches(rule, attrs, now))
}

/// The action the first matching rule asks for, if any.
pub fn evaluate<'r>(
    attrs: &FileAttributes,
    rules: &'r [Rule],
    now: DateTime<FixedOffset>,
) -> Option<&'r Action> {
    first_match(attrs, rules, now).map(|rule| &rule.action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::parse_rules;
    use crate::state::now_local;
    use chrono::Duration;

    fn file_aged(rel: &str, size: u64, days: i64, now: DateTime<FixedOffset>) -> FileAttributes {
        let modified: SystemTime = (now - Duration::days(days) - Duration::hours(1)).into();
        FileAttributes::new(rel, Some(size), Some(modified))
    }

    fn sample_rules() -> Vec<Rule> {
        parse_rules(
            r#"[
                {"name": "old logs", "conditions": [
                    {"field": "extension", "operator": "is", "value": ".log"},
                    {"field": "age_days", "operator": "gt", "value": 30}
                ], "action": "delete"},
                {"name": "screenshots", "conditions": [
                    {"field": "filename", "operator": "startswith", "value": "Screenshot"}
                ], "action": "add_tag", "action_value": "screenshot"},
                {"name": "big", "conditions": [
                    {"field": "size", "operator": "gt", "value": 1000}
                ], "action": {"type": "move", "value": "big"}}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn first_match_wins() {
        let now = now_local();
        let rules = sample_rules();

        let old_log = file_aged("logs/app.LOG", 5000, 31, now);
        assert_eq!(first_match(&old_log, &rules, now).unwrap().name, "old logs");

        let fresh_log = file_aged("logs/app.log", 5000, 2, now);
        assert_eq!(first_match(&fresh_log, &rules, now).unwrap().name, "big");

        let shot = file_aged("Screenshot 1.png", 10, 0, now);
        assert_eq!(
            evaluate(&shot, &rules, now),
            Some(&Action::AddTag("screenshot".into()))
        );

        let plain = file_aged("notes.txt", 10, 0, now);
        assert!(evaluate(&plain, &rules, now).is_none());
    }

    #[test]
    fn reordering_non_matching_rules_does_not_change_result() {
        let now = now_local();
        let mut rules = sample_rules();
        let file = file_aged("Screenshot 2.png", 10, 0, now);
        let before = evaluate(&file, &rules, now).cloned();

        rules.swap(0, 2);
        assert_eq!(evaluate(&file, &rules, now).cloned(), before);
        assert_eq!(evaluate(&file, &rules, now).cloned(), before);
    }

    #[test]
    fn empty_conditions_match_everything() {
        let now = now_local();
        let rules = parse_rules(r#"[{"action": "trash"}]"#).unwrap();
        let file = FileAttributes::new("anything", None, None);
        assert_eq!(evaluate(&file, &rules, now), Some(&Action::Trash));
    }

    #[test]
    fn operators_and_negation() {
        let now = now_local();
        let file = file_aged("docs/Report-2024.pdf", 2048, 10, now);
        let check = |field: &str, op: &str, value: &str| {
            let json = format!(
                r#"[{{"conditions": [{{"field": "{}", "operator": "{}", "value": {}}}], "action": "trash"}}]"#,
                field, op, value
            );
            let rules = parse_rules(&json).unwrap();
            rule_matches(&rules[0], &file, now)
        };

        assert!(check("path", "contains", r#""docs/""#));
        assert!(check("filename", "endswith", r#"".pdf""#));
        assert!(check("extension", "is", r#""pdf""#));
        assert!(check("filename", "regex", r#""^Report-\\d{4}""#));
        assert!(check("filename", "not_regex", r#""^draft""#));
        assert!(check("size", "is", "2048"));
        assert!(check("size", "is", r#""2048""#));
        assert!(check("age_days", "is", "10"));
        assert!(check("age_days", "lt", "11"));
        assert!(!check("age_days", "gt", "10"));
        assert!(check("path", "is_not", r#""other""#));
        assert!(!check("filename", "not_startswith", r#""Report""#));
    }

    #[test]
    fn underivable_or_non_numeric_is_false() {
        let now = now_local();
        let no_meta = FileAttributes::new("a.log", None, None);
        let rules = parse_rules(
            r#"[
                {"conditions": [{"field": "age_days", "operator": "not_gt", "value": 1}], "action": "trash"},
                {"conditions": [{"field": "filename", "operator": "gt", "value": "abc"}], "action": "trash"}
            ]"#,
        )
        .unwrap();
        assert!(!rule_matches(&rules[0], &no_meta, now));
        assert!(!rule_matches(&rules[1], &no_meta, now));
    }

    #[test]
    fn age_is_floored_to_whole_days() {
        let now = now_local();
        let modified: SystemTime = (now - Duration::hours(47)).into();
        let attrs = FileAttributes::new("a", Some(1), Some(modified));
        assert_eq!(attrs.age_days(now), Some(1));

        let future: SystemTime = (now + Duration::days(3)).into();
        assert_eq!(FileAttributes::new("a", Some(1), Some(future)).age_days(now), Some(0));
        assert_eq!(FileAttributes::new("archive.TAR.GZ", None, None).extension(), ".gz");
        assert_eq!(FileAttributes::new("Makefile", None, None).extension(), "");
    }

    #[test]
    fn from_path_reads_metadata() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let attrs = FileAttributes::from_path("docs/notes.txt", &path);
        assert_eq!(attrs.size, Some(5));
        assert!(attrs.modified.is_some());
        assert_eq!(attrs.file_name(), "notes.txt");

        let missing = FileAttributes::from_path("gone.txt", &temp.path().join("gone.txt"));
        assert_eq!(missing.size, None);
        assert_eq!(missing.age_days(now_local()), None);
    }
}
