//! Turning permission documents into canonical rules

use chrono::{NaiveTime, Weekday};
use indexmap::IndexMap;
use warden_permissions::{Action, Condition, ConfigError, Rule, TimeWindow, ToolCategory};

use crate::schema::{ConditionDocument, RuleDocument, TimeWindowDocument, ToolPolicy};

/// Expand a scope's tool policies into rules, in document order.
///
/// Rules without an explicit id get `<scope>:<tool>:<index>`, where the index
/// counts rules within that tool's policy. Any bad entry rejects the whole
/// scope.
pub fn normalize_policies(
    scope: &str,
    policies: &IndexMap<String, ToolPolicy>,
) -> Result<Vec<Rule>, ConfigError> {
    let mut rules = Vec::new();

    for (name, policy) in policies {
        if name.trim().is_empty() {
            return Err(ConfigError::Document {
                scope: scope.to_string(),
                message: "empty tool category name".to_string(),
            });
        }
        let tool = ToolCategory::from_name(name);
        let generated_id = |index: usize| format!("{}:{}:{}", scope, tool.as_str(), index);

        match policy {
            ToolPolicy::Keyword(keyword) => {
                let id = generated_id(0);
                let action = parse_action(scope, &id, keyword)?;
                rules.push(Rule::for_any_target(id, tool.clone(), action));
            }
            ToolPolicy::Patterns(map) => {
                for (index, (pattern, keyword)) in map.iter().enumerate() {
                    let id = generated_id(index);
                    let action = parse_action(scope, &id, keyword)?;
                    rules.push(Rule::new(id, tool.clone(), action, [pattern.as_str()]));
                }
            }
            ToolPolicy::Rules(list) => {
                for (index, doc) in list.iter().enumerate() {
                    let id = doc.id.clone().unwrap_or_else(|| generated_id(index));
                    rules.push(rule_from_document(scope, id, tool.clone(), doc)?);
                }
            }
        }
    }

    Ok(rules)
}

fn rule_from_document(
    scope: &str,
    id: String,
    tool: ToolCategory,
    doc: &RuleDocument,
) -> Result<Rule, ConfigError> {
    let action = parse_action(scope, &id, &doc.action)?;

    let condition = match &doc.when {
        Some(when) => Some(condition_from_document(when).map_err(|reason| {
            ConfigError::InvalidCondition {
                scope: scope.to_string(),
                rule_id: id.clone(),
                reason,
            }
        })?),
        None => None,
    };

    let mut rule = Rule::new(id, tool, action, doc.patterns.iter().map(String::as_str));
    if let Some(condition) = condition {
        rule = rule.with_condition(condition);
    }
    if let Some(description) = &doc.description {
        rule = rule.with_description(description.clone());
    }
    Ok(rule)
}

fn parse_action(scope: &str, rule_id: &str, keyword: &str) -> Result<Action, ConfigError> {
    keyword.parse().map_err(|_| ConfigError::UnknownAction {
        scope: scope.to_string(),
        rule_id: rule_id.to_string(),
        keyword: keyword.to_string(),
    })
}

fn condition_from_document(doc: &ConditionDocument) -> Result<Condition, String> {
    let mut condition = Condition::new()
        .in_environments(doc.environments.iter().map(String::as_str))
        .for_users(doc.users.iter().map(String::as_str));

    if let Some(window) = &doc.time_window {
        condition = condition.during(time_window(window)?);
    }
    if let Some(size) = &doc.file_size {
        condition = condition.with_file_size(size.min, size.max);
    }
    if let Some(content) = &doc.content {
        condition = condition
            .with_content_pattern(content)
            .map_err(|e| format!("invalid content pattern: {e}"))?;
    }

    Ok(condition)
}

fn time_window(doc: &TimeWindowDocument) -> Result<TimeWindow, String> {
    let days = doc
        .days
        .iter()
        .map(|day| {
            day.parse::<Weekday>()
                .map_err(|_| format!("unknown weekday `{day}`"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TimeWindow::new(parse_time(&doc.start)?, parse_time(&doc.end)?).on_days(days))
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| format!("invalid time of day `{value}`, expected HH:MM"))
}
