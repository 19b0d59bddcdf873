//! The declarative header rule that makes the search engine serve its mobile
//! layout: one `modifyHeaders` rule rewriting `User-Agent` on top-level
//! navigations to the search domain, present only while emulation is on.

use serde::{Deserialize, Serialize};

use crate::config::{CONFIG, DEFAULT_MOBILE_USER_AGENT};

pub const RULE_ID: u32 = 1;
pub const URL_FILTER: &str = "||google.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderRule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub request_headers: Vec<HeaderModification>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderModification {
    pub header: String,
    pub operation: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub url_filter: String,
    pub resource_types: Vec<String>,
}

/// Argument for the platform's dynamic rule update call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub remove_rule_ids: Vec<u32>,
    pub add_rules: Vec<HeaderRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileEmulation {
    enabled: bool,
    user_agent: String,
}

impl MobileEmulation {
    pub fn new(enabled: bool, user_agent: &str) -> Self {
        Self {
            enabled,
            user_agent: user_agent.to_string(),
        }
    }

    pub fn from_config(enabled: bool) -> Self {
        Self::new(enabled, &CONFIG.mobile_user_agent)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Flips the toggle and returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn rule(&self) -> Option<HeaderRule> {
        if !self.enabled {
            return None;
        }
        Some(HeaderRule {
            id: RULE_ID,
            priority: 1,
            action: RuleAction {
                kind: "modifyHeaders".to_string(),
                request_headers: vec![HeaderModification {
                    header: "User-Agent".to_string(),
                    operation: "set".to_string(),
                    value: self.user_agent.clone(),
                }],
            },
            condition: RuleCondition {
                url_filter: URL_FILTER.to_string(),
                resource_types: vec!["main_frame".to_string()],
            },
        })
    }

    /// Always drops the previous rule; re-adds it when enabled.
    pub fn rule_update(&self) -> RuleUpdate {
        RuleUpdate {
            remove_rule_ids: vec![RULE_ID],
            add_rules: self.rule().into_iter().collect(),
        }
    }
}

impl Default for MobileEmulation {
    fn default() -> Self {
        Self::new(false, DEFAULT_MOBILE_USER_AGENT)
    }
}
