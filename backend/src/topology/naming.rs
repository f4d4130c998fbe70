//! Agent display names
//!
//! Names look like `03Gre@1`: global index, a short type prefix and the
//! level, with the prefix and the level dropped when not revealed. Default
//! agents are named `_df_{level}_{j}` so reports can skip them, and an
//! adapter `"name"` parameter always wins.

use super::AgentSlot;
use serde::{Deserialize, Serialize};

/// Which facts an agent's display name gives away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub reveal_level: bool,
    pub reveal_type: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            reveal_level: true,
            reveal_type: false,
        }
    }
}

/// Prefix marking agents added by the planner
pub const DEFAULT_AGENT_PREFIX: &str = "_df_";

/// Three-character prefix derived from a type name (`do_nothing` -> `DoN`)
pub fn short_type_name(type_name: &str) -> String {
    let camel: String = type_name
        .split(|c: char| c == '_' || c == '-' || c == ':' || c == '.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    camel.chars().take(3).collect()
}

impl NamingConfig {
    /// Display name of `slot`, placed at `global_index` in level order
    ///
    /// `default_index` is the slot's position among the default agents of
    /// its level.
    pub fn agent_name(&self, slot: &AgentSlot, global_index: usize, default_index: usize) -> String {
        if let Some(name) = slot.spec.params.display_name() {
            return name.to_string();
        }
        if slot.is_default {
            return format!("{}{}_{}", DEFAULT_AGENT_PREFIX, slot.level, default_index);
        }
        let mut name = format!("{:02}", global_index);
        if self.reveal_type {
            name.push_str(&short_type_name(&slot.spec.type_name));
        }
        if self.reveal_level {
            name.push_str(&format!("@{}", slot.level));
        }
        name
    }

    /// Names for every slot, in the given (level) order
    pub fn names(&self, slots: &[AgentSlot]) -> Vec<String> {
        let mut defaults_per_level: Vec<usize> = Vec::new();
        slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                if defaults_per_level.len() <= slot.level {
                    defaults_per_level.resize(slot.level + 1, 0);
                }
                let j = defaults_per_level[slot.level];
                if slot.is_default {
                    defaults_per_level[slot.level] += 1;
                }
                self.agent_name(slot, i, j)
            })
            .collect()
    }
}

/// True for names produced for planner-added default agents
pub fn is_default_name(name: &str) -> bool {
    name.starts_with(DEFAULT_AGENT_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agent::{AgentParams, AgentSpec};
    use serde_json::json;

    fn slot(level: usize, type_name: &str, is_default: bool) -> AgentSlot {
        AgentSlot {
            level,
            index_in_level: 0,
            spec: AgentSpec::new(type_name),
            is_default,
        }
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("greedy"), "Gre");
        assert_eq!(short_type_name("do_nothing"), "DoN");
        assert_eq!(short_type_name("ab"), "Ab");
    }

    #[test]
    fn test_name_parts_follow_flags() {
        let s = slot(2, "greedy", false);
        let both = NamingConfig {
            reveal_level: true,
            reveal_type: true,
        };
        assert_eq!(both.agent_name(&s, 7, 0), "07Gre@2");
        assert_eq!(NamingConfig::default().agent_name(&s, 7, 0), "07@2");
        let none = NamingConfig {
            reveal_level: false,
            reveal_type: false,
        };
        assert_eq!(none.agent_name(&s, 12, 0), "12");
    }

    #[test]
    fn test_default_and_explicit_names() {
        let naming = NamingConfig::default();
        let slots = vec![
            slot(0, "greedy", false),
            slot(0, "random", true),
            slot(1, "random", true),
            slot(1, "random", true),
        ];
        assert_eq!(naming.names(&slots), vec!["00@0", "_df_0_0", "_df_1_0", "_df_1_1"]);
        assert!(is_default_name("_df_1_1"));

        let mut named = slot(1, "greedy", false);
        named.spec = named
            .spec
            .with_params(AgentParams::default().with_adapter("name", json!("acme")));
        assert_eq!(naming.agent_name(&named, 0, 0), "acme");
    }
}
