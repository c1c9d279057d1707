//! AgentCard — an agent's published capability description.

use serde::{Deserialize, Serialize};

use super::ids::AgentId;

/// One capability an agent advertises, used by the Decision Engine to pick
/// a delegation target (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    /// Stable identifier for this skill, unique within the agent's card.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What the skill does, in enough detail for a decision engine or
    /// operator to judge fit.
    pub description: String,
    /// Free-form classification tags.
    pub tags: Vec<String>,
    /// Example prompts this skill is suited to handle.
    pub example_prompts: Vec<String>,
}

/// An agent's published identity and capabilities, registered once at
/// startup or reconnect and read by Cortex on every decision cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    /// Stable agent identifier.
    pub agent_id: AgentId,
    /// Human-readable display name.
    pub name: String,
    /// Agent-reported version string.
    pub version: String,
    /// Capabilities this agent offers.
    pub skills: Vec<Skill>,
}

impl AgentCard {
    /// Builds a card with no skills, for agents that only handle
    /// unstructured chat.
    #[must_use]
    pub fn new(agent_id: AgentId, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            agent_id,
            name: name.into(),
            version: version.into(),
            skills: Vec::new(),
        }
    }

    /// Returns true if any skill on this card carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.skills.iter().any(|skill| skill.tags.iter().any(|t| t == tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_tag_checks_all_skills() {
        let mut card = AgentCard::new(AgentId::try_new("agent_echo").unwrap(), "Echo", "0.1.0");
        card.skills.push(Skill {
            id: "echo".into(),
            name: "Echo".into(),
            description: "Repeats input".into(),
            tags: vec!["demo".into()],
            example_prompts: vec!["say hi".into()],
        });
        assert!(card.has_tag("demo"));
        assert!(!card.has_tag("translate"));
    }
}
