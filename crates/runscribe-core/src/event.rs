use crate::payload::Payload;

/// Lifecycle kind of a run item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunItemKind {
    ToolCalled,
    ToolOutput,
    MessageFinalized,
    /// Any other item; keeps the runtime's name for the log line.
    Other(String),
}

impl RunItemKind {
    /// Classifies a run-item name as emitted by agent runtimes.
    pub fn from_name(name: &str) -> Self {
        match name {
            "tool_called" => Self::ToolCalled,
            "tool_output" => Self::ToolOutput,
            "message_output_created" => Self::MessageFinalized,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ToolCalled => "tool_called",
            Self::ToolOutput => "tool_output",
            Self::MessageFinalized => "message_output_created",
            Self::Other(name) => name,
        }
    }
}

/// One notification emitted by the agent runtime during a run.
///
/// Classified once at ingestion; the payload is interpreted by tag only.
#[derive(Clone, Debug)]
pub enum RunEvent {
    /// Partial fragment of answer text.
    TokenDelta { text: String },
    /// Higher-level lifecycle event whose payload shape depends on the runtime.
    RunItem { kind: RunItemKind, payload: Payload },
    /// The run handed over to another agent.
    AgentSwitch { new_agent: Payload },
}

impl RunEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        Self::TokenDelta { text: text.into() }
    }

    pub fn tool_called(payload: impl Into<Payload>) -> Self {
        Self::item(RunItemKind::ToolCalled, payload)
    }

    pub fn tool_output(payload: impl Into<Payload>) -> Self {
        Self::item(RunItemKind::ToolOutput, payload)
    }

    pub fn message(payload: impl Into<Payload>) -> Self {
        Self::item(RunItemKind::MessageFinalized, payload)
    }

    pub fn item(kind: RunItemKind, payload: impl Into<Payload>) -> Self {
        Self::RunItem {
            kind,
            payload: payload.into(),
        }
    }

    pub fn agent_switch(new_agent: impl Into<Payload>) -> Self {
        Self::AgentSwitch {
            new_agent: new_agent.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_names_round_trip_through_kind() {
        for name in ["tool_called", "tool_output", "message_output_created", "handoff_requested"] {
            assert_eq!(RunItemKind::from_name(name).as_str(), name);
        }
        assert_eq!(
            RunItemKind::from_name("reasoning_item_created"),
            RunItemKind::Other("reasoning_item_created".into())
        );
    }
}
