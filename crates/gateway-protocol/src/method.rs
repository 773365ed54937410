//! The first-class MCP method registry.
//!
//! The gateway does not execute these methods — tool dispatch, prompt
//! rendering, and sampling are delegated upstream — but it needs to recognize
//! them to route, log, and validate consistently rather than treating every
//! method name as an opaque string.

use std::fmt;

/// A recognized MCP method, or an unrecognized one carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum McpMethod {
    /// `ping`
    Ping,
    /// `initialize`
    Initialize,
    /// `tools/list`
    ToolsList,
    /// `tools/call`
    ToolsCall,
    /// `resources/list`
    ResourcesList,
    /// `resources/read`
    ResourcesRead,
    /// `prompts/list`
    PromptsList,
    /// `prompts/get`
    PromptsGet,
    /// `completion/complete`
    CompletionComplete,
    /// Anything outside the first-class set, e.g. a notification or a
    /// method an upstream server defines that the gateway simply forwards.
    Other(String),
}

impl McpMethod {
    /// Parse a wire method name.
    pub fn parse(name: &str) -> Self {
        match name {
            "ping" => Self::Ping,
            "initialize" => Self::Initialize,
            "tools/list" => Self::ToolsList,
            "tools/call" => Self::ToolsCall,
            "resources/list" => Self::ResourcesList,
            "resources/read" => Self::ResourcesRead,
            "prompts/list" => Self::PromptsList,
            "prompts/get" => Self::PromptsGet,
            "completion/complete" => Self::CompletionComplete,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether this method is in the first-class registry (as opposed to an
    /// opaque forward).
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Whether this method expects a response. All first-class methods do;
    /// an `Other` name starting with `notifications/` does not.
    pub fn expects_response(&self) -> bool {
        match self {
            Self::Other(name) => !name.starts_with("notifications/"),
            _ => true,
        }
    }
}

impl fmt::Display for McpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ping => write!(f, "ping"),
            Self::Initialize => write!(f, "initialize"),
            Self::ToolsList => write!(f, "tools/list"),
            Self::ToolsCall => write!(f, "tools/call"),
            Self::ResourcesList => write!(f, "resources/list"),
            Self::ResourcesRead => write!(f, "resources/read"),
            Self::PromptsList => write!(f, "prompts/list"),
            Self::PromptsGet => write!(f, "prompts/get"),
            Self::CompletionComplete => write!(f, "completion/complete"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_class_methods() {
        assert_eq!(McpMethod::parse("tools/call"), McpMethod::ToolsCall);
        assert!(McpMethod::parse("tools/call").is_known());
    }

    #[test]
    fn unrecognized_method_is_other_but_not_an_error() {
        let m = McpMethod::parse("x-custom/frobnicate");
        assert!(!m.is_known());
        assert_eq!(m.to_string(), "x-custom/frobnicate");
    }

    #[test]
    fn notification_methods_expect_no_response() {
        let m = McpMethod::parse("notifications/progress");
        assert!(!m.expects_response());
    }
}
