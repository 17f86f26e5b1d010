//! Navigation capability trait abstraction.
//!
//! The presentation layer mounts asynchronously relative to the session
//! machine, so the capability is attached late and exposes readiness.

use serde_json::Value;

/// The navigation action kinds the core can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavAction {
    Navigate,
    GoBack,
    Reset,
    Replace,
    PopToTop,
}

impl NavAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavAction::Navigate => "navigate",
            NavAction::GoBack => "go_back",
            NavAction::Reset => "reset",
            NavAction::Replace => "replace",
            NavAction::PopToTop => "pop_to_top",
        }
    }
}

impl std::fmt::Display for NavAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A concrete navigation request handed to the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct NavCommand {
    pub action: NavAction,
    /// Target route, absent for `GoBack` / `PopToTop`.
    pub route: Option<String>,
    pub params: Value,
    /// Stack index for `Reset`.
    pub index: Option<usize>,
}

impl NavCommand {
    pub fn navigate(route: impl Into<String>, params: Value) -> Self {
        Self {
            action: NavAction::Navigate,
            route: Some(route.into()),
            params,
            index: None,
        }
    }

    pub fn reset(route: impl Into<String>, params: Value, index: usize) -> Self {
        Self {
            action: NavAction::Reset,
            route: Some(route.into()),
            params,
            index: Some(index),
        }
    }

    pub fn replace(route: impl Into<String>, params: Value) -> Self {
        Self {
            action: NavAction::Replace,
            route: Some(route.into()),
            params,
            index: None,
        }
    }

    pub fn go_back() -> Self {
        Self {
            action: NavAction::GoBack,
            route: None,
            params: Value::Null,
            index: None,
        }
    }

    pub fn pop_to_top() -> Self {
        Self {
            action: NavAction::PopToTop,
            route: None,
            params: Value::Null,
            index: None,
        }
    }
}

/// Trait for the mounted presentation surface.
///
/// Implementations are synchronous: dispatch hands the command to the
/// platform navigation tree and returns. The readiness queue owns all
/// waiting.
pub trait NavigationSurface: Send + Sync {
    /// Whether the surface can accept commands.
    fn is_ready(&self) -> bool;

    /// Hand a command to the navigation tree.
    fn dispatch(&self, command: &NavCommand);

    /// The currently focused route, if any.
    fn current_route(&self) -> Option<String>;

    /// Whether a back navigation is possible right now.
    fn can_go_back(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_labels() {
        assert_eq!(NavAction::Navigate.as_str(), "navigate");
        assert_eq!(NavAction::GoBack.as_str(), "go_back");
        assert_eq!(NavAction::Reset.as_str(), "reset");
        assert_eq!(NavAction::Replace.as_str(), "replace");
        assert_eq!(NavAction::PopToTop.as_str(), "pop_to_top");
    }

    #[test]
    fn test_command_constructors() {
        let cmd = NavCommand::navigate("Home", json!({"tab": 1}));
        assert_eq!(cmd.action, NavAction::Navigate);
        assert_eq!(cmd.route.as_deref(), Some("Home"));
        assert_eq!(cmd.index, None);

        let cmd = NavCommand::reset("SignIn", Value::Null, 0);
        assert_eq!(cmd.action, NavAction::Reset);
        assert_eq!(cmd.index, Some(0));

        let cmd = NavCommand::go_back();
        assert_eq!(cmd.action, NavAction::GoBack);
        assert!(cmd.route.is_none());

        let cmd = NavCommand::pop_to_top();
        assert_eq!(cmd.action, NavAction::PopToTop);
    }
}
