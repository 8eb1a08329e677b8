use std::fmt;

use thiserror::Error;

use crate::model::{OutputId, WindowId};

/// Something a command or event can refer to by id or name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Window(WindowId),
    Workspace(String),
    Output(OutputId),
    /// No output has been added yet.
    ActiveOutput,
    Binding(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Window(wid) => write!(f, "window {wid}"),
            Target::Workspace(name) => write!(f, "workspace {name:?}"),
            Target::Output(id) => write!(f, "{id}"),
            Target::ActiveOutput => write!(f, "active output"),
            Target::Binding(name) => write!(f, "binding {name:?}"),
        }
    }
}

/// Failures of layout operations. A failed operation never leaves partial
/// state behind.
///
/// An empty tree or a zero-sized output is not an error; every operation
/// handles that case directly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("{0} not found")]
    NotFound(Target),
    #[error("{0} already exists")]
    AlreadyExists(Target),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl LayoutError {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        LayoutError::InvariantViolation(msg.into())
    }

    pub(crate) fn window(wid: WindowId) -> Self { LayoutError::NotFound(Target::Window(wid)) }

    pub(crate) fn workspace(name: &str) -> Self {
        LayoutError::NotFound(Target::Workspace(name.to_string()))
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, LayoutError::InvariantViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_target() {
        assert_eq!(
            LayoutError::window(WindowId::new(7)).to_string(),
            "window w7 not found"
        );
        assert_eq!(
            LayoutError::AlreadyExists(Target::Workspace("web".into())).to_string(),
            "workspace \"web\" already exists"
        );
        assert_eq!(
            LayoutError::NotFound(Target::Output(OutputId::new(2))).to_string(),
            "output-2 not found"
        );
    }

    #[test]
    fn only_invariant_failures_are_flagged() {
        assert!(LayoutError::invariant("split with one child").is_invariant_violation());
        assert!(!LayoutError::workspace("3").is_invariant_violation());
    }
}
