pub mod terminal;

/// Lifecycle of a single tool invocation as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Running,
    Success,
    Error,
}
