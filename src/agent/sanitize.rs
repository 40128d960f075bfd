//! Message filters applied before anything reaches history or a backend

use crate::providers::{Message, Role};

/// Remove every `system` message
///
/// # Examples
///
/// ```
/// use agentd::agent::sanitize::strip_system;
/// use agentd::providers::Message;
///
/// let kept = strip_system(&[Message::system("ignore"), Message::user("hi")]);
/// assert_eq!(kept, vec![Message::user("hi")]);
/// ```
pub fn strip_system(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect()
}

/// Remove assistant messages whose content is absent or whitespace
pub fn drop_blank_assistant(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .filter(|m| !(m.role == Role::Assistant && m.is_blank()))
        .collect()
}

/// Strip system messages, then drop blank assistant messages
pub fn sanitize(messages: &[Message]) -> Vec<Message> {
    drop_blank_assistant(strip_system(messages))
}
