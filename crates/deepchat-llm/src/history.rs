use crate::types::{Message, Role};

/// Ordered conversation log.
///
/// The whole log is replayed to the API on every call, so order matters.
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.push(Message::new(role, content));
    }

    /// Remove the last message if it is a user turn.
    /// Returns the removed message.
    pub fn pop_user_turn(&mut self) -> Option<Message> {
        match self.messages.last() {
            Some(last) if last.role() == Role::User => self.messages.pop(),
            _ => None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
