// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Insertion-ordered message log with id lookup.

use std::collections::HashMap;

use chatline_core::{Message, MessageId};

/// Ordered sequence of messages, indexed by id.
///
/// Entries are only ever pushed at the end or mutated in place; an entry's
/// index never changes once assigned.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
    index: HashMap<MessageId, usize>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a log from stored messages. Later duplicates of an id are dropped.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut log = Self::new();
        for message in messages {
            if !log.contains(&message.id) {
                log.push(message);
            }
        }
        log
    }

    /// Appends `message` and returns its index.
    ///
    /// Callers must check [`contains`](Self::contains) first.
    pub(crate) fn push(&mut self, message: Message) -> usize {
        let position = self.entries.len();
        self.index.insert(message.id.clone(), position);
        self.entries.push(message);
        position
    }

    pub(crate) fn get_mut(&mut self, id: &MessageId) -> Option<(usize, &mut Message)> {
        let position = *self.index.get(id)?;
        self.entries.get_mut(position).map(|m| (position, m))
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.index.get(id).and_then(|&i| self.entries.get(i))
    }

    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.index.contains_key(id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_messages_keeps_first_of_duplicates() {
        let a = Message::outgoing(MessageId::from("a"), "first");
        let b = Message::outgoing(MessageId::from("b"), "second");
        let dup = Message::outgoing(MessageId::from("a"), "dup");
        let log = MessageLog::from_messages(vec![a, b, dup]);

        assert_eq!(log.len(), 2);
        assert_eq!(log.get(&MessageId::from("a")).unwrap().content, "first");
        assert_eq!(log.position(&MessageId::from("b")), Some(1));
    }
}
