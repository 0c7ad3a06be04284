use std::collections::HashMap;
use std::fmt;

use rand::Rng;

use crate::message::Message;
use crate::options::KeyStrategy;
use crate::types::Seq;

/// The key a message is addressed by within one [`MessageCollection`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageKey {
    /// The message sequence number.
    Number(Seq),
    /// The position in the server's search listing.
    Position(usize),
    /// The `Message-ID` header.
    MessageId(String),
    /// A key that collided with an earlier one, disambiguated by a random suffix.
    Duplicate(Box<MessageKey>, u32),
}

impl MessageKey {
    /// Picks the key for `message` according to `strategy`.
    pub fn resolve(strategy: KeyStrategy, message: &Message) -> MessageKey {
        match strategy {
            KeyStrategy::Number => MessageKey::Number(message.sequence_number()),
            KeyStrategy::List => MessageKey::Position(message.list_position()),
            KeyStrategy::MessageId => match message.message_id() {
                Some(id) if !id.is_empty() => MessageKey::MessageId(id.to_string()),
                _ => MessageKey::Number(message.sequence_number()),
            },
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MessageKey::Number(n) => write!(f, "{}", n),
            MessageKey::Position(p) => write!(f, "{}", p),
            MessageKey::MessageId(ref id) => f.write_str(id),
            MessageKey::Duplicate(ref key, n) => write!(f, "{}duplicated{}", key, n),
        }
    }
}

/// An ordered, key-unique set of messages produced by one `get`.
///
/// Keys are unique by their textual form, so a message-id that happens to look like a sequence
/// number still gets its own entry.
#[derive(Debug, Default)]
pub struct MessageCollection {
    entries: Vec<(MessageKey, Message)>,
    index: HashMap<String, usize>,
    total: usize,
}

impl MessageCollection {
    pub(crate) fn with_total(total: usize) -> MessageCollection {
        MessageCollection {
            total,
            ..MessageCollection::default()
        }
    }

    /// Appends `message`, suffixing `key` if it is already taken. Returns the key it was stored
    /// under.
    pub(crate) fn insert(&mut self, key: MessageKey, message: Message) -> MessageKey {
        let mut stored = key.clone();
        let mut rng = rand::thread_rng();
        while self.index.contains_key(&stored.to_string()) {
            stored = MessageKey::Duplicate(Box::new(key.clone()), rng.gen_range(1..=999_999));
        }
        log::trace!("storing message {} under {}", message.uid(), stored);

        self.index.insert(stored.to_string(), self.entries.len());
        self.entries.push((stored.clone(), message));
        stored
    }

    /// Looks a message up by the textual form of its key.
    pub fn get(&self, key: &str) -> Option<&Message> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Iterates in result order.
    pub fn iter(&self) -> impl Iterator<Item = (&MessageKey, &Message)> {
        self.entries.iter().map(|(k, m)| (k, m))
    }

    pub fn keys(&self) -> impl Iterator<Item = &MessageKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|(_, m)| m)
    }

    /// Number of messages held, which is at most one page.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of matches of the search before pagination.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl IntoIterator for MessageCollection {
    type Item = (MessageKey, Message);
    type IntoIter = std::vec::IntoIter<(MessageKey, Message)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
