use crate::conn::ImapConnection;
use crate::error::Result;
use crate::options::FetchOptions;
use crate::types::{Fetch, Flag, Seq, Uid};

/// A message materialized by a query or discovered by a watcher.
///
/// Only the envelope data needed to address a message is decoded here. The raw RFC 822 bytes
/// are kept when the fetch options asked for them, for a MIME parser to pick up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    uid: Uid,
    list_position: usize,
    fetch: Fetch,
    options: FetchOptions,
}

impl Message {
    /// Fetches `uid` from the connection.
    ///
    /// `list_position` is where the UID appeared in the listing it was taken from.
    pub fn fetch<C: ImapConnection + ?Sized>(
        conn: &mut C,
        uid: Uid,
        list_position: usize,
        options: &FetchOptions,
    ) -> Result<Message> {
        let fetch = conn.fetch_message(uid, options)?;
        Ok(Message::from_fetch(uid, list_position, fetch, *options))
    }

    pub(crate) fn from_fetch(
        uid: Uid,
        list_position: usize,
        fetch: Fetch,
        options: FetchOptions,
    ) -> Message {
        Message {
            uid,
            list_position,
            fetch,
            options,
        }
    }

    /// The unique identifier of the message in its mailbox.
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// The message sequence number at the time it was fetched.
    pub fn sequence_number(&self) -> Seq {
        self.fetch.message
    }

    /// The zero-based position of the message in the server listing it was found in.
    pub fn list_position(&self) -> usize {
        self.list_position
    }

    /// The `Message-ID` from the envelope, if the message has one.
    pub fn message_id(&self) -> Option<&str> {
        self.fetch.message_id()
    }

    pub fn subject(&self) -> Option<&str> {
        self.fetch.subject()
    }

    /// Flags, when they were fetched.
    pub fn flags(&self) -> &[Flag<'static>] {
        self.fetch.flags()
    }

    /// `RFC822.SIZE` in octets.
    pub fn size(&self) -> Option<u32> {
        self.fetch.size
    }

    /// The full message, when the body was fetched.
    pub fn raw(&self) -> Option<&[u8]> {
        self.fetch.body()
    }

    /// The fetch options the message was built with.
    pub fn fetch_options(&self) -> &FetchOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnection, MockMessage};

    #[test]
    fn fetch_keeps_listing_position() {
        let mut conn = MockConnection::new(vec![
            MockMessage::new(7).message_id("<a@example.com>"),
            MockMessage::new(9).subject("Hello"),
        ]);
        let message = Message::fetch(&mut conn, 9, 4, &FetchOptions::default()).unwrap();
        assert_eq!(message.uid(), 9);
        assert_eq!(message.sequence_number(), 2);
        assert_eq!(message.list_position(), 4);
        assert_eq!(message.subject(), Some("Hello"));
        assert_eq!(message.message_id(), None);
        assert_eq!(conn.fetched(), &[9]);
    }

    #[test]
    fn fetch_unknown_uid_fails() {
        let mut conn = MockConnection::new(vec![MockMessage::new(1)]);
        assert!(Message::fetch(&mut conn, 5, 0, &FetchOptions::default()).is_err());
    }
}
