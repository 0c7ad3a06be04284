use std::fmt::{Debug, Formatter};
use std::io::{Read, Write};

use crate::client::{Connection, Session};
use crate::error::{Error, ParseError, Result};
use crate::options::FetchOptions;
use crate::types::{Fetch, Overview, Uid};

/// The mailbox operations a [`Query`](crate::query::Query) and a
/// [`Watcher`](crate::idle::Watcher) run against.
///
/// Implementations talk to a mailbox that has already been selected. [`Session`] is the wire
/// implementation; [`testing::MockConnection`](crate::testing) scripts one in memory.
pub trait ImapConnection {
    /// Fails with [`Error::ConnectionUnavailable`] when no command can be sent.
    fn check_connection(&mut self) -> Result<()>;

    /// Whether the connection is still usable.
    fn is_open(&self) -> bool;

    /// Runs `UID SEARCH` with the given raw criteria. `None` leaves out the `CHARSET` argument.
    fn search(&mut self, query: &str, charset: Option<&str>) -> Result<Vec<Uid>>;

    /// Fetches a single message by UID.
    fn fetch_message(&mut self, uid: Uid, options: &FetchOptions) -> Result<Fetch>;

    /// Lists every message of the mailbox without fetching content.
    fn overview(&mut self) -> Result<Vec<Overview>>;

    /// Removes messages flagged `\Deleted`.
    fn expunge(&mut self) -> Result<()>;
}

impl Debug for dyn ImapConnection + '_ {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Imap connection")
    }
}

impl<T: Read + Write> ImapConnection for Session<T> {
    fn check_connection(&mut self) -> Result<()> {
        if Connection::<T>::is_open(self) {
            Ok(())
        } else {
            Err(Error::ConnectionUnavailable)
        }
    }

    fn is_open(&self) -> bool {
        Connection::<T>::is_open(self)
    }

    fn search(&mut self, query: &str, charset: Option<&str>) -> Result<Vec<Uid>> {
        self.uid_search(query, charset)
    }

    fn fetch_message(&mut self, uid: Uid, options: &FetchOptions) -> Result<Fetch> {
        self.uid_fetch(uid.to_string(), options.fetch_items())?
            .into_iter()
            // the server may piggyback flag updates for other messages
            .find(|fetch| fetch.uid == Some(uid))
            .ok_or(Error::Parse(ParseError::MissingMessage(uid)))
    }

    fn overview(&mut self) -> Result<Vec<Overview>> {
        Session::overview(self)
    }

    fn expunge(&mut self) -> Result<()> {
        Session::expunge(self).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_stream::MockStream;
    use crate::options::FetchMode;

    fn session(response: &[u8]) -> Session<MockStream> {
        Session::new(MockStream::new(response.to_vec()))
    }

    #[test]
    fn fetch_message_picks_requested_uid() {
        let response = b"* 1 FETCH (UID 3 FLAGS (\\Seen))\r\n\
                         * 4 FETCH (UID 9 RFC822.SIZE 44)\r\n\
                         a1 OK FETCH completed\r\n";
        let mut session = session(response);
        let options = FetchOptions {
            mode: FetchMode::Peek,
            body: false,
            attachments: false,
            flags: false,
        };
        let fetch = session.fetch_message(9, &options).unwrap();
        assert_eq!(fetch.message, 4);
        assert_eq!(fetch.size, Some(44));
        assert_eq!(
            session.stream.get_ref().written(),
            "a1 UID FETCH 9 (UID ENVELOPE RFC822.SIZE)\r\n"
        );
    }

    #[test]
    fn fetch_message_missing() {
        let response = b"a1 OK FETCH completed\r\n";
        let mut session = session(response);
        match session.fetch_message(9, &FetchOptions::default()) {
            Err(Error::Parse(ParseError::MissingMessage(9))) => {}
            other => panic!("expected missing message, got {:?}", other),
        }
    }

    #[test]
    fn check_connection_after_logout() {
        let response = b"a1 OK Logout completed.\r\n";
        let mut session = session(response);
        assert!(ImapConnection::check_connection(&mut session).is_ok());
        session.logout().unwrap();
        assert!(!ImapConnection::is_open(&session));
        match ImapConnection::check_connection(&mut session) {
            Err(Error::ConnectionUnavailable) => {}
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[test]
    fn expunge_through_trait() {
        let response = b"* 1 EXPUNGE\r\na1 OK EXPUNGE completed\r\n";
        let mut session = session(response);
        ImapConnection::expunge(&mut session).unwrap();
        assert_eq!(session.stream.get_ref().written(), "a1 EXPUNGE\r\n");
    }
}
