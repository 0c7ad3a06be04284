//! Enable the test_helpers feature to expose a scripted in-memory mailbox for testing code that
//! runs queries or watchers.
//!
//! To use add a dev-dependency on this crate adding the feature "test_helpers"
//! e.g.
//!
//! ```toml
//! [dependencies]
//! imap-query = { version = "0.1" }
//!
//! [dev-dependencies]
//! # mirror the same configuration your dependencies and add test_helpers
//! imap-query = { version = "0.1", features = ["test_helpers"] }
//! ```
//!
//! ```
//! use imap_query::testing::{MockConnection, MockMessage};
//! use imap_query::Query;
//!
//! let mut conn = MockConnection::new(vec![
//!     MockMessage::new(4).subject("Hello"),
//!     MockMessage::new(8).message_id("<8@example.com>"),
//! ]);
//! let messages = Query::new(&mut conn).unseen().get().unwrap();
//! assert_eq!(messages.len(), 2);
//! assert!(messages.contains_key("<8@example.com>"));
//! assert_eq!(conn.searches()[0].0, "UNSEEN");
//! ```

use std::collections::HashSet;

use crate::conn::ImapConnection;
use crate::error::{Bad, Error, No, ParseError, ResponseCode, Result};
use crate::options::FetchOptions;
use crate::types::{Fetch, Flag, Overview, Uid};

/// A message held by a [`MockConnection`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockMessage {
    uid: Uid,
    message_id: Option<String>,
    subject: Option<String>,
    flags: Vec<Flag<'static>>,
    body: Vec<u8>,
}

impl MockMessage {
    /// A message with the given UID and an empty body.
    pub fn new(uid: Uid) -> MockMessage {
        MockMessage {
            uid,
            message_id: None,
            subject: None,
            flags: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn message_id(mut self, message_id: &str) -> MockMessage {
        self.message_id = Some(message_id.to_string());
        self
    }

    pub fn subject(mut self, subject: &str) -> MockMessage {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn flag(mut self, flag: Flag<'static>) -> MockMessage {
        self.flags.push(flag);
        self
    }

    pub fn body(mut self, body: &[u8]) -> MockMessage {
        self.body = body.to_vec();
        self
    }
}

/// An [`ImapConnection`] over a scripted mailbox.
///
/// Searches match every message in the mailbox unless results are set with
/// [`MockConnection::search_results`]. Sequence numbers are positions in the mailbox, starting
/// at 1. Every call is recorded so tests can check what was asked of the server.
#[derive(Clone, Debug, Default)]
pub struct MockConnection {
    messages: Vec<MockMessage>,
    arrivals: Vec<(usize, MockMessage)>,
    open: bool,
    close_after: Option<usize>,
    search_results: Option<Vec<Uid>>,
    accepted_charsets: Option<Vec<String>>,
    suggested_charsets: Option<Vec<String>>,
    fail_searches: bool,
    failing_fetches: HashSet<Uid>,
    searches: Vec<(String, Option<String>)>,
    fetched: Vec<Uid>,
    expunges: usize,
    overviews: usize,
}

impl MockConnection {
    /// An open connection whose selected mailbox holds `messages`, in this order.
    pub fn new(messages: Vec<MockMessage>) -> MockConnection {
        MockConnection {
            messages,
            open: true,
            ..MockConnection::default()
        }
    }

    /// Makes `message` appear once the mailbox has been listed `listings` times.
    pub fn arrive_after(mut self, listings: usize, message: MockMessage) -> MockConnection {
        self.arrivals.push((listings, message));
        self
    }

    /// Reports the connection as closed once the mailbox has been listed `listings` times.
    /// Messages of the last listing can still be fetched.
    pub fn close_after(mut self, listings: usize) -> MockConnection {
        self.close_after = Some(listings);
        self
    }

    /// Makes every search return `uids`, in this order.
    pub fn search_results(mut self, uids: Vec<Uid>) -> MockConnection {
        self.search_results = Some(uids);
        self
    }

    /// Rejects searches with any other charset with `BADCHARSET`. Searches without a charset
    /// are always accepted.
    pub fn accept_charsets(mut self, charsets: &[&str]) -> MockConnection {
        self.accepted_charsets = Some(charsets.iter().map(|c| c.to_string()).collect());
        self
    }

    /// The charsets listed in `BADCHARSET` rejections. Defaults to the accepted charsets.
    pub fn suggest_charsets(mut self, charsets: &[&str]) -> MockConnection {
        self.suggested_charsets = Some(charsets.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Makes every search fail with a `BAD` response.
    pub fn fail_searches(mut self) -> MockConnection {
        self.fail_searches = true;
        self
    }

    /// Makes fetching `uid` fail with a `NO` response.
    pub fn fail_fetch(mut self, uid: Uid) -> MockConnection {
        self.failing_fetches.insert(uid);
        self
    }

    /// Closes the connection.
    pub fn close(&mut self) {
        self.open = false;
    }

    /// Query and charset of every search, in order.
    pub fn searches(&self) -> &[(String, Option<String>)] {
        &self.searches
    }

    /// UIDs of every fetched message, in order.
    pub fn fetched(&self) -> &[Uid] {
        &self.fetched
    }

    /// Number of successful expunges.
    pub fn expunges(&self) -> usize {
        self.expunges
    }

    /// Number of times the mailbox was listed.
    pub fn overviews(&self) -> usize {
        self.overviews
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::ConnectionUnavailable)
        }
    }

    fn hang_up_if_due(&mut self) -> Result<()> {
        if !ImapConnection::is_open(self) {
            self.open = false;
            return Err(Error::ConnectionLost);
        }
        Ok(())
    }

    fn rejected_charset(&self, charset: Option<&str>) -> Option<Error> {
        let (charset, accepted) = match (charset, self.accepted_charsets.as_ref()) {
            (Some(charset), Some(accepted)) => (charset, accepted),
            _ => return None,
        };
        if accepted.iter().any(|a| a.eq_ignore_ascii_case(charset)) {
            return None;
        }

        let suggested = self
            .suggested_charsets
            .clone()
            .unwrap_or_else(|| accepted.clone());
        Some(Error::No(No {
            information: format!("[BADCHARSET ({})] Unsupported charset", suggested.join(" ")),
            code: Some(ResponseCode::BadCharset(suggested)),
        }))
    }
}

impl ImapConnection for MockConnection {
    fn check_connection(&mut self) -> Result<()> {
        self.ensure_open()
    }

    fn is_open(&self) -> bool {
        self.open && self.close_after.map_or(true, |n| self.overviews < n)
    }

    fn search(&mut self, query: &str, charset: Option<&str>) -> Result<Vec<Uid>> {
        self.hang_up_if_due()?;
        self.searches
            .push((query.to_string(), charset.map(String::from)));

        if let Some(err) = self.rejected_charset(charset) {
            return Err(err);
        }
        if self.fail_searches {
            return Err(Error::Bad(Bad {
                information: "Error in IMAP command UID SEARCH".to_string(),
                code: None,
            }));
        }

        Ok(match self.search_results {
            Some(ref uids) => uids.clone(),
            None => self.messages.iter().map(|m| m.uid).collect(),
        })
    }

    fn fetch_message(&mut self, uid: Uid, options: &FetchOptions) -> Result<Fetch> {
        self.ensure_open()?;
        self.fetched.push(uid);

        if self.failing_fetches.contains(&uid) {
            return Err(Error::No(No {
                information: format!("Message {} is not available", uid),
                code: None,
            }));
        }

        let (position, message) = self
            .messages
            .iter()
            .enumerate()
            .find(|(_, m)| m.uid == uid)
            .ok_or(Error::Parse(ParseError::MissingMessage(uid)))?;

        Ok(Fetch {
            message: position as u32 + 1,
            uid: Some(uid),
            size: Some(message.body.len() as u32),
            flags: if options.flags {
                message.flags.clone()
            } else {
                Vec::new()
            },
            message_id: message.message_id.clone(),
            subject: message.subject.clone(),
            body: if options.body || options.attachments {
                Some(message.body.clone())
            } else {
                None
            },
        })
    }

    fn overview(&mut self) -> Result<Vec<Overview>> {
        self.hang_up_if_due()?;

        let listed = self.overviews;
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.arrivals)
            .into_iter()
            .partition(|(after, _)| *after <= listed);
        self.arrivals = pending;
        self.messages.extend(due.into_iter().map(|(_, m)| m));

        self.overviews += 1;
        Ok(self
            .messages
            .iter()
            .enumerate()
            .map(|(i, m)| Overview {
                uid: m.uid,
                message: i as u32 + 1,
                flags: m.flags.clone(),
            })
            .collect())
    }

    fn expunge(&mut self) -> Result<()> {
        self.hang_up_if_due()?;
        self.messages.retain(|m| !m.flags.contains(&Flag::Deleted));
        self.expunges += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrivals_show_up_in_later_listings() {
        let mut conn =
            MockConnection::new(vec![MockMessage::new(1)]).arrive_after(1, MockMessage::new(2));
        assert_eq!(conn.overview().unwrap().len(), 1);
        let listing = conn.overview().unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[1].uid, 2);
        assert_eq!(listing[1].message, 2);
    }

    #[test]
    fn expunge_drops_deleted() {
        let mut conn = MockConnection::new(vec![
            MockMessage::new(1).flag(Flag::Deleted),
            MockMessage::new(2),
        ]);
        conn.expunge().unwrap();
        let listing = conn.overview().unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].uid, 2);
        assert_eq!(listing[0].message, 1);
    }

    #[test]
    fn close_after_listings() {
        let mut conn = MockConnection::new(vec![MockMessage::new(1)]).close_after(1);
        assert!(conn.is_open());
        conn.overview().unwrap();
        assert!(!conn.is_open());
        // the last listing's messages are still reachable
        assert!(conn.fetch_message(1, &FetchOptions::default()).is_ok());
        match conn.expunge() {
            Err(Error::ConnectionLost) => {}
            other => panic!("expected connection lost, got {:?}", other),
        }
    }

    #[test]
    fn bad_charset_rejection() {
        let mut conn = MockConnection::new(vec![]).accept_charsets(&["US-ASCII"]);
        let err = conn.search("ALL", Some("UTF-8")).unwrap_err();
        assert_eq!(err.bad_charset(), Some(&["US-ASCII".to_string()][..]));
        assert!(conn.search("ALL", Some("us-ascii")).is_ok());
        assert!(conn.search("ALL", None).is_ok());
    }

    #[test]
    fn fetch_honours_options() {
        let mut conn = MockConnection::new(vec![MockMessage::new(3)
            .flag(Flag::Seen)
            .body(b"Subject: x\r\n\r\nhi")]);
        let fetch = conn.fetch_message(3, &FetchOptions::default()).unwrap();
        assert_eq!(fetch.flags(), &[Flag::Seen]);
        assert_eq!(fetch.body(), Some(&b"Subject: x\r\n\r\nhi"[..]));

        let options = FetchOptions {
            body: false,
            attachments: false,
            flags: false,
            ..FetchOptions::default()
        };
        let fetch = conn.fetch_message(3, &options).unwrap();
        assert!(fetch.flags().is_empty());
        assert_eq!(fetch.body(), None);
    }
}
