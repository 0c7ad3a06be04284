//! Building, running and materializing IMAP searches.
//!
//! A [`Query`] borrows a connection for as long as it is used, collects search criteria, and
//! turns the matches into a [`MessageCollection`]:
//!
//! ```no_run
//! # use imap_query::{Query, Session};
//! # fn run(session: &mut Session<std::net::TcpStream>) -> imap_query::error::Result<()> {
//! let messages = Query::new(session)
//!     .unseen()
//!     .subject("invoice")
//!     .since("2024-01-01")?
//!     .limit(10, 1)
//!     .get()?;
//!
//! for (key, message) in messages.iter() {
//!     println!("{}: {:?}", key, message.subject());
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::conn::ImapConnection;
use crate::error::{Error, Result, ValidateError};
use crate::idle::{Event, Watcher};
use crate::message::Message;
use crate::options::{FetchMode, FetchOptions, Options};
use crate::types::Uid;
use crate::utils::iter_join;

mod collection;
mod criteria;
mod paginate;

pub use self::collection::{MessageCollection, MessageKey};
pub use self::criteria::{parse_date, IntoDate, Statement, Value};
pub use self::paginate::Page;

use self::paginate::window;

/// The charset a query starts out with.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// The page size [`Query::paginate`] callers conventionally use.
pub const DEFAULT_PER_PAGE: usize = 5;

/// The page parameter name [`Query::paginate`] callers conventionally use.
pub const DEFAULT_PAGE_NAME: &str = "imap_page";

/// Search criteria against the selected mailbox of one connection.
///
/// Builder methods consume and return the query so they chain; running the query takes
/// `&mut self` and can be repeated, each run searching the server again.
pub struct Query<'c, C: ImapConnection + ?Sized> {
    conn: &'c mut C,
    statements: Vec<Statement>,
    charset: Option<String>,
    fetch: FetchOptions,
    options: Options,
    page: usize,
    limit: Option<usize>,
    events: Option<Sender<Event>>,
}

macro_rules! flag_criteria {
    ($($(#[$doc:meta])* $name:ident => $key:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(self) -> Self {
                self.add_criterion($key, None)
            }
        )*
    };
}

macro_rules! value_criteria {
    ($($(#[$doc:meta])* $name:ident => $key:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name<V: Into<Value>>(self, value: V) -> Self {
                self.add_criterion($key, Some(value.into()))
            }
        )*
    };
}

macro_rules! date_criteria {
    ($($(#[$doc:meta])* $name:ident => $key:expr;)*) => {
        $(
            $(#[$doc])*
            ///
            /// Fails with [`ValidateError::InvalidDate`] if `date` is not a date.
            pub fn $name<D: IntoDate>(self, date: D) -> Result<Self> {
                let date = date.into_date()?;
                Ok(self.add_criterion($key, Some(Value::Date(date))))
            }
        )*
    };
}

impl<'c, C: ImapConnection + ?Sized> Query<'c, C> {
    /// A query with default [`Options`].
    pub fn new(conn: &'c mut C) -> Self {
        Query::with_options(conn, Options::default())
    }

    pub fn with_options(conn: &'c mut C, options: Options) -> Self {
        Query {
            conn,
            statements: Vec::new(),
            charset: Some(DEFAULT_CHARSET.to_string()),
            fetch: options.fetch_options(),
            options,
            page: 1,
            limit: None,
            events: None,
        }
    }

    /// Appends a criterion. Values are encoded right away, dates with the configured
    /// `date_format`.
    ///
    /// The operator is not checked, so any search key the server understands can be used.
    pub fn add_criterion<S: Into<String>>(mut self, operator: S, value: Option<Value>) -> Self {
        let value = value.map(|v| v.encode(&self.options.date_format));
        self.statements.push(Statement::new(operator.into(), value));
        self
    }

    flag_criteria! {
        /// All messages in the mailbox.
        all => "ALL";
        seen => "SEEN";
        unseen => "UNSEEN";
        flagged => "FLAGGED";
        unflagged => "UNFLAGGED";
        answered => "ANSWERED";
        unanswered => "UNANSWERED";
        deleted => "DELETED";
        undeleted => "UNDELETED";
        recent => "RECENT";
        /// Messages that are recent and unseen (the `NEW` key).
        new_messages => "NEW";
        /// Messages that are not recent.
        old => "OLD";
    }

    value_criteria! {
        subject => "SUBJECT";
        from => "FROM";
        to => "TO";
        cc => "CC";
        bcc => "BCC";
        /// Matches the body of the message.
        body => "BODY";
        /// Matches headers and body.
        text => "TEXT";
    }

    date_criteria! {
        /// Messages whose internal date is on or after `date`.
        since => "SINCE";
        /// Messages whose internal date is before `date`.
        before => "BEFORE";
        /// Messages whose internal date is `date`.
        on => "ON";
    }

    /// Messages with the given keyword set. Keywords are atoms and are sent unquoted.
    pub fn keyword(self, keyword: &str) -> Result<Self> {
        validate_atom(keyword)?;
        Ok(self.add_criterion(format!("KEYWORD {}", keyword), None))
    }

    pub fn unkeyword(self, keyword: &str) -> Result<Self> {
        validate_atom(keyword)?;
        Ok(self.add_criterion(format!("UNKEYWORD {}", keyword), None))
    }

    /// Messages larger than `octets`.
    pub fn larger(self, octets: u32) -> Self {
        self.add_criterion(format!("LARGER {}", octets), None)
    }

    /// Messages smaller than `octets`.
    pub fn smaller(self, octets: u32) -> Self {
        self.add_criterion(format!("SMALLER {}", octets), None)
    }

    /// The criteria in the order they were added.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// The raw search string: every statement in insertion order, joined by single spaces.
    pub fn render(&self) -> String {
        iter_join(&self.statements, " ").trim().to_string()
    }

    /// Sets the search charset. `None` leaves the choice to the server.
    pub fn with_charset(mut self, charset: Option<&str>) -> Self {
        self.set_charset(charset.map(String::from));
        self
    }

    pub fn set_charset(&mut self, charset: Option<String>) {
        self.charset = charset;
    }

    /// The charset the next search is sent with. Charset negotiation may change it.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Do not mark fetched messages as read.
    pub fn leave_unread(mut self) -> Self {
        self.fetch.mode = FetchMode::Peek;
        self
    }

    /// Mark fetched messages as read.
    pub fn mark_as_read(mut self) -> Self {
        self.fetch.mode = FetchMode::Consume;
        self
    }

    pub fn fetch_body(mut self, fetch_body: bool) -> Self {
        self.fetch.body = fetch_body;
        self
    }

    pub fn fetch_attachment(mut self, fetch_attachment: bool) -> Self {
        self.fetch.attachments = fetch_attachment;
        self
    }

    pub fn fetch_flags(mut self, fetch_flags: bool) -> Self {
        self.fetch.flags = fetch_flags;
        self
    }

    pub fn set_fetch_options(&mut self, fetch: FetchOptions) {
        self.fetch = fetch;
    }

    pub fn fetch_options(&self) -> &FetchOptions {
        &self.fetch
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Sets the page size and the page to return. A `page` below 1 keeps the current page.
    pub fn limit(mut self, limit: usize, page: usize) -> Self {
        if page >= 1 {
            self.page = page;
        }
        self.set_limit(Some(limit));
        self
    }

    /// Sets the page size. `None` or zero returns every match.
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit.filter(|&l| l > 0);
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    /// The page size, `None` when unbounded.
    pub fn page_size(&self) -> Option<usize> {
        self.limit
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Publishes an [`Event`] for every new message found by [`Query::idle`].
    pub fn with_events(mut self, events: Sender<Event>) -> Self {
        self.set_event_sender(events);
        self
    }

    pub fn set_event_sender(&mut self, events: Sender<Event>) {
        self.events = Some(events);
    }

    /// Runs the search and returns the matching UIDs in the order the server listed them.
    ///
    /// A connection that is already closed fails with [`Error::ConnectionUnavailable`]. Any
    /// error the search itself runs into, including a charset the server keeps rejecting, is
    /// treated as no match. Use [`Query::try_search`] to see those errors.
    pub fn search(&mut self) -> Result<Vec<Uid>> {
        self.conn.check_connection()?;
        match self.execute() {
            Ok(uids) => Ok(uids),
            Err(e) => {
                log::debug!("search {:?} failed, treating as no match: {}", self.render(), e);
                Ok(Vec::new())
            }
        }
    }

    /// Like [`Query::search`], but a failed search is reported as [`Error::SearchFailed`].
    pub fn try_search(&mut self) -> Result<Vec<Uid>> {
        self.conn.check_connection()?;
        self.execute().map_err(|e| Error::SearchFailed(Box::new(e)))
    }

    /// The number of matches. Searches again on every call.
    pub fn count(&mut self) -> Result<usize> {
        self.search().map(|uids| uids.len())
    }

    fn execute(&mut self) -> Result<Vec<Uid>> {
        let mut query = self.render();
        if query.is_empty() {
            query = "ALL".to_string();
        }

        let mut tried: Vec<String> = Vec::new();
        loop {
            let err = match self.conn.search(&query, self.charset.as_deref()) {
                Ok(uids) => return Ok(uids),
                Err(e) => e,
            };

            if let Some(ref charset) = self.charset {
                tried.push(charset.to_ascii_uppercase());
            }
            let next = match err.bad_charset().and_then(|suggested| suggested.first()) {
                Some(next) if !tried.contains(&next.to_ascii_uppercase()) => next.clone(),
                _ => return Err(err),
            };

            log::debug!(
                "server rejected charset {:?}, retrying with {}",
                self.charset,
                next
            );
            self.charset = Some(next);
        }
    }

    /// Searches, pages and fetches the matching messages.
    ///
    /// The collection is keyed by the configured [`KeyStrategy`](crate::KeyStrategy) and holds
    /// only the current page, while [`MessageCollection::total`] reports every match. Any error
    /// while fetching fails the whole call with [`Error::FetchFailed`].
    pub fn get(&mut self) -> Result<MessageCollection> {
        let matches = self.search()?;
        let mut messages = MessageCollection::with_total(matches.len());

        for (position, uid) in window(&matches, self.options.fetch_order, self.page, self.limit) {
            let message = Message::fetch(&mut *self.conn, uid, position, &self.fetch)
                .map_err(|e| Error::FetchFailed(Box::new(e)))?;
            let key = MessageKey::resolve(self.options.message_key, &message);
            messages.insert(key, message);
        }

        Ok(messages)
    }

    /// Returns one page of `per_page` messages.
    ///
    /// The page shown is `page` or the query's current page, whichever is larger.
    pub fn paginate(
        &mut self,
        per_page: usize,
        page: Option<usize>,
        page_name: &str,
    ) -> Result<Page> {
        self.page = page.unwrap_or(0).max(self.page);
        self.set_limit(Some(per_page));
        let items = self.get()?;
        Ok(Page::new(items, per_page, self.page, page_name.to_string()))
    }

    /// Watches the mailbox for new messages until the connection closes.
    ///
    /// Every new message is published to the event sender, if one is set, and then handed to
    /// `callback`. See [`Watcher`] for finer control, including a stop signal.
    pub fn idle(
        &mut self,
        mut callback: Option<&mut dyn FnMut(&Message)>,
        interval: Duration,
    ) -> Result<()> {
        self.conn.check_connection()?;

        let mut watcher = Watcher::new(&mut *self.conn)
            .interval(interval)
            .fetch_options(self.fetch);
        if let Some(ref events) = self.events {
            watcher = watcher.events(events.clone());
        }

        watcher.run(|message| {
            if let Some(callback) = callback.as_mut() {
                callback(message);
            }
        })
    }
}

fn validate_atom(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ValidateError::InvalidCharacter(' ').into());
    }
    match value
        .chars()
        .find(|c| !c.is_ascii_graphic() || "(){%*\"\\]".contains(*c))
    {
        Some(c) => Err(ValidateError::InvalidCharacter(c).into()),
        None => Ok(()),
    }
}
