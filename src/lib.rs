//! This crate builds IMAP searches, runs them with charset negotiation, and turns the matches
//! into paginated, uniquely keyed message collections. It can also watch a mailbox for newly
//! arrived messages.
//!
//! Queries run against anything implementing [`ImapConnection`]. The crate ships a synchronous
//! implementation, [`Session`], which speaks the protocol over any `Read + Write` stream. Setting
//! up that stream (TCP, TLS) is left to the caller.
//!
//! # Usage
//!
//! ```no_run
//! use imap_query::{Client, Query};
//! use std::net::TcpStream;
//!
//! fn newest_invoices() -> imap_query::error::Result<()> {
//!     // a plain-text connection, e.g. to a local proxy that terminates TLS
//!     let stream = TcpStream::connect(("127.0.0.1", 143))?;
//!     let mut client = Client::new(stream);
//!     client.read_greeting()?;
//!
//!     let mut session = client.login("me@example.com", "password").map_err(|e| e.0)?;
//!     session.select("INBOX")?;
//!
//!     let options = imap_query::Options {
//!         fetch_order: imap_query::FetchOrder::Desc,
//!         ..Default::default()
//!     };
//!     let page = Query::with_options(&mut session, options)
//!         .unseen()
//!         .subject("invoice")
//!         .leave_unread()
//!         .paginate(10, None, "page")?;
//!
//!     println!("{} unseen invoices", page.total());
//!     for (key, message) in page.items().iter() {
//!         println!("{} {:?}", key, message.subject());
//!     }
//!
//!     session.logout()
//! }
//! ```
//!
//! [`Query::search`] treats search errors as "no match" and only fails when the connection is
//! already closed; [`Query::try_search`] reports them. [`Query::get`] fails with
//! [`Error::FetchFailed`](error::Error::FetchFailed) if any matched message cannot be fetched.
//!
//! # Watching for new mail
//!
//! [`Query::idle`] and [`Watcher`] poll the mailbox and report messages whose UID was not seen
//! before, optionally publishing an [`Event`] per message on an `mpsc` channel.
//!
//! # Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade: wire traffic at `trace`
//! (login credentials are redacted), charset retries and watcher progress at `debug`.

mod parse;
mod utils;

pub mod client;
pub mod conn;
pub mod error;
pub mod idle;
pub mod message;
pub mod options;
pub mod query;
pub mod types;

#[cfg(any(test, feature = "test_helpers"))]
pub mod testing;

#[cfg(test)]
mod mock_stream;

pub use crate::client::{Client, Connection, Session};
pub use crate::conn::ImapConnection;
pub use crate::error::{Error, Result};
pub use crate::idle::{Event, Watcher};
pub use crate::message::Message;
pub use crate::options::{FetchMode, FetchOptions, FetchOrder, KeyStrategy, Options};
pub use crate::query::{MessageCollection, MessageKey, Page, Query, Value};
