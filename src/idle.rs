//! Polling for newly arrived messages.
//!
//! Not every server supports [RFC 2177](https://tools.ietf.org/html/rfc2177) `IDLE`, and those
//! that do still need to be told what "new" means to the application. A [`Watcher`] instead
//! remembers every UID it has seen and periodically lists the mailbox, reporting the UIDs it has
//! not seen before.
//!
//! ```no_run
//! # use imap_query::{idle::{Event, Watcher}, Session};
//! # use std::{sync::mpsc, thread, time::Duration};
//! # fn run(session: &mut Session<std::net::TcpStream>) -> imap_query::error::Result<()> {
//! let (events_tx, events_rx) = mpsc::channel();
//! let (stop_tx, stop_rx) = mpsc::channel();
//!
//! thread::spawn(move || {
//!     for event in events_rx.iter().take(3) {
//!         if let Event::NewMessage(message) = event {
//!             println!("new message {}", message.uid());
//!         }
//!     }
//!     let _ = stop_tx.send(());
//! });
//!
//! Watcher::new(session)
//!     .interval(Duration::from_secs(30))
//!     .events(events_tx)
//!     .stop_on(stop_rx)
//!     .run(|_| {})?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use crate::conn::ImapConnection;
use crate::error::Result;
use crate::message::Message;
use crate::options::FetchOptions;
use crate::types::Uid;

/// How long a watcher waits between polls unless told otherwise.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// A notification published by a [`Watcher`].
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Event {
    /// A message that was not in the mailbox before.
    NewMessage(Message),
}

/// Watches the selected mailbox of a connection for new messages.
///
/// The watcher lists the mailbox once to learn which messages already exist (priming), then
/// repeatedly expunges, lists the mailbox again and reports every UID it has not seen yet.
/// [`Watcher::run`] does this until the connection closes or a stop signal arrives.
pub struct Watcher<'c, C: ImapConnection + ?Sized> {
    conn: &'c mut C,
    known: HashSet<Uid>,
    primed: bool,
    interval: Duration,
    fetch_options: FetchOptions,
    events: Option<Sender<Event>>,
    stop: Option<Receiver<()>>,
}

impl<'c, C: ImapConnection + ?Sized> Watcher<'c, C> {
    pub fn new(conn: &'c mut C) -> Self {
        Watcher {
            conn,
            known: HashSet::new(),
            primed: false,
            interval: DEFAULT_INTERVAL,
            fetch_options: FetchOptions::default(),
            events: None,
            stop: None,
        }
    }

    /// Time to wait between polls.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// What to fetch for new messages.
    pub fn fetch_options(mut self, fetch_options: FetchOptions) -> Self {
        self.fetch_options = fetch_options;
        self
    }

    /// Publishes an [`Event::NewMessage`] for every new message.
    pub fn events(mut self, events: Sender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    /// Stops [`Watcher::run`] when a value is received or the sending side is dropped.
    ///
    /// The signal is checked before every poll and while waiting between polls.
    pub fn stop_on(mut self, stop: Receiver<()>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// The UIDs seen so far.
    pub fn known_uids(&self) -> &HashSet<Uid> {
        &self.known
    }

    /// Records every message currently in the mailbox as known.
    pub fn prime(&mut self) -> Result<()> {
        let overview = self.conn.overview()?;
        self.known.extend(overview.iter().map(|entry| entry.uid));
        self.primed = true;
        log::debug!("watching mailbox with {} known messages", self.known.len());
        Ok(())
    }

    /// Runs one watch iteration and returns the number of new messages.
    ///
    /// New messages are published and then handed to `on_new`, in the order the server listed
    /// them. Primes first if that has not happened yet.
    pub fn poll<F: FnMut(&Message)>(&mut self, mut on_new: F) -> Result<usize> {
        if !self.primed {
            self.prime()?;
        }

        self.conn.expunge()?;
        let overview = self.conn.overview()?;

        let mut found = 0;
        for (position, entry) in overview.iter().enumerate() {
            if !self.known.insert(entry.uid) {
                continue;
            }
            found += 1;

            let message =
                Message::fetch(&mut *self.conn, entry.uid, position, &self.fetch_options)?;
            self.publish(&message);
            on_new(&message);
        }

        log::debug!("poll found {} new messages", found);
        Ok(found)
    }

    /// Polls until the connection closes or the stop signal fires.
    ///
    /// An error raised once the connection has closed ends the loop normally. Errors while it
    /// is still open are returned.
    pub fn run<F: FnMut(&Message)>(mut self, mut on_new: F) -> Result<()> {
        while self.conn.is_open() {
            if self.stop_requested() {
                break;
            }

            if let Err(e) = self.poll(&mut on_new) {
                if self.conn.is_open() {
                    return Err(e);
                }
                log::debug!("connection closed while watching: {}", e);
                break;
            }

            if !self.conn.is_open() || self.wait() {
                break;
            }
        }
        Ok(())
    }

    fn publish(&mut self, message: &Message) {
        if let Some(ref events) = self.events {
            if events.send(Event::NewMessage(message.clone())).is_err() {
                log::warn!("event receiver is gone, no longer publishing new messages");
                self.events = None;
            }
        }
    }

    fn stop_requested(&self) -> bool {
        match self.stop {
            Some(ref stop) => !matches!(stop.try_recv(), Err(TryRecvError::Empty)),
            None => false,
        }
    }

    /// Sleeps for the interval. Returns whether a stop was requested meanwhile.
    fn wait(&self) -> bool {
        match self.stop {
            Some(ref stop) => !matches!(
                stop.recv_timeout(self.interval),
                Err(RecvTimeoutError::Timeout)
            ),
            None => {
                thread::sleep(self.interval);
                false
            }
        }
    }
}
