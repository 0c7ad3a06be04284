//! This module contains the protocol value types a query works with.

/// From section [2.3.1.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.1).
///
/// A 32-bit value assigned to each message, which when used with the unique identifier validity
/// value forms a 64-bit value that will not refer to any other message in the mailbox or any
/// subsequent mailbox with the same name forever. Unique identifiers are assigned in a strictly
/// ascending fashion in the mailbox; as each message is added to the mailbox it is assigned a
/// higher UID than the message(s) which were added previously. Unlike message sequence numbers,
/// unique identifiers are not necessarily contiguous.
///
/// Searches run by a [`Query`](crate::query::Query) report UIDs, and the
/// [`Watcher`](crate::idle::Watcher) tracks the mailbox by UID, since sequence numbers shift
/// whenever a message is expunged.
pub type Uid = u32;

/// From section [2.3.1.2 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.2).
///
/// A relative position from 1 to the number of messages in the mailbox. This position is
/// ordered by ascending unique identifier. Message sequence numbers can be reassigned during the
/// session, for example when a message is permanently removed (expunged) from the mailbox.
pub type Seq = u32;

mod flag;
pub use self::flag::Flag;

mod fetch;
pub use self::fetch::{Fetch, Overview};
