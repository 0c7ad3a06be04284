use super::{Flag, Seq, Uid};

/// An IMAP [`FETCH` response](https://tools.ietf.org/html/rfc3501#section-7.4.2) that contains
/// data about a particular message, copied out of the server response.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Fetch {
    /// The ordinal number of this message in its containing mailbox.
    pub message: Seq,

    /// A number expressing the unique identifier of the message.
    pub uid: Option<Uid>,

    /// A number expressing the [RFC-2822](https://tools.ietf.org/html/rfc2822) size of the
    /// message.
    pub size: Option<u32>,

    pub(crate) flags: Vec<Flag<'static>>,
    pub(crate) message_id: Option<String>,
    pub(crate) subject: Option<String>,
    pub(crate) body: Option<Vec<u8>>,
}

impl Fetch {
    /// A list of flags that are set for this message.
    pub fn flags(&self) -> &[Flag<'static>] {
        &self.flags[..]
    }

    /// The `Message-ID` from the envelope, if `ENVELOPE` was fetched and the message has one.
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// The raw `Subject` from the envelope.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// The full message, if `BODY[]` or `BODY.PEEK[]` was fetched.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// A lightweight listing entry for one message in the selected mailbox.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Overview {
    /// The unique identifier of the message.
    pub uid: Uid,
    /// The sequence number of the message at the time of the listing.
    pub message: Seq,
    /// Flags set on the message.
    pub flags: Vec<Flag<'static>>,
}
