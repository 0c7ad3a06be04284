//! Query configuration.
//!
//! [`Options`] mirrors the `options` block an application keeps in its own configuration, and
//! derives `serde` so it can be read with whatever configuration stack the application uses:
//!
//! ```
//! let options: imap_query::Options = serde_json::from_str(r#"{
//!     "fetch": "peek",
//!     "fetch_order": "desc",
//!     "message_key": "list"
//! }"#).unwrap();
//! assert_eq!(options.fetch_order, imap_query::FetchOrder::Desc);
//! assert!(options.fetch_body);
//! ```

use serde::{Deserialize, Serialize};

use crate::utils::iter_join;

/// The date pattern used for date criteria unless configured otherwise, producing the
/// `date` form of [RFC 3501](https://tools.ietf.org/html/rfc3501#section-9) (`01-Feb-2024`).
pub const DEFAULT_DATE_FORMAT: &str = "%d-%b-%Y";

/// Whether fetching a message marks it as read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Leave the `\Seen` flag alone (`BODY.PEEK[]`).
    Peek,
    /// Mark fetched messages as read (`BODY[]`).
    #[default]
    Consume,
}

/// How the messages of a result collection are keyed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// The message sequence number.
    Number,
    /// The position of the message in the server's search listing.
    List,
    /// The `Message-ID` header, falling back to the sequence number when it is missing.
    #[default]
    MessageId,
}

/// The order in which matches are paginated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOrder {
    /// The order the server reported, normally ascending UID.
    #[default]
    Asc,
    /// The server's order, reversed.
    Desc,
}

/// What to retrieve for every message a query materializes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Peek or consume.
    pub mode: FetchMode,
    /// Retrieve the message body.
    pub body: bool,
    /// Retrieve what is needed to decode attachments.
    pub attachments: bool,
    /// Retrieve the message flags.
    pub flags: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            mode: FetchMode::default(),
            body: true,
            attachments: true,
            flags: true,
        }
    }
}

impl FetchOptions {
    /// The parenthesized list of `FETCH` data items these options ask for.
    pub fn fetch_items(&self) -> String {
        let mut items = vec!["UID", "ENVELOPE", "RFC822.SIZE"];
        if self.flags {
            items.push("FLAGS");
        }
        if self.body || self.attachments {
            items.push(match self.mode {
                FetchMode::Peek => "BODY.PEEK[]",
                FetchMode::Consume => "BODY[]",
            });
        }
        format!("({})", iter_join(items, " "))
    }
}

/// Configuration shared by the queries of an application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Peek or consume when fetching.
    pub fetch: FetchMode,
    /// Retrieve message bodies.
    pub fetch_body: bool,
    /// Retrieve attachments.
    pub fetch_attachment: bool,
    /// Retrieve flags.
    pub fetch_flags: bool,
    /// `strftime` pattern used to render date criteria.
    pub date_format: String,
    /// How result collections are keyed.
    pub message_key: KeyStrategy,
    /// Pagination order.
    pub fetch_order: FetchOrder,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            fetch: FetchMode::default(),
            fetch_body: true,
            fetch_attachment: true,
            fetch_flags: true,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            message_key: KeyStrategy::default(),
            fetch_order: FetchOrder::default(),
        }
    }
}

impl Options {
    /// The fetch configuration a new query starts out with.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            mode: self.fetch,
            body: self.fetch_body,
            attachments: self.fetch_attachment,
            flags: self.fetch_flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::default();
        assert_eq!(options.fetch, FetchMode::Consume);
        assert_eq!(options.message_key, KeyStrategy::MessageId);
        assert_eq!(options.fetch_order, FetchOrder::Asc);
        assert_eq!(options.date_format, "%d-%b-%Y");
        assert_eq!(options.fetch_options(), FetchOptions::default());
    }

    #[test]
    fn deserialize_partial() {
        let options: Options = serde_json::from_str(
            r#"{"fetch": "peek", "fetch_body": false, "message_key": "number"}"#,
        )
        .unwrap();
        assert_eq!(options.fetch, FetchMode::Peek);
        assert!(!options.fetch_body);
        assert!(options.fetch_attachment);
        assert_eq!(options.message_key, KeyStrategy::Number);
        assert_eq!(options.fetch_order, FetchOrder::Asc);
    }

    #[test]
    fn deserialize_rejects_unknown_order() {
        let res: Result<Options, _> = serde_json::from_str(r#"{"fetch_order": "random"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn fetch_items_follow_options() {
        let mut options = FetchOptions::default();
        assert_eq!(
            options.fetch_items(),
            "(UID ENVELOPE RFC822.SIZE FLAGS BODY[])"
        );

        options.mode = FetchMode::Peek;
        assert_eq!(
            options.fetch_items(),
            "(UID ENVELOPE RFC822.SIZE FLAGS BODY.PEEK[])"
        );

        options.body = false;
        options.attachments = false;
        options.flags = false;
        assert_eq!(options.fetch_items(), "(UID ENVELOPE RFC822.SIZE)");
    }
}
