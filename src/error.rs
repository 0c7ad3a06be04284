//! IMAP query error types.

use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
use std::result;
use std::str::Utf8Error;

use crate::types::Uid;

/// A convenience wrapper around `Result` for `imap_query::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A response code sent along with a tagged `NO` or `BAD` completion.
///
/// Only the codes that influence query execution are broken out; see
/// [RFC 3501 section 7.1](https://tools.ietf.org/html/rfc3501#section-7.1).
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ResponseCode {
    /// The server does not support the charset given to `SEARCH`. It may list the charsets it
    /// does support, in order of preference.
    BadCharset(Vec<String>),
    /// The target mailbox does not exist.
    TryCreate,
    /// Any other response code.
    Other,
}

impl<'a> From<imap_proto::ResponseCode<'a>> for ResponseCode {
    fn from(code: imap_proto::ResponseCode<'a>) -> Self {
        use imap_proto::ResponseCode as Proto;

        match code {
            Proto::BadCharset(charsets) => ResponseCode::BadCharset(
                charsets
                    .unwrap_or_default()
                    .into_iter()
                    .map(|c| c.into_owned())
                    .collect(),
            ),
            Proto::TryCreate => ResponseCode::TryCreate,
            _ => ResponseCode::Other,
        }
    }
}

/// A BAD response from the server, which indicates an error message from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Bad {
    /// Human-redable message included with the Bad response.
    pub information: String,
    /// A more specific error status code included with the Bad response.
    pub code: Option<ResponseCode>,
}

impl fmt::Display for Bad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.information)
    }
}

/// A NO response from the server, which indicates an operational error message from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct No {
    /// Human-redable message included with the NO response.
    pub information: String,
    /// A more specific error status code included with the NO response.
    pub code: Option<ResponseCode>,
}

impl fmt::Display for No {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.information)
    }
}

/// A set of errors that can occur while building, running or materializing a query.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An `io::Error` that occurred while trying to read or write to a network stream.
    Io(IoError),
    /// A BAD response from the IMAP server.
    Bad(Bad),
    /// A NO response from the IMAP server.
    No(No),
    /// The connection was terminated unexpectedly.
    ConnectionLost,
    /// The connection is closed and no command can be sent on it.
    ConnectionUnavailable,
    /// Error parsing a server response.
    Parse(ParseError),
    /// Command inputs were not valid.
    Validate(ValidateError),
    /// The server rejected a search and no further charset could be tried.
    SearchFailed(Box<Error>),
    /// Turning matched identifiers into messages failed. Partial results are discarded.
    FetchFailed(Box<Error>),
}

impl Error {
    /// The charsets suggested by the server when it rejected the charset of a search.
    pub fn bad_charset(&self) -> Option<&[String]> {
        let code = match self {
            Error::No(No { code, .. }) | Error::Bad(Bad { code, .. }) => code.as_ref(),
            Error::SearchFailed(e) => return e.bad_charset(),
            _ => None,
        };
        match code {
            Some(ResponseCode::BadCharset(charsets)) => Some(&charsets[..]),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Error {
        Error::Io(err)
    }
}

impl From<ValidateError> for Error {
    fn from(err: ValidateError) -> Error {
        Error::Validate(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref e) => fmt::Display::fmt(e, f),
            Error::Validate(ref e) => fmt::Display::fmt(e, f),
            Error::Parse(ref e) => fmt::Display::fmt(e, f),
            Error::No(ref data) => write!(f, "No Response: {}", data),
            Error::Bad(ref data) => write!(f, "Bad Response: {}", data),
            Error::ConnectionLost => f.write_str("Connection Lost"),
            Error::ConnectionUnavailable => f.write_str("Connection is not available"),
            Error::SearchFailed(ref e) => write!(f, "Search failed: {}", e),
            Error::FetchFailed(ref e) => write!(f, "Failed to fetch messages: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Io(ref e) => Some(e),
            Error::Parse(ParseError::DataNotUtf8(_, ref e)) => Some(e),
            Error::Validate(ref e) => Some(e),
            Error::SearchFailed(ref e) | Error::FetchFailed(ref e) => Some(&**e),
            _ => None,
        }
    }
}

/// An error occured while trying to parse a server response.
#[derive(Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// Indicates an error parsing the status response. Such as OK, NO, and BAD.
    Invalid(Vec<u8>),
    /// The client received data that was not UTF-8 encoded.
    DataNotUtf8(Vec<u8>, Utf8Error),
    /// The tagged completion did not belong to the command that was sent.
    TagMismatch(String),
    /// The server did not return the message that was fetched.
    MissingMessage(Uid),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ParseError::Invalid(_) => f.write_str("Unable to parse status response"),
            ParseError::DataNotUtf8(_, _) => f.write_str("Unable to parse data as UTF-8 text"),
            ParseError::TagMismatch(ref tag) => write!(f, "Unexpected completion tag {}", tag),
            ParseError::MissingMessage(uid) => {
                write!(f, "Server returned no data for message {}", uid)
            }
        }
    }
}

impl StdError for ParseError {}

/// An [invalid character](https://tools.ietf.org/html/rfc3501#section-4.3) was found in a
/// command argument, or a date criterion could not be understood.
#[derive(Debug)]
#[non_exhaustive]
pub enum ValidateError {
    /// A character that cannot appear in a quoted string.
    InvalidCharacter(char),
    /// A value given as a date did not parse into a calendar date.
    InvalidDate {
        /// The input as it was given.
        input: String,
        /// Why the input was rejected.
        cause: chrono::ParseError,
    },
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            // print character in debug form because invalid ones are often whitespaces
            ValidateError::InvalidCharacter(c) => write!(f, "Invalid character in input: {:?}", c),
            ValidateError::InvalidDate { ref input, .. } => {
                write!(f, "Invalid date provided: {:?}", input)
            }
        }
    }
}

impl StdError for ValidateError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            ValidateError::InvalidDate { ref cause, .. } => Some(cause),
            ValidateError::InvalidCharacter(_) => None,
        }
    }
}
