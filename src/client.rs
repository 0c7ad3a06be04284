use bufstream::BufStream;
use imap_proto::{RequestId, Response, Status};
use std::io::{BufRead, Read, Write};
use std::ops::{Deref, DerefMut};

use super::error::{Error, ParseError, Result};
use super::parse::{
    completion_error, parse_expunge, parse_fetches, parse_ids, parse_noop, parse_overview,
};
use super::types::*;
use super::utils::{quote, validate_line};

static TAG_PREFIX: &str = "a";
const INITIAL_TAG: u32 = 0;
const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

fn validate_str(value: &str) -> Result<String> {
    validate_line(value)?;
    Ok(quote(value))
}

/// Charset names are atoms in practice, but anything else is sent as a quoted string.
fn charset_arg(charset: &str) -> Result<String> {
    let is_atom = !charset.is_empty()
        && charset
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.:".contains(c));
    if is_atom {
        Ok(charset.to_string())
    } else {
        validate_str(charset)
    }
}

/// The tagged command stream shared by [`Client`] and [`Session`].
///
/// The stream is closed once the server hangs up, says `BYE`, or the session logs out. A closed
/// connection refuses to send further commands with [`Error::ConnectionUnavailable`].
#[derive(Debug)]
pub struct Connection<T: Read + Write> {
    pub(crate) stream: BufStream<T>,
    tag: u32,
    open: bool,
}

/// An (unauthenticated) handle to talk to an IMAP server.
///
/// Use [`Client::login`] to obtain a [`Session`], which is what queries run against.
#[derive(Debug)]
pub struct Client<T: Read + Write> {
    conn: Connection<T>,
}

/// An authenticated IMAP session providing the commands a query needs.
///
/// A session is not internally synchronized: one [`Query`](crate::query::Query) or
/// [`Watcher`](crate::idle::Watcher) may use it at a time.
#[derive(Debug)]
pub struct Session<T: Read + Write> {
    conn: Connection<T>,
}

impl<T: Read + Write> Deref for Client<T> {
    type Target = Connection<T>;

    fn deref(&self) -> &Connection<T> {
        &self.conn
    }
}

impl<T: Read + Write> DerefMut for Client<T> {
    fn deref_mut(&mut self) -> &mut Connection<T> {
        &mut self.conn
    }
}

impl<T: Read + Write> Deref for Session<T> {
    type Target = Connection<T>;

    fn deref(&self) -> &Connection<T> {
        &self.conn
    }
}

impl<T: Read + Write> DerefMut for Session<T> {
    fn deref_mut(&mut self) -> &mut Connection<T> {
        &mut self.conn
    }
}

impl<T: Read + Write> Client<T> {
    /// Creates a new client over the given (possibly encrypted) stream.
    ///
    /// Call [`Client::read_greeting`] first unless the greeting was already consumed.
    pub fn new(stream: T) -> Client<T> {
        Client {
            conn: Connection::new(stream),
        }
    }

    /// Reads the server greeting line.
    pub fn read_greeting(&mut self) -> Result<Vec<u8>> {
        let mut v = Vec::new();
        self.readline(&mut v)?;
        Ok(v)
    }

    /// Log in to the IMAP server. On failure the client is handed back along with the error.
    pub fn login<U: AsRef<str>, P: AsRef<str>>(
        mut self,
        username: U,
        password: P,
    ) -> ::std::result::Result<Session<T>, (Error, Client<T>)> {
        let command = match (
            validate_str(username.as_ref()),
            validate_str(password.as_ref()),
        ) {
            (Ok(u), Ok(p)) => format!("LOGIN {} {}", u, p),
            (Err(e), _) | (_, Err(e)) => return Err((e, self)),
        };

        match self.run_command_and_check_ok(&command) {
            Ok(()) => Ok(Session { conn: self.conn }),
            Err(e) => Err((e, self)),
        }
    }
}

impl<T: Read + Write> Session<T> {
    /// Wraps a stream that is already in the authenticated state (for example after `PREAUTH`).
    pub fn new(stream: T) -> Session<T> {
        Session {
            conn: Connection::new(stream),
        }
    }

    /// Selects a mailbox; queries then run against it.
    pub fn select<S: AsRef<str>>(&mut self, mailbox_name: S) -> Result<()> {
        let command = format!("SELECT {}", validate_str(mailbox_name.as_ref())?);
        self.run_command_and_read_response(&command)
            .and_then(|lines| parse_noop(&lines))
    }

    /// Searches the selected mailbox and returns the matching UIDs in the order the server
    /// listed them.
    ///
    /// `query` is sent as-is. The charset, when given, goes into the `CHARSET` argument of the
    /// command; `None` omits it so the server applies its default.
    pub fn uid_search<S: AsRef<str>>(
        &mut self,
        query: S,
        charset: Option<&str>,
    ) -> Result<Vec<Uid>> {
        let command = match charset {
            Some(charset) => format!(
                "UID SEARCH CHARSET {} {}",
                charset_arg(charset)?,
                query.as_ref()
            ),
            None => format!("UID SEARCH {}", query.as_ref()),
        };
        self.run_command_and_read_response(&command)
            .and_then(|lines| parse_ids(&lines))
    }

    /// Fetches data items for the messages in `uid_set`.
    pub fn uid_fetch<S1, S2>(&mut self, uid_set: S1, query: S2) -> Result<Vec<Fetch>>
    where
        S1: AsRef<str>,
        S2: AsRef<str>,
    {
        let command = format!("UID FETCH {} {}", uid_set.as_ref(), query.as_ref());
        self.run_command_and_read_response(&command)
            .and_then(|lines| parse_fetches(&lines))
    }

    /// Lists the UID, sequence number and flags of every message in the selected mailbox.
    pub fn overview(&mut self) -> Result<Vec<Overview>> {
        self.run_command_and_read_response("UID FETCH 1:* (UID FLAGS)")
            .and_then(|lines| parse_overview(&lines))
    }

    /// Permanently removes all messages that have the `\Deleted` flag set from the selected
    /// mailbox, and returns the sequence numbers the server reported as expunged.
    pub fn expunge(&mut self) -> Result<Vec<Seq>> {
        self.run_command_and_read_response("EXPUNGE")
            .and_then(|lines| parse_expunge(&lines))
    }

    /// Noop always succeeds, and it does nothing.
    pub fn noop(&mut self) -> Result<()> {
        self.run_command_and_read_response("NOOP")
            .and_then(|lines| parse_noop(&lines))
    }

    /// Logout informs the server that the client is done with the connection.
    pub fn logout(&mut self) -> Result<()> {
        let res = self.run_command_and_check_ok("LOGOUT");
        self.open = false;
        res
    }
}

impl<T: Read + Write> Connection<T> {
    fn new(stream: T) -> Connection<T> {
        Connection {
            stream: BufStream::new(stream),
            tag: INITIAL_TAG,
            open: true,
        }
    }

    /// Whether commands can still be sent.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The underlying stream.
    pub fn get_ref(&self) -> &T {
        self.stream.get_ref()
    }

    /// Runs a command and checks if it returns OK.
    pub fn run_command_and_check_ok(&mut self, command: &str) -> Result<()> {
        self.run_command_and_read_response(command).map(|_| ())
    }

    /// Runs any command passed to it.
    pub fn run_command(&mut self, untagged_command: &str) -> Result<()> {
        if !self.open {
            return Err(Error::ConnectionUnavailable);
        }
        validate_line(untagged_command)?;
        let command = self.create_command(untagged_command);
        if untagged_command.starts_with("LOGIN ") {
            log::trace!("C: {}{} LOGIN <redacted>", TAG_PREFIX, self.tag);
        } else {
            log::trace!("C: {}", command);
        }
        self.write_line(command.as_bytes())
    }

    /// Runs a command and returns the untagged response lines that preceded its completion.
    pub fn run_command_and_read_response(&mut self, untagged_command: &str) -> Result<Vec<u8>> {
        self.run_command(untagged_command)?;
        self.read_response()
    }

    pub(crate) fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut v = Vec::new();
        self.read_response_onto(&mut v)?;
        Ok(v)
    }

    pub(crate) fn read_response_onto(&mut self, data: &mut Vec<u8>) -> Result<()> {
        let mut continue_from = None;
        let mut try_first = !data.is_empty();
        let match_tag = RequestId(format!("{}{}", TAG_PREFIX, self.tag));
        loop {
            let line_start = if try_first {
                try_first = false;
                0
            } else {
                let start_new = data.len();
                self.readline(data)?;
                continue_from.take().unwrap_or(start_new)
            };

            let break_with = {
                let line = &data[line_start..];

                match imap_proto::parser::parse_response(line) {
                    Ok((
                        _,
                        Response::Done {
                            tag,
                            status,
                            code,
                            information,
                            ..
                        },
                    )) => {
                        if tag != match_tag {
                            Some(Err(Error::Parse(ParseError::TagMismatch(tag.0))))
                        } else {
                            Some(match status {
                                Status::Ok => Ok(()),
                                Status::Bad | Status::No => {
                                    Err(completion_error(status, code, information.as_deref()))
                                }
                                _ => Err(Error::Parse(ParseError::Invalid(line.to_vec()))),
                            })
                        }
                    }
                    Ok((
                        _,
                        Response::Data {
                            status: Status::Bye,
                            ..
                        },
                    )) => {
                        // the tagged completion may still follow, e.g. for LOGOUT
                        self.open = false;
                        None
                    }
                    Ok(..) => None,
                    Err(nom::Err::Incomplete(..)) => {
                        continue_from = Some(line_start);
                        None
                    }
                    _ => Some(Err(Error::Parse(ParseError::Invalid(line.to_vec())))),
                }
            };

            match break_with {
                Some(Ok(())) => {
                    data.truncate(line_start);
                    break Ok(());
                }
                Some(Err(e)) => break Err(e),
                None => {}
            }
        }
    }

    pub(crate) fn readline(&mut self, into: &mut Vec<u8>) -> Result<usize> {
        let read = match self.stream.read_until(LF, into) {
            Ok(read) => read,
            Err(e) => {
                self.open = false;
                return Err(Error::Io(e));
            }
        };
        if read == 0 {
            self.open = false;
            return Err(Error::ConnectionLost);
        }

        let len = into.len();
        log::trace!(
            "S: {}",
            String::from_utf8_lossy(&into[len - read..]).trim_end()
        );

        Ok(read)
    }

    fn create_command(&mut self, command: &str) -> String {
        self.tag += 1;
        format!("{}{} {}", TAG_PREFIX, self.tag, command)
    }

    pub(crate) fn write_line(&mut self, buf: &[u8]) -> Result<()> {
        let res = self
            .stream
            .write_all(buf)
            .and_then(|_| self.stream.write_all(&[CR, LF]))
            .and_then(|_| self.stream.flush());
        if let Err(e) = res {
            self.open = false;
            return Err(Error::Io(e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::error::{ResponseCode, ValidateError};
    use super::super::mock_stream::MockStream;
    use super::*;

    fn session(response: &[u8]) -> Session<MockStream> {
        Session::new(MockStream::new(response.to_vec()))
    }

    #[test]
    fn read_response() {
        let response = "a0 OK Logged in.\r\n";
        let mut client = Client::new(MockStream::new(response.as_bytes().to_vec()));
        let actual_response = client.read_response().unwrap();
        assert_eq!(Vec::<u8>::new(), actual_response);
    }

    #[test]
    fn fetch_body() {
        let response = "a0 OK Logged in.\r\n\
                        * 2 FETCH (BODY[TEXT] {3}\r\nfoo)\r\n\
                        a0 OK FETCH completed\r\n";
        let mut client = Client::new(MockStream::new(response.as_bytes().to_vec()));
        client.read_response().unwrap();
        client.read_response().unwrap();
    }

    #[test]
    fn read_greeting() {
        let greeting = "* OK Dovecot ready.\r\n";
        let mut client = Client::new(MockStream::new(greeting.as_bytes().to_vec()));
        assert_eq!(client.read_greeting().unwrap(), greeting.as_bytes());
    }

    #[test]
    fn readline_delay_read() {
        let greeting = "* OK Dovecot ready.\r\n";
        let mock_stream = MockStream::default()
            .with_buf(greeting.as_bytes().to_vec())
            .with_delay();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        client.readline(&mut v).unwrap();
        assert_eq!(greeting, String::from_utf8(v).unwrap());
    }

    #[test]
    fn readline_eof_closes() {
        let mut client = Client::new(MockStream::default().with_eof());
        let mut v = Vec::new();
        match client.readline(&mut v) {
            Err(Error::ConnectionLost) => {}
            other => panic!("EOF read did not return connection lost: {:?}", other),
        }
        assert!(!client.is_open());
    }

    #[test]
    fn readline_err() {
        let mut client = Client::new(MockStream::default().with_err());
        let mut v = Vec::new();
        match client.readline(&mut v) {
            Err(Error::Io(_)) => {}
            other => panic!("expected io error, got {:?}", other),
        }
    }

    #[test]
    fn create_command() {
        let mut client = Client::new(MockStream::default());
        assert_eq!(client.create_command("CHECK"), "a1 CHECK");
        assert_eq!(client.create_command("CHECK"), "a2 CHECK");
    }

    #[test]
    fn login() {
        let response = b"a1 OK Logged in\r\n".to_vec();
        let client = Client::new(MockStream::new(response));
        let session = client.login("username", "password").unwrap();
        assert_eq!(
            session.stream.get_ref().written(),
            "a1 LOGIN \"username\" \"password\"\r\n"
        );
    }

    #[test]
    fn login_failure_returns_client() {
        let response = b"a1 NO Invalid credentials\r\n".to_vec();
        let client = Client::new(MockStream::new(response));
        match client.login("username", "wrong") {
            Err((Error::No(no), client)) => {
                assert_eq!(no.information, "Invalid credentials");
                assert!(client.is_open());
            }
            other => panic!("expected NO, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn logout_closes() {
        let response = b"* BYE Logging out\r\na1 OK Logout completed.\r\n".to_vec();
        let mut session = session(&response);
        session.logout().unwrap();
        assert_eq!(session.stream.get_ref().written(), "a1 LOGOUT\r\n");
        assert!(!session.is_open());
        match session.noop() {
            Err(Error::ConnectionUnavailable) => {}
            other => panic!("closed session sent a command: {:?}", other),
        }
    }

    #[test]
    fn select() {
        let response = b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
            * OK [PERMANENTFLAGS ()] Read-only mailbox.\r\n\
            * 1 EXISTS\r\n\
            * 1 RECENT\r\n\
            * OK [UIDVALIDITY 1257842737] UIDs valid\r\n\
            a1 OK [READ-ONLY] Select completed.\r\n";
        let mut session = session(response);
        session.select("INBOX").unwrap();
        assert_eq!(session.stream.get_ref().written(), "a1 SELECT \"INBOX\"\r\n");
    }

    #[test]
    fn uid_search_with_charset() {
        let response = b"* SEARCH 4 2 9\r\na1 OK Search completed\r\n";
        let mut session = session(response);
        let ids = session
            .uid_search("UNSEEN SUBJECT \"Hello World\"", Some("UTF-8"))
            .unwrap();
        assert_eq!(ids, vec![4, 2, 9]);
        assert_eq!(
            session.stream.get_ref().written(),
            "a1 UID SEARCH CHARSET UTF-8 UNSEEN SUBJECT \"Hello World\"\r\n"
        );
    }

    #[test]
    fn uid_search_without_charset() {
        let response = b"* SEARCH\r\na1 OK Search completed\r\n";
        let mut session = session(response);
        let ids = session.uid_search("ALL", None).unwrap();
        assert!(ids.is_empty());
        assert_eq!(session.stream.get_ref().written(), "a1 UID SEARCH ALL\r\n");
    }

    #[test]
    fn uid_search_bad_charset() {
        let response = b"a1 NO [BADCHARSET (US-ASCII ISO-8859-1)] Unsupported charset\r\n";
        let mut session = session(response);
        let err = session.uid_search("TEXT \"x\"", Some("KOI8-R")).unwrap_err();
        assert_eq!(
            err.bad_charset(),
            Some(&["US-ASCII".to_string(), "ISO-8859-1".to_string()][..])
        );
        match err {
            Error::No(no) => {
                assert_eq!(
                    no.code,
                    Some(ResponseCode::BadCharset(vec![
                        "US-ASCII".to_string(),
                        "ISO-8859-1".to_string()
                    ]))
                );
            }
            e => panic!("expected NO, got {:?}", e),
        }
    }

    #[test]
    fn uid_search_rejects_line_breaks() {
        let mut session = session(b"");
        match session.uid_search("SUBJECT \"a\r\nb\"", None) {
            Err(Error::Validate(ValidateError::InvalidCharacter('\r'))) => {}
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(session.stream.get_ref().written_buf.is_empty());
    }

    #[test]
    fn quoted_charset() {
        assert_eq!(charset_arg("UTF-8").unwrap(), "UTF-8");
        assert_eq!(charset_arg("weird charset").unwrap(), "\"weird charset\"");
    }

    #[test]
    fn bad_response() {
        let response = b"a1 BAD Command unknown\r\n";
        let mut session = session(response);
        match session.noop() {
            Err(Error::Bad(bad)) => assert_eq!(bad.information, "Command unknown"),
            other => panic!("expected BAD, got {:?}", other),
        }
    }

    #[test]
    fn tag_mismatch() {
        let response = b"a7 OK NOOP completed\r\n";
        let mut session = session(response);
        match session.noop() {
            Err(Error::Parse(ParseError::TagMismatch(tag))) => assert_eq!(tag, "a7"),
            other => panic!("expected tag mismatch, got {:?}", other),
        }
    }

    #[test]
    fn uid_fetch() {
        let response = b"* 3 FETCH (UID 12 FLAGS (\\Seen) BODY[] {5}\r\nhello)\r\n\
                         a1 OK FETCH completed\r\n";
        let mut session = session(response);
        let fetches = session.uid_fetch("12", "(UID FLAGS BODY.PEEK[])").unwrap();
        assert_eq!(
            session.stream.get_ref().written(),
            "a1 UID FETCH 12 (UID FLAGS BODY.PEEK[])\r\n"
        );
        assert_eq!(fetches.len(), 1);
        assert_eq!(fetches[0].message, 3);
        assert_eq!(fetches[0].uid, Some(12));
        assert_eq!(fetches[0].body(), Some(&b"hello"[..]));
    }

    #[test]
    fn overview() {
        let response = b"* 1 FETCH (UID 5 FLAGS (\\Seen))\r\n\
                         * 2 FETCH (UID 8 FLAGS ())\r\n\
                         a1 OK FETCH completed\r\n";
        let mut session = session(response);
        let overview = session.overview().unwrap();
        assert_eq!(
            session.stream.get_ref().written(),
            "a1 UID FETCH 1:* (UID FLAGS)\r\n"
        );
        let uids: Vec<Uid> = overview.iter().map(|o| o.uid).collect();
        assert_eq!(uids, vec![5, 8]);
    }

    #[test]
    fn expunge() {
        let response = b"* 2 EXPUNGE\r\n* 4 EXPUNGE\r\na1 OK EXPUNGE completed\r\n";
        let mut session = session(response);
        assert_eq!(session.expunge().unwrap(), vec![2, 4]);
        assert_eq!(session.stream.get_ref().written(), "a1 EXPUNGE\r\n");
    }

    #[test]
    fn connection_lost_mid_response() {
        let response = b"* SEARCH 1 2\r\n";
        let mut session = session(response);
        match session.uid_search("ALL", None) {
            Err(Error::ConnectionLost) => {}
            other => panic!("expected connection lost, got {:?}", other),
        }
        assert!(!session.is_open());
    }
}
