use imap_proto::{AttributeValue, MailboxDatum, Response, Status};
use lazy_static::lazy_static;
use regex::Regex;

use super::error::{Bad, Error, No, ParseError, ResponseCode, Result};
use super::types::*;

lazy_static! {
    static ref BADCHARSET_RE: Regex = Regex::new(r"\[BADCHARSET(?: \(([^)]*)\))?\]").unwrap();
}

enum MapOrNot<T> {
    Map(T),
    Not,
}

fn parse_many<T, F>(mut lines: &[u8], mut map: F) -> Result<Vec<T>>
where
    F: FnMut(Response<'_>) -> Result<MapOrNot<T>>,
{
    let mut things = Vec::new();
    loop {
        if lines.is_empty() {
            break Ok(things);
        }

        match imap_proto::parser::parse_response(lines) {
            Ok((rest, resp)) => {
                lines = rest;

                if let MapOrNot::Map(t) = map(resp)? {
                    things.push(t);
                }
            }
            _ => {
                break Err(Error::Parse(ParseError::Invalid(lines.to_vec())));
            }
        }
    }
}

/// Parses the untagged `SEARCH` responses of a search, keeping the order the server reported.
pub fn parse_ids(lines: &[u8]) -> Result<Vec<Uid>> {
    let ids = parse_many(lines, |resp| match resp {
        Response::MailboxData(MailboxDatum::Search(ids)) => Ok(MapOrNot::Map(ids)),
        resp => unilateral(resp).map(|_| MapOrNot::Not),
    })?;
    Ok(ids.into_iter().flatten().collect())
}

pub fn parse_fetches(lines: &[u8]) -> Result<Vec<Fetch>> {
    parse_many(lines, |resp| match resp {
        Response::Fetch(num, attrs) => {
            let mut fetch = Fetch {
                message: num,
                ..Fetch::default()
            };

            for attr in attrs {
                match attr {
                    AttributeValue::Uid(uid) => fetch.uid = Some(uid),
                    AttributeValue::Rfc822Size(sz) => fetch.size = Some(sz),
                    AttributeValue::Flags(flags) => {
                        fetch
                            .flags
                            .extend(flags.into_iter().map(|f| Flag::from(f.into_owned())));
                    }
                    AttributeValue::Envelope(env) => {
                        fetch.message_id = env.message_id.as_deref().map(lossy);
                        fetch.subject = env.subject.as_deref().map(lossy);
                    }
                    AttributeValue::BodySection { data, .. } | AttributeValue::Rfc822(data) => {
                        fetch.body = data.map(|d| d.into_owned());
                    }
                    _ => {}
                }
            }

            Ok(MapOrNot::Map(fetch))
        }
        resp => unilateral(resp).map(|_| MapOrNot::Not),
    })
}

/// Parses a lightweight `UID FETCH 1:* (UID FLAGS)` listing.
pub fn parse_overview(lines: &[u8]) -> Result<Vec<Overview>> {
    let overview = parse_fetches(lines)?
        .into_iter()
        // unsolicited flag updates may arrive without a UID
        .filter_map(|fetch| {
            Some(Overview {
                uid: fetch.uid?,
                message: fetch.message,
                flags: fetch.flags,
            })
        })
        .collect();
    Ok(overview)
}

pub fn parse_expunge(lines: &[u8]) -> Result<Vec<Seq>> {
    parse_many(lines, |resp| match resp {
        Response::Expunge(id) => Ok(MapOrNot::Map(id)),
        resp => unilateral(resp).map(|_| MapOrNot::Not),
    })
}

pub fn parse_noop(lines: &[u8]) -> Result<()> {
    parse_many(lines, |resp| unilateral(resp).map(|_| MapOrNot::<()>::Not)).map(|_| ())
}

/// Builds the error for a tagged `NO` or `BAD` completion.
///
/// `imap-proto` reports `[BADCHARSET ...]` as a structured code when the server puts it first in
/// the response text. Some servers embed it later in the text instead, so the text is scanned
/// when no code was parsed.
pub(crate) fn completion_error(
    status: Status,
    code: Option<imap_proto::ResponseCode<'_>>,
    information: Option<&str>,
) -> Error {
    let information = information.unwrap_or("no explanation given").to_string();
    let code = code
        .map(ResponseCode::from)
        .or_else(|| bad_charset_in_text(&information).map(ResponseCode::BadCharset));

    match status {
        Status::Bad => Error::Bad(Bad { information, code }),
        _ => Error::No(No { information, code }),
    }
}

fn bad_charset_in_text(information: &str) -> Option<Vec<String>> {
    let caps = BADCHARSET_RE.captures(information)?;
    Some(
        caps.get(1)
            .map(|list| list.as_str().split_whitespace().map(String::from).collect())
            .unwrap_or_default(),
    )
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// check if this is simply a unilateral server response
// (see Section 7 of RFC 3501):
fn unilateral(res: Response<'_>) -> Result<()> {
    match res {
        Response::MailboxData(MailboxDatum::Exists(n)) => log::trace!("unilateral EXISTS {}", n),
        Response::MailboxData(MailboxDatum::Recent(n)) => log::trace!("unilateral RECENT {}", n),
        Response::MailboxData(_) => log::trace!("unilateral mailbox data"),
        Response::Expunge(n) => log::trace!("unilateral EXPUNGE {}", n),
        Response::Fetch(n, _) => log::trace!("unilateral FETCH for {}", n),
        Response::Data {
            status,
            information,
            ..
        } => log::trace!("untagged {:?}: {}", status, information.unwrap_or_default()),
        Response::Capabilities(_) => log::trace!("unilateral CAPABILITY"),
        res => {
            return Err(Error::Parse(ParseError::Invalid(
                format!("{:?}", res).into_bytes(),
            )));
        }
    }
    Ok(())
}
