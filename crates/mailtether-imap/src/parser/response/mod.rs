//! IMAP response parser.
//!
//! Parses one complete response unit (a line plus any inline literals)
//! according to the RFC 3501 grammar.

#![allow(clippy::missing_errors_doc)]

mod body;
mod fetch;
mod helpers;
mod types;

pub use types::{
    Address, BodyExtension, BodyFields, BodyStructure, ContentDisposition, ContinuationRequest,
    Envelope, FetchItem, IdParams, Response, ResponseText, TaggedResponse, UntaggedResponse,
};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{SeqNum, Status, Tag};
use crate::{Error, Result};

use helpers::{
    parse_acl_response, parse_capability_data, parse_flag_list, parse_id_response,
    parse_list_response, parse_namespace_response, parse_resp_text, parse_search_response,
    parse_status_response, read_text_until_crlf,
};

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response unit.
    ///
    /// Errors are [`Error::ResponseParse`] carrying the byte position, the
    /// offending fragment and, once known, the response name.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => Self::parse_continuation(&mut lexer),
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            Token::Number(n) => Self::parse_tagged(&mut lexer, &n.to_string()),
            token => Err(Error::ResponseParse {
                position: 0,
                message: format!("Expected *, +, or tag, got {token:?}"),
                response: None,
                fragment: String::from_utf8_lossy(&input[..input.len().min(24)]).into_owned(),
            }),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;
        let status = Status::parse(lexer.read_atom_string()?);

        let text = if lexer.eat(b' ') {
            parse_resp_text(lexer)
        } else {
            read_text_until_crlf(lexer).map(|text| ResponseText { code: None, text })
        }
        .map_err(|e| with_response(e, status.as_str()))?;

        Ok(Response::Tagged(TaggedResponse {
            tag: Tag::new(tag),
            status,
            text,
        }))
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let untagged = match lexer.next_token()? {
            Token::Atom(name) => {
                let upper = name.to_ascii_uppercase();
                Self::parse_named(lexer, &upper).map_err(|e| with_response(e, &upper))?
            }
            Token::Number(n) => {
                lexer.expect_space()?;
                let upper = lexer.read_atom_string()?.to_ascii_uppercase();
                Self::parse_numbered(lexer, n, &upper).map_err(|e| with_response(e, &upper))?
            }
            token => {
                return Err(lexer.error(&format!(
                    "Unexpected token in untagged response: {token:?}"
                )));
            }
        };

        Ok(Response::Untagged(untagged))
    }

    fn parse_named(lexer: &mut Lexer<'_>, name: &str) -> Result<UntaggedResponse> {
        let status_text = |lexer: &mut Lexer<'_>| -> Result<ResponseText> {
            if lexer.eat(b' ') {
                parse_resp_text(lexer)
            } else {
                read_text_until_crlf(lexer).map(|text| ResponseText { code: None, text })
            }
        };

        let response = match name {
            "OK" => UntaggedResponse::Ok(status_text(lexer)?),
            "NO" => UntaggedResponse::No(status_text(lexer)?),
            "BAD" => UntaggedResponse::Bad(status_text(lexer)?),
            "PREAUTH" => UntaggedResponse::PreAuth(status_text(lexer)?),
            "BYE" => UntaggedResponse::Bye(status_text(lexer)?),
            "CAPABILITY" => {
                let caps = parse_capability_data(lexer);
                lexer.expect_crlf()?;
                UntaggedResponse::Capability(caps)
            }
            "ENABLED" => {
                let caps = parse_capability_data(lexer);
                lexer.expect_crlf()?;
                UntaggedResponse::Enabled(caps)
            }
            "FLAGS" => {
                lexer.expect_space()?;
                let flags = parse_flag_list(lexer)?;
                lexer.expect_crlf()?;
                UntaggedResponse::Flags(flags)
            }
            "LIST" | "LSUB" | "XLIST" => {
                lexer.expect_space()?;
                let list = parse_list_response(lexer)?;
                lexer.expect_crlf()?;
                match name {
                    "LIST" => UntaggedResponse::List(list),
                    "LSUB" => UntaggedResponse::Lsub(list),
                    _ => UntaggedResponse::Xlist(list),
                }
            }
            "SEARCH" => {
                let (ids, modseq) = parse_search_response(lexer)?;
                lexer.expect_crlf()?;
                UntaggedResponse::Search { ids, modseq }
            }
            "STATUS" => {
                lexer.expect_space()?;
                let status = parse_status_response(lexer)?;
                lexer.expect_crlf()?;
                UntaggedResponse::Status(status)
            }
            "NAMESPACE" => {
                lexer.expect_space()?;
                let namespaces = parse_namespace_response(lexer)?;
                lexer.expect_crlf()?;
                UntaggedResponse::Namespace(namespaces)
            }
            "ACL" => {
                lexer.expect_space()?;
                let entries = parse_acl_response(lexer)?;
                lexer.expect_crlf()?;
                UntaggedResponse::Acl(entries)
            }
            "ID" => {
                lexer.expect_space()?;
                let params = parse_id_response(lexer)?;
                lexer.expect_crlf()?;
                UntaggedResponse::Id(params)
            }
            _ => {
                lexer.eat(b' ');
                UntaggedResponse::Ignored {
                    name: name.to_string(),
                    text: read_text_until_crlf(lexer)?,
                }
            }
        };

        Ok(response)
    }

    fn parse_numbered(lexer: &mut Lexer<'_>, n: u64, name: &str) -> Result<UntaggedResponse> {
        let n = u32::try_from(n).map_err(|_| lexer.error(&format!("Number out of range: {n}")))?;
        let response = match name {
            "EXISTS" => UntaggedResponse::Exists(n),
            "RECENT" => UntaggedResponse::Recent(n),
            "EXPUNGE" => {
                let seq = SeqNum::new(n).ok_or_else(|| lexer.error("Invalid sequence number 0"))?;
                UntaggedResponse::Expunge(seq)
            }
            "FETCH" => {
                let seq = SeqNum::new(n).ok_or_else(|| lexer.error("Invalid sequence number 0"))?;
                lexer.expect_space()?;
                let items = fetch::parse_fetch_response(lexer, seq)?;
                UntaggedResponse::Fetch { seq, items }
            }
            _ => return Err(lexer.error(&format!("Unknown message data: {name}"))),
        };
        lexer.expect_crlf()?;
        Ok(response)
    }

    fn parse_continuation(lexer: &mut Lexer<'_>) -> Result<Response> {
        let text = if lexer.eat(b' ') {
            parse_resp_text(lexer)?
        } else {
            ResponseText {
                code: None,
                text: read_text_until_crlf(lexer)?,
            }
        };
        Ok(Response::Continuation(ContinuationRequest { text }))
    }
}

/// Attaches the response name to a parse error.
fn with_response(err: Error, name: &str) -> Error {
    match err {
        Error::ResponseParse {
            position,
            message,
            response: None,
            fragment,
        } => Error::ResponseParse {
            position,
            message,
            response: Some(name.to_string()),
            fragment,
        },
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Capability, Flag, MailboxAttribute, ResponseCode, StatusItem};

    fn untagged(input: &[u8]) -> UntaggedResponse {
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(u) => u,
            other => panic!("Expected untagged response, got {other:?}"),
        }
    }

    mod status_tests {
        use super::*;

        #[test]
        fn untagged_ok() {
            match untagged(b"* OK IMAP4rev1 server ready\r\n") {
                UntaggedResponse::Ok(text) => {
                    assert!(text.code.is_none());
                    assert_eq!(text.text, "IMAP4rev1 server ready");
                }
                other => panic!("Expected untagged OK, got {other:?}"),
            }
        }

        #[test]
        fn tagged_ok() {
            match ResponseParser::parse(b"A001 OK LOGIN completed\r\n").unwrap() {
                Response::Tagged(tagged) => {
                    assert_eq!(tagged.tag.as_str(), "A001");
                    assert_eq!(tagged.status, Status::Ok);
                    assert!(tagged.code().is_none());
                    assert_eq!(tagged.text.text, "LOGIN completed");
                }
                other => panic!("Expected tagged response, got {other:?}"),
            }
        }

        #[test]
        fn tagged_unknown_status() {
            match ResponseParser::parse(b"A0001 BUG unhandled command\r\n").unwrap() {
                Response::Tagged(tagged) => {
                    assert_eq!(tagged.status, Status::Other("BUG".to_string()));
                }
                other => panic!("Expected tagged response, got {other:?}"),
            }
        }

        #[test]
        fn tagged_without_text() {
            match ResponseParser::parse(b"A2 OK\r\n").unwrap() {
                Response::Tagged(tagged) => assert_eq!(tagged.text.text, ""),
                other => panic!("Expected tagged response, got {other:?}"),
            }
        }

        #[test]
        fn response_code_in_ok() {
            match untagged(b"* OK [UIDVALIDITY 1234567890] UIDs valid\r\n") {
                UntaggedResponse::Ok(text) => {
                    match text.code {
                        Some(ResponseCode::UidValidity(v)) => assert_eq!(v.get(), 1_234_567_890),
                        other => panic!("Expected UIDVALIDITY code, got {other:?}"),
                    }
                    assert_eq!(text.text, "UIDs valid");
                }
                other => panic!("Expected untagged OK, got {other:?}"),
            }
        }

        #[test]
        fn text_starting_with_bracket() {
            match ResponseParser::parse(b"A3 OK [READ-WRITE] [Gmail]/Sent Mail selected.\r\n")
                .unwrap()
            {
                Response::Tagged(tagged) => {
                    assert_eq!(tagged.code(), Some(&ResponseCode::ReadWrite));
                    assert_eq!(tagged.text.text, "[Gmail]/Sent Mail selected.");
                }
                other => panic!("Expected tagged response, got {other:?}"),
            }
        }

        #[test]
        fn bye() {
            match untagged(b"* BYE Autologout; idle for too long\r\n") {
                UntaggedResponse::Bye(text) => {
                    assert_eq!(text.text, "Autologout; idle for too long");
                }
                other => panic!("Expected BYE, got {other:?}"),
            }
        }
    }

    mod data_tests {
        use super::*;

        #[test]
        fn capability_with_trailing_space() {
            let input = b"* CAPABILITY st11p00mm-iscream009 1Q49 XAPPLEPUSHSERVICE IMAP4 IMAP4rev1 SASL-IR AUTH=ATOKEN AUTH=PLAIN \r\n";
            match untagged(input) {
                UntaggedResponse::Capability(caps) => {
                    assert!(caps.contains(&Capability::Imap4Rev1));
                    assert_eq!(caps.last(), Some(&Capability::Auth("PLAIN".to_string())));
                }
                other => panic!("Expected capability response, got {other:?}"),
            }
        }

        #[test]
        fn exists() {
            assert_eq!(untagged(b"* 23 EXISTS\r\n"), UntaggedResponse::Exists(23));
        }

        #[test]
        fn flags() {
            match untagged(b"* FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft)\r\n") {
                UntaggedResponse::Flags(flags) => {
                    assert!(flags.contains(&Flag::Seen));
                    assert!(flags.contains(&Flag::Draft));
                }
                other => panic!("Expected FLAGS, got {other:?}"),
            }
        }

        #[test]
        fn list() {
            match untagged(b"* LIST (\\HasChildren) \"/\" \"INBOX\"\r\n") {
                UntaggedResponse::List(list) => {
                    assert!(list.attributes.contains(&MailboxAttribute::HasChildren));
                    assert_eq!(list.delimiter, Some('/'));
                    assert_eq!(list.mailbox.as_str(), "INBOX");
                }
                other => panic!("Expected LIST, got {other:?}"),
            }
        }

        #[test]
        fn xlist_and_lsub() {
            assert_eq!(
                untagged(b"* XLIST (\\Inbox) \".\" INBOX\r\n").name(),
                "XLIST"
            );
            assert_eq!(
                untagged(b"* LSUB () \".\" #news.comp.mail.misc\r\n").name(),
                "LSUB"
            );
        }

        #[test]
        fn status_with_trailing_space() {
            match untagged(b"* STATUS INBOX (UIDNEXT 1 UIDVALIDITY 1234) \r\n") {
                UntaggedResponse::Status(status) => {
                    assert_eq!(status.mailbox.as_str(), "INBOX");
                    assert!(status.items.contains(&StatusItem::UidValidity(1234)));
                }
                other => panic!("Expected STATUS, got {other:?}"),
            }
        }

        #[test]
        fn search_empty_and_modseq() {
            assert_eq!(
                untagged(b"* SEARCH\r\n"),
                UntaggedResponse::Search {
                    ids: Vec::new(),
                    modseq: None
                }
            );
            assert_eq!(
                untagged(b"* SEARCH 87216 87221 (MODSEQ 7667567)\r\n"),
                UntaggedResponse::Search {
                    ids: vec![87216, 87221],
                    modseq: Some(7_667_567)
                }
            );
        }

        #[test]
        fn acl() {
            match untagged(
                b"* ACL \"INBOX/share\" \"imshare2copy1366146467@example.com\" lrswickxteda\r\n",
            ) {
                UntaggedResponse::Acl(entries) => {
                    assert_eq!(entries.len(), 1);
                    assert_eq!(entries[0].mailbox.as_str(), "INBOX/share");
                    assert_eq!(entries[0].user, "imshare2copy1366146467@example.com");
                    assert_eq!(entries[0].rights, "lrswickxteda");
                }
                other => panic!("Expected ACL, got {other:?}"),
            }
        }

        #[test]
        fn id_nil_and_values() {
            assert_eq!(untagged(b"* ID NIL\r\n"), UntaggedResponse::Id(None));
            match untagged(
                b"* ID (\"name\" \"GImap\" \"vendor\" \"Google, Inc.\" \"support-url\" NIL)\r\n",
            ) {
                UntaggedResponse::Id(Some(params)) => {
                    assert_eq!(params["name"].as_deref(), Some("GImap"));
                    assert_eq!(params["vendor"].as_deref(), Some("Google, Inc."));
                    assert_eq!(params.get("support-url"), Some(&None));
                }
                other => panic!("Expected ID, got {other:?}"),
            }
        }

        #[test]
        fn enabled() {
            assert_eq!(
                untagged(b"* ENABLED CONDSTORE\r\n"),
                UntaggedResponse::Enabled(vec![Capability::CondStore])
            );
        }

        #[test]
        fn unknown_response_is_ignored() {
            match untagged(b"* NOOP\r\n") {
                UntaggedResponse::Ignored { name, text } => {
                    assert_eq!(name, "NOOP");
                    assert_eq!(text, "");
                }
                other => panic!("Expected ignored response, got {other:?}"),
            }
        }
    }

    mod fetch_tests {
        use super::*;

        #[test]
        fn fetch_flags_and_uid() {
            match untagged(b"* 1 FETCH (FLAGS (\\Seen) UID 12345)\r\n") {
                UntaggedResponse::Fetch { seq, items } => {
                    assert_eq!(seq.get(), 1);
                    assert!(items
                        .iter()
                        .any(|i| matches!(i, FetchItem::Uid(uid) if uid.get() == 12345)));
                }
                other => panic!("Expected FETCH, got {other:?}"),
            }
        }

        #[test]
        fn fetch_header_literal_then_bodystructure() {
            let input = b"* 29021 FETCH (RFC822.SIZE 3162 UID 113622 RFC822.HEADER {14}\r\nSubject: x\r\n\r\n BODYSTRUCTURE ((\"text\" \"plain\" (\"charset\" \"us-ascii\") NIL \"Notification\" \"7bit\" 510 14 NIL NIL NIL NIL)(\"message\" \"delivery-status\" NIL NIL \"Delivery report\" \"7bit\" 410 NIL NIL NIL NIL) \"report\" (\"report-type\" \"delivery-status\") NIL NIL NIL))\r\n";
            match untagged(input) {
                UntaggedResponse::Fetch { items, .. } => {
                    assert_eq!(
                        items[2],
                        FetchItem::Rfc822Header(Some(b"Subject: x\r\n\r\n".to_vec()))
                    );
                    match &items[3] {
                        FetchItem::BodyStructure(body) => {
                            let status = &body.parts()[1];
                            assert_eq!(status.media_type(), "MESSAGE");
                            assert_eq!(status.subtype(), "DELIVERY-STATUS");
                        }
                        other => panic!("Expected BODYSTRUCTURE, got {other:?}"),
                    }
                }
                other => panic!("Expected FETCH, got {other:?}"),
            }
        }

        #[test]
        fn fetch_body_mixed() {
            match untagged(b"* 1038 FETCH (BODY (\"MIXED\"))\r\n") {
                UntaggedResponse::Fetch { items, .. } => match &items[0] {
                    FetchItem::Body(body) => assert_eq!(body.subtype(), "MIXED"),
                    other => panic!("Expected BODY, got {other:?}"),
                },
                other => panic!("Expected FETCH, got {other:?}"),
            }
        }
    }

    mod continuation_tests {
        use super::*;

        #[test]
        fn with_text() {
            match ResponseParser::parse(b"+ Ready for literal\r\n").unwrap() {
                Response::Continuation(cont) => assert_eq!(cont.text.text, "Ready for literal"),
                other => panic!("Expected continuation, got {other:?}"),
            }
        }

        #[test]
        fn bare_plus() {
            match ResponseParser::parse(b"+\r\n").unwrap() {
                Response::Continuation(cont) => assert_eq!(cont.text.text, ""),
                other => panic!("Expected continuation, got {other:?}"),
            }
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn unknown_fetch_attribute_reports_context() {
            let err = ResponseParser::parse(b"* 123 FETCH (UNKNOWN 92)\r\n").unwrap_err();
            match &err {
                Error::ResponseParse {
                    message, response, ..
                } => {
                    assert!(message.ends_with(" for {123}"));
                    assert_eq!(response.as_deref(), Some("FETCH"));
                }
                other => panic!("Expected parse error, got {other:?}"),
            }
            assert!(err.to_string().contains(" for {123}"));
        }

        #[test]
        fn garbage_line() {
            assert!(matches!(
                ResponseParser::parse(b")garbage\r\n"),
                Err(Error::ResponseParse { .. })
            ));
        }

        #[test]
        fn unknown_numbered_response() {
            match ResponseParser::parse(b"* 3 WIBBLE\r\n") {
                Err(Error::ResponseParse { response, .. }) => {
                    assert_eq!(response.as_deref(), Some("WIBBLE"));
                }
                other => panic!("Expected parse error, got {other:?}"),
            }
        }

        #[test]
        fn missing_crlf() {
            assert!(ResponseParser::parse(b"* 1 EXISTS").is_err());
        }
    }
}
