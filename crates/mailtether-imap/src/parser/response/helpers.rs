//! Parser helper functions.

use std::collections::BTreeMap;

use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    AclEntry, Capability, Flag, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, Namespace,
    Namespaces, ResponseCode, SeqNum, SequenceSet, StatusItem, Uid, UidPlusData, UidValidity,
};
use crate::Result;

use super::types::{IdParams, ResponseText};

/// Parses response text: an optional `[code]`, then text up to CRLF.
pub fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<ResponseText> {
    let code = if lexer.peek() == Some(b'[') {
        let code = parse_response_code(lexer)?;
        lexer.eat(b' ');
        Some(code)
    } else {
        None
    };

    let text = read_text_until_crlf(lexer)?;
    Ok(ResponseText { code, text })
}

/// Parses a bracketed response code.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;

    let atom = lexer.read_atom_string()?;
    let upper = atom.to_ascii_uppercase();

    let code = match upper.as_str() {
        "ALERT" => ResponseCode::Alert,
        "PARSE" => ResponseCode::Parse,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "NOMODSEQ" => ResponseCode::NoModSeq,
        "UIDNOTSTICKY" => ResponseCode::UidNotSticky,
        "CLOSED" => ResponseCode::Closed,
        "UIDNEXT" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            let uid = Uid::new(n).ok_or_else(|| lexer.error("Invalid UID 0"))?;
            ResponseCode::UidNext(uid)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            ResponseCode::UidValidity(read_uid_validity(lexer)?)
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            let seq = SeqNum::new(n).ok_or_else(|| lexer.error("Invalid sequence number 0"))?;
            ResponseCode::Unseen(seq)
        }
        "HIGHESTMODSEQ" => {
            lexer.expect_space()?;
            ResponseCode::HighestModSeq(lexer.read_number64()?)
        }
        "CAPABILITY" => {
            let caps = read_words(lexer)
                .into_iter()
                .map(|w| Capability::parse(&w))
                .collect();
            ResponseCode::Capability(caps)
        }
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?)
        }
        "BADCHARSET" => {
            let mut charsets = Vec::new();
            if lexer.eat(b' ') {
                lexer.expect(Token::LParen)?;
                while !lexer.eat(b')') {
                    lexer.eat(b' ');
                    charsets.push(lexer.read_astring()?);
                }
            }
            ResponseCode::BadCharset(charsets)
        }
        "APPENDUID" => {
            lexer.expect_space()?;
            let uid_validity = read_uid_validity(lexer)?;
            lexer.expect_space()?;
            let dest_uids = read_uid_set(lexer)?;
            ResponseCode::AppendUid(UidPlusData {
                uid_validity,
                source_uids: None,
                dest_uids,
            })
        }
        "COPYUID" => {
            lexer.expect_space()?;
            let uid_validity = read_uid_validity(lexer)?;
            lexer.expect_space()?;
            let source_uids = read_uid_set(lexer)?;
            lexer.expect_space()?;
            let dest_uids = read_uid_set(lexer)?;
            ResponseCode::CopyUid(UidPlusData {
                uid_validity,
                source_uids: Some(source_uids),
                dest_uids,
            })
        }
        _ => {
            let text = if lexer.eat(b' ') {
                Some(String::from_utf8_lossy(lexer.read_until(b"]\r\n")).into_owned())
            } else {
                None
            };
            ResponseCode::Other { name: upper, text }
        }
    };

    lexer.expect(Token::RBracket)?;
    Ok(code)
}

fn read_uid_validity(lexer: &mut Lexer<'_>) -> Result<UidValidity> {
    let n = lexer.read_number()?;
    UidValidity::new(n).ok_or_else(|| lexer.error("Invalid UIDVALIDITY 0"))
}

/// Reads a UID set. A lone number lexes as a number, anything else as an atom.
fn read_uid_set(lexer: &mut Lexer<'_>) -> Result<SequenceSet> {
    let raw = match lexer.next_token()? {
        Token::Number(n) => n.to_string(),
        Token::Atom(s) => s.to_string(),
        token => return Err(lexer.error(&format!("Expected UID set, got {token:?}"))),
    };
    SequenceSet::parse(&raw).map_err(|e| lexer.error(&e.to_string()))
}

/// Reads space-separated raw words up to CRLF or `]`.
///
/// Capability lists are read this way so that servers advertising
/// non-atom tokens such as `+` or `NIL` still parse.
pub fn read_words(lexer: &mut Lexer<'_>) -> Vec<String> {
    let mut words = Vec::new();
    while lexer.eat(b' ') {
        let word = lexer.read_until(b" ]\r\n");
        if !word.is_empty() {
            words.push(String::from_utf8_lossy(word).into_owned());
        }
    }
    words
}

/// Parses capability data.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Vec<Capability> {
    read_words(lexer)
        .iter()
        .map(|w| Capability::parse(w))
        .collect()
}

/// Parses a parenthesized flag list.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Vec<Flag>> {
    lexer.expect(Token::LParen)?;

    let mut flags = Vec::new();
    loop {
        while lexer.eat(b' ') {}
        if lexer.eat(b')') {
            break;
        }
        flags.push(Flag::parse(lexer.read_flag()?));
    }

    Ok(flags)
}

/// Reads a mailbox name.
///
/// Unquoted names may contain `]`, which is not an atom character, so they
/// are taken up to the next space or CRLF.
pub fn read_mailbox(lexer: &mut Lexer<'_>) -> Result<Mailbox> {
    match lexer.peek() {
        Some(b'"' | b'{') => Ok(Mailbox::new(lexer.read_astring()?)),
        _ => {
            let raw = lexer.read_until(b" \r\n");
            if raw.is_empty() {
                return Err(lexer.error("Expected mailbox name"));
            }
            Ok(Mailbox::new(String::from_utf8_lossy(raw)))
        }
    }
}

/// Parses LIST, LSUB or XLIST data.
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    lexer.expect(Token::LParen)?;
    let mut attributes = Vec::new();
    loop {
        while lexer.eat(b' ') {}
        if lexer.eat(b')') {
            break;
        }
        attributes.push(MailboxAttribute::parse(lexer.read_flag()?));
    }

    lexer.expect_space()?;

    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => return Err(lexer.error(&format!("Expected delimiter, got {token:?}"))),
    };

    lexer.expect_space()?;
    let mailbox = read_mailbox(lexer)?;

    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox,
    })
}

/// Parses SEARCH data, including a trailing `(MODSEQ n)`.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<(Vec<u32>, Option<u64>)> {
    let mut ids = Vec::new();
    let mut modseq = None;

    while lexer.eat(b' ') {
        match lexer.peek() {
            Some(b'(') => {
                lexer.advance();
                let name = lexer.read_atom_string()?;
                if !name.eq_ignore_ascii_case("MODSEQ") {
                    return Err(lexer.error(&format!("Unexpected search data: {name}")));
                }
                lexer.expect_space()?;
                modseq = Some(lexer.read_number64()?);
                lexer.expect(Token::RParen)?;
            }
            Some(b'\r') | None => break,
            _ => ids.push(lexer.read_number()?),
        }
    }

    Ok((ids, modseq))
}

/// Parses STATUS data.
pub fn parse_status_response(lexer: &mut Lexer<'_>) -> Result<MailboxStatus> {
    let mailbox = read_mailbox(lexer)?;
    lexer.expect_space()?;
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();
    loop {
        while lexer.eat(b' ') {}
        if lexer.eat(b')') {
            break;
        }
        let name = lexer.read_atom_string()?;
        lexer.expect_space()?;
        let value = lexer.read_number64()?;
        let narrow = || u32::try_from(value).map_err(|_| lexer.error("STATUS value out of range"));

        let item = match name.to_ascii_uppercase().as_str() {
            "MESSAGES" => StatusItem::Messages(narrow()?),
            "RECENT" => StatusItem::Recent(narrow()?),
            "UIDNEXT" => StatusItem::UidNext(narrow()?),
            "UIDVALIDITY" => StatusItem::UidValidity(narrow()?),
            "UNSEEN" => StatusItem::Unseen(narrow()?),
            "HIGHESTMODSEQ" => StatusItem::HighestModSeq(value),
            other => StatusItem::Other(other.to_string(), value),
        };
        items.push(item);
    }

    Ok(MailboxStatus { mailbox, items })
}

/// Parses NAMESPACE data: personal, other users' and shared lists.
pub fn parse_namespace_response(lexer: &mut Lexer<'_>) -> Result<Namespaces> {
    let personal = parse_namespace_list(lexer)?;
    lexer.expect_space()?;
    let other = parse_namespace_list(lexer)?;
    lexer.expect_space()?;
    let shared = parse_namespace_list(lexer)?;
    Ok(Namespaces {
        personal,
        other,
        shared,
    })
}

fn parse_namespace_list(lexer: &mut Lexer<'_>) -> Result<Vec<Namespace>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut namespaces = Vec::new();
            loop {
                while lexer.eat(b' ') {}
                if lexer.eat(b')') {
                    break;
                }
                namespaces.push(parse_namespace(lexer)?);
            }
            Ok(namespaces)
        }
        token => Err(lexer.error(&format!("Expected namespace list, got {token:?}"))),
    }
}

fn parse_namespace(lexer: &mut Lexer<'_>) -> Result<Namespace> {
    lexer.expect(Token::LParen)?;
    let prefix = lexer.read_string()?;
    lexer.expect_space()?;
    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => return Err(lexer.error(&format!("Expected delimiter, got {token:?}"))),
    };

    let mut extensions = BTreeMap::new();
    while lexer.eat(b' ') {
        let name = lexer.read_string()?;
        lexer.expect_space()?;
        lexer.expect(Token::LParen)?;
        let mut values = Vec::new();
        loop {
            while lexer.eat(b' ') {}
            if lexer.eat(b')') {
                break;
            }
            values.push(lexer.read_string()?);
        }
        extensions.insert(name, values);
    }
    lexer.expect(Token::RParen)?;

    Ok(Namespace {
        prefix,
        delimiter,
        extensions,
    })
}

/// Parses ACL data: a mailbox followed by identifier/rights pairs.
pub fn parse_acl_response(lexer: &mut Lexer<'_>) -> Result<Vec<AclEntry>> {
    let mailbox = read_mailbox(lexer)?;
    let mut entries = Vec::new();
    while lexer.eat(b' ') {
        if lexer.at_crlf() {
            break;
        }
        let user = lexer.read_astring()?;
        lexer.expect_space()?;
        let rights = lexer.read_astring()?;
        entries.push(AclEntry {
            mailbox: mailbox.clone(),
            user,
            rights,
        });
    }
    Ok(entries)
}

/// Parses ID data: NIL or a list of field/value pairs.
pub fn parse_id_response(lexer: &mut Lexer<'_>) -> Result<Option<IdParams>> {
    match lexer.next_token()? {
        Token::Nil => Ok(None),
        Token::LParen => {
            let mut params = BTreeMap::new();
            loop {
                while lexer.eat(b' ') {}
                if lexer.eat(b')') {
                    break;
                }
                let key = lexer.read_string()?;
                lexer.expect_space()?;
                let value = lexer.read_nstring()?;
                params.insert(key, value);
            }
            Ok(Some(params))
        }
        token => Err(lexer.error(&format!("Expected ID parameter list, got {token:?}"))),
    }
}

/// Reads text until CRLF and consumes the CRLF.
pub fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> Result<String> {
    let remaining = lexer.remaining();
    let end = remaining
        .windows(2)
        .position(|w| w == b"\r\n")
        .ok_or_else(|| lexer.error("Missing CRLF"))?;

    lexer.skip(end + 2);
    Ok(String::from_utf8_lossy(&remaining[..end]).into_owned())
}

/// Skips one value: an nstring, number, atom or parenthesized list.
///
/// Quoted strings and literals are consumed as tokens, so parentheses
/// inside them do not unbalance the skip.
pub fn skip_value(lexer: &mut Lexer<'_>) -> Result<()> {
    let mut depth = 0usize;
    loop {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| lexer.error("Unbalanced parenthesis"))?;
            }
            Token::Crlf | Token::Eof => return Err(lexer.error("Unexpected end of response")),
            _ => {}
        }
        if depth == 0 {
            return Ok(());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn capability_code_keeps_odd_words() {
        let mut lexer =
            Lexer::new(b"[CAPABILITY IMAP4rev1 SASL-IR 1234 NIL THIS+THAT + AUTH=PLAIN ID] Hi\r\n");
        match parse_response_code(&mut lexer).unwrap() {
            ResponseCode::Capability(caps) => {
                let names: Vec<String> = caps.iter().map(ToString::to_string).collect();
                assert_eq!(
                    names,
                    vec![
                        "IMAP4REV1",
                        "SASL-IR",
                        "1234",
                        "NIL",
                        "THIS+THAT",
                        "+",
                        "AUTH=PLAIN",
                        "ID"
                    ]
                );
            }
            other => panic!("Expected CAPABILITY code, got {other:?}"),
        }
    }

    #[test]
    fn copyuid_code() {
        let mut lexer = Lexer::new(b"[COPYUID 38505 304,319:320 3956:3958]");
        match parse_response_code(&mut lexer).unwrap() {
            ResponseCode::CopyUid(data) => {
                assert_eq!(data.uid_validity.get(), 38505);
                assert_eq!(data.source_uids.unwrap().to_string(), "304,319:320");
                assert_eq!(data.dest_uids.to_string(), "3956:3958");
            }
            other => panic!("Expected COPYUID code, got {other:?}"),
        }
    }

    #[test]
    fn appenduid_single_number() {
        let mut lexer = Lexer::new(b"[APPENDUID 38505 3955]");
        match parse_response_code(&mut lexer).unwrap() {
            ResponseCode::AppendUid(data) => {
                assert!(data.source_uids.is_none());
                assert_eq!(data.dest_uids.to_string(), "3955");
            }
            other => panic!("Expected APPENDUID code, got {other:?}"),
        }
    }

    #[test]
    fn unknown_code_keeps_text() {
        let mut lexer = Lexer::new(b"[X-GM-THRID 1234 5678]");
        match parse_response_code(&mut lexer).unwrap() {
            ResponseCode::Other { name, text } => {
                assert_eq!(name, "X-GM-THRID");
                assert_eq!(text.as_deref(), Some("1234 5678"));
            }
            other => panic!("Expected other code, got {other:?}"),
        }
    }

    #[test]
    fn badcharset_with_and_without_list() {
        let mut lexer = Lexer::new(b"[BADCHARSET (US-ASCII \"UTF-8\")]");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::BadCharset(vec!["US-ASCII".to_string(), "UTF-8".to_string()])
        );
        let mut lexer = Lexer::new(b"[BADCHARSET]");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::BadCharset(Vec::new())
        );
    }

    #[test]
    fn permanent_flags_with_wildcard() {
        let mut lexer = Lexer::new(b"[PERMANENTFLAGS (\\Deleted \\Seen \\*)]");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::PermanentFlags(vec![Flag::Deleted, Flag::Seen, Flag::MayCreate])
        );
    }

    #[test]
    fn resp_text_without_text() {
        let mut lexer = Lexer::new(b"[READ-ONLY]\r\n");
        let text = parse_resp_text(&mut lexer).unwrap();
        assert_eq!(text.code, Some(ResponseCode::ReadOnly));
        assert_eq!(text.text, "");
        assert!(lexer.is_eof());
    }

    #[test]
    fn mailbox_with_bracket() {
        let mut lexer = Lexer::new(b"() \"/\" [Gmail]/Sent\r\n");
        let list = parse_list_response(&mut lexer).unwrap();
        assert_eq!(list.mailbox.as_str(), "[Gmail]/Sent");
        assert_eq!(list.delimiter, Some('/'));
    }

    #[test]
    fn search_with_modseq() {
        let mut lexer = Lexer::new(b" 87216 87221 (MODSEQ 7667567)\r\n");
        let (ids, modseq) = parse_search_response(&mut lexer).unwrap();
        assert_eq!(ids, vec![87216, 87221]);
        assert_eq!(modseq, Some(7_667_567));
    }

    #[test]
    fn namespace_with_extension() {
        let mut lexer = Lexer::new(
            b"((\"\" \"/\" \"X-PARAM\" (\"FLAG1\" \"FLAG2\"))) NIL ((\"Public/\" \"/\"))",
        );
        let ns = parse_namespace_response(&mut lexer).unwrap();
        assert_eq!(ns.personal.len(), 1);
        assert_eq!(ns.personal[0].prefix, "");
        assert_eq!(
            ns.personal[0].extensions["X-PARAM"],
            vec!["FLAG1".to_string(), "FLAG2".to_string()]
        );
        assert!(ns.other.is_empty());
        assert_eq!(ns.shared[0].prefix, "Public/");
    }

    #[test]
    fn skip_value_handles_parens_in_strings() {
        let mut lexer = Lexer::new(b"(\"a)\" {3}\r\n(() x) NEXT");
        skip_value(&mut lexer).unwrap();
        assert_eq!(lexer.remaining(), b" NEXT");
    }
}
