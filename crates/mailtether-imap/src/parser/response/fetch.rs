//! FETCH response parsing.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{SeqNum, Uid};
use crate::Result;

use super::body::parse_body;
use super::helpers::parse_flag_list;
use super::types::{Address, Envelope, FetchItem};

/// Parses the parenthesized item list of a FETCH response.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>, seq: SeqNum) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();

    loop {
        while lexer.eat(b' ') {}
        if lexer.eat(b')') {
            break;
        }

        let name = lexer.read_atom_string()?;
        let upper = name.to_ascii_uppercase();
        let item = match upper.as_str() {
            "FLAGS" => {
                lexer.expect_space()?;
                FetchItem::Flags(parse_flag_list(lexer)?)
            }
            "UID" => {
                lexer.expect_space()?;
                let n = lexer.read_number()?;
                let uid = Uid::new(n).ok_or_else(|| lexer.error("invalid UID value 0"))?;
                FetchItem::Uid(uid)
            }
            "RFC822.SIZE" => {
                lexer.expect_space()?;
                FetchItem::Rfc822Size(lexer.read_number()?)
            }
            "INTERNALDATE" => {
                lexer.expect_space()?;
                FetchItem::InternalDate(lexer.read_string()?)
            }
            "ENVELOPE" => {
                lexer.expect_space()?;
                FetchItem::Envelope(Box::new(parse_envelope(lexer)?))
            }
            "BODYSTRUCTURE" => {
                lexer.expect_space()?;
                FetchItem::BodyStructure(parse_body(lexer)?)
            }
            "BODY" | "BODY.PEEK" if lexer.peek() == Some(b'[') => {
                let (section, origin) = parse_section_and_origin(lexer)?;
                lexer.expect_space()?;
                FetchItem::BodySection {
                    section,
                    origin,
                    data: lexer.read_nstring_bytes()?,
                }
            }
            "BODY" => {
                lexer.expect_space()?;
                FetchItem::Body(parse_body(lexer)?)
            }
            "RFC822" => {
                // Some servers echo the request form `RFC822[]`.
                if lexer.peek() == Some(b'[') {
                    parse_section_and_origin(lexer)?;
                }
                lexer.expect_space()?;
                FetchItem::Rfc822(lexer.read_nstring_bytes()?)
            }
            "RFC822.HEADER" => {
                lexer.expect_space()?;
                FetchItem::Rfc822Header(lexer.read_nstring_bytes()?)
            }
            "RFC822.TEXT" => {
                lexer.expect_space()?;
                FetchItem::Rfc822Text(lexer.read_nstring_bytes()?)
            }
            "MODSEQ" => {
                lexer.expect_space()?;
                lexer.expect(Token::LParen)?;
                let n = lexer.read_number64()?;
                lexer.expect(Token::RParen)?;
                FetchItem::ModSeq(n)
            }
            _ => {
                return Err(lexer.error(&format!("unknown attribute {name} for {{{seq}}}")));
            }
        };
        items.push(item);
    }

    Ok(items)
}

/// Parses `[section]` and an optional `<origin>`.
fn parse_section_and_origin(lexer: &mut Lexer<'_>) -> Result<(String, Option<u32>)> {
    lexer.expect(Token::LBracket)?;
    let section = String::from_utf8_lossy(lexer.read_until(b"]\r\n")).into_owned();
    lexer.expect(Token::RBracket)?;

    // `>` is an atom character, so the digits are read by hand.
    let origin = if lexer.eat(b'<') {
        let digits = lexer.read_until(b">\r\n");
        let n = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| lexer.error("Invalid origin"))?;
        if !lexer.eat(b'>') {
            return Err(lexer.error("Expected > after origin"));
        }
        Some(n)
    } else {
        None
    };

    Ok((section, origin))
}

/// Parses an envelope structure.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(Token::LParen)?;

    let date = lexer.read_nstring()?;
    lexer.expect_space()?;

    let subject = lexer.read_nstring()?;
    lexer.expect_space()?;

    let from = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let sender = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let reply_to = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let to = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let cc = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let bcc = parse_address_list(lexer)?;
    lexer.expect_space()?;

    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;

    let message_id = lexer.read_nstring()?;

    lexer.expect(Token::RParen)?;

    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

/// Parses an address list.
pub fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut addresses = Vec::new();
            loop {
                while lexer.eat(b' ') {}
                if lexer.eat(b')') {
                    break;
                }
                addresses.push(parse_address(lexer)?);
            }
            Ok(addresses)
        }
        token => Err(lexer.error(&format!("Expected address list, got {token:?}"))),
    }
}

/// Parses a single address.
pub fn parse_address(lexer: &mut Lexer<'_>) -> Result<Address> {
    lexer.expect(Token::LParen)?;

    let name = lexer.read_nstring()?;
    lexer.expect_space()?;

    let adl = lexer.read_nstring()?;
    lexer.expect_space()?;

    let mailbox = lexer.read_nstring()?;
    lexer.expect_space()?;

    let host = lexer.read_nstring()?;

    lexer.expect(Token::RParen)?;

    Ok(Address {
        name,
        adl,
        mailbox,
        host,
    })
}
