//! BODY and BODYSTRUCTURE parsing.
//!
//! Besides the RFC 3501 grammar this accepts a few shapes real servers
//! emit:
//!
//! - `("MIXED")` or `("MIXED" (params) ...)`: a multipart with no parts.
//! - `("ATTACHMENT" (params))`: a disposition sent where a body belongs.
//! - `message/*` parts other than `rfc822` without envelope data.
//! - `message/rfc822` parts that stop right after the size.

use crate::parser::lexer::{Lexer, Token};
use crate::Result;

use super::fetch::parse_envelope;
use super::helpers::skip_value;
use super::types::{BodyExtension, BodyFields, BodyStructure, ContentDisposition};

/// Parses a parenthesized body structure.
pub fn parse_body(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    lexer.expect(Token::LParen)?;

    if lexer.peek() == Some(b'(') {
        return parse_multipart(lexer);
    }

    let media_type = lexer.read_string()?.to_ascii_uppercase();

    if media_type == "MIXED" {
        return parse_mixed_leaf(lexer);
    }
    if media_type == "ATTACHMENT" && lexer.peek_at(1) == Some(b'(') {
        return parse_attachment(lexer, media_type);
    }

    lexer.expect_space()?;
    let subtype = lexer.read_string()?.to_ascii_uppercase();
    lexer.expect_space()?;
    let fields = parse_body_fields(lexer)?;

    let body = match media_type.as_str() {
        "TEXT" => {
            lexer.expect_space()?;
            let lines = lexer.read_nnumber()?.unwrap_or(0);
            let extension = parse_single_extension(lexer)?;
            BodyStructure::Text {
                subtype,
                fields,
                lines,
                extension,
            }
        }
        "MESSAGE" if subtype == "RFC822" => parse_message_rest(lexer, fields)?,
        _ => {
            let extension = parse_single_extension(lexer)?;
            BodyStructure::Basic {
                media_type,
                subtype,
                fields,
                extension,
            }
        }
    };

    lexer.expect(Token::RParen)?;
    Ok(body)
}

fn parse_multipart(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    let mut parts = Vec::new();
    while lexer.peek() == Some(b'(') {
        parts.push(parse_body(lexer)?);
        lexer.eat(b' ');
    }

    let subtype = lexer.read_string()?.to_ascii_uppercase();

    let mut params = Vec::new();
    let mut extension = BodyExtension::default();
    if lexer.eat(b' ') {
        params = parse_body_params(lexer)?;
        parse_extension_tail(lexer, &mut extension)?;
    }

    lexer.expect(Token::RParen)?;
    Ok(BodyStructure::Multipart {
        parts,
        subtype,
        params,
        extension,
    })
}

/// `("MIXED" ...)`: the parts were dropped by the server.
fn parse_mixed_leaf(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    let mut params = Vec::new();
    let mut extension = BodyExtension::default();
    if lexer.eat(b' ') {
        params = parse_body_params(lexer)?;
        parse_extension_tail(lexer, &mut extension)?;
    }
    lexer.expect(Token::RParen)?;
    Ok(BodyStructure::Multipart {
        parts: Vec::new(),
        subtype: "MIXED".to_string(),
        params,
        extension,
    })
}

/// `("ATTACHMENT" (params))`: kept as a basic part carrying only parameters.
fn parse_attachment(lexer: &mut Lexer<'_>, media_type: String) -> Result<BodyStructure> {
    lexer.expect_space()?;
    let params = parse_body_params(lexer)?;
    while lexer.eat(b' ') {
        skip_value(lexer)?;
    }
    lexer.expect(Token::RParen)?;
    Ok(BodyStructure::Basic {
        media_type,
        subtype: String::new(),
        fields: BodyFields {
            params,
            ..BodyFields::default()
        },
        extension: BodyExtension::default(),
    })
}

fn parse_message_rest(lexer: &mut Lexer<'_>, fields: BodyFields) -> Result<BodyStructure> {
    if lexer.peek() == Some(b')') {
        return Ok(BodyStructure::Message {
            fields,
            envelope: None,
            body: None,
            lines: None,
            extension: BodyExtension::default(),
        });
    }

    lexer.expect_space()?;
    let envelope = if lexer.peek_nil() {
        lexer.skip(3);
        None
    } else {
        Some(Box::new(parse_envelope(lexer)?))
    };

    lexer.expect_space()?;
    let body = if lexer.peek_nil() {
        lexer.skip(3);
        None
    } else {
        Some(Box::new(parse_body(lexer)?))
    };

    lexer.expect_space()?;
    let lines = lexer.read_nnumber()?;
    let extension = parse_single_extension(lexer)?;

    Ok(BodyStructure::Message {
        fields,
        envelope,
        body,
        lines,
        extension,
    })
}

fn parse_body_fields(lexer: &mut Lexer<'_>) -> Result<BodyFields> {
    let params = parse_body_params(lexer)?;
    lexer.expect_space()?;
    let id = lexer.read_nstring()?;
    lexer.expect_space()?;
    let description = lexer.read_nstring()?;
    lexer.expect_space()?;
    let encoding = lexer
        .read_nstring()?
        .unwrap_or_default()
        .to_ascii_uppercase();
    lexer.expect_space()?;
    let size = lexer.read_nnumber()?.unwrap_or(0);

    Ok(BodyFields {
        params,
        id,
        description,
        encoding,
        size,
    })
}

/// Parses `NIL` or `(key value ...)`. Keys are upper-cased.
fn parse_body_params(lexer: &mut Lexer<'_>) -> Result<Vec<(String, String)>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut params = Vec::new();
            loop {
                while lexer.eat(b' ') {}
                if lexer.eat(b')') {
                    break;
                }
                let key = lexer.read_string()?.to_ascii_uppercase();
                lexer.expect_space()?;
                let value = lexer.read_nstring()?.unwrap_or_default();
                params.push((key, value));
            }
            Ok(params)
        }
        token => Err(lexer.error(&format!("Expected body parameters, got {token:?}"))),
    }
}

/// Leaf extension: md5, then the shared tail.
fn parse_single_extension(lexer: &mut Lexer<'_>) -> Result<BodyExtension> {
    let mut extension = BodyExtension::default();
    if lexer.eat(b' ') {
        extension.md5 = lexer.read_nstring()?;
        parse_extension_tail(lexer, &mut extension)?;
    }
    Ok(extension)
}

/// Disposition, language, location, then any further values, each optional.
fn parse_extension_tail(lexer: &mut Lexer<'_>, extension: &mut BodyExtension) -> Result<()> {
    if !lexer.eat(b' ') {
        return Ok(());
    }
    extension.disposition = parse_disposition(lexer)?;

    if !lexer.eat(b' ') {
        return Ok(());
    }
    extension.language = parse_language(lexer)?;

    if !lexer.eat(b' ') {
        return Ok(());
    }
    extension.location = lexer.read_nstring()?;

    while lexer.eat(b' ') {
        skip_value(lexer)?;
    }
    Ok(())
}

fn parse_disposition(lexer: &mut Lexer<'_>) -> Result<Option<ContentDisposition>> {
    match lexer.next_token()? {
        Token::Nil => Ok(None),
        Token::LParen => {
            let kind = lexer.read_string()?.to_ascii_uppercase();
            lexer.expect_space()?;
            let params = parse_body_params(lexer)?;
            lexer.expect(Token::RParen)?;
            Ok(Some(ContentDisposition { kind, params }))
        }
        token => Err(lexer.error(&format!("Expected disposition, got {token:?}"))),
    }
}

fn parse_language(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::QuotedString(s) => Ok(vec![s]),
        Token::Literal(data) => Ok(vec![String::from_utf8_lossy(&data).into_owned()]),
        Token::LParen => {
            let mut tags = Vec::new();
            loop {
                while lexer.eat(b' ') {}
                if lexer.eat(b')') {
                    break;
                }
                tags.push(lexer.read_string()?);
            }
            Ok(tags)
        }
        token => Err(lexer.error(&format!("Expected language, got {token:?}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(input: &str) -> BodyStructure {
        let mut lexer = Lexer::new(input.as_bytes());
        let body = parse_body(&mut lexer).unwrap();
        assert!(lexer.is_eof(), "trailing input: {:?}", lexer.remaining());
        body
    }

    #[test]
    fn simple_text_part() {
        let body = parse(r#"("TEXT" "PLAIN" ("CHARSET" "UTF-8") NIL NIL "7BIT" 1234 50)"#);
        match body {
            BodyStructure::Text {
                subtype,
                fields,
                lines,
                ..
            } => {
                assert_eq!(subtype, "PLAIN");
                assert_eq!(fields.param("charset"), Some("UTF-8"));
                assert_eq!(fields.size, 1234);
                assert_eq!(lines, 50);
            }
            other => panic!("Expected text part, got {other:?}"),
        }
    }

    #[test]
    fn bare_mixed() {
        let body = parse(r#"("MIXED")"#);
        assert_eq!(body.media_type(), "MULTIPART");
        assert_eq!(body.subtype(), "MIXED");
        assert!(body.parts().is_empty());
    }

    #[test]
    fn delivery_status_is_basic() {
        let body = parse(r#"("message" "delivery-status" NIL NIL "Delivery report" "7bit" 410 NIL NIL NIL NIL)"#);
        match body {
            BodyStructure::Basic {
                media_type,
                subtype,
                fields,
                ..
            } => {
                assert_eq!(media_type, "MESSAGE");
                assert_eq!(subtype, "DELIVERY-STATUS");
                assert!(fields.params.is_empty());
                assert!(fields.id.is_none());
                assert_eq!(fields.description.as_deref(), Some("Delivery report"));
                assert_eq!(fields.encoding, "7BIT");
                assert_eq!(fields.size, 410);
            }
            other => panic!("Expected basic part, got {other:?}"),
        }
    }

    #[test]
    fn rfc822_without_envelope() {
        let body = parse(r#"("MESSAGE" "RFC822" ("NAME" "ATT00026.eml") NIL NIL "7BIT" 4079755)"#);
        match body {
            BodyStructure::Message {
                envelope,
                body,
                lines,
                fields,
                ..
            } => {
                assert!(envelope.is_none());
                assert!(body.is_none());
                assert!(lines.is_none());
                assert_eq!(fields.param("NAME"), Some("ATT00026.eml"));
            }
            other => panic!("Expected message part, got {other:?}"),
        }
    }

    #[test]
    fn rfc822_with_attachment_body() {
        let body = parse(
            r#"("MESSAGE" "RFC822" ("NAME" "Fw.eml") NIL NIL "7BIT" 1980088 NIL ("ATTACHMENT" ("FILENAME" "Fw.eml")) NIL)"#,
        );
        match body {
            BodyStructure::Message { body, .. } => {
                let inner = body.unwrap();
                assert_eq!(inner.media_type(), "ATTACHMENT");
                assert_eq!(inner.param("FILENAME"), Some("Fw.eml"));
            }
            other => panic!("Expected message part, got {other:?}"),
        }
    }

    #[test]
    fn rfc822_with_mixed_boundary_body() {
        let body = parse(concat!(
            r#"("MESSAGE" "RFC822" NIL NIL NIL "7BIT" 2177"#,
            r#" ("Tue, 11 May 2010 18:28:16 -0400" "Re: Welcome letter" (("David" NIL "info" "example.si")) (("David" NIL "info" "example.si")) (("David" NIL "info" "example.si")) ((NIL NIL "info" "example.si")) NIL NIL "<a@localdomain>" "<b@localdomain>")"#,
            r#" ("MIXED" ("BOUNDARY" "000e0cd29212e3e06a0486590ae2") NIL NIL) 37 NIL NIL NIL)"#,
        ));
        match body {
            BodyStructure::Message {
                envelope,
                body,
                lines,
                ..
            } => {
                assert_eq!(lines, Some(37));
                let envelope = envelope.unwrap();
                assert_eq!(envelope.subject.as_deref(), Some("Re: Welcome letter"));
                let inner = body.unwrap();
                assert_eq!(inner.media_type(), "MULTIPART");
                assert_eq!(inner.subtype(), "MIXED");
                assert_eq!(inner.param("BOUNDARY"), Some("000e0cd29212e3e06a0486590ae2"));
            }
            other => panic!("Expected message part, got {other:?}"),
        }
    }

    #[test]
    fn multipart_extension_without_language() {
        let body = parse(concat!(
            r#"((("text" "plain" ("charset" "utf-8") NIL NIL "7bit" 257 9 NIL NIL NIL NIL)"#,
            r#"("text" "html" ("charset" "utf-8") NIL NIL "quoted-printable" 655 9 NIL NIL NIL NIL)"#,
            r#" "alternative" ("boundary" "001a") NIL)"#,
            r#"("application" "pdf" ("name" "test.xml") NIL NIL "base64" 4383638 NIL ("attachment" ("filename" "test.xml")) NIL NIL)"#,
            r#" "mixed" ("boundary" "001b") NIL)"#,
        ));
        let parts = body.parts();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].extension().disposition.is_none());
        assert!(parts[0].extension().language.is_empty());
        let disposition = parts[1].extension().disposition.as_ref().unwrap();
        assert_eq!(disposition.kind, "ATTACHMENT");
        assert_eq!(disposition.params[0].0, "FILENAME");
        assert_eq!(disposition.params[0].1, "test.xml");
        assert!(parts[1].extension().language.is_empty());
    }

    #[test]
    fn short_multipart_without_extension() {
        let body = parse(r#"(("MESSAGE" "DELIVERY-STATUS" NIL NIL NIL "7BIT" 324) "REPORT")"#);
        assert_eq!(body.subtype(), "REPORT");
        assert_eq!(body.parts()[0].subtype(), "DELIVERY-STATUS");
    }

    #[test]
    fn unknown_extension_values_are_skipped() {
        let body = parse(r#"("IMAGE" "PNG" NIL NIL NIL "BASE64" 10 NIL NIL ("en" "de") "loc" ("x" ")") 5)"#);
        let ext = body.extension();
        assert_eq!(ext.language, vec!["en".to_string(), "de".to_string()]);
        assert_eq!(ext.location.as_deref(), Some("loc"));
    }
}
