//! Wire-format message assembly.
//!
//! Both transports hand the remote side an RFC 5322 message with a
//! `multipart/alternative` body carrying the plaintext fallback before the
//! HTML part. Lines use CRLF endings throughout.

use base64::Engine;

use crate::envelope::Envelope;

/// Format an envelope as a complete RFC 5322 message.
pub fn format_message(envelope: &Envelope) -> String {
    let boundary = format!("=_courier_{}", envelope.message_id.simple());
    let sender_domain = envelope
        .sender_address
        .rsplit_once('@')
        .map_or("localhost", |(_, domain)| domain);

    let mut msg = String::with_capacity(
        envelope.html_body.len() + envelope.plaintext_body.len() + 512,
    );

    header(&mut msg, "From", &envelope.formatted_sender());
    header(&mut msg, "To", &envelope.recipient_address);
    header(&mut msg, "Subject", &encode_header_text(&envelope.subject));
    header(&mut msg, "Date", &envelope.created_at.to_rfc2822());
    header(
        &mut msg,
        "Message-ID",
        &format!("<{}@{}>", envelope.message_id.simple(), sender_domain),
    );
    header(&mut msg, "MIME-Version", "1.0");
    header(
        &mut msg,
        "Content-Type",
        &format!("multipart/alternative; boundary=\"{boundary}\""),
    );
    msg.push_str("\r\n");

    part(&mut msg, &boundary, "text/plain", &envelope.plaintext_body);
    part(&mut msg, &boundary, "text/html", &envelope.html_body);
    msg.push_str(&format!("--{boundary}--\r\n"));

    msg
}

fn header(msg: &mut String, name: &str, value: &str) {
    msg.push_str(name);
    msg.push_str(": ");
    // Header values never carry raw line breaks
    msg.push_str(&value.replace(['\r', '\n'], " "));
    msg.push_str("\r\n");
}

fn part(msg: &mut String, boundary: &str, content_type: &str, body: &str) {
    msg.push_str(&format!("--{boundary}\r\n"));
    msg.push_str(&format!(
        "Content-Type: {content_type}; charset=utf-8\r\n\r\n"
    ));
    for line in body.lines() {
        msg.push_str(line);
        msg.push_str("\r\n");
    }
    msg.push_str("\r\n");
}

/// RFC 2047 encoded-word form for non-ASCII header text; ASCII passes
/// through untouched.
fn encode_header_text(text: &str) -> String {
    if text.is_ascii() {
        text.to_string()
    } else {
        format!(
            "=?utf-8?B?{}?=",
            base64::engine::general_purpose::STANDARD.encode(text.as_bytes())
        )
    }
}
