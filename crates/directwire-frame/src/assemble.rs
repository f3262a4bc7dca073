//! Projection of an [`Envelope`] into an owned, buffer-free [`ResponseRecord`].

use serde::Serialize;
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::error::TranslateError;
use crate::header::{keys, ResponseHeader};

/// Connection-level context negotiated with the replica, attached to every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMetadata {
    /// Agent string the replica reported during connection setup.
    pub server_agent: String,
    /// Service version the replica reported during connection setup.
    pub server_version: String,
    pub idle_timeout_secs: Option<u32>,
}

/// Response content, copied out of the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ResponseContent {
    Text(String),
    Binary(Vec<u8>),
}

impl ResponseContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ResponseContent::Text(text) => text.as_bytes(),
            ResponseContent::Binary(bytes) => bytes,
        }
    }
}

/// Immutable application-facing view of one response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub status: u32,
    pub activity_id: Uuid,
    pub transport_request_id: u32,
    pub sub_status: Option<u32>,
    pub session_token: Option<String>,
    pub request_charge: Option<f64>,
    pub lsn: Option<i64>,
    pub continuation: Option<String>,
    /// HTTP-style header pairs in wire order, followed by context entries.
    pub headers: Vec<(String, String)>,
    pub content: Option<ResponseContent>,
}

impl ResponseRecord {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given HTTP name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Serialization format value that marks a payload as JSON text.
pub const CONTENT_FORMAT_JSON_TEXT: u8 = 0;

/// Build a [`ResponseRecord`] from `envelope`.
///
/// Everything in the record is copied; the envelope can be released as soon
/// as this returns.
pub fn assemble(
    envelope: &Envelope,
    context: &ContextMetadata,
) -> Result<ResponseRecord, TranslateError> {
    let transport_request_id = envelope
        .header::<keys::TransportRequestId>()?
        .ok_or(TranslateError::MissingHeader(
            ResponseHeader::TransportRequestId.name(),
        ))?;

    let mut headers = Vec::with_capacity(envelope.headers().len() + 3);
    for entry in envelope.headers().iter() {
        match entry.known() {
            Some(ResponseHeader::PayloadPresent) => {}
            Some(header) => headers.push((header.http_name().to_string(), entry.value.to_string())),
            None => {
                tracing::trace!(id = entry.id, "unknown header not surfaced");
            }
        }
    }
    headers.push((
        "x-ms-activity-id".to_string(),
        envelope.correlation_id().to_string(),
    ));
    if !context.server_version.is_empty() {
        headers.push((
            "x-ms-serviceversion".to_string(),
            context.server_version.clone(),
        ));
    }
    if !context.server_agent.is_empty() {
        headers.push(("x-ms-server-agent".to_string(), context.server_agent.clone()));
    }

    let payload = envelope.payload();
    let content = if payload.is_empty() {
        None
    } else {
        let format = envelope
            .header::<keys::ContentSerializationFormat>()?
            .unwrap_or(CONTENT_FORMAT_JSON_TEXT);
        if format == CONTENT_FORMAT_JSON_TEXT {
            Some(ResponseContent::Text(String::from_utf8(payload.to_vec())?))
        } else {
            Some(ResponseContent::Binary(payload.to_vec()))
        }
    };

    Ok(ResponseRecord {
        status: envelope.status(),
        activity_id: envelope.correlation_id(),
        transport_request_id,
        sub_status: envelope.header::<keys::SubStatus>()?,
        session_token: envelope.header::<keys::SessionToken>()?,
        request_charge: envelope.header::<keys::RequestCharge>()?,
        lsn: envelope.header::<keys::Lsn>()?,
        continuation: envelope.header::<keys::ContinuationToken>()?,
        headers,
        content,
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::error::FrameError;
    use crate::header::{HeaderCollection, HeaderValue};

    fn context() -> ContextMetadata {
        ContextMetadata {
            server_agent: "replica/2.14".to_string(),
            server_version: "2.14.0.0".to_string(),
            idle_timeout_secs: Some(120),
        }
    }

    fn make_envelope(headers: HeaderCollection, payload: &'static [u8]) -> Envelope {
        Envelope::new(Uuid::from_u128(7), 200, headers, Bytes::from_static(payload)).unwrap()
    }

    #[test]
    fn test_assemble_text_response() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::TransportRequestId>(42);
        headers.set::<keys::SessionToken>("0:-1#12".to_string());
        headers.set::<keys::RequestCharge>(1.25);
        headers.set::<keys::Lsn>(12);
        let envelope = make_envelope(headers, br#"{"id":"a"}"#);

        let record = envelope.to_result(&context()).unwrap();
        assert!(envelope.release());

        assert_eq!(record.status, 200);
        assert_eq!(record.activity_id, Uuid::from_u128(7));
        assert_eq!(record.transport_request_id, 42);
        assert_eq!(record.session_token.as_deref(), Some("0:-1#12"));
        assert_eq!(record.request_charge, Some(1.25));
        assert_eq!(record.lsn, Some(12));
        assert_eq!(record.sub_status, None);
        assert_eq!(
            record.content,
            Some(ResponseContent::Text(r#"{"id":"a"}"#.to_string()))
        );
        assert_eq!(record.header("x-ms-transport-request-id"), Some("42"));
        assert_eq!(record.header("x-ms-request-charge"), Some("1.25"));
        assert_eq!(record.header("x-ms-serviceversion"), Some("2.14.0.0"));
        assert_eq!(record.header("x-ms-server-agent"), Some("replica/2.14"));
        assert_eq!(
            record.header("x-ms-activity-id"),
            Some(Uuid::from_u128(7).to_string().as_str())
        );
        assert!(record.header("x-ms-payload-present").is_none());
    }

    #[test]
    fn test_assemble_binary_response() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::TransportRequestId>(1);
        headers.set::<keys::ContentSerializationFormat>(1);
        let envelope = make_envelope(headers, b"\x80\x81");

        let record = assemble(&envelope, &ContextMetadata::default()).unwrap();
        assert_eq!(record.content, Some(ResponseContent::Binary(vec![0x80, 0x81])));
        assert!(record.header("x-ms-serviceversion").is_none());
    }

    #[test]
    fn test_assemble_without_payload() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::TransportRequestId>(1);
        let envelope = Envelope::new(Uuid::nil(), 204, headers, Bytes::new()).unwrap();

        let record = assemble(&envelope, &context()).unwrap();
        assert_eq!(record.content, None);
        assert!(record.is_success());
    }

    #[test]
    fn test_missing_transport_request_id() {
        let envelope = make_envelope(HeaderCollection::new(), b"");
        let err = assemble(&envelope, &context()).unwrap_err();
        assert!(matches!(err, TranslateError::MissingHeader("TransportRequestId")));
    }

    #[test]
    fn test_wrong_header_type() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::TransportRequestId>(1);
        headers.insert(ResponseHeader::SubStatus.id(), HeaderValue::String("1002".into()));
        let envelope = make_envelope(headers, b"");

        let err = assemble(&envelope, &context()).unwrap_err();
        assert!(matches!(
            err,
            TranslateError::Header(FrameError::HeaderTypeMismatch { name: "SubStatus", .. })
        ));
    }

    #[test]
    fn test_invalid_text_payload() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::TransportRequestId>(1);
        let envelope = make_envelope(headers, b"\xFF\xFE");

        let err = assemble(&envelope, &context()).unwrap_err();
        assert!(matches!(err, TranslateError::InvalidText(_)));
    }

    #[test]
    fn test_unknown_headers_are_not_surfaced() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::TransportRequestId>(1);
        headers.insert(0x7777, HeaderValue::ULong(9));
        let envelope = make_envelope(headers, b"");

        let record = assemble(&envelope, &context()).unwrap();
        assert!(record.headers.iter().all(|(_, value)| value != "9"));
    }

    #[test]
    fn test_record_serializes_content_kind() {
        let mut headers = HeaderCollection::new();
        headers.set::<keys::TransportRequestId>(5);
        let record = assemble(&make_envelope(headers, b"hi"), &context()).unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["transportRequestId"], 5);
        assert_eq!(json["content"]["kind"], "text");
        assert_eq!(json["content"]["value"], "hi");
    }
}
