use std::sync::Arc;
use std::thread;

use bytes::{Bytes, BytesMut};
use directwire_frame::{
    decode_envelope, encode_envelope, keys, BufferPool, ContextMetadata, CountingPool, Decoded,
    Envelope, FrameConfig, FrameError, HeaderCollection, HeaderValue, ResponseContent,
};
use uuid::Uuid;

fn sample_envelopes() -> Vec<Envelope> {
    let mut first = HeaderCollection::new();
    first.set::<keys::TransportRequestId>(1);
    first.set::<keys::SessionToken>("0:-1#17".to_string());
    first.set::<keys::RequestCharge>(3.75);
    first.set::<keys::Lsn>(17);
    first.insert(0x7001, HeaderValue::Guid(Uuid::from_u128(99)));
    first.insert(0x7002, HeaderValue::ULongBytes(Bytes::from_static(b"\x00\x01")));

    let mut second = HeaderCollection::new();
    second.set::<keys::TransportRequestId>(2);
    second.set::<keys::SubStatus>(1002);

    let mut third = HeaderCollection::new();
    third.set::<keys::TransportRequestId>(3);
    third.set::<keys::ContentSerializationFormat>(1);

    vec![
        Envelope::new(Uuid::from_u128(1), 200, first, r#"{"id":"doc-1"}"#).unwrap(),
        Envelope::new(Uuid::from_u128(2), 429, second, Bytes::new()).unwrap(),
        Envelope::new(Uuid::from_u128(3), 200, third, vec![0xFFu8; 300]).unwrap(),
    ]
}

fn wire(envelopes: &[Envelope]) -> BytesMut {
    let mut buf = BytesMut::new();
    for envelope in envelopes {
        encode_envelope(envelope, &mut buf).unwrap();
    }
    buf
}

/// Feed `bytes` in uneven chunks, decoding after every append.
fn deliver_in_chunks(bytes: &[u8], config: &FrameConfig) -> Vec<Envelope> {
    let chunk_sizes = [1usize, 2, 3, 5, 8, 13, 21, 34];
    let mut recv = BytesMut::new();
    let mut delivered = Vec::new();
    let mut offset = 0;
    let mut step = 0;

    while offset < bytes.len() {
        let end = (offset + chunk_sizes[step % chunk_sizes.len()]).min(bytes.len());
        recv.extend_from_slice(&bytes[offset..end]);
        offset = end;
        step += 1;

        loop {
            let before = recv.len();
            match decode_envelope(&mut recv, config).unwrap() {
                Decoded::Complete(envelope) => delivered.push(envelope),
                Decoded::NeedMoreData => {
                    assert_eq!(recv.len(), before);
                    break;
                }
            }
        }
    }

    assert!(recv.is_empty());
    delivered
}

#[test]
fn chunked_delivery_reproduces_every_envelope() {
    let sent = sample_envelopes();
    let bytes = wire(&sent);

    let received = deliver_in_chunks(&bytes, &FrameConfig::default());
    assert_eq!(received.len(), sent.len());

    for (sent, received) in sent.iter().zip(&received) {
        assert_eq!(received.correlation_id(), sent.correlation_id());
        assert_eq!(received.status(), sent.status());
        assert_eq!(received.headers(), sent.headers());
        assert_eq!(received.payload(), sent.payload());
        assert_eq!(received.message_length(), sent.message_length());
    }

    // Unknown ids survive decode and re-encode in wire order.
    assert_eq!(wire(&received), bytes);
}

#[test]
fn diagnostic_holder_and_consumer_reclaim_once() {
    let pool = Arc::new(CountingPool::new());
    let config = FrameConfig {
        pool: Some(pool.clone() as Arc<dyn BufferPool>),
        ..FrameConfig::default()
    };
    let bytes = wire(&sample_envelopes());
    let received = deliver_in_chunks(&bytes, &config);
    let count = received.len();

    let sink = {
        let retained: Vec<Envelope> = received.iter().map(Envelope::retain).collect();
        thread::spawn(move || {
            for envelope in retained {
                let rendered = envelope.to_string();
                assert!(rendered.contains("\"referenceCount\""));
                envelope.release();
            }
        })
    };

    let context = ContextMetadata {
        server_agent: "replica/1".to_string(),
        ..ContextMetadata::default()
    };
    let records: Vec<_> = received
        .into_iter()
        .map(|envelope| {
            let record = envelope.to_result(&context).unwrap();
            envelope.release();
            record
        })
        .collect();

    sink.join().unwrap();
    assert_eq!(pool.reclaims(), count);
    assert_eq!(pool.reclaimed_bytes(), bytes.len());

    // Records stay usable after every envelope is gone.
    assert_eq!(records[0].session_token.as_deref(), Some("0:-1#17"));
    assert_eq!(records[1].sub_status, Some(1002));
    assert!(records[1].content.is_none());
    assert!(matches!(records[2].content, Some(ResponseContent::Binary(ref b)) if b.len() == 300));
}

#[test]
fn corrupt_frame_is_fatal_and_consumes_nothing() {
    let mut bytes = wire(&sample_envelopes()[..1]);
    let declared = bytes.len();
    // Unknown value type tag on the first header entry.
    bytes[24 + 2] = 0x7F;

    let err = decode_envelope(&mut bytes, &FrameConfig::default()).unwrap_err();
    assert!(matches!(err, FrameError::UnknownValueType { tag: 0x7F, .. }));
    assert!(err.is_decode_error());
    assert_eq!(bytes.len(), declared);
}

#[test]
fn mistyped_payload_flag_does_not_misframe_stream() {
    let mut bytes = BytesMut::new();
    // Frame header, one PayloadPresent entry carried as ULong 1, then a payload region.
    bytes.extend_from_slice(&(24u32 + 7).to_le_bytes());
    bytes.extend_from_slice(&200u32.to_le_bytes());
    bytes.extend_from_slice(Uuid::from_u128(5).to_bytes_le().as_slice());
    bytes.extend_from_slice(&[0x00, 0x00, 0x02, 0x01, 0x00, 0x00, 0x00]);
    bytes.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, b'h', b'i']);
    let declared = bytes.len();

    let err = decode_envelope(&mut bytes, &FrameConfig::default()).unwrap_err();
    assert!(matches!(err, FrameError::HeaderTypeMismatch { .. }));
    assert!(err.is_decode_error());
    assert_eq!(bytes.len(), declared);
}
