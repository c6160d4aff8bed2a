// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Binary frame encoding of trace headers and records.
//!
//! Every frame is laid out as
//!
//! ```text
//! timestamp: u64 LE | kind: u8 | payload_len: u32 LE | payload
//! ```
//!
//! Frames are self-delimiting and strictly sequential: a log is one header frame followed by any
//! number of record frames, and it can only be read from the start.

use crate::coding::{put_fixed32, put_fixed64, put_length_prefixed, Decoder};
use crate::record::{IoRecord, TraceHeader, TraceRecord, TraceType, TRACE_MAGIC};
use crate::{Result, TraceError};

/// Bytes of frame metadata ahead of the payload.
pub const FRAME_METADATA_LEN: usize = 8 + 1 + 4;

const IO_FILE_SIZE: u64 = 1 << 0;
const IO_LEN: u64 = 1 << 1;
const IO_OFFSET: u64 = 1 << 2;
const TRACE_REQUEST_ID: u64 = 1 << 0;

/// A framed but undecoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub timestamp: u64,
    pub kind: u8,
    pub payload: &'a [u8],
}

fn encode_frame(timestamp: u64, kind: TraceType, payload: &[u8]) -> Result<Vec<u8>> {
    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        TraceError::ResourceExhausted(format!("payload of {} bytes is too long", payload.len()))
    })?;
    let mut buf = Vec::with_capacity(FRAME_METADATA_LEN + payload.len());
    put_fixed64(&mut buf, timestamp);
    buf.push(kind.into());
    put_fixed32(&mut buf, payload_len);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Splits the first frame off `buf`, returning it and the number of bytes it spans.
///
/// The kind tag is not interpreted here.
pub fn decode_frame(buf: &[u8]) -> Result<(Frame<'_>, usize)> {
    let mut decoder = Decoder::new(buf);
    let timestamp = decoder.get_fixed64("frame timestamp")?;
    let kind = decoder.get_u8("frame kind")?;
    let payload_len = decoder.get_fixed32("frame payload length")? as usize;
    if decoder.remaining() < payload_len {
        return Err(TraceError::incomplete(format!(
            "frame payload: need {payload_len} bytes, {} left",
            decoder.remaining()
        )));
    }
    let consumed = FRAME_METADATA_LEN + payload_len;
    Ok((
        Frame {
            timestamp,
            kind,
            payload: &buf[FRAME_METADATA_LEN..consumed],
        },
        consumed,
    ))
}

pub fn encode_header(header: &TraceHeader) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(1 + TRACE_MAGIC.len() + 8);
    put_length_prefixed(&mut payload, TRACE_MAGIC.as_bytes())?;
    put_fixed32(&mut payload, header.format_major);
    put_fixed32(&mut payload, header.format_minor);
    encode_frame(header.start_time, TraceType::Begin, &payload)
}

/// Decodes the header frame at the start of `buf`.
pub fn decode_header(buf: &[u8]) -> Result<(TraceHeader, usize)> {
    let (frame, consumed) = decode_frame(buf)?;
    Ok((decode_header_frame(&frame)?, consumed))
}

pub(crate) fn decode_header_frame(frame: &Frame<'_>) -> Result<TraceHeader> {
    if frame.kind != u8::from(TraceType::Begin) {
        return Err(TraceError::corruption(format!(
            "first frame has kind {}, expected a header",
            frame.kind
        )));
    }
    let mut decoder = Decoder::new(frame.payload);
    let magic = decoder.get_length_prefixed("header magic")?;
    if magic != TRACE_MAGIC.as_bytes() {
        return Err(TraceError::corruption("trace header magic mismatch"));
    }
    let format_major = decoder.get_fixed32("header major version")?;
    let format_minor = decoder.get_fixed32("header minor version")?;
    if !decoder.is_empty() {
        return Err(TraceError::corruption(format!(
            "header has {} unexpected trailing bytes",
            decoder.remaining()
        )));
    }
    Ok(TraceHeader {
        start_time: frame.timestamp,
        format_major,
        format_minor,
    })
}

pub fn encode_record(record: &TraceRecord) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    match record {
        TraceRecord::Insert {
            entity_id,
            sequence_number,
            key,
            value,
            key_size,
            value_size,
            ..
        } => {
            put_fixed64(&mut payload, *sequence_number);
            put_fixed64(&mut payload, *entity_id);
            put_fixed32(&mut payload, *key_size);
            put_fixed32(&mut payload, *value_size);
            put_length_prefixed(&mut payload, key)?;
            put_length_prefixed(&mut payload, value)?;
        }
        TraceRecord::Lookup {
            entity_id,
            sequence_number,
            key,
            value,
            ..
        } => {
            put_fixed64(&mut payload, *sequence_number);
            put_fixed64(&mut payload, *entity_id);
            put_length_prefixed(&mut payload, key)?;
            put_length_prefixed(&mut payload, value)?;
        }
        TraceRecord::Io(io) => encode_io(&mut payload, io)?,
    }
    encode_frame(record.timestamp(), record.trace_type(), &payload)
}

fn encode_io(payload: &mut Vec<u8>, io: &IoRecord) -> Result<()> {
    let optional = [
        (IO_FILE_SIZE, io.file_size),
        (IO_LEN, io.len),
        (IO_OFFSET, io.offset),
    ];
    let io_op_data = optional
        .iter()
        .filter(|(_, v)| v.is_some())
        .fold(0u64, |acc, (bit, _)| acc | *bit);

    put_fixed64(payload, io_op_data);
    put_length_prefixed(payload, io.file_operation.as_bytes())?;
    put_fixed64(payload, io.latency);
    put_length_prefixed(payload, io.io_status.as_bytes())?;
    put_length_prefixed(payload, io.file_name.as_bytes())?;
    for value in optional.iter().filter_map(|(_, v)| *v) {
        put_fixed64(payload, value);
    }
    match &io.request_id {
        Some(request_id) => {
            put_fixed64(payload, TRACE_REQUEST_ID);
            put_length_prefixed(payload, request_id.as_bytes())?;
        }
        None => put_fixed64(payload, 0),
    }
    Ok(())
}

/// Decodes the record frame at the start of `buf`.
///
/// Framing is validated before the kind tag, and so are the sequence number and memtable id that
/// lead every memtable payload: a frame too short for them is `Incomplete` even when its kind is
/// unknown.
pub fn decode_record(buf: &[u8]) -> Result<(TraceRecord, usize)> {
    let (frame, consumed) = decode_frame(buf)?;
    Ok((decode_record_frame(&frame)?, consumed))
}

pub(crate) fn decode_record_frame(frame: &Frame<'_>) -> Result<TraceRecord> {
    let timestamp = frame.timestamp;
    let mut decoder = Decoder::new(frame.payload);
    let kind = match TraceType::try_from(frame.kind) {
        Ok(TraceType::Io) => return decode_io(timestamp, &mut decoder).map(TraceRecord::Io),
        Ok(TraceType::Begin) => {
            return Err(TraceError::corruption(
                "header frame found in the record stream",
            ))
        }
        other => other,
    };

    let sequence_number = decoder.get_fixed64("record sequence number")?;
    let entity_id = decoder.get_fixed64("record memtable id")?;
    match kind? {
        TraceType::MemtableInsert => {
            let key_size = decoder.get_fixed32("insert key size")?;
            let value_size = decoder.get_fixed32("insert value size")?;
            let key = decoder.get_length_prefixed("insert key")?.to_vec();
            let value = decoder.get_length_prefixed("insert value")?.to_vec();
            Ok(TraceRecord::Insert {
                timestamp,
                entity_id,
                sequence_number,
                key,
                value,
                key_size,
                value_size,
            })
        }
        TraceType::MemtableLookup => {
            let key = decoder.get_length_prefixed("lookup key")?.to_vec();
            let value = decoder.get_length_prefixed("lookup value")?.to_vec();
            Ok(TraceRecord::Lookup {
                timestamp,
                entity_id,
                sequence_number,
                key,
                value,
            })
        }
        // dispatched above
        TraceType::Io | TraceType::Begin => Err(TraceError::corruption(format!(
            "unexpected record kind {}",
            frame.kind
        ))),
    }
}

fn get_string(decoder: &mut Decoder<'_>, what: &str) -> Result<String> {
    let bytes = decoder.get_length_prefixed(what)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| TraceError::corruption(format!("{what} is not valid UTF-8")))
}

fn decode_io(timestamp: u64, decoder: &mut Decoder<'_>) -> Result<IoRecord> {
    let io_op_data = decoder.get_fixed64("io op data")?;
    let file_operation = get_string(decoder, "io file operation")?;
    let latency = decoder.get_fixed64("io latency")?;
    let io_status = get_string(decoder, "io status")?;
    let file_name = get_string(decoder, "io file name")?;

    let mut optional = |bit: u64, what: &str| -> Result<Option<u64>> {
        if io_op_data & bit != 0 {
            decoder.get_fixed64(what).map(Some)
        } else {
            Ok(None)
        }
    };
    let file_size = optional(IO_FILE_SIZE, "io file size")?;
    let len = optional(IO_LEN, "io length")?;
    let offset = optional(IO_OFFSET, "io offset")?;

    let trace_data = decoder.get_fixed64("io trace data")?;
    let request_id = if trace_data & TRACE_REQUEST_ID != 0 {
        Some(get_string(decoder, "io request id")?)
    } else {
        None
    };

    Ok(IoRecord {
        timestamp,
        file_operation,
        latency,
        io_status,
        file_name,
        file_size,
        len,
        offset,
        request_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::OpKind;

    fn insert(ts: u64, entity_id: u64, key: &[u8]) -> TraceRecord {
        TraceRecord::memtable(OpKind::Insert, ts, entity_id, 1, key, b"v")
    }

    #[test]
    fn insert_layout() {
        let record = TraceRecord::memtable(OpKind::Insert, 0x10, 2, 3, b"k", b"vv");
        let buf = encode_record(&record).unwrap();
        #[rustfmt::skip]
        let expected: Vec<u8> = [
            &[0x10, 0, 0, 0, 0, 0, 0, 0][..], // timestamp
            &[32],                             // kind
            &[29, 0, 0, 0],                    // payload length
            &[3, 0, 0, 0, 0, 0, 0, 0],         // sequence number
            &[2, 0, 0, 0, 0, 0, 0, 0],         // memtable id
            &[1, 0, 0, 0],                     // key size
            &[2, 0, 0, 0],                     // value size
            &[1, b'k'],
            &[2, b'v', b'v'],
        ]
        .concat();
        assert_eq!(buf, expected);
    }

    #[test]
    fn records_round_trip() {
        let records = [
            insert(1, 1, b"a"),
            TraceRecord::memtable(OpKind::Lookup, 2, 9, 4, b"key", b""),
            TraceRecord::Io(IoRecord {
                timestamp: 3,
                file_operation: "PositionedRead".to_owned(),
                latency: 42,
                io_status: "OK".to_owned(),
                file_name: "000012.sst".to_owned(),
                file_size: None,
                len: Some(4096),
                offset: Some(8192),
                request_id: Some("req-1".to_owned()),
            }),
            TraceRecord::Io(IoRecord {
                timestamp: 4,
                file_operation: "Append".to_owned(),
                ..Default::default()
            }),
        ];
        for record in records {
            let buf = encode_record(&record).unwrap();
            let (decoded, consumed) = decode_record(&buf).unwrap();
            assert_eq!(decoded, record);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn frames_are_self_delimiting() {
        let mut buf = encode_record(&insert(1, 1, b"first")).unwrap();
        buf.extend(encode_record(&insert(2, 1, b"second")).unwrap());

        let (first, consumed) = decode_record(&buf).unwrap();
        assert_eq!(first.key(), Some(&b"first"[..]));
        let (second, rest) = decode_record(&buf[consumed..]).unwrap();
        assert_eq!(second.key(), Some(&b"second"[..]));
        assert_eq!(consumed + rest, buf.len());
    }

    #[test]
    fn header_round_trip() {
        let header = TraceHeader::new(123_456);
        let buf = encode_header(&header).unwrap();
        assert_eq!(decode_header(&buf).unwrap(), (header, buf.len()));
    }

    #[test]
    fn header_magic_mismatch_is_corruption() {
        let mut buf = encode_header(&TraceHeader::new(1)).unwrap();
        // first magic byte, after metadata and the one-byte length prefix
        buf[FRAME_METADATA_LEN + 1] = b'X';
        let err = decode_header(&buf).unwrap_err();
        assert!(matches!(err, TraceError::Corruption(_)), "{err}");
    }

    #[test]
    fn header_with_leftover_bytes_is_corruption() {
        let mut payload = Vec::new();
        put_length_prefixed(&mut payload, TRACE_MAGIC.as_bytes()).unwrap();
        put_fixed32(&mut payload, 1);
        put_fixed32(&mut payload, 0);
        payload.push(0);
        let buf = encode_frame(1, TraceType::Begin, &payload).unwrap();
        let err = decode_header(&buf).unwrap_err();
        assert!(matches!(err, TraceError::Corruption(_)), "{err}");
    }

    #[test]
    fn non_header_first_frame_is_corruption() {
        let buf = encode_record(&insert(1, 1, b"a")).unwrap();
        let err = decode_header(&buf).unwrap_err();
        assert!(matches!(err, TraceError::Corruption(_)), "{err}");
    }

    #[test]
    fn unknown_kind_aborts() {
        let mut buf = encode_record(&insert(1, 1, b"a")).unwrap();
        buf[8] = 99;
        match decode_record(&buf) {
            Err(TraceError::Aborted(msg)) => assert_eq!(msg, "unrecognized trace type"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn truncation_wins_over_unknown_kind() {
        let mut buf = encode_record(&insert(1, 1, b"a")).unwrap();
        buf[8] = 99;
        buf.pop();
        let err = decode_record(&buf).unwrap_err();
        assert!(err.is_incomplete(), "{err}");

        // complete frame, payload too short for the sequence number and memtable id
        #[rustfmt::skip]
        let short: Vec<u8> = [
            &[1, 0, 0, 0, 0, 0, 0, 0][..], // timestamp
            &[99],                         // kind
            &[4, 0, 0, 0],                 // payload length
            &[0, 0, 0, 0],
        ]
        .concat();
        let err = decode_record(&short).unwrap_err();
        assert!(err.is_incomplete(), "{err}");

        // long enough for them, the kind is rejected next
        let mut long = short.clone();
        long[9] = 16;
        long.extend_from_slice(&[0; 12]);
        assert!(matches!(
            decode_record(&long),
            Err(TraceError::Aborted(msg)) if msg == "unrecognized trace type"
        ));
    }

    #[test]
    fn truncated_frames_are_incomplete() {
        let buf = encode_record(&insert(1, 1, b"abc")).unwrap();
        for len in 0..buf.len() {
            let err = decode_record(&buf[..len]).unwrap_err();
            assert!(err.is_incomplete(), "prefix {len}: {err}");
        }
    }

    #[test]
    fn short_payload_is_incomplete() {
        // a lookup frame whose declared payload stops before the memtable id
        let buf = encode_frame(1, TraceType::MemtableLookup, &[0; 8]).unwrap();
        let err = decode_record(&buf).unwrap_err();
        assert!(err.is_incomplete(), "{err}");
    }

    #[test]
    fn header_frame_in_record_stream_is_corruption() {
        let buf = encode_header(&TraceHeader::new(1)).unwrap();
        let err = decode_record(&buf).unwrap_err();
        assert!(matches!(err, TraceError::Corruption(_)), "{err}");
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn fuzz_memtable_round_trip() {
        bolero::check!()
            .with_type::<(bool, u64, u64, u64, Vec<u8>, Vec<u8>)>()
            .for_each(|(is_insert, ts, entity_id, seq, key, value)| {
                let op = if *is_insert {
                    OpKind::Insert
                } else {
                    OpKind::Lookup
                };
                let record = TraceRecord::memtable(op, *ts, *entity_id, *seq, key, value);
                let buf = encode_record(&record).unwrap();
                let (decoded, consumed) = decode_record(&buf).unwrap();
                assert_eq!(decoded, record);
                assert_eq!(consumed, buf.len());
            });
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn fuzz_decode_never_panics() {
        bolero::check!().with_type::<Vec<u8>>().for_each(|bytes| {
            if let Ok((_, consumed)) = decode_record(bytes) {
                assert!(consumed <= bytes.len());
            }
            let _ = decode_header(bytes);
        });
    }
}
