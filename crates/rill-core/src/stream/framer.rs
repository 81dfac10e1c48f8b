//! Newline-delimited batch record framing.
//!
//! One record per flush per partition:
//!
//! ```text
//! {"cursor":{"partition":"P","offset":"O"}[,"events":[E1,E2,...]]}\n
//! ```
//!
//! The `events` field is omitted entirely for a keep-alive. Event bytes
//! are written verbatim; the producer guarantees each element is valid
//! JSON. Clients parse incrementally by splitting on `\n`, so the
//! terminating newline is part of the record and every record is
//! flushed as soon as it is complete.
//!
//! Two paths produce byte-identical output: [`write_batch`] frames
//! directly onto the sink, [`render_batch`] builds the record as a
//! string first (used when the direct-framing gate is off).

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::cursor::Cursor;

const CURSOR_PARTITION_BEGIN: &[u8] = b"{\"cursor\":{\"partition\":\"";
const OFFSET_BEGIN: &[u8] = b"\",\"offset\":\"";
const CURSOR_END: &[u8] = b"\"}";
const EVENTS_BEGIN: &[u8] = b",\"events\":[";
const EVENTS_END: &[u8] = b"]";
const RECORD_END: &[u8] = b"}";
const RECORD_SEPARATOR: &[u8] = b"\n";

/// Frames one batch record onto the sink and flushes it.
///
/// Returns the total number of bytes written for the record.
///
/// # Errors
///
/// Propagates any sink write or flush error; a failed write terminates
/// the stream.
pub async fn write_batch<W>(sink: &mut W, cursor: &Cursor, events: &[String]) -> io::Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0usize;

    sink.write_all(CURSOR_PARTITION_BEGIN).await?;
    written += CURSOR_PARTITION_BEGIN.len();

    sink.write_all(cursor.partition.as_bytes()).await?;
    written += cursor.partition.len();

    sink.write_all(OFFSET_BEGIN).await?;
    written += OFFSET_BEGIN.len();

    sink.write_all(cursor.offset.as_bytes()).await?;
    written += cursor.offset.len();

    sink.write_all(CURSOR_END).await?;
    written += CURSOR_END.len();

    if !events.is_empty() {
        sink.write_all(EVENTS_BEGIN).await?;
        written += EVENTS_BEGIN.len();

        for (i, event) in events.iter().enumerate() {
            if i > 0 {
                sink.write_all(b",").await?;
                written += 1;
            }
            sink.write_all(event.as_bytes()).await?;
            written += event.len();
        }

        sink.write_all(EVENTS_END).await?;
        written += EVENTS_END.len();
    }

    sink.write_all(RECORD_END).await?;
    written += RECORD_END.len();

    sink.write_all(RECORD_SEPARATOR).await?;
    written += RECORD_SEPARATOR.len();

    sink.flush().await?;
    Ok(written)
}

/// Builds one batch record as a string.
///
/// Byte-identical to what [`write_batch`] emits for the same inputs.
#[must_use]
pub fn render_batch(cursor: &Cursor, events: &[String]) -> String {
    let mut record = String::with_capacity(64 + events.iter().map(String::len).sum::<usize>());
    record.push_str("{\"cursor\":{\"partition\":\"");
    record.push_str(&cursor.partition);
    record.push_str("\",\"offset\":\"");
    record.push_str(&cursor.offset);
    record.push_str("\"}");
    if !events.is_empty() {
        record.push_str(",\"events\":[");
        for (i, event) in events.iter().enumerate() {
            if i > 0 {
                record.push(',');
            }
            record.push_str(event);
        }
        record.push(']');
    }
    record.push('}');
    record.push('\n');
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn framed(cursor: &Cursor, events: &[String]) -> (Vec<u8>, usize) {
        let mut sink = Vec::new();
        let written = write_batch(&mut sink, cursor, events).await.unwrap();
        (sink, written)
    }

    #[tokio::test]
    async fn test_keep_alive_omits_events_field() {
        let cursor = Cursor::new("0", "000");
        let (bytes, written) = framed(&cursor, &[]).await;

        assert_eq!(bytes, b"{\"cursor\":{\"partition\":\"0\",\"offset\":\"000\"}}\n");
        assert_eq!(written, bytes.len());
    }

    #[tokio::test]
    async fn test_single_event_no_trailing_comma() {
        let cursor = Cursor::new("0", "001");
        let (bytes, _) = framed(&cursor, &[r#"{"a":1}"#.to_string()]).await;

        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\"cursor\":{\"partition\":\"0\",\"offset\":\"001\"},\"events\":[{\"a\":1}]}\n"
        );
    }

    #[tokio::test]
    async fn test_multiple_events_comma_separated() {
        let cursor = Cursor::new("1", "003");
        let events: Vec<String> = vec![r#"{"a":1}"#.into(), r#"{"a":2}"#.into(), r#"{"a":3}"#.into()];
        let (bytes, written) = framed(&cursor, &events).await;

        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "{\"cursor\":{\"partition\":\"1\",\"offset\":\"003\"},\"events\":[{\"a\":1},{\"a\":2},{\"a\":3}]}\n"
        );
        assert_eq!(written, text.len());
    }

    #[tokio::test]
    async fn test_exactly_one_terminating_newline() {
        let cursor = Cursor::new("0", "005");
        let (bytes, _) = framed(&cursor, &[r#"{"x":true}"#.to_string()]).await;

        assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
        assert_eq!(*bytes.last().unwrap(), b'\n');
    }

    #[tokio::test]
    async fn test_record_is_parseable_json() {
        let cursor = Cursor::new("2", "010");
        let events: Vec<String> = vec![r#"{"k":"v"}"#.into()];
        let (bytes, _) = framed(&cursor, &events).await;

        let value: serde_json::Value =
            serde_json::from_slice(&bytes[..bytes.len() - 1]).unwrap();
        assert_eq!(value["cursor"]["partition"], "2");
        assert_eq!(value["cursor"]["offset"], "010");
        assert_eq!(value["events"][0]["k"], "v");
    }

    #[tokio::test]
    async fn test_keep_alive_parse_has_no_events_key() {
        let cursor = Cursor::new("0", "000");
        let (bytes, _) = framed(&cursor, &[]).await;

        let value: serde_json::Value =
            serde_json::from_slice(&bytes[..bytes.len() - 1]).unwrap();
        assert!(value.get("events").is_none());
    }

    #[tokio::test]
    async fn test_render_matches_write_byte_for_byte() {
        let cursor = Cursor::new("7", "000123");
        let cases: Vec<Vec<String>> = vec![
            vec![],
            vec![r#"{"a":1}"#.into()],
            vec![r#"{"a":1}"#.into(), r#"{"b":[2,3]}"#.into()],
        ];

        for events in cases {
            let (bytes, written) = framed(&cursor, &events).await;
            let rendered = render_batch(&cursor, &events);
            assert_eq!(rendered.as_bytes(), bytes.as_slice());
            assert_eq!(rendered.len(), written);
        }
    }
}
