// Newline-delimited JSON decoding for streamed route uploads

use futures::{Stream, StreamExt, future};
use std::fmt::Display;
use std::io;
use tokio_util::{
    bytes::Buf,
    codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead},
    io::StreamReader,
};

use crate::routes::WireRoute;
use crate::service::FeedError;

/// Longest line accepted before the upload is abandoned
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Line framing over raw bytes, so a line that is not UTF-8 is rejected as a
/// malformed route instead of ending the upload.
fn line_codec() -> AnyDelimiterCodec {
    AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), MAX_LINE_BYTES)
}

/// Decode one line. Blank lines yield nothing.
fn decode_line(line: &[u8]) -> Option<Result<WireRoute, FeedError>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_slice(line).map_err(|e| FeedError::Malformed(e.to_string())))
}

fn framing_error(e: AnyDelimiterCodecError) -> FeedError {
    match e {
        AnyDelimiterCodecError::MaxChunkLengthExceeded => {
            FeedError::Interrupted(format!("line exceeds {} bytes", MAX_LINE_BYTES))
        }
        AnyDelimiterCodecError::Io(e) => FeedError::Interrupted(e.to_string()),
    }
}

/// Turn a stream of body chunks into a stream of routes.
///
/// Every line completed before a failure is yielded first. A chunk error or
/// an over-long line then becomes a single `Interrupted` item, and the stream
/// ends there.
pub fn route_stream<S, B, E>(chunks: S) -> impl Stream<Item = Result<WireRoute, FeedError>>
where
    S: Stream<Item = Result<B, E>>,
    B: Buf,
    E: Display,
{
    let reader = StreamReader::new(chunks.map(|chunk| chunk.map_err(|e| io::Error::other(e.to_string()))));

    FramedRead::new(reader, line_codec()).filter_map(|frame| {
        future::ready(match frame {
            Ok(line) => decode_line(&line),
            Err(e) => Some(Err(framing_error(e))),
        })
    })
}
