//! Response body type shared by the gateway and the static server.
//!
//! Upstream bodies and local files are both streamed frame by frame; nothing
//! on the dispatch path collects a body into memory.

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body::{Body, Frame};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Empty, Full, StreamBody};
use tokio_util::io::ReaderStream;

/// Boxed error carried by streamed bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body type of every response the servers produce.
pub type ProxyBody = UnsyncBoxBody<Bytes, BoxError>;

pub fn empty() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn full(data: impl Into<Bytes>) -> ProxyBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Box any body, e.g. a hyper `Incoming`, without buffering it.
pub fn from_body<B>(body: B) -> ProxyBody
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

/// Stream an open file.
pub fn from_file(file: tokio::fs::File) -> ProxyBody {
    let frames = ReaderStream::new(file)
        .map_ok(Frame::data)
        .map_err(BoxError::from);
    StreamBody::new(frames).boxed_unsync()
}
