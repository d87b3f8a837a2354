use actix_web::http::header::{ACCEPT_RANGES, CONTENT_RANGE, CONTENT_TYPE};
use actix_web::http::StatusCode;
use actix_web::web::Bytes;
use actix_web::HttpResponse;
use futures::Stream;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::streaming::range::Decision;

/// An opened media file together with its size at open time.
///
/// Each request opens its own handle, so read cursors are never shared.
pub struct MediaFile {
    file: File,
    path: PathBuf,
    len: u64,
}

impl MediaFile {
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a regular file", path.display()),
            ));
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
            len: metadata.len(),
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Builds the 200 or 206 response for `decision`, with a body that reads the
/// file incrementally in `chunk_size` pieces.
pub async fn stream(
    media: MediaFile,
    decision: Decision,
    content_type: &str,
    chunk_size: usize,
) -> std::io::Result<HttpResponse> {
    let MediaFile { mut file, path, .. } = media;

    let (mut response, start, length) = match decision {
        Decision::FullBody { length } => (HttpResponse::Ok(), 0, length),
        Decision::Partial(range) => {
            let mut builder = HttpResponse::build(StatusCode::PARTIAL_CONTENT);
            builder.insert_header((CONTENT_RANGE, range.content_range()));
            (builder, range.start, range.chunk_length())
        }
    };

    if start > 0 {
        file.seek(SeekFrom::Start(start)).await?;
    }

    debug!(
        "Streaming {} bytes from {} starting at offset {}",
        length,
        path.display(),
        start
    );

    let body = FileBody::new(file.take(length), chunk_size, length, path);

    Ok(response
        .insert_header((CONTENT_TYPE, content_type.to_string()))
        .insert_header((ACCEPT_RANGES, "bytes"))
        .no_chunking(length)
        .streaming(body))
}

/// Response body over a length-limited file reader.
///
/// Dropping it early (the client went away) just closes the file.
struct FileBody {
    inner: ReaderStream<Take<File>>,
    path: PathBuf,
    expected: u64,
    sent: u64,
}

impl FileBody {
    fn new(reader: Take<File>, chunk_size: usize, expected: u64, path: PathBuf) -> Self {
        Self {
            inner: ReaderStream::with_capacity(reader, chunk_size),
            path,
            expected,
            sent: 0,
        }
    }
}

impl Stream for FileBody {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &poll {
            self.sent += chunk.len() as u64;
        }
        poll
    }
}

impl Drop for FileBody {
    fn drop(&mut self) {
        if self.sent < self.expected {
            debug!(
                "Stream of {} ended after {}/{} bytes",
                self.path.display(),
                self.sent,
                self.expected
            );
        }
    }
}
