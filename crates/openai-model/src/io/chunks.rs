#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use objgen_model::ErrorKind;
use reqwest::Response;

/// A mid-stream read failure, classified for the retry taxonomy.
#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the transport error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A byte-chunk source feeding the SSE reader.
pub enum Chunks {
    Response(Response),
    #[cfg(test)]
    Scripted(VecDeque<Bytes>),
}

impl Chunks {
    #[inline]
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    #[cfg(test)]
    pub fn from_vec_deque(chunks: VecDeque<Bytes>) -> Self {
        Chunks::Scripted(chunks)
    }

    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => loop {
                match response.chunk().await {
                    // Empty chunks carry nothing for the parser, skip
                    // them.
                    Ok(Some(bytes)) if bytes.is_empty() => continue,
                    Ok(chunk) => return Ok(chunk),
                    Err(err) => {
                        let kind = if err.is_timeout() {
                            ErrorKind::Timeout
                        } else {
                            ErrorKind::Network
                        };
                        return Err(Error {
                            message: format!("{err}"),
                            kind,
                        });
                    }
                }
            },
            #[cfg(test)]
            Chunks::Scripted(chunks) => Ok(chunks.pop_front()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_chunks_drain_in_order() {
        let mut chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")].into(),
        );
        assert_eq!(chunks.next_chunk().await.unwrap().unwrap(), "a");
        assert_eq!(chunks.next_chunk().await.unwrap().unwrap(), "b");
        assert_eq!(chunks.next_chunk().await.unwrap(), None);
        // A drained source stays drained.
        assert_eq!(chunks.next_chunk().await.unwrap(), None);
    }
}
