/// The kind of error that occurred at the transport level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The endpoint could not be reached, or the connection dropped.
    Network,
    /// The endpoint reported a server-side failure (5xx class).
    ServerError,
    /// The endpoint is rate limiting the caller.
    RateLimitExceeded,
    /// The request did not complete within the transport's own deadline.
    Timeout,
    /// The credentials were rejected by the endpoint.
    Unauthorized,
    /// The endpoint rejected the request itself (4xx class other than
    /// rate limiting and authentication).
    InvalidRequest,
    /// The content was refused by the endpoint's moderation layer.
    Moderated,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Whether a request failing with this kind may be retried.
    ///
    /// Network failures, server-side failures, rate limiting and
    /// timeouts are transient; everything else is not going to change
    /// on a resubmission of the same request.
    #[inline]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network
                | ErrorKind::ServerError
                | ErrorKind::RateLimitExceeded
                | ErrorKind::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::ServerError.is_retryable());
        assert!(ErrorKind::RateLimitExceeded.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());

        assert!(!ErrorKind::Unauthorized.is_retryable());
        assert!(!ErrorKind::InvalidRequest.is_retryable());
        assert!(!ErrorKind::Moderated.is_retryable());
        assert!(!ErrorKind::Other.is_retryable());
    }
}
