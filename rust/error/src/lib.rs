// Error codes follow the numbering of the gRPC status codes
// (https://grpc.github.io/grpc/core/md_doc_statuscodes.html) so that errors
// coming back from a vector database SDK can be mapped without loss.
use std::error::Error;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum ErrorCodes {
    // CANCELLED: the caller gave up on the operation.
    Cancelled = 1,
    // UNKNOWN: the remote side did not say what went wrong.
    Unknown = 2,
    // INVALID_ARGUMENT: configuration or request values are unusable.
    InvalidArgument = 3,
    // DEADLINE_EXCEEDED: the operation ran out of time or attempts.
    DeadlineExceeded = 4,
    // NOT_FOUND: a collection, partition or index is missing.
    NotFound = 5,
    // ALREADY_EXISTS: a create call lost a race against another writer.
    AlreadyExists = 6,
    // FAILED_PRECONDITION: the remote state does not allow the operation.
    FailedPrecondition = 9,
    // ABORTED: the remote state changed underneath the operation.
    Aborted = 10,
    // INTERNAL: invariants of this crate or of the remote side are broken.
    Internal = 13,
    // UNAVAILABLE: the remote service could not be reached.
    Unavailable = 14,
}

impl ErrorCodes {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCodes::InvalidArgument => "InvalidArgumentError",
            ErrorCodes::NotFound => "NotFoundError",
            ErrorCodes::FailedPrecondition => "FailedPreconditionError",
            ErrorCodes::Internal => "InternalError",
            _ => "TesseraError",
        }
    }

    /// Whether retrying the whole top-level operation can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCodes::Unavailable
                | ErrorCodes::DeadlineExceeded
                | ErrorCodes::Aborted
                | ErrorCodes::Unknown
        )
    }
}

pub trait TesseraError: Error + Send {
    fn code(&self) -> ErrorCodes;
    fn boxed(self) -> Box<dyn TesseraError>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
    fn should_trace_error(&self) -> bool {
        true
    }
}

impl Error for Box<dyn TesseraError> {}

impl TesseraError for Box<dyn TesseraError> {
    fn code(&self) -> ErrorCodes {
        self.as_ref().code()
    }

    fn should_trace_error(&self) -> bool {
        self.as_ref().should_trace_error()
    }
}

impl TesseraError for std::io::Error {
    fn code(&self) -> ErrorCodes {
        match self.kind() {
            std::io::ErrorKind::NotFound => ErrorCodes::NotFound,
            std::io::ErrorKind::TimedOut => ErrorCodes::DeadlineExceeded,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted => ErrorCodes::Unavailable,
            _ => ErrorCodes::Unknown,
        }
    }
}
