use thiserror::Error;

/// Transport-level failure reported by the transport client.
///
/// The loader never interprets these; it relays them to the frame owner
/// wrapped in [`LoadError::TransportFailure`](crate::base::error::LoadError).
/// Codes follow Chromium's `net_error_list.h` so values survive a trip
/// through an FFI or IPC boundary.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NetError {
    // Generic
    #[error("Operation failed")]
    Failed,
    #[error("Operation aborted")]
    Aborted,
    #[error("Invalid argument")]
    InvalidArgument,
    #[error("File not found")]
    FileNotFound,
    #[error("Operation timed out")]
    TimedOut,
    #[error("Access denied")]
    AccessDenied,
    #[error("Blocked by client")]
    BlockedByClient,
    #[error("Network changed")]
    NetworkChanged,
    #[error("Blocked by response")]
    BlockedByResponse,

    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Internet disconnected")]
    InternetDisconnected,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("No buffer space")]
    NoBufferSpace,

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,
    #[error("Invalid redirect")]
    InvalidRedirect,
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Unsafe redirect")]
    UnsafeRedirect,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Empty response")]
    EmptyResponse,
    #[error("Content-Length mismatch")]
    ContentLengthMismatch,
    #[error("Content decoding failed")]
    ContentDecodingFailed,
    #[error("Invalid HTTP response")]
    InvalidHttpResponse,

    // Edge case errors (custom codes starting at -10000)
    #[error("Malformed multipart body")]
    MalformedMultipart,

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::Failed => -2,
            NetError::Aborted => -3,
            NetError::InvalidArgument => -4,
            NetError::FileNotFound => -6,
            NetError::TimedOut => -7,
            NetError::AccessDenied => -10,
            NetError::BlockedByClient => -20,
            NetError::NetworkChanged => -21,
            NetError::BlockedByResponse => -27,

            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::NameNotResolved => -105,
            NetError::InternetDisconnected => -106,
            NetError::SslProtocolError => -107,
            NetError::ConnectionTimedOut => -118,
            NetError::NoBufferSpace => -176,

            NetError::InvalidUrl => -300,
            NetError::DisallowedUrlScheme => -301,
            NetError::UnknownUrlScheme => -302,
            NetError::InvalidRedirect => -303,
            NetError::TooManyRedirects => -310,
            NetError::UnsafeRedirect => -311,
            NetError::InvalidResponse => -320,
            NetError::EmptyResponse => -324,
            NetError::ContentDecodingFailed => -330,
            NetError::ContentLengthMismatch => -354,
            NetError::InvalidHttpResponse => -370,

            NetError::MalformedMultipart => -10000,
            NetError::Unknown(code) => *code,
        }
    }

    /// Whether this error means the load was stopped on purpose rather than broken.
    pub fn is_abort(&self) -> bool {
        matches!(self, NetError::Aborted | NetError::BlockedByClient)
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -2 => NetError::Failed,
            -3 => NetError::Aborted,
            -4 => NetError::InvalidArgument,
            -6 => NetError::FileNotFound,
            -7 => NetError::TimedOut,
            -10 => NetError::AccessDenied,
            -20 => NetError::BlockedByClient,
            -21 => NetError::NetworkChanged,
            -27 => NetError::BlockedByResponse,

            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -106 => NetError::InternetDisconnected,
            -107 => NetError::SslProtocolError,
            -118 => NetError::ConnectionTimedOut,
            -176 => NetError::NoBufferSpace,

            -300 => NetError::InvalidUrl,
            -301 => NetError::DisallowedUrlScheme,
            -302 => NetError::UnknownUrlScheme,
            -303 => NetError::InvalidRedirect,
            -310 => NetError::TooManyRedirects,
            -311 => NetError::UnsafeRedirect,
            -320 => NetError::InvalidResponse,
            -324 => NetError::EmptyResponse,
            -330 => NetError::ContentDecodingFailed,
            -354 => NetError::ContentLengthMismatch,
            -370 => NetError::InvalidHttpResponse,

            -10000 => NetError::MalformedMultipart,
            _ => NetError::Unknown(code),
        }
    }
}
