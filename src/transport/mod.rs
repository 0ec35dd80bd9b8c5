//! Transport bindings for the capability server.
//!
//! Two bindings share one dispatcher:
//!
//! - **Stdio** (`stdio`): a single duplex stream over stdin/stdout. One
//!   implicit session; process lifetime is session lifetime. Requests are
//!   handled strictly one at a time.
//! - **SSE** (`sse`): an HTTP service where each accepted connection opens
//!   an independent session with its own outbound event stream. The server
//!   outlives any individual client.
//!
//! Both decode framed requests into dispatcher requests and encode the
//! dispatcher's responses back onto their channel; neither owns any
//! dispatch logic.

pub mod sse;
pub mod stdio;

pub use sse::SseServer;
pub use stdio::StdioServer;

// ---------------------------------------------------------------------------
// TransportKind
// ---------------------------------------------------------------------------

/// The transport a session arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Single duplex stream on stdin/stdout.
    Stdio,
    /// Server-Sent Events service; one session per connection.
    Sse,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::Sse => write!(f, "sse"),
        }
    }
}

impl TransportKind {
    /// Parse a transport kind from a string.
    ///
    /// # Arguments
    ///
    /// * `s` - String to parse (case-insensitive).
    ///
    /// # Returns
    ///
    /// The matching `TransportKind`, or `None` if the string is not
    /// recognized.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stdio" => Some(TransportKind::Stdio),
            "sse" => Some(TransportKind::Sse),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_display() {
        assert_eq!(TransportKind::Stdio.to_string(), "stdio");
        assert_eq!(TransportKind::Sse.to_string(), "sse");
    }

    #[test]
    fn test_transport_kind_from_str() {
        assert_eq!(TransportKind::from_str_opt("stdio"), Some(TransportKind::Stdio));
        assert_eq!(TransportKind::from_str_opt("sse"), Some(TransportKind::Sse));
        assert_eq!(TransportKind::from_str_opt("SSE"), Some(TransportKind::Sse));
        assert_eq!(TransportKind::from_str_opt("websocket"), None);
    }
}
