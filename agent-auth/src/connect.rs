//! TCP connection to the registration service.

use tokio::net::TcpStream;

use crate::error::EnrollError;

/// Open a TCP connection to `host:port`.
///
/// `host` may be a host name or an IP literal. A single attempt is made;
/// every resolved address is tried once before giving up.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream, EnrollError> {
    tracing::debug!(host, port, "connecting");
    TcpStream::connect((host, port))
        .await
        .map_err(|source| EnrollError::Connection {
            addr: display_addr(host, port),
            source,
        })
}

/// Format `host:port`, bracketing IPv6 literals.
pub fn display_addr(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
