use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Returns `true` if something accepts TCP connections on `localhost:port`.
///
/// Refused, timed-out and unresolvable connects all count as "not bound".
pub fn is_port_bound(port: u16) -> bool {
    let Ok(addrs) = ("localhost", port).to_socket_addrs() else {
        return false;
    };

    addrs
        .into_iter()
        .any(|addr| TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn detects_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(is_port_bound(port));
    }

    #[test]
    fn free_port_is_not_bound() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        assert!(!is_port_bound(port));
    }
}
