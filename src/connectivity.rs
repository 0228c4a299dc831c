//! Connectivity check used to classify remote failures.
//!
//! When a fetch fails, the repository asks this check whether the machine is
//! online at all: offline failures and server-side failures surface to the
//! UI as different error kinds. The check is consulted only on the failure
//! path, never to gate a fetch.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

/// Answers whether the process currently has network connectivity.
pub trait Connectivity: Send + Sync {
  fn is_connected(&self) -> bool;
}

/// Connectivity check that attempts a short TCP connect to the API host.
pub struct TcpProbe {
  host: String,
  port: u16,
  timeout: Duration,
}

impl TcpProbe {
  pub fn new(host: impl Into<String>, port: u16) -> Self {
    Self {
      host: host.into(),
      port,
      timeout: Duration::from_secs(2),
    }
  }
}

impl Connectivity for TcpProbe {
  fn is_connected(&self) -> bool {
    let addrs = match (self.host.as_str(), self.port).to_socket_addrs() {
      Ok(addrs) => addrs,
      Err(e) => {
        debug!("connectivity probe: name resolution failed: {e}");
        return false;
      }
    };

    for addr in addrs {
      if TcpStream::connect_timeout(&addr, self.timeout).is_ok() {
        return true;
      }
    }
    debug!("connectivity probe: no address of {} reachable", self.host);
    false
  }
}

#[cfg(test)]
pub(crate) mod test_support {
  use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

  use super::Connectivity;

  /// Fixed connectivity answer, counting how often it was consulted.
  pub struct FakeConnectivity {
    connected: AtomicBool,
    pub checks: AtomicU32,
  }

  impl FakeConnectivity {
    pub fn new(connected: bool) -> Self {
      Self {
        connected: AtomicBool::new(connected),
        checks: AtomicU32::new(0),
      }
    }
  }

  impl Connectivity for FakeConnectivity {
    fn is_connected(&self) -> bool {
      self.checks.fetch_add(1, Ordering::SeqCst);
      self.connected.load(Ordering::SeqCst)
    }
  }
}
