//! Remote sessions

use std::sync::Arc;

use evtlog_core::error::ERROR_INVALID_HANDLE;
use evtlog_core::{Error, PlatformError, Result};

use crate::handle::{Handle, HandleKind};
use crate::platform::{is_usable, EvtApi, RawHandle};
use crate::wide::to_wide;

/// A session on a remote machine
///
/// Result sets opened through a session borrow it, so a session cannot be
/// closed while any of them is alive. Where a session is optional, `None`
/// means the local machine.
#[derive(Debug)]
pub struct Session {
    handle: Handle,
    server: String,
}

impl Session {
    /// Open a session on `server` with the caller's default credentials
    pub fn open(api: Arc<dyn EvtApi>, server: &str) -> Result<Self> {
        if server.is_empty() {
            return Err(Error::InvalidArgument("server name is empty".to_string()));
        }
        let wide = to_wide(server)?;
        let raw = api
            .open_session(&wide)
            .map_err(|e| Error::platform("EvtOpenSession", e))?;
        if !is_usable(raw) {
            return Err(Error::platform(
                "EvtOpenSession",
                PlatformError::new(
                    ERROR_INVALID_HANDLE,
                    format!("session to {:?} returned an unusable handle", server),
                ),
            ));
        }
        Ok(Self {
            handle: Handle::new(api, raw, HandleKind::Session),
            server: server.to_string(),
        })
    }

    /// Server this session is connected to
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Raw value for passing to the platform
    pub fn raw(&self) -> Result<RawHandle> {
        self.handle.raw()
    }

    /// Release the session
    pub fn close(mut self) {
        self.handle.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimCall, SimulatedPlatform};
    use evtlog_core::error::ERROR_INVALID_PARAMETER;

    #[test]
    fn test_open_and_close() {
        let sim = Arc::new(SimulatedPlatform::new());
        let session = Session::open(sim.clone(), "collector01").unwrap();
        assert_eq!(session.server(), "collector01");
        assert_eq!(sim.open_handles(), 1);
        session.close();
        assert_eq!(sim.open_handles(), 0);
    }

    #[test]
    fn test_empty_server_rejected() {
        let sim = Arc::new(SimulatedPlatform::new());
        assert!(Session::open(sim.clone(), "").unwrap_err().is_invalid_input());
        assert_eq!(sim.open_handles(), 0);
    }

    #[test]
    fn test_unusable_handle_is_a_platform_error() {
        let sim = Arc::new(SimulatedPlatform::new());
        sim.return_invalid_handle_for("collector01");
        let err = Session::open(sim.clone(), "collector01").unwrap_err();
        assert_eq!(err.platform_code(), Some(ERROR_INVALID_HANDLE));
        assert!(!err.is_invalid_input());
        assert_eq!(sim.open_handles(), 0);
        assert_eq!(sim.close_calls(), 0);
    }

    #[test]
    fn test_platform_failure_is_reported() {
        let sim = Arc::new(SimulatedPlatform::new());
        sim.inject_fault(SimCall::OpenSession, ERROR_INVALID_PARAMETER);
        let err = Session::open(sim, "host").unwrap_err();
        assert_eq!(err.platform_code(), Some(ERROR_INVALID_PARAMETER));
    }
}
