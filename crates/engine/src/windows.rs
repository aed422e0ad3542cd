//! `wevtapi.dll` backend

use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr;

use evtlog_core::error::{ERROR_INSUFFICIENT_BUFFER, ERROR_NO_MORE_ITEMS, ERROR_TIMEOUT};
use evtlog_core::PlatformError;
use parking_lot::Mutex;
use tracing::debug;
use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, WAIT_OBJECT_0};
use windows_sys::Win32::System::EventLog::{
    EvtClose, EvtCreateRenderContext, EvtNext, EvtOpenSession, EvtQuery, EvtRender, EvtRpcLogin,
    EvtSubscribe, EVT_RPC_LOGIN,
};
use windows_sys::Win32::System::Threading::{CreateEventW, WaitForSingleObject};

use crate::platform::{is_usable, EvtApi, RawHandle, RenderBuffer, RenderOutcome, NULL_HANDLE};
use crate::wide::from_wide;

const RENDER_EVENT_VALUES: u32 = 0;
const RENDER_EVENT_XML: u32 = 1;

fn last_error() -> PlatformError {
    // SAFETY: reads thread-local error state only.
    PlatformError::from_code(unsafe { GetLastError() })
}

fn checked(raw: RawHandle) -> Result<RawHandle, PlatformError> {
    if raw == NULL_HANDLE {
        Err(last_error())
    } else {
        Ok(raw)
    }
}

fn buffer_len(bytes: usize) -> u32 {
    u32::try_from(bytes).unwrap_or(u32::MAX)
}

/// The local machine's event log service
///
/// Subscriptions are signalled through an auto-reset event, so `next` on a
/// subscription can wait for new events up to its timeout.
#[derive(Debug, Default)]
pub struct WindowsPlatform {
    // subscription handle -> signal event handle
    signals: Mutex<HashMap<RawHandle, isize>>,
}

impl WindowsPlatform {
    /// Bind to the local service
    pub fn new() -> Self {
        Self::default()
    }

    fn next_once(
        &self,
        result_set: RawHandle,
        events: &mut [RawHandle],
        timeout_ms: u32,
    ) -> Result<usize, PlatformError> {
        let mut returned = 0u32;
        // SAFETY: `events` is a writable array of `events.len()` handles.
        let ok = unsafe {
            EvtNext(
                result_set as _,
                buffer_len(events.len()),
                events.as_mut_ptr() as _,
                timeout_ms,
                0,
                &mut returned,
            )
        };
        if ok == 0 {
            return Err(last_error());
        }
        Ok(returned as usize)
    }
}

// SAFETY: EvtRender lays out EVT_VARIANT values whose pointers reference the
// caller's buffer, which is exactly the render contract.
unsafe impl EvtApi for WindowsPlatform {
    fn open_session(&self, server: &[u16]) -> Result<RawHandle, PlatformError> {
        let mut server = server.to_vec();
        let login = EVT_RPC_LOGIN {
            Server: server.as_mut_ptr(),
            User: ptr::null_mut(),
            Domain: ptr::null_mut(),
            Password: ptr::null_mut(),
            Flags: 0,
        };
        // SAFETY: `login` and the server string outlive the call.
        let raw = unsafe {
            EvtOpenSession(EvtRpcLogin, &login as *const EVT_RPC_LOGIN as *const c_void, 0, 0)
        };
        checked(raw as RawHandle)
    }

    fn create_render_context(&self, paths: &[&[u16]], flags: u32) -> Result<RawHandle, PlatformError> {
        let pointers: Vec<*const u16> = paths.iter().map(|p| p.as_ptr()).collect();
        let table = if pointers.is_empty() {
            ptr::null()
        } else {
            pointers.as_ptr()
        };
        // SAFETY: `table` holds `pointers.len()` NUL-terminated strings, or is null with a zero count.
        let raw = unsafe { EvtCreateRenderContext(buffer_len(pointers.len()), table as _, flags) };
        checked(raw as RawHandle)
    }

    fn query(
        &self,
        session: RawHandle,
        path: &[u16],
        query: &[u16],
        flags: u32,
    ) -> Result<RawHandle, PlatformError> {
        // SAFETY: both strings are NUL-terminated and live for the call.
        let raw = unsafe { EvtQuery(session as _, path.as_ptr(), query.as_ptr(), flags) };
        checked(raw as RawHandle)
    }

    fn subscribe(
        &self,
        session: RawHandle,
        channel: &[u16],
        query: &[u16],
        flags: u32,
    ) -> Result<RawHandle, PlatformError> {
        // SAFETY: unnamed auto-reset event, initially unsignalled.
        let signal = unsafe { CreateEventW(ptr::null(), 0, 0, ptr::null()) };
        if signal.is_null() {
            return Err(last_error());
        }
        // SAFETY: strings are NUL-terminated; no bookmark, context or callback.
        let raw = unsafe {
            EvtSubscribe(
                session as _,
                signal,
                channel.as_ptr(),
                query.as_ptr(),
                0 as _,
                ptr::null(),
                None,
                flags,
            )
        } as RawHandle;
        if raw == NULL_HANDLE {
            let err = last_error();
            // SAFETY: `signal` was created above and is not shared.
            unsafe { CloseHandle(signal) };
            return Err(err);
        }
        self.signals.lock().insert(raw, signal as isize);
        Ok(raw)
    }

    fn next(
        &self,
        result_set: RawHandle,
        events: &mut [RawHandle],
        timeout_ms: u32,
    ) -> Result<usize, PlatformError> {
        let signal = self.signals.lock().get(&result_set).copied();
        let Some(signal) = signal else {
            return self.next_once(result_set, events, timeout_ms);
        };
        match self.next_once(result_set, events, 0) {
            Err(e) if e.code == ERROR_NO_MORE_ITEMS => {
                // SAFETY: `signal` stays open until the subscription is closed.
                let waited = unsafe { WaitForSingleObject(signal as _, timeout_ms) };
                if waited != WAIT_OBJECT_0 {
                    return Err(PlatformError::from_code(ERROR_TIMEOUT));
                }
                match self.next_once(result_set, events, 0) {
                    Err(e) if e.code == ERROR_NO_MORE_ITEMS => {
                        Err(PlatformError::from_code(ERROR_TIMEOUT))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    fn render_values(
        &self,
        context: RawHandle,
        event: RawHandle,
        buffer: &mut RenderBuffer,
    ) -> Result<RenderOutcome, PlatformError> {
        let mut used = 0u32;
        let mut count = 0u32;
        // SAFETY: the buffer is writable for `buffer.len()` bytes and 8-byte aligned.
        let ok = unsafe {
            EvtRender(
                context as _,
                event as _,
                RENDER_EVENT_VALUES,
                buffer_len(buffer.len()),
                buffer.as_mut_ptr() as *mut c_void,
                &mut used,
                &mut count,
            )
        };
        if ok == 0 {
            let err = last_error();
            if err.code == ERROR_INSUFFICIENT_BUFFER {
                return Ok(RenderOutcome::InsufficientBuffer {
                    required: used as usize,
                });
            }
            return Err(err);
        }
        Ok(RenderOutcome::Rendered {
            count: count as usize,
        })
    }

    fn render_xml(&self, event: RawHandle) -> Result<String, PlatformError> {
        let mut text: Vec<u16> = Vec::new();
        loop {
            let mut used = 0u32;
            let mut count = 0u32;
            let bytes = text.len() * 2;
            // SAFETY: `text` is writable for `bytes` bytes (null when empty).
            let ok = unsafe {
                EvtRender(
                    NULL_HANDLE as _,
                    event as _,
                    RENDER_EVENT_XML,
                    buffer_len(bytes),
                    if text.is_empty() {
                        ptr::null_mut()
                    } else {
                        text.as_mut_ptr() as *mut c_void
                    },
                    &mut used,
                    &mut count,
                )
            };
            if ok != 0 {
                return Ok(from_wide(&text));
            }
            let err = last_error();
            if err.code != ERROR_INSUFFICIENT_BUFFER || (used as usize) <= bytes {
                return Err(err);
            }
            text = vec![0; (used as usize + 1) / 2];
        }
    }

    fn close(&self, handle: RawHandle) {
        if !is_usable(handle) {
            return;
        }
        // SAFETY: the caller owns `handle` and releases it once.
        unsafe { EvtClose(handle as _) };
        if let Some(signal) = self.signals.lock().remove(&handle) {
            // SAFETY: the subscription using this event is closed.
            unsafe { CloseHandle(signal as _) };
        }
        debug!(raw = handle, "EvtClose");
    }
}
