//! Result sets: queries, subscriptions and batch retrieval
//!
//! ## Lifecycle
//!
//! ```text
//! Session ──borrows── ResultSet<'s> ──borrows── EventBatch<'r> ── Event<'r>
//! ```
//!
//! A result set is advanced only by [`ResultSet::next`]. For queries the
//! stream ends with [`Error::EndOfStream`]; for subscriptions `next` blocks
//! up to the timeout and reports [`Error::Timeout`] when nothing arrived.

use std::fmt;
use std::marker::PhantomData;
use std::ops::BitOr;
use std::sync::Arc;
use std::time::Duration;

use evtlog_core::error::{ERROR_INVALID_DATA, ERROR_NO_MORE_ITEMS, ERROR_TIMEOUT};
use evtlog_core::{Error, PlatformError, Result};
use tracing::{trace, warn};

use crate::batch::{Event, EventBatch};
use crate::handle::{Handle, HandleKind};
use crate::platform::{is_usable, EvtApi, RawHandle, NULL_HANDLE};
use crate::session::Session;
use crate::wide::to_wide;

/// Default wait for `next` when the caller gives none
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Query flags, passed to the platform untouched
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryFlags(u32);

impl QueryFlags {
    /// The path names a channel
    pub const CHANNEL_PATH: Self = Self(0x1);
    /// The path names a log file
    pub const FILE_PATH: Self = Self(0x2);
    /// Oldest event first
    pub const FORWARD_DIRECTION: Self = Self(0x100);
    /// Newest event first
    pub const REVERSE_DIRECTION: Self = Self(0x200);
    /// Return what can be read even if part of the query fails
    pub const TOLERATE_QUERY_ERRORS: Self = Self(0x1000);

    /// No flags
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Wrap raw bits
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Check if every bit of `other` is set
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for QueryFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for QueryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryFlags({:#x})", self.0)
    }
}

/// Where a subscription starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscribeFrom {
    /// Only events published after the subscription opens
    FutureEvents,
    /// Everything in the channel, then new events as they arrive
    OldestRecord,
}

impl SubscribeFrom {
    /// Platform flag bits
    pub const fn flags(&self) -> u32 {
        match self {
            SubscribeFrom::FutureEvents => 1,
            SubscribeFrom::OldestRecord => 2,
        }
    }
}

/// How a result set was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSetKind {
    /// Finite query
    Query,
    /// Open-ended pull subscription
    Subscription,
}

/// An open query or subscription
///
/// Borrows the [`Session`] it was opened through; local result sets are
/// `ResultSet<'static>`.
#[derive(Debug)]
pub struct ResultSet<'s> {
    handle: Handle,
    kind: ResultSetKind,
    _session: PhantomData<&'s ()>,
}

impl<'s> ResultSet<'s> {
    /// Query a channel or log file
    ///
    /// A platform that reports success but hands back the null or invalid
    /// sentinel yields [`Error::InvalidQuery`].
    pub fn query(
        api: Arc<dyn EvtApi>,
        session: Option<&'s Session>,
        path: &str,
        query: &str,
        flags: QueryFlags,
    ) -> Result<Self> {
        let path_w = to_wide(path)?;
        let query_w = to_wide(query)?;
        let session_raw = session_raw(session)?;

        let raw = api
            .query(session_raw, &path_w, &query_w, flags.bits())
            .map_err(|e| Error::platform("EvtQuery", e))?;
        if !is_usable(raw) {
            return Err(Error::InvalidQuery {
                path: path.to_string(),
                query: query.to_string(),
            });
        }
        Ok(Self::new(api, raw, ResultSetKind::Query))
    }

    /// Open a pull subscription on `channel`
    pub fn subscribe(
        api: Arc<dyn EvtApi>,
        session: Option<&'s Session>,
        channel: &str,
        query: &str,
        from: SubscribeFrom,
    ) -> Result<Self> {
        let channel_w = to_wide(channel)?;
        let query_w = to_wide(query)?;
        let session_raw = session_raw(session)?;

        let raw = api
            .subscribe(session_raw, &channel_w, &query_w, from.flags())
            .map_err(|e| Error::platform("EvtSubscribe", e))?;
        if !is_usable(raw) {
            return Err(Error::InvalidQuery {
                path: channel.to_string(),
                query: query.to_string(),
            });
        }
        Ok(Self::new(api, raw, ResultSetKind::Subscription))
    }

    fn new(api: Arc<dyn EvtApi>, raw: RawHandle, kind: ResultSetKind) -> Self {
        Self {
            handle: Handle::new(api, raw, HandleKind::ResultSet),
            kind,
            _session: PhantomData,
        }
    }

    /// Query or subscription
    pub fn kind(&self) -> ResultSetKind {
        self.kind
    }

    /// Raw value for passing to the platform
    pub fn raw(&self) -> Result<RawHandle> {
        self.handle.raw()
    }

    /// Retrieve up to `count` events
    ///
    /// `timeout` defaults to [`DEFAULT_TIMEOUT`]. A `count` of zero returns an
    /// empty batch without touching the platform.
    ///
    /// # Errors
    ///
    /// - [`Error::EndOfStream`] once a query has been read to the end
    /// - [`Error::Timeout`] when a subscription saw nothing within `timeout`
    /// - [`Error::Platform`] for anything else; handles the platform wrote
    ///   before failing are released first
    pub fn next(&self, count: u32, timeout: Option<Duration>) -> Result<EventBatch<'_>> {
        if count == 0 {
            return Ok(EventBatch::empty());
        }
        let raw = self.handle.raw()?;
        let timeout_ms = timeout_millis(timeout.unwrap_or(DEFAULT_TIMEOUT));
        let api = self.handle.api();

        let mut out = vec![NULL_HANDLE; count as usize];
        match api.next(raw, &mut out, timeout_ms) {
            Ok(filled) if filled > out.len() => {
                release_written(&**api, &out);
                Err(Error::platform(
                    "EvtNext",
                    PlatformError::new(
                        ERROR_INVALID_DATA,
                        format!("reported {} events for a batch of {}", filled, count),
                    ),
                ))
            }
            Ok(filled) => {
                out.truncate(filled);
                trace!(requested = count, filled, "retrieved batch");
                let events = out
                    .into_iter()
                    .map(|h| Event::new(Handle::new(api.clone(), h, HandleKind::Event)))
                    .collect();
                Ok(EventBatch::new(events))
            }
            Err(e) => {
                let released = release_written(&**api, &out);
                if released > 0 {
                    warn!(
                        released,
                        code = e.code,
                        "released events written by a failed EvtNext"
                    );
                }
                match e.code {
                    ERROR_NO_MORE_ITEMS => {
                        trace!("end of stream");
                        Err(Error::EndOfStream)
                    }
                    ERROR_TIMEOUT => {
                        trace!(timeout_ms, "no events before timeout");
                        Err(Error::Timeout { timeout_ms })
                    }
                    _ => Err(Error::platform("EvtNext", e)),
                }
            }
        }
    }

    /// Iterate batches of up to `count` events until the end of the stream
    pub fn batches(&self, count: u32, timeout: Option<Duration>) -> Batches<'_, 's> {
        Batches {
            result_set: self,
            count,
            timeout,
            done: count == 0,
        }
    }

    /// Release the result set
    pub fn close(mut self) {
        self.handle.close();
    }
}

fn session_raw(session: Option<&Session>) -> Result<RawHandle> {
    match session {
        Some(s) => s.raw(),
        None => Ok(NULL_HANDLE),
    }
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

/// Close every usable handle in `out`, returning how many were closed
fn release_written(api: &dyn EvtApi, out: &[RawHandle]) -> usize {
    let mut released = 0;
    for &raw in out.iter().filter(|&&raw| is_usable(raw)) {
        api.close(raw);
        released += 1;
    }
    released
}

/// Iterator over the batches of a result set
///
/// Ends cleanly at [`Error::EndOfStream`]. Any other error is yielded once,
/// after which the iterator is exhausted.
#[derive(Debug)]
pub struct Batches<'r, 's> {
    result_set: &'r ResultSet<'s>,
    count: u32,
    timeout: Option<Duration>,
    done: bool,
}

impl<'r, 's> Iterator for Batches<'r, 's> {
    type Item = Result<EventBatch<'r>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.result_set.next(self.count, self.timeout) {
            Ok(batch) => Some(Ok(batch)),
            Err(Error::EndOfStream) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Batches<'_, '_> {}
