//! In-memory event log service
//!
//! [`SimulatedPlatform`] implements [`EvtApi`] over named channels held in
//! memory. It renders into the same raw layout as the real service, so the
//! whole engine (including the decoder) runs unchanged against it.
//!
//! Beyond serving events it is a test harness:
//!
//! - counts open handles, so leaks are observable
//! - records [`Misuse`], such as releasing a parent before its children
//! - injects faults: one-shot error codes per call, partial `next`
//!   failures, over-reported batch sizes, invalid query handles
//!
//! Only the match-all query (`*`, or empty) is understood.

mod marshal;

pub(crate) use marshal::{marshal, Field};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use evtlog_core::error::{
    ERROR_EVT_CHANNEL_NOT_FOUND, ERROR_EVT_INVALID_QUERY, ERROR_INVALID_HANDLE,
    ERROR_INVALID_PARAMETER, ERROR_NO_MORE_ITEMS, ERROR_TIMEOUT,
};
use evtlog_core::{FileTime, PlatformError, Sid, Variant};
use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::platform::{
    is_usable, EvtApi, RawHandle, RenderBuffer, RenderOutcome, INVALID_HANDLE,
    RENDER_CONTEXT_SYSTEM, RENDER_CONTEXT_USER, RENDER_CONTEXT_VALUES,
};
use crate::wide::from_wide;

const FLAG_FILE_PATH: u32 = 0x2;
const FLAG_REVERSE_DIRECTION: u32 = 0x200;
const FLAG_TOLERATE_QUERY_ERRORS: u32 = 0x1000;
const SUBSCRIBE_FUTURE_EVENTS: u32 = 1;
const SUBSCRIBE_OLDEST_RECORD: u32 = 2;

const FIRST_HANDLE: RawHandle = 0x100;
const HANDLE_STRIDE: RawHandle = 4;

/// Platform calls that can have faults injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimCall {
    /// `open_session`
    OpenSession,
    /// `create_render_context`
    CreateRenderContext,
    /// `query`
    Query,
    /// `subscribe`
    Subscribe,
    /// `next`
    Next,
    /// `render_values`
    Render,
    /// `render_xml`
    RenderXml,
}

/// Incorrect handle use observed by the simulated platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Misuse {
    /// A handle was released while handles derived from it were still open
    ParentClosedWithOpenChildren {
        /// The released handle
        parent: RawHandle,
        /// What it was
        kind: &'static str,
        /// Children still open at the time
        open_children: usize,
    },
    /// A call named a handle that is not open
    UnknownHandle {
        /// The call
        call: &'static str,
        /// The offending value
        raw: RawHandle,
    },
}

/// An event stored in a simulated channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimEvent {
    record_id: Option<u64>,
    system: Vec<Field>,
    user: Vec<Field>,
    values: Vec<(String, Field)>,
    xml: Option<String>,
}

impl SimEvent {
    /// An event with no properties
    pub fn new() -> Self {
        Self::default()
    }

    /// A typical system event with record id `record_id`
    ///
    /// Carries system properties (provider, event id, level, time created,
    /// record id, channel, computer, user) in that order, the same values
    /// under their `Event/System/...` paths, and one user property holding
    /// the record id as a string.
    pub fn record(channel: &str, record_id: u64) -> Self {
        let created = FileTime::from_ticks(133_000_000_000_000_000 + record_id * 10_000_000);
        let user = Sid {
            revision: 1,
            authority: [0, 0, 0, 0, 0, 5],
            sub_authorities: vec![18],
        };
        let properties = [
            ("Event/System/Provider/@Name", Variant::String("SimProvider".into())),
            ("Event/System/EventID", Variant::UInt16((record_id % 65_536) as u16)),
            ("Event/System/Level", Variant::Byte(4)),
            ("Event/System/TimeCreated/@SystemTime", Variant::FileTime(created)),
            ("Event/System/EventRecordID", Variant::UInt64(record_id)),
            ("Event/System/Channel", Variant::String(channel.to_string())),
            ("Event/System/Computer", Variant::String("sim-host".into())),
            ("Event/System/Security/@UserID", Variant::Sid(user)),
        ];
        let mut event = Self::new();
        event.record_id = Some(record_id);
        for (path, value) in properties {
            event = event.with_system(value.clone()).with_value(path, value);
        }
        event
            .with_user(Variant::String(record_id.to_string()))
            .with_xml(format!(
                "<Event xmlns='http://schemas.microsoft.com/win/2004/08/events/event'>\
                 <System><Provider Name='SimProvider'/><EventRecordID>{}</EventRecordID>\
                 <Channel>{}</Channel></System></Event>",
                record_id, channel
            ))
    }

    /// Append a system property
    pub fn with_system(mut self, value: Variant) -> Self {
        self.system.push(Field::Value(value));
        self
    }

    /// Append a user property
    pub fn with_user(mut self, value: Variant) -> Self {
        self.user.push(Field::Value(value));
        self
    }

    /// Set the value rendered for `path`
    pub fn with_value(mut self, path: &str, value: Variant) -> Self {
        self.set(path, Field::Value(value));
        self
    }

    /// Render `path` as a raw tag and count with a null payload
    pub fn with_malformed(mut self, path: &str, kind: u32, count: u32) -> Self {
        self.set(path, Field::Malformed { kind, count });
        self
    }

    /// Set the XML rendering
    pub fn with_xml(mut self, xml: impl Into<String>) -> Self {
        self.xml = Some(xml.into());
        self
    }

    /// Record id, if this event has one
    pub fn record_id(&self) -> Option<u64> {
        self.record_id
    }

    fn set(&mut self, path: &str, field: Field) {
        match self.values.iter_mut().find(|(p, _)| p == path) {
            Some(slot) => slot.1 = field,
            None => self.values.push((path.to_string(), field)),
        }
    }

    fn fields(&self, mode: &ContextMode) -> Vec<Field> {
        match mode {
            ContextMode::System => self.system.clone(),
            ContextMode::User => self.user.clone(),
            ContextMode::Values(paths) => paths
                .iter()
                .map(|path| {
                    self.values
                        .iter()
                        .find(|(p, _)| p == path)
                        .map(|(_, f)| f.clone())
                        .unwrap_or(Field::Value(Variant::Null))
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
enum ContextMode {
    System,
    User,
    Values(Vec<String>),
}

#[derive(Debug)]
enum ObjectKind {
    Session,
    RenderContext(ContextMode),
    Query { events: Vec<SimEvent>, cursor: usize },
    Subscription { channel: String, cursor: usize },
    Event(SimEvent),
}

impl ObjectKind {
    fn name(&self) -> &'static str {
        match self {
            ObjectKind::Session => "session",
            ObjectKind::RenderContext(_) => "render context",
            ObjectKind::Query { .. } => "query",
            ObjectKind::Subscription { .. } => "subscription",
            ObjectKind::Event(_) => "event",
        }
    }
}

#[derive(Debug)]
struct Object {
    parent: Option<RawHandle>,
    kind: ObjectKind,
}

#[derive(Debug)]
struct SimState {
    next_raw: RawHandle,
    objects: HashMap<RawHandle, Object>,
    channels: BTreeMap<String, Vec<SimEvent>>,
    files: BTreeMap<String, Vec<SimEvent>>,
    faults: Vec<(SimCall, u32)>,
    partial_next: Option<(usize, u32)>,
    overreport_next: bool,
    truncate_render: bool,
    max_batch: Option<usize>,
    invalid_handle_paths: HashSet<String>,
    misuse: Vec<Misuse>,
    close_calls: usize,
    ignored_closes: usize,
}

impl SimState {
    fn new() -> Self {
        Self {
            next_raw: FIRST_HANDLE,
            objects: HashMap::new(),
            channels: BTreeMap::new(),
            files: BTreeMap::new(),
            faults: Vec::new(),
            partial_next: None,
            overreport_next: false,
            truncate_render: false,
            max_batch: None,
            invalid_handle_paths: HashSet::new(),
            misuse: Vec::new(),
            close_calls: 0,
            ignored_closes: 0,
        }
    }

    fn take_fault(&mut self, call: SimCall) -> Result<(), PlatformError> {
        match self.faults.iter().position(|(c, _)| *c == call) {
            Some(i) => Err(PlatformError::from_code(self.faults.remove(i).1)),
            None => Ok(()),
        }
    }

    fn alloc(&mut self, parent: Option<RawHandle>, kind: ObjectKind) -> RawHandle {
        let raw = self.next_raw;
        self.next_raw += HANDLE_STRIDE;
        self.objects.insert(raw, Object { parent, kind });
        raw
    }

    fn unknown(&mut self, call: &'static str, raw: RawHandle) -> PlatformError {
        self.misuse.push(Misuse::UnknownHandle { call, raw });
        PlatformError::from_code(ERROR_INVALID_HANDLE)
    }

    /// Validate an optional session argument
    fn session(&mut self, call: &'static str, raw: RawHandle) -> Result<Option<RawHandle>, PlatformError> {
        if raw == 0 {
            return Ok(None);
        }
        match self.objects.get(&raw) {
            Some(Object {
                kind: ObjectKind::Session,
                ..
            }) => Ok(Some(raw)),
            _ => Err(self.unknown(call, raw)),
        }
    }

    /// Events ready for `result_set`, and whether it is a subscription
    fn pending(&mut self, result_set: RawHandle) -> Result<(usize, bool), PlatformError> {
        match self.objects.get(&result_set).map(|o| &o.kind) {
            Some(ObjectKind::Query { events, cursor }) => Ok((events.len() - cursor, false)),
            Some(ObjectKind::Subscription { channel, cursor }) => {
                let published = self.channels.get(channel).map_or(0, Vec::len);
                Ok((published.saturating_sub(*cursor), true))
            }
            _ => Err(self.unknown("EvtNext", result_set)),
        }
    }

    /// Advance `result_set` by up to `n` events
    fn take(&mut self, result_set: RawHandle, n: usize) -> Vec<SimEvent> {
        let channels = &self.channels;
        match self.objects.get_mut(&result_set).map(|o| &mut o.kind) {
            Some(ObjectKind::Query { events, cursor }) => {
                let end = (*cursor + n).min(events.len());
                let taken = events[*cursor..end].to_vec();
                *cursor = end;
                taken
            }
            Some(ObjectKind::Subscription { channel, cursor }) => {
                let published = channels.get(channel.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                let end = (*cursor + n).min(published.len());
                let taken = published[*cursor..end].to_vec();
                *cursor = end;
                taken
            }
            _ => Vec::new(),
        }
    }

    /// Hand out up to `n` events as new handles in `out`
    fn fill(&mut self, result_set: RawHandle, out: &mut [RawHandle], n: usize) -> usize {
        let events = self.take(result_set, n.min(out.len()));
        let filled = events.len();
        for (slot, event) in out.iter_mut().zip(events) {
            *slot = self.alloc(Some(result_set), ObjectKind::Event(event));
        }
        filled
    }
}

/// In-memory [`EvtApi`] implementation
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use evtlog_engine::sim::{SimEvent, SimulatedPlatform};
/// use evtlog_engine::{QueryFlags, ResultSet};
///
/// let sim = Arc::new(SimulatedPlatform::new());
/// sim.add_channel("Application", [SimEvent::record("Application", 1)]);
///
/// let rs = ResultSet::query(sim.clone(), None, "Application", "*", QueryFlags::CHANNEL_PATH).unwrap();
/// assert_eq!(rs.next(10, None).unwrap().len(), 1);
/// assert!(rs.next(10, None).unwrap_err().is_end_of_stream());
/// ```
#[derive(Debug)]
pub struct SimulatedPlatform {
    state: Mutex<SimState>,
    arrivals: Condvar,
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlatform {
    /// An empty platform with no channels
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::new()),
            arrivals: Condvar::new(),
        }
    }

    /// Create (or extend) a channel with `events`
    pub fn add_channel(&self, name: &str, events: impl IntoIterator<Item = SimEvent>) {
        let mut state = self.state.lock();
        state
            .channels
            .entry(name.to_string())
            .or_default()
            .extend(events);
        drop(state);
        self.arrivals.notify_all();
    }

    /// Create (or replace) a log file with `events`
    pub fn add_log_file(&self, path: &str, events: impl IntoIterator<Item = SimEvent>) {
        self.state
            .lock()
            .files
            .insert(path.to_string(), events.into_iter().collect());
    }

    /// Append one event to a channel, waking blocked subscribers
    pub fn publish(&self, channel: &str, event: SimEvent) {
        self.add_channel(channel, [event]);
    }

    /// Fail the next `call` with `code`
    pub fn inject_fault(&self, call: SimCall, code: u32) {
        self.state.lock().faults.push((call, code));
    }

    /// Make the next `next` write up to `filled` handles, then fail with `code`
    pub fn inject_partial_next_failure(&self, filled: usize, code: u32) {
        self.state.lock().partial_next = Some((filled, code));
    }

    /// Make the next `next` report one more event than the batch can hold
    pub fn inject_overreported_next(&self) {
        self.state.lock().overreport_next = true;
    }

    /// Make the next render drop its last value
    pub fn inject_truncated_render(&self) {
        self.state.lock().truncate_render = true;
    }

    /// Cap how many events one `next` hands out
    pub fn set_max_batch(&self, max: Option<usize>) {
        self.state.lock().max_batch = max;
    }

    /// Make queries on `path`, or sessions to a server of that name, succeed
    /// with the invalid-handle sentinel
    pub fn return_invalid_handle_for(&self, path: &str) {
        self.state.lock().invalid_handle_paths.insert(path.to_string());
    }

    /// Handles currently open
    pub fn open_handles(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Event handles currently open
    pub fn open_events(&self) -> usize {
        self.state
            .lock()
            .objects
            .values()
            .filter(|o| matches!(o.kind, ObjectKind::Event(_)))
            .count()
    }

    /// Misuse observed so far
    pub fn misuse(&self) -> Vec<Misuse> {
        self.state.lock().misuse.clone()
    }

    /// `close` calls that released a handle
    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    /// `close` calls on the null or invalid sentinel
    pub fn ignored_closes(&self) -> usize {
        self.state.lock().ignored_closes
    }

    /// Record id of the event behind `raw`
    pub fn record_id(&self, raw: RawHandle) -> Option<u64> {
        match self.state.lock().objects.get(&raw).map(|o| &o.kind) {
            Some(ObjectKind::Event(event)) => event.record_id,
            _ => None,
        }
    }

    fn open_result_set(
        state: &mut SimState,
        call: &'static str,
        session: RawHandle,
        kind: ObjectKind,
    ) -> Result<RawHandle, PlatformError> {
        let parent = state.session(call, session)?;
        let raw = state.alloc(parent, kind);
        debug!(raw, call, "sim opened result set");
        Ok(raw)
    }
}

fn check_query(query: &str) -> Result<(), PlatformError> {
    match query.trim() {
        "" | "*" => Ok(()),
        _ => Err(PlatformError::from_code(ERROR_EVT_INVALID_QUERY)),
    }
}

// SAFETY: render_values writes through `marshal`, which lays out every
// pointer payload inside the caller's buffer with the size its tag and count
// imply, and only null payloads with a zero count (or deliberately malformed
// fields, which carry no readable pointer).
unsafe impl EvtApi for SimulatedPlatform {
    fn open_session(&self, server: &[u16]) -> Result<RawHandle, PlatformError> {
        let mut state = self.state.lock();
        state.take_fault(SimCall::OpenSession)?;
        let server = from_wide(server);
        if server.is_empty() {
            return Err(PlatformError::from_code(ERROR_INVALID_PARAMETER));
        }
        if state.invalid_handle_paths.contains(&server) {
            return Ok(INVALID_HANDLE);
        }
        Ok(state.alloc(None, ObjectKind::Session))
    }

    fn create_render_context(&self, paths: &[&[u16]], flags: u32) -> Result<RawHandle, PlatformError> {
        let mut state = self.state.lock();
        state.take_fault(SimCall::CreateRenderContext)?;
        let mode = match (flags, paths.is_empty()) {
            (RENDER_CONTEXT_VALUES, false) => {
                ContextMode::Values(paths.iter().map(|p| from_wide(p)).collect())
            }
            (RENDER_CONTEXT_SYSTEM, true) => ContextMode::System,
            (RENDER_CONTEXT_USER, true) => ContextMode::User,
            _ => return Err(PlatformError::from_code(ERROR_INVALID_PARAMETER)),
        };
        Ok(state.alloc(None, ObjectKind::RenderContext(mode)))
    }

    fn query(
        &self,
        session: RawHandle,
        path: &[u16],
        query: &[u16],
        flags: u32,
    ) -> Result<RawHandle, PlatformError> {
        let mut state = self.state.lock();
        state.take_fault(SimCall::Query)?;
        let path = from_wide(path);
        check_query(&from_wide(query))?;
        if state.invalid_handle_paths.contains(&path) {
            return Ok(INVALID_HANDLE);
        }

        let source = if flags & FLAG_FILE_PATH != 0 {
            &state.files
        } else {
            &state.channels
        };
        let mut events = match source.get(&path) {
            Some(events) => events.clone(),
            None if flags & FLAG_TOLERATE_QUERY_ERRORS != 0 => Vec::new(),
            None => return Err(PlatformError::from_code(ERROR_EVT_CHANNEL_NOT_FOUND)),
        };
        if flags & FLAG_REVERSE_DIRECTION != 0 {
            events.reverse();
        }
        Self::open_result_set(&mut state, "EvtQuery", session, ObjectKind::Query { events, cursor: 0 })
    }

    fn subscribe(
        &self,
        session: RawHandle,
        channel: &[u16],
        query: &[u16],
        flags: u32,
    ) -> Result<RawHandle, PlatformError> {
        let mut state = self.state.lock();
        state.take_fault(SimCall::Subscribe)?;
        let channel = from_wide(channel);
        check_query(&from_wide(query))?;
        let published = match state.channels.get(&channel) {
            Some(events) => events.len(),
            None => return Err(PlatformError::from_code(ERROR_EVT_CHANNEL_NOT_FOUND)),
        };
        let cursor = match flags {
            SUBSCRIBE_FUTURE_EVENTS => published,
            SUBSCRIBE_OLDEST_RECORD => 0,
            _ => return Err(PlatformError::from_code(ERROR_INVALID_PARAMETER)),
        };
        Self::open_result_set(
            &mut state,
            "EvtSubscribe",
            session,
            ObjectKind::Subscription { channel, cursor },
        )
    }

    fn next(
        &self,
        result_set: RawHandle,
        events: &mut [RawHandle],
        timeout_ms: u32,
    ) -> Result<usize, PlatformError> {
        let mut state = self.state.lock();
        state.take_fault(SimCall::Next)?;
        let deadline = Instant::now() + Duration::from_millis(u64::from(timeout_ms));

        let available = loop {
            match state.pending(result_set)? {
                (0, false) => return Err(PlatformError::from_code(ERROR_NO_MORE_ITEMS)),
                (0, true) => {
                    if Instant::now() >= deadline {
                        return Err(PlatformError::from_code(ERROR_TIMEOUT));
                    }
                    self.arrivals.wait_until(&mut state, deadline);
                }
                (n, _) => break n,
            }
        };

        let limit = state.max_batch.map_or(available, |max| available.min(max));
        if let Some((filled, code)) = state.partial_next.take() {
            state.fill(result_set, events, filled.min(limit));
            return Err(PlatformError::from_code(code));
        }
        let filled = state.fill(result_set, events, limit);
        if std::mem::take(&mut state.overreport_next) {
            return Ok(filled + events.len());
        }
        Ok(filled)
    }

    fn render_values(
        &self,
        context: RawHandle,
        event: RawHandle,
        buffer: &mut RenderBuffer,
    ) -> Result<RenderOutcome, PlatformError> {
        let mut state = self.state.lock();
        state.take_fault(SimCall::Render)?;
        let mode = match state.objects.get(&context).map(|o| &o.kind) {
            Some(ObjectKind::RenderContext(mode)) => mode.clone(),
            _ => return Err(state.unknown("EvtRender", context)),
        };
        let mut fields = match state.objects.get(&event).map(|o| &o.kind) {
            Some(ObjectKind::Event(e)) => e.fields(&mode),
            _ => return Err(state.unknown("EvtRender", event)),
        };
        if std::mem::take(&mut state.truncate_render) {
            fields.pop();
        }
        drop(state);
        Ok(marshal(&fields, buffer))
    }

    fn render_xml(&self, event: RawHandle) -> Result<String, PlatformError> {
        let mut state = self.state.lock();
        state.take_fault(SimCall::RenderXml)?;
        match state.objects.get(&event).map(|o| &o.kind) {
            Some(ObjectKind::Event(e)) => Ok(e.xml.clone().unwrap_or_else(|| {
                "<Event xmlns='http://schemas.microsoft.com/win/2004/08/events/event'/>".to_string()
            })),
            _ => Err(state.unknown("EvtRender", event)),
        }
    }

    fn close(&self, handle: RawHandle) {
        let mut state = self.state.lock();
        if !is_usable(handle) {
            state.ignored_closes += 1;
            return;
        }
        let Some(object) = state.objects.remove(&handle) else {
            state.misuse.push(Misuse::UnknownHandle {
                call: "EvtClose",
                raw: handle,
            });
            return;
        };
        state.close_calls += 1;
        let open_children = state
            .objects
            .values()
            .filter(|o| o.parent == Some(handle))
            .count();
        if open_children > 0 {
            state.misuse.push(Misuse::ParentClosedWithOpenChildren {
                parent: handle,
                kind: object.kind.name(),
                open_children,
            });
        }
    }
}
