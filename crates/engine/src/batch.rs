//! Events and event batches

use std::marker::PhantomData;

use evtlog_core::{Error, Result};
use tracing::trace;

use crate::handle::Handle;
use crate::platform::RawHandle;

/// One event retrieved from a result set
///
/// Borrows the result set for `'r`, so the result set outlives every event
/// taken from it.
#[derive(Debug)]
pub struct Event<'r> {
    handle: Handle,
    _result_set: PhantomData<&'r ()>,
}

impl<'r> Event<'r> {
    pub(crate) fn new(handle: Handle) -> Self {
        Self {
            handle,
            _result_set: PhantomData,
        }
    }

    /// Raw value for passing to the platform
    pub fn raw(&self) -> Result<RawHandle> {
        self.handle.raw()
    }

    /// Render the whole event as XML
    pub fn render_xml(&self) -> Result<String> {
        let raw = self.handle.raw()?;
        let xml = self
            .handle
            .api()
            .render_xml(raw)
            .map_err(|e| Error::platform("EvtRender", e))?;
        trace!(raw, bytes = xml.len(), "rendered event xml");
        Ok(xml)
    }

    /// Release the event
    pub fn close(mut self) {
        self.handle.close();
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// The events returned by one `next` call, in platform order
///
/// Members are only lent out while the batch is alive. Closing or dropping
/// the batch releases all of them; [`EventBatch::into_events`] hands them
/// over individually instead.
#[derive(Debug)]
pub struct EventBatch<'r> {
    events: Vec<Event<'r>>,
}

impl<'r> EventBatch<'r> {
    pub(crate) fn new(events: Vec<Event<'r>>) -> Self {
        Self { events }
    }

    pub(crate) fn empty() -> Self {
        Self { events: Vec::new() }
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the batch has no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event at `index`
    pub fn get(&self, index: usize) -> Option<&Event<'r>> {
        self.events.get(index)
    }

    /// All events
    pub fn events(&self) -> &[Event<'r>] {
        &self.events
    }

    /// Iterate over the events
    pub fn iter(&self) -> std::slice::Iter<'_, Event<'r>> {
        self.events.iter()
    }

    /// Transfer ownership of the events out of the batch
    pub fn into_events(self) -> Vec<Event<'r>> {
        self.events
    }

    /// Release every event in the batch
    pub fn close(self) {
        for event in self.events {
            event.close();
        }
    }
}

impl<'a, 'r> IntoIterator for &'a EventBatch<'r> {
    type Item = &'a Event<'r>;
    type IntoIter = std::slice::Iter<'a, Event<'r>>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl<'r> IntoIterator for EventBatch<'r> {
    type Item = Event<'r>;
    type IntoIter = std::vec::IntoIter<Event<'r>>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
