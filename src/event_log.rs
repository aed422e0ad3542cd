//! Main entry point for evtlog.
//!
//! This module provides the `EventLog` struct, which binds a platform to a
//! [`Config`] and exposes every operation with configured defaults.

use std::sync::Arc;
use std::time::Duration;

use evtlog_engine::sim::SimulatedPlatform;
use evtlog_engine::{
    Batches, Event, EventBatch, EvtApi, QueryFlags, RenderContext, RenderContextKind, Renderer,
    ResultSet, Session, SubscribeFrom,
};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::Variant;

/// Access to one event log service.
///
/// Create one with [`EventLog::local`] (Windows), [`EventLog::simulated`],
/// or [`EventLog::builder`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use evtlog::prelude::*;
///
/// let sim = Arc::new(SimulatedPlatform::new());
/// sim.add_channel("Application", (1..=3).map(|id| SimEvent::record("Application", id)));
///
/// let log = EventLog::simulated(sim)?;
/// let rows = log.read_all(
///     "Application",
///     "*",
///     RenderContextKind::Values(vec!["Event/System/EventRecordID".into()]),
/// )?;
/// assert_eq!(rows.len(), 3);
/// # Ok::<(), evtlog::Error>(())
/// ```
pub struct EventLog {
    api: Arc<dyn EvtApi>,
    config: Config,
}

impl EventLog {
    /// Open the local machine's event log service.
    #[cfg(windows)]
    pub fn local() -> Result<Self> {
        Self::builder().open()
    }

    /// Open over a simulated platform.
    pub fn simulated(sim: Arc<SimulatedPlatform>) -> Result<Self> {
        Self::builder().simulated(sim).open()
    }

    /// Create a builder for configuration.
    ///
    /// # Example
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use std::time::Duration;
    /// # use evtlog::prelude::*;
    /// let log = EventLog::builder()
    ///     .simulated(Arc::new(SimulatedPlatform::new()))
    ///     .batch_size(64)
    ///     .timeout(Duration::from_millis(500))
    ///     .open()?;
    /// assert_eq!(log.config().batch_size, 64);
    /// # Ok::<(), evtlog::Error>(())
    /// ```
    pub fn builder() -> EventLogBuilder {
        EventLogBuilder::new()
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying platform.
    pub fn api(&self) -> &Arc<dyn EvtApi> {
        &self.api
    }

    /// Open a session on a remote server.
    pub fn open_session(&self, server: &str) -> Result<Session> {
        Ok(Session::open(self.api.clone(), server)?)
    }

    /// Query a channel or log file. `None` queries the local machine.
    pub fn query<'s>(
        &self,
        session: Option<&'s Session>,
        path: &str,
        query: &str,
        flags: QueryFlags,
    ) -> Result<ResultSet<'s>> {
        Ok(ResultSet::query(self.api.clone(), session, path, query, flags)?)
    }

    /// Open a pull subscription on a channel.
    pub fn subscribe<'s>(
        &self,
        session: Option<&'s Session>,
        channel: &str,
        query: &str,
        from: SubscribeFrom,
    ) -> Result<ResultSet<'s>> {
        Ok(ResultSet::subscribe(self.api.clone(), session, channel, query, from)?)
    }

    /// Create a render context.
    pub fn render_context(&self, kind: RenderContextKind) -> Result<RenderContext> {
        Ok(RenderContext::create(self.api.clone(), kind)?)
    }

    /// A renderer sized by the configuration.
    pub fn renderer(&self) -> Renderer {
        Renderer::with_limits(
            self.config.render_buffer_bytes,
            self.config.max_render_buffer_bytes,
        )
    }

    /// Retrieve the next batch with the configured size and timeout.
    pub fn next<'r>(&self, result_set: &'r ResultSet<'_>) -> Result<EventBatch<'r>> {
        Ok(result_set.next(self.config.batch_size, Some(self.config.timeout()))?)
    }

    /// Retrieve the next batch with an explicit timeout.
    pub fn next_with_timeout<'r>(
        &self,
        result_set: &'r ResultSet<'_>,
        timeout: Duration,
    ) -> Result<EventBatch<'r>> {
        Ok(result_set.next(self.config.batch_size, Some(timeout))?)
    }

    /// Iterate batches with the configured size and timeout.
    pub fn batches<'r, 's>(&self, result_set: &'r ResultSet<'s>) -> Batches<'r, 's> {
        result_set.batches(self.config.batch_size, Some(self.config.timeout()))
    }

    /// Render one event.
    pub fn render(&self, context: &RenderContext, event: &Event<'_>) -> Result<Vec<Variant>> {
        Ok(self.renderer().render(context, event)?)
    }

    /// Render one event as XML.
    pub fn render_xml(&self, event: &Event<'_>) -> Result<String> {
        Ok(event.render_xml()?)
    }

    /// Read a whole local channel.
    ///
    /// Opens the render context and query, renders every event in platform
    /// order, and releases everything children first.
    pub fn read_all(
        &self,
        path: &str,
        query: &str,
        kind: RenderContextKind,
    ) -> Result<Vec<Vec<Variant>>> {
        let context = self.render_context(kind)?;
        let result_set = self.query(
            None,
            path,
            query,
            QueryFlags::CHANNEL_PATH | QueryFlags::FORWARD_DIRECTION,
        )?;
        let mut renderer = self.renderer();

        let mut rows = Vec::new();
        for batch in self.batches(&result_set) {
            let batch = batch?;
            for event in &batch {
                rows.push(renderer.render(&context, event)?);
            }
            batch.close();
        }
        result_set.close();
        context.close();

        debug!(path, rows = rows.len(), "read channel");
        Ok(rows)
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for an [`EventLog`].
///
/// With no platform set, [`EventLogBuilder::open`] binds the local Windows
/// service; elsewhere a platform must be supplied.
pub struct EventLogBuilder {
    platform: Option<Arc<dyn EvtApi>>,
    config: Config,
}

impl EventLogBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            platform: None,
            config: Config::default(),
        }
    }

    /// Use `api` as the platform.
    pub fn platform(mut self, api: Arc<dyn EvtApi>) -> Self {
        self.platform = Some(api);
        self
    }

    /// Use a simulated platform.
    pub fn simulated(self, sim: Arc<SimulatedPlatform>) -> Self {
        self.platform(sim)
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Default wait for `next`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Events requested per `next`.
    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Initial render buffer size and growth cap, in bytes.
    pub fn render_buffer(mut self, initial_bytes: usize, max_bytes: usize) -> Self {
        self.config.render_buffer_bytes = initial_bytes;
        self.config.max_render_buffer_bytes = max_bytes;
        self
    }

    /// Validate the configuration and bind the platform.
    pub fn open(self) -> Result<EventLog> {
        self.config.validate()?;
        let api = match self.platform {
            Some(api) => api,
            None => local_platform()?,
        };
        debug!(config = ?self.config, "opened event log");
        Ok(EventLog {
            api,
            config: self.config,
        })
    }
}

impl Default for EventLogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(windows)]
fn local_platform() -> Result<Arc<dyn EvtApi>> {
    Ok(Arc::new(evtlog_engine::WindowsPlatform::new()))
}

#[cfg(not(windows))]
fn local_platform() -> Result<Arc<dyn EvtApi>> {
    Err(Error::Config(
        "no platform configured and the local event log is only available on Windows".to_string(),
    ))
}
