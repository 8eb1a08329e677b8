//! The reactor is the single owner of layout state.
//!
//! Window events, commands and binding invocations all arrive on one channel
//! and are applied in order, so no two mutations of a tree ever interleave.
//! After every committed mutation the render tree is published through a
//! watch channel; readers get an immutable snapshot and never see a
//! half-applied operation.

mod replay;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::thread;

pub use replay::{Record, is_blank_or_comment, replay};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, instrument, warn};

use crate::actor;
use crate::common::config::Config;
use crate::layout_engine::{
    EventResponse, LayoutCommand, LayoutEngine, LayoutError, LayoutEvent, RenderTree,
};

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum Event {
    Layout(LayoutEvent),
    Command(LayoutCommand),
    /// Runs the command bound to this name in the config.
    Binding(String),
    ConfigChanged(Box<Config>),
}

pub struct Reactor {
    config: Config,
    layout: LayoutEngine,
    record: Record,
    render_tx: watch::Sender<Arc<RenderTree>>,
    responses: Option<actor::Sender<EventResponse>>,
}

impl Reactor {
    pub fn new(config: Config, record: Record) -> Self {
        let layout = LayoutEngine::new(&config);
        let (render_tx, _) = watch::channel(Arc::new(layout.render_tree()));
        let mut reactor = Reactor {
            config,
            layout,
            record,
            render_tx,
            responses: None,
        };
        reactor.record.start(&reactor.config);
        reactor
    }

    /// Responses that carry a focus change, workspace change or close
    /// request are forwarded to `tx`.
    pub fn with_responses(mut self, tx: actor::Sender<EventResponse>) -> Self {
        self.responses = Some(tx);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RenderTree>> { self.render_tx.subscribe() }

    #[inline]
    pub fn layout(&self) -> &LayoutEngine { &self.layout }

    #[inline]
    pub fn config(&self) -> &Config { &self.config }

    /// Runs the reactor on its own thread and returns the sending half of its
    /// event channel together with the render tree feed.
    pub fn spawn(
        self,
    ) -> anyhow::Result<(Sender, watch::Receiver<Arc<RenderTree>>, thread::JoinHandle<()>)> {
        let (events_tx, events) = actor::channel();
        let render_rx = self.subscribe();
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        let handle = thread::Builder::new()
            .name("reactor".to_string())
            .spawn(move || runtime.block_on(self.run(events)))?;
        Ok((events_tx, render_rx, handle))
    }

    /// Processes events until every sender is dropped.
    pub async fn run(mut self, mut events: Receiver) {
        while let Some((span, event)) = events.recv().await {
            let _guard = span.enter();
            let _ = self.handle_event(event);
        }
        debug!("reactor channel closed");
    }

    /// Applies one event. Failed operations are logged and dropped; state is
    /// left as it was before the event.
    #[instrument(name = "reactor::handle_event", skip(self))]
    pub fn handle_event(&mut self, event: Event) -> Option<EventResponse> {
        self.record.on_event(&event);
        let result = match event {
            Event::Layout(event) => self.layout.handle_event(event),
            Event::Command(command) => self.layout.handle_command(&command),
            Event::Binding(name) => self.layout.invoke_binding(&name),
            Event::ConfigChanged(config) => {
                let issues = config.validate();
                if !issues.is_empty() {
                    warn!(?issues, "ignoring invalid config, keeping the current one");
                    return None;
                }
                self.layout.update_config(&config);
                self.config = *config;
                Ok(EventResponse::default())
            }
        };
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                self.report(&err);
                return None;
            }
        };

        let render = self.layout.render_tree();
        self.render_tx.send_if_modified(|current| {
            if **current == render {
                return false;
            }
            *current = Arc::new(render);
            true
        });
        if let Some(tx) = &self.responses {
            if !response.is_empty() {
                tx.send(response.clone());
            }
        }
        Some(response)
    }

    fn report(&self, err: &LayoutError) {
        if err.is_invariant_violation() {
            error!(%err, "layout invariant violated, operation aborted");
        } else {
            warn!(%err, "dropped");
        }
        debug!("{}", self.layout.draw_tree());
    }
}
