//! Correlation engine: combines motion and light readings per location into
//! a lighting decision.
//!
//! Each location's state sits behind its own async mutex, held for the whole
//! apply-then-evaluate transition. A second per-location mutex orders the
//! wire: it is taken before the state lock is released and held across the
//! sends, so commands leave in the order their transitions happened while
//! the state itself is never locked during a transport call.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use thiefwatch_domain::decision::{Command, Decision, LightingPolicy, LocationState};
use thiefwatch_domain::envelope::SensorEvent;
use thiefwatch_domain::error::WatchError;
use thiefwatch_domain::location::Location;
use thiefwatch_domain::time::{self, Timestamp};

use crate::periodic::PeriodicJob;
use crate::ports::CommandSink;

#[derive(Default)]
struct SlotInner {
    state: Mutex<LocationState>,
    wire: Mutex<()>,
}

type Slot = Arc<SlotInner>;

/// One location's state, as exposed for inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSnapshot {
    #[serde(flatten)]
    pub location: Location,
    #[serde(flatten)]
    pub state: LocationState,
}

pub struct CorrelationEngine<S> {
    sink: S,
    policy: LightingPolicy,
    states: Mutex<HashMap<Location, Slot>>,
}

impl<S: CommandSink> CorrelationEngine<S> {
    pub fn new(sink: S, policy: LightingPolicy) -> Self {
        Self {
            sink,
            policy,
            states: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, location: &Location) -> Slot {
        let mut states = self.states.lock().await;
        Arc::clone(states.entry(location.clone()).or_default())
    }

    /// Decode and process one inbound message.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::MalformedEvent`] when the topic or payload
    /// cannot be decoded; no state is touched then.
    pub async fn process_message(
        &self,
        topic: &str,
        payload: &[u8],
        now: Timestamp,
    ) -> Result<Vec<Command>, WatchError> {
        let event = SensorEvent::decode(topic, payload)?;
        Ok(self.process_event(event, now).await)
    }

    /// Fold `event` into its location's state, evaluate, and send the
    /// resulting commands in order.
    #[tracing::instrument(skip(self, event), fields(location = %event.location))]
    pub async fn process_event(&self, event: SensorEvent, now: Timestamp) -> Vec<Command> {
        let slot = self.slot(&event.location).await;
        let (commands, wire) = {
            let mut state = slot.state.lock().await;
            let commands = state.handle(&event.reading, event.observed_at, now, &self.policy);
            (commands, slot.wire.lock().await)
        };
        tracing::debug!(reading = ?event.reading, "sensor event processed");
        self.send_all(&event.location, &commands, wire).await;
        commands
    }

    /// Evaluate every known location at `now`; returns the commands sent.
    pub async fn tick(&self, now: Timestamp) -> Vec<(Location, Command)> {
        let slots: Vec<(Location, Slot)> = self
            .states
            .lock()
            .await
            .iter()
            .map(|(location, slot)| (location.clone(), Arc::clone(slot)))
            .collect();

        let mut sent = Vec::new();
        for (location, slot) in slots {
            let (command, wire) = {
                let mut state = slot.state.lock().await;
                (state.evaluate(now, &self.policy), slot.wire.lock().await)
            };
            if let Some(command) = command {
                self.send_all(&location, &[command], wire).await;
                sent.push((location, command));
            }
        }
        sent
    }

    /// Force a location off.
    #[tracing::instrument(skip(self))]
    pub async fn reset(&self, location: &Location) -> Option<Command> {
        let slot = self.slot(location).await;
        let (command, wire) = {
            let mut state = slot.state.lock().await;
            (state.reset(), slot.wire.lock().await)
        };
        if let Some(command) = command {
            self.send_all(location, &[command], wire).await;
        }
        command
    }

    /// Current decision of a location, `None` when it never reported.
    pub async fn decision(&self, location: &Location) -> Option<Decision> {
        let slot = self.states.lock().await.get(location).cloned()?;
        let state = slot.state.lock().await;
        Some(state.decision)
    }

    /// State of every known location, ordered by location.
    pub async fn snapshot(&self) -> Vec<LocationSnapshot> {
        let slots: Vec<(Location, Slot)> = self
            .states
            .lock()
            .await
            .iter()
            .map(|(location, slot)| (location.clone(), Arc::clone(slot)))
            .collect();
        let mut out = Vec::with_capacity(slots.len());
        for (location, slot) in slots {
            let state = *slot.state.lock().await;
            out.push(LocationSnapshot { location, state });
        }
        out.sort_by(|a, b| a.location.cmp(&b.location));
        out
    }

    /// Send `commands` while holding the location's wire lock.
    async fn send_all(
        &self,
        location: &Location,
        commands: &[Command],
        _wire: MutexGuard<'_, ()>,
    ) {
        for &command in commands {
            tracing::info!(location = %location, command = %command, "lighting decision changed");
            if let Err(err) = self.sink.send(location, command).await {
                tracing::warn!(location = %location, error = %err, "failed to send command");
            }
        }
    }
}

impl<S: CommandSink + 'static> PeriodicJob for CorrelationEngine<S> {
    fn name(&self) -> &'static str {
        "correlation-tick"
    }

    fn run(&self) -> impl Future<Output = Result<(), WatchError>> + Send {
        async move {
            let sent = self.tick(time::now()).await;
            if !sent.is_empty() {
                tracing::debug!(commands = sent.len(), "tick switched locations off");
            }
            Ok(())
        }
    }
}
