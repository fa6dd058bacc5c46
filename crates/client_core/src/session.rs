use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use shared::{
    domain::UserId,
    protocol::DecisionResponse,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    api::FindingsApi,
    decision::{open_decision, DecisionDraft, DecisionForm},
    error::WorkflowError,
    registry::RegistryEntry,
    render::{RenderedTable, Row},
    simulation::{open_simulation, prepare_simulation, SimulationForm, SimulationView},
    source::{EventSource, InboundEvent},
    statistics::StatisticsTable,
    stream::{MessageOutcome, StreamConsumer, StreamPhase},
};

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StreamStarted {
        cycle: Uuid,
    },
    RowAppended {
        cycle: Uuid,
        row: Row,
    },
    ItemDropped {
        cycle: Uuid,
        reason: String,
    },
    StreamFinished {
        cycle: Uuid,
        phase: StreamPhase,
        findings: usize,
    },
    RowResolved {
        cycle: Uuid,
        user_id: UserId,
    },
}

/// Point-in-time copy of what the findings view shows.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub cycle: Option<Uuid>,
    pub phase: StreamPhase,
    pub findings: usize,
    pub dropped: usize,
    pub status_line: String,
    pub table: RenderedTable,
    pub statistics: Option<StatisticsTable>,
    pub transport_error: Option<String>,
}

struct SessionState {
    cycle: Option<Uuid>,
    consumer: StreamConsumer,
    decided: HashSet<UserId>,
    /// Users with a decision request outstanding. Survives a new cycle; the
    /// entry goes when the request settles.
    in_flight: HashSet<UserId>,
    pump: Option<JoinHandle<()>>,
}

/// One operator session: owns the stream cycle state and runs the
/// simulation and decision workflows against it.
pub struct FindingsSession {
    api: Arc<dyn FindingsApi>,
    decided_by: String,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl FindingsSession {
    pub fn new(api: Arc<dyn FindingsApi>, decided_by: impl Into<String>) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            api,
            decided_by: decided_by.into(),
            inner: Mutex::new(SessionState {
                cycle: None,
                consumer: StreamConsumer::new(),
                decided: HashSet::new(),
                in_flight: HashSet::new(),
                pump: None,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Begins a new cycle and pumps `source` on a background task. Any
    /// previous cycle is abandoned.
    pub async fn start_stream(self: &Arc<Self>, source: Box<dyn EventSource>) -> Uuid {
        let mut guard = self.inner.lock().await;
        let cycle = self.begin_cycle(&mut guard);
        let session = Arc::clone(self);
        guard.pump = Some(tokio::spawn(async move {
            session.pump(cycle, source).await;
        }));
        cycle
    }

    /// Runs a full cycle in the caller's task and returns its final phase.
    pub async fn run_stream(&self, source: Box<dyn EventSource>) -> StreamPhase {
        let cycle = {
            let mut guard = self.inner.lock().await;
            self.begin_cycle(&mut guard)
        };
        self.pump(cycle, source).await
    }

    fn begin_cycle(&self, state: &mut SessionState) -> Uuid {
        if let Some(previous) = state.pump.take() {
            previous.abort();
        }
        let cycle = Uuid::new_v4();
        state.cycle = Some(cycle);
        state.decided.clear();
        state.consumer.start();
        info!(cycle = %cycle, "session: stream cycle started");
        let _ = self.events.send(SessionEvent::StreamStarted { cycle });
        cycle
    }

    async fn pump(&self, cycle: Uuid, mut source: Box<dyn EventSource>) -> StreamPhase {
        loop {
            let event = source.next_event().await;
            let terminal = event.is_terminal();
            match self.apply(cycle, event).await {
                None => {
                    debug!(cycle = %cycle, "session: stale cycle, closing its subscription");
                    source.close().await;
                    return self.inner.lock().await.consumer.phase();
                }
                Some(phase) if terminal => {
                    source.close().await;
                    return phase;
                }
                Some(_) => {}
            }
        }
    }

    /// Applies one event to the consumer. Returns `None` if `cycle` is no
    /// longer the current one.
    async fn apply(&self, cycle: Uuid, event: InboundEvent) -> Option<StreamPhase> {
        let mut guard = self.inner.lock().await;
        if guard.cycle != Some(cycle) {
            return None;
        }
        let state = &mut *guard;
        let consumer = &mut state.consumer;

        match event {
            InboundEvent::Message(data) => match consumer.on_message(&data) {
                outcome @ (MessageOutcome::Rendered(_)
                | MessageOutcome::ErrorRow(_)
                | MessageOutcome::Rejected { .. }) => {
                    // A user decided earlier in this cycle stays resolved on redelivery.
                    if let MessageOutcome::Rendered(user_id) = &outcome {
                        if state.decided.contains(user_id) {
                            consumer.table_mut().mark_decided(user_id);
                        }
                    }
                    if let Some(row) = consumer.table().rows().last() {
                        let _ = self.events.send(SessionEvent::RowAppended {
                            cycle,
                            row: row.clone(),
                        });
                    }
                }
                MessageOutcome::Dropped(reason) => {
                    let _ = self.events.send(SessionEvent::ItemDropped { cycle, reason });
                }
                MessageOutcome::Ignored => {}
            },
            InboundEvent::Completed => {
                consumer.on_complete();
                self.finish(cycle, consumer);
            }
            InboundEvent::TransportError(reason) => {
                consumer.on_transport_error(&reason);
                self.finish(cycle, consumer);
            }
        }
        Some(consumer.phase())
    }

    fn finish(&self, cycle: Uuid, consumer: &StreamConsumer) {
        let _ = self.events.send(SessionEvent::StreamFinished {
            cycle,
            phase: consumer.phase(),
            findings: consumer.success_count(),
        });
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let guard = self.inner.lock().await;
        let consumer = &guard.consumer;
        SessionSnapshot {
            cycle: guard.cycle,
            phase: consumer.phase(),
            findings: consumer.success_count(),
            dropped: consumer.dropped_count(),
            status_line: consumer.status_line(),
            table: consumer.table().clone(),
            statistics: consumer.statistics().cloned(),
            transport_error: consumer.transport_error().map(str::to_string),
        }
    }

    pub async fn phase(&self) -> StreamPhase {
        self.inner.lock().await.consumer.phase()
    }

    pub async fn lookup(&self, user_id: &UserId) -> Option<RegistryEntry> {
        self.inner
            .lock()
            .await
            .consumer
            .registry()
            .get(user_id)
            .cloned()
    }

    pub async fn is_decided(&self, user_id: &UserId) -> bool {
        self.inner.lock().await.decided.contains(user_id)
    }

    pub async fn open_simulation(
        &self,
        user_id: &UserId,
        preselected_role: Option<&str>,
    ) -> Result<SimulationForm, WorkflowError> {
        let guard = self.inner.lock().await;
        open_simulation(guard.consumer.registry(), user_id, preselected_role)
    }

    /// What-if removal of `role`. Read-only on the backend; nothing in the
    /// session changes whatever the outcome.
    pub async fn simulate(
        &self,
        user_id: &UserId,
        role: Option<&str>,
    ) -> Result<SimulationView, WorkflowError> {
        let request = {
            let guard = self.inner.lock().await;
            prepare_simulation(guard.consumer.registry(), user_id, role)?
        };
        info!(user_id = %user_id, role = %request.role_to_remove, "session: running what-if simulation");
        let result = self.api.simulate(&request).await.map_err(|err| {
            warn!(user_id = %user_id, error = %err, "session: simulation request failed");
            WorkflowError::from(err)
        })?;
        Ok(SimulationView::new(&request, result))
    }

    pub async fn open_decision(&self, user_id: &UserId) -> Result<DecisionForm, WorkflowError> {
        let guard = self.inner.lock().await;
        if guard.decided.contains(user_id) {
            return Err(WorkflowError::AlreadyDecided(user_id.clone()));
        }
        if guard.in_flight.contains(user_id) {
            return Err(WorkflowError::InFlight(user_id.clone()));
        }
        open_decision(guard.consumer.registry(), user_id, &self.decided_by)
    }

    /// Validates and submits `draft`. On success the user's row is marked
    /// resolved for the rest of the cycle.
    pub async fn submit_decision(
        &self,
        draft: DecisionDraft,
    ) -> Result<DecisionResponse, WorkflowError> {
        let user_id = draft.user_id.clone();
        let (cycle, request) = {
            let mut guard = self.inner.lock().await;
            if guard.decided.contains(&user_id) {
                return Err(WorkflowError::AlreadyDecided(user_id));
            }
            if guard.in_flight.contains(&user_id) {
                return Err(WorkflowError::InFlight(user_id));
            }
            let entry = guard
                .consumer
                .registry()
                .get(&user_id)
                .ok_or_else(|| WorkflowError::UnknownUser(user_id.clone()))?;
            let request = draft.into_request(&entry.profile.conflicting_role_set, Utc::now())?;
            guard.in_flight.insert(user_id.clone());
            (guard.cycle, request)
        };

        info!(user_id = %user_id, decision = %request.decision, "session: submitting decision");
        let outcome = self.api.submit_decision(&request).await;

        let mut guard = self.inner.lock().await;
        guard.in_flight.remove(&user_id);
        let response = outcome.map_err(|err| {
            warn!(user_id = %user_id, error = %err, "session: decision submission failed");
            WorkflowError::from(err)
        })?;
        if guard.cycle == cycle {
            guard.decided.insert(user_id.clone());
            guard.consumer.table_mut().mark_decided(&user_id);
            if let Some(cycle) = cycle {
                let _ = self.events.send(SessionEvent::RowResolved { cycle, user_id });
            }
        } else {
            debug!(user_id = %user_id, "session: decision settled after a new cycle began");
        }
        Ok(response)
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
