//! Stream cycle state machine.
//!
//! `StreamConsumer` owns everything a single findings subscription produces:
//! the registry, the rendered table, the received items and, once the stream
//! completes, the statistics. It performs no I/O; the session feeds it the
//! three kinds of inbound event.

use shared::{
    domain::UserId,
    protocol::{FindingItem, StreamItem},
};
use tracing::{error, info, warn};

use crate::{
    registry::FindingRegistry,
    render::{render_finding, ErrorRow, RenderedTable, EMPTY_STATE_MESSAGE},
    statistics::{build_statistics, StatisticsTable},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Streaming,
    Completed,
    InterruptedEmpty,
    InterruptedPartial,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamPhase::Completed | StreamPhase::InterruptedEmpty | StreamPhase::InterruptedPartial
        )
    }
}

/// Effect of one inbound message on the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Rendered(UserId),
    ErrorRow(UserId),
    /// Profile refused by the registry; shown as an error row.
    Rejected { user_id: UserId, reason: String },
    /// Nothing rendered: missing profile or undecodable payload.
    Dropped(String),
    /// Message arrived outside the streaming phase.
    Ignored,
}

#[derive(Debug)]
pub struct StreamConsumer {
    phase: StreamPhase,
    success_count: usize,
    dropped_count: usize,
    failed_count: usize,
    registry: FindingRegistry,
    table: RenderedTable,
    received: Vec<FindingItem>,
    statistics: Option<StatisticsTable>,
    transport_error: Option<String>,
}

impl Default for StreamConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamConsumer {
    pub fn new() -> Self {
        Self {
            phase: StreamPhase::Idle,
            success_count: 0,
            dropped_count: 0,
            failed_count: 0,
            registry: FindingRegistry::new(),
            table: RenderedTable::new(),
            received: Vec::new(),
            statistics: None,
            transport_error: None,
        }
    }

    /// Resets every piece of cycle state and enters `Streaming`.
    pub fn start(&mut self) {
        self.registry.clear();
        self.table.clear();
        self.received.clear();
        self.statistics = None;
        self.success_count = 0;
        self.dropped_count = 0;
        self.failed_count = 0;
        self.transport_error = None;
        self.phase = StreamPhase::Streaming;
    }

    pub fn on_message(&mut self, data: &str) -> MessageOutcome {
        if self.phase != StreamPhase::Streaming {
            warn!(phase = ?self.phase, "stream: message outside streaming phase ignored");
            return MessageOutcome::Ignored;
        }

        let item = match StreamItem::parse(data) {
            Ok(item) => item,
            Err(err) => {
                self.dropped_count += 1;
                warn!(error = %err, "stream: dropping undecodable item");
                return MessageOutcome::Dropped(err.to_string());
            }
        };

        match item {
            StreamItem::Error(item) => {
                warn!(user_id = %item.user_id, message = %item.message, "stream: backend reported item error");
                self.failed_count += 1;
                self.table.append_error(ErrorRow::from(&item));
                MessageOutcome::ErrorRow(item.user_id)
            }
            StreamItem::MissingProfile => {
                self.dropped_count += 1;
                warn!("stream: item without profile dropped");
                MessageOutcome::Dropped("item has no profile".to_string())
            }
            StreamItem::Finding(item) => self.accept_finding(item),
        }
    }

    fn accept_finding(&mut self, item: FindingItem) -> MessageOutcome {
        let user_id = item.user_id().clone();
        if let Err(err) = self.registry.insert(&item) {
            warn!(user_id = %user_id, error = %err, "stream: rejecting non-actionable finding");
            let reason = err.to_string();
            self.failed_count += 1;
            self.table.append_error(ErrorRow {
                user_id: user_id.clone(),
                message: reason.clone(),
            });
            return MessageOutcome::Rejected { user_id, reason };
        }

        self.success_count += 1;
        self.table
            .append_finding(render_finding(&item.profile, item.justification.as_ref()));
        self.received.push(item);
        MessageOutcome::Rendered(user_id)
    }

    pub fn on_complete(&mut self) -> StreamPhase {
        if self.phase != StreamPhase::Streaming {
            return self.phase;
        }
        self.phase = StreamPhase::Completed;
        if self.success_count == 0 {
            self.table.show_empty_state();
        } else {
            self.statistics = Some(build_statistics(&self.received));
        }
        info!(
            findings = self.success_count,
            dropped = self.dropped_count,
            "stream: completed"
        );
        self.phase
    }

    pub fn on_transport_error(&mut self, reason: &str) -> StreamPhase {
        if self.phase != StreamPhase::Streaming {
            return self.phase;
        }
        self.transport_error = Some(reason.to_string());
        if self.success_count == 0 {
            self.phase = StreamPhase::InterruptedEmpty;
            self.table.show_empty_state();
        } else {
            self.phase = StreamPhase::InterruptedPartial;
        }
        error!(
            findings = self.success_count,
            reason,
            phase = ?self.phase,
            "stream: subscription failed before completion"
        );
        self.phase
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped_count
    }

    /// Items shown as error rows, whether reported by the backend or refused
    /// locally. Survives the empty-state placeholder.
    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    pub fn registry(&self) -> &FindingRegistry {
        &self.registry
    }

    pub fn table(&self) -> &RenderedTable {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut RenderedTable {
        &mut self.table
    }

    pub fn received(&self) -> &[FindingItem] {
        &self.received
    }

    /// Present only after a completed stream with at least one finding.
    pub fn statistics(&self) -> Option<&StatisticsTable> {
        self.statistics.as_ref()
    }

    pub fn transport_error(&self) -> Option<&str> {
        self.transport_error.as_deref()
    }

    pub fn status_line(&self) -> String {
        let mut notes = Vec::new();
        if self.dropped_count > 0 {
            notes.push(format!("{} item(s) dropped", self.dropped_count));
        }
        if self.failed_count > 0 {
            notes.push(format!("{} item(s) failed", self.failed_count));
        }
        let suffix = if notes.is_empty() {
            String::new()
        } else {
            format!(" ({})", notes.join(", "))
        };
        match self.phase {
            StreamPhase::Idle => "Idle".to_string(),
            StreamPhase::Streaming => {
                format!("Streaming: {} finding(s) received{suffix}", self.success_count)
            }
            StreamPhase::Completed if self.success_count == 0 => {
                format!("{EMPTY_STATE_MESSAGE}{suffix}")
            }
            StreamPhase::Completed => {
                format!("Scan complete: {} finding(s){suffix}", self.success_count)
            }
            StreamPhase::InterruptedEmpty => format!("{EMPTY_STATE_MESSAGE}{suffix}"),
            StreamPhase::InterruptedPartial => format!(
                "Stream interrupted: {} finding(s) received before the connection was lost{suffix}",
                self.success_count
            ),
        }
    }
}

#[cfg(test)]
#[path = "tests/stream_tests.rs"]
mod tests;
