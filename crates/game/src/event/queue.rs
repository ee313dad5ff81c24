use std::collections::VecDeque;

use log::warn;

use super::types::{RaceEvent, ReliabilityMode};

#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub sequence: u32,
    pub timestamp_ms: u64,
    pub event: RaceEvent,
    pub acked: bool,
    pub last_sent_ms: Option<u64>,
    pub send_count: u32,
}

impl PendingEvent {
    pub fn is_expired(&self, current_time_ms: u64) -> bool {
        match self.event.reliability() {
            ReliabilityMode::UnreliableExpiring { ttl_ms } => {
                current_time_ms.saturating_sub(self.timestamp_ms) > ttl_ms
            }
            ReliabilityMode::Reliable => false,
        }
    }

    fn is_due(&self, current_time_ms: u64, resend_interval_ms: u64) -> bool {
        if self.acked || self.is_expired(current_time_ms) {
            return false;
        }
        match self.last_sent_ms {
            None => true,
            Some(_) if !self.event.reliability().is_reliable() => false,
            Some(sent) => current_time_ms.saturating_sub(sent) >= resend_interval_ms,
        }
    }
}

/// Outgoing race events for one client. Reliable events are resent until
/// acknowledged; unreliable ones go out once.
#[derive(Debug)]
pub struct EventQueue {
    pending: VecDeque<PendingEvent>,
    next_sequence: u32,
    max_pending: usize,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventQueue {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(max_pending),
            next_sequence: 0,
            max_pending: max_pending.max(1),
        }
    }

    pub fn push(&mut self, timestamp_ms: u64, event: RaceEvent) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        if self.pending.len() >= self.max_pending && !self.evict_oldest_unreliable() {
            warn!("event queue full, dropping oldest reliable event");
            self.pending.pop_front();
        }

        self.pending.push_back(PendingEvent {
            sequence,
            timestamp_ms,
            event,
            acked: false,
            last_sent_ms: None,
            send_count: 0,
        });

        sequence
    }

    pub fn ack(&mut self, sequence: u32) -> bool {
        match self.pending.iter_mut().find(|e| e.sequence == sequence) {
            Some(event) => {
                event.acked = true;
                true
            }
            None => false,
        }
    }

    /// Events to put on the wire now. Marks each returned event as sent.
    pub fn collect_due(
        &mut self,
        current_time_ms: u64,
        resend_interval_ms: u64,
    ) -> Vec<(u32, RaceEvent)> {
        let mut due = Vec::new();
        for event in &mut self.pending {
            if event.is_due(current_time_ms, resend_interval_ms) {
                event.last_sent_ms = Some(current_time_ms);
                event.send_count += 1;
                due.push((event.sequence, event.event.clone()));
            }
        }
        due
    }

    pub fn cleanup(&mut self, current_time_ms: u64) {
        self.pending.retain(|e| !e.acked && !e.is_expired(current_time_ms));
    }

    pub fn unacked(&self) -> impl Iterator<Item = &PendingEvent> {
        self.pending.iter().filter(|e| !e.acked)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn evict_oldest_unreliable(&mut self) -> bool {
        if let Some(idx) = self
            .pending
            .iter()
            .position(|e| !e.event.reliability().is_reliable())
        {
            self.pending.remove(idx);
            true
        } else {
            false
        }
    }
}
