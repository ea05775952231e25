//! Stale-result guard for in-flight requests.
//!
//! Every session transition starts a new generation. Each request for a
//! resource takes a ticket; its result may only be committed while the
//! ticket is the latest one issued for that resource in the current
//! generation. Arrival order does not matter.

/// Identifies one request for one resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestTicket {
    /// Session generation the request was issued under.
    pub generation: u64,
    seq: u64,
}

/// Issues tickets for a single resource (profile, startup list).
#[derive(Debug, Default)]
pub struct RequestGate {
    latest: u64,
}

impl RequestGate {
    /// Issue a ticket superseding every earlier one for this resource.
    pub fn issue(&mut self, generation: u64) -> RequestTicket {
        self.latest += 1;
        RequestTicket {
            generation,
            seq: self.latest,
        }
    }

    /// Whether a result for `ticket` may still be committed.
    pub fn admits(&self, ticket: RequestTicket, current_generation: u64) -> bool {
        ticket.generation == current_generation && ticket.seq == self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_ticket_is_admitted() {
        let mut gate = RequestGate::default();
        let ticket = gate.issue(1);
        assert!(gate.admits(ticket, 1));
    }

    #[test]
    fn test_superseded_ticket_is_rejected() {
        let mut gate = RequestGate::default();
        let first = gate.issue(1);
        let second = gate.issue(1);

        assert!(!gate.admits(first, 1));
        assert!(gate.admits(second, 1));
    }

    #[test]
    fn test_new_generation_rejects_old_ticket() {
        let mut gate = RequestGate::default();
        let ticket = gate.issue(1);
        assert!(!gate.admits(ticket, 2));
    }
}
