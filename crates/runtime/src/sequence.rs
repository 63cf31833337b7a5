/// Identifies one issued request.
///
/// Sequence numbers are handed out in strictly increasing order, so comparing
/// two of them tells which request was issued later.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestSeq(pub u64);

/// Outcome of offering a completed request to [`RequestSequence::accept`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Newest result so far; apply it.
    Apply,
    /// A request issued later has already been applied.
    Stale { newest_applied: RequestSeq },
}

/// Orders request completions so that late, superseded responses are dropped.
///
/// Requests may complete in any order. A completion is applied only if no
/// request issued after it has already been applied.
#[derive(Debug, Default)]
pub struct RequestSequence {
    next: u64,
    newest_applied: Option<RequestSeq>,
    in_flight: usize,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next sequence number and marks it in flight.
    pub fn issue(&mut self) -> RequestSeq {
        let seq = RequestSeq(self.next);
        self.next += 1;
        self.in_flight += 1;
        seq
    }

    /// Marks `seq` finished and decides whether its result may be applied.
    pub fn accept(&mut self, seq: RequestSeq) -> Admission {
        self.in_flight = self.in_flight.saturating_sub(1);
        match self.newest_applied {
            Some(newest) if newest > seq => Admission::Stale {
                newest_applied: newest,
            },
            _ => {
                self.newest_applied = Some(seq);
                Admission::Apply
            }
        }
    }

    /// Marks `seq` finished without applying anything (e.g. the fetch failed).
    pub fn release(&mut self, _seq: RequestSeq) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn newest_applied(&self) -> Option<RequestSeq> {
        self.newest_applied
    }

    /// The most recently issued sequence number, if any.
    pub fn latest_issued(&self) -> Option<RequestSeq> {
        self.next.checked_sub(1).map(RequestSeq)
    }
}

#[cfg(test)]
mod tests {
    use super::{Admission, RequestSeq, RequestSequence};

    #[test]
    fn in_order_completions_apply() {
        let mut s = RequestSequence::new();
        let a = s.issue();
        assert_eq!(s.accept(a), Admission::Apply);
        let b = s.issue();
        assert_eq!(s.accept(b), Admission::Apply);
        assert_eq!(s.newest_applied(), Some(b));
        assert_eq!(s.in_flight(), 0);
    }

    #[test]
    fn late_completion_of_older_request_is_stale() {
        let mut s = RequestSequence::new();
        let older = s.issue();
        let newer = s.issue();
        assert_eq!(s.in_flight(), 2);

        assert_eq!(s.accept(newer), Admission::Apply);
        assert_eq!(
            s.accept(older),
            Admission::Stale {
                newest_applied: newer
            }
        );
        assert_eq!(s.newest_applied(), Some(newer));
        assert_eq!(s.in_flight(), 0);
    }

    #[test]
    fn failed_newer_request_does_not_block_older_success() {
        let mut s = RequestSequence::new();
        let older = s.issue();
        let newer = s.issue();
        s.release(newer);
        assert_eq!(s.accept(older), Admission::Apply);
        assert_eq!(s.in_flight(), 0);
    }

    #[test]
    fn latest_issued_tracks_counter() {
        let mut s = RequestSequence::new();
        assert_eq!(s.latest_issued(), None);
        s.issue();
        s.issue();
        assert_eq!(s.latest_issued(), Some(RequestSeq(1)));
    }
}
