//! Main queue and delayed area.
//!
//! The main queue is a min-priority heap ordered by
//! `(category rank, not_before, admission sequence)`, so approvals always
//! drain before anything else and the rest drain by earliest eligibility.
//! Requests whose not-before time has not been reached wait in the delayed
//! area until a tick promotes them.
//!
//! # Thread Safety
//!
//! `RequestQueue` is not synchronized itself. The manager keeps both areas
//! behind a single `parking_lot::Mutex` so every read-modify-write sequence,
//! including "check emptiness then decide", is atomic.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use swarm_core::QueuedRequest;

/// Where an admitted request was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Main,
    Delayed,
}

/// Heap entry ordered by the request's priority key.
#[derive(Debug)]
struct Prioritized(QueuedRequest);

impl PartialEq for Prioritized {
    fn eq(&self, other: &Self) -> bool {
        self.0.priority_key() == other.0.priority_key()
    }
}

impl Eq for Prioritized {}

impl PartialOrd for Prioritized {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Prioritized {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.priority_key().cmp(&other.0.priority_key())
    }
}

/// Main queue plus delayed area.
#[derive(Debug, Default)]
pub struct RequestQueue {
    main: BinaryHeap<Reverse<Prioritized>>,
    delayed: Vec<QueuedRequest>,
    next_seq: u64,
}

impl RequestQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new request, assigning its sequence number.
    ///
    /// Goes to the delayed area when `not_before > block_time`.
    pub fn admit(&mut self, mut request: QueuedRequest, block_time: u64) -> Placement {
        self.next_seq += 1;
        request.seq = self.next_seq;

        if request.is_eligible(block_time) {
            self.main.push(Reverse(Prioritized(request)));
            Placement::Main
        } else {
            self.delayed.push(request);
            Placement::Delayed
        }
    }

    /// Sequence number of the most recent admission.
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.next_seq
    }

    /// Put a request straight back into the main queue, keeping its sequence.
    pub fn requeue(&mut self, request: QueuedRequest) {
        self.main.push(Reverse(Prioritized(request)));
    }

    /// Remove every request whose deadline is before `now`, from both areas.
    pub fn evict_expired(&mut self, now: u64) -> Vec<QueuedRequest> {
        let mut expired = Vec::new();

        if self.main.iter().any(|Reverse(p)| p.0.is_expired(now)) {
            let heap = std::mem::take(&mut self.main);
            for Reverse(Prioritized(request)) in heap.into_vec() {
                if request.is_expired(now) {
                    expired.push(request);
                } else {
                    self.main.push(Reverse(Prioritized(request)));
                }
            }
        }

        let mut i = 0;
        while i < self.delayed.len() {
            if self.delayed[i].is_expired(now) {
                expired.push(self.delayed.swap_remove(i));
            } else {
                i += 1;
            }
        }

        expired
    }

    /// Move delayed requests whose not-before time has arrived into the main queue.
    pub fn promote_ready(&mut self, now: u64) -> usize {
        let mut promoted = 0;
        let mut i = 0;
        while i < self.delayed.len() {
            if self.delayed[i].is_eligible(now) {
                let request = self.delayed.swap_remove(i);
                self.main.push(Reverse(Prioritized(request)));
                promoted += 1;
            } else {
                i += 1;
            }
        }
        promoted
    }

    /// Pop up to `batch_size` requests from the front of the main queue.
    ///
    /// Swap-category requests count against `max_swaps`; the drain stops when
    /// the next request would exceed that cap. A popped request that is not yet
    /// eligible goes back to the delayed area and does not count.
    pub fn drain_batch(
        &mut self,
        now: u64,
        batch_size: usize,
        max_swaps: usize,
    ) -> Vec<QueuedRequest> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut swaps = 0;

        while batch.len() < batch_size {
            let next_is_swap = match self.main.peek() {
                Some(Reverse(p)) => p.0.category.is_swap(),
                None => break,
            };
            if next_is_swap && swaps >= max_swaps {
                break;
            }
            let Some(Reverse(Prioritized(request))) = self.main.pop() else {
                break;
            };

            if !request.is_eligible(now) {
                self.delayed.push(request);
                continue;
            }
            if next_is_swap {
                swaps += 1;
            }
            batch.push(request);
        }

        batch
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.main.len()
    }

    #[must_use]
    pub fn delayed_len(&self) -> usize {
        self.delayed.len()
    }

    /// Both areas empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.main.is_empty() && self.delayed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Address, U256};
    use swarm_core::{RouterCall, TxDescriptor, TxRequest};

    const ME: Address = address!("2222222222222222222222222222222222222222");
    const ROUTER: Address = address!("C532a74256D3Db42D0Bf7a0400fEFDbad7694008");

    fn approve(deadline: u64) -> QueuedRequest {
        let call = RouterCall::Approve {
            spender: ROUTER,
            amount: U256::MAX,
        };
        QueuedRequest::admit(
            TxRequest::new(TxDescriptor::contract_call(ME, call, U256::ZERO), deadline),
            ME,
        )
    }

    fn swap(deadline: u64, not_before: Option<u64>) -> QueuedRequest {
        let call = RouterCall::SwapExactEthForTokens {
            amount_out_min: U256::ZERO,
            path: vec![ME, ROUTER],
            to: ME,
            deadline: U256::from(deadline),
        };
        let mut req = TxRequest::new(TxDescriptor::contract_call(ROUTER, call, U256::from(1)), deadline);
        req.not_before = not_before;
        QueuedRequest::admit(req, ME)
    }

    fn transfer(deadline: u64, not_before: Option<u64>) -> QueuedRequest {
        let mut req = TxRequest::new(TxDescriptor::native_transfer(ME, U256::from(1)), deadline);
        req.not_before = not_before;
        QueuedRequest::admit(req, ME)
    }

    #[test]
    fn test_admit_places_future_requests_in_delayed_area() {
        let mut q = RequestQueue::new();
        assert_eq!(q.admit(transfer(500, Some(200)), 100), Placement::Delayed);
        assert_eq!(q.admit(transfer(500, Some(100)), 100), Placement::Main);
        assert_eq!(q.admit(transfer(500, None), 100), Placement::Main);
        assert_eq!(q.len(), 2);
        assert_eq!(q.delayed_len(), 1);
        assert_eq!(q.last_seq(), 3);
    }

    #[test]
    fn test_approval_drains_before_earlier_swap() {
        let mut q = RequestQueue::new();
        q.admit(swap(500, Some(10)), 100);
        q.admit(swap(500, Some(20)), 100);
        q.admit(approve(500), 100);

        let batch = q.drain_batch(100, 1, 1);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].category, swarm_core::Category::Approval);
    }

    #[test]
    fn test_non_approvals_drain_by_not_before_then_fifo() {
        let mut q = RequestQueue::new();
        q.admit(transfer(500, Some(50)), 100);
        q.admit(swap(500, Some(30)), 100);
        q.admit(transfer(500, None), 100);
        q.admit(transfer(500, None), 100);

        let batch = q.drain_batch(100, 4, 4);
        let order: Vec<_> = batch.iter().map(|r| (r.not_before, r.seq)).collect();
        assert_eq!(
            order,
            vec![(None, 3), (None, 4), (Some(30), 2), (Some(50), 1)]
        );
    }

    #[test]
    fn test_swap_cap_stops_drain() {
        let mut q = RequestQueue::new();
        q.admit(swap(500, None), 100);
        q.admit(swap(500, None), 100);
        q.admit(transfer(500, Some(90)), 100);

        // Two swaps at the front, cap of one: the drain stops at the second swap.
        let batch = q.drain_batch(100, 3, 1);
        assert_eq!(batch.len(), 1);
        assert!(batch[0].category.is_swap());
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_evict_removes_all_expired_from_both_areas() {
        let mut q = RequestQueue::new();
        q.admit(transfer(150, None), 100);
        q.admit(transfer(300, None), 100);
        q.admit(approve(120), 100);
        q.admit(transfer(130, Some(500)), 100);
        q.admit(transfer(900, Some(500)), 100);

        let expired = q.evict_expired(200);
        assert_eq!(expired.len(), 3);
        assert_eq!(q.len(), 1);
        assert_eq!(q.delayed_len(), 1);
    }

    #[test]
    fn test_deadline_equal_to_now_is_not_expired() {
        let mut q = RequestQueue::new();
        q.admit(transfer(200, None), 100);
        assert!(q.evict_expired(200).is_empty());
        assert_eq!(q.evict_expired(201).len(), 1);
    }

    #[test]
    fn test_promote_ready() {
        let mut q = RequestQueue::new();
        q.admit(transfer(900, Some(150)), 100);
        q.admit(transfer(900, Some(300)), 100);

        assert_eq!(q.promote_ready(149), 0);
        assert_eq!(q.promote_ready(150), 1);
        assert_eq!(q.len(), 1);
        assert_eq!(q.delayed_len(), 1);
    }

    #[test]
    fn test_drain_returns_ineligible_requeue_to_delayed() {
        let mut q = RequestQueue::new();
        let mut early = transfer(900, Some(400));
        early.seq = 7;
        q.requeue(early);

        let batch = q.drain_batch(100, 2, 2);
        assert!(batch.is_empty());
        assert_eq!(q.delayed_len(), 1);
        assert!(!q.is_empty());
    }
}
