use super::{ProxyPool, UpstreamProxy};
use crate::config::RotatePolicy;
use rand::Rng;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Advances a `ProxyPool`'s cursor according to a `RotatePolicy`. Holds its
/// own counter for the `every_n` policy; the pool only owns the cursor
/// itself, since the cursor's meaning (current position) is independent of
/// which policy is driving it.
pub struct Rotator {
    policy: RotatePolicy,
    calls: AtomicU64,
}

impl Rotator {
    pub fn new(policy: RotatePolicy) -> Self {
        Self {
            policy,
            calls: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> RotatePolicy {
        self.policy
    }

    /// Advance the pool's cursor once, per the configured policy, and return
    /// the proxy at the resulting position. Used for one-shot upstream
    /// selection (e.g. a non-retrying caller).
    pub fn next(&self, pool: &ProxyPool) -> UpstreamProxy {
        let idx = self.advance(pool.cursor(), pool.len());
        pool.proxies()[idx as usize].clone()
    }

    /// Advance the cursor exactly once per inbound request, then return the
    /// full proxy list ordered starting at the resulting cursor position and
    /// wrapping around exactly once. This is the primitive the forwarder
    /// uses so that one cursor advance produces both "which upstream do we
    /// try first" and "what order do we retry the rest in", with no window
    /// for a concurrent request to move the cursor in between.
    pub fn advance_and_order(&self, pool: &ProxyPool) -> Vec<UpstreamProxy> {
        let len = pool.len();
        let start = self.advance(pool.cursor(), len) as usize % len;
        order_from(pool.proxies(), start)
    }

    /// Snapshot the retry order starting at the pool's current cursor
    /// without advancing it. Used by tests and by callers that already
    /// advanced the cursor via `next`/`advance_and_order` earlier in the same
    /// request.
    pub fn iterate_from_cursor(&self, pool: &ProxyPool) -> Vec<UpstreamProxy> {
        let len = pool.len();
        let cur = pool.cursor().load(Ordering::SeqCst);
        let start = if cur < 0 { 0 } else { cur as usize % len };
        order_from(pool.proxies(), start)
    }

    fn advance(&self, cursor: &AtomicI64, len: usize) -> i64 {
        let len = len as i64;
        match self.policy {
            RotatePolicy::EveryRequest => cas_advance(cursor, len),
            RotatePolicy::EveryN { n } => {
                let call_no = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call_no % n == 0 {
                    cas_advance(cursor, len)
                } else {
                    let cur = cursor.load(Ordering::SeqCst);
                    if cur < 0 {
                        0
                    } else {
                        cur
                    }
                }
            }
            RotatePolicy::Random => {
                let idx = rand::thread_rng().gen_range(0..len);
                cursor.store(idx, Ordering::SeqCst);
                idx
            }
        }
    }
}

fn cas_advance(cursor: &AtomicI64, len: i64) -> i64 {
    loop {
        let cur = cursor.load(Ordering::SeqCst);
        let new = (cur + 1).rem_euclid(len);
        if cursor
            .compare_exchange(cur, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return new;
        }
    }
}

fn order_from(proxies: &[UpstreamProxy], start: usize) -> Vec<UpstreamProxy> {
    let len = proxies.len();
    (0..len).map(|i| proxies[(start + i) % len].clone()).collect()
}
