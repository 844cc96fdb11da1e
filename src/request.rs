//! Fixed-capacity table of in-flight QoS-bearing operations, keyed by
//! packet id (or, for QoS 0 publishes, by expected sent byte count).

/// Request is in use (slot occupied).
pub(crate) const STATUS_IN_USE: u8 = 1 << 0;
/// Request is pending an acknowledgement or byte-count milestone.
pub(crate) const STATUS_PENDING: u8 = 1 << 1;
/// Request tracks a SUBSCRIBE.
pub(crate) const STATUS_SUBSCRIBE: u8 = 1 << 2;
/// Request tracks an UNSUBSCRIBE.
pub(crate) const STATUS_UNSUBSCRIBE: u8 = 1 << 3;

/// `get_pending`'s packet_id wildcard: match any pending request,
/// regardless of packet id. Used during forced teardown.
pub const ANY_PACKET_ID: i32 = -1;

/// A single in-flight QoS-bearing operation.
///
/// A publish with QoS 0 is tracked by `expected_sent_len` (its `packet_id`
/// is 0); QoS 1/2 publishes, and all subscribes/unsubscribes, are tracked
/// by `packet_id` instead.
#[derive(Debug, Clone, Copy)]
pub struct Request<Arg> {
    status: u8,
    packet_id: u16,
    arg: Option<Arg>,
    timeout_start: u32,
    expected_sent_len: usize,
}

impl<Arg: Copy> Request<Arg> {
    const fn empty() -> Self {
        Self {
            status: 0,
            packet_id: 0,
            arg: None,
            timeout_start: 0,
            expected_sent_len: 0,
        }
    }

    /// Whether this slot currently holds a live request.
    pub fn in_use(&self) -> bool {
        self.status & STATUS_IN_USE != 0
    }

    /// Whether this request is awaiting an acknowledgement or milestone.
    pub fn is_pending(&self) -> bool {
        self.status & STATUS_PENDING != 0
    }

    /// Whether this request tracks a SUBSCRIBE.
    pub fn is_subscribe(&self) -> bool {
        self.status & STATUS_SUBSCRIBE != 0
    }

    /// Whether this request tracks an UNSUBSCRIBE.
    pub fn is_unsubscribe(&self) -> bool {
        self.status & STATUS_UNSUBSCRIBE != 0
    }

    /// The packet id this request is keyed by (0 for a QoS-0 publish
    /// tracked by byte count instead).
    pub fn packet_id(&self) -> u16 {
        self.packet_id
    }

    /// The user argument supplied when the request was created.
    pub fn arg(&self) -> Option<Arg> {
        self.arg
    }

    /// The sent-byte-count milestone a QoS-0 publish resolves at.
    pub fn expected_sent_len(&self) -> usize {
        self.expected_sent_len
    }
}

/// A fixed-capacity, linearly-scanned table of in-flight requests.
///
/// Capacity is small (tens of entries) by design: scans are O(capacity)
/// but that cost is negligible at this scale, and a flat array avoids any
/// allocation.
pub struct RequestTable<Arg, const N: usize> {
    slots: [Request<Arg>; N],
}

impl<Arg: Copy, const N: usize> RequestTable<Arg, N> {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            slots: [Request::empty(); N],
        }
    }

    /// Allocate the first free slot, marking it `IN_USE` with the given
    /// packet id and user argument. Returns `None` if the table is full.
    pub fn create(&mut self, packet_id: u16, arg: Option<Arg>) -> Option<usize> {
        let slot = self.slots.iter_mut().position(|r| !r.in_use())?;
        self.slots[slot] = Request {
            status: STATUS_IN_USE,
            packet_id,
            arg,
            timeout_start: 0,
            expected_sent_len: 0,
        };
        Some(slot)
    }

    /// Clear a slot entirely, freeing it for reuse.
    pub fn delete(&mut self, index: usize) {
        self.slots[index] = Request::empty();
    }

    /// Mark a request pending, stamping `timeout_start` and — for QoS-0
    /// byte-count tracking — its `expected_sent_len` milestone.
    pub fn set_pending(&mut self, index: usize, now: u32, expected_sent_len: usize) {
        let r = &mut self.slots[index];
        r.status |= STATUS_PENDING;
        r.timeout_start = now;
        r.expected_sent_len = expected_sent_len;
    }

    /// Tag a request as tracking a SUBSCRIBE.
    pub fn mark_subscribe(&mut self, index: usize) {
        self.slots[index].status |= STATUS_SUBSCRIBE;
    }

    /// Tag a request as tracking an UNSUBSCRIBE.
    pub fn mark_unsubscribe(&mut self, index: usize) {
        self.slots[index].status |= STATUS_UNSUBSCRIBE;
    }

    /// Find the first pending request matching `packet_id`.
    ///
    /// [`ANY_PACKET_ID`] matches any pending request regardless of stored
    /// id, for forced teardown. A `packet_id` of 0 matches QoS-0
    /// byte-count requests specifically.
    pub fn get_pending(&self, packet_id: i32) -> Option<usize> {
        self.slots.iter().position(|r| {
            r.is_pending() && (packet_id == ANY_PACKET_ID || r.packet_id as i32 == packet_id)
        })
    }

    /// Immutable access to a slot by index.
    pub fn get(&self, index: usize) -> &Request<Arg> {
        &self.slots[index]
    }

    /// Iterate over all slots currently `IN_USE`, with their index.
    pub fn iter_in_use(&self) -> impl Iterator<Item = (usize, &Request<Arg>)> {
        self.slots.iter().enumerate().filter(|(_, r)| r.in_use())
    }

    /// Clear every slot, regardless of state. Used on forced teardown
    /// after all pending requests have been drained with an error
    /// callback.
    pub fn clear_all(&mut self) {
        for r in &mut self.slots {
            *r = Request::empty();
        }
    }
}

impl<Arg: Copy, const N: usize> Default for RequestTable<Arg, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_fills_first_free_slot_and_reports_full() {
        let mut table: RequestTable<u32, 2> = RequestTable::new();
        let a = table.create(1, Some(10)).unwrap();
        let b = table.create(2, Some(20)).unwrap();
        assert!(table.create(3, None).is_none());
        assert_eq!(table.get(a).packet_id(), 1);
        assert_eq!(table.get(b).packet_id(), 2);
    }

    #[test]
    fn delete_frees_slot_for_reuse() {
        let mut table: RequestTable<u32, 1> = RequestTable::new();
        let a = table.create(1, None).unwrap();
        table.delete(a);
        assert!(!table.get(a).in_use());
        assert!(table.create(2, None).is_some());
    }

    #[test]
    fn get_pending_matches_by_id_or_wildcard() {
        let mut table: RequestTable<u32, 4> = RequestTable::new();
        let a = table.create(5, None).unwrap();
        let b = table.create(6, None).unwrap();
        table.set_pending(a, 0, 0);
        table.set_pending(b, 0, 0);

        assert_eq!(table.get_pending(5), Some(a));
        assert_eq!(table.get_pending(6), Some(b));
        assert_eq!(table.get_pending(99), None);
        assert!(matches!(table.get_pending(ANY_PACKET_ID), Some(idx) if idx == a || idx == b));
    }

    #[test]
    fn qos0_request_matched_by_packet_id_zero() {
        let mut table: RequestTable<u32, 2> = RequestTable::new();
        let a = table.create(0, Some(42)).unwrap();
        table.set_pending(a, 0, 10);
        assert_eq!(table.get_pending(0), Some(a));
        assert_eq!(table.get(a).expected_sent_len(), 10);
    }

    #[test]
    fn clear_all_drains_every_slot() {
        let mut table: RequestTable<u32, 3> = RequestTable::new();
        table.create(1, None);
        table.create(2, None);
        table.clear_all();
        assert_eq!(table.iter_in_use().count(), 0);
    }
}
