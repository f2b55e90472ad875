//! Shared-memory ring buffer connecting generators to the supervisor.
//!
//! # Protocol
//!
//! The channel consists of one named shared memory object (header plus
//! `capacity` solution slots, see [`layout`]) and three named semaphores:
//!
//! - **free**: admission tokens for producers, starts at `capacity`
//! - **used**: readiness tokens for the consumer, starts at 0
//! - **lock**: binary semaphore serializing producers on `write_index`
//!
//! A producer waits on `free`, re-checks the stop flag, takes `lock`,
//! writes `slots[write_index]`, advances the cursor, posts `used` and
//! releases `lock`. The single consumer waits on `used`, reads
//! `slots[read_index]` and advances its cursor; once it is done with the
//! solution it posts `free` through [`SharedChannel::release_slot`].
//!
//! A producer that wakes on `free` and finds the stop flag set posts `free`
//! again before leaving, so one [`SharedChannel::nudge_producers`] from the
//! supervisor wakes every blocked producer in turn.
//!
//! Only the creator ([`SharedChannel::create`]) may unlink the names, via
//! [`SharedChannel::destroy`] or, failing that, on drop.

pub mod layout;
pub mod semaphore;
pub mod shm;

use crate::error::{Error, Result};
use crate::graph::Solution;
use crate::signal::CancelToken;
use layout::Header;
use semaphore::{NamedSemaphore, Wait};
use shm::SharedMemory;
use std::ptr;
use std::sync::atomic::{Ordering, fence};

/// Ring buffer slots when none are configured.
pub const DEFAULT_CAPACITY: usize = 12;

/// Largest ring buffer a channel may be created with.
pub const MAX_CAPACITY: usize = 64;

/// Name prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "fbarc";

/// Names of the four IPC objects making up one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    pub shm: String,
    pub free: String,
    pub used: String,
    pub lock: String,
}

impl ChannelNames {
    /// Derive all names from `prefix`, e.g. `fbarc` → `/fbarc_shm`.
    pub fn from_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_start_matches('/');
        Self {
            shm: format!("/{}_shm", prefix),
            free: format!("/{}_free", prefix),
            used: format!("/{}_used", prefix),
            lock: format!("/{}_lock", prefix),
        }
    }

    fn semaphores(&self) -> [&str; 3] {
        [&self.free, &self.used, &self.lock]
    }
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self::from_prefix(DEFAULT_PREFIX)
    }
}

/// What happened to a solution handed to [`SharedChannel::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Written to a slot and signalled to the consumer.
    Published,
    /// The supervisor requested a stop; nothing was written.
    Stopped,
    /// A termination signal arrived while waiting; nothing was written.
    Cancelled,
}

/// Snapshot of the two counting semaphores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCounts {
    pub free: u32,
    pub used: u32,
}

impl TokenCounts {
    pub fn total(&self) -> u32 {
        self.free + self.used
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Owner,
    Attached,
}

/// Unlinks the names created so far unless disarmed.
struct UnlinkGuard<'a> {
    shm: Option<&'a str>,
    semaphores: Vec<&'a str>,
}

impl UnlinkGuard<'_> {
    fn disarm(mut self) {
        self.shm = None;
        self.semaphores.clear();
    }
}

impl Drop for UnlinkGuard<'_> {
    fn drop(&mut self) {
        if let Some(name) = self.shm {
            let _ = SharedMemory::unlink(name);
        }
        for name in &self.semaphores {
            let _ = NamedSemaphore::unlink(name);
        }
    }
}

/// One process's handle on the shared ring buffer.
pub struct SharedChannel {
    shm: SharedMemory,
    free: NamedSemaphore,
    used: NamedSemaphore,
    lock: NamedSemaphore,
    names: ChannelNames,
    capacity: usize,
    role: Role,
    unlinked: bool,
}

impl SharedChannel {
    /// Create and initialise all IPC objects. Supervisor only.
    ///
    /// Fails if any name already exists. Whatever this call created before
    /// a failure is closed and unlinked again.
    pub fn create(names: ChannelNames, capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(Error::InvalidCapacity {
                capacity,
                max: MAX_CAPACITY,
            });
        }

        let shm = SharedMemory::create(&names.shm, layout::region_size(capacity))?;
        let mut guard = UnlinkGuard {
            shm: Some(&names.shm),
            semaphores: Vec::with_capacity(3),
        };

        // SAFETY: the mapping is region_size(capacity) bytes, page aligned,
        // and no generator can attach before the semaphores below exist.
        unsafe { layout::initialize(shm.as_ptr(), capacity as u32) };

        let free = NamedSemaphore::create(&names.free, capacity as u32)?;
        guard.semaphores.push(&names.free);
        let used = NamedSemaphore::create(&names.used, 0)?;
        guard.semaphores.push(&names.used);
        let lock = NamedSemaphore::create(&names.lock, 1)?;
        guard.disarm();

        tracing::debug!(shm = %names.shm, capacity, "created shared channel");

        Ok(Self {
            shm,
            free,
            used,
            lock,
            names,
            capacity,
            role: Role::Owner,
            unlinked: false,
        })
    }

    /// Attach to a channel created by a running supervisor.
    pub fn attach(names: ChannelNames) -> Result<Self> {
        let shm = SharedMemory::open(&names.shm)?;
        let capacity = Self::validate(&shm)?;

        let free = NamedSemaphore::open(&names.free)?;
        let used = NamedSemaphore::open(&names.used)?;
        let lock = NamedSemaphore::open(&names.lock)?;

        tracing::debug!(shm = %names.shm, capacity, "attached to shared channel");

        Ok(Self {
            shm,
            free,
            used,
            lock,
            names,
            capacity,
            role: Role::Attached,
            unlinked: false,
        })
    }

    fn validate(shm: &SharedMemory) -> Result<usize> {
        let too_small = |expected: usize| Error::LayoutMismatch {
            name: shm.name().to_string(),
            expected,
            actual: shm.len(),
        };

        if shm.len() < layout::slots_offset() {
            return Err(too_small(layout::slots_offset()));
        }
        // SAFETY: the mapping holds at least a full header.
        let header = unsafe { &*(shm.as_ptr() as *const Header) };
        if header.magic.load(Ordering::Acquire) != layout::MAGIC {
            return Err(Error::NotInitialized {
                name: shm.name().to_string(),
            });
        }

        let capacity = header.capacity as usize;
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(Error::InvalidCapacity {
                capacity,
                max: MAX_CAPACITY,
            });
        }
        if shm.len() < layout::region_size(capacity) {
            return Err(too_small(layout::region_size(capacity)));
        }
        Ok(capacity)
    }

    fn header(&self) -> &Header {
        // SAFETY: create/attach verified the mapping holds an initialised
        // header, and the mapping lives as long as self.
        unsafe { &*(self.shm.as_ptr() as *const Header) }
    }

    fn slot(&self, index: usize) -> *mut Solution {
        debug_assert!(index < self.capacity);
        // SAFETY: index < capacity and the mapping is region_size(capacity).
        unsafe { layout::slot_ptr(self.shm.as_ptr(), index) }
    }

    /// Producer side: publish one solution.
    pub fn push(&self, solution: &Solution, cancel: &CancelToken) -> Result<PushOutcome> {
        if !self.wait_for(&self.free, cancel)? {
            return Ok(PushOutcome::Cancelled);
        }
        fence(Ordering::Acquire);

        if self.stop_requested() {
            self.free.post()?;
            return Ok(PushOutcome::Stopped);
        }

        if !self.wait_for(&self.lock, cancel)? {
            self.free.post()?;
            return Ok(PushOutcome::Cancelled);
        }

        if self.stop_requested() {
            let baton = self.free.post();
            self.lock.post()?;
            baton?;
            return Ok(PushOutcome::Stopped);
        }

        let header = self.header();
        let index = header.write_index.load(Ordering::Relaxed) as usize % self.capacity;
        // SAFETY: the free token reserves this slot and the lock excludes
        // other producers; the consumer never touches an unsignalled slot.
        unsafe { ptr::write(self.slot(index), *solution) };
        header
            .write_index
            .store(((index + 1) % self.capacity) as u32, Ordering::Relaxed);
        fence(Ordering::Release);

        let published = self.used.post();
        self.lock.post()?;
        published?;
        Ok(PushOutcome::Published)
    }

    /// Consumer side: take the next solution in publication order.
    ///
    /// Returns `None` without reading when `cancel` is tripped before a
    /// solution is available. After `Some`, the caller owes one
    /// [`release_slot`](Self::release_slot).
    pub fn pop(&self, cancel: &CancelToken) -> Result<Option<Solution>> {
        if !self.wait_for(&self.used, cancel)? {
            return Ok(None);
        }
        fence(Ordering::Acquire);

        let header = self.header();
        let index = header.read_index.load(Ordering::Relaxed) as usize % self.capacity;
        // SAFETY: the used token guarantees this slot was fully written.
        let solution = unsafe { ptr::read(self.slot(index)) };
        header
            .read_index
            .store(((index + 1) % self.capacity) as u32, Ordering::Relaxed);
        Ok(Some(solution))
    }

    /// Wait on `sem`, resuming after signals that did not trip `cancel`.
    /// Returns false if cancelled.
    fn wait_for(&self, sem: &NamedSemaphore, cancel: &CancelToken) -> Result<bool> {
        loop {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            match sem.wait()? {
                Wait::Acquired => return Ok(true),
                Wait::Interrupted => continue,
            }
        }
    }

    /// Return the slot of the last popped solution to the producers.
    pub fn release_slot(&self) -> Result<()> {
        self.free.post()
    }

    /// Set the shared stop flag. It is never cleared.
    pub fn request_stop(&self) {
        self.header().stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.header().stop.load(Ordering::SeqCst)
    }

    /// Post one extra admission token so blocked producers see the stop flag.
    pub fn nudge_producers(&self) -> Result<()> {
        self.free.post()
    }

    pub fn token_counts(&self) -> Result<TokenCounts> {
        Ok(TokenCounts {
            free: self.free.value()?,
            used: self.used.value()?,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    /// Close the semaphores and unmap the region without unlinking.
    pub fn release(mut self) {
        if self.is_owner() {
            tracing::warn!(shm = %self.names.shm, "owner released channel without destroying it");
            self.unlinked = true;
        }
    }

    /// Unlink all names, then release. Supervisor only.
    ///
    /// Every unlink is attempted; the first failure is returned.
    pub fn destroy(mut self) -> Result<()> {
        if !self.is_owner() {
            return Err(Error::NotOwner);
        }
        self.unlinked = true;
        let result = self.unlink_all();
        tracing::debug!(shm = %self.names.shm, "destroyed shared channel");
        result
    }

    fn unlink_all(&self) -> Result<()> {
        let mut first_err = SharedMemory::unlink(&self.names.shm).err();
        for name in self.names.semaphores() {
            if let Err(err) = NamedSemaphore::unlink(name) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for SharedChannel {
    fn drop(&mut self) {
        if self.is_owner() && !self.unlinked {
            self.unlinked = true;
            if let Err(err) = self.unlink_all() {
                tracing::warn!(error = %err, "unlinking shared channel on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    static NEXT: AtomicUsize = AtomicUsize::new(0);

    fn unique_names() -> ChannelNames {
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        ChannelNames::from_prefix(&format!("fbarc_test_{}_{}", std::process::id(), n))
    }

    fn solution(tag: i32, len: usize) -> Solution {
        let edges: Vec<Edge> = (0..len as i32).map(|i| Edge::new(tag, i)).collect();
        Solution::from_edges(&edges).unwrap()
    }

    #[test]
    fn test_names_from_prefix() {
        let names = ChannelNames::from_prefix("/run1");
        assert_eq!(names.shm, "/run1_shm");
        assert_eq!(names.free, "/run1_free");
        assert_eq!(names.used, "/run1_used");
        assert_eq!(names.lock, "/run1_lock");
        assert_eq!(ChannelNames::default(), ChannelNames::from_prefix("fbarc"));
    }

    #[test]
    fn test_create_rejects_bad_capacity() {
        assert!(matches!(
            SharedChannel::create(unique_names(), 0),
            Err(Error::InvalidCapacity { .. })
        ));
        assert!(matches!(
            SharedChannel::create(unique_names(), MAX_CAPACITY + 1),
            Err(Error::InvalidCapacity { .. })
        ));
    }

    #[test]
    fn test_create_initial_state() {
        let channel = SharedChannel::create(unique_names(), 12).unwrap();
        assert!(channel.is_owner());
        assert_eq!(channel.capacity(), 12);
        assert!(!channel.stop_requested());
        assert_eq!(
            channel.token_counts().unwrap(),
            TokenCounts { free: 12, used: 0 }
        );
        channel.destroy().unwrap();
    }

    #[test]
    fn test_attach_missing_fails() {
        assert!(SharedChannel::attach(unique_names()).is_err());
    }

    #[test]
    fn test_create_collision_leaves_existing_channel_intact() {
        let names = unique_names();
        let first = SharedChannel::create(names.clone(), 4).unwrap();
        assert!(SharedChannel::create(names.clone(), 4).is_err());

        // The failed create must not have unlinked the first channel's names
        let attached = SharedChannel::attach(names).unwrap();
        assert_eq!(attached.capacity(), 4);
        attached.release();
        first.destroy().unwrap();
    }

    #[test]
    fn test_fifo_round_trip_across_mappings() {
        let names = unique_names();
        let owner = SharedChannel::create(names.clone(), 3).unwrap();
        let producer = SharedChannel::attach(names).unwrap();
        assert!(!producer.is_owner());
        assert_eq!(producer.capacity(), 3);

        let cancel = CancelToken::new();
        // Wrap around the ring several times
        for round in 0..4 {
            let batch: Vec<Solution> = (0..3).map(|i| solution(round * 10 + i, i as usize + 1)).collect();
            for s in &batch {
                assert_eq!(producer.push(s, &cancel).unwrap(), PushOutcome::Published);
            }
            assert_eq!(
                owner.token_counts().unwrap(),
                TokenCounts { free: 0, used: 3 }
            );
            for expected in &batch {
                let got = owner.pop(&cancel).unwrap().unwrap();
                assert_eq!(&got, expected);
                owner.release_slot().unwrap();
            }
            assert_eq!(owner.token_counts().unwrap().total(), 3);
        }

        producer.release();
        owner.destroy().unwrap();
    }

    #[test]
    fn test_pop_cancelled_does_not_read() {
        let channel = SharedChannel::create(unique_names(), 2).unwrap();
        let cancel = CancelToken::new();
        channel.push(&solution(1, 1), &cancel).unwrap();

        cancel.cancel();
        assert!(channel.pop(&cancel).unwrap().is_none());
        assert_eq!(
            channel.token_counts().unwrap(),
            TokenCounts { free: 1, used: 1 }
        );
        channel.destroy().unwrap();
    }

    #[test]
    fn test_push_cancelled_keeps_tokens() {
        let channel = SharedChannel::create(unique_names(), 2).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(
            channel.push(&solution(1, 1), &cancel).unwrap(),
            PushOutcome::Cancelled
        );
        assert_eq!(
            channel.token_counts().unwrap(),
            TokenCounts { free: 2, used: 0 }
        );
        channel.destroy().unwrap();
    }

    #[test]
    fn test_push_after_stop_publishes_nothing() {
        let channel = SharedChannel::create(unique_names(), 2).unwrap();
        let cancel = CancelToken::new();

        channel.request_stop();
        assert!(channel.stop_requested());
        assert_eq!(
            channel.push(&solution(1, 1), &cancel).unwrap(),
            PushOutcome::Stopped
        );
        // Token handed back, nothing signalled to the consumer
        assert_eq!(
            channel.token_counts().unwrap(),
            TokenCounts { free: 2, used: 0 }
        );
        assert_eq!(channel.header().write_index.load(Ordering::Relaxed), 0);
        channel.destroy().unwrap();
    }

    #[test]
    fn test_nudge_wakes_all_blocked_producers() {
        let names = unique_names();
        let owner = SharedChannel::create(names.clone(), 1).unwrap();
        let cancel = CancelToken::new();
        owner.push(&solution(0, 1), &cancel).unwrap();

        let producers: Vec<SharedChannel> = (0..3)
            .map(|_| SharedChannel::attach(names.clone()).unwrap())
            .collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = producers
                .iter()
                .enumerate()
                .map(|(i, p)| scope.spawn(move || p.push(&solution(i as i32 + 1, 1), &CancelToken::new())))
                .collect();

            // Producers are blocked on a full buffer until the stop nudge
            std::thread::sleep(std::time::Duration::from_millis(50));
            owner.request_stop();
            owner.nudge_producers().unwrap();

            for handle in handles {
                assert_eq!(handle.join().unwrap().unwrap(), PushOutcome::Stopped);
            }
        });

        // Only the solution pushed before the stop was ever published
        assert_eq!(owner.token_counts().unwrap().used, 1);
        for p in producers {
            p.release();
        }
        owner.destroy().unwrap();
    }

    #[test]
    fn test_concurrent_producers_do_not_corrupt_slots() {
        const PRODUCERS: i32 = 4;
        const PER_PRODUCER: i32 = 200;

        let names = unique_names();
        let owner = SharedChannel::create(names.clone(), DEFAULT_CAPACITY).unwrap();
        let producers: Vec<SharedChannel> = (0..PRODUCERS)
            .map(|_| SharedChannel::attach(names.clone()).unwrap())
            .collect();

        std::thread::scope(|scope| {
            for (p, channel) in producers.iter().enumerate() {
                scope.spawn(move || {
                    let cancel = CancelToken::new();
                    for seq in 0..PER_PRODUCER {
                        // Every edge carries (producer, seq); the length varies
                        let len = (seq as usize % 40) + 1;
                        let edges = vec![Edge::new(p as i32, seq); len];
                        let s = Solution::from_edges(&edges).unwrap();
                        assert_eq!(channel.push(&s, &cancel).unwrap(), PushOutcome::Published);
                    }
                });
            }

            let cancel = CancelToken::new();
            let mut next_seq = vec![0; PRODUCERS as usize];
            for _ in 0..PRODUCERS * PER_PRODUCER {
                let s = owner.pop(&cancel).unwrap().unwrap();
                let first = s.edges()[0];
                assert!(s.edges().iter().all(|e| *e == first), "interleaved slot: {:?}", s);
                assert_eq!(s.len(), (first.end as usize % 40) + 1);

                // Per-producer order is preserved
                let p = first.start as usize;
                assert_eq!(first.end, next_seq[p]);
                next_seq[p] += 1;
                owner.release_slot().unwrap();
            }
        });

        assert_eq!(
            owner.token_counts().unwrap(),
            TokenCounts { free: DEFAULT_CAPACITY as u32, used: 0 }
        );
        for p in producers {
            p.release();
        }
        owner.destroy().unwrap();
    }

    #[test]
    fn test_attached_cannot_destroy() {
        let names = unique_names();
        let owner = SharedChannel::create(names.clone(), 2).unwrap();
        let attached = SharedChannel::attach(names).unwrap();
        assert!(matches!(attached.destroy(), Err(Error::NotOwner)));
        owner.destroy().unwrap();
    }

    #[test]
    fn test_destroy_unlinks_every_name() {
        let names = unique_names();
        let owner = SharedChannel::create(names.clone(), 2).unwrap();
        owner.destroy().unwrap();

        assert!(SharedChannel::attach(names.clone()).is_err());
        assert!(NamedSemaphore::open(&names.free).is_err());
        assert!(NamedSemaphore::open(&names.used).is_err());
        assert!(NamedSemaphore::open(&names.lock).is_err());
        assert!(!Path::new(&format!("/dev/shm{}", names.shm)).exists());
    }

    #[test]
    fn test_owner_drop_unlinks() {
        let names = unique_names();
        drop(SharedChannel::create(names.clone(), 2).unwrap());
        assert!(SharedChannel::attach(names).is_err());
    }
}
