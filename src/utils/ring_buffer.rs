//! Fixed-capacity single-producer/single-consumer byte queue.
//!
//! The producer runs in interrupt context and the consumer in normal context.
//! Neither side takes a lock: each side only ever stores its own index, and it
//! does so with `Release` ordering after touching the slot, while the opposite
//! index is read with `Acquire`. The slot write is therefore visible before the
//! index that publishes it.
//!
//! One slot always stays unused so that `write == read` means empty and
//! `write + 1 == read` means full. A push onto a full queue is dropped and the
//! oldest unread bytes are kept.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

pub struct RingBuffer<const N: usize> {
	slots: UnsafeCell<[u8; N]>,
	write: AtomicUsize,
	read: AtomicUsize,
}

// Sound under the single-producer/single-consumer contract documented on
// `push` and `pop`: a slot is owned by exactly one side at any time.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> RingBuffer<N> {
	pub const fn new() -> RingBuffer<N> {
		RingBuffer {
			slots: UnsafeCell::new([0; N]),
			write: AtomicUsize::new(0),
			read: AtomicUsize::new(0),
		}
	}

	/// Number of bytes the queue can hold at once.
	pub const fn capacity(&self) -> usize {
		N - 1
	}

	/// Appends `byte`, returning `false` if the queue was full and the byte was dropped.
	///
	/// Must only be called from the single producer.
	pub fn push(&self, byte: u8) -> bool {
		let write = self.write.load(Ordering::Relaxed);
		let next = (write + 1) % N;

		if next == self.read.load(Ordering::Acquire) {
			return false;
		}

		unsafe {
			self.slots.get().cast::<u8>().add(write).write_volatile(byte);
		}
		self.write.store(next, Ordering::Release);
		true
	}

	/// Removes the oldest byte.
	///
	/// Must only be called from the single consumer.
	pub fn pop(&self) -> Option<u8> {
		let read = self.read.load(Ordering::Relaxed);

		if read == self.write.load(Ordering::Acquire) {
			return None;
		}

		let byte = unsafe { self.slots.get().cast::<u8>().add(read).read_volatile() };
		self.read.store((read + 1) % N, Ordering::Release);
		Some(byte)
	}

	pub fn is_empty(&self) -> bool {
		self.read.load(Ordering::Acquire) == self.write.load(Ordering::Acquire)
	}

	pub fn len(&self) -> usize {
		let write = self.write.load(Ordering::Acquire);
		let read = self.read.load(Ordering::Acquire);
		(write + N - read) % N
	}

	/// Drops everything queued. Only valid while the producer is quiescent.
	pub fn reset(&self) {
		self.read.store(0, Ordering::Release);
		self.write.store(0, Ordering::Release);
	}
}

#[cfg(test)]
mod test {
	use super::RingBuffer;
	use std::vec::Vec;

	#[test]
	fn yields_pushed_bytes_in_order() {
		let ring: RingBuffer<8> = RingBuffer::new();
		for byte in b"hello" {
			assert!(ring.push(*byte));
		}

		assert_eq!(ring.len(), 5);
		let drained: Vec<u8> = core::iter::from_fn(|| ring.pop()).collect();
		assert_eq!(drained, b"hello");
		assert!(ring.is_empty());
	}

	#[test]
	fn empty_queue_pops_nothing() {
		let ring: RingBuffer<4> = RingBuffer::new();
		assert!(ring.is_empty());
		assert_eq!(ring.pop(), None);
	}

	#[test]
	fn full_queue_drops_newest_byte() {
		let ring: RingBuffer<4> = RingBuffer::new();
		assert_eq!(ring.capacity(), 3);

		assert!(ring.push(b'a'));
		assert!(ring.push(b'b'));
		assert!(ring.push(b'c'));
		assert!(!ring.push(b'd'));
		assert_eq!(ring.len(), 3);

		assert_eq!(ring.pop(), Some(b'a'));
		assert_eq!(ring.pop(), Some(b'b'));
		assert_eq!(ring.pop(), Some(b'c'));
		assert_eq!(ring.pop(), None);
	}

	#[test]
	fn indices_wrap_around_the_slots() {
		let ring: RingBuffer<4> = RingBuffer::new();
		for round in 0..10u8 {
			assert!(ring.push(round));
			assert!(ring.push(round.wrapping_mul(3)));
			assert_eq!(ring.pop(), Some(round));
			assert_eq!(ring.pop(), Some(round.wrapping_mul(3)));
		}
		assert!(ring.is_empty());
	}

	#[test]
	fn producer_and_consumer_on_separate_threads() {
		static RING: RingBuffer<16> = RingBuffer::new();

		let producer = std::thread::spawn(|| {
			for byte in 0..200u8 {
				while !RING.push(byte) {
					std::thread::yield_now();
				}
			}
		});

		let mut received = Vec::new();
		while received.len() < 200 {
			match RING.pop() {
				Some(byte) => received.push(byte),
				None => std::thread::yield_now(),
			}
		}
		producer.join().unwrap();

		assert_eq!(received, (0..200u8).collect::<Vec<_>>());
	}

	#[test]
	fn reset_discards_pending_bytes() {
		let ring: RingBuffer<8> = RingBuffer::new();
		ring.push(1);
		ring.push(2);
		ring.reset();
		assert!(ring.is_empty());
	}
}
