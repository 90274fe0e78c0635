use crate::collection::ObjectId;
use crate::common::current_time_seconds;
use log::info;
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};

const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Produces [ObjectId]s from a timestamp, a per-process salt and a counter.
///
/// The salt is drawn once when the generator is created. The counter starts at
/// a random value and wraps at 2^24, so identifiers created within the same
/// second stay distinct under concurrent calls.
pub struct ObjectIdGenerator {
    salt: [u8; 5],
    counter: AtomicU32,
}

impl ObjectIdGenerator {
    pub fn new() -> Self {
        let salt = Self::process_salt();
        let seed = OsRng.gen::<u32>() & COUNTER_MASK;
        info!(
            "Initialized object id generator with salt {:02x?} and counter seed {}",
            salt, seed
        );

        ObjectIdGenerator {
            salt,
            counter: AtomicU32::new(seed),
        }
    }

    pub fn generate(&self) -> ObjectId {
        let timestamp = current_time_seconds() as u32;
        self.generate_at(timestamp)
    }

    pub(crate) fn generate_at(&self, timestamp: u32) -> ObjectId {
        let counter = self.next_counter();

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..9].copy_from_slice(&self.salt);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        ObjectId::from_bytes(bytes)
    }

    fn next_counter(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK
    }

    fn process_salt() -> [u8; 5] {
        let uuid = uuid::Uuid::new_v4();
        let uid = uuid.as_bytes();
        let rnd = OsRng.gen::<[u8; 5]>();

        let mut salt = [0u8; 5];
        for (i, byte) in salt.iter_mut().enumerate() {
            *byte = uid[uid.len() - 1 - i] ^ rnd[i];
        }
        salt
    }
}

impl Default for ObjectIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
