//! Built-in key generators.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use shardline_types::Props;
use tracing::warn;

use crate::sharding::optional_i64;
use crate::{AlgorithmError, GeneratedKey, KeyGenerateAlgorithm};

type Result<T> = std::result::Result<T, AlgorithmError>;

// ---------------------------------------------------------------------------
// SNOWFLAKE
// ---------------------------------------------------------------------------

/// 2016-11-01T00:00:00Z in milliseconds.
const EPOCH_MILLIS: i64 = 1_477_929_600_000;

const SEQUENCE_BITS: u32 = 12;
const WORKER_ID_BITS: u32 = 10;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;
const WORKER_ID_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + WORKER_ID_BITS;
const MAX_WORKER_ID: i64 = (1 << WORKER_ID_BITS) - 1;
const DEFAULT_MAX_TOLERATE_MILLIS: i64 = 10;

fn system_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(EPOCH_MILLIS)
}

#[derive(Debug)]
struct SnowflakeState {
    last_millis: i64,
    sequence: i64,
}

/// 64-bit time-ordered keys: 41 bits of milliseconds since 2016-11-01,
/// 10 bits of worker id and a 12-bit per-millisecond sequence.
///
/// Properties: `worker-id` (default 0, at most 1023) and
/// `max-tolerate-time-difference-milliseconds` (default 10). A clock that
/// moves back by no more than the tolerance is waited out; a larger jump
/// fails key generation.
#[derive(Debug)]
pub struct SnowflakeKeyGenerator {
    worker_id: i64,
    max_tolerate_millis: i64,
    clock: fn() -> i64,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeKeyGenerator {
    pub const TYPE: &'static str = "SNOWFLAKE";

    /// Build from properties.
    pub fn from_props(props: &Props) -> Result<Self> {
        let worker_id = optional_i64(props, Self::TYPE, "worker-id")?.unwrap_or(0);
        if !(0..=MAX_WORKER_ID).contains(&worker_id) {
            return Err(AlgorithmError::InvalidProperty {
                type_name: Self::TYPE,
                property: "worker-id",
                value: worker_id.to_string(),
                reason: format!("must be between 0 and {MAX_WORKER_ID}"),
            });
        }
        let max_tolerate_millis =
            optional_i64(props, Self::TYPE, "max-tolerate-time-difference-milliseconds")?
                .unwrap_or(DEFAULT_MAX_TOLERATE_MILLIS);
        if max_tolerate_millis < 0 {
            return Err(AlgorithmError::InvalidProperty {
                type_name: Self::TYPE,
                property: "max-tolerate-time-difference-milliseconds",
                value: max_tolerate_millis.to_string(),
                reason: "must not be negative".into(),
            });
        }
        Ok(Self::with_clock(worker_id, max_tolerate_millis, system_millis))
    }

    fn with_clock(worker_id: i64, max_tolerate_millis: i64, clock: fn() -> i64) -> Self {
        Self {
            worker_id,
            max_tolerate_millis,
            clock,
            state: Mutex::new(SnowflakeState {
                last_millis: 0,
                sequence: 0,
            }),
        }
    }

    /// Configured worker id.
    pub fn worker_id(&self) -> i64 {
        self.worker_id
    }

    fn tolerate_rollback(&self, last_millis: i64, now: i64) -> Result<i64> {
        let behind = last_millis - now;
        if behind > self.max_tolerate_millis {
            return Err(AlgorithmError::ClockMovedBackwards {
                millis: behind as u64,
            });
        }
        warn!(
            behind_ms = behind,
            "clock moved backwards, waiting before generating key"
        );
        std::thread::sleep(Duration::from_millis(behind as u64));
        Ok((self.clock)())
    }

    fn wait_until_after(&self, last_millis: i64) -> i64 {
        let mut now = (self.clock)();
        while now <= last_millis {
            std::thread::yield_now();
            now = (self.clock)();
        }
        now
    }
}

impl KeyGenerateAlgorithm for SnowflakeKeyGenerator {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn generate_key(&self) -> Result<GeneratedKey> {
        let mut state = self.state.lock().expect("lock poisoned");
        let mut now = (self.clock)();
        if now < state.last_millis {
            now = self.tolerate_rollback(state.last_millis, now)?;
            if now < state.last_millis {
                return Err(AlgorithmError::ClockMovedBackwards {
                    millis: (state.last_millis - now) as u64,
                });
            }
        }
        if now == state.last_millis {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                now = self.wait_until_after(state.last_millis);
            }
        } else {
            state.sequence = 0;
        }
        state.last_millis = now;

        let key = ((now - EPOCH_MILLIS) << TIMESTAMP_SHIFT)
            | (self.worker_id << WORKER_ID_SHIFT)
            | state.sequence;
        Ok(GeneratedKey::Long(key))
    }
}

// ---------------------------------------------------------------------------
// UUID
// ---------------------------------------------------------------------------

/// Random v4 UUIDs rendered as 32 lowercase hex digits without hyphens.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidKeyGenerator;

impl UuidKeyGenerator {
    pub const TYPE: &'static str = "UUID";

    /// UUID takes no properties.
    pub fn from_props(_props: &Props) -> Result<Self> {
        Ok(Self)
    }
}

impl KeyGenerateAlgorithm for UuidKeyGenerator {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn generate_key(&self) -> Result<GeneratedKey> {
        Ok(GeneratedKey::Text(
            uuid::Uuid::new_v4().simple().to_string(),
        ))
    }
}
