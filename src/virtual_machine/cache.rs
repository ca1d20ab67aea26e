//! Frame-scoped content cache.
//!
//! Values loaded by the runner live in a stack of frames, one per level of
//! the execution path. Popping a frame frees every key it holds. A global
//! byte capacity bounds the sum of all live values, and every key carries the
//! size limit it was loaded with.
//!
//! [`Memory`] is the contract the runner depends on; [`Cache`] is the
//! in-process implementation.

use menuvm_derive::{BinaryCodec, Error};
use std::collections::BTreeMap;
use std::fmt;

/// Size reservation recorded for a cached key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, BinaryCodec)]
pub enum SizeLimit {
    /// Value may not exceed this many bytes.
    Bounded(u32),
    /// Unconstrained; the value may be split across pages.
    Sink,
}

impl SizeLimit {
    /// Maps a declared byte limit to a reservation, 0 meaning sink.
    pub fn from_declared(limit: u32) -> Self {
        match limit {
            0 => SizeLimit::Sink,
            n => SizeLimit::Bounded(n),
        }
    }

    pub fn is_sink(&self) -> bool {
        matches!(self, SizeLimit::Sink)
    }

    /// Declared byte limit, 0 for a sink.
    pub fn declared(&self) -> u32 {
        match self {
            SizeLimit::Bounded(n) => *n,
            SizeLimit::Sink => 0,
        }
    }

    fn admits(&self, len: usize) -> bool {
        match self {
            SizeLimit::Bounded(n) => len <= *n as usize,
            SizeLimit::Sink => true,
        }
    }
}

impl fmt::Display for SizeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeLimit::Bounded(n) => write!(f, "{n}"),
            SizeLimit::Sink => write!(f, "sink"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("value for {key} is {len} bytes, limit is {limit}")]
    ValueTooLong { key: String, len: usize, limit: u32 },
    #[error("key {key} already loaded in frame {frame}")]
    InOtherFrame { key: String, frame: usize },
    #[error("cache capacity exceeded adding {key}: {needed} bytes needed, {available} available")]
    CapacityExceeded {
        key: String,
        needed: usize,
        available: usize,
    },
    #[error("key {0} not found")]
    NotFound(String),
    #[error("cannot pop the base frame")]
    BaseFrame,
    #[error("frame {level} out of range, {levels} frames")]
    FrameOutOfRange { level: usize, levels: usize },
    #[error("invalid cache snapshot: {reason}")]
    InvalidSnapshot { reason: String },
}

/// Storage contract for loaded content.
pub trait Memory {
    /// Stores `value` under `key` in the top frame.
    ///
    /// Re-adding a key that already lives in the top frame is a no-op.
    fn add(&mut self, key: &str, value: &str, limit: SizeLimit) -> Result<(), CacheError>;
    /// Replaces the value of an existing key in whichever frame holds it.
    fn update(&mut self, key: &str, value: &str) -> Result<(), CacheError>;
    fn get(&self, key: &str) -> Result<&str, CacheError>;
    fn reserved_size(&self, key: &str) -> Result<SizeLimit, CacheError>;
    /// Opens a new empty frame.
    fn push(&mut self);
    /// Drops the top frame and frees its keys.
    fn pop(&mut self) -> Result<(), CacheError>;
    /// Drops everything, leaving one empty base frame.
    fn reset(&mut self);
    fn levels(&self) -> usize;
    fn keys(&self, level: usize) -> Result<Vec<String>, CacheError>;
    /// Most recently added key still present.
    fn last(&self) -> Option<&str>;
    /// Marks the cache as no longer safe to persist or mutate.
    ///
    /// # Panics
    ///
    /// After this call, `add`, `update`, `push`, `pop` and `reset` panic.
    fn invalidate(&mut self);
    fn invalid(&self) -> bool;
}

/// In-process [`Memory`] implementation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cache {
    frames: Vec<BTreeMap<String, String>>,
    sizes: BTreeMap<String, SizeLimit>,
    cache_size: usize,
    used: usize,
    last: Option<String>,
    invalid: bool,
}

impl Cache {
    /// Creates a cache with one base frame. A `cache_size` of 0 is unbounded.
    pub fn new(cache_size: usize) -> Self {
        Self {
            frames: vec![BTreeMap::new()],
            sizes: BTreeMap::new(),
            cache_size,
            used: 0,
            last: None,
            invalid: false,
        }
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    /// Bytes currently held across all frames.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Index of the innermost frame holding `key`.
    fn frame_of(&self, key: &str) -> Option<usize> {
        self.frames.iter().rposition(|f| f.contains_key(key))
    }

    fn check_capacity(&self, key: &str, used_after: usize) -> Result<(), CacheError> {
        if self.cache_size > 0 && used_after > self.cache_size {
            return Err(CacheError::CapacityExceeded {
                key: key.to_string(),
                needed: used_after - self.used,
                available: self.cache_size.saturating_sub(self.used),
            });
        }
        Ok(())
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            cache_size: self.cache_size,
            cache_use_size: self.used,
            frames: self.frames.clone(),
            size_limits: self.sizes.clone(),
            invalid: self.invalid,
        }
    }

    /// Rebuilds a cache, rejecting snapshots whose accounting does not add up.
    pub fn from_snapshot(snap: CacheSnapshot) -> Result<Self, CacheError> {
        if snap.frames.is_empty() {
            return Err(bad_snapshot("no frames".into()));
        }
        let mut total = 0;
        for frame in &snap.frames {
            for (k, v) in frame {
                if !snap.size_limits.contains_key(k) {
                    return Err(bad_snapshot(format!("no size limit for {k}")));
                }
                total += v.len();
            }
        }
        if total != snap.cache_use_size {
            return Err(bad_snapshot(format!(
                "usage {} does not match {} bytes held",
                snap.cache_use_size, total
            )));
        }
        Ok(Self {
            frames: snap.frames,
            sizes: snap.size_limits,
            cache_size: snap.cache_size,
            used: snap.cache_use_size,
            last: None,
            invalid: snap.invalid,
        })
    }
}

impl Cache {
    fn assert_valid(&self) {
        assert!(!self.invalid, "mutating invalidated cache");
    }
}

fn bad_snapshot(reason: String) -> CacheError {
    CacheError::InvalidSnapshot { reason }
}

impl Memory for Cache {
    fn add(&mut self, key: &str, value: &str, limit: SizeLimit) -> Result<(), CacheError> {
        self.assert_valid();
        if !limit.admits(value.len()) {
            return Err(CacheError::ValueTooLong {
                key: key.to_string(),
                len: value.len(),
                limit: limit.declared(),
            });
        }
        let top = self.frames.len() - 1;
        match self.frame_of(key) {
            Some(frame) if frame == top => return Ok(()),
            Some(frame) => {
                return Err(CacheError::InOtherFrame {
                    key: key.to_string(),
                    frame,
                });
            }
            None => {}
        }
        self.check_capacity(key, self.used + value.len())?;

        self.frames[top].insert(key.to_string(), value.to_string());
        self.sizes.insert(key.to_string(), limit);
        self.used += value.len();
        self.last = Some(key.to_string());
        Ok(())
    }

    fn update(&mut self, key: &str, value: &str) -> Result<(), CacheError> {
        self.assert_valid();
        let frame = self
            .frame_of(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        let limit = self.reserved_size(key)?;
        if !limit.admits(value.len()) {
            return Err(CacheError::ValueTooLong {
                key: key.to_string(),
                len: value.len(),
                limit: limit.declared(),
            });
        }
        let old_len = self.frames[frame].get(key).map_or(0, String::len);
        self.check_capacity(key, self.used - old_len + value.len())?;

        self.frames[frame].insert(key.to_string(), value.to_string());
        self.used = self.used - old_len + value.len();
        Ok(())
    }

    fn get(&self, key: &str) -> Result<&str, CacheError> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.get(key))
            .map(String::as_str)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn reserved_size(&self, key: &str) -> Result<SizeLimit, CacheError> {
        self.sizes
            .get(key)
            .copied()
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn push(&mut self) {
        self.assert_valid();
        self.frames.push(BTreeMap::new());
    }

    fn pop(&mut self) -> Result<(), CacheError> {
        self.assert_valid();
        if self.frames.len() <= 1 {
            return Err(CacheError::BaseFrame);
        }
        let Some(frame) = self.frames.pop() else {
            return Err(CacheError::BaseFrame);
        };
        for (k, v) in frame {
            self.used -= v.len();
            self.sizes.remove(&k);
            if self.last.as_deref() == Some(k.as_str()) {
                self.last = None;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.assert_valid();
        self.frames = vec![BTreeMap::new()];
        self.sizes.clear();
        self.used = 0;
        self.last = None;
    }

    fn levels(&self) -> usize {
        self.frames.len()
    }

    fn keys(&self, level: usize) -> Result<Vec<String>, CacheError> {
        self.frames
            .get(level)
            .map(|f| f.keys().cloned().collect())
            .ok_or(CacheError::FrameOutOfRange {
                level,
                levels: self.frames.len(),
            })
    }

    fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    fn invalidate(&mut self) {
        self.invalid = true;
    }

    fn invalid(&self) -> bool {
        self.invalid
    }
}

/// Persisted shape of [`Cache`].
#[derive(Clone, Debug, Eq, PartialEq, BinaryCodec)]
pub struct CacheSnapshot {
    pub cache_size: usize,
    pub cache_use_size: usize,
    pub frames: Vec<BTreeMap<String, String>>,
    pub size_limits: BTreeMap<String, SizeLimit>,
    pub invalid: bool,
}
