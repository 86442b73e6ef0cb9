//! Newtype identifiers used to correlate gate activity in logs.
//!
//! A [`FunnelId`] names one gate for its whole lifetime; a [`CallSeq`] numbers
//! the calls that gate has queued. Neither participates in gating decisions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a single [`Funnel`](crate::Funnel) instance.
///
/// Generated fresh for every funnel and attached to every span and event the
/// funnel emits, so activity from independent gates can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunnelId(Uuid);

impl FunnelId {
    /// Generates a new random funnel identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`FunnelId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for FunnelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a queued call in the order its funnel received it.
///
/// Sequence numbers start at zero and never repeat within one funnel, across
/// any number of hold/release cycles.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CallSeq(u64);

impl CallSeq {
    /// Creates a sequence number from a raw integer.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns this sequence number and advances `self` past it.
    pub(crate) fn take_next(&mut self) -> Self {
        let current = *self;
        self.0 += 1;
        current
    }
}

impl std::fmt::Display for CallSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funnel_ids_are_unique() {
        assert_ne!(FunnelId::new_random(), FunnelId::new_random());
    }

    #[test]
    fn test_funnel_id_round_trips_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(FunnelId::from_uuid(uuid).as_uuid(), uuid);
        assert_eq!(FunnelId::from_uuid(uuid).to_string(), uuid.to_string());
    }

    #[test]
    fn test_call_seq_take_next_advances() {
        let mut seq = CallSeq::default();
        assert_eq!(seq.take_next(), CallSeq::new(0));
        assert_eq!(seq.take_next(), CallSeq::new(1));
        assert_eq!(seq.as_u64(), 2);
        assert_eq!(CallSeq::new(7).to_string(), "#7");
    }
}
