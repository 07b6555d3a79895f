use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::owners::FactionId;

/// Reward granted to each faction in the most recent round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    last_round: BTreeMap<FactionId, u64>,
}

impl TokenLedger {
    /// Forgets the previous round's grants.
    pub fn begin_round(&mut self) {
        self.last_round.clear();
    }

    /// Adds to the faction's grant for the current round; several control points
    /// may credit the same faction.
    pub fn credit(&mut self, faction: FactionId, amount: u64) -> u64 {
        let total = self.last_round.entry(faction).or_insert(0);
        *total = total.saturating_add(amount);
        *total
    }

    pub fn tokens_for(&self, faction: FactionId) -> u64 {
        self.last_round.get(&faction).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FactionId, u64)> + '_ {
        self.last_round.iter().map(|(id, amount)| (*id, *amount))
    }

    pub fn is_empty(&self) -> bool {
        self.last_round.is_empty()
    }

    pub fn len(&self) -> usize {
        self.last_round.len()
    }
}
