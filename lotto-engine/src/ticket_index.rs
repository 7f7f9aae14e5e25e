use lotto_core::config::MAX_NUMBER;
use lotto_core::TicketId;
use serde::{Deserialize, Serialize};

use crate::NumberSet;

/// Inverted index for one round: number -> ids of the tickets holding it, in
/// purchase order. Buckets store ids only; tickets live in the engine's arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketIndex {
    buckets: Vec<Vec<TicketId>>,
}

impl Default for TicketIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketIndex {
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); MAX_NUMBER as usize],
        }
    }

    pub fn insert(&mut self, ticket_id: TicketId, numbers: &NumberSet) {
        for n in numbers.iter() {
            self.buckets[usize::from(n - 1)].push(ticket_id);
        }
    }

    /// Tickets containing `number`; empty for numbers outside `1..=90`.
    pub fn lookup(&self, number: u8) -> &[TicketId] {
        number
            .checked_sub(1)
            .and_then(|i| self.buckets.get(usize::from(i)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn clear(&mut self) {
        self.buckets.iter_mut().for_each(Vec::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut index = TicketIndex::new();
        index.insert(0, &NumberSet::from_numbers(&[1, 2, 3, 4, 5, 6]).unwrap());
        index.insert(1, &NumberSet::from_numbers(&[4, 5, 6, 7, 8, 9, 10]).unwrap());
        index.insert(2, &NumberSet::from_numbers(&[1, 90, 45, 30, 20, 10]).unwrap());

        assert_eq!(index.lookup(1), &[0, 2]);
        assert_eq!(index.lookup(5), &[0, 1]);
        assert_eq!(index.lookup(10), &[1, 2]);
        assert_eq!(index.lookup(90), &[2]);
        assert!(index.lookup(11).is_empty());
        assert!(index.lookup(0).is_empty());
        assert!(index.lookup(91).is_empty());
    }

    #[test]
    fn test_lookup_matches_membership() {
        let tickets: Vec<NumberSet> = (0..90u8)
            .map(|i| {
                let numbers: Vec<u8> = (0..6).map(|k| (i + k) % 90 + 1).collect();
                NumberSet::from_numbers(&numbers).unwrap()
            })
            .collect();

        let mut index = TicketIndex::new();
        for (id, numbers) in tickets.iter().enumerate() {
            index.insert(id as TicketId, numbers);
        }

        for n in 1..=90u8 {
            let expected: Vec<TicketId> = tickets
                .iter()
                .enumerate()
                .filter(|(_, numbers)| numbers.contains(n))
                .map(|(id, _)| id as TicketId)
                .collect();
            assert_eq!(index.lookup(n), expected.as_slice());
        }
    }

    #[test]
    fn test_clear() {
        let mut index = TicketIndex::new();
        index.insert(0, &NumberSet::from_numbers(&[1, 2, 3, 4, 5, 6]).unwrap());
        index.clear();
        assert!(index.lookup(1).is_empty());
    }
}
