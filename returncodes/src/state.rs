use num_bigint::BigUint;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Default ceiling on vote-cast exponentiations per verification card
pub const MAX_CONFIRMATION_ATTEMPTS: u32 = 5;

/// Per-voter protocol state.
///
/// Created by a successful partial decryption, which can therefore happen at most once.
/// `exponentiation_computed` flips once, after the choice return codes exponentiation.
/// `confirmation_attempts` only grows, by one per vote-cast exponentiation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VerificationCardRecord {
    pub election_event_id: String,
    pub verification_card_id: String,
    pub exponentiation_computed: bool,
    pub confirmation_attempts: u32,
}

impl VerificationCardRecord {
    pub fn new(election_event_id: &str, verification_card_id: &str) -> Self {
        VerificationCardRecord {
            election_event_id: election_event_id.to_owned(),
            verification_card_id: verification_card_id.to_owned(),
            exponentiation_computed: false,
            confirmation_attempts: 0,
        }
    }
}

/// Number of selections a voter makes in a verification card set (`psi`)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CombinedCorrectnessInfo {
    pub election_event_id: String,
    pub verification_card_set_id: String,
    pub total_number_of_selections: usize,
}

/// A voter's verification card public key, as recorded during generation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VerificationCardPublicKeyExtended {
    pub election_event_id: String,
    pub verification_card_set_id: String,
    pub verification_card_id: String,

    #[serde(with = "crate::serde_decimal::vec")]
    pub public_key: Vec<BigUint>,
}

/// One mutex per verification card, so that the check-then-act sequences on a card
/// are serialized while different cards proceed in parallel.
#[derive(Default)]
pub struct CardLocks {
    locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl CardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for the card
    pub fn with_card<T, F: FnOnce() -> T>(
        &self,
        election_event_id: &str,
        verification_card_id: &str,
        f: F,
    ) -> T {
        let key = (election_event_id.to_owned(), verification_card_id.to_owned());
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            f()
        };

        // Clones are taken under the map lock, so two means no other caller holds this one
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&key);
        }
        result
    }

    /// Number of cards with a lock entry
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_card_is_serialized() {
        let locks = Arc::new(CardLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                thread::spawn(move || {
                    locks.with_card("ee", "vc", || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn different_cards_do_not_block_each_other() {
        let locks = CardLocks::new();
        let value = locks.with_card("ee", "a", || locks.with_card("ee", "b", || 7));
        assert_eq!(value, 7);
        assert!(locks.is_empty());
    }

    #[test]
    fn finished_cards_release_their_lock_entry() {
        let locks = CardLocks::new();
        for i in 0..1000 {
            locks.with_card("ee", &format!("vc-{}", i), || ());
        }
        assert!(locks.is_empty());

        let held = locks.with_card("ee", "outer", || {
            locks.with_card("ee", "inner", || ());
            locks.len()
        });
        assert_eq!(held, 1);
        assert!(locks.is_empty());
    }
}
