use crate::*;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Combined correctness information, keyed by (election event, verification card set)
pub trait CorrectnessInfoStore: Send + Sync {
    fn get_correctness_info(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> Option<CombinedCorrectnessInfo>;

    /// Insert unless a record already exists. Returns true when inserted.
    fn insert_correctness_info_if_absent(&self, info: CombinedCorrectnessInfo) -> bool;

    fn has_correctness_info(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> bool {
        self.get_correctness_info(election_event_id, verification_card_set_id)
            .is_some()
    }

    /// Number of selections (`psi`) for the set
    fn total_number_of_selections(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> Result<usize, StateError> {
        self.get_correctness_info(election_event_id, verification_card_set_id)
            .map(|info| info.total_number_of_selections)
            .ok_or_else(|| StateError::MissingCorrectnessInformation {
                election_event_id: election_event_id.to_owned(),
                verification_card_set_id: verification_card_set_id.to_owned(),
            })
    }
}

/// Computed verification card records, keyed by (election event, verification card)
pub trait VerificationCardStore: Send + Sync {
    fn get_verification_card(
        &self,
        election_event_id: &str,
        verification_card_id: &str,
    ) -> Option<VerificationCardRecord>;

    fn set_verification_card(&self, record: VerificationCardRecord);

    /// Insert unless a record already exists. Returns true when inserted.
    fn insert_verification_card_if_absent(&self, record: VerificationCardRecord) -> bool;

    fn has_verification_card(&self, election_event_id: &str, verification_card_id: &str) -> bool {
        self.get_verification_card(election_event_id, verification_card_id)
            .is_some()
    }
}

/// Verification card public keys, keyed by (election event, verification card)
pub trait VerificationCardPublicKeyStore: Send + Sync {
    fn get_verification_card_public_key(
        &self,
        election_event_id: &str,
        verification_card_id: &str,
    ) -> Option<VerificationCardPublicKeyExtended>;

    fn set_verification_card_public_key(&self, key: VerificationCardPublicKeyExtended);
}

/// Point-in-time copy of a [`MemStore`]
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct StoreSnapshot {
    pub correctness_info: Vec<CombinedCorrectnessInfo>,
    pub verification_cards: Vec<VerificationCardRecord>,
    pub verification_card_public_keys: Vec<VerificationCardPublicKeyExtended>,
}

type Key = (String, String);

/// A simple store that uses in-memory BTreeMaps
#[derive(Default)]
pub struct MemStore {
    correctness_info: RwLock<BTreeMap<Key, CombinedCorrectnessInfo>>,
    verification_cards: RwLock<BTreeMap<Key, VerificationCardRecord>>,
    verification_card_public_keys: RwLock<BTreeMap<Key, VerificationCardPublicKeyExtended>>,
}

fn key(a: &str, b: &str) -> Key {
    (a.to_owned(), b.to_owned())
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            correctness_info: self
                .correctness_info
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .values()
                .cloned()
                .collect(),
            verification_cards: self
                .verification_cards
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .values()
                .cloned()
                .collect(),
            verification_card_public_keys: self
                .verification_card_public_keys
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .values()
                .cloned()
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = MemStore::new();
        for info in snapshot.correctness_info {
            store.insert_correctness_info_if_absent(info);
        }
        for record in snapshot.verification_cards {
            store.set_verification_card(record);
        }
        for public_key in snapshot.verification_card_public_keys {
            store.set_verification_card_public_key(public_key);
        }
        store
    }
}

impl CorrectnessInfoStore for MemStore {
    fn get_correctness_info(
        &self,
        election_event_id: &str,
        verification_card_set_id: &str,
    ) -> Option<CombinedCorrectnessInfo> {
        self.correctness_info
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key(election_event_id, verification_card_set_id))
            .cloned()
    }

    fn insert_correctness_info_if_absent(&self, info: CombinedCorrectnessInfo) -> bool {
        let mut map = self.correctness_info.write().unwrap_or_else(|e| e.into_inner());
        let id = key(&info.election_event_id, &info.verification_card_set_id);
        if map.contains_key(&id) {
            return false;
        }
        map.insert(id, info);
        true
    }
}

impl VerificationCardStore for MemStore {
    fn get_verification_card(
        &self,
        election_event_id: &str,
        verification_card_id: &str,
    ) -> Option<VerificationCardRecord> {
        self.verification_cards
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key(election_event_id, verification_card_id))
            .cloned()
    }

    fn set_verification_card(&self, record: VerificationCardRecord) {
        let id = key(&record.election_event_id, &record.verification_card_id);
        self.verification_cards
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, record);
    }

    fn insert_verification_card_if_absent(&self, record: VerificationCardRecord) -> bool {
        let mut map = self.verification_cards.write().unwrap_or_else(|e| e.into_inner());
        let id = key(&record.election_event_id, &record.verification_card_id);
        if map.contains_key(&id) {
            return false;
        }
        map.insert(id, record);
        true
    }
}

impl VerificationCardPublicKeyStore for MemStore {
    fn get_verification_card_public_key(
        &self,
        election_event_id: &str,
        verification_card_id: &str,
    ) -> Option<VerificationCardPublicKeyExtended> {
        self.verification_card_public_keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key(election_event_id, verification_card_id))
            .cloned()
    }

    fn set_verification_card_public_key(&self, public_key: VerificationCardPublicKeyExtended) {
        let id = key(&public_key.election_event_id, &public_key.verification_card_id);
        self.verification_card_public_keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, public_key);
    }
}
