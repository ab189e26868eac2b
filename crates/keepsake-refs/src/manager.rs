//! The (type tag, id) registry.
//!
//! [`ReferenceManager`] associates keys with live shared objects without
//! owning them: every entry is a `Weak` handle, so dropping the last `Shared`
//! handle to an object makes its entry count as absent. A reverse index by
//! allocation address answers "what key does this object have".

use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use keepsake_props::{downcast_shared, object_address, ErasedShared, Persistable, Shared, SharedObject};
use keepsake_tree::RefKey;
use tracing::debug;

use crate::error::{RefError, RefResult};
use crate::tags::validate_type_tag;

#[derive(Debug)]
struct TypeEntry {
    next_id: u64,
    live: BTreeMap<u64, Weak<dyn ErasedShared>>,
}

impl TypeEntry {
    fn new() -> Self {
        Self {
            next_id: 1,
            live: BTreeMap::new(),
        }
    }

    fn get(&self, id: u64) -> Option<SharedObject> {
        self.live.get(&id).and_then(Weak::upgrade)
    }

    fn prune(&mut self) {
        self.live.retain(|_, weak| weak.strong_count() > 0);
    }

    fn holds(&self, id: u64) -> bool {
        self.live.contains_key(&id)
    }
}

/// Registry mapping (type tag, id) to live shared objects.
///
/// The manager is a plain context object: create one per session (or share
/// one across sessions), pass it by reference, and call
/// [`reset`](Self::reset) to forget everything. It is not internally
/// synchronized.
#[derive(Debug, Default)]
pub struct ReferenceManager {
    types: HashMap<String, TypeEntry>,
    by_address: HashMap<usize, RefKey>,
}

impl ReferenceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `tag`. Tracking an already tracked tag is a no-op.
    pub fn store_type(&mut self, tag: &str) -> RefResult<()> {
        validate_type_tag(tag)?;
        if !self.types.contains_key(tag) {
            debug!(tag, "tracking type tag");
            self.types.insert(tag.to_string(), TypeEntry::new());
        }
        Ok(())
    }

    pub fn is_type_stored(&self, tag: &str) -> bool {
        self.types.contains_key(tag)
    }

    /// Tracked tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.types.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Propose the next free id for `tag`.
    ///
    /// Proposals increase monotonically and never name a live registration.
    /// Once the id space of a tag is used up this fails with
    /// [`RefError::IdsExhausted`].
    pub fn id_proposal(&mut self, tag: &str) -> RefResult<u64> {
        let exhausted = || RefError::IdsExhausted {
            tag: tag.to_string(),
        };
        let entry = self.entry_mut(tag)?;
        let mut id = entry.next_id;
        while entry.get(id).is_some() {
            id = id.checked_add(1).ok_or_else(exhausted)?;
        }
        entry.next_id = id.checked_add(1).ok_or_else(exhausted)?;
        Ok(id)
    }

    /// Register `object` under (tag, id).
    ///
    /// Fails if the tag is untracked or a live object already holds the key.
    /// A key held by a dropped object is reused silently.
    pub fn store_reference(&mut self, tag: &str, id: u64, object: &SharedObject) -> RefResult<()> {
        let entry = self.entry_mut(tag)?;
        if entry.get(id).is_some() {
            return Err(RefError::AlreadyRegistered {
                key: RefKey::new(tag, id),
            });
        }
        entry.live.insert(id, Rc::downgrade(object));
        if id >= entry.next_id {
            entry.next_id = id.saturating_add(1);
        }
        self.prune();

        let key = RefKey::new(tag, id);
        debug!(key = %key, type_name = object.type_name(), "registered reference");
        self.by_address.insert(object_address(object), key);
        Ok(())
    }

    /// Typed convenience over [`store_reference`](Self::store_reference).
    pub fn store_shared<T: Persistable>(
        &mut self,
        tag: &str,
        id: u64,
        object: &Shared<T>,
    ) -> RefResult<()> {
        let erased: SharedObject = object.clone();
        self.store_reference(tag, id, &erased)
    }

    pub fn is_referenced(&self, tag: &str, id: u64) -> RefResult<bool> {
        Ok(self.entry(tag)?.get(id).is_some())
    }

    /// Forget (tag, id). Absent keys are a no-op.
    pub fn remove_reference(&mut self, tag: &str, id: u64) -> RefResult<()> {
        let entry = self.entry_mut(tag)?;
        if entry.live.remove(&id).is_some() {
            let key = RefKey::new(tag, id);
            self.by_address.retain(|_, k| *k != key);
            debug!(key = %key, "removed reference");
        }
        Ok(())
    }

    /// The live object registered under (tag, id), if any.
    pub fn reference(&self, tag: &str, id: u64) -> RefResult<Option<SharedObject>> {
        Ok(self.entry(tag)?.get(id))
    }

    /// Like [`reference`](Self::reference), downcast to `T`.
    pub fn reference_as<T: Persistable>(&self, tag: &str, id: u64) -> RefResult<Option<Shared<T>>> {
        let Some(object) = self.reference(tag, id)? else {
            return Ok(None);
        };
        let found = object.type_name();
        downcast_shared::<T>(object)
            .map(Some)
            .ok_or_else(|| RefError::TypeMismatch {
                key: RefKey::new(tag, id),
                expected: std::any::type_name::<T>(),
                found,
            })
    }

    /// The key under which `object` is registered, if it is live and registered.
    pub fn key_of(&self, object: &SharedObject) -> Option<RefKey> {
        let key = self.by_address.get(&object_address(object))?;
        // Addresses are reused after a drop, so confirm identity.
        let registered = self.types.get(&key.tag)?.get(key.id)?;
        Rc::ptr_eq(&registered, object).then(|| key.clone())
    }

    /// Number of live registrations across all tags.
    pub fn len(&self) -> usize {
        self.types
            .values()
            .map(|entry| entry.live.values().filter(|w| w.strong_count() > 0).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every tag and registration.
    pub fn reset(&mut self) {
        debug!(tags = self.types.len(), "resetting reference manager");
        self.types.clear();
        self.by_address.clear();
    }

    /// Drop entries of dropped objects, along with their address index.
    fn prune(&mut self) {
        self.types.values_mut().for_each(TypeEntry::prune);
        let types = &self.types;
        self.by_address
            .retain(|_, key| types.get(&key.tag).is_some_and(|entry| entry.holds(key.id)));
    }

    fn entry(&self, tag: &str) -> RefResult<&TypeEntry> {
        self.types.get(tag).ok_or_else(|| RefError::UntrackedType {
            tag: tag.to_string(),
        })
    }

    fn entry_mut(&mut self, tag: &str) -> RefResult<&mut TypeEntry> {
        self.types.get_mut(tag).ok_or_else(|| RefError::UntrackedType {
            tag: tag.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_props::{erase, shared, Declaration};

    #[derive(Default)]
    struct Thing {
        n: u32,
    }

    impl Persistable for Thing {
        fn class_name(&self) -> &str {
            "Thing"
        }

        fn declare(&self, decl: &mut Declaration) {
            decl.of::<Self>().scalar("n", |o| o.n, |o, v| o.n = v);
        }
    }

    #[derive(Debug, Default)]
    struct Other;

    impl Persistable for Other {
        fn class_name(&self) -> &str {
            "Other"
        }

        fn declare(&self, _decl: &mut Declaration) {}
    }

    fn manager_with(tag: &str) -> ReferenceManager {
        let mut manager = ReferenceManager::new();
        manager.store_type(tag).unwrap();
        manager
    }

    #[test]
    fn store_and_lookup() {
        let mut manager = manager_with("T");
        let thing = shared(Thing { n: 5 });
        manager.store_shared("T", 1, &thing).unwrap();

        assert!(manager.is_referenced("T", 1).unwrap());
        assert!(!manager.is_referenced("T", 2).unwrap());
        let found = manager.reference_as::<Thing>("T", 1).unwrap().unwrap();
        assert!(Rc::ptr_eq(&found, &thing));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn untracked_tag_fails() {
        let mut manager = ReferenceManager::new();
        let thing = erase(&shared(Thing::default()));
        assert_eq!(
            manager.store_reference("T", 1, &thing),
            Err(RefError::UntrackedType { tag: "T".into() })
        );
        assert!(manager.reference("T", 1).is_err());
        assert!(manager.id_proposal("T").is_err());
        assert!(manager.is_referenced("T", 1).is_err());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut manager = manager_with("T");
        let a = shared(Thing::default());
        let b = shared(Thing::default());
        manager.store_shared("T", 1, &a).unwrap();
        assert_eq!(
            manager.store_shared("T", 1, &b),
            Err(RefError::AlreadyRegistered {
                key: RefKey::new("T", 1)
            })
        );
    }

    #[test]
    fn proposals_increase_and_skip_live_ids() {
        let mut manager = manager_with("T");
        let a = shared(Thing::default());
        manager.store_shared("T", 2, &a).unwrap();

        let first = manager.id_proposal("T").unwrap();
        let second = manager.id_proposal("T").unwrap();
        assert!(first > 2);
        assert!(second > first);

        let mut other = manager_with("U");
        let b = shared(Thing::default());
        other.store_shared("U", 1, &b).unwrap();
        assert_eq!(other.id_proposal("U").unwrap(), 2);
    }

    #[test]
    fn remove_is_noop_when_absent() {
        let mut manager = manager_with("T");
        manager.remove_reference("T", 9).unwrap();

        let a = shared(Thing::default());
        manager.store_shared("T", 9, &a).unwrap();
        manager.remove_reference("T", 9).unwrap();
        assert!(!manager.is_referenced("T", 9).unwrap());
        assert_eq!(manager.key_of(&erase(&a)), None);
    }

    #[test]
    fn dropped_objects_count_as_absent() {
        let mut manager = manager_with("T");
        {
            let temp = shared(Thing::default());
            manager.store_shared("T", 3, &temp).unwrap();
            assert!(manager.is_referenced("T", 3).unwrap());
        }
        assert!(!manager.is_referenced("T", 3).unwrap());
        assert!(manager.is_empty());

        let again = shared(Thing::default());
        manager.store_shared("T", 3, &again).unwrap();
        assert!(manager.is_referenced("T", 3).unwrap());
    }

    #[test]
    fn key_of_finds_registered_identity() {
        let mut manager = manager_with("T");
        let a = shared(Thing::default());
        let b = shared(Thing::default());
        manager.store_shared("T", 4, &a).unwrap();

        assert_eq!(manager.key_of(&erase(&a)), Some(RefKey::new("T", 4)));
        assert_eq!(manager.key_of(&erase(&b)), None);
    }

    #[test]
    fn reference_as_wrong_type_is_mismatch() {
        let mut manager = manager_with("T");
        let a = shared(Thing::default());
        manager.store_shared("T", 1, &a).unwrap();
        let err = manager.reference_as::<Other>("T", 1).unwrap_err();
        assert!(matches!(err, RefError::TypeMismatch { .. }));
        assert_eq!(err.kind(), keepsake_tree::ErrorKind::TypeMismatch);
    }

    #[test]
    fn reset_forgets_everything() {
        let mut manager = manager_with("T");
        let a = shared(Thing::default());
        manager.store_shared("T", 1, &a).unwrap();
        manager.reset();
        assert!(!manager.is_type_stored("T"));
        assert!(manager.is_empty());
        assert_eq!(manager.key_of(&erase(&a)), None);
    }

    #[test]
    fn proposals_fail_once_ids_run_out() {
        let mut manager = manager_with("T");
        let last = shared(Thing::default());
        manager.store_shared("T", u64::MAX, &last).unwrap();

        let err = manager.id_proposal("T").unwrap_err();
        assert_eq!(err, RefError::IdsExhausted { tag: "T".into() });
        assert_eq!(err.kind(), keepsake_tree::ErrorKind::Usage);
    }

    #[test]
    fn address_index_forgets_dropped_objects() {
        let mut manager = manager_with("T");
        for id in 1..=8 {
            let temp = shared(Thing::default());
            manager.store_shared("T", id, &temp).unwrap();
        }
        let kept = shared(Thing::default());
        manager.store_shared("T", 20, &kept).unwrap();

        assert_eq!(manager.by_address.len(), 1);
        assert_eq!(manager.key_of(&erase(&kept)), Some(RefKey::new("T", 20)));
    }

    #[test]
    fn invalid_tag_is_rejected() {
        let mut manager = ReferenceManager::new();
        assert!(matches!(
            manager.store_type(""),
            Err(RefError::InvalidTag { .. })
        ));
        assert!(manager.tags().is_empty());
    }
}
