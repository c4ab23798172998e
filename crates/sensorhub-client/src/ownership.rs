use std::any::Any;
use std::fmt;

use tracing::trace;

/// Opaque key for an object handed to a [`KeyedOwnership`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectKey(u64);

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Owns arbitrary objects on someone's behalf until released.
///
/// Whatever is still held on drop is released newest first.
#[derive(Default)]
pub struct KeyedOwnership {
    next_key: u64,
    objects: Vec<(ObjectKey, Box<dyn Any>)>,
}

impl KeyedOwnership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `object`.
    pub fn acquire<O: Any>(&mut self, object: O) -> ObjectKey {
        let key = ObjectKey(self.next_key);
        self.next_key += 1;
        self.objects.push((key, Box::new(object)));
        trace!(%key, "object acquired");
        key
    }

    /// Drop the object behind `key`. Returns `false` if nothing was held
    /// under it.
    pub fn release(&mut self, key: ObjectKey) -> bool {
        match self.objects.iter().position(|(k, _)| *k == key) {
            Some(idx) => {
                drop(self.objects.remove(idx));
                trace!(%key, "object released");
                true
            }
            None => false,
        }
    }

    pub fn get<O: Any>(&self, key: ObjectKey) -> Option<&O> {
        self.objects
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, object)| object.downcast_ref())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop everything, newest first.
    pub fn release_all(&mut self) {
        while let Some((key, object)) = self.objects.pop() {
            drop(object);
            trace!(%key, "object released");
        }
    }
}

impl Drop for KeyedOwnership {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for KeyedOwnership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedOwnership")
            .field("held", &self.objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    struct Noisy(&'static str, Rc<RefCell<Vec<&'static str>>>);

    impl Drop for Noisy {
        fn drop(&mut self) {
            self.1.borrow_mut().push(self.0);
        }
    }

    #[test]
    fn release_by_key() {
        let mut owner = KeyedOwnership::new();
        let key = owner.acquire(42u32);
        assert_eq!(owner.get::<u32>(key), Some(&42));
        assert_eq!(owner.get::<String>(key), None);
        assert!(owner.release(key));
        assert!(!owner.release(key));
        assert!(owner.is_empty());
    }

    #[test]
    fn drop_releases_in_reverse_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let mut owner = KeyedOwnership::new();
            owner.acquire(Noisy("first", Rc::clone(&log)));
            owner.acquire(Noisy("second", Rc::clone(&log)));
            owner.acquire(Noisy("third", Rc::clone(&log)));
        }
        assert_eq!(*log.borrow(), vec!["third", "second", "first"]);
    }
}
