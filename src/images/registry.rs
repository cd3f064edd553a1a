// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A dense arena with generation-checked handles.

Each resource kind lives in one [`Registry`].  Removal is O(1) and frees the slot for
reuse; the slot's generation is bumped so that handles to the removed resource can never
resolve to whatever is stored there next.
*/

use crate::error::{Error, Result};
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Names a resource kind in error messages.
pub trait Kind {
    const KIND: &'static str;
}

/// A stable handle to an entry of a [`Registry`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}
impl<T> Eq for Handle<T> {}
impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}
impl<T: Kind> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}v{}", T::KIND, self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T: Kind> Registry<T> {
    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle {
                index,
                generation: slot.generation,
                _kind: PhantomData,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
            _kind: PhantomData,
        }
    }

    pub fn remove(&mut self, handle: Handle<T>) -> Result<T> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .ok_or_else(|| stale::<T>(handle))?;
        let value = slot.value.take().ok_or_else(|| stale::<T>(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Ok(value)
    }

    pub fn get(&self, handle: Handle<T>) -> Result<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_ref())
            .ok_or_else(|| stale::<T>(handle))
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Result<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_mut())
            .ok_or_else(|| stale::<T>(handle))
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_ok()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn handles(&self) -> Vec<Handle<T>> {
        self.iter().map(|(h, _)| h).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value.as_ref().map(|v| {
                (
                    Handle {
                        index: i as u32,
                        generation: s.generation,
                        _kind: PhantomData,
                    },
                    v,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| {
            let generation = s.generation;
            s.value.as_mut().map(|v| {
                (
                    Handle {
                        index: i as u32,
                        generation,
                        _kind: PhantomData,
                    },
                    v,
                )
            })
        })
    }
}

fn stale<T: Kind>(handle: Handle<T>) -> Error {
    Error::config(format!("{handle:?} does not name a live {}", T::KIND))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Thing(u32);
    impl Kind for Thing {
        const KIND: &'static str = "thing";
    }

    #[test]
    fn stale_handle_does_not_alias() {
        let mut r = Registry::default();
        let a = r.insert(Thing(1));
        assert_eq!(r.remove(a).unwrap(), Thing(1));
        let b = r.insert(Thing(2));
        assert_eq!(a.index(), b.index());
        assert!(r.get(a).unwrap_err().is_config());
        assert_eq!(r.get(b).unwrap(), &Thing(2));
        assert!(r.remove(a).is_err());
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn iteration_skips_holes() {
        let mut r = Registry::default();
        let a = r.insert(Thing(1));
        let _b = r.insert(Thing(2));
        let c = r.insert(Thing(3));
        r.remove(a).unwrap();
        let seen: Vec<u32> = r.iter().map(|(_, t)| t.0).collect();
        assert_eq!(seen, [2, 3]);
        r.get_mut(c).unwrap().0 = 30;
        assert_eq!(r.get(c).unwrap().0, 30);
    }

    #[test]
    fn reused_slots_iterate_in_slot_order() {
        let mut r = Registry::default();
        let a = r.insert(Thing(1));
        let b = r.insert(Thing(2));
        r.insert(Thing(3));
        r.remove(a).unwrap();
        r.remove(b).unwrap();
        r.insert(Thing(4));
        r.insert(Thing(5));
        let seen: Vec<u32> = r.iter().map(|(_, t)| t.0).collect();
        assert_eq!(seen, [5, 4, 3]);
    }
}
