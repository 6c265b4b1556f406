//! Generation-checked tokens for kernel event payloads.
//!
//! Every registration carries a [`Token`] in its event payload instead of
//! a pointer. A token resolves only while the slot it names still holds
//! the same generation, so an event that arrives after its entry was
//! removed resolves to nothing instead of dangling.

use std::fmt;

/// Opaque back-reference stored in a kernel registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Token {
    index: u32,
    generation: u32,
}

impl Token {
    /// Pack into the integer carried by the kernel event.
    pub fn into_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    /// Rebuild from a raw event payload.
    pub fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot table handing out [`Token`]s.
///
/// Freed slots are reused with a bumped generation.
#[derive(Debug)]
pub struct TokenTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Default for TokenTable<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }
}

impl<T> TokenTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value and return the token naming it.
    pub fn insert(&mut self, value: T) -> Token {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Token {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Token {
            index,
            generation: 0,
        }
    }

    /// Resolve a token; `None` if it was never issued or is stale.
    pub fn get(&self, token: Token) -> Option<&T> {
        self.slots
            .get(token.index as usize)
            .filter(|slot| slot.generation == token.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Release a token, invalidating every copy of it.
    pub fn remove(&mut self, token: Token) -> Option<T> {
        let slot = self.slots.get_mut(token.index as usize)?;
        if slot.generation != token.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(token.index);
        self.live -= 1;
        Some(value)
    }

    pub fn contains(&self, token: Token) -> bool {
        self.get(token).is_some()
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_resolve() {
        let mut table = TokenTable::new();
        let a = table.insert("a");
        let b = table.insert("b");

        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.get(b), Some(&"b"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_stale_token_after_reuse() {
        let mut table = TokenTable::new();
        let old = table.insert("old");
        assert_eq!(table.remove(old), Some("old"));

        // Slot is reused, but the old token must not see the new value
        let new = table.insert("new");
        assert_ne!(old, new);
        assert!(table.get(old).is_none());
        assert_eq!(table.get(new), Some(&"new"));

        // Removing through a stale token is a no-op
        assert!(table.remove(old).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_double_remove() {
        let mut table = TokenTable::new();
        let token = table.insert(1);
        assert_eq!(table.remove(token), Some(1));
        assert_eq!(table.remove(token), None);
        assert!(table.is_empty());
        assert!(!table.contains(token));
    }

    #[test]
    fn test_contains_tracks_generation() {
        let mut table = TokenTable::new();
        let token = table.insert('x');
        assert!(table.contains(token));

        table.remove(token);
        let reused = table.insert('y');
        assert!(table.contains(reused));
        assert!(!table.contains(token));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_generation_kept_in_pointer_sized_payload() {
        let token = Token {
            index: 7,
            generation: u32::MAX,
        };
        // The kernel hands the payload back as a pointer-sized integer
        let payload = token.into_raw() as usize;
        assert_eq!(Token::from_raw(payload as u64), token);
    }

    #[test]
    fn test_raw_roundtrip_keeps_generation() {
        let mut table = TokenTable::new();
        let first = table.insert(());
        table.remove(first);
        let second = table.insert(());

        let raw = second.into_raw();
        assert_eq!(Token::from_raw(raw), second);
        assert_ne!(Token::from_raw(first.into_raw()), second);
    }
}
