//! Symbol table
//!
//! Names are mapped to addresses through two indices that always describe
//! the same relation: one ordered by name, one ordered by address and then
//! name. Neither index is reachable from outside this module, so every
//! change goes through [`SymbolTable`] and both stay in step.

use std::{cmp::Ordering, fmt::Display};

use super::{
    index::{Index, IndexDef, Seek},
    Address,
};
use crate::prelude::{Error, FdResult};

/// Longest stored name in bytes. Longer names are cut silently, so two
/// names sharing the first `MAX_NAME_LEN` bytes are the same symbol.
pub const MAX_NAME_LEN: usize = 63;

const BRANCHES: usize = 32;

/// An owned symbol name of at most [`MAX_NAME_LEN`] bytes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolName(String);

impl SymbolName {
    /// The one place names are truncated. The cut is moved back to the
    /// nearest character boundary so the result stays valid UTF-8.
    pub fn new(text: &str) -> Self {
        let mut len = text.len().min(MAX_NAME_LEN);
        while !text.is_char_boundary(len) {
            len -= 1;
        }
        Self(text[..len].to_owned())
    }

    /// Names are stored whole in one whitespace separated listing
    /// column, so they must be non-empty and free of whitespace.
    pub fn check(text: &str) -> FdResult<()> {
        if text.is_empty() || text.chars().any(char::is_whitespace) {
            Err(Error::InvalidName(text.to_owned()))
        } else {
            Ok(())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SymbolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name part of an [`AddressKey`]. `Ceiling` sorts after every name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NameBound {
    Name(SymbolName),
    Ceiling,
}

impl NameBound {
    pub fn name(&self) -> Option<&SymbolName> {
        match self {
            Self::Name(name) => Some(name),
            Self::Ceiling => None,
        }
    }
}

/// Key of the reverse index, ordered by address first and name second
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AddressKey {
    pub address: Address,
    pub name: NameBound,
}

impl AddressKey {
    pub fn new(address: Address, name: SymbolName) -> Self {
        Self {
            address,
            name: NameBound::Name(name),
        }
    }

    /// A key greater than every real key at `address` and smaller than
    /// every key at the next address. Floor queries with it land on the
    /// lexicographically last name at the greatest address not above
    /// `address`.
    pub fn ceiling_name_sentinel(address: Address) -> Self {
        Self {
            address,
            name: NameBound::Ceiling,
        }
    }
}

fn name_compare(left: &SymbolName, right: &SymbolName) -> Ordering {
    left.cmp(right)
}

fn address_compare(left: &AddressKey, right: &AddressKey) -> Ordering {
    left.cmp(right)
}

/// Result of [`SymbolTable::nearest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nearest<'a> {
    pub name: &'a str,
    pub address: Address,
    pub offset: Address,
}

impl Display for Nearest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.offset == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}+0x{:x}", self.name, self.offset)
        }
    }
}

pub struct SymbolTable {
    names: Index<SymbolName, Address>,
    addresses: Index<AddressKey, ()>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            names: Index::new(IndexDef {
                compare: name_compare,
                branches: BRANCHES,
            }),
            addresses: Index::new(IndexDef {
                compare: address_compare,
                branches: BRANCHES,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
        self.addresses.clear();
    }

    /// Define `name` at `address`, replacing any previous definition.
    ///
    /// On failure the table is left exactly as it was.
    pub fn set(&mut self, name: &str, address: Address) -> FdResult<()> {
        SymbolName::check(name)?;
        let name = SymbolName::new(name);
        let old = self.names.get(&name).copied();
        let key = AddressKey::new(address, name.clone());

        if let Err(err) = self.addresses.insert(key.clone(), ()) {
            log::error!("stab: can't set {} = 0x{:04x}", name, address);
            return Err(err);
        }

        if let Err(err) = self.names.insert(name.clone(), address) {
            // the reverse entry is new unless the address did not change
            if old != Some(address) {
                self.addresses.remove(&key)?;
            }
            log::error!("stab: can't set {} = 0x{:04x}", name, address);
            return Err(err);
        }

        if let Some(old) = old.filter(|old| *old != address) {
            self.addresses.remove(&AddressKey::new(old, name))?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Address> {
        self.names.get(&SymbolName::new(name)).copied()
    }

    /// Remove `name` and return the address it was defined at
    pub fn delete(&mut self, name: &str) -> FdResult<Address> {
        let name = SymbolName::new(name);
        let address = self
            .names
            .get(&name)
            .copied()
            .ok_or_else(|| Error::SymbolNotFound(name.to_string()))?;

        self.names.remove(&name)?;
        self.addresses.remove(&AddressKey::new(address, name))?;
        Ok(address)
    }

    /// Find the symbol at the greatest address not above `address`.
    /// Ties at that address go to the lexicographically last name.
    pub fn nearest(&self, address: Address) -> Option<Nearest<'_>> {
        let ceiling = AddressKey::ceiling_name_sentinel(address);
        let (key, _) = self.addresses.seek(Seek::LessOrEqual(&ceiling))?;
        let name = key.name.name()?;
        Some(Nearest {
            name: name.as_str(),
            address: key.address,
            offset: address - key.address,
        })
    }

    /// Visit every symbol in ascending address order, ties by name.
    /// The first error returned by `visit` ends the walk and is passed on.
    pub fn enumerate<F>(&self, mut visit: F) -> FdResult<()>
    where
        F: FnMut(&str, Address) -> FdResult<()>,
    {
        let mut entry = self.addresses.seek(Seek::First);
        while let Some((key, _)) = entry {
            if let Some(name) = key.name.name() {
                visit(name.as_str(), key.address)?;
            }
            entry = self.addresses.seek(Seek::Next(key));
        }
        Ok(())
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use super::{Nearest, SymbolName, SymbolTable, MAX_NAME_LEN};
    use crate::core::{index::Seek, Address};
    use crate::prelude::Error;

    fn forward(stab: &SymbolTable) -> BTreeSet<(String, Address)> {
        let mut out = BTreeSet::new();
        let mut entry = stab.names.seek(Seek::First);
        while let Some((name, address)) = entry {
            out.insert((name.to_string(), *address));
            entry = stab.names.seek(Seek::Next(name));
        }
        out
    }

    fn reverse(stab: &SymbolTable) -> BTreeSet<(String, Address)> {
        let mut out = BTreeSet::new();
        stab.enumerate(|name, address| {
            out.insert((name.to_string(), address));
            Ok(())
        })
        .unwrap();
        out
    }

    fn nearest(stab: &SymbolTable, address: Address) -> Option<(String, Address)> {
        stab.nearest(address)
            .map(|n| (n.name.to_string(), n.offset))
    }

    #[test]
    fn nearest_with_offset() {
        let mut stab = SymbolTable::new();
        stab.set("main", 0x4400).unwrap();
        stab.set("loop", 0x4420).unwrap();
        assert_eq!(Some(("loop".into(), 0x5)), nearest(&stab, 0x4425));
        assert_eq!(Some(("main".into(), 0x1f)), nearest(&stab, 0x441f));
        assert_eq!(None, nearest(&stab, 0x43ff));
    }

    #[test]
    fn nearest_prefers_last_name() {
        let mut stab = SymbolTable::new();
        stab.set("a", 0x1000).unwrap();
        stab.set("b", 0x1000).unwrap();
        assert_eq!(Some(("b".into(), 0)), nearest(&stab, 0x1000));
        assert_eq!(Some(("b".into(), 2)), nearest(&stab, 0x1002));
    }

    #[test]
    fn nearest_at_extremes() {
        let mut stab = SymbolTable::new();
        assert_eq!(None, nearest(&stab, Address::MAX));
        stab.set("zero", 0).unwrap();
        stab.set("top", Address::MAX).unwrap();
        assert_eq!(Some(("zero".into(), 0)), nearest(&stab, 0));
        assert_eq!(Some(("top".into(), 0)), nearest(&stab, Address::MAX));
        assert_eq!(
            Some(("zero".into(), Address::MAX - 1)),
            nearest(&stab, Address::MAX - 1)
        );
    }

    #[test]
    fn overwrite_moves_reverse_entry() {
        let mut stab = SymbolTable::new();
        stab.set("x", 0x10).unwrap();
        stab.set("x", 0x20).unwrap();
        assert_eq!(Some(0x20), stab.get("x"));
        assert_eq!(None, nearest(&stab, 0x10));
        assert_eq!(Some(("x".into(), 0)), nearest(&stab, 0x20));
        assert_eq!(1, stab.len());
    }

    #[test]
    fn overwrite_keeps_other_symbol_at_old_address() {
        let mut stab = SymbolTable::new();
        stab.set("x", 0x10).unwrap();
        stab.set("a", 0x10).unwrap();
        stab.set("x", 0x20).unwrap();
        assert_eq!(Some(("a".into(), 0)), nearest(&stab, 0x10));
    }

    #[test]
    fn set_same_address_twice() {
        let mut stab = SymbolTable::new();
        stab.set("x", 0x10).unwrap();
        stab.set("x", 0x10).unwrap();
        assert_eq!(1, stab.len());
        assert_eq!(forward(&stab), reverse(&stab));
    }

    #[test]
    fn delete_missing() {
        let mut stab = SymbolTable::new();
        stab.set("main", 0x4400).unwrap();
        let err = stab.delete("nonexistent").unwrap_err();
        assert!(matches!(err, Error::SymbolNotFound(name) if name == "nonexistent"));
        assert_eq!(Some(0x4400), stab.get("main"));
        assert_eq!(1, stab.len());
    }

    #[test]
    fn delete_removes_both_sides() {
        let mut stab = SymbolTable::new();
        stab.set("main", 0x4400).unwrap();
        assert_eq!(0x4400, stab.delete("main").unwrap());
        assert_eq!(None, stab.get("main"));
        assert_eq!(None, nearest(&stab, 0x4400));
        assert!(stab.is_empty());
    }

    #[test]
    fn enumerate_empty() {
        let stab = SymbolTable::new();
        let mut visits = 0;
        stab.enumerate(|_, _| {
            visits += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(0, visits);
    }

    #[test]
    fn enumerate_in_address_order() {
        let mut stab = SymbolTable::new();
        stab.set("c", 0x30).unwrap();
        stab.set("b", 0x10).unwrap();
        stab.set("a", 0x10).unwrap();
        stab.set("d", 0x20).unwrap();

        let mut seen = vec![];
        stab.enumerate(|name, address| {
            seen.push((name.to_string(), address));
            Ok(())
        })
        .unwrap();
        assert_eq!(
            vec![
                ("a".to_string(), 0x10),
                ("b".to_string(), 0x10),
                ("d".to_string(), 0x20),
                ("c".to_string(), 0x30),
            ],
            seen
        );
    }

    #[test]
    fn enumerate_stops_early() {
        let mut stab = SymbolTable::new();
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            stab.set(name, i as Address).unwrap();
        }
        let mut seen = vec![];
        let res = stab.enumerate(|name, _| {
            seen.push(name.to_string());
            if name == "b" {
                Err(Error::KeyNotFound)
            } else {
                Ok(())
            }
        });
        assert!(matches!(res, Err(Error::KeyNotFound)));
        assert_eq!(vec!["a", "b"], seen);
    }

    #[test]
    fn clear_twice() {
        let mut stab = SymbolTable::new();
        stab.set("main", 0x4400).unwrap();
        stab.clear();
        assert!(stab.is_empty());
        assert!(reverse(&stab).is_empty());
        stab.clear();
        assert!(stab.is_empty());
        assert!(reverse(&stab).is_empty());
        assert_eq!(None, nearest(&stab, 0x4400));
    }

    #[test]
    fn long_names_collide() {
        let prefix = "n".repeat(MAX_NAME_LEN);
        let first = format!("{}_first", prefix);
        let second = format!("{}_second", prefix);

        let mut stab = SymbolTable::new();
        stab.set(&first, 0x100).unwrap();
        stab.set(&second, 0x200).unwrap();
        assert_eq!(1, stab.len());
        assert_eq!(Some(0x200), stab.get(&first));
        assert_eq!(Some(0x200), stab.get(&prefix));
        assert_eq!(Some((prefix.clone(), 0)), nearest(&stab, 0x200));
        assert_eq!(None, nearest(&stab, 0x1ff));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = format!("{}é", "x".repeat(MAX_NAME_LEN - 1));
        let name = SymbolName::new(&text);
        assert_eq!(MAX_NAME_LEN - 1, name.as_str().len());
        assert_eq!("short", SymbolName::new("short").as_str());
    }

    #[test]
    fn nearest_display() {
        let at = Nearest {
            name: "main",
            address: 0x4400,
            offset: 0,
        };
        assert_eq!("main", at.to_string());
        let past = Nearest { offset: 0x1a, ..at };
        assert_eq!("main+0x1a", past.to_string());
    }

    #[test]
    fn bijective_after_mixed_operations() {
        let mut stab = SymbolTable::new();
        for i in 0..600u64 {
            let name = format!("sym{}", (i * 37) % 150);
            match i % 7 {
                3 => {
                    let _ = stab.delete(&name);
                }
                5 => stab.set(&name, 0x1000).unwrap(),
                _ => stab.set(&name, (i * 13) % 0x400).unwrap(),
            }
            assert_eq!(forward(&stab), reverse(&stab));
        }
        assert_eq!(forward(&stab).len(), stab.len());
    }

    #[test]
    fn floor_against_brute_force() {
        let mut stab = SymbolTable::new();
        let mut defined = vec![];
        for i in 0..200u64 {
            let name = format!("f{}", i % 90);
            let address = (i * 97) % 2000;
            stab.set(&name, address).unwrap();
            defined.retain(|(n, _): &(String, Address)| *n != name);
            defined.push((name, address));
        }
        for q in (0..2100).step_by(7) {
            let expected = defined
                .iter()
                .filter(|(_, a)| *a <= q)
                .max_by(|(ln, la), (rn, ra)| la.cmp(ra).then(ln.cmp(rn)))
                .map(|(n, a)| (n.clone(), q - a));
            assert_eq!(expected, nearest(&stab, q));
        }
    }

    #[test]
    fn rejects_names_a_listing_cannot_hold() {
        let mut stab = SymbolTable::new();
        for bad in ["two words", "", "tab\there", "trailing\n"] {
            let err = stab.set(bad, 0x10).unwrap_err();
            assert!(matches!(err, Error::InvalidName(name) if name == bad));
        }
        assert!(stab.is_empty());
        assert!(SymbolName::check("_start.isr$1").is_ok());
    }

    #[test]
    fn failed_forward_insert_keeps_old_mapping() {
        let mut stab = SymbolTable::new();
        stab.set("x", 0x10).unwrap();
        stab.set("y", 0x30).unwrap();

        stab.names.fail_inserts = true;
        let res = stab.set("x", 0x20);
        assert!(matches!(res, Err(Error::OutOfMemory(_))));
        stab.names.fail_inserts = false;

        assert_eq!(Some(0x10), stab.get("x"));
        assert_eq!(Some(("x".to_string(), 0x10)), nearest(&stab, 0x20));
        assert_eq!(forward(&stab), reverse(&stab));
        assert_eq!(2, stab.len());
    }

    #[test]
    fn failed_forward_insert_at_same_address() {
        let mut stab = SymbolTable::new();
        stab.set("x", 0x10).unwrap();

        stab.names.fail_inserts = true;
        assert!(matches!(stab.set("x", 0x10), Err(Error::OutOfMemory(_))));
        stab.names.fail_inserts = false;

        assert_eq!(Some(0x10), stab.get("x"));
        assert_eq!(Some(("x".to_string(), 0)), nearest(&stab, 0x10));
        assert_eq!(forward(&stab), reverse(&stab));
        assert_eq!(1, reverse(&stab).len());
    }

    #[test]
    fn failed_reverse_insert_changes_nothing() {
        let mut stab = SymbolTable::new();
        stab.set("x", 0x10).unwrap();

        stab.addresses.fail_inserts = true;
        assert!(matches!(stab.set("x", 0x20), Err(Error::OutOfMemory(_))));
        assert!(matches!(stab.set("new", 0x40), Err(Error::OutOfMemory(_))));
        stab.addresses.fail_inserts = false;

        assert_eq!(Some(0x10), stab.get("x"));
        assert_eq!(None, stab.get("new"));
        assert_eq!(forward(&stab), reverse(&stab));
        assert_eq!(1, stab.len());
    }
}
