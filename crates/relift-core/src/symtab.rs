//! A two-way symbol table: address to name and name to address, both
//! directions iterable in sorted order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::Addr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymTab {
    addr_to_name: BTreeMap<Addr, String>,
    name_to_addr: BTreeMap<String, Addr>,
}

impl SymTab {
    pub fn new() -> SymTab {
        SymTab::default()
    }

    /// Adds a symbol. A rebind of either the address or the name replaces
    /// the old pairing in both directions.
    pub fn add(&mut self, addr: Addr, name: &str) {
        if let Some(old_name) = self.addr_to_name.insert(addr, name.to_string()) {
            self.name_to_addr.remove(&old_name);
        }
        if let Some(old_addr) = self.name_to_addr.insert(name.to_string(), addr) {
            if old_addr != addr {
                self.addr_to_name.remove(&old_addr);
            }
        }
    }

    pub fn name_at(&self, addr: Addr) -> Option<&str> {
        self.addr_to_name.get(&addr).map(|s| s.as_str())
    }

    pub fn addr_of(&self, name: &str) -> Option<Addr> {
        self.name_to_addr.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.addr_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addr_to_name.is_empty()
    }

    /// Symbols in address order.
    pub fn iter(&self) -> impl Iterator<Item = (Addr, &str)> {
        self.addr_to_name.iter().map(|(a, n)| (*a, n.as_str()))
    }

    /// Symbols in name order.
    pub fn iter_by_name(&self) -> impl Iterator<Item = (&str, Addr)> {
        self.name_to_addr.iter().map(|(n, a)| (n.as_str(), *a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_directions_resolve() {
        let mut t = SymTab::new();
        t.add(Addr(0x100), "main");
        t.add(Addr(0x200), "helper");
        assert_eq!(t.name_at(Addr(0x100)), Some("main"));
        assert_eq!(t.addr_of("helper"), Some(Addr(0x200)));
        assert_eq!(t.name_at(Addr(0x300)), None);
        assert_eq!(t.addr_of("nothing"), None);
    }

    #[test]
    fn iteration_is_sorted() {
        let mut t = SymTab::new();
        t.add(Addr(0x300), "zebra");
        t.add(Addr(0x100), "apple");
        t.add(Addr(0x200), "mango");
        let by_addr: Vec<u32> = t.iter().map(|(a, _)| a.0).collect();
        assert_eq!(by_addr, vec![0x100, 0x200, 0x300]);
        let by_name: Vec<&str> = t.iter_by_name().map(|(n, _)| n).collect();
        assert_eq!(by_name, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn rebinding_replaces_both_directions() {
        let mut t = SymTab::new();
        t.add(Addr(0x100), "old");
        t.add(Addr(0x100), "new");
        assert_eq!(t.name_at(Addr(0x100)), Some("new"));
        assert_eq!(t.addr_of("old"), None);
        assert_eq!(t.len(), 1);
    }
}
