//! Path-compressed binary (Patricia) trie over [`AddressSpace`] keys.
//!
//! Filled once by the decoder, then only read. Every node carries the full
//! prefix it stands for; nodes without a value are branching points created
//! when two prefixes diverge.

use std::fmt;

use log::trace;

use crate::helpers::{common_prefix_len, get_bit};
use crate::types::{AddressSpace, Match};

#[derive(Clone)]
struct Node<V> {
    prefix: AddressSpace,
    value: Option<V>,
    children: [Option<Box<Node<V>>>; 2],
}

impl<V> Node<V> {
    fn new(prefix: AddressSpace, value: Option<V>) -> Self {
        Self {
            prefix,
            value,
            children: [None, None],
        }
    }
}

#[derive(Clone)]
pub struct PrefixTrie<V> {
    root: Option<Box<Node<V>>>,
    len: usize,
}

impl<V> Default for PrefixTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PrefixTrie<V> {
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Number of stored prefixes (branching nodes excluded).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store `value` under `prefix`. Re-inserting an identical prefix replaces
    /// the value and returns the previous one.
    pub fn insert(&mut self, prefix: AddressSpace, value: V) -> Option<V> {
        let previous = Self::insert_at(&mut self.root, prefix, value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    fn insert_at(link: &mut Option<Box<Node<V>>>, prefix: AddressSpace, value: V) -> Option<V> {
        let Some(node) = link.as_deref_mut() else {
            trace!("[INSERT] {prefix}: empty link, new leaf");
            *link = Some(Box::new(Node::new(prefix, Some(value))));
            return None;
        };

        let plen = prefix.prefix_len();
        let node_plen = node.prefix.prefix_len();
        let cpl = common_prefix_len(prefix.bits(), node.prefix.bits(), plen.min(node_plen));

        if cpl == node_plen {
            if plen == node_plen {
                trace!("[INSERT] {prefix}: exact match, replacing value");
                if node.value.is_none() {
                    // branching node promoted to a stored prefix
                    node.value = Some(value);
                    return None;
                }
                return node.value.replace(value);
            }
            let bit = get_bit(prefix.bits(), node_plen) as usize;
            trace!("[INSERT] {prefix}: descending below {} (bit {bit})", node.prefix);
            return Self::insert_at(&mut node.children[bit], prefix, value);
        }

        // The existing node moves one level down, under a new node of length `cpl`.
        let existing_bit = get_bit(node.prefix.bits(), cpl) as usize;
        let mut parent = if cpl == plen {
            trace!("[INSERT] {prefix}: insert above {}", node.prefix);
            Node::new(prefix, Some(value))
        } else {
            let branch = prefix.truncate(cpl);
            trace!("[INSERT] {prefix}: split at {branch}");
            let mut internal = Node::new(branch, None);
            internal.children[1 - existing_bit] = Some(Box::new(Node::new(prefix, Some(value))));
            internal
        };
        parent.children[existing_bit] = link.take();
        *link = Some(Box::new(parent));
        None
    }

    /// Deepest stored prefix containing `query`.
    ///
    /// For a host query (length 128) this is the classic longest-prefix match.
    pub fn lookup(&self, query: &AddressSpace) -> Option<Match<'_, V>> {
        let mut best = None;
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            if !node.prefix.contains(query) {
                break;
            }
            if let Some(value) = &node.value {
                best = Some(Match {
                    prefix: node.prefix,
                    value,
                });
            }
            let plen = node.prefix.prefix_len();
            if plen >= query.prefix_len() {
                break;
            }
            current = node.children[get_bit(query.bits(), plen) as usize].as_deref();
        }
        best
    }

    /// Value stored under exactly `prefix`.
    pub fn get(&self, prefix: &AddressSpace) -> Option<&V> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            if node.prefix == *prefix {
                return node.value.as_ref();
            }
            let plen = node.prefix.prefix_len();
            if !node.prefix.contains(prefix) || plen >= prefix.prefix_len() {
                return None;
            }
            current = node.children[get_bit(prefix.bits(), plen) as usize].as_deref();
        }
        None
    }

    /// Stored entries in pre-order: a prefix comes before the prefixes it
    /// contains, and lower addresses before higher ones.
    pub fn iter(&self) -> Iter<'_, V> {
        let mut stack = Vec::with_capacity(64);
        if let Some(root) = self.root.as_deref() {
            stack.push(root);
        }
        Iter { stack }
    }
}

impl<V: fmt::Debug> fmt::Debug for PrefixTrie<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(prefix, value)| (prefix.to_string(), value)))
            .finish()
    }
}

impl<V> FromIterator<(AddressSpace, V)> for PrefixTrie<V> {
    fn from_iter<I: IntoIterator<Item = (AddressSpace, V)>>(iter: I) -> Self {
        let mut trie = PrefixTrie::new();
        for (prefix, value) in iter {
            trie.insert(prefix, value);
        }
        trie
    }
}

pub struct Iter<'a, V> {
    stack: Vec<&'a Node<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (AddressSpace, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            let [left, right] = &node.children;
            if let Some(r) = right.as_deref() {
                self.stack.push(r);
            }
            if let Some(l) = left.as_deref() {
                self.stack.push(l);
            }
            if let Some(value) = &node.value {
                return Some((node.prefix, value));
            }
        }
        None
    }
}

impl<'a, V> IntoIterator for &'a PrefixTrie<V> {
    type Item = (AddressSpace, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
