use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::completion::keys::Key;
use crate::completion::provider::{KeySource, RegisterStore};

/// Pending input fed from a script. Clones share the same queue, so a test
/// can keep a handle and push keys while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct KeyQueue {
    keys: Rc<RefCell<VecDeque<Key>>>,
}

impl KeyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys<I: IntoIterator<Item = Key>>(keys: I) -> Self {
        Self {
            keys: Rc::new(RefCell::new(keys.into_iter().collect())),
        }
    }

    pub fn push(&self, key: Key) {
        self.keys.borrow_mut().push_back(key);
    }

    pub fn len(&self) -> usize {
        self.keys.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.borrow().is_empty()
    }
}

impl KeySource for KeyQueue {
    fn peek_key(&mut self) -> Option<Key> {
        self.keys.borrow().front().copied()
    }

    fn take_key(&mut self) -> Option<Key> {
        self.keys.borrow_mut().pop_front()
    }
}

/// Register contents fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticRegisters {
    contents: Vec<String>,
}

impl StaticRegisters {
    pub fn new<I, T>(contents: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            contents: contents.into_iter().map(Into::into).collect(),
        }
    }
}

impl RegisterStore for StaticRegisters {
    fn contents(&self) -> Vec<String> {
        self.contents.iter().filter(|c| !c.is_empty()).cloned().collect()
    }
}
