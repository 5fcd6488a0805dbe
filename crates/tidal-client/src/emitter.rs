//! Keyed publish/subscribe with one-shot and collectable delivery.
//!
//! The emitter is owned by the engine task, so delivery is synchronous:
//! `emit` runs every listener before it returns and nothing else touches
//! the registry in between.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use tokio::sync::oneshot;

pub type ListenerId = u64;

enum Listener<E> {
    Persistent(Box<dyn FnMut(E) + Send>),
    Once(oneshot::Sender<E>),
}

struct Entry<E> {
    id: ListenerId,
    listener: Listener<E>,
}

pub struct Emitter<K, E> {
    listeners: HashMap<K, Vec<Entry<E>>>,
    collected: HashMap<K, VecDeque<E>>,
    collected_total: usize,
    collect_limit: usize,
    next_id: ListenerId,
}

impl<K, E> Default for Emitter<K, E> {
    fn default() -> Self {
        Self {
            listeners: HashMap::new(),
            collected: HashMap::new(),
            collected_total: 0,
            collect_limit: usize::MAX,
            next_id: 1,
        }
    }
}

impl<K, E> Emitter<K, E>
where
    K: Eq + Hash + Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps how many events [`Emitter::emit_collectable`] buffers across
    /// all keys. Events arriving once the cap is reached are discarded.
    pub fn with_collect_limit(limit: usize) -> Self {
        Self {
            collect_limit: limit,
            ..Self::default()
        }
    }

    pub fn subscribe<F>(&mut self, key: K, listener: F) -> ListenerId
    where
        F: FnMut(E) + Send + 'static,
    {
        self.register(key, Listener::Persistent(Box::new(listener)))
    }

    /// Subscribes and first replays every event buffered for `key` by
    /// [`Emitter::emit_collectable`]. The buffer is drained, so only the
    /// first historic subscriber sees those events.
    pub fn subscribe_historic<F>(&mut self, key: K, mut listener: F) -> ListenerId
    where
        F: FnMut(E) + Send + 'static,
    {
        if let Some(buffered) = self.collected.remove(&key) {
            self.collected_total -= buffered.len();
            for event in buffered {
                listener(event);
            }
        }
        self.subscribe(key, listener)
    }

    /// Resolves with the next event for `key`. With `historic`, the oldest
    /// buffered event is taken instead if one is waiting.
    pub fn subscribe_once(&mut self, key: K, historic: bool) -> oneshot::Receiver<E> {
        let (tx, rx) = oneshot::channel();
        if historic {
            if let Some(event) = self.take_collected(&key) {
                let _ = tx.send(event);
                return rx;
            }
        }
        self.register(key, Listener::Once(tx));
        rx
    }

    pub fn unsubscribe(&mut self, key: &K, id: ListenerId) -> bool {
        let Some(entries) = self.listeners.get_mut(key) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.listeners.remove(key);
        }
        removed
    }

    /// Delivers `event` to every listener of `key` in subscription order and
    /// returns how many received it. One-shot listeners are dropped after
    /// delivery, including those whose receiver has already gone away.
    pub fn emit(&mut self, key: &K, event: E) -> usize {
        let Some(entries) = self.listeners.get_mut(key) else {
            return 0;
        };
        let mut delivered = 0;
        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries.drain(..) {
            match entry.listener {
                Listener::Persistent(mut listener) => {
                    listener(event.clone());
                    delivered += 1;
                    kept.push(Entry {
                        id: entry.id,
                        listener: Listener::Persistent(listener),
                    });
                }
                Listener::Once(tx) => {
                    if tx.send(event.clone()).is_ok() {
                        delivered += 1;
                    }
                }
            }
        }
        if kept.is_empty() {
            self.listeners.remove(key);
        } else {
            *entries = kept;
        }
        delivered
    }

    /// Like [`Emitter::emit`], but buffers the event when `key` has no
    /// listeners so a later historic subscriber still receives it.
    pub fn emit_collectable(&mut self, key: &K, event: E) -> usize {
        if self.has_listeners(key) {
            return self.emit(key, event);
        }
        if !self.collect_full() {
            self.collected
                .entry(key.clone())
                .or_default()
                .push_back(event);
            self.collected_total += 1;
        }
        0
    }

    pub fn reset_collectable(&mut self, key: &K) {
        if let Some(buffered) = self.collected.remove(key) {
            self.collected_total -= buffered.len();
        }
    }

    /// Whether the collect limit has been reached.
    pub fn collect_full(&self) -> bool {
        self.collected_total >= self.collect_limit
    }

    pub fn has_listeners(&self, key: &K) -> bool {
        self.listeners
            .get(key)
            .map(|entries| !entries.is_empty())
            .unwrap_or(false)
    }

    /// Keys that currently have at least one listener.
    pub fn scan_keys(&self) -> Vec<K> {
        self.listeners.keys().cloned().collect()
    }

    pub fn collected_len(&self, key: &K) -> usize {
        self.collected.get(key).map(VecDeque::len).unwrap_or(0)
    }

    fn take_collected(&mut self, key: &K) -> Option<E> {
        let queue = self.collected.get_mut(key)?;
        let event = queue.pop_front();
        if event.is_some() {
            self.collected_total -= 1;
        }
        if queue.is_empty() {
            self.collected.remove(key);
        }
        event
    }

    fn register(&mut self, key: K, listener: Listener<E>) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners
            .entry(key)
            .or_default()
            .push(Entry { id, listener });
        id
    }
}
