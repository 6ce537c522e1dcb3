//! Named event dispatch
//!
//! A small fire-and-subscribe emitter used by runners and timelines.
//! Listeners are keyed by event name, fire in subscription order, and can
//! be detached individually through the [`ListenerId`] returned on subscribe.

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::hash::Hash;
use std::rc::Rc;

new_key_type! {
    /// Handle to a subscribed listener
    pub struct ListenerId;
}

/// Listener callback type
///
/// Listeners are reference counted so a fire can snapshot the current set
/// and release every borrow before calling out.
pub type Listener<A> = Rc<dyn Fn(&A)>;

/// Snapshot of the listeners attached to one event
pub type ListenerSnapshot<A> = SmallVec<[Listener<A>; 4]>;

struct Subscription<E, A: ?Sized> {
    event: E,
    listener: Listener<A>,
}

/// Dispatches named events of kind `E` carrying a payload `A`
pub struct EventEmitter<E, A: ?Sized> {
    subscriptions: SlotMap<ListenerId, Subscription<E, A>>,
    by_event: FxHashMap<E, SmallVec<[ListenerId; 4]>>,
}

impl<E, A> EventEmitter<E, A>
where
    E: Copy + Eq + Hash,
    A: ?Sized,
{
    pub fn new() -> Self {
        Self {
            subscriptions: SlotMap::with_key(),
            by_event: FxHashMap::default(),
        }
    }

    /// Subscribe a listener to an event
    pub fn on<F>(&mut self, event: E, listener: F) -> ListenerId
    where
        F: Fn(&A) + 'static,
    {
        let id = self.subscriptions.insert(Subscription {
            event,
            listener: Rc::new(listener),
        });
        self.by_event.entry(event).or_default().push(id);
        id
    }

    /// Detach a listener. Returns false if it was not subscribed.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let Some(subscription) = self.subscriptions.remove(id) else {
            return false;
        };
        if let Some(ids) = self.by_event.get_mut(&subscription.event) {
            ids.retain(|existing| *existing != id);
        }
        true
    }

    /// Detach every listener of an event
    pub fn off_all(&mut self, event: E) {
        if let Some(ids) = self.by_event.remove(&event) {
            for id in ids {
                self.subscriptions.remove(id);
            }
        }
    }

    /// Clone the listeners of an event, in subscription order
    pub fn listeners(&self, event: E) -> ListenerSnapshot<A> {
        self.by_event
            .get(&event)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.subscriptions.get(*id))
                    .map(|s| Rc::clone(&s.listener))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fire an event
    ///
    /// Listeners subscribed while the event is firing are not called until
    /// the next fire.
    pub fn emit(&self, event: E, payload: &A) {
        for listener in self.listeners(event) {
            listener(payload);
        }
    }

    pub fn listener_count(&self, event: E) -> usize {
        self.by_event.get(&event).map_or(0, |ids| ids.len())
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl<E, A> Default for EventEmitter<E, A>
where
    E: Copy + Eq + Hash,
    A: ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}
