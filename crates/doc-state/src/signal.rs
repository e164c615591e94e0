//! Synchronous event lists with add/remove and emit-to-all semantics (spec §9 "Signals"). No
//! backpressure, no async -- a listener is just a closure called inline from whichever `Doc`
//! method just changed something.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalHandle(u64);

pub struct Signal<T> {
 next_id: u64,
 listeners: Vec<(u64, Box<dyn FnMut(&T)>)>,
}

impl<T> Default for Signal<T> {
 fn default() -> Self {
 Signal { next_id: 0, listeners: Vec::new() }
 }
}

impl<T> Signal<T> {
 pub fn new() -> Self {
 Self::default()
 }

 pub fn subscribe(&mut self, listener: impl FnMut(&T) + 'static) -> SignalHandle {
 let id = self.next_id;
 self.next_id += 1;
 self.listeners.push((id, Box::new(listener)));
 SignalHandle(id)
 }

 pub fn unsubscribe(&mut self, handle: SignalHandle) {
 self.listeners.retain(|(id, _)| *id != handle.0);
 }

 pub fn emit(&mut self, value: &T) {
 for (_, listener) in self.listeners.iter_mut() {
 listener(value);
 }
 }

 pub fn listener_count(&self) -> usize {
 self.listeners.len()
 }
}
