use std::cell::RefCell;
use std::rc::Rc;

use mqtt_core::{ConnectStatus, Event, RequestResult, Transport};

/// A non-blocking transport double that records every `send` and lets a
/// test drive the client's event-adapter methods by hand, the way a real
/// embedder's transport would.
#[derive(Clone)]
pub struct MockTransport {
    pub sent: Rc<RefCell<Vec<Vec<u8>>>>,
    pub started: Rc<RefCell<Option<(String, u16)>>>,
    pub close_calls: Rc<RefCell<u32>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Rc::new(RefCell::new(Vec::new())),
            started: Rc::new(RefCell::new(None)),
            close_calls: Rc::new(RefCell::new(0)),
        }
    }

    pub fn sent_packets(&self) -> Vec<Vec<u8>> {
        self.sent.borrow().clone()
    }

    pub fn last_sent(&self) -> Vec<u8> {
        self.sent.borrow().last().cloned().expect("no packet was sent")
    }
}

impl Transport for MockTransport {
    type Error = ();

    fn start(&mut self, host: &str, port: u16) -> Result<(), ()> {
        *self.started.borrow_mut() = Some((host.to_string(), port));
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), ()> {
        self.sent.borrow_mut().push(data.to_vec());
        Ok(())
    }

    fn close(&mut self) -> Result<(), ()> {
        *self.close_calls.borrow_mut() += 1;
        Ok(())
    }
}

/// An owned snapshot of [`Event`], since the original borrows from the
/// transport chunk or RX scratch buffer for the duration of the callback
/// only.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    Connect { status: ConnectStatus },
    Disconnect { is_accepted: bool },
    Publish { arg: Option<i32>, result: RequestResult },
    PublishRecv { topic: String, payload: Vec<u8>, qos: u8, dup: bool, retain: bool },
    Subscribe { arg: Option<i32>, result: RequestResult },
    Unsubscribe { arg: Option<i32>, result: RequestResult },
    KeepAlive,
}

impl From<Event<'_, i32>> for RecordedEvent {
    fn from(event: Event<'_, i32>) -> Self {
        match event {
            Event::Connect { status } => RecordedEvent::Connect { status },
            Event::Disconnect { is_accepted } => RecordedEvent::Disconnect { is_accepted },
            Event::Publish { arg, result } => RecordedEvent::Publish { arg, result },
            Event::PublishRecv { topic, payload, qos, dup, retain } => RecordedEvent::PublishRecv {
                topic: topic.to_string(),
                payload: payload.to_vec(),
                qos: qos as u8,
                dup,
                retain,
            },
            Event::Subscribe { arg, result } => RecordedEvent::Subscribe { arg, result },
            Event::Unsubscribe { arg, result } => RecordedEvent::Unsubscribe { arg, result },
            Event::KeepAlive => RecordedEvent::KeepAlive,
        }
    }
}

/// Shared event log plus a callback closure that appends owned snapshots
/// to it, for tests that need to inspect events after the fact.
pub fn event_recorder() -> (Rc<RefCell<Vec<RecordedEvent>>>, impl FnMut(Event<'_, i32>)) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_for_cb = log.clone();
    let cb = move |event: Event<'_, i32>| log_for_cb.borrow_mut().push(event.into());
    (log, cb)
}
