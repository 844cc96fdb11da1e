//! The session engine itself: connection state machine, transport event
//! adapter, and incoming-packet dispatch.

mod pubsub;

use crate::buffer::RingBuffer;
use crate::codec::{
    check_enough_memory, decode_u16, write_fixed_header, write_raw, write_string, write_u16,
    write_u8, PacketType,
};
use crate::config::{ClientConfig, ClientInfo};
use crate::error::Error;
use crate::event::{ConnectStatus, Event, RequestResult};
use crate::log::warn;
use crate::parser::Parser;
use crate::qos::QoS;
use crate::request::RequestTable;
use crate::transport::Transport;

/// Connection state.
///
/// The two pre-CONNACK phases (TCP connecting, and CONNECT sent awaiting
/// CONNACK) share a single `Connecting` variant; `Client::connect_sent`
/// disambiguates them internally where it matters (only inside
/// `on_connect_active`, which is the transition between the two).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnState {
    /// No connection; the client may be reused for a new `connect()`.
    Disconnected,
    /// TCP connect in progress, or CONNECT sent and awaiting CONNACK.
    Connecting,
    /// CONNACK accepted; normal operation.
    Connected,
    /// Graceful close requested; awaiting transport confirmation.
    Disconnecting,
}

/// An MQTT 3.1.1 session engine.
///
/// `T` is the host-provided transport. `F` is the user's event callback,
/// invoked synchronously from within the engine; it must not block and
/// must not retain borrowed payload slices past the call (see
/// [`Event::PublishRecv`]). `Arg` is an opaque, `Copy` user value threaded
/// through publish/subscribe/unsubscribe completions. `TXN`/`RXN` size
/// the TX staging ring and RX reassembly scratch buffer; `MAXREQ` bounds
/// the number of simultaneously in-flight requests.
pub struct Client<'info, T, F, Arg, const TXN: usize, const RXN: usize, const MAXREQ: usize>
where
    T: Transport,
    F: for<'a> FnMut(Event<'a, Arg>),
    Arg: Copy,
{
    transport: T,
    cb: F,
    tx_buf: RingBuffer<TXN>,
    parser: Parser<RXN>,
    requests: RequestTable<Arg, MAXREQ>,
    state: ConnState,
    connect_sent: bool,
    is_sending: bool,
    written_total: usize,
    sent_total: usize,
    last_packet_id: u16,
    poll_time: u32,
    info: Option<ClientInfo<'info>>,
    config: ClientConfig,
    ctx_arg: Option<Arg>,
}

impl<'info, T, F, Arg, const TXN: usize, const RXN: usize, const MAXREQ: usize>
    Client<'info, T, F, Arg, TXN, RXN, MAXREQ>
where
    T: Transport,
    F: for<'a> FnMut(Event<'a, Arg>),
    Arg: Copy,
{
    /// Create a new, disconnected client around a transport and an event
    /// callback.
    pub fn new(transport: T, cb: F, config: ClientConfig) -> Self {
        Self {
            transport,
            cb,
            tx_buf: RingBuffer::new(),
            parser: Parser::new(),
            requests: RequestTable::new(),
            state: ConnState::Disconnected,
            connect_sent: false,
            is_sending: false,
            written_total: 0,
            sent_total: 0,
            last_packet_id: 0,
            poll_time: 0,
            info: None,
            config,
            ctx_arg: None,
        }
    }

    /// Consume the client, asserting it is disconnected first.
    ///
    /// Rust's ownership rules already guarantee the underlying memory is
    /// released; this exists to uphold the same "must be DISCONNECTED to
    /// tear down" contract this engine's design is built on.
    pub fn shutdown(self) {
        debug_assert!(
            self.state == ConnState::Disconnected,
            "client must be disconnected before shutdown"
        );
    }

    /// Whether the session is fully connected (post-CONNACK).
    pub fn is_connected(&self) -> bool {
        self.state == ConnState::Connected
    }

    /// Current connection state.
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Set the opaque, client-wide user value returned by [`Self::get_arg`].
    pub fn set_arg(&mut self, arg: Option<Arg>) {
        self.ctx_arg = arg;
    }

    /// Get the opaque, client-wide user value set by [`Self::set_arg`].
    pub fn get_arg(&self) -> Option<Arg> {
        self.ctx_arg
    }

    /// Begin connecting to `host:port` using `info` for this session.
    /// Requires the client be `Disconnected`; `info` is borrowed, not
    /// copied, for the lifetime of the connection.
    pub fn connect(
        &mut self,
        host: &str,
        port: u16,
        info: ClientInfo<'info>,
    ) -> Result<(), Error<T::Error>> {
        if self.state != ConnState::Disconnected {
            return Err(Error::Closed);
        }
        self.info = Some(info);
        self.connect_sent = false;
        self.state = ConnState::Connecting;
        self.transport.start(host, port).map_err(Error::Transport)
    }

    /// Begin a graceful disconnect. Requires the client be `Connected` or
    /// `Connecting`.
    pub fn disconnect(&mut self) -> Result<(), Error<T::Error>> {
        if !matches!(self.state, ConnState::Connected | ConnState::Connecting) {
            return Err(Error::Closed);
        }
        self.state = ConnState::Disconnecting;
        self.transport.close().map_err(Error::Transport)
    }

    /// The transport has finished establishing the connection. Sends the
    /// CONNECT packet and transitions to the MQTT-handshake phase of
    /// `Connecting`.
    pub fn on_connect_active(&mut self) {
        if self.state != ConnState::Connecting || self.connect_sent {
            warn!("on_connect_active called outside the TCP-connecting phase");
            return;
        }
        self.connect_sent = true;
        self.send_connect_packet();
    }

    /// The transport failed to establish a connection at all.
    pub fn on_connect_error(&mut self) {
        self.state = ConnState::Disconnected;
        self.connect_sent = false;
        (self.cb)(Event::Connect {
            status: ConnectStatus::TcpFailed,
        });
    }

    /// A chunk of bytes arrived from the transport. Feeds the streaming
    /// parser, which dispatches zero or more complete packets out of it.
    pub fn on_data_received(&mut self, chunk: &[u8]) {
        let mut parser = core::mem::take(&mut self.parser);
        parser.process_chunk(chunk, |hdr, payload| self.handle_incoming(hdr, payload));
        self.parser = parser;
    }

    /// A previously started transport send has completed.
    pub fn on_send_complete(&mut self, sent_len: usize, successful: bool) {
        self.is_sending = false;
        if !successful {
            warn!("transport send failed, closing");
            let _ = self.transport.close();
            return;
        }
        self.sent_total += sent_len;
        self.tx_buf.skip(sent_len);
        if self.tx_buf.is_empty() {
            self.tx_buf.reset();
        }
        self.poll_time = 0;
        self.resolve_qos0_requests();
        self.flush();
    }

    /// One periodic tick has elapsed, each worth
    /// [`ClientConfig::poll_interval_ms`] of wall-clock time. Drives the
    /// keep-alive scheduler.
    pub fn on_poll(&mut self) {
        if self.state != ConnState::Connected {
            return;
        }
        self.poll_time = self.poll_time.saturating_add(1);
        let keep_alive = self.info.map(|i| i.keep_alive_seconds).unwrap_or(0);
        if keep_alive == 0 {
            return;
        }
        let elapsed_ms = self.poll_time as u64 * self.config.poll_interval_ms as u64;
        if elapsed_ms >= keep_alive as u64 * 1000 {
            self.send_pingreq();
            self.poll_time = 0;
        }
    }

    /// The transport has closed, whether in response to `disconnect()`,
    /// a send failure, or the peer hanging up. Drains every in-flight
    /// request with an error and resets to `Disconnected`.
    pub fn on_closed(&mut self) {
        let is_accepted = matches!(self.state, ConnState::Connected | ConnState::Disconnecting);
        self.state = ConnState::Disconnected;
        self.connect_sent = false;
        self.is_sending = false;
        self.tx_buf.clear();
        self.written_total = 0;
        self.sent_total = 0;
        self.poll_time = 0;
        self.info = None;
        self.drain_requests_with_error();
        (self.cb)(Event::Disconnect { is_accepted });
    }

    fn drain_requests_with_error(&mut self) {
        for i in 0..MAXREQ {
            let req = *self.requests.get(i);
            if !req.in_use() {
                continue;
            }
            if req.is_subscribe() {
                (self.cb)(Event::Subscribe {
                    arg: req.arg(),
                    result: RequestResult::Err,
                });
            } else if req.is_unsubscribe() {
                (self.cb)(Event::Unsubscribe {
                    arg: req.arg(),
                    result: RequestResult::Err,
                });
            } else {
                (self.cb)(Event::Publish {
                    arg: req.arg(),
                    result: RequestResult::Err,
                });
            }
        }
        self.requests.clear_all();
    }

    fn resolve_qos0_requests(&mut self) {
        for i in 0..MAXREQ {
            let req = *self.requests.get(i);
            if req.in_use()
                && req.is_pending()
                && req.packet_id() == 0
                && self.sent_total >= req.expected_sent_len()
            {
                self.requests.delete(i);
                (self.cb)(Event::Publish {
                    arg: req.arg(),
                    result: RequestResult::Ok,
                });
            }
        }
    }

    /// Try to send whatever is staged in the TX ring. Idempotent and
    /// invoked after every stage; a no-op while a send is already
    /// outstanding.
    fn flush(&mut self) {
        if self.is_sending || self.tx_buf.is_empty() {
            return;
        }
        let chunk = self.tx_buf.get_linear_read();
        match self.transport.send(chunk) {
            Ok(()) => {
                self.is_sending = true;
                self.written_total += chunk.len();
            }
            Err(_) => {
                warn!("transport send failed to start, retrying on next flush");
            }
        }
    }

    fn send_connect_packet(&mut self) {
        let Some(info) = self.info else {
            return;
        };
        let will_len = info
            .will
            .map(|w| 2 + w.topic.len() + 2 + w.message.len())
            .unwrap_or(0);
        let username_len = info.username.map(|u| 2 + u.len()).unwrap_or(0);
        let password_len = info.password.map(|p| 2 + p.len()).unwrap_or(0);
        let rem_len = 10 + 2 + info.client_id.len() + will_len + username_len + password_len;

        if check_enough_memory(&self.tx_buf, rem_len).is_none() {
            warn!("tx buffer full, cannot send CONNECT");
            return;
        }

        write_fixed_header(&mut self.tx_buf, PacketType::Connect, false, QoS::AtMostOnce, false, rem_len);
        write_string(&mut self.tx_buf, "MQTT");
        write_u8(&mut self.tx_buf, 4);
        write_u8(&mut self.tx_buf, info.connect_flags());
        write_u16(&mut self.tx_buf, info.keep_alive_seconds);
        write_string(&mut self.tx_buf, info.client_id);
        if let Some(will) = info.will {
            write_string(&mut self.tx_buf, will.topic);
            write_u16(&mut self.tx_buf, will.message.len() as u16);
            write_raw(&mut self.tx_buf, will.message);
        }
        if let Some(username) = info.username {
            write_string(&mut self.tx_buf, username);
        }
        if let Some(password) = info.password {
            write_u16(&mut self.tx_buf, password.len() as u16);
            write_raw(&mut self.tx_buf, password);
        }
        self.flush();
    }

    fn send_pingreq(&mut self) {
        if check_enough_memory(&self.tx_buf, 0).is_none() {
            warn!("tx buffer full, dropping PINGREQ");
            return;
        }
        write_fixed_header(&mut self.tx_buf, PacketType::Pingreq, false, QoS::AtMostOnce, false, 0);
        self.flush();
    }

    /// Write a 2-byte-payload acknowledgement packet (PUBACK, PUBREC,
    /// PUBREL, PUBCOMP all share this shape).
    fn send_ack(&mut self, packet_type: PacketType, packet_id: u16) {
        let rem_len = 2;
        if check_enough_memory(&self.tx_buf, rem_len).is_none() {
            warn!("tx buffer full, dropping ack");
            return;
        }
        write_fixed_header(&mut self.tx_buf, packet_type, false, QoS::AtMostOnce, false, rem_len);
        write_u16(&mut self.tx_buf, packet_id);
        self.flush();
    }

    fn handle_incoming(&mut self, hdr: u8, payload: &[u8]) {
        let Some(packet_type) = PacketType::from_header_byte(hdr) else {
            warn!("protocol violation: unknown packet type");
            return;
        };
        match packet_type {
            PacketType::Connack => self.handle_connack(payload),
            PacketType::Puback | PacketType::Pubcomp => self.handle_publish_ack(payload),
            PacketType::Pubrec => self.handle_pubrec(payload),
            PacketType::Pubrel => self.handle_pubrel(payload),
            PacketType::Publish => self.handle_publish(hdr, payload),
            PacketType::Suback => self.handle_suback(payload),
            PacketType::Unsuback => self.handle_unsuback(payload),
            PacketType::Pingresp => (self.cb)(Event::KeepAlive),
            _ => warn!("protocol violation: unexpected packet type from broker"),
        }
    }

    fn handle_connack(&mut self, payload: &[u8]) {
        if self.state == ConnState::Connected {
            warn!("protocol violation: CONNACK while already connected");
            return;
        }
        if self.state != ConnState::Connecting {
            warn!("protocol violation: unexpected CONNACK");
            return;
        }
        let return_code = payload.get(1).copied().unwrap_or(0);
        let status = ConnectStatus::from_connack_code(return_code);
        if status == ConnectStatus::Accepted {
            self.state = ConnState::Connected;
        }
        (self.cb)(Event::Connect { status });
    }

    fn handle_publish_ack(&mut self, payload: &[u8]) {
        let Some(packet_id) = decode_u16(payload) else {
            warn!("protocol violation: malformed publish ack");
            return;
        };
        match self.requests.get_pending(packet_id as i32) {
            Some(idx) => {
                let arg = self.requests.get(idx).arg();
                self.requests.delete(idx);
                (self.cb)(Event::Publish {
                    arg,
                    result: RequestResult::Ok,
                });
            }
            None => warn!("protocol violation: ack with no matching pending request"),
        }
    }

    fn handle_pubrec(&mut self, payload: &[u8]) {
        let Some(packet_id) = decode_u16(payload) else {
            warn!("protocol violation: malformed PUBREC");
            return;
        };
        if self.requests.get_pending(packet_id as i32).is_some() {
            self.send_ack(PacketType::Pubrel, packet_id);
        } else {
            warn!("protocol violation: PUBREC with no matching pending request");
        }
    }

    fn handle_pubrel(&mut self, payload: &[u8]) {
        if let Some(packet_id) = decode_u16(payload) {
            self.send_ack(PacketType::Pubcomp, packet_id);
        } else {
            warn!("protocol violation: malformed PUBREL");
        }
    }

    fn handle_publish(&mut self, hdr: u8, payload: &[u8]) {
        let dup = (hdr >> 3) & 1 != 0;
        let qos = QoS::clamp_from((hdr >> 1) & 0x03);
        let retain = hdr & 1 != 0;

        let Some(topic_len) = decode_u16(payload) else {
            warn!("protocol violation: malformed PUBLISH");
            return;
        };
        let topic_len = topic_len as usize;
        if payload.len() < 2 + topic_len {
            warn!("protocol violation: malformed PUBLISH");
            return;
        }
        let Ok(topic) = core::str::from_utf8(&payload[2..2 + topic_len]) else {
            warn!("protocol violation: non-UTF-8 PUBLISH topic");
            return;
        };

        let mut idx = 2 + topic_len;
        let packet_id = if qos != QoS::AtMostOnce {
            let Some(id) = decode_u16(&payload[idx..]) else {
                warn!("protocol violation: malformed PUBLISH packet id");
                return;
            };
            idx += 2;
            id
        } else {
            0
        };
        let body = &payload[idx..];

        (self.cb)(Event::PublishRecv {
            topic,
            payload: body,
            qos,
            dup,
            retain,
        });

        match qos {
            QoS::AtLeastOnce => self.send_ack(PacketType::Puback, packet_id),
            QoS::ExactlyOnce => self.send_ack(PacketType::Pubrec, packet_id),
            QoS::AtMostOnce => {}
        }
    }

    fn handle_suback(&mut self, payload: &[u8]) {
        let Some(packet_id) = decode_u16(payload) else {
            warn!("protocol violation: malformed SUBACK");
            return;
        };
        let return_code = payload.get(2).copied().unwrap_or(0x80);
        match self.requests.get_pending(packet_id as i32) {
            Some(idx) if self.requests.get(idx).is_subscribe() => {
                let arg = self.requests.get(idx).arg();
                self.requests.delete(idx);
                let result = if return_code < 3 {
                    RequestResult::Ok
                } else {
                    RequestResult::Err
                };
                (self.cb)(Event::Subscribe { arg, result });
            }
            _ => warn!("protocol violation: SUBACK with no matching pending subscribe"),
        }
    }

    fn handle_unsuback(&mut self, payload: &[u8]) {
        let Some(packet_id) = decode_u16(payload) else {
            warn!("protocol violation: malformed UNSUBACK");
            return;
        };
        let return_code = payload.get(2).copied().unwrap_or(0x80);
        match self.requests.get_pending(packet_id as i32) {
            Some(idx) if self.requests.get(idx).is_unsubscribe() => {
                let arg = self.requests.get(idx).arg();
                self.requests.delete(idx);
                let result = if return_code < 3 {
                    RequestResult::Ok
                } else {
                    RequestResult::Err
                };
                (self.cb)(Event::Unsubscribe { arg, result });
            }
            _ => warn!("protocol violation: UNSUBACK with no matching pending unsubscribe"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingTransport {
        send_calls: u32,
    }
    impl Transport for CountingTransport {
        type Error = ();
        fn start(&mut self, _host: &str, _port: u16) -> Result<(), ()> {
            Ok(())
        }
        fn send(&mut self, _data: &[u8]) -> Result<(), ()> {
            self.send_calls += 1;
            Ok(())
        }
        fn close(&mut self) -> Result<(), ()> {
            Ok(())
        }
    }

    fn info(keep_alive: u16) -> ClientInfo<'static> {
        ClientInfo {
            client_id: "c",
            username: None,
            password: None,
            will: None,
            keep_alive_seconds: keep_alive,
        }
    }

    #[test]
    fn only_one_send_outstanding_at_a_time() {
        let mut client: Client<'_, _, _, (), 256, 256, 4> =
            Client::new(CountingTransport { send_calls: 0 }, |_: Event<'_, ()>| {}, ClientConfig::default());
        client.connect("h", 1, info(0)).unwrap();
        client.on_connect_active();
        assert_eq!(client.transport.send_calls, 1);
        // A second flush attempt while the first send is still outstanding is a no-op.
        client.flush();
        client.flush();
        assert_eq!(client.transport.send_calls, 1);
    }

    #[test]
    fn on_closed_drains_every_in_use_request_to_zero_status() {
        let mut client: Client<'_, _, _, i32, 256, 256, 4> =
            Client::new(CountingTransport { send_calls: 0 }, |_: Event<'_, i32>| {}, ClientConfig::default());
        client.connect("h", 1, info(0)).unwrap();
        client.on_connect_active();
        client.on_send_complete(15, true);
        client.on_data_received(&[0x20, 0x02, 0x00, 0x00]);

        client.subscribe("t1", QoS::AtMostOnce, Some(1)).unwrap();
        client.on_send_complete(client.tx_buf.len(), true);
        client.subscribe("t2", QoS::AtMostOnce, Some(2)).unwrap();

        client.on_closed();
        for i in 0..4 {
            assert!(!client.requests.get(i).in_use());
        }
    }
}
