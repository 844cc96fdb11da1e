//! Outbound publish/subscribe/unsubscribe pipeline: packet assembly,
//! packet id allocation, and request registration.

use super::Client;
use crate::codec::{check_enough_memory, write_fixed_header, write_raw, write_string, write_u16, write_u8, PacketType};
use crate::error::Error;
use crate::event::Event;
use crate::qos::QoS;
use crate::transport::Transport;

impl<'info, T, F, Arg, const TXN: usize, const RXN: usize, const MAXREQ: usize>
    Client<'info, T, F, Arg, TXN, RXN, MAXREQ>
where
    T: Transport,
    F: for<'a> FnMut(Event<'a, Arg>),
    Arg: Copy,
{
    /// Allocate the next packet id, wrapping `0xFFFF` back to `1` and
    /// never returning `0` (reserved for QoS-0 byte-count tracking).
    fn next_packet_id(&mut self) -> u16 {
        self.last_packet_id = if self.last_packet_id == 0xFFFF {
            1
        } else {
            self.last_packet_id + 1
        };
        self.last_packet_id
    }

    /// Subscribe to `topic` at the requested QoS. Requires `Connected`.
    pub fn subscribe(&mut self, topic: &str, qos: QoS, arg: Option<Arg>) -> Result<(), Error<T::Error>> {
        if !self.is_connected() {
            return Err(Error::Closed);
        }
        if topic.is_empty() {
            return Err(Error::InvalidTopic);
        }
        let rem_len = 2 + 2 + topic.len() + 1;
        check_enough_memory(&self.tx_buf, rem_len).ok_or(Error::ErrMem)?;

        let packet_id = self.next_packet_id();
        let idx = self.requests.create(packet_id, arg).ok_or(Error::ErrMem)?;
        self.requests.mark_subscribe(idx);
        self.requests.set_pending(idx, 0, 0);

        write_fixed_header(&mut self.tx_buf, PacketType::Subscribe, false, QoS::AtMostOnce, false, rem_len);
        write_u16(&mut self.tx_buf, packet_id);
        write_string(&mut self.tx_buf, topic);
        write_u8(&mut self.tx_buf, qos as u8);
        self.flush();
        Ok(())
    }

    /// Unsubscribe from `topic`. Requires `Connected`.
    pub fn unsubscribe(&mut self, topic: &str, arg: Option<Arg>) -> Result<(), Error<T::Error>> {
        if !self.is_connected() {
            return Err(Error::Closed);
        }
        if topic.is_empty() {
            return Err(Error::InvalidTopic);
        }
        let rem_len = 2 + 2 + topic.len();
        check_enough_memory(&self.tx_buf, rem_len).ok_or(Error::ErrMem)?;

        let packet_id = self.next_packet_id();
        let idx = self.requests.create(packet_id, arg).ok_or(Error::ErrMem)?;
        self.requests.mark_unsubscribe(idx);
        self.requests.set_pending(idx, 0, 0);

        write_fixed_header(&mut self.tx_buf, PacketType::Unsubscribe, false, QoS::AtMostOnce, false, rem_len);
        write_u16(&mut self.tx_buf, packet_id);
        write_string(&mut self.tx_buf, topic);
        self.flush();
        Ok(())
    }

    /// Publish `payload` to `topic`. Requires `Connected`.
    ///
    /// QoS 0 publishes allocate no packet id; their `arg` resolves once
    /// the bytes have actually left via the transport (see
    /// [`Client::on_send_complete`]), not on any wire acknowledgement.
    pub fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
        arg: Option<Arg>,
    ) -> Result<(), Error<T::Error>> {
        if !self.is_connected() {
            return Err(Error::Closed);
        }
        if topic.is_empty() {
            return Err(Error::InvalidTopic);
        }
        let has_id = qos != QoS::AtMostOnce;
        let rem_len = 2 + topic.len() + payload.len() + if has_id { 2 } else { 0 };
        let total = check_enough_memory(&self.tx_buf, rem_len).ok_or(Error::ErrMem)?;

        let packet_id = if has_id { self.next_packet_id() } else { 0 };
        let idx = self.requests.create(packet_id, arg).ok_or(Error::ErrMem)?;

        write_fixed_header(&mut self.tx_buf, PacketType::Publish, false, qos, retain, rem_len);
        write_string(&mut self.tx_buf, topic);
        if has_id {
            write_u16(&mut self.tx_buf, packet_id);
        }
        write_raw(&mut self.tx_buf, payload);

        if has_id {
            self.requests.set_pending(idx, 0, 0);
        } else {
            let expected_sent_len = self.written_total + total;
            self.requests.set_pending(idx, 0, expected_sent_len);
        }
        self.flush();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Client;
    use crate::config::{ClientConfig, ClientInfo};
    use crate::event::Event;
    use crate::transport::Transport;

    struct StubTransport;
    impl Transport for StubTransport {
        type Error = ();
        fn start(&mut self, _host: &str, _port: u16) -> Result<(), ()> {
            Ok(())
        }
        fn send(&mut self, _data: &[u8]) -> Result<(), ()> {
            Ok(())
        }
        fn close(&mut self) -> Result<(), ()> {
            Ok(())
        }
    }

    fn connected_client() -> Client<'static, StubTransport, impl FnMut(Event<'_, ()>), (), 512, 512, 4> {
        let info = ClientInfo {
            client_id: "c",
            username: None,
            password: None,
            will: None,
            keep_alive_seconds: 0,
        };
        let mut client = Client::new(StubTransport, |_: Event<'_, ()>| {}, ClientConfig::default());
        client.connect("h", 1, info).unwrap();
        client.on_connect_active();
        // CONNECT for 1-byte client id "c": 1 (header) + 1 (varint) + 13 (rem_len) = 15 bytes.
        client.on_send_complete(15, true);
        client.on_data_received(&[0x20, 0x02, 0x00, 0x00]);
        client
    }

    #[test]
    fn packet_id_never_zero_and_wraps_past_0xffff() {
        let mut client = connected_client();
        client.last_packet_id = 0xFFFE;
        assert_eq!(client.next_packet_id(), 0xFFFF);
        assert_eq!(client.next_packet_id(), 1);
        assert_ne!(client.next_packet_id(), 0);
    }
}
