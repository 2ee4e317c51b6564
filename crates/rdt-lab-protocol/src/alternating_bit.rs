use rdt_lab_abstract::{AckFrame, DataFrame, Frame, Packet, SystemContext, TransportProtocol};

pub const DEFAULT_TIMEOUT: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendState {
    /// Ready to accept new application data.
    #[default]
    Idle,
    /// One DATA frame is outstanding.
    AwaitingAck,
}

/// Per-entity counters, for inspection by tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityStats {
    pub app_data_accepted: u32,
    pub app_data_refused: u32,
    pub retransmissions: u32,
    pub acks_accepted: u32,
    pub acks_ignored: u32,
    pub acks_sent: u32,
    pub nacks_sent: u32,
    pub delivered: u32,
}

fn flip(bit: u32) -> u32 {
    bit ^ 1
}

/// Stop-and-wait entity with a one-bit alternating sequence number.
///
/// Both endpoints run this same type: the send half (`send_seq`, timer,
/// `last_frame`) and the receive half (`recv_seq`) are independent, so either
/// endpoint can be a sender, a receiver, or both.
#[derive(Debug, Clone)]
pub struct AlternatingBit {
    state: SendState,
    send_seq: u32,
    recv_seq: u32,
    last_frame: Option<DataFrame>,
    timeout: f64,
    stats: EntityStats,
}

impl Default for AlternatingBit {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl AlternatingBit {
    pub fn new(timeout: f64) -> Self {
        Self {
            state: SendState::Idle,
            send_seq: 0,
            recv_seq: 0,
            last_frame: None,
            timeout,
            stats: EntityStats::default(),
        }
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn send_seq(&self) -> u32 {
        self.send_seq
    }

    pub fn recv_seq(&self) -> u32 {
        self.recv_seq
    }

    pub fn last_frame_sent(&self) -> Option<&DataFrame> {
        self.last_frame.as_ref()
    }

    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    pub fn stats(&self) -> &EntityStats {
        &self.stats
    }

    fn handle_ack(&mut self, ctx: &mut dyn SystemContext, frame: Frame, ack: AckFrame) {
        if self.state != SendState::AwaitingAck {
            ctx.log("ACK dropped, nothing outstanding");
            self.stats.acks_ignored += 1;
            return;
        }
        if frame.is_corrupt() {
            ctx.log("ACK dropped, corrupted");
            self.stats.acks_ignored += 1;
            return;
        }
        if ack.acknum != self.send_seq {
            ctx.log(&format!(
                "ACK {} dropped, expecting {}",
                ack.acknum, self.send_seq
            ));
            self.stats.acks_ignored += 1;
            return;
        }

        ctx.log(&format!("ACK {} received", ack.acknum));
        ctx.stop_timer();
        self.send_seq = flip(self.send_seq);
        self.state = SendState::Idle;
        self.stats.acks_accepted += 1;
    }

    fn handle_data(&mut self, ctx: &mut dyn SystemContext, frame: Frame, data: DataFrame) {
        if frame.is_corrupt() {
            ctx.log(&format!("DATA corrupted, send NACK {}", flip(self.recv_seq)));
            self.send_nack(ctx);
            return;
        }
        if data.seqnum != self.recv_seq {
            ctx.log(&format!(
                "DATA seq {} unexpected (expect {}), send NACK {}",
                data.seqnum,
                self.recv_seq,
                flip(self.recv_seq)
            ));
            self.send_nack(ctx);
            return;
        }

        ctx.log(&format!("DATA seq {} received, send ACK", data.seqnum));
        ctx.send_frame(AckFrame::new(self.recv_seq).into());
        self.stats.acks_sent += 1;
        ctx.deliver_data(&data.payload);
        self.stats.delivered += 1;
        self.recv_seq = flip(self.recv_seq);
    }

    fn send_nack(&mut self, ctx: &mut dyn SystemContext) {
        ctx.send_frame(AckFrame::new(flip(self.recv_seq)).into());
        self.stats.nacks_sent += 1;
    }
}

impl TransportProtocol for AlternatingBit {
    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if self.state != SendState::Idle {
            ctx.log("application data dropped, ACK not yet received");
            self.stats.app_data_refused += 1;
            return;
        }

        let frame = DataFrame::new(self.send_seq, packet.data);
        self.last_frame = Some(frame);
        self.state = SendState::AwaitingAck;
        ctx.send_frame(frame.into());
        ctx.start_timer(self.timeout);
        self.stats.app_data_accepted += 1;
        ctx.log(&format!("DATA seq {} sent", frame.seqnum));
    }

    fn on_frame(&mut self, ctx: &mut dyn SystemContext, frame: Frame) {
        match frame {
            Frame::Ack(ack) => self.handle_ack(ctx, frame, ack),
            Frame::Data(data) => self.handle_data(ctx, frame, data),
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        if self.state != SendState::AwaitingAck {
            ctx.log("timer ignored, not waiting for ACK");
            return;
        }
        let Some(frame) = self.last_frame else {
            return;
        };

        ctx.log(&format!("timeout, resend DATA seq {}", frame.seqnum));
        ctx.send_frame(frame.into());
        ctx.start_timer(self.timeout);
        self.stats.retransmissions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdt_lab_abstract::{Corruption, Payload};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Send(Frame),
        StartTimer(f64),
        StopTimer,
        Deliver(Payload),
    }

    #[derive(Default)]
    struct RecordingContext {
        calls: Vec<Call>,
    }

    impl RecordingContext {
        fn sent(&self) -> Vec<Frame> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Send(f) => Some(*f),
                    _ => None,
                })
                .collect()
        }
    }

    impl SystemContext for RecordingContext {
        fn send_frame(&mut self, frame: Frame) {
            self.calls.push(Call::Send(frame));
        }

        fn start_timer(&mut self, duration: f64) {
            self.calls.push(Call::StartTimer(duration));
        }

        fn stop_timer(&mut self) {
            self.calls.push(Call::StopTimer);
        }

        fn deliver_data(&mut self, payload: &Payload) {
            self.calls.push(Call::Deliver(*payload));
        }

        fn log(&mut self, _message: &str) {}

        fn now(&self) -> f64 {
            0.0
        }
    }

    fn ack(n: u32) -> Frame {
        AckFrame::new(n).into()
    }

    fn data(seq: u32, fill: u8) -> Frame {
        DataFrame::new(seq, Packet::filled(fill).data).into()
    }

    #[test]
    fn app_data_sends_frame_and_starts_timer() {
        let mut entity = AlternatingBit::new(30.0);
        let mut ctx = RecordingContext::default();
        entity.on_app_data(&mut ctx, Packet::filled(b'a'));

        assert_eq!(
            ctx.calls,
            vec![Call::Send(data(0, b'a')), Call::StartTimer(30.0)]
        );
        assert_eq!(entity.state(), SendState::AwaitingAck);
        assert_eq!(entity.last_frame_sent().map(|f| f.seqnum), Some(0));
    }

    #[test]
    fn app_data_while_awaiting_ack_is_refused() {
        let mut entity = AlternatingBit::default();
        let mut ctx = RecordingContext::default();
        entity.on_app_data(&mut ctx, Packet::filled(b'a'));
        let before = ctx.calls.len();

        entity.on_app_data(&mut ctx, Packet::filled(b'b'));

        assert_eq!(ctx.calls.len(), before);
        assert_eq!(entity.last_frame_sent().map(|f| f.payload[0]), Some(b'a'));
        assert_eq!(entity.stats().app_data_refused, 1);
    }

    #[test]
    fn matching_ack_returns_to_idle_and_flips_seq() {
        let mut entity = AlternatingBit::default();
        let mut ctx = RecordingContext::default();
        entity.on_app_data(&mut ctx, Packet::filled(b'a'));
        ctx.calls.clear();

        entity.on_frame(&mut ctx, ack(0));

        assert_eq!(ctx.calls, vec![Call::StopTimer]);
        assert_eq!(entity.state(), SendState::Idle);
        assert_eq!(entity.send_seq(), 1);
        assert_eq!(entity.stats().acks_accepted, 1);
    }

    #[test]
    fn stale_corrupt_or_unsolicited_acks_are_ignored() {
        let mut entity = AlternatingBit::default();
        let mut ctx = RecordingContext::default();

        entity.on_frame(&mut ctx, ack(0));
        assert!(ctx.calls.is_empty());

        entity.on_app_data(&mut ctx, Packet::filled(b'a'));
        ctx.calls.clear();

        entity.on_frame(&mut ctx, ack(1));
        let mut mangled = ack(0);
        mangled.corrupt(Corruption::AckNum);
        entity.on_frame(&mut ctx, mangled);

        assert!(ctx.calls.is_empty(), "no NACK or timer activity for bad ACKs");
        assert_eq!(entity.state(), SendState::AwaitingAck);
        assert_eq!(entity.send_seq(), 0);
        assert_eq!(entity.stats().acks_ignored, 3);
    }

    #[test]
    fn expected_data_is_acked_and_delivered_once() {
        let mut entity = AlternatingBit::default();
        let mut ctx = RecordingContext::default();

        entity.on_frame(&mut ctx, data(0, b'a'));
        assert_eq!(
            ctx.calls,
            vec![
                Call::Send(ack(0)),
                Call::Deliver(Packet::filled(b'a').data)
            ]
        );
        assert_eq!(entity.recv_seq(), 1);

        ctx.calls.clear();
        entity.on_frame(&mut ctx, data(0, b'a'));
        assert_eq!(ctx.calls, vec![Call::Send(ack(0))], "duplicate is re-ACKed only");
        assert_eq!(entity.recv_seq(), 1);
        assert_eq!(entity.stats().delivered, 1);
    }

    #[test]
    fn corrupted_data_is_nacked() {
        let mut entity = AlternatingBit::default();
        let mut ctx = RecordingContext::default();
        let mut frame = data(0, b'a');
        frame.corrupt(Corruption::Payload);

        entity.on_frame(&mut ctx, frame);

        assert_eq!(ctx.sent(), vec![ack(1)]);
        assert_eq!(entity.recv_seq(), 0);
        assert_eq!(entity.stats().nacks_sent, 1);
    }

    #[test]
    fn timer_retransmits_identical_frame() {
        let mut entity = AlternatingBit::new(25.0);
        let mut ctx = RecordingContext::default();
        entity.on_app_data(&mut ctx, Packet::filled(b'k'));
        let original = ctx.sent()[0];
        ctx.calls.clear();

        entity.on_timer(&mut ctx);

        assert_eq!(ctx.calls, vec![Call::Send(original), Call::StartTimer(25.0)]);
        assert_eq!(entity.stats().retransmissions, 1);
    }

    #[test]
    fn timer_while_idle_does_nothing() {
        let mut entity = AlternatingBit::default();
        let mut ctx = RecordingContext::default();
        entity.on_timer(&mut ctx);
        assert!(ctx.calls.is_empty());
        assert_eq!(entity.stats().retransmissions, 0);
    }
}
