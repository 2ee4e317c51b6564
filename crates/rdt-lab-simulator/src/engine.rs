use rdt_lab_abstract::{EntityId, Frame, Packet, Payload, SimConfig, SystemContext, TransportProtocol};
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelStats, Transmission};
use crate::error::{ScheduleError, SimError};
use crate::generator::AppDataGenerator;
use crate::random::{SANITY_DRAWS, SeededUniform, UniformSource, check_uniformity};
use crate::scheduler::{Event, EventKind, Scheduler};
use crate::trace::{Delivery, LinkEvent, LinkEventKind, SimulationReport};

/// Something an entity asked for during a callback, applied in request order
/// once the callback returns.
#[derive(Debug)]
enum Action {
    Send(Frame),
    StartTimer(f64),
    StopTimer,
    Deliver(Payload),
    Log(String),
}

#[derive(Default)]
struct ActionBuffer {
    actions: Vec<Action>,
}

/// Context implementation passed to an entity
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: f64,
}

impl<'a> SystemContext for ScopedContext<'a> {
    fn send_frame(&mut self, frame: Frame) {
        self.buffer.actions.push(Action::Send(frame));
    }

    fn start_timer(&mut self, duration: f64) {
        self.buffer.actions.push(Action::StartTimer(duration));
    }

    fn stop_timer(&mut self) {
        self.buffer.actions.push(Action::StopTimer);
    }

    fn deliver_data(&mut self, payload: &Payload) {
        self.buffer.actions.push(Action::Deliver(*payload));
    }

    fn log(&mut self, message: &str) {
        self.buffer.actions.push(Action::Log(message.to_string()));
    }

    fn now(&self) -> f64 {
        self.now
    }
}

pub struct Simulator<P> {
    config: SimConfig,
    scheduler: Scheduler,
    channel: Channel,
    generator: AppDataGenerator,
    rng: Box<dyn UniformSource>,

    entity_a: P,
    entity_b: P,

    packets_generated: u32,
    initialized: bool,

    pub deliveries: Vec<Delivery>,
    /// Trace records kept at or below the configured trace level.
    pub link_events: Vec<LinkEvent>,
}

impl<P: TransportProtocol> Simulator<P> {
    /// Build a simulator driven by a [`SeededUniform`] seeded from `config.seed`.
    pub fn new(config: SimConfig, entity_a: P, entity_b: P) -> Result<Self, SimError> {
        let rng = SeededUniform::unchecked(config.seed);
        Self::with_source(config, entity_a, entity_b, Box::new(rng))
    }

    /// Build a simulator drawing every random decision from `rng`.
    ///
    /// The source must pass the uniformity check over [`SANITY_DRAWS`] draws
    /// first; those draws are consumed.
    pub fn with_source(
        config: SimConfig,
        entity_a: P,
        entity_b: P,
        mut rng: Box<dyn UniformSource>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        check_uniformity(rng.as_mut(), SANITY_DRAWS)?;
        Self::with_source_unchecked(config, entity_a, entity_b, rng)
    }

    /// Like [`Simulator::with_source`] but hands `rng` over untouched, so a
    /// scripted source replays its draws from the first one.
    pub fn with_source_unchecked(
        config: SimConfig,
        entity_a: P,
        entity_b: P,
        rng: Box<dyn UniformSource>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            scheduler: Scheduler::new(),
            channel: Channel::from_config(&config),
            generator: AppDataGenerator::from_config(&config),
            rng,
            entity_a,
            entity_b,
            packets_generated: 0,
            initialized: false,
            deliveries: Vec::new(),
            link_events: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn entity(&self, id: EntityId) -> &P {
        match id {
            EntityId::A => &self.entity_a,
            EntityId::B => &self.entity_b,
        }
    }

    /// Read-only view of the pending events.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn channel_stats(&self) -> &ChannelStats {
        self.channel.stats()
    }

    pub fn current_time(&self) -> f64 {
        self.scheduler.now()
    }

    pub fn packets_generated(&self) -> u32 {
        self.packets_generated
    }

    pub fn remaining_events(&self) -> usize {
        self.scheduler.len()
    }

    /// Hand `packet` to `entity` at `time`, independently of the random generator.
    ///
    /// `time` must be finite and not before the current clock.
    pub fn schedule_app_data(
        &mut self,
        time: f64,
        entity: EntityId,
        packet: Packet,
    ) -> Result<(), ScheduleError> {
        self.scheduler
            .try_insert(Event::new(time, entity, EventKind::AppArrival(Some(packet))))
    }

    /// Register a deterministic loss on the channel. See [`Channel::add_drop_rule`].
    pub fn add_drop_rule(&mut self, from: EntityId, seq: Option<u32>, ack: Option<u32>) {
        self.channel.add_drop_rule(from, seq, ack);
    }

    /// Initialize both entities and seed the first generated arrival.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        for id in [EntityId::A, EntityId::B] {
            self.dispatch(id, |entity, ctx| entity.init(ctx));
        }
        if !self.generator.is_exhausted() {
            self.generator
                .schedule_next(&mut self.scheduler, self.rng.as_mut());
        }
    }

    /// Process the next event. Returns true if an event was processed, false if queue is empty.
    pub fn step(&mut self) -> bool {
        let Some(event) = self.scheduler.pop_earliest() else {
            return false;
        };

        let time = self.scheduler.now();
        debug!(
            "t={:.3} dispatch {} to {}",
            time,
            event.kind.name(),
            event.entity
        );
        self.record(LinkEventKind::Dispatched {
            entity: event.entity,
            kind: event.kind.name(),
        });

        match event.kind {
            EventKind::AppArrival(scripted) => {
                let packet = match scripted {
                    Some(packet) => Some(packet),
                    None => self
                        .generator
                        .on_arrival(&mut self.scheduler, self.rng.as_mut()),
                };
                if let Some(packet) = packet {
                    self.packets_generated += 1;
                    self.record(LinkEventKind::AppDataGiven {
                        entity: event.entity,
                        packet,
                    });
                    self.dispatch(event.entity, |entity, ctx| entity.on_app_data(ctx, packet));
                }
            }
            EventKind::FrameArrival(frame) => {
                self.dispatch(event.entity, |entity, ctx| entity.on_frame(ctx, frame));
            }
            EventKind::Timer => {
                self.dispatch(event.entity, |entity, ctx| entity.on_timer(ctx));
            }
        }
        true
    }

    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
        info!(
            "simulation finished at t={:.3} after {} packets from the application",
            self.current_time(),
            self.packets_generated
        );
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            simulated_time: self.scheduler.now(),
            packets_generated: self.packets_generated,
            channel: self.channel.stats().clone(),
            deliveries: self.deliveries.clone(),
            link_events: self.link_events.clone(),
        }
    }

    fn dispatch<F>(&mut self, id: EntityId, callback: F)
    where
        F: FnOnce(&mut P, &mut dyn SystemContext),
    {
        let mut buffer = ActionBuffer::default();
        {
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.scheduler.now(),
            };
            let entity = match id {
                EntityId::A => &mut self.entity_a,
                EntityId::B => &mut self.entity_b,
            };
            callback(entity, &mut ctx);
        }
        self.process_actions(id, buffer);
    }

    fn process_actions(&mut self, source: EntityId, buffer: ActionBuffer) {
        for action in buffer.actions {
            match action {
                Action::Send(frame) => self.transmit(source, frame),
                Action::StartTimer(duration) => {
                    if let Err(err) = self.scheduler.start_timer(source, duration) {
                        self.warn(source, err.to_string());
                    }
                }
                Action::StopTimer => {
                    if let Err(err) = self.scheduler.stop_timer(source) {
                        self.warn(source, err.to_string());
                    }
                }
                Action::Deliver(payload) => {
                    info!("[{}] delivered {} bytes to application", source, payload.len());
                    self.deliveries.push(Delivery {
                        time: self.scheduler.now(),
                        entity: source,
                        payload,
                    });
                    self.record(LinkEventKind::Delivered {
                        entity: source,
                        payload,
                    });
                }
                Action::Log(message) => {
                    info!("[{}] {}", source, message);
                    self.record(LinkEventKind::ProtocolNote {
                        entity: source,
                        message,
                    });
                }
            }
        }
    }

    fn transmit(&mut self, from: EntityId, frame: Frame) {
        let outcome = self
            .channel
            .transmit(&mut self.scheduler, self.rng.as_mut(), from, &frame);
        match outcome {
            Transmission::Lost { injected } => {
                self.record(LinkEventKind::FrameLost {
                    from,
                    frame,
                    injected,
                });
            }
            Transmission::Scheduled {
                arrival,
                corruption,
            } => {
                if let Some(corruption) = corruption {
                    self.record(LinkEventKind::FrameCorrupted { from, corruption });
                }
                self.record(LinkEventKind::FrameScheduled {
                    from,
                    to: from.peer(),
                    arrival,
                    frame,
                });
            }
        }
    }

    fn warn(&mut self, entity: EntityId, message: String) {
        warn!("[{}] {}", entity, message);
        self.record(LinkEventKind::SchedulerWarning { entity, message });
    }

    fn record(&mut self, kind: LinkEventKind) {
        if kind.min_trace_level() <= self.config.trace_level {
            self.link_events.push(LinkEvent {
                time: self.scheduler.now(),
                kind,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Simulator;
    use crate::error::{ScheduleError, SimError};
    use crate::random::{SANITY_DRAWS, ScriptedUniform};
    use crate::trace::LinkEventKind;
    use rdt_lab_abstract::{EntityId, Frame, Packet, SimConfig, SystemContext, TransportProtocol};

    /// Starts its timer twice and stops it twice on every app arrival.
    #[derive(Default)]
    struct SloppyTimers {
        timer_fired: u32,
    }

    impl TransportProtocol for SloppyTimers {
        fn on_app_data(&mut self, ctx: &mut dyn SystemContext, _packet: Packet) {
            ctx.start_timer(5.0);
            ctx.start_timer(5.0);
        }

        fn on_frame(&mut self, _ctx: &mut dyn SystemContext, _frame: Frame) {}

        fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
            self.timer_fired += 1;
            ctx.stop_timer();
        }
    }

    fn quiet_config() -> SimConfig {
        SimConfig {
            max_packets: 0,
            trace_level: 0,
            ..Default::default()
        }
    }

    #[test]
    fn timer_misuse_is_reported_and_survived() {
        let mut sim = Simulator::with_source(
            quiet_config(),
            SloppyTimers::default(),
            SloppyTimers::default(),
            Box::new(ScriptedUniform::constant(0.5)),
        )
        .unwrap();
        sim.schedule_app_data(1.0, EntityId::A, Packet::filled(b'a')).unwrap();
        sim.run_until_complete();

        assert_eq!(sim.entity(EntityId::A).timer_fired, 1);
        assert_eq!(sim.current_time(), 6.0);
        let warnings: Vec<&str> = sim
            .link_events
            .iter()
            .filter_map(|e| match &e.kind {
                LinkEventKind::SchedulerWarning { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("already started"));
        assert!(warnings[1].contains("wasn't running"));
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = SimConfig {
            loss_prob: -0.1,
            ..Default::default()
        };
        let result = Simulator::with_source(
            config,
            SloppyTimers::default(),
            SloppyTimers::default(),
            Box::new(ScriptedUniform::constant(0.5)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn skewed_injected_source_is_refused() {
        let result = Simulator::with_source(
            quiet_config(),
            SloppyTimers::default(),
            SloppyTimers::default(),
            Box::new(ScriptedUniform::constant(0.99)),
        );
        assert!(matches!(
            result,
            Err(SimError::RandomSourceNotUniform { draws: SANITY_DRAWS, .. })
        ));

        let unchecked = Simulator::with_source_unchecked(
            quiet_config(),
            SloppyTimers::default(),
            SloppyTimers::default(),
            Box::new(ScriptedUniform::constant(0.99)),
        );
        assert!(unchecked.is_ok());
    }

    #[test]
    fn app_data_before_the_clock_is_rejected() {
        let mut sim = Simulator::with_source(
            quiet_config(),
            SloppyTimers::default(),
            SloppyTimers::default(),
            Box::new(ScriptedUniform::constant(0.5)),
        )
        .unwrap();
        sim.schedule_app_data(5.0, EntityId::A, Packet::filled(b'a')).unwrap();
        assert!(sim.step());
        assert_eq!(sim.current_time(), 5.0);

        let err = sim
            .schedule_app_data(-3.0, EntityId::A, Packet::filled(b'b'))
            .unwrap_err();
        assert_eq!(err, ScheduleError::InvalidTime { time: -3.0, now: 5.0 });
        assert!(sim
            .schedule_app_data(f64::NAN, EntityId::B, Packet::filled(b'c'))
            .is_err());

        sim.run_until_complete();
        assert_eq!(sim.current_time(), 10.0, "only the timer from t=5 ran");
    }

    #[test]
    fn seeded_simulator_passes_uniformity_check() {
        let sim = Simulator::new(quiet_config(), SloppyTimers::default(), SloppyTimers::default());
        assert!(sim.is_ok());
    }

    #[test]
    fn trace_level_gates_records() {
        let config = SimConfig {
            max_packets: 0,
            trace_level: 3,
            ..Default::default()
        };
        let mut sim = Simulator::with_source(
            config,
            SloppyTimers::default(),
            SloppyTimers::default(),
            Box::new(ScriptedUniform::constant(0.5)),
        )
        .unwrap();
        sim.schedule_app_data(1.0, EntityId::A, Packet::filled(b'a')).unwrap();
        sim.run_until_complete();

        assert!(sim
            .link_events
            .iter()
            .any(|e| matches!(e.kind, LinkEventKind::Dispatched { .. })));
        assert!(sim
            .link_events
            .iter()
            .any(|e| matches!(e.kind, LinkEventKind::AppDataGiven { .. })));
    }
}
