use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashMap;

use protosim_core::{Direction, Event, EventApi, Frame, Packet, Protocol, SimConfig, TimerToken};
use tracing::{debug, info};

use crate::channel::ChannelPolicy;

/// One entry in the event queue: `(time, id, event)` ordered so the
/// `BinaryHeap` (a max-heap) pops the smallest time first, with `id`
/// breaking ties in arrival order. Grounded on the teacher's `Event`
/// struct in `tcp-lab-simulator/src/engine.rs`.
#[derive(Debug)]
struct ScheduledItem {
    time: f64,
    id: u64,
    event: Event,
}

impl PartialEq for ScheduledItem {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for ScheduledItem {}

impl PartialOrd for ScheduledItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .partial_cmp(&self.time)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// The discrete-event kernel (spec §4.2), driving exactly one
/// `Protocol` instance through `Event`s pulled from a `BinaryHeap`.
///
/// Unlike the teacher's `Simulator`, which owns a `sender` and a
/// `receiver` node and routes `EventType::PacketArrival { to, .. }`
/// between them, this engine owns a single `Box<dyn Protocol>`: the
/// reference protocols (GBN, Selective Repeat, the 1-bit sliding
/// window) are each already one bidirectional state machine in
/// `original_source/`, and giving the two unidirectional ones
/// (Utopia, Stop-and-Wait, PAR) the same shape removes the dual-loop
/// race that the original `Stop_and_wait.py` has between its sender
/// and receiver coroutines (see DESIGN.md).
pub struct Simulator {
    time: f64,
    queue: BinaryHeap<ScheduledItem>,
    next_id: u64,

    config: SimConfig,
    channel: ChannelPolicy,

    protocol: Option<Box<dyn Protocol>>,

    net_enabled: bool,
    next_msg: u64,

    data_timers: HashMap<u32, TimerToken>,
    ack_timer: Option<TimerToken>,

    tx_log: Vec<(f64, Frame)>,
    rx_log: Vec<(f64, String)>,
    event_log: Vec<(f64, &'static str)>,
    dropped: u64,
    corrupted: u64,
}

impl Simulator {
    pub fn new(config: SimConfig, protocol: Box<dyn Protocol>) -> Self {
        let channel = ChannelPolicy::new(&config);
        Self {
            time: 0.0,
            queue: BinaryHeap::new(),
            next_id: 0,
            config,
            channel,
            protocol: Some(protocol),
            net_enabled: false,
            next_msg: 0,
            data_timers: HashMap::new(),
            ack_timer: None,
            tx_log: Vec::new(),
            rx_log: Vec::new(),
            event_log: Vec::new(),
            dropped: 0,
            corrupted: 0,
        }
    }

    pub fn now(&self) -> f64 {
        self.time
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tx_log(&self) -> &[(f64, Frame)] {
        &self.tx_log
    }

    pub fn rx_log(&self) -> &[(f64, String)] {
        &self.rx_log
    }

    pub fn event_log(&self) -> &[(f64, &'static str)] {
        &self.event_log
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn corrupted(&self) -> u64 {
        self.corrupted
    }

    fn schedule(&mut self, dt: f64, event: Event) -> TimerToken {
        let time = self.time + dt.max(0.0);
        let id = self.next_id;
        self.next_id += 1;
        let token = TimerToken::new(time, id);
        self.queue.push(ScheduledItem { time, id, event });
        token
    }

    /// Pop the next non-stale event, or `None` if the run is idle: the
    /// queue is empty and the network layer is disabled, so no more
    /// events will ever be produced (spec §4.2 step 3 / §7).
    fn next_event(&mut self) -> Option<Event> {
        loop {
            if self.queue.is_empty() {
                if self.net_enabled {
                    self.schedule(0.0, Event::NetworkLayerReady);
                } else {
                    return None;
                }
            }
            let item = self.queue.pop().expect("queue just checked non-empty");
            self.time = item.time;

            let stale = match &item.event {
                Event::Timeout(seq_key) => match self.data_timers.get(seq_key) {
                    Some(tok) if *tok == TimerToken::new(item.time, item.id) => {
                        self.data_timers.remove(seq_key);
                        false
                    }
                    _ => true,
                },
                Event::AckTimeout => match self.ack_timer {
                    Some(tok) if tok == TimerToken::new(item.time, item.id) => {
                        self.ack_timer = None;
                        false
                    }
                    _ => true,
                },
                _ => false,
            };

            if stale {
                debug!("Skipping cancelled timer event at {}", self.time);
                continue;
            }

            debug!("Processing event at {}: {:?}", self.time, item.event.name());
            self.event_log.push((self.time, item.event.name()));
            return Some(item.event);
        }
    }

    /// Drive the protocol's `init` hook, then dispatch events one at a
    /// time. Returns the number of events actually dispatched, which
    /// may be less than `max_steps` if the run went idle first.
    pub fn run(&mut self, max_steps: usize) -> usize {
        let mut protocol = self.protocol.take().expect("protocol already taken");
        {
            let mut ctx = ScopedApi { engine: self };
            protocol.init(&mut ctx);
        }
        self.protocol = Some(protocol);

        let mut dispatched = 0;
        while dispatched < max_steps && self.step() {
            dispatched += 1;
        }
        dispatched
    }

    /// Dispatch exactly one event. Returns `false` if the run is idle.
    pub fn step(&mut self) -> bool {
        let event = match self.next_event() {
            Some(event) => event,
            None => return false,
        };

        let mut protocol = self.protocol.take().expect("protocol already taken");
        {
            let mut ctx = ScopedApi { engine: self };
            match event {
                Event::NetworkLayerReady => protocol.on_network_layer_ready(&mut ctx),
                Event::FrameArrival(frame) => {
                    let frame = ctx.from_physical_layer(frame);
                    protocol.on_frame_arrival(&mut ctx, frame);
                }
                Event::ChecksumError => protocol.on_checksum_error(&mut ctx),
                Event::Timeout(seq_key) => protocol.on_timeout(&mut ctx, seq_key),
                Event::AckTimeout => protocol.on_ack_timeout(&mut ctx),
            }
        }
        self.protocol = Some(protocol);
        true
    }
}

/// `EventApi` borrowed from the engine for the lifetime of one
/// protocol callback. Forwards directly to `Simulator` methods rather
/// than buffering actions: `Simulator::step`/`run` already take the
/// protocol out of `self` before constructing this, so there is no
/// aliasing conflict to work around the way the teacher's
/// `ActionBuffer` does.
struct ScopedApi<'a> {
    engine: &'a mut Simulator,
}

impl EventApi for ScopedApi<'_> {
    fn from_network_layer(&mut self) -> Packet {
        let packet = Packet::new(format!("MSG_{}", self.engine.next_msg));
        self.engine.next_msg += 1;
        packet
    }

    fn to_network_layer(&mut self, packet: Packet) {
        info!("[{}] DELIVERED DATA: {}", self.engine.time, packet.data);
        self.engine.rx_log.push((self.engine.time, packet.data));
    }

    fn to_physical_layer(&mut self, frame: Frame) {
        debug!(
            "Sending {} seq={} ack={} dir={:?} at {}",
            frame.kind.name(),
            frame.seq,
            frame.ack,
            frame.direction,
            self.engine.time
        );
        self.engine.tx_log.push((self.engine.time, frame.clone()));

        if self.engine.channel.will_drop() {
            debug!("Frame lost in channel");
            self.engine.dropped += 1;
            return;
        }
        if self.engine.channel.will_corrupt() {
            debug!("Frame corrupted in channel");
            self.engine.corrupted += 1;
            let delay = self.engine.channel.sample_delay();
            self.engine.schedule(delay, Event::ChecksumError);
            return;
        }
        let delay = self.engine.channel.sample_delay();
        self.engine.schedule(delay, Event::FrameArrival(frame));
    }

    fn start_timer(&mut self, seq_key: u32) {
        let dt = self.engine.config.data_timeout;
        let token = self.engine.schedule(dt, Event::Timeout(seq_key));
        self.engine.data_timers.insert(seq_key, token);
    }

    fn stop_timer(&mut self, seq_key: u32) {
        self.engine.data_timers.remove(&seq_key);
    }

    fn start_ack_timer(&mut self) {
        let dt = self.engine.config.ack_timeout;
        let token = self.engine.schedule(dt, Event::AckTimeout);
        self.engine.ack_timer = Some(token);
    }

    fn stop_ack_timer(&mut self) {
        self.engine.ack_timer = None;
    }

    fn enable_network_layer(&mut self) {
        self.engine.net_enabled = true;
        if self.engine.config.ready_on_enable {
            let dt = self.engine.config.ready_delay;
            self.engine.schedule(dt, Event::NetworkLayerReady);
        }
    }

    fn disable_network_layer(&mut self) {
        self.engine.net_enabled = false;
    }

    fn now(&self) -> f64 {
        self.engine.time
    }
}
