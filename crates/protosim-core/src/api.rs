use crate::frame::Frame;
use crate::packet::Packet;

/// The fixed vocabulary a protocol state machine is given to interact
/// with the network and application layers (spec §4.3/§6).
///
/// There is no process-wide "bound engine" singleton here (spec §9's
/// redesign note): every protocol callback receives a fresh
/// `&mut dyn EventApi` borrowed from the engine for the duration of
/// that one call. This is `protosim-engine`'s `ScopedApi`, grounded on
/// the teacher's `ScopedContext`/`SystemContext` pair.
pub trait EventApi {
    /// Pull the next synthetic application packet. Each call advances
    /// the engine's monotonic message counter, so callers should only
    /// invoke this when they are actually going to send the result —
    /// calling it and discarding the packet would silently skip a
    /// message number.
    fn from_network_layer(&mut self) -> Packet;

    /// Deliver a packet to the application layer (appends to the RX
    /// log at the current simulated time).
    fn to_network_layer(&mut self, packet: Packet);

    /// Hand a frame to the physical layer / channel. The channel's
    /// loss, corruption, and latency draws happen synchronously inside
    /// this call (see `ScopedApi::to_physical_layer`): by the time it
    /// returns the frame has already been logged and either dropped,
    /// scheduled to arrive corrupted, or scheduled to arrive intact.
    fn to_physical_layer(&mut self, frame: Frame);

    /// Identity pass-through for a frame already delivered by
    /// `FrameArrival`, kept to match the documented interface (spec
    /// §4.2/§6): the channel already performed delivery; this just
    /// names the hand-off from physical layer to protocol.
    fn from_physical_layer(&mut self, frame: Frame) -> Frame {
        frame
    }

    /// (Re)start the data-retransmission timer for `seq_key`,
    /// replacing (and thereby invalidating) any previous timer for
    /// the same key.
    fn start_timer(&mut self, seq_key: u32);

    /// Cancel the data-retransmission timer for `seq_key`, if any.
    /// A no-op if no such timer is currently armed.
    fn stop_timer(&mut self, seq_key: u32);

    /// (Re)start the single distinguished deferred-ack timer.
    fn start_ack_timer(&mut self);

    /// Cancel the deferred-ack timer, if any.
    fn stop_ack_timer(&mut self);

    /// Mark the application layer ready to produce more data; may
    /// schedule an immediate `NetworkLayerReady` if the queue would
    /// otherwise be empty, and (if `ready_on_enable` is configured)
    /// an additional one after `ready_delay`.
    fn enable_network_layer(&mut self);

    /// Mark the application layer not ready. Already-queued
    /// `NetworkLayerReady` events are not cancelled by this call.
    fn disable_network_layer(&mut self);

    /// Current simulated time.
    fn now(&self) -> f64;
}

/// The interface every link-layer protocol state machine implements
/// (spec §4.4). All methods default to a no-op so a protocol that
/// never uses, say, the ack timer (Go-Back-N's `NETWORK_LAYER_READY`
/// handling aside) doesn't need to stub it out.
pub trait Protocol {
    /// Called once before the engine starts dispatching events.
    fn init(&mut self, _ctx: &mut dyn EventApi) {}

    /// Called when the application layer is ready to send and the
    /// engine is dispatching a `NetworkLayerReady` event. The
    /// protocol decides whether to actually pull a packet
    /// (`ctx.from_network_layer()`) based on its own window/state.
    fn on_network_layer_ready(&mut self, _ctx: &mut dyn EventApi) {}

    /// Called when a frame arrives intact.
    fn on_frame_arrival(&mut self, _ctx: &mut dyn EventApi, _frame: Frame) {}

    /// Called when a frame arrived but was corrupted in transit. The
    /// reference protocols all rely on timers for recovery and simply
    /// ignore this event, but it is delivered so a protocol could act
    /// on it if it wanted to.
    fn on_checksum_error(&mut self, _ctx: &mut dyn EventApi) {}

    /// Called when a still-valid data timer for `seq_key` fires.
    fn on_timeout(&mut self, _ctx: &mut dyn EventApi, _seq_key: u32) {}

    /// Called when the still-valid deferred-ack timer fires.
    fn on_ack_timeout(&mut self, _ctx: &mut dyn EventApi) {}
}
