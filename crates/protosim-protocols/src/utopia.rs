use protosim_core::{Direction, EventApi, Frame, FrameKind, Protocol};

/// No acknowledgements, no timers, no flow control: whatever the
/// application layer produces is handed straight to the channel, and
/// whatever arrives intact is handed straight to the application layer.
/// Ported from `Utopia/utopia.py`'s `sender_utopia`/`receive_utopia`,
/// merged into one state machine since both sides of this flow are
/// driven by the same engine here.
#[derive(Debug, Default)]
pub struct Utopia;

impl Utopia {
    pub fn new() -> Self {
        Self
    }
}

impl Protocol for Utopia {
    fn init(&mut self, ctx: &mut dyn EventApi) {
        ctx.enable_network_layer();
    }

    fn on_network_layer_ready(&mut self, ctx: &mut dyn EventApi) {
        let packet = ctx.from_network_layer();
        ctx.to_physical_layer(Frame::data(0, 0, packet, Direction::AtoB));
    }

    fn on_frame_arrival(&mut self, ctx: &mut dyn EventApi, frame: Frame) {
        if frame.kind == FrameKind::Data {
            ctx.to_network_layer(frame.info);
        }
    }
}
