//! Render-target discard/readonly inference (§4.3.4).
//!
//! For each attachment slot, whether the pass can discard it on entry or
//! exit is read off the shape of the dependency graph around the resource
//! node this pass produces for it, not off any explicit hint from the
//! caller: if nothing wrote into it before this pass, there's nothing to
//! preserve on entry; if nothing reads it afterward, there's nothing to
//! preserve on exit.

use ember_driver::TargetBufferFlags;

use crate::frame_graph::FrameGraph;
use crate::pass::Attachment;

pub(crate) struct Resolved {
    pub target: TargetBufferFlags,
    pub discard_start: TargetBufferFlags,
    pub discard_end: TargetBufferFlags,
    pub read_only: TargetBufferFlags,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn resolve_attachment(
    fg: &FrameGraph,
    attachment: &Attachment,
    bit: TargetBufferFlags,
    clear_flags: TargetBufferFlags,
    is_depth: bool,
    is_stencil: bool,
) -> Resolved {
    let mut r = Resolved {
        target: TargetBufferFlags::empty(),
        discard_start: TargetBufferFlags::empty(),
        discard_end: TargetBufferFlags::empty(),
        read_only: TargetBufferFlags::empty(),
    };
    if !attachment.is_present() {
        return r;
    }
    r.target |= bit;

    match attachment.write_node {
        Some(write_node) => {
            if !fg.resource_node_has_active_readers(write_node) {
                r.discard_end |= bit;
            }
        }
        None => {
            if is_depth {
                r.read_only |= TargetBufferFlags::DEPTH;
            }
            if is_stencil {
                r.read_only |= TargetBufferFlags::STENCIL;
            }
        }
    }

    // discardStart is independent of whether this pass writes the
    // attachment: it only asks whether the resource node preceding this
    // pass's view has a live writer. A read-only attachment (e.g. a
    // depth-test-only pass reusing a previously-written depth buffer) must
    // not discard content a still-live prior pass produced.
    let incoming_ok = attachment
        .incoming
        .is_some_and(|prev| fg.resource_node_has_active_writer(prev));
    if !incoming_ok {
        r.discard_start |= bit;
    }

    if clear_flags.contains(bit) {
        r.discard_start |= bit;
    }
    r
}
