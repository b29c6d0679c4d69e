// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! The per-variant pixel operation plugged into a filter node.

use crate::{format::FormatDescriptor, params::ParameterSnapshot};

/// An in-place operation on one frame.
///
/// The node calls [`Transform::init`] whenever the output connection is
/// (re)established, and serializes all calls, so implementations can keep
/// history between frames without locking.
///
/// [`Transform::start`] and [`Transform::stop`] run on the buffer path,
/// right before the first frame handled after the node's run state changed.
pub trait Transform: Send {
    /// Resets per-connection state for frames of `format`.
    fn init(&mut self, _format: &FormatDescriptor) {}

    /// Called when the node starts running.
    fn start(&mut self) {}

    /// Called when the node stops running.
    fn stop(&mut self) {}

    /// Filters `frame` in place.
    ///
    /// `params` holds the values current when the frame arrived. Values the
    /// transform changes in it are written back to the node's store.
    fn filter(&mut self, frame: &mut [u8], params: &mut ParameterSnapshot);
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn init(&mut self, format: &FormatDescriptor) {
        (**self).init(format)
    }

    fn start(&mut self) {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn filter(&mut self, frame: &mut [u8], params: &mut ParameterSnapshot) {
        (**self).filter(frame, params)
    }
}

/// A transform together with the run state it last saw.
pub(crate) struct TransformSlot {
    transform: Box<dyn Transform>,
    started: bool,
}

impl TransformSlot {
    pub(crate) fn new(transform: Box<dyn Transform>) -> Self {
        Self {
            transform,
            started: false,
        }
    }

    /// Calls `start` or `stop` if `running` differs from the last state seen.
    pub(crate) fn sync(&mut self, running: bool) {
        match (self.started, running) {
            (false, true) => self.transform.start(),
            (true, false) => self.transform.stop(),
            _ => return,
        }
        self.started = running;
    }

    pub(crate) fn transform(&mut self) -> &mut dyn Transform {
        &mut *self.transform
    }
}

/// Leaves frames untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Transform for Passthrough {
    fn filter(&mut self, _frame: &mut [u8], _params: &mut ParameterSnapshot) {}
}
