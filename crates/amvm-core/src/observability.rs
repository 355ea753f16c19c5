// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Process-wide hook for watching analog multiplies as they complete.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Metadata about one completed analog operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalogOpEvent {
    pub op_name: &'static str,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
    /// Grid cells that took part in the operation.
    pub cores: usize,
}

pub type AnalogOpObserver = Arc<dyn Fn(&AnalogOpEvent) + Send + Sync + 'static>;

static ANALOG_OP_OBSERVER: OnceLock<RwLock<Option<AnalogOpObserver>>> = OnceLock::new();

thread_local! {
    static IN_OBSERVER_CALLBACK: Cell<bool> = const { Cell::new(false) };
}

/// Install (or clear) the global observer, returning the previous one.
pub fn set_analog_op_observer(observer: Option<AnalogOpObserver>) -> Option<AnalogOpObserver> {
    let lock = ANALOG_OP_OBSERVER.get_or_init(|| RwLock::new(None));
    let mut slot = lock.write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, observer)
}

/// Emit an event to the installed observer. Does not allocate when none is set;
/// events raised from inside the observer itself are dropped.
pub fn emit_analog_op(op_name: &'static str, input_shape: &[usize], output_shape: &[usize], cores: usize) {
    let Some(lock) = ANALOG_OP_OBSERVER.get() else {
        return;
    };
    let observer = lock.read().unwrap_or_else(PoisonError::into_inner).clone();
    let Some(observer) = observer else {
        return;
    };

    let already_in_callback = IN_OBSERVER_CALLBACK.with(|flag| flag.replace(true));
    if already_in_callback {
        return;
    }

    let event = AnalogOpEvent {
        op_name,
        input_shape: input_shape.to_vec(),
        output_shape: output_shape.to_vec(),
        cores,
    };

    let _ = catch_unwind(AssertUnwindSafe(|| observer(&event)));

    IN_OBSERVER_CALLBACK.with(|flag| flag.set(false));
}
