use amvm_core::amvm_config::AnalogParams;
use amvm_core::{
    set_analog_op_observer, AnalogCore, AnalogMatrix, AnalogOpEvent, AnalogOpObserver, Data,
};
use ndarray::{array, Array2};
use std::sync::{Arc, Mutex, PoisonError};

// The observer slot is process-wide; tests in this binary take turns.
static SERIAL: Mutex<()> = Mutex::new(());

#[test]
fn observer_sees_every_completed_multiply() {
    let _guard = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    let mut params = AnalogParams::default();
    params.core.rows_max = 2;
    params.core.cols_max = 2;
    let core = AnalogCore::new(Array2::from_elem((4, 3), 0.25), params).unwrap();

    let seen: Arc<Mutex<Vec<AnalogOpEvent>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let observer: AnalogOpObserver = Arc::new(move |event: &AnalogOpEvent| {
        sink.lock().unwrap().push(event.clone());
    });
    assert!(set_analog_op_observer(Some(observer)).is_none());

    let x: Data = array![1.0, 2.0, 3.0].into();
    core.matvec(&x).unwrap();
    let y: Data = array![1.0, 0.0, 0.0, 1.0].into();
    core.vecmat(&y).unwrap();
    // a rejected operand produces no event
    assert!(core.matvec(&y).is_err());

    assert!(set_analog_op_observer(None).is_some());
    core.matvec(&x).unwrap();

    let events = seen.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].op_name, "analog.matvec");
    assert_eq!(events[0].input_shape, vec![3]);
    assert_eq!(events[0].output_shape, vec![4]);
    assert_eq!(events[0].cores, core.num_cores());
    assert_eq!(events[1].op_name, "analog.vecmat");
    assert_eq!(events[1].output_shape, vec![3]);
}

#[test]
fn a_panicking_observer_does_not_break_multiplies() {
    let _guard = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    let core = AnalogCore::new(array![[1.0, 0.0], [0.0, 1.0]], AnalogParams::default()).unwrap();
    let x: Data = array![1.0, 2.0].into();
    let observer: AnalogOpObserver = Arc::new(|_: &AnalogOpEvent| panic!("observer failure"));
    let previous = set_analog_op_observer(Some(observer));
    assert_eq!(core.matvec(&x).unwrap(), x);
    assert_eq!(core.matvec(&x).unwrap(), x);
    set_analog_op_observer(previous);
}
