use amvm_core::amvm_config::{AnalogParams, CoreStyle};
use amvm_core::{AnalogCore, AnalogError, AnalogMatrix, Data, SliceSpec};
use approx::assert_abs_diff_eq;
use ndarray::{array, s, Array1, Array2, ArrayD, Axis};
use num_complex::Complex64;

fn params(rows_max: usize, cols_max: usize) -> AnalogParams {
    let mut params = AnalogParams::default();
    params.core.rows_max = rows_max;
    params.core.cols_max = cols_max;
    params
}

/// Entries in `[-0.5, 0.4375]`, so the derived weight range is `(-0.5, 0.5)`.
fn ramp() -> Array2<f64> {
    Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as f64 / 16.0 - 0.5)
}

fn assert_real_close(got: &Data, want: ArrayD<f64>) {
    let Data::Real(got) = got else {
        panic!("expected real output, got {:?}", got.dtype());
    };
    assert_eq!(got.shape(), want.shape());
    for (g, w) in got.iter().zip(want.iter()) {
        assert_abs_diff_eq!(*g, *w, epsilon = 1e-9);
    }
}

#[test]
fn slice_assignment_replaces_only_the_addressed_block() {
    // the out-of-range update is reported at warn level
    let _ = amvm_core::amvm_config::init_tracing();
    let a = ramp();
    let mut core = AnalogCore::new(a.clone(), params(2, 2)).unwrap();
    let x = array![[0.1, 5.0], [-0.2, 0.3]];
    core.set_item((1..3, 0..2), &x.into()).unwrap();

    let mut want = a;
    want.slice_mut(s![1..3, 0..2]).assign(&array![[0.1, 0.5], [-0.2, 0.3]]);
    assert_real_close(&core.get_matrix().unwrap(), want.into_dyn());
    assert_eq!(core.weight_range(), (-0.5, 0.5));
}

#[test]
fn masked_views_read_and_multiply_their_block() {
    let a = ramp();
    let mut core = AnalogCore::new(a.clone(), params(2, 2)).unwrap();
    let view = core.get_item((1..3, 0..3)).unwrap();
    assert!(!view.is_whole());
    assert_eq!(view.shape(), vec![2, 3]);
    let block = a.slice(s![1..3, 0..3]).to_owned();
    assert_real_close(&view.get_matrix().unwrap(), block.clone().into_dyn());

    let x = array![0.3, -0.7, 0.2];
    assert_real_close(&view.matvec(&x.clone().into()).unwrap(), block.dot(&x).into_dyn());
    let y = array![1.0, -2.0];
    assert_real_close(&view.vecmat(&y.clone().into()).unwrap(), y.dot(&block).into_dyn());
    let xs = array![[1.0, 0.0], [0.5, 0.5], [0.0, -1.0]];
    assert_real_close(&view.dot(&xs.clone().into()).unwrap(), block.dot(&xs).into_dyn());
    let ys = array![[1.0, 0.0], [0.25, -0.5], [0.0, 2.0]];
    assert_real_close(&view.rdot(&ys.clone().into()).unwrap(), ys.dot(&block).into_dyn());
    assert!(view.render().unwrap().starts_with("MaskedCore("));
}

#[test]
fn negative_steps_select_in_reverse() {
    let a = ramp();
    let mut core = AnalogCore::new(a.clone(), params(3, 3)).unwrap();
    let view = core
        .get_item((SliceSpec::reversed(), SliceSpec::new(Some(3), None, -2)))
        .unwrap();
    let want = a.select(Axis(0), &[3, 2, 1, 0]).select(Axis(1), &[3, 1]);
    assert_eq!(want.shape(), &[4, 2]);
    assert_real_close(&view.get_matrix().unwrap(), want.clone().into_dyn());

    let x = array![2.0, -1.0];
    assert_real_close(&view.matvec(&x.clone().into()).unwrap(), want.dot(&x).into_dyn());
}

#[test]
fn writes_through_a_reversed_view_land_in_the_right_place() {
    let a = ramp();
    let mut core = AnalogCore::new(a.clone(), params(2, 2)).unwrap();
    {
        let mut view = core.get_item((SliceSpec::new(Some(-1), Some(-3), -1), 1..3)).unwrap();
        view.set_matrix(&array![[0.0, 0.1], [0.2, 0.3]].into()).unwrap();
    }
    let mut want = a;
    want.slice_mut(s![3, 1..3]).assign(&array![0.0, 0.1]);
    want.slice_mut(s![2, 1..3]).assign(&array![0.2, 0.3]);
    assert_real_close(&core.get_matrix().unwrap(), want.into_dyn());
}

#[test]
fn a_fully_reversed_write_is_a_full_reprogramming() {
    let a = ramp();
    let mut core = AnalogCore::new(a.clone(), params(2, 2)).unwrap();
    assert!(!core.get_item(SliceSpec::reversed()).unwrap().is_whole());

    let flipped = a.slice(s![..;-1, ..]).to_owned();
    core.set_item(SliceSpec::reversed(), &flipped.into()).unwrap();
    assert_eq!(core.weight_range(), (-0.5, 0.5));
    assert_real_close(&core.get_matrix().unwrap(), a.into_dyn());
}

#[test]
fn whole_matrix_indices_return_the_matrix_itself() {
    let mut core = AnalogCore::new(ramp(), params(2, 2)).unwrap();
    assert!(core.get_item(..).unwrap().is_whole());
    assert!(core.get_item((.., ..)).unwrap().is_whole());
    assert!(core.get_item((0..4, ..)).unwrap().is_whole());
}

#[test]
fn integer_indices_flatten_the_view() {
    let a = ramp();
    let mut core = AnalogCore::new(a.clone(), params(2, 2)).unwrap();
    {
        let mut row = core.get_item(-1).unwrap();
        assert_eq!(row.shape(), vec![4]);
        assert_real_close(&row.get_matrix().unwrap(), a.row(3).to_owned().into_dyn());
        assert!(matches!(row.get_item(0), Err(AnalogError::Index(_))));
        row.set_matrix(&array![0.4, 0.3, 0.2, 0.1].into()).unwrap();
    }
    {
        let column = core.get_item((.., 2)).unwrap();
        assert_eq!(column.shape(), vec![4]);
        let mut want = a.column(2).to_owned();
        want[3] = 0.2;
        assert_real_close(&column.get_matrix().unwrap(), want.into_dyn());
    }
    assert_eq!(core.weight_range(), (-0.5, 0.5));
}

#[test]
fn out_of_bounds_indices_are_index_errors() {
    let mut core = AnalogCore::new(ramp(), params(0, 0)).unwrap();
    assert!(matches!(core.get_item((0, 4)), Err(AnalogError::Index(_))));
    assert!(matches!(core.get_item(-5), Err(AnalogError::Index(_))));
    assert!(matches!(
        core.get_item(SliceSpec::full().with_step(0)),
        Err(AnalogError::Index(_))
    ));
}

#[test]
fn masked_writes_need_a_matching_shape() {
    let mut core = AnalogCore::new(ramp(), params(0, 0)).unwrap();
    let mut view = core.get_item((0..2, 0..2)).unwrap();
    assert!(matches!(
        view.set_matrix(&Array2::<f64>::zeros((3, 2)).into()),
        Err(AnalogError::Shape(_))
    ));
}

#[test]
fn transposed_views_swap_every_orientation() {
    let a = array![[0.5, -0.25, 0.75], [0.1, 0.2, -0.3]];
    let at = a.t().to_owned();
    let mut core = AnalogCore::new(a.clone(), params(2, 1)).unwrap();
    let t = core.transpose();
    assert_eq!(t.shape(), vec![3, 2]);
    assert_real_close(&t.get_matrix().unwrap(), at.clone().into_dyn());

    let x = array![1.0, -1.0];
    assert_real_close(&t.matvec(&x.clone().into()).unwrap(), at.dot(&x).into_dyn());
    let y = array![0.5, 0.25, -1.0];
    assert_real_close(&t.vecmat(&y.clone().into()).unwrap(), y.dot(&at).into_dyn());
    let xs = array![[1.0, 0.0, 2.0], [0.0, 1.0, -1.0]];
    assert_real_close(&t.matmat(&xs.clone().into()).unwrap(), at.dot(&xs).into_dyn());
    let ys = array![[1.0, 2.0, 3.0], [0.0, -1.0, 0.5]];
    assert_real_close(&t.rmatmat(&ys.clone().into()).unwrap(), ys.dot(&at).into_dyn());
    assert!(t.render().unwrap().starts_with("TransposedCore("));
}

#[test]
fn transposing_twice_is_the_original_matrix() {
    let a = ramp();
    let mut core = AnalogCore::new(a.clone(), params(2, 2)).unwrap();
    let mut t = core.transpose();
    let tt = t.transpose();
    assert_eq!(tt.shape(), vec![4, 4]);
    assert_real_close(&tt.get_matrix().unwrap(), a.clone().into_dyn());
    let x = array![1.0, 0.0, -1.0, 0.5];
    assert_real_close(&tt.matvec(&x.clone().into()).unwrap(), a.dot(&x).into_dyn());
}

#[test]
fn writes_through_a_transpose_reach_the_parent() {
    let a = ramp();
    let mut core = AnalogCore::new(a.clone(), params(2, 2)).unwrap();
    core.transpose()
        .set_item((0, 1..3), &array![0.11, -0.22].into())
        .unwrap();
    let mut want = a;
    want[[1, 0]] = 0.11;
    want[[2, 0]] = -0.22;
    assert_real_close(&core.get_matrix().unwrap(), want.into_dyn());
}

#[test]
fn views_compose_in_either_order() {
    let a = ramp();
    let mut core = AnalogCore::new(a.clone(), params(3, 2)).unwrap();
    {
        let mut view = core.get_item((0..2, 1..4)).unwrap();
        let t = view.transpose();
        let block_t = a.slice(s![0..2, 1..4]).t().to_owned();
        assert_eq!(t.shape(), vec![3, 2]);
        assert_real_close(&t.get_matrix().unwrap(), block_t.clone().into_dyn());
        let y = array![1.0, 2.0];
        assert_real_close(&t.matvec(&y.clone().into()).unwrap(), block_t.dot(&y).into_dyn());
    }
    {
        let mut t = core.transpose();
        let view = t.get_item((1..3, ..)).unwrap();
        let want = a.t().slice(s![1..3, ..]).to_owned();
        assert_real_close(&view.get_matrix().unwrap(), want.clone().into_dyn());
        let x = Array1::from(vec![0.5, -0.5, 1.0, 0.0]);
        assert_real_close(&view.matvec(&x.clone().into()).unwrap(), want.dot(&x).into_dyn());
    }
}

#[test]
fn nested_masked_writes_compose_back_to_the_core() {
    let a = ramp();
    let mut core = AnalogCore::new(a.clone(), params(2, 2)).unwrap();
    {
        let mut outer = core.get_item((1.., 1..)).unwrap();
        let mut inner = outer.get_item((SliceSpec::reversed(), 0..2)).unwrap();
        assert_eq!(inner.shape(), vec![3, 2]);
        inner
            .set_matrix(&array![[0.0, 0.0], [0.1, 0.1], [0.2, 0.2]].into())
            .unwrap();
    }
    let mut want = a;
    want.slice_mut(s![3, 1..3]).fill(0.0);
    want.slice_mut(s![2, 1..3]).fill(0.1);
    want.slice_mut(s![1, 1..3]).fill(0.2);
    assert_real_close(&core.get_matrix().unwrap(), want.into_dyn());
}

#[test]
fn complex_cores_take_partial_updates() {
    let z = |re: f64, im: f64| Complex64::new(re, im);
    let a = array![
        [z(0.5, -0.5), z(0.1, 0.2), z(0.0, 0.3)],
        [z(-0.4, 0.1), z(0.2, 0.2), z(0.3, -0.1)],
        [z(0.1, 0.0), z(-0.2, 0.4), z(0.25, 0.25)],
    ];
    let mut params = params(3, 2);
    params.core.complex_matrix = true;
    let mut core = AnalogCore::new(a.clone(), params).unwrap();
    let update = array![z(-0.1, 0.1), z(0.3, 0.0)];
    core.set_item((1, 0..2), &update.clone().into()).unwrap();

    let mut want = a;
    want.slice_mut(s![1, 0..2]).assign(&update);
    let Data::Complex(got) = core.get_matrix().unwrap() else {
        panic!("complex core returned real data");
    };
    for (g, w) in got.iter().zip(want.iter()) {
        assert_abs_diff_eq!(g.re, w.re, epsilon = 1e-12);
        assert_abs_diff_eq!(g.im, w.im, epsilon = 1e-12);
    }

    let view = core.get_item((0..2, ..)).unwrap();
    let x = array![z(1.0, 0.0), z(0.0, 1.0), z(1.0, 1.0)];
    let expected = want.slice(s![0..2, ..]).dot(&x);
    let Data::Complex(out) = view.matvec(&x.into()).unwrap() else {
        panic!("complex core returned real data");
    };
    for (g, w) in out.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(g.re, w.re, epsilon = 1e-9);
        assert_abs_diff_eq!(g.im, w.im, epsilon = 1e-9);
    }
}
