//! Matrix-free application of single operator terms to state vectors.
//!
//! A basis describes the action of a term as coordinate data: parallel arrays
//! of matrix elements, row indices, and column indices. Application scatters
//! `value * v_in[col]` into `v_out[row]` for every element, never forming the
//! full matrix. Arrays of any dimension are accepted, with the leading axis
//! indexing basis states; a 2D array is treated as a batch of column vectors.
//!
//! The numeric type of the matrix elements is that of the coupling passed in.

use ndarray::{ self as nd, Axis };
use num_complex::Complex64 as C64;
use rustc_hash::FxHashSet as HashSet;
use crate::{
    error::{ OpError, OpResult },
    hilbert::OperatorBasis,
    scalar::{ Promote, Promoted, Scalar, Widen },
    terms::OpString,
};

/// Coordinate-form description of a single term's action.
///
/// Element `k` contributes `values[k]` at `(rows[k], cols[k])`. Rows may
/// repeat unless the producing basis declares otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct CooElements<A> {
    pub values: nd::Array1<A>,
    pub rows: nd::Array1<usize>,
    pub cols: nd::Array1<usize>,
}

impl<A> CooElements<A> {
    /// Create a new `CooElements`.
    ///
    /// Fails if the three arrays differ in length.
    pub fn new(
        values: nd::Array1<A>,
        rows: nd::Array1<usize>,
        cols: nd::Array1<usize>,
    ) -> OpResult<Self>
    {
        if values.len() != rows.len() || values.len() != cols.len() {
            return Err(OpError::CooLength);
        }
        Ok(Self { values, rows, cols })
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize { self.values.len() }

    /// Return `true` if no elements are stored.
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// Swap the roles of rows and columns.
    pub fn transposed(self) -> Self {
        let Self { values, rows, cols } = self;
        Self { values, rows: cols, cols: rows }
    }
}

impl<A> CooElements<A>
where A: Scalar
{
    /// Complex-conjugate every element.
    pub fn conjugated(self) -> Self {
        let Self { values, rows, cols } = self;
        Self { values: values.mapv_into(Scalar::conj), rows, cols }
    }

    /// Coordinate form of the Hermitian adjoint.
    pub fn adjoint(self) -> Self { self.transposed().conjugated() }
}

impl CooElements<C64> {
    /// Convert every element to another numeric type.
    ///
    /// Fails if a complex element would be stored in a real type.
    pub fn cast<A>(self) -> OpResult<CooElements<A>>
    where A: Scalar
    {
        let Self { values, rows, cols } = self;
        let values: nd::Array1<A>
            = values.iter()
            .map(|z| A::from_c64(*z).ok_or(OpError::ComplexToReal(*z)))
            .collect::<OpResult<_>>()?;
        Ok(CooElements { values, rows, cols })
    }
}

/// Compute coordinate data for a single term.
///
/// Matrix elements are returned in the numeric type of `coupling`.
pub fn op<A, B>(basis: &B, opstr: &str, indices: &[usize], coupling: A)
    -> OpResult<CooElements<A>>
where
    A: Widen<C64>,
    B: OperatorBasis + ?Sized,
{
    let term = OpString::new(opstr, indices.iter().copied(), coupling.widen());
    basis.op_elements(&term)?.cast()
}

/// Add the action of a single term on `v_in` to `v_out`.
///
/// With `transposed`, rows and columns of the term swap roles; with
/// `conjugated`, matrix elements are conjugated. Setting both applies the
/// Hermitian adjoint of the term.
///
/// Fails without touching `v_out` if the leading dimension of `v_in` is not
/// the dimension of the basis, if the shapes of `v_in` and `v_out` differ, or
/// if the basis cannot produce valid coordinate data.
#[allow(clippy::too_many_arguments)]
pub fn inplace_op<A, B, V, O, Si, So, D>(
    basis: &B,
    v_in: &nd::ArrayBase<Si, D>,
    opstr: &str,
    indices: &[usize],
    coupling: A,
    transposed: bool,
    conjugated: bool,
    v_out: &mut nd::ArrayBase<So, D>,
) -> OpResult<()>
where
    A: Widen<C64> + Widen<O>,
    B: OperatorBasis + ?Sized,
    V: Widen<O>,
    O: Scalar,
    Si: nd::Data<Elem = V>,
    So: nd::DataMut<Elem = O>,
    D: nd::RemoveAxis,
{
    let ns = basis.ns();
    check_shapes(ns, v_in.shape(), v_out.shape())?;
    let mut elements: CooElements<A> = op(basis, opstr, indices, coupling)?;
    if transposed { elements = elements.transposed(); }
    if conjugated { elements = elements.conjugated(); }
    scatter_add(&elements, v_in, v_out, ns, basis.unique_matrix_elements())
}

/// Like [`inplace_op`], but allocating the output.
///
/// The output's numeric type is the [promotion][Promote] of the input's and
/// the coupling's.
pub fn apply_op<A, B, V, Si, D>(
    basis: &B,
    v_in: &nd::ArrayBase<Si, D>,
    opstr: &str,
    indices: &[usize],
    coupling: A,
    transposed: bool,
    conjugated: bool,
) -> OpResult<nd::Array<Promoted<V, A>, D>>
where
    A: Widen<C64> + Widen<Promoted<V, A>>,
    B: OperatorBasis + ?Sized,
    V: Promote<A> + Widen<Promoted<V, A>>,
    Si: nd::Data<Elem = V>,
    D: nd::RemoveAxis,
{
    let mut v_out: nd::Array<Promoted<V, A>, D> = nd::Array::zeros(v_in.raw_dim());
    inplace_op(
        basis, v_in, opstr, indices, coupling, transposed, conjugated, &mut v_out)?;
    Ok(v_out)
}

fn check_shapes(ns: usize, input: &[usize], output: &[usize]) -> OpResult<()> {
    let found = input.first().copied().unwrap_or(0);
    if found != ns {
        return Err(OpError::DimensionMismatch { expected: ns, found });
    }
    if input != output {
        return Err(OpError::ShapeMismatch {
            input: input.to_vec(),
            output: output.to_vec(),
        });
    }
    Ok(())
}

/// Scatter-accumulate coordinate data into `v_out`.
///
/// When rows may repeat, elements are applied in rounds: each round takes the
/// first pending element of every distinct row, so no row is written twice
/// within a round, and removes them from the pending set. Every element is
/// applied exactly once, and the loop ends because each round removes at least
/// one element.
pub(crate) fn scatter_add<A, V, O, Si, So, D>(
    elements: &CooElements<A>,
    v_in: &nd::ArrayBase<Si, D>,
    v_out: &mut nd::ArrayBase<So, D>,
    ns: usize,
    unique_rows: bool,
) -> OpResult<()>
where
    A: Widen<O>,
    V: Widen<O>,
    O: Scalar,
    Si: nd::Data<Elem = V>,
    So: nd::DataMut<Elem = O>,
    D: nd::RemoveAxis,
{
    if let Some((&row, &col))
        = elements.rows.iter().zip(elements.cols.iter())
        .find(|(row, col)| **row >= ns || **col >= ns)
    {
        return Err(OpError::ElementOutOfRange { row, col, ns });
    }

    let mut accumulate = |k: usize| {
        let a: O = elements.values[k].widen();
        let src = v_in.index_axis(Axis(0), elements.cols[k]);
        v_out.index_axis_mut(Axis(0), elements.rows[k])
            .zip_mut_with(&src, |o, v| { *o += a * (*v).widen(); });
    };

    if unique_rows {
        (0..elements.len()).for_each(&mut accumulate);
        return Ok(());
    }

    let mut pending: Vec<usize> = (0..elements.len()).collect();
    let mut seen: HashSet<usize> = HashSet::default();
    let mut rounds: usize = 0;
    while !pending.is_empty() {
        seen.clear();
        let (round, rest): (Vec<usize>, Vec<usize>)
            = pending.into_iter()
            .partition(|k| seen.insert(elements.rows[*k]));
        round.into_iter().for_each(&mut accumulate);
        pending = rest;
        rounds += 1;
    }
    log::debug!(
        "applied {} non-unique matrix elements in {} rounds",
        elements.len(),
        rounds,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::{ array, Array1, Array2 };
    use num_complex::Complex32 as C32;
    use proptest::prelude::*;
    use rand::{ Rng, SeedableRng, rngs::StdRng };
    use super::*;

    /// Basis returning fixed coordinate data scaled by the coupling.
    struct Fixed {
        ns: usize,
        elements: CooElements<C64>,
        unique: bool,
    }

    impl OperatorBasis for Fixed {
        fn ns(&self) -> usize { self.ns }

        fn unique_matrix_elements(&self) -> bool { self.unique }

        fn op_elements(&self, op: &OpString) -> OpResult<CooElements<C64>> {
            let mut elements = self.elements.clone();
            elements.values.mapv_inplace(|a| a * op.coupling);
            Ok(elements)
        }
    }

    fn coo(values: Vec<C64>, rows: Vec<usize>, cols: Vec<usize>)
        -> CooElements<C64>
    {
        CooElements::new(values.into(), rows.into(), cols.into()).unwrap()
    }

    fn dense(elements: &CooElements<C64>, ns: usize) -> Array2<C64> {
        let mut m: Array2<C64> = Array2::zeros((ns, ns));
        elements.values.iter()
            .zip(elements.rows.iter().zip(elements.cols.iter()))
            .for_each(|(a, (&i, &j))| { m[[i, j]] += *a; });
        m
    }

    #[test]
    fn duplicate_rows_all_contribute() {
        let basis = Fixed {
            ns: 4,
            elements: coo(
                vec![1.0.into(), 2.0.into(), 3.0.into()],
                vec![0, 0, 2],
                vec![1, 2, 3],
            ),
            unique: false,
        };
        let v: Array1<f64> = array![1.0, 10.0, 100.0, 1000.0];
        let w: Array1<f64>
            = apply_op(&basis, &v, "", &[], 1.0_f64, false, false).unwrap();
        assert_eq!(w, array![210.0, 0.0, 3000.0, 0.0]);
    }

    #[test]
    fn unique_rows_single_pass() {
        let basis = Fixed {
            ns: 3,
            elements: coo(
                vec![2.0.into(), 3.0.into()],
                vec![1, 0],
                vec![0, 2],
            ),
            unique: true,
        };
        let v: Array1<f64> = array![1.0, 2.0, 4.0];
        let mut w: Array1<f64> = array![1.0, 1.0, 1.0];
        inplace_op(&basis, &v, "", &[], 0.5_f64, false, false, &mut w).unwrap();
        assert_eq!(w, array![7.0, 2.0, 1.0]);
    }

    #[test]
    fn transpose_and_conjugate_give_adjoint() {
        let elements = coo(
            vec![C64::new(1.0, 2.0), C64::new(0.0, -1.0), C64::new(3.0, 0.5)],
            vec![0, 2, 2],
            vec![1, 1, 0],
        );
        let basis = Fixed { ns: 3, elements: elements.clone(), unique: false };
        let adjoint = Fixed { ns: 3, elements: elements.clone().adjoint(), unique: false };
        let mut rng = StdRng::seed_from_u64(10546);
        let v: Array2<C64>
            = Array2::from_shape_fn((3, 2), |_| C64::new(rng.gen(), rng.gen()));
        let j = C64::new(0.5, -1.5);
        let w_flags = apply_op(&basis, &v, "", &[], j, true, true).unwrap();
        let w_direct = apply_op(&adjoint, &v, "", &[], j.conj(), false, false).unwrap();
        w_flags.iter().zip(w_direct.iter())
            .for_each(|(a, b)| assert!((a - b).norm() < 1e-12));
        let expected = dense(&elements, 3).t().mapv(|a| a.conj()).dot(&v) * j.conj();
        w_flags.iter().zip(expected.iter())
            .for_each(|(a, b)| assert!((a - b).norm() < 1e-12));
    }

    #[test]
    fn output_type_is_promoted() {
        let basis = Fixed {
            ns: 2,
            elements: coo(vec![C64::from(1.5)], vec![1], vec![0]),
            unique: true,
        };
        let v: Array1<f32> = array![2.0, 0.0];
        let w: Array1<f64> = apply_op(&basis, &v, "", &[], 1.0_f64, false, false).unwrap();
        assert_eq!(w, array![0.0, 3.0]);
        let w: Array1<C32>
            = apply_op(&basis, &v, "", &[], C32::new(0.0, 1.0), false, false).unwrap();
        assert_eq!(w, array![C32::new(0.0, 0.0), C32::new(0.0, 3.0)]);
    }

    #[test]
    fn complex_elements_rejected_for_real_type() {
        let basis = Fixed {
            ns: 1,
            elements: coo(vec![C64::new(0.0, 1.0)], vec![0], vec![0]),
            unique: true,
        };
        let res = op(&basis, "", &[], 1.0_f64);
        assert!(matches!(res, Err(OpError::ComplexToReal(_))));
        assert!(op(&basis, "", &[], C64::from(1.0)).is_ok());
    }

    #[test]
    fn shape_errors_leave_output_untouched() {
        let basis = Fixed {
            ns: 3,
            elements: coo(vec![1.0.into()], vec![0], vec![0]),
            unique: true,
        };
        let v: Array1<f64> = array![1.0, 2.0];
        let res = apply_op(&basis, &v, "", &[], 1.0_f64, false, false);
        assert!(matches!(
            res,
            Err(OpError::DimensionMismatch { expected: 3, found: 2 })
        ));

        let v: Array2<f64> = Array2::ones((3, 2));
        let mut w: Array2<f64> = Array2::ones((3, 1));
        let res = inplace_op(&basis, &v, "", &[], 1.0_f64, false, false, &mut w);
        assert!(matches!(res, Err(OpError::ShapeMismatch { .. })));
        assert_eq!(w, Array2::ones((3, 1)));
    }

    #[test]
    fn out_of_range_elements_rejected_before_writing() {
        let basis = Fixed {
            ns: 2,
            elements: coo(vec![1.0.into(), 1.0.into()], vec![0, 5], vec![0, 0]),
            unique: false,
        };
        let v: Array1<f64> = array![1.0, 1.0];
        let mut w: Array1<f64> = Array1::zeros(2);
        let res = inplace_op(&basis, &v, "", &[], 1.0_f64, false, false, &mut w);
        assert!(matches!(res, Err(OpError::ElementOutOfRange { row: 5, .. })));
        assert_eq!(w, Array1::zeros(2));
    }

    #[test]
    fn mismatched_coordinate_lengths_rejected() {
        let res = CooElements::new(array![1.0], array![0, 1], array![0]);
        assert!(matches!(res, Err(OpError::CooLength)));
    }

    proptest! {
        #[test]
        fn scatter_matches_dense_product(
            entries in prop::collection::vec((0_usize..5, 0_usize..5, -4_i32..=4), 0..30),
            cols in prop::collection::vec(-3_i32..=3, 10),
        ) {
            let elements = coo(
                entries.iter().map(|(_, _, a)| C64::from(f64::from(*a))).collect(),
                entries.iter().map(|(r, _, _)| *r).collect(),
                entries.iter().map(|(_, c, _)| *c).collect(),
            );
            let basis = Fixed { ns: 5, elements: elements.clone(), unique: false };
            let v: Array2<C64>
                = Array2::from_shape_vec(
                    (5, 2),
                    cols.iter().map(|x| C64::from(f64::from(*x))).collect(),
                )
                .unwrap();
            let w = apply_op(&basis, &v, "", &[], C64::from(1.0), false, false).unwrap();
            prop_assert_eq!(w, dense(&elements, 5).dot(&v));
        }
    }
}
