//! Numeric element types usable for state vectors and matrix elements.
//!
//! Four types are supported: `f32`, `f64`, `Complex32`, and `Complex64`.
//! Mixing two of them in a single operator application produces the narrowest
//! type that holds both without loss of precision, following [`Promote`].

use std::{ fmt::Debug, ops::{ AddAssign, Mul } };
use num_complex::{ Complex32 as C32, Complex64 as C64 };
use num_traits::Zero;

/// An element type for vectors and matrix elements.
pub trait Scalar:
    Copy + Debug + PartialEq + Zero + AddAssign + Mul<Output = Self> + 'static
{
    /// Return the complex conjugate; real types are returned unchanged.
    fn conj(self) -> Self;

    /// Convert from a double-precision complex number.
    ///
    /// Returns `None` if `self` is a real type and `z` has nonzero imaginary
    /// part.
    fn from_c64(z: C64) -> Option<Self>;
}

impl Scalar for f32 {
    fn conj(self) -> Self { self }

    fn from_c64(z: C64) -> Option<Self> {
        (z.im == 0.0).then_some(z.re as f32)
    }
}

impl Scalar for f64 {
    fn conj(self) -> Self { self }

    fn from_c64(z: C64) -> Option<Self> { (z.im == 0.0).then_some(z.re) }
}

impl Scalar for C32 {
    fn conj(self) -> Self { C32::conj(&self) }

    fn from_c64(z: C64) -> Option<Self> {
        Some(C32::new(z.re as f32, z.im as f32))
    }
}

impl Scalar for C64 {
    fn conj(self) -> Self { C64::conj(&self) }

    fn from_c64(z: C64) -> Option<Self> { Some(z) }
}

/// Lossless conversion into a wider (or identical) [`Scalar`].
pub trait Widen<T>: Scalar
where T: Scalar
{
    fn widen(self) -> T;
}

macro_rules! impl_widen {
    ( $from:ty => $to:ty, |$x:ident| $body:expr ) => {
        impl Widen<$to> for $from {
            fn widen(self) -> $to {
                let $x = self;
                $body
            }
        }
    }
}

impl_widen!(f32 => f32, |x| x);
impl_widen!(f32 => f64, |x| f64::from(x));
impl_widen!(f32 => C32, |x| C32::new(x, 0.0));
impl_widen!(f32 => C64, |x| C64::new(f64::from(x), 0.0));
impl_widen!(f64 => f64, |x| x);
impl_widen!(f64 => C64, |x| C64::new(x, 0.0));
impl_widen!(C32 => C32, |x| x);
impl_widen!(C32 => C64, |x| C64::new(f64::from(x.re), f64::from(x.im)));
impl_widen!(C64 => C64, |x| x);

/// Result type of combining `Self` with `Rhs`.
pub trait Promote<Rhs>: Scalar
where Rhs: Scalar
{
    type Output: Scalar;
}

/// Shorthand for the promoted type of `V` and `A`.
pub type Promoted<V, A> = <V as Promote<A>>::Output;

macro_rules! impl_promote {
    ( $( $lhs:ty, $rhs:ty => $out:ty );* $(;)? ) => {
        $(
            impl Promote<$rhs> for $lhs {
                type Output = $out;
            }
        )*
    }
}

impl_promote!(
    f32, f32 => f32;
    f32, f64 => f64;
    f32, C32 => C32;
    f32, C64 => C64;
    f64, f32 => f64;
    f64, f64 => f64;
    f64, C32 => C64;
    f64, C64 => C64;
    C32, f32 => C32;
    C32, f64 => C64;
    C32, C32 => C32;
    C32, C64 => C64;
    C64, f32 => C64;
    C64, f64 => C64;
    C64, C32 => C64;
    C64, C64 => C64;
);

#[cfg(test)]
mod tests {
    use super::*;

    fn promoted_zero<V, A>() -> Promoted<V, A>
    where
        V: Promote<A>,
        A: Scalar,
    {
        Promoted::<V, A>::zero()
    }

    #[test]
    fn real_types_reject_complex_elements() {
        assert_eq!(f64::from_c64(C64::new(2.5, 0.0)), Some(2.5));
        assert_eq!(f64::from_c64(C64::new(2.5, 1.0)), None);
        assert_eq!(f32::from_c64(C64::new(0.0, -1.0)), None);
        assert_eq!(C32::from_c64(C64::new(1.0, -1.0)), Some(C32::new(1.0, -1.0)));
    }

    #[test]
    fn promotion_is_numpy_like() {
        let a: f64 = promoted_zero::<f32, f64>();
        let b: C64 = promoted_zero::<f64, C32>();
        let c: C32 = promoted_zero::<C32, f32>();
        assert_eq!(a, 0.0);
        assert_eq!(b, C64::zero());
        assert_eq!(c, C32::zero());
        let w: C64 = C32::new(0.5, -0.25).widen();
        assert_eq!(w, C64::new(0.5, -0.25));
    }
}
