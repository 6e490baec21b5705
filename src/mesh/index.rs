//! Typed arena indices for mesh elements.
//!
//! Every cross reference inside a [`HalfEdgeMesh`](super::HalfEdgeMesh) is one of
//! these wrappers around an unsigned integer. The integer width is chosen by the
//! [`MeshIndex`] parameter (`u16`, `u32` or `u64`); the all-ones value of the
//! width is reserved as the "none" sentinel, which is how a missing twin at a
//! mesh boundary is represented.

use std::fmt::{self, Debug};
use std::hash::Hash;

/// Unsigned integer type usable as a mesh index.
pub trait MeshIndex:
    Copy + Clone + Eq + PartialEq + Ord + PartialOrd + Hash + Debug + Send + Sync + 'static
{
    /// The largest index that can address an element.
    const MAX: Self;

    /// Sentinel meaning "no element".
    const INVALID: Self;

    /// Convert from `usize`.
    ///
    /// # Panics
    /// Panics in debug builds if the value does not fit.
    fn from_usize(v: usize) -> Self;

    /// Convert to `usize`.
    fn to_usize(self) -> usize;

    /// Check that this is not the sentinel.
    fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

macro_rules! impl_mesh_index {
    ($($ty:ty),*) => {
        $(
            impl MeshIndex for $ty {
                const MAX: Self = <$ty>::MAX - 1;
                const INVALID: Self = <$ty>::MAX;

                #[inline]
                fn from_usize(v: usize) -> Self {
                    debug_assert!(
                        v as u128 <= Self::MAX as u128,
                        "index {} too large for {}",
                        v,
                        stringify!($ty)
                    );
                    v as $ty
                }

                #[inline]
                fn to_usize(self) -> usize {
                    self as usize
                }
            }
        )*
    };
}

impl_mesh_index!(u16, u32, u64);

/// Index of a vertex.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct VertexId<I: MeshIndex = u32>(I);

/// Index of a half-edge.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct HalfEdgeId<I: MeshIndex = u32>(I);

/// Index of a triangle.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct FaceId<I: MeshIndex = u32>(I);

/// Index of an undirected edge.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct EdgeId<I: MeshIndex = u32>(I);

macro_rules! impl_index_type {
    ($name:ident, $display:literal) => {
        impl<I: MeshIndex> $name<I> {
            /// Wrap a raw arena position.
            #[inline]
            pub fn new(index: usize) -> Self {
                Self(I::from_usize(index))
            }

            /// The "none" sentinel.
            #[inline]
            pub fn invalid() -> Self {
                Self(I::INVALID)
            }

            /// Arena position.
            #[inline]
            pub fn index(self) -> usize {
                self.0.to_usize()
            }

            /// Whether this refers to an element.
            #[inline]
            pub fn is_valid(self) -> bool {
                self.0.is_valid()
            }

            /// `Some(self)` unless this is the sentinel.
            #[inline]
            pub fn valid(self) -> Option<Self> {
                if self.is_valid() {
                    Some(self)
                } else {
                    None
                }
            }
        }

        impl<I: MeshIndex> Debug for $name<I> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", $display, self.index())
                } else {
                    write!(f, "{}(none)", $display)
                }
            }
        }

        impl<I: MeshIndex> Default for $name<I> {
            fn default() -> Self {
                Self::invalid()
            }
        }

        impl<I: MeshIndex> From<usize> for $name<I> {
            fn from(v: usize) -> Self {
                Self::new(v)
            }
        }
    };
}

impl_index_type!(VertexId, "V");
impl_index_type!(HalfEdgeId, "HE");
impl_index_type!(FaceId, "F");
impl_index_type!(EdgeId, "E");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_not_valid() {
        let he: HalfEdgeId = HalfEdgeId::invalid();
        assert!(!he.is_valid());
        assert_eq!(he.valid(), None);
        assert_eq!(HalfEdgeId::<u32>::default(), he);
    }

    #[test]
    fn test_round_trip_widths() {
        let v16: VertexId<u16> = VertexId::new(1000);
        let v64: VertexId<u64> = VertexId::new(1 << 40);
        assert_eq!(v16.index(), 1000);
        assert_eq!(v64.index(), 1 << 40);
    }

    #[test]
    fn test_debug_format() {
        let e: EdgeId = EdgeId::new(7);
        assert_eq!(format!("{:?}", e), "E(7)");
        assert_eq!(format!("{:?}", FaceId::<u32>::invalid()), "F(none)");
    }

    #[test]
    fn test_ordering_follows_index() {
        let a: VertexId = VertexId::new(3);
        let b: VertexId = VertexId::new(5);
        assert!(a < b);
    }
}
