//! Index types local to the frame graph's internal arenas (resource nodes
//! and render-pass attachment records). Pass and virtual-resource indices
//! are shared with the rest of the core via `ember_core::ids`.

use std::fmt;

macro_rules! index_type {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub(crate) struct $name(u32);

        impl $name {
            #[inline]
            pub(crate) const fn as_usize(self) -> usize {
                self.0 as usize
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

index_type!(ResourceNodeIdx);
