use num_traits::{One, PrimInt};

/// Trait implemented by flag enums.
///
/// The enum's discriminant (via `#[repr(u8)]`) is the bit index and
/// `Storage` picks the backing integer.
pub trait FlagBitmask {
    type Storage: PrimInt;

    fn bit_index(&self) -> u8;

    fn mask(&self) -> Self::Storage {
        // NOTE: `bit_index()` must be < number of bits in `Storage`.
        Self::Storage::one() << (self.bit_index() as usize)
    }
}

/// A small bitmask container keyed by a [`FlagBitmask`] enum.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitmaskFlags<T: PrimInt> {
    pub bits: T,
}

impl<T: PrimInt> BitmaskFlags<T> {
    pub fn new(bits: T) -> Self {
        Self { bits }
    }

    pub fn from_tags<U: FlagBitmask<Storage = T> + Copy>(tags: &[U]) -> Self {
        let mut flags = Self::new(T::zero());
        flags.add_many(tags);
        flags
    }

    pub fn add<U: FlagBitmask<Storage = T>>(&mut self, tag: U) {
        self.bits = self.bits | tag.mask();
    }

    pub fn remove<U: FlagBitmask<Storage = T>>(&mut self, tag: U) {
        self.bits = self.bits & !tag.mask();
    }

    pub fn has<U: FlagBitmask<Storage = T>>(&self, tag: U) -> bool {
        (self.bits & tag.mask()) != T::zero()
    }

    pub fn add_many<U: FlagBitmask<Storage = T> + Copy>(&mut self, tags: &[U]) {
        for &tag in tags {
            self.add(tag);
        }
    }

    pub fn has_any<U: FlagBitmask<Storage = T> + Copy>(&self, tags: &[U]) -> bool {
        let combined = tags.iter().fold(T::zero(), |acc, t| acc | t.mask());
        (self.bits & combined) != T::zero()
    }

    pub fn is_empty(&self) -> bool {
        self.bits == T::zero()
    }
}

/// Declare a bitmask-backed enum and implement `FlagBitmask` for it.
#[macro_export]
macro_rules! define_bitmask_flags {
    ($(#[$meta:meta])* $name:ident, $storage:ty, { $($(#[$vmeta:meta])* $variant:ident),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant),*
        }

        impl $crate::flags::FlagBitmask for $name {
            type Storage = $storage;

            fn bit_index(&self) -> u8 {
                *self as u8
            }
        }
    };
}

define_bitmask_flags!(
    /// Tags a level author can put on a collider.
    SurfaceTag, u8, {
        /// Floor movement never bounces off this surface.
        NoFloorBounce,
        /// Bouncing off this surface notifies the owner so it can push the surface back.
        ApplyForce,
        /// The body may not step up onto this surface; it slides instead.
        NoStepUp,
    }
);

pub type SurfaceFlags = BitmaskFlags<u8>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_map_to_distinct_bits() {
        assert_eq!(SurfaceTag::NoFloorBounce.mask(), 0b001);
        assert_eq!(SurfaceTag::ApplyForce.mask(), 0b010);
        assert_eq!(SurfaceTag::NoStepUp.mask(), 0b100);
    }

    #[test]
    fn add_remove_and_query() {
        let mut flags = SurfaceFlags::default();
        assert!(flags.is_empty());

        flags.add(SurfaceTag::ApplyForce);
        assert!(flags.has(SurfaceTag::ApplyForce));
        assert!(!flags.has(SurfaceTag::NoStepUp));
        assert!(flags.has_any(&[SurfaceTag::NoStepUp, SurfaceTag::ApplyForce]));

        flags.remove(SurfaceTag::ApplyForce);
        assert!(flags.is_empty());
    }

    #[test]
    fn from_tags_combines_all() {
        let flags = SurfaceFlags::from_tags(&[SurfaceTag::NoFloorBounce, SurfaceTag::NoStepUp]);
        assert_eq!(flags.bits, 0b101);
    }
}
