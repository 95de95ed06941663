//! Epoch usability mask

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// [EpochMask] marks, for one receiver, which epochs of the
/// [TimeAxis](crate::time_axis::TimeAxis) carry valid, unflagged data.
/// Epochs can only be disabled: a disabled epoch never comes back.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EpochMask {
    usable: Vec<bool>,
}

impl EpochMask {
    /// Creates a new [EpochMask] with all `size` epochs enabled
    pub fn new(size: usize) -> Self {
        Self {
            usable: vec![true; size],
        }
    }

    /// Number of epochs covered
    pub fn len(&self) -> usize {
        self.usable.len()
    }

    /// True if this mask does not cover any epoch
    pub fn is_empty(&self) -> bool {
        self.usable.is_empty()
    }

    /// True if epoch `i` is enabled. Out of range epochs are not usable.
    pub fn is_usable(&self, i: usize) -> bool {
        self.usable.get(i).copied().unwrap_or(false)
    }

    /// Disables epoch `i`. Returns true if it was previously enabled.
    pub fn disable(&mut self, i: usize) -> bool {
        match self.usable.get_mut(i) {
            Some(usable) if *usable => {
                *usable = false;
                true
            },
            _ => false,
        }
    }

    /// Disables all epochs
    pub fn disable_all(&mut self) {
        self.usable.iter_mut().for_each(|u| *u = false);
    }

    /// Number of enabled epochs
    pub fn count_usable(&self) -> usize {
        self.usable.iter().filter(|u| **u).count()
    }

    /// Iterates the indexes of enabled epochs
    pub fn usable_epochs(&self) -> impl Iterator<Item = usize> + '_ {
        self.usable
            .iter()
            .enumerate()
            .filter_map(|(i, u)| if *u { Some(i) } else { None })
    }
}

#[cfg(test)]
mod test {
    use super::EpochMask;

    #[test]
    fn epoch_mask() {
        let mut mask = EpochMask::new(5);
        assert_eq!(mask.count_usable(), 5);
        assert!(mask.disable(2));
        assert!(!mask.disable(2));
        assert!(!mask.disable(10));
        assert!(!mask.is_usable(2));
        assert!(!mask.is_usable(10));
        assert_eq!(mask.usable_epochs().collect::<Vec<_>>(), vec![0, 1, 3, 4]);

        mask.disable_all();
        assert_eq!(mask.count_usable(), 0);
        assert_eq!(mask.len(), 5);
    }
}
