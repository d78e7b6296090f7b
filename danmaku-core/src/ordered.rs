//! Binary search and binary insert over comparator-sorted sequences

use crate::{Error, Result};
use std::cmp::Ordering;

/// Finds the insertion index of a probe in a sorted slice.
///
/// `rank(item)` returns the ordering of the probe relative to `item`. The
/// returned index is the upper bound: it comes after every item the probe
/// compares greater than or equal to, so equal items keep insertion order.
///
/// Returns [`Error::InconsistentOrdering`] when a probe lands between two
/// neighbours that are out of order, which means the slice is not sorted
/// under the comparator the caller is using.
pub fn bsearch<T, F>(items: &[T], mut rank: F) -> Result<usize>
where
    F: FnMut(&T) -> Ordering,
{
    let (Some(first), Some(last)) = (items.first(), items.last()) else {
        return Ok(0);
    };
    if rank(first) == Ordering::Less {
        return Ok(0);
    }
    if rank(last) != Ordering::Less {
        return Ok(items.len());
    }

    let mut low = 0usize;
    let mut high = items.len() - 1;
    while low <= high {
        let i = (low + high + 1) / 2;
        if i == 0 {
            break;
        }
        let at_or_after_prev = rank(&items[i - 1]) != Ordering::Less;
        let at_or_after_this = rank(&items[i]) != Ordering::Less;
        match (at_or_after_prev, at_or_after_this) {
            (true, false) => return Ok(i),
            (false, true) => return Err(Error::InconsistentOrdering { index: i }),
            (false, false) => high = i - 1,
            (true, true) => {
                if low == i {
                    break;
                }
                low = i;
            }
        }
    }

    Err(Error::InconsistentOrdering { index: low })
}

/// Inserts `item` into a sorted vector, after any items comparing equal.
///
/// Returns the index the item was inserted at.
pub fn binsert<T, F>(items: &mut Vec<T>, item: T, mut cmp: F) -> Result<usize>
where
    F: FnMut(&T, &T) -> Ordering,
{
    let index = bsearch(items, |existing| cmp(&item, existing))?;
    items.insert(index, item);
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bsearch_empty() {
        let items: Vec<i32> = Vec::new();
        assert_eq!(bsearch(&items, |x| 5.cmp(x)).unwrap(), 0);
    }

    #[test]
    fn test_bsearch_bounds() {
        let items = vec![1, 3, 5, 7];
        assert_eq!(bsearch(&items, |x| 0.cmp(x)).unwrap(), 0);
        assert_eq!(bsearch(&items, |x| 9.cmp(x)).unwrap(), 4);
        assert_eq!(bsearch(&items, |x| 4.cmp(x)).unwrap(), 2);
        assert_eq!(bsearch(&items, |x| 2.cmp(x)).unwrap(), 1);
        assert_eq!(bsearch(&items, |x| 6.cmp(x)).unwrap(), 3);
    }

    #[test]
    fn test_bsearch_places_after_equal_items() {
        let items = vec![1, 2, 2, 2, 3];
        assert_eq!(bsearch(&items, |x| 2.cmp(x)).unwrap(), 4);
        assert_eq!(bsearch(&items, |x| 1.cmp(x)).unwrap(), 1);
    }

    #[test]
    fn test_binsert_keeps_order() {
        let mut items = Vec::new();
        for value in [5, 1, 4, 1, 9, 2, 6, 5, 3] {
            binsert(&mut items, value, |a: &i32, b: &i32| a.cmp(b)).unwrap();
            assert!(items.windows(2).all(|w| w[0] <= w[1]));
        }
        assert_eq!(items, vec![1, 1, 2, 3, 4, 5, 5, 6, 9]);
    }

    #[test]
    fn test_binsert_is_stable_for_ties() {
        let mut items: Vec<(i32, char)> = Vec::new();
        for entry in [(1, 'a'), (2, 'b'), (1, 'c'), (2, 'd'), (1, 'e')] {
            binsert(&mut items, entry, |a, b| a.0.cmp(&b.0)).unwrap();
        }
        let labels: String = items.iter().map(|(_, c)| *c).collect();
        assert_eq!(labels, "acebd");
    }

    #[test]
    fn test_bsearch_detects_unsorted_input() {
        let items = vec![1, 8, 2, 9];
        let err = bsearch(&items, |x| 5.cmp(x)).unwrap_err();
        assert!(matches!(err, Error::InconsistentOrdering { index: 2 }));
    }
}
