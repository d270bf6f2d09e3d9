//! Reordering of sorted lists, e.g. images of a product or values of an
//! attribute.

use crate::model::Key;


/// A request to move `key` by `shift` positions. Negative values move the
/// item towards the front.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Move {
    pub(crate) key: Key,
    pub(crate) shift: i32,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReorderError {
    UnknownKey(Key),
}

/// Applies `moves` one after another to `items` (which are in the current
/// order). Moves past either end stop at that end.
pub(crate) fn apply_moves(mut items: Vec<Key>, moves: &[Move]) -> Result<Vec<Key>, ReorderError> {
    for m in moves {
        let from = items.iter()
            .position(|&k| k == m.key)
            .ok_or(ReorderError::UnknownKey(m.key))?;
        let to = (from as i64 + m.shift as i64).clamp(0, items.len() as i64 - 1) as usize;
        let item = items.remove(from);
        items.insert(to, item);
    }

    Ok(items)
}

/// Puts the items listed in `new_order` first, in that order, followed by
/// all remaining items in their current order.
pub(crate) fn put_first(items: Vec<Key>, new_order: &[Key]) -> Result<Vec<Key>, ReorderError> {
    if let Some(&unknown) = new_order.iter().find(|k| !items.contains(k)) {
        return Err(ReorderError::UnknownKey(unknown));
    }

    let mut out = Vec::with_capacity(items.len());
    for &k in new_order {
        if !out.contains(&k) {
            out.push(k);
        }
    }
    out.extend(items.into_iter().filter(|k| !new_order.contains(k)));
    Ok(out)
}


#[cfg(test)]
mod tests {
    use crate::model::Key;
    use super::{apply_moves, put_first, Move, ReorderError};

    fn keys(ns: &[u64]) -> Vec<Key> {
        ns.iter().map(|&n| Key(n)).collect()
    }

    #[test]
    fn single_moves() {
        let items = keys(&[1, 2, 3, 4]);
        let mv = |k, shift| [Move { key: Key(k), shift }];

        assert_eq!(apply_moves(items.clone(), &mv(1, 2)), Ok(keys(&[2, 3, 1, 4])));
        assert_eq!(apply_moves(items.clone(), &mv(4, -1)), Ok(keys(&[1, 2, 4, 3])));
        assert_eq!(apply_moves(items.clone(), &mv(2, 0)), Ok(items.clone()));
        assert_eq!(apply_moves(items.clone(), &mv(2, 100)), Ok(keys(&[1, 3, 4, 2])));
        assert_eq!(apply_moves(items.clone(), &mv(3, -100)), Ok(keys(&[3, 1, 2, 4])));
    }

    #[test]
    fn moves_apply_in_sequence() {
        let moves = [
            Move { key: Key(1), shift: 3 },
            Move { key: Key(4), shift: -3 },
        ];
        assert_eq!(apply_moves(keys(&[1, 2, 3, 4]), &moves), Ok(keys(&[4, 2, 3, 1])));
    }

    #[test]
    fn unknown_key() {
        let moves = [Move { key: Key(9), shift: 1 }];
        assert_eq!(apply_moves(keys(&[1]), &moves), Err(ReorderError::UnknownKey(Key(9))));
        assert_eq!(put_first(keys(&[1, 2]), &keys(&[3])), Err(ReorderError::UnknownKey(Key(3))));
    }

    #[test]
    fn explicit_order() {
        assert_eq!(put_first(keys(&[1, 2, 3, 4]), &keys(&[3, 1])), Ok(keys(&[3, 1, 2, 4])));
        assert_eq!(put_first(keys(&[1, 2]), &keys(&[2, 2])), Ok(keys(&[2, 1])));
        assert_eq!(put_first(keys(&[1, 2]), &[]), Ok(keys(&[1, 2])));
    }
}
