use shared::domain::ListItem;

/// Moves the element at `from` to index `to`, shifting the items in between
/// one slot toward the vacated position.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from == to || from >= items.len() || to >= items.len() {
        return;
    }
    let moved = items.remove(from);
    items.insert(to, moved);
}

/// Rewrites every `sort_order` to its index.
pub fn renumber(items: &mut [ListItem]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.sort_order = index as u32;
    }
}

/// True when `sort_order` values are exactly `0..n` in display order.
pub fn is_dense(items: &[ListItem]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.sort_order as usize == index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_forward_shifts_intermediate_items_back() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        move_item(&mut items, 0, 2);
        assert_eq!(items, vec!['b', 'c', 'a', 'd']);
    }

    #[test]
    fn move_backward_shifts_intermediate_items_forward() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        move_item(&mut items, 3, 1);
        assert_eq!(items, vec!['a', 'd', 'b', 'c']);
    }

    #[test]
    fn move_is_not_a_swap() {
        let mut items = vec!['a', 'b', 'c'];
        move_item(&mut items, 0, 2);
        assert_ne!(items, vec!['c', 'b', 'a']);
    }

    #[test]
    fn out_of_range_move_leaves_items_alone() {
        let mut items = vec!['a', 'b'];
        move_item(&mut items, 0, 5);
        assert_eq!(items, vec!['a', 'b']);
    }
}
