use std::collections::BTreeSet;

/// Transient multi-select state used while preparing a transfer. Never
/// persisted; cleared when the transfer completes or the selection is
/// cancelled.
#[derive(Debug, Default)]
pub struct SelectionBasket {
    selected: BTreeSet<String>,
}

impl SelectionBasket {
    /// Idempotent set/unset of one record's selection flag.
    pub fn toggle(&mut self, id: &str, selected: bool) {
        if selected {
            self.selected.insert(id.to_string());
        } else {
            self.selected.remove(id);
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }
}
