//! Back/forward browsing history.

use entities::ArticleId;

/// Linear browsing history with a cursor.
///
/// Visiting a new article after going back drops the forward entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowsingHistory {
    entries: Vec<ArticleId>,
    cursor: Option<usize>,
}

impl BrowsingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a visit. Revisiting the current entry is a no-op.
    pub fn visit(&mut self, id: ArticleId) {
        if self.current() == Some(id) {
            return;
        }
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);
        self.entries.push(id);
        self.cursor = Some(self.entries.len() - 1);
    }

    pub fn current(&self) -> Option<ArticleId> {
        self.cursor.and_then(|c| self.entries.get(c).copied())
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.entries.len())
    }

    /// Moves the cursor back and returns the entry there.
    pub fn back(&mut self) -> Option<ArticleId> {
        if !self.can_go_back() {
            return None;
        }
        self.cursor = self.cursor.map(|c| c - 1);
        self.current()
    }

    /// Moves the cursor forward and returns the entry there.
    pub fn forward(&mut self) -> Option<ArticleId> {
        if !self.can_go_forward() {
            return None;
        }
        self.cursor = self.cursor.map(|c| c + 1);
        self.current()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_and_forward() {
        let mut history = BrowsingHistory::new();
        assert!(!history.can_go_back());
        history.visit(1);
        history.visit(2);
        history.visit(3);

        assert_eq!(history.back(), Some(2));
        assert_eq!(history.back(), Some(1));
        assert_eq!(history.back(), None);
        assert_eq!(history.forward(), Some(2));
        assert!(history.can_go_forward());
    }

    #[test]
    fn test_visit_after_back_drops_forward_entries() {
        let mut history = BrowsingHistory::new();
        history.visit(1);
        history.visit(2);
        history.visit(3);
        history.back();
        history.back();

        history.visit(4);
        assert_eq!(history.len(), 2);
        assert!(!history.can_go_forward());
        assert_eq!(history.back(), Some(1));
    }

    #[test]
    fn test_revisiting_current_does_not_push() {
        let mut history = BrowsingHistory::new();
        history.visit(1);
        history.visit(1);
        assert_eq!(history.len(), 1);
    }
}
