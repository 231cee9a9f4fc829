//! In-memory card collection for one board session.
//!
//! Cards are held as one ordered sequence per lifecycle column. The order
//! within a column is what the user sees and is preserved by every
//! operation; the order *between* columns carries no meaning and is fixed to
//! [`Column::ALL`] when the registry is flattened for persistence.

use std::collections::HashSet;

use tracing::warn;

use super::models::{Card, Category, Column};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardRegistry {
    columns: [Vec<Card>; 4],
}

impl CardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cards(cards: Vec<Card>) -> Self {
        let mut registry = Self::new();
        registry.load(cards);
        registry
    }

    /// Replace the whole collection. Cards are grouped by column, keeping
    /// their relative order. Duplicate ids are kept as-is.
    pub fn load(&mut self, cards: Vec<Card>) {
        let mut seen = HashSet::with_capacity(cards.len());
        let mut columns: [Vec<Card>; 4] = Default::default();
        for card in cards {
            if !seen.insert(card.id.clone()) {
                warn!(card_id = %card.id, "duplicate card id in loaded board");
            }
            columns[card.column.index()].push(card);
        }
        self.columns = columns;
    }

    /// Flatten to the persisted list: columns in board order, each in its own order.
    pub fn snapshot(&self) -> Vec<Card> {
        self.columns.iter().flatten().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Vec::is_empty)
    }

    /// All cards of one column, in order.
    pub fn column(&self, column: Column) -> &[Card] {
        &self.columns[column.index()]
    }

    pub fn get(&self, id: &str) -> Option<&Card> {
        self.columns.iter().flatten().find(|c| c.id == id)
    }

    /// Column and index of the first card with `id`.
    pub fn locate(&self, id: &str) -> Option<(Column, usize)> {
        Column::ALL.into_iter().find_map(|col| {
            self.columns[col.index()]
                .iter()
                .position(|c| c.id == id)
                .map(|idx| (col, idx))
        })
    }

    /// Cards shown in `column` for the current filter.
    ///
    /// With an empty search term only cards of `category` are shown. A
    /// non-empty term matches titles case-insensitively across every
    /// category of the column.
    pub fn filtered_view(&self, column: Column, category: Category, search: &str) -> Vec<&Card> {
        let needle = search.trim().to_lowercase();
        self.column(column)
            .iter()
            .filter(|card| {
                if needle.is_empty() {
                    card.category == category
                } else {
                    card.title.to_lowercase().contains(&needle)
                }
            })
            .collect()
    }

    /// Header count: visible cards of the column that belong to `category`.
    pub fn category_count(&self, column: Column, category: Category, search: &str) -> usize {
        self.filtered_view(column, category, search)
            .into_iter()
            .filter(|c| c.category == category)
            .count()
    }

    pub(crate) fn push(&mut self, card: Card) {
        self.columns[card.column.index()].push(card);
    }

    pub(crate) fn insert(&mut self, column: Column, index: usize, card: Card) {
        let lane = &mut self.columns[column.index()];
        let index = index.min(lane.len());
        lane.insert(index, card);
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Card> {
        let (column, idx) = self.locate(id)?;
        Some(self.columns[column.index()].remove(idx))
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.columns.iter_mut().flatten().find(|c| c.id == id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::board::models::UserStamp;
    use chrono::{TimeZone, Utc};

    pub(crate) fn card(id: &str, title: &str, column: Column, category: Category) -> Card {
        let user = UserStamp::new("seed", "Seed", "seed@example.com");
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Card {
            id: id.to_string(),
            title: title.to_string(),
            price: 1.0,
            category,
            column,
            created_by: user.clone(),
            last_modified_by: user,
            created_at: ts,
            updated_at: ts,
        }
    }

    fn ids(cards: &[&Card]) -> Vec<String> {
        cards.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_load_groups_by_column_preserving_order() {
        let registry = CardRegistry::from_cards(vec![
            card("1", "Milk", Column::InStock, Category::Kitchen),
            card("2", "Rum", Column::RunningLow, Category::Bar),
            card("3", "Sugar", Column::InStock, Category::Kitchen),
            card("4", "Gin", Column::RunningLow, Category::Bar),
        ]);
        assert_eq!(registry.len(), 4);
        let in_stock: Vec<_> = registry.column(Column::InStock).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(in_stock, vec!["1", "3"]);
        let low: Vec<_> = registry.column(Column::RunningLow).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(low, vec!["2", "4"]);

        let flat: Vec<_> = registry.snapshot().into_iter().map(|c| c.id).collect();
        assert_eq!(flat, vec!["1", "3", "2", "4"]);
    }

    #[test]
    fn test_load_replaces_previous_contents() {
        let mut registry = CardRegistry::from_cards(vec![card("1", "Milk", Column::InStock, Category::Kitchen)]);
        registry.load(vec![card("9", "Ice", Column::Restocked, Category::Bar)]);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("1").is_none());
        assert_eq!(registry.locate("9"), Some((Column::Restocked, 0)));
    }

    #[test]
    fn test_load_keeps_duplicates() {
        let registry = CardRegistry::from_cards(vec![
            card("1", "Milk", Column::InStock, Category::Kitchen),
            card("1", "Milk again", Column::InStock, Category::Kitchen),
        ]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("1").unwrap().title, "Milk");
    }

    #[test]
    fn test_filtered_view_without_search_scopes_to_category() {
        let registry = CardRegistry::from_cards(vec![
            card("1", "Milk", Column::InStock, Category::Kitchen),
            card("2", "Milk stout", Column::InStock, Category::Bar),
            card("3", "Eggs", Column::InStock, Category::Kitchen),
            card("4", "Butter", Column::RunningLow, Category::Kitchen),
        ]);
        let view = registry.filtered_view(Column::InStock, Category::Kitchen, "");
        assert_eq!(ids(&view), vec!["1", "3"]);
    }

    #[test]
    fn test_filtered_view_with_search_spans_categories() {
        let registry = CardRegistry::from_cards(vec![
            card("1", "Milk", Column::InStock, Category::Kitchen),
            card("2", "Milk stout", Column::InStock, Category::Bar),
            card("3", "Eggs", Column::InStock, Category::Kitchen),
            card("4", "Oat MILK", Column::RunningLow, Category::Counter),
        ]);
        let view = registry.filtered_view(Column::InStock, Category::Bakery, "mIlK");
        assert_eq!(ids(&view), vec!["1", "2"]);
        let view = registry.filtered_view(Column::RunningLow, Category::Kitchen, "milk");
        assert_eq!(ids(&view), vec!["4"]);
    }

    #[test]
    fn test_category_count_counts_selected_category_only() {
        let registry = CardRegistry::from_cards(vec![
            card("1", "Milk", Column::InStock, Category::Kitchen),
            card("2", "Milk stout", Column::InStock, Category::Bar),
        ]);
        assert_eq!(registry.category_count(Column::InStock, Category::Kitchen, "milk"), 1);
        assert_eq!(registry.category_count(Column::InStock, Category::Bar, ""), 1);
        assert_eq!(registry.category_count(Column::OutOfStock, Category::Bar, ""), 0);
    }

    #[test]
    fn test_remove_and_insert_clamp_index() {
        let mut registry = CardRegistry::from_cards(vec![
            card("1", "Milk", Column::InStock, Category::Kitchen),
            card("2", "Eggs", Column::InStock, Category::Kitchen),
        ]);
        let removed = registry.remove("1").unwrap();
        assert_eq!(registry.len(), 1);
        registry.insert(Column::InStock, 99, removed);
        let order: Vec<_> = registry.column(Column::InStock).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["2", "1"]);
        assert!(registry.remove("missing").is_none());
    }
}
