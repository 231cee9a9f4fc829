//! Dummy board contents for demos and load testing.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;

use super::models::{Card, Category, Column, UserStamp};

/// Generate `count` cards spread randomly over columns and categories.
///
/// Ids are `dummy-<i>` and titles `Item <i+1>`, so reseeding the same count
/// overwrites the previous dummy set. Stamps rotate over five fake users.
pub fn dummy_cards<R: Rng + ?Sized>(count: usize, rng: &mut R, now: DateTime<Utc>) -> Vec<Card> {
    (0..count)
        .map(|i| {
            let column = *Column::ALL.choose(&mut *rng).unwrap_or(&Column::InStock);
            let category = *Category::ALL.choose(&mut *rng).unwrap_or(&Category::Kitchen);
            let user = UserStamp::new(
                format!("user{}", i % 5),
                format!("User {}", i % 5),
                format!("user{}@test.com", i % 5),
            );
            Card {
                id: format!("dummy-{}", i),
                title: format!("Item {}", i + 1),
                price: rng.gen_range(0..1000) as f64,
                category,
                column,
                created_by: user.clone(),
                last_modified_by: user,
                created_at: now,
                updated_at: now,
            }
        })
        .collect()
}
