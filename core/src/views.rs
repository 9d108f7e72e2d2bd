// tidemark/src/views.rs

//! Pure, synchronous derived views over a container's items.

use crate::entity::Entity;
use uuid::Uuid;

pub fn find_by_id<E: Entity>(items: &[E], id: Uuid) -> Option<&E> {
  items.iter().find(|e| e.id() == id)
}

/// Case-insensitive substring match on the text `field` extracts. An empty
/// (or all-whitespace) needle matches everything.
pub fn search<'a, T, F>(items: &'a [T], needle: &str, field: F) -> Vec<&'a T>
where
  F: Fn(&T) -> &str,
{
  let needle = needle.trim().to_lowercase();
  if needle.is_empty() {
    return items.iter().collect();
  }
  items
    .iter()
    .filter(|item| field(item).to_lowercase().contains(&needle))
    .collect()
}

/// Items whose foreign key equals `key`. `None` selects the items with no key set.
pub fn filter_by_key<'a, T, F>(items: &'a [T], key: Option<Uuid>, field: F) -> Vec<&'a T>
where
  F: Fn(&T) -> Option<Uuid>,
{
  items.iter().filter(|item| field(item) == key).collect()
}

/// Inclusive range filter; either bound may be left open.
pub fn filter_by_range<'a, T, V, F>(items: &'a [T], min: Option<V>, max: Option<V>, field: F) -> Vec<&'a T>
where
  V: PartialOrd + Copy,
  F: Fn(&T) -> V,
{
  items
    .iter()
    .filter(|item| {
      let v = field(item);
      min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi)
    })
    .collect()
}

/// Splits items into `(flag set, flag unset)`, preserving order within each side.
pub fn partition_by_flag<'a, T, F>(items: &'a [T], flag: F) -> (Vec<&'a T>, Vec<&'a T>)
where
  F: Fn(&T) -> bool,
{
  items.iter().partition(|item| flag(item))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, PartialEq)]
  struct Card {
    name: &'static str,
    price: f64,
    set: Option<Uuid>,
    foil: bool,
  }

  fn cards(set: Uuid) -> Vec<Card> {
    vec![
      Card { name: "Charizard", price: 350.0, set: Some(set), foil: true },
      Card { name: "Blastoise", price: 120.0, set: Some(set), foil: false },
      Card { name: "Pikachu", price: 15.5, set: None, foil: true },
    ]
  }

  #[test]
  fn search_is_case_insensitive() {
    let items = cards(Uuid::new_v4());
    let hits = search(&items, "CHAR", |c| c.name);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Charizard");
    assert_eq!(search(&items, "  ", |c| c.name).len(), 3);
    assert!(search(&items, "mew", |c| c.name).is_empty());
  }

  #[test]
  fn key_range_and_flag() {
    let set = Uuid::new_v4();
    let items = cards(set);
    assert_eq!(filter_by_key(&items, Some(set), |c| c.set).len(), 2);
    assert_eq!(filter_by_key(&items, None, |c| c.set)[0].name, "Pikachu");

    let mid = filter_by_range(&items, Some(15.5), Some(120.0), |c| c.price);
    assert_eq!(mid.iter().map(|c| c.name).collect::<Vec<_>>(), ["Blastoise", "Pikachu"]);
    assert_eq!(filter_by_range(&items, None, None, |c| c.price).len(), 3);

    let (foil, plain) = partition_by_flag(&items, |c| c.foil);
    assert_eq!(foil.len(), 2);
    assert_eq!(plain[0].name, "Blastoise");
  }
}
