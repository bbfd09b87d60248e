//! Built-in menu catalog

use serde::Serialize;

/// Menu category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
}

/// A single menu entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub id: u32,
    pub name: &'static str,
    /// Model cache key
    pub asset_key: &'static str,
    /// References `Category::id`
    pub category: &'static str,
    pub description: &'static str,
    /// Price in rupees
    pub price: u32,
    /// Path of the glTF/GLB model
    pub asset_path: &'static str,
    pub quantity: u32,
}

pub const CATEGORIES: &[Category] = &[
    Category { id: "appetizers", name: "Appetizers", icon: "🥗" },
    Category { id: "main", name: "Main Course", icon: "🍽️" },
    Category { id: "desserts", name: "Desserts", icon: "🍰" },
    Category { id: "beverages", name: "Beverages", icon: "🍺" },
];

const MENU: &[MenuItem] = &[
    MenuItem {
        id: 1,
        name: "Pizza",
        asset_key: "pizza",
        category: "main",
        description: "Tasty pizza",
        price: 500,
        asset_path: "/models/pzza/scene.gltf",
        quantity: 10,
    },
    MenuItem {
        id: 2,
        name: "Platter",
        asset_key: "platter",
        category: "appetizers",
        description: "Delicious platter",
        price: 350,
        asset_path: "/models/platter-resized.glb",
        quantity: 10,
    },
    MenuItem {
        id: 3,
        name: "Murgmussallam",
        asset_key: "murg",
        category: "main",
        description: "Traditional murg",
        price: 250,
        asset_path: "/models/murgmusallam-resized.glb",
        quantity: 10,
    },
    MenuItem {
        id: 4,
        name: "Fish Fingers",
        asset_key: "fishfingers",
        category: "appetizers",
        description: "Crispy fish fingers",
        price: 250,
        asset_path: "/models/fishfingers-resized.glb",
        quantity: 10,
    },
    MenuItem {
        id: 5,
        name: "Pasta",
        asset_key: "pasta",
        category: "main",
        description: "Fresh pasta",
        price: 250,
        asset_path: "/models/pasta-resized.glb",
        quantity: 10,
    },
    MenuItem {
        id: 6,
        name: "Beer Crate",
        asset_key: "beer",
        category: "beverages",
        description: "Chilled beer",
        price: 250,
        asset_path: "/models/beer-resized.glb",
        quantity: 10,
    },
    MenuItem {
        id: 7,
        name: "Chicken Bites",
        asset_key: "chicken_bites",
        category: "appetizers",
        description: "Juicy chicken bites",
        price: 250,
        asset_path: "/models/chicken_bites-resized.glb",
        quantity: 10,
    },
];

/// Ordered list of menu items plus the category table
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<MenuItem>,
    categories: Vec<Category>,
}

impl Catalog {
    /// The shipped menu
    pub fn builtin() -> Self {
        Self::new(MENU.to_vec(), CATEGORIES.to_vec())
    }

    pub fn new(items: Vec<MenuItem>, categories: Vec<Category>) -> Self {
        Self { items, categories }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MenuItem> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn find_by_key(&self, asset_key: &str) -> Option<(usize, &MenuItem)> {
        self.items
            .iter()
            .enumerate()
            .find(|(_, item)| item.asset_key == asset_key)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Category record for an item
    pub fn category_of(&self, item: &MenuItem) -> Option<&Category> {
        self.category(item.category)
    }

    pub fn in_category<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a MenuItem> + 'a {
        self.items.iter().filter(move |item| item.category == id)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_order() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.len(), 7);
        assert_eq!(catalog.get(0).unwrap().name, "Pizza");
        assert_eq!(catalog.get(3).unwrap().name, "Fish Fingers");
        assert_eq!(catalog.get(3).unwrap().asset_key, "fishfingers");
        assert!(catalog.get(7).is_none());
    }

    #[test]
    fn test_keys_are_unique_and_categories_resolve() {
        let catalog = Catalog::builtin();
        for (i, item) in catalog.items().iter().enumerate() {
            assert_eq!(catalog.find_by_key(item.asset_key).map(|(idx, _)| idx), Some(i));
            assert!(catalog.category_of(item).is_some(), "{} has no category", item.name);
        }
    }

    #[test]
    fn test_in_category() {
        let catalog = Catalog::builtin();
        let drinks: Vec<_> = catalog.in_category("beverages").map(|i| i.name).collect();
        assert_eq!(drinks, vec!["Beer Crate"]);
        assert_eq!(catalog.in_category("desserts").count(), 0);
    }
}
