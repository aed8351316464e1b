// Built-in sample data installed on first load of an empty library collection.

use serde_json::{Value, json};

use crate::model::Collection;

/// Sample records for `collection`, or an empty list if it never seeds.
pub(crate) fn samples(collection: Collection) -> Vec<Value> {
    let data = match collection {
        Collection::MenuItems => json!([
            { "id": "menu_1", "name": "Bruschetta", "description": "Toasted baguette with tomato, basil, and garlic.", "price": 8, "tags": ["Appetizer", "Vegan"] },
            { "id": "menu_2", "name": "Caprese Salad", "description": "Fresh mozzarella, tomatoes, and sweet basil.", "price": 12, "tags": ["Salad", "Vegetarian", "Gluten-Free"] },
            { "id": "menu_3", "name": "Grilled Salmon", "description": "Salmon fillet with a lemon-dill sauce.", "price": 25, "tags": ["Main Course", "Seafood"] },
            { "id": "menu_4", "name": "Chocolate Lava Cake", "description": "Warm chocolate cake with a molten center.", "price": 10, "tags": ["Dessert", "Vegetarian"] }
        ]),
        Collection::Services => json!([
            { "id": "serv_1", "name": "On-site Chef", "description": "Lead chef providing on-site cooking and coordination.", "pricingType": "hourly", "price": 75 },
            { "id": "serv_2", "name": "Dishwasher", "description": "Dedicated staff for washing dishes and kitchen cleanup.", "pricingType": "hourly", "price": 25 },
            { "id": "serv_3", "name": "Bartender", "description": "Professional bartender for serving drinks.", "pricingType": "hourly", "price": 40 },
            { "id": "serv_4", "name": "Passed Appetizer Service", "description": "Servers for passing appetizers to guests.", "pricingType": "flat", "price": 150 }
        ]),
        Collection::ConstraintTags => json!([
            { "id": "tag_1", "name": "Vegan", "size": 10 },
            { "id": "tag_2", "name": "Vegetarian", "size": 8 },
            { "id": "tag_3", "name": "Gluten-Free", "size": 7 },
            { "id": "tag_4", "name": "Dairy-Free", "size": 7 },
            { "id": "tag_5", "name": "Nut-Free", "size": 9 }
        ]),
        Collection::SymbolPaletteItems => json!([
            { "id": "sym_1", "symbol": "🌱", "hoverText": "Plant-Based / Vegan" },
            { "id": "sym_2", "symbol": "🌾", "hoverText": "Contains Gluten" },
            { "id": "sym_3", "symbol": "🥜", "hoverText": "Contains Nuts" },
            { "id": "sym_4", "symbol": "🥛", "hoverText": "Contains Dairy" },
            { "id": "sym_5", "symbol": "🐟", "hoverText": "Contains Fish" },
            { "id": "sym_6", "symbol": "🦐", "hoverText": "Contains Shellfish" },
            { "id": "sym_7", "symbol": "🥚", "hoverText": "Contains Eggs" },
            { "id": "sym_8", "symbol": "🌶️", "hoverText": "Spicy" },
            { "id": "sym_9", "symbol": "🌽", "hoverText": "Contains Corn" },
            { "id": "sym_10", "symbol": "🍄", "hoverText": "Contains Mushrooms" },
            { "id": "sym_11", "symbol": "🧀", "hoverText": "Contains Cheese" },
            { "id": "sym_12", "symbol": "🍞", "hoverText": "Contains Bread/Gluten" },
            { "id": "sym_13", "symbol": "🥩", "hoverText": "Red Meat" },
            { "id": "sym_14", "symbol": "🍗", "hoverText": "Poultry" },
            { "id": "sym_15", "symbol": "🍯", "hoverText": "Contains Honey" },
            { "id": "sym_16", "symbol": "🚫", "hoverText": "Negation / Not" }
        ]),
        Collection::Customers => json!([
            {
                "id": "cust_1",
                "name": "The Family",
                "phone": "(123) 456-7890",
                "email": "abc123@email.com",
                "notes": "Prefers vegetarian options for large gatherings.",
                "dietaryRestrictions": ["Vegetarian"]
            }
        ]),
        Collection::Events | Collection::Contracts | Collection::Templates => return Vec::new(),
    };

    match data {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}
