//! The fixed sample dataset and the indexes declared over it.

use catalog::{IndexModel, Product};

/// Returns the sample product records.
pub fn sample_products() -> Vec<Product> {
    vec![
        Product::new(
            "PROD001",
            "Wireless Bluetooth Headphones",
            "TechAudio",
            89.99,
            "Electronics",
        )
        .in_stock(true)
        .spec("batteryLife", "20 hours")
        .spec("connectivity", "Bluetooth 5.0")
        .spec("weight", "250g")
        .tags(["wireless", "bluetooth", "audio"]),
        Product::new("PROD002", "Smart Fitness Watch", "FitTech", 199.99, "Wearables")
            .in_stock(true)
            .spec("batteryLife", "7 days")
            .spec("waterResistant", "5ATM")
            .spec("screenSize", "1.4 inch")
            .tags(["fitness", "smartwatch", "health"]),
        Product::new("PROD003", "Organic Cotton T-Shirt", "EcoWear", 24.99, "Clothing")
            .in_stock(false)
            .spec("material", "100% Organic Cotton")
            .spec("sizes", &["S", "M", "L", "XL"][..])
            .spec("colors", &["White", "Black", "Navy"][..])
            .tags(["organic", "cotton", "sustainable"]),
    ]
}

/// Indexes supporting the practice queries: unique productId, then category,
/// brand, price and tag membership.
pub fn product_indexes() -> Vec<IndexModel> {
    vec![
        IndexModel::scalar(Product::ID_FIELD).unique(true),
        IndexModel::scalar("category"),
        IndexModel::scalar("brand"),
        IndexModel::scalar("price"),
        IndexModel::array("tags"),
    ]
}
