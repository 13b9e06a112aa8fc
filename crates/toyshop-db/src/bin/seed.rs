//! # Seed Data Generator
//!
//! Populates the database with demo products for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p toyshop-db --bin seed
//!
//! # Specify database path
//! cargo run -p toyshop-db --bin seed -- --db ./data/toyshop.db
//! ```
//!
//! Creates a small catalog across the five fixed categories (plush,
//! constructor, doll, educational, creative) with varied prices, stock
//! levels (including a few sold-out items) and production years.

use std::env;

use toyshop_core::types::{Category, Product};
use toyshop_db::{Database, DbConfig};

/// Demo catalog: (category, name, price in cents, stock).
const DEMO_PRODUCTS: &[(Category, &str, i64, i64)] = &[
    (Category::Plush, "Teddy bear, large", 149_900, 12),
    (Category::Plush, "Plush bunny", 119_900, 8),
    (Category::Plush, "Plush dinosaur", 134_900, 0),
    (Category::Constructor, "Classic building set", 299_900, 15),
    (Category::Constructor, "Wooden constructor", 229_900, 0),
    (Category::Constructor, "Magnetic tiles, 64 pcs", 389_900, 6),
    (Category::Doll, "Doll with accessories", 349_900, 9),
    (Category::Doll, "Dollhouse, two floors", 599_900, 3),
    (Category::Educational, "Play mat", 499_900, 7),
    (Category::Educational, "Soft blocks set", 89_900, 20),
    (Category::Educational, "Counting abacus", 74_900, 14),
    (Category::Creative, "Drawing kit", 159_900, 11),
    (Category::Creative, "Clay modelling set", 99_900, 18),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./toyshop_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Toyshop Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./toyshop_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Toyshop Seed Data Generator");
    println!("===========================");
    println!("Database: {}", db_path);
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("Connected, migrations applied");

    // Check existing products
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("Database already has {} products", existing);
        println!("Skipping seed to avoid duplicates.");
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    println!("Seeding catalog...");

    let mut seeded: i64 = 0;
    for (category, name, price_cents, stock) in DEMO_PRODUCTS {
        let mut product = Product::new(*name, *category, *price_cents, *stock);
        product.country = "Russia".to_string();
        product.year = 2023 + (seeded % 2);
        product.description = format!("{} ({})", name, category.label());

        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", name, e);
            continue;
        }
        seeded += 1;
    }

    println!();
    println!("Seeded {} products across {} categories", seeded, Category::ALL.len());

    for category in Category::ALL {
        let count = db.products().list_by_category(category).await?.len();
        println!("  {:20} {}", category.label(), count);
    }

    println!();
    println!("Seed complete!");

    Ok(())
}
