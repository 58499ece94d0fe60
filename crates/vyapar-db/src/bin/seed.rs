//! # Seed Data Generator
//!
//! Populates a database with one demo tenant: a grocery catalogue with
//! expiry-dated batches, a restaurant menu and a small floor plan.
//!
//! ## Usage
//! ```bash
//! cargo run -p vyapar-db --bin seed
//!
//! # Specify database path and tenant id
//! cargo run -p vyapar-db --bin seed -- --db ./data/vyapar.db --tenant acct-demo
//! ```

use chrono::{Duration, Utc};
use std::env;
use vyapar_core::{NewBatch, NewCustomer, NewProduct, NewTable, Role, TenantContext, TenantStatus};
use vyapar_db::{Database, DbConfig};

/// (name, category, price ₹, cost ₹, [(batch, days to expiry, qty)])
const GROCERY: &[(&str, &str, i64, i64, &[(&str, i64, i64)])] = &[
    ("Basmati Rice 1kg", "Grocery", 140, 110, &[("BR-24A", 240, 30), ("BR-24B", 300, 20)]),
    ("Toor Dal 1kg", "Grocery", 165, 130, &[("TD-11", 180, 25)]),
    ("Amul Milk 500ml", "Dairy", 28, 24, &[("AM-0901", 2, 12), ("AM-0902", 3, 24)]),
    ("Dahi 400g", "Dairy", 45, 36, &[("DH-77", 5, 15)]),
    ("Paneer 200g", "Dairy", 90, 72, &[("PN-31", 6, 10)]),
    ("Bread Brown", "Bakery", 50, 38, &[("BB-5", 1, 8), ("BB-6", 4, 8)]),
    ("Masala Chai 250g", "Beverages", 120, 85, &[]),
    ("Ghee 1L", "Dairy", 620, 540, &[("GH-02", 200, 6)]),
];

/// (name, category, price ₹, cost ₹)
const MENU: &[(&str, &str, i64, i64)] = &[
    ("Paneer Tikka", "Starters", 260, 110),
    ("Dal Makhani", "Main Course", 240, 80),
    ("Butter Naan", "Breads", 50, 12),
    ("Veg Biryani", "Main Course", 280, 105),
    ("Sweet Lassi", "Beverages", 90, 30),
    ("Fresh Lime Soda", "Beverages", 80, 20),
    ("Gulab Jamun", "Desserts", 110, 35),
    ("Kulfi", "Ice Cream", 120, 45),
];

const TABLES: &[(&str, i64, &str, i64, i64)] = &[
    ("T1", 2, "Window", 0, 0),
    ("T2", 2, "Window", 1, 0),
    ("T3", 4, "Main Hall", 0, 1),
    ("T4", 4, "Main Hall", 1, 1),
    ("T5", 6, "Main Hall", 2, 1),
    ("P1", 8, "Patio", 0, 2),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./vyapar_dev.db");
    let mut tenant_id = String::from("acct-demo");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Vyapar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./vyapar_dev.db)");
                println!("  -t, --tenant <ID>    Tenant id to create (default: acct-demo)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Vyapar Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Tenant:   {}", tenant_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if db.tenants().get(&tenant_id).await?.is_some() {
        println!("⚠ Tenant {} already exists", tenant_id);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    db.tenants()
        .create(&tenant_id, "Demo Kirana & Kitchen", TenantStatus::Active)
        .await?;
    let tenant = TenantContext::new(&tenant_id, Role::Admin);
    println!("✓ Created tenant");

    let today = Utc::now().date_naive();
    let inventory = db.inventory();
    let mut batches = 0;

    for (name, category, price, cost, lots) in GROCERY {
        let product = inventory
            .create_product(
                &tenant,
                NewProduct {
                    name: name.to_string(),
                    category: Some(category.to_string()),
                    price_paise: price * 100,
                    cost_paise: cost * 100,
                    stock_quantity: if lots.is_empty() { 40 } else { 0 },
                    tax_rate_bps: 500,
                },
            )
            .await?;

        for (code, days, qty) in lots.iter() {
            inventory
                .add_batch(
                    &tenant,
                    &product.id,
                    NewBatch {
                        batch_code: code.to_string(),
                        expiry_date: today + Duration::days(*days),
                        quantity: *qty,
                        unit_cost_paise: cost * 100,
                    },
                )
                .await?;
            batches += 1;
        }
    }
    println!("✓ Created {} grocery products ({} batches)", GROCERY.len(), batches);

    for (name, category, price, cost) in MENU {
        inventory
            .create_product(
                &tenant,
                NewProduct {
                    name: name.to_string(),
                    category: Some(category.to_string()),
                    price_paise: price * 100,
                    cost_paise: cost * 100,
                    stock_quantity: 200,
                    tax_rate_bps: 500,
                },
            )
            .await?;
    }
    println!("✓ Created {} menu items", MENU.len());

    for (label, capacity, zone, x, y) in TABLES {
        db.floor()
            .add_table(
                &tenant,
                NewTable {
                    label: label.to_string(),
                    capacity: *capacity,
                    zone: Some(zone.to_string()),
                    pos_x: *x,
                    pos_y: *y,
                },
            )
            .await?;
    }
    println!("✓ Created {} tables", TABLES.len());

    db.customers()
        .create(
            &tenant,
            NewCustomer {
                name: "Asha Verma".into(),
                phone: Some("9800000001".into()),
                city: Some("Pune".into()),
                ..Default::default()
            },
        )
        .await?;
    println!("✓ Created demo customer");

    let expiring = inventory.expiring_batches_list(&tenant, today, 7).await?;
    println!();
    println!("Batches expiring within 7 days: {}", expiring.len());
    for batch in &expiring {
        println!(
            "  {} {} qty {} (expires {})",
            batch.product_name, batch.batch_code, batch.quantity, batch.expiry_date
        );
    }

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
