//! # Seed Data Generator
//!
//! Creates a tenant with a small, realistic catalog for development.
//!
//! ## Usage
//! ```bash
//! # Defaults come from STOCKLEDGER_* environment variables
//! cargo run -p stockledger-db --bin seed
//!
//! # Specify database path and tenant name
//! cargo run -p stockledger-db --bin seed -- --db ./data/ledger.db --tenant "Corner Shop"
//!
//! # More log output
//! RUST_LOG=stockledger_db=debug cargo run -p stockledger-db --bin seed
//! ```
//!
//! ## Generated Data
//! - One tenant and a manager actor for it
//! - Categories: Beverages, Bakery, Dairy, Snacks
//! - Products per category; bottled beverages are returnable with a
//!   container deposit
//! - One sample checkout, so reports and deposit liability are non-empty

use std::env;
use std::process::ExitCode;

use stockledger_core::{Actor, NewProduct, PaymentMethod, Role, SaleLine, TenantContext};
use stockledger_db::{Database, DbError, LedgerConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// (category, [(name, sku, price_cents, opening stock, deposit_cents)])
/// A zero deposit means not returnable.
const CATALOG: &[(&str, &[(&str, &str, i64, i64, i64)])] = &[
    (
        "Beverages",
        &[
            ("Lager 50cl", "BEV-LAGER-50", 800, 120, 200),
            ("Cola 1.5L", "BEV-COLA-150", 450, 60, 150),
            ("Mineral Water 50cl", "BEV-WATER-50", 150, 200, 100),
            ("Orange Juice 1L", "BEV-OJ-100", 650, 24, 0),
            ("Canned Soda", "BEV-CAN-33", 250, 96, 0),
        ],
    ),
    (
        "Bakery",
        &[
            ("White Bread", "BAK-WHITE", 300, 30, 0),
            ("Rye Bread", "BAK-RYE", 380, 12, 0),
            ("Croissant", "BAK-CROIS", 180, 8, 0),
        ],
    ),
    (
        "Dairy",
        &[
            ("Milk 1L (glass)", "DRY-MILK-100", 220, 40, 50),
            ("Butter 250g", "DRY-BUTTER", 420, 18, 0),
            ("Cheddar 200g", "DRY-CHEDDAR", 560, 9, 0),
        ],
    ),
    (
        "Snacks",
        &[
            ("Salted Crisps", "SNK-CRISPS", 199, 50, 0),
            ("Chocolate Bar", "SNK-CHOC", 149, 75, 0),
            ("Peanuts 200g", "SNK-PEANUTS", 299, 5, 0),
        ],
    ),
];

fn print_help() {
    println!("Stock Ledger Seed Data Generator");
    println!();
    println!("Usage: seed [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -d, --db <PATH>        Database file path (default: $STOCKLEDGER_DATABASE_PATH)");
    println!("  -t, --tenant <NAME>    Tenant to create (default: Demo Shop)");
    println!("  -h, --help             Show this help message");
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match LedgerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let mut tenant_name = String::from("Demo Shop");

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if let Some(path) = args.get(i + 1) {
                    config.database_path = path.into();
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if let Some(name) = args.get(i + 1) {
                    tenant_name = name.clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    match seed(&config, &tenant_name).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Seed failed");
            ExitCode::FAILURE
        }
    }
}

async fn seed(config: &LedgerConfig, tenant_name: &str) -> Result<(), DbError> {
    info!(path = %config.database_path.display(), tenant = tenant_name, "Seeding database");

    let db = Database::new(config.db_config()).await?;

    if let Some(existing) = db.tenants().get_by_name(tenant_name).await? {
        warn!(
            tenant_id = %existing.id,
            "Tenant already exists; skipping seed to avoid duplicates"
        );
        return Ok(());
    }

    let tenant = db.tenants().create(tenant_name).await?;
    let ctx = TenantContext::new(&tenant.id);
    let manager = Actor::new("seed", Role::Manager, &tenant.id);

    let start = std::time::Instant::now();
    let mut created = Vec::new();

    for (category_name, products) in CATALOG {
        let category = db.categories().create(&ctx, &manager, category_name).await?;

        for (name, sku, price_cents, quantity, deposit_cents) in products.iter() {
            let mut new = NewProduct::new(*name, *price_cents)
                .sku(*sku)
                .category(&category.id)
                .quantity(*quantity);
            if *deposit_cents > 0 {
                new = new.returnable(*deposit_cents);
            }

            let product = db.products().create(&ctx, &manager, new).await?;
            created.push(product);
        }
    }

    info!(
        products = created.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Catalog created"
    );

    // A sample sale touching a returnable and a plain product.
    let lines: Vec<SaleLine> = created
        .iter()
        .filter(|p| p.sku == "BEV-LAGER-50" || p.sku == "BAK-WHITE")
        .map(|p| SaleLine::new(&p.id, 2))
        .collect();
    let receipt = db
        .ledger()
        .checkout(&ctx, &manager, &lines, PaymentMethod::Cash)
        .await?;

    info!(
        sale_id = %receipt.sale.id,
        total = %receipt.sale.total(),
        "Sample checkout recorded"
    );

    let liability = db.reports().total_deposit_liability(&ctx, &manager).await?;
    let low_stock = db.reports().low_stock_products(&ctx, &manager).await?;
    info!(
        tenant_id = %tenant.id,
        deposit_liability = %liability,
        low_stock = low_stock.len(),
        "Seed complete"
    );

    db.close().await;
    Ok(())
}
