use tallyline_core::domain::product::ProductId;
use tallyline_db::{CatalogSeed, SqlProductRepository};

use crate::commands::{build_runtime, load_config, open_database, CommandResult, Failure};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let products = SqlProductRepository::new(pool.clone());

        let run_result = async {
            let seed_result = CatalogSeed::load(&products)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

            let verification = CatalogSeed::verify(&products)
                .await
                .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

            if !verification.all_present {
                return Err(("seed_verification", verification_message(&verification.checks), 6u8));
            }
            Ok::<Vec<ProductId>, Failure>(seed_result.products_seeded)
        }
        .await;

        pool.close().await;
        run_result
    });

    match result {
        Ok(products) => {
            let ids = products.iter().map(ProductId::as_str).collect::<Vec<_>>();
            CommandResult::success(
                "seed",
                format!("default catalog loaded ({} products): {}", ids.len(), ids.join(", ")),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_message(checks: &[(ProductId, bool)]) -> String {
    let failed_checks = checks
        .iter()
        .filter_map(|(id, passed)| (!passed).then_some(id.as_str()))
        .collect::<Vec<_>>();

    if failed_checks.is_empty() {
        "Some catalog products failed to load".to_string()
    } else {
        format!("Catalog verification failed for products: {}", failed_checks.join(", "))
    }
}
