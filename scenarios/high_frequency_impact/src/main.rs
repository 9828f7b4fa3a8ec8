use std::sync::Arc;
use std::time::Duration;

use grindstone_runner::prelude::*;
use grindstone_sql_target::{SqlTarget, SqlTargetConfig};
use rand::Rng;

/// Prefixes for the customer search victim, so the LIKE scan hits a realistic spread of rows.
const SURNAME_PREFIXES: &[&str] = &["SM", "JO", "WI", "BR", "TA", "MI", "DA", "WA"];

fn main() -> HarnessResult<()> {
    let cli = init();
    match cli.command {
        HarnessCommand::Run(args) => run_impact(args),
    }
}

/// Reproduces "death by a thousand cuts": a seat-availability lookup that costs well under a
/// millisecond per call, driven hard enough that its aggregate CPU appetite starves the normal
/// order traffic running next to it.
///
/// The schema bootstrapper is expected to have created and seeded the `seats`, `customers`,
/// `orders` and `order_lines` tables plus the `scheduler_stats` probe view before this runs.
fn run_impact(args: RunArgs) -> HarnessResult<()> {
    let target = Arc::new(SqlTarget::connect_lazy(SqlTargetConfig::new(
        args.connection_string.clone(),
    ))?);

    let builder = RunDefinitionBuilder::new(env!("CARGO_PKG_NAME"), args)
        .use_target(target.clone())
        .use_probe(target)
        .with_default_duration_s(120)
        .register_workload(
            WorkloadDefinition::new(
                "seat_availability",
                "SELECT available FROM seats WHERE seat_id = $1",
            )
            .with_params(|rng| vec![SqlValue::Int(rng.gen_range(1..=250_000))])
            .with_timeout(Duration::from_secs(1)),
        )
        .register_workload(
            WorkloadDefinition::new(
                "order_summary",
                "SELECT o.order_id, o.placed_at, SUM(li.amount) AS total \
                 FROM orders o JOIN order_lines li ON li.order_id = o.order_id \
                 WHERE o.customer_id = $1 \
                 GROUP BY o.order_id, o.placed_at",
            )
            .with_params(|rng| vec![SqlValue::Int(rng.gen_range(1..=50_000))])
            .with_weight(4),
        )
        .register_workload(
            WorkloadDefinition::new(
                "customer_search",
                "SELECT customer_id, first_name, last_name FROM customers WHERE last_name LIKE $1",
            )
            .with_params(|rng| {
                let prefix = SURNAME_PREFIXES[rng.gen_range(0..SURNAME_PREFIXES.len())];
                vec![SqlValue::Text(format!("{prefix}%"))]
            })
            .with_weight(2),
        )
        .register_workload(
            WorkloadDefinition::new(
                "revenue_rollup",
                "SELECT event_id, COUNT(*) AS orders, SUM(amount) AS revenue \
                 FROM order_lines GROUP BY event_id",
            )
            .with_weight(1)
            .with_timeout(Duration::from_secs(10)),
        )
        .register_workload(
            WorkloadDefinition::new(
                "order_insert",
                "INSERT INTO orders (customer_id, event_id, placed_at) VALUES ($1, $2, now())",
            )
            .with_params(|rng| {
                vec![
                    SqlValue::Int(rng.gen_range(1..=50_000)),
                    SqlValue::Int(rng.gen_range(1..=500)),
                ]
            })
            .with_weight(3),
        );

    let outcome = run(builder)?;

    if outcome.status == RunStatus::Degraded {
        log::warn!(
            "Run finished degraded; the report covers the data collected before the drain"
        );
    }

    Ok(())
}
