use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{NaiveDate, Utc};
use quotaledger_core::{CategoryCode, HolderId, Period, TenantId, UserId};
use quotaledger_ledger::{
    BalanceCalculator, BalanceKey, Consumption, ConsumptionRequest, Entitlement, ExternalRef, Movement,
    TransferRequest,
};

struct Fixture {
    tenant_id: TenantId,
    period: Period,
    entitlements: Vec<Entitlement>,
    movements: Vec<Movement>,
    consumptions: Vec<Consumption>,
}

fn fixture(holders: usize, rows_per_holder: usize) -> Fixture {
    let tenant_id = TenantId::new();
    let period = Period::new(2026).unwrap();
    let category = CategoryCode::parse("POP").unwrap();
    let actor = UserId::new();
    let ids: Vec<HolderId> = (0..holders)
        .map(|i| HolderId::parse(format!("LLP-{i:05}")).unwrap())
        .collect();

    let entitlements = ids
        .iter()
        .map(|h| {
            let key = BalanceKey::new(tenant_id, h.clone(), category.clone(), period);
            Entitlement::open(key, 1_000_000, actor, Utc::now()).unwrap()
        })
        .collect();

    let mut movements = Vec::new();
    let mut consumptions = Vec::new();
    for (i, h) in ids.iter().enumerate() {
        for j in 0..rows_per_holder {
            let req = TransferRequest {
                source: h.clone(),
                destination: ids[(i + j + 1) % holders].clone(),
                category: category.clone(),
                period,
                amount: 10,
                note: None,
                effective_date: None,
            };
            movements.push(Movement::record(tenant_id, &req, actor, Utc::now()).unwrap());

            let harvest = ConsumptionRequest {
                holder: h.clone(),
                category: category.clone(),
                amount: 5,
                event_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
                external_ref: ExternalRef::parse(format!("R-{i}-{j}")).unwrap(),
            };
            consumptions.push(Consumption::record(tenant_id, &harvest, actor, Utc::now()).unwrap());
        }
    }

    Fixture {
        tenant_id,
        period,
        entitlements,
        movements,
        consumptions,
    }
}

/// Grouped aggregation for the bulk dashboard read, at increasing log sizes.
fn bench_period_balances(c: &mut Criterion) {
    let mut group = c.benchmark_group("period_balances");

    for holders in [10usize, 100, 500] {
        let fx = fixture(holders, 20);
        let rows = fx.movements.len() + fx.consumptions.len();
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(holders), &fx, |b, fx| {
            b.iter(|| {
                BalanceCalculator::period_balances(
                    black_box(fx.tenant_id),
                    black_box(fx.period),
                    &fx.entitlements,
                    &fx.movements,
                    &fx.consumptions,
                )
            })
        });
    }

    group.finish();
}

/// Single-key fold, the read done under serialization on every transfer.
fn bench_single_key(c: &mut Criterion) {
    let fx = fixture(100, 20);
    let key = fx.entitlements[0].key.clone();

    c.bench_function("single_key_balance", |b| {
        b.iter(|| {
            BalanceCalculator::balance(
                black_box(&key),
                fx.entitlements.first(),
                &fx.movements,
                &fx.consumptions,
            )
        })
    });
}

criterion_group!(benches, bench_period_balances, bench_single_key);
criterion_main!(benches);
