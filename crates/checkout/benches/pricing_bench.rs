use chrono::{DateTime, Duration, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use rust_decimal::Decimal;

use checkout::{CheckoutPricer, ReservationManager};
use common::{Currency, CurrencyConfig, Money, Sku};
use store::{MemoryStore, ShippingSetting, TaxSetting};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn bench_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_900_000_000, 0).unwrap()
}

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    for i in 0..20 {
        let sku = Sku::new(format!("SKU-{i:03}"));
        store.seed_sku(sku.clone(), 100).await;
        store
            .seed_price(sku.clone(), Currency::Usd, Money::new(dec("19.99")))
            .await;
        store.seed_weight(sku, dec("0.25")).await;
    }
    store
        .seed_shipping(ShippingSetting {
            country: "default".to_string(),
            base_price: Money::new(dec("10.00")),
            price_per_kg: Money::new(dec("1.50")),
        })
        .await;
    store
        .set_active_tax(TaxSetting {
            name: "VAT".to_string(),
            rate: dec("0.075"),
        })
        .await;
    store
}

fn bench_quote(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let now = bench_now();

    let (pricer, token) = rt.block_on(async {
        let store = seeded_store().await;
        let manager =
            ReservationManager::new(store.clone(), Duration::hours(24), Duration::hours(24));
        let session = manager.start_session(now, None).await.unwrap();
        let mut token = session.cookie().to_token();
        for i in 0..20 {
            token = manager
                .add_to_cart(&token, Sku::new(format!("SKU-{i:03}")), 2, now)
                .await
                .unwrap()
                .to_token();
        }
        let pricer = CheckoutPricer::new(store, CurrencyConfig::default(), "default".to_string());
        (pricer, token)
    });

    c.bench_function("checkout/quote_20_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                pricer
                    .quote(&token, "Atlantis", Currency::Usd, now)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_add_to_cart(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let now = bench_now();

    let (manager, token) = rt.block_on(async {
        let store = seeded_store().await;
        let manager =
            ReservationManager::new(store, Duration::hours(24), Duration::hours(24));
        let session = manager.start_session(now, None).await.unwrap();
        (manager, session.cookie().to_token())
    });

    c.bench_function("checkout/add_to_cart_refresh", |b| {
        b.iter(|| {
            rt.block_on(async {
                manager
                    .add_to_cart(&token, Sku::new("SKU-000"), 2, now)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_quote, bench_add_to_cart);
criterion_main!(benches);
