//! End-to-end tests of the aggregation pipeline

mod common;

#[cfg(test)]
mod tests {
    use super::common::{hoodie, oracle, Behaviour, StubSource};
    use priceoracle::oracle::sources::SourceRegistry;
    use priceoracle::oracle::OracleError;
    use std::collections::BTreeSet;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    // ============================================================================
    // Happy path
    // ============================================================================

    #[tokio::test]
    async fn test_three_source_scenario() {
        let registry = SourceRegistry::new()
            .with(StubSource::quote("a", 100.0, 0.95))
            .with(StubSource::quote("b", 95.0, 0.92))
            .with(StubSource::quote("c", 500.0, 0.93));

        let result = oracle(registry)
            .aggregate_product(&hoodie())
            .await
            .expect("aggregation should succeed");

        // Three quotes: outlier rejection does not run, c stays in
        assert_eq!(result.outliers_removed_count, 0);
        assert_eq!(result.sources_count, 3);
        assert_eq!(result.absolute_min_minor, 9_500);
        // floor(64740 / 2.8)
        assert_eq!(result.weighted_avg_minor, 23_121);
        assert_eq!(result.final_price_minor, 9_500);
        assert_eq!(result.supporting_sources, set(&["b"]));
        assert_eq!(result.product_id, "hoodie-1");
    }

    #[tokio::test]
    async fn test_quotes_keep_registration_order() {
        let registry = SourceRegistry::new()
            .with(StubSource::with(
                "slow",
                Behaviour::Delayed { millis: 80, price: 100.0, confidence: 0.95 },
            ))
            .with(StubSource::quote("fast", 101.0, 0.95))
            .with(StubSource::with(
                "medium",
                Behaviour::Delayed { millis: 30, price: 99.0, confidence: 0.95 },
            ));

        let result = oracle(registry).aggregate_product(&hoodie()).await.unwrap();
        let order: Vec<&str> = result.all_quotes.iter().map(|q| q.source_id.as_str()).collect();
        assert_eq!(order, vec!["slow", "fast", "medium"]);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_source() {
        let registry = SourceRegistry::new()
            .with(StubSource::with("down", Behaviour::Fail))
            .with(StubSource::with("stuck", Behaviour::Hang))
            .with(StubSource::with("empty", Behaviour::Nothing))
            .with(StubSource::quote("ok", 1_299.0, 0.95));

        let result = oracle(registry).aggregate_product(&hoodie()).await.unwrap();
        assert_eq!(result.final_price_minor, 129_900);
        assert_eq!(result.supporting_sources, set(&["ok"]));
    }

    #[tokio::test]
    async fn test_outliers_rejected_with_enough_sources() {
        let registry = SourceRegistry::new()
            .with(StubSource::quote("a", 10.00, 0.95))
            .with(StubSource::quote("b", 10.10, 0.95))
            .with(StubSource::quote("c", 9.90, 0.95))
            .with(StubSource::quote("d", 10.05, 0.95))
            .with(StubSource::quote("e", 10.02, 0.95))
            .with(StubSource::quote("f", 9.95, 0.95))
            .with(StubSource::quote("g", 50.00, 0.95));

        let result = oracle(registry).aggregate_product(&hoodie()).await.unwrap();
        assert_eq!(result.outliers_removed_count, 1);
        assert_eq!(result.final_price_minor, 990);
        assert!(!result.supporting_sources.contains("g"));
    }

    // ============================================================================
    // Gate failures
    // ============================================================================

    #[tokio::test]
    async fn test_no_adapter_results_when_every_source_misses() {
        let registry = SourceRegistry::new()
            .with(StubSource::with("down", Behaviour::Fail))
            .with(StubSource::with("stuck", Behaviour::Hang))
            .with(StubSource::with("empty", Behaviour::Nothing));

        let err = oracle(registry).aggregate_product(&hoodie()).await.unwrap_err();
        assert_eq!(
            err,
            OracleError::NoAdapterResults {
                product_id: "hoodie-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_registry_is_no_adapter_results() {
        let err = oracle(SourceRegistry::new())
            .aggregate_product(&hoodie())
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::NoAdapterResults { .. }));
    }

    #[tokio::test]
    async fn test_low_confidence_never_publishes() {
        let registry = SourceRegistry::new()
            .with(StubSource::quote("a", 100.0, 0.9))
            .with(StubSource::quote("b", 100.0, 0.65));

        let err = oracle(registry).aggregate_product(&hoodie()).await.unwrap_err();
        assert!(err.is_untrusted_data());
    }

    #[tokio::test]
    async fn test_single_confident_quote_is_enough() {
        let registry = SourceRegistry::new()
            .with(StubSource::quote("a", 100.0, 0.91))
            .with(StubSource::quote("b", 80.0, 0.5));

        let result = oracle(registry).aggregate_product(&hoodie()).await.unwrap();
        assert_eq!(result.final_price_minor, 10_000);
        assert_eq!(result.sources_count, 1);
    }
}
