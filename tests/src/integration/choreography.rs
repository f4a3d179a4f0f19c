//! # Service Choreography
//!
//! Services reacting to each other's events through one shared transport:
//!
//! ```text
//! orders ──order.created──► inventory ──product.inventory.low──► notifications
//!                                                                     │
//!                            mailer ◄──notification.email.requested───┘
//! ```
//!
//! Every reaction is published with `PublishOptions::caused_by`, so the whole
//! chain shares one correlation id and each step names its cause.

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        email_requested, forwarding_handler, next_event, order_created, stock_low,
    };
    use event_bus::{
        compose, handler_fn, BusConfig, EnvelopeOptions, EventData, EventPublisher,
        InMemoryTransport, LoggingMiddleware, PublishOptions, Publisher, Subscriber,
        SubscriberOptions, Topic, ValidationMiddleware,
    };
    use event_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
    use event_types::payloads::{EmailRequested, OrderCreated, ProductStockLow};
    use std::sync::Arc;

    fn service_publisher(
        config: &BusConfig,
        transport: &InMemoryTransport,
        source: &str,
    ) -> Arc<Publisher> {
        let config = BusConfig {
            source: source.to_string(),
            ..config.clone()
        };
        Arc::new(
            Publisher::new(Arc::new(transport.clone()), config.publisher_config())
                .with_middleware(compose(vec![Arc::new(ValidationMiddleware::new())])),
        )
    }

    #[tokio::test]
    async fn test_order_to_email_chain() {
        let config = BusConfig::default();
        let transport = config.in_memory_transport();

        let orders = service_publisher(&config, &transport, "orders");
        let inventory = service_publisher(&config, &transport, "inventory");
        let notifications = service_publisher(&config, &transport, "notifications");

        let consumer_options = SubscriberOptions::new()
            .with_middleware(compose(vec![Arc::new(LoggingMiddleware::new())]));

        // inventory: every ordered product is low on stock in this scenario
        let inventory_sub =
            Subscriber::connect(Arc::new(transport.clone()), consumer_options.clone())
                .await
                .unwrap();
        inventory_sub
            .subscribe(
                Topic::OrderCreated,
                handler_fn(move |event| {
                    let inventory = inventory.clone();
                    async move {
                        let order: OrderCreated = event.data_as()?;
                        for line in &order.items {
                            inventory
                                .publish(
                                    stock_low(&line.product_id).into(),
                                    PublishOptions::caused_by(&event),
                                )
                                .await?;
                        }
                        Ok::<(), anyhow::Error>(())
                    }
                }),
            )
            .await
            .unwrap();

        // notifications: tell the warehouse about low stock
        let notification_sub =
            Subscriber::connect(Arc::new(transport.clone()), consumer_options.clone())
                .await
                .unwrap();
        notification_sub
            .subscribe(
                Topic::ProductStockLow,
                handler_fn(move |event| {
                    let notifications = notifications.clone();
                    async move {
                        let EventData::ProductStockLow(low) = event.payload()? else {
                            anyhow::bail!("unexpected payload on {}", event.topic());
                        };
                        let mut email = email_requested("warehouse@example.com", "stock-low");
                        email
                            .variables
                            .insert("sku".to_string(), low.sku.clone().into());
                        notifications
                            .publish(email.into(), PublishOptions::caused_by(&event))
                            .await?;
                        Ok::<(), anyhow::Error>(())
                    }
                }),
            )
            .await
            .unwrap();

        // mailer and an auditor watching the middle of the chain
        let mailer_sub = Subscriber::connect(Arc::new(transport.clone()), consumer_options)
            .await
            .unwrap();
        let (mailer, mut mail_rx) = forwarding_handler();
        mailer_sub
            .subscribe(Topic::EmailRequested, mailer)
            .await
            .unwrap();
        let (auditor, mut audit_rx) = forwarding_handler();
        mailer_sub
            .subscribe(Topic::ProductStockLow, auditor)
            .await
            .unwrap();

        let order_id = orders
            .publish(order_created("ord_77").into(), PublishOptions::new())
            .await
            .unwrap();

        let low = next_event(&mut audit_rx).await;
        let email = next_event(&mut mail_rx).await;

        assert_eq!(low.source(), "inventory");
        assert_eq!(low.causation_id(), Some(order_id.to_string().as_str()));
        assert_eq!(low.correlation_id(), Some(order_id.to_string().as_str()));
        let low_payload: ProductStockLow = low.data_as().unwrap();
        assert_eq!(low_payload.product_id, "prd_1");

        assert_eq!(email.source(), "notifications");
        assert_eq!(email.causation_id(), Some(low.event_id().to_string().as_str()));
        assert_eq!(email.correlation_id(), Some(order_id.to_string().as_str()));
        let email_payload: EmailRequested = email.data_as().unwrap();
        assert_eq!(email_payload.template, "stock-low");
        assert_eq!(email_payload.variables["sku"], "SKU-prd_1");

        for subscriber in [inventory_sub, notification_sub, mailer_sub] {
            subscriber.disconnect().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_correlation_id_survives_explicit_start() {
        let config = BusConfig::default();
        let transport = config.in_memory_transport();
        let orders = service_publisher(&config, &transport, "orders");
        let inventory = service_publisher(&config, &transport, "inventory");

        let subscriber = Subscriber::connect(Arc::new(transport.clone()), SubscriberOptions::new())
            .await
            .unwrap();
        let (handler, mut rx) = forwarding_handler();
        subscriber.subscribe(Topic::OrderCreated, handler).await.unwrap();
        let (low_handler, mut low_rx) = forwarding_handler();
        subscriber
            .subscribe(Topic::ProductStockLow, low_handler)
            .await
            .unwrap();

        orders
            .publish(
                order_created("ord_1").into(),
                PublishOptions::new()
                    .with_envelope(EnvelopeOptions::new().with_correlation_id("checkout-9")),
            )
            .await
            .unwrap();
        let cause = next_event(&mut rx).await;

        inventory
            .publish(stock_low("prd_1").into(), PublishOptions::caused_by(&cause))
            .await
            .unwrap();
        let effect = next_event(&mut low_rx).await;

        assert_eq!(effect.correlation_id(), Some("checkout-9"));
        assert_eq!(
            effect.causation_id(),
            Some(cause.event_id().to_string().as_str())
        );
    }

    // =============================================================================
    // TELEMETRY
    // =============================================================================

    #[tokio::test]
    async fn test_telemetry_records_bus_traffic() {
        let _telemetry = init_telemetry(TelemetryConfig {
            console_output: false,
            ..TelemetryConfig::for_service("event-bus-tests")
        })
        .unwrap();

        let config = BusConfig::default();
        let transport = config.in_memory_transport();
        let subscriber = Subscriber::connect(Arc::new(transport.clone()), SubscriberOptions::new())
            .await
            .unwrap();
        let (handler, mut rx) = forwarding_handler();
        subscriber.subscribe(Topic::PageViewed, handler).await.unwrap();

        let publisher = service_publisher(&config, &transport, "analytics");
        publisher
            .publish(
                event_types::payloads::PageViewed {
                    session_id: "sess_1".to_string(),
                    user_id: None,
                    path: "/pricing".to_string(),
                    referrer: None,
                }
                .into(),
                PublishOptions::new(),
            )
            .await
            .unwrap();
        next_event(&mut rx).await;

        let text = encode_metrics().unwrap();
        assert!(text.contains("event_bus_events_published_total"));
        assert!(text.contains("analytics.page.viewed"));
        assert!(text.contains("event_bus_events_received_total"));
        assert!(text.contains("event_bus_decode_failures_total"));
    }
}
