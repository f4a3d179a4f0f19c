//! # Consuming
//!
//! Subscriber registry, handler isolation and inbound failures over the
//! in-memory transport.

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        assert_no_event, booking_cancelled, forwarding_handler, next_event, order_created,
        stock_low,
    };
    use event_bus::{
        encode, handler_fn, BusError, EventEnvelope, EventPublisher, InMemoryTransport,
        PublishOptions, Publisher, PublisherConfig, Subscriber, SubscriberOptions, Topic,
        Transport,
    };
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    type Failures = Arc<Mutex<Vec<(String, Option<EventEnvelope>, String)>>>;

    struct Harness {
        transport: InMemoryTransport,
        subscriber: Subscriber,
        publisher: Publisher,
        failures: Failures,
    }

    async fn harness() -> Harness {
        let transport = InMemoryTransport::new();
        let failures: Failures = Arc::new(Mutex::new(Vec::new()));
        let recorded = failures.clone();
        let subscriber = Subscriber::connect(
            Arc::new(transport.clone()),
            SubscriberOptions::new().on_error(move |err, event, channel| {
                recorded
                    .lock()
                    .push((err.to_string(), event.cloned(), channel.to_string()));
            }),
        )
        .await
        .unwrap();
        let publisher = Publisher::new(
            Arc::new(transport.clone()),
            PublisherConfig::new("orders").with_retry_delay(Duration::from_millis(1)),
        );
        Harness {
            transport,
            subscriber,
            publisher,
            failures,
        }
    }

    async fn wait_for_failures(failures: &Failures, count: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while failures.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for on_error");
    }

    // =============================================================================
    // ISOLATION
    // =============================================================================

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_the_next() {
        let h = harness().await;
        let failing =
            handler_fn(|_event| async { Err::<(), _>(anyhow::anyhow!("stock service down")) });
        let (second, mut rx) = forwarding_handler();
        h.subscriber
            .subscribe(Topic::OrderCreated, failing)
            .await
            .unwrap();
        h.subscriber
            .subscribe(Topic::OrderCreated, second)
            .await
            .unwrap();

        let event_id = h
            .publisher
            .publish(order_created("ord_1").into(), PublishOptions::new())
            .await
            .unwrap();

        assert_eq!(next_event(&mut rx).await.event_id(), event_id);
        wait_for_failures(&h.failures, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let failures = h.failures.lock();
        assert_eq!(failures.len(), 1);
        let (message, event, channel) = &failures[0];
        assert!(message.contains("stock service down"), "{message}");
        assert_eq!(event.as_ref().map(EventEnvelope::event_id), Some(event_id));
        assert_eq!(channel, "order.created");
    }

    #[tokio::test]
    async fn test_handlers_run_in_registration_order() {
        let h = harness().await;
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let order = order.clone();
            h.subscriber
                .subscribe(
                    Topic::OrderCreated,
                    handler_fn(move |_event| {
                        let order = order.clone();
                        async move {
                            order.lock().push(name);
                            Ok::<(), anyhow::Error>(())
                        }
                    }),
                )
                .await
                .unwrap();
        }

        let raw = encode(
            &event_bus::build_envelope(
                order_created("ord_1").into(),
                "orders",
                &event_bus::EnvelopeOptions::new(),
            )
            .unwrap(),
        );
        h.subscriber.dispatch("order.created", &raw).await;

        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    // =============================================================================
    // INBOUND FAILURES
    // =============================================================================

    #[tokio::test]
    async fn test_undecodable_message_reports_once_without_event() {
        let h = harness().await;
        let (handler, mut rx) = forwarding_handler();
        h.subscriber
            .subscribe(Topic::OrderCreated, handler)
            .await
            .unwrap();

        h.transport
            .broadcast("order.created", "{not json".to_string())
            .await
            .unwrap();

        wait_for_failures(&h.failures, 1).await;
        assert_no_event(&mut rx).await;

        let failures = h.failures.lock();
        assert_eq!(failures.len(), 1);
        let (message, event, channel) = &failures[0];
        assert!(message.starts_with("Malformed event"), "{message}");
        assert!(event.is_none());
        assert_eq!(channel, "order.created");
    }

    #[tokio::test]
    async fn test_direct_dispatch_of_garbage_is_malformed() {
        let h = harness().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        h.subscriber
            .subscribe(
                Topic::OrderCreated,
                handler_fn(move |_event| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<(), anyhow::Error>(()) }
                }),
            )
            .await
            .unwrap();

        h.subscriber.dispatch("order.created", "42").await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.failures.lock().len(), 1);
        assert!(h.failures.lock()[0].1.is_none());
    }

    #[tokio::test]
    async fn test_envelope_without_data_never_reaches_handlers() {
        let h = harness().await;
        let (handler, mut rx) = forwarding_handler();
        h.subscriber
            .subscribe(Topic::OrderCreated, handler)
            .await
            .unwrap();

        let envelope = event_bus::build_envelope(
            order_created("ord_1").into(),
            "orders",
            &event_bus::EnvelopeOptions::new(),
        )
        .unwrap();
        let full: serde_json::Value = serde_json::from_str(&encode(&envelope)).unwrap();

        let mut missing = full.clone();
        missing.as_object_mut().unwrap().remove("data");
        let mut null = full.clone();
        null["data"] = serde_json::Value::Null;
        let mut empty = full;
        empty["data"] = serde_json::json!({});

        for raw in [missing, null, empty] {
            h.subscriber
                .dispatch("order.created", &raw.to_string())
                .await;
        }

        assert_no_event(&mut rx).await;
        let failures = h.failures.lock();
        assert_eq!(failures.len(), 3);
        for (message, event, channel) in failures.iter() {
            assert!(message.starts_with("Malformed event"), "{message}");
            assert!(event.is_none());
            assert_eq!(channel, "order.created");
        }
    }

    #[tokio::test]
    async fn test_blank_source_on_the_wire_is_malformed() {
        let h = harness().await;
        let (handler, mut rx) = forwarding_handler();
        h.subscriber
            .subscribe(Topic::OrderCreated, handler)
            .await
            .unwrap();

        let envelope = event_bus::build_envelope(
            order_created("ord_1").into(),
            "orders",
            &event_bus::EnvelopeOptions::new(),
        )
        .unwrap();
        let mut raw: serde_json::Value = serde_json::from_str(&encode(&envelope)).unwrap();
        raw["source"] = serde_json::json!("");

        h.transport
            .broadcast("order.created", raw.to_string())
            .await
            .unwrap();

        wait_for_failures(&h.failures, 1).await;
        assert_no_event(&mut rx).await;
        assert!(h.failures.lock()[0].1.is_none());
    }

    #[test]
    fn test_decode_failure_is_the_malformed_variant() {
        let err = event_bus::decode("{}").unwrap_err();
        assert!(matches!(err, BusError::MalformedEvent { .. }));
        assert_eq!(err.kind(), "malformed_event");
    }

    // =============================================================================
    // REGISTRY
    // =============================================================================

    #[tokio::test]
    async fn test_unsubscribe_last_handler_stops_listening() {
        let h = harness().await;
        let (first, mut first_rx) = forwarding_handler();
        let (second, mut second_rx) = forwarding_handler();
        let first_sub = h
            .subscriber
            .subscribe(Topic::ProductStockLow, first)
            .await
            .unwrap();
        let second_sub = h
            .subscriber
            .subscribe(Topic::ProductStockLow, second)
            .await
            .unwrap();
        assert_eq!(h.transport.listener_count("product.inventory.low"), 1);

        first_sub.unsubscribe().await.unwrap();
        assert_eq!(h.transport.listener_count("product.inventory.low"), 1);

        h.publisher
            .publish(stock_low("prd_1").into(), PublishOptions::new())
            .await
            .unwrap();
        next_event(&mut second_rx).await;
        assert_no_event(&mut first_rx).await;

        second_sub.unsubscribe().await.unwrap();
        assert_eq!(h.transport.listener_count("product.inventory.low"), 0);
        assert!(!h.subscriber.is_active());
    }

    #[tokio::test]
    async fn test_same_handler_twice_is_invoked_once() {
        let h = harness().await;
        let (handler, mut rx) = forwarding_handler();
        h.subscriber
            .subscribe(Topic::OrderCreated, handler.clone())
            .await
            .unwrap();
        h.subscriber
            .subscribe(Topic::OrderCreated, handler)
            .await
            .unwrap();

        h.publisher
            .publish(order_created("ord_1").into(), PublishOptions::new())
            .await
            .unwrap();

        next_event(&mut rx).await;
        assert_no_event(&mut rx).await;
    }

    #[tokio::test]
    async fn test_subscribe_many_and_unsubscribe_all() {
        let h = harness().await;
        let (handler, mut rx) = forwarding_handler();
        let subscriptions = h
            .subscriber
            .subscribe_many(&[Topic::OrderCreated, Topic::BookingCancelled], handler)
            .await
            .unwrap();
        assert_eq!(subscriptions.len(), 2);
        assert_eq!(
            h.subscriber.subscribed_topics(),
            vec![Topic::OrderCreated, Topic::BookingCancelled]
        );

        h.publisher
            .publish(booking_cancelled().into(), PublishOptions::new())
            .await
            .unwrap();
        assert_eq!(next_event(&mut rx).await.topic(), Topic::BookingCancelled);

        h.subscriber.unsubscribe_all().await.unwrap();
        assert!(h.subscriber.subscribed_topics().is_empty());
        assert_eq!(h.transport.listener_count("order.created"), 0);
        assert_eq!(h.transport.listener_count("appointment.booking.cancelled"), 0);

        h.publisher
            .publish(order_created("ord_1").into(), PublishOptions::new())
            .await
            .unwrap();
        assert_no_event(&mut rx).await;
    }

    #[tokio::test]
    async fn test_disconnect_and_stale_subscription() {
        let h = harness().await;
        let (handler, _rx) = forwarding_handler();
        let subscription = h
            .subscriber
            .subscribe(Topic::OrderCreated, handler)
            .await
            .unwrap();
        assert!(h.subscriber.health_check().await);

        h.subscriber.disconnect().await.unwrap();
        assert!(!h.subscriber.is_active());
        assert_eq!(h.transport.listener_count("order.created"), 0);

        drop(h.subscriber);
        subscription.unsubscribe().await.unwrap();
    }
}
