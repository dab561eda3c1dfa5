use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use vps_billing::domain::money::MoneyAmount;
use vps_billing::domain::order::{ORDER_TRANSITIONS, OrderStatus};
use vps_billing::domain::payment::{DisputeStatus, PaymentStatus};
use vps_billing::domain::task::{ExpireServicePayload, QueueName, TaskKind, decode_payload};
use vps_billing::services::tasks::billing::{days_until, is_reminder_day};

fn arb_order_status() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(OrderStatus::ALL.to_vec())
}

fn arb_payment_status() -> impl Strategy<Value = PaymentStatus> {
    prop::sample::select(PaymentStatus::ALL.to_vec())
}

fn rank(status: OrderStatus) -> usize {
    OrderStatus::ALL.iter().position(|s| *s == status).unwrap()
}

proptest! {
    /// A random walk over the order graph never revisits a state.
    #[test]
    fn order_walk_never_goes_backward(steps in prop::collection::vec(arb_order_status(), 1..40)) {
        let mut current = OrderStatus::Draft;
        let mut seen = vec![current];
        for next in &steps {
            if current.can_transition_to(next) {
                prop_assert!(rank(*next) > rank(current), "{current} → {next}");
                current = *next;
                prop_assert!(!seen.contains(&current));
                seen.push(current);
            }
        }
    }

    /// Terminal order states accept no edge at all.
    #[test]
    fn terminal_orders_reject_everything(target in arb_order_status()) {
        for terminal in [OrderStatus::Active, OrderStatus::Cancelled, OrderStatus::Refunded] {
            prop_assert!(terminal.is_terminal());
            prop_assert!(terminal.transition_to(target).is_err());
        }
    }

    /// `transition_to` agrees with the edge table.
    #[test]
    fn order_transition_matches_table(from in arb_order_status(), to in arb_order_status()) {
        let listed = ORDER_TRANSITIONS.contains(&(from, to));
        prop_assert_eq!(from.transition_to(to).is_ok(), listed);
    }

    /// The compensation edge is reachable only through `compensate_to`.
    #[test]
    fn compensation_edge_outside_lifecycle(from in arb_order_status(), to in arb_order_status()) {
        let compensates = from.compensate_to(to).is_ok();
        prop_assert_eq!(compensates, from == OrderStatus::Provisioning && to == OrderStatus::Paid);
        if compensates {
            prop_assert!(!from.can_transition_to(&to));
        }
    }

    #[test]
    fn order_status_roundtrip(status in arb_order_status()) {
        prop_assert_eq!(OrderStatus::try_from(status.as_str()).unwrap(), status);
    }

    /// Refunded is final; a walk from pending takes at most three steps
    /// (pending → failed → succeeded → refunded).
    #[test]
    fn payment_walk_is_bounded(steps in prop::collection::vec(arb_payment_status(), 1..30)) {
        let mut current = PaymentStatus::Pending;
        let mut transitions = 0u32;
        for next in &steps {
            if current.can_transition_to(next) {
                current = *next;
                transitions += 1;
            }
        }
        prop_assert!(transitions <= 3, "got {transitions} transitions in walk: {steps:?}");
        for target in PaymentStatus::ALL {
            prop_assert!(!PaymentStatus::Refunded.can_transition_to(&target));
        }
    }

    #[test]
    fn payment_status_roundtrip(status in arb_payment_status()) {
        prop_assert_eq!(PaymentStatus::try_from(status.as_str()).unwrap(), status);
    }

    /// Days left rounds any partial day up and clamps at zero.
    #[test]
    fn days_until_rounds_up(secs in -10_000_000i64..10_000_000) {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let days = days_until(now + Duration::seconds(secs), now);
        if secs <= 0 {
            prop_assert_eq!(days, 0);
        } else {
            prop_assert!(days >= 1);
            prop_assert!((days - 1) * 86_400 < secs && secs <= days * 86_400);
        }
    }

    #[test]
    fn reminder_days_are_seven_three_one(days in -5i64..40) {
        prop_assert_eq!(is_reminder_day(days), matches!(days, 7 | 3 | 1));
    }

    /// Unknown gateway dispute states still need a response.
    #[test]
    fn dispute_status_defaults_to_needs_response(status in "[a-z_]{0,24}") {
        let mapped = DisputeStatus::from_gateway(&status);
        let expected = match status.as_str() {
            "won" => DisputeStatus::Won,
            "lost" => DisputeStatus::Lost,
            "warning_under_review" | "under_review" => DisputeStatus::UnderReview,
            _ => DisputeStatus::NeedsResponse,
        };
        prop_assert_eq!(mapped, expected);
    }

    /// Negative amounts never construct; construction keeps the cents.
    #[test]
    fn money_amount_rejects_negative(cents in i64::MIN..i64::MAX) {
        match MoneyAmount::new(cents) {
            Ok(amount) => prop_assert_eq!(amount.cents(), cents),
            Err(_) => prop_assert!(cents < 0),
        }
    }

    /// Checked arithmetic matches i64 and never wraps.
    #[test]
    fn money_arithmetic_never_wraps(a in 0i64..=i64::MAX, b in 0i64..=i64::MAX, qty in -3i64..1_000) {
        let (x, y) = (MoneyAmount::new(a).unwrap(), MoneyAmount::new(b).unwrap());
        prop_assert_eq!(x.checked_add(y).map(|m| m.cents()), a.checked_add(b));
        let expected = if qty < 0 { None } else { a.checked_mul(qty) };
        prop_assert_eq!(x.checked_mul(qty).map(|m| m.cents()), expected);
    }

    /// Every poll order visits each queue exactly once.
    #[test]
    fn poll_order_is_a_permutation(tick in 0usize..100_000) {
        let order = QueueName::poll_order(tick);
        let unique: HashSet<_> = order.iter().collect();
        prop_assert_eq!(unique.len(), 3);
    }

    /// Over any window of ten consecutive polls the preferred queue follows
    /// the 6:3:1 weights.
    #[test]
    fn poll_order_follows_weights(start in 0usize..100_000) {
        let mut counts = [0usize; 3];
        for tick in start..start + 10 {
            match QueueName::poll_order(tick)[0] {
                QueueName::Critical => counts[0] += 1,
                QueueName::Default => counts[1] += 1,
                QueueName::Low => counts[2] += 1,
            }
        }
        prop_assert_eq!(counts, [6, 3, 1]);
    }
}

#[test]
fn null_payload_selects_scan_mode() {
    let payload: ExpireServicePayload =
        decode_payload(TaskKind::ExpireService, &serde_json::Value::Null).unwrap();
    assert_eq!(payload, ExpireServicePayload::default());
}

#[test]
fn payload_of_wrong_shape_is_permanent() {
    let err = decode_payload::<ExpireServicePayload>(
        TaskKind::ExpireService,
        &serde_json::json!({"service_id": "not-a-uuid"}),
    )
    .unwrap_err();
    assert!(err.is_permanent(), "got {err:?}");
}
