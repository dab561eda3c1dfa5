use {
    super::order_repo::{OrderItemRow, OrderRow},
    crate::domain::{error::PipelineError, money::MoneyAmount},
    chrono::{DateTime, Days, Utc},
    sqlx::{Postgres, Transaction},
    uuid::Uuid,
};

/// `INV-YYYYMMDD-XXXXXXXX`.
pub fn invoice_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("INV-{}-{}", now.format("%Y%m%d"), suffix[..8].to_uppercase())
}

fn line_amount(item: &OrderItemRow) -> Result<MoneyAmount, PipelineError> {
    MoneyAmount::new(item.unit_price_cents)?
        .checked_mul(i64::from(item.quantity))
        .ok_or_else(|| PipelineError::Validation(format!("line amount overflow on item {}", item.id)))
}

/// Find or create the checkout invoice of an order. The invoice is born
/// `paid`; its items mirror the order items.
pub async fn find_or_create_initial(
    tx: &mut Transaction<'_, Postgres>,
    order: &OrderRow,
    items: &[OrderItemRow],
    now: DateTime<Utc>,
) -> Result<Uuid, PipelineError> {
    let subtotal = items.iter().try_fold(MoneyAmount::ZERO, |acc, item| {
        acc.checked_add(line_amount(item)?)
            .ok_or_else(|| PipelineError::Validation("invoice subtotal overflow".into()))
    })?;
    let total = MoneyAmount::new(order.total_cents)?;
    let due_date = now.checked_add_days(Days::new(30)).unwrap_or(now);

    let created: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO invoices
            (id, user_id, order_id, invoice_number, kind, status,
             subtotal_cents, tax_cents, total_cents, currency, due_date, paid_at)
        VALUES ($1, $2, $3, $4, 'initial', 'paid', $5, 0, $6, $7, $8, $9)
        ON CONFLICT (order_id) WHERE kind = 'initial' DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(order.user_id)
    .bind(order.id)
    .bind(invoice_number(now))
    .bind(subtotal.cents())
    .bind(total.cents())
    .bind(&order.currency)
    .bind(due_date)
    .bind(now)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(invoice_id) = created else {
        let existing: Uuid = sqlx::query_scalar(
            "SELECT id FROM invoices WHERE order_id = $1 AND kind = 'initial'",
        )
        .bind(order.id)
        .fetch_one(&mut **tx)
        .await?;
        return Ok(existing);
    };

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (id, invoice_id, description, quantity, unit_price_cents, amount_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(invoice_id)
        .bind(&item.plan_name)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(line_amount(item)?.cents())
        .execute(&mut **tx)
        .await?;
    }

    Ok(invoice_id)
}

pub struct RenewalInvoice {
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub billing_cycle: String,
    pub unit_price_cents: i64,
    pub currency: String,
    pub due_date: DateTime<Utc>,
}

/// Pending renewal invoice with its single line item.
pub async fn create_renewal(
    tx: &mut Transaction<'_, Postgres>,
    renewal: &RenewalInvoice,
    now: DateTime<Utc>,
) -> Result<Uuid, PipelineError> {
    let amount = MoneyAmount::new(renewal.unit_price_cents)?;
    let invoice_id = Uuid::now_v7();

    sqlx::query(
        r#"
        INSERT INTO invoices
            (id, user_id, order_id, invoice_number, kind, status,
             subtotal_cents, tax_cents, total_cents, currency, due_date)
        VALUES ($1, $2, $3, $4, 'renewal', 'pending', $5, 0, $5, $6, $7)
        "#,
    )
    .bind(invoice_id)
    .bind(renewal.user_id)
    .bind(renewal.order_id)
    .bind(invoice_number(now))
    .bind(amount.cents())
    .bind(&renewal.currency)
    .bind(renewal.due_date)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO invoice_items (id, invoice_id, description, quantity, unit_price_cents, amount_cents)
        VALUES ($1, $2, $3, 1, $4, $4)
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(invoice_id)
    .bind(format!("Service renewal ({})", renewal.billing_cycle))
    .bind(amount.cents())
    .execute(&mut **tx)
    .await?;

    Ok(invoice_id)
}
