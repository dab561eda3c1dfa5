use {
    super::error::PipelineError,
    chrono::{DateTime, Days, Months, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    PendingPayment,
    Paid,
    Provisioning,
    Active,
    Cancelled,
    Refunded,
}

/// Every forward edge of the order lifecycle. Anything not listed here is
/// rejected at the mutation site.
pub const ORDER_TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Draft, OrderStatus::PendingPayment),
    (OrderStatus::Draft, OrderStatus::Cancelled),
    (OrderStatus::PendingPayment, OrderStatus::Paid),
    (OrderStatus::PendingPayment, OrderStatus::Cancelled),
    (OrderStatus::Paid, OrderStatus::Provisioning),
    (OrderStatus::Paid, OrderStatus::Refunded),
    (OrderStatus::Paid, OrderStatus::Cancelled),
    (OrderStatus::Provisioning, OrderStatus::Active),
    (OrderStatus::Provisioning, OrderStatus::Cancelled),
];

/// Saga compensation edges. These are not part of the lifecycle graph and
/// are only taken by the enqueue-failure compensation step.
pub const ORDER_COMPENSATIONS: &[(OrderStatus, OrderStatus)] =
    &[(OrderStatus::Provisioning, OrderStatus::Paid)];

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        Self::Draft,
        Self::PendingPayment,
        Self::Paid,
        Self::Provisioning,
        Self::Active,
        Self::Cancelled,
        Self::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Provisioning => "provisioning",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(&self, to: &OrderStatus) -> bool {
        ORDER_TRANSITIONS.contains(&(*self, *to))
    }

    pub fn is_terminal(&self) -> bool {
        !ORDER_TRANSITIONS.iter().any(|(from, _)| from == self)
    }

    /// Checkout already settled: the order is paid or has moved past it.
    pub fn is_paid_or_beyond(&self) -> bool {
        matches!(self, Self::Paid | Self::Provisioning | Self::Active)
    }

    pub fn transition_to(&self, to: OrderStatus) -> Result<OrderStatus, PipelineError> {
        if !self.can_transition_to(&to) {
            return Err(PipelineError::IllegalTransition {
                entity: "order",
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        Ok(to)
    }

    pub fn compensate_to(&self, to: OrderStatus) -> Result<OrderStatus, PipelineError> {
        if !ORDER_COMPENSATIONS.contains(&(*self, to)) {
            return Err(PipelineError::IllegalTransition {
                entity: "order",
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        Ok(to)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| PipelineError::Validation(format!("unknown order status: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Annually,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annually => "annually",
        }
    }

    fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Annually => 12,
        }
    }

    /// End of one paid period starting at `from`. Month arithmetic clamps to
    /// the last day of shorter months.
    pub fn period_end(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        from.checked_add_months(Months::new(self.months()))
            .unwrap_or(from)
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for BillingCycle {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "annually" => Ok(Self::Annually),
            other => Err(PipelineError::Validation(format!(
                "unknown billing cycle: {other}"
            ))),
        }
    }
}

/// Expiry of a freshly created service. Unknown cycles get one month.
pub fn service_expiry(cycle: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    BillingCycle::try_from(cycle)
        .unwrap_or(BillingCycle::Monthly)
        .period_end(now)
}

/// Due date of a renewal invoice. Unknown cycles are due in a week.
pub fn renewal_due_date(cycle: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    match BillingCycle::try_from(cycle) {
        Ok(cycle) => cycle.period_end(now),
        Err(_) => now.checked_add_days(Days::new(7)).unwrap_or(now),
    }
}
