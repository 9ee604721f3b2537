use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Status of a single payment row.
///
/// `pending -> authorized -> charged -> refunded`, with `failed` reachable from any
/// pre-terminal state. Automatic-capture charges (no-show fees) go `pending -> charged`
/// directly, and an authorization released before capture ends `voided`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Authorized,
    Charged,
    Refunded,
    Failed,
    Voided,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Charged => "charged",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Voided => "voided",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "authorized" => Some(PaymentStatus::Authorized),
            "charged" => Some(PaymentStatus::Charged),
            "refunded" => Some(PaymentStatus::Refunded),
            "failed" => Some(PaymentStatus::Failed),
            "voided" => Some(PaymentStatus::Voided),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Authorized)
                | (Pending, Charged)
                | (Pending, Failed)
                | (Authorized, Charged)
                | (Authorized, Failed)
                | (Authorized, Voided)
                | (Charged, Refunded)
        )
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Pending,
        PaymentStatus::Authorized,
        PaymentStatus::Charged,
        PaymentStatus::Refunded,
        PaymentStatus::Failed,
        PaymentStatus::Voided,
    ];

    #[test]
    fn charge_requires_authorized_or_direct_pending_charge() {
        let allowed: Vec<_> = ALL
            .into_iter()
            .filter(|from| from.can_transition_to(PaymentStatus::Charged))
            .collect();
        assert_eq!(allowed, vec![PaymentStatus::Pending, PaymentStatus::Authorized]);
    }

    #[test]
    fn refund_only_from_charged() {
        for from in ALL {
            assert_eq!(
                from.can_transition_to(PaymentStatus::Refunded),
                from == PaymentStatus::Charged,
                "unexpected refund rule for {from}"
            );
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [PaymentStatus::Refunded, PaymentStatus::Failed, PaymentStatus::Voided] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }
}
