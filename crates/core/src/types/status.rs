//! Status enums for derived entities.

use serde::{Deserialize, Serialize};

/// Status assigned to a derived order.
///
/// Carts carry no lifecycle upstream, so every order gets a status drawn
/// from a fixed categorical distribution (see [`OrderStatus::WEIGHTS`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Completed,
    Shipped,
    Pending,
    Cancelled,
}

impl OrderStatus {
    /// All statuses in the order their weights accumulate.
    pub const ALL: [Self; 4] = [
        Self::Completed,
        Self::Shipped,
        Self::Pending,
        Self::Cancelled,
    ];

    /// Probability of each status, aligned with [`OrderStatus::ALL`].
    pub const WEIGHTS: [f64; 4] = [0.85, 0.08, 0.04, 0.03];

    /// Cumulative upper bounds of each bucket, aligned with [`OrderStatus::ALL`].
    pub const THRESHOLDS: [f64; 4] = [0.85, 0.93, 0.97, 1.0];

    /// Pick a status from a uniform draw in `[0.0, 1.0)`.
    ///
    /// Draws at or above 1.0 fall into the final bucket.
    #[must_use]
    pub fn from_draw(draw: f64) -> Self {
        Self::ALL
            .iter()
            .zip(Self::THRESHOLDS)
            .find(|(_, threshold)| draw < *threshold)
            .map_or(Self::Cancelled, |(status, _)| *status)
    }

    /// Stored text value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Shipped => "shipped",
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "shipped" => Ok(Self::Shipped),
            "pending" => Ok(Self::Pending),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = OrderStatus::WEIGHTS.iter().sum();
        assert!((total - 1.0).abs() < 1e-9, "weights sum to {total}");
    }

    #[test]
    fn test_thresholds_accumulate_weights() {
        let mut cumulative = 0.0;
        for (weight, threshold) in OrderStatus::WEIGHTS.iter().zip(OrderStatus::THRESHOLDS) {
            cumulative += weight;
            assert!((cumulative - threshold).abs() < 1e-9);
        }
    }

    #[test]
    fn test_from_draw_thresholds() {
        assert_eq!(OrderStatus::from_draw(0.0), OrderStatus::Completed);
        assert_eq!(OrderStatus::from_draw(0.849), OrderStatus::Completed);
        assert_eq!(OrderStatus::from_draw(0.85), OrderStatus::Shipped);
        assert_eq!(OrderStatus::from_draw(0.929), OrderStatus::Shipped);
        assert_eq!(OrderStatus::from_draw(0.93), OrderStatus::Pending);
        assert_eq!(OrderStatus::from_draw(0.969), OrderStatus::Pending);
        assert_eq!(OrderStatus::from_draw(0.97), OrderStatus::Cancelled);
        assert_eq!(OrderStatus::from_draw(0.999_999), OrderStatus::Cancelled);
        assert_eq!(OrderStatus::from_draw(1.0), OrderStatus::Cancelled);
    }

    #[test]
    fn test_round_trip_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }
}
