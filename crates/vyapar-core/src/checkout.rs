//! # Checkout Planning
//!
//! Everything a checkout decides before it touches storage.
//!
//! ```text
//!  CheckoutRequest ──► validate lines ──► resolve products ──► stock check
//!                                                                  │
//!                     CheckoutPlan ◄── loyalty ◄── profit ◄────────┘
//! ```
//!
//! The db layer loads the products and the customer inside its transaction,
//! calls [`plan_checkout`], and only then starts writing. A rejected plan
//! therefore never leaves partial state behind.

use std::collections::{BTreeMap, HashMap};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CheckoutRequest, Customer, Product};
use crate::validation;

// =============================================================================
// Loyalty Policy
// =============================================================================

/// How points accrue and whether redemption may overdraw a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoyaltyPolicy {
    /// Spend required per point, in paise.
    pub paise_per_point: i64,
    /// Reject redemption above the customer's current balance.
    pub strict_redemption: bool,
}

impl Default for LoyaltyPolicy {
    fn default() -> Self {
        LoyaltyPolicy {
            paise_per_point: crate::DEFAULT_PAISE_PER_POINT,
            strict_redemption: false,
        }
    }
}

impl LoyaltyPolicy {
    /// `floor(total / paise_per_point)`.
    pub fn points_earned(&self, total: Money) -> i64 {
        total.floor_units(Money::from_paise(self.paise_per_point))
    }
}

// =============================================================================
// Plan
// =============================================================================

/// A validated cart line with its cost snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub price_at_sale: Money,
    pub cost_at_sale: Money,
}

impl PlannedLine {
    pub fn line_total(&self) -> Money {
        self.price_at_sale.multiply_quantity(self.quantity)
    }

    pub fn profit(&self) -> Money {
        (self.price_at_sale - self.cost_at_sale).multiply_quantity(self.quantity)
    }
}

/// Everything the commit phase needs to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub lines: Vec<PlannedLine>,
    pub total_amount: Money,
    pub total_profit: Money,
    pub customer_id: Option<String>,
    pub points_redeemed: i64,
    pub points_earned: i64,
    /// `points_earned − points_redeemed`, or 0 when no customer is attached.
    pub loyalty_delta: i64,
}

impl CheckoutPlan {
    /// Total quantity per product, for the stock deduction pass.
    pub fn quantity_by_product(&self) -> BTreeMap<&str, i64> {
        let mut totals = BTreeMap::new();
        for line in &self.lines {
            *totals.entry(line.product_id.as_str()).or_insert(0) += line.quantity;
        }
        totals
    }
}

/// Validates a checkout request against the products and customer the
/// caller loaded for this tenant.
///
/// Check order:
/// 1. cart shape (size, quantities, prices, redemption sign)
/// 2. customer present when one was named
/// 3. every product resolves, else `ProductNotFound`
/// 4. every product has enough aggregate stock for the sum of its lines,
///    else `InsufficientStock`
/// 5. redemption against balance (strict policy only)
pub fn plan_checkout(
    request: &CheckoutRequest,
    products: &HashMap<String, Product>,
    customer: Option<&Customer>,
    policy: &LoyaltyPolicy,
) -> CoreResult<CheckoutPlan> {
    validation::validate_cart_size(request.items.len())?;
    for line in &request.items {
        validation::validate_quantity(line.quantity)?;
        validation::validate_price(line.price_at_sale_paise, "price_at_sale")?;
    }
    if request.points_redeemed < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "points_redeemed".to_string(),
        }
        .into());
    }

    match (&request.customer_id, customer) {
        (Some(id), None) => return Err(CoreError::CustomerNotFound(id.clone())),
        (None, _) if request.points_redeemed > 0 => {
            return Err(ValidationError::Required {
                field: "customer_id".to_string(),
            }
            .into())
        }
        _ => {}
    }

    for line in &request.items {
        if !products.contains_key(&line.product_id) {
            return Err(CoreError::ProductNotFound(line.product_id.clone()));
        }
    }

    let mut requested: BTreeMap<&str, i64> = BTreeMap::new();
    for line in &request.items {
        *requested.entry(line.product_id.as_str()).or_insert(0) += line.quantity;
    }
    for (product_id, qty) in &requested {
        if let Some(product) = products.get(*product_id) {
            if product.stock_quantity < *qty {
                return Err(CoreError::InsufficientStock {
                    product: product.name.clone(),
                    available: product.stock_quantity,
                    requested: *qty,
                });
            }
        }
    }

    if let Some(customer) = customer {
        if policy.strict_redemption && request.points_redeemed > customer.loyalty_points {
            return Err(CoreError::InsufficientPoints {
                customer_id: customer.id.clone(),
                balance: customer.loyalty_points,
                requested: request.points_redeemed,
            });
        }
    }

    let lines: Vec<PlannedLine> = request
        .items
        .iter()
        .filter_map(|line| {
            products.get(&line.product_id).map(|product| PlannedLine {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                quantity: line.quantity,
                price_at_sale: Money::from_paise(line.price_at_sale_paise),
                cost_at_sale: product.cost(),
            })
        })
        .collect();

    let total_amount: Money = lines.iter().map(PlannedLine::line_total).sum();
    let total_profit: Money = lines.iter().map(PlannedLine::profit).sum();
    let points_earned = policy.points_earned(total_amount);
    let loyalty_delta = if customer.is_some() {
        points_earned - request.points_redeemed
    } else {
        0
    };

    Ok(CheckoutPlan {
        lines,
        total_amount,
        total_profit,
        customer_id: customer.map(|c| c.id.clone()),
        points_redeemed: request.points_redeemed,
        points_earned,
        loyalty_delta,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
