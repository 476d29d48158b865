//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  In a pharmacy price book:                                              │
//! │    strip price = box price / 10 = 2.499 → who gets the missing 0.1¢?   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    2499 cents / 10 = 249 cents, remainder 9                            │
//! │    The remainder is visible and handled explicitly                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rxpos_core::money::Money;
//!
//! // Create from cents (preferred)
//! let price = Money::from_cents(2499); // 24.99
//!
//! // Arithmetic operations
//! let line = price.multiply_quantity(3);        // 74.97
//! let total = line + Money::from_cents(500);    // 79.97
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for refunds and corrections
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Currency-agnostic**: The currency code lives on [`crate::ShopPricing`];
///   this type never mixes currencies itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Why Cents?
    /// Using the smallest unit eliminates all floating-point concerns.
    /// Storage, calculations, and interfaces all use cents; only the UI
    /// converts to major units for display.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units (e.g., 24 and 99).
    ///
    /// For negative amounts, only the major unit should be negative:
    /// `from_major_minor(-5, 50)` = -5.50, not -4.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use rxpos_core::money::Money;
    ///
    /// let strip_price = Money::from_cents(299);
    /// assert_eq!(strip_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Applies a rate in basis points and returns the resulting portion.
    ///
    /// 1 basis point = 0.01%, so 825 bps = 8.25%. Uses integer math with
    /// half-up rounding: `(cents × bps + 5000) / 10000`. i128 intermediate
    /// prevents overflow on large amounts.
    ///
    /// ## Example
    /// ```rust
    /// use rxpos_core::money::Money;
    ///
    /// let price = Money::from_cents(1000);
    /// assert_eq!(price.portion_bps(825).cents(), 83); // 8.25% tax
    /// ```
    pub fn portion_bps(&self, bps: u32) -> Money {
        let portion = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money::from_cents(portion as i64)
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ## Arguments
    /// * `discount_bps` - Discount in basis points (1000 = 10%)
    ///
    /// ## Example
    /// ```rust
    /// use rxpos_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(10000);
    /// assert_eq!(subtotal.apply_discount_bps(1000).cents(), 9000); // 10% off
    /// ```
    pub fn apply_discount_bps(&self, discount_bps: u32) -> Money {
        *self - self.portion_bps(discount_bps)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for debugging and logs. Currency-aware formatting belongs to
/// the presentation layer, which knows the price book's currency code.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
