//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity: `Money` amounts, formatted order numbers
/// and contact details are equal when their attributes are equal. They are
/// immutable; "changing" one means building a new value.
///
/// ```ignore
/// let a = Money::parse("12.50")?;
/// let b = Money::parse("12.5")?;
/// assert_eq!(a, b);
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
