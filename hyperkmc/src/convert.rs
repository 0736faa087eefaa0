//! Checked conversions between the integer and floating-point domains.

pub fn f64_from_usize(x: usize) -> f64 {
    // UNWRAP: lattice dimensions and counters stay far below 2^32
    f64::from(u32::try_from(x).unwrap_or_else(|_| unreachable!()))
}

pub fn f64_from_u64(x: u64) -> f64 {
    // UNWRAP: event and carrier counters stay far below 2^32
    f64::from(u32::try_from(x).unwrap_or_else(|_| unreachable!()))
}

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn usize_from_f64(x: f64) -> usize {
    x.max(0.0) as usize
}
