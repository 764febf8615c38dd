//! PDG Monte Carlo particle numbering: species codes and nominal masses.
//!
//! Codes are signed: a negative code is the charge conjugate of the
//! positive one. Masses are in GeV/c² and do not depend on the sign.

/// b quark.
pub const B_QUARK: i32 = 5;
/// π+.
pub const PI_PLUS: i32 = 211;
/// K+.
pub const K_PLUS: i32 = 321;
/// K*(892)0.
pub const K_STAR_0: i32 = 313;
/// Proton.
pub const PROTON: i32 = 2212;
/// Δ(1232)++.
pub const DELTA_PLUS_PLUS: i32 = 2224;
/// Λ(1520).
pub const LAMBDA_1520: i32 = 3124;
/// D+.
pub const D_PLUS: i32 = 411;
/// Ds+.
pub const DS_PLUS: i32 = 431;
/// Λc+.
pub const LAMBDA_C_PLUS: i32 = 4122;
/// Ξc+.
pub const XI_C_PLUS: i32 = 4232;

/// Nominal mass for a species code, independent of its sign.
///
/// Returns `None` for codes outside the table.
pub fn mass(code: i32) -> Option<f64> {
    let m = match code.unsigned_abs() as i32 {
        B_QUARK => 4.18,
        PI_PLUS => 0.139_570_39,
        K_PLUS => 0.493_677,
        K_STAR_0 => 0.895_55,
        PROTON => 0.938_272_088_16,
        DELTA_PLUS_PLUS => 1.232,
        LAMBDA_1520 => 1.519_5,
        D_PLUS => 1.869_66,
        DS_PLUS => 1.968_35,
        LAMBDA_C_PLUS => 2.286_46,
        XI_C_PLUS => 2.467_71,
        _ => return None,
    };
    Some(m)
}

/// Whether a species carries bottom flavour: the b quark itself or a hadron
/// with a b among its quark digits.
pub fn is_bottom_flavour(code: i32) -> bool {
    let a = code.unsigned_abs();
    if a == B_QUARK as u32 {
        return true;
    }
    // Leptons, bosons and generator specials have no quark digits; nuclei use
    // the 10-digit scheme.
    if !(100..1_000_000_000).contains(&a) {
        return false;
    }
    let nq1 = (a / 1000) % 10;
    let nq2 = (a / 100) % 10;
    let nq3 = (a / 10) % 10;
    if nq1 != 0 { nq1 == 5 || nq2 == 5 || nq3 == 5 } else { nq2 == 5 || nq3 == 5 }
}
