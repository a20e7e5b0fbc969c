// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Arithmetic, bitwise, and ordering operations over `Var`. All type-strict:
//! mixing INT and FLOAT is `E_TYPE`, never a coercion.

use crate::error::ErrorCode::{E_DIV, E_FLOAT, E_INVARG, E_TYPE};
use crate::var::{v_float, v_int, Var};
use crate::variant::Variant;
use crate::Error;

/// Floats may never hold NaN or infinities; producing one is `E_FLOAT`.
fn f_ok(f: f64) -> Result<Var, Error> {
    if f.is_finite() {
        Ok(v_float(f))
    } else {
        Err(E_FLOAT.into())
    }
}

impl Var {
    pub fn add(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l.wrapping_add(*r))),
            (Variant::Float(l), Variant::Float(r)) => f_ok(l + r),
            (Variant::Str(l), Variant::Str(r)) => Ok(l.append(r)),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn sub(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l.wrapping_sub(*r))),
            (Variant::Float(l), Variant::Float(r)) => f_ok(l - r),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn mul(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l.wrapping_mul(*r))),
            (Variant::Float(l), Variant::Float(r)) => f_ok(l * r),
            _ => Err(E_TYPE.into()),
        }
    }

    /// Integer division truncates toward zero. A zero divisor is `E_DIV`,
    /// checked before anything else.
    pub fn div(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => {
                if *r == 0 {
                    return Err(E_DIV.into());
                }
                Ok(v_int(l.wrapping_div(*r)))
            }
            (Variant::Float(l), Variant::Float(r)) => {
                if *r == 0.0 {
                    return Err(E_DIV.into());
                }
                f_ok(l / r)
            }
            _ => Err(E_TYPE.into()),
        }
    }

    /// Modulo takes the divisor's sign: `-7 % 3 == 2`, `7 % -3 == -2`.
    pub fn modulus(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => {
                if *r == 0 {
                    return Err(E_DIV.into());
                }
                let rem = l.wrapping_rem(*r).wrapping_add(*r).wrapping_rem(*r);
                Ok(v_int(rem))
            }
            (Variant::Float(l), Variant::Float(r)) => {
                if *r == 0.0 {
                    return Err(E_DIV.into());
                }
                f_ok(((l % r) + r) % r)
            }
            _ => Err(E_TYPE.into()),
        }
    }

    /// `^` — INT^INT (non-negative exponent only) or FLOAT^FLOAT.
    pub fn pow(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => {
                if *r < 0 {
                    return Err(E_TYPE.into());
                }
                let exp = u32::try_from(*r).map_err(|_| Error::from(E_INVARG))?;
                Ok(v_int(l.wrapping_pow(exp)))
            }
            (Variant::Float(l), Variant::Float(r)) => f_ok(l.powf(*r)),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn neg(&self) -> Result<Var, Error> {
        match self.variant() {
            Variant::Int(l) => Ok(v_int(l.wrapping_neg())),
            Variant::Float(l) => Ok(v_float(-*l)),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn bitand(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l & r)),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn bitor(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l | r)),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn bitxor(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l ^ r)),
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn shl(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => {
                if *r < 0 || *r >= 64 {
                    return Err(E_INVARG.into());
                }
                Ok(v_int(l.wrapping_shl(*r as u32)))
            }
            _ => Err(E_TYPE.into()),
        }
    }

    /// Arithmetic (sign-extending) right shift.
    pub fn shr(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => {
                if *r < 0 || *r >= 64 {
                    return Err(E_INVARG.into());
                }
                Ok(v_int(l.wrapping_shr(*r as u32)))
            }
            _ => Err(E_TYPE.into()),
        }
    }

    pub fn complement(&self) -> Result<Var, Error> {
        match self.variant() {
            Variant::Int(l) => Ok(v_int(!l)),
            _ => Err(E_TYPE.into()),
        }
    }

    /// Ordering comparison for `<`/`<=`/`>`/`>=`. Only same-type scalar and
    /// string comparisons are legal; `1 < 1.0` is `E_TYPE`.
    pub fn cmp_moo(&self, other: &Var) -> Result<std::cmp::Ordering, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(l.cmp(r)),
            (Variant::Float(l), Variant::Float(r)) => Ok(l.total_cmp(r)),
            (Variant::Str(l), Variant::Str(r)) => Ok(l.cmp(r)),
            (Variant::Obj(l), Variant::Obj(r)) => Ok(l.cmp(r)),
            (Variant::Err(l), Variant::Err(r)) => Ok(l.err_type.cmp(&r.err_type)),
            _ => Err(E_TYPE.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v_str;
    use std::cmp::Ordering;

    #[test]
    fn type_strictness() {
        assert!(v_int(1).add(&v_float(1.0)).is_err());
        assert!(v_int(1).cmp_moo(&v_float(1.0)).is_err());
        assert_eq!(v_int(1).add(&v_int(1)).unwrap(), v_int(2));
        assert_eq!(v_float(1.5).add(&v_float(0.5)).unwrap(), v_float(2.0));
    }

    #[test]
    fn division_checks_zero_first() {
        assert_eq!(v_int(1).div(&v_int(0)).unwrap_err().err_type, E_DIV);
        assert_eq!(v_float(1.0).div(&v_float(0.0)).unwrap_err().err_type, E_DIV);
        assert_eq!(v_int(7).div(&v_int(-2)).unwrap(), v_int(-3));
    }

    #[test]
    fn modulus_takes_divisor_sign() {
        assert_eq!(v_int(-7).modulus(&v_int(3)).unwrap(), v_int(2));
        assert_eq!(v_int(7).modulus(&v_int(-3)).unwrap(), v_int(-2));
        assert_eq!(v_int(7).modulus(&v_int(3)).unwrap(), v_int(1));
    }

    #[test]
    fn float_overflow_is_e_float() {
        assert_eq!(
            v_float(1e308).mul(&v_float(1e308)).unwrap_err().err_type,
            E_FLOAT
        );
        assert_eq!(
            v_float(-1.0).pow(&v_float(0.5)).unwrap_err().err_type,
            E_FLOAT
        );
    }

    #[test]
    fn string_concat_and_compare() {
        assert_eq!(
            v_str("foo").add(&v_str("bar")).unwrap(),
            v_str("foobar")
        );
        assert_eq!(
            v_str("abc").cmp_moo(&v_str("ABD")).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn bit_ops() {
        assert_eq!(v_int(6).bitand(&v_int(3)).unwrap(), v_int(2));
        assert_eq!(v_int(6).bitor(&v_int(3)).unwrap(), v_int(7));
        assert_eq!(v_int(6).bitxor(&v_int(3)).unwrap(), v_int(5));
        assert_eq!(v_int(-8).shr(&v_int(1)).unwrap(), v_int(-4));
        assert_eq!(v_int(1).shl(&v_int(3)).unwrap(), v_int(8));
        assert_eq!(v_int(0).complement().unwrap(), v_int(-1));
        assert_eq!(v_int(1).shl(&v_int(64)).unwrap_err().err_type, E_INVARG);
    }

    #[test]
    fn negative_int_exponent_is_type_error() {
        assert_eq!(v_int(2).pow(&v_int(-1)).unwrap_err().err_type, E_TYPE);
        assert_eq!(v_int(2).pow(&v_int(10)).unwrap(), v_int(1024));
    }
}
