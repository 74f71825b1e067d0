//! 精确有理数, 用于帧率、采样率与像素宽高比.
//!
//! 头部往返要求帧率按数值精确相等, 因此比较通过交叉相乘完成, 不经过浮点.

use std::fmt;
use std::hash::{Hash, Hasher};

/// 有理数 `num/den`
///
/// 帧率 29.97 以 `Rational::new(30000, 1001)` 表示. 相等比较按数值进行:
/// `1/2 == 2/4`, `-1/2 == 1/-2`. 分母为 0 的值只与自身的字面值相等.
#[derive(Debug, Clone, Copy)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 单位值 1/1 (默认像素宽高比)
    pub const ONE: Self = Self::new(1, 1);

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 是否为严格正数 (分母非 0 且分子分母同号)
    pub const fn is_positive(&self) -> bool {
        self.den != 0 && self.num != 0 && (self.num > 0) == (self.den > 0)
    }

    /// 近似浮点值, 分母为 0 时为 NaN
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 最简形式, 分母为正; 分母为 0 时原样返回
    pub fn reduced(self) -> Self {
        if self.den == 0 {
            return self;
        }
        reduce_wide(i64::from(self.num), i64::from(self.den))
    }
}

/// 约分 i64 分子分母并收窄到 i32, `den` 非 0
fn reduce_wide(num: i64, den: i64) -> Rational {
    let (mut a, mut b) = (num.unsigned_abs(), den.unsigned_abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    let sign = if den < 0 { -1 } else { 1 };
    // a >= 1; 两个 i32 之积不超过 2^62
    let g = a as i64;
    let num = sign * num / g;
    let den = sign * den / g;
    Rational {
        num: num.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
        den: den.clamp(1, i64::from(i32::MAX)) as i32,
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::ONE
    }
}

impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        if self.den == 0 || other.den == 0 {
            return self.num == other.num && self.den == other.den;
        }
        i64::from(self.num) * i64::from(other.den) == i64::from(other.num) * i64::from(self.den)
    }
}

impl Eq for Rational {}

impl Hash for Rational {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let r = self.reduced();
        r.num.hash(state);
        r.den.hash(state);
    }
}

impl std::ops::Mul for Rational {
    type Output = Self;

    /// 精确相乘: 在 i64 中计算后约分; 任一分母为 0 时结果为 0/0
    fn mul(self, other: Self) -> Self {
        let den = i64::from(self.den) * i64::from(other.den);
        if den == 0 {
            return Self::new(0, 0);
        }
        reduce_wide(i64::from(self.num) * i64::from(other.num), den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_value_equality() {
        assert_eq!(Rational::new(1, 2), Rational::new(2, 4));
        assert_eq!(Rational::new(-1, 2), Rational::new(1, -2));
        assert_ne!(Rational::new(30000, 1001), Rational::new(2997, 100));
        assert_ne!(Rational::new(0, 0), Rational::new(0, 1));
    }

    #[test]
    fn test_hash_follows_equality() {
        let set: HashSet<Rational> = [Rational::new(24, 1), Rational::new(48, 2)].into();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_reduced() {
        let r = Rational::new(30, -60).reduced();
        assert_eq!((r.num, r.den), (-1, 2));
        let r = Rational::new(i32::MIN, -1).reduced();
        assert_eq!((r.num, r.den), (i32::MAX, 1));
    }

    #[test]
    fn test_positive() {
        assert!(Rational::new(30000, 1001).is_positive());
        assert!(Rational::new(-1, -2).is_positive());
        assert!(!Rational::new(0, 1).is_positive());
        assert!(!Rational::new(1, 0).is_positive());
        assert!(!Rational::new(-24, 1).is_positive());
        assert!(Rational::new(1, 0).to_f64().is_nan());
    }

    #[test]
    fn test_mul() {
        let r = Rational::new(30000, 1001) * Rational::new(2, 1);
        assert_eq!((r.num, r.den), (60000, 1001));
        let r = Rational::new(3, 4) * Rational::new(-2, 3);
        assert_eq!((r.num, r.den), (-1, 2));
        // 中间积超出 i32 仍然精确
        let r = Rational::new(65536, 3) * Rational::new(3, 65536);
        assert_eq!((r.num, r.den), (1, 1));
        assert_eq!(Rational::new(1, 0) * Rational::ONE, Rational::new(0, 0));
    }

    #[test]
    fn test_display() {
        assert_eq!(Rational::new(30000, 1001).to_string(), "30000/1001");
    }
}
