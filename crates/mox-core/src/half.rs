//! IEEE 754 半精度浮点 (binary16) 与 f32 之间的转换.
//!
//! f16 -> f32 是精确的; f32 -> f16 采用就近舍入 (ties to even),
//! 溢出得到 ±Inf, NaN 保持为 NaN.

/// 将 binary16 位模式转换为 f32
pub fn f16_to_f32(bits: u16) -> f32 {
    let sign = u32::from(bits & 0x8000) << 16;
    let exp = u32::from((bits >> 10) & 0x1F);
    let mant = u32::from(bits & 0x03FF);

    let out = match exp {
        0 => {
            if mant == 0 {
                sign
            } else {
                // 非规格化数: 归一化尾数
                let mut e: i32 = -14;
                let mut m = mant;
                while m & 0x0400 == 0 {
                    m <<= 1;
                    e -= 1;
                }
                m &= 0x03FF;
                sign | (((e + 127) as u32) << 23) | (m << 13)
            }
        }
        0x1F => sign | 0x7F80_0000 | (mant << 13),
        _ => sign | ((exp + 127 - 15) << 23) | (mant << 13),
    };
    f32::from_bits(out)
}

/// 将 f32 转换为 binary16 位模式
pub fn f32_to_f16(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xFF) as i32;
    let mant = bits & 0x007F_FFFF;

    if exp == 0xFF {
        // Inf / NaN
        let nan_bit = if mant != 0 { 0x0200 } else { 0 };
        return sign | 0x7C00 | nan_bit;
    }

    let half_exp = exp - 127 + 15;
    if half_exp >= 0x1F {
        return sign | 0x7C00;
    }

    if half_exp <= 0 {
        // 非规格化或下溢为 0
        if half_exp < -10 {
            return sign;
        }
        let m = mant | 0x0080_0000;
        let shift = (14 - half_exp) as u32;
        let half_mant = m >> shift;
        let rem = m & ((1 << shift) - 1);
        let halfway = 1 << (shift - 1);
        let rounded = if rem > halfway || (rem == halfway && half_mant & 1 == 1) {
            half_mant + 1
        } else {
            half_mant
        };
        return sign | rounded as u16;
    }

    let half_mant = mant >> 13;
    let rem = mant & 0x1FFF;
    let mut out = u32::from(sign) | ((half_exp as u32) << 10) | half_mant;
    if rem > 0x1000 || (rem == 0x1000 && half_mant & 1 == 1) {
        // 进位可能溢出到指数位, 结果仍然正确 (最大值进位为 Inf)
        out += 1;
    }
    out as u16
}
