//! PID 参数网格
//!
//! `Kp × Kd × Kp_pos × Kd_pos` 的笛卡尔积，`Ki = 0.7 * Kp`，`Ki_pos = 0`，共 320 组。
//! 每个增益按固定小数位取整：`{:.1},{:.1},{:.2},{:.3},0,{:.4}`。

use pendulum_protocol::ParameterSet;

const KP_RANGE: (f64, f64, usize) = (450.0, 750.0, 5);
const KD_RANGE: (f64, f64, usize) = (3.0, 4.5, 4);
const KP_POS_RANGE: (f64, f64, usize) = (-0.03, -0.07, 4);
const KD_POS_RANGE: (f64, f64, usize) = (-0.005, -0.015, 4);
const KI_RATIO: f64 = 0.7;

/// 闭区间等分
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        },
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn range(spec: (f64, f64, usize)) -> Vec<f64> {
    linspace(spec.0, spec.1, spec.2)
}

/// 生成参数网格
pub fn generate_grid() -> Vec<ParameterSet> {
    let mut sets = Vec::new();
    for kp in range(KP_RANGE) {
        for kd in range(KD_RANGE) {
            for kp_pos in range(KP_POS_RANGE) {
                for kd_pos in range(KD_POS_RANGE) {
                    sets.push(ParameterSet::new(
                        round_to(kp, 1),
                        round_to(kp * KI_RATIO, 1),
                        round_to(kd, 2),
                        round_to(kp_pos, 3),
                        0.0,
                        round_to(kd_pos, 4),
                    ));
                }
            }
        }
    }
    sets
}
